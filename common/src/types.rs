use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schedule::{ClockTime, ScheduleError, ScheduleWindow};

/// Light command forwarded to the LED firmware.
///
/// The controller never interprets the fields; the object is written to the
/// device exactly as it was received.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LightCommand(Map<String, Value>);

impl LightCommand {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Black static frame the scheduler uses to blank the fixture.
    pub fn off() -> Self {
        let mut fields = Map::new();
        fields.insert("mode".to_string(), Value::from("static"));
        fields.insert("color".to_string(), Value::from("#000000"));
        Self(fields)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Wire form: compact JSON terminated by a newline.
    pub fn to_wire(&self) -> serde_json::Result<Vec<u8>> {
        let mut line = serde_json::to_vec(&self.0)?;
        line.push(b'\n');
        Ok(line)
    }
}

impl TryFrom<Value> for LightCommand {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiReply {
    pub success: bool,
    pub msg: String,
}

impl ApiReply {
    pub fn ok(msg: impl Into<String>) -> Self {
        Self {
            success: true,
            msg: msg.into(),
        }
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            msg: msg.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigView {
    pub default_com_port: String,
    pub is_connected: bool,
    pub connected_port: Option<String>,
    pub last_light_state: Option<Value>,
    pub schedule: ScheduleWindow,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectRequest {
    #[serde(default)]
    pub port: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleRequest {
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl ScheduleRequest {
    /// Missing bounds fall back to the default `00:00`-`08:00` window.
    pub fn into_window(self) -> Result<ScheduleWindow, ScheduleError> {
        let start_time = match self.start_time {
            Some(raw) => raw.parse::<ClockTime>()?,
            None => ScheduleWindow::default_start(),
        };
        let end_time = match self.end_time {
            Some(raw) => raw.parse::<ClockTime>()?,
            None => ScheduleWindow::default_end(),
        };

        Ok(ScheduleWindow {
            start_time,
            end_time,
            enabled: self.enabled.unwrap_or(true),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PortsView {
    pub ports: Vec<String>,
}
