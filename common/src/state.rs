use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{schedule::ScheduleWindow, types::LightCommand};

pub const LIGHT_STATE_KEY: &str = "light_state";
pub const SCHEDULE_KEY: &str = "schedule";

/// On-disk record of the last user-chosen light command and the schedule.
///
/// Kept as a raw JSON object so merges only touch the keys being updated and
/// anything else found in the file survives a rewrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistedState {
    document: Map<String, Value>,
}

/// Top-level keys to merge into a [`PersistedState`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub light_state: Option<LightCommand>,
    pub schedule: Option<ScheduleWindow>,
}

impl StateUpdate {
    pub fn light_state(command: LightCommand) -> Self {
        Self {
            light_state: Some(command),
            schedule: None,
        }
    }

    pub fn schedule(window: ScheduleWindow) -> Self {
        Self {
            light_state: None,
            schedule: Some(window),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.light_state.is_none() && self.schedule.is_none()
    }
}

impl PersistedState {
    pub fn from_slice(raw: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(raw)
    }

    pub fn to_vec_pretty(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    pub fn is_empty(&self) -> bool {
        self.document.is_empty()
    }

    pub fn apply(&mut self, update: StateUpdate) -> serde_json::Result<()> {
        if let Some(command) = update.light_state {
            self.document
                .insert(LIGHT_STATE_KEY.to_string(), serde_json::to_value(command)?);
        }
        if let Some(window) = update.schedule {
            self.document
                .insert(SCHEDULE_KEY.to_string(), serde_json::to_value(window)?);
        }
        Ok(())
    }

    /// Raw last light state, whatever shape it was stored in.
    pub fn light_state(&self) -> Option<&Value> {
        self.document
            .get(LIGHT_STATE_KEY)
            .filter(|value| !value.is_null())
    }

    /// Last light state when it is a command worth replaying: a non-empty object.
    pub fn restorable_light(&self) -> Option<LightCommand> {
        match self.light_state()? {
            Value::Object(fields) if !fields.is_empty() => Some(LightCommand::new(fields.clone())),
            _ => None,
        }
    }

    pub fn schedule(&self) -> Option<ScheduleWindow> {
        self.schedule_entry()?.ok()
    }

    /// Stored schedule that is present but does not decode.
    pub fn schedule_error(&self) -> Option<serde_json::Error> {
        self.schedule_entry()?.err()
    }

    pub fn drop_schedule(&mut self) {
        self.document.remove(SCHEDULE_KEY);
    }

    fn schedule_entry(&self) -> Option<serde_json::Result<ScheduleWindow>> {
        self.document
            .get(SCHEDULE_KEY)
            .filter(|value| !value.is_null())
            .map(ScheduleWindow::deserialize)
    }
}
