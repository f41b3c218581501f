use std::{
    io::{self, Write},
    sync::Arc,
    time::Duration,
};

use light_common::DeviceTiming;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ControllerError, Result};

/// Byte sink for an open device.
pub type DeviceLink = Box<dyn Write + Send>;

/// Opens the physical transport. Production code talks to a serial port;
/// tests substitute an in-memory device.
pub trait PortOpener: Send + Sync {
    fn open(&self, port: &str, baud_rate: u32, timeout: Duration) -> Result<DeviceLink>;

    fn available_ports(&self) -> io::Result<Vec<String>> {
        Ok(Vec::new())
    }
}

pub struct SerialPortOpener;

struct SerialLink(Box<dyn serialport::SerialPort>);

impl Write for SerialLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl PortOpener for SerialPortOpener {
    fn open(&self, port: &str, baud_rate: u32, timeout: Duration) -> Result<DeviceLink> {
        let handle = serialport::new(port, baud_rate)
            .timeout(timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .open()
            .map_err(|err| ControllerError::Connection {
                port: port.to_string(),
                reason: err.to_string(),
            })?;
        Ok(Box::new(SerialLink(handle)))
    }

    fn available_ports(&self) -> io::Result<Vec<String>> {
        let ports = serialport::available_ports().map_err(io::Error::other)?;
        Ok(ports.into_iter().map(|info| info.port_name).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceStatus {
    pub connected: bool,
    pub port: Option<String>,
}

#[derive(Default)]
struct ConnectionState {
    handle: Option<DeviceLink>,
    port: Option<String>,
}

/// Owns the single device connection. Every operation that touches the
/// handle, including status snapshots, runs under one lock.
#[derive(Clone)]
pub struct DeviceManager {
    opener: Arc<dyn PortOpener>,
    baud_rate: u32,
    timing: DeviceTiming,
    connection: Arc<Mutex<ConnectionState>>,
}

impl DeviceManager {
    pub fn new(opener: Arc<dyn PortOpener>, baud_rate: u32, timing: DeviceTiming) -> Self {
        Self {
            opener,
            baud_rate,
            timing,
            connection: Arc::new(Mutex::new(ConnectionState::default())),
        }
    }

    pub async fn connect(&self, port: &str) -> Result<()> {
        let port = port.trim();
        if port.is_empty() {
            return Err(ControllerError::MissingPort);
        }

        let mut connection = self.connection.lock().await;
        if let Some(previous) = connection.handle.take() {
            close_link(previous, connection.port.as_deref());
            tokio::time::sleep(Duration::from_millis(self.timing.close_settle_ms)).await;
        }
        connection.port = None;

        match self.open_link(port).await {
            Ok(handle) => {
                connection.handle = Some(handle);
                tokio::time::sleep(Duration::from_millis(self.timing.boot_settle_ms)).await;
                connection.port = Some(port.to_string());
                info!(port, baud_rate = self.baud_rate, "serial device connected");
                Ok(())
            }
            Err(err) => {
                *connection = ConnectionState::default();
                warn!("serial connect failed: {err}");
                Err(err)
            }
        }
    }

    pub async fn disconnect(&self) -> Result<()> {
        let mut connection = self.connection.lock().await;
        match connection.handle.take() {
            Some(handle) => {
                close_link(handle, connection.port.as_deref());
                info!(port = ?connection.port, "serial device disconnected");
            }
            None => debug!("disconnect requested with no open device"),
        }
        connection.port = None;
        Ok(())
    }

    pub async fn status(&self) -> DeviceStatus {
        let connection = self.connection.lock().await;
        let connected = connection.handle.is_some();
        DeviceStatus {
            connected,
            port: connected.then(|| connection.port.clone()).flatten(),
        }
    }

    /// Writes one complete record. The lock keeps concurrent records from
    /// interleaving on the wire. The blocking write owns the guard, so a
    /// cancelled caller cannot leave a record half written.
    pub async fn write_line(&self, line: &[u8]) -> Result<()> {
        let mut connection = Arc::clone(&self.connection).lock_owned().await;
        if connection.handle.is_none() {
            return Err(ControllerError::NotConnected);
        }

        let line = line.to_vec();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let handle = connection
                .handle
                .as_mut()
                .ok_or(ControllerError::NotConnected)?;
            handle.write_all(&line)?;
            handle.flush()?;
            Ok(())
        })
        .await
        .map_err(|err| ControllerError::Write(io::Error::other(err)))?
    }

    pub async fn available_ports(&self) -> io::Result<Vec<String>> {
        let opener = Arc::clone(&self.opener);
        tokio::task::spawn_blocking(move || opener.available_ports())
            .await
            .map_err(io::Error::other)?
    }

    /// Opening a serial port can block on the driver, so it runs off the
    /// async workers.
    async fn open_link(&self, port: &str) -> Result<DeviceLink> {
        let opener = Arc::clone(&self.opener);
        let baud_rate = self.baud_rate;
        let timeout = Duration::from_millis(self.timing.io_timeout_ms);
        let owned = port.to_string();

        tokio::task::spawn_blocking(move || opener.open(&owned, baud_rate, timeout))
            .await
            .map_err(|err| ControllerError::Connection {
                port: port.to_string(),
                reason: err.to_string(),
            })?
    }
}

fn close_link(mut link: DeviceLink, port: Option<&str>) {
    if let Err(err) = link.flush() {
        debug!(?port, "flush before close failed: {err}");
    }
    drop(link);
}
