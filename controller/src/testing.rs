//! In-memory device and scratch paths shared by the unit tests.

use std::{
    io::{self, Write},
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use serde_json::Value;

use crate::{
    device::{DeviceLink, PortOpener},
    error::{ControllerError, Result},
};

#[derive(Clone, Default)]
pub struct MockOpener {
    written: Arc<Mutex<Vec<u8>>>,
    opened: Arc<Mutex<Vec<String>>>,
    rejected: Vec<String>,
}

struct MockLink {
    written: Arc<Mutex<Vec<u8>>>,
}

impl Write for MockLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl MockOpener {
    pub fn rejecting(mut self, port: &str) -> Self {
        self.rejected.push(port.to_string());
        self
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    /// Every record written so far, decoded as JSON.
    pub fn lines(&self) -> Vec<Value> {
        self.written()
            .split(|byte| *byte == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_slice(line).unwrap())
            .collect()
    }

    pub fn clear(&self) {
        self.written.lock().unwrap().clear();
    }
}

impl PortOpener for MockOpener {
    fn open(&self, port: &str, _baud_rate: u32, _timeout: Duration) -> Result<DeviceLink> {
        if self.rejected.iter().any(|rejected| rejected == port) {
            return Err(ControllerError::Connection {
                port: port.to_string(),
                reason: "No such file or directory".to_string(),
            });
        }
        self.opened.lock().unwrap().push(port.to_string());
        Ok(Box::new(MockLink {
            written: self.written.clone(),
        }))
    }

    fn available_ports(&self) -> io::Result<Vec<String>> {
        Ok(vec!["/dev/ttyMOCK0".to_string()])
    }
}

/// Unique state file path under the system temp dir. The file itself is not
/// created.
pub fn scratch_state_file(tag: &str) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let unique = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir()
        .join(format!(
            "light-controller-{tag}-{}-{unique}",
            std::process::id()
        ))
        .join("last_state.json")
}
