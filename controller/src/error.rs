use light_common::ScheduleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("no serial port given")]
    MissingPort,

    #[error("failed to open {port}: {reason}")]
    Connection { port: String, reason: String },

    #[error("serial port is not connected")]
    NotConnected,

    #[error("serial write failed: {0}")]
    Write(#[from] std::io::Error),

    #[error("failed to encode light command: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

impl ControllerError {
    /// Errors caused by the caller's input rather than the device.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::MissingPort | Self::Schedule(_))
    }
}

/// State file failures. Persistence is best-effort, so these are logged by
/// callers and never fail the operation that triggered them.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("state file i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T, E = ControllerError> = std::result::Result<T, E>;
