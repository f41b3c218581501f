pub mod config;
pub mod schedule;
pub mod state;
pub mod types;

pub use config::{ControllerConfig, DeviceTiming, SchedulerConfig};
pub use schedule::{ClockTime, ScheduleError, ScheduleWindow};
pub use state::{PersistedState, StateUpdate};
pub use types::{ApiReply, ConfigView, ConnectRequest, LightCommand, PortsView, ScheduleRequest};
