use light_common::{LightCommand, StateUpdate};
use tracing::{debug, warn};

use crate::{device::DeviceManager, error::Result, store::StateStore};

/// Writes light commands to the device and, for user commands, remembers
/// them as the state to come back to.
#[derive(Clone)]
pub struct Dispatcher {
    device: DeviceManager,
    store: StateStore,
}

impl Dispatcher {
    pub fn new(device: DeviceManager, store: StateStore) -> Self {
        Self { device, store }
    }

    /// The store is only touched after the device accepted the command.
    pub async fn send(&self, command: &LightCommand, persist: bool) -> Result<()> {
        let line = command.to_wire()?;
        if let Err(err) = self.device.write_line(&line).await {
            warn!("light command not sent: {err}");
            return Err(err);
        }
        debug!(persist, bytes = line.len(), "light command written");

        if persist {
            if let Err(err) = self
                .store
                .save(StateUpdate::light_state(command.clone()))
                .await
            {
                warn!("failed to persist light state: {err}");
            }
        }
        Ok(())
    }
}
