use std::{sync::Arc, time::Duration};

use chrono::{Local, NaiveTime, Utc};
use chrono_tz::Tz;
use light_common::{LightCommand, ScheduleWindow, SchedulerConfig, StateUpdate};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{dispatch::Dispatcher, error::Result, store::StateStore};

/// What a single evaluation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Disabled,
    Unchanged,
    TurnedOff,
    Restored,
    /// Left the off-window but there was no usable state to restore.
    Released,
}

struct SchedulerState {
    window: ScheduleWindow,
    /// The light is dark because the scheduler blanked it, not the user.
    turned_off_light: bool,
}

/// Enforces the daily off-window.
///
/// The window and the ownership flag share one lock. Evaluations and manual
/// sends both hold it for their whole transition, so a user command can
/// never slip between the scheduler's check and its write.
#[derive(Clone)]
pub struct Scheduler {
    state: Arc<Mutex<SchedulerState>>,
    dispatcher: Dispatcher,
    store: StateStore,
    config: SchedulerConfig,
    timezone: Option<Tz>,
}

impl Scheduler {
    pub fn new(
        dispatcher: Dispatcher,
        store: StateStore,
        window: ScheduleWindow,
        config: SchedulerConfig,
        timezone: Option<Tz>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState {
                window,
                turned_off_light: false,
            })),
            dispatcher,
            store,
            config,
            timezone,
        }
    }

    pub async fn window(&self) -> ScheduleWindow {
        self.state.lock().await.window
    }

    /// Swaps the active window and persists it under the scheduler lock, so
    /// the running window and the stored one always agree. Disabling the
    /// schedule while the light is blanked hands it back right away.
    pub async fn update_window(&self, window: ScheduleWindow) -> Result<Transition> {
        let mut state = self.state.lock().await;
        state.window = window;
        if let Err(err) = self.store.save(StateUpdate::schedule(window)).await {
            warn!("failed to persist schedule: {err}");
        }

        if window.enabled {
            return Ok(Transition::Unchanged);
        }
        if state.turned_off_light {
            info!("schedule disabled while light is off, restoring light");
            return self.release(&mut state).await;
        }
        Ok(Transition::Disabled)
    }

    pub async fn turned_off_light(&self) -> bool {
        self.state.lock().await.turned_off_light
    }

    /// User command: hands the light back to the user and remembers the
    /// command as the state to restore.
    pub async fn manual_send(&self, command: &LightCommand) -> Result<()> {
        let mut state = self.state.lock().await;
        state.turned_off_light = false;
        self.dispatcher.send(command, true).await
    }

    pub async fn evaluate(&self, now: NaiveTime) -> Result<Transition> {
        let mut state = self.state.lock().await;
        if !state.window.enabled {
            if state.turned_off_light {
                info!("schedule disabled while light is off, restoring light");
                return self.release(&mut state).await;
            }
            return Ok(Transition::Disabled);
        }

        let off_window = state.window.contains(now);
        if off_window && !state.turned_off_light {
            info!(now = %now.format("%H:%M"), "inside off-window, turning light off");
            return self.blank(&mut state).await;
        }
        if !off_window && state.turned_off_light {
            info!(now = %now.format("%H:%M"), "outside off-window, restoring light");
            return self.release(&mut state).await;
        }
        Ok(Transition::Unchanged)
    }

    /// Replays the last user state after the device came up. Inside an active
    /// off-window the light is blanked instead, so a cycle that already ran
    /// is never undone.
    pub async fn restore_on_startup(&self, now: NaiveTime) -> Result<Transition> {
        let mut state = self.state.lock().await;
        if state.window.enabled && state.window.contains(now) {
            if state.turned_off_light {
                return Ok(Transition::Unchanged);
            }
            info!(now = %now.format("%H:%M"), "started inside off-window, keeping light off");
            return self.blank(&mut state).await;
        }
        self.release(&mut state).await
    }

    /// The flag is set only once the off frame reached the device.
    async fn blank(&self, state: &mut SchedulerState) -> Result<Transition> {
        self.dispatcher.send(&LightCommand::off(), false).await?;
        state.turned_off_light = true;
        Ok(Transition::TurnedOff)
    }

    async fn release(&self, state: &mut SchedulerState) -> Result<Transition> {
        state.turned_off_light = false;

        let persisted = self.store.load().await;
        match persisted.restorable_light() {
            Some(command) => {
                self.dispatcher.send(&command, false).await?;
                Ok(Transition::Restored)
            }
            None => {
                if persisted.light_state().is_some() {
                    warn!("stored light state is not a usable command, skipping restore");
                }
                Ok(Transition::Released)
            }
        }
    }

    pub fn now(&self) -> NaiveTime {
        match self.timezone {
            Some(tz) => Utc::now().with_timezone(&tz).time(),
            None => Local::now().time(),
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Polls until `shutdown` flips to true or its sender goes away.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler started");
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        let idle = Duration::from_millis(self.config.disabled_interval_ms);

        while !*shutdown.borrow() {
            let wait = match self.evaluate(self.now()).await {
                Ok(Transition::Disabled) => idle,
                Ok(transition) => {
                    debug!(?transition, "schedule evaluated");
                    poll
                }
                Err(err) => {
                    warn!("schedule cycle failed: {err}");
                    poll
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("scheduler stopped");
    }
}

pub fn parse_timezone(name: Option<&str>) -> Option<Tz> {
    let name = name?.trim();
    match name.parse::<Tz>() {
        Ok(tz) => Some(tz),
        Err(err) => {
            warn!("unknown timezone '{name}', using local time: {err}");
            None
        }
    }
}
