use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use chrono_tz::Tz;
use light_common::{ControllerConfig, ScheduleWindow};
use tokio::{net::TcpListener, sync::watch};
use tower_http::services::ServeDir;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    api,
    device::{DeviceManager, PortOpener, SerialPortOpener},
    dispatch::Dispatcher,
    scheduler::{parse_timezone, Scheduler},
    store::StateStore,
};

/// Shared context handed to every handler and to the scheduler task.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ControllerConfig>,
    pub device: DeviceManager,
    pub store: StateStore,
    pub scheduler: Scheduler,
}

impl AppState {
    pub fn new(
        config: ControllerConfig,
        opener: Arc<dyn PortOpener>,
        window: ScheduleWindow,
        timezone: Option<Tz>,
    ) -> Self {
        let device = DeviceManager::new(opener, config.baud_rate, config.device.clone());
        let store = StateStore::new(config.state_file());
        let dispatcher = Dispatcher::new(device.clone(), store.clone());
        let scheduler = Scheduler::new(
            dispatcher,
            store.clone(),
            window,
            config.scheduler.clone(),
            timezone,
        );

        Self {
            config: Arc::new(config),
            device,
            store,
            scheduler,
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("light_controller=info")),
        )
        .init();

    let config = config_from_env();
    let timezone = parse_timezone(config.timezone.as_deref());

    let persisted = StateStore::new(config.state_file()).load().await;
    let window = persisted.schedule().unwrap_or_default();
    info!(
        start = %window.start_time,
        end = %window.end_time,
        enabled = window.enabled,
        "loaded schedule"
    );

    let state = AppState::new(config, Arc::new(SerialPortOpener), window, timezone);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = state.scheduler.clone().spawn(shutdown_rx);

    connect_and_restore(&state).await;

    let app = api::router(state.clone()).fallback_service(ServeDir::new(&state.config.web_root));
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind light controller at {addr}"))?;

    info!("light controller listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    info!("shutting down");
    let _ = shutdown_tx.send(true);
    if let Err(err) = scheduler_task.await {
        warn!("scheduler task ended abnormally: {err}");
    }
    if let Err(err) = state.device.disconnect().await {
        warn!("failed to close serial device: {err}");
    }
    Ok(())
}

/// Opens the default port and replays the last user state, without
/// rewriting it. The replay goes through the scheduler so it cannot race a
/// cycle that is already running.
async fn connect_and_restore(state: &AppState) {
    let port = state.config.default_com_port.clone();
    info!(port = %port, "connecting to default serial port");

    if let Err(err) = state.device.connect(&port).await {
        warn!("auto-connect failed: {err}");
        return;
    }

    let scheduler = &state.scheduler;
    match scheduler.restore_on_startup(scheduler.now()).await {
        Ok(transition) => info!(?transition, "startup light state applied"),
        Err(err) => warn!("failed to restore last light state: {err}"),
    }
}

pub fn config_from_env() -> ControllerConfig {
    let mut config = ControllerConfig::default();

    if let Ok(port) = std::env::var("COM_PORT") {
        config.default_com_port = port;
    }
    if let Some(port) = env_parse::<u16>("LIGHT_HTTP_PORT") {
        config.http_port = port;
    }
    if let Some(baud_rate) = env_parse::<u32>("LIGHT_BAUD_RATE") {
        config.baud_rate = baud_rate;
    }
    if let Ok(dir) = std::env::var("LIGHT_DATA_DIR") {
        config.data_dir = PathBuf::from(dir);
    }
    if let Ok(dir) = std::env::var("LIGHT_WEB_ROOT") {
        config.web_root = PathBuf::from(dir);
    }
    if let Ok(zone) = std::env::var("LIGHT_TIMEZONE") {
        config.timezone = Some(zone);
    }

    config.sanitize();
    config
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring invalid {name}={raw}");
            None
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
