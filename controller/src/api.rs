use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use light_common::{
    ApiReply, ConfigView, ConnectRequest, LightCommand, PortsView, ScheduleRequest,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use crate::{app::AppState, error::ControllerError};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/config", get(handle_get_config))
        .route("/api/schedule", post(handle_set_schedule))
        .route("/api/connect", post(handle_connect))
        .route("/api/disconnect", post(handle_disconnect))
        .route("/api/send", post(handle_send))
        .route("/api/ports", get(handle_get_ports))
        .with_state(state)
}

async fn handle_get_config(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.device.status().await;
    let persisted = state.store.load().await;
    let schedule = match persisted.schedule() {
        Some(schedule) => schedule,
        None => state.scheduler.window().await,
    };

    Json(ConfigView {
        default_com_port: state.config.default_com_port.clone(),
        is_connected: status.connected,
        connected_port: status.port,
        last_light_state: persisted.light_state().cloned(),
        schedule,
    })
}

async fn handle_set_schedule(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match parse_body::<ScheduleRequest>(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let window = match request.into_window() {
        Ok(window) => window,
        Err(err) => return failure(&ControllerError::from(err)),
    };

    if let Err(err) = state.scheduler.update_window(window).await {
        warn!("schedule updated but the light could not be restored: {err}");
    }

    info!(
        start = %window.start_time,
        end = %window.end_time,
        enabled = window.enabled,
        "schedule updated"
    );
    reply(StatusCode::OK, ApiReply::ok("schedule updated"))
}

async fn handle_connect(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match parse_body::<ConnectRequest>(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let port = request.port.unwrap_or_default();

    match state.device.connect(&port).await {
        Ok(()) => reply(
            StatusCode::OK,
            ApiReply::ok(format!("connected to {}", port.trim())),
        ),
        Err(err) => failure(&err),
    }
}

async fn handle_disconnect(State(state): State<AppState>) -> Response {
    match state.device.disconnect().await {
        Ok(()) => reply(StatusCode::OK, ApiReply::ok("disconnected")),
        Err(err) => failure(&err),
    }
}

async fn handle_send(State(state): State<AppState>, body: Bytes) -> Response {
    let value = match parse_body::<Value>(&body) {
        Ok(value) => value,
        Err(response) => return response,
    };
    let Ok(command) = LightCommand::try_from(value) else {
        return reply(
            StatusCode::BAD_REQUEST,
            ApiReply::failed("light command must be a JSON object"),
        );
    };

    match state.scheduler.manual_send(&command).await {
        Ok(()) => reply(StatusCode::OK, ApiReply::ok("OK")),
        Err(err) => failure(&err),
    }
}

async fn handle_get_ports(State(state): State<AppState>) -> Response {
    match state.device.available_ports().await {
        Ok(ports) => Json(PortsView { ports }).into_response(),
        Err(err) => {
            warn!("serial port enumeration failed: {err}");
            reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiReply::failed(format!("failed to list serial ports: {err}")),
            )
        }
    }
}

/// Bodies are parsed regardless of Content-Type, matching what the web UI sends.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|err| {
        reply(
            StatusCode::BAD_REQUEST,
            ApiReply::failed(format!("invalid JSON body: {err}")),
        )
    })
}

fn failure(err: &ControllerError) -> Response {
    let status = if err.is_bad_request() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    reply(status, ApiReply::failed(err.to_string()))
}

fn reply(status: StatusCode, body: ApiReply) -> Response {
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scratch_state_file, MockOpener};
    use axum::{body::Body, http::Request};
    use light_common::{ControllerConfig, DeviceTiming, ScheduleWindow};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app_state(opener: &MockOpener, tag: &str) -> AppState {
        let config = ControllerConfig {
            default_com_port: "/dev/ttyUSB0".to_string(),
            data_dir: scratch_state_file(tag).parent().unwrap().to_path_buf(),
            device: DeviceTiming::immediate(),
            ..ControllerConfig::default()
        };
        AppState::new(config, Arc::new(opener.clone()), ScheduleWindow::default(), None)
    }

    async fn call(state: &AppState, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn config_reports_defaults_before_anything_happens() {
        let state = app_state(&MockOpener::default(), "api-config");

        let (status, body) = call(&state, "GET", "/api/config", "").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "default_com_port": "/dev/ttyUSB0",
                "is_connected": false,
                "connected_port": null,
                "last_light_state": null,
                "schedule": {"start_time": "00:00", "end_time": "08:00", "enabled": true},
            })
        );
    }

    #[tokio::test]
    async fn connect_send_and_read_back() {
        let opener = MockOpener::default();
        let state = app_state(&opener, "api-flow");

        let (status, body) = call(&state, "POST", "/api/connect", r#"{"port":"/dev/ttyACM0"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));

        let command = json!({"mode": "rainbow", "speed": 40});
        let (status, body) = call(&state, "POST", "/api/send", &command.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true, "msg": "OK"}));
        assert_eq!(opener.lines(), vec![command.clone()]);

        let (_, config) = call(&state, "GET", "/api/config", "").await;
        assert_eq!(config["is_connected"], json!(true));
        assert_eq!(config["connected_port"], json!("/dev/ttyACM0"));
        assert_eq!(config["last_light_state"], command);
    }

    #[tokio::test]
    async fn connect_to_bad_port_fails_with_server_error() {
        let opener = MockOpener::default().rejecting("BAD_PORT");
        let state = app_state(&opener, "api-bad-port");

        let (status, body) = call(&state, "POST", "/api/connect", r#"{"port":"BAD_PORT"}"#).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], json!(false));
        let (_, config) = call(&state, "GET", "/api/config", "").await;
        assert_eq!(config["is_connected"], json!(false));
        assert_eq!(config["connected_port"], Value::Null);
    }

    #[tokio::test]
    async fn connect_without_port_is_a_bad_request() {
        let state = app_state(&MockOpener::default(), "api-no-port");
        let (status, body) = call(&state, "POST", "/api/connect", "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn send_while_disconnected_fails_and_saves_nothing() {
        let state = app_state(&MockOpener::default(), "api-offline");

        let (status, body) = call(&state, "POST", "/api/send", r#"{"mode":"static"}"#).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], json!(false));
        assert!(state.store.load().await.is_empty());
    }

    #[tokio::test]
    async fn send_rejects_non_object_bodies() {
        let state = app_state(&MockOpener::default(), "api-shape");

        let (status, _) = call(&state, "POST", "/api/send", "[1,2]").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&state, "POST", "/api/send", "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn schedule_update_is_applied_and_persisted() {
        let state = app_state(&MockOpener::default(), "api-schedule");

        let (status, body) = call(
            &state,
            "POST",
            "/api/schedule",
            r#"{"start_time":"22:00","end_time":"06:00"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        let expected = ScheduleWindow::new("22:00".parse().unwrap(), "06:00".parse().unwrap());
        assert_eq!(state.scheduler.window().await, expected);
        assert_eq!(state.store.load().await.schedule(), Some(expected));
    }

    #[tokio::test]
    async fn schedule_with_invalid_time_is_rejected() {
        let state = app_state(&MockOpener::default(), "api-bad-schedule");

        let (status, body) = call(
            &state,
            "POST",
            "/api/schedule",
            r#"{"start_time":"25:61","end_time":"06:00"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
        assert_eq!(state.scheduler.window().await, ScheduleWindow::default());
    }

    #[tokio::test]
    async fn manual_send_takes_the_light_back_from_the_scheduler() {
        let opener = MockOpener::default();
        let state = app_state(&opener, "api-override");
        state.device.connect("/dev/ttyUSB0").await.unwrap();
        state
            .scheduler
            .evaluate(chrono::NaiveTime::from_hms_opt(1, 0, 0).unwrap())
            .await
            .unwrap();
        assert!(state.scheduler.turned_off_light().await);

        let (status, _) = call(&state, "POST", "/api/send", r##"{"mode":"static","color":"#ffffff"}"##).await;

        assert_eq!(status, StatusCode::OK);
        assert!(!state.scheduler.turned_off_light().await);
    }

    #[tokio::test]
    async fn disabling_the_schedule_brings_the_light_back() {
        let opener = MockOpener::default();
        let state = app_state(&opener, "api-disable");
        state.device.connect("/dev/ttyUSB0").await.unwrap();
        let (status, _) = call(&state, "POST", "/api/send", r##"{"mode":"static","color":"#0000ff"}"##).await;
        assert_eq!(status, StatusCode::OK);
        state
            .scheduler
            .evaluate(chrono::NaiveTime::from_hms_opt(1, 0, 0).unwrap())
            .await
            .unwrap();
        opener.clear();

        let (status, _) = call(
            &state,
            "POST",
            "/api/schedule",
            r#"{"start_time":"00:00","end_time":"08:00","enabled":false}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(!state.scheduler.turned_off_light().await);
        assert_eq!(
            opener.lines(),
            vec![json!({"mode": "static", "color": "#0000ff"})]
        );
        let (_, config) = call(&state, "GET", "/api/config", "").await;
        assert_eq!(config["schedule"]["enabled"], json!(false));
    }

    #[tokio::test]
    async fn disconnect_reports_success_even_when_idle() {
        let state = app_state(&MockOpener::default(), "api-disconnect");
        let (status, body) = call(&state, "POST", "/api/disconnect", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true, "msg": "disconnected"}));
    }

    #[tokio::test]
    async fn lists_serial_ports() {
        let state = app_state(&MockOpener::default(), "api-ports");
        let (status, body) = call(&state, "GET", "/api/ports", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ports": ["/dev/ttyMOCK0"]}));
    }
}
