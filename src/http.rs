//! HTTP remote-control surface: a thin `axum` facade over the IR command
//! service. No authentication, no persistence. This is a LAN convenience
//! UI, not a hardened remote API.

use crate::error::Error;
use crate::hardware::gpio::IrOutputLine;
use crate::ir_service::IrCommandService;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

struct AppState<L: IrOutputLine + 'static> {
    ir: Arc<IrCommandService<L>>,
}

// Manual impl: `#[derive(Clone)]` would add an unneeded `L: Clone` bound,
// since the derive doesn't know `Arc<T>` is `Clone` regardless of `T`.
impl<L: IrOutputLine + 'static> Clone for AppState<L> {
    fn clone(&self) -> Self {
        Self {
            ir: self.ir.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendCommandRequest {
    command: String,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl StatusResponse {
    fn ok() -> Self {
        Self {
            status: "ok",
            message: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: Some(message.into()),
        }
    }
}

/// Build the router. Kept separate from [`serve`] so tests can drive it
/// in-process with `axum`'s `Router::oneshot` without binding a port.
pub fn router<L: IrOutputLine + 'static>(ir: Arc<IrCommandService<L>>) -> Router {
    Router::new()
        .route("/", get(index::<L>))
        .route("/send_command", post(send_command::<L>))
        .with_state(AppState { ir })
}

pub async fn serve<L: IrOutputLine + 'static>(
    ir: Arc<IrCommandService<L>>,
    addr: SocketAddr,
) -> std::io::Result<()> {
    let app = router(ir);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "http remote listening");
    axum::serve(listener, app).await
}

async fn index<L: IrOutputLine + 'static>(State(state): State<AppState<L>>) -> Html<String> {
    let mut commands = state.ir.list_commands();
    commands.sort();

    let buttons: String = commands
        .iter()
        .map(|name| {
            format!(
                "<li><button onclick=\"sendCommand('{name}')\">{name}</button></li>",
                name = name
            )
        })
        .collect();

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>SmartMirror Remote</title></head>
<body>
<h1>SmartMirror Remote</h1>
<ul>{buttons}</ul>
<script>
function sendCommand(name) {{
    fetch('/send_command', {{
        method: 'POST',
        headers: {{ 'Content-Type': 'application/json' }},
        body: JSON.stringify({{ command: name }}),
    }});
}}
</script>
</body>
</html>"#
    ))
}

async fn send_command<L: IrOutputLine + 'static>(
    State(state): State<AppState<L>>,
    Json(request): Json<SendCommandRequest>,
) -> Response {
    match state.ir.send_command(&request.command).await {
        Ok(()) => (StatusCode::OK, Json(StatusResponse::ok())).into_response(),
        Err(e @ Error::UnknownCommand(_)) => {
            (StatusCode::BAD_REQUEST, Json(StatusResponse::error(e.to_string()))).into_response()
        }
        Err(e) => {
            error!(error = %e, command = %request.command, "send_command failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatusResponse::error(e.to_string())),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::gpio::dummy::DummyIrLine;
    use crate::hardware::ir::IrEmitter;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use smartmirror_proto::IrTiming;
    use std::collections::BTreeMap;
    use tower::ServiceExt;

    fn service() -> Arc<IrCommandService<DummyIrLine>> {
        let line = Arc::new(DummyIrLine::default());
        let emitter = IrEmitter::new(line, IrTiming::SAMSUNG);
        let mut commands = BTreeMap::new();
        commands.insert("power".to_string(), 0x0002);
        let service = IrCommandService::new(emitter, smartmirror_proto::PREFIX_SAMSUNG, commands);
        service.start();
        Arc::new(service)
    }

    #[tokio::test]
    async fn index_lists_configured_commands() {
        let app = router(service());
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("power"));
    }

    #[tokio::test]
    async fn send_command_success_returns_200_ok() {
        let app = router(service());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/send_command")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"command":"power"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_command_returns_400() {
        let app = router(service());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/send_command")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"command":"nonexistent"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn not_running_returns_500() {
        let line = Arc::new(DummyIrLine::default());
        let emitter = IrEmitter::new(line, IrTiming::SAMSUNG);
        let mut commands = BTreeMap::new();
        commands.insert("power".to_string(), 0x0002);
        let service = Arc::new(IrCommandService::new(
            emitter,
            smartmirror_proto::PREFIX_SAMSUNG,
            commands,
        ));
        // deliberately not started

        let app = router(service);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/send_command")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"command":"power"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
