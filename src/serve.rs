//! Purpose: Serve the in-memory reference users API over HTTP.
//! Exports: `ServeConfig`, `serve`, `init_tracing`.
//! Role: Axum front for `ReferenceApi`; gives scenarios a real endpoint to run against.
//! Invariants: Response bodies are produced by `ReferenceApi` and forwarded untouched.
//! Invariants: Loopback-only unless explicitly allowed.

use axum::Router;
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Path as AxumPath, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use bytes::Bytes;
use serde_json::json;
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use user_contract::api::{ApiVersion, Error, ErrorKind, RawResponse, ReferenceApi};

const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub token: Option<String>,
    pub allow_non_loopback: bool,
}

#[derive(Clone)]
struct AppState {
    api: Arc<ReferenceApi>,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    init_tracing("info");

    let state = Arc::new(AppState {
        api: Arc::new(ReferenceApi::new(config.token.clone())),
    });

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/public/:version/users", post(create_user))
        .route(
            "/public/:version/users/:id",
            get(get_user).patch(update_user).put(update_user),
        )
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;
    tracing::info!(
        bind = %config.bind,
        auth = config.token.is_some(),
        "reference users api listening"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(server_failed)?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(server_failed)?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

/// Installs the stderr subscriber; `RUST_LOG` overrides `default_directive`.
pub fn init_tracing(default_directive: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn server_failed(err: std::io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("server failed")
        .with_source(err)
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }
    if config.token.as_deref() == Some("") {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--token must not be empty")
            .with_hint("Omit --token to accept unauthenticated writes."));
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

async fn healthz() -> Response {
    axum::Json(json!({ "ok": true })).into_response()
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    AxumPath(version): AxumPath<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(version) = ApiVersion::from_label(&version) else {
        return not_found().await;
    };
    raw_response(state.api.create(version, authorization(&headers), &body))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    AxumPath((version, id)): AxumPath<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (Some(version), Ok(id)) = (ApiVersion::from_label(&version), id.parse::<u64>()) else {
        return not_found().await;
    };
    raw_response(state.api.update(version, id, authorization(&headers), &body))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    AxumPath((version, id)): AxumPath<(String, String)>,
) -> Response {
    let (Some(version), Ok(id)) = (ApiVersion::from_label(&version), id.parse::<u64>()) else {
        return not_found().await;
    };
    raw_response(state.api.get(version, id))
}

async fn not_found() -> Response {
    let body = json!({ "meta": null, "data": { "message": "Resource not found" } });
    raw_response(RawResponse::new(404, body.to_string()))
}

fn raw_response(raw: RawResponse) -> Response {
    let status = StatusCode::from_u16(raw.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, Body::from(raw.body)).into_response();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

#[cfg(test)]
mod tests {
    use super::{ServeConfig, raw_response, serve, validate_config};
    use axum::http::StatusCode;
    use user_contract::api::{ErrorKind, RawResponse};

    #[tokio::test]
    async fn serve_rejects_non_loopback_bind() {
        let config = ServeConfig {
            bind: "0.0.0.0:0".parse().expect("bind"),
            token: None,
            allow_non_loopback: false,
        };
        let err = serve(config).await.expect_err("non-loopback");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn empty_token_is_rejected() {
        let config = ServeConfig {
            bind: "127.0.0.1:0".parse().expect("bind"),
            token: Some(String::new()),
            allow_non_loopback: false,
        };
        let err = validate_config(&config).expect_err("empty token");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn raw_responses_keep_status_and_json_content_type() {
        let response = raw_response(RawResponse::new(422, "[]"));
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            response.headers().get("content-type").map(|value| value.as_bytes()),
            Some(&b"application/json"[..])
        );
    }
}
