//! Purpose: Execute HTTP calls for the harness and hand back raw status + body.
//! Exports: `Transport`, `Method`, `RawResponse`, `HttpTransport`, `LocalTransport`.
//! Role: Boundary between the engine and the network; auth and base URL live here only.
//! Invariants: Non-2xx statuses are observations returned as `Ok`, never errors.
//! Invariants: Network failures map to `ErrorKind::Transport` and are never retried.
//! Invariants: Each call owns its own request and response buffers.
#![allow(clippy::result_large_err)]

use super::config::TargetConfig;
use super::reference::ReferenceApi;
use crate::core::error::{Error, ErrorKind};
use std::fmt;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Put,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Put => "PUT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub trait Transport {
    /// Sends `body` verbatim as JSON (when present) and returns whatever the server answered.
    fn send(&self, method: Method, path: &str, body: Option<&str>) -> ApiResult<RawResponse>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, method: Method, path: &str, body: Option<&str>) -> ApiResult<RawResponse> {
        (**self).send(method, path, body)
    }
}

#[derive(Clone)]
pub struct HttpTransport {
    inner: Arc<HttpTransportInner>,
}

struct HttpTransportInner {
    base_url: Url,
    token: Option<String>,
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(config: &TargetConfig) -> Self {
        Self {
            inner: Arc::new(HttpTransportInner {
                base_url: config.base_url.clone(),
                token: config.token.clone(),
                agent: build_agent(config.timeout),
            }),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.token = Some(token.into());
        } else {
            self.inner = Arc::new(HttpTransportInner {
                base_url: self.inner.base_url.clone(),
                token: Some(token.into()),
                agent: self.inner.agent.clone(),
            });
        }
        self
    }

    fn url(&self, path: &str) -> ApiResult<Url> {
        self.inner.base_url.join(path).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid request path: {path}"))
                .with_source(err)
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, method: Method, path: &str, body: Option<&str>) -> ApiResult<RawResponse> {
        let url = self.url(path)?;
        let mut request = self
            .inner
            .agent
            .request(method.as_str(), url.as_str())
            .set("Accept", "application/json");
        if let Some(token) = &self.inner.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        tracing::debug!(%method, %url, has_body = body.is_some(), "sending request");
        let response = match body {
            Some(body) => request
                .set("Content-Type", "application/json")
                .send_string(body),
            None => request.call(),
        };

        match response {
            Ok(resp) => read_raw_response(resp),
            Err(ureq::Error::Status(_, resp)) => read_raw_response(resp),
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Transport)
                .with_message(format!("{method} {url} failed"))
                .with_source(err)),
        }
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new().timeout(timeout).build()
}

fn read_raw_response(response: ureq::Response) -> ApiResult<RawResponse> {
    let status = response.status();
    let mut body = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut body)
        .map_err(|err| {
            Error::new(ErrorKind::Transport)
                .with_message("failed to read response body")
                .with_status(status)
                .with_source(err)
        })?;
    tracing::debug!(status, body_len = body.len(), "received response");
    Ok(RawResponse { status, body })
}

/// In-process transport that answers from a `ReferenceApi` without a socket.
#[derive(Clone)]
pub struct LocalTransport {
    api: Arc<ReferenceApi>,
    token: Option<String>,
}

impl LocalTransport {
    pub fn new(api: Arc<ReferenceApi>) -> Self {
        Self { api, token: None }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl Transport for LocalTransport {
    fn send(&self, method: Method, path: &str, body: Option<&str>) -> ApiResult<RawResponse> {
        let authorization = self.token.as_ref().map(|token| format!("Bearer {token}"));
        Ok(self.api.handle(
            method,
            path,
            authorization.as_deref(),
            body.map(str::as_bytes),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::{HttpTransport, LocalTransport, Method, Transport};
    use crate::api::config::TargetConfig;
    use crate::api::reference::ReferenceApi;
    use crate::core::error::ErrorKind;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn http_transport_joins_paths_onto_base() {
        let config = TargetConfig::new("http://localhost:8080").expect("config");
        let transport = HttpTransport::new(&config);
        let url = transport.url("/public/v1/users/7").expect("url");
        assert_eq!(url.as_str(), "http://localhost:8080/public/v1/users/7");
    }

    #[test]
    fn http_transport_failure_is_transport_error() {
        // Port 9 (discard) on loopback is closed in test environments.
        let config = TargetConfig::new("http://127.0.0.1:9")
            .expect("config")
            .with_timeout(Duration::from_millis(500));
        let err = HttpTransport::new(&config)
            .send(Method::Get, "/healthz", None)
            .expect_err("connection refused");
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn local_transport_returns_status_codes_as_observations() {
        let api = Arc::new(ReferenceApi::new(Some("secret".to_string())));
        let transport = LocalTransport::new(api).with_token("secret");
        let response = transport
            .send(Method::Get, "/public/v1/users/1", None)
            .expect("response");
        assert_eq!(response.status, 404);
        assert!(response.body_text().contains("Resource not found"));
    }
}
