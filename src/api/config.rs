//! Purpose: Resolve the API target (base URL, bearer token, timeout) from flags and env.
//! Exports: `TargetConfig`, env var names, `DEFAULT_TIMEOUT`.
//! Role: Only configuration surface of the harness; transports are built from it.
//! Invariants: Base URLs are http(s) with no path; they are normalized to `/`.
//! Invariants: Explicit values win over environment values.
use super::transport::HttpTransport;
use crate::core::error::{Error, ErrorKind};
use std::time::Duration;
use url::Url;

pub const BASE_URL_ENV: &str = "USER_CONTRACT_BASE_URL";
pub const TOKEN_ENV: &str = "USER_CONTRACT_TOKEN";
pub const TIMEOUT_ENV: &str = "USER_CONTRACT_TIMEOUT_MS";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct TargetConfig {
    pub base_url: Url,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl TargetConfig {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, Error> {
        Ok(Self {
            base_url: normalize_base_url(base_url.as_ref())?,
            token: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = if token.is_empty() { None } else { Some(token) };
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Explicit values first, then `lookup` (normally the process environment).
    pub fn resolve<F>(
        base_url: Option<String>,
        token: Option<String>,
        timeout_ms: Option<u64>,
        lookup: F,
    ) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = base_url.or_else(|| lookup(BASE_URL_ENV)).ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message("missing API base url")
                .with_hint(format!("Pass --base-url or set {BASE_URL_ENV}."))
        })?;
        let timeout_ms = match timeout_ms {
            Some(value) => Some(value),
            None => lookup(TIMEOUT_ENV)
                .map(|raw| {
                    raw.trim().parse::<u64>().map_err(|err| {
                        Error::new(ErrorKind::Usage)
                            .with_message(format!("invalid {TIMEOUT_ENV}: {raw}"))
                            .with_source(err)
                    })
                })
                .transpose()?,
        };

        let mut config = Self::new(base_url)?;
        if let Some(token) = token.or_else(|| lookup(TOKEN_ENV)) {
            config = config.with_token(token);
        }
        if let Some(timeout_ms) = timeout_ms {
            if timeout_ms == 0 {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("timeout must be greater than zero")
                    .with_hint("Use a positive value like 30000."));
            }
            config = config.with_timeout(Duration::from_millis(timeout_ms));
        }
        Ok(config)
    }

    pub fn transport(&self) -> HttpTransport {
        HttpTransport::new(self)
    }
}

fn normalize_base_url(raw: &str) -> Result<Url, Error> {
    let mut url = Url::parse(raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid API base url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("API base url must use http or https scheme"));
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("API base url must not include a path")
            .with_hint("Endpoint paths such as /public/v1/users are added per request."));
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::{BASE_URL_ENV, DEFAULT_TIMEOUT, TIMEOUT_ENV, TOKEN_ENV, TargetConfig};
    use crate::core::error::ErrorKind;
    use std::collections::HashMap;
    use std::time::Duration;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn base_url_is_normalized() {
        let config = TargetConfig::new("https://gorest.co.in?x=1#frag").expect("config");
        assert_eq!(config.base_url.as_str(), "https://gorest.co.in/");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn base_url_with_path_is_rejected() {
        let err = TargetConfig::new("https://gorest.co.in/public/v1").expect_err("path");
        assert_eq!(err.kind(), ErrorKind::Usage);
        let err = TargetConfig::new("ftp://gorest.co.in").expect_err("scheme");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn flags_win_over_environment() {
        let lookup = env(&[
            (BASE_URL_ENV, "http://env.example"),
            (TOKEN_ENV, "env-token"),
            (TIMEOUT_ENV, "1500"),
        ]);
        let config = TargetConfig::resolve(
            Some("http://flag.example".to_string()),
            Some("flag-token".to_string()),
            None,
            lookup,
        )
        .expect("config");
        assert_eq!(config.base_url.as_str(), "http://flag.example/");
        assert_eq!(config.token.as_deref(), Some("flag-token"));
        assert_eq!(config.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn missing_base_url_is_usage_error() {
        let err = TargetConfig::resolve(None, None, None, env(&[])).expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.hint().unwrap_or_default().contains(BASE_URL_ENV));
    }

    #[test]
    fn zero_or_garbage_timeout_is_rejected() {
        let err = TargetConfig::resolve(
            Some("http://localhost".to_string()),
            None,
            Some(0),
            env(&[]),
        )
        .expect_err("zero");
        assert_eq!(err.kind(), ErrorKind::Usage);

        let err = TargetConfig::resolve(
            Some("http://localhost".to_string()),
            None,
            None,
            env(&[(TIMEOUT_ENV, "soon")]),
        )
        .expect_err("garbage");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn empty_token_means_no_token() {
        let config = TargetConfig::new("http://localhost")
            .expect("config")
            .with_token("");
        assert!(config.token.is_none());
    }
}
