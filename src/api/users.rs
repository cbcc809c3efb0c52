//! Purpose: Endpoint helpers for the users resource across API versions.
//! Exports: `ApiVersion`, `UsersApi`.
//! Role: Maps create/update/get onto transport calls; returns raw responses unjudged.
//! Invariants: v1 lives under `/public/v1/users` and wraps bodies; v2 is bare.
use super::transport::{Method, RawResponse, Transport};
use crate::core::envelope::Wrapping;
use crate::core::error::Error;
use crate::core::request::UserPayload;
use crate::core::verdict::Compare;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    #[default]
    V1,
    V2,
}

impl ApiVersion {
    pub fn label(self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1",
            ApiVersion::V2 => "v2",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "v1" => Some(ApiVersion::V1),
            "v2" => Some(ApiVersion::V2),
            _ => None,
        }
    }

    pub fn users_path(self) -> &'static str {
        match self {
            ApiVersion::V1 => "/public/v1/users",
            ApiVersion::V2 => "/public/v2/users",
        }
    }

    pub fn wrapping(self) -> Wrapping {
        match self {
            ApiVersion::V1 => Wrapping::Enveloped,
            ApiVersion::V2 => Wrapping::Bare,
        }
    }

    /// v2 defines attribute equality case-insensitively.
    pub fn compare(self) -> Compare {
        match self {
            ApiVersion::V1 => Compare::Exact,
            ApiVersion::V2 => Compare::IgnoreCase,
        }
    }
}

pub struct UsersApi<'a, T: Transport + ?Sized> {
    transport: &'a T,
    version: ApiVersion,
}

impl<'a, T: Transport + ?Sized> UsersApi<'a, T> {
    pub fn new(transport: &'a T, version: ApiVersion) -> Self {
        Self { transport, version }
    }

    pub fn create_user(&self, payload: &UserPayload) -> Result<RawResponse, Error> {
        let body = payload.to_json()?;
        self.transport
            .send(Method::Post, self.version.users_path(), Some(&body))
    }

    pub fn update_user(&self, id: u64, payload: &UserPayload) -> Result<RawResponse, Error> {
        let body = payload.to_json()?;
        self.update_user_raw(id, &body)
    }

    /// Sends `body` unmodified, so callers can exercise malformed JSON.
    pub fn update_user_raw(&self, id: u64, body: &str) -> Result<RawResponse, Error> {
        self.transport
            .send(Method::Patch, &self.user_path(id), Some(body))
    }

    pub fn get_user(&self, id: u64) -> Result<RawResponse, Error> {
        self.transport.send(Method::Get, &self.user_path(id), None)
    }

    fn user_path(&self, id: u64) -> String {
        format!("{}/{id}", self.version.users_path())
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiVersion, UsersApi};
    use crate::api::transport::{Method, RawResponse, Transport};
    use crate::core::attributes::AttributeMap;
    use crate::core::error::Error;
    use crate::core::request::build;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<(Method, String, Option<String>)>>,
    }

    impl Transport for Recorder {
        fn send(
            &self,
            method: Method,
            path: &str,
            body: Option<&str>,
        ) -> Result<RawResponse, Error> {
            self.calls
                .borrow_mut()
                .push((method, path.to_string(), body.map(str::to_string)));
            Ok(RawResponse::new(200, "{}"))
        }
    }

    #[test]
    fn requests_use_version_paths_and_sparse_bodies() {
        let recorder = Recorder::default();
        let v1 = UsersApi::new(&recorder, ApiVersion::V1);
        let v2 = UsersApi::new(&recorder, ApiVersion::V2);

        v1.create_user(&build(&AttributeMap::from([("name", "Ada Lovelace")])))
            .expect("create");
        v1.update_user(7, &build(&AttributeMap::from([("status", "active")])))
            .expect("update");
        v2.get_user(9).expect("get");

        let calls = recorder.calls.borrow();
        assert_eq!(
            calls[0],
            (
                Method::Post,
                "/public/v1/users".to_string(),
                Some(r#"{"name":"Ada Lovelace"}"#.to_string())
            )
        );
        assert_eq!(
            calls[1],
            (
                Method::Patch,
                "/public/v1/users/7".to_string(),
                Some(r#"{"status":"active"}"#.to_string())
            )
        );
        assert_eq!(calls[2], (Method::Get, "/public/v2/users/9".to_string(), None));
    }

    #[test]
    fn version_labels_round_trip() {
        for version in [ApiVersion::V1, ApiVersion::V2] {
            assert_eq!(ApiVersion::from_label(version.label()), Some(version));
        }
        assert_eq!(ApiVersion::from_label("v3"), None);
    }
}
