//! Purpose: In-memory reference implementation of the users API wire contract.
//! Exports: `ReferenceApi`, message constants.
//! Role: Backs `user-contract serve` and `LocalTransport`; lets the suite run offline.
//! Invariants: v1 responses are `{meta, data}` envelopes; v2 responses are bare bodies.
//! Invariants: Validation order is email, name, gender, status; all failures are reported.
//! Invariants: Writes require `Bearer <token>` when a token is configured.
use super::transport::{Method, RawResponse};
use super::users::ApiVersion;
use crate::core::envelope::{FieldError, User};
use crate::core::request::UserPayload;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

pub const BLANK: &str = "can't be blank";
pub const GENDER_BLANK: &str = "can't be blank, can be male of female";
pub const INVALID: &str = "is invalid";
pub const TAKEN: &str = "has already been taken";

const FIRST_ID: u64 = 7_000_000;
const GENDERS: [&str; 2] = ["male", "female"];
const STATUSES: [&str; 2] = ["active", "inactive"];

pub struct ReferenceApi {
    token: Option<String>,
    state: Mutex<StoreState>,
}

struct StoreState {
    next_id: u64,
    users: BTreeMap<u64, User>,
}

struct Route {
    version: ApiVersion,
    id: Option<u64>,
}

impl ReferenceApi {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token,
            state: Mutex::new(StoreState {
                next_id: FIRST_ID,
                users: BTreeMap::new(),
            }),
        }
    }

    pub fn handle(
        &self,
        method: Method,
        path: &str,
        authorization: Option<&str>,
        body: Option<&[u8]>,
    ) -> RawResponse {
        let Some(route) = parse_route(path) else {
            return message_response(ApiVersion::V1, 404, "Resource not found");
        };
        let body = body.unwrap_or(b"{}");
        match (method, route.id) {
            (Method::Post, None) => self.create(route.version, authorization, body),
            (Method::Patch | Method::Put, Some(id)) => {
                self.update(route.version, id, authorization, body)
            }
            (Method::Get, Some(id)) => self.get(route.version, id),
            _ => message_response(route.version, 404, "Resource not found"),
        }
    }

    pub fn create(
        &self,
        version: ApiVersion,
        authorization: Option<&str>,
        body: &[u8],
    ) -> RawResponse {
        if let Some(response) = self.authorize(version, authorization) {
            return response;
        }
        let payload = match parse_payload(body) {
            Ok(payload) => payload,
            Err(response) => return response_for(version, response),
        };

        let mut state = self.lock();
        let errors = validate(&payload, None, &state.users);
        if !errors.is_empty() {
            tracing::debug!(errors = errors.len(), "reference create rejected");
            return errors_response(version, &errors);
        }
        let id = state.next_id;
        state.next_id += 1;
        let mut user = User {
            id: Some(id),
            ..User::default()
        };
        apply(&mut user, payload);
        state.users.insert(id, user.clone());
        tracing::debug!(id, "reference user created");
        user_response(version, 201, &user)
    }

    pub fn update(
        &self,
        version: ApiVersion,
        id: u64,
        authorization: Option<&str>,
        body: &[u8],
    ) -> RawResponse {
        if let Some(response) = self.authorize(version, authorization) {
            return response;
        }
        let mut state = self.lock();
        if !state.users.contains_key(&id) {
            return message_response(version, 404, "Resource not found");
        }
        let payload = match parse_payload(body) {
            Ok(payload) => payload,
            Err(response) => return response_for(version, response),
        };
        let errors = validate(&payload, Some(id), &state.users);
        if !errors.is_empty() {
            return errors_response(version, &errors);
        }
        let Some(user) = state.users.get_mut(&id) else {
            return message_response(version, 404, "Resource not found");
        };
        apply(user, payload);
        let user = user.clone();
        user_response(version, 200, &user)
    }

    pub fn get(&self, version: ApiVersion, id: u64) -> RawResponse {
        match self.lock().users.get(&id) {
            Some(user) => user_response(version, 200, user),
            None => message_response(version, 404, "Resource not found"),
        }
    }

    fn authorize(&self, version: ApiVersion, authorization: Option<&str>) -> Option<RawResponse> {
        let token = self.token.as_ref()?;
        let expected = format!("Bearer {token}");
        if authorization == Some(expected.as_str()) {
            return None;
        }
        Some(message_response(version, 401, "Authentication failed"))
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

fn parse_route(path: &str) -> Option<Route> {
    let path = path.split('?').next().unwrap_or_default();
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    let (version, id) = match segments.as_slice() {
        ["public", version, "users"] => (*version, None),
        ["public", version, "users", id] => (*version, Some(id.parse::<u64>().ok()?)),
        _ => return None,
    };
    Some(Route {
        version: ApiVersion::from_label(version)?,
        id,
    })
}

fn parse_payload(body: &[u8]) -> Result<UserPayload, (u16, &'static str)> {
    let value: Value =
        serde_json::from_slice(body).map_err(|_| (400, "Problems parsing JSON"))?;
    if !value.is_object() {
        return Err((400, "Body should be a JSON object"));
    }
    serde_json::from_value(value).map_err(|_| (400, "Body attributes must be strings"))
}

fn validate(
    payload: &UserPayload,
    updating: Option<u64>,
    users: &BTreeMap<u64, User>,
) -> Vec<FieldError> {
    let creating = updating.is_none();
    let mut errors = Vec::new();

    match payload.email.as_deref() {
        None if creating => errors.push(FieldError::new("email", BLANK)),
        None => {}
        Some(email) if email.trim().is_empty() => errors.push(FieldError::new("email", BLANK)),
        Some(email) if !looks_like_email(email) => errors.push(FieldError::new("email", INVALID)),
        Some(email) => {
            let taken = users.iter().any(|(id, user)| {
                Some(*id) != updating
                    && user
                        .email
                        .as_deref()
                        .is_some_and(|existing| existing.eq_ignore_ascii_case(email))
            });
            if taken {
                errors.push(FieldError::new("email", TAKEN));
            }
        }
    }

    match payload.name.as_deref() {
        None if creating => errors.push(FieldError::new("name", BLANK)),
        Some(name) if name.trim().is_empty() => errors.push(FieldError::new("name", BLANK)),
        _ => {}
    }

    match payload.gender.as_deref() {
        None if creating => errors.push(FieldError::new("gender", GENDER_BLANK)),
        Some(gender) if !is_one_of(gender, &GENDERS) => {
            errors.push(FieldError::new("gender", GENDER_BLANK))
        }
        _ => {}
    }

    match payload.status.as_deref() {
        None if creating => errors.push(FieldError::new("status", BLANK)),
        Some(status) if !is_one_of(status, &STATUSES) => {
            errors.push(FieldError::new("status", BLANK))
        }
        _ => {}
    }

    errors
}

fn apply(user: &mut User, payload: UserPayload) {
    if let Some(name) = payload.name {
        user.name = Some(name);
    }
    if let Some(email) = payload.email {
        user.email = Some(email);
    }
    if let Some(gender) = payload.gender {
        user.gender = Some(gender.to_lowercase());
    }
    if let Some(status) = payload.status {
        user.status = Some(status.to_lowercase());
    }
}

fn is_one_of(value: &str, options: &[&str]) -> bool {
    options
        .iter()
        .any(|option| option.eq_ignore_ascii_case(value))
}

fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn user_value(user: &User) -> Value {
    json!({
        "id": user.id,
        "name": user.name,
        "email": user.email,
        "gender": user.gender,
        "status": user.status,
    })
}

fn wrap(version: ApiVersion, data: Value) -> Value {
    match version {
        ApiVersion::V1 => json!({ "meta": null, "data": data }),
        ApiVersion::V2 => data,
    }
}

fn user_response(version: ApiVersion, status: u16, user: &User) -> RawResponse {
    RawResponse::new(status, wrap(version, user_value(user)).to_string())
}

fn errors_response(version: ApiVersion, errors: &[FieldError]) -> RawResponse {
    let data = Value::Array(
        errors
            .iter()
            .map(|error| json!({ "field": error.field, "message": error.message }))
            .collect(),
    );
    RawResponse::new(422, wrap(version, data).to_string())
}

fn message_response(version: ApiVersion, status: u16, message: &str) -> RawResponse {
    RawResponse::new(status, wrap(version, json!({ "message": message })).to_string())
}

fn response_for(version: ApiVersion, (status, message): (u16, &str)) -> RawResponse {
    message_response(version, status, message)
}
