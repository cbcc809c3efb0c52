//! Purpose: Execute JSON contract manifests against a users API.
//! Exports: None (binary entry point).
//! Role: Data-driven runner; each step sends one request and checks one response.
//! Invariants: Manifests are JSON-only; steps execute in order; fail-fast on errors.
//! Invariants: Steps may only reference users created by earlier steps.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use user_contract::api::{
    ApiVersion, Attribute, AttributeMap, Compare, Decoded, Error, HttpTransport, LocalTransport,
    Method, RawResponse, ReferenceApi, ShapeTag, TargetConfig, Transport, UsersApi,
    assert_failure, assert_success, attributes_of, build, decode_tagged, expect_status, generate,
    status,
};

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<(), String> {
    let mut args = env::args();
    let _exe = args.next();
    let manifest_path = args
        .next()
        .ok_or_else(|| "usage: user-contract-conformance <path/to/manifest.json>".to_string())?;
    if args.next().is_some() {
        return Err("unexpected extra arguments".to_string());
    }

    let manifest_path = PathBuf::from(manifest_path);
    let content = fs::read_to_string(&manifest_path)
        .map_err(|err| format!("failed to read manifest: {err}"))?;
    let manifest: Value = serde_json::from_str(&content)
        .map_err(|err| format!("failed to parse manifest json: {err}"))?;

    let version = manifest
        .get("conformance_version")
        .and_then(Value::as_u64)
        .ok_or_else(|| "missing conformance_version".to_string())?;
    if version != 0 {
        return Err(format!("unsupported conformance_version: {version}"));
    }

    let target = target_from_manifest(&manifest)?;
    let steps = manifest
        .get("steps")
        .and_then(Value::as_array)
        .ok_or_else(|| "manifest steps must be an array".to_string())?;

    let mut runner = Runner {
        target,
        users: HashMap::new(),
    };
    for (index, step) in steps.iter().enumerate() {
        let step_id = step.get("id").and_then(Value::as_str).map(str::to_string);
        let op = step
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| step_err(index, &step_id, "missing op"))?;
        match op {
            "create" => runner.run_create(step, index, &step_id)?,
            "update" => runner.run_update(step, index, &step_id)?,
            "update_raw" => runner.run_update_raw(step, index, &step_id)?,
            "get" => runner.run_get(step, index, &step_id)?,
            _ => return Err(step_err(index, &step_id, &format!("unknown op: {op}"))),
        }
        tracing::debug!(index, op, "step passed");
    }

    Ok(())
}

#[derive(Clone)]
enum Target {
    Http(HttpTransport),
    Local(LocalTransport),
}

impl Target {
    fn with_token(&self, token: &str) -> Target {
        match self {
            Target::Http(transport) => Target::Http(transport.clone().with_token(token)),
            Target::Local(transport) => Target::Local(transport.clone().with_token(token)),
        }
    }
}

impl Transport for Target {
    fn send(&self, method: Method, path: &str, body: Option<&str>) -> Result<RawResponse, Error> {
        match self {
            Target::Http(transport) => transport.send(method, path, body),
            Target::Local(transport) => transport.send(method, path, body),
        }
    }
}

/// `"target": "local"` runs against an in-process reference API; otherwise HTTP.
fn target_from_manifest(manifest: &Value) -> Result<Target, String> {
    let token = manifest
        .get("token")
        .and_then(Value::as_str)
        .map(str::to_string);
    match manifest.get("target").and_then(Value::as_str).unwrap_or("http") {
        "local" => {
            let api = Arc::new(ReferenceApi::new(token.clone()));
            let transport = LocalTransport::new(api);
            Ok(Target::Local(match token {
                Some(token) => transport.with_token(token),
                None => transport,
            }))
        }
        "http" => {
            let base_url = manifest
                .get("base_url")
                .and_then(Value::as_str)
                .map(str::to_string);
            let config = TargetConfig::resolve(base_url, token, None, |key| env::var(key).ok())
                .map_err(|err| err.to_string())?;
            Ok(Target::Http(config.transport()))
        }
        other => Err(format!("unknown target: {other}")),
    }
}

struct StoredUser {
    id: u64,
    attributes: AttributeMap,
}

struct Runner {
    target: Target,
    users: HashMap<String, StoredUser>,
}

impl Runner {
    fn run_create(
        &mut self,
        step: &Value,
        index: usize,
        step_id: &Option<String>,
    ) -> Result<(), String> {
        let version = version_from_step(step, index, step_id)?;
        let attributes = self.attributes_from_step(step, index, step_id)?;
        let transport = self.transport_for(step, index, step_id)?;
        let response = UsersApi::new(&transport, version)
            .create_user(&build(&attributes))
            .map_err(|err| step_err(index, step_id, &err.to_string()))?;

        let user = check_response(step, &response, version, &attributes, index, step_id)?;
        if let Some(id) = step_id {
            let user = user.ok_or_else(|| {
                step_err(index, step_id, "create with an id must expect a user response")
            })?;
            self.users.insert(id.clone(), user);
        }
        Ok(())
    }

    fn run_update(
        &mut self,
        step: &Value,
        index: usize,
        step_id: &Option<String>,
    ) -> Result<(), String> {
        let version = version_from_step(step, index, step_id)?;
        let (target_key, id) = self.target_id(step, index, step_id)?;
        let changes = self.attributes_from_step(step, index, step_id)?;
        let transport = self.transport_for(step, index, step_id)?;
        let response = UsersApi::new(&transport, version)
            .update_user(id, &build(&changes))
            .map_err(|err| step_err(index, step_id, &err.to_string()))?;

        let expected = match (&target_key, consistent(step)) {
            (Some(key), true) => self
                .users
                .get(key)
                .map(|stored| stored.attributes.merged(&changes))
                .unwrap_or(changes),
            _ => changes,
        };
        let user = check_response(step, &response, version, &expected, index, step_id)?;
        if let (Some(key), Some(user)) = (target_key, user) {
            self.users.insert(key, user);
        }
        Ok(())
    }

    fn run_update_raw(
        &mut self,
        step: &Value,
        index: usize,
        step_id: &Option<String>,
    ) -> Result<(), String> {
        let version = version_from_step(step, index, step_id)?;
        let (_, id) = self.target_id(step, index, step_id)?;
        let body = step
            .get("input")
            .and_then(|input| input.get("body"))
            .and_then(Value::as_str)
            .ok_or_else(|| step_err(index, step_id, "missing input.body"))?;
        let transport = self.transport_for(step, index, step_id)?;
        let response = UsersApi::new(&transport, version)
            .update_user_raw(id, body)
            .map_err(|err| step_err(index, step_id, &err.to_string()))?;
        check_response(step, &response, version, &AttributeMap::new(), index, step_id)?;
        Ok(())
    }

    fn run_get(
        &mut self,
        step: &Value,
        index: usize,
        step_id: &Option<String>,
    ) -> Result<(), String> {
        let version = version_from_step(step, index, step_id)?;
        let (target_key, id) = self.target_id(step, index, step_id)?;
        let transport = self.transport_for(step, index, step_id)?;
        let response = UsersApi::new(&transport, version)
            .get_user(id)
            .map_err(|err| step_err(index, step_id, &err.to_string()))?;
        let expected = target_key
            .as_ref()
            .and_then(|key| self.users.get(key))
            .filter(|_| consistent(step))
            .map(|stored| stored.attributes.clone())
            .unwrap_or_default();
        check_response(step, &response, version, &expected, index, step_id)?;
        Ok(())
    }

    /// Literal `input.attributes` win over `input.generate` kinds and `input.copy` references.
    fn attributes_from_step(
        &self,
        step: &Value,
        index: usize,
        step_id: &Option<String>,
    ) -> Result<AttributeMap, String> {
        let Some(input) = step.get("input") else {
            return Ok(AttributeMap::new());
        };

        let kinds = match input.get("generate") {
            Some(Value::Array(values)) => values
                .iter()
                .map(|value| {
                    value
                        .as_str()
                        .and_then(Attribute::from_key)
                        .ok_or_else(|| step_err(index, step_id, "unknown generate kind"))
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(step_err(index, step_id, "generate must be array")),
            None => Vec::new(),
        };
        let mut attributes =
            generate(&kinds).map_err(|err| step_err(index, step_id, &err.to_string()))?;

        if let Some(copy) = input.get("copy") {
            let copy = copy
                .as_object()
                .ok_or_else(|| step_err(index, step_id, "copy must be object"))?;
            for (key, source) in copy {
                let source = source
                    .as_str()
                    .ok_or_else(|| step_err(index, step_id, "copy source must be a step id"))?;
                let stored = self.users.get(source).ok_or_else(|| {
                    step_err(index, step_id, &format!("unknown user reference: {source}"))
                })?;
                let value = stored.attributes.get(key).ok_or_else(|| {
                    step_err(index, step_id, &format!("user {source} has no {key}"))
                })?;
                attributes.insert(key.as_str(), value);
            }
        }

        if let Some(literal) = input.get("attributes") {
            let literal = string_map(literal).map_err(|err| step_err(index, step_id, &err))?;
            attributes = attributes.merged(&literal);
        }
        Ok(attributes)
    }

    /// Resolves `user` (an earlier step id) or a literal numeric `id`.
    fn target_id(
        &self,
        step: &Value,
        index: usize,
        step_id: &Option<String>,
    ) -> Result<(Option<String>, u64), String> {
        if let Some(reference) = step.get("user").and_then(Value::as_str) {
            let stored = self.users.get(reference).ok_or_else(|| {
                step_err(index, step_id, &format!("unknown user reference: {reference}"))
            })?;
            return Ok((Some(reference.to_string()), stored.id));
        }
        let id = step
            .get("id_value")
            .and_then(Value::as_u64)
            .ok_or_else(|| step_err(index, step_id, "missing user or id_value"))?;
        Ok((None, id))
    }

    fn transport_for(
        &self,
        step: &Value,
        index: usize,
        step_id: &Option<String>,
    ) -> Result<Target, String> {
        match step.get("token") {
            None => Ok(self.target.clone()),
            Some(Value::String(token)) => Ok(self.target.with_token(token)),
            Some(_) => Err(step_err(index, step_id, "token must be a string")),
        }
    }
}

fn version_from_step(
    step: &Value,
    index: usize,
    step_id: &Option<String>,
) -> Result<ApiVersion, String> {
    match step.get("version") {
        None => Ok(ApiVersion::V1),
        Some(value) => value
            .as_str()
            .and_then(ApiVersion::from_label)
            .ok_or_else(|| step_err(index, step_id, "version must be \"v1\" or \"v2\"")),
    }
}

fn consistent(step: &Value) -> bool {
    step.get("expect")
        .and_then(|expect| expect.get("consistent"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Applies `expect` to `response`; returns the decoded user when the body carried one.
fn check_response(
    step: &Value,
    response: &RawResponse,
    version: ApiVersion,
    input: &AttributeMap,
    index: usize,
    step_id: &Option<String>,
) -> Result<Option<StoredUser>, String> {
    let to_step_err = |err: Error| step_err(index, step_id, &err.to_string());
    let empty = Map::new();
    let expect = match step.get("expect") {
        Some(Value::Object(expect)) => expect,
        Some(_) => return Err(step_err(index, step_id, "expect must be object")),
        None => &empty,
    };

    let expected_status = match expect.get("status") {
        Some(value) => {
            let code = value
                .as_u64()
                .and_then(|code| u16::try_from(code).ok())
                .ok_or_else(|| step_err(index, step_id, "status must be a number"))?;
            expect_status(response, code).map_err(to_step_err)?;
            code
        }
        None => response.status,
    };

    let tag = match expect.get("shape") {
        Some(value) => serde_json::from_value::<ShapeTag>(value.clone())
            .map_err(|err| step_err(index, step_id, &format!("invalid shape: {err}")))?,
        None => ShapeTag::for_status(response.status, version.wrapping()),
    };

    if let Some(error) = expect.get("error") {
        let field = error
            .get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| step_err(index, step_id, "missing expect.error.field"))?;
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| step_err(index, step_id, "missing expect.error.message"))?;
        let position = error.get("index").and_then(Value::as_u64).unwrap_or(0);
        let position = usize::try_from(position)
            .map_err(|_| step_err(index, step_id, "error index is too large"))?;
        let Decoded::Errors(envelope) =
            decode_tagged(&response.body, tag).map_err(to_step_err)?
        else {
            return Err(step_err(index, step_id, "expected an error list shape"));
        };
        assert_failure(&envelope, position, field, message).map_err(to_step_err)?;
        return Ok(None);
    }

    let wants_user = expect.contains_key("attributes") || consistent(step) || step_id.is_some();
    if !wants_user || tag.is_error_list() || !is_success(response.status) {
        return Ok(None);
    }

    let Decoded::User(envelope) = decode_tagged(&response.body, tag).map_err(to_step_err)? else {
        return Err(step_err(index, step_id, "expected a user shape"));
    };
    let compare = match expect.get("compare") {
        Some(value) => serde_json::from_value::<Compare>(value.clone())
            .map_err(|err| step_err(index, step_id, &format!("invalid compare: {err}")))?,
        None => version.compare(),
    };
    let expected = match expect.get("attributes") {
        Some(Value::String(keyword)) if keyword == "input" => input.clone(),
        Some(value) => string_map(value).map_err(|err| step_err(index, step_id, &err))?,
        None if consistent(step) => input.clone(),
        None => AttributeMap::new(),
    };
    assert_success(response.status, &envelope, expected_status, &expected, compare)
        .map_err(to_step_err)?;

    Ok(envelope.data.id.map(|id| StoredUser {
        id,
        attributes: attributes_of(&envelope.data),
    }))
}

fn is_success(code: u16) -> bool {
    code == status::OK || code == status::CREATED
}

fn string_map(value: &Value) -> Result<AttributeMap, String> {
    let object = value
        .as_object()
        .ok_or_else(|| "attributes must be an object of strings".to_string())?;
    object
        .iter()
        .map(|(key, value)| {
            value
                .as_str()
                .map(|value| (key.as_str(), value))
                .ok_or_else(|| format!("attribute {key} must be a string"))
        })
        .collect()
}

fn step_err(index: usize, step_id: &Option<String>, message: &str) -> String {
    let mut out = format!("step {index}");
    if let Some(id) = step_id {
        out.push_str(&format!(" ({id})"));
    }
    out.push_str(": ");
    out.push_str(message);
    out
}
