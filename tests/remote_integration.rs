//! Purpose: End-to-end tests for the harness against the reference server over HTTP.
//! Exports: None (integration test module).
//! Role: Validate the transport, envelope decoding, and scenarios across real TCP.
//! Invariants: Uses a loopback-only server spawned from the `user-contract` binary.
//! Invariants: Bounded waits avoid test flakiness.
//! Invariants: Server processes are cleaned up on drop.

use serde_json::Value;
use std::io::Read;
use std::net::{SocketAddr, TcpListener};
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard};
use std::thread::sleep;
use std::time::{Duration, Instant};
use user_contract::api::{
    ApiVersion, AttributeMap, ErrorKind, HttpTransport, SCENARIOS, TargetConfig, Transport,
    UsersApi, build, expect_field_error, expect_status, expect_success, expect_update_consistent,
    run_suite, status, unique_email,
};

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

const TOKEN: &str = "secret";

static SERVER_LOCK: Mutex<()> = Mutex::new(());

struct TestServer {
    child: Child,
    base_url: String,
    _server_guard: MutexGuard<'static, ()>,
}

impl TestServer {
    fn start(token: Option<&str>) -> TestResult<Self> {
        let guard = SERVER_LOCK
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let mut last_err: Option<Box<dyn std::error::Error>> = None;
        for _attempt in 0..3 {
            let port = pick_port()?;
            let bind = format!("127.0.0.1:{port}");
            let base_url = format!("http://{bind}");

            let mut command = Command::new(env!("CARGO_BIN_EXE_user-contract"));
            command
                .arg("serve")
                .arg("--bind")
                .arg(&bind)
                .env("RUST_LOG", "warn")
                .stdout(Stdio::null())
                .stderr(Stdio::piped());
            if let Some(token) = token {
                command.arg("--token").arg(token);
            }
            let mut child = command.spawn()?;

            match wait_for_server(&mut child, bind.parse()?) {
                Ok(()) => {
                    return Ok(Self {
                        child,
                        base_url,
                        _server_guard: guard,
                    });
                }
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    last_err = Some(err);
                    sleep(Duration::from_millis(30));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| "server failed to start".into()))
    }

    fn transport(&self, token: Option<&str>) -> TestResult<HttpTransport> {
        let mut config =
            TargetConfig::new(&self.base_url)?.with_timeout(Duration::from_secs(5));
        if let Some(token) = token {
            config = config.with_token(token);
        }
        Ok(config.transport())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn ada() -> AttributeMap {
    AttributeMap::from([
        ("name", "Ada Lovelace"),
        ("gender", "female"),
        ("status", "active"),
    ])
}

#[test]
fn create_then_update_round_trip() -> TestResult<()> {
    let server = TestServer::start(Some(TOKEN))?;
    let transport = server.transport(Some(TOKEN))?;
    let users = UsersApi::new(&transport, ApiVersion::V1);

    let attributes = ada().with("email", unique_email()?);
    let response = users.create_user(&build(&attributes))?;
    let user = expect_success(&response, ApiVersion::V1, status::CREATED, &attributes)?;
    let id = user.id.ok_or("created user has no id")?;

    let changes = AttributeMap::from([("status", "inactive")]);
    let response = users.update_user(id, &build(&changes))?;
    expect_update_consistent(&response, ApiVersion::V1, &attributes, &changes)?;

    let response = users.get_user(id)?;
    expect_success(
        &response,
        ApiVersion::V1,
        status::OK,
        &attributes.merged(&changes),
    )?;
    Ok(())
}

#[test]
fn wire_format_has_null_meta_and_error_lists() -> TestResult<()> {
    let server = TestServer::start(Some(TOKEN))?;
    let transport = server.transport(Some(TOKEN))?;
    let users = UsersApi::new(&transport, ApiVersion::V1);

    let response = users.create_user(&build(&ada()))?;
    assert_eq!(response.status, 422);
    let body: Value = serde_json::from_slice(&response.body)?;
    assert!(body["meta"].is_null());
    assert_eq!(body["data"][0]["field"], "email");
    expect_field_error(&response, ApiVersion::V1, 0, "email", "can't be blank")?;
    Ok(())
}

#[test]
fn v2_bodies_are_bare() -> TestResult<()> {
    let server = TestServer::start(Some(TOKEN))?;
    let transport = server.transport(Some(TOKEN))?;
    let users = UsersApi::new(&transport, ApiVersion::V2);

    let attributes = ada()
        .with("email", unique_email()?)
        .with("gender", "Female")
        .with("status", "Active");
    let response = users.create_user(&build(&attributes))?;
    let body: Value = serde_json::from_slice(&response.body)?;
    assert!(body.get("data").is_none());
    assert_eq!(body["gender"], "female");
    expect_success(&response, ApiVersion::V2, status::CREATED, &attributes)?;
    Ok(())
}

#[test]
fn wrong_token_and_malformed_json_statuses() -> TestResult<()> {
    let server = TestServer::start(Some(TOKEN))?;
    let transport = server.transport(Some(TOKEN))?;
    let users = UsersApi::new(&transport, ApiVersion::V1);
    let attributes = ada().with("email", unique_email()?);
    let user = expect_success(
        &users.create_user(&build(&attributes))?,
        ApiVersion::V1,
        status::CREATED,
        &attributes,
    )?;
    let id = user.id.ok_or("created user has no id")?;

    let intruder = server.transport(Some("INVALID_ACCESS_TOKEN"))?;
    let response = UsersApi::new(&intruder, ApiVersion::V1).update_user(id, &build(&ada()))?;
    expect_status(&response, status::UNAUTHORIZED)?;

    let response = users.update_user_raw(id, r#"{ "name": "Bad Request" "#)?;
    expect_status(&response, status::BAD_REQUEST)?;

    let response = users.update_user(1, &build(&AttributeMap::new()))?;
    expect_status(&response, status::NOT_FOUND)?;
    Ok(())
}

#[test]
fn full_suite_passes_over_http() -> TestResult<()> {
    let server = TestServer::start(Some(TOKEN))?;
    let transport = server.transport(Some(TOKEN))?;
    let unauthorized = transport.clone().with_token("INVALID_ACCESS_TOKEN");

    let report = run_suite(&transport, &unauthorized, &[])?;
    let failures: Vec<_> = report
        .results
        .iter()
        .filter(|outcome| !outcome.passed)
        .collect();
    assert!(failures.is_empty(), "failures: {failures:?}");
    assert_eq!(report.passed, SCENARIOS.len());
    Ok(())
}

#[test]
fn wrong_status_surfaces_before_decode() -> TestResult<()> {
    let server = TestServer::start(Some(TOKEN))?;
    // No token: writes are rejected with 401, which the check reports as a status failure.
    let transport = server.transport(None)?;
    let users = UsersApi::new(&transport, ApiVersion::V1);
    let attributes = ada().with("email", unique_email()?);
    let response = users.create_user(&build(&attributes))?;
    let err = expect_success(&response, ApiVersion::V1, status::CREATED, &attributes)
        .expect_err("401 is not 201");
    assert_eq!(err.kind(), ErrorKind::Status);
    assert_eq!(err.actual(), Some("401"));
    Ok(())
}

#[test]
fn closed_port_is_a_transport_error() -> TestResult<()> {
    let port = pick_port()?;
    let config = TargetConfig::new(format!("http://127.0.0.1:{port}"))?
        .with_timeout(Duration::from_millis(500));
    let err = config
        .transport()
        .send(user_contract::api::Method::Get, "/healthz", None)
        .expect_err("nothing listening");
    assert_eq!(err.kind(), ErrorKind::Transport);
    Ok(())
}

fn pick_port() -> TestResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

fn wait_for_server(child: &mut Child, addr: SocketAddr) -> TestResult<()> {
    let url = format!("http://{addr}/healthz");
    let start = Instant::now();
    loop {
        if let Ok(resp) = ureq::get(&url).call() {
            if resp.status() == 200 {
                return Ok(());
            }
        }
        if let Some(status) = child.try_wait()? {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            let detail = stderr.trim();
            return Err(format!(
                "server exited before ready (status: {status}, stderr: {})",
                if detail.is_empty() { "<empty>" } else { detail }
            )
            .into());
        }
        if start.elapsed() > Duration::from_secs(8) {
            return Err("server did not start in time".into());
        }
        sleep(Duration::from_millis(20));
    }
}
