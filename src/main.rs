//! Purpose: `user-contract` CLI entry point.
//! Role: Binary crate root; parses args, runs the scenario suite or the reference server.
//! Invariants: `run` prints exactly one JSON report on stdout.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]

use std::io::{self, IsTerminal};
use std::net::SocketAddr;

use clap::error::ErrorKind as ClapErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;

mod serve;

use user_contract::api::{Error, ErrorKind, SCENARIOS, TargetConfig, run_suite, to_exit_code};

const DEFAULT_INVALID_TOKEN: &str = "INVALID_ACCESS_TOKEN";

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `user-contract --help`."));
            }
        },
    };

    dispatch(cli.command)
}

#[derive(Parser)]
#[command(
    name = "user-contract",
    version,
    about = "Contract tests for a user-management REST API",
    long_about = None,
    after_help = r#"EXAMPLES
  $ user-contract serve --bind 127.0.0.1:7777 --token secret
  $ user-contract run --base-url http://127.0.0.1:7777 --token secret
  $ user-contract run --base-url https://gorest.co.in --only create_success
  $ user-contract list"#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Run contract scenarios against an API",
        long_about = r#"Run contract scenarios against an API.

Scenarios run sequentially; a failing scenario does not stop the rest.
Prints a JSON report on stdout. Exits 0 when every scenario passes, otherwise
with the exit code of the first failure's kind."#
    )]
    Run {
        #[arg(long, help = "API base url, scheme and host only [env: USER_CONTRACT_BASE_URL]")]
        base_url: Option<String>,
        #[arg(long, help = "Bearer token for writes [env: USER_CONTRACT_TOKEN]")]
        token: Option<String>,
        #[arg(long, help = "Per-request timeout in milliseconds [env: USER_CONTRACT_TIMEOUT_MS]")]
        timeout_ms: Option<u64>,
        #[arg(
            long = "only",
            value_name = "NAME",
            help = "Run only the named scenario (repeatable)"
        )]
        only: Vec<String>,
        #[arg(
            long,
            default_value = DEFAULT_INVALID_TOKEN,
            help = "Token sent by the unauthorized-update scenario"
        )]
        invalid_token: String,
    },
    #[command(about = "Serve the in-memory reference users API")]
    Serve {
        #[arg(long, default_value = "127.0.0.1:7777", help = "Address to bind")]
        bind: SocketAddr,
        #[arg(long, help = "Require `Bearer <token>` on writes")]
        token: Option<String>,
        #[arg(long, help = "Allow binding to a non-loopback address")]
        allow_non_loopback: bool,
    },
    #[command(about = "List scenario names")]
    List,
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ user-contract completion bash > ~/.local/share/bash-completion/completions/user-contract
  $ user-contract completion zsh > ~/.zfunc/_user-contract"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn dispatch(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Run {
            base_url,
            token,
            timeout_ms,
            only,
            invalid_token,
        } => {
            serve::init_tracing("warn");
            let config = TargetConfig::resolve(base_url, token, timeout_ms, |key| {
                std::env::var(key).ok()
            })?;
            let transport = config.transport();
            let unauthorized = transport.clone().with_token(invalid_token);
            let report = run_suite(&transport, &unauthorized, &only)?;
            emit_json(&serde_json::to_value(&report).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode suite report")
                    .with_source(err)
            })?);
            let exit_code = report.first_failure_kind().map(to_exit_code).unwrap_or(0);
            Ok(RunOutcome::with_code(exit_code))
        }
        Command::Serve {
            bind,
            token,
            allow_non_loopback,
        } => {
            let config = serve::ServeConfig {
                bind,
                token,
                allow_non_loopback,
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config))?;
            Ok(RunOutcome::ok())
        }
        Command::List => {
            let width = SCENARIOS
                .iter()
                .map(|scenario| scenario.name.len())
                .max()
                .unwrap_or_default();
            for scenario in &SCENARIOS {
                println!("{:width$}  {}", scenario.name, scenario.description);
            }
            Ok(RunOutcome::ok())
        }
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "user-contract", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
    }
}

fn emit_json(value: &Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }

    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Transport => "transport failure".to_string(),
        ErrorKind::Decode => "undecodable response".to_string(),
        ErrorKind::Status => "unexpected status".to_string(),
        ErrorKind::Mismatch => "value mismatch".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(err.kind().label()));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(field) = err.field() {
        inner.insert("field".to_string(), json!(field));
    }
    if let Some(expected) = err.expected() {
        inner.insert("expected".to_string(), json!(expected));
    }
    if let Some(actual) = err.actual() {
        inner.insert("actual".to_string(), json!(actual));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
