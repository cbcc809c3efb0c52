//! Purpose: The user-management contract scenarios and a sequential runner for them.
//! Exports: `Scenario`, `ScenarioContext`, `SCENARIOS`, `find`, `run_suite`, `SuiteReport`,
//! `ScenarioOutcome`, `FailureReport`.
//! Role: Each scenario is one independent build -> send -> decode -> validate pipeline.
//! Invariants: Expected field messages are literal fixtures per scenario.
//! Invariants: A failing scenario is recorded and the suite moves on; nothing is retried.
use super::checks::{
    attributes_of, expect_field_error, expect_status, expect_success, expect_update_consistent,
};
use super::transport::Transport;
use super::users::{ApiVersion, UsersApi};
use crate::core::attributes::{Attribute, AttributeMap};
use crate::core::error::{Error, ErrorKind};
use crate::core::fixtures::{generate, unique_email};
use crate::core::request::build;
use crate::core::verdict::{Verdict, status};
use serde::Serialize;
use std::time::Instant;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const MALFORMED_BODY: &str = r#"{ "name": "Bad Request", "email": "bad.request@example.com" "#;
const WRONG_ID: u64 = 1;

pub struct ScenarioContext<'a> {
    /// Authorized transport used for every regular call.
    pub transport: &'a dyn Transport,
    /// Transport carrying an invalid bearer token.
    pub unauthorized: &'a dyn Transport,
}

impl<'a> ScenarioContext<'a> {
    fn users(&self, version: ApiVersion) -> UsersApi<'a, dyn Transport + 'a> {
        UsersApi::new(self.transport, version)
    }
}

pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    run: fn(&ScenarioContext<'_>) -> Verdict,
}

impl Scenario {
    pub fn run(&self, ctx: &ScenarioContext<'_>) -> Verdict {
        (self.run)(ctx)
    }
}

pub static SCENARIOS: [Scenario; 16] = [
    Scenario {
        name: "create_success",
        description: "create with all four attributes returns 201 and echoes them",
        run: create_success,
    },
    Scenario {
        name: "create_missing_email",
        description: "create without email returns 422 email \"can't be blank\"",
        run: create_missing_email,
    },
    Scenario {
        name: "create_existing_email",
        description: "create with a taken email returns 422 email \"has already been taken\"",
        run: create_existing_email,
    },
    Scenario {
        name: "create_missing_gender",
        description: "create without gender returns 422 gender error",
        run: create_missing_gender,
    },
    Scenario {
        name: "create_missing_status",
        description: "create without status returns 422 status \"can't be blank\"",
        run: create_missing_status,
    },
    Scenario {
        name: "create_wrong_status",
        description: "create with an unknown status returns 422 status \"can't be blank\"",
        run: create_wrong_status,
    },
    Scenario {
        name: "create_wrong_email",
        description: "create with a malformed email returns 422 email \"is invalid\"",
        run: create_wrong_email,
    },
    Scenario {
        name: "create_v2_success",
        description: "v2 create returns a bare body compared case-insensitively",
        run: create_v2_success,
    },
    Scenario {
        name: "update_success",
        description: "full update returns 200 and echoes the new attributes",
        run: update_success,
    },
    Scenario {
        name: "update_partial_status",
        description: "status-only update leaves the other attributes untouched",
        run: update_partial_status,
    },
    Scenario {
        name: "update_existing_email",
        description: "update to another user's email returns 422 email \"has already been taken\"",
        run: update_existing_email,
    },
    Scenario {
        name: "update_wrong_status",
        description: "update with an unknown status returns 422 status \"can't be blank\"",
        run: update_wrong_status,
    },
    Scenario {
        name: "update_empty_body",
        description: "update with {} returns 200 and the unchanged user",
        run: update_empty_body,
    },
    Scenario {
        name: "update_wrong_id",
        description: "update of an unknown id returns 404",
        run: update_wrong_id,
    },
    Scenario {
        name: "update_unauthorized",
        description: "update with an invalid bearer token returns 401",
        run: update_unauthorized,
    },
    Scenario {
        name: "update_bad_request",
        description: "update with malformed JSON returns 400",
        run: update_bad_request,
    },
];

pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|scenario| scenario.name == name)
}

#[derive(Clone, Debug, Serialize)]
pub struct FailureReport {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl From<&Error> for FailureReport {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            field: err.field().map(str::to_string),
            expected: err.expected().map(str::to_string),
            actual: err.actual().map(str::to_string),
            status: err.status(),
            hint: err.hint().map(str::to_string),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ScenarioOutcome {
    pub scenario: &'static str,
    pub passed: bool,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReport>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SuiteReport {
    pub started_at: String,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<ScenarioOutcome>,
}

impl SuiteReport {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn first_failure_kind(&self) -> Option<ErrorKind> {
        self.results
            .iter()
            .find_map(|outcome| outcome.failure.as_ref().map(|failure| failure.kind))
    }
}

/// Runs the selected scenarios in declaration order; an empty `only` selects all of them.
pub fn run_suite<A, U>(
    transport: &A,
    unauthorized: &U,
    only: &[String],
) -> Result<SuiteReport, Error>
where
    A: Transport,
    U: Transport,
{
    let selected = select(only)?;
    let started_at = OffsetDateTime::now_utc().format(&Rfc3339).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to format suite start time")
            .with_source(err)
    })?;
    let ctx = ScenarioContext {
        transport,
        unauthorized,
    };

    let mut results = Vec::with_capacity(selected.len());
    for scenario in selected {
        let started = Instant::now();
        let verdict = scenario.run(&ctx);
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let failure = match &verdict {
            Ok(()) => {
                tracing::info!(scenario = scenario.name, elapsed_ms, "scenario passed");
                None
            }
            Err(err) => {
                tracing::warn!(
                    scenario = scenario.name,
                    elapsed_ms,
                    error = %err,
                    "scenario failed"
                );
                Some(FailureReport::from(err))
            }
        };
        results.push(ScenarioOutcome {
            scenario: scenario.name,
            passed: failure.is_none(),
            elapsed_ms,
            failure,
        });
    }

    let passed = results.iter().filter(|outcome| outcome.passed).count();
    Ok(SuiteReport {
        started_at,
        passed,
        failed: results.len() - passed,
        results,
    })
}

fn select(only: &[String]) -> Result<Vec<&'static Scenario>, Error> {
    if only.is_empty() {
        return Ok(SCENARIOS.iter().collect());
    }
    if let Some(unknown) = only.iter().find(|name| find(name).is_none()) {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("unknown scenario: {unknown}"))
            .with_hint("Run `user-contract list` to see scenario names."));
    }
    Ok(SCENARIOS
        .iter()
        .filter(|scenario| only.iter().any(|name| name == scenario.name))
        .collect())
}

fn capitalized(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn create_expecting_error(
    ctx: &ScenarioContext<'_>,
    attributes: &AttributeMap,
    field: &str,
    message: &str,
) -> Verdict {
    let response = ctx.users(ApiVersion::V1).create_user(&build(attributes))?;
    expect_field_error(&response, ApiVersion::V1, 0, field, message)
}

/// Creates a fresh user and returns its id with the attributes the server echoed.
fn create_user_context(ctx: &ScenarioContext<'_>) -> Verdict<(u64, AttributeMap)> {
    let attributes = generate(&Attribute::ALL)?;
    let response = ctx.users(ApiVersion::V1).create_user(&build(&attributes))?;
    let user = expect_success(&response, ApiVersion::V1, status::CREATED, &attributes)?;
    let id = user
        .id
        .ok_or_else(|| Error::mismatch("id", "<present>", "<absent>"))?;
    Ok((id, attributes_of(&user)))
}

fn create_success(ctx: &ScenarioContext<'_>) -> Verdict {
    let attributes = generate(&Attribute::ALL)?;
    let response = ctx.users(ApiVersion::V1).create_user(&build(&attributes))?;
    expect_success(&response, ApiVersion::V1, status::CREATED, &attributes)?;
    Ok(())
}

fn create_missing_email(ctx: &ScenarioContext<'_>) -> Verdict {
    let attributes = generate(&[Attribute::Name, Attribute::Gender, Attribute::Status])?;
    create_expecting_error(ctx, &attributes, "email", "can't be blank")
}

fn create_existing_email(ctx: &ScenarioContext<'_>) -> Verdict {
    let first = generate(&Attribute::ALL)?;
    let response = ctx.users(ApiVersion::V1).create_user(&build(&first))?;
    expect_success(&response, ApiVersion::V1, status::CREATED, &first)?;

    let email = first.attribute(Attribute::Email).unwrap_or_default();
    let duplicate =
        generate(&[Attribute::Name, Attribute::Gender, Attribute::Status])?.with("email", email);
    create_expecting_error(ctx, &duplicate, "email", "has already been taken")
}

fn create_missing_gender(ctx: &ScenarioContext<'_>) -> Verdict {
    let attributes = generate(&[Attribute::Name, Attribute::Email, Attribute::Status])?;
    create_expecting_error(
        ctx,
        &attributes,
        "gender",
        "can't be blank, can be male of female",
    )
}

fn create_missing_status(ctx: &ScenarioContext<'_>) -> Verdict {
    let attributes = generate(&[Attribute::Name, Attribute::Email, Attribute::Gender])?;
    create_expecting_error(ctx, &attributes, "status", "can't be blank")
}

fn create_wrong_status(ctx: &ScenarioContext<'_>) -> Verdict {
    let generated = generate(&[Attribute::Name, Attribute::Email, Attribute::Gender])?;
    let gender = capitalized(generated.attribute(Attribute::Gender).unwrap_or_default());
    let attributes = generated
        .with("gender", gender)
        .with("status", "InvalidStatus");
    create_expecting_error(ctx, &attributes, "status", "can't be blank")
}

fn create_wrong_email(ctx: &ScenarioContext<'_>) -> Verdict {
    let generated = generate(&[Attribute::Name, Attribute::Gender, Attribute::Status])?;
    let gender = capitalized(generated.attribute(Attribute::Gender).unwrap_or_default());
    let status = capitalized(generated.attribute(Attribute::Status).unwrap_or_default());
    let attributes = generated
        .with("email", "InvalidEmail")
        .with("gender", gender)
        .with("status", status);
    create_expecting_error(ctx, &attributes, "email", "is invalid")
}

fn create_v2_success(ctx: &ScenarioContext<'_>) -> Verdict {
    let generated = generate(&Attribute::ALL)?;
    let gender = capitalized(generated.attribute(Attribute::Gender).unwrap_or_default());
    let status = capitalized(generated.attribute(Attribute::Status).unwrap_or_default());
    let attributes = generated.with("gender", gender).with("status", status);
    let response = ctx.users(ApiVersion::V2).create_user(&build(&attributes))?;
    expect_success(&response, ApiVersion::V2, status::CREATED, &attributes)?;
    Ok(())
}

fn update_success(ctx: &ScenarioContext<'_>) -> Verdict {
    let (id, _) = create_user_context(ctx)?;
    let changes = AttributeMap::new()
        .with("name", "Allasani Peddana")
        .with("status", "active")
        .with("email", unique_email()?)
        .with("gender", "female");
    let response = ctx.users(ApiVersion::V1).update_user(id, &build(&changes))?;
    expect_success(&response, ApiVersion::V1, status::OK, &changes)?;
    Ok(())
}

fn update_partial_status(ctx: &ScenarioContext<'_>) -> Verdict {
    let (id, baseline) = create_user_context(ctx)?;
    let flipped = match baseline.attribute(Attribute::Status) {
        Some("active") => "inactive",
        _ => "active",
    };
    let changes = AttributeMap::from([("status", flipped)]);
    let response = ctx.users(ApiVersion::V1).update_user(id, &build(&changes))?;
    expect_update_consistent(&response, ApiVersion::V1, &baseline, &changes)?;
    Ok(())
}

fn update_existing_email(ctx: &ScenarioContext<'_>) -> Verdict {
    let (_, taken) = create_user_context(ctx)?;
    let (id, _) = create_user_context(ctx)?;
    let email = taken.attribute(Attribute::Email).unwrap_or_default();
    let changes = AttributeMap::from([("email", email)]);
    let response = ctx.users(ApiVersion::V1).update_user(id, &build(&changes))?;
    expect_field_error(&response, ApiVersion::V1, 0, "email", "has already been taken")
}

fn update_wrong_status(ctx: &ScenarioContext<'_>) -> Verdict {
    let (id, _) = create_user_context(ctx)?;
    let changes = AttributeMap::from([("status", "wrongStatus")]);
    let response = ctx.users(ApiVersion::V1).update_user(id, &build(&changes))?;
    expect_field_error(&response, ApiVersion::V1, 0, "status", "can't be blank")
}

fn update_empty_body(ctx: &ScenarioContext<'_>) -> Verdict {
    let (id, baseline) = create_user_context(ctx)?;
    let changes = AttributeMap::new();
    let response = ctx.users(ApiVersion::V1).update_user(id, &build(&changes))?;
    expect_update_consistent(&response, ApiVersion::V1, &baseline, &changes)?;
    Ok(())
}

fn update_wrong_id(ctx: &ScenarioContext<'_>) -> Verdict {
    create_user_context(ctx)?;
    let response = ctx
        .users(ApiVersion::V1)
        .update_user(WRONG_ID, &build(&AttributeMap::new()))?;
    expect_status(&response, status::NOT_FOUND)
}

fn update_unauthorized(ctx: &ScenarioContext<'_>) -> Verdict {
    let (id, _) = create_user_context(ctx)?;
    let changes = AttributeMap::new()
        .with("name", "Unauthorized Update")
        .with("email", "unauthorized.update@example.com")
        .with("status", "active");
    let response =
        UsersApi::new(ctx.unauthorized, ApiVersion::V1).update_user(id, &build(&changes))?;
    expect_status(&response, status::UNAUTHORIZED)
}

fn update_bad_request(ctx: &ScenarioContext<'_>) -> Verdict {
    let (id, _) = create_user_context(ctx)?;
    let response = ctx.users(ApiVersion::V1).update_user_raw(id, MALFORMED_BODY)?;
    expect_status(&response, status::BAD_REQUEST)
}
