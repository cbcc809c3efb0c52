//! Purpose: Attribute-driven assertions over decoded envelopes.
//! Exports: `Verdict`, `Compare`, `status`, `expect_status`, `assert_success`, `assert_failure`.
//! Role: Test oracle; reports the first divergence between expected and observed values.
//! Invariants: Stateless; every call is a single evaluate-and-report transaction.
//! Invariants: Attribute keys resolve through `fields::binding`; unknown keys are ignored.
//! Invariants: Error envelopes never carry `meta`; field/message equality is exact.
use super::attributes::AttributeMap;
use super::envelope::{Envelope, FieldError, User};
use super::error::Error;
use super::fields::BINDINGS;
use serde::{Deserialize, Serialize};

pub type Verdict<T = ()> = Result<T, Error>;

pub mod status {
    pub const OK: u16 = 200;
    pub const CREATED: u16 = 201;
    pub const BAD_REQUEST: u16 = 400;
    pub const UNAUTHORIZED: u16 = 401;
    pub const NOT_FOUND: u16 = 404;
    pub const UNPROCESSABLE_ENTITY: u16 = 422;
}

const ABSENT: &str = "<absent>";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compare {
    #[default]
    Exact,
    IgnoreCase,
}

impl Compare {
    pub fn matches(self, expected: &str, actual: &str) -> bool {
        match self {
            Compare::Exact => expected == actual,
            Compare::IgnoreCase => expected.to_lowercase() == actual.to_lowercase(),
        }
    }
}

pub fn expect_status(actual: u16, expected: u16) -> Verdict {
    if actual != expected {
        return Err(Error::status_mismatch(expected, actual));
    }
    Ok(())
}

pub fn assert_success(
    observed_status: u16,
    envelope: &Envelope<User>,
    expected_status: u16,
    attributes: &AttributeMap,
    compare: Compare,
) -> Verdict {
    expect_status(observed_status, expected_status)?;
    let user = &envelope.data;
    let creation = expected_status == status::CREATED;

    if creation && user.id.is_none() {
        return Err(Error::mismatch("id", "<server-assigned id>", ABSENT)
            .with_message("created resource has no id")
            .with_status(observed_status));
    }

    for binding in BINDINGS.iter() {
        let actual = binding.read(user);
        let expected = match attributes.get(binding.key()) {
            Some(expected) => Some(expected),
            // Fields an update did not touch must equal their own current value.
            None if !creation => actual,
            None => continue,
        };
        let Some(expected) = expected else {
            continue;
        };
        match actual {
            Some(actual) if compare.matches(expected, actual) => {}
            other => {
                return Err(Error::mismatch(binding.key(), expected, other.unwrap_or(ABSENT))
                    .with_status(observed_status));
            }
        }
    }

    tracing::debug!(
        status = observed_status,
        checked = attributes.len(),
        "success envelope matched attributes"
    );
    Ok(())
}

pub fn assert_failure(
    envelope: &Envelope<Vec<FieldError>>,
    index: usize,
    expected_field: &str,
    expected_message: &str,
) -> Verdict {
    if let Some(meta) = &envelope.meta {
        return Err(Error::mismatch("meta", "null", meta.to_string())
            .with_message("error envelope must not carry meta"));
    }
    let Some(error) = envelope.data.get(index) else {
        return Err(Error::mismatch(
            format!("data[{index}]"),
            format!("{expected_field}: {expected_message}"),
            ABSENT,
        )
        .with_message(format!(
            "error list has {} entries",
            envelope.data.len()
        )));
    };
    if error.field != expected_field {
        return Err(Error::mismatch(
            format!("data[{index}].field"),
            expected_field,
            error.field.as_str(),
        ));
    }
    if error.message != expected_message {
        return Err(Error::mismatch(
            format!("data[{index}].message"),
            expected_message,
            error.message.as_str(),
        )
        .with_hint(format!("error field: {}", error.field)));
    }
    Ok(())
}
