//! Purpose: Response-level checks that chain status, decode, and attribute assertions.
//! Exports: `expect_status`, `expect_success`, `expect_success_with`, `expect_field_error`,
//! `expect_update_consistent`, `attributes_of`.
//! Role: Glue used by scenarios; picks the envelope shape from the API version.
//! Invariants: Status is checked before decoding so a wrong status is never reported as a
//! decode failure.
//! Invariants: Decode failures fail the check immediately; nothing is partially extracted.
use super::transport::RawResponse;
use super::users::ApiVersion;
use crate::core::attributes::AttributeMap;
use crate::core::envelope::{
    BareErrorList, BareSingleSuccess, Envelope, ErrorList, FieldError, SingleSuccess, User,
    Wrapping, decode,
};
use crate::core::fields::BINDINGS;
use crate::core::verdict::{self, Compare, Verdict, assert_failure, assert_success, status};

pub fn expect_status(response: &RawResponse, expected: u16) -> Verdict {
    verdict::expect_status(response.status, expected)
        .map_err(|err| err.with_hint(format!("response body: {}", snippet(response))))
}

pub fn expect_success(
    response: &RawResponse,
    version: ApiVersion,
    expected_status: u16,
    attributes: &AttributeMap,
) -> Verdict<User> {
    expect_success_with(response, version, expected_status, attributes, version.compare())
}

pub fn expect_success_with(
    response: &RawResponse,
    version: ApiVersion,
    expected_status: u16,
    attributes: &AttributeMap,
    compare: Compare,
) -> Verdict<User> {
    expect_status(response, expected_status)?;
    let envelope = decode_user(response, version.wrapping())?;
    assert_success(response.status, &envelope, expected_status, attributes, compare)?;
    Ok(envelope.data)
}

pub fn expect_field_error(
    response: &RawResponse,
    version: ApiVersion,
    index: usize,
    field: &str,
    message: &str,
) -> Verdict {
    expect_status(response, status::UNPROCESSABLE_ENTITY)?;
    let envelope = decode_errors(response, version.wrapping())?;
    if envelope.data.is_empty() {
        return Err(crate::core::error::Error::mismatch("data", "non-empty error list", "[]")
            .with_status(response.status));
    }
    assert_failure(&envelope, index, field, message)
}

/// Update check against a known pre-update state: untouched fields must keep `baseline`.
pub fn expect_update_consistent(
    response: &RawResponse,
    version: ApiVersion,
    baseline: &AttributeMap,
    changes: &AttributeMap,
) -> Verdict<User> {
    expect_success(response, version, status::OK, &baseline.merged(changes))
}

pub fn attributes_of(user: &User) -> AttributeMap {
    BINDINGS
        .iter()
        .filter_map(|binding| binding.read(user).map(|value| (binding.key(), value)))
        .collect()
}

fn decode_user(response: &RawResponse, wrapping: Wrapping) -> Verdict<Envelope<User>> {
    let decoded = match wrapping {
        Wrapping::Enveloped => decode(&response.body, SingleSuccess),
        Wrapping::Bare => decode(&response.body, BareSingleSuccess),
    };
    decoded.map_err(|err| err.with_status(response.status))
}

fn decode_errors(
    response: &RawResponse,
    wrapping: Wrapping,
) -> Verdict<Envelope<Vec<FieldError>>> {
    let decoded = match wrapping {
        Wrapping::Enveloped => decode(&response.body, ErrorList),
        Wrapping::Bare => decode(&response.body, BareErrorList),
    };
    decoded.map_err(|err| err.with_status(response.status))
}

fn snippet(response: &RawResponse) -> String {
    const LIMIT: usize = 200;
    let text = response.body_text();
    match text.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text,
    }
}
