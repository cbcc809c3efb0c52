//! Purpose: Decode response bodies into typed `{meta, data}` envelopes.
//! Exports: `Envelope`, `User`, `FieldError`, `Wrapping`, `Shape`, shape tokens, `ShapeTag`,
//! `Decoded`, `decode`, `decode_with`, `decode_tagged`.
//! Role: Response side of the round trip; the payload type is chosen by the caller.
//! Invariants: Shape selection is static (type tokens) or explicit (`ShapeTag`), never sniffed.
//! Invariants: Malformed or mis-shaped bodies are `ErrorKind::Decode`; no partial envelopes.
//! Invariants: Bare bodies decode as `data` with `meta: None`.
use super::error::{Error, ErrorKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::error::Category;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope<T> {
    #[serde(default)]
    pub meta: Option<Value>,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self { meta: None, data }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct User {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub status: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Wrapping {
    Enveloped,
    Bare,
}

/// Type token selecting a payload type and wrapping convention.
pub trait Shape {
    type Payload: DeserializeOwned;
    const TAG: ShapeTag;
}

#[derive(Clone, Copy, Debug)]
pub struct SingleSuccess;

#[derive(Clone, Copy, Debug)]
pub struct ErrorList;

#[derive(Clone, Copy, Debug)]
pub struct BareSingleSuccess;

#[derive(Clone, Copy, Debug)]
pub struct BareErrorList;

impl Shape for SingleSuccess {
    type Payload = User;
    const TAG: ShapeTag = ShapeTag::SingleSuccess;
}

impl Shape for ErrorList {
    type Payload = Vec<FieldError>;
    const TAG: ShapeTag = ShapeTag::ErrorList;
}

impl Shape for BareSingleSuccess {
    type Payload = User;
    const TAG: ShapeTag = ShapeTag::BareSingleSuccess;
}

impl Shape for BareErrorList {
    type Payload = Vec<FieldError>;
    const TAG: ShapeTag = ShapeTag::BareErrorList;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeTag {
    SingleSuccess,
    ErrorList,
    BareSingleSuccess,
    BareErrorList,
}

impl ShapeTag {
    pub fn label(self) -> &'static str {
        match self {
            ShapeTag::SingleSuccess => "single_success",
            ShapeTag::ErrorList => "error_list",
            ShapeTag::BareSingleSuccess => "bare_single_success",
            ShapeTag::BareErrorList => "bare_error_list",
        }
    }

    pub fn wrapping(self) -> Wrapping {
        match self {
            ShapeTag::SingleSuccess | ShapeTag::ErrorList => Wrapping::Enveloped,
            ShapeTag::BareSingleSuccess | ShapeTag::BareErrorList => Wrapping::Bare,
        }
    }

    pub fn is_error_list(self) -> bool {
        matches!(self, ShapeTag::ErrorList | ShapeTag::BareErrorList)
    }

    /// Shape implied by an observed status: 422 carries field errors, anything else a user.
    pub fn for_status(status: u16, wrapping: Wrapping) -> Self {
        match (status == 422, wrapping) {
            (true, Wrapping::Enveloped) => ShapeTag::ErrorList,
            (true, Wrapping::Bare) => ShapeTag::BareErrorList,
            (false, Wrapping::Enveloped) => ShapeTag::SingleSuccess,
            (false, Wrapping::Bare) => ShapeTag::BareSingleSuccess,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Decoded {
    User(Envelope<User>),
    Errors(Envelope<Vec<FieldError>>),
}

pub fn decode<S: Shape>(body: &[u8], _shape: S) -> Result<Envelope<S::Payload>, Error> {
    decode_with::<S::Payload>(body, S::TAG.wrapping())
        .map_err(|err| err.with_hint(format!("expected shape: {}", S::TAG.label())))
}

pub fn decode_with<T: DeserializeOwned>(
    body: &[u8],
    wrapping: Wrapping,
) -> Result<Envelope<T>, Error> {
    let result = match wrapping {
        Wrapping::Enveloped => serde_json::from_slice::<Envelope<T>>(body),
        Wrapping::Bare => serde_json::from_slice::<T>(body).map(Envelope::new),
    };
    result.map_err(|err| {
        tracing::debug!(
            body_len = body.len(),
            line = err.line(),
            column = err.column(),
            "response body failed to decode"
        );
        Error::new(ErrorKind::Decode)
            .with_message(format!(
                "invalid response json ({} at line {} column {})",
                category_label(err.classify()),
                err.line(),
                err.column()
            ))
            .with_source(err)
    })
}

pub fn decode_tagged(body: &[u8], tag: ShapeTag) -> Result<Decoded, Error> {
    match tag {
        ShapeTag::SingleSuccess => decode(body, SingleSuccess).map(Decoded::User),
        ShapeTag::ErrorList => decode(body, ErrorList).map(Decoded::Errors),
        ShapeTag::BareSingleSuccess => decode(body, BareSingleSuccess).map(Decoded::User),
        ShapeTag::BareErrorList => decode(body, BareErrorList).map(Decoded::Errors),
    }
}

fn category_label(category: Category) -> &'static str {
    match category {
        Category::Io => "io",
        Category::Syntax => "syntax",
        Category::Data => "shape",
        Category::Eof => "eof",
    }
}
