//! Purpose: Public surface of the user-management contract harness.
//! Exports: Transports, target config, users endpoints, response checks, the scenario suite,
//! the in-memory reference API, and the core engine types they operate on.
//! Role: The only path binaries and integration tests use to reach the engine.
//! Invariants: Internal modules stay private; everything callers need is re-exported here.

mod checks;
mod config;
mod reference;
mod suite;
mod transport;
mod users;

pub use crate::core::attributes::{Attribute, AttributeMap};
pub use crate::core::envelope::{
    BareErrorList, BareSingleSuccess, Decoded, Envelope, ErrorList, FieldError, Shape, ShapeTag,
    SingleSuccess, User, Wrapping, decode, decode_tagged,
};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::fixtures::{generate, unique_email};
pub use crate::core::request::{UserPayload, build};
pub use crate::core::verdict::{Compare, Verdict, assert_failure, assert_success, status};
pub use checks::{
    attributes_of, expect_field_error, expect_status, expect_success, expect_success_with,
    expect_update_consistent,
};
pub use config::{BASE_URL_ENV, DEFAULT_TIMEOUT, TIMEOUT_ENV, TOKEN_ENV, TargetConfig};
pub use reference::ReferenceApi;
pub use suite::{
    FailureReport, SCENARIOS, Scenario, ScenarioContext, ScenarioOutcome, SuiteReport, find,
    run_suite,
};
pub use transport::{HttpTransport, LocalTransport, Method, RawResponse, Transport};
pub use users::{ApiVersion, UsersApi};
