// Core engine: attribute maps, request building, envelope decoding, assertions, errors.
pub mod attributes;
pub mod envelope;
pub mod error;
pub mod fields;
pub mod fixtures;
pub mod request;
pub mod verdict;
