//! Purpose: Generate plausible random attribute values for scenario fixtures.
//! Exports: `generate`, `unique_email`.
//! Role: Fixture-data collaborator; the assertion engine never generates data itself.
//! Invariants: Generated emails carry the `fake_` prefix and a random hex tag.
//! Invariants: Gender and status values are always legal lowercase enum values.
use super::attributes::{Attribute, AttributeMap};
use super::error::{Error, ErrorKind};
use getrandom::fill as fill_random;

const FIRST_NAMES: [&str; 8] = [
    "Ada", "Grace", "Alan", "Edsger", "Barbara", "Donald", "Frances", "Ken",
];
const LAST_NAMES: [&str; 8] = [
    "Lovelace", "Hopper", "Turing", "Dijkstra", "Liskov", "Knuth", "Allen", "Thompson",
];
const GENDERS: [&str; 2] = ["male", "female"];
const STATUSES: [&str; 2] = ["active", "inactive"];

pub fn generate(kinds: &[Attribute]) -> Result<AttributeMap, Error> {
    let mut attributes = AttributeMap::new();
    for kind in kinds {
        let value = match kind {
            Attribute::Name => format!(
                "{} {}",
                pick(&FIRST_NAMES)?,
                pick(&LAST_NAMES)?
            ),
            Attribute::Email => unique_email()?,
            Attribute::Gender => pick(&GENDERS)?.to_string(),
            Attribute::Status => pick(&STATUSES)?.to_string(),
        };
        attributes.set(*kind, value);
    }
    Ok(attributes)
}

pub fn unique_email() -> Result<String, Error> {
    let mut bytes = [0u8; 6];
    fill_random(&mut bytes).map_err(random_error)?;
    let tag: String = bytes.iter().map(|byte| format!("{byte:02x}")).collect();
    Ok(format!("fake_{tag}@example.com"))
}

fn pick<'a>(options: &[&'a str]) -> Result<&'a str, Error> {
    let mut byte = [0u8; 1];
    fill_random(&mut byte).map_err(random_error)?;
    Ok(options[byte[0] as usize % options.len()])
}

fn random_error(err: getrandom::Error) -> Error {
    Error::new(ErrorKind::Internal).with_message(format!("failed to read os randomness: {err}"))
}
