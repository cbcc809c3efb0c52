//! Purpose: Build create/update request payloads from sparse attribute maps.
//! Exports: `UserPayload`, `build`.
//! Role: Request side of the round trip; pure and infallible.
//! Invariants: Absent attributes are omitted from JSON entirely, never sent as null.
//! Invariants: Values are passed through verbatim, including empty strings.
use super::attributes::AttributeMap;
use super::error::{Error, ErrorKind};
use super::fields;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl UserPayload {
    pub fn from_attributes(attributes: &AttributeMap) -> Self {
        let mut payload = UserPayload::default();
        for (key, value) in attributes.iter() {
            if let Some(binding) = fields::binding(key) {
                binding.write(&mut payload, value.to_string());
            }
        }
        payload
    }

    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode request json")
                .with_source(err)
        })
    }
}

pub fn build(attributes: &AttributeMap) -> UserPayload {
    UserPayload::from_attributes(attributes)
}

#[cfg(test)]
mod tests {
    use super::{UserPayload, build};
    use crate::core::attributes::AttributeMap;
    use serde_json::Value;

    fn encoded(attributes: &AttributeMap) -> Value {
        let json = build(attributes).to_json().expect("json");
        serde_json::from_str(&json).expect("value")
    }

    #[test]
    fn absent_keys_are_omitted_not_null() {
        let value = encoded(&AttributeMap::from([("status", "active")]));
        let object = value.as_object().expect("object");
        assert_eq!(object.len(), 1);
        assert_eq!(object.get("status").and_then(Value::as_str), Some("active"));
        assert!(!object.contains_key("name"));
        assert!(!object.contains_key("email"));
        assert!(!object.contains_key("gender"));
    }

    #[test]
    fn each_single_key_map_omits_the_other_three() {
        for key in ["name", "email", "gender", "status"] {
            let value = encoded(&AttributeMap::new().with(key, "x"));
            let object = value.as_object().expect("object");
            assert_eq!(object.len(), 1, "key {key}");
            assert_eq!(object.get(key).and_then(Value::as_str), Some("x"));
        }
    }

    #[test]
    fn empty_map_encodes_empty_object() {
        let payload = build(&AttributeMap::new());
        assert_eq!(payload, UserPayload::default());
        assert_eq!(payload.to_json().expect("json"), "{}");
    }

    #[test]
    fn empty_string_is_kept_verbatim() {
        let value = encoded(&AttributeMap::from([("email", "")]));
        assert_eq!(value["email"], Value::String(String::new()));
    }

    #[test]
    fn unknown_keys_are_dropped() {
        let payload = build(&AttributeMap::from([("name", "Ada Lovelace"), ("nickname", "ada")]));
        assert_eq!(
            payload,
            UserPayload {
                name: Some("Ada Lovelace".to_string()),
                ..UserPayload::default()
            }
        );
    }
}
