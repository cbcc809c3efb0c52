//! Purpose: Static attribute-name to typed accessor/mutator bindings.
//! Exports: `FieldBinding`, `BINDINGS`, `binding`, `binding_for`.
//! Role: Replaces per-test branching on attribute names for both builder and validator.
//! Invariants: Exactly one binding per `Attribute`, in `Attribute::ALL` order.
use super::attributes::Attribute;
use super::envelope::User;
use super::request::UserPayload;

pub struct FieldBinding {
    pub attribute: Attribute,
    read: fn(&User) -> Option<&str>,
    write: fn(&mut UserPayload, String),
}

impl FieldBinding {
    pub fn key(&self) -> &'static str {
        self.attribute.key()
    }

    pub fn read<'a>(&self, user: &'a User) -> Option<&'a str> {
        (self.read)(user)
    }

    pub fn write(&self, payload: &mut UserPayload, value: String) {
        (self.write)(payload, value)
    }
}

pub static BINDINGS: [FieldBinding; 4] = [
    FieldBinding {
        attribute: Attribute::Name,
        read: read_name,
        write: write_name,
    },
    FieldBinding {
        attribute: Attribute::Email,
        read: read_email,
        write: write_email,
    },
    FieldBinding {
        attribute: Attribute::Gender,
        read: read_gender,
        write: write_gender,
    },
    FieldBinding {
        attribute: Attribute::Status,
        read: read_status,
        write: write_status,
    },
];

pub fn binding(key: &str) -> Option<&'static FieldBinding> {
    Attribute::from_key(key).map(binding_for)
}

pub fn binding_for(attribute: Attribute) -> &'static FieldBinding {
    let index = match attribute {
        Attribute::Name => 0,
        Attribute::Email => 1,
        Attribute::Gender => 2,
        Attribute::Status => 3,
    };
    &BINDINGS[index]
}

fn read_name(user: &User) -> Option<&str> {
    user.name.as_deref()
}

fn read_email(user: &User) -> Option<&str> {
    user.email.as_deref()
}

fn read_gender(user: &User) -> Option<&str> {
    user.gender.as_deref()
}

fn read_status(user: &User) -> Option<&str> {
    user.status.as_deref()
}

fn write_name(payload: &mut UserPayload, value: String) {
    payload.name = Some(value);
}

fn write_email(payload: &mut UserPayload, value: String) {
    payload.email = Some(value);
}

fn write_gender(payload: &mut UserPayload, value: String) {
    payload.gender = Some(value);
}

fn write_status(payload: &mut UserPayload, value: String) {
    payload.status = Some(value);
}

#[cfg(test)]
mod tests {
    use super::{BINDINGS, binding, binding_for};
    use crate::core::attributes::Attribute;
    use crate::core::envelope::User;
    use crate::core::request::UserPayload;

    #[test]
    fn bindings_follow_attribute_order() {
        for (binding, attribute) in BINDINGS.iter().zip(Attribute::ALL) {
            assert_eq!(binding.attribute, attribute);
            assert_eq!(binding_for(attribute).key(), attribute.key());
        }
        assert!(binding("id").is_none());
    }

    #[test]
    fn read_and_write_touch_the_matching_field_only() {
        let mut payload = UserPayload::default();
        binding_for(Attribute::Gender).write(&mut payload, "female".to_string());
        assert_eq!(payload.gender.as_deref(), Some("female"));
        assert!(payload.name.is_none());
        assert!(payload.email.is_none());
        assert!(payload.status.is_none());

        let user = User {
            id: Some(7),
            name: Some("Ada Lovelace".to_string()),
            email: None,
            gender: None,
            status: Some("active".to_string()),
        };
        assert_eq!(
            binding("name").and_then(|b| b.read(&user)),
            Some("Ada Lovelace")
        );
        assert_eq!(binding("email").and_then(|b| b.read(&user)), None);
        assert_eq!(binding("status").and_then(|b| b.read(&user)), Some("active"));
    }
}
