use std::{
    fmt,
    hash::{Hash, Hasher},
};

use uuid::Uuid;

use crate::{
    domain::{Value, ValueKind},
    storage::codec::{self, DecodeError, EncodeError},
};

/// The kind of value a requirement accepts, with a stable identity.
///
/// Two types are equal when their identity and version match. The wrapped
/// [`ValueKind`] never takes part in equality, so two distinct text-based types
/// (say, a hostname and a free-form label) remain distinct.
#[derive(Debug, Clone)]
pub struct RequirementType {
    id: Uuid,
    version: u32,
    name: String,
    kind: ValueKind,
}

const BOOLEAN_ID: Uuid = Uuid::from_u128(0x5d1a_2b0e_6c1f_4a8e_9e3b_1f7c_0000_0001);
const INTEGER_ID: Uuid = Uuid::from_u128(0x5d1a_2b0e_6c1f_4a8e_9e3b_1f7c_0000_0002);
const TEXT_ID: Uuid = Uuid::from_u128(0x5d1a_2b0e_6c1f_4a8e_9e3b_1f7c_0000_0003);
const PATH_ID: Uuid = Uuid::from_u128(0x5d1a_2b0e_6c1f_4a8e_9e3b_1f7c_0000_0004);
const INTEGER_LIST_ID: Uuid = Uuid::from_u128(0x5d1a_2b0e_6c1f_4a8e_9e3b_1f7c_0000_0102);
const TEXT_LIST_ID: Uuid = Uuid::from_u128(0x5d1a_2b0e_6c1f_4a8e_9e3b_1f7c_0000_0103);
const PATH_LIST_ID: Uuid = Uuid::from_u128(0x5d1a_2b0e_6c1f_4a8e_9e3b_1f7c_0000_0104);

impl RequirementType {
    /// Declare a new type.
    #[must_use]
    pub fn new(id: Uuid, version: u32, name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            id,
            version,
            name: name.into(),
            kind,
        }
    }

    /// The built-in boolean type.
    #[must_use]
    pub fn boolean() -> Self {
        Self::new(BOOLEAN_ID, 1, "boolean", ValueKind::Boolean)
    }

    /// The built-in integer type.
    #[must_use]
    pub fn integer() -> Self {
        Self::new(INTEGER_ID, 1, "integer", ValueKind::Integer)
    }

    /// The built-in text type.
    #[must_use]
    pub fn text() -> Self {
        Self::new(TEXT_ID, 1, "text", ValueKind::Text)
    }

    /// The built-in path type.
    #[must_use]
    pub fn path() -> Self {
        Self::new(PATH_ID, 1, "path", ValueKind::Path)
    }

    /// The built-in list-of-integers type.
    #[must_use]
    pub fn integer_list() -> Self {
        Self::new(
            INTEGER_LIST_ID,
            1,
            "integer list",
            ValueKind::list_of(ValueKind::Integer),
        )
    }

    /// The built-in list-of-text type.
    #[must_use]
    pub fn text_list() -> Self {
        Self::new(
            TEXT_LIST_ID,
            1,
            "text list",
            ValueKind::list_of(ValueKind::Text),
        )
    }

    /// The built-in list-of-paths type.
    #[must_use]
    pub fn path_list() -> Self {
        Self::new(
            PATH_LIST_ID,
            1,
            "path list",
            ValueKind::list_of(ValueKind::Path),
        )
    }

    /// The built-in type for a value kind, if there is one.
    #[must_use]
    pub fn builtin(kind: &ValueKind) -> Option<Self> {
        match kind {
            ValueKind::Boolean => Some(Self::boolean()),
            ValueKind::Integer => Some(Self::integer()),
            ValueKind::Text => Some(Self::text()),
            ValueKind::Path => Some(Self::path()),
            ValueKind::List(element) => match element.as_ref() {
                ValueKind::Integer => Some(Self::integer_list()),
                ValueKind::Text => Some(Self::text_list()),
                ValueKind::Path => Some(Self::path_list()),
                _ => None,
            },
        }
    }

    /// The stable identity of this type.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The version of this type.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// A human-readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The kind of value this type wraps.
    #[must_use]
    pub const fn kind(&self) -> &ValueKind {
        &self.kind
    }

    /// Encode a value of this type to its string form.
    ///
    /// # Errors
    ///
    /// Fails if the value does not conform to this type, or if it contains a
    /// path that is not valid UTF-8.
    pub fn encode(&self, value: &Value) -> Result<String, EncodeError> {
        codec::encode(&self.kind, value)
    }

    /// Decode a value of this type from its string form.
    ///
    /// # Errors
    ///
    /// Fails if `raw` is not a valid encoding for this type's kind.
    pub fn decode(&self, raw: &str) -> Result<Value, DecodeError> {
        codec::decode(&self.kind, raw)
    }
}

impl PartialEq for RequirementType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.version == other.version
    }
}

impl Eq for RequirementType {}

impl Hash for RequirementType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.version.hash(state);
    }
}

impl fmt::Display for RequirementType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} (v{})", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_kind() {
        let id = Uuid::new_v4();
        let hostname = RequirementType::new(id, 1, "hostname", ValueKind::Text);
        let renamed = RequirementType::new(id, 1, "host", ValueKind::Integer);
        assert_eq!(hostname, renamed);
    }

    #[test]
    fn same_kind_different_identity_is_unequal() {
        let hostname = RequirementType::new(Uuid::new_v4(), 1, "hostname", ValueKind::Text);
        assert_ne!(hostname, RequirementType::text());
    }

    #[test]
    fn version_participates_in_equality() {
        let id = Uuid::new_v4();
        let v1 = RequirementType::new(id, 1, "hostname", ValueKind::Text);
        let v2 = RequirementType::new(id, 2, "hostname", ValueKind::Text);
        assert_ne!(v1, v2);
    }

    #[test]
    fn builtins_resolve_by_kind() {
        assert_eq!(
            RequirementType::builtin(&ValueKind::list_of(ValueKind::Text)),
            Some(RequirementType::text_list())
        );
        assert_eq!(
            RequirementType::builtin(&ValueKind::list_of(ValueKind::Boolean)),
            None
        );
    }
}
