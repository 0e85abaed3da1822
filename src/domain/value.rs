//! The closed set of value kinds a requirement can accept.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// The kind of value a requirement type wraps.
///
/// Scalar kinds map to a single [`Value`] variant. [`ValueKind::List`] marks a
/// collection-valued requirement whose elements all share the inner kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// `true` or `false`.
    Boolean,
    /// A signed 64-bit integer.
    Integer,
    /// Free text.
    Text,
    /// A filesystem path.
    Path,
    /// A collection of values of the inner kind.
    List(Box<Self>),
}

impl ValueKind {
    /// A list of the given element kind.
    #[must_use]
    pub fn list_of(element: Self) -> Self {
        Self::List(Box::new(element))
    }

    /// Whether values of this kind are collections.
    #[must_use]
    pub const fn is_collection(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// The kind of each element for a collection, or the kind itself for a
    /// scalar.
    #[must_use]
    pub fn element(&self) -> &Self {
        match self {
            Self::List(inner) => inner,
            scalar => scalar,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "boolean"),
            Self::Integer => write!(f, "integer"),
            Self::Text => write!(f, "text"),
            Self::Path => write!(f, "path"),
            Self::List(inner) => write!(f, "list<{inner}>"),
        }
    }
}

/// A concrete value bound to a requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// A boolean value.
    Boolean(bool),
    /// An integer value.
    Integer(i64),
    /// A text value.
    Text(String),
    /// A path value.
    Path(PathBuf),
    /// A collection of values.
    List(Vec<Self>),
}

impl Value {
    /// Whether this value can be stored under the given kind.
    ///
    /// Lists conform when every element conforms to the element kind, so an
    /// empty list conforms to any list kind.
    #[must_use]
    pub fn conforms_to(&self, kind: &ValueKind) -> bool {
        match (self, kind) {
            (Self::Boolean(_), ValueKind::Boolean)
            | (Self::Integer(_), ValueKind::Integer)
            | (Self::Text(_), ValueKind::Text)
            | (Self::Path(_), ValueKind::Path) => true,
            (Self::List(items), ValueKind::List(element)) => {
                items.iter().all(|item| item.conforms_to(element))
            }
            _ => false,
        }
    }

    /// A short description of this value's kind, used in diagnostics.
    #[must_use]
    pub fn describe_kind(&self) -> String {
        match self {
            Self::Boolean(_) => ValueKind::Boolean.to_string(),
            Self::Integer(_) => ValueKind::Integer.to_string(),
            Self::Text(_) => ValueKind::Text.to_string(),
            Self::Path(_) => ValueKind::Path.to_string(),
            Self::List(items) => items
                .first()
                .map_or_else(|| "list".to_string(), |first| {
                    format!("list<{}>", first.describe_kind())
                }),
        }
    }

    /// The elements of a collection value, or `None` for a scalar.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// The text of a text value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Convert to a strongly-typed value, or `None` on a kind mismatch.
    #[must_use]
    pub fn to<T: FromValue>(&self) -> Option<T> {
        T::from_value(self)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value:?}"),
            Self::Path(value) => write!(f, "{}", value.display()),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl PartialEq<str> for Value {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Self {
        Self::Integer(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<PathBuf> for Value {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for Value {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// Types that can be extracted from a [`Value`] without panicking.
pub trait FromValue: Sized {
    /// Returns `None` when the value has a different kind.
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Boolean(value) => Some(*value),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }
}

impl FromValue for u16 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(value) => Self::try_from(*value).ok(),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(ToString::to_string)
    }
}

impl FromValue for PathBuf {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Path(path) => Some(path.clone()),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_list()?.iter().map(T::from_value).collect()
    }
}
