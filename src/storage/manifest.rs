//! TOML manifests declaring requirement sets, and TOML binding files.
//!
//! A manifest lists requirements as `[[requirements]]` tables:
//!
//! ```toml
//! _version = "1"
//!
//! [[requirements]]
//! name = "log-level"
//! type = "text"
//! allowed = [{ value = "debug" }, { value = "info" }]
//!
//! [[requirements]]
//! name = "log-file"
//! type = "path"
//! optional = true
//! depends_on = ["log-level"]
//! ```
//!
//! A bindings file is a flat table of `name = value` pairs.

use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{
    BindingKey, BoundsError, CollectionInfo, DeclarationError, Requirement, RequirementSet,
    RequirementSetError, RequirementType, SetRestrictionInfo, Value, ValueKind,
};

/// Requirements declared without an explicit `id` get a UUID v5 derived from
/// their name in this namespace, so ids are stable across loads.
const NAME_NAMESPACE: Uuid = Uuid::from_u128(0x8c4f_1e2a_7b3d_4f60_a1c9_52e7_d0b3_6a14);

/// Errors raised while loading a manifest or bindings file.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The file could not be read.
    #[error("failed to read {}", path.display())]
    Read {
        /// The file that was being read.
        path: PathBuf,
        /// The underlying IO failure.
        source: io::Error,
    },

    /// The file could not be written.
    #[error("failed to write {}", path.display())]
    Write {
        /// The file that was being written.
        path: PathBuf,
        /// The underlying IO failure.
        source: io::Error,
    },

    /// The file is not valid TOML, or does not match the expected layout.
    #[error("failed to parse manifest")]
    Parse(#[from] toml::de::Error),

    /// The manifest could not be serialized.
    #[error("failed to serialize manifest")]
    Serialize(#[from] toml::ser::Error),

    /// A TOML value has no counterpart in the value model.
    #[error("'{name}' has a {found} value, which is not supported")]
    UnsupportedValue {
        /// The requirement or binding the value belongs to.
        name: String,
        /// The TOML type of the value.
        found: &'static str,
    },

    /// A requirement declares invalid count bounds.
    #[error("requirement '{requirement}' has invalid bounds")]
    Bounds {
        /// The requirement's name.
        requirement: String,
        /// The bounds failure.
        source: BoundsError,
    },

    /// A requirement declaration is inconsistent.
    #[error("requirement '{requirement}' is invalid")]
    Declaration {
        /// The requirement's name.
        requirement: String,
        /// The declaration failure.
        source: DeclarationError,
    },

    /// A relation names a requirement the manifest does not declare.
    #[error("requirement '{requirement}' refers to undeclared requirement '{target}'")]
    UnknownRelation {
        /// The requirement declaring the relation.
        requirement: String,
        /// The undeclared name.
        target: String,
    },

    /// The requirements and relations do not form a valid set.
    #[error(transparent)]
    Set(#[from] RequirementSetError),
}

/// The scalar type of a requirement, or of each element of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    /// `true` or `false`.
    Boolean,
    /// A signed 64-bit integer.
    Integer,
    /// Free text.
    Text,
    /// A filesystem path, written as a string.
    Path,
}

impl From<ScalarType> for ValueKind {
    fn from(scalar: ScalarType) -> Self {
        match scalar {
            ScalarType::Boolean => Self::Boolean,
            ScalarType::Integer => Self::Integer,
            ScalarType::Text => Self::Text,
            ScalarType::Path => Self::Path,
        }
    }
}

/// One allowed value, with optional occurrence bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllowedEntry {
    /// The allowed value.
    pub value: toml::Value,
    /// The minimum number of occurrences in a collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_times: Option<usize>,
    /// The maximum number of occurrences in a collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_times: Option<usize>,
}

/// The declaration of one requirement in a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequirementEntry {
    /// The unique name.
    pub name: String,
    /// An explicit identity. Derived from the name when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// A human-readable description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// The value type (or element type, for a list).
    #[serde(rename = "type")]
    pub scalar: ScalarType,
    /// Whether the requirement takes a list of values.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub list: bool,
    /// Whether the requirement may be left unbound.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    /// The minimum number of list elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_count: Option<usize>,
    /// The maximum number of list elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_count: Option<usize>,
    /// The names of the requirements this one depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// The names of the requirements this one is exclusive with.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusive_with: Vec<String>,
    /// The allowed values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<AllowedEntry>,
}

impl RequirementEntry {
    /// The identity of the declared requirement.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
            .unwrap_or_else(|| Uuid::new_v5(&NAME_NAMESPACE, self.name.as_bytes()))
    }

    fn kind(&self) -> ValueKind {
        let scalar = self.scalar.into();
        if self.list {
            ValueKind::list_of(scalar)
        } else {
            scalar
        }
    }

    fn to_requirement(&self) -> Result<Requirement, ManifestError> {
        let kind = self.kind();
        let requirement_type = RequirementType::builtin(&kind).unwrap_or_else(|| {
            let name = kind.to_string();
            RequirementType::new(
                Uuid::new_v5(&NAME_NAMESPACE, name.as_bytes()),
                1,
                name,
                kind.clone(),
            )
        });

        let mut builder = Requirement::builder(&self.name, requirement_type)
            .id(self.id())
            .description(&self.description)
            .set_optional(self.optional);

        if self.min_count.is_some() || self.max_count.is_some() {
            let collection = CollectionInfo::new(self.min_count, self.max_count).map_err(
                |source| ManifestError::Bounds {
                    requirement: self.name.clone(),
                    source,
                },
            )?;
            builder = builder.collection(collection);
        }

        for allowed in &self.allowed {
            let value = coerce(self.scalar, to_value(&self.name, allowed.value.clone())?);
            let info = SetRestrictionInfo::new(value, allowed.min_times, allowed.max_times)
                .map_err(|source| ManifestError::Bounds {
                    requirement: self.name.clone(),
                    source,
                })?;
            builder = builder.allow(info);
        }

        builder.build().map_err(|source| ManifestError::Declaration {
            requirement: self.name.clone(),
            source,
        })
    }
}

/// A requirement set declared in TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Manifest {
    requirements: Vec<RequirementEntry>,
}

impl Manifest {
    /// Create a manifest from requirement declarations.
    #[must_use]
    pub const fn new(requirements: Vec<RequirementEntry>) -> Self {
        Self { requirements }
    }

    /// Load a manifest from a TOML file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not a valid manifest.
    #[instrument(level = "debug")]
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest = Self::from_toml_str(&content)?;
        debug!(requirements = manifest.requirements.len(), "manifest loaded");
        Ok(manifest)
    }

    /// Parse a manifest from TOML text.
    ///
    /// # Errors
    ///
    /// Fails if the text is not a valid manifest.
    pub fn from_toml_str(content: &str) -> Result<Self, ManifestError> {
        Ok(toml::from_str(content)?)
    }

    /// Save the manifest to a TOML file.
    ///
    /// # Errors
    ///
    /// Fails if the manifest cannot be serialized or the file cannot be
    /// written.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ManifestError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The declared requirements, in declaration order.
    #[must_use]
    pub fn requirements(&self) -> &[RequirementEntry] {
        &self.requirements
    }

    /// Build the declared requirement set.
    ///
    /// # Errors
    ///
    /// Fails if a declaration is invalid, a relation names an undeclared
    /// requirement, or the relations are not a valid forest.
    pub fn requirement_set(&self) -> Result<RequirementSet, ManifestError> {
        let requirements = self
            .requirements
            .iter()
            .map(RequirementEntry::to_requirement)
            .collect::<Result<Vec<_>, _>>()?;

        let by_name: HashMap<&str, &Requirement> = requirements
            .iter()
            .map(|requirement| (requirement.name(), requirement))
            .collect();
        let resolve = |entry: &RequirementEntry, target: &str| {
            by_name
                .get(target)
                .copied()
                .ok_or_else(|| ManifestError::UnknownRelation {
                    requirement: entry.name.clone(),
                    target: target.to_string(),
                })
        };

        let mut builder = RequirementSet::builder().requirements(requirements.iter().cloned());
        for (entry, requirement) in self.requirements.iter().zip(&requirements) {
            for target in &entry.depends_on {
                builder = builder.depends_on(requirement, resolve(entry, target)?)?;
            }
            for target in &entry.exclusive_with {
                builder = builder.exclusive_with(requirement, resolve(entry, target)?)?;
            }
        }

        Ok(builder.build()?)
    }
}

/// The serialized versions of the manifest.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default)]
        requirements: Vec<RequirementEntry>,
    },
}

impl From<Versions> for Manifest {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 { requirements } => Self { requirements },
        }
    }
}

impl From<Manifest> for Versions {
    fn from(manifest: Manifest) -> Self {
        Self::V1 {
            requirements: manifest.requirements,
        }
    }
}

/// Values to bind, keyed by requirement name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct BindingsFile {
    table: toml::Table,
}

impl BindingsFile {
    /// Load bindings from a TOML file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not a TOML table.
    #[instrument(level = "debug")]
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse bindings from TOML text.
    ///
    /// # Errors
    ///
    /// Fails if the text is not a TOML table.
    pub fn from_toml_str(content: &str) -> Result<Self, ManifestError> {
        Ok(toml::from_str(content)?)
    }

    /// Convert the bindings into values for `source`, in file order.
    ///
    /// Strings bound to path requirements become paths. Names that `source`
    /// does not declare are passed through, so that binding them reports
    /// the unknown requirement.
    ///
    /// # Errors
    ///
    /// Fails if a value is a float, datetime or table.
    pub fn bindings(
        &self,
        source: &RequirementSet,
    ) -> Result<Vec<(BindingKey, Value)>, ManifestError> {
        self.table
            .iter()
            .map(|(name, raw)| {
                let value = to_value(name, raw.clone())?;
                let value = match source
                    .find_by_name(name)
                    .map(|requirement| requirement.requirement_type().kind().element())
                {
                    Some(ValueKind::Path) => coerce(ScalarType::Path, value),
                    _ => value,
                };
                Ok((BindingKey::from(name.as_str()), value))
            })
            .collect()
    }
}

fn to_value(name: &str, raw: toml::Value) -> Result<Value, ManifestError> {
    match raw {
        toml::Value::Boolean(value) => Ok(Value::Boolean(value)),
        toml::Value::Integer(value) => Ok(Value::Integer(value)),
        toml::Value::String(value) => Ok(Value::Text(value)),
        toml::Value::Array(items) => items
            .into_iter()
            .map(|item| to_value(name, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        other => Err(ManifestError::UnsupportedValue {
            name: name.to_string(),
            found: other.type_str(),
        }),
    }
}

/// TOML has no path type, so path values arrive as text.
fn coerce(scalar: ScalarType, value: Value) -> Value {
    match (scalar, value) {
        (ScalarType::Path, Value::Text(text)) => Value::Path(PathBuf::from(text)),
        (ScalarType::Path, Value::List(items)) => Value::List(
            items
                .into_iter()
                .map(|item| coerce(ScalarType::Path, item))
                .collect(),
        ),
        (_, value) => value,
    }
}
