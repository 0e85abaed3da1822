//! Persistence records for configurations.
//!
//! A [`BindingRecord`] carries the requirement identity, the type identity and
//! version, and the encoded value. Restoring a configuration resolves each
//! record against a requirement set and re-validates everything, so a
//! restored configuration holds the same guarantees as a freshly built one.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    domain::{Configuration, RequirementSet, ValidationErrors},
    storage::codec::{DecodeError, EncodeError},
};

/// One persisted binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingRecord {
    /// The identity of the bound requirement.
    pub requirement: Uuid,
    /// The identity of the requirement's type.
    pub type_id: Uuid,
    /// The version of the requirement's type.
    pub type_version: u32,
    /// The value, encoded by the requirement's type.
    pub value: String,
}

/// Errors raised while restoring a configuration from records.
#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    /// A record names a requirement that is not in the set.
    #[error("requirement {0} is not part of the requirement set")]
    UnknownRequirement(Uuid),

    /// A record was written for a different type or type version.
    #[error("requirement '{requirement}' expects type {expected_id} v{expected_version}, but the record has {found_id} v{found_version}")]
    TypeMismatch {
        /// The requirement's name.
        requirement: String,
        /// The identity of the requirement's type.
        expected_id: Uuid,
        /// The version of the requirement's type.
        expected_version: u32,
        /// The type identity in the record.
        found_id: Uuid,
        /// The type version in the record.
        found_version: u32,
    },

    /// A record's value could not be decoded.
    #[error("failed to decode the value of requirement '{requirement}'")]
    Decode {
        /// The requirement's name.
        requirement: String,
        /// The decoding failure.
        source: DecodeError,
    },

    /// The decoded bindings do not form a valid configuration.
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),
}

impl Configuration {
    /// Encode every binding, in declaration order.
    ///
    /// # Errors
    ///
    /// Fails if a value cannot be encoded, for example a path that is not
    /// valid UTF-8.
    pub fn to_records(&self) -> Result<Vec<BindingRecord>, EncodeError> {
        self.iter()
            .map(|(requirement, value)| {
                let requirement_type = requirement.requirement_type();
                Ok(BindingRecord {
                    requirement: requirement.id(),
                    type_id: requirement_type.id(),
                    type_version: requirement_type.version(),
                    value: requirement_type.encode(value)?,
                })
            })
            .collect()
    }

    /// Restore a configuration from records.
    ///
    /// # Errors
    ///
    /// Fails on the first record that names an unknown requirement, carries
    /// the wrong type, or cannot be decoded. Otherwise the decoded values are
    /// bound and built together, and every violation is reported, whether it
    /// was found while binding or while building.
    #[instrument(level = "debug", skip_all, fields(records = records.len()))]
    pub fn from_records(
        source: Arc<RequirementSet>,
        records: &[BindingRecord],
    ) -> Result<Self, RestoreError> {
        let mut bindings = Vec::with_capacity(records.len());

        for record in records {
            let requirement = source
                .get(record.requirement)
                .ok_or(RestoreError::UnknownRequirement(record.requirement))?;
            let requirement_type = requirement.requirement_type();

            if (requirement_type.id(), requirement_type.version())
                != (record.type_id, record.type_version)
            {
                return Err(RestoreError::TypeMismatch {
                    requirement: requirement.name().to_string(),
                    expected_id: requirement_type.id(),
                    expected_version: requirement_type.version(),
                    found_id: record.type_id,
                    found_version: record.type_version,
                });
            }

            let value = requirement_type
                .decode(&record.value)
                .map_err(|source| RestoreError::Decode {
                    requirement: requirement.name().to_string(),
                    source,
                })?;
            bindings.push((requirement.id(), value));
        }

        Ok(Self::from_bindings(source, bindings)?)
    }
}
