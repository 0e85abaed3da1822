/// String encoding of values.
pub mod codec;
mod manifest;
mod record;

pub use codec::{DecodeError, EncodeError};
pub use manifest::{
    AllowedEntry, BindingsFile, Manifest, ManifestError, RequirementEntry, ScalarType,
};
pub use record::{BindingRecord, RestoreError};
