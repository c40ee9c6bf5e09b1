//! Identifier generation for blob storage.
//!
//! Every blob written without a caller-supplied name receives an identifier from an
//! [`IdentifierGenerator`]. The store treats the result as an opaque key; only the path
//! mapper ever looks inside it.
//!
//! ## Generators
//!
//! - [`UuidGenerator`] (default): random version 4 UUIDs in the hyphenated 36-character form,
//!   e.g. `550e8400-e29b-41d4-a716-446655440000`.
//! - [`TimestampIdGenerator`]: time-prefixed identifiers of the form
//!   `YYYYMMDDTHHMMSS.mmmZ-<32 hex uuid>`, strictly increasing per generator instance.
//! - [`SequentialGenerator`]: zero-padded counters with an optional prefix, for tooling and
//!   tests that need predictable names.
//!
//! ## Uniqueness
//!
//! Generators must produce values with negligible collision probability for the lifetime of
//! a store. A broken generator is not detected here: it surfaces later as an
//! "already exists" error when the store tries to create the colliding blob.

mod service;

use std::fmt;
use std::str::FromStr;

pub use blobfs_types::Identifier;
pub use service::{
    SequentialGenerator, TimestampId, TimestampIdGenerator, Uuid, UuidGenerator,
};

/// Error type for identifier generation and parsing.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;

/// Produces new blob identifiers on demand.
///
/// Implementations must not touch the store's filesystem state.
pub trait IdentifierGenerator: Send + Sync + fmt::Debug {
    /// Returns a fresh identifier.
    fn generate(&self) -> Identifier;
}

/// The generator strategies selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeneratorKind {
    #[default]
    Uuid,
    Timestamp,
    Sequential,
}

impl GeneratorKind {
    /// Builds a boxed generator of this kind.
    pub fn build(self) -> Box<dyn IdentifierGenerator> {
        match self {
            GeneratorKind::Uuid => Box::new(UuidGenerator),
            GeneratorKind::Timestamp => Box::new(TimestampIdGenerator::new()),
            GeneratorKind::Sequential => Box::new(SequentialGenerator::default()),
        }
    }

    /// Configuration name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            GeneratorKind::Uuid => "uuid",
            GeneratorKind::Timestamp => "timestamp",
            GeneratorKind::Sequential => "sequential",
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeneratorKind {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uuid" => Ok(GeneratorKind::Uuid),
            "timestamp" => Ok(GeneratorKind::Timestamp),
            "sequential" => Ok(GeneratorKind::Sequential),
            other => Err(UuidError::InvalidInput(format!(
                "unknown identifier generator '{}' (expected uuid, timestamp or sequential)",
                other
            ))),
        }
    }
}
