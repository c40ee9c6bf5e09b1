//! Filesystem Blob Storage
//!
//! This crate stores opaque byte streams as individual files beneath a single root
//! directory and hands back an [`Identifier`] for each one. Blobs are later read,
//! memory-mapped, listed or deleted by that identifier.
//!
//! ## Design Principles
//!
//! - Blobs are immutable once created; there is no update operation
//! - One identifier maps to exactly one file path, and every path the store writes maps back
//!   to exactly one identifier
//! - The directory tree *is* the persisted state: no sidecar metadata files are written
//! - Directories are sharded from the identifier's own characters to bound fan-out
//! - Empty ancestor directories are pruned on delete, never the root itself
//!
//! ## Storage Layout
//!
//! With the default dash-segmented mapper each UUID group becomes one directory level:
//!
//! ```text
//! <root>/
//! └── 550e8400/
//!     └── e29b/
//!         └── 41d4/
//!             └── a716/
//!                 └── 446655440000     # the blob's bytes
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use blobfs_files::FileSystemStore;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = FileSystemStore::new(Path::new("blob_data"))?;
//!
//! let id = store.create(&b"hello"[..])?;
//! assert_eq!(store.read_bytes(&id)?, b"hello");
//!
//! store.delete(&id)?;
//! assert!(store.list()?.is_empty());
//! # Ok(())
//! # }
//! ```

mod config;
mod constants;
mod mapper;
mod ownership;
mod store;

pub use blobfs_types::{Identifier, NonEmptyText, TextError};
pub use blobfs_uuid::{GeneratorKind, IdentifierGenerator, UuidGenerator};
pub use config::{
    generator_kind_from_env_value, mapper_kind_from_env_value, optional_text_from_env_value,
    StoreConfig,
};
pub use constants::{
    DEFAULT_ROOT_DIR, DEFAULT_SEGMENT_WIDTH, ENV_ID_GENERATOR, ENV_PATH_MAPPER, ENV_ROOT_DIR,
    ENV_UNIX_OWNER, ENV_UNIX_PERMISSIONS,
};
pub use mapper::{DashSegmentedMapper, FixedWidthMapper, MapperKind, PathMapper};
pub use ownership::{
    CommandEnforcer, CommandOutcome, CommandRunner, NoopEnforcer, OwnershipEnforcer,
    SystemCommandRunner,
};
pub use store::FileSystemStore;

/// Errors that can occur during blob store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Root directory could not be created or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Identifier, path or configuration value rejected before touching the filesystem
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A blob is already stored under this identifier
    #[error("Blob {0} already exists")]
    AlreadyExists(String),

    /// No blob is stored under this identifier
    #[error("Blob {0} not found")]
    NotFound(String),

    /// An ownership or permission command exited unsuccessfully
    #[error("{program} failed on {path} ({status}): {stderr}")]
    CommandFailed {
        program: String,
        path: String,
        status: String,
        stderr: String,
    },

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TextError> for StoreError {
    fn from(e: TextError) -> Self {
        StoreError::InvalidArgument(e.to_string())
    }
}

impl From<blobfs_uuid::UuidError> for StoreError {
    fn from(e: blobfs_uuid::UuidError) -> Self {
        StoreError::InvalidArgument(e.to_string())
    }
}

/// Coarse classification of [`StoreError`] for callers that only care about the outcome.
///
/// `AlreadyExists` and `NotFound` are expected, recoverable results; `Io` is an
/// environment-level fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AlreadyExists,
    NotFound,
    Io,
    InvalidArgument,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            StoreError::InvalidRootDirectory(_)
            | StoreError::CommandFailed { .. }
            | StoreError::Io(_) => ErrorKind::Io,
        }
    }
}

/// Result type for blob store operations.
pub type StoreResult<T> = Result<T, StoreError>;
