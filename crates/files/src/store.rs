//! Filesystem-backed blob store implementation
//!
//! This module provides [`FileSystemStore`], which orchestrates identifier generation,
//! path mapping and ownership enforcement around plain file operations beneath a single
//! root directory.
//!
//! # Operations
//!
//! - **create**: allocate (or accept) an identifier, write the stream to the mapped path,
//!   flush, then apply ownership settings
//! - **read / view**: open the mapped file as a stream, or map it read-only into memory
//! - **delete**: remove the file and prune every ancestor directory left empty, stopping at
//!   the root
//! - **list**: walk the tree and map every regular file back to its identifier
//!
//! # Concurrency
//!
//! The store holds no locks. Every operation relies on the filesystem for serialisation:
//!
//! - Files are opened with exclusive create, so two creators racing on one identifier are
//!   deterministic: one wins, the other gets [`StoreError::AlreadyExists`].
//! - A delete pruning a shared parent can remove a directory just before a concurrent create
//!   writes into it. Create recreates missing parents and retries the open.
//! - The prune walk treats "directory is empty" as a snapshot. A directory that gains an
//!   entry before removal is left in place; one that was already removed is skipped.
//!
//! # Implementation Notes
//!
//! - The root directory is created at construction and never removed by the store
//! - Strategies are injected once at construction and not mutated afterwards
//! - If ownership enforcement fails, the blob stays on disk and the error is returned

use crate::constants::CREATE_ATTEMPTS;
use crate::config::StoreConfig;
use crate::mapper::{DashSegmentedMapper, PathMapper};
use crate::ownership::{CommandEnforcer, NoopEnforcer, OwnershipEnforcer};
use crate::{StoreError, StoreResult};
use blobfs_types::Identifier;
use blobfs_uuid::{IdentifierGenerator, UuidGenerator};
use memmap2::Mmap;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

/// Blob store rooted at a single directory on the local filesystem
///
/// # Design
///
/// - Root-scoped: every path the store touches lies beneath its canonical root
/// - Immutable blobs: a path is written exactly once and never rewritten
/// - Pluggable: generator, mapper and enforcer are trait objects chosen at construction
/// - Stateless between calls: safe to share across threads behind an `Arc`
#[derive(Debug)]
pub struct FileSystemStore {
    /// Canonicalised root directory
    root_directory: PathBuf,

    generator: Box<dyn IdentifierGenerator>,
    mapper: Box<dyn PathMapper>,
    enforcer: Box<dyn OwnershipEnforcer>,
}

impl FileSystemStore {
    /// Opens a store rooted at `root_directory`, creating it (and any missing ancestors)
    ///
    /// Uses the UUID generator, the dash-segmented mapper and no ownership enforcement.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidRootDirectory`] if:
    /// - The path exists but is not a directory
    /// - The directory cannot be created
    /// - Path canonicalisation fails
    pub fn new(root_directory: &Path) -> StoreResult<Self> {
        if root_directory.exists() && !root_directory.is_dir() {
            return Err(StoreError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root_directory.display()
            )));
        }

        fs::create_dir_all(root_directory).map_err(|e| {
            StoreError::InvalidRootDirectory(format!(
                "Cannot create directory {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        let root_directory = root_directory.canonicalize().map_err(|e| {
            StoreError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        Ok(Self {
            root_directory,
            generator: Box::new(UuidGenerator),
            mapper: Box::new(DashSegmentedMapper),
            enforcer: Box::new(NoopEnforcer),
        })
    }

    /// Opens a store with the strategies named in `config`
    pub fn from_config(config: &StoreConfig) -> StoreResult<Self> {
        let enforcer = CommandEnforcer::from_settings(
            config.owner().cloned(),
            config.permissions().cloned(),
        );

        Ok(Self::new(config.root_directory())?
            .with_generator(config.generator().build())
            .with_mapper(config.mapper().build())
            .with_enforcer(enforcer))
    }

    pub fn with_generator(mut self, generator: Box<dyn IdentifierGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_mapper(mut self, mapper: Box<dyn PathMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn with_enforcer(mut self, enforcer: Box<dyn OwnershipEnforcer>) -> Self {
        self.enforcer = enforcer;
        self
    }

    /// Returns the canonicalised root directory
    #[must_use]
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    /// Stores the stream under a freshly generated identifier and returns it
    ///
    /// The stream is read to its end; callers must not reuse it afterwards.
    ///
    /// # Errors
    ///
    /// See [`Self::create_with_id`]. An [`StoreError::AlreadyExists`] here means the
    /// generator produced a colliding identifier.
    pub fn create<R: Read>(&self, reader: R) -> StoreResult<Identifier> {
        let identifier = self.generator.generate();
        self.create_with_id(reader, &identifier)?;
        Ok(identifier)
    }

    /// Stores the stream under a caller-supplied identifier
    ///
    /// The file is opened with exclusive create, then the stream is copied into it, flushed
    /// and synced. Ownership settings are applied only after the file is closed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if:
    /// - The identifier cannot be mapped to a path, or its path is an intermediate
    ///   directory of other blobs (invalid argument)
    /// - A blob already exists under this identifier
    /// - Directory creation, writing or syncing fails (I/O); the partial file is removed
    /// - Ownership enforcement fails; the blob remains stored
    pub fn create_with_id<R: Read>(&self, mut reader: R, identifier: &Identifier) -> StoreResult<()> {
        let path = self.mapper.to_path(&self.root_directory, identifier)?;

        if let Ok(metadata) = fs::metadata(&path) {
            if metadata.is_dir() {
                return Err(StoreError::InvalidArgument(format!(
                    "{} maps to directory {}, which holds other blobs",
                    identifier,
                    path.display()
                )));
            }
            return Err(StoreError::AlreadyExists(identifier.to_string()));
        }

        let mut file = open_new(&path, identifier, |_| {})?;
        debug!("Storing {} to {}", identifier, path.display());

        let written = copy_synced(&mut reader, &mut file);
        drop(file);

        let written = match written {
            Ok(n) => n,
            Err(e) => {
                self.discard_partial(&path);
                return Err(StoreError::Io(io::Error::new(
                    e.kind(),
                    format!("Failed to write blob to {}: {}", path.display(), e),
                )));
            }
        };
        trace!("Wrote {} bytes to {}", written, path.display());

        self.enforcer.apply(&path)
    }

    fn discard_partial(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove partial blob {}: {}", path.display(), e);
            return;
        }
        if let Err(e) = self.prune_empty_parents(path) {
            warn!("Failed to prune after partial blob {}: {}", path.display(), e);
        }
    }

    /// Opens the blob for streaming reads
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no blob is stored under the identifier.
    pub fn read(&self, identifier: &Identifier) -> StoreResult<File> {
        let path = self.existing_path(identifier)?;
        trace!("Reading file from {}", path.display());
        open_blob(&path, identifier)
    }

    /// Reads the whole blob into memory
    pub fn read_bytes(&self, identifier: &Identifier) -> StoreResult<Vec<u8>> {
        let mut file = self.read(identifier)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer).map_err(|e| {
            StoreError::Io(io::Error::new(
                e.kind(),
                format!("Failed to read blob {}: {}", identifier, e),
            ))
        })?;
        Ok(buffer)
    }

    /// Maps the entire blob read-only into memory
    ///
    /// The mapping is a view of the file at the time of the call; callers must not assume it
    /// reflects later external modifications while held.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no blob is stored under the identifier.
    pub fn view(&self, identifier: &Identifier) -> StoreResult<Mmap> {
        let path = self.existing_path(identifier)?;
        debug!("Mapping file {}", path.display());
        let file = open_blob(&path, identifier)?;

        // SAFETY: blobs are immutable once created and the store never writes to an
        // existing file; the map is read-only.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
            StoreError::Io(io::Error::new(
                e.kind(),
                format!("Failed to map {}: {}", path.display(), e),
            ))
        })?;
        Ok(mmap)
    }

    /// Removes the blob and prunes ancestor directories that are left empty
    ///
    /// Pruning walks upward from the file's parent and stops at the first non-empty
    /// directory, or at the root, which is never removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no blob is stored under the identifier, including
    /// when a concurrent delete removed it first.
    pub fn delete(&self, identifier: &Identifier) -> StoreResult<()> {
        let path = self.existing_path(identifier)?;
        debug!("Removing {} from store", path.display());

        fs::remove_file(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound(identifier.to_string()),
            _ => StoreError::Io(io::Error::new(
                e.kind(),
                format!("Failed to remove {}: {}", path.display(), e),
            )),
        })?;

        self.prune_empty_parents(&path)
    }

    /// Walks upward from `path`'s parent removing empty directories until the root
    fn prune_empty_parents(&self, path: &Path) -> StoreResult<()> {
        let mut current = path.parent();

        while let Some(dir) = current {
            if dir == self.root_directory || !dir.starts_with(&self.root_directory) {
                break;
            }

            match is_empty_dir(dir) {
                Ok(true) => {}
                Ok(false) => {
                    trace!("Keeping non empty directory {}", dir.display());
                    break;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    current = dir.parent();
                    continue;
                }
                Err(e) => return Err(prune_error(dir, e)),
            }

            trace!("Deleting empty directory {}", dir.display());
            match fs::remove_dir(dir) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    // Lost a race with a concurrent create: the directory is in use again.
                    if matches!(is_empty_dir(dir), Ok(false)) {
                        trace!("Directory {} gained entries, keeping it", dir.display());
                        break;
                    }
                    return Err(prune_error(dir, e));
                }
            }

            current = dir.parent();
        }

        Ok(())
    }

    /// Returns every identifier currently stored, in no particular order
    ///
    /// Directories without files contribute nothing. Files whose paths the active mapper
    /// cannot invert are logged and skipped.
    pub fn list(&self) -> StoreResult<HashSet<Identifier>> {
        let mut identifiers = HashSet::new();

        for entry in WalkDir::new(&self.root_directory).min_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                // Removed by a concurrent delete while walking.
                Err(e) if e.io_error().map(io::Error::kind) == Some(ErrorKind::NotFound) => {
                    continue
                }
                Err(e) => return Err(StoreError::Io(io::Error::from(e))),
            };

            if !entry.file_type().is_file() {
                continue;
            }

            match self.mapper.to_identifier(&self.root_directory, entry.path()) {
                Ok(identifier) => {
                    identifiers.insert(identifier);
                }
                Err(e) => warn!("Skipping unmappable file {}: {}", entry.path().display(), e),
            }
        }

        Ok(identifiers)
    }

    /// Returns `true` if a blob is stored under the identifier
    pub fn contains(&self, identifier: &Identifier) -> StoreResult<bool> {
        match self.existing_path(identifier) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Returns the path a blob with this identifier occupies (or would occupy)
    ///
    /// No existence check is made; intended for handing paths to external tools.
    pub fn resolve_path(&self, identifier: &Identifier) -> StoreResult<PathBuf> {
        self.mapper.to_path(&self.root_directory, identifier)
    }

    /// Returns the path of an existing blob
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if nothing, or only a directory, exists at the path.
    pub fn existing_path(&self, identifier: &Identifier) -> StoreResult<PathBuf> {
        let path = self.resolve_path(identifier)?;
        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => Ok(path),
            Ok(_) => Err(StoreError::NotFound(identifier.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound(identifier.to_string()))
            }
            Err(e) => Err(StoreError::Io(io::Error::new(
                e.kind(),
                format!("Failed to stat {}: {}", path.display(), e),
            ))),
        }
    }
}

/// Opens `path` for exclusive creation, recreating parent directories as needed
///
/// `before_open` runs after the parents exist and before the open itself.
fn open_new<F>(path: &Path, identifier: &Identifier, mut before_open: F) -> StoreResult<File>
where
    F: FnMut(&Path),
{
    for _attempt in 0..CREATE_ATTEMPTS {
        if let Some(parent) = path.parent() {
            match fs::create_dir_all(parent) {
                Ok(()) => {}
                // A concurrent prune removed an ancestor mid-way; start over.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(StoreError::Io(io::Error::new(
                        e.kind(),
                        format!(
                            "Failed to create storage directory {}: {}",
                            parent.display(),
                            e
                        ),
                    )))
                }
            }
        }

        before_open(path);

        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => return Ok(file),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(identifier.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!("Parent of {} vanished before open, retrying", path.display());
                continue;
            }
            Err(e) => {
                return Err(StoreError::Io(io::Error::new(
                    e.kind(),
                    format!("Failed to create file {}: {}", path.display(), e),
                )))
            }
        }
    }

    Err(StoreError::Io(io::Error::new(
        ErrorKind::NotFound,
        format!(
            "Parent directory of {} kept disappearing after {} attempts",
            path.display(),
            CREATE_ATTEMPTS
        ),
    )))
}

fn copy_synced<R: Read>(reader: &mut R, file: &mut File) -> io::Result<u64> {
    let written = io::copy(reader, file)?;
    file.flush()?;
    file.sync_all()?;
    Ok(written)
}

fn open_blob(path: &Path, identifier: &Identifier) -> StoreResult<File> {
    File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => StoreError::NotFound(identifier.to_string()),
        _ => StoreError::Io(io::Error::new(
            e.kind(),
            format!("Failed to open {}: {}", path.display(), e),
        )),
    })
}

fn is_empty_dir(dir: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(dir)?.next().is_none())
}

fn prune_error(dir: &Path, e: io::Error) -> StoreError {
    StoreError::Io(io::Error::new(
        e.kind(),
        format!("Failed to prune directory {}: {}", dir.display(), e),
    ))
}
