//! Constants used throughout the blob store crate.

/// Default root directory when no explicit directory is configured.
pub const DEFAULT_ROOT_DIR: &str = "blob_data";

/// Characters per directory level for the fixed-width path mapper.
pub const DEFAULT_SEGMENT_WIDTH: usize = 4;

/// How many times `create` recreates parent directories removed by a concurrent delete.
pub(crate) const CREATE_ATTEMPTS: usize = 5;

/// External program used to change file ownership.
pub(crate) const CHOWN_PROGRAM: &str = "chown";

/// External program used to change file permissions.
pub(crate) const CHMOD_PROGRAM: &str = "chmod";

/// Environment variable naming the store root directory.
pub const ENV_ROOT_DIR: &str = "BLOBFS_ROOT_DIR";

/// Environment variable selecting the path mapper (`dash` or `fixed-width`).
pub const ENV_PATH_MAPPER: &str = "BLOBFS_PATH_MAPPER";

/// Environment variable selecting the identifier generator (`uuid`, `timestamp`, `sequential`).
pub const ENV_ID_GENERATOR: &str = "BLOBFS_ID_GENERATOR";

/// Environment variable holding the owner applied to new blobs (`user` or `user:group`).
pub const ENV_UNIX_OWNER: &str = "BLOBFS_UNIX_OWNER";

/// Environment variable holding the permission mode applied to new blobs (e.g. `0640`).
pub const ENV_UNIX_PERMISSIONS: &str = "BLOBFS_UNIX_PERMISSIONS";
