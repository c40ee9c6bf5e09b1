//! Store runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into
//! [`FileSystemStore::from_config`](crate::FileSystemStore::from_config). The store never reads
//! environment variables while serving operations; the strategies it is built with stay fixed
//! for the lifetime of the instance.

use crate::constants::{
    DEFAULT_ROOT_DIR, ENV_ID_GENERATOR, ENV_PATH_MAPPER, ENV_ROOT_DIR, ENV_UNIX_OWNER,
    ENV_UNIX_PERMISSIONS,
};
use crate::mapper::MapperKind;
use crate::StoreResult;
use blobfs_types::NonEmptyText;
use blobfs_uuid::GeneratorKind;
use std::path::{Path, PathBuf};

/// Blob store configuration resolved at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    root_directory: PathBuf,
    mapper: MapperKind,
    generator: GeneratorKind,
    owner: Option<NonEmptyText>,
    permissions: Option<NonEmptyText>,
}

impl StoreConfig {
    /// Creates a configuration with default strategies and no ownership enforcement.
    pub fn new(root_directory: PathBuf) -> Self {
        Self {
            root_directory,
            mapper: MapperKind::default(),
            generator: GeneratorKind::default(),
            owner: None,
            permissions: None,
        }
    }

    /// Resolves configuration from a key lookup, typically `|key| std::env::var(key).ok()`.
    ///
    /// Missing or blank values fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`](crate::StoreError::InvalidArgument) if the
    /// mapper or generator name is not recognised.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StoreResult<Self> {
        let root_directory = optional_text_from_env_value(lookup(ENV_ROOT_DIR))
            .map(|dir| PathBuf::from(dir.as_str()))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT_DIR));

        Ok(Self {
            root_directory,
            mapper: mapper_kind_from_env_value(lookup(ENV_PATH_MAPPER))?,
            generator: generator_kind_from_env_value(lookup(ENV_ID_GENERATOR))?,
            owner: optional_text_from_env_value(lookup(ENV_UNIX_OWNER)),
            permissions: optional_text_from_env_value(lookup(ENV_UNIX_PERMISSIONS)),
        })
    }

    pub fn with_root_directory(mut self, root_directory: PathBuf) -> Self {
        self.root_directory = root_directory;
        self
    }

    pub fn with_mapper(mut self, mapper: MapperKind) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn with_generator(mut self, generator: GeneratorKind) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_owner(mut self, owner: Option<NonEmptyText>) -> Self {
        self.owner = owner;
        self
    }

    pub fn with_permissions(mut self, permissions: Option<NonEmptyText>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    pub fn mapper(&self) -> MapperKind {
        self.mapper
    }

    pub fn generator(&self) -> GeneratorKind {
        self.generator
    }

    pub fn owner(&self) -> Option<&NonEmptyText> {
        self.owner.as_ref()
    }

    pub fn permissions(&self) -> Option<&NonEmptyText> {
        self.permissions.as_ref()
    }
}

/// Parse the path mapper from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the default dash-segmented mapper.
pub fn mapper_kind_from_env_value(value: Option<String>) -> StoreResult<MapperKind> {
    let parsed = optional_text_from_env_value(value)
        .map(|v| v.as_str().parse::<MapperKind>())
        .transpose()?;

    Ok(parsed.unwrap_or_default())
}

/// Parse the identifier generator from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the default UUID generator.
pub fn generator_kind_from_env_value(value: Option<String>) -> StoreResult<GeneratorKind> {
    let parsed = optional_text_from_env_value(value)
        .map(|v| v.as_str().parse::<GeneratorKind>())
        .transpose()?;

    Ok(parsed.unwrap_or_default())
}

/// Treats blank values as unset.
pub fn optional_text_from_env_value(value: Option<String>) -> Option<NonEmptyText> {
    value.and_then(|v| NonEmptyText::new(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = StoreConfig::from_lookup(|_| None).unwrap();

        assert_eq!(config.root_directory(), Path::new(DEFAULT_ROOT_DIR));
        assert_eq!(config.mapper(), MapperKind::Dash);
        assert_eq!(config.generator(), GeneratorKind::Uuid);
        assert!(config.owner().is_none());
        assert!(config.permissions().is_none());
    }

    #[test]
    fn test_reads_all_values() {
        let config = StoreConfig::from_lookup(lookup_from(&[
            (ENV_ROOT_DIR, "/srv/blobs"),
            (ENV_PATH_MAPPER, "fixed-width"),
            (ENV_ID_GENERATOR, "timestamp"),
            (ENV_UNIX_OWNER, "www-data:www-data"),
            (ENV_UNIX_PERMISSIONS, "0640"),
        ]))
        .unwrap();

        assert_eq!(config.root_directory(), Path::new("/srv/blobs"));
        assert_eq!(config.mapper(), MapperKind::FixedWidth);
        assert_eq!(config.generator(), GeneratorKind::Timestamp);
        assert_eq!(config.owner().unwrap().as_str(), "www-data:www-data");
        assert_eq!(config.permissions().unwrap().as_str(), "0640");
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = StoreConfig::from_lookup(lookup_from(&[
            (ENV_ROOT_DIR, "  "),
            (ENV_PATH_MAPPER, ""),
            (ENV_UNIX_OWNER, "   "),
        ]))
        .unwrap();

        assert_eq!(config.root_directory(), Path::new(DEFAULT_ROOT_DIR));
        assert_eq!(config.mapper(), MapperKind::Dash);
        assert!(config.owner().is_none());
    }

    #[test]
    fn test_unknown_mapper_is_rejected() {
        let result = StoreConfig::from_lookup(lookup_from(&[(ENV_PATH_MAPPER, "sha256")]));
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    }

    #[test]
    fn test_unknown_generator_is_rejected() {
        let result = generator_kind_from_env_value(Some("ulid".into()));
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    }

    #[test]
    fn test_builder_overrides() {
        let config = StoreConfig::new(PathBuf::from("/tmp/x"))
            .with_mapper(MapperKind::FixedWidth)
            .with_generator(GeneratorKind::Sequential)
            .with_permissions(NonEmptyText::new("600").ok());

        assert_eq!(config.mapper(), MapperKind::FixedWidth);
        assert_eq!(config.generator(), GeneratorKind::Sequential);
        assert_eq!(config.permissions().unwrap().as_str(), "600");
    }

    #[test]
    fn test_root_override_keeps_other_settings() {
        let config = StoreConfig::from_lookup(lookup_from(&[
            (ENV_ROOT_DIR, "/srv/blobs"),
            (ENV_PATH_MAPPER, "fixed-width"),
            (ENV_UNIX_OWNER, "blobs"),
        ]))
        .unwrap()
        .with_root_directory(PathBuf::from("/mnt/other"));

        assert_eq!(config.root_directory(), Path::new("/mnt/other"));
        assert_eq!(config.mapper(), MapperKind::FixedWidth);
        assert_eq!(config.owner().unwrap().as_str(), "blobs");
    }
}
