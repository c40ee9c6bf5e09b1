//! Identifier-to-path mapping strategies.
//!
//! A flat directory holding millions of files degrades lookup performance on most
//! filesystems. Mappers shard blobs across nested directories derived from the identifier's
//! own characters, so no configuration beyond the identifier format is needed to keep
//! fan-out bounded.
//!
//! Two strategies are provided:
//!
//! - [`DashSegmentedMapper`] (default): one directory level per `-`-separated segment.
//!   `550e8400-e29b-41d4-a716-446655440000` becomes
//!   `550e8400/e29b/41d4/a716/446655440000`.
//! - [`FixedWidthMapper`]: a separator every N characters regardless of structure, so any
//!   identifier format gets uniform directory levels. With N = 4,
//!   `550e8400-e29b` becomes `550e/8400/-e29/b`.
//!
//! The two layouts are not compatible with each other. A store must keep the same mapper for
//! its whole life; switching strategies makes existing blobs unreachable.
//!
//! Whichever strategy is active, [`PathMapper::to_identifier`] is an exact left inverse of
//! [`PathMapper::to_path`]. Listing depends on it.

use crate::constants::DEFAULT_SEGMENT_WIDTH;
use crate::{StoreError, StoreResult};
use blobfs_types::Identifier;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

/// Bidirectional mapping between identifiers and file paths beneath a root directory.
pub trait PathMapper: Send + Sync + fmt::Debug {
    /// Returns the absolute path of the blob named `identifier` under `root`.
    ///
    /// Pure and deterministic: no filesystem access.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] if the identifier cannot be represented by
    /// this strategy (for example, it would produce an empty or `..` path component).
    fn to_path(&self, root: &Path, identifier: &Identifier) -> StoreResult<PathBuf>;

    /// Recovers the identifier from a path previously produced by [`Self::to_path`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] for any path this mapper could not have
    /// produced, rather than returning a wrong identifier.
    fn to_identifier(&self, root: &Path, path: &Path) -> StoreResult<Identifier>;
}

/// Splits the identifier on `-` and uses each segment as one path component.
#[derive(Debug, Clone, Copy, Default)]
pub struct DashSegmentedMapper;

const SEGMENT_SEPARATOR: char = '-';

impl PathMapper for DashSegmentedMapper {
    fn to_path(&self, root: &Path, identifier: &Identifier) -> StoreResult<PathBuf> {
        let mut path = root.to_path_buf();
        for segment in identifier.as_str().split(SEGMENT_SEPARATOR) {
            check_component(segment, identifier)?;
            path.push(segment);
        }
        Ok(path)
    }

    fn to_identifier(&self, root: &Path, path: &Path) -> StoreResult<Identifier> {
        let components = relative_components(root, path)?;
        let identifier = Identifier::parse(components.join("-"))?;
        ensure_inverse(self, root, path, identifier)
    }
}

/// Inserts a path separator every `width` characters of the identifier.
///
/// The final component may be shorter than `width`. Splitting happens on character
/// boundaries, so non-ASCII identifiers are never cut inside a code point.
#[derive(Debug, Clone, Copy)]
pub struct FixedWidthMapper {
    width: usize,
}

impl Default for FixedWidthMapper {
    fn default() -> Self {
        Self {
            width: DEFAULT_SEGMENT_WIDTH,
        }
    }
}

impl FixedWidthMapper {
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] if `width` is zero.
    pub fn new(width: usize) -> StoreResult<Self> {
        if width == 0 {
            return Err(StoreError::InvalidArgument(
                "fixed-width segment size must be at least 1".into(),
            ));
        }
        Ok(Self { width })
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

impl PathMapper for FixedWidthMapper {
    fn to_path(&self, root: &Path, identifier: &Identifier) -> StoreResult<PathBuf> {
        let mut path = root.to_path_buf();
        let mut segment = String::with_capacity(self.width * 4);
        let mut count = 0;
        for ch in identifier.as_str().chars() {
            segment.push(ch);
            count += 1;
            if count == self.width {
                check_component(&segment, identifier)?;
                path.push(&segment);
                segment.clear();
                count = 0;
            }
        }
        if !segment.is_empty() {
            check_component(&segment, identifier)?;
            path.push(&segment);
        }
        Ok(path)
    }

    fn to_identifier(&self, root: &Path, path: &Path) -> StoreResult<Identifier> {
        let components = relative_components(root, path)?;
        let identifier = Identifier::parse(components.concat())?;
        ensure_inverse(self, root, path, identifier)
    }
}

/// The mapper strategies selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapperKind {
    #[default]
    Dash,
    FixedWidth,
}

impl MapperKind {
    /// Builds a boxed mapper of this kind with default settings.
    pub fn build(self) -> Box<dyn PathMapper> {
        match self {
            MapperKind::Dash => Box::new(DashSegmentedMapper),
            MapperKind::FixedWidth => Box::new(FixedWidthMapper::default()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MapperKind::Dash => "dash",
            MapperKind::FixedWidth => "fixed-width",
        }
    }
}

impl fmt::Display for MapperKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MapperKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dash" | "dash-segmented" => Ok(MapperKind::Dash),
            "fixed-width" | "fixed" => Ok(MapperKind::FixedWidth),
            other => Err(StoreError::InvalidArgument(format!(
                "unknown path mapper '{}' (expected dash or fixed-width)",
                other
            ))),
        }
    }
}

fn check_component(component: &str, identifier: &Identifier) -> StoreResult<()> {
    if component.is_empty() || component == "." || component == ".." {
        return Err(StoreError::InvalidArgument(format!(
            "identifier '{}' maps to an unusable path component '{}'",
            identifier, component
        )));
    }
    Ok(())
}

/// Strips `root` from `path` and returns the remaining components as UTF-8 strings.
fn relative_components<'a>(root: &Path, path: &'a Path) -> StoreResult<Vec<&'a str>> {
    let relative = path.strip_prefix(root).map_err(|_| {
        StoreError::InvalidArgument(format!(
            "path {} is not under store root {}",
            path.display(),
            root.display()
        ))
    })?;

    let mut components = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| {
                    StoreError::InvalidArgument(format!(
                        "path {} contains a non UTF-8 component",
                        path.display()
                    ))
                })?;
                components.push(part);
            }
            _ => {
                return Err(StoreError::InvalidArgument(format!(
                    "path {} contains a non-normal component",
                    path.display()
                )))
            }
        }
    }

    if components.is_empty() {
        return Err(StoreError::InvalidArgument(format!(
            "path {} is the store root, not a blob",
            path.display()
        )));
    }
    Ok(components)
}

/// Rejects identifiers whose forward mapping does not reproduce `path`.
fn ensure_inverse(
    mapper: &dyn PathMapper,
    root: &Path,
    path: &Path,
    identifier: Identifier,
) -> StoreResult<Identifier> {
    let expected = mapper.to_path(root, &identifier)?;
    if expected != path {
        return Err(StoreError::InvalidArgument(format!(
            "path {} was not produced by this mapper",
            path.display()
        )));
    }
    Ok(identifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobfs_uuid::{IdentifierGenerator, SequentialGenerator, TimestampIdGenerator, UuidGenerator};

    fn id(value: &str) -> Identifier {
        Identifier::parse(value).unwrap()
    }

    #[test]
    fn test_dash_mapper_splits_uuid_into_five_levels() {
        let root = Path::new("/data/blobs");
        let path = DashSegmentedMapper
            .to_path(root, &id("550e8400-e29b-41d4-a716-446655440000"))
            .unwrap();

        assert_eq!(
            path,
            PathBuf::from("/data/blobs/550e8400/e29b/41d4/a716/446655440000")
        );
    }

    #[test]
    fn test_dash_mapper_without_dashes_is_flat() {
        let root = Path::new("/data");
        let path = DashSegmentedMapper.to_path(root, &id("plain")).unwrap();

        assert_eq!(path, PathBuf::from("/data/plain"));
    }

    #[test]
    fn test_dash_mapper_rejects_empty_segments() {
        let root = Path::new("/data");
        for bad in ["a--b", "-a", "a-", "a-..-b", "a-.-b"] {
            let result = DashSegmentedMapper.to_path(root, &id(bad));
            assert!(
                matches!(result, Err(StoreError::InvalidArgument(_))),
                "expected rejection for {}",
                bad
            );
        }
    }

    #[test]
    fn test_dash_mapper_round_trip_generated_ids() {
        let root = Path::new("/data");
        let generators: Vec<Box<dyn IdentifierGenerator>> = vec![
            Box::new(UuidGenerator),
            Box::new(TimestampIdGenerator::new()),
            Box::new(SequentialGenerator::new("seq-", 6).unwrap()),
        ];

        for generator in generators {
            for _ in 0..100 {
                let identifier = generator.generate();
                let path = DashSegmentedMapper.to_path(root, &identifier).unwrap();
                let back = DashSegmentedMapper.to_identifier(root, &path).unwrap();
                assert_eq!(back, identifier);
            }
        }
    }

    #[test]
    fn test_fixed_width_mapper_inserts_separator_every_four_chars() {
        let root = Path::new("/data");
        let mapper = FixedWidthMapper::default();
        assert_eq!(mapper.width(), DEFAULT_SEGMENT_WIDTH);

        let path = mapper.to_path(root, &id("abcdefghij")).unwrap();

        assert_eq!(path, PathBuf::from("/data/abcd/efgh/ij"));
    }

    #[test]
    fn test_fixed_width_mapper_keeps_dashes() {
        let root = Path::new("/data");
        let identifier = id("550e8400-e29b-41d4-a716-446655440000");
        let path = FixedWidthMapper::default().to_path(root, &identifier).unwrap();

        assert_eq!(
            path,
            PathBuf::from("/data/550e/8400/-e29/b-41/d4-a/716-/4466/5544/0000")
        );
        assert_eq!(
            FixedWidthMapper::default().to_identifier(root, &path).unwrap(),
            identifier
        );
    }

    #[test]
    fn test_fixed_width_mapper_splits_on_char_boundaries() {
        let root = Path::new("/data");
        let identifier = id("héllo-wörld");
        let mapper = FixedWidthMapper::new(3).unwrap();
        let path = mapper.to_path(root, &identifier).unwrap();

        assert_eq!(path, PathBuf::from("/data/hél/lo-/wör/ld"));
        assert_eq!(mapper.to_identifier(root, &path).unwrap(), identifier);
    }

    #[test]
    fn test_fixed_width_mapper_rejects_dot_segments() {
        let root = Path::new("/data");
        let result = FixedWidthMapper::new(2).unwrap().to_path(root, &id("ab..cd"));

        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    }

    #[test]
    fn test_fixed_width_mapper_rejects_zero_width() {
        assert!(FixedWidthMapper::new(0).is_err());
    }

    #[test]
    fn test_fixed_width_round_trip_generated_ids() {
        let root = Path::new("/var/lib/store");
        let mapper = FixedWidthMapper::default();
        let generator = UuidGenerator;

        for _ in 0..100 {
            let identifier = generator.generate();
            let path = mapper.to_path(root, &identifier).unwrap();
            assert_eq!(mapper.to_identifier(root, &path).unwrap(), identifier);
        }
    }

    #[test]
    fn test_to_identifier_rejects_path_outside_root() {
        let result = DashSegmentedMapper.to_identifier(Path::new("/data"), Path::new("/other/a/b"));
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    }

    #[test]
    fn test_to_identifier_rejects_root_itself() {
        let result = DashSegmentedMapper.to_identifier(Path::new("/data"), Path::new("/data"));
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    }

    #[test]
    fn test_to_identifier_rejects_foreign_layout() {
        let root = Path::new("/data");

        // A component containing the separator could not have come from the dash mapper.
        let result = DashSegmentedMapper.to_identifier(root, Path::new("/data/a-b/c"));
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));

        // Uneven widths could not have come from the fixed-width mapper.
        let result = FixedWidthMapper::default().to_identifier(root, Path::new("/data/ab/cdef"));
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    }

    #[test]
    fn test_mapper_kind_from_str() {
        assert_eq!("dash".parse::<MapperKind>().unwrap(), MapperKind::Dash);
        assert_eq!(
            "Fixed-Width".parse::<MapperKind>().unwrap(),
            MapperKind::FixedWidth
        );
        assert!("hashed".parse::<MapperKind>().is_err());
        assert_eq!(MapperKind::default(), MapperKind::Dash);
    }

    #[test]
    fn test_mapper_kind_build_matches_strategy() {
        let root = Path::new("/data");
        let identifier = id("abcd-efgh");

        let dash = MapperKind::Dash.build().to_path(root, &identifier).unwrap();
        let fixed = MapperKind::FixedWidth.build().to_path(root, &identifier).unwrap();

        assert_eq!(dash, PathBuf::from("/data/abcd/efgh"));
        assert_eq!(fixed, PathBuf::from("/data/abcd/-efg/h"));
    }
}
