//! Validated text types shared across the blobfs crates.
//!
//! - [`NonEmptyText`] is used for configuration values such as the Unix owner and permission
//!   strings handed to external commands.
//! - [`Identifier`] is the opaque key naming a stored blob.

use std::fmt;
use std::str::FromStr;

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,

    /// The input cannot be used as a blob identifier
    #[error("Invalid identifier '{input}': {reason}")]
    InvalidIdentifier { input: String, reason: &'static str },
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    ///
    /// # Errors
    ///
    /// Returns `Err(TextError::Empty)` if the input is empty or contains only whitespace.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque key naming a single stored blob.
///
/// Identifiers are treated as opaque strings everywhere except in path mapping. They are
/// never trimmed or normalised: the value handed in is the value that comes back out of
/// a directory listing, byte for byte.
///
/// Construction only rejects values that could never map to a single path component
/// sequence beneath a store root: empty strings, path separators (`/` and `\`), NUL bytes,
/// and the special names `.` and `..`. Path mappers may apply stricter rules of their own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    /// Validates `input` and wraps it as an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::Empty`] for an empty string and
    /// [`TextError::InvalidIdentifier`] for any other rejected value.
    pub fn parse(input: impl Into<String>) -> Result<Self, TextError> {
        let input = input.into();
        if input.is_empty() {
            return Err(TextError::Empty);
        }
        if let Some(reason) = Self::rejection_reason(&input) {
            return Err(TextError::InvalidIdentifier { input, reason });
        }
        Ok(Self(input))
    }

    fn rejection_reason(input: &str) -> Option<&'static str> {
        if input == "." || input == ".." {
            return Some("reserved path name");
        }
        if input.contains(['/', '\\']) {
            return Some("contains a path separator");
        }
        if input.contains('\0') {
            return Some("contains a NUL byte");
        }
        None
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Identifier {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Identifier::parse(s)
    }
}

impl serde::Serialize for Identifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Identifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Identifier::parse(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_text_trims() {
        let text = NonEmptyText::new("  root:wheel \n").unwrap();
        assert_eq!(text.as_str(), "root:wheel");
    }

    #[test]
    fn test_non_empty_text_rejects_whitespace() {
        assert_eq!(NonEmptyText::new("   "), Err(TextError::Empty));
        assert_eq!(NonEmptyText::new(""), Err(TextError::Empty));
    }

    #[test]
    fn test_identifier_accepts_uuid_form() {
        let id = Identifier::parse("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(id.as_str(), "550e8400-e29b-41d4-a716-446655440000");
        assert_eq!(id.to_string(), "550e8400-e29b-41d4-a716-446655440000");
    }

    #[test]
    fn test_identifier_is_not_trimmed() {
        let id = Identifier::parse(" padded ").unwrap();
        assert_eq!(id.as_str(), " padded ");
    }

    #[test]
    fn test_identifier_rejects_empty() {
        assert_eq!(Identifier::parse(""), Err(TextError::Empty));
    }

    #[test]
    fn test_identifier_rejects_separators_and_reserved_names() {
        for bad in ["a/b", "a\\b", "..", ".", "nul\0byte"] {
            assert!(
                matches!(
                    Identifier::parse(bad),
                    Err(TextError::InvalidIdentifier { .. })
                ),
                "expected rejection for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_identifier_from_str() {
        let id: Identifier = "abc".parse().unwrap();
        assert_eq!(id.as_ref(), "abc");
        assert!("a/b".parse::<Identifier>().is_err());
    }

    #[test]
    fn test_identifier_serde_rejects_invalid() {
        let id: Identifier = serde_json::from_str("\"abc-def\"").unwrap();
        assert_eq!(id.as_str(), "abc-def");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc-def\"");
        assert!(serde_json::from_str::<Identifier>("\"../etc\"").is_err());
    }
}
