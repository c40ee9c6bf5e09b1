//! Internal implementation of the identifier generators.

use crate::{IdentifierGenerator, UuidError, UuidResult};
use blobfs_types::Identifier;
use chrono::{DateTime, Duration, DurationRound, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// Generates random version 4 UUIDs in the hyphenated, lowercase 36-character form.
///
/// This is the default strategy for new stores. The hyphenated form is what the
/// dash-segmented path mapper expects: each of the five groups becomes one directory level.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl UuidGenerator {
    /// Returns `true` if `input` is a lowercase hyphenated UUID (`8-4-4-4-12` hex groups).
    pub fn is_hyphenated(input: &str) -> bool {
        const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];
        let mut groups = input.split('-');
        for expected in GROUPS {
            match groups.next() {
                Some(group)
                    if group.len() == expected
                        && group.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) => {}
                _ => return false,
            }
        }
        groups.next().is_none()
    }
}

impl IdentifierGenerator for UuidGenerator {
    fn generate(&self) -> Identifier {
        let value = Uuid::new_v4().hyphenated().to_string();
        Identifier::parse(value).expect("hyphenated UUID is a valid identifier")
    }
}

/// A time-prefixed identifier.
///
/// Format:
/// `YYYYMMDDTHHMMSS.mmmZ-<32 hex uuid>`
///
/// Example:
/// `20260111T143522.045Z-550e8400e29b41d4a716446655440000`
///
/// Listing a store that uses these identifiers yields values that sort by creation time.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TimestampId {
    timestamp: DateTime<Utc>,
    uuid: Uuid,
}

impl TimestampId {
    /// Generate a new timestamp identifier.
    ///
    /// If `last` is provided, the timestamp is guaranteed to be strictly greater than
    /// the last one (by at least 1 ms).
    pub fn generate(last: Option<&TimestampId>) -> Self {
        // Truncate to the printed precision so ordering survives formatting.
        let now = Utc::now();
        let now = now.duration_trunc(Duration::milliseconds(1)).unwrap_or(now);

        let timestamp = match last {
            Some(prev) if now <= prev.timestamp => prev.timestamp + Duration::milliseconds(1),
            _ => now,
        };

        Self {
            timestamp,
            uuid: Uuid::new_v4(),
        }
    }

    /// Returns the timestamp component.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the UUID component.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn is_simple_uuid(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }
}

impl FromStr for TimestampId {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ts_str, uuid_str) = s.split_once('-').ok_or_else(|| {
            UuidError::InvalidInput(format!("Invalid timestamp identifier format: '{}'", s))
        })?;

        let Some(ts_no_z) = ts_str.strip_suffix('Z') else {
            return Err(UuidError::InvalidInput(format!(
                "Timestamp must end with 'Z': '{}'",
                ts_str
            )));
        };

        let naive =
            chrono::NaiveDateTime::parse_from_str(ts_no_z, "%Y%m%dT%H%M%S%.3f").map_err(|e| {
                UuidError::InvalidInput(format!("Invalid timestamp format '{}': {}", ts_str, e))
            })?;
        let timestamp = DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc);

        if !Self::is_simple_uuid(uuid_str) {
            return Err(UuidError::InvalidInput(format!(
                "UUID must be 32 lowercase hex characters without hyphens, got: '{}'",
                uuid_str
            )));
        }
        let uuid = Uuid::parse_str(uuid_str)
            .map_err(|e| UuidError::InvalidInput(format!("Invalid UUID '{}': {}", uuid_str, e)))?;

        Ok(Self { timestamp, uuid })
    }
}

impl fmt::Display for TimestampId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.timestamp.format("%Y%m%dT%H%M%S%.3fZ"),
            self.uuid.simple()
        )
    }
}

/// Generates [`TimestampId`] values that strictly increase for the lifetime of the generator.
#[derive(Debug, Default)]
pub struct TimestampIdGenerator {
    last: Mutex<Option<TimestampId>>,
}

impl TimestampIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates the next timestamp identifier without converting it to an [`Identifier`].
    pub fn next_id(&self) -> TimestampId {
        // A poisoned lock still holds the last issued value, which is all we need.
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let next = TimestampId::generate(last.as_ref());
        *last = Some(next.clone());
        next
    }
}

impl IdentifierGenerator for TimestampIdGenerator {
    fn generate(&self) -> Identifier {
        Identifier::parse(self.next_id().to_string())
            .expect("timestamp identifier is a valid identifier")
    }
}

/// Generates `<prefix><counter>` identifiers with the counter zero-padded to a fixed width.
///
/// The counter is process-local: two generators (or two processes) sharing a store will
/// collide, which the store reports as "already exists" on create.
#[derive(Debug)]
pub struct SequentialGenerator {
    prefix: String,
    width: usize,
    next: AtomicU64,
}

impl Default for SequentialGenerator {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            width: 16,
            next: AtomicU64::new(0),
        }
    }
}

impl SequentialGenerator {
    /// Creates a generator that prefixes each counter value with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if the prefix contains a path separator or NUL byte.
    pub fn new(prefix: impl Into<String>, width: usize) -> UuidResult<Self> {
        let prefix = prefix.into();
        if prefix.contains(['/', '\\', '\0']) {
            return Err(UuidError::InvalidInput(format!(
                "identifier prefix must not contain path separators or NUL: '{}'",
                prefix.escape_debug()
            )));
        }
        Ok(Self {
            prefix,
            width,
            next: AtomicU64::new(0),
        })
    }

    /// Starts counting from `start` instead of zero.
    pub fn starting_at(self, start: u64) -> Self {
        self.next.store(start, Ordering::Relaxed);
        self
    }
}

impl IdentifierGenerator for SequentialGenerator {
    fn generate(&self) -> Identifier {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        let value = format!("{}{:0width$}", self.prefix, n, width = self.width);
        Identifier::parse(value).expect("validated prefix plus digits is a valid identifier")
    }
}
