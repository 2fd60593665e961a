//! Wallpaper artifact identifiers.
//!
//! An artifact is named `wallpaper-YYYY-MM-DDTHH-mm-ss` (local time, second
//! precision, colons replaced by dashes). Two changes minted within the same
//! second on the same node get a collision suffix: `wallpaper-...-1`, `-2`, ...
//!
//! Identifiers are totally ordered by `(timestamp, sequence, name)`, so the
//! "newest" artifact of any listing is always well defined.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{NaiveDateTime, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::ARTIFACT_PREFIX;

/// `chrono` format of the timestamp part of an identifier.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Matches a full identifier, capturing the timestamp and optional sequence.
static ARTIFACT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^wallpaper-([0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}-[0-9]{2}-[0-9]{2})(?:-([0-9]{1,9}))?$")
        .unwrap_or_else(|err| unreachable!("artifact pattern is a valid regex: {err}"))
});

/// Error returned when a string is not a valid artifact identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a wallpaper artifact identifier: {0}")]
pub struct InvalidArtifactId(pub String);

/// Identifier of one wallpaper snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactId {
    name: String,
    timestamp: NaiveDateTime,
    sequence: u32,
}

impl ArtifactId {
    /// Mints the identifier for a change observed at `now`.
    ///
    /// Sub-second precision is dropped.
    #[must_use]
    pub fn mint(now: NaiveDateTime) -> Self { Self::with_sequence(now, 0) }

    /// Builds the identifier for `timestamp` with an explicit collision sequence.
    ///
    /// Sequence `0` produces the plain form without a suffix.
    #[must_use]
    pub fn with_sequence(timestamp: NaiveDateTime, sequence: u32) -> Self {
        let timestamp = timestamp.with_nanosecond(0).unwrap_or(timestamp);
        let stamp = timestamp.format(TIMESTAMP_FORMAT);
        let name = if sequence == 0 {
            format!("{ARTIFACT_PREFIX}{stamp}")
        } else {
            format!("{ARTIFACT_PREFIX}{stamp}-{sequence}")
        };

        Self { name, timestamp, sequence }
    }

    /// Parses a shared-folder entry name.
    ///
    /// Returns `None` for anything that is not an artifact, including names
    /// that match the shape but carry an impossible date.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let captures = ARTIFACT_PATTERN.captures(name)?;
        let timestamp =
            NaiveDateTime::parse_from_str(captures.get(1)?.as_str(), TIMESTAMP_FORMAT).ok()?;
        let sequence = match captures.get(2) {
            Some(seq) => seq.as_str().parse().ok()?,
            None => 0,
        };

        Some(Self { name: name.to_string(), timestamp, sequence })
    }

    /// Returns the next identifier in the same second.
    #[must_use]
    pub fn next_sequence(&self) -> Self { Self::with_sequence(self.timestamp, self.sequence + 1) }

    /// The identifier as it appears on disk.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.name }

    /// The mint timestamp parsed out of the identifier.
    #[must_use]
    pub const fn timestamp(&self) -> NaiveDateTime { self.timestamp }

    /// The collision sequence (`0` when there is no suffix).
    #[must_use]
    pub const fn sequence(&self) -> u32 { self.sequence }
}

impl Ord for ArtifactId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then(self.sequence.cmp(&other.sequence))
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for ArtifactId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.name) }
}

impl FromStr for ArtifactId {
    type Err = InvalidArtifactId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| InvalidArtifactId(s.to_string()))
    }
}

impl TryFrom<String> for ArtifactId {
    type Error = InvalidArtifactId;

    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

impl From<ArtifactId> for String {
    fn from(id: ArtifactId) -> Self { id.name }
}
