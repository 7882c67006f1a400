//! Record identifiers
//!
//! A record is addressed by a numeric id plus an explicit version. The
//! pair is the unit the dependency closure is built from: two versions of
//! the same record are distinct dependencies.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Serialized form of an embedded record mention, as it appears in
/// rich-text body source: `record://<id>@v<version>`. Capture 1 is the
/// id; capture 2 is the version and its absence is a reportable error.
pub const REFERENCE_PATTERN: &str = r"record://(\d+)(?:@v(\d+))?";

/// Numeric record identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Raw numeric value
    #[inline]
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A versioned record identifier: id plus explicit version.
///
/// References embedded in a function body always carry both parts; a
/// reference without a version is a reportable error, never silently
/// pinned to "latest".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct IdVersion {
    /// Record id
    pub id: RecordId,
    /// Version as of which the record is referenced
    pub version: u32,
}

impl IdVersion {
    /// Create a versioned identifier
    #[inline]
    #[must_use]
    pub fn new(id: u64, version: u32) -> Self {
        Self {
            id: RecordId(id),
            version,
        }
    }
}

impl Display for IdVersion {
    /// Format: `id@vN`
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}@v{}", self.id, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_version_display() {
        let iv = IdVersion::new(12, 3);
        assert_eq!(iv.to_string(), "12@v3");
    }

    #[test]
    fn id_version_equality_includes_version() {
        assert_ne!(IdVersion::new(12, 3), IdVersion::new(12, 4));
        assert_eq!(IdVersion::new(12, 3), IdVersion::new(12, 3));
    }
}
