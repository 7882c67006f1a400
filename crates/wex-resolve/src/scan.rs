//! Embedded reference scanning
//!
//! References appear in rich-text body source as `record://<id>@v<ver>`
//! URIs (the serialized form of a record mention). A reference lacking
//! its version is reported per-item and does not abort the scan.

use crate::ResolveError;
use once_cell::sync::Lazy;
use regex::Regex;
use wex_record::{IdVersion, REFERENCE_PATTERN};

/// `record://12@v3`, or the erroneous version-less `record://12`.
static REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(REFERENCE_PATTERN).expect("reference pattern"));

/// Outcome of one scan: versioned references in source order, plus the
/// per-reference problems.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    /// Versioned references, in order of first appearance (duplicates
    /// preserved here; the resolver dedups)
    pub references: Vec<IdVersion>,
    /// Unversioned references found along the way
    pub errors: Vec<ResolveError>,
}

/// Scan `body` for embedded record references.
#[must_use]
pub fn scan_references(body: &str) -> ScanOutcome {
    let mut references = Vec::new();
    let mut errors = Vec::new();

    for capture in REFERENCE.captures_iter(body) {
        let id: u64 = match capture[1].parse() {
            Ok(id) => id,
            Err(_) => continue, // longer than u64; not a real reference
        };
        match capture.get(2) {
            Some(version) => {
                let version: u32 = match version.as_str().parse() {
                    Ok(v) => v,
                    Err(_) => continue,
                };
                references.push(IdVersion::new(id, version));
            }
            None => errors.push(ResolveError::UnversionedReference { id }),
        }
    }

    ScanOutcome { references, errors }
}
