//! WEX dependency resolver (wex-resolve)
//!
//! Computes the full set of other records a function body depends on:
//! scan the body for embedded `record://` references, fetch them, then
//! union each loaded record's previously recorded transitive dependency
//! list and fetch whatever that adds. Two rounds reach full transitive
//! depth because every record persists its own closure at save time —
//! there is never unbounded recursive fetching at evaluation time.
//!
//! Resolution is poll-shaped to match the store contract: while any
//! fetch is pending the snapshot reports [`ResolutionStatus::Loading`],
//! and callers ask again. Snapshots are cached against the exact body
//! text that produced them.

pub mod scan;

pub use scan::{scan_references, ScanOutcome};

use dashmap::DashMap;
use indexmap::IndexSet;
use std::sync::Arc;
use wex_record::{FetchState, IdVersion, Record, RecordStore};

/// Where a resolution currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStatus {
    /// At least one fetch is still pending
    Loading,
    /// Every discovered reference loaded
    Resolved,
    /// Some reference was unversioned, missing, or errored; the partial
    /// closure is still exposed
    Failed,
}

/// A per-reference resolution problem. Reported per item, never fatal to
/// the scan as a whole.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// A reference without an explicit version
    #[error("reference to record {id} has no version")]
    UnversionedReference {
        /// The referenced record id
        id: u64,
    },
    /// No record under this id+version
    #[error("record {id} not found")]
    NotFound {
        /// The missing identifier
        id: IdVersion,
    },
    /// The fetch failed
    #[error("fetching record {id} failed: {message}")]
    FetchFailed {
        /// The identifier that failed
        id: IdVersion,
        /// Store-provided failure text
        message: String,
    },
}

/// A snapshot of one body's dependency resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Current status
    pub status: ResolutionStatus,
    /// Every discovered identifier, duplicate-free, in first-discovery
    /// order: seeds in source order, then recorded transitive ids
    pub closure: Vec<IdVersion>,
    /// Successfully loaded records, in closure order
    pub records: Vec<Record>,
    /// Per-reference problems gathered so far
    pub errors: Vec<ResolveError>,
}

impl Resolution {
    /// True once no fetch is pending (resolved or failed)
    #[inline]
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.status != ResolutionStatus::Loading
    }
}

/// Two-round dependency resolver with a per-body-text snapshot cache.
///
/// The cache is keyed by the exact body text: editing the body naturally
/// misses the cache and starts a fresh resolution, while re-polling the
/// same text advances (and eventually retains) one snapshot.
pub struct DependencyResolver<S> {
    store: Arc<S>,
    cache: DashMap<String, Resolution>,
}

impl<S: RecordStore> DependencyResolver<S> {
    /// Create a resolver over the given store
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            cache: DashMap::new(),
        }
    }

    /// Advance (or start) resolution for `body` and return the current
    /// snapshot. Call again while the snapshot reports `Loading`.
    pub async fn poll(&self, body: &str) -> Resolution {
        if let Some(cached) = self.cache.get(body) {
            if cached.is_settled() {
                return cached.clone();
            }
        }

        let resolution = self.resolve_once(body).await;
        self.cache.insert(body.to_string(), resolution.clone());
        resolution
    }

    /// Drop the cached snapshot for one body text
    pub fn invalidate(&self, body: &str) {
        self.cache.remove(body);
    }

    /// One full pass: scan, fetch seeds, union recorded transitive ids,
    /// fetch the remainder.
    async fn resolve_once(&self, body: &str) -> Resolution {
        let ScanOutcome { references, errors } = scan_references(body);
        let mut errors: Vec<ResolveError> = errors;

        let mut closure: IndexSet<IdVersion> = references.into_iter().collect();
        let mut records: Vec<Record> = Vec::new();
        let mut loading = false;

        // Round 1: direct references
        let seeds: Vec<IdVersion> = closure.iter().copied().collect();
        if !seeds.is_empty() {
            let round1 = self.store.fetch_records(&seeds).await;
            collect_round(round1, &mut records, &mut errors, &mut loading);
        }

        if loading {
            tracing::debug!("dependency resolution still loading after round 1");
            return Resolution {
                status: ResolutionStatus::Loading,
                closure: closure.into_iter().collect(),
                records,
                errors,
            };
        }

        // Round 2: recorded transitive closures of the loaded seeds
        let mut second_round: Vec<IdVersion> = Vec::new();
        for record in &records {
            for &id in &record.recursive_dependency_ids {
                if closure.insert(id) {
                    second_round.push(id);
                }
            }
        }
        if !second_round.is_empty() {
            let round2 = self.store.fetch_records(&second_round).await;
            collect_round(round2, &mut records, &mut errors, &mut loading);
        }

        let status = if loading {
            ResolutionStatus::Loading
        } else if errors.is_empty() {
            ResolutionStatus::Resolved
        } else {
            ResolutionStatus::Failed
        };

        if status == ResolutionStatus::Failed {
            tracing::warn!(
                errors = errors.len(),
                "dependency resolution failed; exposing partial closure"
            );
        }

        Resolution {
            status,
            closure: closure.into_iter().collect(),
            records,
            errors,
        }
    }
}

fn collect_round(
    round: Vec<wex_record::AsyncRecord>,
    records: &mut Vec<Record>,
    errors: &mut Vec<ResolveError>,
    loading: &mut bool,
) {
    for fetched in round {
        match fetched.state {
            FetchState::Loading => *loading = true,
            FetchState::Loaded(record) => records.push(record),
            FetchState::NotFound => errors.push(ResolveError::NotFound { id: fetched.id }),
            FetchState::Error(message) => errors.push(ResolveError::FetchFailed {
                id: fetched.id,
                message,
            }),
        }
    }
}
