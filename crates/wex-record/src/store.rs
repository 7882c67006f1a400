//! Record store contract
//!
//! The storage/versioning backend is an external collaborator. This core
//! only reads records through [`RecordStore::fetch_records`], which is
//! non-blocking and idempotent for already-resolved ids: a fetch that is
//! still in flight reports [`FetchState::Loading`] rather than suspending
//! the caller indefinitely, so resolution can be polled as it progresses.

use crate::ident::IdVersion;
use crate::record::Record;
use async_trait::async_trait;

/// Fetch outcome for a single requested identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchState {
    /// Still being fetched; ask again later
    Loading,
    /// Fetched successfully
    Loaded(Record),
    /// No record exists under this id+version
    NotFound,
    /// The fetch itself failed
    Error(String),
}

impl FetchState {
    /// True while the fetch is unsettled
    #[inline]
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// The record, if loaded
    #[inline]
    #[must_use]
    pub fn record(&self) -> Option<&Record> {
        match self {
            Self::Loaded(record) => Some(record),
            _ => None,
        }
    }
}

/// A requested identifier paired with its current fetch state.
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncRecord {
    /// The identifier that was requested
    pub id: IdVersion,
    /// Current state of the fetch
    pub state: FetchState,
}

impl AsyncRecord {
    /// Pair an id with a state
    #[inline]
    #[must_use]
    pub fn new(id: IdVersion, state: FetchState) -> Self {
        Self { id, state }
    }
}

/// Read access to the external record storage.
///
/// Implementations must be non-blocking (return `Loading` rather than
/// stall) and idempotent for ids that have already settled.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the given identifiers, one [`AsyncRecord`] per input id, in
    /// input order.
    async fn fetch_records(&self, ids: &[IdVersion]) -> Vec<AsyncRecord>;
}
