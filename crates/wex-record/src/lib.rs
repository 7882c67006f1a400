//! WEX data model (wex-record)
//!
//! The persisted entities this engine validates: a [`Record`] carries a
//! calculation function (typed, defaulted arguments plus a body), the
//! worked [`Scenario`]s used to validate it, and the precomputed
//! transitive dependency list written at save time.
//!
//! Also home to the narrow contract through which records are read from
//! the external storage collaborator ([`RecordStore`]).

pub mod ident;
pub mod record;
pub mod store;

pub use ident::{IdVersion, RecordId, REFERENCE_PATTERN};
pub use record::{
    FunctionArgument, Record, Scenario, ScenarioValue, ValidationIssue, ValueType,
};
pub use store::{AsyncRecord, FetchState, RecordStore};
