//! WEX evaluation orchestrator (wex-core)
//!
//! The entry point the surrounding application uses: given a record and
//! one of its worked scenarios, resolve the record's dependency closure,
//! compile its function, expand the scenario into invocations, run each
//! invocation through the sandbox channel, and compare the fresh results
//! against the stored expectation.
//!
//! # Quick start
//!
//! ```rust,ignore
//! let engine = Engine::new(store);
//! let run = engine.evaluate(&record, &scenario).await;
//! for response in &run.responses {
//!     println!("{:?}", response.result);
//! }
//! if let Some(comparison) = &run.comparison {
//!     println!("expectation met: {:?}", comparison.met);
//! }
//! ```
//!
//! Nothing here returns `Err` across the public surface: evaluation
//! failures, timeouts, and resolution problems all arrive as tagged
//! values the caller can render.

pub mod engine;

pub use engine::{Engine, EngineConfig, ScenarioRun};

// The rest of the public surface, re-exported so applications depend on
// one crate
pub use wex_record::{
    AsyncRecord, FetchState, FunctionArgument, IdVersion, Record, RecordId, RecordStore,
    Scenario, ScenarioValue, ValidationIssue,
};
pub use wex_resolve::{Resolution, ResolutionStatus, ResolveError};
pub use wex_sandbox::{EvaluationResponse, SandboxChannel};
pub use wex_scenario::{compare, Comparison, ExpandWarning, MergedSeries, PointSeries};
