//! WEX scenario engine (wex-scenario)
//!
//! Turns one scenario's raw per-argument values into an ordered sequence
//! of concrete invocations — handling the repeat (`iterate_over`) and
//! chaining (`use_previous_result`) flags — submits them strictly
//! sequentially through the sandbox channel, and compares fresh results
//! against stored expectations.

pub mod compare;
pub mod expand;

pub use compare::{compare, parse_series, Comparison, MergedSeries, PointSeries};
pub use expand::{
    plan_values, run_scenario, ExpandWarning, ResolvedArgument, ScenarioOutcome, ValuePlan,
};
