//! Scenario expansion
//!
//! One scenario becomes N invocations:
//!
//! 1. Each argument resolves to its entered value, else its default,
//!    else a warning (with `null` substituted best-effort).
//! 2. At most one argument repeats: its value is evaluated as an
//!    array-producing expression and N is the array length. Surplus
//!    repeat flags are tolerated defensively — the first in declaration
//!    order wins, the rest warn.
//! 3. At most one argument chains: invocation 0 uses its own resolved
//!    value as a seed; invocation k>0 substitutes invocation k-1's
//!    result. Chaining is a data dependency, so invocations are built
//!    lazily and submitted one at a time — k+1 is not even constructed
//!    until k's response is known.
//! 4. No repeat flag means exactly one invocation; an entered array
//!    expression then passes through literally as an ordinary value.

use std::time::Duration;
use wex_record::{FunctionArgument, Scenario};
use wex_sandbox::{EvaluationResponse, SandboxChannel};

/// Expansion-time warnings. None of these abort the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpandWarning {
    /// No entered value and no default
    #[error("argument `{name}` has no value and no default")]
    MissingValue {
        /// Argument name
        name: String,
    },
    /// More than one argument carried the repeat flag
    #[error("argument `{name}` also has the repeat flag; only `{winner}` repeats")]
    SurplusRepeatFlag {
        /// The losing argument
        name: String,
        /// The argument that actually repeats
        winner: String,
    },
    /// More than one argument carried the chaining flag
    #[error("argument `{name}` also has the chaining flag; only `{winner}` chains")]
    SurplusChainFlag {
        /// The losing argument
        name: String,
        /// The argument that actually chains
        winner: String,
    },
    /// The repeat expression did not evaluate to an array
    #[error("repeat value for `{name}` did not evaluate to an array; running one invocation")]
    RepeatNotArray {
        /// The repeat-flagged argument
        name: String,
    },
    /// The repeat expression evaluated to an empty array
    #[error("repeat value for `{name}` evaluated to an empty array; running one invocation")]
    RepeatEmpty {
        /// The repeat-flagged argument
        name: String,
    },
    /// A chained invocation followed a failed one
    #[error("invocation {index} used null for `{name}`: the previous invocation failed")]
    ChainAfterFailure {
        /// Invocation index that received `null`
        index: usize,
        /// The chained argument
        name: String,
    },
}

/// One argument's resolved value plus its effective flags.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArgument {
    /// Argument name
    pub name: String,
    /// Resolved value source text
    pub value: String,
    /// Effective repeat flag (after single-winner arbitration)
    pub iterate: bool,
    /// Effective chaining flag (after single-winner arbitration)
    pub chain: bool,
}

/// The static part of expansion: values resolved, flags arbitrated.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuePlan {
    /// Per-argument resolutions, in declaration order
    pub arguments: Vec<ResolvedArgument>,
    /// Index of the repeating argument, if any
    pub iterate_index: Option<usize>,
    /// Index of the chaining argument, if any
    pub chain_index: Option<usize>,
    /// Warnings gathered while planning
    pub warnings: Vec<ExpandWarning>,
}

/// Resolve every argument's value and arbitrate the repeat/chain flags.
#[must_use]
pub fn plan_values(arguments: &[FunctionArgument], scenario: &Scenario) -> ValuePlan {
    let mut resolved = Vec::with_capacity(arguments.len());
    let mut warnings = Vec::new();

    for argument in arguments {
        let entry = scenario.value_for(&argument.local_temp_id);
        let entered = entry.filter(|v| !v.is_blank()).map(|v| v.value.trim());

        let value = match (entered, argument.default_value()) {
            (Some(entered), _) => entered.to_string(),
            (None, Some(default)) => default.to_string(),
            (None, None) => {
                warnings.push(ExpandWarning::MissingValue {
                    name: argument.name.clone(),
                });
                "null".to_string()
            }
        };

        resolved.push(ResolvedArgument {
            name: argument.name.clone(),
            value,
            iterate: entry.is_some_and(|v| v.iterate_over),
            chain: entry.is_some_and(|v| v.use_previous_result),
        });
    }

    // Single-winner arbitration: the authoring UI keeps each flag unique,
    // but the data model does not enforce it, so tolerate surplus flags
    let iterate_index = resolved.iter().position(|r| r.iterate);
    let chain_index = resolved.iter().position(|r| r.chain);

    if let Some(winner) = iterate_index {
        for (i, r) in resolved.iter_mut().enumerate() {
            if r.iterate && i != winner {
                warnings.push(ExpandWarning::SurplusRepeatFlag {
                    name: r.name.clone(),
                    winner: arguments[winner].name.clone(),
                });
                r.iterate = false;
            }
        }
    }
    if let Some(winner) = chain_index {
        for (i, r) in resolved.iter_mut().enumerate() {
            if r.chain && i != winner {
                warnings.push(ExpandWarning::SurplusChainFlag {
                    name: r.name.clone(),
                    winner: arguments[winner].name.clone(),
                });
                r.chain = false;
            }
        }
    }

    ValuePlan {
        arguments: resolved,
        iterate_index,
        chain_index,
        warnings,
    }
}

/// The full outcome of running one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioOutcome {
    /// One response per invocation, in invocation order
    pub responses: Vec<EvaluationResponse>,
    /// The argument values each invocation was called with
    pub invocations: Vec<Vec<String>>,
    /// The repeat elements, when a repeat actually fanned out — these
    /// double as chart labels for the result series
    pub repeat_inputs: Option<Vec<String>>,
    /// Planning and execution warnings
    pub warnings: Vec<ExpandWarning>,
}

/// Expand `scenario` against the record's arguments and run every
/// invocation through `channel`, sequentially.
pub async fn run_scenario(
    channel: &SandboxChannel,
    arguments: &[FunctionArgument],
    body: &str,
    prelude: &str,
    scenario: &Scenario,
    timeout: Option<Duration>,
) -> ScenarioOutcome {
    let ValuePlan {
        arguments: resolved,
        iterate_index,
        chain_index,
        mut warnings,
    } = plan_values(arguments, scenario);

    let arrow = wex_compile::compile(arguments, body);

    // Evaluate the repeat expression first; its length is N
    let repeat_inputs = match iterate_index {
        Some(i) => {
            expand_repeat(channel, prelude, &resolved[i], timeout, &mut warnings).await
        }
        None => None,
    };
    let n = repeat_inputs.as_ref().map_or(1, Vec::len);

    tracing::debug!(invocations = n, "expanding scenario");

    let mut responses: Vec<EvaluationResponse> = Vec::with_capacity(n);
    let mut invocations: Vec<Vec<String>> = Vec::with_capacity(n);

    for k in 0..n {
        let mut values: Vec<String> =
            resolved.iter().map(|r| r.value.clone()).collect();

        if let (Some(i), Some(inputs)) = (iterate_index, &repeat_inputs) {
            values[i] = inputs[k].clone();
        }
        if let Some(c) = chain_index {
            if k > 0 {
                // The data dependency: k's input is k-1's result
                match responses[k - 1].result_text() {
                    Some(result) => values[c] = result.to_string(),
                    None => {
                        warnings.push(ExpandWarning::ChainAfterFailure {
                            index: k,
                            name: resolved[c].name.clone(),
                        });
                        values[c] = "null".to_string();
                    }
                }
            }
        }

        let source = wex_compile::call_source(prelude, &arrow, &values);
        let response = channel.submit(source, timeout).await;
        invocations.push(values);
        responses.push(response);
    }

    ScenarioOutcome {
        responses,
        invocations,
        repeat_inputs,
        warnings,
    }
}

/// Evaluate a repeat-flagged argument's value as an array expression.
/// Returns the element texts, or `None` (with a warning pushed) when the
/// scenario must fall back to a single unexpanded invocation.
async fn expand_repeat(
    channel: &SandboxChannel,
    prelude: &str,
    argument: &ResolvedArgument,
    timeout: Option<Duration>,
    warnings: &mut Vec<ExpandWarning>,
) -> Option<Vec<String>> {
    let source = if prelude.is_empty() {
        argument.value.clone()
    } else {
        format!("{prelude}{}", argument.value)
    };
    let response = channel.submit(source, timeout).await;

    let elements = response
        .result_text()
        .and_then(|text| serde_json::from_str::<serde_json::Value>(text).ok())
        .and_then(|value| match value {
            serde_json::Value::Array(items) => Some(items),
            _ => None,
        });

    match elements {
        Some(items) if items.is_empty() => {
            warnings.push(ExpandWarning::RepeatEmpty {
                name: argument.name.clone(),
            });
            None
        }
        Some(items) => Some(items.iter().map(ToString::to_string).collect()),
        None => {
            warnings.push(ExpandWarning::RepeatNotArray {
                name: argument.name.clone(),
            });
            None
        }
    }
}
