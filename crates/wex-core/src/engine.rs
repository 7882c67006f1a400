//! The evaluation engine
//!
//! Owns the sandbox channel and the dependency resolver for its
//! lifetime; the resolved closure and expanded invocation list live for
//! one evaluation cycle only.

use std::sync::Arc;
use std::time::Duration;
use wex_record::{Record, RecordStore, Scenario};
use wex_resolve::{DependencyResolver, Resolution, ResolutionStatus};
use wex_sandbox::{EvaluationResponse, SandboxChannel};
use wex_scenario::{compare, Comparison, ExpandWarning, PointSeries};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-invocation evaluation timeout; `None` uses the channel
    /// default (100 ms)
    pub timeout: Option<Duration>,
    /// Pause between dependency-resolution polls
    pub resolve_poll_interval: Duration,
    /// Poll attempts before a still-loading resolution is treated as
    /// failed for this cycle
    pub resolve_poll_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            resolve_poll_interval: Duration::from_millis(10),
            resolve_poll_attempts: 200,
        }
    }
}

/// Everything one evaluation cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioRun {
    /// One response per expanded invocation, in invocation order; empty
    /// when resolution failure aborted the cycle
    pub responses: Vec<EvaluationResponse>,
    /// The argument values each invocation was called with
    pub invocations: Vec<Vec<String>>,
    /// The repeat elements, when a repeat fanned out
    pub repeat_inputs: Option<Vec<String>>,
    /// Expansion warnings (missing values, surplus flags, fallbacks)
    pub warnings: Vec<ExpandWarning>,
    /// The dependency resolution this cycle ran against (partial on
    /// failure, still exposed for rendering)
    pub resolution: Resolution,
    /// Comparison against the stored expectation, when a result text
    /// existed to compare
    pub comparison: Option<Comparison>,
}

impl ScenarioRun {
    /// The text this run is compared (and recorded) under: the lone
    /// result for single invocations, the JSON array of per-invocation
    /// results for fan-outs. `None` when nothing succeeded.
    #[must_use]
    pub fn aggregate_result(&self) -> Option<String> {
        match self.responses.as_slice() {
            [] => None,
            [only] => only.result_text().map(str::to_string),
            many => {
                let parts: Vec<&str> = many
                    .iter()
                    .map(|r| r.result_text().unwrap_or("null"))
                    .collect();
                Some(format!("[{}]", parts.join(", ")))
            }
        }
    }

    /// The run's numeric series for charting or storing as a new
    /// expectation: labels are the repeat inputs when numeric, else
    /// invocation indices. `None` when any invocation failed or produced
    /// a non-numeric result.
    #[must_use]
    pub fn series(&self) -> Option<PointSeries> {
        if self.responses.is_empty() {
            return None;
        }
        let results: Option<Vec<f64>> = self
            .responses
            .iter()
            .map(|r| r.result_text().and_then(|t| t.parse::<f64>().ok()))
            .collect();
        let results = results?;

        let labels = self
            .repeat_inputs
            .as_ref()
            .and_then(|inputs| {
                inputs
                    .iter()
                    .map(|i| i.parse::<f64>().ok())
                    .collect::<Option<Vec<f64>>>()
            })
            .filter(|labels| labels.len() == results.len())
            .unwrap_or_else(|| (0..results.len()).map(|i| i as f64).collect());

        Some(PointSeries { labels, results })
    }
}

/// The evaluation orchestrator.
pub struct Engine<S> {
    channel: SandboxChannel,
    resolver: DependencyResolver<S>,
    config: EngineConfig,
}

impl<S: RecordStore> Engine<S> {
    /// Create an engine over the given store with a fresh sandbox.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    /// Create with explicit tuning
    #[must_use]
    pub fn with_config(store: Arc<S>, config: EngineConfig) -> Self {
        Self {
            channel: SandboxChannel::new(),
            resolver: DependencyResolver::new(store),
            config,
        }
    }

    /// Evaluate one scenario of one record.
    ///
    /// Resolution failure aborts the cycle (no invocations run); every
    /// other failure mode arrives as error-tagged responses or warnings
    /// inside the returned [`ScenarioRun`].
    pub async fn evaluate(&self, record: &Record, scenario: &Scenario) -> ScenarioRun {
        tracing::info!(record = %record.id, "evaluating scenario");

        // 1. Dependency closure, polled to completion (bounded)
        let resolution = self.resolve_to_completion(&record.body).await;
        if resolution.status != ResolutionStatus::Resolved {
            tracing::warn!(
                record = %record.id,
                status = ?resolution.status,
                "dependency resolution did not complete; aborting cycle"
            );
            return ScenarioRun {
                responses: Vec::new(),
                invocations: Vec::new(),
                repeat_inputs: None,
                warnings: Vec::new(),
                resolution,
                comparison: None,
            };
        }

        // 2. Compile: alias prelude plus the reference-rewritten body.
        // Round-two dependencies declare first: a value record's
        // initializer evaluates eagerly and may read them.
        let declaration_order: Vec<_> =
            resolution.records.iter().rev().cloned().collect();
        let prelude = wex_compile::upsert_prelude(&declaration_order, "");
        let body = wex_compile::rewrite_references(&record.body);

        // 3. Expand and run, strictly sequentially
        let outcome = wex_scenario::run_scenario(
            &self.channel,
            &record.arguments,
            &body,
            &prelude,
            scenario,
            self.config.timeout,
        )
        .await;

        tracing::debug!(
            record = %record.id,
            invocations = outcome.responses.len(),
            warnings = outcome.warnings.len(),
            "scenario run finished"
        );

        // 4. Compare against the stored expectation
        let mut run = ScenarioRun {
            responses: outcome.responses,
            invocations: outcome.invocations,
            repeat_inputs: outcome.repeat_inputs,
            warnings: outcome.warnings,
            resolution,
            comparison: None,
        };
        if let Some(result) = run.aggregate_result() {
            run.comparison = Some(compare(&result, scenario.expected_result.as_deref()));
        }
        run
    }

    /// One dependency-resolution poll step, for callers that subscribe
    /// to progress as it happens.
    pub async fn resolve_dependencies(&self, body: &str) -> Resolution {
        self.resolver.poll(body).await
    }

    /// Tear down the sandbox. The engine is done after this; create a
    /// new one for the next cycle.
    pub fn dispose(&self) {
        self.channel.dispose();
    }

    async fn resolve_to_completion(&self, body: &str) -> Resolution {
        let mut resolution = self.resolver.poll(body).await;
        let mut attempts = self.config.resolve_poll_attempts;
        while !resolution.is_settled() && attempts > 0 {
            tokio::time::sleep(self.config.resolve_poll_interval).await;
            resolution = self.resolver.poll(body).await;
            attempts -= 1;
        }
        resolution
    }
}
