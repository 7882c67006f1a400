//! End-to-end engine tests: store → resolution → compile → sandbox →
//! comparison.

use std::sync::Arc;
use wex_core::{Engine, EngineConfig, IdVersion, ResolutionStatus, ScenarioValue};
use wex_test_utils::{function_record, scenario_with_values, value_record, MemoryStore};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn evaluates_a_simple_scenario() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(store);

    let record = function_record(
        1,
        1,
        "Clamped",
        &[("min", "0"), ("value", "")],
        "Math.max(value, min)",
    );
    let scenario = scenario_with_values(&[("min", "0"), ("value", "5")]);

    let run = engine.evaluate(&record, &scenario).await;

    assert_eq!(run.responses.len(), 1);
    assert_eq!(run.responses[0].result_text(), Some("5"));
    assert_eq!(run.resolution.status, ResolutionStatus::Resolved);
    // No expectation stored: no claim made
    assert!(run.comparison.is_none() || run.comparison.as_ref().unwrap().met.is_none());
}

#[tokio::test]
async fn dependency_references_resolve_compile_and_evaluate() {
    init_logging();
    let store = Arc::new(MemoryStore::with_records([value_record(
        12,
        3,
        "Solar Output",
        "4",
    )]));
    let engine = Engine::new(store);

    let record = function_record(2, 1, "Daily", &[("time", "")], "record://12@v3 * time");
    let scenario = scenario_with_values(&[("time", "2")]);

    let run = engine.evaluate(&record, &scenario).await;

    assert_eq!(run.resolution.closure, vec![IdVersion::new(12, 3)]);
    assert_eq!(run.responses[0].result_text(), Some("8"));
}

#[tokio::test]
async fn transitive_dependencies_arrive_through_round_two() {
    init_logging();
    // "Yield" depends on "Solar Output"; its recorded closure carries it
    let mut yield_record = function_record(
        20,
        1,
        "Yield",
        &[("plants", "1")],
        "plants * record://12@v3",
    );
    yield_record.recursive_dependency_ids = vec![IdVersion::new(12, 3)];
    let store = Arc::new(MemoryStore::with_records([
        yield_record,
        value_record(12, 3, "Solar Output", "4"),
    ]));
    let engine = Engine::new(store);

    // Top record references Yield only; Solar arrives via round two
    let record = function_record(30, 1, "Report", &[("n", "")], "record://20@v1(n)");
    let scenario = scenario_with_values(&[("n", "2")]);

    let run = engine.evaluate(&record, &scenario).await;

    assert_eq!(
        run.resolution.closure,
        vec![IdVersion::new(20, 1), IdVersion::new(12, 3)]
    );
    // d20 is Yield's compiled arrow; d12 feeds it through the prelude
    assert_eq!(run.responses[0].result_text(), Some("8"));
}

#[tokio::test]
async fn repeat_and_chain_produce_the_worked_series() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(store);

    let record = function_record(
        3,
        1,
        "Growth",
        &[("time", ""), ("plants", "1")],
        "plants * 4",
    );
    let mut scenario = scenario_with_values(&[]);
    scenario = scenario.with_value(
        "t-time",
        ScenarioValue {
            value: "range(3, 6)".to_string(),
            iterate_over: true,
            use_previous_result: false,
        },
    );
    scenario = scenario.with_value(
        "t-plants",
        ScenarioValue {
            value: "1".to_string(),
            iterate_over: false,
            use_previous_result: true,
        },
    );
    scenario.expected_result = Some("[4, 16, 64]".to_string());

    let run = engine.evaluate(&record, &scenario).await;

    assert_eq!(run.aggregate_result().as_deref(), Some("[4, 16, 64]"));
    let comparison = run.comparison.as_ref().expect("expectation compared");
    assert_eq!(comparison.met, Some(true));

    let series = run.series().expect("numeric series");
    assert_eq!(series.labels, vec![3.0, 4.0, 5.0]);
    assert_eq!(series.results, vec![4.0, 16.0, 64.0]);
}

#[tokio::test]
async fn stale_expectation_is_reported_not_met() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(store);

    let record = function_record(4, 1, "Doubler", &[("x", "")], "x * 2");
    let mut scenario = scenario_with_values(&[("x", "3")]);
    scenario.expected_result = Some("7".to_string());

    let run = engine.evaluate(&record, &scenario).await;

    assert_eq!(run.responses[0].result_text(), Some("6"));
    assert_eq!(run.comparison.unwrap().met, Some(false));
}

#[tokio::test]
async fn missing_dependency_aborts_the_cycle_with_partial_closure() {
    init_logging();
    let store = Arc::new(MemoryStore::with_records([value_record(1, 1, "Here", "1")]));
    let engine = Engine::new(store);

    let record = function_record(
        5,
        1,
        "Broken",
        &[("x", "")],
        "record://1@v1 + record://99@v9 + x",
    );
    let scenario = scenario_with_values(&[("x", "1")]);

    let run = engine.evaluate(&record, &scenario).await;

    assert_eq!(run.resolution.status, ResolutionStatus::Failed);
    // Nothing ran, but the partial closure is still visible
    assert!(run.responses.is_empty());
    assert_eq!(run.resolution.records.len(), 1);
    assert_eq!(run.resolution.closure.len(), 2);
}

#[tokio::test]
async fn slow_store_is_polled_to_completion() {
    init_logging();
    let store = Arc::new(MemoryStore::with_records([value_record(
        7,
        1,
        "Slow Constant",
        "10",
    )]));
    store.set_loading(IdVersion::new(7, 1), 2);
    let engine = Engine::with_config(
        store,
        EngineConfig {
            resolve_poll_interval: std::time::Duration::from_millis(1),
            ..EngineConfig::default()
        },
    );

    let record = function_record(8, 1, "Uses Slow", &[("x", "")], "record://7@v1 + x");
    let scenario = scenario_with_values(&[("x", "5")]);

    let run = engine.evaluate(&record, &scenario).await;

    assert_eq!(run.resolution.status, ResolutionStatus::Resolved);
    assert_eq!(run.responses[0].result_text(), Some("15"));
}

#[tokio::test]
async fn execution_errors_surface_as_tagged_responses() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(store);

    let record = function_record(9, 1, "Faulty", &[("x", "")], "x + not_a_thing");
    let scenario = scenario_with_values(&[("x", "1")]);

    let run = engine.evaluate(&record, &scenario).await;

    assert_eq!(run.responses.len(), 1);
    assert!(run.responses[0].is_error());
    assert!(run.responses[0]
        .error
        .as_deref()
        .unwrap()
        .contains("not defined"));
}

#[tokio::test]
async fn resolve_dependencies_reports_loading_progress() {
    init_logging();
    let store = Arc::new(MemoryStore::with_records([value_record(6, 1, "Later", "2")]));
    store.set_loading(IdVersion::new(6, 1), 1);
    let engine = Engine::new(store);

    let first = engine.resolve_dependencies("record://6@v1").await;
    assert_eq!(first.status, ResolutionStatus::Loading);

    let second = engine.resolve_dependencies("record://6@v1").await;
    assert_eq!(second.status, ResolutionStatus::Resolved);
}
