//! End-to-end scenario expansion against a live sandbox channel.

use wex_record::{FunctionArgument, Scenario, ScenarioValue};
use wex_sandbox::SandboxChannel;
use wex_scenario::{run_scenario, ExpandWarning};

fn growth_arguments() -> Vec<FunctionArgument> {
    vec![
        FunctionArgument::new("t-time", "time"),
        FunctionArgument::new("t-plants", "plants").with_default("1"),
    ]
}

fn repeat(value: &str) -> ScenarioValue {
    ScenarioValue {
        value: value.to_string(),
        iterate_over: true,
        use_previous_result: false,
    }
}

fn chained(value: &str) -> ScenarioValue {
    ScenarioValue {
        value: value.to_string(),
        iterate_over: false,
        use_previous_result: true,
    }
}

#[tokio::test]
async fn repeat_over_range_expands_to_one_invocation_per_element() {
    let channel = SandboxChannel::new();
    let scenario = Scenario::new("s")
        .with_value("t-time", repeat("range(3, 6)"))
        .with_value("t-plants", ScenarioValue::entered("2"));

    let outcome = run_scenario(
        &channel,
        &growth_arguments(),
        "time * plants",
        "",
        &scenario,
        None,
    )
    .await;

    assert_eq!(outcome.responses.len(), 3);
    assert_eq!(outcome.repeat_inputs, Some(vec!["3".into(), "4".into(), "5".into()]));
    // time varies, plants held constant
    assert_eq!(outcome.invocations[0], vec!["3", "2"]);
    assert_eq!(outcome.invocations[1], vec!["4", "2"]);
    assert_eq!(outcome.invocations[2], vec!["5", "2"]);
    let results: Vec<&str> = outcome
        .responses
        .iter()
        .map(|r| r.result_text().unwrap())
        .collect();
    assert_eq!(results, vec!["6", "8", "10"]);
}

#[tokio::test]
async fn chained_argument_feeds_each_result_forward() {
    let channel = SandboxChannel::new();
    // (time, plants = 1) => plants * 4, seeded with plants = 1, over
    // three repeats: 4, then 16, then 64
    let scenario = Scenario::new("s")
        .with_value("t-time", repeat("range(3, 6)"))
        .with_value("t-plants", chained("1"));

    let outcome = run_scenario(
        &channel,
        &growth_arguments(),
        "plants * 4",
        "",
        &scenario,
        None,
    )
    .await;

    let results: Vec<&str> = outcome
        .responses
        .iter()
        .map(|r| r.result_text().unwrap())
        .collect();
    assert_eq!(results, vec!["4", "16", "64"]);

    // Invocation k's substituted value equals invocation k-1's result
    assert_eq!(outcome.invocations[0][1], "1");
    assert_eq!(outcome.invocations[1][1], "4");
    assert_eq!(outcome.invocations[2][1], "16");
}

#[tokio::test]
async fn no_repeat_flag_means_exactly_one_invocation() {
    let channel = SandboxChannel::new();
    // An array literal without the repeat flag passes through as an
    // ordinary single input
    let scenario = Scenario::new("s")
        .with_value("t-time", ScenarioValue::entered("[3, 4, 5]"))
        .with_value("t-plants", ScenarioValue::entered("2"));

    let outcome = run_scenario(
        &channel,
        &growth_arguments(),
        "time.length * plants",
        "",
        &scenario,
        None,
    )
    .await;

    assert_eq!(outcome.responses.len(), 1);
    assert_eq!(outcome.responses[0].result_text(), Some("6"));
    assert!(outcome.repeat_inputs.is_none());
}

#[tokio::test]
async fn non_array_repeat_falls_back_to_single_invocation() {
    let channel = SandboxChannel::new();
    let scenario = Scenario::new("s")
        .with_value("t-time", repeat("7"))
        .with_value("t-plants", ScenarioValue::entered("2"));

    let outcome = run_scenario(
        &channel,
        &growth_arguments(),
        "time * plants",
        "",
        &scenario,
        None,
    )
    .await;

    assert_eq!(outcome.responses.len(), 1);
    assert_eq!(outcome.responses[0].result_text(), Some("14"));
    assert!(outcome
        .warnings
        .contains(&ExpandWarning::RepeatNotArray {
            name: "time".to_string()
        }));
}

#[tokio::test]
async fn empty_repeat_array_falls_back_with_warning() {
    let channel = SandboxChannel::new();
    let scenario = Scenario::new("s")
        .with_value("t-time", repeat("range(2, 2)"))
        .with_value("t-plants", ScenarioValue::entered("3"));

    let outcome = run_scenario(
        &channel,
        &growth_arguments(),
        "plants",
        "",
        &scenario,
        None,
    )
    .await;

    assert_eq!(outcome.responses.len(), 1);
    assert!(outcome
        .warnings
        .contains(&ExpandWarning::RepeatEmpty {
            name: "time".to_string()
        }));
}

#[tokio::test]
async fn failed_predecessor_chains_null_and_keeps_going() {
    let channel = SandboxChannel::new();
    // Invocation 0 fails (calls an undefined name); invocations 1..
    // receive null and still produce responses
    let arguments = vec![
        FunctionArgument::new("t-x", "x"),
        FunctionArgument::new("t-acc", "acc").with_default("0"),
    ];
    let scenario = Scenario::new("s")
        .with_value("t-x", repeat("range(2)"))
        .with_value("t-acc", chained("broken()"));

    let outcome = run_scenario(&channel, &arguments, "acc", "", &scenario, None).await;

    // One response per invocation even with the failure
    assert_eq!(outcome.responses.len(), 2);
    assert!(outcome.responses[0].is_error());
    assert!(outcome
        .warnings
        .iter()
        .any(|w| matches!(w, ExpandWarning::ChainAfterFailure { index: 1, .. })));
    assert_eq!(outcome.invocations[1][1], "null");
    assert_eq!(outcome.responses[1].result_text(), Some("null"));
}

#[tokio::test]
async fn prelude_declarations_are_visible_to_invocations() {
    let channel = SandboxChannel::new();
    let arguments = vec![FunctionArgument::new("t-time", "time")];
    let scenario =
        Scenario::new("s").with_value("t-time", ScenarioValue::entered("2"));

    let outcome = run_scenario(
        &channel,
        &arguments,
        "solar_output * time",
        "/* Solar Output (12@v3) */\nlet d12 = (4);\nlet solar_output = d12;\n",
        &scenario,
        None,
    )
    .await;

    assert_eq!(outcome.responses[0].result_text(), Some("8"));
}

#[tokio::test]
async fn repeat_expression_may_use_the_prelude() {
    let channel = SandboxChannel::new();
    let arguments = vec![FunctionArgument::new("t-time", "time")];
    let scenario =
        Scenario::new("s").with_value("t-time", repeat("range(0, span)"));

    let outcome = run_scenario(
        &channel,
        &arguments,
        "time",
        "let span = 2;\n",
        &scenario,
        None,
    )
    .await;

    assert_eq!(outcome.responses.len(), 2);
}
