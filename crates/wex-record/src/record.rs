//! Records, function arguments, and worked scenarios
//!
//! A record's function is described by its argument list and a body of
//! source text; scenarios hold example input sets (and optional expected
//! outputs) keyed by each argument's client-local temp id, so values
//! survive the window between an argument being authored and it being
//! persisted with a durable id.

use crate::ident::IdVersion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Argument value types.
///
/// Only numbers today; the enum exists so widening to other types is a
/// data-model change, not an API break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Floating-point number
    #[default]
    Number,
}

/// A declared function argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionArgument {
    /// Durable id, present once the argument has been persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Stable client-local handle; scenario values are keyed by this
    pub local_temp_id: String,
    /// Argument name as it appears in the compiled signature
    pub name: String,
    /// Value type
    #[serde(default)]
    pub value_type: ValueType,
    /// Default value source text; empty means "no default"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Author-facing description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FunctionArgument {
    /// Create a named number argument with a fresh temp id
    #[must_use]
    pub fn new(local_temp_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            local_temp_id: local_temp_id.into(),
            name: name.into(),
            value_type: ValueType::Number,
            default_value: None,
            description: None,
        }
    }

    /// Attach a default value
    #[must_use]
    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    /// Default value, treating empty text as "no default"
    #[inline]
    #[must_use]
    pub fn default_value(&self) -> Option<&str> {
        self.default_value
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    /// An argument with an empty name, description, and default is
    /// considered absent and is pruned on save.
    #[must_use]
    pub fn is_prunable(&self) -> bool {
        self.name.trim().is_empty()
            && self
                .description
                .as_deref()
                .map_or(true, |d| d.trim().is_empty())
            && self.default_value().is_none()
    }
}

/// A per-argument scenario value plus its expansion flags.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScenarioValue {
    /// Entered value source text
    #[serde(default)]
    pub value: String,
    /// Repeat: treat the value as an array expression and fan out one
    /// invocation per element
    #[serde(default)]
    pub iterate_over: bool,
    /// Chaining: feed the previous invocation's result in as this
    /// argument's value
    #[serde(default)]
    pub use_previous_result: bool,
}

impl ScenarioValue {
    /// A plain entered value with no flags
    #[must_use]
    pub fn entered(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// True when no value text has been entered
    #[inline]
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }
}

/// A worked scenario: example inputs and an optional expected output.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Scenario {
    /// Stable client-local handle
    pub local_temp_id: String,
    /// Rich-text description (serialized markup)
    #[serde(default)]
    pub description: String,
    /// Values keyed by each argument's `local_temp_id`
    #[serde(default)]
    pub values_by_temp_id: BTreeMap<String, ScenarioValue>,
    /// Previously stored expected result text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_result: Option<String>,
    /// Outcome of the last comparison against `expected_result`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expectation_met: Option<bool>,
}

impl Scenario {
    /// Create an empty scenario with the given temp id
    #[must_use]
    pub fn new(local_temp_id: impl Into<String>) -> Self {
        Self {
            local_temp_id: local_temp_id.into(),
            ..Self::default()
        }
    }

    /// Set the value for one argument temp id
    #[must_use]
    pub fn with_value(mut self, temp_id: impl Into<String>, value: ScenarioValue) -> Self {
        self.values_by_temp_id.insert(temp_id.into(), value);
        self
    }

    /// Look up the value entered for an argument
    #[inline]
    #[must_use]
    pub fn value_for(&self, temp_id: &str) -> Option<&ScenarioValue> {
        self.values_by_temp_id.get(temp_id)
    }

    /// A scenario is empty (prunable) iff its description has no visible
    /// text and every value is blank. Flags alone do not count as
    /// content: a `use_previous_result` checkbox on an otherwise blank
    /// scenario does not keep it alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        visible_text(&self.description).is_empty()
            && self.values_by_temp_id.values().all(ScenarioValue::is_blank)
    }
}

/// Visible text of a serialized rich-text fragment: markup tags stripped,
/// whitespace trimmed.
#[must_use]
pub(crate) fn visible_text(richtext: &str) -> String {
    let mut out = String::with_capacity(richtext.len());
    let mut in_tag = false;
    for ch in richtext.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Per-item validation findings for a record's argument list.
///
/// These are surfaced as authoring warnings; none of them block a
/// best-effort evaluation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationIssue {
    /// An argument has no name
    #[error("argument {index} has an empty name")]
    EmptyName {
        /// Position in declaration order
        index: usize,
    },
    /// Two arguments share a name (case-sensitive)
    #[error("duplicate argument name `{name}`")]
    DuplicateName {
        /// The repeated name
        name: String,
    },
}

/// The persisted record: function, arguments, scenarios, and the
/// transitive dependency list recorded at last save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Versioned identity
    pub id: IdVersion,
    /// Human-readable title; also the source of the compiler's
    /// human-readable dependency alias
    pub title: String,
    /// Function body / value source text, possibly carrying embedded
    /// references to other records
    pub body: String,
    /// Declared arguments, in declaration order
    #[serde(default)]
    pub arguments: Vec<FunctionArgument>,
    /// Worked scenarios
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
    /// Precomputed transitive dependency closure as of last save.
    /// Consumed read-only by the resolver's second round.
    #[serde(default)]
    pub recursive_dependency_ids: Vec<IdVersion>,
}

impl Record {
    /// Create a record with a title and body and nothing else
    #[must_use]
    pub fn new(id: IdVersion, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
            arguments: Vec::new(),
            scenarios: Vec::new(),
            recursive_dependency_ids: Vec::new(),
        }
    }

    /// Validate the argument list, reporting one issue per finding.
    #[must_use]
    pub fn validate_arguments(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let mut seen: Vec<&str> = Vec::new();
        for (index, arg) in self.arguments.iter().enumerate() {
            let name = arg.name.trim();
            if name.is_empty() {
                issues.push(ValidationIssue::EmptyName { index });
                continue;
            }
            if seen.contains(&name) {
                issues.push(ValidationIssue::DuplicateName {
                    name: name.to_string(),
                });
            } else {
                seen.push(name);
            }
        }
        issues
    }

    /// Save-time pruning: drop absent arguments, empty scenarios, and
    /// scenario values keyed by temp ids no argument owns anymore.
    pub fn prune_on_save(&mut self) {
        self.arguments.retain(|a| !a.is_prunable());
        let live: Vec<String> = self
            .arguments
            .iter()
            .map(|a| a.local_temp_id.clone())
            .collect();
        for scenario in &mut self.scenarios {
            scenario
                .values_by_temp_id
                .retain(|temp_id, _| live.contains(temp_id));
        }
        self.scenarios.retain(|s| !s.is_empty());
    }
}
