//! Result/expectation comparison
//!
//! A fresh result and a stored expectation are compared point-by-point
//! when both parse as a labeled point series; otherwise the raw texts
//! are compared for exact equality. Numeric matching is exact `==` —
//! no epsilon — preserving the recorded behavior until a product
//! decision says otherwise.

use serde_json::Value as Json;

/// A graphable result: labels and results of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSeries {
    /// Point labels (indices when the source was a plain array)
    pub labels: Vec<f64>,
    /// Point values
    pub results: Vec<f64>,
}

/// The merged view a renderer consumes: fresh results, expected values,
/// and per-point match flags, aligned by index.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedSeries {
    /// Point labels from the fresh result
    pub labels: Vec<f64>,
    /// Fresh result values
    pub results: Vec<f64>,
    /// Expected values, when an expectation parsed
    pub expected: Option<Vec<f64>>,
    /// Per-index match flags, when an expectation parsed
    pub matched: Option<Vec<bool>>,
}

/// Outcome of one comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// `None` when no expectation was stored (no claim made)
    pub met: Option<bool>,
    /// Series view of the result (and expectation), when parseable
    pub merged: Option<MergedSeries>,
}

/// Parse result text into a point series. Accepted shapes:
///
/// - a JSON array of numbers (labels become indices),
/// - a JSON array of `[label, value]` pairs,
/// - a JSON object `{ "labels": […], "results": […] }` of equal length.
///
/// Anything else is an opaque scalar for comparison purposes.
#[must_use]
pub fn parse_series(text: &str) -> Option<PointSeries> {
    let json: Json = serde_json::from_str(text.trim()).ok()?;

    match json {
        Json::Array(items) => {
            if items.is_empty() {
                return Some(PointSeries {
                    labels: Vec::new(),
                    results: Vec::new(),
                });
            }
            // All numbers: index-labeled series
            if let Some(results) = all_numbers(&items) {
                let labels = (0..results.len()).map(|i| i as f64).collect();
                return Some(PointSeries { labels, results });
            }
            // All [label, value] pairs
            let mut labels = Vec::with_capacity(items.len());
            let mut results = Vec::with_capacity(items.len());
            for item in &items {
                let Json::Array(pair) = item else { return None };
                let [label, value] = pair.as_slice() else {
                    return None;
                };
                labels.push(label.as_f64()?);
                results.push(value.as_f64()?);
            }
            Some(PointSeries { labels, results })
        }
        Json::Object(map) => {
            let labels = all_numbers(map.get("labels")?.as_array()?)?;
            let results = all_numbers(map.get("results")?.as_array()?)?;
            (labels.len() == results.len()).then_some(PointSeries { labels, results })
        }
        _ => None,
    }
}

fn all_numbers(items: &[Json]) -> Option<Vec<f64>> {
    items.iter().map(Json::as_f64).collect()
}

/// Compare a fresh result against an optional stored expectation.
#[must_use]
pub fn compare(result: &str, expected: Option<&str>) -> Comparison {
    let result_series = parse_series(result);

    let Some(expected) = expected else {
        // No expectation: no claim made
        return Comparison {
            met: None,
            merged: result_series.map(|s| MergedSeries {
                labels: s.labels,
                results: s.results,
                expected: None,
                matched: None,
            }),
        };
    };

    match (result_series, parse_series(expected)) {
        (Some(fresh), Some(stored)) => {
            // Align by index, not by label; the two series must have
            // equal length to be fully met
            let matched: Vec<bool> = fresh
                .results
                .iter()
                .zip(stored.results.iter())
                .map(|(r, e)| r == e)
                .collect();
            let met = fresh.results.len() == stored.results.len()
                && matched.iter().all(|&m| m);
            Comparison {
                met: Some(met),
                merged: Some(MergedSeries {
                    labels: fresh.labels,
                    results: fresh.results,
                    expected: Some(stored.results),
                    matched: Some(matched),
                }),
            }
        }
        (fresh, _) => Comparison {
            // Either side failed to parse: exact string equality
            met: Some(result == expected),
            merged: fresh.map(|s| MergedSeries {
                labels: s.labels,
                results: s.results,
                expected: None,
                matched: None,
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_array_parses_with_index_labels() {
        let series = parse_series("[4, 16, 64]").unwrap();
        assert_eq!(series.labels, vec![0.0, 1.0, 2.0]);
        assert_eq!(series.results, vec![4.0, 16.0, 64.0]);
    }

    #[test]
    fn pair_array_parses_labels() {
        let series = parse_series("[[3, 4], [4, 16], [5, 64]]").unwrap();
        assert_eq!(series.labels, vec![3.0, 4.0, 5.0]);
        assert_eq!(series.results, vec![4.0, 16.0, 64.0]);
    }

    #[test]
    fn object_shape_parses() {
        let series = parse_series(r#"{"labels": [1, 2], "results": [10, 20]}"#).unwrap();
        assert_eq!(series.labels, vec![1.0, 2.0]);
        assert_eq!(series.results, vec![10.0, 20.0]);
    }

    #[test]
    fn scalars_and_ragged_shapes_do_not_parse() {
        assert!(parse_series("42").is_none());
        assert!(parse_series("oops").is_none());
        assert!(parse_series(r#"[1, "two"]"#).is_none());
        assert!(parse_series(r#"{"labels": [1], "results": [1, 2]}"#).is_none());
    }

    #[test]
    fn no_expectation_makes_no_claim() {
        let comparison = compare("[1, 2]", None);
        assert_eq!(comparison.met, None);
        assert!(comparison.merged.is_some());
    }

    #[test]
    fn matching_series_is_met() {
        let comparison = compare("[4, 16, 64]", Some("[4, 16, 64]"));
        assert_eq!(comparison.met, Some(true));
        let merged = comparison.merged.unwrap();
        assert_eq!(merged.matched, Some(vec![true, true, true]));
    }

    #[test]
    fn point_mismatch_is_flagged_per_index() {
        let comparison = compare("[4, 17, 64]", Some("[4, 16, 64]"));
        assert_eq!(comparison.met, Some(false));
        let merged = comparison.merged.unwrap();
        assert_eq!(merged.matched, Some(vec![true, false, true]));
        assert_eq!(merged.expected, Some(vec![4.0, 16.0, 64.0]));
    }

    #[test]
    fn length_mismatch_is_not_met() {
        let comparison = compare("[4, 16]", Some("[4, 16, 64]"));
        assert_eq!(comparison.met, Some(false));
    }

    #[test]
    fn scalar_results_fall_back_to_string_equality() {
        assert_eq!(compare("42", Some("42")).met, Some(true));
        assert_eq!(compare("42", Some("43")).met, Some(false));
        // Exact text, no normalization
        assert_eq!(compare("42", Some("42.0")).met, Some(false));
    }

    #[test]
    fn exactness_no_epsilon() {
        let comparison = compare("[0.30000000000000004]", Some("[0.3]"));
        assert_eq!(comparison.met, Some(false));
    }
}
