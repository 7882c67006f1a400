//! WEX function compiler (wex-compile)
//!
//! Turns a record's declared arguments and body text into one
//! self-contained unit of source code, and prepends the declarations
//! that make resolved dependency records addressable inside the body —
//! both by positional alias (`d<id>`) and by a human-readable alias
//! derived from the record's title.
//!
//! Pure string-to-string transformations throughout; nothing here
//! touches the sandbox or the store.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use wex_record::{FunctionArgument, Record, REFERENCE_PATTERN};

static REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(REFERENCE_PATTERN).expect("reference pattern"));

/// Rewrite embedded record mentions to their positional aliases, so a
/// body reading `record://12@v3 * time` compiles to `d12 * time` with
/// the prelude supplying `d12`. Version-less mentions rewrite too — the
/// resolver reports them, but compilation stays best-effort.
#[must_use]
pub fn rewrite_references(body: &str) -> String {
    REFERENCE
        .replace_all(body, |caps: &Captures<'_>| format!("d{}", &caps[1]))
        .into_owned()
}

/// Compile an argument list and body into a single arrow function.
///
/// The signature renders arguments in declaration order, as `name` or
/// `name = default` when a non-empty default is present. A single-line
/// body becomes an arrow-expression body verbatim; a multi-line body is
/// de-indented, wrapped in a block, given an explicit `return` on its
/// last non-blank line when missing, and re-indented uniformly.
#[must_use]
pub fn compile(args: &[FunctionArgument], body: &str) -> String {
    format!("({}) => {}", signature(args), normalize_body(body))
}

/// Render the parenthesized part of the signature.
#[must_use]
pub fn signature(args: &[FunctionArgument]) -> String {
    args.iter()
        .map(|arg| match arg.default_value() {
            Some(default) => format!("{} = {}", arg.name.trim(), default),
            None => arg.name.trim().to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn normalize_body(body: &str) -> String {
    let lines: Vec<&str> = body.lines().collect();
    let non_blank: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|l| !l.trim().is_empty())
        .collect();

    if non_blank.len() <= 1 {
        // Single expression: used verbatim, no block, no injected return
        return non_blank.first().map_or(String::new(), |l| l.trim().to_string());
    }

    // De-indent: strip the common leading whitespace of non-blank lines
    let leading = |l: &str| l.chars().take_while(|c| c.is_whitespace()).count();
    let margin = non_blank.iter().map(|l| leading(l)).min().unwrap_or(0);
    let mut dedented: Vec<String> = non_blank
        .iter()
        .map(|l| {
            let mut chars = l.chars();
            for _ in 0..margin {
                chars.next();
            }
            chars.as_str().to_string()
        })
        .collect();

    // The block must produce a value: give the last line a return
    if let Some(last) = dedented.last_mut() {
        let trimmed = last.trim_start();
        if !trimmed.starts_with("return ") && trimmed != "return" {
            let indent_len = last.len() - trimmed.len();
            let rewritten = format!("{}return {}", &last[..indent_len], trimmed);
            *last = rewritten;
        }
    }

    let indented: Vec<String> = dedented.iter().map(|l| format!("  {l}")).collect();
    format!("{{\n{}\n}}", indented.join("\n"))
}

/// Human-readable alias for a record title: lowercased, non-alphanumeric
/// runs collapsed to `_`, guarded against a leading digit. Empty titles
/// produce no alias (the positional `d<id>` form still works).
#[must_use]
pub fn title_alias(title: &str) -> Option<String> {
    let mut alias = String::with_capacity(title.len());
    let mut last_was_sep = false;
    for ch in title.trim().chars() {
        if ch.is_alphanumeric() {
            alias.extend(ch.to_lowercase());
            last_was_sep = false;
        } else if !alias.is_empty() && !last_was_sep {
            alias.push('_');
            last_was_sep = true;
        }
    }
    let alias = alias.trim_end_matches('_').to_string();
    if alias.is_empty() {
        return None;
    }
    if alias.starts_with(|c: char| c.is_ascii_digit()) {
        return Some(format!("_{alias}"));
    }
    Some(alias)
}

/// The expression a dependency alias binds to: records with declared
/// arguments compile to their (callable) arrow, value records to their
/// parenthesized body. The body's own embedded references rewrite to
/// positional aliases, so a dependency may read its dependencies.
#[must_use]
pub fn dependency_expression(record: &Record) -> String {
    let body = rewrite_references(&record.body);
    if record.arguments.is_empty() {
        format!("({})", body.trim())
    } else {
        compile(&record.arguments, &body)
    }
}

/// One dependency's declarations: a block-comment header, the positional
/// alias, and (when the title yields one) the human-readable alias.
#[must_use]
pub fn dependency_declaration(record: &Record) -> String {
    let positional = format!("d{}", record.id.id);
    let mut out = format!(
        "/* {} ({}) */\nlet {} = {};\n",
        record.title.trim(),
        record.id,
        positional,
        dependency_expression(record)
    );
    if let Some(alias) = title_alias(&record.title) {
        if alias != positional {
            out.push_str(&format!("let {alias} = {positional};\n"));
        }
    }
    out
}

/// Prepend declarations for every resolved dependency to `code`.
///
/// Upsert semantics: a dependency whose human-readable alias is already
/// declared in `code` is left untouched, so applying this twice yields
/// the same text as applying it once.
#[must_use]
pub fn upsert_prelude(dependencies: &[Record], code: &str) -> String {
    let mut prelude = String::new();
    for record in dependencies {
        let declared = title_alias(&record.title)
            .map(|alias| format!("let {alias} = "))
            .or_else(|| Some(format!("let d{} = ", record.id.id)))
            .is_some_and(|needle| code.contains(&needle) || prelude.contains(&needle));
        if !declared {
            prelude.push_str(&dependency_declaration(record));
        }
    }
    if prelude.is_empty() {
        code.to_string()
    } else {
        format!("{prelude}{code}")
    }
}

/// Assemble the program one invocation actually executes: the dependency
/// prelude, then the compiled function applied to the per-invocation
/// argument values (in declaration order).
#[must_use]
pub fn call_source(prelude: &str, arrow: &str, values: &[String]) -> String {
    let call = format!("({})({})", arrow, values.join(", "));
    if prelude.is_empty() {
        call
    } else {
        format!("{prelude}{call}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wex_record::IdVersion;

    fn args() -> Vec<FunctionArgument> {
        vec![
            FunctionArgument::new("t1", "min").with_default("0"),
            FunctionArgument::new("t2", "value"),
        ]
    }

    #[test]
    fn compiles_defaulted_signature_exactly() {
        assert_eq!(
            compile(&args(), "Math.max(value, min)"),
            "(min = 0, value) => Math.max(value, min)"
        );
    }

    #[test]
    fn empty_default_is_omitted_from_signature() {
        let args = vec![FunctionArgument::new("t1", "x").with_default("   ")];
        assert_eq!(compile(&args, "x"), "(x) => x");
    }

    #[test]
    fn arguments_render_in_declaration_order_not_name_order() {
        let args = vec![
            FunctionArgument::new("t1", "zeta"),
            FunctionArgument::new("t2", "alpha"),
        ];
        assert_eq!(signature(&args), "zeta, alpha");
    }

    #[test]
    fn multiline_body_gets_block_and_return() {
        let body = "    let growth = plants * 4\n    growth";
        assert_eq!(
            compile(&[FunctionArgument::new("t1", "plants")], body),
            "(plants) => {\n  let growth = plants * 4\n  return growth\n}"
        );
    }

    #[test]
    fn existing_return_is_not_doubled() {
        let body = "let g = x * 2\nreturn g";
        let compiled = compile(&[FunctionArgument::new("t1", "x")], body);
        assert_eq!(compiled.matches("return").count(), 1);
    }

    #[test]
    fn blank_lines_do_not_defeat_deindent() {
        let body = "  let a = 1\n\n  a + 1";
        assert_eq!(
            normalize_body(body),
            "{\n  let a = 1\n  return a + 1\n}"
        );
    }

    #[test]
    fn title_alias_derivation() {
        assert_eq!(title_alias("Solar Output"), Some("solar_output".into()));
        assert_eq!(title_alias("  CO2 (ppm)  "), Some("co2_ppm".into()));
        assert_eq!(title_alias("2nd Stage"), Some("_2nd_stage".into()));
        assert_eq!(title_alias("---"), None);
        assert_eq!(title_alias(""), None);
    }

    #[test]
    fn dependency_declaration_binds_both_aliases() {
        let record = Record::new(IdVersion::new(12, 3), "Solar Output", "4");
        let decl = dependency_declaration(&record);
        assert_eq!(
            decl,
            "/* Solar Output (12@v3) */\nlet d12 = (4);\nlet solar_output = d12;\n"
        );
    }

    #[test]
    fn function_dependency_binds_its_compiled_arrow() {
        let mut record = Record::new(IdVersion::new(5, 1), "Growth", "plants * 4");
        record.arguments = vec![FunctionArgument::new("t1", "plants").with_default("1")];
        let decl = dependency_declaration(&record);
        assert!(decl.contains("let d5 = (plants = 1) => plants * 4;"));
    }

    #[test]
    fn dependency_body_references_rewrite_to_aliases() {
        let mut record =
            Record::new(IdVersion::new(20, 1), "Yield", "plants * record://12@v3");
        record.arguments = vec![FunctionArgument::new("t1", "plants").with_default("1")];
        assert_eq!(
            dependency_expression(&record),
            "(plants = 1) => plants * d12"
        );
    }

    #[test]
    fn upsert_prelude_is_idempotent() {
        let record = Record::new(IdVersion::new(12, 3), "Solar Output", "4");
        let deps = vec![record];
        let code = "(time) => solar_output * time";

        let once = upsert_prelude(&deps, code);
        let twice = upsert_prelude(&deps, &once);
        assert_eq!(once, twice);
        assert_eq!(once.matches("let solar_output").count(), 1);
    }

    #[test]
    fn upsert_skips_manually_declared_alias() {
        let record = Record::new(IdVersion::new(12, 3), "Solar Output", "4");
        let code = "let solar_output = 99;\n(time) => solar_output * time";
        let result = upsert_prelude(&[record], code);
        // The author's own declaration wins; nothing is prepended
        assert_eq!(result, code);
    }

    #[test]
    fn references_rewrite_to_positional_aliases() {
        assert_eq!(
            rewrite_references("record://12@v3 * time + record://7@v1"),
            "d12 * time + d7"
        );
        // Best-effort on the erroneous version-less form too
        assert_eq!(rewrite_references("record://42 + 1"), "d42 + 1");
        assert_eq!(rewrite_references("time * 2"), "time * 2");
    }

    #[test]
    fn call_source_applies_values_in_order() {
        assert_eq!(
            call_source("", "(a, b) => a + b", &["1".into(), "2".into()]),
            "((a, b) => a + b)(1, 2)"
        );
        assert_eq!(
            call_source("let d1 = (4);\n", "(t) => d1 * t", &["2".into()]),
            "let d1 = (4);\n((t) => d1 * t)(2)"
        );
    }
}
