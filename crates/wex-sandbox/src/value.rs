//! Runtime values and result stringification
//!
//! Results cross the host boundary as text. Stringification is
//! JSON-compatible — whole numbers print without a decimal point so a
//! result like `[4, 16, 64]` reads back as the same series it renders as.

use crate::parser::{ArrowBody, Param};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::rc::Rc;

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<Value>),
    Function(Rc<Closure>),
}

/// A user-defined function: parameters, body, and captured environment.
#[derive(Debug)]
pub struct Closure {
    pub params: Vec<Param>,
    pub body: ArrowBody,
    pub env: Env,
}

/// A lexical scope: bindings plus an optional parent.
#[derive(Debug, Default)]
pub struct Scope {
    pub vars: HashMap<String, Value>,
    pub parent: Option<Env>,
}

/// Shared handle to a scope. The interpreter is thread-confined, so
/// plain `Rc<RefCell<…>>` is the right ownership shape.
pub type Env = Rc<RefCell<Scope>>;

/// New scope chained under `parent`.
#[must_use]
pub fn child_scope(parent: &Env) -> Env {
    Rc::new(RefCell::new(Scope {
        vars: HashMap::new(),
        parent: Some(Rc::clone(parent)),
    }))
}

/// Look a name up through the scope chain.
#[must_use]
pub fn lookup(env: &Env, name: &str) -> Option<Value> {
    let scope = env.borrow();
    if let Some(value) = scope.vars.get(name) {
        return Some(value.clone());
    }
    scope.parent.as_ref().and_then(|p| lookup(p, name))
}

/// Assign to the nearest existing binding; returns false if none exists.
pub fn assign(env: &Env, name: &str, value: Value) -> bool {
    let mut scope = env.borrow_mut();
    if scope.vars.contains_key(name) {
        scope.vars.insert(name.to_string(), value);
        return true;
    }
    match &scope.parent {
        Some(parent) => assign(parent, name, value),
        None => false,
    }
}

impl Value {
    /// JS-style truthiness
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(s) => !s.is_empty(),
            Self::Array(_) | Self::Function(_) => true,
        }
    }

    /// Short type tag for error messages
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Array(_) => "array",
            Self::Function(_) => "function",
        }
    }

    /// Stringify for the response wire: JSON-compatible where the value
    /// is JSON-shaped.
    #[must_use]
    pub fn to_result_text(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        match self {
            Self::Null => out.push_str("null"),
            Self::Bool(b) => {
                let _ = write!(out, "{b}");
            }
            Self::Number(n) => out.push_str(&format_number(*n)),
            Self::Str(s) => {
                // serde_json escaping keeps the text parseable
                out.push_str(&serde_json::Value::String(s.clone()).to_string());
            }
            Self::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_to(out);
                }
                out.push(']');
            }
            Self::Function(_) => out.push_str("[function]"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            // Functions compare by identity
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Whole finite numbers print without a decimal point.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 9e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_numbers_print_without_decimal() {
        assert_eq!(Value::Number(64.0).to_result_text(), "64");
        assert_eq!(Value::Number(-3.0).to_result_text(), "-3");
    }

    #[test]
    fn fractional_numbers_keep_their_fraction() {
        assert_eq!(Value::Number(1.5).to_result_text(), "1.5");
    }

    #[test]
    fn arrays_render_json_compatible() {
        let v = Value::Array(vec![
            Value::Number(4.0),
            Value::Number(16.0),
            Value::Number(64.0),
        ]);
        assert_eq!(v.to_result_text(), "[4, 16, 64]");
        // and parse back as JSON
        let parsed: Vec<f64> = serde_json::from_str(&v.to_result_text()).unwrap();
        assert_eq!(parsed, vec![4.0, 16.0, 64.0]);
    }

    #[test]
    fn truthiness_matches_snippet_language_rules() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
    }

    #[test]
    fn scope_chain_lookup_and_assign() {
        let root: Env = Rc::new(RefCell::new(Scope::default()));
        root.borrow_mut()
            .vars
            .insert("x".to_string(), Value::Number(1.0));
        let child = child_scope(&root);

        assert_eq!(lookup(&child, "x"), Some(Value::Number(1.0)));
        assert!(assign(&child, "x", Value::Number(2.0)));
        assert_eq!(lookup(&root, "x"), Some(Value::Number(2.0)));
        assert!(!assign(&child, "missing", Value::Null));
    }
}
