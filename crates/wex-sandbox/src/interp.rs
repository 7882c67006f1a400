//! Snippet evaluator
//!
//! A tree-walking evaluator with one global scope that lives for the
//! interpreter's lifetime. That shared scope is the reason the channel
//! serializes evaluations: two snippets running interleaved could observe
//! each other's globals.
//!
//! Capability-free by construction: the only builtins are `range` and a
//! numeric `Math` namespace. There is no way to reach the filesystem,
//! network, clock, or host process state from evaluated code.

use crate::error::EvalError;
use crate::parser::{parse, ArrowBody, BinaryOp, Expr, Param, Stmt, UnaryOp};
use crate::value::{assign, child_scope, lookup, Closure, Env, Scope, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Recursion guard; hit reports as an ordinary execution error.
const MAX_CALL_DEPTH: usize = 128;

/// Statement outcome inside a function body.
enum Flow {
    Normal(Value),
    Return(Value),
}

/// The isolated interpreter. One per host; its global scope persists
/// across evaluations until the host is torn down.
#[derive(Debug)]
pub struct Interpreter {
    global: Env,
    depth: Cell<usize>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Fresh interpreter with an empty global scope
    #[must_use]
    pub fn new() -> Self {
        Self {
            global: Rc::new(RefCell::new(Scope::default())),
            depth: Cell::new(0),
        }
    }

    /// Parse and evaluate a snippet. The program's value is the value of
    /// its last statement (or of an explicit top-level `return`).
    pub fn eval_source(&self, source: &str) -> Result<Value, EvalError> {
        let program = parse(source)?;
        let mut last = Value::Null;
        for stmt in &program.stmts {
            match self.exec_stmt(stmt, &self.global)? {
                Flow::Normal(value) => last = value,
                Flow::Return(value) => return Ok(value),
            }
        }
        Ok(last)
    }

    fn exec_stmt(&self, stmt: &Stmt, env: &Env) -> Result<Flow, EvalError> {
        match stmt {
            Stmt::Let { name, init } => {
                let value = self.eval(init, env)?;
                env.borrow_mut().vars.insert(name.clone(), value);
                Ok(Flow::Normal(Value::Null))
            }
            Stmt::Assign { name, value } => {
                let value = self.eval(value, env)?;
                if !assign(env, name, value.clone()) {
                    // Implicit global, as the snippet language allows
                    env.borrow_mut().vars.insert(name.clone(), value);
                }
                Ok(Flow::Normal(Value::Null))
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Expr(expr) => Ok(Flow::Normal(self.eval(expr, env)?)),
        }
    }

    fn eval(&self, expr: &Expr, env: &Env) -> Result<Value, EvalError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Ident(name) => {
                lookup(env, name).ok_or_else(|| EvalError::Undefined(name.clone()))
            }
            Expr::Array(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item, env))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Array(values))
            }
            Expr::Unary { op, expr } => {
                let value = self.eval(expr, env)?;
                match op {
                    UnaryOp::Neg => match value {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        other => Err(EvalError::Type(format!(
                            "cannot negate a {}",
                            other.type_name()
                        ))),
                    },
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                }
            }
            Expr::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs, env),
            Expr::Member { object, property } => self.eval_member(object, property, env),
            Expr::Index { object, index } => {
                let object = self.eval(object, env)?;
                let index = self.eval(index, env)?;
                match (object, index) {
                    (Value::Array(items), Value::Number(n)) => {
                        let i = n as usize;
                        if n >= 0.0 && i < items.len() {
                            Ok(items[i].clone())
                        } else {
                            Ok(Value::Null)
                        }
                    }
                    (object, _) => Err(EvalError::Type(format!(
                        "cannot index a {}",
                        object.type_name()
                    ))),
                }
            }
            Expr::Arrow { params, body } => Ok(Value::Function(Rc::new(Closure {
                params: params.clone(),
                body: body.clone(),
                env: Rc::clone(env),
            }))),
            Expr::Call { callee, args } => self.eval_call(callee, args, env),
        }
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        env: &Env,
    ) -> Result<Value, EvalError> {
        // Short-circuit forms first
        match op {
            BinaryOp::And => {
                let left = self.eval(lhs, env)?;
                return if left.is_truthy() {
                    self.eval(rhs, env)
                } else {
                    Ok(left)
                };
            }
            BinaryOp::Or => {
                let left = self.eval(lhs, env)?;
                return if left.is_truthy() {
                    Ok(left)
                } else {
                    self.eval(rhs, env)
                };
            }
            _ => {}
        }

        let left = self.eval(lhs, env)?;
        let right = self.eval(rhs, env)?;

        match op {
            BinaryOp::Eq => Ok(Value::Bool(left == right)),
            BinaryOp::NotEq => Ok(Value::Bool(left != right)),
            BinaryOp::Add => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::Str(format!(
                    "{}{}",
                    as_concat_text(&left),
                    as_concat_text(&right)
                ))),
                _ => Err(type_mismatch("+", &left, &right)),
            },
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem | BinaryOp::Pow => {
                let (a, b) = numeric_operands(op_symbol(op), &left, &right)?;
                Ok(Value::Number(match op {
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Rem => a % b,
                    BinaryOp::Pow => a.powf(b),
                    _ => unreachable!(),
                }))
            }
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                let (a, b) = numeric_operands(op_symbol(op), &left, &right)?;
                Ok(Value::Bool(match op {
                    BinaryOp::Lt => a < b,
                    BinaryOp::LtEq => a <= b,
                    BinaryOp::Gt => a > b,
                    BinaryOp::GtEq => a >= b,
                    _ => unreachable!(),
                }))
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn eval_member(
        &self,
        object: &Expr,
        property: &str,
        env: &Env,
    ) -> Result<Value, EvalError> {
        // `Math.x` resolves to the builtin namespace unless shadowed
        if let Expr::Ident(name) = object {
            if name == "Math" && lookup(env, name).is_none() {
                return math_constant(property)
                    .ok_or_else(|| EvalError::Type(format!("Math has no member `{property}`")));
            }
        }

        let object = self.eval(object, env)?;
        match (&object, property) {
            (Value::Array(items), "length") => Ok(Value::Number(items.len() as f64)),
            (Value::Str(s), "length") => Ok(Value::Number(s.chars().count() as f64)),
            _ => Err(EvalError::Type(format!(
                "{} has no property `{property}`",
                object.type_name()
            ))),
        }
    }

    fn eval_call(
        &self,
        callee: &Expr,
        args: &[Expr],
        env: &Env,
    ) -> Result<Value, EvalError> {
        // Builtins are reachable only while not shadowed by user bindings
        if let Expr::Ident(name) = callee {
            if name == "range" && lookup(env, name).is_none() {
                let args = self.eval_args(args, env)?;
                return builtin_range(&args);
            }
        }
        if let Expr::Member { object, property } = callee {
            if let Expr::Ident(name) = object.as_ref() {
                if name == "Math" && lookup(env, name).is_none() {
                    let args = self.eval_args(args, env)?;
                    return builtin_math(property, &args);
                }
            }
        }

        let callee_value = self.eval(callee, env)?;
        let closure = match callee_value {
            Value::Function(closure) => closure,
            other => {
                let name = match callee {
                    Expr::Ident(name) => name.clone(),
                    _ => other.type_name().to_string(),
                };
                return Err(EvalError::NotCallable(name));
            }
        };
        let args = self.eval_args(args, env)?;
        self.call_closure(&closure, args)
    }

    fn eval_args(&self, args: &[Expr], env: &Env) -> Result<Vec<Value>, EvalError> {
        args.iter().map(|arg| self.eval(arg, env)).collect()
    }

    fn call_closure(&self, closure: &Closure, args: Vec<Value>) -> Result<Value, EvalError> {
        if self.depth.get() >= MAX_CALL_DEPTH {
            return Err(EvalError::DepthExceeded);
        }
        self.depth.set(self.depth.get() + 1);
        let result = self.call_closure_inner(closure, args);
        self.depth.set(self.depth.get() - 1);
        result
    }

    fn call_closure_inner(
        &self,
        closure: &Closure,
        mut args: Vec<Value>,
    ) -> Result<Value, EvalError> {
        let scope = child_scope(&closure.env);

        for (i, Param { name, default }) in closure.params.iter().enumerate() {
            let provided = if i < args.len() {
                Some(std::mem::replace(&mut args[i], Value::Null))
            } else {
                None
            };
            // A missing or null argument falls back to the default,
            // mirroring how default parameters behave for callers that
            // omit trailing arguments
            let value = match (provided, default) {
                (Some(Value::Null), Some(default)) | (None, Some(default)) => {
                    self.eval(default, &scope)?
                }
                (Some(value), _) => value,
                (None, None) => Value::Null,
            };
            scope.borrow_mut().vars.insert(name.clone(), value);
        }

        match &closure.body {
            ArrowBody::Expr(expr) => self.eval(expr, &scope),
            ArrowBody::Block(stmts) => {
                for stmt in stmts {
                    if let Flow::Return(value) = self.exec_stmt(stmt, &scope)? {
                        return Ok(value);
                    }
                }
                Ok(Value::Null)
            }
        }
    }
}

fn op_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
        BinaryOp::Pow => "**",
        BinaryOp::Eq => "==",
        BinaryOp::NotEq => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::LtEq => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::GtEq => ">=",
        BinaryOp::And => "&&",
        BinaryOp::Or => "||",
    }
}

fn numeric_operands(op: &str, left: &Value, right: &Value) -> Result<(f64, f64), EvalError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(type_mismatch(op, left, right)),
    }
}

fn type_mismatch(op: &str, left: &Value, right: &Value) -> EvalError {
    EvalError::Type(format!(
        "`{op}` needs numbers, got {} and {}",
        left.type_name(),
        right.type_name()
    ))
}

fn as_concat_text(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        other => other.to_result_text(),
    }
}

/// `range(end)`, `range(start, end)`, `range(start, end, step)` —
/// half-open, the workhorse of repeat-flagged scenario values.
fn builtin_range(args: &[Value]) -> Result<Value, EvalError> {
    let nums: Vec<f64> = args
        .iter()
        .map(|a| match a {
            Value::Number(n) => Ok(*n),
            other => Err(EvalError::Type(format!(
                "range() needs numbers, got {}",
                other.type_name()
            ))),
        })
        .collect::<Result<_, _>>()?;

    let (start, end, step) = match nums.as_slice() {
        [end] => (0.0, *end, 1.0),
        [start, end] => (*start, *end, 1.0),
        [start, end, step] => (*start, *end, *step),
        _ => {
            return Err(EvalError::Type(
                "range() takes 1 to 3 arguments".to_string(),
            ))
        }
    };
    if step == 0.0 {
        return Err(EvalError::Type("range() step must be non-zero".to_string()));
    }

    let mut items = Vec::new();
    let mut current = start;
    while (step > 0.0 && current < end) || (step < 0.0 && current > end) {
        items.push(Value::Number(current));
        if items.len() > 10_000 {
            return Err(EvalError::Type("range() result too large".to_string()));
        }
        current += step;
    }
    Ok(Value::Array(items))
}

fn math_constant(name: &str) -> Option<Value> {
    match name {
        "PI" => Some(Value::Number(std::f64::consts::PI)),
        "E" => Some(Value::Number(std::f64::consts::E)),
        _ => None,
    }
}

fn builtin_math(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    let nums: Vec<f64> = args
        .iter()
        .map(|a| match a {
            Value::Number(n) => Ok(*n),
            other => Err(EvalError::Type(format!(
                "Math.{name}() needs numbers, got {}",
                other.type_name()
            ))),
        })
        .collect::<Result<_, _>>()?;

    let result = match (name, nums.as_slice()) {
        ("max", _) if !nums.is_empty() => nums.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        ("min", _) if !nums.is_empty() => nums.iter().copied().fold(f64::INFINITY, f64::min),
        ("abs", [x]) => x.abs(),
        ("floor", [x]) => x.floor(),
        ("ceil", [x]) => x.ceil(),
        ("round", [x]) => x.round(),
        ("sqrt", [x]) => x.sqrt(),
        ("pow", [x, y]) => x.powf(*y),
        _ => {
            return Err(EvalError::Type(format!(
                "Math.{name}() is not available or got the wrong arguments"
            )))
        }
    };
    Ok(Value::Number(result))
}
