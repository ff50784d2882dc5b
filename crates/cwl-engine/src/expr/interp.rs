//! Interpreter for the embedded expression sub-language.
//!
//! Expressions are evaluated directly over JSON values, walking the
//! bound-inputs value tree; there is no general script engine. Every
//! evaluation is bounded by a step budget and an optional wall-clock
//! deadline so a runaway expression cannot block construction.

use std::time::Instant;

use indexmap::IndexMap;
use serde_json::Value;
use serde_json::json;

use super::EvalLimits;
use super::parser::BinaryOp;
use super::parser::Expr;
use super::parser::Function;
use super::parser::Stmt;
use super::parser::UnaryOp;

/// The reason an evaluation stopped short of producing a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Interrupt {
    /// The evaluation failed with a message.
    Message(String),
    /// The step budget was exhausted.
    StepBudget,
    /// The wall-clock deadline passed.
    Deadline,
}

impl From<String> for Interrupt {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

/// Evaluates expressions against a fixed set of global values.
pub(crate) struct Interpreter<'a> {
    /// The global scope (`inputs`, `self`, `runtime`).
    globals: &'a serde_json::Map<String, Value>,
    /// The functions loaded from expression libraries.
    functions: &'a IndexMap<String, Function>,
    /// The evaluation limits.
    limits: &'a EvalLimits,
    /// The wall-clock deadline, if a timeout was configured.
    deadline: Option<Instant>,
    /// The number of evaluation steps taken so far.
    steps: u64,
}

impl<'a> Interpreter<'a> {
    /// Constructs a new interpreter.
    ///
    /// The deadline clock starts at construction.
    pub fn new(
        globals: &'a serde_json::Map<String, Value>,
        functions: &'a IndexMap<String, Function>,
        limits: &'a EvalLimits,
    ) -> Self {
        Self {
            globals,
            functions,
            limits,
            deadline: limits.timeout.map(|t| Instant::now() + t),
            steps: 0,
        }
    }

    /// Evaluates a single expression with an empty local scope.
    pub fn eval_expression(&mut self, expr: &Expr) -> Result<Value, Interrupt> {
        let mut locals = IndexMap::new();
        self.eval(expr, &mut locals, 0)
    }

    /// Evaluates a script body with an empty local scope.
    ///
    /// A body without a `return` statement produces `null`.
    pub fn eval_body(&mut self, body: &[Stmt]) -> Result<Value, Interrupt> {
        let mut locals = IndexMap::new();
        Ok(self.run(body, &mut locals, 0)?.unwrap_or(Value::Null))
    }

    /// Charges one evaluation step, enforcing the limits.
    fn charge(&mut self) -> Result<(), Interrupt> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(Interrupt::StepBudget);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() > deadline {
                return Err(Interrupt::Deadline);
            }
        }
        Ok(())
    }

    /// Runs a sequence of statements against the given local scope.
    ///
    /// Returns the value of the first `return` statement reached, if any.
    fn run(
        &mut self,
        body: &[Stmt],
        locals: &mut IndexMap<String, Value>,
        depth: usize,
    ) -> Result<Option<Value>, Interrupt> {
        for stmt in body {
            match stmt {
                Stmt::Var(name, expr) => {
                    let value = self.eval(expr, locals, depth)?;
                    locals.insert(name.clone(), value);
                }
                Stmt::Return(expr) => return Ok(Some(self.eval(expr, locals, depth)?)),
                Stmt::Expr(expr) => {
                    self.eval(expr, locals, depth)?;
                }
            }
        }
        Ok(None)
    }

    /// Evaluates an expression against the given local scope.
    fn eval(
        &mut self,
        expr: &Expr,
        locals: &mut IndexMap<String, Value>,
        depth: usize,
    ) -> Result<Value, Interrupt> {
        self.charge()?;
        if depth > self.limits.max_depth {
            return Err(Interrupt::Message(format!(
                "evaluation exceeded the maximum recursion depth of {max}",
                max = self.limits.max_depth
            )));
        }

        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(v) => Ok(Value::Bool(*v)),
            Expr::Int(v) => Ok(json!(v)),
            Expr::Float(v) => Ok(json!(v)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Ident(name) => locals
                .get(name)
                .or_else(|| self.globals.get(name))
                .cloned()
                .ok_or_else(|| Interrupt::Message(format!("unknown identifier `{name}`"))),
            Expr::Member(target, member) => {
                let target = self.eval(target, locals, depth + 1)?;
                member_of(&target, member)
            }
            Expr::Index(target, index) => {
                let target = self.eval(target, locals, depth + 1)?;
                let index = self.eval(index, locals, depth + 1)?;
                index_of(&target, &index)
            }
            Expr::Call(name, args) => {
                let function = self
                    .functions
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Interrupt::Message(format!("unknown function `{name}`")))?;
                let mut scope = IndexMap::new();
                for (i, param) in function.params.iter().enumerate() {
                    let value = match args.get(i) {
                        Some(arg) => self.eval(arg, locals, depth + 1)?,
                        None => Value::Null,
                    };
                    scope.insert(param.clone(), value);
                }
                Ok(self
                    .run(&function.body, &mut scope, depth + 1)?
                    .unwrap_or(Value::Null))
            }
            Expr::Unary(op, operand) => {
                let operand = self.eval(operand, locals, depth + 1)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!truthy(&operand))),
                    UnaryOp::Negate => match Num::of(&operand) {
                        Some(Num::Int(v)) => match v.checked_neg() {
                            Some(v) => Ok(json!(v)),
                            None => Ok(json!(-(v as f64))),
                        },
                        Some(Num::Float(v)) => Ok(json!(-v)),
                        None => Err(Interrupt::Message(format!(
                            "cannot negate `{operand}`",
                            operand = stringify(&operand)
                        ))),
                    },
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                // Logical operators short-circuit and yield the deciding
                // operand.
                if *op == BinaryOp::And {
                    let lhs = self.eval(lhs, locals, depth + 1)?;
                    if !truthy(&lhs) {
                        return Ok(lhs);
                    }
                    return self.eval(rhs, locals, depth + 1);
                }
                if *op == BinaryOp::Or {
                    let lhs = self.eval(lhs, locals, depth + 1)?;
                    if truthy(&lhs) {
                        return Ok(lhs);
                    }
                    return self.eval(rhs, locals, depth + 1);
                }

                let lhs = self.eval(lhs, locals, depth + 1)?;
                let rhs = self.eval(rhs, locals, depth + 1)?;
                binary(*op, &lhs, &rhs)
            }
            Expr::Conditional(cond, then, otherwise) => {
                if truthy(&self.eval(cond, locals, depth + 1)?) {
                    self.eval(then, locals, depth + 1)
                } else {
                    self.eval(otherwise, locals, depth + 1)
                }
            }
        }
    }
}

/// A numeric view of a JSON value.
enum Num {
    /// An integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
}

impl Num {
    /// Views a JSON value as a number.
    fn of(v: &Value) -> Option<Self> {
        let n = v.as_number()?;
        if let Some(i) = n.as_i64() {
            return Some(Self::Int(i));
        }
        n.as_f64().map(Self::Float)
    }

    /// Converts the number to a float.
    fn as_f64(&self) -> f64 {
        match self {
            Self::Int(v) => *v as f64,
            Self::Float(v) => *v,
        }
    }
}

/// Determines the truthiness of a JSON value.
fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Renders a JSON value as a string for interpolation.
pub(crate) fn stringify(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        // SAFETY: serializing a JSON value is infallible.
        other => serde_json::to_string(other).expect("value should serialize"),
    }
}

/// Accesses a member of a JSON value.
///
/// A missing object member produces `null`; `length` is supported on
/// arrays and strings.
fn member_of(target: &Value, member: &str) -> Result<Value, Interrupt> {
    match target {
        Value::Object(map) => Ok(map.get(member).cloned().unwrap_or(Value::Null)),
        Value::Array(items) if member == "length" => Ok(json!(items.len())),
        Value::String(s) if member == "length" => Ok(json!(s.chars().count())),
        Value::Null => Err(Interrupt::Message(format!(
            "cannot access member `{member}` of null"
        ))),
        other => Err(Interrupt::Message(format!(
            "cannot access member `{member}` of `{other}`",
            other = stringify(other)
        ))),
    }
}

/// Indexes into a JSON value.
///
/// An out-of-range array index produces `null`.
fn index_of(target: &Value, index: &Value) -> Result<Value, Interrupt> {
    match (target, index) {
        (Value::Array(items), Value::Number(n)) => {
            let i = n
                .as_i64()
                .ok_or_else(|| Interrupt::Message("array index must be an integer".to_string()))?;
            Ok(usize::try_from(i)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or(Value::Null))
        }
        (Value::Object(map), Value::String(key)) => {
            Ok(map.get(key).cloned().unwrap_or(Value::Null))
        }
        (target, index) => Err(Interrupt::Message(format!(
            "cannot index `{target}` with `{index}`",
            target = stringify(target),
            index = stringify(index)
        ))),
    }
}

/// Applies a non-logical binary operator.
fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, Interrupt> {
    match op {
        BinaryOp::Equal => Ok(Value::Bool(loose_eq(lhs, rhs))),
        BinaryOp::NotEqual => Ok(Value::Bool(!loose_eq(lhs, rhs))),
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            compare(op, lhs, rhs)
        }
        BinaryOp::Add => add(lhs, rhs),
        BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Remainder => {
            arithmetic(op, lhs, rhs)
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("logical operators short-circuit"),
    }
}

/// Compares two values for equality, treating numbers numerically.
fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    match (Num::of(lhs), Num::of(rhs)) {
        (Some(l), Some(r)) => l.as_f64() == r.as_f64(),
        _ => lhs == rhs,
    }
}

/// Applies a relational operator to two numbers or two strings.
fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, Interrupt> {
    let ordering = match (lhs, rhs) {
        (Value::String(l), Value::String(r)) => l.cmp(r),
        _ => match (Num::of(lhs), Num::of(rhs)) {
            (Some(l), Some(r)) => l
                .as_f64()
                .partial_cmp(&r.as_f64())
                .ok_or_else(|| Interrupt::Message("cannot compare values".to_string()))?,
            _ => {
                return Err(Interrupt::Message(format!(
                    "cannot compare `{lhs}` with `{rhs}`",
                    lhs = stringify(lhs),
                    rhs = stringify(rhs)
                )));
            }
        },
    };
    Ok(Value::Bool(match op {
        BinaryOp::Less => ordering.is_lt(),
        BinaryOp::LessEqual => ordering.is_le(),
        BinaryOp::Greater => ordering.is_gt(),
        BinaryOp::GreaterEqual => ordering.is_ge(),
        _ => unreachable!("operator is relational"),
    }))
}

/// Applies the `+` operator: string concatenation when either operand is
/// a string, numeric addition otherwise.
fn add(lhs: &Value, rhs: &Value) -> Result<Value, Interrupt> {
    if lhs.is_string() || rhs.is_string() {
        return Ok(Value::String(format!(
            "{lhs}{rhs}",
            lhs = stringify(lhs),
            rhs = stringify(rhs)
        )));
    }
    match (Num::of(lhs), Num::of(rhs)) {
        (Some(Num::Int(l)), Some(Num::Int(r))) => match l.checked_add(r) {
            Some(v) => Ok(json!(v)),
            None => Ok(json!(l as f64 + r as f64)),
        },
        (Some(l), Some(r)) => Ok(json!(l.as_f64() + r.as_f64())),
        _ => Err(Interrupt::Message(format!(
            "cannot add `{lhs}` and `{rhs}`",
            lhs = stringify(lhs),
            rhs = stringify(rhs)
        ))),
    }
}

/// Applies a numeric arithmetic operator.
fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, Interrupt> {
    let (l, r) = match (Num::of(lhs), Num::of(rhs)) {
        (Some(l), Some(r)) => (l, r),
        _ => {
            return Err(Interrupt::Message(format!(
                "cannot apply arithmetic to `{lhs}` and `{rhs}`",
                lhs = stringify(lhs),
                rhs = stringify(rhs)
            )));
        }
    };

    match op {
        BinaryOp::Subtract => match (&l, &r) {
            (Num::Int(l), Num::Int(r)) => match l.checked_sub(*r) {
                Some(v) => Ok(json!(v)),
                None => Ok(json!(*l as f64 - *r as f64)),
            },
            _ => Ok(json!(l.as_f64() - r.as_f64())),
        },
        BinaryOp::Multiply => match (&l, &r) {
            (Num::Int(l), Num::Int(r)) => match l.checked_mul(*r) {
                Some(v) => Ok(json!(v)),
                None => Ok(json!(*l as f64 * *r as f64)),
            },
            _ => Ok(json!(l.as_f64() * r.as_f64())),
        },
        BinaryOp::Divide => {
            if r.as_f64() == 0.0 {
                return Err(Interrupt::Message("division by zero".to_string()));
            }
            let v = l.as_f64() / r.as_f64();
            // Keep exact integral quotients as integers.
            if v.fract() == 0.0 && v.abs() <= i64::MAX as f64 {
                return Ok(json!(v as i64));
            }
            Ok(json!(v))
        }
        BinaryOp::Remainder => {
            if r.as_f64() == 0.0 {
                return Err(Interrupt::Message("remainder by zero".to_string()));
            }
            match (&l, &r) {
                (Num::Int(l), Num::Int(r)) => Ok(json!(l % r)),
                _ => Ok(json!(l.as_f64() % r.as_f64())),
            }
        }
        _ => unreachable!("operator is arithmetic"),
    }
}
