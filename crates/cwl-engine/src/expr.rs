//! Parsing and evaluation of embedded expressions.
//!
//! A string may embed expressions in two forms mandated by the workflow
//! language specification: a whole-string `${ ... }` script body, or one
//! or more `$( ... )` parameter references interleaved with literal
//! text. Multi-part strings are string interpolation; each reference
//! result is stringified and concatenated.
//!
//! Evaluation happens against a [`Scope`] supplying `inputs`, `self`,
//! and `runtime`. Each [`Evaluator`] is an independent instance owning
//! its loaded expression libraries, so concurrent constructions never
//! share interpreter state.

use std::time::Duration;

use indexmap::IndexMap;

use crate::EvaluationError;

mod interp;
mod lexer;
mod parser;

use interp::Interpreter;
use interp::Interrupt;
use parser::Function;

/// A part of a parsed expression string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    /// A span of literal text.
    Literal(String),
    /// A `$( ... )` parameter reference.
    Reference(String),
    /// A whole-string `${ ... }` script body.
    Script(String),
}

impl Part {
    /// Determines if the part is literal text.
    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }
}

/// Parses a string into its literal and expression parts.
///
/// A whitespace-only string parses to no parts. A string that is
/// entirely a `${ ... }` form parses to a single [`Part::Script`];
/// otherwise `$( ... )` references are located with a scanner that
/// tracks parenthesis depth and skips string literals.
pub fn parse(s: &str) -> Vec<Part> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if let Some(body) = trimmed
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
    {
        return vec![Part::Script(body.trim().to_string())];
    }

    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut last = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'(') {
            if let Some(end) = matching_paren(s, i + 2) {
                if i > last {
                    parts.push(Part::Literal(s[last..i].to_string()));
                }
                parts.push(Part::Reference(s[i + 2..end].trim().to_string()));
                i = end + 1;
                last = i;
                continue;
            }
        }
        i += 1;
    }
    if last < s.len() {
        parts.push(Part::Literal(s[last..].to_string()));
    }

    parts
}

/// Finds the parenthesis closing a reference that starts at `start`.
///
/// Nested parentheses and quoted strings are honored. Returns `None`
/// when the reference is unterminated.
fn matching_paren(s: &str, start: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 1usize;
    let mut quote: Option<u8> = None;
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Determines if a string contains an embedded expression.
pub fn is_expression(s: &str) -> bool {
    parse(s).iter().any(|p| !p.is_literal())
}

/// Limits bounding a single expression evaluation.
///
/// The original design had no such bounds; an expression that loops
/// forever could block construction indefinitely, so every evaluation
/// now carries a step budget and an optional wall-clock deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalLimits {
    /// The maximum number of evaluation steps.
    pub max_steps: u64,
    /// The maximum expression nesting depth.
    pub max_depth: usize,
    /// The wall-clock timeout, if any.
    pub timeout: Option<Duration>,
}

impl Default for EvalLimits {
    fn default() -> Self {
        Self {
            max_steps: 100_000,
            max_depth: 64,
            timeout: Some(Duration::from_secs(5)),
        }
    }
}

/// The scope an expression evaluates against.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// The resolved input values, bound to `inputs`.
    pub inputs: serde_json::Value,
    /// The value currently in focus, bound to `self`.
    pub self_value: serde_json::Value,
    /// The runtime environment, bound to `runtime`.
    pub runtime: serde_json::Value,
}

impl Scope {
    /// Builds the global value map seen by the interpreter.
    fn globals(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut globals = serde_json::Map::new();
        globals.insert("inputs".to_string(), self.inputs.clone());
        globals.insert("self".to_string(), self.self_value.clone());
        globals.insert("runtime".to_string(), self.runtime.clone());
        globals
    }
}

/// Evaluates expression strings.
///
/// Each evaluator owns the functions loaded from expression libraries
/// and the limits applied to every evaluation. Evaluators are not
/// shared between process constructions.
#[derive(Debug, Default)]
pub struct Evaluator {
    /// The functions loaded from expression libraries.
    functions: IndexMap<String, Function>,
    /// The limits applied to each evaluation.
    limits: EvalLimits,
}

impl Evaluator {
    /// Constructs a new evaluator with default limits and no libraries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs a new evaluator with the given limits.
    pub fn with_limits(limits: EvalLimits) -> Self {
        Self {
            functions: IndexMap::new(),
            limits,
        }
    }

    /// Loads expression library sources.
    ///
    /// Each source is a sequence of `function name(...) { ... }`
    /// definitions; later definitions of the same name overwrite earlier
    /// ones.
    pub fn load_libraries(
        &mut self,
        sources: &[impl AsRef<str>],
    ) -> Result<(), EvaluationError> {
        for source in sources {
            let functions = parser::parse_library(source.as_ref())
                .map_err(|message| EvaluationError::Library { message })?;
            for (name, function) in functions {
                self.functions.insert(name, function);
            }
        }
        Ok(())
    }

    /// Evaluates a string which may contain embedded expressions.
    ///
    /// A string without expressions evaluates to itself; a whitespace
    /// only string evaluates to `null`. A single expression part may
    /// produce any value type; interpolated strings always produce a
    /// string.
    pub fn evaluate(&self, s: &str, scope: &Scope) -> Result<serde_json::Value, EvaluationError> {
        let parts = parse(s);
        match parts.as_slice() {
            [] => Ok(serde_json::Value::Null),
            [Part::Literal(raw)] => Ok(serde_json::Value::String(raw.clone())),
            [Part::Reference(code)] => self.reference(code, scope),
            [Part::Script(body)] => self.script(body, scope),
            parts => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        Part::Literal(raw) => out.push_str(raw),
                        Part::Reference(code) => {
                            out.push_str(&interp::stringify(&self.reference(code, scope)?));
                        }
                        Part::Script(body) => {
                            out.push_str(&interp::stringify(&self.script(body, scope)?));
                        }
                    }
                }
                Ok(serde_json::Value::String(out))
            }
        }
    }

    /// Evaluates a single parameter reference.
    fn reference(&self, code: &str, scope: &Scope) -> Result<serde_json::Value, EvaluationError> {
        let expr = parser::parse_expression(code).map_err(|message| EvaluationError::Parse {
            expr: code.to_string(),
            message,
        })?;
        let globals = scope.globals();
        Interpreter::new(&globals, &self.functions, &self.limits)
            .eval_expression(&expr)
            .map_err(|interrupt| interrupt_error(interrupt, code))
    }

    /// Evaluates a script body.
    fn script(&self, body: &str, scope: &Scope) -> Result<serde_json::Value, EvaluationError> {
        let stmts = parser::parse_body(body).map_err(|message| EvaluationError::Parse {
            expr: body.to_string(),
            message,
        })?;
        let globals = scope.globals();
        Interpreter::new(&globals, &self.functions, &self.limits)
            .eval_body(&stmts)
            .map_err(|interrupt| interrupt_error(interrupt, body))
    }
}

/// Converts an interpreter interrupt into an evaluation error carrying
/// the source expression text.
fn interrupt_error(interrupt: Interrupt, expr: &str) -> EvaluationError {
    match interrupt {
        Interrupt::Message(message) => EvaluationError::Failed {
            expr: expr.to_string(),
            message,
        },
        Interrupt::StepBudget => EvaluationError::StepBudgetExceeded {
            expr: expr.to_string(),
        },
        Interrupt::Deadline => EvaluationError::DeadlineExceeded {
            expr: expr.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_interpolated_references() {
        assert_eq!(
            parse("result: $(inputs.x)"),
            vec![
                Part::Literal("result: ".to_string()),
                Part::Reference("inputs.x".to_string()),
            ]
        );
    }

    #[test]
    fn parses_a_whole_string_script_body() {
        assert_eq!(
            parse("${return 1+1}"),
            vec![Part::Script("return 1+1".to_string())]
        );
    }

    #[test]
    fn parses_trailing_literal_text() {
        assert_eq!(
            parse("a $(x) b"),
            vec![
                Part::Literal("a ".to_string()),
                Part::Reference("x".to_string()),
                Part::Literal(" b".to_string()),
            ]
        );
    }

    #[test]
    fn tracks_nested_parens_and_quotes() {
        assert_eq!(
            parse("$((1 + 2) * 3)"),
            vec![Part::Reference("(1 + 2) * 3".to_string())]
        );
        assert_eq!(
            parse("$(inputs[')'])"),
            vec![Part::Reference("inputs[')']".to_string())]
        );
    }

    #[test]
    fn unterminated_references_are_literal() {
        assert_eq!(parse("$(oops"), vec![Part::Literal("$(oops".to_string())]);
    }

    #[test]
    fn detects_expressions() {
        assert!(is_expression("$(inputs.x)"));
        assert!(is_expression("${return 1}"));
        assert!(!is_expression("plain text"));
        assert!(!is_expression(""));
    }

    #[test]
    fn plain_strings_evaluate_to_themselves() {
        let evaluator = Evaluator::new();
        assert_eq!(
            evaluator
                .evaluate("plain text", &Scope::default())
                .expect("should evaluate"),
            json!("plain text")
        );
    }

    #[test]
    fn single_references_may_return_any_type() {
        let evaluator = Evaluator::new();
        let scope = Scope {
            inputs: json!({ "n": 8 }),
            ..Default::default()
        };
        assert_eq!(
            evaluator
                .evaluate("$(inputs.n)", &scope)
                .expect("should evaluate"),
            json!(8)
        );
    }

    #[test]
    fn interpolation_concatenates_stringified_results() {
        let evaluator = Evaluator::new();
        let scope = Scope {
            inputs: json!({ "a": 1, "b": "two" }),
            ..Default::default()
        };
        assert_eq!(
            evaluator
                .evaluate("a=$(inputs.a) b=$(inputs.b)", &scope)
                .expect("should evaluate"),
            json!("a=1 b=two")
        );
    }

    #[test]
    fn script_bodies_evaluate_as_function_bodies() {
        let evaluator = Evaluator::new();
        assert_eq!(
            evaluator
                .evaluate("${return 1+1}", &Scope::default())
                .expect("should evaluate"),
            json!(2)
        );
    }

    #[test]
    fn libraries_are_visible_to_expressions() {
        let mut evaluator = Evaluator::new();
        evaluator
            .load_libraries(&["function triple(x) { return x * 3; }"])
            .expect("should load");
        assert_eq!(
            evaluator
                .evaluate("$(triple(7))", &Scope::default())
                .expect("should evaluate"),
            json!(21)
        );
    }

    #[test]
    fn errors_carry_the_source_expression() {
        let evaluator = Evaluator::new();
        let err = evaluator
            .evaluate("$(nope)", &Scope::default())
            .expect_err("should fail");
        assert!(err.to_string().contains("nope"));
    }
}
