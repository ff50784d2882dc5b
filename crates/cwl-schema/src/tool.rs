//! The tool document model.

use std::fmt;
use std::ops::Deref;

use crate::Requirement;
use crate::Type;
use crate::Value;

/// A string which may contain embedded expressions.
///
/// A whole-string `${ ... }` form is a script body; `$( ... )` forms are
/// parameter references interpolated into the surrounding literal text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Expression(String);

impl Expression {
    /// Constructs a new expression from a source string.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Gets the source text of the expression.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for Expression {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Expression {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Expression {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Declarative hints describing how a bound value is rendered onto a
/// command line.
///
/// Only `position` and `load_contents` are consumed by the binding core;
/// the remaining fields ride along for the downstream argument builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandLineBinding {
    /// The sort position of the binding.
    pub position: i64,
    /// The prefix to place before the value.
    pub prefix: Option<String>,
    /// Whether the prefix and value are separate arguments.
    ///
    /// Defaults to `true` when unset.
    pub separate: Option<bool>,
    /// The separator joining array items into a single argument.
    pub item_separator: Option<String>,
    /// Whether the value is quoted for a shell.
    ///
    /// Defaults to `true` when unset.
    pub shell_quote: Option<bool>,
    /// An expression producing the value to bind.
    pub value_from: Option<Expression>,
    /// Whether file contents are loaded during resolution.
    pub load_contents: bool,
}

impl CommandLineBinding {
    /// Whether the prefix and value are separate arguments.
    pub fn separate(&self) -> bool {
        self.separate.unwrap_or(true)
    }

    /// Whether the value is quoted for a shell.
    pub fn shell_quote(&self) -> bool {
        self.shell_quote.unwrap_or(true)
    }
}

/// Gets the position of a possibly absent command line binding.
pub fn binding_position(binding: Option<&CommandLineBinding>) -> i64 {
    binding.map(|b| b.position).unwrap_or(0)
}

/// Declarative hints describing how an output value is collected.
///
/// Consumed by a downstream output-collection stage, not by this core.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutputBinding {
    /// Glob patterns selecting output files.
    pub glob: Vec<Expression>,
    /// Whether matched file contents are loaded.
    pub load_contents: bool,
    /// An expression producing the output value.
    pub output_eval: Option<Expression>,
}

/// An input slot of a tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandInput {
    /// The input identifier.
    pub id: String,
    /// A short human readable label.
    pub label: String,
    /// Documentation for the input.
    pub doc: String,
    /// Whether the input may be streamed.
    pub streamable: bool,
    /// The default value applied when no value is supplied.
    pub default: Option<Value>,
    /// The ordered list of allowed types.
    pub types: Vec<Type>,
    /// Secondary file patterns or expressions, in declaration order.
    pub secondary_files: Vec<Expression>,
    /// Format expressions for the input.
    pub format: Vec<Expression>,
    /// The command line binding attached to the input.
    pub input_binding: Option<CommandLineBinding>,
}

/// An output slot of a tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    /// The output identifier.
    pub id: String,
    /// A short human readable label.
    pub label: String,
    /// Documentation for the output.
    pub doc: String,
    /// Whether the output may be streamed.
    pub streamable: bool,
    /// The ordered list of allowed types.
    pub types: Vec<Type>,
    /// Secondary file patterns or expressions, in declaration order.
    pub secondary_files: Vec<Expression>,
    /// Format expressions for the output.
    pub format: Vec<Expression>,
    /// The output binding attached to the output.
    pub output_binding: Option<CommandOutputBinding>,
}

/// A command line tool document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tool {
    /// The CWL version the document was written against.
    pub cwl_version: String,
    /// The tool identifier.
    pub id: String,
    /// A short human readable label.
    pub label: String,
    /// Documentation for the tool.
    pub doc: String,
    /// The base command, possibly with leading fixed arguments.
    pub base_command: Vec<String>,
    /// Additional command line bindings not tied to an input.
    pub arguments: Vec<CommandLineBinding>,
    /// Mandatory requirements, in document order.
    pub requirements: Vec<Requirement>,
    /// Advisory hints, in document order.
    pub hints: Vec<Requirement>,
    /// The declared inputs, in document order.
    pub inputs: Vec<CommandInput>,
    /// The declared outputs, in document order.
    pub outputs: Vec<CommandOutput>,
    /// An expression producing the stdin redirection.
    pub stdin: Option<Expression>,
    /// An expression producing the stdout redirection.
    pub stdout: Option<Expression>,
    /// An expression producing the stderr redirection.
    pub stderr: Option<Expression>,
    /// Exit codes indicating success.
    pub success_codes: Vec<i32>,
    /// Exit codes indicating a retryable failure.
    pub temporary_fail_codes: Vec<i32>,
    /// Exit codes indicating a permanent failure.
    pub permanent_fail_codes: Vec<i32>,
}
