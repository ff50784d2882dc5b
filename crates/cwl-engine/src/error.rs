//! Errors produced during process construction.

use thiserror::Error;

/// An error produced while validating a tool document.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// An input was declared with an empty identifier.
    #[error("input has an empty id")]
    EmptyInputId,

    /// Two inputs share the same identifier.
    #[error("duplicate input id `{id}`")]
    DuplicateInputId {
        /// The duplicated identifier.
        id: String,
    },

    /// Two outputs share the same identifier.
    #[error("duplicate output id `{id}`")]
    DuplicateOutputId {
        /// The duplicated identifier.
        id: String,
    },

    /// An input declared an empty list of allowed types.
    #[error("input `{id}` declares no types")]
    NoTypes {
        /// The offending input identifier.
        id: String,
    },

    /// An input declared an enumeration with no symbols.
    #[error("input `{id}` declares an enum with no symbols")]
    NoSymbols {
        /// The offending input identifier.
        id: String,
    },
}

/// An error produced while evaluating an embedded expression.
///
/// Every variant carries the offending source expression text.
#[derive(Error, Debug)]
pub enum EvaluationError {
    /// The expression failed to parse.
    #[error("failed to parse expression `{expr}`: {message}")]
    Parse {
        /// The source expression text.
        expr: String,
        /// A description of the parse failure.
        message: String,
    },

    /// The expression failed to evaluate.
    #[error("failed to evaluate expression `{expr}`: {message}")]
    Failed {
        /// The source expression text.
        expr: String,
        /// A description of the evaluation failure.
        message: String,
    },

    /// The expression exceeded the evaluation step budget.
    #[error("expression `{expr}` exceeded the evaluation step budget")]
    StepBudgetExceeded {
        /// The source expression text.
        expr: String,
    },

    /// The expression exceeded the evaluation deadline.
    #[error("expression `{expr}` exceeded the evaluation deadline")]
    DeadlineExceeded {
        /// The source expression text.
        expr: String,
    },

    /// The expression was required to produce a string and did not.
    #[error("expression `{expr}` must evaluate to a string, got `{actual}`")]
    NotAString {
        /// The source expression text.
        expr: String,
        /// The JSON representation of the actual result.
        actual: String,
    },

    /// An expression library failed to load.
    #[error("failed to load expression library: {message}")]
    Library {
        /// A description of the load failure.
        message: String,
    },
}

/// An error produced while resolving a file or directory descriptor.
#[derive(Error, Debug)]
pub enum FileResolutionError {
    /// Neither a location nor literal contents were provided.
    #[error("file location and contents are both empty")]
    Unlocated,

    /// Both a location and literal contents were provided.
    ///
    /// One would overwrite the other and the caller's intent cannot be
    /// known, so resolution fails instead.
    #[error("file location and contents are both non-empty")]
    Ambiguous,

    /// The filesystem failed to look up file information.
    #[error("getting file info for `{location}`: {source}")]
    Info {
        /// The location that was looked up.
        location: String,
        /// The underlying filesystem error.
        #[source]
        source: anyhow::Error,
    },

    /// The filesystem failed to load file contents.
    #[error("loading file contents for `{location}`: {source}")]
    Contents {
        /// The location that was read.
        location: String,
        /// The underlying filesystem error.
        #[source]
        source: anyhow::Error,
    },

    /// The filesystem failed to create a file from literal contents.
    #[error("creating file from inline content at `{path}`: {source}")]
    Create {
        /// The path that was created.
        path: String,
        /// The underlying filesystem error.
        #[source]
        source: anyhow::Error,
    },

    /// A secondary file expression produced a value that is not a string,
    /// File, Directory, or array thereof.
    #[error("secondary file expression `{expr}` returned an unsupported value")]
    UnsupportedSecondary {
        /// The source expression text.
        expr: String,
    },
}

/// An error produced while binding an input value to its declared types.
#[derive(Error, Debug)]
pub enum BindingError {
    /// No declared type matched the supplied value, or a required value
    /// was absent.
    #[error("missing value")]
    MissingValue,

    /// The value nested deeper than the binder's recursion guard allows.
    #[error("binding exceeded the maximum recursion depth of {max}")]
    DepthExceeded {
        /// The maximum permitted depth.
        max: usize,
    },

    /// A file resolution error.
    #[error(transparent)]
    File(#[from] FileResolutionError),

    /// An expression evaluation error.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// A recognized but unimplemented requirement kind was declared.
///
/// Fatal whether the kind appears under `requirements` or `hints`.
#[derive(Error, Debug)]
#[error("{class} is not supported (yet)")]
pub struct UnsupportedRequirementError {
    /// The class name of the unsupported requirement.
    pub class: String,
}

/// An error produced while constructing a [`Process`](crate::Process).
///
/// Construction is all-or-nothing: any of these aborts immediately and no
/// partial process is returned.
#[derive(Error, Debug)]
pub enum Error {
    /// Structural validation of the tool failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Binding a declared input failed.
    #[error("binding input `{id}`: {source}")]
    Binding {
        /// The identifier of the input that failed to bind.
        id: String,
        /// The underlying binding error.
        #[source]
        source: BindingError,
    },

    /// A recognized but unimplemented requirement kind was declared.
    #[error(transparent)]
    Unsupported(#[from] UnsupportedRequirementError),

    /// A requirement's expressions failed to evaluate.
    #[error("failed to evaluate {class}: {source}")]
    Requirement {
        /// The class name of the requirement.
        class: String,
        /// The underlying evaluation error.
        #[source]
        source: EvaluationError,
    },

    /// A stdio redirection expression failed to evaluate.
    #[error("evaluating {stream} expression: {source}")]
    Stdio {
        /// The name of the stream being redirected.
        stream: &'static str,
        /// The underlying evaluation error.
        #[source]
        source: EvaluationError,
    },

    /// A stdio redirection expression produced a non-string, non-null
    /// value.
    #[error("{stream} expression returned a non-string value")]
    NonStringStdio {
        /// The name of the stream being redirected.
        stream: &'static str,
    },
}

/// A [`Result`](std::result::Result) with an [`Error`](enum@self::Error).
pub type Result<T, E = Error> = std::result::Result<T, E>;
