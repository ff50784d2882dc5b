//! Assembly of workflow tool invocations.
//!
//! This crate takes a tool document from `cwl-schema` plus a set of
//! input values and assembles a [`Process`]: inputs bound to their
//! declared types in command line order, files resolved against a
//! [`Filesystem`], requirements and hints applied, and stdio
//! redirections evaluated.
//!
//! Embedded `$(...)` and `${...}` expressions are evaluated by a
//! built-in interpreter with bounded execution; see [`EvalLimits`].

mod binder;
mod error;
mod expr;
mod fs;
mod process;
mod requirements;
mod resolver;
mod validate;

pub use binder::Binding;
pub use binder::MAX_BINDING_DEPTH;
pub use binder::SortKey;
pub use error::BindingError;
pub use error::Error;
pub use error::EvaluationError;
pub use error::FileResolutionError;
pub use error::Result;
pub use error::UnsupportedRequirementError;
pub use error::ValidationError;
pub use expr::EvalLimits;
pub use expr::Evaluator;
pub use expr::Part;
pub use expr::Scope;
pub use expr::is_expression;
pub use expr::parse;
pub use fs::FileInfo;
pub use fs::Filesystem;
pub use fs::LocalFilesystem;
pub use fs::MAX_CONTENTS_SIZE;
pub use process::Mebibyte;
pub use process::Process;
pub use process::Runtime;
pub use requirements::ResourceBounds;
pub use resolver::FileResolver;
pub use validate::validate_tool;
