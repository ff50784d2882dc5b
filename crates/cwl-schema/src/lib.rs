//! Data model for Common Workflow Language (CWL) tool documents.
//!
//! This crate defines the runtime [`Value`] representation, the closed
//! [`Type`] catalog, the [`Tool`] document model, and the
//! [`Requirement`] variants consumed by the `cwl-engine` crate. It does
//! not parse CWL documents; construction of these types is the concern
//! of a document layer.

mod requirement;
mod tool;
mod types;
mod value;

pub use requirement::*;
pub use tool::*;
pub use types::*;
pub use value::*;
