//! Requirement and hint declarations.

use indexmap::IndexMap;

use crate::Expression;

/// A requirement or hint attached to a tool.
///
/// The same variants serve both the `requirements` and `hints` lists;
/// requirements are mandatory while hints are advisory in name, though
/// the engine currently treats unsupported kinds as fatal in either
/// position.
#[derive(Debug, Clone, PartialEq)]
pub enum Requirement {
    /// A container image requirement.
    Docker(DockerRequirement),
    /// Resource bounds for the execution environment.
    Resource(ResourceRequirement),
    /// Environment variables to set for the command.
    EnvVar(EnvVarRequirement),
    /// The command is a shell command line.
    ShellCommand,
    /// Expressions may use embedded scripting with the given libraries.
    InlineJavascript(InlineJavascriptRequirement),
    /// Schema definitions for custom types.
    SchemaDef,
    /// Software packages required by the tool.
    Software(SoftwareRequirement),
    /// Files to stage into the initial working directory.
    InitialWorkDir,
    /// Workflow steps may run nested workflows.
    SubworkflowFeature,
    /// Workflow steps may scatter over inputs.
    ScatterFeature,
    /// Workflow step inputs may merge multiple sources.
    MultipleInputFeature,
    /// Workflow step inputs may use expressions.
    StepInputExpression,
    /// Local resource manager scheduling hints.
    Lrm(LrmRequirement),
    /// A requirement kind this engine does not recognize.
    ///
    /// Preserved inert: no effect and no error.
    Unknown {
        /// The declared class name.
        class: String,
    },
}

impl Requirement {
    /// Gets the CWL class name of the requirement.
    pub fn class(&self) -> &str {
        match self {
            Self::Docker(_) => "DockerRequirement",
            Self::Resource(_) => "ResourceRequirement",
            Self::EnvVar(_) => "EnvVarRequirement",
            Self::ShellCommand => "ShellCommandRequirement",
            Self::InlineJavascript(_) => "InlineJavascriptRequirement",
            Self::SchemaDef => "SchemaDefRequirement",
            Self::Software(_) => "SoftwareRequirement",
            Self::InitialWorkDir => "InitialWorkDirRequirement",
            Self::SubworkflowFeature => "SubworkflowFeatureRequirement",
            Self::ScatterFeature => "ScatterFeatureRequirement",
            Self::MultipleInputFeature => "MultipleInputFeatureRequirement",
            Self::StepInputExpression => "StepInputExpressionRequirement",
            Self::Lrm(_) => "LRMRequirement",
            Self::Unknown { class } => class,
        }
    }
}

/// A container image requirement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DockerRequirement {
    /// The image to pull.
    pub pull: String,
    /// An archive to load the image from.
    pub load: String,
    /// A Dockerfile to build the image from.
    pub file: String,
    /// An archive to import as the image.
    pub import: String,
    /// The expected image identifier.
    pub image_id: String,
    /// The output directory to mount inside the container.
    pub output_directory: String,
}

/// Resource bounds for the execution environment.
///
/// Each bound is an unevaluated expression; evaluation is deferred to the
/// execution stage, which has scheduler-provided runtime data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceRequirement {
    /// The minimum number of CPU cores.
    pub cores_min: Option<Expression>,
    /// The maximum number of CPU cores.
    pub cores_max: Option<Expression>,
    /// The minimum RAM, in mebibytes.
    pub ram_min: Option<Expression>,
    /// The maximum RAM, in mebibytes.
    pub ram_max: Option<Expression>,
    /// The minimum temporary directory size, in mebibytes.
    pub tmpdir_min: Option<Expression>,
    /// The maximum temporary directory size, in mebibytes.
    pub tmpdir_max: Option<Expression>,
    /// The minimum output directory size, in mebibytes.
    pub outdir_min: Option<Expression>,
    /// The maximum output directory size, in mebibytes.
    pub outdir_max: Option<Expression>,
}

/// Environment variables to set for the command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvVarRequirement {
    /// Variable name to value expression, in document order.
    ///
    /// Evaluated eagerly at construction.
    pub env_def: IndexMap<String, Expression>,
    /// Raw expression strings retained unevaluated for an executor with
    /// runtime data unavailable at construction time.
    pub env_expr: Vec<Expression>,
}

/// Declares that expressions may use embedded scripting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineJavascriptRequirement {
    /// Library sources loaded into the evaluation scope before any
    /// expression in the tool runs.
    pub expression_lib: Vec<String>,
}

/// A software package required by the tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoftwarePackage {
    /// The package name.
    pub package: String,
    /// Acceptable versions of the package.
    pub version: Vec<String>,
    /// Identifiers for the package in external registries.
    pub specs: Vec<String>,
}

/// Software packages required by the tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoftwareRequirement {
    /// The required packages.
    pub packages: Vec<SoftwarePackage>,
}

/// Local resource manager scheduling hints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LrmRequirement {
    /// Hint key to value expression, in document order.
    pub lrm_def: IndexMap<String, Expression>,
}
