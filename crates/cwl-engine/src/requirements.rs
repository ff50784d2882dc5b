//! Resolution of tool requirements and hints.
//!
//! Requirements and hints are processed identically: a hint naming an
//! unsupported kind is as fatal as a requirement naming one, since the
//! engine cannot honor "optional" semantics it does not implement.
//! Kinds with no execution-time effect here (container images, software
//! packages, workflow features) are preserved inert on the tool.

use cwl_schema::EnvVarRequirement;
use cwl_schema::Expression;
use cwl_schema::LrmRequirement;
use cwl_schema::Requirement;
use cwl_schema::ResourceRequirement;
use tracing::debug;
use tracing::warn;

use crate::Error;
use crate::EvaluationError;
use crate::Result;
use crate::UnsupportedRequirementError;
use crate::process::Construction;

/// Resource bounds declared by a `ResourceRequirement`.
///
/// The bounds are captured unevaluated: real values for `runtime` are
/// only known once a scheduler has placed the process, so evaluating
/// them here would bake in placeholders. The scheduler evaluates these
/// against its own runtime values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceBounds {
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

impl From<&ResourceRequirement> for ResourceBounds {
    fn from(req: &ResourceRequirement) -> Self {
        Self {
            cores_min: req.cores_min.clone(),
            cores_max: req.cores_max.clone(),
            ram_min: req.ram_min.clone(),
            ram_max: req.ram_max.clone(),
            tmpdir_min: req.tmpdir_min.clone(),
            tmpdir_max: req.tmpdir_max.clone(),
            outdir_min: req.outdir_min.clone(),
            outdir_max: req.outdir_max.clone(),
        }
    }
}

impl Construction<'_> {
    /// Applies the tool's requirements and hints to the process under
    /// construction.
    ///
    /// Requirements are applied first, then hints, in document order;
    /// a later entry of the same kind overwrites the earlier one.
    pub(crate) fn resolve_requirements(&mut self) -> Result<()> {
        let reqs: Vec<(Requirement, bool)> = self
            .tool
            .requirements
            .iter()
            .map(|req| (req.clone(), false))
            .chain(self.tool.hints.iter().map(|req| (req.clone(), true)))
            .collect();

        for (req, hint) in reqs {
            match req {
                // Expression libraries were installed before input
                // binding; nothing further to do here.
                Requirement::InlineJavascript(_) => {}

                Requirement::EnvVar(env) => {
                    self.resolve_env(&env).map_err(|source| Error::Requirement {
                        class: "EnvVarRequirement".to_string(),
                        source,
                    })?;
                }

                Requirement::Lrm(lrm) => {
                    self.resolve_lrm(&lrm).map_err(|source| Error::Requirement {
                        class: "LRMRequirement".to_string(),
                        source,
                    })?;
                }

                Requirement::Resource(resource) => {
                    self.resources = ResourceBounds::from(&resource);
                }

                Requirement::ShellCommand => {
                    self.shell = true;
                }

                Requirement::SchemaDef | Requirement::InitialWorkDir => {
                    let class = req.class().to_string();
                    if hint {
                        warn!(
                            class = class.as_str(),
                            "unsupported requirement kind declared as a hint"
                        );
                    }
                    return Err(UnsupportedRequirementError { class }.into());
                }

                other => {
                    debug!(class = other.class(), "requirement has no effect here");
                }
            }
        }

        Ok(())
    }

    /// Evaluates an `EnvVarRequirement`.
    ///
    /// Definitions evaluate eagerly and must produce strings. Raw
    /// environment expressions are retained unevaluated for the
    /// executor.
    fn resolve_env(&mut self, req: &EnvVarRequirement) -> Result<(), EvaluationError> {
        for (name, expr) in &req.env_def {
            let value = self.eval_string(expr.as_str())?;
            self.env.insert(name.clone(), value);
        }
        for expr in &req.env_expr {
            self.env_expr.push(expr.as_str().to_string());
        }
        Ok(())
    }

    /// Evaluates an `LRMRequirement` into a string map of scheduler
    /// directives.
    fn resolve_lrm(&mut self, req: &LrmRequirement) -> Result<(), EvaluationError> {
        for (name, expr) in &req.lrm_def {
            let value = self.eval_string(expr.as_str())?;
            self.lrm.insert(name.clone(), value);
        }
        Ok(())
    }
}
