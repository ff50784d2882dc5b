//! Assembly of a tool invocation into a [`Process`].
//!
//! Construction is all-or-nothing: inputs are validated, defaulted, and
//! bound, requirements resolved, and stdio redirections evaluated; the
//! first failure aborts with no partial process. Everything downstream
//! of a tool depends on `inputs` being available to expressions, which
//! is why binding happens here rather than lazily.

use indexmap::IndexMap;
use serde_json::json;
use tracing::debug;

use cwl_schema::CommandInput;
use cwl_schema::Expression;
use cwl_schema::File;
use cwl_schema::FileOrDirectory;
use cwl_schema::Requirement;
use cwl_schema::Tool;
use cwl_schema::Type;
use cwl_schema::Value;
use cwl_schema::Values;
use cwl_schema::binding_position;

use crate::Error;
use crate::EvaluationError;
use crate::Result;
use crate::binder::Binding;
use crate::binder::SortKey;
use crate::expr::EvalLimits;
use crate::expr::Evaluator;
use crate::expr::Scope;
use crate::fs::Filesystem;
use crate::fs::unique_token;
use crate::requirements::ResourceBounds;
use crate::validate::validate_tool;

/// A quantity of mebibytes.
pub type Mebibyte = i64;

/// The runtime environment a process will execute in.
///
/// Provided to expressions as `runtime`. The values here are whatever
/// the caller knows at construction time; a scheduler typically fills
/// in real values much later.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Runtime {
    /// The designated output directory.
    pub outdir: String,
    /// The designated temporary directory.
    pub tmpdir: String,
    /// The number of allocated CPU cores.
    pub cores: String,
    /// The allocated RAM.
    pub ram: Mebibyte,
    /// The output directory quota.
    pub outdir_size: Mebibyte,
    /// The temporary directory quota.
    pub tmpdir_size: Mebibyte,
}

impl Runtime {
    /// Builds the JSON value bound to `runtime` in expression scopes.
    fn to_json(&self) -> serde_json::Value {
        json!({
            "outdir": self.outdir,
            "tmpdir": self.tmpdir,
            "cores": self.cores,
            "ram": self.ram,
            "outdirSize": self.outdir_size,
            "tmpdirSize": self.tmpdir_size,
        })
    }
}

/// The mutable state of a process under construction.
///
/// Frozen into an immutable [`Process`] once every construction step
/// has succeeded.
pub(crate) struct Construction<'a> {
    /// The tool being invoked.
    pub(crate) tool: Tool,
    /// The filesystem input files resolve against.
    pub(crate) fs: &'a dyn Filesystem,
    /// The runtime environment.
    pub(crate) runtime: Runtime,
    /// The expression evaluator, with libraries installed.
    pub(crate) evaluator: Evaluator,
    /// The input bindings accumulated so far.
    pub(crate) bindings: Vec<Binding>,
    /// Evaluated environment variable definitions.
    pub(crate) env: IndexMap<String, String>,
    /// Raw environment expressions retained for the executor.
    pub(crate) env_expr: Vec<String>,
    /// Evaluated local resource manager directives.
    pub(crate) lrm: IndexMap<String, String>,
    /// Whether the command line is a shell command.
    pub(crate) shell: bool,
    /// Declared resource bounds, unevaluated.
    pub(crate) resources: ResourceBounds,
}

impl<'a> Construction<'a> {
    /// Starts a construction over the given tool.
    ///
    /// Expression libraries from any `InlineJavascriptRequirement` are
    /// installed here so that every later expression, including those
    /// under input binding, can call them.
    pub(crate) fn new(
        tool: Tool,
        runtime: Runtime,
        fs: &'a dyn Filesystem,
        limits: EvalLimits,
    ) -> Result<Self> {
        let mut evaluator = Evaluator::with_limits(limits);
        for req in tool.requirements.iter().chain(tool.hints.iter()) {
            if let Requirement::InlineJavascript(js) = req {
                evaluator
                    .load_libraries(&js.expression_lib)
                    .map_err(|source| Error::Requirement {
                        class: "InlineJavascriptRequirement".to_string(),
                        source,
                    })?;
            }
        }

        Ok(Self {
            tool,
            fs,
            runtime,
            evaluator,
            bindings: Vec::new(),
            env: IndexMap::new(),
            env_expr: Vec::new(),
            lrm: IndexMap::new(),
            shell: false,
            resources: ResourceBounds::default(),
        })
    }

    /// Builds the expression scope, with the given value bound to
    /// `self`.
    ///
    /// The `inputs` object maps each accumulated binding's name to its
    /// bound value, so bindings made earlier in construction are
    /// visible to later expressions.
    pub(crate) fn scope(&self, self_value: serde_json::Value) -> Scope {
        let mut inputs = serde_json::Map::new();
        for binding in &self.bindings {
            inputs.insert(binding.name().to_string(), binding.value().to_json());
        }
        Scope {
            inputs: serde_json::Value::Object(inputs),
            self_value,
            runtime: self.runtime.to_json(),
        }
    }

    /// Evaluates an expression string in the construction's scope.
    pub(crate) fn eval(
        &self,
        expr: &str,
        self_value: serde_json::Value,
    ) -> Result<serde_json::Value, EvaluationError> {
        self.evaluator.evaluate(expr, &self.scope(self_value))
    }

    /// Evaluates an expression string that must produce a string.
    pub(crate) fn eval_string(&self, expr: &str) -> Result<String, EvaluationError> {
        match self.eval(expr, serde_json::Value::Null)? {
            serde_json::Value::String(s) => Ok(s),
            actual => Err(EvaluationError::NotAString {
                expr: expr.to_string(),
                actual: actual.to_string(),
            }),
        }
    }

    /// Evaluates a stdio redirection expression.
    ///
    /// An absent expression or a null result yields the empty string;
    /// any other non-string result is an error.
    fn eval_stdio(&self, stream: &'static str, expr: Option<&Expression>) -> Result<String> {
        let Some(expr) = expr else {
            return Ok(String::new());
        };
        match self
            .eval(expr.as_str(), serde_json::Value::Null)
            .map_err(|source| Error::Stdio { stream, source })?
        {
            serde_json::Value::Null => Ok(String::new()),
            serde_json::Value::String(s) => Ok(s),
            _ => Err(Error::NonStringStdio { stream }),
        }
    }
}

/// An assembled, immutable tool invocation.
#[derive(Debug)]
pub struct Process {
    /// The tool being invoked.
    tool: Tool,
    /// The runtime environment.
    runtime: Runtime,
    /// The input bindings, in input declaration order.
    bindings: Vec<Binding>,
    /// Every resolved input file, in first-seen order.
    input_files: Vec<File>,
    /// Evaluated environment variable definitions.
    env: IndexMap<String, String>,
    /// Raw environment expressions retained for the executor.
    env_expr: Vec<String>,
    /// Evaluated local resource manager directives.
    lrm: IndexMap<String, String>,
    /// Whether the command line is a shell command.
    shell: bool,
    /// Declared resource bounds, unevaluated.
    resources: ResourceBounds,
    /// The resolved stdin redirection, or empty.
    stdin: String,
    /// The resolved stdout redirection, or empty.
    stdout: String,
    /// The resolved stderr redirection, or empty.
    stderr: String,
}

impl Process {
    /// Assembles a process from a tool, its input values, and a runtime
    /// environment, with default evaluation limits.
    pub fn new(
        tool: &Tool,
        values: Values,
        runtime: Runtime,
        fs: &dyn Filesystem,
    ) -> Result<Self> {
        Self::with_limits(tool, values, runtime, fs, EvalLimits::default())
    }

    /// Assembles a process with the given expression evaluation limits.
    pub fn with_limits(
        tool: &Tool,
        mut values: Values,
        runtime: Runtime,
        fs: &dyn Filesystem,
        limits: EvalLimits,
    ) -> Result<Self> {
        validate_tool(tool)?;

        set_defaults(&mut values, &tool.inputs);

        let mut construction = Construction::new(tool.clone(), runtime, fs, limits)?;

        for input in &tool.inputs {
            let key = SortKey::root(binding_position(input.input_binding.as_ref()));
            let bindings = construction
                .bind_input(
                    &input.id,
                    &input.types,
                    input.input_binding.as_ref(),
                    &input.secondary_files,
                    values.get(&input.id),
                    key,
                    0,
                )
                .map_err(|source| Error::Binding {
                    id: input.id.clone(),
                    source,
                })?;
            construction.bindings.extend(bindings);
        }
        debug!(
            tool = construction.tool.id.as_str(),
            bindings = construction.bindings.len(),
            "bound all inputs"
        );

        construction.resolve_requirements()?;

        let stdin = construction.eval_stdio("stdin", construction.tool.stdin.as_ref())?;
        let mut stdout = construction.eval_stdio("stdout", construction.tool.stdout.as_ref())?;
        let mut stderr = construction.eval_stdio("stderr", construction.tool.stderr.as_ref())?;

        // An output declared as exactly `stdout` or `stderr` implies the
        // redirection; synthesize a capture name when none was given.
        for output in &construction.tool.outputs {
            if let [ty] = output.types.as_slice() {
                if matches!(ty, Type::Stdout) && stdout.is_empty() {
                    stdout = format!("stdout-{token}", token = unique_token());
                }
                if matches!(ty, Type::Stderr) && stderr.is_empty() {
                    stderr = format!("stderr-{token}", token = unique_token());
                }
            }
        }

        let input_files = collect_files(&construction.bindings);
        debug!(files = input_files.len(), "collected input files");

        Ok(Self {
            tool: construction.tool,
            runtime: construction.runtime,
            bindings: construction.bindings,
            input_files,
            env: construction.env,
            env_expr: construction.env_expr,
            lrm: construction.lrm,
            shell: construction.shell,
            resources: construction.resources,
            stdin,
            stdout,
            stderr,
        })
    }

    /// Gets the tool being invoked.
    pub fn tool(&self) -> &Tool {
        &self.tool
    }

    /// Gets the runtime environment.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Gets the input bindings, in input declaration order.
    pub fn input_bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Gets the paths of every resolved input file, in first-seen
    /// order.
    pub fn input_files(&self) -> Vec<String> {
        self.input_files.iter().map(|f| f.path.clone()).collect()
    }

    /// Gets the resolved stdin redirection, or empty for none.
    pub fn stdin(&self) -> &str {
        &self.stdin
    }

    /// Gets the resolved stdout redirection, or empty for none.
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Gets the resolved stderr redirection, or empty for none.
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Gets the evaluated environment variable definitions and the raw
    /// environment expressions retained for the executor.
    pub fn env(&self) -> (IndexMap<String, String>, Vec<String>) {
        (self.env.clone(), self.env_expr.clone())
    }

    /// Gets the evaluated local resource manager directives.
    pub fn lrm(&self) -> IndexMap<String, String> {
        self.lrm.clone()
    }

    /// Determines if the command line is a shell command.
    pub fn shell(&self) -> bool {
        self.shell
    }

    /// Gets the declared resource bounds, unevaluated.
    pub fn resources(&self) -> &ResourceBounds {
        &self.resources
    }
}

/// Fills in declared default values for inputs the caller omitted.
fn set_defaults(values: &mut Values, inputs: &[CommandInput]) {
    for input in inputs {
        if values.contains_key(&input.id) {
            continue;
        }
        if let Some(default) = &input.default {
            values.insert(input.id.clone(), default.clone());
        }
    }
}

/// Collects every file reachable from the given bindings, in first-seen
/// order, deduplicated by location.
///
/// Files nested inside arrays, records, and secondary file lists are
/// all included. Records surface their fields both as standalone
/// bindings and within the record binding, so dedup matters here.
fn collect_files(bindings: &[Binding]) -> Vec<File> {
    let mut seen = std::collections::HashSet::new();
    let mut files = Vec::new();
    for binding in bindings {
        collect_binding_files(binding, &mut seen, &mut files);
    }
    files
}

/// Walks a binding tree, collecting files from its leaves.
///
/// An array or record binding keeps the caller's raw value; the
/// resolved files live in the nested item and field bindings, so a
/// binding with children is collected through them.
fn collect_binding_files(
    binding: &Binding,
    seen: &mut std::collections::HashSet<String>,
    files: &mut Vec<File>,
) {
    if binding.nested().is_empty() {
        collect_value_files(binding.value(), seen, files);
    } else {
        for nested in binding.nested() {
            collect_binding_files(nested, seen, files);
        }
    }
}

/// Walks a value, collecting files depth-first.
fn collect_value_files(
    value: &Value,
    seen: &mut std::collections::HashSet<String>,
    files: &mut Vec<File>,
) {
    match value {
        Value::File(file) => collect_file(file, seen, files),
        Value::Array(items) => {
            for item in items {
                collect_value_files(item, seen, files);
            }
        }
        Value::Object(members) => {
            for member in members.values() {
                collect_value_files(member, seen, files);
            }
        }
        _ => {}
    }
}

/// Collects a file and its secondary files depth-first.
fn collect_file(file: &File, seen: &mut std::collections::HashSet<String>, files: &mut Vec<File>) {
    if seen.insert(file.location.clone()) {
        files.push(file.clone());
    }
    for secondary in &file.secondary_files {
        if let FileOrDirectory::File(f) = secondary {
            collect_file(f, seen, files);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_fill_only_missing_values() {
        let inputs = vec![
            CommandInput {
                id: "a".to_string(),
                default: Some(Value::Int(1)),
                ..Default::default()
            },
            CommandInput {
                id: "b".to_string(),
                default: Some(Value::Int(2)),
                ..Default::default()
            },
        ];

        let mut values = Values::default();
        values.insert("a".to_string(), Value::Int(10));
        set_defaults(&mut values, &inputs);

        assert_eq!(values.get("a"), Some(&Value::Int(10)));
        assert_eq!(values.get("b"), Some(&Value::Int(2)));
    }

    #[test]
    fn file_collection_dedups_by_location() {
        let secondary = File {
            location: "a.idx".to_string(),
            path: "a.idx".to_string(),
            ..Default::default()
        };
        let file = File {
            location: "a.txt".to_string(),
            path: "a.txt".to_string(),
            secondary_files: vec![FileOrDirectory::File(secondary)],
            ..Default::default()
        };

        // The same file reachable through an array and on its own.
        let value = Value::Array(vec![
            Value::File(file.clone()),
            Value::File(file.clone()),
        ]);

        let mut seen = std::collections::HashSet::new();
        let mut files = Vec::new();
        collect_value_files(&value, &mut seen, &mut files);

        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "a.idx"]);
    }
}
