//! Tests for process assembly.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::anyhow;
use pretty_assertions::assert_eq;

use cwl_engine::BindingError;
use cwl_engine::Error;
use cwl_engine::FileInfo;
use cwl_engine::Filesystem;
use cwl_engine::MAX_BINDING_DEPTH;
use cwl_engine::Process;
use cwl_engine::Runtime;
use cwl_schema::ArrayType;
use cwl_schema::CommandInput;
use cwl_schema::CommandLineBinding;
use cwl_schema::CommandOutput;
use cwl_schema::EnvVarRequirement;
use cwl_schema::Expression;
use cwl_schema::File;
use cwl_schema::FileOrDirectory;
use cwl_schema::InlineJavascriptRequirement;
use cwl_schema::RecordField;
use cwl_schema::RecordType;
use cwl_schema::Requirement;
use cwl_schema::Tool;
use cwl_schema::Type;
use cwl_schema::Value;
use cwl_schema::Values;

/// A filesystem backed by an in-memory map of location to contents.
struct MemoryFilesystem {
    files: Mutex<HashMap<String, String>>,
}

impl MemoryFilesystem {
    fn new<const N: usize>(files: [(&str, &str); N]) -> Self {
        Self {
            files: Mutex::new(
                files
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
        }
    }
}

impl Filesystem for MemoryFilesystem {
    fn info(&self, location: &str) -> anyhow::Result<FileInfo> {
        let files = self.files.lock().expect("lock should not be poisoned");
        let contents = files
            .get(location)
            .ok_or_else(|| anyhow!("no such file: {location}"))?;
        Ok(FileInfo {
            location: location.to_string(),
            path: format!("/data/{location}"),
            checksum: format!("sha256$test-{location}"),
            size: contents.len() as i64,
        })
    }

    fn contents(&self, location: &str) -> anyhow::Result<String> {
        let files = self.files.lock().expect("lock should not be poisoned");
        files
            .get(location)
            .cloned()
            .ok_or_else(|| anyhow!("no such file: {location}"))
    }

    fn create(&self, location: &str, contents: &str) -> anyhow::Result<FileInfo> {
        let mut files = self.files.lock().expect("lock should not be poisoned");
        files.insert(location.to_string(), contents.to_string());
        Ok(FileInfo {
            location: location.to_string(),
            path: format!("/data/{location}"),
            checksum: format!("sha256$test-{location}"),
            size: contents.len() as i64,
        })
    }
}

fn input(id: &str, types: Vec<Type>) -> CommandInput {
    CommandInput {
        id: id.to_string(),
        types,
        ..Default::default()
    }
}

fn file_value(location: &str) -> Value {
    Value::File(File {
        location: location.to_string(),
        ..Default::default()
    })
}

#[test]
fn a_missing_required_value_fails_and_a_nullable_one_binds_null() {
    let fs = MemoryFilesystem::new([]);
    let tool = Tool {
        inputs: vec![input("required", vec![Type::Int])],
        ..Default::default()
    };

    let err = Process::new(&tool, Values::default(), Runtime::default(), &fs)
        .expect_err("should fail");
    assert!(matches!(
        err,
        Error::Binding {
            id,
            source: BindingError::MissingValue,
        } if id == "required"
    ));

    let tool = Tool {
        inputs: vec![input("optional", vec![Type::Null, Type::Int])],
        ..Default::default()
    };
    let process = Process::new(&tool, Values::default(), Runtime::default(), &fs)
        .expect("should assemble");
    assert_eq!(process.input_bindings().len(), 1);
    assert_eq!(process.input_bindings()[0].value(), &Value::Null);
    assert_eq!(process.input_bindings()[0].ty(), &Type::Null);
}

#[test]
fn the_first_matching_union_candidate_wins() {
    let fs = MemoryFilesystem::new([]);
    let tool = Tool {
        inputs: vec![input("x", vec![Type::String, Type::Int])],
        ..Default::default()
    };

    let mut values = Values::default();
    values.insert("x".to_string(), Value::Int(5));

    let process =
        Process::new(&tool, values, Runtime::default(), &fs).expect("should assemble");
    // The string candidate is declared first and Int(5) coerces to it.
    assert_eq!(
        process.input_bindings()[0].value(),
        &Value::String("5".to_string())
    );
}

#[test]
fn array_items_bind_in_value_order() {
    let fs = MemoryFilesystem::new([]);
    let tool = Tool {
        inputs: vec![input(
            "xs",
            vec![Type::Array(ArrayType {
                items: vec![Type::Int],
                input_binding: None,
            })],
        )],
        ..Default::default()
    };

    let mut values = Values::default();
    values.insert(
        "xs".to_string(),
        Value::Array(vec![Value::Int(3), Value::Int(1), Value::Int(2)]),
    );

    let process =
        Process::new(&tool, values, Runtime::default(), &fs).expect("should assemble");

    let binding = &process.input_bindings()[0];
    let items: Vec<_> = binding.nested().iter().map(|b| b.value().clone()).collect();
    assert_eq!(items, vec![Value::Int(3), Value::Int(1), Value::Int(2)]);

    let keys: Vec<_> = binding.nested().iter().map(|b| b.key().clone()).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[test]
fn a_value_nested_past_the_binding_depth_fails() {
    let fs = MemoryFilesystem::new([]);

    let mut ty = Type::Int;
    let mut value = Value::Int(1);
    for _ in 0..=MAX_BINDING_DEPTH {
        ty = Type::Array(ArrayType {
            items: vec![ty],
            input_binding: None,
        });
        value = Value::Array(vec![value]);
    }

    let tool = Tool {
        inputs: vec![input("deep", vec![ty])],
        ..Default::default()
    };

    let mut values = Values::default();
    values.insert("deep".to_string(), value);

    let err = Process::new(&tool, values, Runtime::default(), &fs)
        .expect_err("should fail");
    assert!(matches!(
        err,
        Error::Binding {
            id,
            source: BindingError::DepthExceeded { max: MAX_BINDING_DEPTH },
        } if id == "deep"
    ));
}

#[test]
fn an_incomplete_record_falls_through_to_the_next_candidate() {
    let fs = MemoryFilesystem::new([]);
    let record = Type::Record(RecordType {
        name: "pair".to_string(),
        fields: vec![
            RecordField {
                name: "a".to_string(),
                types: vec![Type::Int],
                input_binding: None,
            },
            RecordField {
                name: "b".to_string(),
                types: vec![Type::Int],
                input_binding: None,
            },
        ],
    });
    let tool = Tool {
        inputs: vec![input("r", vec![record, Type::Any])],
        ..Default::default()
    };

    let mut members = indexmap::IndexMap::new();
    members.insert("a".to_string(), Value::Int(1));
    let mut values = Values::default();
    values.insert("r".to_string(), Value::Object(members));

    let process =
        Process::new(&tool, values, Runtime::default(), &fs).expect("should assemble");
    assert_eq!(process.input_bindings()[0].ty(), &Type::Any);
}

#[test]
fn an_incomplete_record_with_no_other_candidate_fails() {
    let fs = MemoryFilesystem::new([]);
    let record = Type::Record(RecordType {
        name: "pair".to_string(),
        fields: vec![
            RecordField {
                name: "a".to_string(),
                types: vec![Type::Int],
                input_binding: None,
            },
            RecordField {
                name: "b".to_string(),
                types: vec![Type::Int],
                input_binding: None,
            },
        ],
    });
    let tool = Tool {
        inputs: vec![input("r", vec![record])],
        ..Default::default()
    };

    let mut members = indexmap::IndexMap::new();
    members.insert("a".to_string(), Value::Int(1));
    let mut values = Values::default();
    values.insert("r".to_string(), Value::Object(members));

    let err = Process::new(&tool, values, Runtime::default(), &fs)
        .expect_err("should fail");
    assert!(matches!(
        err,
        Error::Binding {
            id,
            source: BindingError::MissingValue,
        } if id == "r"
    ));
}

#[test]
fn a_complete_record_binds_fields_and_record() {
    let fs = MemoryFilesystem::new([]);
    let record = Type::Record(RecordType {
        name: "pair".to_string(),
        fields: vec![
            RecordField {
                name: "a".to_string(),
                types: vec![Type::Int],
                input_binding: None,
            },
            RecordField {
                name: "b".to_string(),
                types: vec![Type::String],
                input_binding: None,
            },
        ],
    });
    let tool = Tool {
        inputs: vec![input("r", vec![record])],
        ..Default::default()
    };

    let mut members = indexmap::IndexMap::new();
    members.insert("a".to_string(), Value::Int(1));
    members.insert("b".to_string(), Value::String("two".to_string()));
    let mut values = Values::default();
    values.insert("r".to_string(), Value::Object(members));

    let process =
        Process::new(&tool, values, Runtime::default(), &fs).expect("should assemble");

    let names: Vec<_> = process
        .input_bindings()
        .iter()
        .map(|b| b.name().to_string())
        .collect();
    assert_eq!(names, vec!["a", "b", "r"]);
}

#[test]
fn caret_patterns_resolve_secondary_files() {
    let fs = MemoryFilesystem::new([("a.b.c.txt", "primary"), ("a.b.ext", "secondary")]);
    let tool = Tool {
        inputs: vec![CommandInput {
            id: "f".to_string(),
            types: vec![Type::File],
            secondary_files: vec![Expression::new("^^.ext")],
            ..Default::default()
        }],
        ..Default::default()
    };

    let mut values = Values::default();
    values.insert("f".to_string(), file_value("a.b.c.txt"));

    let process =
        Process::new(&tool, values, Runtime::default(), &fs).expect("should assemble");

    let Value::File(file) = process.input_bindings()[0].value() else {
        panic!("expected a file binding");
    };
    assert_eq!(file.nameroot, "a.b.c");
    assert_eq!(file.nameext, ".txt");
    match &file.secondary_files[0] {
        FileOrDirectory::File(secondary) => assert_eq!(secondary.location, "a.b.ext"),
        other => panic!("expected a file, got {other:?}"),
    }

    assert_eq!(
        process.input_files(),
        vec!["/data/a.b.c.txt".to_string(), "/data/a.b.ext".to_string()]
    );
}

#[test]
fn array_nested_files_resolve_into_input_files() {
    let fs = MemoryFilesystem::new([
        ("a.bam", "alignments a"),
        ("b.bam", "alignments b"),
        ("a.bam.bai", "index a"),
        ("b.bam.bai", "index b"),
    ]);
    let tool = Tool {
        inputs: vec![CommandInput {
            id: "bams".to_string(),
            types: vec![Type::Array(ArrayType {
                items: vec![Type::File],
                input_binding: None,
            })],
            secondary_files: vec![Expression::new(".bai")],
            ..Default::default()
        }],
        ..Default::default()
    };

    let mut values = Values::default();
    values.insert(
        "bams".to_string(),
        Value::Array(vec![file_value("a.bam"), file_value("b.bam")]),
    );

    let process =
        Process::new(&tool, values, Runtime::default(), &fs).expect("should assemble");

    // The item bindings hold the resolved files.
    let items = process.input_bindings()[0].nested();
    let Value::File(first) = items[0].value() else {
        panic!("expected a file binding");
    };
    assert_eq!(first.path, "/data/a.bam");
    match &first.secondary_files[0] {
        FileOrDirectory::File(secondary) => assert_eq!(secondary.location, "a.bam.bai"),
        other => panic!("expected a file, got {other:?}"),
    }

    assert_eq!(
        process.input_files(),
        vec![
            "/data/a.bam".to_string(),
            "/data/a.bam.bai".to_string(),
            "/data/b.bam".to_string(),
            "/data/b.bam.bai".to_string(),
        ]
    );
}

#[test]
fn expression_secondary_files_see_the_primary_as_self() {
    let fs = MemoryFilesystem::new([("reads.bam", "alignments"), ("reads.bam.bai", "index")]);
    let tool = Tool {
        inputs: vec![CommandInput {
            id: "bam".to_string(),
            types: vec![Type::File],
            secondary_files: vec![Expression::new("$(self.basename + \".bai\")")],
            ..Default::default()
        }],
        ..Default::default()
    };

    let mut values = Values::default();
    values.insert("bam".to_string(), file_value("reads.bam"));

    let process =
        Process::new(&tool, values, Runtime::default(), &fs).expect("should assemble");

    let Value::File(file) = process.input_bindings()[0].value() else {
        panic!("expected a file binding");
    };
    match &file.secondary_files[0] {
        FileOrDirectory::File(secondary) => assert_eq!(secondary.location, "reads.bam.bai"),
        other => panic!("expected a file, got {other:?}"),
    }
}

#[test]
fn unsupported_requirement_kinds_are_fatal_even_as_hints() {
    let fs = MemoryFilesystem::new([]);
    let tool = Tool {
        hints: vec![Requirement::SchemaDef],
        ..Default::default()
    };

    let err = Process::new(&tool, Values::default(), Runtime::default(), &fs)
        .expect_err("should fail");
    assert_eq!(
        err.to_string(),
        "SchemaDefRequirement is not supported (yet)"
    );
}

#[test]
fn unknown_requirement_kinds_are_inert() {
    let fs = MemoryFilesystem::new([]);
    let tool = Tool {
        requirements: vec![Requirement::Unknown {
            class: "FrobnicateRequirement".to_string(),
        }],
        ..Default::default()
    };

    assert!(Process::new(&tool, Values::default(), Runtime::default(), &fs).is_ok());
}

#[test]
fn env_definitions_evaluate_against_inputs() {
    let fs = MemoryFilesystem::new([]);
    let mut env_def = indexmap::IndexMap::new();
    env_def.insert("SAMPLE".to_string(), Expression::new("$(inputs.sample)"));
    env_def.insert("MODE".to_string(), Expression::new("fast"));

    let tool = Tool {
        inputs: vec![input("sample", vec![Type::String])],
        requirements: vec![Requirement::EnvVar(EnvVarRequirement {
            env_def,
            env_expr: vec![Expression::new("$(inputs.sample)-deferred")],
        })],
        ..Default::default()
    };

    let mut values = Values::default();
    values.insert("sample".to_string(), Value::String("s1".to_string()));

    let process =
        Process::new(&tool, values, Runtime::default(), &fs).expect("should assemble");

    let (env, env_expr) = process.env();
    assert_eq!(env.get("SAMPLE"), Some(&"s1".to_string()));
    assert_eq!(env.get("MODE"), Some(&"fast".to_string()));
    // Raw expressions are retained unevaluated for the executor.
    assert_eq!(env_expr, vec!["$(inputs.sample)-deferred".to_string()]);
}

#[test]
fn shell_command_requirement_sets_the_shell_flag() {
    let fs = MemoryFilesystem::new([]);
    let tool = Tool {
        requirements: vec![Requirement::ShellCommand],
        ..Default::default()
    };

    let process = Process::new(&tool, Values::default(), Runtime::default(), &fs)
        .expect("should assemble");
    assert!(process.shell());
}

#[test]
fn stdio_expressions_evaluate_and_stdout_outputs_synthesize_a_name() {
    let fs = MemoryFilesystem::new([]);
    let tool = Tool {
        inputs: vec![input("prefix", vec![Type::String])],
        outputs: vec![CommandOutput {
            id: "captured".to_string(),
            types: vec![Type::Stdout],
            ..Default::default()
        }],
        stdin: Some(Expression::new("$(inputs.prefix).in")),
        ..Default::default()
    };

    let mut values = Values::default();
    values.insert("prefix".to_string(), Value::String("run1".to_string()));

    let process =
        Process::new(&tool, values, Runtime::default(), &fs).expect("should assemble");
    assert_eq!(process.stdin(), "run1.in");
    assert!(process.stdout().starts_with("stdout-"));
    assert_eq!(process.stderr(), "");
}

#[test]
fn non_string_stdio_results_fail() {
    let fs = MemoryFilesystem::new([]);
    let tool = Tool {
        stdout: Some(Expression::new("$(1 + 1)")),
        ..Default::default()
    };

    let err = Process::new(&tool, Values::default(), Runtime::default(), &fs)
        .expect_err("should fail");
    assert!(matches!(err, Error::NonStringStdio { stream: "stdout" }));
}

#[test]
fn expression_libraries_load_before_binding() {
    let fs = MemoryFilesystem::new([]);
    let mut env_def = indexmap::IndexMap::new();
    env_def.insert(
        "DOUBLED".to_string(),
        Expression::new("${return itoa(double(4));}"),
    );

    let tool = Tool {
        requirements: vec![
            Requirement::InlineJavascript(InlineJavascriptRequirement {
                expression_lib: vec![
                    "function double(x) { return x * 2; }".to_string(),
                    "function itoa(x) { return \"\" + x; }".to_string(),
                ],
            }),
            Requirement::EnvVar(EnvVarRequirement {
                env_def,
                env_expr: Vec::new(),
            }),
        ],
        ..Default::default()
    };

    let process = Process::new(&tool, Values::default(), Runtime::default(), &fs)
        .expect("should assemble");
    let (env, _) = process.env();
    assert_eq!(env.get("DOUBLED"), Some(&"8".to_string()));
}

#[test]
fn runtime_values_are_visible_to_expressions() {
    let fs = MemoryFilesystem::new([]);
    let mut env_def = indexmap::IndexMap::new();
    env_def.insert("CORES".to_string(), Expression::new("$(runtime.cores)"));

    let tool = Tool {
        requirements: vec![Requirement::EnvVar(EnvVarRequirement {
            env_def,
            env_expr: Vec::new(),
        })],
        ..Default::default()
    };

    let runtime = Runtime {
        cores: "4".to_string(),
        ..Default::default()
    };

    let process =
        Process::new(&tool, Values::default(), runtime, &fs).expect("should assemble");
    let (env, _) = process.env();
    assert_eq!(env.get("CORES"), Some(&"4".to_string()));
}

#[test]
fn defaults_apply_before_binding() {
    let fs = MemoryFilesystem::new([]);
    let tool = Tool {
        inputs: vec![CommandInput {
            id: "n".to_string(),
            types: vec![Type::Int],
            default: Some(Value::Int(42)),
            ..Default::default()
        }],
        ..Default::default()
    };

    let process = Process::new(&tool, Values::default(), Runtime::default(), &fs)
        .expect("should assemble");
    assert_eq!(process.input_bindings()[0].value(), &Value::Int(42));
}

#[test]
fn file_literals_stage_through_the_filesystem() {
    let fs = MemoryFilesystem::new([]);
    let tool = Tool {
        inputs: vec![input("f", vec![Type::File])],
        ..Default::default()
    };

    let mut values = Values::default();
    values.insert(
        "f".to_string(),
        Value::File(File {
            contents: "inline data".to_string(),
            basename: "literal.txt".to_string(),
            ..Default::default()
        }),
    );

    let process =
        Process::new(&tool, values, Runtime::default(), &fs).expect("should assemble");

    let Value::File(file) = process.input_bindings()[0].value() else {
        panic!("expected a file binding");
    };
    assert_eq!(file.location, "literal.txt");
    assert_eq!(file.size, 11);
    assert_eq!(
        fs.contents("literal.txt").expect("should exist"),
        "inline data"
    );
}

#[test]
fn assembly_is_deterministic() {
    let build = || {
        let fs = MemoryFilesystem::new([("a.txt", "a"), ("b.txt", "b")]);
        let tool = Tool {
            inputs: vec![
                CommandInput {
                    id: "f1".to_string(),
                    types: vec![Type::File],
                    input_binding: Some(CommandLineBinding {
                        position: 2,
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                CommandInput {
                    id: "f2".to_string(),
                    types: vec![Type::File],
                    input_binding: Some(CommandLineBinding {
                        position: 1,
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let mut values = Values::default();
        values.insert("f1".to_string(), file_value("a.txt"));
        values.insert("f2".to_string(), file_value("b.txt"));

        let process =
            Process::new(&tool, values, Runtime::default(), &fs).expect("should assemble");
        (
            process.input_files(),
            process
                .input_bindings()
                .iter()
                .map(|b| b.key().clone())
                .collect::<Vec<_>>(),
        )
    };

    assert_eq!(build(), build());
}
