//! Binding of input values to declared input types.
//!
//! An input descriptor declares an ordered union of allowed types; the
//! binder tries each candidate in declaration order and the first type
//! the value satisfies wins. Binding is recursive for arrays and
//! records, producing a [`SortKey`] for each binding that fixes its
//! place on the eventual command line.

use cwl_schema::CommandLineBinding;
use cwl_schema::Expression;
use cwl_schema::File;
use cwl_schema::FileOrDirectory;
use cwl_schema::Type;
use cwl_schema::Value;
use cwl_schema::binding_position;

use crate::BindingError;
use crate::FileResolutionError;
use crate::expr::is_expression;
use crate::process::Construction;
use crate::resolver::FileResolver;

/// The maximum recursion depth of input binding.
///
/// Declared types are finite but values are not; a deeply nested value
/// aimed at an `Any` declaration would otherwise recurse without bound.
pub const MAX_BINDING_DEPTH: usize = 64;

/// A key fixing a binding's position in command line order.
///
/// Keys compare lexicographically. A root key holds the input's binding
/// position; each nesting level appends the child's binding position
/// and its index within the parent.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey(Vec<i64>);

impl SortKey {
    /// Constructs a root key from a binding position.
    pub fn root(position: i64) -> Self {
        Self(vec![position])
    }

    /// Constructs the key of a child at the given binding position and
    /// index within this key's binding.
    pub fn child(&self, position: i64, index: i64) -> Self {
        let mut parts = self.0.clone();
        parts.push(position);
        parts.push(index);
        Self(parts)
    }

    /// Gets the key as a slice of its parts.
    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }
}

/// A bound input value.
#[derive(Debug, Clone)]
pub struct Binding {
    /// The command line binding of the input, if any.
    binding: Option<CommandLineBinding>,
    /// The declared type the value matched.
    ty: Type,
    /// The bound value, after coercion and file resolution.
    value: Value,
    /// The key fixing this binding's command line position.
    key: SortKey,
    /// The bindings of nested items or fields.
    nested: Vec<Binding>,
    /// The input or field name.
    name: String,
}

impl Binding {
    /// Gets the command line binding of the input, if any.
    pub fn command_line_binding(&self) -> Option<&CommandLineBinding> {
        self.binding.as_ref()
    }

    /// Gets the declared type the value matched.
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Gets the bound value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Gets the sort key of the binding.
    pub fn key(&self) -> &SortKey {
        &self.key
    }

    /// Gets the bindings of nested items or fields.
    pub fn nested(&self) -> &[Binding] {
        &self.nested
    }

    /// Gets the input or field name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Construction<'_> {
    /// Binds an input value to the first declared type it satisfies.
    ///
    /// An absent or null value binds only when `null` is among the
    /// declared types. A candidate that does not match the value's
    /// shape is skipped; filesystem and expression failures abort the
    /// whole binding.
    ///
    /// Records return their field bindings followed by the record
    /// binding itself; arrays return a single binding holding the item
    /// bindings as its children. Secondary file declarations apply to
    /// every file bound beneath the input, including array items.
    pub(crate) fn bind_input(
        &self,
        name: &str,
        types: &[Type],
        binding: Option<&CommandLineBinding>,
        secondary: &[Expression],
        value: Option<&Value>,
        key: SortKey,
        depth: usize,
    ) -> Result<Vec<Binding>, BindingError> {
        if depth > MAX_BINDING_DEPTH {
            return Err(BindingError::DepthExceeded {
                max: MAX_BINDING_DEPTH,
            });
        }

        let single = |ty: &Type, value: Value| -> Vec<Binding> {
            vec![Binding {
                binding: binding.cloned(),
                ty: ty.clone(),
                value,
                key: key.clone(),
                nested: Vec::new(),
                name: name.to_string(),
            }]
        };

        let value = match value {
            None | Some(Value::Null) => {
                if let Some(ty) = types.iter().find(|ty| matches!(ty, Type::Null)) {
                    return Ok(single(ty, Value::Null));
                }
                return Err(BindingError::MissingValue);
            }
            Some(value) => value,
        };

        for ty in types {
            match ty {
                Type::Array(array) => {
                    let Value::Array(items) = value else {
                        continue;
                    };

                    let mut nested = Vec::new();
                    let mut matched = true;
                    for (i, item) in items.iter().enumerate() {
                        let subkey = key.child(
                            binding_position(array.input_binding.as_ref()),
                            i as i64,
                        );
                        match self.bind_input(
                            "",
                            &array.items,
                            array.input_binding.as_ref(),
                            secondary,
                            Some(item),
                            subkey,
                            depth + 1,
                        ) {
                            Ok(bindings) => nested.extend(bindings),
                            Err(BindingError::MissingValue) => {
                                matched = false;
                                break;
                            }
                            Err(e) => return Err(e),
                        }
                    }
                    if !matched {
                        continue;
                    }

                    return Ok(vec![Binding {
                        binding: binding.cloned(),
                        ty: ty.clone(),
                        value: value.clone(),
                        key: key.clone(),
                        nested,
                        name: name.to_string(),
                    }]);
                }

                Type::Record(record) => {
                    let Value::Object(members) = value else {
                        continue;
                    };
                    // A record declaring no fields never matches.
                    if record.fields.is_empty() {
                        continue;
                    }

                    let mut out = Vec::new();
                    let mut matched = true;
                    for (i, field) in record.fields.iter().enumerate() {
                        let Some(member) = members.get(&field.name) else {
                            matched = false;
                            break;
                        };
                        let subkey = key.child(
                            binding_position(field.input_binding.as_ref()),
                            i as i64,
                        );
                        match self.bind_input(
                            &field.name,
                            &field.types,
                            field.input_binding.as_ref(),
                            &[],
                            Some(member),
                            subkey,
                            depth + 1,
                        ) {
                            Ok(bindings) => out.extend(bindings),
                            Err(BindingError::MissingValue) => {
                                matched = false;
                                break;
                            }
                            Err(e) => return Err(e),
                        }
                    }
                    if !matched {
                        continue;
                    }

                    let nested = out.clone();
                    out.push(Binding {
                        binding: binding.cloned(),
                        ty: ty.clone(),
                        value: value.clone(),
                        key: key.clone(),
                        nested,
                        name: name.to_string(),
                    });
                    return Ok(out);
                }

                Type::Enum(e) => {
                    let Value::String(s) = value else {
                        continue;
                    };
                    if e.symbols.iter().any(|symbol| symbol == s) {
                        return Ok(single(ty, value.clone()));
                    }
                }

                Type::Any => {
                    return Ok(single(ty, value.clone()));
                }

                Type::Boolean => {
                    if let Some(v) = coerce_bool(value) {
                        return Ok(single(ty, Value::Bool(v)));
                    }
                }

                Type::Int => {
                    if let Some(v) = coerce_int(value) {
                        return Ok(single(ty, Value::Int(v)));
                    }
                }

                Type::Long => {
                    if let Some(v) = coerce_long(value) {
                        return Ok(single(ty, Value::Int(v)));
                    }
                }

                Type::Float => {
                    if let Some(v) = coerce_float(value) {
                        return Ok(single(ty, Value::Float(v)));
                    }
                }

                Type::Double => {
                    if let Some(v) = coerce_double(value) {
                        return Ok(single(ty, Value::Float(v)));
                    }
                }

                Type::String => {
                    if let Some(v) = coerce_string(value) {
                        return Ok(single(ty, Value::String(v)));
                    }
                }

                Type::File => {
                    let Value::File(f) = value else {
                        continue;
                    };

                    let mut file = f.clone();
                    let load_contents = binding.is_some_and(|b| b.load_contents);
                    FileResolver::new(self.fs).resolve(&mut file, load_contents)?;

                    for expr in secondary {
                        self.resolve_secondary(&mut file, expr)?;
                    }

                    return Ok(single(ty, Value::File(file)));
                }

                // Directories bind as-is; listing resolution is a known
                // capability gap.
                Type::Directory => {
                    if matches!(value, Value::Directory(_)) {
                        return Ok(single(ty, value.clone()));
                    }
                }

                // Null only matches an absent value, handled above;
                // stdout and stderr are output-only types.
                Type::Null | Type::Stdout | Type::Stderr => {}
            }
        }

        Err(BindingError::MissingValue)
    }

    /// Resolves one secondary file declaration against a primary file.
    ///
    /// An expression evaluates with the primary file as `self` and may
    /// return a location string, a File or Directory object, an array
    /// of those, or null to declare nothing. A plain string is a suffix
    /// pattern applied to the primary location.
    fn resolve_secondary(&self, file: &mut File, expr: &Expression) -> Result<(), BindingError> {
        let resolver = FileResolver::new(self.fs);

        if is_expression(expr.as_str()) {
            let scope = self.scope(Value::File(file.clone()).to_json());
            let result = self.evaluator.evaluate(expr.as_str(), &scope)?;
            self.apply_secondary(&resolver, file, result, expr)?;
        } else {
            resolver.resolve_pattern(file, expr.as_str())?;
        }

        Ok(())
    }

    /// Applies one secondary file expression result to a primary file.
    fn apply_secondary(
        &self,
        resolver: &FileResolver<'_>,
        file: &mut File,
        result: serde_json::Value,
        expr: &Expression,
    ) -> Result<(), BindingError> {
        match result {
            serde_json::Value::Null => Ok(()),
            serde_json::Value::String(location) => {
                resolver.resolve_secondary(file, location)?;
                Ok(())
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    self.apply_secondary(resolver, file, item, expr)?;
                }
                Ok(())
            }
            result @ serde_json::Value::Object(_) => {
                let unsupported = || FileResolutionError::UnsupportedSecondary {
                    expr: expr.as_str().to_string(),
                };
                match serde_json::from_value::<FileOrDirectory>(result)
                    .map_err(|_| unsupported())?
                {
                    FileOrDirectory::File(mut secondary) => {
                        resolver.resolve(&mut secondary, false)?;
                        file.secondary_files.push(FileOrDirectory::File(secondary));
                    }
                    FileOrDirectory::Directory(mut secondary) => {
                        resolver.resolve_directory(&mut secondary)?;
                        file.secondary_files
                            .push(FileOrDirectory::Directory(secondary));
                    }
                }
                Ok(())
            }
            _ => Err(FileResolutionError::UnsupportedSecondary {
                expr: expr.as_str().to_string(),
            }
            .into()),
        }
    }
}

/// Coerces a value to a boolean.
fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(v) => Some(*v),
        Value::Int(v) => Some(*v != 0),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Coerces a value to a 64-bit integer.
fn coerce_long(value: &Value) -> Option<i64> {
    match value {
        Value::Int(v) => Some(*v),
        Value::Float(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Some(*v as i64),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Coerces a value to an integer within the 32-bit range.
fn coerce_int(value: &Value) -> Option<i64> {
    let v = coerce_long(value)?;
    i32::try_from(v).ok().map(i64::from)
}

/// Coerces a value to a 64-bit float.
fn coerce_double(value: &Value) -> Option<f64> {
    match value {
        Value::Float(v) => Some(*v),
        Value::Int(v) => Some(*v as f64),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Coerces a value to a float within the 32-bit range.
fn coerce_float(value: &Value) -> Option<f64> {
    let v = coerce_double(value)?;
    let narrowed = v as f32;
    if narrowed.is_finite() || !v.is_finite() {
        Some(f64::from(narrowed))
    } else {
        None
    }
}

/// Coerces a value to a string.
fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Int(v) => Some(v.to_string()),
        Value::Float(v) => Some(v.to_string()),
        Value::Bool(v) => Some(v.to_string()),
        _ => None,
    }
}
