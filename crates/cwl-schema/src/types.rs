//! The catalog of CWL types.

use std::fmt;

use crate::CommandLineBinding;

/// A CWL type.
///
/// An input or output slot declares an ordered list of these; binding
/// tries each in declaration order and the first match wins.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// The `null` type.
    Null,
    /// The `boolean` type.
    Boolean,
    /// The 32-bit `int` type.
    Int,
    /// The 64-bit `long` type.
    Long,
    /// The 32-bit `float` type.
    Float,
    /// The 64-bit `double` type.
    Double,
    /// The `string` type.
    String,
    /// The `File` type.
    File,
    /// The `Directory` type.
    Directory,
    /// The `stdout` output type.
    Stdout,
    /// The `stderr` output type.
    Stderr,
    /// The `Any` type, which matches any non-null value.
    Any,
    /// An array type.
    Array(ArrayType),
    /// A record type.
    Record(RecordType),
    /// An enumeration type.
    Enum(EnumType),
}

impl Type {
    /// Gets the CWL name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::File => "File",
            Self::Directory => "Directory",
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::Any => "Any",
            Self::Array(_) => "array",
            Self::Record(_) => "record",
            Self::Enum(_) => "enum",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An array type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayType {
    /// The ordered list of types allowed for the array items.
    pub items: Vec<Type>,
    /// The command line binding attached to the items slot.
    pub input_binding: Option<CommandLineBinding>,
}

/// A record type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordType {
    /// The name of the record type.
    pub name: String,
    /// The declared fields, in document order.
    pub fields: Vec<RecordField>,
}

/// A field of a record type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordField {
    /// The field name.
    pub name: String,
    /// The ordered list of types allowed for the field.
    pub types: Vec<Type>,
    /// The command line binding attached to the field.
    pub input_binding: Option<CommandLineBinding>,
}

/// An enumeration type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumType {
    /// The allowed symbols, in document order.
    pub symbols: Vec<String>,
    /// The command line binding attached to the symbols slot.
    pub input_binding: Option<CommandLineBinding>,
}
