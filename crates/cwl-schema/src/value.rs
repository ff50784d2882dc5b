//! Runtime values supplied as inputs to a tool invocation.

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use serde::Serializer;

/// An ordered mapping of input identifier to supplied value.
pub type Values = IndexMap<String, Value>;

/// A file descriptor.
///
/// Before resolution, exactly one of `location` and `contents` must be
/// non-empty; resolution promotes `path` to `location` when only `path`
/// is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct File {
    /// The IRI or path identifying the file.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub location: String,
    /// The local path to the file, populated by resolution.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// The final path segment.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub basename: String,
    /// The directory portion of `path`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dirname: String,
    /// The basename with its last extension removed.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub nameroot: String,
    /// The last extension of the basename, including the leading `.`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub nameext: String,
    /// The checksum of the file contents.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub checksum: String,
    /// The size of the file in bytes.
    pub size: i64,
    /// The declared format IRI of the file.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub format: String,
    /// Literal file contents.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub contents: String,
    /// Secondary files associated with this file, in resolution order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secondary_files: Vec<FileOrDirectory>,
}

/// A directory descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Directory {
    /// The IRI or path identifying the directory.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub location: String,
    /// The local path to the directory.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// The final path segment.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub basename: String,
    /// The directory listing.
    ///
    /// Never populated by the engine: recursive listing resolution is a
    /// known capability gap.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub listing: Vec<FileOrDirectory>,
}

/// Either a file or a directory, discriminated by the CWL `class` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class")]
pub enum FileOrDirectory {
    /// A file.
    File(File),
    /// A directory.
    Directory(Directory),
}

/// An untyped runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// An absent value.
    Null,
    /// A boolean value.
    Bool(bool),
    /// An integer value.
    Int(i64),
    /// A floating point value.
    Float(f64),
    /// A string value.
    String(String),
    /// A file value.
    File(File),
    /// A directory value.
    Directory(Directory),
    /// An ordered sequence of values.
    Array(Vec<Value>),
    /// An ordered mapping of name to value.
    Object(IndexMap<String, Value>),
}

impl Value {
    /// Determines if the value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Gets the value as a boolean.
    ///
    /// Returns `None` if the value is not a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Gets the value as an integer.
    ///
    /// Returns `None` if the value is not an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Gets the value as a float.
    ///
    /// Returns `None` if the value is not a float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Gets the value as a string.
    ///
    /// Returns `None` if the value is not a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Gets the value as a file.
    ///
    /// Returns `None` if the value is not a file.
    pub fn as_file(&self) -> Option<&File> {
        match self {
            Self::File(f) => Some(f),
            _ => None,
        }
    }

    /// Gets the value as a directory.
    ///
    /// Returns `None` if the value is not a directory.
    pub fn as_directory(&self) -> Option<&Directory> {
        match self {
            Self::Directory(d) => Some(d),
            _ => None,
        }
    }

    /// Gets the value as an array.
    ///
    /// Returns `None` if the value is not an array.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Gets the value as an object.
    ///
    /// Returns `None` if the value is not an object.
    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Converts the value into its JSON representation.
    ///
    /// Files and directories are represented as `class`-tagged objects
    /// with empty fields omitted.
    pub fn to_json(&self) -> serde_json::Value {
        // SAFETY: serialization of a value is infallible as every variant
        // maps directly onto a JSON value.
        serde_json::to_value(self).expect("value should serialize")
    }

    /// Converts a JSON value into a runtime value.
    ///
    /// Objects tagged with a `class` of `File` or `Directory` convert to
    /// the corresponding descriptor; any other object converts to
    /// [`Value::Object`].
    pub fn from_json(v: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(v) => Self::Bool(v),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or_default())
                }
            }
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => Self::Array(
                items
                    .into_iter()
                    .map(Self::from_json)
                    .collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(map) => {
                match map.get("class").and_then(serde_json::Value::as_str) {
                    Some("File") | Some("Directory") => {
                        match serde_json::from_value(serde_json::Value::Object(map))? {
                            FileOrDirectory::File(f) => Self::File(f),
                            FileOrDirectory::Directory(d) => Self::Directory(d),
                        }
                    }
                    _ => Self::Object(
                        map.into_iter()
                            .map(|(k, v)| Ok((k, Self::from_json(v)?)))
                            .collect::<Result<_, serde_json::Error>>()?,
                    ),
                }
            }
        })
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        /// Borrowing serializer for `class`-tagged file system values.
        #[derive(Serialize)]
        #[serde(tag = "class")]
        enum Tagged<'a> {
            /// A borrowed file.
            File(&'a File),
            /// A borrowed directory.
            Directory(&'a Directory),
        }

        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::String(s) => serializer.serialize_str(s),
            Self::File(f) => Tagged::File(f).serialize(serializer),
            Self::Directory(d) => Tagged::Directory(d).serialize(serializer),
            Self::Array(v) => v.serialize(serializer),
            Self::Object(v) => v.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        Self::from_json(v).map_err(serde::de::Error::custom)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<File> for Value {
    fn from(v: File) -> Self {
        Self::File(v)
    }
}

impl From<Directory> for Value {
    fn from(v: Directory) -> Self {
        Self::Directory(v)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(v: Vec<V>) -> Self {
        Self::Array(v.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn file_values_round_trip_with_class_tag() {
        let value = Value::File(File {
            location: "/data/a.txt".to_string(),
            basename: "a.txt".to_string(),
            size: 42,
            ..Default::default()
        });

        let json = value.to_json();
        assert_eq!(
            json,
            json!({
                "class": "File",
                "location": "/data/a.txt",
                "basename": "a.txt",
                "size": 42,
            })
        );
        assert_eq!(Value::from_json(json).expect("should convert"), value);
    }

    #[test]
    fn untagged_objects_convert_to_object_values() {
        let value =
            Value::from_json(json!({ "a": 1, "b": [true, null] })).expect("should convert");
        let object = value.as_object().expect("should be an object");
        assert_eq!(object["a"], Value::Int(1));
        assert_eq!(
            object["b"],
            Value::Array(vec![Value::Bool(true), Value::Null])
        );
    }

    #[test]
    fn empty_file_fields_are_omitted() {
        let json = Value::File(File::default()).to_json();
        assert_eq!(json, json!({ "class": "File", "size": 0 }));
    }
}
