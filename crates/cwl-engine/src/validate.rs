//! Structural validation of tool documents.

use cwl_schema::Tool;
use cwl_schema::Type;
use itertools::Itertools;

use crate::ValidationError;

/// Validates the structure of a tool document.
///
/// Checks identifier presence and uniqueness and that every input
/// declares at least one type. Value-level checks happen during
/// binding.
pub fn validate_tool(tool: &Tool) -> Result<(), ValidationError> {
    for input in &tool.inputs {
        if input.id.is_empty() {
            return Err(ValidationError::EmptyInputId);
        }
        if input.types.is_empty() {
            return Err(ValidationError::NoTypes {
                id: input.id.clone(),
            });
        }
        for ty in &input.types {
            if let Type::Enum(e) = ty {
                if e.symbols.is_empty() {
                    return Err(ValidationError::NoSymbols {
                        id: input.id.clone(),
                    });
                }
            }
        }
    }

    if let Some(id) = tool.inputs.iter().map(|i| &i.id).duplicates().next() {
        return Err(ValidationError::DuplicateInputId { id: id.clone() });
    }
    if let Some(id) = tool.outputs.iter().map(|o| &o.id).duplicates().next() {
        return Err(ValidationError::DuplicateOutputId { id: id.clone() });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use cwl_schema::CommandInput;
    use cwl_schema::EnumType;

    use super::*;

    #[test]
    fn rejects_duplicate_input_ids() {
        let tool = Tool {
            inputs: vec![
                CommandInput {
                    id: "x".to_string(),
                    types: vec![Type::String],
                    ..Default::default()
                },
                CommandInput {
                    id: "x".to_string(),
                    types: vec![Type::Int],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        assert!(matches!(
            validate_tool(&tool),
            Err(ValidationError::DuplicateInputId { id }) if id == "x"
        ));
    }

    #[test]
    fn rejects_inputs_without_types() {
        let tool = Tool {
            inputs: vec![CommandInput {
                id: "x".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };

        assert!(matches!(
            validate_tool(&tool),
            Err(ValidationError::NoTypes { id }) if id == "x"
        ));
    }

    #[test]
    fn rejects_empty_enums() {
        let tool = Tool {
            inputs: vec![CommandInput {
                id: "mode".to_string(),
                types: vec![Type::Enum(EnumType::default())],
                ..Default::default()
            }],
            ..Default::default()
        };

        assert!(matches!(
            validate_tool(&tool),
            Err(ValidationError::NoSymbols { id }) if id == "mode"
        ));
    }

    #[test]
    fn accepts_a_well_formed_tool() {
        let tool = Tool {
            inputs: vec![CommandInput {
                id: "x".to_string(),
                types: vec![Type::Null, Type::String],
                ..Default::default()
            }],
            ..Default::default()
        };

        assert!(validate_tool(&tool).is_ok());
    }
}
