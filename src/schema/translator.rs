//! Tool descriptor → Messages API tool definition.
//!
//! The output is built field by field into closed structs, so nothing from
//! the server's schema is forwarded unless it is `properties` or `required`.

use serde_json::Value;

use super::errors::SchemaError;
use crate::inference::types::{InputSchema, SchemaType, ToolDefinition};
use crate::mcp_client::types::ToolDescriptor;

/// Longest tool name the API accepts.
pub const MAX_TOOL_NAME_LEN: usize = 64;

/// Translate a tool under its own name.
pub fn translate(tool: &ToolDescriptor) -> Result<ToolDefinition, SchemaError> {
    translate_as(tool, &tool.name)
}

/// Translate a tool, exposing it to the model as `exposed_name`.
pub fn translate_as(tool: &ToolDescriptor, exposed_name: &str) -> Result<ToolDefinition, SchemaError> {
    validate_name(exposed_name)?;

    let schema = tool
        .input_schema
        .as_ref()
        .ok_or_else(|| SchemaError::new(exposed_name, "missing input schema"))?;
    let schema = schema
        .as_object()
        .ok_or_else(|| SchemaError::new(exposed_name, "input schema is not an object"))?;

    match schema.get("type") {
        None => return Err(SchemaError::new(exposed_name, "input schema has no 'type'")),
        Some(Value::String(t)) if t == "object" => {}
        Some(other) => {
            return Err(SchemaError::new(
                exposed_name,
                format!("input schema type must be \"object\", got {other}"),
            ))
        }
    }

    let properties = match schema.get("properties") {
        None | Some(Value::Null) => serde_json::Map::new(),
        Some(Value::Object(props)) => {
            if let Some((key, _)) = props.iter().find(|(_, v)| !v.is_object()) {
                return Err(SchemaError::new(
                    exposed_name,
                    format!("property '{key}' schema is not an object"),
                ));
            }
            props.clone()
        }
        Some(_) => {
            return Err(SchemaError::new(
                exposed_name,
                "'properties' is not an object",
            ))
        }
    };

    let required = match schema.get("required") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let mut names = Vec::with_capacity(items.len());
            for item in items {
                let name = item.as_str().ok_or_else(|| {
                    SchemaError::new(exposed_name, "'required' contains a non-string entry")
                })?;
                if !properties.contains_key(name) {
                    return Err(SchemaError::new(
                        exposed_name,
                        format!("required property '{name}' is not declared"),
                    ));
                }
                names.push(name.to_string());
            }
            names
        }
        Some(_) => {
            return Err(SchemaError::new(
                exposed_name,
                "'required' is not an array",
            ))
        }
    };

    Ok(ToolDefinition {
        name: exposed_name.to_string(),
        description: tool
            .description
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        input_schema: InputSchema {
            schema_type: SchemaType::Object,
            properties,
            required,
        },
    })
}

/// Names must match `[A-Za-z0-9_-]{1,64}`.
pub fn is_valid_tool_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_TOOL_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn validate_name(name: &str) -> Result<(), SchemaError> {
    if is_valid_tool_name(name) {
        Ok(())
    } else {
        Err(SchemaError::new(
            name,
            format!("name must match [A-Za-z0-9_-]{{1,{MAX_TOOL_NAME_LEN}}}"),
        ))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
