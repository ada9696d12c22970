//! JSON-Schema and description rendering for MBean attributes and operations.

use serde_json::{json, Map, Value};

use crate::catalog::{AttributeDescriptor, ManagedEntity, OperationDescriptor};

const TYPE_OBJECT: &str = "object";
const TYPE_STRING: &str = "string";
const TYPE_ARRAY: &str = "array";

/// JSON-Schema type name for a type tag.
pub fn json_type(type_name: &str) -> &'static str {
    match type_name {
        "boolean" | "java.lang.Boolean" => "boolean",
        "byte" | "short" | "int" | "long" | "java.lang.Byte" | "java.lang.Short"
        | "java.lang.Integer" | "java.lang.Long" => "integer",
        "float" | "double" | "java.lang.Float" | "java.lang.Double" | "java.math.BigDecimal" => {
            "number"
        }
        "char" | "java.lang.Character" | "java.lang.String" => TYPE_STRING,
        other if other.starts_with('[') => TYPE_ARRAY,
        other
            if other.starts_with("java.util.List")
                || other.starts_with("java.util.Set")
                || other.starts_with("java.util.Collection") =>
        {
            TYPE_ARRAY
        }
        other if other.starts_with("java.util.Map") => TYPE_OBJECT,
        _ => TYPE_STRING,
    }
}

/// Input schema for an operation: one required property per parameter.
pub fn operation_input_schema(operation: &OperationDescriptor) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::with_capacity(operation.parameters.len());

    for (index, param) in operation.parameters.iter().enumerate() {
        let name = parameter_name(&param.name, index);
        let json_type = json_type(&param.type_name);

        let mut schema = Map::new();
        schema.insert("type".into(), json!(json_type));
        if !param.description.trim().is_empty() {
            schema.insert("description".into(), json!(param.description));
        }
        if json_type == TYPE_STRING
            && (param.type_name.contains("Date") || param.type_name.contains("Time"))
        {
            schema.insert("format".into(), json!("date-time"));
        }

        properties.insert(name.clone(), Value::Object(schema));
        required.push(Value::String(name));
    }

    json!({
        "type": TYPE_OBJECT,
        "properties": properties,
        "required": required,
    })
}

/// Argument key for a parameter; blank names become `p{index}`.
pub fn parameter_name(name: &str, index: usize) -> String {
    if name.trim().is_empty() {
        format!("p{}", index)
    } else {
        name.to_string()
    }
}

pub fn operation_description(entity: &ManagedEntity, operation: &OperationDescriptor) -> String {
    let mut desc = format!("JMX Operation: {}.{}", entity.identity, operation.name);
    if !operation.description.trim().is_empty() {
        desc.push('\n');
        desc.push_str(&operation.description);
    }
    desc.push_str(&format!("\nReturn Type: {}", operation.return_type));
    desc.push_str(&format!("\nImpact: {}", operation.impact.as_str()));
    if !operation.parameters.is_empty() {
        desc.push_str("\nParameters:");
        for param in &operation.parameters {
            let text = if param.description.trim().is_empty() {
                "No description"
            } else {
                param.description.as_str()
            };
            desc.push_str(&format!("\n  - {} ({}): {}", param.name, param.type_name, text));
        }
    }
    desc
}

pub fn attribute_description(entity: &ManagedEntity, attribute: &AttributeDescriptor) -> String {
    let mut desc = format!("JMX Attribute: {}.{}", entity.identity, attribute.name);
    if !attribute.description.trim().is_empty() {
        desc.push('\n');
        desc.push_str(&attribute.description);
    }
    desc.push_str(&format!("\nType: {}", attribute.type_name));
    desc.push_str(&format!("\nAccess: {}", attribute.access_label()));
    desc
}
