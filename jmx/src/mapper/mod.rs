//! Resource and tool addressing.
//!
//! Forward mapping is a pure rendering of the identity. Reverse mapping is a
//! lookup against the current catalog snapshot, so an address only resolves to
//! MBeans and members that exist right now.

pub mod schema;

use std::{collections::HashSet, sync::Arc};

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    catalog::{AttributeDescriptor, ManagedEntity, MBeanCatalog, OperationDescriptor},
    core::config::{ResourcesConfig, ToolsConfig},
    error::{JmxError, JmxResult},
    identity::ObjectIdentity,
};

pub const RESOURCE_MIME_TYPE: &str = "application/json";

const ATTRIBUTES_SEGMENT: &str = "/attributes/";

/// Render an identity into a single address-safe segment.
///
/// Lossy: distinct identities may render to the same string.
pub fn render_identity(identity: &ObjectIdentity) -> String {
    sanitize(&identity.to_string())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '"')
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '.' | '-' => c,
            _ => '_',
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDefinition {
    pub uri: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// An address resolved against the catalog.
#[derive(Debug, Clone)]
pub struct ResolvedAttribute {
    pub entity: Arc<ManagedEntity>,
    pub attribute: AttributeDescriptor,
}

/// A tool name resolved against the catalog.
#[derive(Debug, Clone)]
pub struct ResolvedOperation {
    pub entity: Arc<ManagedEntity>,
    pub operation: OperationDescriptor,
}

pub struct ResourceMapper {
    catalog: Arc<MBeanCatalog>,
    resources: ResourcesConfig,
    tools: ToolsConfig,
    address_pattern: Regex,
}

impl ResourceMapper {
    pub fn new(
        catalog: Arc<MBeanCatalog>,
        resources: &ResourcesConfig,
        tools: &ToolsConfig,
    ) -> JmxResult<Self> {
        let pattern = format!(
            "^{}([^/]+){}([^/]+)$",
            regex::escape(&resources.base_uri),
            regex::escape(ATTRIBUTES_SEGMENT)
        );
        let address_pattern = Regex::new(&pattern)
            .map_err(|e| JmxError::Config(format!("Invalid resource base URI: {}", e)))?;

        Ok(Self {
            catalog,
            resources: resources.clone(),
            tools: tools.clone(),
            address_pattern,
        })
    }

    pub fn base_uri(&self) -> &str {
        &self.resources.base_uri
    }

    pub fn tool_prefix(&self) -> &str {
        &self.tools.prefix
    }

    pub fn to_address(&self, identity: &ObjectIdentity, attribute: &str) -> String {
        format!(
            "{}{}{}{}",
            self.resources.base_uri,
            render_identity(identity),
            ATTRIBUTES_SEGMENT,
            attribute
        )
    }

    pub fn to_resource_name(&self, identity: &ObjectIdentity, attribute: &str) -> String {
        format!("{}.{}", render_identity(identity), attribute)
    }

    pub fn to_tool_name(&self, identity: &ObjectIdentity, operation: &str) -> String {
        format!("{}.{}.{}", self.tools.prefix, render_identity(identity), operation)
    }

    /// Whether `address` has the shape of a resource address.
    pub fn is_valid_address(&self, address: &str) -> bool {
        self.address_pattern.is_match(address)
    }

    /// Resolve a resource address to a cataloged MBean attribute.
    pub fn from_address(&self, address: &str) -> JmxResult<ResolvedAttribute> {
        let not_found = || JmxError::ResourceNotFound(address.to_string());
        let captures = self.address_pattern.captures(address).ok_or_else(not_found)?;
        let segment = captures.get(1).map(|m| m.as_str()).ok_or_else(not_found)?;
        let attribute = captures.get(2).map(|m| m.as_str()).ok_or_else(not_found)?;

        let snapshot = self.catalog.snapshot();
        let found = snapshot
            .iter()
            .filter(|entity| render_identity(&entity.identity) == segment)
            .find_map(|entity| {
                entity.attribute(attribute).map(|attr| ResolvedAttribute {
                    entity: entity.clone(),
                    attribute: attr.clone(),
                })
            });
        found.ok_or_else(not_found)
    }

    /// Resolve a tool name to a cataloged MBean operation.
    pub fn from_tool_name(&self, name: &str) -> JmxResult<ResolvedOperation> {
        let not_found = || JmxError::ToolNotFound(name.to_string());
        let rest = name
            .strip_prefix(self.tools.prefix.as_str())
            .and_then(|r| r.strip_prefix('.'))
            .ok_or_else(not_found)?;
        let (segment, operation) = rest.rsplit_once('.').ok_or_else(not_found)?;

        let snapshot = self.catalog.snapshot();
        let found = snapshot
            .iter()
            .filter(|entity| render_identity(&entity.identity) == segment)
            .find_map(|entity| {
                entity.operation(operation).map(|op| ResolvedOperation {
                    entity: entity.clone(),
                    operation: op.clone(),
                })
            });
        found.ok_or_else(not_found)
    }

    fn includes_attribute(&self, attribute: &AttributeDescriptor) -> bool {
        let access = (attribute.readable && self.resources.include_read_only)
            || (attribute.writable && self.resources.include_write_only);
        access && !self.resources.exclude_attributes.contains(&attribute.name)
    }

    fn includes_operation(&self, operation: &OperationDescriptor) -> bool {
        if self.tools.exclude_operations.contains(&operation.name) {
            return false;
        }
        if operation.parameters.len() > self.tools.max_parameters {
            debug!(
                "Skipping operation {} with {} parameters",
                operation.name,
                operation.parameters.len()
            );
            return false;
        }
        true
    }

    /// Resource definitions for every included attribute in the catalog.
    pub fn resource_definitions(&self) -> Vec<ResourceDefinition> {
        if !self.resources.enabled {
            return Vec::new();
        }
        let snapshot = self.catalog.snapshot();
        let mut definitions = Vec::new();
        for entity in snapshot.iter() {
            for attribute in entity.attributes.iter().filter(|a| self.includes_attribute(a)) {
                definitions.push(ResourceDefinition {
                    uri: self.to_address(&entity.identity, &attribute.name),
                    name: self.to_resource_name(&entity.identity, &attribute.name),
                    description: schema::attribute_description(entity, attribute),
                    mime_type: RESOURCE_MIME_TYPE.to_string(),
                });
            }
        }
        definitions
    }

    /// Addresses of every listed resource.
    pub fn resource_addresses(&self) -> HashSet<String> {
        self.resource_definitions()
            .into_iter()
            .map(|d| d.uri)
            .collect()
    }

    /// Tool definitions for every included operation in the catalog.
    ///
    /// Overloaded operations share a name; only the first is listed.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        if !self.tools.enabled {
            return Vec::new();
        }
        let snapshot = self.catalog.snapshot();
        let mut seen = HashSet::new();
        let mut definitions = Vec::new();
        for entity in snapshot.iter() {
            for operation in entity.operations.iter().filter(|o| self.includes_operation(o)) {
                let name = self.to_tool_name(&entity.identity, &operation.name);
                if !seen.insert(name.clone()) {
                    continue;
                }
                definitions.push(ToolDefinition {
                    name,
                    description: schema::operation_description(entity, operation),
                    input_schema: schema::operation_input_schema(operation),
                });
            }
        }
        definitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_identity() {
        let id = ObjectIdentity::parse("java.lang:type=Memory").unwrap();
        assert_eq!(render_identity(&id), "java.lang_type_Memory");

        let id = ObjectIdentity::parse("app:name=\"my pool\",type=Cache").unwrap();
        assert_eq!(render_identity(&id), "app_name_my_pool_type_Cache");
    }

    #[test]
    fn test_sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize("a/b?c#d"), "a_b_c_d");
        assert_eq!(sanitize("x-y.z_1"), "x-y.z_1");
    }
}
