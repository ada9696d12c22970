//! Managed entity metadata as reported by the upstream MBean server.

use serde::{Deserialize, Serialize};

use crate::identity::ObjectIdentity;

/// Side-effect classification of an MBean operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationImpact {
    Info,
    Action,
    ActionInfo,
    #[default]
    Unknown,
}

impl OperationImpact {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationImpact::Info => "INFO",
            OperationImpact::Action => "ACTION",
            OperationImpact::ActionInfo => "ACTION_INFO",
            OperationImpact::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub name: String,
    /// Type tag, e.g. `long`, `java.lang.String`, `[Ljava.lang.String;`.
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub description: String,
    pub readable: bool,
    pub writable: bool,
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            description: String::new(),
            readable: true,
            writable: false,
        }
    }

    pub fn read_write(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            writable: true,
            ..Self::new(name, type_name)
        }
    }

    pub fn write_only(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            readable: false,
            writable: true,
            ..Self::new(name, type_name)
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn access_label(&self) -> &'static str {
        match (self.readable, self.writable) {
            (true, true) => "Read/Write",
            (true, false) => "Read-only",
            (false, true) => "Write-only",
            (false, false) => "None",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub description: String,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub name: String,
    pub return_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
    #[serde(default)]
    pub impact: OperationImpact,
}

impl OperationDescriptor {
    pub fn new(name: impl Into<String>, return_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            return_type: return_type.into(),
            description: String::new(),
            parameters: Vec::new(),
            impact: OperationImpact::Unknown,
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    #[must_use]
    pub fn with_impact(mut self, impact: OperationImpact) -> Self {
        self.impact = impact;
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Parameter type tags in declaration order, as needed for invocation.
    pub fn signature(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.type_name.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub types: Vec<String>,
}

/// Full metadata for one MBean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedEntity {
    pub identity: ObjectIdentity,
    pub class_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub attributes: Vec<AttributeDescriptor>,
    #[serde(default)]
    pub operations: Vec<OperationDescriptor>,
    #[serde(default)]
    pub notifications: Vec<NotificationDescriptor>,
}

impl ManagedEntity {
    pub fn new(identity: ObjectIdentity, class_name: impl Into<String>) -> Self {
        Self {
            identity,
            class_name: class_name.into(),
            description: String::new(),
            attributes: Vec::new(),
            operations: Vec::new(),
            notifications: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(attribute);
        self
    }

    #[must_use]
    pub fn with_operation(mut self, operation: OperationDescriptor) -> Self {
        self.operations.push(operation);
        self
    }

    #[must_use]
    pub fn with_notification(mut self, notification: NotificationDescriptor) -> Self {
        self.notifications.push(notification);
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// First operation with this name. Overloads are resolved by declaration order.
    pub fn operation(&self, name: &str) -> Option<&OperationDescriptor> {
        self.operations.iter().find(|o| o.name == name)
    }

    pub fn domain(&self) -> &str {
        self.identity.domain()
    }
}
