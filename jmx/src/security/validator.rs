//! Input validation for externally triggered MBean access.
//!
//! Malicious content is a hard rejection. Sensitive domains and dangerous
//! operation names are only flagged; blocking them is left to the caller.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::{
    core::config::SecurityConfig,
    error::{JmxError, JmxResult},
    identity::ObjectIdentity,
};

const MALICIOUS_PATTERNS: &[&str] = &[
    "<script",
    "javascript:",
    "vbscript:",
    "onload=",
    "onerror=",
    "eval(",
    "exec(",
    "system(",
    "runtime.exec",
    "../",
    "..\\",
    "/etc/",
    "c:\\",
    "cmd.exe",
    "powershell",
    "rm -rf",
    "del /",
    "format c:",
    "shutdown -",
    "drop table",
    "delete from",
    "insert into",
    "update set",
];

const DANGEROUS_OPERATION_PATTERNS: &[&str] = &[
    "shutdown",
    "stop",
    "destroy",
    "kill",
    "exit",
    "halt",
    "restart",
    "reboot",
    "reset",
    "clear",
    "delete",
    "remove",
    "gc",
    "forcegc",
    "runfinalization",
    "dumpheap",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationResult {
    Valid,
    Invalid { reason: String },
}

impl ValidationResult {
    pub fn invalid(reason: impl Into<String>) -> Self {
        ValidationResult::Invalid {
            reason: reason.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid { reason } => Some(reason),
        }
    }

    /// Convert a rejection into [`JmxError::Validation`].
    pub fn into_result(self) -> JmxResult<()> {
        match self {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid { reason } => Err(JmxError::Validation(reason)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecurityValidator {
    validate_parameters: bool,
    dangerous_patterns: Vec<String>,
    sensitive_domains: Vec<String>,
}

impl Default for SecurityValidator {
    fn default() -> Self {
        Self::new(&SecurityConfig::default())
    }
}

impl SecurityValidator {
    pub fn new(config: &SecurityConfig) -> Self {
        let mut dangerous_patterns: Vec<String> = DANGEROUS_OPERATION_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .collect();
        for op in &config.dangerous_operations {
            let op = op.trim().to_lowercase();
            if !op.is_empty() && !dangerous_patterns.contains(&op) {
                dangerous_patterns.push(op);
            }
        }

        Self {
            validate_parameters: config.validate_parameters,
            dangerous_patterns,
            sensitive_domains: config.sensitive_domains.clone(),
        }
    }

    /// Parse and check an object name supplied from outside.
    pub fn validate_identity(&self, name: &str) -> ValidationResult {
        if name.trim().is_empty() {
            return ValidationResult::invalid("ObjectName cannot be empty");
        }
        match ObjectIdentity::parse(name) {
            Ok(identity) => self.validate_object_identity(&identity),
            Err(e) => ValidationResult::invalid(e.to_string()),
        }
    }

    pub fn validate_object_identity(&self, identity: &ObjectIdentity) -> ValidationResult {
        if self.is_sensitive_domain(identity.domain()) {
            warn!("Access to potentially dangerous domain: {}", identity.domain());
        }
        if contains_malicious_pattern(&identity.to_string()) {
            return ValidationResult::invalid("ObjectName contains potentially malicious patterns");
        }
        ValidationResult::Valid
    }

    pub fn is_sensitive_domain(&self, domain: &str) -> bool {
        self.sensitive_domains.iter().any(|d| d == domain)
    }

    /// Case-insensitive substring match against the dangerous vocabulary.
    pub fn is_dangerous_operation(&self, operation: &str) -> bool {
        let lower = operation.to_lowercase();
        self.dangerous_patterns.iter().any(|p| lower.contains(p.as_str()))
    }

    pub fn validate_operation_name(&self, operation: &str) -> ValidationResult {
        if operation.trim().is_empty() {
            return ValidationResult::invalid("Operation name cannot be null or empty");
        }
        if self.is_dangerous_operation(operation) {
            warn!("Executing dangerous operation: {}", operation);
        }
        if contains_malicious_pattern(operation) {
            return ValidationResult::invalid("Operation name contains potentially malicious patterns");
        }
        ValidationResult::Valid
    }

    /// Check every string leaf of a JSON payload. Blank payloads are valid.
    pub fn validate_arguments(&self, payload: &str) -> ValidationResult {
        if payload.trim().is_empty() {
            return ValidationResult::Valid;
        }
        match serde_json::from_str::<Value>(payload) {
            Ok(value) => self.validate_argument_value(&value),
            Err(e) => ValidationResult::invalid(format!("Invalid JSON arguments: {}", e)),
        }
    }

    pub fn validate_argument_value(&self, value: &Value) -> ValidationResult {
        match find_malicious_leaf(value, String::new()) {
            Some(path) => ValidationResult::invalid(format!(
                "Argument at path '{}' contains potentially malicious content",
                path
            )),
            None => ValidationResult::Valid,
        }
    }

    /// Identity, operation name and (when enabled) arguments, in that order.
    pub fn validate_operation(
        &self,
        identity: &ObjectIdentity,
        operation: &str,
        arguments: &str,
    ) -> ValidationResult {
        let result = self.validate_object_identity(identity);
        if !result.is_valid() {
            return result;
        }
        let result = self.validate_operation_name(operation);
        if !result.is_valid() {
            return result;
        }
        if self.validate_parameters {
            return self.validate_arguments(arguments);
        }
        ValidationResult::Valid
    }

    /// Textual scrub for display. Not a substitute for validation.
    pub fn sanitize(&self, value: &str) -> String {
        value
            .chars()
            .filter(|c| !matches!(c, '<' | '>' | '"' | '\'' | '&'))
            .map(|c| if matches!(c, '\r' | '\n' | '\t') { ' ' } else { c })
            .collect::<String>()
            .trim()
            .to_string()
    }
}

fn contains_malicious_pattern(value: &str) -> bool {
    let lower = value.to_lowercase();
    match MALICIOUS_PATTERNS.iter().find(|p| lower.contains(*p)) {
        Some(pattern) => {
            warn!(
                "Detected potentially malicious pattern '{}' in value: {}",
                pattern, value
            );
            true
        }
        None => false,
    }
}

/// Path of the first string leaf carrying a malicious pattern.
fn find_malicious_leaf(value: &Value, path: String) -> Option<String> {
    match value {
        Value::String(s) => contains_malicious_pattern(s).then_some(path),
        Value::Object(map) => map.iter().find_map(|(key, child)| {
            let child_path = if path.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", path, key)
            };
            find_malicious_leaf(child, child_path)
        }),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, child)| find_malicious_leaf(child, format!("{}[{}]", path, i))),
        _ => None,
    }
}
