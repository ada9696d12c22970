//! Request validation and operation auditing.

pub mod audit;
pub mod validator;

pub use audit::{AuditEntry, OperationAuditLog, OperationOutcome};
pub use validator::{SecurityValidator, ValidationResult};
