//! Module validation framework
//!
//! Checks definition identity (name, version) and dependency declarations.

pub mod definition_validator;

pub use definition_validator::{DefinitionValidator, ValidationResult};
