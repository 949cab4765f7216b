//! Draft-07 validation of document and override payloads.
//!
//! Compiled validators are cached per contract inside the [`SchemaValidator`]
//! instance, keyed by contract id and checked against the fingerprint of the
//! schema body so an edited contract is never validated with a stale
//! compilation.

use std::sync::Arc;

use dashmap::DashMap;
use jsonschema::{Draft, Validator};
use serde_json::Value;
use tracing::trace;

use ctx_core::{JsonObject, SchemaContract, SchemaId};
use errors::{DocumentError, PayloadField, Violation};

/// Outcome of validating one payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationResult {
    pub violations: Vec<Violation>
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Wrap the violations into a `SchemaValidationFailure` for `field`.
    pub fn into_result(self, field: PayloadField, schema: &str) -> Result<(), DocumentError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(DocumentError::SchemaValidationFailure {
                field,
                schema: schema.to_string(),
                violations: self.violations
            })
        }
    }
}

struct CompiledSchema {
    fingerprint: String,
    validator: Arc<Validator>
}

#[derive(Default)]
pub struct SchemaValidator {
    compiled: DashMap<SchemaId, CompiledSchema>
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that `schema` is a usable contract body: it must compile as
    /// Draft-07 and declare a top-level object with at least one property.
    pub fn check_definition(name: &str, schema: &Value) -> Result<(), DocumentError> {
        let invalid = |reason: String| DocumentError::InvalidSchemaDefinition {
            name: name.to_string(),
            reason
        };

        let Some(body) = schema.as_object() else {
            return Err(invalid("schema must be a JSON object".to_string()));
        };
        if body.get("type").and_then(Value::as_str) != Some("object") {
            return Err(invalid("top-level type must be \"object\"".to_string()));
        }
        let has_properties = body
            .get("properties")
            .and_then(Value::as_object)
            .is_some_and(|properties| !properties.is_empty());
        if !has_properties {
            return Err(invalid(
                "top-level properties must be a non-empty object".to_string()
            ));
        }

        compile(schema).map(|_| ()).map_err(invalid)
    }

    /// Validate `payload` against `contract`, collecting every violation.
    /// No contract means the payload is valid.
    pub fn validate(
        &self,
        payload: &JsonObject,
        contract: Option<&SchemaContract>
    ) -> Result<ValidationResult, DocumentError> {
        let Some(contract) = contract else {
            return Ok(ValidationResult::valid());
        };

        let validator = self.compiled_for(contract)?;
        let instance = Value::Object(payload.clone());
        let violations = validator
            .iter_errors(&instance)
            .map(|e| Violation {
                instance_path: e.instance_path.to_string(),
                message: e.to_string()
            })
            .collect();

        Ok(ValidationResult { violations })
    }

    /// Validate `payload` and raise `SchemaValidationFailure` tagged with
    /// `field` when it does not conform.
    pub fn validate_field(
        &self,
        payload: &JsonObject,
        contract: Option<&SchemaContract>,
        field: PayloadField
    ) -> Result<(), DocumentError> {
        let result = self.validate(payload, contract)?;
        match contract {
            Some(contract) => result.into_result(field, &contract.name),
            None => Ok(())
        }
    }

    /// Drop the compiled validator of a contract.
    pub fn invalidate(&self, id: SchemaId) {
        if self.compiled.remove(&id).is_some() {
            trace!("Invalidated compiled schema {}", id);
        }
    }

    pub fn cached_len(&self) -> usize {
        self.compiled.len()
    }

    fn compiled_for(&self, contract: &SchemaContract) -> Result<Arc<Validator>, DocumentError> {
        let fingerprint = contract.fingerprint();
        if let Some(entry) = self.compiled.get(&contract.id) {
            if entry.fingerprint == fingerprint {
                return Ok(entry.validator.clone());
            }
        }

        let validator = compile(&contract.schema)
            .map(Arc::new)
            .map_err(|reason| DocumentError::InvalidSchemaDefinition {
                name: contract.name.clone(),
                reason
            })?;
        trace!("Compiled schema {} ({})", contract.name, contract.id);
        self.compiled.insert(
            contract.id,
            CompiledSchema {
                fingerprint,
                validator: validator.clone()
            }
        );
        Ok(validator)
    }
}

fn compile(schema: &Value) -> Result<Validator, String> {
    jsonschema::options()
        .with_draft(Draft::Draft7)
        .build(schema)
        .map_err(|e| e.to_string())
}
