//! Write path for scoped documents, schema contracts and local overrides.
//!
//! Every write-time contract is enforced here before anything reaches the
//! store: payload shape, contract existence, schema conformance, owner
//! resolvability and null-aware `(name, owner)` uniqueness.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use ctx_core::{
    ContextTarget, DocumentDraft, DocumentId, DocumentStore, LocalOverride, SchemaContract,
    SchemaId, ScopedDocument, describe_owner, into_object
};
use errors::{DocumentError, PayloadField};

use crate::owners::OwnerRegistry;
use crate::schema::{SchemaValidator, ValidationResult};
use crate::telemetry::Telemetry;

pub struct DocumentManager {
    pub(crate) store: Arc<dyn DocumentStore>,
    validator: Arc<SchemaValidator>,
    owners: OwnerRegistry,
    pub(crate) telemetry: Telemetry
}

impl DocumentManager {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        validator: Arc<SchemaValidator>,
        owners: OwnerRegistry
    ) -> Self {
        Self {
            store,
            validator,
            owners,
            telemetry: Telemetry::default()
        }
    }

    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn validator(&self) -> &SchemaValidator {
        &self.validator
    }

    pub fn owners(&self) -> &OwnerRegistry {
        &self.owners
    }

    pub async fn create_schema(
        &self,
        name: &str,
        description: &str,
        schema: Value
    ) -> Result<SchemaContract, DocumentError> {
        let result: Result<_, DocumentError> = async {
            SchemaValidator::check_definition(name, &schema)?;
            if self.store.find_schema_by_name(name).await?.is_some() {
                return Err(DocumentError::DuplicateSchemaName {
                    name: name.to_string()
                });
            }

            let mut contract = SchemaContract::new(name, schema);
            contract.description = description.to_string();
            self.store.insert_schema(&contract).await?;
            info!("Created schema contract {} ({})", contract.name, contract.id);
            Ok(contract)
        }
        .await;
        result.inspect_err(|e| self.rejected("create_schema", e))
    }

    /// Replace the body, name or description of an existing contract.
    pub async fn update_schema(
        &self,
        contract: SchemaContract
    ) -> Result<SchemaContract, DocumentError> {
        let result: Result<_, DocumentError> = async {
            let existing = self.require_schema(contract.id).await?;
            SchemaValidator::check_definition(&contract.name, &contract.schema)?;
            if existing.name != contract.name {
                if self
                    .store
                    .find_schema_by_name(&contract.name)
                    .await?
                    .is_some()
                {
                    return Err(DocumentError::DuplicateSchemaName {
                        name: contract.name.clone()
                    });
                }
            }

            self.store.update_schema(&contract).await?;
            self.validator.invalidate(contract.id);
            info!("Updated schema contract {} ({})", contract.name, contract.id);
            Ok(contract)
        }
        .await;
        result.inspect_err(|e| self.rejected("update_schema", e))
    }

    pub async fn delete_schema(&self, id: SchemaId) -> Result<(), DocumentError> {
        let result: Result<_, DocumentError> = async {
            let contract = self.require_schema(id).await?;
            let documents = self.store.count_documents_with_schema(id).await?;
            if documents > 0 {
                return Err(DocumentError::SchemaInUse {
                    name: contract.name,
                    documents
                });
            }

            self.store.delete_schema(id).await?;
            self.validator.invalidate(id);
            info!("Deleted schema contract {} ({})", contract.name, id);
            Ok(())
        }
        .await;
        result.inspect_err(|e| self.rejected("delete_schema", e))
    }

    pub async fn create_document(
        &self,
        draft: DocumentDraft
    ) -> Result<ScopedDocument, DocumentError> {
        let result: Result<_, DocumentError> = async {
            let document = draft.into_document(DocumentId::new())?;
            self.check_document(&document).await?;
            self.store.insert_document(&document).await?;
            info!(
                "Created document {} ({}) owned by {}",
                document.name,
                document.id,
                describe_owner(document.owner.as_ref())
            );
            Ok(document)
        }
        .await;
        result.inspect_err(|e| self.rejected("create_document", e))
    }

    pub async fn update_document(
        &self,
        id: DocumentId,
        draft: DocumentDraft
    ) -> Result<ScopedDocument, DocumentError> {
        let result: Result<_, DocumentError> = async {
            if self.store.get_document(id).await?.is_none() {
                return Err(DocumentError::DocumentNotFound { id: id.to_string() });
            }
            let document = draft.into_document(id)?;
            self.check_document(&document).await?;
            self.store.update_document(&document).await?;
            info!("Updated document {} ({})", document.name, document.id);
            Ok(document)
        }
        .await;
        result.inspect_err(|e| self.rejected("update_document", e))
    }

    pub async fn delete_document(&self, id: DocumentId) -> Result<(), DocumentError> {
        let result: Result<_, DocumentError> = async {
            if !self.store.delete_document(id).await? {
                return Err(DocumentError::DocumentNotFound { id: id.to_string() });
            }
            info!("Deleted document {}", id);
            Ok(())
        }
        .await;
        result.inspect_err(|e| self.rejected("delete_document", e))
    }

    /// Validate and set (or clear, when both are `None`) a target's local
    /// override.
    pub async fn set_local_override<T>(
        &self,
        target: &mut T,
        data: Option<Value>,
        schema: Option<SchemaId>
    ) -> Result<(), DocumentError>
    where
        T: ContextTarget + ?Sized
    {
        let result: Result<_, DocumentError> = async {
            let Some(data) = data else {
                if schema.is_some() {
                    return Err(DocumentError::OrphanedOverrideSchema);
                }
                return Ok(None);
            };

            let data = into_object(data, PayloadField::LocalOverrideData)?;
            let contract = match schema {
                Some(id) => Some(self.require_schema(id).await?),
                None => None
            };
            self.validator.validate_field(
                &data,
                contract.as_ref(),
                PayloadField::LocalOverrideData
            )?;
            Ok(Some(LocalOverride { data, schema }))
        }
        .await;

        match result {
            Ok(local_override) => {
                info!(
                    "{} local override of {} {}",
                    if local_override.is_some() { "Set" } else { "Cleared" },
                    target.kind(),
                    target.target_id()
                );
                target.set_local_override(local_override);
                Ok(())
            }
            Err(e) => {
                self.rejected("set_local_override", &e);
                Err(e)
            }
        }
    }

    /// Validate `payload` against the contract `schema` without writing
    /// anything.
    pub async fn validate_document(
        &self,
        payload: &Value,
        schema: Option<SchemaId>
    ) -> Result<ValidationResult, DocumentError> {
        let Value::Object(payload) = payload else {
            return Err(DocumentError::InvalidPayloadShape {
                field: PayloadField::Data
            });
        };
        let contract = match schema {
            Some(id) => Some(self.require_schema(id).await?),
            None => None
        };
        self.validator.validate(payload, contract.as_ref())
    }

    async fn require_schema(&self, id: SchemaId) -> Result<SchemaContract, DocumentError> {
        self.store
            .get_schema(id)
            .await?
            .ok_or_else(|| DocumentError::MissingSchemaContract {
                schema_id: id.to_string()
            })
    }

    async fn check_document(&self, document: &ScopedDocument) -> Result<(), DocumentError> {
        if let Some(id) = document.schema {
            let contract = self.require_schema(id).await?;
            self.validator
                .validate_field(&document.data, Some(&contract), PayloadField::Data)?;
        }

        if let Some(owner) = &document.owner {
            self.owners.ensure_resolvable(owner).await?;
        }

        let existing = self
            .store
            .find_document_by_identity(&document.name, document.owner.as_ref())
            .await?;
        if existing.is_some_and(|other| other.id != document.id) {
            return Err(DocumentError::DuplicateDocumentIdentity {
                name: document.name.clone(),
                owner: describe_owner(document.owner.as_ref())
            });
        }
        Ok(())
    }

    fn rejected(&self, operation: &str, err: &DocumentError) {
        warn!("Rejected {}: {}", operation, err);
        self.telemetry
            .record_rejected_write(operation, rejection_reason(err));
    }
}

fn rejection_reason(err: &DocumentError) -> &'static str {
    match err {
        DocumentError::InvalidPayloadShape { .. } => "invalid_payload_shape",
        DocumentError::SchemaValidationFailure { .. } => "schema_validation_failure",
        DocumentError::InvalidSchemaDefinition { .. } => "invalid_schema_definition",
        DocumentError::DuplicateDocumentIdentity { .. } => "duplicate_document_identity",
        DocumentError::DuplicateSchemaName { .. } => "duplicate_schema_name",
        DocumentError::UnresolvableOwner { .. } => "unresolvable_owner",
        DocumentError::MissingSchemaContract { .. } => "missing_schema_contract",
        DocumentError::SchemaInUse { .. } => "schema_in_use",
        DocumentError::DocumentNotFound { .. } => "document_not_found",
        DocumentError::OrphanedOverrideSchema => "orphaned_override_schema",
        DocumentError::Storage(_) => "storage"
    }
}
