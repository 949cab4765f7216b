//! Synchronisation of owner-managed documents.
//!
//! An owner (a git repository or a job) declares the full set of documents
//! it manages. Documents it no longer declares are deleted; documents of
//! other owners and user-managed documents are never touched.

use std::collections::BTreeSet;

use tracing::{debug, info};

use ctx_core::{DocumentDraft, OwnerRef};
use errors::DocumentError;

use crate::manager::DocumentManager;
use crate::types::SyncReport;

impl DocumentManager {
    /// Delete every document owned by `owner` whose name is not in
    /// `desired_names`. Returns the deleted names, sorted.
    pub async fn reconcile_owned_documents<S>(
        &self,
        owner: &OwnerRef,
        desired_names: &[S]
    ) -> Result<Vec<String>, DocumentError>
    where
        S: AsRef<str>
    {
        let desired: BTreeSet<&str> = desired_names.iter().map(|name| name.as_ref()).collect();
        let owned = self.store.list_owned_documents(owner).await?;
        debug!(
            "Reconciling {} owned document(s) of {} against {} desired name(s)",
            owned.len(),
            owner,
            desired.len()
        );

        let mut deleted = Vec::new();
        for document in owned {
            if desired.contains(document.name.as_str()) {
                continue;
            }
            if self.store.delete_document(document.id).await? {
                info!(
                    "Reconciliation deleted {} ({}) owned by {}",
                    document.name, document.id, owner
                );
                deleted.push(document.name);
            }
        }

        deleted.sort();
        self.telemetry
            .record_reconcile_deleted(&owner.kind.to_string(), deleted.len());
        Ok(deleted)
    }

    /// Upsert every desired document under `owner`, then delete the owned
    /// documents that were not desired.
    ///
    /// Drafts are forced onto `owner`; identical documents are left
    /// untouched.
    pub async fn sync_owned_documents(
        &self,
        owner: &OwnerRef,
        desired: Vec<DocumentDraft>
    ) -> Result<SyncReport, DocumentError> {
        let mut report = SyncReport::default();
        let mut names = Vec::with_capacity(desired.len());

        for mut draft in desired {
            draft.owner = Some(owner.clone());
            names.push(draft.name.clone());

            let existing = self
                .store
                .find_document_by_identity(&draft.name, Some(owner))
                .await?;
            match existing {
                None => {
                    let created = self.create_document(draft).await?;
                    report.created.push(created.name);
                }
                Some(existing) => {
                    let candidate = draft.clone().into_document(existing.id)?;
                    if existing.same_content(&candidate) {
                        report.unchanged.push(existing.name);
                    } else {
                        let updated = self.update_document(existing.id, draft).await?;
                        report.updated.push(updated.name);
                    }
                }
            }
        }

        report.deleted = self.reconcile_owned_documents(owner, &names).await?;
        info!(
            "Synced {}: {} created, {} updated, {} unchanged, {} deleted",
            owner,
            report.created.len(),
            report.updated.len(),
            report.unchanged.len(),
            report.deleted.len()
        );
        Ok(report)
    }
}
