//! Edits of the region hierarchy.
//!
//! Each edit loads the tree, applies the change to the [`TreeIndex`] (which
//! re-derives every placement) and writes all placements back. Edits are
//! serialised so two concurrent edits never write back from the same stale
//! snapshot.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use ctx_core::{HierarchyStore, ScopeRef, TreeIndex, TreeNode};
use errors::HierarchyUpdateError;

pub struct HierarchyManager {
    store: Arc<dyn HierarchyStore>,
    edit_lock: Mutex<()>
}

impl HierarchyManager {
    pub fn new(store: Arc<dyn HierarchyStore>) -> Self {
        Self {
            store,
            edit_lock: Mutex::new(())
        }
    }

    pub async fn tree(&self) -> Result<TreeIndex, HierarchyUpdateError> {
        Ok(self.store.load_tree().await?)
    }

    pub async fn add_region(
        &self,
        id: impl Into<ScopeRef>,
        name: impl Into<String>,
        parent: Option<ScopeRef>
    ) -> Result<(), HierarchyUpdateError> {
        let id = id.into();
        self.edit(|tree| tree.insert(id.clone(), name, parent)).await?;
        info!("Added region {}", id);
        Ok(())
    }

    pub async fn move_region(
        &self,
        id: &ScopeRef,
        new_parent: Option<ScopeRef>
    ) -> Result<(), HierarchyUpdateError> {
        self.edit(|tree| tree.move_node(id, new_parent)).await?;
        info!("Moved region {}", id);
        Ok(())
    }

    pub async fn rename_region(
        &self,
        id: &ScopeRef,
        name: impl Into<String>
    ) -> Result<(), HierarchyUpdateError> {
        self.edit(|tree| tree.rename(id, name)).await?;
        info!("Renamed region {}", id);
        Ok(())
    }

    /// Remove a region without children.
    pub async fn remove_region(&self, id: &ScopeRef) -> Result<TreeNode, HierarchyUpdateError> {
        let removed = self.edit(|tree| tree.remove(id)).await?;
        info!("Removed region {}", id);
        Ok(removed)
    }

    async fn edit<R, F>(&self, apply: F) -> Result<R, HierarchyUpdateError>
    where
        F: FnOnce(&mut TreeIndex) -> Result<R, errors::HierarchyError>
    {
        let _guard = self.edit_lock.lock().await;
        let mut tree = self.store.load_tree().await?;
        let outcome = apply(&mut tree)?;
        self.store.replace_tree(&tree).await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use errors::HierarchyError;
    use storage::InMemoryStore;

    fn manager() -> HierarchyManager {
        HierarchyManager::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_add_and_move_regions() {
        let manager = manager();
        manager.add_region("emea", "EMEA", None).await.unwrap();
        manager
            .add_region("de", "Germany", Some("emea".into()))
            .await
            .unwrap();
        manager.add_region("amer", "Americas", None).await.unwrap();

        let tree = manager.tree().await.unwrap();
        assert!(tree.is_ancestor_or_self(&"emea".into(), &"de".into()));

        manager
            .move_region(&"de".into(), Some("amer".into()))
            .await
            .unwrap();
        let tree = manager.tree().await.unwrap();
        assert!(!tree.is_ancestor_or_self(&"emea".into(), &"de".into()));
        assert!(tree.is_ancestor_or_self(&"amer".into(), &"de".into()));
    }

    #[tokio::test]
    async fn test_rejected_edits_leave_tree_unchanged() {
        let manager = manager();
        manager.add_region("emea", "EMEA", None).await.unwrap();
        manager
            .add_region("de", "Germany", Some("emea".into()))
            .await
            .unwrap();
        let before = manager.tree().await.unwrap();

        let err = manager
            .move_region(&"emea".into(), Some("de".into()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HierarchyUpdateError::Hierarchy(HierarchyError::HierarchyCycle { .. })
        ));

        let err = manager.remove_region(&"emea".into()).await.unwrap_err();
        assert!(matches!(
            err,
            HierarchyUpdateError::Hierarchy(HierarchyError::NodeHasChildren { children: 1, .. })
        ));

        let err = manager
            .add_region("x", "X", Some("missing".into()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HierarchyUpdateError::Hierarchy(HierarchyError::UnknownNode { .. })
        ));

        assert_eq!(manager.tree().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_rename_and_remove_leaf() {
        let manager = manager();
        manager.add_region("emea", "EMEA", None).await.unwrap();
        manager
            .rename_region(&"emea".into(), "Europe")
            .await
            .unwrap();
        let removed = manager.remove_region(&"emea".into()).await.unwrap();
        assert_eq!(removed.name, "Europe");
        assert!(manager.tree().await.unwrap().is_empty());
    }
}
