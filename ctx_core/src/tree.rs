//! # Tree Index
//!
//! Nested-interval placement for the region hierarchy.
//!
//! Every node carries a `tree_id` and a `left`/`right` bound pair. Node A is
//! an ancestor-or-self of node B iff both live in the same tree and A's
//! interval contains B's, so ancestry is a constant-time comparison instead
//! of a walk up the parent chain.
//!
//! Placements are never patched in place: every structural edit re-derives
//! all of them with one depth-first numbering pass. Roots and siblings are
//! numbered in name order, so the same hierarchy always yields the same
//! placements.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use errors::HierarchyError;
use tracing::trace;

use crate::types::ScopeRef;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub tree_id: u32,
    pub left: u32,
    pub right: u32
}

impl Placement {
    /// Whether the node at `self` is an ancestor-or-self of the node at
    /// `other`.
    pub fn contains(&self, other: &Placement) -> bool {
        self.tree_id == other.tree_id && self.left <= other.left && self.right >= other.right
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: ScopeRef,
    pub name: String,
    pub parent: Option<ScopeRef>,
    pub placement: Placement
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeIndex {
    nodes: HashMap<ScopeRef, TreeNode>
}

impl TreeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from unplaced `(id, name, parent)` triples in any
    /// order.
    pub fn from_nodes<I>(nodes: I) -> Result<Self, HierarchyError>
    where
        I: IntoIterator<Item = (ScopeRef, String, Option<ScopeRef>)>
    {
        let mut index = Self::new();
        for (id, name, parent) in nodes {
            if index.nodes.contains_key(&id) {
                return Err(HierarchyError::DuplicateNode { id: id.into_inner() });
            }
            index.nodes.insert(
                id.clone(),
                TreeNode {
                    id,
                    name,
                    parent,
                    placement: Placement::default()
                }
            );
        }

        for node in index.nodes.values() {
            if let Some(parent) = &node.parent {
                if !index.nodes.contains_key(parent) {
                    return Err(HierarchyError::UnknownNode {
                        id: parent.to_string()
                    });
                }
            }
        }
        index.check_acyclic()?;
        index.renumber();
        Ok(index)
    }

    /// Rebuild an index from nodes whose placements were computed earlier,
    /// e.g. loaded from a store. Placements are trusted as-is.
    pub fn from_placed_nodes<I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = TreeNode>
    {
        Self {
            nodes: nodes.into_iter().map(|n| (n.id.clone(), n)).collect()
        }
    }

    pub fn insert(
        &mut self,
        id: impl Into<ScopeRef>,
        name: impl Into<String>,
        parent: Option<ScopeRef>
    ) -> Result<(), HierarchyError> {
        let id = id.into();
        if self.nodes.contains_key(&id) {
            return Err(HierarchyError::DuplicateNode { id: id.into_inner() });
        }
        if let Some(parent) = &parent {
            if !self.nodes.contains_key(parent) {
                return Err(HierarchyError::UnknownNode {
                    id: parent.to_string()
                });
            }
        }

        self.nodes.insert(
            id.clone(),
            TreeNode {
                id,
                name: name.into(),
                parent,
                placement: Placement::default()
            }
        );
        self.renumber();
        Ok(())
    }

    /// Re-parent `id`. Moving a node under itself or one of its descendants
    /// is rejected.
    pub fn move_node(
        &mut self,
        id: &ScopeRef,
        new_parent: Option<ScopeRef>
    ) -> Result<(), HierarchyError> {
        if !self.nodes.contains_key(id) {
            return Err(HierarchyError::UnknownNode { id: id.to_string() });
        }
        if let Some(parent) = &new_parent {
            if !self.nodes.contains_key(parent) {
                return Err(HierarchyError::UnknownNode {
                    id: parent.to_string()
                });
            }
            if self.is_ancestor_or_self(id, parent) {
                return Err(HierarchyError::HierarchyCycle {
                    id: id.to_string(),
                    parent: parent.to_string()
                });
            }
        }

        if let Some(node) = self.nodes.get_mut(id) {
            node.parent = new_parent;
        }
        self.renumber();
        Ok(())
    }

    pub fn rename(&mut self, id: &ScopeRef, name: impl Into<String>) -> Result<(), HierarchyError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| HierarchyError::UnknownNode { id: id.to_string() })?;
        node.name = name.into();
        self.renumber();
        Ok(())
    }

    /// Remove a leaf node.
    pub fn remove(&mut self, id: &ScopeRef) -> Result<TreeNode, HierarchyError> {
        if !self.nodes.contains_key(id) {
            return Err(HierarchyError::UnknownNode { id: id.to_string() });
        }
        let children = self.children(id).len();
        if children > 0 {
            return Err(HierarchyError::NodeHasChildren {
                id: id.to_string(),
                children
            });
        }

        let removed = self
            .nodes
            .remove(id)
            .ok_or_else(|| HierarchyError::UnknownNode { id: id.to_string() })?;
        self.renumber();
        Ok(removed)
    }

    pub fn get(&self, id: &ScopeRef) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    pub fn placement(&self, id: &ScopeRef) -> Option<Placement> {
        self.nodes.get(id).map(|n| n.placement)
    }

    /// Unknown nodes are never ancestors of anything.
    pub fn is_ancestor_or_self(&self, ancestor: &ScopeRef, node: &ScopeRef) -> bool {
        match (self.placement(ancestor), self.placement(node)) {
            (Some(a), Some(b)) => a.contains(&b),
            _ => false
        }
    }

    /// Ancestors of `id` including itself, root first.
    pub fn ancestors_or_self(&self, id: &ScopeRef) -> Vec<&TreeNode> {
        let Some(target) = self.placement(id) else {
            return Vec::new();
        };
        let mut found: Vec<&TreeNode> = self
            .nodes
            .values()
            .filter(|n| n.placement.contains(&target))
            .collect();
        found.sort_by_key(|n| n.placement.left);
        found
    }

    /// Descendants of `id` including itself, in depth-first order.
    pub fn descendants_or_self(&self, id: &ScopeRef) -> Vec<&TreeNode> {
        let Some(root) = self.placement(id) else {
            return Vec::new();
        };
        let mut found: Vec<&TreeNode> = self
            .nodes
            .values()
            .filter(|n| root.contains(&n.placement))
            .collect();
        found.sort_by_key(|n| n.placement.left);
        found
    }

    pub fn children(&self, id: &ScopeRef) -> Vec<&TreeNode> {
        let mut children: Vec<&TreeNode> = self
            .nodes
            .values()
            .filter(|n| n.parent.as_ref() == Some(id))
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        children
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn check_acyclic(&self) -> Result<(), HierarchyError> {
        for node in self.nodes.values() {
            let mut current = node.parent.as_ref();
            let mut steps = 0;
            while let Some(parent) = current {
                steps += 1;
                if steps > self.nodes.len() {
                    return Err(HierarchyError::HierarchyCycle {
                        id: node.id.to_string(),
                        parent: parent.to_string()
                    });
                }
                current = self.nodes.get(parent).and_then(|p| p.parent.as_ref());
            }
        }
        Ok(())
    }

    /// One depth-first pass over every tree, roots in name order.
    fn renumber(&mut self) {
        let mut children: BTreeMap<Option<ScopeRef>, Vec<(String, ScopeRef)>> = BTreeMap::new();
        for node in self.nodes.values() {
            children
                .entry(node.parent.clone())
                .or_default()
                .push((node.name.clone(), node.id.clone()));
        }
        for siblings in children.values_mut() {
            siblings.sort();
        }

        let roots = children.get(&None).cloned().unwrap_or_default();
        let mut placements: HashMap<ScopeRef, Placement> = HashMap::with_capacity(self.nodes.len());

        for (offset, (_, root)) in roots.into_iter().enumerate() {
            let tree_id = offset as u32 + 1;
            let mut counter = 1;
            let mut lefts: HashMap<ScopeRef, u32> = HashMap::new();
            let mut stack: Vec<(ScopeRef, bool)> = vec![(root, false)];

            while let Some((id, visited)) = stack.pop() {
                if visited {
                    let left = lefts.get(&id).copied().unwrap_or_default();
                    placements.insert(
                        id,
                        Placement {
                            tree_id,
                            left,
                            right: counter
                        }
                    );
                    counter += 1;
                    continue;
                }

                lefts.insert(id.clone(), counter);
                counter += 1;
                stack.push((id.clone(), true));
                if let Some(kids) = children.get(&Some(id)) {
                    for (_, child) in kids.iter().rev() {
                        stack.push((child.clone(), false));
                    }
                }
            }
        }

        for (id, node) in &mut self.nodes {
            node.placement = placements.get(id).copied().unwrap_or_default();
        }
        trace!("Renumbered {} hierarchy nodes", self.nodes.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TreeIndex {
        TreeIndex::from_nodes(vec![
            ("fra".into(), "Frankfurt".to_string(), Some("de".into())),
            ("emea".into(), "EMEA".to_string(), None),
            ("de".into(), "Germany".to_string(), Some("emea".into())),
            ("ber".into(), "Berlin".to_string(), Some("de".into())),
            ("amer".into(), "Americas".to_string(), None),
        ])
        .unwrap()
    }

    fn r(id: &str) -> ScopeRef {
        ScopeRef::from(id)
    }

    #[test]
    fn test_placements_are_nested_intervals() {
        let tree = sample();
        assert_eq!(
            tree.placement(&r("amer")),
            Some(Placement {
                tree_id: 1,
                left: 1,
                right: 2
            })
        );
        assert_eq!(
            tree.placement(&r("emea")),
            Some(Placement {
                tree_id: 2,
                left: 1,
                right: 8
            })
        );
        // Berlin sorts before Frankfurt among Germany's children.
        assert_eq!(tree.placement(&r("ber")).unwrap().left, 3);
        assert_eq!(tree.placement(&r("fra")).unwrap().left, 5);
    }

    #[test]
    fn test_ancestor_or_self() {
        let tree = sample();
        assert!(tree.is_ancestor_or_self(&r("emea"), &r("fra")));
        assert!(tree.is_ancestor_or_self(&r("de"), &r("fra")));
        assert!(tree.is_ancestor_or_self(&r("fra"), &r("fra")));
        assert!(!tree.is_ancestor_or_self(&r("fra"), &r("de")));
        assert!(!tree.is_ancestor_or_self(&r("ber"), &r("fra")));
        assert!(!tree.is_ancestor_or_self(&r("amer"), &r("fra")));
        assert!(!tree.is_ancestor_or_self(&r("missing"), &r("fra")));
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let tree = sample();
        let ancestors: Vec<&str> = tree
            .ancestors_or_self(&r("fra"))
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(ancestors, vec!["emea", "de", "fra"]);

        let descendants: Vec<&str> = tree
            .descendants_or_self(&r("de"))
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(descendants, vec!["de", "ber", "fra"]);
    }

    #[test]
    fn test_move_renumbers_and_rejects_cycles() {
        let mut tree = sample();
        tree.move_node(&r("de"), Some(r("amer"))).unwrap();
        assert!(tree.is_ancestor_or_self(&r("amer"), &r("fra")));
        assert!(!tree.is_ancestor_or_self(&r("emea"), &r("fra")));

        let err = tree.move_node(&r("de"), Some(r("fra"))).unwrap_err();
        assert!(matches!(err, HierarchyError::HierarchyCycle { .. }));

        let err = tree.move_node(&r("de"), Some(r("de"))).unwrap_err();
        assert!(matches!(err, HierarchyError::HierarchyCycle { .. }));
    }

    #[test]
    fn test_remove_requires_leaf() {
        let mut tree = sample();
        let err = tree.remove(&r("de")).unwrap_err();
        assert_eq!(
            err,
            HierarchyError::NodeHasChildren {
                id: "de".to_string(),
                children: 2
            }
        );

        tree.remove(&r("fra")).unwrap();
        tree.remove(&r("ber")).unwrap();
        tree.remove(&r("de")).unwrap();
        assert_eq!(tree.placement(&r("emea")).unwrap().right, 2);
    }

    #[test]
    fn test_insert_validates_parent_and_duplicates() {
        let mut tree = sample();
        assert!(matches!(
            tree.insert("muc", "Munich", Some(r("bavaria"))),
            Err(HierarchyError::UnknownNode { .. })
        ));
        assert!(matches!(
            tree.insert("de", "Germany", None),
            Err(HierarchyError::DuplicateNode { .. })
        ));

        tree.insert("muc", "Munich", Some(r("de"))).unwrap();
        assert!(tree.is_ancestor_or_self(&r("emea"), &r("muc")));
    }

    #[test]
    fn test_from_nodes_detects_cycles() {
        let result = TreeIndex::from_nodes(vec![
            ("a".into(), "A".to_string(), Some("b".into())),
            ("b".into(), "B".to_string(), Some("a".into())),
        ]);
        assert!(matches!(result, Err(HierarchyError::HierarchyCycle { .. })));
    }

    #[test]
    fn test_rename_reorders_siblings() {
        let mut tree = sample();
        tree.rename(&r("ber"), "Zossen").unwrap();
        assert_eq!(tree.placement(&r("fra")).unwrap().left, 3);
        assert_eq!(tree.placement(&r("ber")).unwrap().left, 5);
    }
}
