//! # Scope Matching
//!
//! The matching predicate and the document ordering, declared once.
//!
//! Every execution strategy (the in-memory evaluator, the single-target SQL
//! query and the correlated batch SQL query) is derived from the tables in
//! this module: [`Dimension::ALL`] with its [`MatchKind`], and
//! [`ORDER_KEYS`]. Adding a dimension here changes every strategy at once.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use strum::{Display, EnumString};

use crate::tree::TreeIndex;
use crate::types::{ScopeRef, ScopedDocument, TargetId};

/// One axis along which a document can be limited to a subset of targets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Dimension {
    Region,
    Site,
    Role,
    DeviceType,
    Platform,
    ClusterGroup,
    Cluster,
    TenantGroup,
    Tenant,
    Tag
}

/// How a non-empty restriction set is compared with the target's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Target node equals or descends from one of the restricted nodes.
    Ancestor,
    /// Target value is a member of the restriction set.
    Member,
    /// Target value set intersects the restriction set.
    Intersects
}

impl Dimension {
    pub const ALL: [Dimension; 10] = [
        Dimension::Region,
        Dimension::Site,
        Dimension::Role,
        Dimension::DeviceType,
        Dimension::Platform,
        Dimension::ClusterGroup,
        Dimension::Cluster,
        Dimension::TenantGroup,
        Dimension::Tenant,
        Dimension::Tag,
    ];

    pub fn match_kind(self) -> MatchKind {
        match self {
            Dimension::Region => MatchKind::Ancestor,
            Dimension::Tag => MatchKind::Intersects,
            _ => MatchKind::Member
        }
    }
}

/// Restriction sets of a document, one per dimension. Empty means
/// unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeRestrictions {
    #[serde(default)]
    pub regions: BTreeSet<ScopeRef>,
    #[serde(default)]
    pub sites: BTreeSet<ScopeRef>,
    #[serde(default)]
    pub roles: BTreeSet<ScopeRef>,
    #[serde(default)]
    pub device_types: BTreeSet<ScopeRef>,
    #[serde(default)]
    pub platforms: BTreeSet<ScopeRef>,
    #[serde(default)]
    pub cluster_groups: BTreeSet<ScopeRef>,
    #[serde(default)]
    pub clusters: BTreeSet<ScopeRef>,
    #[serde(default)]
    pub tenant_groups: BTreeSet<ScopeRef>,
    #[serde(default)]
    pub tenants: BTreeSet<ScopeRef>,
    #[serde(default)]
    pub tags: BTreeSet<ScopeRef>
}

impl ScopeRestrictions {
    pub fn get(&self, dimension: Dimension) -> &BTreeSet<ScopeRef> {
        match dimension {
            Dimension::Region => &self.regions,
            Dimension::Site => &self.sites,
            Dimension::Role => &self.roles,
            Dimension::DeviceType => &self.device_types,
            Dimension::Platform => &self.platforms,
            Dimension::ClusterGroup => &self.cluster_groups,
            Dimension::Cluster => &self.clusters,
            Dimension::TenantGroup => &self.tenant_groups,
            Dimension::Tenant => &self.tenants,
            Dimension::Tag => &self.tags
        }
    }

    pub fn get_mut(&mut self, dimension: Dimension) -> &mut BTreeSet<ScopeRef> {
        match dimension {
            Dimension::Region => &mut self.regions,
            Dimension::Site => &mut self.sites,
            Dimension::Role => &mut self.roles,
            Dimension::DeviceType => &mut self.device_types,
            Dimension::Platform => &mut self.platforms,
            Dimension::ClusterGroup => &mut self.cluster_groups,
            Dimension::Cluster => &mut self.clusters,
            Dimension::TenantGroup => &mut self.tenant_groups,
            Dimension::Tenant => &mut self.tenants,
            Dimension::Tag => &mut self.tags
        }
    }

    /// Add `values` to the restriction set of `dimension`.
    #[must_use]
    pub fn with<I, V>(mut self, dimension: Dimension, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ScopeRef>
    {
        self.get_mut(dimension)
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn is_unrestricted(&self) -> bool {
        Dimension::ALL.iter().all(|d| self.get(*d).is_empty())
    }

    pub fn restricted_dimensions(&self) -> impl Iterator<Item = Dimension> + '_ {
        Dimension::ALL
            .into_iter()
            .filter(|d| !self.get(*d).is_empty())
    }
}

/// The concrete scope values of one target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeAttributes {
    pub target_id: TargetId,
    pub region: Option<ScopeRef>,
    pub site: Option<ScopeRef>,
    pub role: Option<ScopeRef>,
    pub device_type: Option<ScopeRef>,
    pub platform: Option<ScopeRef>,
    pub cluster_group: Option<ScopeRef>,
    pub cluster: Option<ScopeRef>,
    pub tenant_group: Option<ScopeRef>,
    pub tenant: Option<ScopeRef>,
    #[serde(default)]
    pub tags: BTreeSet<ScopeRef>
}

/// A target's value along one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetValue<'a> {
    Single(Option<&'a ScopeRef>),
    Set(&'a BTreeSet<ScopeRef>)
}

impl ScopeAttributes {
    pub fn new(target_id: impl Into<TargetId>) -> Self {
        Self {
            target_id: target_id.into(),
            ..Default::default()
        }
    }

    pub fn value(&self, dimension: Dimension) -> TargetValue<'_> {
        match dimension {
            Dimension::Region => TargetValue::Single(self.region.as_ref()),
            Dimension::Site => TargetValue::Single(self.site.as_ref()),
            Dimension::Role => TargetValue::Single(self.role.as_ref()),
            Dimension::DeviceType => TargetValue::Single(self.device_type.as_ref()),
            Dimension::Platform => TargetValue::Single(self.platform.as_ref()),
            Dimension::ClusterGroup => TargetValue::Single(self.cluster_group.as_ref()),
            Dimension::Cluster => TargetValue::Single(self.cluster.as_ref()),
            Dimension::TenantGroup => TargetValue::Single(self.tenant_group.as_ref()),
            Dimension::Tenant => TargetValue::Single(self.tenant.as_ref()),
            Dimension::Tag => TargetValue::Set(&self.tags)
        }
    }

    /// Single-valued scope value of `dimension`, `None` for tags.
    pub fn single(&self, dimension: Dimension) -> Option<&ScopeRef> {
        match self.value(dimension) {
            TargetValue::Single(value) => value,
            TargetValue::Set(_) => None
        }
    }
}

/// Whether a target satisfies one restriction set.
pub fn dimension_satisfied(
    dimension: Dimension,
    restriction: &BTreeSet<ScopeRef>,
    target: &ScopeAttributes,
    tree: &TreeIndex
) -> bool {
    if restriction.is_empty() {
        return true;
    }

    match (dimension.match_kind(), target.value(dimension)) {
        (MatchKind::Ancestor, TargetValue::Single(Some(node))) => restriction
            .iter()
            .any(|ancestor| tree.is_ancestor_or_self(ancestor, node)),
        (MatchKind::Member, TargetValue::Single(Some(value))) => restriction.contains(value),
        (MatchKind::Intersects, TargetValue::Set(values)) => !restriction.is_disjoint(values),
        _ => false
    }
}

/// Whether `document` applies to `target`: active and every dimension
/// satisfied.
pub fn matches(document: &ScopedDocument, target: &ScopeAttributes, tree: &TreeIndex) -> bool {
    document.is_active
        && Dimension::ALL
            .iter()
            .all(|d| dimension_satisfied(*d, document.scope.get(*d), target, tree))
}

/// One component of the total document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKey {
    Weight,
    Name,
    Id
}

/// Documents merge in this order: weight ascending, then name, then id for
/// identically named documents of different owners.
pub const ORDER_KEYS: [OrderKey; 3] = [OrderKey::Weight, OrderKey::Name, OrderKey::Id];

impl OrderKey {
    pub fn compare(self, a: &ScopedDocument, b: &ScopedDocument) -> Ordering {
        match self {
            OrderKey::Weight => a.weight.cmp(&b.weight),
            OrderKey::Name => a.name.as_bytes().cmp(b.name.as_bytes()),
            OrderKey::Id => a.id.cmp(&b.id)
        }
    }
}

pub fn document_order(a: &ScopedDocument, b: &ScopedDocument) -> Ordering {
    ORDER_KEYS
        .iter()
        .fold(Ordering::Equal, |acc, key| acc.then_with(|| key.compare(a, b)))
}

pub fn sort_documents(documents: &mut [ScopedDocument]) {
    documents.sort_by(document_order);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JsonObject;

    fn tree() -> TreeIndex {
        let mut tree = TreeIndex::new();
        tree.insert("emea", "EMEA", None).unwrap();
        tree.insert("de", "Germany", Some("emea".into())).unwrap();
        tree.insert("fra", "Frankfurt", Some("de".into())).unwrap();
        tree.insert("amer", "Americas", None).unwrap();
        tree
    }

    fn doc(name: &str, scope: ScopeRestrictions) -> ScopedDocument {
        ScopedDocument::new(name, JsonObject::new()).with_scope(scope)
    }

    #[test]
    fn test_unrestricted_document_matches_everything() {
        let tree = tree();
        let d = doc("base", ScopeRestrictions::default());
        assert!(matches(&d, &ScopeAttributes::new("t1"), &tree));

        let mut rich = ScopeAttributes::new("t2");
        rich.region = Some("fra".into());
        rich.tags.insert("edge".into());
        assert!(matches(&d, &rich, &tree));
    }

    #[test]
    fn test_inactive_document_never_matches() {
        let d = doc("base", ScopeRestrictions::default()).inactive();
        assert!(!matches(&d, &ScopeAttributes::new("t1"), &tree()));
    }

    #[test]
    fn test_region_matches_descendants() {
        let tree = tree();
        let d = doc(
            "emea",
            ScopeRestrictions::default().with(Dimension::Region, ["emea"])
        );

        let mut target = ScopeAttributes::new("t1");
        target.region = Some("fra".into());
        assert!(matches(&d, &target, &tree));

        target.region = Some("emea".into());
        assert!(matches(&d, &target, &tree));

        target.region = Some("amer".into());
        assert!(!matches(&d, &target, &tree));

        target.region = None;
        assert!(!matches(&d, &target, &tree));
    }

    #[test]
    fn test_region_does_not_match_ancestors() {
        let tree = tree();
        let d = doc(
            "fra",
            ScopeRestrictions::default().with(Dimension::Region, ["fra"])
        );
        let mut target = ScopeAttributes::new("t1");
        target.region = Some("de".into());
        assert!(!matches(&d, &target, &tree));
    }

    #[test]
    fn test_every_restricted_dimension_must_match() {
        let tree = tree();
        let d = doc(
            "leaf-juniper",
            ScopeRestrictions::default()
                .with(Dimension::Role, ["leaf"])
                .with(Dimension::Platform, ["junos", "eos"])
        );

        let mut target = ScopeAttributes::new("t1");
        target.role = Some("leaf".into());
        target.platform = Some("eos".into());
        assert!(matches(&d, &target, &tree));

        target.platform = Some("nxos".into());
        assert!(!matches(&d, &target, &tree));

        target.platform = None;
        assert!(!matches(&d, &target, &tree));
    }

    #[test]
    fn test_tags_match_on_intersection() {
        let tree = tree();
        let d = doc(
            "tagged",
            ScopeRestrictions::default().with(Dimension::Tag, ["pci", "edge"])
        );

        let mut target = ScopeAttributes::new("t1");
        assert!(!matches(&d, &target, &tree));

        target.tags.insert("lab".into());
        assert!(!matches(&d, &target, &tree));

        target.tags.insert("edge".into());
        assert!(matches(&d, &target, &tree));
    }

    #[test]
    fn test_ordering_by_weight_then_name() {
        let mut docs = vec![
            doc("zeta", ScopeRestrictions::default()).with_weight(100),
            doc("beta", ScopeRestrictions::default()).with_weight(200),
            doc("alpha", ScopeRestrictions::default()).with_weight(200),
            doc("base", ScopeRestrictions::default()),
        ];
        sort_documents(&mut docs);
        let names: Vec<&str> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "beta", "base"]);
    }

    #[test]
    fn test_ordering_is_total_for_identical_names() {
        let a = doc("same", ScopeRestrictions::default());
        let b = doc("same", ScopeRestrictions::default());
        assert_ne!(document_order(&a, &b), Ordering::Equal);
        assert_eq!(document_order(&a, &b), document_order(&b, &a).reverse());
    }

    #[test]
    fn test_restricted_dimensions_lists_non_empty_sets() {
        let scope = ScopeRestrictions::default()
            .with(Dimension::Site, ["x"])
            .with(Dimension::Tag, ["t"]);
        let dims: Vec<Dimension> = scope.restricted_dimensions().collect();
        assert_eq!(dims, vec![Dimension::Site, Dimension::Tag]);
        assert!(!scope.is_unrestricted());
    }
}
