//! SQL rendering of the matching predicate and the document order.
//!
//! Both PostgreSQL queries are generated from [`Dimension::ALL`] and
//! [`ORDER_KEYS`], so the single-target query, the correlated batch query and
//! the in-memory evaluator cannot drift apart. Only the expression that
//! yields the target's value differs between the two queries: a bind
//! parameter for one target, a column of the target record set for a batch.

use ctx_core::{Dimension, MatchKind, ORDER_KEYS, OrderKey};

pub const DOCUMENTS_TABLE: &str = "context_documents";
pub const SCHEMAS_TABLE: &str = "schema_contracts";
pub const TREE_TABLE: &str = "scope_tree_nodes";

/// Document columns selected by every read query, in row-decoding order.
pub const DOCUMENT_COLUMNS: [&str; 19] = [
    "id",
    "name",
    "weight",
    "description",
    "is_active",
    "data",
    "schema_id",
    "owner_kind",
    "owner_id",
    "regions",
    "sites",
    "roles",
    "device_types",
    "platforms",
    "cluster_groups",
    "clusters",
    "tenant_groups",
    "tenants",
    "tags"
];

/// Restriction-set column of a document.
pub fn restriction_column(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Region => "regions",
        Dimension::Site => "sites",
        Dimension::Role => "roles",
        Dimension::DeviceType => "device_types",
        Dimension::Platform => "platforms",
        Dimension::ClusterGroup => "cluster_groups",
        Dimension::Cluster => "clusters",
        Dimension::TenantGroup => "tenant_groups",
        Dimension::Tenant => "tenants",
        Dimension::Tag => "tags"
    }
}

/// Field name of a target's value, shared by the batch record set and the
/// JSON encoding of [`ctx_core::ScopeAttributes`].
pub fn target_field(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Region => "region",
        Dimension::Site => "site",
        Dimension::Role => "role",
        Dimension::DeviceType => "device_type",
        Dimension::Platform => "platform",
        Dimension::ClusterGroup => "cluster_group",
        Dimension::Cluster => "cluster",
        Dimension::TenantGroup => "tenant_group",
        Dimension::Tenant => "tenant",
        Dimension::Tag => "tags"
    }
}

fn target_sql_type(dimension: Dimension) -> &'static str {
    match dimension.match_kind() {
        MatchKind::Intersects => "text[]",
        MatchKind::Ancestor | MatchKind::Member => "text"
    }
}

/// Clause for one dimension. `doc` is the document table alias and
/// `target` the SQL expression holding the target's value.
pub fn dimension_clause(dimension: Dimension, doc: &str, target: &str) -> String {
    let column = format!("{}.{}", doc, restriction_column(dimension));
    let test = match dimension.match_kind() {
        MatchKind::Member => format!("{} = ANY({})", target, column),
        MatchKind::Intersects => format!("{} && {}", column, target),
        MatchKind::Ancestor => format!(
            "EXISTS (SELECT 1 FROM {tree} anc JOIN {tree} node \
             ON node.tree_id = anc.tree_id AND node.lft >= anc.lft AND node.rght <= anc.rght \
             WHERE anc.id = ANY({column}) AND node.id = {target})",
            tree = TREE_TABLE,
            column = column,
            target = target
        )
    };
    format!("(cardinality({}) = 0 OR {})", column, test)
}

/// Full predicate: active and every dimension satisfied.
pub fn match_predicate<F>(doc: &str, target_expr: F) -> String
where
    F: Fn(Dimension) -> String
{
    let mut clauses = vec![format!("{}.is_active", doc)];
    clauses.extend(
        Dimension::ALL
            .iter()
            .map(|d| dimension_clause(*d, doc, &target_expr(*d)))
    );
    clauses.join("\n  AND ")
}

/// `ORDER BY` terms for the document order. Names compare bytewise.
pub fn order_terms(doc: &str) -> Vec<String> {
    ORDER_KEYS
        .iter()
        .map(|key| match key {
            OrderKey::Weight => format!("{}.weight ASC", doc),
            OrderKey::Name => format!("{}.name COLLATE \"C\" ASC", doc),
            OrderKey::Id => format!("{}.id ASC", doc)
        })
        .collect()
}

fn select_list(doc: &str) -> String {
    DOCUMENT_COLUMNS
        .iter()
        .map(|c| format!("{}.{}", doc, c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Single-target query. Parameter `$n` carries the value of
/// `Dimension::ALL[n - 1]`.
pub fn single_target_query() -> String {
    let predicate = match_predicate("d", |dimension| {
        let position = Dimension::ALL
            .iter()
            .position(|d| *d == dimension)
            .unwrap_or_default();
        format!("${}::{}", position + 1, target_sql_type(dimension))
    });
    format!(
        "SELECT {}\nFROM {} d\nWHERE {}\nORDER BY {}",
        select_list("d"),
        DOCUMENTS_TABLE,
        predicate,
        order_terms("d").join(", ")
    )
}

/// Correlated batch query. `$1` is a JSONB array of target records with a
/// `target_id` field plus one field per dimension.
pub fn batch_query() -> String {
    let record_columns = std::iter::once("target_id text".to_string())
        .chain(
            Dimension::ALL
                .iter()
                .map(|d| format!("{} {}", target_field(*d), target_sql_type(*d)))
        )
        .collect::<Vec<_>>()
        .join(", ");
    let predicate = match_predicate("d", |dimension| format!("t.{}", target_field(dimension)));
    let mut order = vec!["t.target_id ASC".to_string()];
    order.extend(order_terms("d"));

    format!(
        "SELECT t.target_id, {}\nFROM jsonb_to_recordset($1::jsonb) AS t({})\nJOIN {} d ON {}\nORDER BY {}",
        select_list("d"),
        record_columns,
        DOCUMENTS_TABLE,
        predicate,
        order.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_dimension_appears_in_both_queries() {
        let single = single_target_query();
        let batch = batch_query();
        for dimension in Dimension::ALL {
            let column = format!("d.{}", restriction_column(dimension));
            assert!(single.contains(&format!("cardinality({})", column)));
            assert!(batch.contains(&format!("cardinality({})", column)));
        }
    }

    #[test]
    fn test_single_query_binds_one_parameter_per_dimension() {
        let single = single_target_query();
        assert!(single.contains("$1::text"));
        assert!(single.contains("$10::text[]"));
        assert!(!single.contains("$11"));
    }

    #[test]
    fn test_order_uses_bytewise_names() {
        let terms = order_terms("d");
        assert_eq!(
            terms,
            vec![
                "d.weight ASC".to_string(),
                "d.name COLLATE \"C\" ASC".to_string(),
                "d.id ASC".to_string()
            ]
        );
    }

    #[test]
    fn test_region_clause_uses_tree_bounds() {
        let clause = dimension_clause(Dimension::Region, "d", "t.region");
        assert!(clause.contains(TREE_TABLE));
        assert!(clause.contains("node.lft >= anc.lft"));
        assert!(clause.contains("node.id = t.region"));
    }

    #[test]
    fn test_tag_clause_uses_overlap() {
        let clause = dimension_clause(Dimension::Tag, "d", "t.tags");
        assert_eq!(clause, "(cardinality(d.tags) = 0 OR d.tags && t.tags)");
    }

    #[test]
    fn test_batch_record_set_matches_target_encoding() {
        let batch = batch_query();
        assert!(batch.contains("jsonb_to_recordset($1::jsonb)"));
        assert!(batch.contains("tags text[]"));
        assert!(batch.contains("device_type text"));
        assert!(batch.starts_with("SELECT t.target_id"));
    }
}
