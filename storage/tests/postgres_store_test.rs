//! Integration tests for the PostgreSQL Document Store.
//!
//! These tests share one PostgreSQL testcontainer. Every test uses unique
//! document names and scope values so results can be filtered per test.

use ctx_core::{
    Dimension, DocumentStore, HierarchyStore, OwnerRef, SchemaContract, ScopeAttributes,
    ScopeRef, ScopeRestrictions, ScopedDocument, TargetId, TreeIndex
};
use serde_json::json;
use storage::{InMemoryStore, PostgresStore};
use testing::{postgres, unique_id};

async fn create_test_store() -> Option<PostgresStore> {
    let fixture = postgres().await?;
    let store = PostgresStore::new(fixture.url()).await.ok()?;
    store.initialize_schema().await.ok()?;
    Some(store)
}

fn doc(name: &str, weight: i32, scope: ScopeRestrictions) -> ScopedDocument {
    let data = json!({ "source": name }).as_object().cloned().unwrap();
    ScopedDocument::new(name, data)
        .with_weight(weight)
        .with_scope(scope)
}

fn node(id: &str, name: &str, parent: Option<&str>) -> (ScopeRef, String, Option<ScopeRef>) {
    (ScopeRef::from(id), name.to_string(), parent.map(ScopeRef::from))
}

fn names_with_prefix(documents: &[ScopedDocument], prefix: &str) -> Vec<String> {
    documents
        .iter()
        .filter(|d| d.name.starts_with(prefix))
        .map(|d| d.name.clone())
        .collect()
}

#[tokio::test]
async fn test_document_round_trip() {
    let Some(store) = create_test_store().await else {
        eprintln!("Skipping Postgres test: Docker not available");
        return;
    };

    let tag = unique_id("tag");
    let document = doc(
        &unique_id("roundtrip"),
        250,
        ScopeRestrictions::default()
            .with(Dimension::Tag, [tag.as_str()])
            .with(Dimension::Site, ["site-a", "site-b"])
    )
    .with_owner(OwnerRef::job(unique_id("job")))
    .with_description("round trip");

    store.insert_document(&document).await.unwrap();
    let loaded = store.get_document(document.id).await.unwrap().unwrap();
    assert_eq!(loaded, document);

    let mut updated = loaded.clone();
    updated.weight = 10;
    updated.is_active = false;
    store.update_document(&updated).await.unwrap();
    assert_eq!(
        store.get_document(document.id).await.unwrap().unwrap().weight,
        10
    );

    assert!(store.delete_document(document.id).await.unwrap());
    assert!(!store.delete_document(document.id).await.unwrap());
    assert!(store.get_document(document.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_identity_lookup_is_null_aware() {
    let Some(store) = create_test_store().await else {
        eprintln!("Skipping Postgres test: Docker not available");
        return;
    };

    let name = unique_id("identity");
    let owner = OwnerRef::git_repository(unique_id("repo"));
    let unowned = doc(&name, 1, ScopeRestrictions::default());
    let owned = doc(&name, 1, ScopeRestrictions::default()).with_owner(owner.clone());
    store.insert_document(&unowned).await.unwrap();
    store.insert_document(&owned).await.unwrap();

    let found = store.find_document_by_identity(&name, None).await.unwrap();
    assert_eq!(found.map(|d| d.id), Some(unowned.id));

    let found = store
        .find_document_by_identity(&name, Some(&owner))
        .await
        .unwrap();
    assert_eq!(found.map(|d| d.id), Some(owned.id));

    let duplicate = doc(&name, 5, ScopeRestrictions::default());
    assert!(store.insert_document(&duplicate).await.is_err());

    let listed = store.list_owned_documents(&owner).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_matching_on_flat_dimensions() {
    let Some(store) = create_test_store().await else {
        eprintln!("Skipping Postgres test: Docker not available");
        return;
    };

    let prefix = unique_id("flat");
    let site = unique_id("site");
    let tag = unique_id("tag");
    let role = unique_id("role");

    let by_site = doc(
        &format!("{}-site", prefix),
        100,
        ScopeRestrictions::default().with(Dimension::Site, [site.as_str()])
    );
    let by_site_and_role = doc(
        &format!("{}-site-role", prefix),
        100,
        ScopeRestrictions::default()
            .with(Dimension::Site, [site.as_str()])
            .with(Dimension::Role, [role.as_str()])
    );
    let by_tag = doc(
        &format!("{}-tag", prefix),
        50,
        ScopeRestrictions::default().with(Dimension::Tag, [tag.as_str(), "unused"])
    );
    let inactive = doc(
        &format!("{}-inactive", prefix),
        1,
        ScopeRestrictions::default().with(Dimension::Site, [site.as_str()])
    )
    .inactive();
    for d in [&by_site, &by_site_and_role, &by_tag, &inactive] {
        store.insert_document(d).await.unwrap();
    }

    let mut target = ScopeAttributes::new(unique_id("dev"));
    target.site = Some(site.as_str().into());
    target.tags.insert(tag.as_str().into());

    let found = store.find_matching_documents(&target).await.unwrap();
    assert_eq!(
        names_with_prefix(&found, &prefix),
        vec![format!("{}-tag", prefix), format!("{}-site", prefix)]
    );

    target.role = Some(role.as_str().into());
    let found = store.find_matching_documents(&target).await.unwrap();
    assert_eq!(
        names_with_prefix(&found, &prefix),
        vec![
            format!("{}-tag", prefix),
            format!("{}-site", prefix),
            format!("{}-site-role", prefix)
        ]
    );
}

#[tokio::test]
async fn test_region_hierarchy_and_batch_equivalence() {
    let Some(store) = create_test_store().await else {
        eprintln!("Skipping Postgres test: Docker not available");
        return;
    };

    let emea = unique_id("emea");
    let de = unique_id("de");
    let fra = unique_id("fra");
    let amer = unique_id("amer");
    let tree = TreeIndex::from_nodes([
        node(&emea, "EMEA", None),
        node(&de, "Germany", Some(emea.as_str())),
        node(&fra, "Frankfurt", Some(de.as_str())),
        node(&amer, "Americas", None),
    ])
    .unwrap();
    store.replace_tree(&tree).await.unwrap();
    assert_eq!(store.load_tree().await.unwrap(), tree);

    let prefix = unique_id("region");
    let documents = vec![
        doc(
            &format!("{}-emea", prefix),
            100,
            ScopeRestrictions::default().with(Dimension::Region, [emea.as_str()])
        ),
        doc(
            &format!("{}-de", prefix),
            200,
            ScopeRestrictions::default().with(Dimension::Region, [de.as_str()])
        ),
        doc(
            &format!("{}-amer", prefix),
            100,
            ScopeRestrictions::default().with(Dimension::Region, [amer.as_str()])
        ),
    ];
    let reference = InMemoryStore::with_tree(tree.clone());
    for d in &documents {
        store.insert_document(d).await.unwrap();
        reference.insert_document(d).await.unwrap();
    }

    let targets: Vec<ScopeAttributes> = [Some(&fra), Some(&de), Some(&amer), None]
        .into_iter()
        .enumerate()
        .map(|(i, region)| {
            let mut target = ScopeAttributes::new(format!("{}-t{}", prefix, i));
            target.region = region.map(|r| r.as_str().into());
            target
        })
        .collect();

    let batch = store.find_matching_documents_batch(&targets).await.unwrap();
    assert_eq!(batch.len(), targets.len());

    for target in &targets {
        let single = store.find_matching_documents(target).await.unwrap();
        let expected = reference.find_matching_documents(target).await.unwrap();
        assert_eq!(
            names_with_prefix(&single, &prefix),
            names_with_prefix(&expected, &prefix)
        );
        assert_eq!(
            names_with_prefix(&batch[&target.target_id], &prefix),
            names_with_prefix(&single, &prefix)
        );
    }

    let at_fra = &batch[&TargetId::from(format!("{}-t0", prefix))];
    assert_eq!(
        names_with_prefix(at_fra, &prefix),
        vec![format!("{}-emea", prefix), format!("{}-de", prefix)]
    );
}

#[tokio::test]
async fn test_schema_contract_crud() {
    let Some(store) = create_test_store().await else {
        eprintln!("Skipping Postgres test: Docker not available");
        return;
    };

    let mut contract = SchemaContract::new(
        unique_id("ntp-schema"),
        json!({"type": "object", "properties": {"ntp": {"type": "string"}}})
    );
    store.insert_schema(&contract).await.unwrap();
    assert_eq!(
        store.find_schema_by_name(&contract.name).await.unwrap(),
        Some(contract.clone())
    );

    let using = doc(&unique_id("uses-schema"), 1, ScopeRestrictions::default())
        .with_schema(contract.id);
    store.insert_document(&using).await.unwrap();
    assert_eq!(store.count_documents_with_schema(contract.id).await.unwrap(), 1);

    contract.description = "updated".to_string();
    store.update_schema(&contract).await.unwrap();
    assert_eq!(
        store.get_schema(contract.id).await.unwrap().map(|s| s.description),
        Some("updated".to_string())
    );

    store.delete_document(using.id).await.unwrap();
    assert!(store.delete_schema(contract.id).await.unwrap());
    assert!(store.get_schema(contract.id).await.unwrap().is_none());
}
