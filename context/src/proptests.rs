#[cfg(test)]
mod proptests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use ctx_core::{
        ContextTarget, Device, Dimension, DocumentStore, JsonObject, OwnerRef, ScopeRestrictions,
        ScopedDocument, TreeIndex, matches, sort_documents
    };
    use proptest::prelude::*;
    use serde_json::{Value, json};
    use storage::InMemoryStore;

    use crate::batch::BatchResolver;
    use crate::merge::{deep_merge, merge_all};
    use crate::resolver::ContextResolver;
    use crate::telemetry::Telemetry;

    const SITES: [&str; 3] = ["ams", "fra", "lon"];
    const TAGS: [&str; 3] = ["edge", "core", "lab"];
    const REGIONS: [&str; 4] = ["emea", "de", "nl", "amer"];

    #[derive(Debug, Clone)]
    struct DocSpec {
        name: usize,
        weight: i32,
        active: bool,
        sites: Vec<&'static str>,
        tags: Vec<&'static str>,
        regions: Vec<&'static str>
    }

    #[derive(Debug, Clone)]
    struct TargetSpec {
        site: Option<&'static str>,
        region: Option<&'static str>,
        tags: Vec<&'static str>
    }

    fn tree() -> TreeIndex {
        let mut tree = TreeIndex::new();
        tree.insert("emea", "EMEA", None).unwrap();
        tree.insert("de", "Germany", Some("emea".into())).unwrap();
        tree.insert("nl", "Netherlands", Some("emea".into())).unwrap();
        tree.insert("amer", "Americas", None).unwrap();
        tree
    }

    fn doc_spec() -> impl Strategy<Value = DocSpec> {
        (
            0usize..4,
            prop::sample::select(vec![10, 500, 1000]),
            prop::bool::weighted(0.85),
            prop::sample::subsequence(SITES.to_vec(), 0..=2),
            prop::sample::subsequence(TAGS.to_vec(), 0..=2),
            prop::sample::subsequence(REGIONS.to_vec(), 0..=2)
        )
            .prop_map(|(name, weight, active, sites, tags, regions)| DocSpec {
                name,
                weight,
                active,
                sites,
                tags,
                regions
            })
    }

    fn target_spec() -> impl Strategy<Value = TargetSpec> {
        (
            prop::option::of(prop::sample::select(SITES.to_vec())),
            prop::option::of(prop::sample::select(REGIONS.to_vec())),
            prop::sample::subsequence(TAGS.to_vec(), 0..=3)
        )
            .prop_map(|(site, region, tags)| TargetSpec { site, region, tags })
    }

    fn json_object() -> impl Strategy<Value = JsonObject> {
        prop::collection::btree_map("[a-d]", 0i64..5, 0..4).prop_map(|m| {
            m.into_iter()
                .map(|(k, v)| (k, json!(v)))
                .collect::<JsonObject>()
        })
    }

    fn build_document(index: usize, spec: &DocSpec) -> ScopedDocument {
        let scope = ScopeRestrictions::default()
            .with(Dimension::Site, spec.sites.iter().copied())
            .with(Dimension::Tag, spec.tags.iter().copied())
            .with(Dimension::Region, spec.regions.iter().copied());
        let mut data = JsonObject::new();
        data.insert("winner".to_string(), json!(index));
        data.insert(format!("only-{}", index), Value::Bool(true));

        let document = ScopedDocument::new(format!("doc-{}", spec.name), data)
            .with_weight(spec.weight)
            .with_scope(scope)
            .with_owner(OwnerRef::job(format!("job-{}", index)));
        if spec.active { document } else { document.inactive() }
    }

    fn build_device(index: usize, spec: &TargetSpec) -> Device {
        let mut device = Device::new(format!("dev-{}", index), "device");
        device.site = spec.site.map(Into::into);
        device.region = spec.region.map(Into::into);
        device.tags = spec.tags.iter().map(|t| (*t).into()).collect();
        device
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_batch_equals_single_resolution(
            docs in prop::collection::vec(doc_spec(), 0..8),
            targets in prop::collection::vec(target_spec(), 1..6),
            chunk_size in 1usize..4
        ) {
            let documents: Vec<ScopedDocument> = docs
                .iter()
                .enumerate()
                .map(|(i, spec)| build_document(i, spec))
                .collect();
            let devices: Vec<Device> = targets
                .iter()
                .enumerate()
                .map(|(i, spec)| build_device(i, spec))
                .collect();

            let (batch, singles) = runtime().block_on(async {
                let store = Arc::new(InMemoryStore::with_tree(tree()));
                for document in &documents {
                    store.insert_document(document).await.unwrap();
                }
                let batch = BatchResolver::new(store.clone(), chunk_size)
                    .with_telemetry(Telemetry::disabled())
                    .resolve_many(&devices)
                    .await
                    .unwrap();
                let resolver = ContextResolver::new(store).with_telemetry(Telemetry::disabled());
                let mut singles = BTreeMap::new();
                for device in &devices {
                    let ordered = resolver
                        .ordered_documents(&device.scope_attributes())
                        .await
                        .unwrap();
                    singles.insert(device.id.clone(), ordered);
                }
                (batch, singles)
            });

            prop_assert_eq!(batch.len(), devices.len());
            prop_assert_eq!(&batch, &singles);

            let tree = tree();
            for device in &devices {
                let attributes = device.scope_attributes();
                let mut expected: Vec<ScopedDocument> = documents
                    .iter()
                    .filter(|d| matches(d, &attributes, &tree))
                    .cloned()
                    .collect();
                sort_documents(&mut expected);
                let expected_ids: Vec<_> = expected.iter().map(|d| d.id).collect();
                let actual_ids: Vec<_> = batch[&device.id].iter().map(|d| d.id).collect();
                prop_assert_eq!(actual_ids, expected_ids);
            }
        }

        #[test]
        fn test_merge_of_disjoint_keys_is_order_independent(
            left in json_object(),
            right in json_object()
        ) {
            let left: JsonObject = left.into_iter().map(|(k, v)| (format!("l-{}", k), v)).collect();
            let right: JsonObject = right.into_iter().map(|(k, v)| (format!("r-{}", k), v)).collect();
            let merged = deep_merge(&left, &right);
            prop_assert_eq!(&merged, &deep_merge(&right, &left));
            prop_assert_eq!(merged.len(), left.len() + right.len());
        }

        #[test]
        fn test_overlay_keys_always_win(base in json_object(), overlay in json_object()) {
            let merged = deep_merge(&base, &overlay);
            for (key, value) in &overlay {
                prop_assert_eq!(merged.get(key), Some(value));
            }
            for key in base.keys() {
                prop_assert!(merged.contains_key(key));
            }
        }

        #[test]
        fn test_merge_all_matches_pairwise_fold(layers in prop::collection::vec(json_object(), 0..5)) {
            let folded = layers
                .iter()
                .fold(JsonObject::new(), |acc, layer| deep_merge(&acc, layer));
            prop_assert_eq!(merge_all(&layers), folded);
        }
    }
}
