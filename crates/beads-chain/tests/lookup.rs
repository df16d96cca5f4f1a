mod common;
use common::*;

use beads_chain::{ChainError, JoinMode, LookupOptions, lookup};
use beads_query::Sort;
use beads_store::Store;
use bson::{Bson, Document, doc};

fn customers() -> RecordingStore {
    let store = RecordingStore::new();
    store.seed(
        "customers",
        vec![
            doc! { "_id": 7, "name": "Initech", "tier": "free", "region": "eu" },
            doc! { "_id": 8, "name": "Globex", "tier": "pro", "region": "us" },
            doc! { "_id": 9, "name": "Acme", "tier": "pro", "region": "eu" },
        ],
    );
    store
}

fn orders(customer_ids: &[Bson]) -> Vec<Document> {
    customer_ids
        .iter()
        .enumerate()
        .map(|(i, id)| doc! { "_id": i as i32, "customer_id": id.clone() })
        .collect()
}

// ── Single mode ─────────────────────────────────────────────────

#[test]
fn single_attaches_match_or_null() {
    let store = customers();
    let target = store.collection("customers").unwrap();
    let mut docs = orders(&[Bson::Int32(9), Bson::Int32(42)]);

    lookup(&target, &mut docs, "customer_id", &LookupOptions::default().with_self_key("_id")).unwrap();

    assert_eq!(
        docs[0].get_document("customers").unwrap().get_str("name").unwrap(),
        "Acme"
    );
    assert_eq!(docs[1].get("customers"), Some(&Bson::Null));
    assert_eq!(docs[0].get_i32("_id").unwrap(), 0);
}

#[test]
fn single_keeps_last_duplicate() {
    let store = RecordingStore::new();
    store.seed(
        "accounts",
        vec![
            doc! { "_id": 1, "email": "a@example.com", "plan": "old" },
            doc! { "_id": 2, "email": "a@example.com", "plan": "new" },
        ],
    );
    let target = store.collection("accounts").unwrap();
    let mut docs = vec![doc! { "_id": 10, "email": "a@example.com" }];

    lookup(&target, &mut docs, "email", &LookupOptions::default()).unwrap();

    let attached = docs[0].get_document("accounts").unwrap();
    assert_eq!(attached.get_str("plan").unwrap(), "new");
}

// ── Multi mode ──────────────────────────────────────────────────

#[test]
fn multi_attaches_every_match() {
    let store = RecordingStore::new();
    store.seed(
        "orders",
        vec![
            doc! { "_id": 1, "customer_id": 9 },
            doc! { "_id": 2, "customer_id": 8 },
            doc! { "_id": 3, "customer_id": 9 },
        ],
    );
    let target = store.collection("orders").unwrap();
    let mut docs = vec![doc! { "_id": 9 }, doc! { "_id": 8 }, doc! { "_id": 7 }];

    let options = LookupOptions::default()
        .with_self_key("customer_id")
        .with_mode(JoinMode::Multi);
    lookup(&target, &mut docs, "_id", &options).unwrap();

    let attached: Vec<_> = docs
        .iter()
        .map(|d| {
            d.get_array("orders")
                .unwrap()
                .iter()
                .map(|o| o.as_document().unwrap().get_i32("_id").unwrap())
                .collect::<Vec<_>>()
        })
        .collect();
    assert_eq!(attached, vec![vec![1, 3], vec![2], vec![]]);
}

#[test]
fn multi_honours_sort() {
    let store = RecordingStore::new();
    store.seed(
        "orders",
        vec![
            doc! { "_id": 1, "customer_id": 9 },
            doc! { "_id": 2, "customer_id": 9 },
            doc! { "_id": 3, "customer_id": 9 },
        ],
    );
    let target = store.collection("orders").unwrap();
    let mut docs = vec![doc! { "_id": 9 }];

    let options = LookupOptions::default()
        .with_self_key("customer_id")
        .multi()
        .with_sort(vec![Sort::desc("_id")]);
    lookup(&target, &mut docs, "_id", &options).unwrap();

    let ids: Vec<i32> = docs[0]
        .get_array("orders")
        .unwrap()
        .iter()
        .map(|o| o.as_document().unwrap().get_i32("_id").unwrap())
        .collect();
    assert_eq!(ids, vec![3, 2, 1]);
    assert_eq!(store.finds_on("orders")[0].1.sort, vec![Sort::desc("_id")]);
}

// ── Keys ────────────────────────────────────────────────────────

#[test]
fn falsy_keys_issue_no_query() {
    let store = customers();
    let target = store.collection("customers").unwrap();
    let mut docs = vec![
        doc! { "_id": 1, "customer_id": 0 },
        doc! { "_id": 2, "customer_id": "" },
        doc! { "_id": 3, "customer_id": Bson::Null },
        doc! { "_id": 4, "customer_id": false },
        doc! { "_id": 5 },
    ];
    let before = docs.clone();

    lookup(&target, &mut docs, "customer_id", &LookupOptions::default().with_self_key("_id")).unwrap();

    assert_eq!(docs, before);
    assert!(store.finds_on("customers").is_empty());
}

#[test]
fn documents_without_a_key_are_left_untouched() {
    let store = customers();
    let target = store.collection("customers").unwrap();
    let mut docs = vec![
        doc! { "_id": 1, "customer_id": 8 },
        doc! { "_id": 2 },
        doc! { "_id": 3, "customer_id": 0 },
    ];

    let options = LookupOptions::default().with_self_key("_id").multi();
    lookup(&target, &mut docs, "customer_id", &options).unwrap();

    assert_eq!(docs[0].get_array("customers").unwrap().len(), 1);
    assert!(!docs[1].contains_key("customers"));
    assert!(!docs[2].contains_key("customers"));
}

#[test]
fn one_query_per_batch_with_distinct_values() {
    let store = customers();
    let target = store.collection("customers").unwrap();
    let mut docs = orders(&[Bson::Int32(9), Bson::Int32(8), Bson::Int32(9)]);

    lookup(&target, &mut docs, "customer_id", &LookupOptions::default().with_self_key("_id")).unwrap();

    let finds = store.finds_on("customers");
    assert_eq!(finds.len(), 1);
    assert_eq!(finds[0].0, doc! { "_id": { "$in": [9, 8] } });
    assert!(docs.iter().all(|d| d.get_document("customers").is_ok()));
}

#[test]
fn numeric_keys_match_across_types() {
    let store = customers();
    let target = store.collection("customers").unwrap();
    let mut docs = orders(&[Bson::Int64(9), Bson::Double(8.0)]);

    lookup(&target, &mut docs, "customer_id", &LookupOptions::default().with_self_key("_id")).unwrap();

    assert_eq!(
        docs[0].get_document("customers").unwrap().get_str("name").unwrap(),
        "Acme"
    );
    assert_eq!(
        docs[1].get_document("customers").unwrap().get_str("name").unwrap(),
        "Globex"
    );
}

#[test]
fn key_can_be_a_dotted_path() {
    let store = customers();
    let target = store.collection("customers").unwrap();
    let mut docs = vec![doc! { "_id": 1, "billing": { "customer": 7 } }];

    lookup(&target, &mut docs, "billing.customer", &LookupOptions::default().with_self_key("_id")).unwrap();

    assert_eq!(
        docs[0].get_document("customers").unwrap().get_str("name").unwrap(),
        "Initech"
    );
}

#[test]
fn self_key_defaults_to_key() {
    let store = RecordingStore::new();
    store.seed("profiles", vec![doc! { "_id": 1, "user_id": "u1", "bio": "hi" }]);
    let target = store.collection("profiles").unwrap();
    let mut docs = vec![doc! { "_id": 5, "user_id": "u1" }];

    lookup(&target, &mut docs, "user_id", &LookupOptions::default()).unwrap();

    assert_eq!(store.finds_on("profiles")[0].0, doc! { "user_id": { "$in": ["u1"] } });
    assert_eq!(
        docs[0].get_document("profiles").unwrap().get_str("bio").unwrap(),
        "hi"
    );
}

// ── Options ─────────────────────────────────────────────────────

#[test]
fn fields_project_targets_and_keep_self_key() {
    let store = customers();
    let target = store.collection("customers").unwrap();
    let mut docs = orders(&[Bson::Int32(9)]);

    let options = LookupOptions::default().with_self_key("_id").with_fields(["name"]);
    lookup(&target, &mut docs, "customer_id", &options).unwrap();

    assert_eq!(
        store.finds_on("customers")[0].1.projection,
        Some(vec!["name".to_string(), "_id".to_string()])
    );
    assert_eq!(
        docs[0].get_document("customers").unwrap(),
        &doc! { "_id": 9, "name": "Acme" }
    );
}

#[test]
fn extra_filter_narrows_and_overrides() {
    let store = customers();
    let target = store.collection("customers").unwrap();

    let mut docs = orders(&[Bson::Int32(7), Bson::Int32(9)]);
    let options = LookupOptions::default()
        .with_self_key("_id")
        .with_filter(doc! { "region": "eu", "tier": "pro" });
    lookup(&target, &mut docs, "customer_id", &options).unwrap();
    assert_eq!(docs[0].get("customers"), Some(&Bson::Null));
    assert!(docs[1].get_document("customers").is_ok());

    let mut docs = orders(&[Bson::Int32(7), Bson::Int32(9)]);
    let options = LookupOptions::default()
        .with_self_key("_id")
        .with_filter(doc! { "_id": 7 });
    lookup(&target, &mut docs, "customer_id", &options).unwrap();
    assert!(docs[0].get_document("customers").is_ok());
    assert_eq!(docs[1].get("customers"), Some(&Bson::Null));
}

// ── Failures ────────────────────────────────────────────────────

#[test]
fn target_named_id_is_rejected() {
    let store = RecordingStore::new();
    let target = store.collection("_id").unwrap();
    let mut docs = orders(&[Bson::Int32(9)]);

    let err = lookup(&target, &mut docs, "customer_id", &LookupOptions::default()).unwrap_err();
    assert!(matches!(err, ChainError::Config(_)));
    assert!(store.calls().is_empty());
}

#[test]
fn store_failure_leaves_documents_unchanged() {
    let store = customers();
    store.fail_finds_on("customers");
    let target = store.collection("customers").unwrap();
    let mut docs = orders(&[Bson::Int32(9)]);
    let before = docs.clone();

    let err = lookup(&target, &mut docs, "customer_id", &LookupOptions::default().with_self_key("_id")).unwrap_err();
    assert!(matches!(err, ChainError::Query { ref collection, .. } if collection == "customers"));
    assert_eq!(docs, before);
}
