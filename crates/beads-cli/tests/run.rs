use std::path::Path;

use beads_cli::{CliConfig, CliError, run, run_file};
use serde_json::{Value, json};

fn write(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).unwrap();
}

fn lines(out: &[u8]) -> Vec<Value> {
    std::str::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn seed_orders(dir: &Path) {
    write(
        dir,
        "orders.json",
        r#"[
            { "_id": 1, "customer_id": 9, "status": "open" },
            { "_id": 2, "customer_id": 8, "status": "open" },
            { "_id": 3, "customer_id": 9, "status": "closed" }
        ]"#,
    );
    write(dir, "customers.json", r#"[{ "_id": 9, "name": "A" }]"#);
}

#[test]
fn yaml_chain_prints_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    seed_orders(dir.path());
    write(
        dir.path(),
        "chain.yaml",
        r#"
collection: orders
query: { status: open }
stages:
  - collection: customers
    key: customer_id
    self_key: _id
seed:
  orders: orders.json
  customers: customers.json
"#,
    );

    let mut out = Vec::new();
    let counts = run_file(&dir.path().join("chain.yaml"), &mut out).unwrap();

    let docs = lines(&out);
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0]["_id"], json!(1));
    assert_eq!(docs[0]["customers"]["name"], json!("A"));
    assert_eq!(docs[1]["_id"], json!(2));
    assert_eq!(docs[1]["customers"], Value::Null);

    assert_eq!(counts.input(), 2);
    assert_eq!(counts.get("customers"), Some(2));
    assert_eq!(counts.output(), 2);
}

#[test]
fn json_config_with_filter() {
    let dir = tempfile::tempdir().unwrap();
    seed_orders(dir.path());
    write(
        dir.path(),
        "chain.json",
        r#"{
            "collection": "orders",
            "filter": { "customer_id": 9 },
            "seed": { "orders": "orders.json" }
        }"#,
    );

    let mut out = Vec::new();
    let counts = run_file(&dir.path().join("chain.json"), &mut out).unwrap();

    let ids: Vec<_> = lines(&out).iter().map(|d| d["_id"].clone()).collect();
    assert_eq!(ids, vec![json!(1), json!(3)]);
    assert_eq!(counts.input(), 3);
    assert_eq!(counts.get("orders"), Some(2));
}

#[test]
fn seed_paths_resolve_against_the_base() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("data")).unwrap();
    seed_orders(&dir.path().join("data"));

    let config: CliConfig = serde_yaml::from_str(
        "collection: orders\nseed:\n  orders: data/orders.json\n",
    )
    .unwrap();

    let mut out = Vec::new();
    run(&config, dir.path(), &mut out).unwrap();
    assert_eq!(lines(&out).len(), 3);
}

#[test]
fn missing_and_malformed_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut out = Vec::new();

    let err = run_file(&dir.path().join("nope.yaml"), &mut out).unwrap_err();
    assert!(matches!(err, CliError::Read { .. }));

    write(dir.path(), "chain.yaml", "collection: orders\nseed: { orders: orders.json }\n");
    let err = run_file(&dir.path().join("chain.yaml"), &mut out).unwrap_err();
    assert!(matches!(err, CliError::Read { .. }));

    write(dir.path(), "orders.json", "{ not json");
    let err = run_file(&dir.path().join("chain.yaml"), &mut out).unwrap_err();
    assert!(matches!(err, CliError::Seed { .. }));

    write(dir.path(), "bad.yaml", "stages: 7\n");
    let err = run_file(&dir.path().join("bad.yaml"), &mut out).unwrap_err();
    assert!(matches!(err, CliError::Config(_)));
    assert!(out.is_empty());
}

#[test]
fn invalid_chain_is_rejected_before_seeding() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "chain.yaml", "collection: orders\nsize: 0\nseed: { orders: missing.json }\n");
    let mut out = Vec::new();
    let err = run_file(&dir.path().join("chain.yaml"), &mut out).unwrap_err();
    assert!(matches!(err, CliError::Chain(_)));
}
