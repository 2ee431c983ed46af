//! Loading configuration from disk

use detalist_registry::prelude::*;
use detalist_registry::ConfigError;
use detalist_test_utils::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_from_file() {
    let file = write_config(
        r#"
        owner = "workshop-7"

        [keyspaces]
        items = "records"
        counter_key = "nextId"
        "#,
    );
    let config = RegistryConfig::load(file.path()).unwrap();

    let registry = memory_registry_with(config);
    registry.create(leaf_draft("A1")).unwrap();

    let info = registry.info().unwrap();
    assert_eq!(info.owner, "workshop-7");
    assert_eq!(info.items, 1);

    let store = registry.into_store();
    assert_eq!(store.keys("records"), vec!["0".to_owned()]);
    assert_eq!(store.keys("data"), vec!["nextId".to_owned()]);
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let err = RegistryConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Io { path: p, .. } if p == path));
}

#[test]
fn test_malformed_file() {
    let file = write_config("owner = ");
    let err = RegistryConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_reopen_with_same_config_continues_counter() {
    let file = write_config("[keyspaces]\ncode_index = \"codes\"\n");
    let config = RegistryConfig::load(file.path()).unwrap();

    let registry = memory_registry_with(config.clone());
    create_leaves(&registry, &["A1", "A2"]);
    let store = registry.into_store();

    let reopened = Registry::open(store, MemorySink::new(), config).unwrap();
    assert_eq!(reopened.create(leaf_draft("A3")).unwrap(), ItemId(2));
    assert_eq!(reopened.get_item_by_code("A1").unwrap().id, ItemId(0));
    assert_audit_clean(&reopened);
}
