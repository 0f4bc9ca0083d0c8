//! Integration tests running catalogs against the in-memory registry.

use reg_reconcile::access::AccessResult;
use reg_reconcile::error::{AccessError, Operation};
use reg_reconcile::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn key_path(raw: &str) -> RegistryPath {
    RegistryPath::parse(raw, PathKind::Key).unwrap()
}

fn value_path(raw: &str) -> RegistryPath {
    RegistryPath::parse(raw, PathKind::Value).unwrap()
}

fn run<R: RegistryAccess + ?Sized>(registry: &mut R, json: &str) -> RunReport {
    run_with(registry, json, &RunOptions::default())
}

fn run_with<R: RegistryAccess + ?Sized>(
    registry: &mut R,
    json: &str,
    options: &RunOptions,
) -> RunReport {
    let catalog = Catalog::from_json(json).expect("catalog should load");
    Engine::new(registry).run(&catalog, options)
}

fn seed_values(registry: &mut MemoryRegistry, key: &str, names: &[&str]) {
    let key = key_path(key);
    registry.create_key(&key).unwrap();
    for name in names {
        registry
            .set_value(&key.join(name), &RawValue::encode(&ValueData::Dword(1)))
            .unwrap();
    }
}

fn labels(report: &RunReport) -> Vec<&str> {
    report.outcomes.iter().map(|o| o.resource.as_str()).collect()
}

const FULL_CATALOG: &str = r#"[
    {"resource": "registry_key", "path": "HKLM\\Software\\Vendor"},
    {"resource": "registry_key", "path": "HKLM\\Software\\Vendor\\App"},
    {"resource": "registry_value", "path": "HKLM\\Software\\Vendor\\App\\Name", "data": "demo"},
    {"resource": "registry_value", "path": "HKLM\\Software\\Vendor\\App\\Path", "type": "expand", "data": "%ProgramFiles%\\Demo"},
    {"resource": "registry_value", "path": "HKLM\\Software\\Vendor\\App\\Hosts", "type": "array", "data": ["a", "b"]},
    {"resource": "registry_value", "path": "HKLM\\Software\\Vendor\\App\\Count", "type": "dword", "data": "0x10"},
    {"resource": "registry_value", "path": "HKLM\\Software\\Vendor\\App\\Big", "type": "qword", "data": 4294967296},
    {"resource": "registry_value", "path": "HKLM\\Software\\Vendor\\App\\Blob", "type": "binary", "data": "DEADBEEF"},
    {"resource": "registry_value", "path": "HKLM\\Software\\Vendor\\App\\", "data": "default"}
]"#;

#[test]
fn test_apply_then_idempotent() {
    let mut registry = MemoryRegistry::new();

    let first = run(&mut registry, FULL_CATALOG);
    assert!(first.is_success(), "first run failed: {:?}", first.outcomes);
    assert_eq!(first.summary().created, 9);

    assert_eq!(
        registry
            .get_value(&value_path(r"HKLM\Software\Vendor\App\Count"))
            .unwrap()
            .unwrap()
            .decode()
            .unwrap(),
        ValueData::Dword(16)
    );
    assert_eq!(
        registry
            .get_value(&value_path(r"HKLM\Software\Vendor\App\"))
            .unwrap()
            .unwrap()
            .decode()
            .unwrap(),
        ValueData::String("default".to_string())
    );

    let second = run(&mut registry, FULL_CATALOG);
    assert!(second.is_success());
    assert!(!second.has_changes());
    assert_eq!(second.summary().noop, 9);
}

#[test]
fn test_purge_deletes_undeclared_values() {
    let mut registry = MemoryRegistry::new();
    seed_values(&mut registry, r"HKLM\Software\Vendor", &["A", "B", "C", "d"]);

    let report = run(
        &mut registry,
        r#"[
            {"resource": "registry_key", "path": "HKLM\\Software\\Vendor", "purge_values": true},
            {"resource": "registry_value", "path": "HKLM\\Software\\Vendor\\a", "type": "dword", "data": 1},
            {"resource": "registry_value", "path": "HKLM\\Software\\Vendor\\B", "type": "dword", "data": 1}
        ]"#,
    );

    assert!(report.is_success());
    assert_eq!(report.summary().deleted, 2);
    let purged: Vec<&str> = report
        .outcomes
        .iter()
        .filter(|o| o.synthetic)
        .map(|o| o.resource.as_str())
        .collect();
    assert_eq!(
        purged,
        vec![
            r"registry_value[HKLM\Software\Vendor\C]",
            r"registry_value[HKLM\Software\Vendor\d]",
        ]
    );
    assert_eq!(
        registry.list_value_names(&key_path(r"HKLM\Software\Vendor")).unwrap(),
        vec!["A".to_string(), "B".to_string()]
    );
}

#[test]
fn test_purge_disabled_keeps_values() {
    let mut registry = MemoryRegistry::new();
    seed_values(&mut registry, r"HKLM\Software\Vendor", &["A", "Extra"]);

    let report = run(
        &mut registry,
        r#"[
            {"resource": "registry_key", "path": "HKLM\\Software\\Vendor", "purge_values": "false"},
            {"resource": "registry_value", "path": "HKLM\\Software\\Vendor\\A", "type": "dword", "data": 1}
        ]"#,
    );
    assert!(!report.has_changes());
    assert_eq!(
        registry.list_value_names(&key_path(r"HKLM\Software\Vendor")).unwrap().len(),
        2
    );
}

#[test]
fn test_root_key_never_deleted() {
    let mut registry = MemoryRegistry::new();
    seed_values(&mut registry, r"HKLM\Software", &["Keep"]);

    let report = run(
        &mut registry,
        r#"[{"resource": "registry_key", "path": "HKLM", "ensure": "absent"}]"#,
    );

    match &report.outcomes[0].status {
        Status::Failed { operation, error } => {
            assert_eq!(*operation, Operation::Delete);
            assert!(error.contains("Cannot delete root key"), "{}", error);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(registry.key_exists(&key_path(r"HKLM\Software")).unwrap());
}

#[test]
fn test_key_with_subkeys_is_reported() {
    let mut registry = MemoryRegistry::new();
    registry.create_key(&key_path(r"HKLM\Software\Vendor\Undeclared")).unwrap();
    seed_values(&mut registry, r"HKLM\Software\Vendor", &["Old"]);

    let report = run(
        &mut registry,
        r#"[
            {"resource": "registry_key", "path": "HKLM\\Software\\Vendor", "ensure": "absent"},
            {"resource": "registry_value", "path": "HKLM\\Software\\Vendor\\Old", "ensure": "absent"}
        ]"#,
    );

    // the value goes first, then the key refuses to go
    assert_eq!(
        labels(&report),
        vec![
            r"registry_value[HKLM\Software\Vendor\Old]",
            r"registry_key[HKLM\Software\Vendor]",
        ]
    );
    assert_eq!(report.summary().deleted, 1);
    assert_eq!(report.summary().failed, 1);
    match &report.outcomes[1].status {
        Status::Failed { error, .. } => assert!(error.contains("Key has subkeys")),
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(registry.key_exists(&key_path(r"HKLM\Software\Vendor\Undeclared")).unwrap());
}

#[test]
fn test_absent_tree_is_removed_bottom_up() {
    let mut registry = MemoryRegistry::new();
    seed_values(&mut registry, r"HKLM\Software\Vendor\App", &["Name"]);

    let report = run(
        &mut registry,
        r#"[
            {"resource": "registry_key", "path": "HKLM\\Software\\Vendor", "ensure": "absent"},
            {"resource": "registry_key", "path": "HKLM\\Software\\Vendor\\App", "ensure": "absent"}
        ]"#,
    );

    assert!(report.is_success());
    assert_eq!(
        labels(&report),
        vec![
            r"registry_key[HKLM\Software\Vendor\App]",
            r"registry_key[HKLM\Software\Vendor]",
        ]
    );
    assert!(!registry.key_exists(&key_path(r"HKLM\Software\Vendor")).unwrap());
    assert!(registry.key_exists(&key_path(r"HKLM\Software")).unwrap());
}

#[test]
fn test_children_of_failed_key_are_skipped() {
    let mut registry = MemoryRegistry::new();
    let locked = key_path(r"HKLM\Software\Locked");
    registry.create_key(&locked).unwrap();
    registry.protect(&locked).unwrap();

    let report = run(
        &mut registry,
        r#"[
            {"resource": "registry_value", "path": "HKLM\\Software\\Locked\\Child\\Name", "data": "x"},
            {"resource": "registry_key", "path": "HKLM\\Software\\Locked\\Child"},
            {"resource": "registry_key", "path": "HKLM\\Software\\Elsewhere"}
        ]"#,
    );

    let summary = report.summary();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.created, 1);

    let skipped = report
        .outcome(r"registry_value[HKLM\Software\Locked\Child\Name]")
        .unwrap();
    match &skipped.status {
        Status::Skipped { reason } => {
            assert!(reason.contains(r"registry_key[HKLM\Software\Locked\Child]"))
        }
        other => panic!("expected skip, got {:?}", other),
    }
}

#[test]
fn test_kind_change_overwrites() {
    let mut registry = MemoryRegistry::new();
    registry.create_key(&key_path(r"HKLM\Software\Vendor")).unwrap();
    registry
        .set_value(
            &value_path(r"HKLM\Software\Vendor\Level"),
            &RawValue::encode(&ValueData::String("3".to_string())),
        )
        .unwrap();
    registry
        .set_value(
            &value_path(r"HKLM\Software\Vendor\Odd"),
            &RawValue::new(ValueType::Link, vec![1, 2, 3]),
        )
        .unwrap();

    let catalog = r#"[
        {"resource": "registry_value", "path": "HKLM\\Software\\Vendor\\Level", "type": "dword", "data": 3},
        {"resource": "registry_value", "path": "HKLM\\Software\\Vendor\\Odd", "data": "fixed"}
    ]"#;
    let report = run(&mut registry, catalog);
    assert_eq!(report.summary().updated, 2);
    match &report.outcomes[0].status {
        Status::Changed { action, change } => {
            assert_eq!(*action, Action::Update);
            assert_eq!(change.as_ref().unwrap().to_string(), "REG_SZ 3 -> REG_DWORD 3");
        }
        other => panic!("expected change, got {:?}", other),
    }

    assert!(!run(&mut registry, catalog).has_changes());
}

#[test]
fn test_dry_run_writes_nothing() {
    let mut registry = MemoryRegistry::new();
    seed_values(&mut registry, r"HKLM\Software\Other", &["Stale"]);

    let catalog = r#"[
        {"resource": "registry_key", "path": "HKLM\\Software\\Vendor", "purge_values": true},
        {"resource": "registry_value", "path": "HKLM\\Software\\Vendor\\Count", "type": "dword", "data": 1},
        {"resource": "registry_key", "path": "HKLM\\Software\\Other", "purge_values": true}
    ]"#;
    let report = run_with(&mut registry, catalog, &RunOptions::dry_run());

    assert!(report.dry_run);
    let summary = report.summary();
    assert_eq!(summary.created, 2);
    assert_eq!(summary.deleted, 1);
    assert!(!registry.key_exists(&key_path(r"HKLM\Software\Vendor")).unwrap());
    assert_eq!(
        registry.list_value_names(&key_path(r"HKLM\Software\Other")).unwrap(),
        vec!["Stale".to_string()]
    );
}

#[test]
fn test_views_are_separate() {
    let mut registry = MemoryRegistry::new();
    let report = run(
        &mut registry,
        r#"[
            {"resource": "registry_key", "path": "32:HKLM\\Software\\Vendor"},
            {"resource": "registry_key", "path": "64:HKLM\\Software\\Vendor"}
        ]"#,
    );
    assert_eq!(report.summary().created, 2);
    assert!(registry.key_exists(&key_path(r"HKLM\Software\Vendor")).unwrap());
}

#[test]
fn test_rejected_entries_do_not_stop_run() {
    let mut registry = MemoryRegistry::new();
    let report = run(
        &mut registry,
        r#"[
            {"resource": "registry_key", "path": "HKCU\\Software\\Vendor"},
            {"resource": "registry_value", "path": "HKLM\\Software\\Count", "type": "dword", "data": "-4294967297"},
            {"resource": "registry_key", "path": "HKLM\\Software\\Vendor"}
        ]"#,
    );
    assert_eq!(report.rejected.len(), 2);
    assert_eq!(report.summary().created, 1);
    assert!(!report.is_success());
}

#[test]
fn test_string_with_nul_is_rejected() {
    let mut registry = MemoryRegistry::new();
    let catalog = r#"[
        {"resource": "registry_key", "path": "HKLM\\Software\\Vendor"},
        {"resource": "registry_value", "path": "HKLM\\Software\\Vendor\\Bad", "data": "abc\u0000"},
        {"resource": "registry_value", "path": "HKLM\\Software\\Vendor\\Good", "data": "abc"}
    ]"#;

    let first = run(&mut registry, catalog);
    assert_eq!(first.rejected.len(), 1);
    assert_eq!(first.summary().created, 2);

    let second = run(&mut registry, catalog);
    assert!(!second.has_changes());
    assert_eq!(second.summary().noop, 2);
    assert!(registry
        .get_value(&value_path(r"HKLM\Software\Vendor\Bad"))
        .unwrap()
        .is_none());
}

/// Sets the cancel flag as soon as the first key is created.
struct CancellingRegistry {
    inner: MemoryRegistry,
    cancel: Arc<AtomicBool>,
}

impl RegistryAccess for CancellingRegistry {
    fn key_exists(&self, path: &RegistryPath) -> AccessResult<bool> {
        self.inner.key_exists(path)
    }

    fn create_key(&mut self, path: &RegistryPath) -> AccessResult<()> {
        self.inner.create_key(path)?;
        self.cancel.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn delete_key(&mut self, path: &RegistryPath) -> AccessResult<()> {
        self.inner.delete_key(path)
    }

    fn list_subkeys(&self, path: &RegistryPath) -> AccessResult<Vec<String>> {
        self.inner.list_subkeys(path)
    }

    fn list_value_names(&self, path: &RegistryPath) -> AccessResult<Vec<String>> {
        self.inner.list_value_names(path)
    }

    fn get_value(&self, path: &RegistryPath) -> AccessResult<Option<RawValue>> {
        self.inner.get_value(path)
    }

    fn set_value(&mut self, path: &RegistryPath, value: &RawValue) -> AccessResult<()> {
        self.inner.set_value(path, value)
    }

    fn delete_value(&mut self, path: &RegistryPath) -> AccessResult<()> {
        self.inner.delete_value(path)
    }
}

#[test]
fn test_cancel_between_resources() {
    let cancel = Arc::new(AtomicBool::new(false));
    let mut registry = CancellingRegistry {
        inner: MemoryRegistry::new(),
        cancel: cancel.clone(),
    };
    let options = RunOptions::default().with_cancel(cancel);

    let report = run_with(&mut registry, FULL_CATALOG, &options);

    let summary = report.summary();
    assert_eq!(summary.created, 1);
    assert_eq!(summary.skipped, 8);
    assert!(report.outcomes[1..].iter().all(|o| matches!(
        &o.status,
        Status::Skipped { reason } if reason == "run cancelled"
    )));
    assert_eq!(registry.inner.key_count(), 2);
}

#[test]
fn test_dyn_registry() {
    let mut registry = MemoryRegistry::new();
    let dynamic: &mut dyn RegistryAccess = &mut registry;
    let report = run(dynamic, r#"[{"resource": "registry_key", "path": "HKCR\\.demo"}]"#);
    assert_eq!(report.summary().created, 1);
}

/// Refuses to list value names, as a key with a restrictive ACL would.
struct UnlistableRegistry {
    inner: MemoryRegistry,
}

impl RegistryAccess for UnlistableRegistry {
    fn key_exists(&self, path: &RegistryPath) -> AccessResult<bool> {
        self.inner.key_exists(path)
    }

    fn create_key(&mut self, path: &RegistryPath) -> AccessResult<()> {
        self.inner.create_key(path)
    }

    fn delete_key(&mut self, path: &RegistryPath) -> AccessResult<()> {
        self.inner.delete_key(path)
    }

    fn list_subkeys(&self, path: &RegistryPath) -> AccessResult<Vec<String>> {
        self.inner.list_subkeys(path)
    }

    fn list_value_names(&self, _path: &RegistryPath) -> AccessResult<Vec<String>> {
        Err(AccessError::PermissionDenied)
    }

    fn get_value(&self, path: &RegistryPath) -> AccessResult<Option<RawValue>> {
        self.inner.get_value(path)
    }

    fn set_value(&mut self, path: &RegistryPath, value: &RawValue) -> AccessResult<()> {
        self.inner.set_value(path, value)
    }

    fn delete_value(&mut self, path: &RegistryPath) -> AccessResult<()> {
        self.inner.delete_value(path)
    }
}

#[test]
fn test_purge_listing_failure_keeps_key_outcome() {
    let mut registry = UnlistableRegistry {
        inner: MemoryRegistry::new(),
    };
    let report = run(
        &mut registry,
        r#"[
            {"resource": "registry_key", "path": "HKLM\\Software\\Vendor", "purge_values": true},
            {"resource": "registry_value", "path": "HKLM\\Software\\Vendor\\A", "data": "x"}
        ]"#,
    );

    let key = r"registry_key[HKLM\Software\Vendor]";
    assert_eq!(
        labels(&report),
        vec![key, key, r"registry_value[HKLM\Software\Vendor\A]"]
    );
    assert!(matches!(
        report.outcomes[0].status,
        Status::Changed {
            action: Action::Create,
            ..
        }
    ));
    assert!(matches!(
        report.outcomes[1].status,
        Status::Failed {
            operation: Operation::Purge,
            ..
        }
    ));
    assert!(matches!(
        report.outcomes[2].status,
        Status::Changed {
            action: Action::Create,
            ..
        }
    ));

    let summary = report.summary();
    assert_eq!(summary.created, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 0);
    assert!(!report.is_success());
    assert!(registry
        .inner
        .get_value(&value_path(r"HKLM\Software\Vendor\A"))
        .unwrap()
        .is_some());
}
