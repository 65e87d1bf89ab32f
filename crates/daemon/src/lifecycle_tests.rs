// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use jobd_core::{JobLabel, JobState, Manifest};
use tempfile::TempDir;

fn test_config(dir: &TempDir) -> Config {
    let runtime_dir = dir.path().join("run");
    Config {
        db_path: dir.path().join("catalog.db"),
        lock_path: runtime_dir.join("jobd.lock"),
        log_path: runtime_dir.join("jobd.log"),
        runtime_dir,
    }
}

#[test]
fn lock_is_exclusive_until_dropped() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run").join("jobd.lock");

    let lock = DaemonLock::acquire(&path).unwrap();
    let pid: u32 = std::fs::read_to_string(&path).unwrap().trim().parse().unwrap();
    assert_eq!(pid, std::process::id());

    let err = DaemonLock::acquire(&path).unwrap_err();
    assert!(matches!(err, LifecycleError::LockFailed(_)));

    drop(lock);
    assert!(!path.exists(), "lock file removed on drop");
    let _relock = DaemonLock::acquire(&path).unwrap();
}

#[tokio::test]
async fn startup_without_a_catalog_fails() {
    let dir = TempDir::new().unwrap();
    let err = startup(&test_config(&dir)).unwrap_err();
    assert!(matches!(err, LifecycleError::Catalog(CatalogError::Missing(_))));
}

#[tokio::test]
async fn startup_loads_jobs_and_clears_stale_pids() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    let mut catalog = Catalog::create(&config.db_path).unwrap();
    let import = catalog.import().unwrap();
    let table = toml::from_str("id = \"svc\"\ncommand = \"true\"").unwrap();
    let row = import.insert(&Manifest::from_table(table).unwrap()).unwrap();
    import.commit().unwrap();
    catalog.register_pid(row, jobd_core::Pid(777001)).unwrap();
    drop(catalog);

    let result = startup(&config).unwrap();
    assert_eq!(
        result.supervisor.state_of(&JobLabel::new("svc")),
        Some(JobState::Stopped)
    );
    assert!(result.supervisor.catalog().live_pids().unwrap().is_empty());
    assert!(config.lock_path.exists());
}
