// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) {
    std::fs::write(dir.path().join(name), content).unwrap();
}

fn fresh_catalog(dir: &TempDir) -> Catalog {
    Catalog::create(dir.path().join("catalog.db")).unwrap()
}

#[test]
fn import_single_file() {
    let dir = TempDir::new().unwrap();
    let mut catalog = fresh_catalog(&dir);
    write(&dir, "svc.toml", "id = \"svc\"\ncommand = \"true\"");

    import_path(&mut catalog, &dir.path().join("svc.toml")).unwrap();
    assert_eq!(catalog.list_labels().unwrap(), vec!["svc"]);
}

#[test]
fn import_directory_reads_only_toml_children() {
    let dir = TempDir::new().unwrap();
    let manifests = TempDir::new().unwrap();
    let mut catalog = fresh_catalog(&dir);

    write(&manifests, "a.toml", "id = \"a\"\ncommand = \"true\"");
    write(&manifests, "b.toml", "id = \"b\"\ncommand = \"true\"");
    write(&manifests, "notes.txt", "not a manifest");
    write(&manifests, "README", "also not a manifest");

    import_path(&mut catalog, manifests.path()).unwrap();
    assert_eq!(catalog.list_labels().unwrap(), vec!["a", "b"]);
}

#[test]
fn one_bad_manifest_rolls_back_the_whole_directory() {
    let dir = TempDir::new().unwrap();
    let manifests = TempDir::new().unwrap();
    let mut catalog = fresh_catalog(&dir);

    write(&manifests, "a.toml", "id = \"a\"\ncommand = \"true\"");
    write(&manifests, "b.toml", "id = \"b\"\ncommand = \"true\"");
    // missing command
    write(&manifests, "broken.toml", "id = \"broken\"");

    let err = import_path(&mut catalog, manifests.path()).unwrap_err();
    assert!(err.to_string().contains("broken.toml"));

    // never a partial catalog
    assert!(catalog.list_labels().unwrap().is_empty());
}

#[test]
fn reimport_replaces_by_id() {
    let dir = TempDir::new().unwrap();
    let mut catalog = fresh_catalog(&dir);

    write(&dir, "svc.toml", "id = \"svc\"\ncommand = \"one\"");
    import_path(&mut catalog, &dir.path().join("svc.toml")).unwrap();

    write(&dir, "svc.toml", "id = \"svc\"\ncommand = \"two\"");
    import_path(&mut catalog, &dir.path().join("svc.toml")).unwrap();

    let job = catalog
        .find_by_id(&jobd_core::JobLabel::new("svc"))
        .unwrap()
        .unwrap();
    assert_eq!(job.manifest.command, "two");
    assert_eq!(catalog.list_labels().unwrap().len(), 1);
}

#[test]
fn missing_source_path_is_an_error() {
    let dir = TempDir::new().unwrap();
    let mut catalog = fresh_catalog(&dir);
    let err = import_path(&mut catalog, &dir.path().join("nope.toml")).unwrap_err();
    assert!(err.to_string().contains("cannot stat"));
}
