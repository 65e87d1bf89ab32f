//! `jobcfg import` behavior.

use crate::prelude::Sandbox;
use predicates::str::contains;

#[test]
fn import_from_stdin_is_the_default() {
    let sandbox = Sandbox::new();
    sandbox.init();

    sandbox
        .jobcfg()
        .arg("import")
        .write_stdin("id = \"from-stdin\"\ncommand = \"true\"\n")
        .assert()
        .success();

    sandbox
        .jobstat()
        .assert()
        .success()
        .stdout(contains("from-stdin"));
}

#[test]
fn import_a_single_file() {
    let sandbox = Sandbox::new();
    sandbox.init();
    let path = sandbox.write_manifest("manifests", "svc.toml", "id = \"svc\"\ncommand = \"true\"\n");

    sandbox
        .jobcfg()
        .arg("-f")
        .arg(&path)
        .arg("import")
        .assert()
        .success();

    sandbox.jobstat().assert().success().stdout(contains("svc"));
}

#[test]
fn import_a_directory_of_manifests() {
    let sandbox = Sandbox::new();
    sandbox.init();
    sandbox.write_manifest("manifests", "b.toml", "id = \"b\"\ncommand = \"true\"\n");
    sandbox.write_manifest("manifests", "a.toml", "id = \"a\"\ncommand = \"true\"\n");
    sandbox.write_manifest("manifests", "ignored.conf", "not toml\n");

    sandbox
        .jobcfg()
        .arg("-f")
        .arg(sandbox.dir.path().join("manifests"))
        .arg("import")
        .assert()
        .success();

    let output = sandbox.jobstat().assert().success().get_output().stdout.clone();
    let listing = String::from_utf8(output).unwrap();
    assert_eq!(listing, "JobID\na\nb\n");
}

#[test]
fn one_invalid_manifest_rolls_back_the_directory() {
    let sandbox = Sandbox::new();
    sandbox.init();
    sandbox.write_manifest("manifests", "a.toml", "id = \"a\"\ncommand = \"true\"\n");
    sandbox.write_manifest("manifests", "b.toml", "id = \"b\"\ncommand = \"true\"\n");
    // id missing entirely
    sandbox.write_manifest("manifests", "broken.toml", "command = \"true\"\n");

    sandbox
        .jobcfg()
        .arg("-f")
        .arg(sandbox.dir.path().join("manifests"))
        .arg("import")
        .assert()
        .failure()
        .stderr(contains("broken.toml"));

    let output = sandbox.jobstat().assert().success().get_output().stdout.clone();
    let listing = String::from_utf8(output).unwrap();
    assert_eq!(listing, "JobID\n", "transaction rolled back");
}

#[test]
fn reimport_replaces_by_id() {
    let sandbox = Sandbox::new();
    sandbox.init();

    for command in ["one", "two"] {
        let path = sandbox.write_manifest(
            "manifests",
            "svc.toml",
            &format!("id = \"svc\"\ncommand = \"{command}\"\n"),
        );
        sandbox
            .jobcfg()
            .arg("-f")
            .arg(&path)
            .arg("import")
            .assert()
            .success();
    }

    let output = sandbox.jobstat().assert().success().get_output().stdout.clone();
    let listing = String::from_utf8(output).unwrap();
    assert_eq!(listing, "JobID\nsvc\n", "still exactly one row");
}

#[test]
fn import_without_a_catalog_fails() {
    let sandbox = Sandbox::new();
    sandbox
        .jobcfg()
        .arg("import")
        .write_stdin("id = \"a\"\ncommand = \"true\"\n")
        .assert()
        .failure()
        .stderr(contains("unable to open the database"));
}
