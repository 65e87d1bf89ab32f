//! `jobcfg init` behavior.

use crate::prelude::Sandbox;

#[test]
fn init_creates_the_catalog() {
    let sandbox = Sandbox::new();
    sandbox.jobcfg().arg("init").assert().success();
    assert!(sandbox.db_path().exists());
}

#[test]
fn init_refuses_an_existing_catalog() {
    let sandbox = Sandbox::new();
    sandbox.init();

    sandbox
        .jobcfg()
        .arg("init")
        .assert()
        .failure()
        .stderr(predicates::str::contains("already exists"));
}

#[test]
fn init_honors_the_f_flag_over_the_environment() {
    let sandbox = Sandbox::new();
    let alternate = sandbox.dir.path().join("alternate.db");

    sandbox
        .jobcfg()
        .arg("-f")
        .arg(&alternate)
        .arg("init")
        .assert()
        .success();

    assert!(alternate.exists());
    assert!(!sandbox.db_path().exists(), "env path untouched");
}

#[test]
fn unknown_subcommand_fails() {
    let sandbox = Sandbox::new();
    sandbox.jobcfg().arg("destroy").assert().failure();
}
