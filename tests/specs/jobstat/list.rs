//! `jobstat` behavior.

use crate::prelude::Sandbox;
use predicates::str::contains;

#[test]
fn empty_catalog_prints_only_the_header() {
    let sandbox = Sandbox::new();
    sandbox.init();

    let output = sandbox.jobstat().assert().success().get_output().stdout.clone();
    assert_eq!(String::from_utf8(output).unwrap(), "JobID\n");
}

#[test]
fn labels_come_out_sorted_one_per_line() {
    let sandbox = Sandbox::new();
    sandbox.init();
    for id in ["zeta", "alpha", "mid"] {
        sandbox
            .jobcfg()
            .arg("import")
            .write_stdin(format!("id = \"{id}\"\ncommand = \"true\"\n"))
            .assert()
            .success();
    }

    let output = sandbox.jobstat().assert().success().get_output().stdout.clone();
    assert_eq!(
        String::from_utf8(output).unwrap(),
        "JobID\nalpha\nmid\nzeta\n"
    );
}

#[test]
fn missing_catalog_is_a_failure() {
    let sandbox = Sandbox::new();
    sandbox
        .jobstat()
        .assert()
        .failure()
        .stderr(contains("unable to open the database"));
}
