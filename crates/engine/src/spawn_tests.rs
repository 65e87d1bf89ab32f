// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use jobd_core::Manifest;
use tempfile::TempDir;

fn manifest(src: &str) -> Manifest {
    Manifest::from_table(toml::from_str(src).unwrap()).unwrap()
}

#[test]
fn identity_without_credentials_does_not_switch() {
    let identity = resolve_identity(&manifest(r#"
        id = "a"
        command = "true"
    "#))
    .unwrap();
    assert!(identity.switch.is_none());
    assert!(!identity.home.as_os_str().is_empty());
}

#[test]
fn unknown_user_name_is_a_credential_error() {
    let err = resolve_identity(&manifest(
        r#"
        id = "a"
        command = "true"
        user_name = "no-such-user-jobd"
        "#,
    ))
    .unwrap_err();
    assert!(matches!(err, StartError::Credentials(_)));
}

#[test]
fn numeric_uid_of_root_resolves_identity() {
    let identity = resolve_identity(&manifest(
        r#"
        id = "a"
        command = "true"
        uid = 0
        "#,
    ))
    .unwrap();
    let switch = identity.switch.unwrap();
    assert_eq!(switch.uid, Some(Uid::from_raw(0)));
    assert!(switch.gid.is_some(), "gid comes from the passwd entry");
    assert_eq!(identity.user.as_deref(), Some("root"));
}

#[tokio::test]
async fn child_exit_codes_come_back() {
    let m = manifest(r#"
        id = "a"
        command = "exit 7"
    "#);
    let identity = resolve_identity(&m).unwrap();
    let (mut child, pid) = spawn_job(&m, &identity).unwrap();
    assert!(pid.as_i32() > 0);

    let status = child.wait().await.unwrap();
    assert_eq!(status.code(), Some(7));
}

#[tokio::test]
async fn stdout_redirects_append_to_the_named_file() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out.log");
    let m = Manifest {
        standard_out_path: Some(out.clone()),
        ..manifest(r#"
            id = "a"
            command = "echo first"
        "#)
    };
    let identity = resolve_identity(&m).unwrap();

    let (mut child, _) = spawn_job(&m, &identity).unwrap();
    child.wait().await.unwrap();

    let m2 = Manifest { command: "echo second".into(), ..m };
    let (mut child, _) = spawn_job(&m2, &identity).unwrap();
    child.wait().await.unwrap();

    let content = std::fs::read_to_string(&out).unwrap();
    assert_eq!(content, "first\nsecond\n");

    let mode = std::os::unix::fs::PermissionsExt::mode(
        &std::fs::metadata(&out).unwrap().permissions(),
    );
    assert_eq!(mode & 0o777, 0o600);
}

#[tokio::test]
async fn environment_is_replaced_not_inherited() {
    // a marker that must NOT leak into the child
    std::env::set_var("JOBD_SPAWN_TEST_MARKER", "leaked");

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("env.out");
    let m = Manifest {
        standard_out_path: Some(out.clone()),
        ..manifest(
            r#"
            id = "a"
            command = "env"
            environment_variables = ["FOO=bar"]
            "#,
        )
    };
    let identity = resolve_identity(&m).unwrap();
    let (mut child, _) = spawn_job(&m, &identity).unwrap();
    child.wait().await.unwrap();

    let content = std::fs::read_to_string(&out).unwrap();
    assert!(content.lines().any(|l| l == "FOO=bar"));
    assert!(content.lines().any(|l| l.starts_with("HOME=")));
    assert!(content.lines().any(|l| l.starts_with("SHELL=")));
    assert!(!content.contains("JOBD_SPAWN_TEST_MARKER"));
}

#[tokio::test]
async fn umask_applies_in_the_child() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("umask.out");
    let m = Manifest {
        standard_out_path: Some(out.clone()),
        ..manifest(
            r#"
            id = "a"
            command = "umask"
            umask = "027"
            "#,
        )
    };
    let identity = resolve_identity(&m).unwrap();
    let (mut child, _) = spawn_job(&m, &identity).unwrap();
    child.wait().await.unwrap();

    let content = std::fs::read_to_string(&out).unwrap();
    assert_eq!(content.trim(), "0027");
}

#[tokio::test]
async fn working_directory_is_honored() {
    let dir = TempDir::new().unwrap();
    let workdir = dir.path().canonicalize().unwrap();
    let out = dir.path().join("pwd.out");
    let m = Manifest {
        standard_out_path: Some(out.clone()),
        working_directory: Some(workdir.clone()),
        ..manifest(r#"
            id = "a"
            command = "pwd"
        "#)
    };
    let identity = resolve_identity(&m).unwrap();
    let (mut child, _) = spawn_job(&m, &identity).unwrap();
    child.wait().await.unwrap();

    let content = std::fs::read_to_string(&out).unwrap();
    assert_eq!(content.trim(), workdir.display().to_string());
}

#[tokio::test]
async fn stdin_defaults_to_dev_null() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("stdin.out");
    let m = Manifest {
        standard_out_path: Some(out.clone()),
        ..manifest(
            r#"
            id = "a"
            command = "wc -c"
            "#,
        )
    };
    let identity = resolve_identity(&m).unwrap();
    let (mut child, _) = spawn_job(&m, &identity).unwrap();
    child.wait().await.unwrap();

    let content = std::fs::read_to_string(&out).unwrap();
    assert_eq!(content.trim(), "0");
}

#[test]
fn unwritable_redirect_path_fails_before_fork() {
    let m = Manifest {
        standard_out_path: Some(PathBuf::from("/no-such-dir-jobd/out.log")),
        ..manifest(r#"
            id = "a"
            command = "true"
        "#)
    };
    let identity = resolve_identity(&m).unwrap();
    let err = build_command(&m, &identity).unwrap_err();
    assert!(matches!(err, StartError::Redirect { .. }));
}
