//! `jobd` daemon lifecycle, end to end.

use crate::prelude::Sandbox;
use serial_test::serial;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

fn jobd_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("jobd")
}

/// Poll the job's status record until it shows a live pid.
fn wait_for_pid(status_path: &PathBuf) -> i64 {
    let deadline = Instant::now() + Duration::from_secs(15);
    loop {
        if let Ok(text) = std::fs::read_to_string(status_path) {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(&text) {
                let pid = json["Pid"].as_i64().unwrap_or(0);
                if pid > 0 {
                    assert_eq!(json["JobStatusAPI"], 0);
                    return pid;
                }
            }
        }
        assert!(
            Instant::now() < deadline,
            "daemon never started the job (no pid in {})",
            status_path.display()
        );
        std::thread::sleep(Duration::from_millis(100));
    }
}

fn wait_for_exit(child: &mut std::process::Child) -> std::process::ExitStatus {
    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        if let Some(status) = child.try_wait().expect("try_wait") {
            return status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            panic!("daemon did not exit within the shutdown window");
        }
        std::thread::sleep(Duration::from_millis(100));
    }
}

#[test]
#[serial]
fn daemon_starts_jobs_and_drains_on_sigterm() {
    let sandbox = Sandbox::new();
    sandbox.init();
    sandbox
        .jobcfg()
        .arg("import")
        .write_stdin("id = \"svc\"\ncommand = \"sleep 30\"\n")
        .assert()
        .success();

    let runtime = sandbox.dir.path().join("run");
    let mut daemon = Command::new(jobd_bin())
        .env("JOBD_DB_PATH", sandbox.db_path())
        .env("JOBD_RUNTIME_DIR", &runtime)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn jobd");

    let pid = wait_for_pid(&runtime.join("svc.json"));
    assert!(pid > 0);

    // a second instance must refuse the lock while the first lives
    let second = Command::new(jobd_bin())
        .env("JOBD_DB_PATH", sandbox.db_path())
        .env("JOBD_RUNTIME_DIR", &runtime)
        .output()
        .expect("run second jobd");
    assert!(!second.status.success());
    assert!(String::from_utf8_lossy(&second.stderr).contains("already running"));

    // orderly shutdown: TERM the daemon, it stops the child and exits 0
    let terminated = Command::new("kill")
        .arg("-TERM")
        .arg(daemon.id().to_string())
        .status()
        .expect("send SIGTERM");
    assert!(terminated.success());

    let status = wait_for_exit(&mut daemon);
    assert!(status.success(), "daemon exit: {status:?}");

    // the child is gone too: its status record shows no live pid
    let text = std::fs::read_to_string(runtime.join("svc.json")).expect("status record");
    let json: serde_json::Value = serde_json::from_str(&text).expect("status json");
    assert_eq!(json["Pid"], 0);
    assert_eq!(json["Label"], "svc");
}
