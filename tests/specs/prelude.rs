//! Shared helpers for CLI specs.

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;

/// An isolated catalog environment for one spec.
pub struct Sandbox {
    pub dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("tempdir"),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("catalog.db")
    }

    /// `jobcfg` pointed at this sandbox's catalog.
    pub fn jobcfg(&self) -> Command {
        let mut cmd = Command::cargo_bin("jobcfg").expect("jobcfg binary");
        cmd.env("JOBD_DB_PATH", self.db_path());
        cmd
    }

    /// `jobstat` pointed at this sandbox's catalog.
    pub fn jobstat(&self) -> Command {
        let mut cmd = Command::cargo_bin("jobstat").expect("jobstat binary");
        cmd.env("JOBD_DB_PATH", self.db_path());
        cmd
    }

    /// Initialize the catalog, asserting success.
    pub fn init(&self) {
        self.jobcfg().arg("init").assert().success();
    }

    /// Write a manifest file under a named subdirectory.
    pub fn write_manifest(&self, subdir: &str, name: &str, content: &str) -> PathBuf {
        let dir = self.dir.path().join(subdir);
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join(name);
        std::fs::write(&path, content).expect("write manifest");
        path
    }
}
