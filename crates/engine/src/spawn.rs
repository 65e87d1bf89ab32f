// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child process configuration.
//!
//! Everything order-sensitive happens in one `pre_exec` closure so the
//! sequence is exactly: chroot, chdir, umask, supplementary groups,
//! gid, uid. That runs after the stdio descriptors are in place and
//! before exec. The closure only calls async-signal-safe nix wrappers
//! on values prepared in the parent.
//!
//! The supervisor performs no quoting: the command line goes to
//! `/bin/sh -c` verbatim and the manifest author owns its shell
//! semantics.

use crate::error::StartError;
use jobd_core::{Manifest, Pid};
use nix::unistd::{Gid, Uid, User};
use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsFd;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};

const SHELL: &str = "/bin/sh";

/// Credential switch applied in the child, groups before uid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Switch {
    pub uid: Option<Uid>,
    pub gid: Option<Gid>,
    pub groups: Option<Vec<Gid>>,
}

/// Resolved execution identity: who the child runs as and the env
/// values derived from that.
#[derive(Debug, Clone)]
pub struct Identity {
    pub switch: Option<Switch>,
    pub home: PathBuf,
    pub shell: PathBuf,
    pub user: Option<String>,
}

/// Resolve manifest credentials against the password database.
///
/// `user_name` wins over numeric `uid` (the manifest validator rejects
/// both at once); with neither, the child inherits the supervisor's
/// identity and only the env derivation consults the database.
pub fn resolve_identity(manifest: &Manifest) -> Result<Identity, StartError> {
    if let Some(name) = &manifest.user_name {
        let user = User::from_name(name)
            .map_err(|e| StartError::Credentials(format!("lookup of user {name}: {e}")))?
            .ok_or_else(|| StartError::Credentials(format!("no such user: {name}")))?;
        let gid = resolve_gid(manifest)?.unwrap_or(user.gid);
        let groups = resolve_groups(manifest, Some(&user.name), gid)?;
        return Ok(Identity {
            switch: Some(Switch {
                uid: Some(user.uid),
                gid: Some(gid),
                groups: Some(groups),
            }),
            home: user.dir,
            shell: user.shell,
            user: Some(user.name),
        });
    }

    if let Some(uid) = manifest.uid {
        let uid = Uid::from_raw(uid);
        let user = User::from_uid(uid)
            .map_err(|e| StartError::Credentials(format!("lookup of uid {uid}: {e}")))?;
        let gid = match resolve_gid(manifest)? {
            Some(gid) => gid,
            None => user
                .as_ref()
                .map(|u| u.gid)
                .ok_or_else(|| {
                    StartError::Credentials(format!("uid {uid} has no passwd entry; gid required"))
                })?,
        };
        let groups = resolve_groups(manifest, user.as_ref().map(|u| u.name.as_str()), gid)?;
        let (home, shell, name) = match user {
            Some(u) => (u.dir, u.shell, Some(u.name)),
            None => (PathBuf::from("/"), PathBuf::from(SHELL), None),
        };
        return Ok(Identity {
            switch: Some(Switch {
                uid: Some(uid),
                gid: Some(gid),
                groups: Some(groups),
            }),
            home,
            shell,
            user: name,
        });
    }

    // No uid switch. A bare gid/group_name still applies.
    let switch = resolve_gid(manifest)?.map(|gid| Switch {
        uid: None,
        gid: Some(gid),
        groups: Some(vec![gid]),
    });

    let current = User::from_uid(nix::unistd::geteuid())
        .map_err(|e| StartError::Credentials(format!("lookup of current user: {e}")))?;
    let (home, shell, name) = match current {
        Some(u) => (u.dir, u.shell, Some(u.name)),
        None => (PathBuf::from("/"), PathBuf::from(SHELL), None),
    };
    Ok(Identity {
        switch,
        home,
        shell,
        user: name,
    })
}

fn resolve_gid(manifest: &Manifest) -> Result<Option<Gid>, StartError> {
    if let Some(name) = &manifest.group_name {
        let group = nix::unistd::Group::from_name(name)
            .map_err(|e| StartError::Credentials(format!("lookup of group {name}: {e}")))?
            .ok_or_else(|| StartError::Credentials(format!("no such group: {name}")))?;
        return Ok(Some(group.gid));
    }
    Ok(manifest.gid.map(Gid::from_raw))
}

/// Supplementary groups: the full password-database set when
/// `init_groups` is on, just the primary group otherwise.
fn resolve_groups(
    manifest: &Manifest,
    user_name: Option<&str>,
    gid: Gid,
) -> Result<Vec<Gid>, StartError> {
    if manifest.init_groups {
        let name = user_name.ok_or_else(|| {
            StartError::Credentials("init_groups requires a named user".to_string())
        })?;
        let cname = CString::new(name)
            .map_err(|_| StartError::Credentials(format!("user name {name:?} contains NUL")))?;
        let groups = nix::unistd::getgrouplist(&cname, gid)
            .map_err(|e| StartError::Credentials(format!("getgrouplist for {name}: {e}")))?;
        return Ok(groups);
    }
    Ok(vec![gid])
}

/// Assemble the fully configured command for a job.
///
/// Stdio files are opened in the parent, so redirect paths are host
/// paths even when the job chroots.
pub fn build_command(manifest: &Manifest, identity: &Identity) -> Result<Command, StartError> {
    let mut cmd = Command::new(SHELL);
    cmd.arg("-c").arg(&manifest.command);

    // Environment: exactly the manifest list, plus values derived from
    // the resolved identity. Manifest entries win on collision.
    cmd.env_clear();
    cmd.env("HOME", &identity.home);
    cmd.env("SHELL", &identity.shell);
    if let Some(user) = &identity.user {
        cmd.env("USER", user);
        cmd.env("LOGNAME", user);
    }
    for entry in &manifest.environment_variables {
        let (name, value) = entry
            .split_once('=')
            .ok_or_else(|| StartError::Environment(entry.clone()))?;
        cmd.env(name, value);
    }

    // Only these three descriptors survive into the child; everything
    // else the supervisor holds is close-on-exec.
    cmd.stdin(open_stdin(manifest.standard_in_path.as_deref())?);
    cmd.stdout(open_output(manifest.standard_out_path.as_deref())?);
    cmd.stderr(open_output(manifest.standard_err_path.as_deref())?);

    // Values the child-side closure needs, prepared up front: no
    // allocation or lookup between fork and exec.
    let root_dir = manifest
        .root_directory
        .as_deref()
        .map(path_cstring)
        .transpose()?;
    let workdir = path_cstring(&workdir_of(manifest, identity))?;
    let mask = manifest
        .umask
        .map(nix::sys::stat::Mode::from_bits_truncate);
    let switch = identity.switch.clone();

    let configure = move || -> io::Result<()> {
        if let Some(root) = &root_dir {
            nix::unistd::chroot(root.as_c_str()).map_err(io::Error::from)?;
        }
        nix::unistd::chdir(workdir.as_c_str()).map_err(io::Error::from)?;
        if let Some(mask) = mask {
            nix::sys::stat::umask(mask);
        }
        if let Some(switch) = &switch {
            if let Some(groups) = &switch.groups {
                nix::unistd::setgroups(groups).map_err(io::Error::from)?;
            }
            if let Some(gid) = switch.gid {
                nix::unistd::setgid(gid).map_err(io::Error::from)?;
            }
            if let Some(uid) = switch.uid {
                nix::unistd::setuid(uid).map_err(io::Error::from)?;
            }
        }
        Ok(())
    };
    // SAFETY: the closure runs between fork and exec; it touches only
    // pre-built CStrings and issues direct syscalls via nix.
    unsafe {
        cmd.pre_exec(configure);
    }

    Ok(cmd)
}

/// Fork the job's child process, returning the handle and its pid.
pub fn spawn_job(manifest: &Manifest, identity: &Identity) -> Result<(Child, Pid), StartError> {
    let mut cmd = build_command(manifest, identity)?;
    let child = cmd.spawn()?;
    let pid = child
        .id()
        .map(|id| Pid(id as i32))
        .ok_or_else(|| StartError::Spawn(io::Error::other("child reaped before registration")))?;
    Ok((child, pid))
}

/// Default stdin is /dev/null, read-only.
fn open_stdin(path: Option<&Path>) -> Result<Stdio, StartError> {
    let path = path.unwrap_or_else(|| Path::new("/dev/null"));
    let file = File::open(path).map_err(|source| StartError::Redirect {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Stdio::from(file))
}

/// Output defaults to the supervisor's stderr; a configured path is
/// opened append-create with mode 0600.
fn open_output(path: Option<&Path>) -> Result<Stdio, StartError> {
    match path {
        Some(path) => {
            let file = OpenOptions::new()
                .append(true)
                .create(true)
                .mode(0o600)
                .open(path)
                .map_err(|source| StartError::Redirect {
                    path: path.to_path_buf(),
                    source,
                })?;
            Ok(Stdio::from(file))
        }
        None => {
            let fd = io::stderr()
                .as_fd()
                .try_clone_to_owned()
                .map_err(StartError::Spawn)?;
            Ok(Stdio::from(fd))
        }
    }
}

fn workdir_of(manifest: &Manifest, identity: &Identity) -> PathBuf {
    if let Some(dir) = &manifest.working_directory {
        return dir.clone();
    }
    // resolved home, else /
    if identity.home.is_dir() {
        identity.home.clone()
    } else {
        PathBuf::from("/")
    }
}

fn path_cstring(path: &Path) -> Result<CString, StartError> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        StartError::Spawn(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("path {} contains NUL", path.display()),
        ))
    })
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
