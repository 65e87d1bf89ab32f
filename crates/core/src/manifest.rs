// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Validated manifest record.
//!
//! The external TOML parser yields a key/value bag; [`Manifest::from_table`]
//! turns that bag into an immutable record or reports the first violated
//! field rule. Unknown keys are not errors; they accumulate in `options`
//! and survive the catalog round trip.

use crate::id::JobLabel;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use toml::Value;

/// Max length of a job label. Equivalent to FILE_MAX.
pub const LABEL_MAX: usize = 255;

/// Max length of a job command line.
pub const COMMAND_MAX: usize = 200_000;

/// Delay before a `keep_alive` job is restarted, unless the manifest
/// overrides it with the `restart_after` option.
pub const RESTART_DELAY_DEFAULT: Duration = Duration::from_secs(10);

/// Field-rule violations reported by manifest validation.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("missing required field: {0}")]
    Missing(&'static str),

    #[error("field {field}: expected {expected}")]
    Type { field: String, expected: &'static str },

    #[error("invalid job id {label:?}: {reason}")]
    Label { label: String, reason: &'static str },

    #[error("field {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("both {numeric} and {named} given; use one form")]
    CredentialConflict {
        numeric: &'static str,
        named: &'static str,
    },
}

/// In-memory form of a parsed job manifest. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Manifest {
    pub id: JobLabel,
    pub command: String,
    pub description: Option<String>,
    pub enable: bool,
    pub exclusive: bool,
    pub keep_alive: bool,
    pub environment_variables: Vec<String>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub user_name: Option<String>,
    pub group_name: Option<String>,
    pub init_groups: bool,
    pub umask: Option<u32>,
    pub root_directory: Option<PathBuf>,
    pub working_directory: Option<PathBuf>,
    pub standard_in_path: Option<PathBuf>,
    pub standard_out_path: Option<PathBuf>,
    pub standard_err_path: Option<PathBuf>,
    pub title: Option<String>,
    pub before: Vec<JobLabel>,
    pub after: Vec<JobLabel>,
    pub options: Vec<String>,
}

impl Manifest {
    /// Validate a parser key/value bag into a manifest record.
    ///
    /// Required fields: `id`, `command`. Booleans default to false
    /// except `enable`, which defaults to true.
    pub fn from_table(mut table: toml::Table) -> Result<Manifest, ManifestError> {
        let id = validate_label(
            &take_string(&mut table, "id")?.ok_or(ManifestError::Missing("id"))?,
        )?;
        let command =
            take_string(&mut table, "command")?.ok_or(ManifestError::Missing("command"))?;
        if command.is_empty() {
            return Err(ManifestError::Invalid {
                field: "command",
                message: "must not be empty".into(),
            });
        }
        if command.len() > COMMAND_MAX {
            return Err(ManifestError::Invalid {
                field: "command",
                message: format!("exceeds {COMMAND_MAX} bytes"),
            });
        }

        let mut manifest = Manifest {
            id,
            command,
            description: take_string(&mut table, "description")?,
            enable: take_bool(&mut table, "enable")?.unwrap_or(true),
            exclusive: take_bool(&mut table, "exclusive")?.unwrap_or(false),
            keep_alive: take_bool(&mut table, "keep_alive")?.unwrap_or(false),
            environment_variables: take_string_array(&mut table, "environment_variables")?,
            uid: take_u32(&mut table, "uid")?,
            gid: take_u32(&mut table, "gid")?,
            user_name: take_string(&mut table, "user_name")?,
            group_name: take_string(&mut table, "group_name")?,
            init_groups: take_bool(&mut table, "init_groups")?.unwrap_or(false),
            umask: take_umask(&mut table)?,
            root_directory: take_string(&mut table, "root_directory")?.map(PathBuf::from),
            working_directory: take_string(&mut table, "working_directory")?.map(PathBuf::from),
            standard_in_path: take_string(&mut table, "standard_in_path")?.map(PathBuf::from),
            standard_out_path: take_string(&mut table, "standard_out_path")?.map(PathBuf::from),
            standard_err_path: take_string(&mut table, "standard_err_path")?.map(PathBuf::from),
            title: take_string(&mut table, "title")?,
            before: take_labels(&mut table, "before")?,
            after: take_labels(&mut table, "after")?,
            options: take_string_array(&mut table, "options")?,
        };

        for entry in &manifest.environment_variables {
            validate_env_entry(entry)?;
        }
        if manifest.uid.is_some() && manifest.user_name.is_some() {
            return Err(ManifestError::CredentialConflict {
                numeric: "uid",
                named: "user_name",
            });
        }
        if manifest.gid.is_some() && manifest.group_name.is_some() {
            return Err(ManifestError::CredentialConflict {
                numeric: "gid",
                named: "group_name",
            });
        }

        // Recognized option keys are validated here but carried in the
        // free-form options list, which is what the catalog persists.
        if let Some(value) = table.remove("restart_after") {
            let rendered = render_option("restart_after", &value);
            parse_restart_after(&value)?;
            manifest.options.push(rendered);
        }

        // Everything left over is an unknown key; preserve it.
        for (key, value) in table {
            manifest.options.push(render_option(&key, &value));
        }

        Ok(manifest)
    }

    /// Restart delay for this job: the `restart_after` option if present
    /// and well-formed, the default otherwise.
    pub fn restart_after(&self) -> Duration {
        self.options
            .iter()
            .find_map(|opt| {
                let rest = opt.strip_prefix("restart_after")?;
                let rest = rest.trim_start().strip_prefix('=')?.trim();
                parse_duration(rest.trim_matches('"')).ok()
            })
            .unwrap_or(RESTART_DELAY_DEFAULT)
    }
}

fn render_option(key: &str, value: &Value) -> String {
    format!("{key} = {value}")
}

fn validate_label(label: &str) -> Result<JobLabel, ManifestError> {
    if label.is_empty() {
        return Err(ManifestError::Label {
            label: label.into(),
            reason: "must not be empty",
        });
    }
    if label.len() > LABEL_MAX {
        return Err(ManifestError::Label {
            label: label.into(),
            reason: "longer than 255 characters",
        });
    }
    if label == "." || label == ".." {
        return Err(ManifestError::Label {
            label: label.into(),
            reason: "reserved name",
        });
    }
    if label.contains('/') || label.contains('\0') {
        return Err(ManifestError::Label {
            label: label.into(),
            reason: "must be filename-safe",
        });
    }
    Ok(JobLabel::new(label))
}

fn validate_env_entry(entry: &str) -> Result<(), ManifestError> {
    match entry.split_once('=') {
        Some((name, _)) if !name.is_empty() => Ok(()),
        _ => Err(ManifestError::Invalid {
            field: "environment_variables",
            message: format!("entry {entry:?} is not NAME=VALUE"),
        }),
    }
}

fn parse_restart_after(value: &Value) -> Result<Duration, ManifestError> {
    match value {
        Value::Integer(secs) if *secs >= 0 => Ok(Duration::from_secs(*secs as u64)),
        Value::String(s) => parse_duration(s).map_err(|message| ManifestError::Invalid {
            field: "restart_after",
            message,
        }),
        _ => Err(ManifestError::Type {
            field: "restart_after".into(),
            expected: "seconds or duration string",
        }),
    }
}

/// Parse a duration string like "30s", "5m", "1h" into a Duration.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the numeric prefix
    let (num_str, suffix) = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| (&s[..i], &s[i..]))
        .unwrap_or((s, ""));

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid number in duration: {}", s))?;

    let multiplier = match suffix.trim() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
        other => return Err(format!("unknown duration suffix: {}", other)),
    };

    Ok(Duration::from_secs(num * multiplier))
}

fn take_string(table: &mut toml::Table, field: &'static str) -> Result<Option<String>, ManifestError> {
    match table.remove(field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ManifestError::Type {
            field: field.into(),
            expected: "string",
        }),
    }
}

fn take_bool(table: &mut toml::Table, field: &'static str) -> Result<Option<bool>, ManifestError> {
    match table.remove(field) {
        None => Ok(None),
        Some(Value::Boolean(b)) => Ok(Some(b)),
        Some(_) => Err(ManifestError::Type {
            field: field.into(),
            expected: "boolean",
        }),
    }
}

fn take_u32(table: &mut toml::Table, field: &'static str) -> Result<Option<u32>, ManifestError> {
    match table.remove(field) {
        None => Ok(None),
        Some(Value::Integer(n)) if n >= 0 && n <= i64::from(u32::MAX) => Ok(Some(n as u32)),
        Some(_) => Err(ManifestError::Type {
            field: field.into(),
            expected: "non-negative integer",
        }),
    }
}

fn take_string_array(
    table: &mut toml::Table,
    field: &'static str,
) -> Result<Vec<String>, ManifestError> {
    match table.remove(field) {
        None => Ok(Vec::new()),
        Some(Value::Array(values)) => values
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Ok(s),
                _ => Err(ManifestError::Type {
                    field: field.into(),
                    expected: "array of strings",
                }),
            })
            .collect(),
        Some(_) => Err(ManifestError::Type {
            field: field.into(),
            expected: "array of strings",
        }),
    }
}

fn take_labels(
    table: &mut toml::Table,
    field: &'static str,
) -> Result<Vec<JobLabel>, ManifestError> {
    take_string_array(table, field)?
        .iter()
        .map(|s| validate_label(s))
        .collect()
}

/// `umask` is written as an octal string ("022") or a literal mode
/// integer; either way it must fit in the permission bits.
fn take_umask(table: &mut toml::Table) -> Result<Option<u32>, ManifestError> {
    let mode = match table.remove("umask") {
        None => return Ok(None),
        Some(Value::String(s)) => u32::from_str_radix(&s, 8).map_err(|_| ManifestError::Invalid {
            field: "umask",
            message: format!("{s:?} is not an octal mode"),
        })?,
        Some(Value::Integer(n)) if n >= 0 => n as u32,
        Some(_) => {
            return Err(ManifestError::Type {
                field: "umask".into(),
                expected: "octal string or integer",
            })
        }
    };
    if mode > 0o777 {
        return Err(ManifestError::Invalid {
            field: "umask",
            message: format!("mode {mode:o} out of range"),
        });
    }
    Ok(Some(mode))
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
