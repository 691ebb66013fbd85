// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Three-tier configuration resolver: an explicitly set value always wins,
//! then the field's declared environment variable, then its declared
//! default. Nothing is cached — every read re-resolves through all three
//! tiers, so a test can mutate `std::env` between reads and see it reflected
//! immediately.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown config key: {0}")]
    UnknownKey(String),
    #[error("config key {key} expects a {expected} value, got {value:?}")]
    InvalidValue {
        key: String,
        expected: &'static str,
        value: String,
    },
    #[error("config source file not found: {}", .0.display())]
    SourceFileNotFound(PathBuf),
    #[error("failed to source config file {}: {source}", .path.display())]
    SourceFileExec {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("sourcing config file {} exited with status {status}", .path.display())]
    SourceFileFailed { path: PathBuf, status: i32 },
}

/// The primitive type a declared field resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Bool,
    Int,
}

#[derive(Debug, Clone)]
enum DefaultValue {
    Str(&'static str),
    Bool(bool),
    Int(i64),
}

#[derive(Debug, Clone)]
struct FieldSpec {
    name: &'static str,
    kind: FieldKind,
    env_var: Option<&'static str>,
    default: DefaultValue,
    /// Whether this key is written into the `.ctx` resume file.
    preserve: bool,
}

fn schema() -> &'static [FieldSpec] {
    const FIELDS: &[FieldSpec] = &[
        FieldSpec {
            name: "app_name",
            kind: FieldKind::Str,
            env_var: Some("APP_NAME"),
            default: DefaultValue::Str("batchgraph"),
            preserve: true,
        },
        FieldSpec {
            name: "app_start_time",
            kind: FieldKind::Str,
            env_var: None,
            default: DefaultValue::Str(""),
            preserve: true,
        },
        FieldSpec {
            name: "app_root_dir",
            kind: FieldKind::Str,
            env_var: Some("APP_ROOT_DIR"),
            default: DefaultValue::Str("."),
            preserve: true,
        },
        FieldSpec {
            name: "config_dir",
            kind: FieldKind::Str,
            env_var: Some("APP_CONFIG_DIR"),
            default: DefaultValue::Str("./config"),
            preserve: true,
        },
        FieldSpec {
            name: "temp_dir",
            kind: FieldKind::Str,
            env_var: Some("APP_TEMP_DIR"),
            default: DefaultValue::Str("/tmp"),
            preserve: true,
        },
        FieldSpec {
            name: "log_dir",
            kind: FieldKind::Str,
            env_var: Some("APP_LOG_DIR"),
            default: DefaultValue::Str("./logs"),
            preserve: true,
        },
        FieldSpec {
            name: "root_log_dir",
            kind: FieldKind::Str,
            env_var: Some("APP_ROOT_LOG_DIR"),
            default: DefaultValue::Str("./logs"),
            preserve: true,
        },
        FieldSpec {
            name: "worker_dir",
            kind: FieldKind::Str,
            env_var: Some("APP_WORKER_DIR"),
            default: DefaultValue::Str("./workers"),
            preserve: true,
        },
        FieldSpec {
            name: "nozip",
            kind: FieldKind::Bool,
            env_var: Some("APP_NOZIP"),
            default: DefaultValue::Bool(false),
            preserve: false,
        },
        FieldSpec {
            name: "dump_logs",
            kind: FieldKind::Bool,
            env_var: Some("APP_DUMP_LOGS"),
            default: DefaultValue::Bool(false),
            preserve: false,
        },
        FieldSpec {
            name: "email",
            kind: FieldKind::Str,
            env_var: Some("APP_EMAIL"),
            default: DefaultValue::Str(""),
            preserve: true,
        },
        FieldSpec {
            name: "debug",
            kind: FieldKind::Bool,
            env_var: Some("APP_DEBUG"),
            default: DefaultValue::Bool(false),
            preserve: false,
        },
        FieldSpec {
            name: "tickrate",
            kind: FieldKind::Int,
            env_var: Some("APP_TICKRATE"),
            default: DefaultValue::Int(10),
            preserve: true,
        },
        FieldSpec {
            name: "save_interval",
            kind: FieldKind::Int,
            env_var: Some("APP_SAVE_INTERVAL"),
            default: DefaultValue::Int(60),
            preserve: true,
        },
        FieldSpec {
            name: "time_between_tasks",
            kind: FieldKind::Int,
            env_var: Some("APP_TIME_BETWEEN_TASKS"),
            default: DefaultValue::Int(0),
            preserve: true,
        },
        FieldSpec {
            name: "max_procs",
            kind: FieldKind::Int,
            env_var: Some("APP_MAX_PROCS"),
            default: DefaultValue::Int(0),
            preserve: true,
        },
        FieldSpec {
            name: "log_retention",
            kind: FieldKind::Int,
            env_var: Some("APP_LOG_RETENTION"),
            default: DefaultValue::Int(-1),
            preserve: true,
        },
        FieldSpec {
            name: "dryrun",
            kind: FieldKind::Bool,
            env_var: Some("APP_DRYRUN"),
            default: DefaultValue::Bool(false),
            preserve: false,
        },
        FieldSpec {
            name: "email_on_fail",
            kind: FieldKind::Bool,
            env_var: Some("APP_EMAIL_ON_FAIL"),
            default: DefaultValue::Bool(false),
            preserve: true,
        },
        FieldSpec {
            name: "email_on_success",
            kind: FieldKind::Bool,
            env_var: Some("APP_EMAIL_ON_SUCCESS"),
            default: DefaultValue::Bool(false),
            preserve: true,
        },
        FieldSpec {
            name: "test_mode",
            kind: FieldKind::Bool,
            env_var: Some("APP_TEST_MODE"),
            default: DefaultValue::Bool(false),
            preserve: false,
        },
    ];
    FIELDS
}

/// Three-tier configuration: explicit overrides, environment variables,
/// declared defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    overrides: HashMap<String, String>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            overrides: HashMap::new(),
        }
    }

    fn field(&self, key: &str) -> Result<&'static FieldSpec, ConfigError> {
        schema()
            .iter()
            .find(|f| f.name == key)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))
    }

    fn raw(&self, key: &str, spec: &FieldSpec) -> Option<String> {
        if let Some(v) = self.overrides.get(key) {
            return Some(v.clone());
        }
        if let Some(env_var) = spec.env_var {
            if let Ok(v) = std::env::var(env_var) {
                return Some(v);
            }
        }
        None
    }

    pub fn contains(&self, key: &str) -> bool {
        schema().iter().any(|f| f.name == key)
    }

    pub fn kind_of(&self, key: &str) -> Result<FieldKind, ConfigError> {
        Ok(self.field(key)?.kind)
    }

    pub fn get_str(&self, key: &str) -> Result<String, ConfigError> {
        let spec = self.field(key)?;
        Ok(match self.raw(key, spec) {
            Some(v) => v,
            None => match spec.default {
                DefaultValue::Str(s) => s.to_string(),
                DefaultValue::Bool(b) => b.to_string(),
                DefaultValue::Int(i) => i.to_string(),
            },
        })
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        let spec = self.field(key)?;
        match self.raw(key, spec) {
            // An explicit/env value of "FALSE" (any case) is false; anything
            // else present is true.
            Some(v) => Ok(!v.trim().eq_ignore_ascii_case("false")),
            None => match spec.default {
                DefaultValue::Bool(b) => Ok(b),
                _ => Ok(false),
            },
        }
    }

    pub fn get_int(&self, key: &str) -> Result<i64, ConfigError> {
        let spec = self.field(key)?;
        match self.raw(key, spec) {
            Some(v) => v.trim().parse::<i64>().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                expected: "integer",
                value: v,
            }),
            None => match spec.default {
                DefaultValue::Int(i) => Ok(i),
                _ => Ok(0),
            },
        }
    }

    /// Explicitly set a value, overriding both its environment variable and
    /// default for the lifetime of this `Config`.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<(), ConfigError> {
        self.field(key)?;
        self.overrides.insert(key.to_string(), value.into());
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Result<(), ConfigError> {
        self.field(key)?;
        self.overrides.remove(key);
        Ok(())
    }

    /// Iterate `(key, resolved value)` pairs. When `only_preserve` is set,
    /// only fields marked for checkpoint persistence are yielded.
    pub fn items(&self, only_preserve: bool) -> Vec<(String, String)> {
        schema()
            .iter()
            .filter(|f| !only_preserve || f.preserve)
            .map(|f| (f.name.to_string(), self.get_str(f.name).unwrap_or_default()))
            .collect()
    }

    pub fn ctllog_file(&self) -> Result<PathBuf, ConfigError> {
        Ok(PathBuf::from(self.get_str("temp_dir")?).join(format!("{}.ctllog", self.get_str("app_name")?)))
    }

    pub fn ctx_file(&self) -> Result<PathBuf, ConfigError> {
        Ok(PathBuf::from(self.get_str("temp_dir")?).join(format!("{}.ctx", self.get_str("app_name")?)))
    }

    /// Source a shell file and import any `APP_*` variables it exports into
    /// this process's environment, making them visible to subsequent `get_*`
    /// calls through the environment-variable tier.
    pub fn source_config_file(&self, path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            return Err(ConfigError::SourceFileNotFound(path.to_path_buf()));
        }
        let script = format!("source {} && env", shell_quote(path));
        let output = Command::new("bash")
            .arg("-c")
            .arg(&script)
            .output()
            .map_err(|source| ConfigError::SourceFileExec {
                path: path.to_path_buf(),
                source,
            })?;
        if !output.status.success() {
            return Err(ConfigError::SourceFileFailed {
                path: path.to_path_buf(),
                status: output.status.code().unwrap_or(-1),
            });
        }
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            if let Some((key, value)) = line.split_once('=') {
                if key.starts_with("APP_") {
                    std::env::set_var(key, value);
                }
            }
        }
        Ok(())
    }
}

fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', "'\\''"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
