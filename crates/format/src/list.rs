// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipe-delimited "list" workflow file format.
//!
//! The first non-blank line is a header of the form `#SHELL` or `#PYTHON`
//! (anything after a `|` on that line is ignored, matching the original
//! header-templates convention). Every following non-blank, non-comment
//! line is one task. Fields are pipe-delimited, quote-aware (a `|` inside
//! `"..."` or `'...'` does not split the field), and individually run
//! through `$ENV{VAR}` substitution.
//!
//! `SHELL` lines carry the task's shell command directly in the arguments
//! field and never name a module/worker (both are implied to be the
//! built-in shell worker). `PYTHON` lines name an explicit `module` and
//! `worker`. Checkpoint files (written by `serialize`, read back with
//! `restart: true`) additionally carry `status` and `elapsed` fields
//! between `retry_wait_time` and `name`.

use regex::Regex;
use std::sync::OnceLock;

use bg_core::TaskStatus;

use crate::model::{DependencyRef, NodeSpec, SerializedNode, WorkflowFile};
use crate::substitution::substitute_env;
use crate::FormatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Shell,
    Python,
}

impl Mode {
    fn from_header(header: &str) -> Result<Mode, FormatError> {
        let token = header
            .trim_start_matches('#')
            .split('|')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_uppercase();
        match token.as_str() {
            "SHELL" => Ok(Mode::Shell),
            "PYTHON" => Ok(Mode::Python),
            other => Err(FormatError::UnknownMode(other.to_string())),
        }
    }

    fn header_line(self) -> &'static str {
        match self {
            Mode::Shell => "#SHELL",
            Mode::Python => "#PYTHON",
        }
    }
}

fn pipe_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r#"(?:[^|"']|"[^"]*"|'[^']*')+"#).unwrap()
    })
}

fn comma_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r#"(?:[^,"']|"[^"]*"|'[^']*')+"#).unwrap()
    })
}

fn strip_quotes(s: &str) -> String {
    let t = s.trim();
    if (t.starts_with('"') && t.ends_with('"') && t.len() >= 2)
        || (t.starts_with('\'') && t.ends_with('\'') && t.len() >= 2)
    {
        t[1..t.len() - 1].to_string()
    } else {
        t.to_string()
    }
}

fn split_pipe_fields(line: &str) -> Vec<String> {
    pipe_pattern()
        .find_iter(line)
        .map(|m| m.as_str().trim_matches(|c: char| c == ' ' || c == '|').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn split_comma_fields(s: &str) -> Vec<String> {
    if s.trim().is_empty() {
        return Vec::new();
    }
    comma_pattern()
        .find_iter(s)
        .map(|m| strip_quotes(m.as_str()))
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_dependencies(field: &str) -> Vec<DependencyRef> {
    split_comma_fields(field)
        .into_iter()
        .map(|token| match token.parse::<i64>() {
            Ok(id) => DependencyRef::Id(id),
            Err(_) => DependencyRef::Name(token),
        })
        .collect()
}

pub struct ListFormat;

impl ListFormat {
    pub fn parse(text: &str, restart: bool) -> Result<WorkflowFile, FormatError> {
        let mut lines = text.lines().enumerate();
        let (_, header) = lines
            .by_ref()
            .find(|(_, l)| !l.trim().is_empty())
            .ok_or(FormatError::MissingHeader)?;
        if !header.trim_start().starts_with('#') {
            return Err(FormatError::MissingHeader);
        }
        let mode = Mode::from_header(header.trim())?;

        let mut nodes = Vec::new();
        let mut used_ids = std::collections::HashSet::new();
        for (lineno, raw) in lines {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let raw_fields = split_pipe_fields(trimmed);
            let mut fields = Vec::with_capacity(raw_fields.len());
            for f in raw_fields {
                fields.push(substitute_env(&f)?);
            }
            let node = parse_fields(mode, restart, &fields, lineno + 1)?;
            if !used_ids.insert(node.id) {
                return Err(FormatError::DuplicateId(node.id));
            }
            nodes.push(node);
        }
        Ok(WorkflowFile { nodes })
    }

    pub fn serialize(mode: Mode, nodes: &[SerializedNode]) -> String {
        let mut sorted: Vec<&SerializedNode> = nodes.iter().collect();
        sorted.sort_by_key(|n| n.id);

        let mut out = String::new();
        out.push_str(mode.header_line());
        out.push('\n');
        out.push('\n');
        for node in sorted {
            let deps = if node.parent_ids.is_empty() {
                "-1".to_string()
            } else {
                node.parent_ids
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            };
            let args = node.arguments.join(",");
            let logfile = node.logfile.clone().unwrap_or_default();
            match mode {
                Mode::Shell => {
                    out.push_str(&format!(
                        "{}|{}|{}|{}|{}|{}|{}|{}|{}\n",
                        node.id,
                        deps,
                        node.max_attempts,
                        node.retry_wait_time_secs,
                        node.status.code(),
                        node.elapsed_secs,
                        node.name,
                        args,
                        logfile,
                    ));
                }
                Mode::Python => {
                    out.push_str(&format!(
                        "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}\n",
                        node.id,
                        deps,
                        node.max_attempts,
                        node.retry_wait_time_secs,
                        node.status.code(),
                        node.elapsed_secs,
                        node.name,
                        node.module,
                        node.worker,
                        args,
                        logfile,
                    ));
                }
            }
        }
        out
    }
}

fn parse_fields(
    mode: Mode,
    restart: bool,
    fields: &[String],
    lineno: usize,
) -> Result<NodeSpec, FormatError> {
    let base = match mode {
        Mode::Shell => 7,
        Mode::Python => 9,
    };
    let expected = if restart { base + 2 } else { base };
    if fields.len() != expected {
        return Err(FormatError::FieldCount {
            line: lineno,
            expected,
            found: fields.len(),
        });
    }

    let mut idx = 0;
    let mut next = || {
        let v = &fields[idx];
        idx += 1;
        v.as_str()
    };

    let id: i64 = next()
        .parse()
        .map_err(|_| malformed(lineno, "id must be an integer"))?;
    let dependencies = parse_dependencies(next());
    let max_attempts: u32 = next()
        .parse()
        .map_err(|_| malformed(lineno, "max_attempts must be a non-negative integer"))?;
    let retry_wait_time_secs: u64 = next()
        .parse()
        .map_err(|_| malformed(lineno, "retry_wait_time must be a non-negative integer"))?;

    let status = if restart {
        let code = next();
        let status = code
            .chars()
            .next()
            .and_then(TaskStatus::from_code)
            .ok_or_else(|| malformed(lineno, "unrecognized status code"))?;
        let _elapsed_unused = next();
        Some(status)
    } else {
        None
    };

    let name = next().to_string();
    let (module, worker) = match mode {
        Mode::Shell => ("shell".to_string(), "ShellWorker".to_string()),
        Mode::Python => (next().to_string(), next().to_string()),
    };
    let arguments = split_comma_fields(next());
    let logfile_raw = next();
    let logfile = if logfile_raw.is_empty() {
        None
    } else {
        Some(logfile_raw.to_string())
    };

    Ok(NodeSpec {
        id,
        name,
        module,
        worker,
        arguments,
        logfile,
        max_attempts: max_attempts.max(1),
        retry_wait_time_secs,
        timeout_secs: None,
        dependencies,
        status,
    })
}

fn malformed(line: usize, message: &str) -> FormatError {
    FormatError::Malformed {
        line,
        message: message.to_string(),
    }
}

#[cfg(test)]
#[path = "list_tests.rs"]
mod tests;
