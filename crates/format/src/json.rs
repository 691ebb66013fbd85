// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON workflow file format: `{"tasks": {name: {module, worker, ...}}}`.
//! Unlike the list format, a task's id is not written explicitly — ids are
//! assigned in the order tasks appear in the file, matching the
//! auto-increment behavior of the register's node-adding path. Dependencies
//! are referenced by name.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use bg_core::TaskStatus;

use crate::model::{DependencyRef, NodeSpec, SerializedNode, WorkflowFile};
use crate::substitution::substitute_env;
use crate::FormatError;

#[derive(Debug, Deserialize)]
struct RawFile {
    tasks: HashMap<String, RawTask>,
}

#[derive(Debug, Deserialize)]
struct RawTask {
    module: String,
    worker: String,
    #[serde(default)]
    logfile: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    max_attempts: Option<u32>,
    #[serde(default)]
    retry_wait_time: Option<u64>,
    #[serde(default)]
    arguments: Vec<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutFile {
    tasks: indexmap::IndexMap<String, OutTask>,
}

#[derive(Debug, Serialize)]
struct OutTask {
    module: String,
    worker: String,
    logfile: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_wait_time: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    arguments: Vec<String>,
}

pub struct JsonFormat;

impl JsonFormat {
    pub fn parse(text: &str, restart: bool) -> Result<WorkflowFile, FormatError> {
        let raw_value: Value = serde_json::from_str(text)?;
        let substituted = substitute_value(raw_value)?;
        let raw: RawFile = serde_json::from_value(substituted)?;

        let mut nodes = Vec::new();
        let mut seen_names = std::collections::HashSet::new();
        for (index, (name, task)) in raw.tasks.into_iter().enumerate() {
            if !seen_names.insert(name.clone()) {
                return Err(FormatError::DuplicateName(name));
            }
            let status = if restart {
                match task.status.as_deref() {
                    Some(code) => Some(
                        code.chars()
                            .next()
                            .and_then(TaskStatus::from_code)
                            .ok_or_else(|| FormatError::Malformed {
                                line: 0,
                                message: format!("unrecognized status code {code:?} for task {name:?}"),
                            })?,
                    ),
                    None => None,
                }
            } else {
                None
            };
            let dependencies = if task.dependencies.is_empty() {
                vec![DependencyRef::Id(-1)]
            } else {
                task.dependencies.into_iter().map(DependencyRef::Name).collect()
            };
            nodes.push(NodeSpec {
                id: index as i64,
                name,
                module: task.module,
                worker: task.worker,
                arguments: task.arguments,
                logfile: task.logfile,
                max_attempts: task.max_attempts.unwrap_or(1).max(1),
                retry_wait_time_secs: task.retry_wait_time.unwrap_or(0),
                timeout_secs: None,
                dependencies,
                status,
            });
        }
        Ok(WorkflowFile { nodes })
    }

    pub fn serialize(nodes: &[SerializedNode], node_name_of: impl Fn(i64) -> String) -> Result<String, FormatError> {
        let mut tasks = indexmap::IndexMap::new();
        let mut sorted: Vec<&SerializedNode> = nodes.iter().collect();
        sorted.sort_by_key(|n| n.id);
        for node in sorted {
            let dependencies: Vec<String> = node
                .parent_ids
                .iter()
                .map(|id| node_name_of(*id))
                .collect();
            tasks.insert(
                node.name.clone(),
                OutTask {
                    module: node.module.clone(),
                    worker: node.worker.clone(),
                    logfile: node.logfile.clone(),
                    dependencies,
                    max_attempts: (node.max_attempts > 1).then_some(node.max_attempts),
                    retry_wait_time: (node.max_attempts > 1).then_some(node.retry_wait_time_secs),
                    arguments: node.arguments.clone(),
                },
            );
        }
        Ok(serde_json::to_string_pretty(&OutFile { tasks })?)
    }
}

fn substitute_value(value: Value) -> Result<Value, FormatError> {
    Ok(match value {
        Value::String(s) => Value::String(substitute_env(&s)?),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(substitute_value(item)?);
            }
            Value::Array(out)
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k, substitute_value(v)?);
            }
            Value::Object(out)
        }
        other => other,
    })
}

#[cfg(test)]
#[path = "json_tests.rs"]
mod tests;
