// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The format-agnostic intermediate representation both SerDe
//! implementations parse into and serialize out of. `bg-engine` is
//! responsible for turning a `WorkflowFile` into a live `NodeRegister`, and
//! for turning register state back into `SerializedNode`s at checkpoint
//! time -- this crate never depends on `bg-engine`.

use bg_core::TaskStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyRef {
    Id(i64),
    Name(String),
}

/// One task as read from a workflow (or restart) file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub id: i64,
    pub name: String,
    pub module: String,
    pub worker: String,
    pub arguments: Vec<String>,
    pub logfile: Option<String>,
    pub max_attempts: u32,
    pub retry_wait_time_secs: u64,
    pub timeout_secs: Option<u64>,
    pub dependencies: Vec<DependencyRef>,
    /// Present only when the file being parsed is a restart/checkpoint file.
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowFile {
    pub nodes: Vec<NodeSpec>,
}

/// A node plus its current bucket, as handed to a serializer by the engine
/// when writing a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedNode {
    pub id: i64,
    pub parent_ids: Vec<i64>,
    pub name: String,
    pub module: String,
    pub worker: String,
    pub arguments: Vec<String>,
    pub logfile: Option<String>,
    pub max_attempts: u32,
    pub retry_wait_time_secs: u64,
    pub status: TaskStatus,
    pub elapsed_secs: u64,
}
