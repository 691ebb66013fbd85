// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The DAG: every node owned by id, partitioned into the seven status
//! buckets, plus the subgraph-selection operations (`exec_only`, `exec_to`,
//! `exec_from`, `exec_disable`) used to run less than the full graph.

use std::collections::{HashMap, HashSet, VecDeque};

use bg_core::{TaskStatus, ROOT_NODE_ID, ROOT_NODE_NAME};
use bg_format::{DependencyRef, NodeSpec, WorkflowFile};

use crate::node::ExecutionNode;
use crate::EngineError;

pub struct NodeRegister {
    nodes: HashMap<i64, ExecutionNode>,
    buckets: HashMap<TaskStatus, HashSet<i64>>,
    names: HashMap<String, i64>,
}

impl Default for NodeRegister {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegister {
    pub fn new() -> Self {
        let mut buckets = HashMap::new();
        for status in TaskStatus::ALL {
            buckets.insert(status, HashSet::new());
        }
        let mut names = HashMap::new();
        names.insert(ROOT_NODE_NAME.to_string(), ROOT_NODE_ID);
        let mut nodes = HashMap::new();
        #[allow(clippy::unwrap_used)]
        let root = ExecutionNode::new(
            ROOT_NODE_ID,
            ROOT_NODE_NAME.to_string(),
            String::new(),
            String::new(),
            vec![],
            None,
            1,
            std::time::Duration::ZERO,
            None,
        )
        .unwrap();
        nodes.insert(ROOT_NODE_ID, root);
        Self {
            nodes,
            buckets,
            names,
        }
    }

    pub fn get(&self, id: i64) -> Option<&ExecutionNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: i64) -> Option<&mut ExecutionNode> {
        self.nodes.get_mut(&id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ExecutionNode> {
        self.names.get(name).and_then(|id| self.nodes.get(id))
    }

    pub fn status_of(&self, id: i64) -> Option<TaskStatus> {
        TaskStatus::ALL
            .into_iter()
            .find(|s| self.buckets.get(s).is_some_and(|b| b.contains(&id)))
    }

    pub fn bucket(&self, status: TaskStatus) -> impl Iterator<Item = &ExecutionNode> {
        #[allow(clippy::unwrap_used)]
        let ids = self.buckets.get(&status).unwrap();
        ids.iter().filter_map(move |id| self.nodes.get(id))
    }

    pub fn bucket_ids(&self, status: TaskStatus) -> Vec<i64> {
        #[allow(clippy::unwrap_used)]
        self.buckets.get(&status).unwrap().iter().copied().collect()
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = &ExecutionNode> {
        self.nodes.values().filter(|n| !n.is_root())
    }

    pub fn is_active(&self) -> bool {
        !self.buckets[&TaskStatus::Pending].is_empty() || !self.buckets[&TaskStatus::Running].is_empty()
    }

    fn move_to(&mut self, id: i64, status: TaskStatus) {
        for bucket in self.buckets.values_mut() {
            bucket.remove(&id);
        }
        self.buckets.get_mut(&status).map(|b| b.insert(id));
    }

    pub fn set_status(&mut self, id: i64, status: TaskStatus) {
        self.move_to(id, status);
    }

    /// BFS-cascade: every pending descendant of `id` becomes `Defaulted`.
    pub fn set_children_defaulted(&mut self, id: i64) {
        let mut stack: Vec<i64> = self.nodes.get(&id).map(|n| n.children.iter().copied().collect()).unwrap_or_default();
        while let Some(child_id) = stack.pop() {
            if self.buckets[&TaskStatus::Pending].contains(&child_id) {
                self.move_to(child_id, TaskStatus::Defaulted);
            }
            if let Some(child) = self.nodes.get(&child_id) {
                stack.extend(child.children.iter().copied());
            }
        }
    }

    /// Moves every non-root node into `Norun`, wiping all other buckets.
    pub fn set_all_norun(&mut self) {
        for bucket in self.buckets.values_mut() {
            bucket.clear();
        }
        let ids: Vec<i64> = self.nodes.keys().copied().filter(|id| *id != ROOT_NODE_ID).collect();
        #[allow(clippy::unwrap_used)]
        let norun = self.buckets.get_mut(&TaskStatus::Norun).unwrap();
        norun.extend(ids);
    }

    pub fn exec_only(&mut self, ids: &[i64]) {
        self.set_all_norun();
        for id in ids {
            if *id >= 0 {
                self.move_to(*id, TaskStatus::Pending);
            }
        }
    }

    pub fn exec_to(&mut self, target: i64) {
        self.set_all_norun();
        let ancestors = self.collect_related(target, true);
        for id in ancestors {
            self.move_to(id, TaskStatus::Pending);
        }
    }

    pub fn exec_from(&mut self, target: i64) {
        self.set_all_norun();
        let descendants = self.collect_related(target, false);
        for id in descendants {
            self.move_to(id, TaskStatus::Pending);
        }
    }

    pub fn exec_disable(&mut self, ids: &[i64]) {
        for id in ids {
            if self.buckets[&TaskStatus::Pending].contains(id) {
                self.move_to(*id, TaskStatus::Norun);
            }
        }
    }

    fn collect_related(&self, start: i64, via_parents: bool) -> HashSet<i64> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(start);
        while let Some(id) = queue.pop_front() {
            if id < 0 || !seen.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(&id) {
                let next = if via_parents { &node.parents } else { &node.children };
                queue.extend(next.iter().copied());
            }
        }
        seen
    }

    /// Load a parsed workflow file into the register, resolving
    /// id-or-name dependency references. Dependencies may forward-reference
    /// nodes later in the file; resolution repeats until a full pass makes
    /// no progress, at which point any remaining unresolved reference is an
    /// error.
    pub fn load(&mut self, file: WorkflowFile) -> Result<(), EngineError> {
        let mut remaining: Vec<NodeSpec> = file.nodes;
        loop {
            let mut progressed = false;
            let mut still_remaining = Vec::new();
            for spec in remaining {
                match self.try_add(&spec) {
                    Ok(true) => progressed = true,
                    Ok(false) => still_remaining.push(spec),
                    Err(e) => return Err(e),
                }
            }
            remaining = still_remaining;
            if remaining.is_empty() {
                return Ok(());
            }
            if !progressed {
                #[allow(clippy::unwrap_used)]
                let spec = remaining.first().unwrap();
                return Err(EngineError::UnresolvedDependency(spec.name.clone()));
            }
        }
    }

    fn try_add(&mut self, spec: &NodeSpec) -> Result<bool, EngineError> {
        let mut parent_ids = Vec::with_capacity(spec.dependencies.len());
        for dep in &spec.dependencies {
            match self.resolve_dependency(dep) {
                Some(id) => parent_ids.push(id),
                None => return Ok(false),
            }
        }
        if self.nodes.contains_key(&spec.id) {
            return Err(EngineError::DuplicateId(spec.id));
        }
        if self.names.contains_key(&spec.name) {
            return Err(EngineError::DuplicateName(spec.name.clone()));
        }

        let mut node = ExecutionNode::new(
            spec.id,
            spec.name.clone(),
            spec.module.clone(),
            spec.worker.clone(),
            spec.arguments.clone(),
            spec.logfile.as_ref().map(std::path::PathBuf::from),
            spec.max_attempts,
            std::time::Duration::from_secs(spec.retry_wait_time_secs),
            spec.timeout_secs.map(std::time::Duration::from_secs),
        )?;
        node.parents = parent_ids.iter().copied().collect();

        for parent_id in &parent_ids {
            if let Some(parent) = self.nodes.get_mut(parent_id) {
                parent.children.insert(spec.id);
            }
        }

        self.names.insert(spec.name.clone(), spec.id);
        self.nodes.insert(spec.id, node);
        let status = spec.status.unwrap_or(TaskStatus::Pending);
        self.move_to(spec.id, status);
        Ok(true)
    }

    fn resolve_dependency(&self, dep: &DependencyRef) -> Option<i64> {
        match dep {
            DependencyRef::Id(id) => {
                if *id == ROOT_NODE_ID || self.nodes.contains_key(id) {
                    Some(*id)
                } else {
                    None
                }
            }
            DependencyRef::Name(name) => self.names.get(name).copied(),
        }
    }
}

#[cfg(test)]
#[path = "register_tests.rs"]
mod tests;
