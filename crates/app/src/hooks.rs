// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires `bg_engine::EngineHooks` to `bg_storage`'s atomic checkpoint
//! writer: every tick, the register is flattened to restart-format list
//! text and written to the `.ctllog` file, throttled by `save_interval` so
//! a fast-ticking run doesn't fsync on every single poll.

use std::io::Write;
use std::time::{Duration, Instant};

use bg_core::Clock;
use bg_engine::{Context, EngineHooks, ExecutionNode, NodeRegister};
use bg_format::{ListFormat, Mode, SerializedNode};
use bg_storage::{Checkpoint, CheckpointWriter, FsCheckpointWriter};
use tracing::{info, warn};

/// Answers one interactive-mode prompt. Abstracted so tests never read
/// real stdin.
pub trait Prompter: Send + Sync {
    fn prompt(&self, key: &str) -> String;
}

/// Prompts on the process's real standard input, as spec.md's interactive
/// mode describes: the main engine thread reads a line per queued key.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn prompt(&self, key: &str) -> String {
        print!("{key}: ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        line.trim_end_matches(['\n', '\r']).to_string()
    }
}

pub struct CheckpointHooks<'a, W: CheckpointWriter = FsCheckpointWriter> {
    checkpoint: &'a Checkpoint<W>,
    clock: &'a dyn Clock,
    mode: Mode,
    save_interval: Duration,
    last_saved: Option<Instant>,
    interactive: Option<(&'a Context, &'a dyn Prompter)>,
}

impl<'a, W: CheckpointWriter> CheckpointHooks<'a, W> {
    pub fn new(checkpoint: &'a Checkpoint<W>, clock: &'a dyn Clock, mode: Mode, save_interval: Duration) -> Self {
        Self {
            checkpoint,
            clock,
            mode,
            save_interval,
            last_saved: None,
            interactive: None,
        }
    }

    /// Enables draining the shared context's interactive request queue on
    /// every tick, prompting for each queued key via `prompter`.
    pub fn with_interactive(mut self, context: &'a Context, prompter: &'a dyn Prompter) -> Self {
        self.interactive = Some((context, prompter));
        self
    }

    /// Writes the checkpoint unconditionally, bypassing the throttle. Used
    /// after the final tick so the last state is never lost to throttling.
    pub fn force_save(&mut self, register: &NodeRegister) -> Result<(), bg_engine::EngineError> {
        self.write(register)
    }

    fn write(&mut self, register: &NodeRegister) -> Result<(), bg_engine::EngineError> {
        let nodes: Vec<SerializedNode> = register
            .all_nodes()
            .map(|node| to_serialized(node, register, self.clock))
            .collect();
        let text = ListFormat::serialize(self.mode, &nodes);
        self.checkpoint
            .write_ctllog(&text)
            .map_err(|e| bg_engine::EngineError::ContextIo(std::io::Error::other(e.to_string())))?;
        self.last_saved = Some(self.clock.now());
        Ok(())
    }
}

fn to_serialized(node: &ExecutionNode, register: &NodeRegister, clock: &dyn Clock) -> SerializedNode {
    let mut parent_ids: Vec<i64> = node.parents.iter().copied().collect();
    parent_ids.sort_unstable();
    SerializedNode {
        id: node.id,
        parent_ids,
        name: node.name.clone(),
        module: node.module.clone(),
        worker: node.worker.clone(),
        arguments: node.arguments.clone(),
        logfile: node.logfile.as_ref().map(|p| p.display().to_string()),
        max_attempts: node.max_attempts,
        retry_wait_time_secs: node.retry_wait_time.as_secs(),
        status: register.status_of(node.id).unwrap_or(bg_core::TaskStatus::Pending),
        elapsed_secs: node.elapsed(clock).as_secs(),
    }
}

impl<'a, W: CheckpointWriter> EngineHooks for CheckpointHooks<'a, W> {
    fn on_checkpoint(&mut self, register: &NodeRegister) -> Result<(), bg_engine::EngineError> {
        let due = match self.last_saved {
            Some(last) => self.clock.now().duration_since(last) >= self.save_interval,
            None => true,
        };
        if !due {
            return Ok(());
        }
        self.write(register)
    }

    fn on_node_finished(&mut self, node: &ExecutionNode) {
        match node.retcode {
            Some(0) => info!(node = %node.name, "node completed"),
            Some(code) => warn!(node = %node.name, code, "node failed"),
            None => {}
        }
    }

    fn on_interactive_drain(&mut self) -> Result<(), bg_engine::EngineError> {
        let Some((context, prompter)) = self.interactive else {
            return Ok(());
        };
        for key in context.pending_requests()? {
            let value = prompter.prompt(&key);
            context.fulfill(&key, &value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
