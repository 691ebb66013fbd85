// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduling loop: one `tick` checks signals, reaps and promotes
//! nodes, and reports whether the run is finished. The caller is
//! responsible for sleeping between ticks and for deciding when to stop
//! calling `tick` (on `TickOutcome::Finished` or `TickOutcome::Aborted`).

use std::path::PathBuf;
use std::time::{Duration, Instant};

use bg_adapters::ProcessAdapter;
use bg_core::{Clock, TaskStatus};

use crate::node::PollOutcome;
use crate::register::NodeRegister;
use crate::signal::{Signal, SignalHandler};
use crate::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// At least one node is still pending or running.
    Active,
    /// Nothing left to run; the DAG has reached a terminal state.
    Finished,
    /// An abort sentinel was observed; every running node was killed.
    Aborted,
}

/// Hooks the embedding application supplies: persisting a checkpoint after
/// each tick and being told when an individual node finishes. Both default
/// to doing nothing so a bare `ExecutionEngine` can run standalone in tests.
pub trait EngineHooks {
    fn on_checkpoint(&mut self, _register: &NodeRegister) -> Result<(), EngineError> {
        Ok(())
    }

    fn on_node_finished(&mut self, _node: &crate::node::ExecutionNode) {}

    /// Called once per tick, after promotion, so an interactive-mode
    /// embedder can drain the shared context's request queue and prompt
    /// for answers before the next checkpoint.
    fn on_interactive_drain(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpHooks;

impl EngineHooks for NoOpHooks {}

pub struct ExecutionEngine<'a> {
    register: NodeRegister,
    adapter: &'a dyn ProcessAdapter,
    clock: &'a dyn Clock,
    signals: SignalHandler,
    hooks: &'a mut dyn EngineHooks,
    exe: PathBuf,
    max_procs: usize,
    time_between_tasks: Duration,
    last_launch: Option<Instant>,
}

impl<'a> ExecutionEngine<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        register: NodeRegister,
        adapter: &'a dyn ProcessAdapter,
        clock: &'a dyn Clock,
        signal_dir: PathBuf,
        hooks: &'a mut dyn EngineHooks,
        exe: PathBuf,
        max_procs: usize,
        time_between_tasks: Duration,
    ) -> Self {
        Self {
            register,
            adapter,
            clock,
            signals: SignalHandler::new(signal_dir),
            hooks,
            exe,
            max_procs: max_procs.max(1),
            time_between_tasks,
            last_launch: None,
        }
    }

    pub fn register(&self) -> &NodeRegister {
        &self.register
    }

    pub fn register_mut(&mut self) -> &mut NodeRegister {
        &mut self.register
    }

    /// One scheduling pass. Order: abort check, pause check, reap finished
    /// work, promote newly-eligible pending nodes, checkpoint, pulse.
    pub fn tick(&mut self) -> Result<TickOutcome, EngineError> {
        if self.signals.consume(Signal::Abort)? {
            self.terminate_all_running()?;
            self.hooks.on_checkpoint(&self.register)?;
            return Ok(TickOutcome::Aborted);
        }

        self.reap_finished()?;

        if !self.signals.peek(Signal::Pause) {
            self.promote_ready()?;
            self.launch_promoted()?;
        }

        self.hooks.on_interactive_drain()?;

        self.signals.beat()?;
        self.hooks.on_checkpoint(&self.register)?;

        if self.register.is_active() {
            Ok(TickOutcome::Active)
        } else {
            Ok(TickOutcome::Finished)
        }
    }

    fn terminate_all_running(&mut self) -> Result<(), EngineError> {
        let running_ids = self.register.bucket_ids(TaskStatus::Running);
        for id in running_ids {
            if let Some(node) = self.register.get_mut(id) {
                node.terminate(self.clock, "aborted")?;
                self.register.set_status(id, TaskStatus::Aborted);
            }
        }
        Ok(())
    }

    fn reap_finished(&mut self) -> Result<(), EngineError> {
        let running_ids = self.register.bucket_ids(TaskStatus::Running);
        for id in running_ids {
            let Some(node) = self.register.get_mut(id) else {
                continue;
            };
            let Some(outcome) = node.poll(self.clock)? else {
                continue;
            };
            match outcome {
                PollOutcome::Running => {}
                PollOutcome::RetryRequested => {
                    self.register.set_status(id, TaskStatus::Pending);
                }
                PollOutcome::Exited(0) => {
                    self.register.set_status(id, TaskStatus::Completed);
                    if let Some(node) = self.register.get(id) {
                        self.hooks.on_node_finished(node);
                    }
                }
                PollOutcome::Exited(_) | PollOutcome::TimedOut => {
                    self.register.set_status(id, TaskStatus::Failed);
                    self.register.set_children_defaulted(id);
                    if let Some(node) = self.register.get(id) {
                        self.hooks.on_node_finished(node);
                    }
                }
            }
        }
        Ok(())
    }

    /// Pending nodes whose every parent has completed become eligible to
    /// run; the root node is always considered satisfied.
    fn promote_ready(&mut self) -> Result<(), EngineError> {
        let pending_ids = self.register.bucket_ids(TaskStatus::Pending);
        for id in pending_ids {
            let Some(node) = self.register.get(id) else {
                continue;
            };
            let all_parents_done = node.parents.iter().all(|p| {
                *p == bg_core::ROOT_NODE_ID
                    || matches!(self.register.status_of(*p), Some(TaskStatus::Completed) | Some(TaskStatus::Norun))
            });
            if all_parents_done {
                self.register.set_status(id, TaskStatus::Running);
            }
        }
        Ok(())
    }

    /// Actually forks a subprocess for each node moved into `Running` this
    /// tick, up to `max_procs` concurrently in flight, staggered by
    /// `time_between_tasks`.
    fn launch_promoted(&mut self) -> Result<(), EngineError> {
        let in_flight = self
            .register
            .bucket(TaskStatus::Running)
            .filter(|n| n.start_time.is_some())
            .count();
        let mut slots = self.max_procs.saturating_sub(in_flight);
        if slots == 0 {
            return Ok(());
        }

        if let Some(last) = self.last_launch {
            if self.clock.now().duration_since(last) < self.time_between_tasks {
                return Ok(());
            }
        }

        let candidates: Vec<i64> = self
            .register
            .bucket(TaskStatus::Running)
            .filter(|n| n.start_time.is_none())
            .map(|n| n.id)
            .collect();

        for id in candidates {
            if slots == 0 {
                break;
            }
            let Some(node) = self.register.get_mut(id) else {
                continue;
            };
            let spawned = node.execute(&self.exe, self.adapter, self.clock, vec![])?;
            if spawned {
                slots -= 1;
                self.last_launch = Some(self.clock.now());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
