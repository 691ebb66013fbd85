// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single task in the DAG: its static definition plus the runtime state
//! of its current (or most recent) attempt.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use bg_adapters::{ExitStatus, ProcessAdapter, ProcessHandle, SpawnSpec};
use bg_core::Clock;

use crate::logger::{self, Level};
use crate::EngineError;

/// Reserved exit codes the engine itself assigns — never produced by a
/// worker's own `run` — matching the fixed table of per-stage/poll outcomes.
pub mod reserved_code {
    /// `Worker::on_start` raised an error; `run` never executed.
    pub const ON_START_ERROR: i32 = 901;
    /// `Worker::run` raised an error rather than returning an exit code.
    pub const RUN_ERROR: i32 = 902;
    /// `Worker::on_success` raised an error after a successful `run`.
    pub const ON_SUCCESS_ERROR: i32 = 903;
    /// `Worker::on_fail` raised an error while handling a failed `run`.
    pub const ON_FAIL_ERROR: i32 = 904;
    /// poll() called with no subprocess attached to the node.
    pub const NO_SUBPROCESS: i32 = 905;
    /// Node exceeded its configured timeout and was killed.
    pub const TIMED_OUT: i32 = 906;
    /// Node was killed by an external terminate() call (e.g. on abort).
    pub const TERMINATED: i32 = 907;
}

/// What a poll of a running node discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Still executing; no state change.
    Running,
    /// Finished; this is the final (non-retryable) exit code.
    Exited(i32),
    /// Finished with a retryable failure; caller should reschedule.
    RetryRequested,
    /// Exceeded `timeout` and was killed.
    TimedOut,
}

pub struct ExecutionNode {
    pub id: i64,
    pub name: String,
    pub module: String,
    pub worker: String,
    pub arguments: Vec<String>,
    pub logfile: Option<PathBuf>,
    pub max_attempts: u32,
    pub retry_wait_time: Duration,
    pub timeout: Option<Duration>,
    pub parents: HashSet<i64>,
    pub children: HashSet<i64>,

    pub attempts: u32,
    pub start_time: Option<Instant>,
    pub end_time: Option<Instant>,
    pub retcode: Option<i32>,
    wait_until: Option<Instant>,
    handle: Option<Box<dyn ProcessHandle>>,
}

impl std::fmt::Debug for ExecutionNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("attempts", &self.attempts)
            .field("retcode", &self.retcode)
            .finish()
    }
}

impl PartialEq for ExecutionNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for ExecutionNode {}

impl std::hash::Hash for ExecutionNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Safety net for a still-running child if a node is ever dropped without
/// going through `terminate`/`poll` to completion (e.g. a panic unwind
/// partway through a tick). Best-effort: a kill failure here has nowhere
/// useful to propagate to.
impl Drop for ExecutionNode {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            let _ = handle.kill();
        }
    }
}

impl ExecutionNode {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: i64,
        name: String,
        module: String,
        worker: String,
        arguments: Vec<String>,
        logfile: Option<PathBuf>,
        max_attempts: u32,
        retry_wait_time: Duration,
        timeout: Option<Duration>,
    ) -> Result<Self, EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::Validation("node name must not be empty".into()));
        }
        if id < -1 {
            return Err(EngineError::Validation(format!("invalid node id {id}")));
        }
        Ok(Self {
            id,
            name,
            module,
            worker,
            arguments,
            logfile,
            max_attempts: max_attempts.max(1),
            retry_wait_time,
            timeout,
            parents: HashSet::new(),
            children: HashSet::new(),
            attempts: 0,
            start_time: None,
            end_time: None,
            retcode: None,
            wait_until: None,
            handle: None,
        })
    }

    pub fn is_root(&self) -> bool {
        self.id == bg_core::ROOT_NODE_ID
    }

    /// True once this id has been retried past its `max_attempts` budget.
    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    fn must_wait(&self, clock: &dyn Clock) -> bool {
        match self.wait_until {
            Some(t) => clock.now() < t,
            None => false,
        }
    }

    /// Fork the worker subprocess for this attempt. No-op (returns `Ok(false)`)
    /// if still in a retry backoff window.
    pub fn execute(
        &mut self,
        exe: &std::path::Path,
        adapter: &dyn ProcessAdapter,
        clock: &dyn Clock,
        extra_env: Vec<(String, String)>,
    ) -> Result<bool, EngineError> {
        if self.must_wait(clock) {
            return Ok(false);
        }
        self.attempts += 1;
        if self.start_time.is_none() {
            self.start_time = Some(clock.now());
        }
        let spec = SpawnSpec {
            exe: exe.to_path_buf(),
            module: self.module.clone(),
            worker: self.worker.clone(),
            args: self.arguments.clone(),
            logfile: self.logfile.clone(),
            extra_env,
        };
        let handle = match adapter.spawn(&spec) {
            Ok(handle) => handle,
            Err(e) => {
                logger::append_line(self.logfile.as_deref(), Level::Error, &format!("spawn failed: {e}"))?;
                return Err(e.into());
            }
        };
        self.handle = Some(handle);
        Ok(true)
    }

    /// Non-blocking poll. `wait` forces a blocking reap (used at shutdown).
    pub fn poll(&mut self, clock: &dyn Clock) -> Result<Option<PollOutcome>, EngineError> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(Some(PollOutcome::Exited(reserved_code::NO_SUBPROCESS)));
        };

        if let Some(timeout) = self.timeout {
            if let Some(start) = self.start_time {
                if clock.now().duration_since(start) >= timeout {
                    handle.kill()?;
                    self.handle = None;
                    self.end_time = Some(clock.now());
                    self.retcode = Some(reserved_code::TIMED_OUT);
                    logger::append_line(self.logfile.as_deref(), Level::Error, "timeout exceeded")?;
                    return Ok(Some(PollOutcome::TimedOut));
                }
            }
        }

        match handle.try_wait()? {
            None => Ok(None),
            Some(ExitStatus(code)) => {
                self.handle = None;
                self.end_time = Some(clock.now());
                let code = code.unwrap_or(-1);
                self.retcode = Some(code);
                if code < 0 {
                    // Killed by a signal rather than exiting normally:
                    // always retried, regardless of the attempt budget.
                    self.wait_until = Some(clock.now() + self.retry_wait_time);
                    self.end_time = None;
                    Ok(Some(PollOutcome::RetryRequested))
                } else if code > 0 && self.attempts < self.max_attempts {
                    self.wait_until = Some(clock.now() + self.retry_wait_time);
                    self.end_time = None;
                    logger::append_banner(
                        self.logfile.as_deref(),
                        Level::Warn,
                        &format!("restarting {} (attempt {} of {})", self.name, self.attempts, self.max_attempts),
                    )?;
                    Ok(Some(PollOutcome::RetryRequested))
                } else {
                    Ok(Some(PollOutcome::Exited(code)))
                }
            }
        }
    }

    /// Kill an in-flight process (abort path / external terminate).
    pub fn terminate(&mut self, clock: &dyn Clock, reason: &str) -> Result<(), EngineError> {
        if let Some(handle) = self.handle.as_mut() {
            handle.kill()?;
        }
        self.handle = None;
        self.end_time = Some(clock.now());
        self.retcode = Some(reserved_code::TERMINATED);
        logger::append_line(self.logfile.as_deref(), Level::Warn, reason)?;
        Ok(())
    }

    pub fn elapsed(&self, clock: &dyn Clock) -> Duration {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            (Some(start), None) => clock.now().saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
