// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess spawn/poll/kill, abstracted behind a trait so the scheduling
//! loop can be tested without forking real processes.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::AdapterError;

/// What to launch for one task attempt: the engine re-execs its own binary
/// with a hidden internal subcommand, so every worker — shell or otherwise —
/// runs as a real, independently killable OS process.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub exe: PathBuf,
    pub module: String,
    pub worker: String,
    pub args: Vec<String>,
    pub logfile: Option<PathBuf>,
    pub extra_env: Vec<(String, String)>,
}

/// The outcome of a finished process: either a normal exit code, or `None`
/// when the process was killed by a signal rather than exiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus(pub Option<i32>);

impl ExitStatus {
    pub fn success(self) -> bool {
        self.0 == Some(0)
    }
}

/// A handle to a single in-flight (or already-reaped) worker process.
pub trait ProcessHandle: Send {
    /// Non-blocking check for completion.
    fn try_wait(&mut self) -> Result<Option<ExitStatus>, AdapterError>;
    /// Best-effort termination of a still-running process.
    fn kill(&mut self) -> Result<(), AdapterError>;
}

/// Spawns real OS processes.
pub trait ProcessAdapter: Send + Sync {
    fn spawn(&self, spec: &SpawnSpec) -> Result<Box<dyn ProcessHandle>, AdapterError>;
}

/// Production adapter: forks a genuine child process per spec.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdProcessAdapter;

impl ProcessAdapter for StdProcessAdapter {
    fn spawn(&self, spec: &SpawnSpec) -> Result<Box<dyn ProcessHandle>, AdapterError> {
        let stdio = |logfile: &Option<PathBuf>| -> Result<Stdio, AdapterError> {
            match logfile {
                Some(path) => {
                    let file: File = OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(path)
                        .map_err(AdapterError::Spawn)?;
                    Ok(Stdio::from(file))
                }
                None => Ok(Stdio::null()),
            }
        };

        let mut cmd = Command::new(&spec.exe);
        cmd.arg("--internal-run-worker")
            .arg(&spec.module)
            .arg(&spec.worker)
            .arg("--")
            .args(&spec.args)
            .stdout(stdio(&spec.logfile)?)
            .stderr(stdio(&spec.logfile)?)
            .stdin(Stdio::null());
        for (k, v) in &spec.extra_env {
            cmd.env(k, v);
        }

        let child = cmd.spawn().map_err(AdapterError::Spawn)?;
        Ok(Box::new(ChildHandle { child }))
    }
}

struct ChildHandle {
    child: Child,
}

impl ProcessHandle for ChildHandle {
    fn try_wait(&mut self) -> Result<Option<ExitStatus>, AdapterError> {
        match self.child.try_wait().map_err(AdapterError::Poll)? {
            Some(status) => Ok(Some(ExitStatus(status.code()))),
            None => Ok(None),
        }
    }

    fn kill(&mut self) -> Result<(), AdapterError> {
        match self.child.kill() {
            Ok(()) => Ok(()),
            // Already exited between our last poll and this call.
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(AdapterError::Kill(e)),
        }
    }
}

/// Scripted fake for deterministic scheduler tests: each call to `spawn`
/// hands out the next queued outcome.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct FakeProcessAdapter {
    scripted: Mutex<VecDeque<FakeOutcome>>,
}

#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone)]
pub enum FakeOutcome {
    /// Completes with this exit code on the Nth poll (0 = immediately).
    ExitsAfterPolls { polls: u32, code: i32 },
    /// Never completes on its own; must be killed.
    RunsForever,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeProcessAdapter {
    pub fn new() -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, outcome: FakeOutcome) {
        self.scripted.lock().push_back(outcome);
    }
}

#[cfg(any(test, feature = "test-support"))]
impl ProcessAdapter for FakeProcessAdapter {
    fn spawn(&self, _spec: &SpawnSpec) -> Result<Box<dyn ProcessHandle>, AdapterError> {
        let outcome = self
            .scripted
            .lock()
            .pop_front()
            .unwrap_or(FakeOutcome::ExitsAfterPolls { polls: 0, code: 0 });
        Ok(Box::new(FakeHandle {
            outcome,
            polls_seen: 0,
            killed: Arc::new(Mutex::new(false)),
        }))
    }
}

#[cfg(any(test, feature = "test-support"))]
struct FakeHandle {
    outcome: FakeOutcome,
    polls_seen: u32,
    killed: Arc<Mutex<bool>>,
}

#[cfg(any(test, feature = "test-support"))]
impl ProcessHandle for FakeHandle {
    fn try_wait(&mut self) -> Result<Option<ExitStatus>, AdapterError> {
        if *self.killed.lock() {
            return Ok(Some(ExitStatus(None)));
        }
        match self.outcome {
            FakeOutcome::RunsForever => Ok(None),
            FakeOutcome::ExitsAfterPolls { polls, code } => {
                if self.polls_seen >= polls {
                    Ok(Some(ExitStatus(Some(code))))
                } else {
                    self.polls_seen += 1;
                    Ok(None)
                }
            }
        }
    }

    fn kill(&mut self) -> Result<(), AdapterError> {
        *self.killed.lock() = true;
        Ok(())
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
