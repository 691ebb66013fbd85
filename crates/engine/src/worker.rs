// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker lifecycle run inside a forked subprocess:
//! `on_start` -> `run` -> `on_success`/`on_fail` -> `on_destroy`. This code
//! executes in the child spawned via `--internal-run-worker`, not in the
//! scheduling process.

use std::collections::HashMap;

use thiserror::Error;
use tracing::warn;

use crate::node::reserved_code;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("{0}")]
    Failed(String),
}

/// A unit of work a node can be configured to run. Every hook but `run`
/// defaults to a no-op so most workers only implement `run`.
pub trait Worker {
    fn on_start(&mut self) -> Result<(), WorkerError> {
        Ok(())
    }

    fn run(&mut self, args: &[String]) -> Result<i32, WorkerError>;

    fn on_success(&mut self) -> Result<(), WorkerError> {
        Ok(())
    }

    fn on_fail(&mut self, _retcode: i32) -> Result<(), WorkerError> {
        Ok(())
    }

    fn on_destroy(&mut self) {}
}

/// Drives one `Worker` through its full lifecycle, mapping an exception
/// raised at any stage onto the matching reserved exit code rather than
/// letting it propagate. `on_destroy` always runs and never changes the
/// already-decided exit code; a failure there is logged and swallowed.
pub fn protected_run(worker: &mut dyn Worker, args: &[String]) -> i32 {
    let retcode = run_stages(worker, args);

    worker.on_destroy();

    retcode
}

fn run_stages(worker: &mut dyn Worker, args: &[String]) -> i32 {
    if let Err(e) = worker.on_start() {
        warn!(error = %e, "on_start failed");
        return reserved_code::ON_START_ERROR;
    }

    let retcode = match worker.run(args) {
        Ok(code) => code,
        Err(e) => {
            warn!(error = %e, "run failed");
            return reserved_code::RUN_ERROR;
        }
    };

    if retcode == 0 {
        if let Err(e) = worker.on_success() {
            warn!(error = %e, "on_success failed");
            return reserved_code::ON_SUCCESS_ERROR;
        }
    } else if let Err(e) = worker.on_fail(retcode) {
        warn!(error = %e, "on_fail failed");
        return reserved_code::ON_FAIL_ERROR;
    }

    retcode
}

/// The built-in worker every node without a registered module/worker pair
/// falls back to: runs `args[0]` as a shell command with `args[1..]` as its
/// arguments and propagates its exit code verbatim.
#[derive(Debug, Default)]
pub struct ShellWorker;

impl Worker for ShellWorker {
    fn run(&mut self, args: &[String]) -> Result<i32, WorkerError> {
        let Some((cmd, rest)) = args.split_first() else {
            return Err(WorkerError::Failed("no command given to ShellWorker".into()));
        };
        let status = std::process::Command::new(cmd)
            .args(rest)
            .status()
            .map_err(|e| WorkerError::Failed(e.to_string()))?;
        Ok(status.code().unwrap_or(-1))
    }
}

type WorkerFactory = Box<dyn Fn() -> Box<dyn Worker> + Send + Sync>;

/// Maps a (module, worker) pair declared in a workflow file onto a concrete
/// `Worker` implementation. Looked up by the re-exec'd child process
/// spawned through `--internal-run-worker`.
#[derive(Default)]
pub struct WorkerRegistry {
    factories: HashMap<(String, String), WorkerFactory>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("shell", "ShellWorker", || Box::new(ShellWorker));
        registry
    }

    pub fn register<F>(&mut self, module: &str, worker: &str, factory: F)
    where
        F: Fn() -> Box<dyn Worker> + Send + Sync + 'static,
    {
        self.factories
            .insert((module.to_string(), worker.to_string()), Box::new(factory));
    }

    pub fn build(&self, module: &str, worker: &str) -> Option<Box<dyn Worker>> {
        self.factories.get(&(module.to_string(), worker.to_string())).map(|f| f())
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
