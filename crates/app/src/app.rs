// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ties configuration, checkpoint/resume, and the scheduling engine
//! together into a single run from workflow file to exit status.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bg_adapters::{Notifier, ProcessAdapter, RunOutcome};
use bg_core::{Clock, Config, TaskStatus};
use bg_engine::{Context, ExecutionEngine, NodeRegister, SignalHandler, Sleeper, TickOutcome};
use bg_format::{JsonFormat, ListFormat, Mode};
use bg_storage::Checkpoint;

use crate::hooks::{CheckpointHooks, Prompter};
use crate::lifecycle::AppLifecycle;
use crate::AppError;

/// Which nodes to actually run this invocation, mirroring the register's
/// subgraph-selection operations. `None` runs the whole graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubgraphSelection {
    Only(Vec<i64>),
    To(i64),
    From(i64),
    Disable(Vec<i64>),
}

/// Knobs sourced from the CLI front-end that sit outside the core engine's
/// scope but are cheap enough to thread through one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub subgraph: Option<SubgraphSelection>,
    /// Print the register in dependency order and exit without running it.
    pub dryrun: bool,
    /// Pre-seed the shared context with `KEY=VALUE` pairs before the engine starts.
    pub cvars: Vec<(String, String)>,
    pub interactive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowFormat {
    List(Mode),
    Json,
}

impl WorkflowFormat {
    /// Picks JSON for a `.json` extension, otherwise the pipe-delimited
    /// list format in the given mode.
    pub fn from_path(path: &Path, list_mode: Mode) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => WorkflowFormat::Json,
            _ => WorkflowFormat::List(list_mode),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub success: bool,
    pub aborted: bool,
    pub completed: usize,
    pub failed: usize,
    pub defaulted: usize,
}

pub struct App {
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &self,
        workflow_path: &Path,
        format: WorkflowFormat,
        adapter: &dyn ProcessAdapter,
        clock: &dyn Clock,
        lifecycle: &mut dyn AppLifecycle,
        notifier: &dyn Notifier,
        options: &RunOptions,
        prompter: &dyn Prompter,
        sleeper: &dyn Sleeper,
    ) -> Result<RunSummary, AppError> {
        lifecycle.on_create();

        let checkpoint = Checkpoint::new(self.config.ctllog_file()?, self.config.ctx_file()?);
        let resuming = checkpoint.resume_available();

        let mut register = NodeRegister::new();
        if resuming {
            lifecycle.on_restart();
            #[allow(clippy::unwrap_used)]
            let text = checkpoint.load_ctllog()?.unwrap();
            let file = ListFormat::parse(&text, true)?;
            register.load(file)?;
        } else {
            lifecycle.on_start();
            let text = std::fs::read_to_string(workflow_path)?;
            let file = match format {
                WorkflowFormat::List(mode) => {
                    let _ = mode;
                    ListFormat::parse(&text, false)?
                }
                WorkflowFormat::Json => JsonFormat::parse(&text, false)?,
            };
            register.load(file)?;
        }

        apply_subgraph_selection(&mut register, options.subgraph.as_ref());

        // Touching the context store eagerly ensures its backing file
        // exists before any worker subprocess tries to read it.
        let context = Context::new(self.config.ctx_file()?)?;
        for (key, value) in &options.cvars {
            context.set(key, value)?;
        }

        if options.dryrun {
            print_dryrun(&register);
            lifecycle.on_destroy();
            return Ok(RunSummary {
                success: true,
                aborted: false,
                completed: 0,
                failed: 0,
                defaulted: 0,
            });
        }

        let mode = match format {
            WorkflowFormat::List(mode) => mode,
            WorkflowFormat::Json => Mode::Shell,
        };
        let save_interval = Duration::from_secs(self.config.get_int("save_interval")?.max(0) as u64);
        let mut hooks = CheckpointHooks::new(&checkpoint, clock, mode, save_interval);
        if options.interactive {
            hooks = hooks.with_interactive(&context, prompter);
        }

        let max_procs = match self.config.get_int("max_procs")? {
            n if n <= 0 => usize::MAX,
            n => n as usize,
        };
        let time_between_tasks = Duration::from_secs(self.config.get_int("time_between_tasks")?.max(0) as u64);
        let tickrate = self.config.get_int("tickrate")?.max(1) as u64;
        let tick_interval = Duration::from_millis(1000 / tickrate);

        let exe = std::env::current_exe()?;
        let signal_dir = PathBuf::from(self.config.get_str("temp_dir")?);

        let signals = SignalHandler::new(signal_dir.clone());
        if signals.detect_running_instance(&|d| sleeper.sleep(d))? {
            return Err(AppError::DuplicateInstance(self.config.get_str("app_name")?));
        }

        let mut engine = ExecutionEngine::new(
            register,
            adapter,
            clock,
            signal_dir,
            &mut hooks,
            exe,
            max_procs,
            time_between_tasks,
        );

        let outcome = loop {
            match engine.tick()? {
                TickOutcome::Active => std::thread::sleep(tick_interval),
                terminal => break terminal,
            }
        };
        hooks.force_save(engine.register())?;

        let summary = summarize(engine.register(), outcome);
        self.finish(&summary, &checkpoint, lifecycle, notifier)?;
        lifecycle.on_destroy();
        Ok(summary)
    }

    fn finish(
        &self,
        summary: &RunSummary,
        checkpoint: &Checkpoint,
        lifecycle: &mut dyn AppLifecycle,
        notifier: &dyn Notifier,
    ) -> Result<(), AppError> {
        if summary.success {
            lifecycle.on_success();
            if self.config.get_bool("email_on_success")? {
                notifier.notify(RunOutcome::Success, "run completed successfully")?;
            }
            checkpoint.delete()?;
        } else {
            lifecycle.on_fail();
            if self.config.get_bool("email_on_fail")? {
                notifier.notify(RunOutcome::Failure, "run finished with failures")?;
            }
        }
        Ok(())
    }
}

fn summarize(register: &NodeRegister, outcome: TickOutcome) -> RunSummary {
    let completed = register.bucket_ids(TaskStatus::Completed).len();
    let failed = register.bucket_ids(TaskStatus::Failed).len();
    let defaulted = register.bucket_ids(TaskStatus::Defaulted).len();
    let aborted = outcome == TickOutcome::Aborted;
    RunSummary {
        success: !aborted && failed == 0 && defaulted == 0,
        aborted,
        completed,
        failed,
        defaulted,
    }
}

fn apply_subgraph_selection(register: &mut NodeRegister, selection: Option<&SubgraphSelection>) {
    match selection {
        None => {}
        Some(SubgraphSelection::Only(ids)) => register.exec_only(ids),
        Some(SubgraphSelection::To(id)) => register.exec_to(*id),
        Some(SubgraphSelection::From(id)) => register.exec_from(*id),
        Some(SubgraphSelection::Disable(ids)) => register.exec_disable(ids),
    }
}

/// Prints every node in an order consistent with its dependencies (a
/// parent always printed before its children), without running anything.
fn print_dryrun(register: &NodeRegister) {
    for node in topological_order(register) {
        let args = node.arguments.join(" ");
        let logfile = node.logfile.as_ref().map(|p| p.display().to_string()).unwrap_or_default();
        println!("{}\t{}\t{}\t{}\t{}", node.id, node.module, node.worker, args, logfile);
    }
}

fn topological_order(register: &NodeRegister) -> Vec<&bg_engine::ExecutionNode> {
    let mut in_degree: std::collections::HashMap<i64, usize> = std::collections::HashMap::new();
    for node in register.all_nodes() {
        in_degree.insert(node.id, node.parents.iter().filter(|p| **p != bg_core::ROOT_NODE_ID).count());
    }
    let mut ready: Vec<i64> = in_degree.iter().filter(|(_, d)| **d == 0).map(|(id, _)| *id).collect();
    ready.sort_unstable();
    let mut queue: std::collections::VecDeque<i64> = ready.into();

    let mut order = Vec::new();
    let mut remaining = in_degree;
    while let Some(id) = queue.pop_front() {
        let Some(node) = register.get(id) else { continue };
        order.push(node);
        let mut newly_ready: Vec<i64> = Vec::new();
        for child_id in &node.children {
            if let Some(d) = remaining.get_mut(child_id) {
                *d -= 1;
                if *d == 0 {
                    newly_ready.push(*child_id);
                }
            }
        }
        newly_ready.sort_unstable();
        queue.extend(newly_ready);
    }
    order
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
