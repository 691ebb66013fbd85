// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! batchgraph - DAG workflow runner

use std::path::PathBuf;

use anyhow::{anyhow, Context as _, Result};
use bg_adapters::{NoOpNotifier, StdProcessAdapter};
use bg_app::{App, RunOptions, StdinPrompter, SubgraphSelection, WorkflowFormat};
use bg_core::{Config, SystemClock};
use bg_engine::{protected_run, RealSleeper, WorkerRegistry};
use bg_format::Mode;
use clap::Parser;

/// Run a workflow file as a scheduled DAG of subprocess workers.
#[derive(Parser, Debug)]
#[command(name = "batchgraph", version, about)]
struct Cli {
    /// Config file to source before resolving any other option
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Workflow file to load (pipe-delimited list or JSON)
    #[arg(short = 'l', long = "list", value_name = "FILE")]
    list: Option<PathBuf>,

    /// Resume from an existing checkpoint instead of re-reading the workflow file
    #[arg(short = 'r', long = "restart")]
    restart: bool,

    /// Maximum number of worker processes to run concurrently
    #[arg(short = 'n', long = "max-procs", value_name = "N")]
    max_procs: Option<i64>,

    /// Run only these node ids (comma-separated), skipping the rest
    #[arg(short = 'x', long = "exec-only", value_name = "IDS", value_delimiter = ',')]
    exec_only: Option<Vec<i64>>,

    /// Mark these node ids (comma-separated) as norun
    #[arg(short = 'N', long = "norun", value_name = "IDS", value_delimiter = ',')]
    norun: Option<Vec<i64>>,

    /// Run only the ancestors of this node id (inclusive)
    #[arg(short = 'A', long = "to", visible_alias = "ancestors", value_name = "ID")]
    to: Option<i64>,

    /// Run only the descendants of this node id (inclusive)
    #[arg(short = 'D', long = "from", visible_alias = "descendents", value_name = "ID")]
    from: Option<i64>,

    /// Enable debug-level logging
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Scheduling ticks per second
    #[arg(short = 't', long = "tickrate", value_name = "N")]
    tickrate: Option<i64>,

    /// Address to email a notification to
    #[arg(short = 'e', long = "email", value_name = "ADDRESS")]
    email: Option<String>,

    /// Email on failure even if --email/-e wasn't given
    #[arg(long = "ef")]
    email_on_fail: bool,

    /// Email on success even if --email/-e wasn't given
    #[arg(long = "es")]
    email_on_success: bool,

    /// Set a process environment variable as KEY=VALUE (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE")]
    env: Vec<String>,

    /// Pre-seed the shared context as KEY=VALUE before the run starts (repeatable)
    #[arg(long = "cvar", value_name = "KEY=VALUE")]
    cvar: Vec<String>,

    /// Never zip completed logs
    #[arg(long = "nozip")]
    nozip: bool,

    /// Dump worker stdout/stderr to the terminal as it runs
    #[arg(long = "dump-logs")]
    dump_logs: bool,

    /// Print the plan in dependency order and exit without running anything
    #[arg(long = "dryrun")]
    dryrun: bool,

    /// Prompt on stdin for any value a worker requests through the shared context
    #[arg(short = 'i', long = "interactive")]
    interactive: bool,

    /// Hidden re-exec entry point: runs a single worker in a forked child
    /// process, then exits with its reserved or propagated exit code. Never
    /// invoked directly by a user.
    #[arg(long = "internal-run-worker", hide = true, num_args = 2, value_names = ["MODULE", "WORKER"])]
    internal_run_worker: Option<Vec<String>>,

    /// Arguments forwarded to the worker named by --internal-run-worker
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    worker_args: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    if let Some(target) = &cli.internal_run_worker {
        std::process::exit(run_worker(target, &cli.worker_args));
    }

    init_logging(cli.debug);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code_for(&e));
    }
}

/// `DuplicateInstance` gets its own exit code so a caller (cron, a
/// supervisor) can tell "another run is already in flight" apart from any
/// other failure without parsing stderr.
const DUPLICATE_INSTANCE_EXIT_CODE: i32 = 98;

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<bg_app::AppError>() {
        Some(bg_app::AppError::DuplicateInstance(_)) => DUPLICATE_INSTANCE_EXIT_CODE,
        _ => 1,
    }
}

/// Looks up and drives a single worker to completion inside the forked child
/// spawned by `StdProcessAdapter::spawn`.
fn run_worker(target: &[String], args: &[String]) -> i32 {
    let [module, worker] = target else {
        eprintln!("Error: --internal-run-worker expects exactly MODULE and WORKER");
        return 1;
    };
    let registry = WorkerRegistry::new();
    let Some(mut w) = registry.build(module, worker) else {
        eprintln!("Error: no worker registered for module {module:?}, worker {worker:?}");
        return 1;
    };
    protected_run(w.as_mut(), args)
}

fn init_logging(debug: bool) {
    use tracing_subscriber::{fmt, EnvFilter};
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).init();
}

fn run(cli: Cli) -> Result<()> {
    let workflow_path = cli
        .list
        .clone()
        .ok_or_else(|| anyhow!("-l/--list <FILE> is required"))?;

    let mut config = Config::new();

    if let Some(config_file) = &cli.config {
        config
            .source_config_file(config_file)
            .with_context(|| format!("sourcing config file {}", config_file.display()))?;
    }

    if cli.debug {
        config.set("debug", "true")?;
    }
    if let Some(n) = cli.max_procs {
        config.set("max_procs", n.to_string())?;
    }
    if let Some(n) = cli.tickrate {
        config.set("tickrate", n.to_string())?;
    }
    if let Some(email) = &cli.email {
        config.set("email", email.clone())?;
    }
    if cli.email_on_fail {
        config.set("email_on_fail", "true")?;
    }
    if cli.email_on_success {
        config.set("email_on_success", "true")?;
    }
    if cli.nozip {
        config.set("nozip", "true")?;
    }
    if cli.dump_logs {
        config.set("dump_logs", "true")?;
    }

    for kv in &cli.env {
        let (key, value) = split_kv(kv).with_context(|| format!("--env expects KEY=VALUE, got {kv:?}"))?;
        std::env::set_var(key, value);
    }

    let mut cvars = Vec::with_capacity(cli.cvar.len());
    for kv in &cli.cvar {
        let (key, value) = split_kv(kv).with_context(|| format!("--cvar expects KEY=VALUE, got {kv:?}"))?;
        cvars.push((key.to_string(), value.to_string()));
    }

    let subgraph = subgraph_selection(&cli)?;

    let options = RunOptions {
        subgraph,
        dryrun: cli.dryrun,
        cvars,
        interactive: cli.interactive,
    };

    let app = App::new(config);
    let adapter = StdProcessAdapter;
    let clock = SystemClock;
    let notifier = NoOpNotifier;
    let prompter = StdinPrompter;
    let sleeper = RealSleeper;
    let mut lifecycle = bg_app::NoOpLifecycle;

    let format = WorkflowFormat::from_path(&workflow_path, Mode::Shell);
    let summary = app.run(
        &workflow_path,
        format,
        &adapter,
        &clock,
        &mut lifecycle,
        &notifier,
        &options,
        &prompter,
        &sleeper,
    )?;

    if !summary.success {
        std::process::exit(1);
    }
    Ok(())
}

/// At most one subgraph-selection flag makes sense per run; `-x`/`-N`/`-A`/`-D`
/// are mutually exclusive the way the original flag grammar treats them.
fn subgraph_selection(cli: &Cli) -> Result<Option<SubgraphSelection>> {
    let mut selections = Vec::new();
    if let Some(ids) = &cli.exec_only {
        selections.push(SubgraphSelection::Only(ids.clone()));
    }
    if let Some(ids) = &cli.norun {
        selections.push(SubgraphSelection::Disable(ids.clone()));
    }
    if let Some(id) = cli.to {
        selections.push(SubgraphSelection::To(id));
    }
    if let Some(id) = cli.from {
        selections.push(SubgraphSelection::From(id));
    }
    if selections.len() > 1 {
        return Err(anyhow!("-x/-N/-A/-D are mutually exclusive"));
    }
    Ok(selections.into_iter().next())
}

fn split_kv(kv: &str) -> Result<(&str, &str)> {
    kv.split_once('=').ok_or_else(|| anyhow!("expected KEY=VALUE"))
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
