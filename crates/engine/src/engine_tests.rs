use super::*;
use bg_adapters::{FakeOutcome, FakeProcessAdapter};
use bg_core::FakeClock;
use bg_format::{DependencyRef, NodeSpec, WorkflowFile};
use std::path::PathBuf;
use std::time::Duration;

fn spec(id: i64, name: &str, deps: Vec<DependencyRef>, max_attempts: u32, retry_wait_secs: u64) -> NodeSpec {
    NodeSpec {
        id,
        name: name.into(),
        module: "shell".into(),
        worker: "ShellWorker".into(),
        arguments: vec!["true".into()],
        logfile: None,
        max_attempts,
        retry_wait_time_secs: retry_wait_secs,
        timeout_secs: None,
        dependencies: deps,
        status: None,
    }
}

fn drive_to_finish(engine: &mut ExecutionEngine, max_ticks: usize) -> TickOutcome {
    for _ in 0..max_ticks {
        let outcome = engine.tick().unwrap();
        if outcome != TickOutcome::Active {
            return outcome;
        }
    }
    panic!("engine did not reach a terminal state within {max_ticks} ticks");
}

#[test]
fn a_simple_chain_runs_to_completion() {
    let mut register = NodeRegister::new();
    register
        .load(WorkflowFile {
            nodes: vec![
                spec(0, "a", vec![DependencyRef::Id(bg_core::ROOT_NODE_ID)], 1, 0),
                spec(1, "b", vec![DependencyRef::Id(0)], 1, 0),
            ],
        })
        .unwrap();

    let adapter = FakeProcessAdapter::new();
    adapter.push(FakeOutcome::ExitsAfterPolls { polls: 0, code: 0 });
    adapter.push(FakeOutcome::ExitsAfterPolls { polls: 0, code: 0 });
    let clock = FakeClock::new();
    let mut hooks = NoOpHooks;
    let dir = tempfile::tempdir().unwrap();
    let mut engine = ExecutionEngine::new(
        register,
        &adapter,
        &clock,
        dir.path().to_path_buf(),
        &mut hooks,
        PathBuf::from("/bin/self"),
        4,
        Duration::ZERO,
    );

    let outcome = drive_to_finish(&mut engine, 10);
    assert_eq!(outcome, TickOutcome::Finished);
    assert_eq!(engine.register().status_of(0), Some(TaskStatus::Completed));
    assert_eq!(engine.register().status_of(1), Some(TaskStatus::Completed));
}

#[test]
fn a_failed_node_defaults_its_pending_children() {
    let mut register = NodeRegister::new();
    register
        .load(WorkflowFile {
            nodes: vec![
                spec(0, "a", vec![DependencyRef::Id(bg_core::ROOT_NODE_ID)], 1, 0),
                spec(1, "b", vec![DependencyRef::Id(0)], 1, 0),
            ],
        })
        .unwrap();

    let adapter = FakeProcessAdapter::new();
    adapter.push(FakeOutcome::ExitsAfterPolls { polls: 0, code: 1 });
    let clock = FakeClock::new();
    let mut hooks = NoOpHooks;
    let dir = tempfile::tempdir().unwrap();
    let mut engine = ExecutionEngine::new(
        register,
        &adapter,
        &clock,
        dir.path().to_path_buf(),
        &mut hooks,
        PathBuf::from("/bin/self"),
        4,
        Duration::ZERO,
    );

    let outcome = drive_to_finish(&mut engine, 10);
    assert_eq!(outcome, TickOutcome::Finished);
    assert_eq!(engine.register().status_of(0), Some(TaskStatus::Failed));
    assert_eq!(engine.register().status_of(1), Some(TaskStatus::Defaulted));
}

#[test]
fn abort_signal_kills_running_nodes_and_stops_the_run() {
    let mut register = NodeRegister::new();
    register
        .load(WorkflowFile {
            nodes: vec![spec(0, "a", vec![DependencyRef::Id(bg_core::ROOT_NODE_ID)], 1, 0)],
        })
        .unwrap();

    let adapter = FakeProcessAdapter::new();
    adapter.push(FakeOutcome::RunsForever);
    let clock = FakeClock::new();
    let mut hooks = NoOpHooks;
    let dir = tempfile::tempdir().unwrap();
    let signal_dir = dir.path().to_path_buf();
    let mut engine = ExecutionEngine::new(
        register,
        &adapter,
        &clock,
        signal_dir.clone(),
        &mut hooks,
        PathBuf::from("/bin/self"),
        4,
        Duration::ZERO,
    );

    assert_eq!(engine.tick().unwrap(), TickOutcome::Active);
    assert_eq!(engine.register().status_of(0), Some(TaskStatus::Running));

    SignalHandler::new(signal_dir).emit(Signal::Abort).unwrap();
    assert_eq!(engine.tick().unwrap(), TickOutcome::Aborted);
    assert_eq!(engine.register().status_of(0), Some(TaskStatus::Aborted));
}

#[test]
fn pause_signal_blocks_promotion_but_still_reaps() {
    let mut register = NodeRegister::new();
    register
        .load(WorkflowFile {
            nodes: vec![spec(0, "a", vec![DependencyRef::Id(bg_core::ROOT_NODE_ID)], 1, 0)],
        })
        .unwrap();

    let adapter = FakeProcessAdapter::new();
    let clock = FakeClock::new();
    let mut hooks = NoOpHooks;
    let dir = tempfile::tempdir().unwrap();
    let signal_dir = dir.path().to_path_buf();
    SignalHandler::new(signal_dir.clone()).emit(Signal::Pause).unwrap();

    let mut engine = ExecutionEngine::new(
        register,
        &adapter,
        &clock,
        signal_dir,
        &mut hooks,
        PathBuf::from("/bin/self"),
        4,
        Duration::ZERO,
    );

    assert_eq!(engine.tick().unwrap(), TickOutcome::Active);
    // Still pending: paused runs never promote new work.
    assert_eq!(engine.register().status_of(0), Some(TaskStatus::Pending));
}

#[test]
fn max_procs_limits_concurrently_running_nodes() {
    let mut register = NodeRegister::new();
    register
        .load(WorkflowFile {
            nodes: vec![
                spec(0, "a", vec![DependencyRef::Id(bg_core::ROOT_NODE_ID)], 1, 0),
                spec(1, "b", vec![DependencyRef::Id(bg_core::ROOT_NODE_ID)], 1, 0),
                spec(2, "c", vec![DependencyRef::Id(bg_core::ROOT_NODE_ID)], 1, 0),
            ],
        })
        .unwrap();

    let adapter = FakeProcessAdapter::new();
    adapter.push(FakeOutcome::RunsForever);
    adapter.push(FakeOutcome::RunsForever);
    adapter.push(FakeOutcome::RunsForever);
    let clock = FakeClock::new();
    let mut hooks = NoOpHooks;
    let dir = tempfile::tempdir().unwrap();
    let mut engine = ExecutionEngine::new(
        register,
        &adapter,
        &clock,
        dir.path().to_path_buf(),
        &mut hooks,
        PathBuf::from("/bin/self"),
        2,
        Duration::ZERO,
    );

    engine.tick().unwrap();
    let spawned = engine
        .register()
        .bucket(TaskStatus::Running)
        .filter(|n| n.start_time.is_some())
        .count();
    assert_eq!(spawned, 2);
}

#[test]
fn exec_only_runs_a_node_whose_skipped_parent_is_norun() {
    // a -> b -> c; exec_only([2]) puts a and b into norun, leaving only c
    // pending. c's direct parent (b) never completes, so promotion must
    // treat a norun parent as satisfied or c can never run.
    let mut register = NodeRegister::new();
    register
        .load(WorkflowFile {
            nodes: vec![
                spec(0, "a", vec![DependencyRef::Id(bg_core::ROOT_NODE_ID)], 1, 0),
                spec(1, "b", vec![DependencyRef::Id(0)], 1, 0),
                spec(2, "c", vec![DependencyRef::Id(1)], 1, 0),
            ],
        })
        .unwrap();
    register.exec_only(&[2]);
    assert_eq!(register.status_of(0), Some(TaskStatus::Norun));
    assert_eq!(register.status_of(1), Some(TaskStatus::Norun));
    assert_eq!(register.status_of(2), Some(TaskStatus::Pending));

    let adapter = FakeProcessAdapter::new();
    adapter.push(FakeOutcome::ExitsAfterPolls { polls: 0, code: 0 });
    let clock = FakeClock::new();
    let mut hooks = NoOpHooks;
    let dir = tempfile::tempdir().unwrap();
    let mut engine = ExecutionEngine::new(
        register,
        &adapter,
        &clock,
        dir.path().to_path_buf(),
        &mut hooks,
        PathBuf::from("/bin/self"),
        4,
        Duration::ZERO,
    );

    let outcome = drive_to_finish(&mut engine, 10);
    assert_eq!(outcome, TickOutcome::Finished);
    assert_eq!(engine.register().status_of(2), Some(TaskStatus::Completed));
}

struct DrainCountingHooks {
    drains: std::rc::Rc<std::cell::Cell<usize>>,
}

impl EngineHooks for DrainCountingHooks {
    fn on_interactive_drain(&mut self) -> Result<(), EngineError> {
        self.drains.set(self.drains.get() + 1);
        Ok(())
    }
}

#[test]
fn on_interactive_drain_fires_once_per_tick() {
    let mut register = NodeRegister::new();
    register
        .load(WorkflowFile {
            nodes: vec![spec(0, "a", vec![DependencyRef::Id(bg_core::ROOT_NODE_ID)], 1, 0)],
        })
        .unwrap();

    let adapter = FakeProcessAdapter::new();
    adapter.push(FakeOutcome::ExitsAfterPolls { polls: 0, code: 0 });
    let clock = FakeClock::new();
    let drains = std::rc::Rc::new(std::cell::Cell::new(0));
    let mut hooks = DrainCountingHooks { drains: drains.clone() };
    let dir = tempfile::tempdir().unwrap();
    let mut engine = ExecutionEngine::new(
        register,
        &adapter,
        &clock,
        dir.path().to_path_buf(),
        &mut hooks,
        PathBuf::from("/bin/self"),
        4,
        Duration::ZERO,
    );

    engine.tick().unwrap();
    assert_eq!(drains.get(), 1);
    engine.tick().unwrap();
    assert_eq!(drains.get(), 2);
}
