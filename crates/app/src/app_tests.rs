use super::*;

use bg_adapters::{FakeNotifier, FakeOutcome, FakeProcessAdapter, RunOutcome};
use bg_core::FakeClock;
use bg_engine::Sleeper;
use bg_format::Mode;

use crate::hooks::StdinPrompter;

/// Skips the real 1.1s duplicate-instance wait so these tests run fast.
#[derive(Debug, Clone, Copy, Default)]
struct NoOpSleeper;

impl Sleeper for NoOpSleeper {
    fn sleep(&self, _d: std::time::Duration) {}
}

#[derive(Default)]
struct SpyLifecycle {
    calls: Vec<&'static str>,
}

impl AppLifecycle for SpyLifecycle {
    fn on_create(&mut self) {
        self.calls.push("create");
    }
    fn on_start(&mut self) {
        self.calls.push("start");
    }
    fn on_restart(&mut self) {
        self.calls.push("restart");
    }
    fn on_success(&mut self) {
        self.calls.push("success");
    }
    fn on_fail(&mut self) {
        self.calls.push("fail");
    }
    fn on_destroy(&mut self) {
        self.calls.push("destroy");
    }
}

fn test_config(temp_dir: &Path, app_name: &str) -> Config {
    let mut config = Config::new();
    config.set("temp_dir", temp_dir.display().to_string()).unwrap();
    config.set("app_name", app_name).unwrap();
    config
}

#[test]
fn a_fresh_run_completes_and_deletes_its_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let workflow_path = dir.path().join("flow.txt");
    std::fs::write(&workflow_path, "#SHELL\n\n0|-1|1|0|a|true|\n1|0|1|0|b|true|\n").unwrap();

    let mut config = test_config(dir.path(), "freshrun");
    config.set("email_on_success", "true").unwrap();
    let app = App::new(config);

    let adapter = FakeProcessAdapter::new();
    adapter.push(FakeOutcome::ExitsAfterPolls { polls: 0, code: 0 });
    adapter.push(FakeOutcome::ExitsAfterPolls { polls: 0, code: 0 });
    let clock = FakeClock::new();
    let mut lifecycle = SpyLifecycle::default();
    let notifier = FakeNotifier::new();

    let summary = app
        .run(
            &workflow_path,
            WorkflowFormat::from_path(&workflow_path, Mode::Shell),
            &adapter,
            &clock,
            &mut lifecycle,
            &notifier,
            &RunOptions::default(),
            &StdinPrompter,
            &NoOpSleeper,
        )
        .unwrap();

    assert!(summary.success);
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 0);
    assert!(lifecycle.calls.contains(&"start"));
    assert!(!lifecycle.calls.contains(&"restart"));
    assert_eq!(notifier.calls(), vec![(RunOutcome::Success, "run completed successfully".to_string())]);

    let ctllog = dir.path().join("freshrun.ctllog");
    let ctx = dir.path().join("freshrun.ctx");
    assert!(!ctllog.exists());
    assert!(!ctx.exists());
}

#[test]
fn a_resumed_run_loads_the_checkpoint_instead_of_the_workflow_file() {
    let dir = tempfile::tempdir().unwrap();
    let workflow_path = dir.path().join("flow.txt");
    // Left deliberately inconsistent with the checkpoint below: a resumed
    // run must never fall back to re-reading this file.
    std::fs::write(&workflow_path, "#SHELL\n\n0|-1|1|0|only|true|\n").unwrap();

    std::fs::write(
        dir.path().join("resumed.ctllog"),
        "#SHELL\n\n0|-1|1|0|C|0|a|true|\n1|0|1|0|P|0|b|true|\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("resumed.ctx"), "{}").unwrap();

    let config = test_config(dir.path(), "resumed");
    let app = App::new(config);

    let adapter = FakeProcessAdapter::new();
    adapter.push(FakeOutcome::ExitsAfterPolls { polls: 0, code: 0 });
    let clock = FakeClock::new();
    let mut lifecycle = SpyLifecycle::default();
    let notifier = FakeNotifier::new();

    let summary = app
        .run(
            &workflow_path,
            WorkflowFormat::from_path(&workflow_path, Mode::Shell),
            &adapter,
            &clock,
            &mut lifecycle,
            &notifier,
            &RunOptions::default(),
            &StdinPrompter,
            &NoOpSleeper,
        )
        .unwrap();

    assert!(summary.success);
    assert_eq!(summary.completed, 2);
    assert!(lifecycle.calls.contains(&"restart"));
    assert!(!lifecycle.calls.contains(&"start"));
}

#[test]
fn a_failing_run_keeps_its_checkpoint_and_notifies_on_fail() {
    let dir = tempfile::tempdir().unwrap();
    let workflow_path = dir.path().join("flow.txt");
    std::fs::write(&workflow_path, "#SHELL\n\n0|-1|1|0|a|false|\n").unwrap();

    let mut config = test_config(dir.path(), "failrun");
    config.set("email_on_fail", "true").unwrap();
    let app = App::new(config);

    let adapter = FakeProcessAdapter::new();
    adapter.push(FakeOutcome::ExitsAfterPolls { polls: 0, code: 1 });
    let clock = FakeClock::new();
    let mut lifecycle = SpyLifecycle::default();
    let notifier = FakeNotifier::new();

    let summary = app
        .run(
            &workflow_path,
            WorkflowFormat::from_path(&workflow_path, Mode::Shell),
            &adapter,
            &clock,
            &mut lifecycle,
            &notifier,
            &RunOptions::default(),
            &StdinPrompter,
            &NoOpSleeper,
        )
        .unwrap();

    assert!(!summary.success);
    assert_eq!(summary.failed, 1);
    assert!(lifecycle.calls.contains(&"fail"));
    assert_eq!(notifier.calls(), vec![(RunOutcome::Failure, "run finished with failures".to_string())]);

    let ctllog = dir.path().join("failrun.ctllog");
    assert!(ctllog.exists());
}

#[test]
fn exec_only_skips_nodes_outside_the_selection() {
    let dir = tempfile::tempdir().unwrap();
    let workflow_path = dir.path().join("flow.txt");
    std::fs::write(&workflow_path, "#SHELL\n\n0|-1|1|0|a|true|\n1|-1|1|0|b|true|\n").unwrap();

    let config = test_config(dir.path(), "execonly");
    let app = App::new(config);

    let adapter = FakeProcessAdapter::new();
    adapter.push(FakeOutcome::ExitsAfterPolls { polls: 0, code: 0 });
    let clock = FakeClock::new();
    let mut lifecycle = SpyLifecycle::default();
    let notifier = FakeNotifier::new();

    let options = RunOptions {
        subgraph: Some(SubgraphSelection::Only(vec![0])),
        ..Default::default()
    };

    let summary = app
        .run(
            &workflow_path,
            WorkflowFormat::from_path(&workflow_path, Mode::Shell),
            &adapter,
            &clock,
            &mut lifecycle,
            &notifier,
            &options,
            &StdinPrompter,
            &NoOpSleeper,
        )
        .unwrap();

    assert!(summary.success);
    assert_eq!(summary.completed, 1);
}

#[test]
fn dryrun_runs_nothing_and_reports_success() {
    let dir = tempfile::tempdir().unwrap();
    let workflow_path = dir.path().join("flow.txt");
    std::fs::write(&workflow_path, "#SHELL\n\n0|-1|1|0|a|false|\n").unwrap();

    let config = test_config(dir.path(), "dryrun");
    let app = App::new(config);

    let adapter = FakeProcessAdapter::new();
    let clock = FakeClock::new();
    let mut lifecycle = SpyLifecycle::default();
    let notifier = FakeNotifier::new();

    let options = RunOptions {
        dryrun: true,
        ..Default::default()
    };

    let summary = app
        .run(
            &workflow_path,
            WorkflowFormat::from_path(&workflow_path, Mode::Shell),
            &adapter,
            &clock,
            &mut lifecycle,
            &notifier,
            &options,
            &StdinPrompter,
            &NoOpSleeper,
        )
        .unwrap();

    assert!(summary.success);
    assert_eq!(summary.completed, 0);
    assert!(notifier.calls().is_empty());
    // A dryrun never even creates a checkpoint to begin with.
    assert!(!dir.path().join("dryrun.ctllog").exists());
}

#[test]
fn cvars_are_visible_in_the_context_before_the_run_starts() {
    let dir = tempfile::tempdir().unwrap();
    let workflow_path = dir.path().join("flow.txt");
    // A failing node so the checkpoint (and its context file) survives the
    // run for inspection instead of being deleted on success.
    std::fs::write(&workflow_path, "#SHELL\n\n0|-1|1|0|a|false|\n").unwrap();

    let config = test_config(dir.path(), "cvarrun");
    let app = App::new(config);

    let adapter = FakeProcessAdapter::new();
    adapter.push(FakeOutcome::ExitsAfterPolls { polls: 0, code: 1 });
    let clock = FakeClock::new();
    let mut lifecycle = SpyLifecycle::default();
    let notifier = FakeNotifier::new();

    let options = RunOptions {
        cvars: vec![("greeting".to_string(), "hello".to_string())],
        ..Default::default()
    };

    app.run(
        &workflow_path,
        WorkflowFormat::from_path(&workflow_path, Mode::Shell),
        &adapter,
        &clock,
        &mut lifecycle,
        &notifier,
        &options,
        &StdinPrompter,
        &NoOpSleeper,
    )
    .unwrap();

    let ctx_bytes = std::fs::read(dir.path().join("cvarrun.ctx")).unwrap();
    let ctx_text = String::from_utf8(ctx_bytes).unwrap();
    assert!(ctx_text.contains("greeting"));
    assert!(ctx_text.contains("hello"));
}

#[test]
fn a_pulse_file_touched_during_the_duplicate_check_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let workflow_path = dir.path().join("flow.txt");
    std::fs::write(&workflow_path, "#SHELL\n\n0|-1|1|0|a|true|\n").unwrap();

    let config = test_config(dir.path(), "dupecheck");
    let app = App::new(config);

    let adapter = FakeProcessAdapter::new();
    let clock = FakeClock::new();
    let mut lifecycle = SpyLifecycle::default();
    let notifier = FakeNotifier::new();

    struct SiblingEngineSleeper {
        pulse_file: std::path::PathBuf,
    }
    impl Sleeper for SiblingEngineSleeper {
        fn sleep(&self, _d: std::time::Duration) {
            // Simulate a sibling engine's tick loop touching the sentinel
            // mid-wait.
            std::fs::write(&self.pulse_file, b"").unwrap();
        }
    }
    let sleeper = SiblingEngineSleeper {
        pulse_file: dir.path().join(".pulse"),
    };

    let err = app
        .run(
            &workflow_path,
            WorkflowFormat::from_path(&workflow_path, Mode::Shell),
            &adapter,
            &clock,
            &mut lifecycle,
            &notifier,
            &RunOptions::default(),
            &StdinPrompter,
            &sleeper,
        )
        .unwrap_err();

    assert!(matches!(err, AppError::DuplicateInstance(name) if name == "dupecheck"));
}
