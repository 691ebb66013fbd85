use super::*;

struct ScriptedWorker {
    fail_at: Option<&'static str>,
    run_code: i32,
    destroyed: bool,
}

impl ScriptedWorker {
    fn new(run_code: i32) -> Self {
        Self {
            fail_at: None,
            run_code,
            destroyed: false,
        }
    }

    fn failing(stage: &'static str) -> Self {
        Self {
            fail_at: Some(stage),
            run_code: 0,
            destroyed: false,
        }
    }
}

impl Worker for ScriptedWorker {
    fn on_start(&mut self) -> Result<(), WorkerError> {
        if self.fail_at == Some("on_start") {
            return Err(WorkerError::Failed("boom".into()));
        }
        Ok(())
    }

    fn run(&mut self, _args: &[String]) -> Result<i32, WorkerError> {
        if self.fail_at == Some("run") {
            return Err(WorkerError::Failed("boom".into()));
        }
        Ok(self.run_code)
    }

    fn on_success(&mut self) -> Result<(), WorkerError> {
        if self.fail_at == Some("on_success") {
            return Err(WorkerError::Failed("boom".into()));
        }
        Ok(())
    }

    fn on_fail(&mut self, _retcode: i32) -> Result<(), WorkerError> {
        if self.fail_at == Some("on_fail") {
            return Err(WorkerError::Failed("boom".into()));
        }
        Ok(())
    }

    fn on_destroy(&mut self) {
        self.destroyed = true;
    }
}

#[test]
fn successful_run_returns_its_own_exit_code() {
    let mut worker = ScriptedWorker::new(0);
    assert_eq!(protected_run(&mut worker, &[]), 0);
}

#[test]
fn failed_run_propagates_its_exit_code_unchanged() {
    let mut worker = ScriptedWorker::new(3);
    assert_eq!(protected_run(&mut worker, &[]), 3);
}

#[test]
fn on_start_exception_maps_to_reserved_code_and_skips_run() {
    let mut worker = ScriptedWorker::failing("on_start");
    assert_eq!(protected_run(&mut worker, &[]), reserved_code::ON_START_ERROR);
}

#[test]
fn run_exception_maps_to_reserved_code() {
    let mut worker = ScriptedWorker::failing("run");
    assert_eq!(protected_run(&mut worker, &[]), reserved_code::RUN_ERROR);
}

#[test]
fn on_success_exception_maps_to_reserved_code() {
    let mut worker = ScriptedWorker::failing("on_success");
    assert_eq!(protected_run(&mut worker, &[]), reserved_code::ON_SUCCESS_ERROR);
}

#[test]
fn on_fail_exception_maps_to_reserved_code() {
    let mut worker = ScriptedWorker::new(1);
    worker.fail_at = Some("on_fail");
    assert_eq!(protected_run(&mut worker, &[]), reserved_code::ON_FAIL_ERROR);
}

#[test]
fn on_destroy_always_runs_even_after_a_failure() {
    let mut worker = ScriptedWorker::failing("run");
    protected_run(&mut worker, &[]);
    assert!(worker.destroyed);
}

#[test]
fn registry_resolves_the_builtin_shell_worker() {
    let registry = WorkerRegistry::new();
    assert!(registry.build("shell", "ShellWorker").is_some());
    assert!(registry.build("nope", "Nope").is_none());
}

#[test]
fn registry_resolves_a_custom_registered_worker() {
    let mut registry = WorkerRegistry::new();
    registry.register("custom", "EchoWorker", || Box::new(ScriptedWorker::new(0)));
    assert!(registry.build("custom", "EchoWorker").is_some());
}
