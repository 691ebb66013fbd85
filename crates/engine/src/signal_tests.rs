use super::*;
use std::cell::RefCell;

fn wait_noop(_d: Duration) {}

#[test]
fn emit_then_peek_is_true() {
    let dir = tempfile::tempdir().unwrap();
    let sig = SignalHandler::new(dir.path().to_path_buf());
    assert!(!sig.peek(Signal::Abort));
    sig.emit(Signal::Abort).unwrap();
    assert!(sig.peek(Signal::Abort));
}

#[test]
fn consume_removes_the_file_and_reports_it_was_present() {
    let dir = tempfile::tempdir().unwrap();
    let sig = SignalHandler::new(dir.path().to_path_buf());
    sig.emit(Signal::Pause).unwrap();
    assert!(sig.consume(Signal::Pause).unwrap());
    assert!(!sig.peek(Signal::Pause));
    assert!(!sig.consume(Signal::Pause).unwrap());
}

#[test]
fn different_signals_are_independent_files() {
    let dir = tempfile::tempdir().unwrap();
    let sig = SignalHandler::new(dir.path().to_path_buf());
    sig.emit(Signal::Abort).unwrap();
    assert!(!sig.peek(Signal::Pause));
    assert!(!sig.peek(Signal::Pulse));
}

#[test]
fn no_pulse_activity_means_no_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    let sig = SignalHandler::new(dir.path().to_path_buf());
    let waited = RefCell::new(Duration::ZERO);
    let detected = sig
        .detect_running_instance(&|d| *waited.borrow_mut() = d)
        .unwrap();
    assert!(!detected);
    assert_eq!(*waited.borrow(), DUPLICATE_CHECK_WAIT);
}

#[test]
fn a_pulse_written_during_the_wait_window_is_a_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    let sig = SignalHandler::new(dir.path().to_path_buf());
    let detected = sig
        .detect_running_instance(&|_d| {
            // Simulate a sibling engine's tick loop touching the sentinel.
            sig.beat().unwrap();
        })
        .unwrap();
    assert!(detected);
}
