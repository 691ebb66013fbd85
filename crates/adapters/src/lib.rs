// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Testable seams around the two things the engine does that touch the
//! outside world: forking a subprocess worker, and notifying someone the
//! run finished.

mod error;
mod notify;
mod process;

pub use error::AdapterError;
pub use notify::{FakeNotifier, NoOpNotifier, Notifier, RunOutcome};
pub use process::{ExitStatus, ProcessAdapter, ProcessHandle, StdProcessAdapter};

#[cfg(any(test, feature = "test-support"))]
pub use process::{FakeOutcome, FakeProcessAdapter};
