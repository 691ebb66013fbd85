// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The scheduling core: `ExecutionNode`, `NodeRegister`, `Context`,
//! `SignalHandler`, the worker lifecycle, and the `ExecutionEngine` tick
//! loop that ties them together.

mod context;
mod engine;
mod error;
mod logger;
mod node;
mod register;
mod signal;
mod worker;

pub use context::{Context, ContextBackend, FsContextBackend, RealSleeper, Sleeper, DEFAULT_POLL_INTERVAL};
pub use engine::{EngineHooks, ExecutionEngine, NoOpHooks, TickOutcome};
pub use error::EngineError;
pub use logger::Level as LogLevel;
pub use node::{reserved_code, ExecutionNode, PollOutcome};
pub use register::NodeRegister;
pub use signal::{Signal, SignalHandler, DUPLICATE_CHECK_WAIT};
pub use worker::{protected_run, ShellWorker, Worker, WorkerRegistry};

#[cfg(any(test, feature = "test-support"))]
pub use context::FakeContextBackend;
