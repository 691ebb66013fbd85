// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application-level lifecycle hooks, distinct from the per-node
//! `bg_engine::Worker` hooks: these fire once per run rather than once per
//! task, so an embedder can wire up its own setup/teardown around the
//! whole DAG.

pub trait AppLifecycle {
    fn on_create(&mut self) {}
    fn on_start(&mut self) {}
    fn on_restart(&mut self) {}
    fn on_success(&mut self) {}
    fn on_fail(&mut self) {}
    fn on_destroy(&mut self) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLifecycle;

impl AppLifecycle for NoOpLifecycle {}
