// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only per-task log writer. Writes to the same file the worker
//! subprocess's stdout/stderr are redirected to, so engine-level events
//! (restarts, terminations, spawn failures) show up inline with the
//! worker's own output.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

fn open(path: &Path) -> Result<std::fs::File, EngineError> {
    OpenOptions::new().create(true).append(true).open(path).map_err(EngineError::LogIo)
}

/// Appends a single level-tagged line. A node with no `logfile` configured
/// is a silent no-op.
pub fn append_line(logfile: Option<&Path>, level: Level, message: &str) -> Result<(), EngineError> {
    let Some(path) = logfile else { return Ok(()) };
    writeln!(open(path)?, "[{}] {message}", level.tag()).map_err(EngineError::LogIo)
}

/// Appends a framed banner so a restart or termination event stands out
/// against the raw worker output sharing the same file.
pub fn append_banner(logfile: Option<&Path>, level: Level, message: &str) -> Result<(), EngineError> {
    let Some(path) = logfile else { return Ok(()) };
    let frame = "-".repeat(message.len() + 4);
    writeln!(open(path)?, "{frame}\n[{}] {message}\n{frame}", level.tag()).map_err(EngineError::LogIo)
}

#[cfg(test)]
#[path = "logger_tests.rs"]
mod tests;
