// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("workflow file not found: {0}")]
    FileNotFound(String),
    #[error("workflow file has no header line")]
    MissingHeader,
    #[error("unrecognized mode {0:?}, expected SHELL or PYTHON")]
    UnknownMode(String),
    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },
    #[error("duplicate node id {0}")]
    DuplicateId(i64),
    #[error("duplicate node name {0:?}")]
    DuplicateName(String),
    #[error("environment variable {0:?} is not set")]
    MissingEnvVar(String),
    #[error("invalid JSON workflow file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error reading workflow file: {0}")]
    Io(#[from] std::io::Error),
}
