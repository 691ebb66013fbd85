// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("node validation failed: {0}")]
    Validation(String),
    #[error("unresolved dependency {0:?} referenced by one or more nodes")]
    UnresolvedDependency(String),
    #[error("duplicate node id {0}")]
    DuplicateId(i64),
    #[error("duplicate node name {0:?}")]
    DuplicateName(String),
    #[error("no such node: {0}")]
    NodeNotFound(String),
    #[error(transparent)]
    Adapter(#[from] bg_adapters::AdapterError),
    #[error("context store I/O error: {0}")]
    ContextIo(#[from] std::io::Error),
    #[error("context store serialization error: {0}")]
    ContextSerde(#[from] serde_json::Error),
    #[error("log file I/O error: {0}")]
    LogIo(std::io::Error),
}
