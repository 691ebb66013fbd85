// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] bg_core::ConfigError),
    #[error(transparent)]
    Format(#[from] bg_format::FormatError),
    #[error(transparent)]
    Storage(#[from] bg_storage::StorageError),
    #[error(transparent)]
    Engine(#[from] bg_engine::EngineError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported workflow file extension: {0:?}")]
    UnknownFormat(String),
    #[error("another instance is already running for app_name {0:?}")]
    DuplicateInstance(String),
}
