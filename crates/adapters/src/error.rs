// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("failed to spawn worker process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed to poll worker process: {0}")]
    Poll(#[source] std::io::Error),
    #[error("failed to terminate worker process: {0}")]
    Kill(#[source] std::io::Error),
}
