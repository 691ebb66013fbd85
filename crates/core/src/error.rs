// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Umbrella error for the `bg-core` crate, re-exported so downstream crates
/// can convert into it with `?` without depending on every leaf error type.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] crate::ConfigError),
}
