// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task status bucket enumeration.

use std::fmt;

/// The seven buckets a node can live in inside a register at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TaskStatus {
    Completed,
    Pending,
    Running,
    Failed,
    Defaulted,
    Norun,
    Aborted,
}

impl TaskStatus {
    /// All seven buckets, in the order a register reports them.
    pub const ALL: [TaskStatus; 7] = [
        TaskStatus::Completed,
        TaskStatus::Pending,
        TaskStatus::Running,
        TaskStatus::Failed,
        TaskStatus::Defaulted,
        TaskStatus::Norun,
        TaskStatus::Aborted,
    ];

    /// Single-character code used in the list serialization format.
    pub fn code(self) -> char {
        match self {
            TaskStatus::Completed => 'C',
            TaskStatus::Pending => 'P',
            TaskStatus::Running => 'R',
            TaskStatus::Failed => 'F',
            TaskStatus::Defaulted => 'D',
            TaskStatus::Norun => 'N',
            TaskStatus::Aborted => 'A',
        }
    }

    pub fn from_code(code: char) -> Option<TaskStatus> {
        Some(match code {
            'C' => TaskStatus::Completed,
            'P' => TaskStatus::Pending,
            'R' => TaskStatus::Running,
            'F' => TaskStatus::Failed,
            'D' => TaskStatus::Defaulted,
            'N' => TaskStatus::Norun,
            'A' => TaskStatus::Aborted,
            _ => return None,
        })
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
