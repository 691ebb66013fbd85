// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic checkpoint writes: write to a sibling `.tmp` file, fsync it,
//! unlink the previous checkpoint if one exists, then rename the `.tmp`
//! file into place. A crash at any point leaves either the old checkpoint
//! or the new one intact, never a half-written file.
//!
//! `CheckpointWriter` abstracts the filesystem calls so the discipline
//! itself can be unit tested with a `FakeCheckpointWriter` that never
//! touches disk.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::StorageError;

pub trait CheckpointWriter: Send + Sync {
    fn write(&self, path: &Path, data: &[u8]) -> Result<(), StorageError>;
    fn remove_if_exists(&self, path: &Path) -> Result<(), StorageError>;
    fn rename(&self, from: &Path, to: &Path) -> Result<(), StorageError>;
    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, StorageError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsCheckpointWriter;

impl CheckpointWriter for FsCheckpointWriter {
    fn write(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        let io = |source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        let mut file = File::create(path).map_err(io)?;
        file.write_all(data).map_err(io)?;
        file.sync_all().map_err(io)?;
        Ok(())
    }

    fn remove_if_exists(&self, path: &Path) -> Result<(), StorageError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), StorageError> {
        std::fs::rename(from, to).map_err(|source| StorageError::Io {
            path: to.to_path_buf(),
            source,
        })
    }

    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// The `.ctllog`/`.ctx` pair for one app instance.
pub struct Checkpoint<W: CheckpointWriter = FsCheckpointWriter> {
    writer: W,
    ctllog_path: PathBuf,
    ctx_path: PathBuf,
}

impl Checkpoint<FsCheckpointWriter> {
    pub fn new(ctllog_path: PathBuf, ctx_path: PathBuf) -> Self {
        Self::with_writer(FsCheckpointWriter, ctllog_path, ctx_path)
    }
}

impl<W: CheckpointWriter> Checkpoint<W> {
    pub fn with_writer(writer: W, ctllog_path: PathBuf, ctx_path: PathBuf) -> Self {
        Self {
            writer,
            ctllog_path,
            ctx_path,
        }
    }

    pub fn write_ctllog(&self, contents: &str) -> Result<(), StorageError> {
        self.atomic_write(&self.ctllog_path, contents.as_bytes())
    }

    pub fn write_ctx(&self, contents: &[u8]) -> Result<(), StorageError> {
        self.atomic_write(&self.ctx_path, contents)
    }

    pub fn load_ctllog(&self) -> Result<Option<String>, StorageError> {
        Ok(self
            .writer
            .read(&self.ctllog_path)?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    pub fn load_ctx(&self) -> Result<Option<Vec<u8>>, StorageError> {
        self.writer.read(&self.ctx_path)
    }

    /// True only when both files are present — per the resume contract, a
    /// partial pair (one file missing) falls back to a fresh load rather
    /// than a half-restored resume.
    pub fn resume_available(&self) -> bool {
        self.ctllog_path.exists() && self.ctx_path.exists()
    }

    pub fn delete(&self) -> Result<(), StorageError> {
        self.writer.remove_if_exists(&self.ctllog_path)?;
        self.writer.remove_if_exists(&self.ctx_path)?;
        Ok(())
    }

    fn atomic_write(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        let tmp_path = tmp_sibling(path);
        self.writer.write(&tmp_path, data)?;
        self.writer.remove_if_exists(path)?;
        self.writer.rename(&tmp_path, path)?;
        Ok(())
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".tmp");
    path.with_file_name(name)
}

#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct FakeCheckpointWriter {
    files: parking_lot::Mutex<std::collections::HashMap<PathBuf, Vec<u8>>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeCheckpointWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl CheckpointWriter for FakeCheckpointWriter {
    fn write(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        self.files.lock().insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    fn remove_if_exists(&self, path: &Path) -> Result<(), StorageError> {
        self.files.lock().remove(path);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), StorageError> {
        if let Some(data) = self.files.lock().remove(from) {
            self.files.lock().insert(to.to_path_buf(), data);
        }
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.files.lock().get(path).cloned())
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
