// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A key/value store shared across the main process and every forked
//! worker. Each operation reloads the backing file first, so a value a
//! sibling worker just wrote becomes visible on the next `get` without any
//! IPC beyond the filesystem. `get_blocking` layers a ~2Hz poll on top for
//! interactive workflows that wait on a value another task will produce.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use bg_core::Clock;

use crate::EngineError;

/// On-disk shape of a `.ctx` file: the key/value map plus the FIFO of keys
/// a worker is blocked on under interactive mode. `#[serde(default)]` keeps
/// a bare `{}` (or a plain value map written before the request queue was
/// added) loadable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ContextData {
    #[serde(default)]
    values: HashMap<String, String>,
    #[serde(default)]
    requests: Vec<String>,
}

pub trait ContextBackend: Send + Sync {
    fn load(&self, path: &Path) -> Result<ContextData, EngineError>;
    fn save(&self, path: &Path, data: &ContextData) -> Result<(), EngineError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsContextBackend;

impl ContextBackend for FsContextBackend {
    fn load(&self, path: &Path) -> Result<ContextData, EngineError> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ContextData::default()),
            Err(e) => Err(EngineError::ContextIo(e)),
        }
    }

    fn save(&self, path: &Path, data: &ContextData) -> Result<(), EngineError> {
        let bytes = serde_json::to_vec(data)?;
        let tmp = tmp_sibling(path);
        std::fs::write(&tmp, &bytes).map_err(EngineError::ContextIo)?;
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(EngineError::ContextIo(e));
            }
        }
        std::fs::rename(&tmp, path).map_err(EngineError::ContextIo)?;
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

/// Waits out a poll interval between `get_blocking` retries. Abstracted so
/// tests never actually sleep.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, d: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RealSleeper;

impl Sleeper for RealSleeper {
    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

pub struct Context<B: ContextBackend = FsContextBackend> {
    backend: B,
    path: PathBuf,
    cache: RwLock<ContextData>,
}

impl Context<FsContextBackend> {
    pub fn new(path: PathBuf) -> Result<Self, EngineError> {
        Self::with_backend(FsContextBackend, path)
    }
}

impl<B: ContextBackend> Context<B> {
    pub fn with_backend(backend: B, path: PathBuf) -> Result<Self, EngineError> {
        let cache = backend.load(&path)?;
        Ok(Self {
            backend,
            path,
            cache: RwLock::new(cache),
        })
    }

    fn reload(&self) -> Result<(), EngineError> {
        let fresh = self.backend.load(&self.path)?;
        *self.cache.write() = fresh;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, EngineError> {
        self.reload()?;
        Ok(self.cache.read().values.get(key).cloned())
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), EngineError> {
        self.reload()?;
        let mut data = self.cache.write();
        data.values.insert(key.to_string(), value.to_string());
        data.requests.retain(|k| k != key);
        self.backend.save(&self.path, &data)
    }

    pub fn remove(&self, key: &str) -> Result<(), EngineError> {
        self.reload()?;
        let mut data = self.cache.write();
        data.values.remove(key);
        self.backend.save(&self.path, &data)
    }

    pub fn keys(&self) -> Result<Vec<String>, EngineError> {
        self.reload()?;
        Ok(self.cache.read().values.keys().cloned().collect())
    }

    pub fn snapshot(&self) -> Result<HashMap<String, String>, EngineError> {
        self.reload()?;
        Ok(self.cache.read().values.clone())
    }

    /// Enqueues `key` on the interactive request queue if it isn't already
    /// present (as a value or as a pending request). A no-op if the key is
    /// already resolved or already queued.
    pub fn request(&self, key: &str) -> Result<(), EngineError> {
        self.reload()?;
        let mut data = self.cache.write();
        if data.values.contains_key(key) || data.requests.iter().any(|k| k == key) {
            return Ok(());
        }
        data.requests.push(key.to_string());
        self.backend.save(&self.path, &data)
    }

    /// Keys currently awaiting an interactive answer, in request order.
    pub fn pending_requests(&self) -> Result<Vec<String>, EngineError> {
        self.reload()?;
        Ok(self.cache.read().requests.clone())
    }

    /// Answers a pending interactive request: records the value and drops
    /// the key from the request queue.
    pub fn fulfill(&self, key: &str, value: &str) -> Result<(), EngineError> {
        self.set(key, value)
    }

    /// Poll for `key` at `poll_interval` until it appears or `timeout` elapses.
    pub fn get_blocking(
        &self,
        key: &str,
        poll_interval: Duration,
        timeout: Duration,
        clock: &dyn Clock,
        sleeper: &dyn Sleeper,
    ) -> Result<Option<String>, EngineError> {
        let deadline = clock.now() + timeout;
        loop {
            if let Some(value) = self.get(key)? {
                return Ok(Some(value));
            }
            if clock.now() >= deadline {
                return Ok(None);
            }
            sleeper.sleep(poll_interval);
        }
    }

    /// Interactive-mode lookup: returns an already-present value
    /// immediately; otherwise enqueues `key` for the main engine thread to
    /// prompt for, then polls until it is answered or `timeout` elapses.
    pub fn get_or_request(
        &self,
        key: &str,
        poll_interval: Duration,
        timeout: Duration,
        clock: &dyn Clock,
        sleeper: &dyn Sleeper,
    ) -> Result<Option<String>, EngineError> {
        if let Some(value) = self.get(key)? {
            return Ok(Some(value));
        }
        self.request(key)?;
        self.get_blocking(key, poll_interval, timeout, clock, sleeper)
    }
}

/// Default polling cadence for `get_blocking` in interactive mode.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct FakeContextBackend {
    data: parking_lot::Mutex<ContextData>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeContextBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, key: &str, value: &str) {
        self.data.lock().values.insert(key.to_string(), value.to_string());
    }
}

#[cfg(any(test, feature = "test-support"))]
impl ContextBackend for FakeContextBackend {
    fn load(&self, _path: &Path) -> Result<ContextData, EngineError> {
        Ok(self.data.lock().clone())
    }

    fn save(&self, _path: &Path, data: &ContextData) -> Result<(), EngineError> {
        *self.data.lock() = data.clone();
        Ok(())
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
