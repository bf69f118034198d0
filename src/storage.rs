use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    io::ErrorKind,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{error::SessionError, models::User};

// 1. SessionStore Contract
/// SessionStore
///
/// Durable side channel for the logged-in user, so a session survives a restart. The Auth
/// Context is the only writer. Implementations are swappable: a JSON file in normal runs,
/// an in-memory slot in tests.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the persisted user, or `None` when nothing has been saved.
    async fn load(&self) -> Result<Option<User>, SessionError>;

    /// Replaces the persisted user wholesale.
    async fn save(&self, user: &User) -> Result<(), SessionError>;

    /// Removes the persisted user. Clearing an empty store is not an error.
    async fn clear(&self) -> Result<(), SessionError>;
}

// 2. The Real Implementation
/// FileSessionStore
///
/// Persists the user as pretty-printed JSON. Writes go to a sibling temp file first and are
/// renamed into place so a crash never leaves a half-written session behind.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    next_temp: AtomicU64,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            next_temp: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Every save gets its own temp file, so overlapping saves never share a half-written one.
    fn temp_path(&self) -> PathBuf {
        let seq = self.next_temp.fetch_add(1, Ordering::Relaxed);
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".{seq}.tmp"));
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<User>, SessionError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn save(&self, user: &User) -> Result<(), SessionError> {
        let bytes = serde_json::to_vec_pretty(user)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

// 3. The Mock Implementation (For Tests)
/// MemorySessionStore
///
/// Keeps the session in a single in-memory slot. `new_failing` simulates a broken disk so
/// tests can check that persistence errors never leak into the login contract.
#[derive(Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<User>>,
    /// When true, every operation returns a simulated I/O failure.
    pub should_fail: bool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            slot: Mutex::new(None),
            should_fail: true,
        }
    }

    /// Pre-populates the slot, as if a previous run had logged in.
    pub fn with_user(user: User) -> Self {
        Self {
            slot: Mutex::new(Some(user)),
            should_fail: false,
        }
    }

    /// Current slot content, for assertions.
    pub fn stored(&self) -> Option<User> {
        self.slot.lock().clone()
    }

    fn check(&self) -> Result<(), SessionError> {
        if self.should_fail {
            return Err(std::io::Error::other("Mock session store failure").into());
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<User>, SessionError> {
        self.check()?;
        Ok(self.slot.lock().clone())
    }

    async fn save(&self, user: &User) -> Result<(), SessionError> {
        self.check()?;
        *self.slot.lock() = Some(user.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        self.check()?;
        *self.slot.lock() = None;
        Ok(())
    }
}

/// SessionStoreState
///
/// The concrete type used to share the session store across the application state.
pub type SessionStoreState = Arc<dyn SessionStore>;
