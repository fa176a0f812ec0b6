//! Durable key-value store shared by every context.
//!
//! The store is last-write-wins with no cross-key transactions. The pending
//! text slot is consumed with read-then-clear; callers must not assume any
//! stronger atomicity than that.

use crate::capture::CaptureArtifact;
use crate::error::{RelayError, Result};
use crate::protocol::cap_text;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    LastCapturedArtifact,
    PendingText,
    LastError,
}

impl StoreKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::LastCapturedArtifact => "last-captured-artifact",
            StoreKey::PendingText => "pending-text",
            StoreKey::LastError => "last-error",
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: StoreKey) -> Result<Option<Value>>;
    async fn set(&self, key: StoreKey, value: Value) -> Result<()>;
    async fn remove(&self, key: StoreKey) -> Result<()>;
}

/// In-process store. Stands in for the host's local storage area.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<&'static str, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every entry, keyed by wire name.
    pub fn snapshot(&self) -> HashMap<&'static str, Value> {
        self.entries
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<&'static str, Value>>> {
        self.entries
            .lock()
            .map_err(|e| RelayError::Storage(e.to_string()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: StoreKey) -> Result<Option<Value>> {
        Ok(self.lock()?.get(key.as_str()).cloned())
    }

    async fn set(&self, key: StoreKey, value: Value) -> Result<()> {
        self.lock()?.insert(key.as_str(), value);
        Ok(())
    }

    async fn remove(&self, key: StoreKey) -> Result<()> {
        self.lock()?.remove(key.as_str());
        Ok(())
    }
}

/// Typed access to the three persisted records, with length caps applied
/// on every write.
#[derive(Clone)]
pub struct ArtifactStore {
    store: Arc<dyn Store>,
    max_text_chars: usize,
    max_error_chars: usize,
}

impl ArtifactStore {
    pub fn new(store: Arc<dyn Store>, max_text_chars: usize, max_error_chars: usize) -> Self {
        Self {
            store,
            max_text_chars,
            max_error_chars,
        }
    }

    pub async fn save_artifact(&self, artifact: &CaptureArtifact) -> Result<()> {
        let value =
            serde_json::to_value(artifact).map_err(|e| RelayError::Storage(e.to_string()))?;
        self.store.set(StoreKey::LastCapturedArtifact, value).await
    }

    pub async fn last_artifact(&self) -> Result<Option<CaptureArtifact>> {
        match self.store.get(StoreKey::LastCapturedArtifact).await? {
            Some(v) => serde_json::from_value(v)
                .map(Some)
                .map_err(|e| RelayError::Storage(e.to_string())),
            None => Ok(None),
        }
    }

    pub async fn set_pending_text(&self, text: &str) -> Result<()> {
        let capped = cap_text(text, self.max_text_chars);
        self.store
            .set(StoreKey::PendingText, Value::String(capped))
            .await
    }

    /// Reads the pending text and clears it. A second call returns `None`.
    pub async fn take_pending_text(&self) -> Result<Option<String>> {
        let value = self.store.get(StoreKey::PendingText).await?;
        if value.is_some() {
            self.store.remove(StoreKey::PendingText).await?;
        }
        Ok(value
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.trim().is_empty()))
    }

    pub async fn set_last_error(&self, message: &str) -> Result<()> {
        let capped = cap_text(message, self.max_error_chars);
        self.store
            .set(StoreKey::LastError, Value::String(capped))
            .await
    }

    pub async fn last_error(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .get(StoreKey::LastError)
            .await?
            .and_then(|v| v.as_str().map(str::to_string)))
    }
}
