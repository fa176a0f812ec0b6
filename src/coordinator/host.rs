//! Host privileges the coordinator relies on.
//!
//! This is the infrastructure seam: tab lookup and creation, script
//! injection, surface capture, panel control, and cross-context sends.
//! The browser binding implements it; tests implement it in memory.

use crate::error::RelayError;
use crate::protocol::{Message, Response, TabId};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabStatus {
    Loading,
    Complete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
    pub status: TabStatus,
}

/// Scripts the coordinator can inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    Overlay,
    PageAgent,
}

impl Script {
    pub fn name(&self) -> &'static str {
        match self {
            Script::Overlay => "overlay",
            Script::PageAgent => "page-agent",
        }
    }
}

#[async_trait]
pub trait Host: Send + Sync {
    async fn active_tab(&self) -> Result<Option<TabInfo>, HostError>;

    async fn tab(&self, tab: TabId) -> Result<Option<TabInfo>, HostError>;

    async fn all_tabs(&self) -> Result<Vec<TabInfo>, HostError>;

    async fn create_tab(&self, url: &str) -> Result<TabInfo, HostError>;

    /// Whether the script's load marker is present in the tab.
    async fn is_injected(&self, tab: TabId, script: Script) -> Result<bool, HostError>;

    async fn inject(&self, tab: TabId, script: Script) -> Result<(), HostError>;

    async fn send_to_tab(&self, tab: TabId, message: &Message) -> Result<Response, HostError>;

    /// Broadcast to extension pages. Fails with `NoReceiver` when no
    /// panel is open.
    async fn notify_panel(&self, message: &Message) -> Result<(), HostError>;

    async fn open_panel(&self, tab: TabId) -> Result<(), HostError>;

    /// Captures the visible surface of the tab's window as a data URL.
    async fn capture_visible_surface(&self, tab: TabId) -> Result<String, HostError>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    #[error("host refused: {0}")]
    Policy(String),

    #[error("no receiving end in the target context")]
    NoReceiver,

    #[error("{0} no longer exists")]
    TabClosed(TabId),

    #[error("{0}")]
    Failed(String),
}

impl From<HostError> for RelayError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::Policy(msg) => RelayError::Policy(msg),
            HostError::NoReceiver => RelayError::Unavailable(err.to_string()),
            HostError::TabClosed(_) => RelayError::NotFound(err.to_string()),
            HostError::Failed(msg) => RelayError::Host(msg),
        }
    }
}
