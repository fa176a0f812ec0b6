//! Request/response channel from a context to the coordinator.

use super::Coordinator;
use crate::error::{RelayError, Result};
use crate::protocol::{Envelope, Message, Response, Sender, TabId};
use async_trait::async_trait;
use std::sync::Arc;

/// A round-trip send to the coordinator. `from` is the tab the sending
/// context lives in, if any. Error replies come back as
/// `Err(RelayError::Remote { .. })`.
#[async_trait]
pub trait MessageLink: Send + Sync {
    async fn request(&self, from: Option<TabId>, message: Message) -> Result<Response>;
}

/// In-process link: stamps the sender identity the host would attach and
/// bounds the wait for a reply by `RelayConfig::reply_timeout`.
pub struct CoordinatorLink {
    coordinator: Arc<Coordinator>,
    sender: Sender,
}

impl CoordinatorLink {
    pub fn new(coordinator: Arc<Coordinator>, sender: Sender) -> Self {
        Self {
            coordinator,
            sender,
        }
    }
}

#[async_trait]
impl MessageLink for CoordinatorLink {
    async fn request(&self, from: Option<TabId>, message: Message) -> Result<Response> {
        let mut sender = self.sender.clone();
        sender.tab = from.or(sender.tab);
        let timeout = self.coordinator.config().reply_timeout(&message);
        let envelope = Envelope::from_message(sender, &message);
        tokio::time::timeout(timeout, self.coordinator.handle(&envelope))
            .await
            .map_err(|_| RelayError::Timeout(timeout.as_millis() as u64))?
            .into_result()
    }
}
