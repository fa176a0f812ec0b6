//! Coordinator: the privileged router.
//!
//! Sole owner of host privileges and of the persisted artifacts. Every
//! inbound message goes through [`Coordinator::handle`], which
//! authenticates, parses, and dispatches exhaustively. Failures that abort
//! a user-initiated operation are persisted as `last-error` and pushed to
//! the panel as status text.

mod host;
mod link;
mod policy;
mod retry;

pub use host::{Host, HostError, Script, TabInfo, TabStatus};
pub use link::{CoordinatorLink, MessageLink};
pub use policy::UrlPolicy;
pub use retry::{wait_until_complete, with_retry};

use crate::capture::{decode_data_url, CaptureArtifact, Region};
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::protocol::{cap_text, Envelope, Message, Response, Sender, TabId, ValidationError};
use crate::storage::{ArtifactStore, Store};
use std::sync::Arc;

/// Externally bound triggers (key combinations, toolbar buttons).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    TogglePanel,
    StartCapture,
}

pub struct Coordinator {
    host: Arc<dyn Host>,
    records: ArtifactStore,
    policy: UrlPolicy,
    config: RelayConfig,
}

impl Coordinator {
    pub fn new(host: Arc<dyn Host>, store: Arc<dyn Store>, config: RelayConfig) -> Result<Self> {
        let policy = UrlPolicy::from_config(&config)?;
        let records = ArtifactStore::new(store, config.max_text_chars, config.max_error_chars);
        Ok(Self {
            host,
            records,
            policy,
            config,
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn records(&self) -> &ArtifactStore {
        &self.records
    }

    /// Single entry point for inbound messages. Never panics and never
    /// returns silently: every outcome is an explicit `Response`.
    pub async fn handle(&self, envelope: &Envelope) -> Response {
        let message = match envelope.open(&self.config.extension_id) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("[coordinator] Rejected inbound message: {}", e);
                return Response::from_error(&e);
            }
        };

        let type_name = message.type_name();
        log::debug!("[coordinator] {} from {:?}", type_name, envelope.sender.tab);

        match self.dispatch(message, &envelope.sender).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("[coordinator] {} failed: {}", type_name, e);
                Response::from_error(&e)
            }
        }
    }

    async fn dispatch(&self, message: Message, sender: &Sender) -> Result<Response> {
        match message {
            Message::StartCapture => {
                let tab = match sender.tab {
                    Some(tab) => tab,
                    None => self.active_tab_id().await?,
                };
                self.start_capture(tab).await?;
                Ok(Response::ack_with("Region selection started"))
            }
            Message::TogglePanel => {
                self.toggle_panel().await?;
                Ok(Response::ack())
            }
            Message::RequestSurfaceCapture { region } => {
                let tab = sender
                    .tab
                    .ok_or(ValidationError::MissingSenderTab("REQUEST_SURFACE_CAPTURE"))?;
                let image_data = self.capture_visible_surface(tab, &region).await?;
                Ok(Response::surface(image_data))
            }
            Message::RegionCaptureReady { region, image_data } => {
                self.relay_artifact(CaptureArtifact::new(image_data, region))
                    .await?;
                Ok(Response::ack_with("Capture stored"))
            }
            Message::CaptureFailed { reason } => {
                self.report_failure(None, &format!("Capture failed: {}", reason))
                    .await;
                Ok(Response::ack())
            }
            Message::OcrTextReady { text } => {
                self.ocr_text_ready(&text).await?;
                Ok(Response::ack_with("Text stored"))
            }
            Message::DeliverText { text } => {
                let tab = self.deliver_text(&text).await?;
                Ok(Response::ack_with(format!("Delivered to {}", tab)))
            }
            other @ (Message::StartRegionSelect
            | Message::CaptureStatus { .. }
            | Message::PasteAndSend { .. }) => {
                Err(RelayError::Unrecognized(other.type_name().to_string()))
            }
        }
    }

    pub async fn on_command(&self, command: Command) -> Result<()> {
        log::info!("[coordinator] Command received: {:?}", command);
        match command {
            Command::TogglePanel => self.toggle_panel().await,
            Command::StartCapture => {
                let tab = self.active_tab_id().await?;
                self.start_capture(tab).await
            }
        }
    }

    /// Injects the overlay (once) and tells it to begin selection.
    ///
    /// Protected pages are rejected before anything is injected; the
    /// rejection is persisted and the panel is opened so the user sees why.
    pub async fn start_capture(&self, tab: TabId) -> Result<()> {
        let result = self.start_capture_inner(tab).await;
        if let Err(e) = &result {
            self.report_failure(Some(tab), &format!("Cannot start capture: {}", e))
                .await;
        }
        result
    }

    async fn start_capture_inner(&self, tab: TabId) -> Result<()> {
        let info = self
            .host
            .tab(tab)
            .await?
            .ok_or_else(|| RelayError::NotFound(format!("{} does not exist", tab)))?;

        self.policy.check_injectable(&info.url)?;
        self.ensure_injected(tab, Script::Overlay).await?;

        self.host
            .send_to_tab(tab, &Message::StartRegionSelect)
            .await?
            .into_result()?;
        log::info!("[coordinator] Region selection started in {}", tab);
        Ok(())
    }

    /// One call to the host capture primitive. Cropping happens in the
    /// overlay, where the device pixel ratio is known.
    pub async fn capture_visible_surface(&self, tab: TabId, region: &Region) -> Result<String> {
        let start = std::time::Instant::now();
        let image_data = self.host.capture_visible_surface(tab).await?;
        log::info!(
            "[coordinator] Captured surface of {} for {}x{} region in {}ms ({} bytes)",
            tab,
            region.width,
            region.height,
            start.elapsed().as_millis(),
            image_data.len()
        );
        Ok(image_data)
    }

    /// Validates, persists, then notifies the panel. A closed panel is not
    /// an error: the artifact stays stored for the next pull.
    pub async fn relay_artifact(&self, artifact: CaptureArtifact) -> Result<()> {
        artifact
            .region
            .check_size(self.config.min_region, self.config.max_region)
            .map_err(ValidationError::from)?;
        decode_data_url(&artifact.image_data)
            .map_err(|e| ValidationError::Image(e.to_string()))?;

        self.records.save_artifact(&artifact).await?;
        log::info!(
            "[coordinator] Stored capture {}x{} at {},{}",
            artifact.region.width,
            artifact.region.height,
            artifact.region.x,
            artifact.region.y
        );

        let notice = Message::RegionCaptureReady {
            region: artifact.region,
            image_data: artifact.image_data,
        };
        if let Err(e) = self.host.notify_panel(&notice).await {
            log::info!("[coordinator] Panel not listening ({}); capture kept in store", e);
        }
        Ok(())
    }

    /// Persists recognized text for the panel and brings the panel up.
    pub async fn ocr_text_ready(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyText.into());
        }
        self.records.set_pending_text(text).await?;

        match self.host.active_tab().await {
            Ok(Some(tab)) => {
                if let Err(e) = self.host.open_panel(tab.id).await {
                    log::warn!("[coordinator] Could not open panel: {}", e);
                }
            }
            Ok(None) => log::warn!("[coordinator] No active tab to open the panel on"),
            Err(e) => log::warn!("[coordinator] Active tab lookup failed: {}", e),
        }

        let notice = Message::OcrTextReady {
            text: cap_text(text, self.config.max_text_chars),
        };
        if let Err(e) = self.host.notify_panel(&notice).await {
            log::info!("[coordinator] Panel not listening ({}); text kept as pending", e);
        }
        Ok(())
    }

    /// Delivers text to the destination tab, creating it if needed.
    ///
    /// Waits for load-complete, injects the page agent if its marker is
    /// absent, then sends with bounded retry on transient failures.
    pub async fn deliver_text(&self, text: &str) -> Result<TabId> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyText.into());
        }
        let text = cap_text(trimmed, self.config.max_text_chars);

        let result = self.deliver_inner(text).await;
        if let Err(e) = &result {
            self.report_failure(None, &format!("Send failed: {}", e)).await;
        }
        result
    }

    async fn deliver_inner(&self, text: String) -> Result<TabId> {
        let target = self.destination_tab().await?;
        let target = wait_until_complete(
            self.host.as_ref(),
            target.id,
            self.config.tab_load_timeout(),
            self.config.tab_poll_interval(),
        )
        .await?;

        self.ensure_injected(target.id, Script::PageAgent).await?;

        let host = self.host.as_ref();
        let message = &Message::paste_and_send(text);
        let tab = target.id;
        with_retry(&self.config.delivery_retry, "deliver text", move |_| async move {
            host.send_to_tab(tab, message).await?.into_result()
        })
        .await?;

        log::info!("[coordinator] Delivered text to {}", tab);
        Ok(tab)
    }

    pub async fn toggle_panel(&self) -> Result<()> {
        let tab = self.active_tab_id().await?;
        self.host.open_panel(tab).await?;
        Ok(())
    }

    async fn destination_tab(&self) -> Result<TabInfo> {
        let existing = self
            .host
            .all_tabs()
            .await?
            .into_iter()
            .find(|t| self.policy.is_destination(&t.url));

        match existing {
            Some(tab) => {
                log::debug!("[coordinator] Reusing destination {}", tab.id);
                Ok(tab)
            }
            None => {
                log::info!(
                    "[coordinator] Opening destination {}",
                    self.config.destination_url
                );
                Ok(self.host.create_tab(&self.config.destination_url).await?)
            }
        }
    }

    async fn ensure_injected(&self, tab: TabId, script: Script) -> Result<()> {
        if self.host.is_injected(tab, script).await? {
            log::debug!("[coordinator] {} already present in {}", script.name(), tab);
            return Ok(());
        }
        self.host.inject(tab, script).await?;
        log::info!("[coordinator] Injected {} into {}", script.name(), tab);
        Ok(())
    }

    async fn active_tab_id(&self) -> Result<TabId> {
        self.host
            .active_tab()
            .await?
            .map(|t| t.id)
            .ok_or_else(|| RelayError::NotFound("no active tab".into()))
    }

    /// Persists the failure and pushes it to the panel. Best effort: a
    /// failure here is logged, since there is nowhere further to report it.
    async fn report_failure(&self, open_panel_on: Option<TabId>, message: &str) {
        log::warn!("[coordinator] {}", message);
        if let Err(e) = self.records.set_last_error(message).await {
            log::error!("[coordinator] Could not persist last-error: {}", e);
        }
        if let Some(tab) = open_panel_on {
            if let Err(e) = self.host.open_panel(tab).await {
                log::warn!("[coordinator] Could not open panel: {}", e);
            }
        }
        if let Err(e) = self.host.notify_panel(&Message::status(message)).await {
            log::debug!("[coordinator] Status not delivered: {}", e);
        }
    }
}
