//! Display panel: the user-facing control surface.
//!
//! Owns the status line and the draft text, reads the pending text left by
//! an earlier session on mount (read-then-clear), and allows one send in
//! flight at a time.

use crate::capture::{decode_data_url, CaptureArtifact};
use crate::coordinator::MessageLink;
use crate::error::{RelayError, Result};
use crate::ocr::{OcrEngine, RecognitionLevel};
use crate::protocol::Message;
use crate::storage::ArtifactStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const STATUS_SELECTING: &str = "Click and drag to select a region...";
pub const STATUS_CAPTURED: &str = "Region captured";
pub const STATUS_TEXT_READY: &str = "Text ready. Edit it or send it.";
pub const STATUS_NO_TEXT: &str = "No text found in the captured region";
pub const STATUS_EMPTY_DRAFT: &str = "Please enter some text to send";
pub const STATUS_SENT: &str = "Sent to destination";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    AlreadyInFlight,
    EmptyDraft,
    Failed(String),
}

#[derive(Default)]
struct PanelState {
    mounted: bool,
    status: String,
    draft: String,
    last_capture: Option<CaptureArtifact>,
}

pub struct DisplayPanel {
    link: Arc<dyn MessageLink>,
    records: ArtifactStore,
    ocr: Arc<dyn OcrEngine>,
    state: Mutex<PanelState>,
    sending: AtomicBool,
}

/// Clears the in-flight flag however the send ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl DisplayPanel {
    pub fn new(link: Arc<dyn MessageLink>, records: ArtifactStore, ocr: Arc<dyn OcrEngine>) -> Self {
        Self {
            link,
            records,
            ocr,
            state: Mutex::new(PanelState::default()),
            sending: AtomicBool::new(false),
        }
    }

    /// Picks up text a previous session left behind, clearing it so no
    /// later mount replays it.
    pub async fn mount(&self) -> Result<Option<String>> {
        let pending = self.records.take_pending_text().await?;
        let mut state = self.state();
        state.mounted = true;
        if let Some(text) = &pending {
            log::info!("[panel] Found pending text on mount ({} chars)", text.chars().count());
            state.draft = text.trim().to_string();
            state.status = STATUS_TEXT_READY.to_string();
        }
        Ok(pending)
    }

    pub fn is_mounted(&self) -> bool {
        self.state().mounted
    }

    pub fn status(&self) -> String {
        self.state().status.clone()
    }

    pub fn draft(&self) -> String {
        self.state().draft.clone()
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        self.state().draft = text.into();
    }

    pub fn last_capture(&self) -> Option<CaptureArtifact> {
        self.state().last_capture.clone()
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::SeqCst)
    }

    pub async fn start_capture(&self) -> Result<()> {
        self.set_status(STATUS_SELECTING);
        match self.link.request(None, Message::StartCapture).await {
            Ok(_) => Ok(()),
            Err(e) => {
                self.set_status(format!("Failed to start capture: {}", e));
                Err(e)
            }
        }
    }

    /// Notifications pushed by the coordinator. Refused until `mount()`;
    /// pending text then stays stored for the mount to pick up.
    pub async fn notify(&self, message: Message) -> Result<()> {
        if !self.is_mounted() {
            let e = RelayError::Unavailable("panel not mounted".into());
            log::warn!("[panel] Dropping {}: {}", message.type_name(), e);
            return Err(e);
        }
        match message {
            Message::RegionCaptureReady { region, image_data } => {
                let mut state = self.state();
                state.last_capture = Some(CaptureArtifact::new(image_data, region));
                state.status = STATUS_CAPTURED.to_string();
                log::info!("[panel] Region captured ({}x{})", region.width, region.height);
                Ok(())
            }
            Message::OcrTextReady { text } => {
                // This text is the pending artifact; consume it so the next
                // mount does not show it again.
                self.records.take_pending_text().await?;
                self.fill_draft(&text);
                Ok(())
            }
            Message::CaptureStatus { status } => {
                self.set_status(status);
                Ok(())
            }
            other => {
                let e = RelayError::Unrecognized(other.type_name().to_string());
                log::warn!("[panel] {}", e);
                Err(e)
            }
        }
    }

    /// Runs the OCR collaborator over the most recent capture and fills
    /// the draft with its text.
    pub async fn recognize(&self, level: RecognitionLevel) -> Result<Option<String>> {
        let artifact = self
            .last_capture()
            .ok_or_else(|| RelayError::NotFound("no capture to recognize".into()))?;
        let (_, bytes) = decode_data_url(&artifact.image_data)?;

        let output = match self.ocr.recognize(bytes, level).await {
            Ok(output) => output,
            Err(e) => {
                self.set_status(format!("Text recognition failed: {}", e));
                return Err(e);
            }
        };
        log::info!(
            "[panel] OCR ({}) produced {} chars at {:.2} confidence in {:.0}ms",
            output.recognition_level,
            output.char_count,
            output.confidence,
            output.latency_ms
        );

        if !output.has_text() {
            self.set_status(STATUS_NO_TEXT);
            return Ok(None);
        }
        self.fill_draft(&output.text);
        Ok(Some(output.text))
    }

    /// Sends the draft to the destination. Refused while another send is
    /// still in flight.
    pub async fn send(&self) -> SendOutcome {
        if self
            .sending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("[panel] Send already in flight; ignoring");
            return SendOutcome::AlreadyInFlight;
        }
        let _in_flight = InFlight(&self.sending);

        let text = self.draft().trim().to_string();
        if text.is_empty() {
            self.set_status(STATUS_EMPTY_DRAFT);
            return SendOutcome::EmptyDraft;
        }

        match self.link.request(None, Message::DeliverText { text }).await {
            Ok(_) => {
                let mut state = self.state();
                state.draft.clear();
                state.status = STATUS_SENT.to_string();
                SendOutcome::Sent
            }
            Err(e) => {
                let message = format!("Send failed: {}", e);
                self.set_status(message.clone());
                SendOutcome::Failed(message)
            }
        }
    }

    fn fill_draft(&self, text: &str) {
        if text.trim().is_empty() {
            log::warn!("[panel] No text to handle");
            return;
        }
        let mut state = self.state();
        state.draft = text.trim().to_string();
        state.status = STATUS_TEXT_READY.to_string();
    }

    fn set_status(&self, status: impl Into<String>) {
        let status = status.into();
        log::info!("[panel] Status: {}", status);
        self.state().status = status;
    }

    fn state(&self) -> MutexGuard<'_, PanelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
