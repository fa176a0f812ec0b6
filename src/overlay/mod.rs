//! Overlay controller: in-page region selection.
//!
//! One [`CaptureSession`] per tab, owned here and destroyed on teardown.
//! [`OverlayController::teardown`] is the only path that unmounts the
//! surface; every exit (capture done, Escape, unload, page hidden,
//! remount) goes through it, and it is a no-op when nothing is mounted.

mod session;

pub use session::{CaptureSession, Phase, PointerUp};

use crate::capture::{
    crop_to_png_bytes, decode_image, encode_png_data_url, CaptureArtifact, CaptureError, Point,
    Region, RegionRejection,
};
use crate::config::RelayConfig;
use crate::coordinator::MessageLink;
use crate::error::{RelayError, Result};
use crate::protocol::{Envelope, Message, Response, TabId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Opaque handle to a mounted overlay (capture layer, rectangle, hint,
/// and their listeners).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayHandle(pub u64);

/// The page-side rendering of the overlay.
pub trait OverlaySurface: Send + Sync {
    /// Mounts the full-viewport capture layer, the selection rectangle and
    /// the hint label, and attaches pointer/key listeners.
    fn mount(&self, tab: TabId) -> Result<OverlayHandle>;

    fn draw(&self, handle: OverlayHandle, region: &Region);

    /// Makes the overlay invisible so it does not appear in the capture.
    fn conceal(&self, handle: OverlayHandle);

    /// Detaches listeners and removes the nodes.
    fn unmount(&self, handle: OverlayHandle);

    fn device_pixel_ratio(&self, tab: TabId) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    Completed,
    Rejected,
    Cancelled,
    Remount,
    Unload,
    Hidden,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    Ignored,
    Rejected(RegionRejection),
    Captured(CaptureArtifact),
}

struct Mounted {
    handle: OverlayHandle,
    session: CaptureSession,
}

pub struct OverlayController {
    surface: Arc<dyn OverlaySurface>,
    link: Arc<dyn MessageLink>,
    sessions: Mutex<HashMap<TabId, Mounted>>,
    extension_id: String,
    min_region: f64,
    max_region: f64,
    max_raster_side: u32,
}

impl OverlayController {
    pub fn new(
        surface: Arc<dyn OverlaySurface>,
        link: Arc<dyn MessageLink>,
        config: &RelayConfig,
    ) -> Self {
        Self {
            surface,
            link,
            sessions: Mutex::new(HashMap::new()),
            extension_id: config.extension_id.clone(),
            min_region: config.min_region,
            max_region: config.max_region,
            max_raster_side: config.max_raster_side,
        }
    }

    /// Messages the coordinator sends into the tab.
    pub fn handle_message(&self, tab: TabId, envelope: &Envelope) -> Response {
        let result = envelope
            .open(&self.extension_id)
            .and_then(|message| match message {
                Message::StartRegionSelect => self.begin(tab),
                other => Err(RelayError::Unrecognized(other.type_name().to_string())),
            });

        match result {
            Ok(()) => Response::ack(),
            Err(e) => {
                log::warn!("[overlay] {} rejected message: {}", tab, e);
                Response::from_error(&e)
            }
        }
    }

    /// Mounts a fresh session, tearing down any existing one first.
    pub fn begin(&self, tab: TabId) -> Result<()> {
        self.teardown(tab, TeardownReason::Remount);

        let handle = self.surface.mount(tab)?;
        let previous = self.sessions().insert(
            tab,
            Mounted {
                handle,
                session: CaptureSession::begin(),
            },
        );
        // A concurrent begin() could have slipped in between teardown and
        // insert; its surface must not leak.
        if let Some(stale) = previous {
            self.surface.unmount(stale.handle);
        }
        log::info!("[overlay] Region selection started in {}", tab);
        Ok(())
    }

    pub fn phase(&self, tab: TabId) -> Phase {
        self.sessions()
            .get(&tab)
            .map(|m| m.session.phase())
            .unwrap_or(Phase::Idle)
    }

    pub fn region(&self, tab: TabId) -> Option<Region> {
        self.sessions().get(&tab).and_then(|m| m.session.region())
    }

    pub fn mounted_count(&self) -> usize {
        self.sessions().len()
    }

    pub fn pointer_down(&self, tab: TabId, at: Point) -> Option<Region> {
        self.update(tab, |s| s.pointer_down(at))
    }

    pub fn pointer_move(&self, tab: TabId, at: Point) -> Option<Region> {
        self.update(tab, |s| s.pointer_move(at))
    }

    /// Finalizes the selection. A valid region runs the capture-and-crop
    /// pipeline; the overlay is torn down afterwards whatever the result.
    pub async fn pointer_up(&self, tab: TabId, at: Point) -> Result<SelectionOutcome> {
        let (outcome, handle) = {
            let mut sessions = self.sessions();
            let Some(mounted) = sessions.get_mut(&tab) else {
                return Ok(SelectionOutcome::Ignored);
            };
            let outcome = mounted
                .session
                .pointer_up(at, self.min_region, self.max_region);
            (outcome, mounted.handle)
        };

        match outcome {
            PointerUp::Ignored => Ok(SelectionOutcome::Ignored),
            PointerUp::Rejected(reason) => {
                log::warn!("[overlay] Selection rejected in {}: {}", tab, reason);
                self.teardown(tab, TeardownReason::Rejected);
                self.report_failure(tab, &reason.to_string()).await;
                Ok(SelectionOutcome::Rejected(reason))
            }
            PointerUp::Captured(region) => {
                self.surface.conceal(handle);
                let result = self.capture(tab, region).await;
                // A begin() during the crop has already replaced this session.
                self.teardown_if(tab, handle, TeardownReason::Completed);
                match result {
                    Ok(artifact) => Ok(SelectionOutcome::Captured(artifact)),
                    Err(e) => {
                        log::error!("[overlay] Capture failed in {}: {}", tab, e);
                        self.report_failure(tab, &e.to_string()).await;
                        Err(e)
                    }
                }
            }
        }
    }

    /// Escape key. Effective at any point of the selection.
    pub fn cancel(&self, tab: TabId) -> bool {
        self.teardown(tab, TeardownReason::Cancelled)
    }

    pub fn page_unload(&self, tab: TabId) -> bool {
        self.teardown(tab, TeardownReason::Unload)
    }

    pub fn page_hidden(&self, tab: TabId) -> bool {
        self.teardown(tab, TeardownReason::Hidden)
    }

    /// Removes the session and unmounts its surface. Returns `false` when
    /// nothing was mounted.
    pub fn teardown(&self, tab: TabId, reason: TeardownReason) -> bool {
        let removed = self.sessions().remove(&tab);
        self.release(tab, removed, reason)
    }

    /// Like [`teardown`](Self::teardown), but only while the tab still
    /// holds the session mounted as `handle`.
    pub fn teardown_if(&self, tab: TabId, handle: OverlayHandle, reason: TeardownReason) -> bool {
        let removed = {
            let mut sessions = self.sessions();
            match sessions.get(&tab) {
                Some(mounted) if mounted.handle == handle => sessions.remove(&tab),
                _ => None,
            }
        };
        if removed.is_none() {
            log::debug!("[overlay] Overlay #{} in {} is no longer mounted", handle.0, tab);
        }
        self.release(tab, removed, reason)
    }

    fn release(&self, tab: TabId, removed: Option<Mounted>, reason: TeardownReason) -> bool {
        match removed {
            Some(mounted) => {
                self.surface.unmount(mounted.handle);
                log::info!("[overlay] Torn down in {} ({:?})", tab, reason);
                true
            }
            None => false,
        }
    }

    /// Capture the whole surface via the coordinator, then crop locally
    /// where the device pixel ratio is known.
    async fn capture(&self, tab: TabId, region: Region) -> Result<CaptureArtifact> {
        let start = std::time::Instant::now();
        let dpr = self.surface.device_pixel_ratio(tab);

        let reply = self
            .link
            .request(Some(tab), Message::RequestSurfaceCapture { region })
            .await?;
        let surface = match reply {
            Response::Ok {
                image_data: Some(data),
                ..
            } => data,
            _ => {
                return Err(CaptureError::CaptureFailed("reply carried no image".into()).into())
            }
        };

        let full = decode_image(&surface)?;
        let png_bytes = crop_to_png_bytes(&full, &region, dpr, self.max_raster_side)?;
        let image_data = encode_png_data_url(&png_bytes);

        log::info!(
            "[overlay] Cropped region ({}x{} at {},{}, dpr {}) in {}ms, {} bytes",
            region.width,
            region.height,
            region.x,
            region.y,
            dpr,
            start.elapsed().as_millis(),
            png_bytes.len()
        );

        self.link
            .request(
                Some(tab),
                Message::RegionCaptureReady {
                    region,
                    image_data: image_data.clone(),
                },
            )
            .await?;

        Ok(CaptureArtifact::new(image_data, region))
    }

    async fn report_failure(&self, tab: TabId, reason: &str) {
        let message = Message::CaptureFailed {
            reason: reason.to_string(),
        };
        if let Err(e) = self.link.request(Some(tab), message).await {
            log::error!("[overlay] Could not report failure from {}: {}", tab, e);
        }
    }

    fn update(
        &self,
        tab: TabId,
        step: impl FnOnce(&mut CaptureSession) -> Option<Region>,
    ) -> Option<Region> {
        let mut sessions = self.sessions();
        let mounted = sessions.get_mut(&tab)?;
        let region = step(&mut mounted.session)?;
        self.surface.draw(mounted.handle, &region);
        Some(region)
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<TabId, Mounted>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
