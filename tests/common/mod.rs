//! In-memory fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use region_relay_lib::automation::{
    DomEvent, ElementId, ElementInfo, ElementKind, PageAgent, PageDom,
};
use region_relay_lib::capture::{encode_png_data_url, Region};
use region_relay_lib::coordinator::{Host, HostError, Script, TabInfo, TabStatus};
use region_relay_lib::ocr::{OcrEngine, OcrOutput, RecognitionLevel};
use region_relay_lib::overlay::{OverlayHandle, OverlaySurface};
use region_relay_lib::storage::{ArtifactStore, MemoryStore};
use region_relay_lib::{
    Coordinator, CoordinatorLink, Message, RelayConfig, RelayError, Response, Sender, TabId,
};
use std::collections::{HashSet, VecDeque};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

pub const EXTENSION_ID: &str = "test-extension";

pub fn config() -> RelayConfig {
    RelayConfig {
        extension_id: EXTENSION_ID.into(),
        ..RelayConfig::default()
    }
}

pub fn me() -> Sender {
    Sender::extension(EXTENSION_ID)
}

/// A white PNG of the given size as a data URL.
pub fn png_data_url(width: u32, height: u32) -> String {
    png_data_url_marked(width, height, None)
}

/// Like [`png_data_url`], with one red pixel at `mark`.
pub fn png_data_url_marked(width: u32, height: u32, mark: Option<(u32, u32)>) -> String {
    let mut raw = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    if let Some((x, y)) = mark {
        raw.put_pixel(x, y, Rgba([255, 0, 0, 255]));
    }
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(raw)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    encode_png_data_url(&bytes)
}

pub fn image_size(data_url: &str) -> (u32, u32) {
    let img = region_relay_lib::capture::decode_image(data_url).unwrap();
    (img.width(), img.height())
}

// ── Host ────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct HostState {
    pub tabs: Vec<TabInfo>,
    pub active: Option<TabId>,
    pub injected: HashSet<(TabId, Script)>,
    pub injections: Vec<(TabId, Script)>,
    pub sent: Vec<(TabId, Message)>,
    pub panel_listening: bool,
    pub panel_notices: Vec<Message>,
    pub opened_panels: Vec<TabId>,
    pub created: Vec<String>,
    pub captures: u32,
    pub surface: String,
    /// Readiness checks a newly created tab answers with `Loading`.
    pub new_tab_loading_checks: u32,
    pub loading_checks: Vec<(TabId, u32)>,
    pub send_failures: VecDeque<HostError>,
    pub inject_error: Option<HostError>,
    next_id: u32,
}

#[derive(Default)]
pub struct FakeHost {
    pub state: Mutex<HostState>,
    pub page_agent: Mutex<Option<Arc<PageAgent>>>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        let host = Self::default();
        {
            let mut s = host.state.lock().unwrap();
            s.next_id = 100;
            s.panel_listening = true;
            s.surface = png_data_url(800, 600);
        }
        Arc::new(host)
    }

    pub fn add_tab(&self, url: &str, active: bool) -> TabId {
        let mut s = self.state.lock().unwrap();
        s.next_id += 1;
        let id = TabId(s.next_id);
        s.tabs.push(TabInfo {
            id,
            url: url.into(),
            status: TabStatus::Complete,
        });
        if active {
            s.active = Some(id);
        }
        id
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut HostState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn sent_types(&self) -> Vec<&'static str> {
        self.with(|s| s.sent.iter().map(|(_, m)| m.type_name()).collect())
    }

    pub fn route_page_messages_to(&self, agent: Arc<PageAgent>) {
        *self.page_agent.lock().unwrap() = Some(agent);
    }
}

#[async_trait]
impl Host for FakeHost {
    async fn active_tab(&self) -> Result<Option<TabInfo>, HostError> {
        Ok(self.with(|s| {
            let active = s.active?;
            s.tabs.iter().find(|t| t.id == active).cloned()
        }))
    }

    async fn tab(&self, tab: TabId) -> Result<Option<TabInfo>, HostError> {
        Ok(self.with(|s| {
            let mut info = s.tabs.iter().find(|t| t.id == tab).cloned()?;
            if let Some(entry) = s.loading_checks.iter_mut().find(|(id, _)| *id == tab) {
                if entry.1 > 0 {
                    entry.1 -= 1;
                    info.status = TabStatus::Loading;
                }
            }
            Some(info)
        }))
    }

    async fn all_tabs(&self) -> Result<Vec<TabInfo>, HostError> {
        Ok(self.with(|s| s.tabs.clone()))
    }

    async fn create_tab(&self, url: &str) -> Result<TabInfo, HostError> {
        Ok(self.with(|s| {
            s.next_id += 1;
            let info = TabInfo {
                id: TabId(s.next_id),
                url: url.to_string(),
                status: TabStatus::Complete,
            };
            s.tabs.push(info.clone());
            s.created.push(url.to_string());
            let checks = s.new_tab_loading_checks;
            s.loading_checks.push((info.id, checks));
            info
        }))
    }

    async fn is_injected(&self, tab: TabId, script: Script) -> Result<bool, HostError> {
        Ok(self.with(|s| s.injected.contains(&(tab, script))))
    }

    async fn inject(&self, tab: TabId, script: Script) -> Result<(), HostError> {
        self.with(|s| {
            if let Some(e) = s.inject_error.clone() {
                return Err(e);
            }
            s.injected.insert((tab, script));
            s.injections.push((tab, script));
            Ok(())
        })
    }

    async fn send_to_tab(&self, tab: TabId, message: &Message) -> Result<Response, HostError> {
        let failure = self.with(|s| {
            s.sent.push((tab, message.clone()));
            s.send_failures.pop_front()
        });
        if let Some(e) = failure {
            return Err(e);
        }

        let agent = self.page_agent.lock().unwrap().clone();
        if let (Some(agent), Message::PasteAndSend { .. }) = (agent, message) {
            return match agent
                .handle_window_message("https://gemini.google.com", &message.to_value())
                .await
            {
                Ok(_) => Ok(Response::ack()),
                Err(e) => Ok(Response::from_error(&e)),
            };
        }
        Ok(Response::ack())
    }

    async fn notify_panel(&self, message: &Message) -> Result<(), HostError> {
        self.with(|s| {
            if !s.panel_listening {
                return Err(HostError::NoReceiver);
            }
            s.panel_notices.push(message.clone());
            Ok(())
        })
    }

    async fn open_panel(&self, tab: TabId) -> Result<(), HostError> {
        self.with(|s| s.opened_panels.push(tab));
        Ok(())
    }

    async fn capture_visible_surface(&self, _tab: TabId) -> Result<String, HostError> {
        Ok(self.with(|s| {
            s.captures += 1;
            s.surface.clone()
        }))
    }
}

pub struct Harness {
    pub host: Arc<FakeHost>,
    pub store: Arc<MemoryStore>,
    pub coordinator: Arc<Coordinator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_config(config: RelayConfig) -> Self {
        region_relay_lib::init_logging();
        let host = FakeHost::new();
        let store = Arc::new(MemoryStore::new());
        let coordinator =
            Arc::new(Coordinator::new(host.clone(), store.clone(), config).unwrap());
        Self {
            host,
            store,
            coordinator,
        }
    }

    pub fn link(&self) -> Arc<CoordinatorLink> {
        Arc::new(CoordinatorLink::new(self.coordinator.clone(), me()))
    }

    pub fn records(&self) -> ArtifactStore {
        let c = self.coordinator.config();
        ArtifactStore::new(self.store.clone(), c.max_text_chars, c.max_error_chars)
    }
}

// ── Overlay surface ─────────────────────────────────────────────────

#[derive(Default)]
pub struct SurfaceState {
    pub live: HashSet<OverlayHandle>,
    pub mounts: u32,
    pub unmounts: Vec<OverlayHandle>,
    pub draws: Vec<Region>,
    pub concealed: Vec<OverlayHandle>,
    next: u64,
}

pub struct FakeSurface {
    pub state: Mutex<SurfaceState>,
    pub dpr: f64,
}

impl FakeSurface {
    pub fn new(dpr: f64) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SurfaceState::default()),
            dpr,
        })
    }

    pub fn live(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    pub fn unmounts(&self) -> usize {
        self.state.lock().unwrap().unmounts.len()
    }
}

impl OverlaySurface for FakeSurface {
    fn mount(&self, _tab: TabId) -> Result<OverlayHandle, RelayError> {
        let mut s = self.state.lock().unwrap();
        s.next += 1;
        let handle = OverlayHandle(s.next);
        s.live.insert(handle);
        s.mounts += 1;
        Ok(handle)
    }

    fn draw(&self, _handle: OverlayHandle, region: &Region) {
        self.state.lock().unwrap().draws.push(*region);
    }

    fn conceal(&self, handle: OverlayHandle) {
        self.state.lock().unwrap().concealed.push(handle);
    }

    fn unmount(&self, handle: OverlayHandle) {
        let mut s = self.state.lock().unwrap();
        assert!(s.live.remove(&handle), "unmounted {:?} twice", handle);
        s.unmounts.push(handle);
    }

    fn device_pixel_ratio(&self, _tab: TabId) -> f64 {
        self.dpr
    }
}

// ── Destination page ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum DomAction {
    Focus(ElementId),
    Clear(ElementId),
    SetContent(ElementId, String),
    Dispatch(ElementId, DomEvent),
    Click(ElementId),
}

#[derive(Default)]
pub struct DomState {
    pub elements: Vec<ElementInfo>,
    /// `elements()` calls that return an empty document first.
    pub render_delay: u32,
    pub polls: u32,
    pub ready: bool,
    pub actions: Vec<DomAction>,
}

#[derive(Default)]
pub struct FakeDom {
    pub state: Mutex<DomState>,
}

impl FakeDom {
    pub fn new(elements: Vec<ElementInfo>) -> Arc<Self> {
        let dom = Self::default();
        {
            let mut s = dom.state.lock().unwrap();
            s.elements = elements;
            s.ready = true;
        }
        Arc::new(dom)
    }

    pub fn actions(&self) -> Vec<DomAction> {
        self.state.lock().unwrap().actions.clone()
    }

    fn record(&self, action: DomAction) -> Result<(), RelayError> {
        self.state.lock().unwrap().actions.push(action);
        Ok(())
    }
}

impl PageDom for FakeDom {
    fn is_ready(&self) -> bool {
        self.state.lock().unwrap().ready
    }

    fn elements(&self) -> Vec<ElementInfo> {
        let mut s = self.state.lock().unwrap();
        s.polls += 1;
        if s.render_delay > 0 {
            s.render_delay -= 1;
            return Vec::new();
        }
        s.elements.clone()
    }

    fn focus(&self, id: ElementId) -> Result<(), RelayError> {
        self.record(DomAction::Focus(id))
    }

    fn clear(&self, id: ElementId) -> Result<(), RelayError> {
        self.record(DomAction::Clear(id))
    }

    fn set_content(&self, id: ElementId, text: &str) -> Result<(), RelayError> {
        self.record(DomAction::SetContent(id, text.to_string()))
    }

    fn dispatch(&self, id: ElementId, event: DomEvent) -> Result<(), RelayError> {
        self.record(DomAction::Dispatch(id, event))
    }

    fn click(&self, id: ElementId) -> Result<(), RelayError> {
        self.record(DomAction::Click(id))
    }
}

pub fn chat_input(id: u64) -> ElementInfo {
    let mut e = ElementInfo::new(id, ElementKind::TextArea, 600.0, 48.0);
    e.label = Some("Message Gemini".into());
    e.form = Some(1);
    e
}

pub fn send_button(id: u64) -> ElementInfo {
    let mut e = ElementInfo::new(id, ElementKind::Button, 32.0, 32.0);
    e.label = Some("Send message".into());
    e.form = Some(1);
    e
}

// ── OCR ─────────────────────────────────────────────────────────────

pub struct FakeOcr {
    pub text: String,
    pub calls: Mutex<Vec<usize>>,
}

impl FakeOcr {
    pub fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: text.into(),
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl OcrEngine for FakeOcr {
    async fn recognize(
        &self,
        image: Vec<u8>,
        level: RecognitionLevel,
    ) -> Result<OcrOutput, RelayError> {
        self.calls.lock().unwrap().push(image.len());
        Ok(OcrOutput {
            text: self.text.clone(),
            char_count: self.text.chars().count() as i64,
            latency_ms: 1.0,
            confidence: if self.text.is_empty() { 0.0 } else { 0.9 },
            recognition_level: level.name().to_string(),
        })
    }
}
