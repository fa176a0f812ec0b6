//! Region Relay: cross-context region capture and text hand-off.
//!
//! Four components, each living in its own isolated context and talking
//! only through validated messages and a shared key-value store:
//! - Coordinator (coordinator/): privileged router and artifact owner
//! - Overlay controller (overlay/): in-page region selection and crop
//! - Display panel (panel/): status, OCR hand-off, send trigger
//! - Page automation agent (automation/): drives the destination page
//!
//! Host capabilities (tabs, injection, capture, DOM) are traits so the
//! protocol runs the same against a browser binding or in-memory fakes.

pub mod automation;
pub mod capture;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod ocr;
pub mod overlay;
pub mod panel;
pub mod protocol;
pub mod storage;

pub use automation::PageAgent;
pub use config::RelayConfig;
pub use coordinator::{Command, Coordinator, CoordinatorLink, Host, MessageLink};
pub use error::{RelayError, Result};
pub use overlay::OverlayController;
pub use panel::DisplayPanel;
pub use protocol::{Envelope, Message, Response, Sender, TabId};

/// Initializes `env_logger` with an `info` default, overridable through
/// `RUST_LOG`. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
