//! Inter-context message protocol.
//!
//! Every message is a JSON object discriminated by `type`. Inbound traffic
//! arrives as an [`Envelope`] holding the raw JSON plus the sender identity
//! the host attached; nothing in it is trusted until
//! [`Envelope::open`] has authenticated the sender and parsed the shape.

mod validate;

pub use validate::{authenticate, cap_text, ValidationError};

use crate::capture::Region;
use crate::error::{ErrorKind, RelayError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Marker field carried by messages posted into third-party pages.
pub const PAGE_MARKER: &str = "__REGION_RELAY__";

/// Host-assigned tab identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabId(pub u32);

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tab#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPayload {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    // Coordinator-facing.
    StartCapture,
    TogglePanel,
    RequestSurfaceCapture {
        region: Region,
    },
    RegionCaptureReady {
        region: Region,
        #[serde(rename = "imageData")]
        image_data: String,
    },
    CaptureFailed {
        reason: String,
    },
    OcrTextReady {
        text: String,
    },
    DeliverText {
        text: String,
    },

    // Overlay-facing.
    StartRegionSelect,

    // Panel-facing.
    CaptureStatus {
        status: String,
    },

    // Page-facing; posted across origins, so it carries the marker.
    PasteAndSend {
        #[serde(rename = "__REGION_RELAY__", default)]
        marker: bool,
        payload: TextPayload,
    },
}

impl Message {
    pub const KNOWN_TYPES: &'static [&'static str] = &[
        "START_CAPTURE",
        "TOGGLE_PANEL",
        "REQUEST_SURFACE_CAPTURE",
        "REGION_CAPTURE_READY",
        "CAPTURE_FAILED",
        "OCR_TEXT_READY",
        "DELIVER_TEXT",
        "START_REGION_SELECT",
        "CAPTURE_STATUS",
        "PASTE_AND_SEND",
    ];

    pub fn type_name(&self) -> &'static str {
        match self {
            Message::StartCapture => "START_CAPTURE",
            Message::TogglePanel => "TOGGLE_PANEL",
            Message::RequestSurfaceCapture { .. } => "REQUEST_SURFACE_CAPTURE",
            Message::RegionCaptureReady { .. } => "REGION_CAPTURE_READY",
            Message::CaptureFailed { .. } => "CAPTURE_FAILED",
            Message::OcrTextReady { .. } => "OCR_TEXT_READY",
            Message::DeliverText { .. } => "DELIVER_TEXT",
            Message::StartRegionSelect => "START_REGION_SELECT",
            Message::CaptureStatus { .. } => "CAPTURE_STATUS",
            Message::PasteAndSend { .. } => "PASTE_AND_SEND",
        }
    }

    pub fn paste_and_send(text: impl Into<String>) -> Self {
        Message::PasteAndSend {
            marker: true,
            payload: TextPayload { text: text.into() },
        }
    }

    pub fn status(status: impl Into<String>) -> Self {
        Message::CaptureStatus {
            status: status.into(),
        }
    }

    /// Parses raw JSON, separating unknown types from malformed ones so a
    /// sender can tell protocol drift apart from a bad payload.
    pub fn parse(value: &Value) -> Result<Message> {
        let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;
        let type_name = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ValidationError::MissingType)?;

        if !Self::KNOWN_TYPES.contains(&type_name) {
            return Err(RelayError::Unrecognized(type_name.to_string()));
        }

        serde_json::from_value(value.clone()).map_err(|e| {
            ValidationError::Malformed {
                type_name: type_name.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    pub fn to_value(&self) -> Value {
        // Serializing a derive(Serialize) enum of strings/numbers cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Sender identity attached by the host, never by the message author.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sender {
    pub id: Option<String>,
    pub tab: Option<TabId>,
    pub url: Option<String>,
}

impl Sender {
    pub fn extension(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn in_tab(mut self, tab: TabId) -> Self {
        self.tab = Some(tab);
        self
    }
}

/// An inbound message as received, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub sender: Sender,
    pub body: Value,
}

impl Envelope {
    pub fn new(sender: Sender, body: Value) -> Self {
        Self { sender, body }
    }

    pub fn from_message(sender: Sender, message: &Message) -> Self {
        Self::new(sender, message.to_value())
    }

    /// Authenticates, then parses. Sender identity is checked first so an
    /// unauthorized peer learns nothing about the accepted shapes.
    pub fn open(&self, expected_id: &str) -> Result<Message> {
        authenticate(&self.sender, expected_id)?;
        Message::parse(&self.body)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(rename = "imageData", default, skip_serializing_if = "Option::is_none")]
        image_data: Option<String>,
    },
    Error {
        kind: ErrorKind,
        error: String,
    },
}

impl Response {
    pub fn ack() -> Self {
        Response::Ok {
            message: None,
            image_data: None,
        }
    }

    pub fn ack_with(message: impl Into<String>) -> Self {
        Response::Ok {
            message: Some(message.into()),
            image_data: None,
        }
    }

    pub fn surface(image_data: String) -> Self {
        Response::Ok {
            message: None,
            image_data: Some(image_data),
        }
    }

    pub fn from_error(err: &RelayError) -> Self {
        Response::Error {
            kind: err.kind(),
            error: err.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok { .. })
    }

    /// Turns an error reply back into a local error.
    pub fn into_result(self) -> Result<Response> {
        match self {
            Response::Error { kind, error } => Err(RelayError::Remote {
                kind,
                message: error,
            }),
            ok => Ok(ok),
        }
    }
}
