//! Page automation agent: runs inside the destination tab.
//!
//! Accepts only marked `PASTE_AND_SEND` window messages, rate-limited per
//! origin. Locates the text input with a retrying locator chain, commits
//! the text with the notifications reactive UIs listen for, then clicks a
//! submit control or falls back to an Enter key sequence.

mod locator;
mod rate_limit;

pub use locator::{Bounds, ElementId, ElementInfo, ElementKind, Located, LocatorChain};
pub use rate_limit::RateLimiter;

use crate::config::{LocatorConfig, RelayConfig};
use crate::error::{RelayError, Result};
use crate::protocol::{cap_text, Message, PAGE_MARKER};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomEvent {
    Input,
    Change,
    KeyDown(Key),
    KeyPress(Key),
    KeyUp(Key),
}

/// Access to the destination page's document.
pub trait PageDom: Send + Sync {
    /// `document.readyState == "complete"`.
    fn is_ready(&self) -> bool;

    /// Snapshot of candidate elements in document order.
    fn elements(&self) -> Vec<ElementInfo>;

    fn focus(&self, id: ElementId) -> Result<()>;

    fn clear(&self, id: ElementId) -> Result<()>;

    fn set_content(&self, id: ElementId, text: &str) -> Result<()>;

    fn dispatch(&self, id: ElementId, event: DomEvent) -> Result<()>;

    fn click(&self, id: ElementId) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitMethod {
    Clicked { strategy: &'static str },
    EnterKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub input: ElementId,
    pub input_strategy: &'static str,
    pub submit: SubmitMethod,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
    /// Not addressed to this agent (no marker, other type, not an object).
    Ignored,
    RateLimited,
    Delivered(DeliveryReport),
}

const COMMIT_EVENTS: &[DomEvent] = &[DomEvent::Input, DomEvent::Change];
const ENTER_SEQUENCE: &[DomEvent] = &[
    DomEvent::KeyDown(Key::Enter),
    DomEvent::KeyPress(Key::Enter),
    DomEvent::KeyUp(Key::Enter),
];

pub struct PageAgent {
    dom: Arc<dyn PageDom>,
    locators: LocatorConfig,
    max_text_chars: usize,
    limiter: Mutex<RateLimiter>,
}

impl PageAgent {
    pub fn new(dom: Arc<dyn PageDom>, config: &RelayConfig) -> Self {
        Self {
            dom,
            locators: config.locator.clone(),
            max_text_chars: config.max_text_chars,
            limiter: Mutex::new(RateLimiter::new(
                config.rate_limit_messages,
                config.rate_limit_window(),
            )),
        }
    }

    /// Window `message` event handler.
    pub async fn handle_window_message(&self, origin: &str, data: &Value) -> Result<AgentOutcome> {
        let marked = data.get(PAGE_MARKER).and_then(Value::as_bool) == Some(true);
        let is_paste = data.get("type").and_then(Value::as_str) == Some("PASTE_AND_SEND");
        if !marked || !is_paste {
            log::debug!("[page-agent] Ignoring unmarked message from {}", origin);
            return Ok(AgentOutcome::Ignored);
        }

        let allowed = self
            .limiter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .allow(origin, Instant::now());
        if !allowed {
            log::warn!("[SECURITY] Rate limit hit for {}; message dropped", origin);
            return Ok(AgentOutcome::RateLimited);
        }

        let text = match Message::parse(data)? {
            Message::PasteAndSend { payload, .. } => payload.text,
            other => return Err(RelayError::Unrecognized(other.type_name().to_string())),
        };

        self.paste_and_send(&text).await.map(AgentOutcome::Delivered)
    }

    /// Commits `text` into the page's input and submits it.
    pub async fn paste_and_send(&self, text: &str) -> Result<DeliveryReport> {
        let text = cap_text(text, self.max_text_chars);
        self.wait_for_ready().await;

        let (input, input_strategy, form) = self.locate_input().await?;
        log::info!(
            "[page-agent] Found input {:?} via {}",
            input,
            input_strategy
        );

        self.dom.focus(input)?;
        self.dom.clear(input)?;
        self.dom.set_content(input, &text)?;
        for event in COMMIT_EVENTS {
            self.dom.dispatch(input, *event)?;
        }

        tokio::time::sleep(Duration::from_millis(self.locators.settle_ms)).await;

        let elements = self.dom.elements();
        let submit = match LocatorChain::submit(&self.locators, form).locate(&elements) {
            Some(found) => {
                self.dom.click(found.element.id)?;
                log::info!("[page-agent] Clicked submit via {}", found.strategy);
                SubmitMethod::Clicked {
                    strategy: found.strategy,
                }
            }
            None => {
                log::info!("[page-agent] No submit control; sending Enter");
                for event in ENTER_SEQUENCE {
                    self.dom.dispatch(input, *event)?;
                }
                SubmitMethod::EnterKey
            }
        };

        Ok(DeliveryReport {
            input,
            input_strategy,
            submit,
        })
    }

    /// Retries on a fixed interval while the page renders. Exhaustion is
    /// terminal: the page's markup is outside our control.
    async fn locate_input(&self) -> Result<(ElementId, &'static str, Option<u32>)> {
        let chain = LocatorChain::input(&self.locators);
        let attempts = self.locators.attempts.max(1);
        let interval = Duration::from_millis(self.locators.interval_ms);

        for attempt in 1..=attempts {
            let elements = self.dom.elements();
            if let Some(found) = chain.locate(&elements) {
                return Ok((found.element.id, found.strategy, found.element.form));
            }
            if attempt < attempts {
                log::debug!(
                    "[page-agent] No input yet (attempt {}/{})",
                    attempt,
                    attempts
                );
                tokio::time::sleep(interval).await;
            }
        }

        log::error!(
            "[page-agent] Target not found after {} attempts ({:?})",
            attempts,
            chain.strategies()
        );
        Err(RelayError::NotFound("text input on destination page".into()))
    }

    async fn wait_for_ready(&self) {
        let attempts = self.locators.attempts.max(1);
        let interval = Duration::from_millis(self.locators.interval_ms);
        for _ in 0..attempts {
            if self.dom.is_ready() {
                return;
            }
            tokio::time::sleep(interval).await;
        }
        log::warn!("[page-agent] Page never reported ready; locating anyway");
    }
}
