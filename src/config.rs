//! Relay configuration: every policy constant in one place.
//!
//! Defaults are compiled in. `RelayConfig::from_env()` loads a `.env` file
//! (if present) and applies `REGION_RELAY_*` overrides on top.

use crate::protocol::Message;
use serde::Deserialize;
use std::time::Duration;

/// Bounded retry with multiplicative backoff.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    pub delay_ms: u64,
    pub backoff: f64,
}

impl RetryPolicy {
    /// Delay to wait after the given (zero-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.backoff.max(1.0).powi(attempt as i32);
        Duration::from_millis((self.delay_ms as f64 * factor).round() as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            delay_ms: 400,
            backoff: 1.5,
        }
    }
}

/// Needles used by the destination-page locators.
///
/// These track the destination page's markup and are expected to change
/// with it, so they live in config rather than in the locator code.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Case-insensitive substrings matched against aria-label / placeholder.
    pub input_names: Vec<String>,
    /// Case-insensitive substrings matched against a button's accessible name.
    pub submit_names: Vec<String>,
    pub min_input_width: f64,
    pub min_input_height: f64,
    pub attempts: u32,
    pub interval_ms: u64,
    pub settle_ms: u64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            input_names: vec![
                "message gemini".into(),
                "enter a prompt".into(),
                "message".into(),
                "ask".into(),
            ],
            submit_names: vec!["send".into(), "submit".into()],
            min_input_width: 100.0,
            min_input_height: 30.0,
            attempts: 10,
            interval_ms: 500,
            settle_ms: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Identity every inbound message's sender must carry.
    pub extension_id: String,
    pub min_region: f64,
    pub max_region: f64,
    /// Per-side clamp on the cropped output raster, in device pixels.
    pub max_raster_side: u32,
    pub max_text_chars: usize,
    pub max_error_chars: usize,
    /// URL opened when no destination tab exists.
    pub destination_url: String,
    /// Regex a tab URL must match to count as the destination.
    pub destination_pattern: String,
    /// URL prefixes that forbid script injection.
    pub protected_prefixes: Vec<String>,
    /// Whether the host granted access to `file://` pages.
    pub allow_file_access: bool,
    pub tab_load_timeout_ms: u64,
    pub tab_poll_interval_ms: u64,
    pub response_timeout_ms: u64,
    pub delivery_retry: RetryPolicy,
    pub locator: LocatorConfig,
    pub rate_limit_messages: usize,
    pub rate_limit_window_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            extension_id: "region-relay".into(),
            min_region: 10.0,
            max_region: 5000.0,
            max_raster_side: 8192,
            max_text_chars: 10_000,
            max_error_chars: 500,
            destination_url: "https://gemini.google.com/app".into(),
            destination_pattern: r"^https://gemini\.google\.com/".into(),
            protected_prefixes: vec![
                "chrome://".into(),
                "chrome-extension://".into(),
                "chrome-search://".into(),
                "chrome-untrusted://".into(),
                "edge://".into(),
                "about:".into(),
                "devtools://".into(),
                "view-source:".into(),
                "https://chrome.google.com/webstore".into(),
                "https://chromewebstore.google.com".into(),
            ],
            allow_file_access: false,
            tab_load_timeout_ms: 15_000,
            tab_poll_interval_ms: 250,
            response_timeout_ms: 10_000,
            delivery_retry: RetryPolicy::default(),
            locator: LocatorConfig::default(),
            rate_limit_messages: 5,
            rate_limit_window_ms: 10_000,
        }
    }
}

impl RelayConfig {
    /// Defaults plus `.env` / environment overrides.
    ///
    /// Unparseable values are logged and ignored so a typo in `.env` never
    /// prevents startup.
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            log::debug!("No .env loaded: {}", e);
        }
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply `REGION_RELAY_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("REGION_RELAY_EXTENSION_ID") {
            self.extension_id = v;
        }
        if let Some(v) = lookup("REGION_RELAY_DESTINATION_URL") {
            self.destination_url = v;
        }
        if let Some(v) = lookup("REGION_RELAY_DESTINATION_PATTERN") {
            self.destination_pattern = v;
        }
        override_parsed(&lookup, "REGION_RELAY_ALLOW_FILE_ACCESS", &mut self.allow_file_access);
        override_parsed(&lookup, "REGION_RELAY_MAX_TEXT_CHARS", &mut self.max_text_chars);
        override_parsed(&lookup, "REGION_RELAY_MAX_RASTER_SIDE", &mut self.max_raster_side);
        override_parsed(&lookup, "REGION_RELAY_TAB_LOAD_TIMEOUT_MS", &mut self.tab_load_timeout_ms);
        override_parsed(&lookup, "REGION_RELAY_RESPONSE_TIMEOUT_MS", &mut self.response_timeout_ms);
        override_parsed(&lookup, "REGION_RELAY_DELIVERY_ATTEMPTS", &mut self.delivery_retry.attempts);
        override_parsed(&lookup, "REGION_RELAY_DELIVERY_DELAY_MS", &mut self.delivery_retry.delay_ms);
    }

    pub fn tab_load_timeout(&self) -> Duration {
        Duration::from_millis(self.tab_load_timeout_ms)
    }

    pub fn tab_poll_interval(&self) -> Duration {
        Duration::from_millis(self.tab_poll_interval_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    /// Worst case for one text delivery: the tab load wait, every delivery
    /// attempt running the page agent's full ready wait, locate and settle,
    /// plus the backoff between attempts.
    pub fn delivery_budget(&self) -> Duration {
        let attempts = self.delivery_retry.attempts.max(1);
        let interval = Duration::from_millis(self.locator.interval_ms);
        let polls = self.locator.attempts.max(1);
        let per_attempt = interval * polls
            + interval * (polls - 1)
            + Duration::from_millis(self.locator.settle_ms);
        let backoff: Duration = (0..attempts - 1)
            .map(|i| self.delivery_retry.delay_after(i))
            .sum();
        self.tab_load_timeout() + per_attempt * attempts + backoff
    }

    /// How long a context waits for the coordinator's reply to `message`.
    /// Text delivery gets its own budget on top of the plain response timeout.
    pub fn reply_timeout(&self, message: &Message) -> Duration {
        match message {
            Message::DeliverText { .. } => self.response_timeout() + self.delivery_budget(),
            _ => self.response_timeout(),
        }
    }
}

fn override_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(v) => *slot = v,
            Err(_) => log::warn!("Ignoring unparseable {}={:?}", key, raw),
        }
    }
}
