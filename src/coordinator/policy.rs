//! URL policy: which tabs may be injected, which tab is the destination.

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use regex::Regex;

pub struct UrlPolicy {
    protected_prefixes: Vec<String>,
    destination: Regex,
}

impl UrlPolicy {
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let destination = Regex::new(&config.destination_pattern).map_err(|e| {
            RelayError::Policy(format!(
                "invalid destination pattern {:?}: {}",
                config.destination_pattern, e
            ))
        })?;
        let mut protected_prefixes: Vec<String> = config
            .protected_prefixes
            .iter()
            .map(|p| p.to_ascii_lowercase())
            .collect();
        if !config.allow_file_access {
            protected_prefixes.push("file://".into());
        }
        Ok(Self {
            protected_prefixes,
            destination,
        })
    }

    /// Rejects URLs the host will not inject scripts into. An empty URL
    /// means the host withheld it, which only happens without permission.
    pub fn check_injectable(&self, url: &str) -> Result<()> {
        let url = url.trim();
        if url.is_empty() {
            return Err(RelayError::Policy(
                "tab URL is unavailable (missing host permission)".into(),
            ));
        }
        let lower = url.to_ascii_lowercase();
        if let Some(prefix) = self
            .protected_prefixes
            .iter()
            .find(|p| lower.starts_with(p.as_str()))
        {
            return Err(RelayError::Policy(format!(
                "cannot capture on protected page ({}): {}",
                prefix, url
            )));
        }
        Ok(())
    }

    pub fn is_destination(&self, url: &str) -> bool {
        self.destination.is_match(url)
    }
}
