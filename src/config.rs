//! Server configuration.
//!
//! Options deserialize from kebab-case keys and every field has a default,
//! so a partial (or empty) configuration document is always valid. The
//! parser limits are flattened in, giving one flat option namespace:
//! `max-uri-length`, `request-timeout`, `confirm-sends` and so on.

use crate::protocol::ParserSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ServerConfig {
    /// Parser limits, shared immutably with every parser on every connection.
    #[serde(flatten)]
    pub parser: ParserSettings,

    /// Milliseconds an in-flight request may stay unanswered; 0 disables.
    pub request_timeout: u64,

    /// Milliseconds a connection may stay idle; 0 disables.
    pub idle_timeout: u64,

    /// Emit a `SendCompleted` event after each completed write. Required for
    /// the chunked-response streaming handshake.
    pub confirm_sends: bool,

    /// Socket read buffer size in bytes.
    pub read_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            parser: ParserSettings::default(),
            request_timeout: 20_000,
            idle_timeout: 10_000,
            confirm_sends: false,
            read_buffer_size: 8192,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout_duration(&self) -> Option<Duration> {
        (self.request_timeout > 0).then(|| Duration::from_millis(self.request_timeout))
    }

    pub fn idle_timeout_duration(&self) -> Option<Duration> {
        (self.idle_timeout > 0).then(|| Duration::from_millis(self.idle_timeout))
    }
}
