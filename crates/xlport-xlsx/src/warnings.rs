//! Non-fatal diagnostics collected during a single export or import.

use std::fmt;

/// Degraded-feature messages. Every entry is also logged at `warn` level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Warnings {
    messages: Vec<String>,
}

impl Warnings {
    pub fn new() -> Self {
        Warnings::default()
    }

    pub fn push(&mut self, message: impl fmt::Display) {
        let message = message.to_string();
        tracing::warn!("{message}");
        self.messages.push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.messages
    }
}
