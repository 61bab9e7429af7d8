//! Transport seam between the dialog and the bank server.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;

/// Header lines sent along with every message of a dialog, e.g. credentials
/// for an authenticating proxy in front of the bank server. Values never
/// show up in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a header line.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// Delivers one encoded message and returns the bank's raw answer.
///
/// Implementations take care of HTTP and the base64 framing banks expect,
/// and attach `headers` to the outgoing request. Failures are reported as
/// [`crate::Error::Transport`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, url: &str, headers: &Headers, message: &str) -> Result<String>;
}
