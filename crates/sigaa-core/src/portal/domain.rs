//! Portal host names.

use std::fmt;

use reqwest::Url;

use crate::{CoreError, Result};

/// Validated host (with optional port) of a SIGAA instance, e.g.
/// `sigaa.ufpi.br`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Domain(String);

impl Domain {
    /// Validate a bare host string.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDomain`] if the input carries a scheme,
    /// path, credentials or query, or is not a host at all.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let invalid = || CoreError::InvalidDomain(input.to_string());

        if trimmed.is_empty() || trimmed.contains("://") {
            return Err(invalid());
        }
        if trimmed
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '@' | '?' | '#'))
        {
            return Err(invalid());
        }

        let url = Url::parse(&format!("https://{trimmed}/")).map_err(|_| invalid())?;
        Self::from_host_and_port(&url).ok_or_else(invalid)
    }

    /// Re-derive the canonical domain from a response URL, dropping a
    /// leading `www.` the server may have added while redirecting.
    #[must_use]
    pub fn from_url(url: &Url) -> Option<Self> {
        Self::from_host_and_port(url).map(|domain| match domain.0.strip_prefix("www.") {
            Some(rest) if !rest.is_empty() => Self(rest.to_string()),
            _ => domain,
        })
    }

    /// The domain as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_host_and_port(url: &Url) -> Option<Self> {
        let host = url.host_str()?.to_ascii_lowercase();
        Some(match url.port() {
            Some(port) => Self(format!("{host}:{port}")),
            None => Self(host),
        })
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
