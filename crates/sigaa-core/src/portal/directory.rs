//! Recipients and brute-force directory enumeration.
//!
//! The portal has no "list everyone" endpoint. The only way to discover the
//! directory is to feed single-symbol prefixes to the incremental search and
//! merge the suggestions, which takes one round trip per symbol. Names made
//! only of symbols outside the alphabet are never found.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, LazyLock};

use log::{info, warn};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::portal::Mailbox;
use crate::{CoreError, Result};

/// Symbols queried by a default scan.
pub const DEFAULT_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz0123456789";

static RECIPIENT_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?:\w+\s)+\(.+?\)").ok());

/// A directory entry as the portal renders it: `"FULL NAME (username)"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recipient(String);

impl Recipient {
    /// Wrap a display string. The value is echoed verbatim to the server.
    #[must_use]
    pub fn new(display: impl Into<String>) -> Self {
        Self(display.into())
    }

    /// The full display string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Text inside the last parenthesis pair, or the whole (trimmed) string
    /// when there is none.
    #[must_use]
    pub fn username(&self) -> &str {
        let display = self.0.trim();
        display
            .rfind('(')
            .and_then(|open| {
                let inner = &display[open + 1..];
                inner.find(')').map(|close| inner[..close].trim())
            })
            .unwrap_or(display)
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Recipient {
    fn from(display: &str) -> Self {
        Self::new(display)
    }
}

/// Every recipient-shaped string in a search answer, deduplicated.
#[must_use]
pub fn parse_recipients(body: &str) -> BTreeSet<Recipient> {
    RECIPIENT_RE
        .iter()
        .flat_map(|re| re.find_iter(body))
        .map(|m| Recipient::new(m.as_str()))
        .collect()
}

/// Subject and body of the message being composed.
///
/// The compose form is stateful on the server side, so every request made
/// from it echoes the draft back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    /// Message subject (`form:assunto`).
    pub subject: String,
    /// Message text (`form:texto`).
    pub message: String,
}

impl Draft {
    /// Build a draft.
    #[must_use]
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
        }
    }
}

/// What to do when one symbol's search fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScanPolicy {
    /// Log the failure and treat the symbol as having no matches.
    #[default]
    Skip,
    /// Stop the scan and return the first error.
    Abort,
}

impl fmt::Display for ScanPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::Abort => write!(f, "abort"),
        }
    }
}

/// Result of searching one symbol.
#[derive(Debug)]
pub struct ScanBatch {
    /// The symbol that was searched.
    pub symbol: char,
    /// Recipients suggested for it, or the failure.
    pub result: Result<BTreeSet<Recipient>>,
}

/// Restartable, finite sequence of single-symbol directory queries.
///
/// Iterating yields the symbols still to be searched; [`Self::next_batch`]
/// runs the search for the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryScan {
    symbols: Vec<char>,
    cursor: usize,
}

impl DirectoryScan {
    /// A scan over [`DEFAULT_ALPHABET`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_alphabet(DEFAULT_ALPHABET)
    }

    /// A scan over the distinct, non-whitespace symbols of `alphabet`, in
    /// order of first appearance.
    #[must_use]
    pub fn with_alphabet(alphabet: &str) -> Self {
        let mut symbols: Vec<char> = Vec::new();
        for symbol in alphabet.chars().filter(|c| !c.is_whitespace()) {
            if !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }
        Self { symbols, cursor: 0 }
    }

    /// All symbols of the scan.
    #[must_use]
    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }

    /// Number of symbols not yet handed out.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.symbols.len() - self.cursor
    }

    /// Start over from the first symbol.
    pub fn restart(&mut self) {
        self.cursor = 0;
    }

    /// Search the next symbol on `mailbox`. `None` once the scan is done.
    pub async fn next_batch(&mut self, mailbox: &mut Mailbox) -> Option<ScanBatch> {
        let symbol = self.next()?;
        let result = mailbox.search(&symbol.to_string(), &Draft::default()).await;
        Some(ScanBatch { symbol, result })
    }

    /// Run the remaining symbols one after another on a single session and
    /// merge the results.
    ///
    /// # Errors
    ///
    /// With [`ScanPolicy::Abort`], returns the first failed search.
    pub async fn run(
        &mut self,
        mailbox: &mut Mailbox,
        policy: ScanPolicy,
    ) -> Result<BTreeSet<Recipient>> {
        let total = self.symbols.len();
        let mut directory = BTreeSet::new();
        while let Some(batch) = self.next_batch(mailbox).await {
            let done = total - self.remaining();
            if let Some(found) = settle(batch, policy)? {
                directory.extend(found);
            }
            info!("scan {done}/{total}: {} recipients so far", directory.len());
        }
        Ok(directory)
    }

    /// Run the remaining symbols on several independently authenticated
    /// sessions, one task per session, and merge the results.
    ///
    /// Sessions are never shared between tasks: each one carries its own
    /// token pair and server-side compose state.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] when `mailboxes` is empty, and with
    /// [`ScanPolicy::Abort`] the first failed search.
    pub async fn run_parallel(
        self,
        mailboxes: Vec<Mailbox>,
        policy: ScanPolicy,
    ) -> Result<BTreeSet<Recipient>> {
        if mailboxes.is_empty() {
            return Err(CoreError::Config(
                "a parallel scan needs at least one session".to_string(),
            ));
        }

        let total = self.symbols.len();
        let queue = Arc::new(Mutex::new(self));
        let mut workers = JoinSet::new();
        for mut mailbox in mailboxes {
            let queue = Arc::clone(&queue);
            workers.spawn(async move {
                let mut found = BTreeSet::new();
                loop {
                    let Some(symbol) = queue.lock().await.next() else {
                        break;
                    };
                    let result = mailbox.search(&symbol.to_string(), &Draft::default()).await;
                    if let Some(batch) = settle(ScanBatch { symbol, result }, policy)? {
                        found.extend(batch);
                    }
                }
                Ok::<_, CoreError>(found)
            });
        }

        let mut directory = BTreeSet::new();
        while let Some(joined) = workers.join_next().await {
            let found =
                joined.map_err(|e| CoreError::Other(format!("directory scan task failed: {e}")))??;
            directory.extend(found);
        }
        info!("scan of {total} symbols found {} recipients", directory.len());
        Ok(directory)
    }
}

impl Default for DirectoryScan {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for DirectoryScan {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        let symbol = self.symbols.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(symbol)
    }
}

fn settle(batch: ScanBatch, policy: ScanPolicy) -> Result<Option<BTreeSet<Recipient>>> {
    match (batch.result, policy) {
        (Ok(found), _) => Ok(Some(found)),
        (Err(e), ScanPolicy::Skip) => {
            warn!("search for {:?} failed, skipping: {e}", batch.symbol);
            Ok(None)
        }
        (Err(e), ScanPolicy::Abort) => Err(e),
    }
}
