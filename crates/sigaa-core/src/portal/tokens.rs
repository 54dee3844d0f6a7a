//! JSF state token extraction.
//!
//! Every page rendered by the portal carries a view-state identifier
//! (`j_id<N>`) and several AJAX region identifiers (`j_id_jsp_<N>_<M>`).
//! The server only accepts the pair taken from the page rendered
//! immediately before a request, so callers replace their [`TokenPair`]
//! after every navigation step instead of mutating it.

use std::sync::LazyLock;

use regex::Regex;

use crate::{CoreError, Result};

static RENDER_TOKEN_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"j_id\d{1,4}").ok());

static AJAX_TOKEN_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"j_id_jsp_\d{4,}_\d+").ok());

/// Zero-based position of the AJAX token bound to the compose form.
///
/// Pages emit several `j_id_jsp_*` identifiers; the first three belong to
/// layout regions and are syntactically valid but rejected by the
/// interactive form handlers.
pub const AJAX_TOKEN_INDEX: usize = 3;

/// The two tokens a state-changing request must echo back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    render: String,
    ajax_render: String,
}

impl TokenPair {
    /// Build a pair from already-known token values.
    #[must_use]
    pub fn new(render: impl Into<String>, ajax_render: impl Into<String>) -> Self {
        Self {
            render: render.into(),
            ajax_render: ajax_render.into(),
        }
    }

    /// Extract the pair required by the next request from a rendered page.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TokenNotFound`] if either token is missing.
    pub fn extract(html: &str) -> Result<Self> {
        Ok(Self {
            render: render_token(html)?.to_string(),
            ajax_render: ajax_render_token(html)?.to_string(),
        })
    }

    /// The view-state token (`javax.faces.ViewState`).
    #[must_use]
    pub fn render(&self) -> &str {
        &self.render
    }

    /// The AJAX region token (`AJAXREQUEST`).
    #[must_use]
    pub fn ajax_render(&self) -> &str {
        &self.ajax_render
    }

    /// Name of the form field that marks a suggestion as clicked.
    ///
    /// The server derives it from the AJAX region id: trailing digit dropped,
    /// `12` appended.
    #[must_use]
    pub fn suggestion_field(&self) -> String {
        let mut stem = self.ajax_render.chars();
        stem.next_back();
        format!("form:suggestion:{}12", stem.as_str())
    }
}

/// Return the first view-state token in the page.
///
/// # Errors
///
/// Returns [`CoreError::TokenNotFound`] if the page has no `j_id` token.
pub fn render_token(html: &str) -> Result<&str> {
    RENDER_TOKEN_RE
        .as_ref()
        .and_then(|re| re.find(html))
        .map(|m| m.as_str())
        .ok_or_else(|| CoreError::TokenNotFound("no j_id render token in page".to_string()))
}

/// Return the AJAX token at [`AJAX_TOKEN_INDEX`].
///
/// # Errors
///
/// Returns [`CoreError::TokenNotFound`] if the page holds fewer candidates
/// than required. Retrying will not help: the page has the wrong shape.
pub fn ajax_render_token(html: &str) -> Result<&str> {
    nth_ajax_token(html, AJAX_TOKEN_INDEX)
}

fn nth_ajax_token(html: &str, index: usize) -> Result<&str> {
    let mut found = 0;
    for m in AJAX_TOKEN_RE.iter().flat_map(|re| re.find_iter(html)) {
        if found == index {
            return Ok(m.as_str());
        }
        found += 1;
    }
    Err(CoreError::TokenNotFound(format!(
        "expected at least {} j_id_jsp tokens, page has {found}",
        index + 1
    )))
}
