//! SIGAA portal client.
//!
//! This module provides:
//! - Host validation and canonicalisation
//! - A cookie-keeping HTTP session
//! - Login, logout and liveness probes
//! - The mailbox workflow and directory enumeration

pub mod auth;
pub mod directory;
pub mod domain;
pub mod mailbox;
pub mod markers;
pub mod session;
pub mod tokens;

pub use auth::{AuthManager, AuthState};
pub use directory::{
    DEFAULT_ALPHABET, DirectoryScan, Draft, Recipient, ScanBatch, ScanPolicy, parse_recipients,
};
pub use domain::Domain;
pub use mailbox::{Mailbox, WorkflowStage};
pub use markers::PageOutcome;
pub use session::{Page, PortalSession, SessionOptions};
pub use tokens::{TokenPair, ajax_render_token, render_token};
