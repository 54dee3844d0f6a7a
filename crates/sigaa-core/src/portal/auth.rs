//! Authentication state machine for a portal session.
//!
//! ```text
//! Unauthenticated --login--> Unknown --> Authenticated | Unauthenticated
//! Authenticated  --logout--> Unknown --> Unauthenticated | Authenticated
//! any            --probe---> Unknown --> Authenticated | Unauthenticated
//! ```
//!
//! The state is only `Unknown` while a request is in flight, or after one
//! failed at the transport level.

use log::{debug, info};
use serde::Serialize;

use crate::portal::markers::{self, PageOutcome};
use crate::portal::{Domain, Mailbox, PortalSession, SessionOptions, TokenPair};
use crate::{CoreError, Result};

/// Authentication state of a [`PortalSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// No credentials accepted on this session.
    Unauthenticated,
    /// The server accepted the credentials and the session is live.
    Authenticated,
    /// A request is pending or failed before its answer could be checked.
    Unknown,
}

/// Drives login, logout and liveness probes on one session.
#[derive(Debug)]
pub struct AuthManager {
    session: PortalSession,
    state: AuthState,
    tokens: Option<TokenPair>,
}

impl AuthManager {
    /// Public login screen; also used to recognise a SIGAA instance.
    pub const LOGIN_SCREEN: &'static str = "/sigaa/verTelaLogin.do";
    /// Credential submission endpoint.
    pub const LOGIN: &'static str = "/sigaa/logar.do?dispatch=logOn";
    /// Session termination endpoint.
    pub const LOGOUT: &'static str = "/sigaa/logar.do?dispatch=logOff";
    /// Student landing page, used as the liveness probe.
    pub const PROBE: &'static str = "/sigaa/verPortalDiscente.do";

    /// Open a session against `domain` and check it is a SIGAA instance.
    ///
    /// The check is a plain substring match on the login screen and must not
    /// be relied upon for security.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDomain`] if the login screen does not look
    /// like SIGAA, or [`CoreError::Http`] if the host cannot be reached.
    pub async fn connect(domain: Domain, options: &SessionOptions) -> Result<Self> {
        let session = PortalSession::new(domain, options)?;
        let page = session.get(Self::LOGIN_SCREEN).await?;
        if !page.body.contains(markers::PLATFORM) {
            return Err(CoreError::InvalidDomain(session.domain().to_string()));
        }
        debug!(
            "connected to {} (session cookie issued: {})",
            session.domain(),
            session.session_id().is_some()
        );

        Ok(Self {
            session,
            state: AuthState::Unauthenticated,
            tokens: None,
        })
    }

    /// Submit credentials.
    ///
    /// Only the explicit failure phrase counts as a rejection; error pages
    /// and anything else unexpected are reported as success. On success the
    /// token pair is re-extracted from the answer, or cleared when the
    /// answer carries none.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Http`] on transport failures.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<PageOutcome> {
        info!("logging in to {} as {username}", self.session.domain());
        self.state = AuthState::Unknown;
        let page = self
            .session
            .post_form(Self::LOGIN, &[("user.login", username), ("user.senha", password)])
            .await?;

        let outcome = PageOutcome::of_login(&page.body);
        if outcome.is_success() {
            self.state = AuthState::Authenticated;
            self.refresh_tokens(&page.body);
        } else {
            self.state = AuthState::Unauthenticated;
        }
        debug!("login outcome: {outcome}");
        Ok(outcome)
    }

    /// End the session and confirm it with a liveness probe.
    ///
    /// Returns [`PageOutcome::Success`] only if the probe now reports the
    /// session as gone.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Http`] on transport failures.
    pub async fn logout(&mut self) -> Result<PageOutcome> {
        info!("logging out of {}", self.session.domain());
        self.state = AuthState::Unknown;
        self.session.get(Self::LOGOUT).await?;

        if self.is_live().await? {
            Ok(PageOutcome::UnexpectedPage)
        } else {
            self.tokens = None;
            Ok(PageOutcome::Success)
        }
    }

    /// Probe a protected page to learn whether the session is authenticated.
    ///
    /// A live answer carries fresh tokens, which replace the stored pair.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Http`] on transport failures.
    pub async fn is_live(&mut self) -> Result<bool> {
        self.state = AuthState::Unknown;
        let page = self.session.get(Self::PROBE).await?;

        let outcome = PageOutcome::of_probe(&page.body);
        debug!("liveness probe: {outcome}");
        if outcome.is_success() {
            self.state = AuthState::Authenticated;
            self.refresh_tokens(&page.body);
            Ok(true)
        } else {
            self.state = AuthState::Unauthenticated;
            Ok(false)
        }
    }

    /// Current authentication state.
    #[must_use]
    pub const fn state(&self) -> AuthState {
        self.state
    }

    /// Token pair taken from the last page that carried one.
    #[must_use]
    pub const fn tokens(&self) -> Option<&TokenPair> {
        self.tokens.as_ref()
    }

    /// Underlying HTTP session, read-only.
    #[must_use]
    pub const fn session(&self) -> &PortalSession {
        &self.session
    }

    /// Hand the session over to the mailbox workflow.
    #[must_use]
    pub fn into_mailbox(self) -> Mailbox {
        Mailbox::new(self.session)
    }

    fn refresh_tokens(&mut self, body: &str) {
        self.tokens = TokenPair::extract(body)
            .inspect_err(|e| debug!("answer carries no token pair: {e}"))
            .ok();
    }
}
