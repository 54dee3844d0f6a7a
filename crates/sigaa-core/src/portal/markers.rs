//! Text markers the portal uses to signal the result of a request.
//!
//! The server answers almost everything with `200 OK`; the only way to tell
//! a successful step from a rejected one is the presence of known phrases in
//! the rendered page.

use serde::Serialize;

/// Present on every page served by a SIGAA instance.
pub const PLATFORM: &str = "SIGAA";
/// Rendered by the login handler when credentials are rejected.
pub const LOGIN_FAILED: &str = "Usuário e/ou senha inválidos";
/// Rendered on protected pages once the session is gone.
pub const SESSION_EXPIRED: &str = "Sua sessão expirou";
/// Message list footer of the mailbox portal.
pub const MAILBOX_RECORDS: &str = "Registro(s) Encontrado(s)";
/// Caption of the attachment table, only present on the compose form.
pub const COMPOSE_FORM: &str = "<caption>Anexar Arquivos</caption>";
/// Response header echoed inside partial AJAX updates.
pub const AJAX_UPDATE: &str = "Ajax-Update-Ids";
/// Confirmation shown after a message is delivered.
pub const MESSAGE_SENT: &str = "Mensagem enviada com sucesso";

/// Meaning of a page returned by the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageOutcome {
    /// The step's success marker was found.
    Success,
    /// The login handler rejected the credentials.
    AuthFailed,
    /// The server no longer recognises the session.
    SessionExpired,
    /// Neither the success marker nor a known failure phrase was found,
    /// usually because a stale token was sent.
    UnexpectedPage,
}

impl PageOutcome {
    /// Whether the step succeeded.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Classify the answer to a login attempt.
    ///
    /// The server has no success marker for logins: anything that does not
    /// carry the failure phrase counts as authenticated.
    #[must_use]
    pub fn of_login(body: &str) -> Self {
        if body.contains(LOGIN_FAILED) {
            Self::AuthFailed
        } else {
            Self::Success
        }
    }

    /// Classify a liveness probe.
    #[must_use]
    pub fn of_probe(body: &str) -> Self {
        if body.contains(SESSION_EXPIRED) {
            Self::SessionExpired
        } else {
            Self::Success
        }
    }

    /// Classify a protected page whose success is signalled by `marker`.
    #[must_use]
    pub fn of_page(body: &str, marker: &str) -> Self {
        if body.contains(marker) {
            Self::Success
        } else if body.contains(SESSION_EXPIRED) {
            Self::SessionExpired
        } else {
            Self::UnexpectedPage
        }
    }
}

impl std::fmt::Display for PageOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::AuthFailed => write!(f, "authentication failed"),
            Self::SessionExpired => write!(f, "session expired"),
            Self::UnexpectedPage => write!(f, "unexpected page"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_fails_only_on_failure_phrase() {
        assert_eq!(
            PageOutcome::of_login("<p>Usuário e/ou senha inválidos</p>"),
            PageOutcome::AuthFailed
        );
        assert_eq!(PageOutcome::of_login("<h1>Erro interno</h1>"), PageOutcome::Success);
        assert_eq!(PageOutcome::of_login(""), PageOutcome::Success);
    }

    #[test]
    fn probe_detects_expired_sessions() {
        assert_eq!(
            PageOutcome::of_probe("Sua sessão expirou. Autentique-se novamente."),
            PageOutcome::SessionExpired
        );
        assert!(PageOutcome::of_probe("Portal do Discente").is_success());
    }

    #[test]
    fn page_prefers_success_marker() {
        assert_eq!(
            PageOutcome::of_page("12 Registro(s) Encontrado(s)", MAILBOX_RECORDS),
            PageOutcome::Success
        );
        assert_eq!(
            PageOutcome::of_page("Sua sessão expirou", MAILBOX_RECORDS),
            PageOutcome::SessionExpired
        );
        assert_eq!(
            PageOutcome::of_page("<html></html>", MAILBOX_RECORDS),
            PageOutcome::UnexpectedPage
        );
    }
}
