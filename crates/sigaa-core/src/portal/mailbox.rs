//! Mailbox workflow: portal → compose form → directory search → send.
//!
//! The compose form only accepts requests stamped with the token pair of the
//! page rendered right before them, so the navigation steps must run in
//! order and each one replaces the stored pair:
//!
//! 1. [`Mailbox::enter_mailbox_portal`]
//! 2. [`Mailbox::enter_compose_view`]
//! 3. any number of [`Mailbox::search`], [`Mailbox::add_recipient`], ...
//! 4. [`Mailbox::send_message`]
//!
//! A step that does not find its success marker resets the workflow; the
//! caller has to start again from step 1.

use std::collections::BTreeSet;

use log::{debug, info};
use serde::Serialize;

use crate::portal::directory::{DirectoryScan, Draft, Recipient, ScanPolicy, parse_recipients};
use crate::portal::markers::{self, PageOutcome};
use crate::portal::{Domain, PortalSession, TokenPair};
use crate::{CoreError, Result};

/// How far the workflow has progressed on the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    /// No mailbox page rendered yet, or the last step failed.
    Outside,
    /// The mailbox message list is the last rendered page.
    Portal,
    /// The compose form is the last rendered page.
    Compose,
}

/// Mailbox sub-application of an authenticated session.
#[derive(Debug)]
pub struct Mailbox {
    session: PortalSession,
    stage: WorkflowStage,
    tokens: Option<TokenPair>,
}

impl Mailbox {
    /// Mailbox entry point; redirects to the canonical host.
    pub const PORTAL: &'static str = "/sigaa/abrirCaixaPostal.jsf?sistema=2";
    /// Message list form, also the menu that opens the compose form.
    pub const INBOX: &'static str = "/cxpostal/caixa_postal.jsf";
    /// Compose form; search, selection, recipients and sending all post here.
    pub const COMPOSE: &'static str = "/cxpostal/envia_mensagem.jsf";

    /// Wrap an (authenticated) session. No request is sent.
    #[must_use]
    pub const fn new(session: PortalSession) -> Self {
        Self {
            session,
            stage: WorkflowStage::Outside,
            tokens: None,
        }
    }

    /// Open the mailbox portal.
    ///
    /// The server may redirect to a normalised host; the host of the final
    /// URL (without `www.`) replaces the stored domain for every later
    /// request.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TokenNotFound`] if the portal page carries no
    /// tokens, or [`CoreError::Http`] on transport failures.
    pub async fn enter_mailbox_portal(&mut self) -> Result<PageOutcome> {
        let page = self.session.get(Self::PORTAL).await?;
        if let Some(domain) = Domain::from_url(&page.url) {
            self.session.set_domain(domain);
        }

        let outcome = PageOutcome::of_page(&page.body, markers::MAILBOX_RECORDS);
        self.advance(outcome, WorkflowStage::Portal, &page.body)?;
        info!("mailbox portal: {outcome}");
        Ok(outcome)
    }

    /// Open the compose form from the mailbox menu.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TokenNotFound`] if the portal was not entered
    /// first or the compose page carries no tokens, or [`CoreError::Http`]
    /// on transport failures.
    pub async fn enter_compose_view(&mut self) -> Result<PageOutcome> {
        let tokens = self.tokens_for(WorkflowStage::Portal)?;
        let payload = [
            ("form", "form"),
            ("form:selectOpMarcarMsg", "8"),
            ("form:SelectOneMenuPaginacao", "0"),
            ("javax.faces.ViewState", tokens.render()),
            ("form:cmdMsg", "form:cmdMsg"),
        ];
        let page = self.session.post_form(Self::INBOX, &payload).await?;

        let outcome = PageOutcome::of_page(&page.body, markers::COMPOSE_FORM);
        self.advance(outcome, WorkflowStage::Compose, &page.body)?;
        info!("compose view: {outcome}");
        Ok(outcome)
    }

    /// Ask the incremental search for recipients matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TokenNotFound`] if the compose view is not the
    /// current page, or [`CoreError::Http`] on transport failures.
    pub async fn search(&mut self, query: &str, draft: &Draft) -> Result<BTreeSet<Recipient>> {
        let tokens = self.tokens_for(WorkflowStage::Compose)?;
        let payload = [
            ("AJAXREQUEST", tokens.ajax_render()),
            ("form", "form"),
            ("form:usuarioAuto", query),
            ("form:suggestion_selection", ""),
            ("form:assunto", draft.subject.as_str()),
            ("form:texto", draft.message.as_str()),
            ("form:nome", ""),
            ("form:arquivo2", ""),
            ("javax.faces.ViewState", tokens.render()),
            ("form:suggestion", "form:suggestion"),
            ("ajaxSingle", "form:suggestion"),
            ("inputvalue", query),
            ("AJAX:EVENTS_COUNT", "1"),
        ];
        let page = self.session.post_form(Self::COMPOSE, &payload).await?;

        let found = parse_recipients(&page.body);
        debug!("search {query:?}: {} recipients", found.len());
        Ok(found)
    }

    /// Mimic a click on one of the suggestions offered by [`Self::search`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TokenNotFound`] if the compose view is not the
    /// current page, or [`CoreError::Http`] on transport failures.
    pub async fn simulate_selection(
        &mut self,
        recipient: &Recipient,
        draft: &Draft,
    ) -> Result<PageOutcome> {
        let tokens = self.tokens_for(WorkflowStage::Compose)?;
        let suggestion = tokens.suggestion_field();
        let payload = [
            ("AJAXREQUEST", tokens.ajax_render()),
            ("form", "form"),
            ("form:usuarioAuto", recipient.as_str()),
            ("form:suggestion_selection", "0"),
            ("form:assunto", draft.subject.as_str()),
            ("form:texto", draft.message.as_str()),
            ("form:nome", ""),
            ("form:arquivo2", ""),
            ("form:confLeitura", "on"),
            ("form:enviarEmail", "on"),
            ("javax.faces.ViewState", tokens.render()),
            (suggestion.as_str(), suggestion.as_str()),
        ];
        let page = self.session.post_form(Self::COMPOSE, &payload).await?;

        let outcome = PageOutcome::of_page(&page.body, markers::AJAX_UPDATE);
        debug!("select {recipient}: {outcome}");
        Ok(outcome)
    }

    /// Add `recipient` to the message being composed.
    ///
    /// Replays what the browser does: search on the username, click the
    /// suggestion, then press "add". Success means the username shows up in
    /// the recipient list of the returned page. A recipient with an empty
    /// username cannot be confirmed and yields
    /// [`PageOutcome::UnexpectedPage`] without any request.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TokenNotFound`] if the compose view is not the
    /// current page, or [`CoreError::Http`] on transport failures.
    pub async fn add_recipient(
        &mut self,
        recipient: &Recipient,
        draft: &Draft,
    ) -> Result<PageOutcome> {
        let tokens = self.tokens_for(WorkflowStage::Compose)?;
        let username = recipient.username();
        if username.is_empty() {
            debug!("{recipient:?} has no username to confirm, not adding");
            return Ok(PageOutcome::UnexpectedPage);
        }
        self.search(username, draft).await?;
        let selected = self.simulate_selection(recipient, draft).await?;
        if !selected.is_success() {
            debug!("selection of {recipient} not confirmed ({selected}), adding anyway");
        }

        let payload = [
            ("AJAXREQUEST", tokens.ajax_render()),
            ("form", "form"),
            ("form:usuarioAuto", recipient.as_str()),
            ("form:suggestion_selection", ""),
            ("form:assunto", draft.subject.as_str()),
            ("form:texto", draft.message.as_str()),
            ("form:nome", ""),
            ("form:arquivo2", ""),
            ("form:confLeitura", "on"),
            ("form:enviarEmail", "on"),
            ("javax.faces.ViewState", tokens.render()),
            ("form:addDestinatario", "form:addDestinatario"),
        ];
        let page = self.session.post_form(Self::COMPOSE, &payload).await?;

        let outcome = PageOutcome::of_page(&page.body, username);
        info!("add recipient {recipient}: {outcome}");
        Ok(outcome)
    }

    /// Send the composed message to the recipients added so far.
    ///
    /// The recipient field is left empty: recipients are already bound on
    /// the server. The submit trigger is the field the form labels as its
    /// cancel button, which is what the portal wires to "send".
    ///
    /// The workflow is reset afterwards whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TokenNotFound`] if the compose view is not the
    /// current page, or [`CoreError::Http`] on transport failures.
    pub async fn send_message(&mut self, draft: &Draft) -> Result<PageOutcome> {
        let tokens = self.tokens_for(WorkflowStage::Compose)?;
        let payload = [
            ("form", "form"),
            ("form:usuarioAuto", ""),
            ("form:suggestion_selection", ""),
            ("form:assunto", draft.subject.as_str()),
            ("form:texto", draft.message.as_str()),
            ("form:nome", ""),
            ("form:arquivo2", ""),
            ("form:confLeitura", "on"),
            ("form:enviarEmail", "on"),
            ("form:btnBotaoCancelar", "Enviar"),
            ("javax.faces.ViewState", tokens.render()),
        ];
        let page = self.session.post_form(Self::COMPOSE, &payload).await?;

        let outcome = PageOutcome::of_page(&page.body, markers::MESSAGE_SENT);
        self.reset();
        info!("send message {:?}: {outcome}", draft.subject);
        Ok(outcome)
    }

    /// Search every symbol of the default alphabet and merge the results.
    ///
    /// One round trip per symbol; expect this to take minutes on a real
    /// portal. Failed symbols are skipped.
    ///
    /// # Errors
    ///
    /// Never fails with the skip policy; kept fallible so callers can switch
    /// to [`DirectoryScan::run`] with [`ScanPolicy::Abort`].
    pub async fn enumerate_directory(&mut self) -> Result<BTreeSet<Recipient>> {
        DirectoryScan::new().run(self, ScanPolicy::Skip).await
    }

    /// Host requests are sent to, as last re-derived from the portal.
    #[must_use]
    pub const fn domain(&self) -> &Domain {
        self.session.domain()
    }

    /// Current workflow stage.
    #[must_use]
    pub const fn stage(&self) -> WorkflowStage {
        self.stage
    }

    /// Token pair of the last rendered mailbox page.
    #[must_use]
    pub const fn tokens(&self) -> Option<&TokenPair> {
        self.tokens.as_ref()
    }

    /// Underlying HTTP session, read-only.
    #[must_use]
    pub const fn session(&self) -> &PortalSession {
        &self.session
    }

    fn tokens_for(&self, required: WorkflowStage) -> Result<TokenPair> {
        match &self.tokens {
            Some(tokens) if self.stage >= required => Ok(tokens.clone()),
            _ => Err(CoreError::TokenNotFound(match required {
                WorkflowStage::Compose => "compose view has not been entered".to_string(),
                _ => "mailbox portal has not been entered".to_string(),
            })),
        }
    }

    fn advance(&mut self, outcome: PageOutcome, next: WorkflowStage, body: &str) -> Result<()> {
        self.reset();
        if outcome.is_success() {
            self.tokens = Some(TokenPair::extract(body)?);
            self.stage = next;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.stage = WorkflowStage::Outside;
        self.tokens = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::SessionOptions;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PORTAL_PAGE: &str = r#"<form id="form"><input name="j_id31"/>
        <span id="j_id_jsp_5150_1"></span><span id="j_id_jsp_5150_2"></span>
        <span id="j_id_jsp_5150_3"></span><span id="j_id_jsp_5150_4"></span>
        <td>3 Registro(s) Encontrado(s)</td></form>"#;

    const COMPOSE_PAGE: &str = r#"<form id="form"><input name="j_id77"/>
        <span id="j_id_jsp_8080_1"></span><span id="j_id_jsp_8080_2"></span>
        <span id="j_id_jsp_8080_3"></span><span id="j_id_jsp_123456_7"></span>
        <span id="j_id_jsp_8080_5"></span>
        <table><caption>Anexar Arquivos</caption></table></form>"#;

    const SUGGESTIONS: &str = r#"<?xml version="1.0"?><html><body>
        <table id="form:suggestion:suggest"><tr><td>BRUNO DO NASCIMENTO MACIEL (macielti)</td></tr>
        <tr><td>BRUNO DO NASCIMENTO MACIEL (macielti)</td></tr></table>
        <meta name="Ajax-Update-Ids" content="form:suggestion"/></body></html>"#;

    fn mailbox_for(server: &MockServer) -> Mailbox {
        let domain = Domain::parse(&server.address().to_string()).expect("mock address");
        let options = SessionOptions {
            scheme: "http".to_string(),
            ..SessionOptions::default()
        };
        Mailbox::new(PortalSession::new(domain, &options).expect("session"))
    }

    async fn mount_navigation(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/sigaa/abrirCaixaPostal.jsf"))
            .and(query_param("sistema", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PORTAL_PAGE))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/cxpostal/caixa_postal.jsf"))
            .and(body_string_contains("javax.faces.ViewState=j_id31"))
            .and(body_string_contains("form%3AselectOpMarcarMsg=8"))
            .respond_with(ResponseTemplate::new(200).set_body_string(COMPOSE_PAGE))
            .mount(server)
            .await;
    }

    async fn mount_search(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/cxpostal/envia_mensagem.jsf"))
            .and(body_string_contains("ajaxSingle=form%3Asuggestion"))
            .and(body_string_contains("AJAXREQUEST=j_id_jsp_123456_7"))
            .and(body_string_contains("javax.faces.ViewState=j_id77"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SUGGESTIONS))
            .mount(server)
            .await;
    }

    async fn composing(server: &MockServer) -> Mailbox {
        let mut mailbox = mailbox_for(server);
        assert!(mailbox.enter_mailbox_portal().await.expect("portal").is_success());
        assert!(mailbox.enter_compose_view().await.expect("compose").is_success());
        mailbox
    }

    #[tokio::test]
    async fn navigation_refreshes_tokens_at_each_step() {
        let server = MockServer::start().await;
        mount_navigation(&server).await;

        let mut mailbox = mailbox_for(&server);
        assert_eq!(mailbox.stage(), WorkflowStage::Outside);

        mailbox.enter_mailbox_portal().await.expect("portal");
        assert_eq!(mailbox.stage(), WorkflowStage::Portal);
        assert_eq!(mailbox.tokens(), Some(&TokenPair::new("j_id31", "j_id_jsp_5150_4")));

        mailbox.enter_compose_view().await.expect("compose");
        assert_eq!(mailbox.stage(), WorkflowStage::Compose);
        assert_eq!(mailbox.tokens(), Some(&TokenPair::new("j_id77", "j_id_jsp_123456_7")));
    }

    #[tokio::test]
    async fn missing_marker_resets_workflow() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sigaa/abrirCaixaPostal.jsf"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Sua sessão expirou"))
            .mount(&server)
            .await;

        let mut mailbox = mailbox_for(&server);
        let outcome = mailbox.enter_mailbox_portal().await.expect("request");
        assert_eq!(outcome, PageOutcome::SessionExpired);
        assert_eq!(mailbox.stage(), WorkflowStage::Outside);
        assert!(mailbox.tokens().is_none());
    }

    #[tokio::test]
    async fn portal_redirect_overwrites_domain() {
        let canonical = MockServer::start().await;
        mount_navigation(&canonical).await;

        let alias = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sigaa/abrirCaixaPostal.jsf"))
            .respond_with(ResponseTemplate::new(302).insert_header(
                "Location",
                format!("{}/sigaa/abrirCaixaPostal.jsf?sistema=2", canonical.uri()).as_str(),
            ))
            .expect(1)
            .mount(&alias)
            .await;

        let mut mailbox = mailbox_for(&alias);
        assert!(mailbox.enter_mailbox_portal().await.expect("portal").is_success());
        assert_eq!(mailbox.domain().as_str(), canonical.address().to_string());

        // The compose request must go to the canonical host only.
        assert!(mailbox.enter_compose_view().await.expect("compose").is_success());
    }

    #[tokio::test]
    async fn compose_before_portal_fails() {
        let server = MockServer::start().await;
        let mut mailbox = mailbox_for(&server);
        let err = mailbox.enter_compose_view().await.expect_err("out of order");
        assert!(matches!(err, CoreError::TokenNotFound(_)));
    }

    #[tokio::test]
    async fn add_recipient_before_compose_fails_without_requests() {
        let server = MockServer::start().await;
        mount_navigation(&server).await;
        Mock::given(method("POST"))
            .and(path("/cxpostal/envia_mensagem.jsf"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut mailbox = mailbox_for(&server);
        mailbox.enter_mailbox_portal().await.expect("portal");

        let bruno = Recipient::from("BRUNO DO NASCIMENTO MACIEL (macielti)");
        let err = mailbox
            .add_recipient(&bruno, &Draft::default())
            .await
            .expect_err("compose view not entered");
        assert!(matches!(err, CoreError::TokenNotFound(_)));
    }

    #[tokio::test]
    async fn search_returns_each_recipient_once() {
        let server = MockServer::start().await;
        mount_navigation(&server).await;
        mount_search(&server).await;

        let mut mailbox = composing(&server).await;
        let found = mailbox
            .search("macielti", &Draft::new("Assunto", "Texto"))
            .await
            .expect("search");
        assert_eq!(
            found.into_iter().collect::<Vec<_>>(),
            vec![Recipient::from("BRUNO DO NASCIMENTO MACIEL (macielti)")]
        );
    }

    #[tokio::test]
    async fn selection_uses_dynamic_suggestion_field() {
        let server = MockServer::start().await;
        mount_navigation(&server).await;
        Mock::given(method("POST"))
            .and(path("/cxpostal/envia_mensagem.jsf"))
            .and(body_string_contains("form%3Asuggestion%3Aj_id_jsp_123456_12"))
            .and(body_string_contains("form%3Asuggestion_selection=0"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SUGGESTIONS))
            .expect(1)
            .mount(&server)
            .await;

        let mut mailbox = composing(&server).await;
        let bruno = Recipient::from("BRUNO DO NASCIMENTO MACIEL (macielti)");
        let outcome = mailbox
            .simulate_selection(&bruno, &Draft::default())
            .await
            .expect("select");
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn add_recipient_checks_username_in_page() {
        let server = MockServer::start().await;
        mount_navigation(&server).await;
        mount_search(&server).await;
        Mock::given(method("POST"))
            .and(path("/cxpostal/envia_mensagem.jsf"))
            .and(body_string_contains("form%3Asuggestion_selection=0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Ajax-Update-Ids"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/cxpostal/envia_mensagem.jsf"))
            .and(body_string_contains("form%3AaddDestinatario=form%3AaddDestinatario"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<td>BRUNO DO NASCIMENTO MACIEL (macielti)</td>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut mailbox = composing(&server).await;
        let bruno = Recipient::from("BRUNO DO NASCIMENTO MACIEL (macielti)");
        let outcome = mailbox
            .add_recipient(&bruno, &Draft::default())
            .await
            .expect("add");
        assert!(outcome.is_success());
        assert_eq!(mailbox.stage(), WorkflowStage::Compose);
    }

    #[tokio::test]
    async fn add_recipient_without_username_is_not_confirmed() {
        let server = MockServer::start().await;
        mount_navigation(&server).await;
        let mut mailbox = composing(&server).await;

        Mock::given(method("POST"))
            .and(path("/cxpostal/envia_mensagem.jsf"))
            .respond_with(ResponseTemplate::new(200).set_body_string("FULANO () Ajax-Update-Ids"))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = mailbox
            .add_recipient(&Recipient::from("FULANO ()"), &Draft::default())
            .await
            .expect("add");
        assert_eq!(outcome, PageOutcome::UnexpectedPage);
        assert_eq!(mailbox.stage(), WorkflowStage::Compose);
    }

    #[tokio::test]
    async fn send_message_uses_cancel_button_trigger() {
        let server = MockServer::start().await;
        mount_navigation(&server).await;
        Mock::given(method("POST"))
            .and(path("/cxpostal/envia_mensagem.jsf"))
            .and(body_string_contains("form%3AbtnBotaoCancelar=Enviar"))
            .and(body_string_contains("form%3AusuarioAuto=&"))
            .and(body_string_contains("form%3Aassunto=Prova+final"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("Mensagem enviada com sucesso!"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut mailbox = composing(&server).await;
        let outcome = mailbox
            .send_message(&Draft::new("Prova final", "Sala 12"))
            .await
            .expect("send");
        assert_eq!(outcome, PageOutcome::Success);
        assert_eq!(mailbox.stage(), WorkflowStage::Outside);
    }

    #[tokio::test]
    async fn enumeration_is_a_stable_set() {
        let server = MockServer::start().await;
        mount_navigation(&server).await;
        mount_search(&server).await;

        let mut mailbox = composing(&server).await;
        let first = mailbox.enumerate_directory().await.expect("first scan");
        let second = DirectoryScan::with_alphabet("9876543210zyxwvutsrqponmlkjihgfedcba")
            .run(&mut mailbox, ScanPolicy::Abort)
            .await
            .expect("second scan");
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[tokio::test]
    async fn scan_policy_decides_on_failed_symbols() {
        let server = MockServer::start().await;
        let mut mailbox = mailbox_for(&server);

        let skipped = DirectoryScan::with_alphabet("ab")
            .run(&mut mailbox, ScanPolicy::Skip)
            .await
            .expect("skip policy never fails");
        assert!(skipped.is_empty());

        let aborted = DirectoryScan::with_alphabet("ab")
            .run(&mut mailbox, ScanPolicy::Abort)
            .await;
        assert!(matches!(aborted, Err(CoreError::TokenNotFound(_))));
    }

    #[tokio::test]
    async fn skipped_symbol_does_not_stop_later_ones() {
        let server = MockServer::start().await;
        mount_navigation(&server).await;
        let answers = [
            ("a", "<td>ANA LIMA (alima)</td>"),
            ("c", "<td>CARLOS SOUZA (csouza)</td>"),
        ];
        for (symbol, body) in answers {
            Mock::given(method("POST"))
                .and(path("/cxpostal/envia_mensagem.jsf"))
                .and(body_string_contains(format!("inputvalue={symbol}&")))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .mount(&server)
                .await;
        }
        Mock::given(method("POST"))
            .and(path("/cxpostal/envia_mensagem.jsf"))
            .and(body_string_contains("inputvalue=b&"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<td>BRUNO DO NASCIMENTO MACIEL (macielti)</td>")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let domain = Domain::parse(&server.address().to_string()).expect("mock address");
        let options = SessionOptions {
            scheme: "http".to_string(),
            timeout: Some(Duration::from_millis(500)),
            ..SessionOptions::default()
        };
        let mut mailbox = Mailbox::new(PortalSession::new(domain, &options).expect("session"));
        mailbox.enter_mailbox_portal().await.expect("portal");
        mailbox.enter_compose_view().await.expect("compose");

        let directory = DirectoryScan::with_alphabet("abc")
            .run(&mut mailbox, ScanPolicy::Skip)
            .await
            .expect("skip policy never fails");
        assert_eq!(
            directory.into_iter().collect::<Vec<_>>(),
            vec![
                Recipient::from("ANA LIMA (alima)"),
                Recipient::from("CARLOS SOUZA (csouza)"),
            ]
        );
    }

    #[tokio::test]
    async fn parallel_scan_merges_sessions() {
        let server = MockServer::start().await;
        mount_navigation(&server).await;
        mount_search(&server).await;

        let workers = vec![composing(&server).await, composing(&server).await];
        let directory = DirectoryScan::with_alphabet("abcdef")
            .run_parallel(workers, ScanPolicy::Abort)
            .await
            .expect("parallel scan");
        assert_eq!(directory.len(), 1);

        let none = DirectoryScan::new().run_parallel(Vec::new(), ScanPolicy::Skip).await;
        assert!(matches!(none, Err(CoreError::Config(_))));
    }
}
