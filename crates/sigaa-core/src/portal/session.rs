//! HTTP session bound to one portal instance.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, StatusCode, Url};

use crate::portal::Domain;
use crate::Result;

/// Name of the servlet container's session cookie.
pub const SESSION_COOKIE: &str = "JSESSIONID";

/// Browser identity sent when none is configured.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Transport settings for a [`PortalSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// URL scheme used to reach the portal (`https` in production).
    pub scheme: String,
    /// `User-Agent` header value.
    pub user_agent: Option<String>,
    /// Per-request timeout. The portal protocol itself has none.
    pub timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            user_agent: None,
            timeout: None,
        }
    }
}

/// A page returned by the portal after redirects were followed.
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL, after redirects.
    pub url: Url,
    /// HTTP status of the final response.
    pub status: StatusCode,
    /// Decoded response body.
    pub body: String,
}

/// One cookie jar and connection pool talking to one portal host.
#[derive(Debug)]
pub struct PortalSession {
    client: Client,
    jar: Arc<Jar>,
    scheme: String,
    domain: Domain,
}

impl PortalSession {
    /// Build a fresh, unauthenticated session. No request is sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(domain: Domain, options: &SessionOptions) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let mut builder = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .user_agent(options.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT));
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            jar,
            scheme: options.scheme.clone(),
            domain,
        })
    }

    /// The host requests are currently sent to.
    #[must_use]
    pub const fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Point later requests at a different (canonical) host.
    pub fn set_domain(&mut self, domain: Domain) {
        if domain != self.domain {
            debug!("portal domain changed: {} -> {domain}", self.domain);
            self.domain = domain;
        }
    }

    /// Absolute URL of `path` on the current host.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}://{}{path}", self.scheme, self.domain)
    }

    /// GET `path`, following redirects.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Http`](crate::CoreError::Http) on transport failures.
    pub async fn get(&self, path: &str) -> Result<Page> {
        let url = self.url(path);
        debug!("GET {url}");
        let response = self.client.get(&url).send().await?;
        Self::read_page(response).await
    }

    /// POST a url-encoded form to `path`, following redirects.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Http`](crate::CoreError::Http) on transport failures.
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<Page> {
        let url = self.url(path);
        debug!("POST {url} ({} fields)", form.len());
        let response = self.client.post(&url).form(form).send().await?;
        Self::read_page(response).await
    }

    /// Cookies the jar would send to the current host.
    #[must_use]
    pub fn cookies(&self) -> BTreeMap<String, String> {
        let Ok(url) = Url::parse(&self.url("/")) else {
            return BTreeMap::new();
        };
        self.jar
            .cookies(&url)
            .and_then(|header| header.to_str().ok().map(parse_cookie_header))
            .unwrap_or_default()
    }

    /// Value of the `JSESSIONID` cookie, if the server issued one.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.cookies().remove(SESSION_COOKIE)
    }

    async fn read_page(response: reqwest::Response) -> Result<Page> {
        let url = response.url().clone();
        let status = response.status();
        let body = response.text().await?;
        debug!("{status} {url} ({} bytes)", body.len());
        Ok(Page { url, status, body })
    }
}

fn parse_cookie_header(header: &str) -> BTreeMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn plain_http() -> SessionOptions {
        SessionOptions {
            scheme: "http".to_string(),
            ..SessionOptions::default()
        }
    }

    fn session_for(server: &MockServer) -> PortalSession {
        let domain = Domain::parse(&server.address().to_string()).expect("mock address");
        PortalSession::new(domain, &plain_http()).expect("session")
    }

    #[test]
    fn parses_cookie_header() {
        let cookies = parse_cookie_header("JSESSIONID=ABC123.node1; lang=pt_BR");
        assert_eq!(cookies.get("JSESSIONID").map(String::as_str), Some("ABC123.node1"));
        assert_eq!(cookies.get("lang").map(String::as_str), Some("pt_BR"));
    }

    #[test]
    fn url_joins_scheme_domain_and_path() {
        let domain = Domain::parse("sigaa.ufpi.br").expect("domain");
        let session = PortalSession::new(domain, &SessionOptions::default()).expect("session");
        assert_eq!(
            session.url("/sigaa/verTelaLogin.do"),
            "https://sigaa.ufpi.br/sigaa/verTelaLogin.do"
        );
    }

    #[tokio::test]
    async fn keeps_session_cookie_between_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sigaa/verTelaLogin.do"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Set-Cookie", "JSESSIONID=F00D; Path=/")
                    .set_body_string("SIGAA"),
            )
            .mount(&server)
            .await;

        let session = session_for(&server);
        assert_eq!(session.session_id(), None);

        let page = session.get("/sigaa/verTelaLogin.do").await.expect("page");
        assert_eq!(page.status, StatusCode::OK);
        assert_eq!(session.session_id().as_deref(), Some("F00D"));
    }

    #[tokio::test]
    async fn posts_url_encoded_forms() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cxpostal/envia_mensagem.jsf"))
            .and(body_string_contains("form%3Aassunto=Ol%C3%A1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let session = session_for(&server);
        let page = session
            .post_form("/cxpostal/envia_mensagem.jsf", &[("form:assunto", "Olá")])
            .await
            .expect("page");
        assert_eq!(page.body, "ok");
    }
}
