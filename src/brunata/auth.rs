//! Login handshake against the provider's identity broker.
//!
//! The broker has no API for password logins, so the session walks the
//! same pages a browser would: load the authorize page, post the
//! credentials, follow the confirmation redirect, and trade the code for
//! tokens. Each attempt starts from a fresh [`HandshakeContext`].

use crate::brunata::endpoints::ProviderEndpoints;
use crate::brunata::gateway::{browser_headers, HttpGateway, HttpRequest, HttpResponse};
use crate::brunata::pkce::PkceParams;
use crate::brunata::settings::{HandshakePageParser, ScriptSettingsParser};
use crate::clock::Clock;
use crate::error::{AuthError, ParseError};
use chrono::{DateTime, Duration, Local};
use reqwest::header::{HeaderName, COOKIE};
use reqwest::{StatusCode, Url};
use serde_derive::Deserialize;
use std::fmt;
use std::sync::Arc;

const CSRF_COOKIE: &str = "x-ms-cpim-csrf";
const CSRF_HEADER: &str = "x-csrf-token";
const REQUESTED_WITH: &str = "x-requested-with";
/// Tokens this close to expiry are renewed before use.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Account credentials, fixed for the lifetime of the process.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Tokens issued by the broker. Replaced wholesale, never patched.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Local>>,
}

impl TokenSet {
    /// Usable at `now` without renewal.
    pub fn is_fresh(&self, now: DateTime<Local>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + Duration::seconds(EXPIRY_MARGIN_SECS) < expires_at,
            None => true,
        }
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Handshake progress, observable for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    HandshakeStarted,
    CredentialsSubmitted,
    CodeReceived,
    Authenticated,
    Failed,
}

/// State of one handshake attempt, dropped when the attempt ends.
struct HandshakeContext {
    pkce: PkceParams,
    csrf_token: String,
    trans_id: String,
    authorization_code: Option<String>,
    /// Cookies set by the broker during this attempt
    cookies: Vec<(String, String)>,
}

impl HandshakeContext {
    fn absorb_cookies(&mut self, response: &HttpResponse) {
        for (name, value) in &response.cookies {
            match self.cookies.iter_mut().find(|(existing, _)| existing == name) {
                Some(entry) => entry.1 = value.clone(),
                None => self.cookies.push((name.clone(), value.clone())),
            }
        }
    }

    fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn request(&self, request: HttpRequest) -> Result<HttpRequest, AuthError> {
        let request = request.with_headers(browser_headers());
        if self.cookies.is_empty() {
            return Ok(request);
        }
        Ok(request.with_header(COOKIE, &self.cookie_header())?)
    }
}

#[derive(Deserialize)]
struct SubmitResponse {
    status: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExpiresIn {
    Seconds(i64),
    Text(String),
}

impl ExpiresIn {
    fn seconds(&self) -> Option<i64> {
        match self {
            ExpiresIn::Seconds(secs) => Some(*secs),
            ExpiresIn::Text(text) => text.trim().parse().ok(),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<ExpiresIn>,
}

/// Owns the token set and runs handshakes on demand.
pub struct AuthSession {
    gateway: Arc<dyn HttpGateway>,
    endpoints: ProviderEndpoints,
    credentials: Credentials,
    parser: Box<dyn HandshakePageParser>,
    clock: Arc<dyn Clock>,
    state: AuthState,
    tokens: Option<TokenSet>,
}

impl AuthSession {
    pub fn new(
        gateway: Arc<dyn HttpGateway>,
        endpoints: ProviderEndpoints,
        credentials: Credentials,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gateway,
            endpoints,
            credentials,
            parser: Box::new(ScriptSettingsParser::default()),
            clock,
            state: AuthState::Unauthenticated,
            tokens: None,
        }
    }

    /// Replaces the authorize page parser.
    pub fn with_parser(mut self, parser: impl HandshakePageParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn tokens(&self) -> Option<&TokenSet> {
        self.tokens.as_ref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.access_token.as_str())
    }

    /// Drops the token set so the next call runs a handshake.
    pub fn invalidate(&mut self) {
        self.tokens = None;
        self.state = AuthState::Unauthenticated;
    }

    /// Onboarding check: true iff a full handshake succeeds.
    pub async fn validate_credentials(&mut self) -> bool {
        match self.authenticate().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Credential validation failed");
                false
            }
        }
    }

    /// Returns an access token, renewing or re-authenticating as needed.
    pub async fn ensure_authenticated(&mut self) -> Result<String, AuthError> {
        let now = self.clock.now();
        if let Some(tokens) = &self.tokens {
            if tokens.is_fresh(now) {
                return Ok(tokens.access_token.clone());
            }
        }

        if self.refresh().await.is_err() {
            self.authenticate().await?;
        }
        self.access_token()
            .map(str::to_string)
            .ok_or_else(|| AuthError::TokenExchangeFailed("no token after handshake".to_string()))
    }

    /// Runs a full handshake, replacing any existing token set.
    pub async fn authenticate(&mut self) -> Result<(), AuthError> {
        self.tokens = None;
        self.state = AuthState::Unauthenticated;

        match self.run_handshake().await {
            Ok(tokens) => {
                tracing::info!(username = %self.credentials.username, "Authenticated");
                self.tokens = Some(tokens);
                self.state = AuthState::Authenticated;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(state = ?self.state, error = %e, "Handshake failed");
                self.state = AuthState::Failed;
                Err(e)
            }
        }
    }

    /// Renews the token set with its refresh token.
    pub async fn refresh(&mut self) -> Result<(), AuthError> {
        let refresh_token = self
            .tokens
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
            .ok_or_else(|| AuthError::TokenExchangeFailed("no refresh token".to_string()))?;

        let request = HttpRequest::post_form(
            self.endpoints.token_url(),
            &[
                ("grant_type", "refresh_token"),
                ("client_id", self.endpoints.client_id()),
                ("refresh_token", &refresh_token),
            ],
        )
        .with_headers(browser_headers());

        match self.token_request(request).await {
            Ok(mut tokens) => {
                tracing::debug!("Access token refreshed");
                tokens.refresh_token.get_or_insert(refresh_token);
                self.tokens = Some(tokens);
                self.state = AuthState::Authenticated;
                Ok(())
            }
            Err(e) => {
                tracing::debug!(error = %e, "Token refresh failed");
                self.invalidate();
                Err(e)
            }
        }
    }

    async fn run_handshake(&mut self) -> Result<TokenSet, AuthError> {
        let mut context = self.start_handshake().await?;
        self.state = AuthState::HandshakeStarted;

        self.submit_credentials(&mut context).await?;
        self.state = AuthState::CredentialsSubmitted;

        self.receive_code(&mut context).await?;
        self.state = AuthState::CodeReceived;

        self.exchange_code(&context).await
    }

    async fn start_handshake(&self) -> Result<HandshakeContext, AuthError> {
        let pkce = PkceParams::generate();
        let request =
            HttpRequest::get(self.endpoints.authorize_url(&pkce)).with_headers(browser_headers());
        let response = self.gateway.request(request).await?;

        if response.status != StatusCode::OK {
            return Err(ParseError::UnexpectedStatus(response.status.as_u16()).into());
        }
        let csrf_token = response
            .cookie(CSRF_COOKIE)
            .ok_or(ParseError::MissingCookie(CSRF_COOKIE))?
            .to_string();
        let settings = self.parser.parse(&response.body)?;
        tracing::debug!("Authorize page parsed");

        let mut context = HandshakeContext {
            pkce,
            csrf_token,
            trans_id: settings.trans_id,
            authorization_code: None,
            cookies: Vec::new(),
        };
        context.absorb_cookies(&response);
        Ok(context)
    }

    async fn submit_credentials(&self, context: &mut HandshakeContext) -> Result<(), AuthError> {
        let request = HttpRequest::post_form(
            self.endpoints.self_asserted_url(&context.trans_id),
            &[
                ("request_type", "RESPONSE"),
                ("logonIdentifier", &self.credentials.username),
                ("password", &self.credentials.password),
            ],
        );
        let request = context
            .request(request)?
            .with_header(HeaderName::from_static(CSRF_HEADER), &context.csrf_token)?
            .with_header(HeaderName::from_static(REQUESTED_WITH), "XMLHttpRequest")?;
        let response = self.gateway.request(request).await?;

        if !response.status.is_success() {
            return Err(AuthError::InvalidCredentials(format!(
                "credential submit returned status {}",
                response.status.as_u16()
            )));
        }
        if let Ok(SubmitResponse {
            status: Some(status),
            message,
        }) = response.json::<SubmitResponse>()
        {
            if status != "200" {
                return Err(AuthError::InvalidCredentials(
                    message.unwrap_or_else(|| format!("provider status {}", status)),
                ));
            }
        }

        context.absorb_cookies(&response);
        Ok(())
    }

    async fn receive_code(&self, context: &mut HandshakeContext) -> Result<(), AuthError> {
        let request = HttpRequest::get(
            self.endpoints
                .confirmed_url(&context.csrf_token, &context.trans_id),
        );
        let response = self.gateway.request(context.request(request)?).await?;
        context.absorb_cookies(&response);

        let redirect = response
            .location()
            .and_then(|location| response.url.join(location).ok());
        let code = redirect
            .as_ref()
            .and_then(|url| query_value(url, "code"))
            .or_else(|| query_value(&response.url, "code"));

        match code {
            Some(code) => {
                context.authorization_code = Some(code);
                Ok(())
            }
            None => {
                let reason = redirect
                    .as_ref()
                    .and_then(|url| query_value(url, "error_description"))
                    .unwrap_or_else(|| {
                        format!("no code in redirect (status {})", response.status.as_u16())
                    });
                Err(AuthError::AuthorizationCodeMissing(reason))
            }
        }
    }

    async fn exchange_code(&self, context: &HandshakeContext) -> Result<TokenSet, AuthError> {
        let code = context
            .authorization_code
            .as_deref()
            .ok_or_else(|| AuthError::AuthorizationCodeMissing("code not received".to_string()))?;
        let redirect_uri = self.endpoints.redirect_uri();

        let request = HttpRequest::post_form(
            self.endpoints.token_url(),
            &[
                ("grant_type", "authorization_code"),
                ("client_id", self.endpoints.client_id()),
                ("redirect_uri", &redirect_uri),
                ("code", code),
                ("code_verifier", &context.pkce.code_verifier),
            ],
        );
        self.token_request(context.request(request)?).await
    }

    async fn token_request(&self, request: HttpRequest) -> Result<TokenSet, AuthError> {
        let response = self.gateway.request(request).await?;
        if !response.status.is_success() {
            return Err(AuthError::TokenExchangeFailed(format!(
                "token endpoint returned status {}",
                response.status.as_u16()
            )));
        }

        let body: TokenResponse = response
            .json()
            .map_err(|e| AuthError::TokenExchangeFailed(e.to_string()))?;
        let access_token = body
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AuthError::TokenExchangeFailed("response has no access_token".into()))?;
        let expires_at = body
            .expires_in
            .and_then(|e| e.seconds())
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| self.clock.now().checked_add_signed(lifetime));

        Ok(TokenSet {
            access_token,
            refresh_token: body.refresh_token,
            expires_at,
        })
    }
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}
