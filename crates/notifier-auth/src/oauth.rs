//! OAuth 2.0 authorization code flow with PKCE.
//!
//! Implements the RFC 6749 authorization code grant with RFC 7636 Proof Key
//! for Code Exchange. PKCE is always on, so the same machinery works for
//! public and confidential clients alike.
//!
//! The flow is split into small pieces: [`generate_pkce_verifier`] and
//! [`pkce_challenge`] produce the PKCE pair, [`OAuthFlow::authorization_url`]
//! builds the consent URL, and [`OAuthFlow::exchange_code`] /
//! [`OAuthFlow::refresh_token`] talk to the token endpoint. Higher-level
//! orchestration lives in [`crate::provider`].

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AuthError, Result};

/// Length of the PKCE code verifier in bytes (before base64 encoding).
const PKCE_VERIFIER_BYTES: usize = 32;

/// Google's OAuth authorization endpoint.
///
/// `access_type=offline` and `prompt=consent` are baked into the query so
/// Google issues a refresh token on every consent; extra query parameters
/// are preserved by [`OAuthFlow::authorization_url`].
const GOOGLE_AUTH_URL: &str =
    "https://accounts.google.com/o/oauth2/auth?access_type=offline&prompt=consent";

/// Google's OAuth token endpoint.
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scope granting full read/write access to Google Calendar.
const GOOGLE_CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for an OAuth 2.0 authorization code flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// The OAuth client ID.
    pub client_id: String,

    /// The OAuth client secret (confidential clients only).
    pub client_secret: Option<String>,

    /// The authorization endpoint URL.
    pub auth_url: String,

    /// The token endpoint URL.
    pub token_url: String,

    /// The redirect URI registered with the authorization server.
    pub redirect_uri: String,

    /// The scopes to request.
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    /// Configuration for Google Calendar access.
    ///
    /// Requests the full calendar scope and a refresh token. The
    /// `redirect_uri` must point at the local callback listener, e.g.
    /// `http://127.0.0.1:8411/callback`.
    pub fn google_calendar(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Some(client_secret.into()),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            redirect_uri: redirect_uri.into(),
            scopes: vec![GOOGLE_CALENDAR_SCOPE.to_string()],
        }
    }
}

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

/// Tokens returned by the authorization server after a successful grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    /// The access token used to authenticate API requests.
    pub access_token: String,

    /// The refresh token used to obtain new access tokens.
    pub refresh_token: Option<String>,

    /// Unix timestamp (seconds) when the access token expires.
    pub expires_at: Option<i64>,

    /// The token type (typically "Bearer").
    pub token_type: String,

    /// The scopes that were granted.
    pub scopes: Vec<String>,
}

/// Raw token response from the authorization server.
///
/// The JSON shape shared by the token endpoints of Google, Microsoft, and
/// most other providers. Parsed internally and converted to [`OAuthTokens`].
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    token_type: Option<String>,
    scope: Option<String>,
}

impl TokenResponse {
    /// Convert into [`OAuthTokens`], computing `expires_at` from `expires_in`.
    pub(crate) fn into_tokens(self) -> OAuthTokens {
        let expires_at = self
            .expires_in
            .map(|secs| chrono::Utc::now().timestamp() + secs);

        let scopes = self
            .scope
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or_default();

        OAuthTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scopes,
        }
    }
}

/// Raw error response from the authorization server.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

// ---------------------------------------------------------------------------
// PKCE helpers
// ---------------------------------------------------------------------------

/// Generate a PKCE code verifier (random 32 bytes, base64url encoded).
///
/// # Errors
///
/// Returns an error if the system CSPRNG fails.
pub fn generate_pkce_verifier() -> Result<String> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; PKCE_VERIFIER_BYTES];
    rng.fill(&mut bytes).map_err(|_| AuthError::FlowFailed {
        reason: "failed to generate PKCE verifier: CSPRNG error".to_string(),
    })?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Derive the PKCE code challenge from a code verifier using SHA-256.
///
/// `challenge = BASE64URL(SHA256(verifier))`
pub fn pkce_challenge(verifier: &str) -> String {
    let hash = digest::digest(&digest::SHA256, verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash.as_ref())
}

// ---------------------------------------------------------------------------
// OAuth flow
// ---------------------------------------------------------------------------

/// Manages the HTTP side of an authorization code flow.
///
/// Stateless: the PKCE verifier and CSRF state are passed explicitly, so a
/// single flow instance can serve concurrent authorizations.
pub struct OAuthFlow {
    config: OAuthConfig,
    client: reqwest::Client,
}

impl OAuthFlow {
    /// Create a new OAuth flow with the given configuration.
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Build the authorization URL the user should visit.
    ///
    /// Appends the PKCE `code_challenge` (S256) and a `state` parameter for
    /// CSRF protection. Query parameters already present on the configured
    /// `auth_url` are preserved.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UrlParse`] if the configured `auth_url` is not a
    /// valid URL.
    pub fn authorization_url(&self, state: &str, code_challenge: &str) -> Result<String> {
        let mut url = Url::parse(&self.config.auth_url)?;

        {
            let mut params = url.query_pairs_mut();
            params.append_pair("response_type", "code");
            params.append_pair("client_id", &self.config.client_id);
            params.append_pair("redirect_uri", &self.config.redirect_uri);
            params.append_pair("state", state);
            params.append_pair("code_challenge", code_challenge);
            params.append_pair("code_challenge_method", "S256");

            if !self.config.scopes.is_empty() {
                params.append_pair("scope", &self.config.scopes.join(" "));
            }
        }

        Ok(url.to_string())
    }

    /// Exchange an authorization code for tokens.
    ///
    /// `code_verifier` must be the verifier whose challenge was sent in the
    /// authorization URL.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidGrant`] if the server rejects the code,
    /// or [`AuthError::NetworkError`] on transport failure.
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<OAuthTokens> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", code_verifier),
        ];

        let secret_binding;
        if let Some(ref secret) = self.config.client_secret {
            secret_binding = secret.clone();
            params.push(("client_secret", &secret_binding));
        }

        tracing::debug!(token_url = %self.config.token_url, "exchanging authorization code");

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await?;

        Self::parse_token_response(response).await
    }

    /// Refresh an access token using a refresh token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidGrant`] if the refresh token is invalid or
    /// revoked.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<OAuthTokens> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];

        let scopes_joined;
        if !self.config.scopes.is_empty() {
            // Microsoft requires the scope parameter on refresh grants;
            // Google ignores it.
            scopes_joined = self.config.scopes.join(" ");
            params.push(("scope", &scopes_joined));
        }

        let secret_binding;
        if let Some(ref secret) = self.config.client_secret {
            secret_binding = secret.clone();
            params.push(("client_secret", &secret_binding));
        }

        tracing::debug!(token_url = %self.config.token_url, "refreshing access token");

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await?;

        Self::parse_token_response(response).await
    }

    /// Check whether the given tokens are expired.
    ///
    /// Returns `true` if the tokens carry an `expires_at` timestamp that is
    /// in the past, with a 60-second safety margin so a token is never used
    /// right at the edge of its lifetime.
    pub fn is_expired(tokens: &OAuthTokens) -> bool {
        match tokens.expires_at {
            Some(expires_at) => {
                let now = chrono::Utc::now().timestamp();
                now >= (expires_at - 60)
            }
            // No expiry info means we assume the token is valid.
            None => false,
        }
    }

    /// Parse the HTTP response from the token endpoint.
    async fn parse_token_response(response: reqwest::Response) -> Result<OAuthTokens> {
        let status = response.status();

        if status.is_success() {
            let token_response: TokenResponse = response.json().await?;
            tracing::debug!("token endpoint returned a token");
            Ok(token_response.into_tokens())
        } else {
            let body = response.text().await.unwrap_or_default();

            if let Ok(error_response) = serde_json::from_str::<TokenErrorResponse>(&body) {
                let reason = error_response
                    .error_description
                    .unwrap_or(error_response.error);
                Err(AuthError::InvalidGrant { reason })
            } else {
                Err(AuthError::InvalidGrant {
                    reason: format!("HTTP {status}: {body}"),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
