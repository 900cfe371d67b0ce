//! Credential providers.
//!
//! A [`CredentialProvider`] turns "I need a bearer token now" into whatever
//! acquisition work is required: returning a cached token, refreshing an
//! expired one, or running a full interactive flow and persisting the
//! result. Adapters hold an `Arc<dyn CredentialProvider>` and never see the
//! flow details, so the same adapter works with an interactive browser
//! flow, a device-code flow, or a fixed token in tests.
//!
//! Each provider instance owns its token state behind a [`tokio::sync::Mutex`];
//! concurrent callers on one provider serialize token acquisition instead of
//! racing through duplicate flows.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::callback::CallbackServer;
use crate::device_code::{DeviceCodeConfig, DeviceCodeFlow};
use crate::error::{AuthError, Result};
use crate::oauth::{OAuthConfig, OAuthFlow, OAuthTokens, generate_pkce_verifier, pkce_challenge};
use crate::token_store::TokenStore;

/// Default port for the local OAuth callback server.
pub const DEFAULT_CALLBACK_PORT: u16 = 8411;

/// Default timeout for the callback server in seconds (5 minutes).
const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 300;

/// Default timeout for device code polling in seconds (15 minutes).
const DEFAULT_DEVICE_CODE_TIMEOUT_SECS: u64 = 900;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A source of bearer tokens for one remote service.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// A short identifier for logging ("google", "microsoft", ...).
    fn name(&self) -> &str;

    /// Return a currently-valid access token, acquiring or refreshing one
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is available and acquisition fails
    /// (network failure, user denial, timeout, rejected grant).
    async fn access_token(&self) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Static provider
// ---------------------------------------------------------------------------

/// A provider that always returns the same pre-provisioned token.
///
/// Useful when a token is supplied out-of-band (CI, tests, a service
/// account fronted by an external refresher).
pub struct StaticTokenProvider {
    name: String,
    token: String,
}

impl StaticTokenProvider {
    /// Create a provider that hands out `token` unconditionally.
    pub fn new(name: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticTokenProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

// ---------------------------------------------------------------------------
// Google interactive provider
// ---------------------------------------------------------------------------

/// Acquires Google tokens through the authorization code flow.
///
/// Token resolution order on each call:
///
/// 1. in-memory token, if still valid
/// 2. persisted token from the [`TokenStore`], if still valid
/// 3. refresh grant, when a refresh token is available
/// 4. full interactive consent flow (browser + local callback)
///
/// Whatever succeeds is cached in memory and persisted for the next
/// process.
pub struct GoogleInteractiveProvider {
    config: OAuthConfig,
    store: TokenStore,
    cached: Mutex<Option<OAuthTokens>>,
    callback_port: u16,
    callback_timeout_secs: u64,
}

impl GoogleInteractiveProvider {
    /// Create a provider with the given OAuth configuration and token file.
    ///
    /// The callback listener port is derived from the configured
    /// `redirect_uri` when possible, falling back to
    /// [`DEFAULT_CALLBACK_PORT`].
    pub fn new(config: OAuthConfig, store: TokenStore) -> Self {
        let callback_port = url::Url::parse(&config.redirect_uri)
            .ok()
            .and_then(|u| u.port())
            .unwrap_or(DEFAULT_CALLBACK_PORT);

        Self {
            config,
            store,
            cached: Mutex::new(None),
            callback_port,
            callback_timeout_secs: DEFAULT_CALLBACK_TIMEOUT_SECS,
        }
    }

    /// Override the callback timeout (mainly for tests).
    pub fn with_callback_timeout(mut self, secs: u64) -> Self {
        self.callback_timeout_secs = secs;
        self
    }

    /// Run the full interactive consent flow.
    ///
    /// Generates the PKCE pair and a CSRF state, logs the authorization URL
    /// for the user to open, waits on the local callback, verifies the
    /// state, and exchanges the code for tokens.
    async fn interactive_flow(&self, flow: &OAuthFlow) -> Result<OAuthTokens> {
        let code_verifier = generate_pkce_verifier()?;
        let code_challenge = pkce_challenge(&code_verifier);
        let state = uuid::Uuid::now_v7().to_string();

        let auth_url = flow.authorization_url(&state, &code_challenge)?;

        tracing::info!(
            url = %auth_url,
            "open this URL in your browser to authorize Google Calendar access"
        );

        let (code, returned_state) =
            CallbackServer::start(self.callback_port, self.callback_timeout_secs).await?;

        if returned_state != state {
            return Err(AuthError::FlowFailed {
                reason: format!("state mismatch: expected {state}, got {returned_state}"),
            });
        }

        flow.exchange_code(&code, &code_verifier).await
    }
}

#[async_trait]
impl CredentialProvider for GoogleInteractiveProvider {
    fn name(&self) -> &str {
        "google"
    }

    async fn access_token(&self) -> Result<String> {
        // Hold the lock for the whole acquisition so concurrent callers do
        // not start duplicate flows.
        let mut cached = self.cached.lock().await;

        if cached.is_none() {
            *cached = self.store.load().await;
        }

        if let Some(tokens) = cached.as_ref()
            && !OAuthFlow::is_expired(tokens)
        {
            return Ok(tokens.access_token.clone());
        }

        let flow = OAuthFlow::new(self.config.clone());

        // Try a refresh grant before falling back to user interaction.
        if let Some(refresh) = cached.as_ref().and_then(|t| t.refresh_token.clone()) {
            match flow.refresh_token(&refresh).await {
                Ok(mut tokens) => {
                    // Google omits the refresh token on refresh responses.
                    if tokens.refresh_token.is_none() {
                        tokens.refresh_token = Some(refresh);
                    }
                    self.store.save(&tokens).await?;
                    let access = tokens.access_token.clone();
                    *cached = Some(tokens);
                    tracing::info!(provider = self.name(), "access token refreshed");
                    return Ok(access);
                }
                Err(e) => {
                    tracing::warn!(
                        provider = self.name(),
                        error = %e,
                        "token refresh failed, falling back to interactive flow"
                    );
                }
            }
        }

        let tokens = self.interactive_flow(&flow).await?;
        self.store.save(&tokens).await?;
        let access = tokens.access_token.clone();
        *cached = Some(tokens);

        tracing::info!(provider = self.name(), "interactive authorization completed");
        Ok(access)
    }
}

// ---------------------------------------------------------------------------
// Microsoft device code provider
// ---------------------------------------------------------------------------

/// Acquires Microsoft Graph tokens through the device authorization grant.
///
/// Resolution order mirrors [`GoogleInteractiveProvider`]: memory, disk,
/// refresh grant, then a fresh device-code flow whose user code and
/// verification URI are surfaced through the log for out-of-band
/// completion.
pub struct MicrosoftDeviceCodeProvider {
    config: DeviceCodeConfig,
    store: TokenStore,
    cached: Mutex<Option<OAuthTokens>>,
    poll_timeout_secs: u64,
}

impl MicrosoftDeviceCodeProvider {
    /// Create a provider with the given device-code configuration and
    /// token cache file.
    pub fn new(config: DeviceCodeConfig, store: TokenStore) -> Self {
        Self {
            config,
            store,
            cached: Mutex::new(None),
            poll_timeout_secs: DEFAULT_DEVICE_CODE_TIMEOUT_SECS,
        }
    }

    /// Override the device-code poll timeout (mainly for tests).
    pub fn with_poll_timeout(mut self, secs: u64) -> Self {
        self.poll_timeout_secs = secs;
        self
    }

    /// The token endpoint also serves refresh grants; reuse the OAuth flow
    /// machinery for those.
    fn refresh_flow(&self) -> OAuthFlow {
        OAuthFlow::new(OAuthConfig {
            client_id: self.config.client_id.clone(),
            client_secret: None,
            auth_url: String::new(),
            token_url: self.config.token_url.clone(),
            redirect_uri: String::new(),
            scopes: self.config.scopes.clone(),
        })
    }

    /// Run a full device-code flow.
    async fn device_flow(&self) -> Result<OAuthTokens> {
        let flow = DeviceCodeFlow::new(self.config.clone());
        let device = flow.request_device_code().await?;

        tracing::info!(
            user_code = %device.user_code,
            verification_uri = %device.verification_uri,
            "enter this code at the URL shown to authorize Microsoft To-Do access"
        );

        if let Some(ref complete_uri) = device.verification_uri_complete {
            tracing::info!(url = %complete_uri, "or open this URL directly");
        }

        flow.poll_for_token(&device.device_code, device.interval, self.poll_timeout_secs)
            .await
    }
}

#[async_trait]
impl CredentialProvider for MicrosoftDeviceCodeProvider {
    fn name(&self) -> &str {
        "microsoft"
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if cached.is_none() {
            *cached = self.store.load().await;
        }

        if let Some(tokens) = cached.as_ref()
            && !OAuthFlow::is_expired(tokens)
        {
            return Ok(tokens.access_token.clone());
        }

        if let Some(refresh) = cached.as_ref().and_then(|t| t.refresh_token.clone()) {
            match self.refresh_flow().refresh_token(&refresh).await {
                Ok(mut tokens) => {
                    if tokens.refresh_token.is_none() {
                        tokens.refresh_token = Some(refresh);
                    }
                    self.store.save(&tokens).await?;
                    let access = tokens.access_token.clone();
                    *cached = Some(tokens);
                    tracing::info!(provider = self.name(), "access token refreshed silently");
                    return Ok(access);
                }
                Err(e) => {
                    tracing::warn!(
                        provider = self.name(),
                        error = %e,
                        "silent token acquisition failed, starting device code flow"
                    );
                }
            }
        }

        let tokens = self.device_flow().await?;
        self.store.save(&tokens).await?;
        let access = tokens.access_token.clone();
        *cached = Some(tokens);

        tracing::info!(provider = self.name(), "device code authorization completed");
        Ok(access)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_tokens() -> OAuthTokens {
        OAuthTokens {
            access_token: "cached_access".to_string(),
            refresh_token: Some("cached_refresh".to_string()),
            expires_at: Some(chrono::Utc::now().timestamp() + 3600),
            token_type: "Bearer".to_string(),
            scopes: vec![],
        }
    }

    fn expired_tokens() -> OAuthTokens {
        OAuthTokens {
            access_token: "stale_access".to_string(),
            refresh_token: Some("stale_refresh".to_string()),
            expires_at: Some(chrono::Utc::now().timestamp() - 100),
            token_type: "Bearer".to_string(),
            scopes: vec![],
        }
    }

    #[tokio::test]
    async fn static_provider_returns_token() {
        let provider = StaticTokenProvider::new("test", "fixed_token");
        assert_eq!(provider.name(), "test");
        assert_eq!(provider.access_token().await.unwrap(), "fixed_token");
    }

    #[tokio::test]
    async fn google_provider_uses_persisted_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("google.json"));
        store.save(&valid_tokens()).await.unwrap();

        let config =
            OAuthConfig::google_calendar("cid", "secret", "http://127.0.0.1:8411/callback");
        let provider = GoogleInteractiveProvider::new(config, store);

        let token = provider.access_token().await.unwrap();
        assert_eq!(token, "cached_access");
    }

    #[tokio::test]
    async fn google_provider_refreshes_expired_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("google.json"));
        store.save(&expired_tokens()).await.unwrap();

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"refreshed_access","expires_in":3600}"#)
            .create_async()
            .await;

        let mut config =
            OAuthConfig::google_calendar("cid", "secret", "http://127.0.0.1:8411/callback");
        config.token_url = format!("{}/token", server.url());

        let provider = GoogleInteractiveProvider::new(config, store.clone());
        let token = provider.access_token().await.unwrap();
        assert_eq!(token, "refreshed_access");
        mock.assert_async().await;

        // The refreshed token is persisted and keeps the old refresh token.
        let persisted = store.load().await.unwrap();
        assert_eq!(persisted.access_token, "refreshed_access");
        assert_eq!(persisted.refresh_token.as_deref(), Some("stale_refresh"));
    }

    #[tokio::test]
    async fn google_provider_caches_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("google.json"));
        store.save(&valid_tokens()).await.unwrap();

        let config =
            OAuthConfig::google_calendar("cid", "secret", "http://127.0.0.1:8411/callback");
        let provider = GoogleInteractiveProvider::new(config, store.clone());

        provider.access_token().await.unwrap();

        // Wipe the file; the in-memory cache still serves the token.
        store.clear().await.unwrap();
        let token = provider.access_token().await.unwrap();
        assert_eq!(token, "cached_access");
    }

    #[tokio::test]
    async fn microsoft_provider_uses_persisted_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("ms_token_cache.json"));
        store.save(&valid_tokens()).await.unwrap();

        let config = DeviceCodeConfig::microsoft_todo("cid", "common");
        let provider = MicrosoftDeviceCodeProvider::new(config, store);

        let token = provider.access_token().await.unwrap();
        assert_eq!(token, "cached_access");
    }

    #[tokio::test]
    async fn microsoft_provider_refreshes_silently() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("ms_token_cache.json"));
        store.save(&expired_tokens()).await.unwrap();

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"access_token":"silent_access","refresh_token":"new_refresh","expires_in":3600}"#,
            )
            .create_async()
            .await;

        let mut config = DeviceCodeConfig::microsoft_todo("cid", "common");
        config.token_url = format!("{}/token", server.url());

        let provider = MicrosoftDeviceCodeProvider::new(config, store.clone());
        let token = provider.access_token().await.unwrap();
        assert_eq!(token, "silent_access");
        mock.assert_async().await;

        let persisted = store.load().await.unwrap();
        assert_eq!(persisted.refresh_token.as_deref(), Some("new_refresh"));
    }

    #[test]
    fn callback_port_derived_from_redirect_uri() {
        let config =
            OAuthConfig::google_calendar("cid", "secret", "http://127.0.0.1:9999/callback");
        let provider = GoogleInteractiveProvider::new(config, TokenStore::new("unused.json"));
        assert_eq!(provider.callback_port, 9999);
    }

    #[test]
    fn callback_port_falls_back_to_default() {
        let config = OAuthConfig::google_calendar("cid", "secret", "not a url");
        let provider = GoogleInteractiveProvider::new(config, TokenStore::new("unused.json"));
        assert_eq!(provider.callback_port, DEFAULT_CALLBACK_PORT);
    }

    #[test]
    fn providers_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StaticTokenProvider>();
        assert_send_sync::<GoogleInteractiveProvider>();
        assert_send_sync::<MicrosoftDeviceCodeProvider>();
    }
}
