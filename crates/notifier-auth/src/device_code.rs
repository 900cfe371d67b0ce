//! RFC 8628 Device Authorization Grant.
//!
//! The device grant lets a headless process authenticate a user without a
//! local browser redirect: the server hands out a short user code, the user
//! enters it on another device, and the client polls the token endpoint
//! until the grant completes. This is how the Microsoft To-Do adapter gets
//! its first token.

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};
use crate::oauth::OAuthTokens;

/// Scopes requested for Microsoft To-Do access. `offline_access` makes the
/// token endpoint return a refresh token.
const MICROSOFT_TODO_SCOPES: [&str; 2] = ["Tasks.ReadWrite", "offline_access"];

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for an OAuth 2.0 device authorization grant flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCodeConfig {
    /// The OAuth client ID.
    pub client_id: String,

    /// The device authorization endpoint URL.
    pub device_auth_url: String,

    /// The token endpoint URL.
    pub token_url: String,

    /// The scopes to request.
    pub scopes: Vec<String>,
}

impl DeviceCodeConfig {
    /// Configuration for Microsoft To-Do access through the given Entra
    /// tenant (`"common"` for multi-tenant/personal accounts).
    pub fn microsoft_todo(client_id: impl Into<String>, tenant: &str) -> Self {
        Self {
            client_id: client_id.into(),
            device_auth_url: format!(
                "https://login.microsoftonline.com/{tenant}/oauth2/v2.0/devicecode"
            ),
            token_url: format!("https://login.microsoftonline.com/{tenant}/oauth2/v2.0/token"),
            scopes: MICROSOFT_TODO_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Response from the device authorization endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCodeResponse {
    /// The device verification code.
    pub device_code: String,

    /// The end-user verification code to display to the user.
    pub user_code: String,

    /// The URI the user should visit to enter the code.
    pub verification_uri: String,

    /// Optional complete URI with the user code pre-filled.
    pub verification_uri_complete: Option<String>,

    /// Lifetime of the device_code and user_code in seconds.
    pub expires_in: u64,

    /// The minimum polling interval in seconds.
    pub interval: u64,
}

/// Raw device authorization response from the server.
///
/// Some servers use `verification_url` instead of `verification_uri`.
#[derive(Debug, Deserialize)]
struct RawDeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: Option<String>,
    verification_url: Option<String>,
    verification_uri_complete: Option<String>,
    expires_in: u64,
    #[serde(default = "default_interval")]
    interval: u64,
}

fn default_interval() -> u64 {
    5
}

/// Error response from the token endpoint during device code polling.
#[derive(Debug, Deserialize)]
struct PollErrorResponse {
    error: String,
    #[allow(dead_code)]
    error_description: Option<String>,
}

// ---------------------------------------------------------------------------
// Device code flow
// ---------------------------------------------------------------------------

/// Manages an RFC 8628 device authorization grant flow.
pub struct DeviceCodeFlow {
    config: DeviceCodeConfig,
    client: reqwest::Client,
}

impl DeviceCodeFlow {
    /// Create a new device code flow with the given configuration.
    pub fn new(config: DeviceCodeConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Request a device code from the authorization server.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NetworkError`] on transport failure, or
    /// [`AuthError::FlowFailed`] if the server returns an error.
    pub async fn request_device_code(&self) -> Result<DeviceCodeResponse> {
        let mut params = vec![("client_id", self.config.client_id.as_str())];

        let scopes_joined;
        if !self.config.scopes.is_empty() {
            scopes_joined = self.config.scopes.join(" ");
            params.push(("scope", &scopes_joined));
        }

        tracing::debug!(
            device_auth_url = %self.config.device_auth_url,
            "requesting device code"
        );

        let response = self
            .client
            .post(&self.config.device_auth_url)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::FlowFailed {
                reason: format!("device code request failed: HTTP {status}: {body}"),
            });
        }

        let raw: RawDeviceCodeResponse = response.json().await?;

        // Some providers use `verification_url` instead of `verification_uri`.
        let verification_uri = raw
            .verification_uri
            .or(raw.verification_url)
            .ok_or_else(|| AuthError::FlowFailed {
                reason: "device code response missing verification_uri".to_string(),
            })?;

        Ok(DeviceCodeResponse {
            device_code: raw.device_code,
            user_code: raw.user_code,
            verification_uri,
            verification_uri_complete: raw.verification_uri_complete,
            expires_in: raw.expires_in,
            interval: raw.interval,
        })
    }

    /// Poll the token endpoint until the user completes authorization.
    ///
    /// Polls every `interval` seconds (increasing on `slow_down` responses)
    /// and gives up after `timeout` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::FlowFailed`] if the user denies access or the
    /// device code expires, or [`AuthError::Timeout`] if `timeout` seconds
    /// elapse.
    pub async fn poll_for_token(
        &self,
        device_code: &str,
        interval: u64,
        timeout: u64,
    ) -> Result<OAuthTokens> {
        let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(timeout);
        let mut current_interval = interval;

        tracing::debug!(
            interval = current_interval,
            timeout = timeout,
            "polling for device code token"
        );

        loop {
            // Sleep before polling (first poll also waits).
            tokio::time::sleep(tokio::time::Duration::from_secs(current_interval)).await;

            if tokio::time::Instant::now() >= deadline {
                return Err(AuthError::Timeout {
                    timeout_secs: timeout,
                });
            }

            let params = [
                ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
                ("device_code", device_code),
                ("client_id", self.config.client_id.as_str()),
            ];

            let response = self
                .client
                .post(&self.config.token_url)
                .form(&params)
                .send()
                .await?;

            let status = response.status();

            if status.is_success() {
                let token: crate::oauth::TokenResponse = response.json().await?;
                tracing::info!("device code flow completed successfully");
                return Ok(token.into_tokens());
            }

            // Parse the error to decide whether to keep polling.
            let body = response.text().await.unwrap_or_default();

            let poll_error = serde_json::from_str::<PollErrorResponse>(&body).map_err(|_| {
                AuthError::FlowFailed {
                    reason: format!("unexpected token response: HTTP {status}: {body}"),
                }
            })?;

            match poll_error.error.as_str() {
                "authorization_pending" => {
                    tracing::trace!("authorization pending, will retry");
                }
                "slow_down" => {
                    // Increase interval by 5 seconds per RFC 8628 section 3.5.
                    current_interval += 5;
                    tracing::debug!(
                        new_interval = current_interval,
                        "slow_down received, increasing poll interval"
                    );
                }
                "access_denied" => {
                    return Err(AuthError::FlowFailed {
                        reason: "user denied authorization".to_string(),
                    });
                }
                "expired_token" => {
                    return Err(AuthError::FlowFailed {
                        reason: "device code expired before user completed authorization"
                            .to_string(),
                    });
                }
                other => {
                    return Err(AuthError::FlowFailed {
                        reason: format!("device code poll error: {other}"),
                    });
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn microsoft_config_uses_tenant() {
        let config = DeviceCodeConfig::microsoft_todo("client-abc", "common");
        assert_eq!(
            config.device_auth_url,
            "https://login.microsoftonline.com/common/oauth2/v2.0/devicecode"
        );
        assert_eq!(
            config.token_url,
            "https://login.microsoftonline.com/common/oauth2/v2.0/token"
        );
        assert_eq!(config.scopes, vec!["Tasks.ReadWrite", "offline_access"]);
    }

    #[test]
    fn microsoft_config_custom_tenant() {
        let config = DeviceCodeConfig::microsoft_todo("client-abc", "contoso.example");
        assert!(config.device_auth_url.contains("/contoso.example/"));
        assert!(config.token_url.contains("/contoso.example/"));
    }

    #[test]
    fn device_code_response_parsing() {
        let json = r#"{
            "device_code": "dev_code_123",
            "user_code": "ABCD-1234",
            "verification_uri": "https://microsoft.com/devicelogin",
            "verification_uri_complete": "https://microsoft.com/devicelogin?otc=ABCD-1234",
            "expires_in": 900,
            "interval": 5
        }"#;

        let raw: RawDeviceCodeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(raw.device_code, "dev_code_123");
        assert_eq!(raw.user_code, "ABCD-1234");
        assert_eq!(
            raw.verification_uri.as_deref(),
            Some("https://microsoft.com/devicelogin")
        );
        assert!(raw.verification_uri_complete.is_some());
        assert_eq!(raw.expires_in, 900);
        assert_eq!(raw.interval, 5);
    }

    #[test]
    fn device_code_response_with_verification_url() {
        // Some providers use `verification_url` instead of `verification_uri`.
        let json = r#"{
            "device_code": "dev_xyz",
            "user_code": "WXYZ",
            "verification_url": "https://example.com/device",
            "expires_in": 600,
            "interval": 10
        }"#;

        let raw: RawDeviceCodeResponse = serde_json::from_str(json).unwrap();
        assert!(raw.verification_uri.is_none());
        assert_eq!(
            raw.verification_url.as_deref(),
            Some("https://example.com/device")
        );
    }

    #[test]
    fn device_code_response_default_interval() {
        let json = r#"{
            "device_code": "dev_abc",
            "user_code": "TEST",
            "verification_uri": "https://example.com/device",
            "expires_in": 300
        }"#;

        let raw: RawDeviceCodeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(raw.interval, 5);
    }

    #[test]
    fn poll_error_response_parsing() {
        let json = r#"{
            "error": "authorization_pending",
            "error_description": "User has not yet authorized"
        }"#;

        let err: PollErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(err.error, "authorization_pending");
    }

    #[test]
    fn poll_error_variants_parse() {
        for variant in ["slow_down", "access_denied", "expired_token"] {
            let json = format!(r#"{{ "error": "{variant}" }}"#);
            let err: PollErrorResponse = serde_json::from_str(&json).unwrap();
            assert_eq!(err.error, variant);
        }
    }

    #[tokio::test]
    async fn request_device_code_against_stub() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/devicecode")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "device_code": "dev_1",
                    "user_code": "AB12CD34",
                    "verification_uri": "https://microsoft.com/devicelogin",
                    "expires_in": 900,
                    "interval": 5
                }"#,
            )
            .create_async()
            .await;

        let config = DeviceCodeConfig {
            client_id: "cid".to_string(),
            device_auth_url: format!("{}/devicecode", server.url()),
            token_url: format!("{}/token", server.url()),
            scopes: vec!["Tasks.ReadWrite".to_string()],
        };

        let flow = DeviceCodeFlow::new(config);
        let response = flow.request_device_code().await.unwrap();
        assert_eq!(response.user_code, "AB12CD34");
        assert_eq!(response.interval, 5);
    }

    #[test]
    fn device_code_flow_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DeviceCodeFlow>();
        assert_send_sync::<DeviceCodeConfig>();
        assert_send_sync::<DeviceCodeResponse>();
    }
}
