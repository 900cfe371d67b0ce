//! OAuth credential acquisition and persistence for the notifier.
//!
//! This crate provides everything the notification adapters need to obtain
//! bearer tokens for third-party APIs:
//!
//! - **OAuth 2.0 Authorization Code Flow** with PKCE (RFC 7636)
//! - **Device Authorization Grant** (RFC 8628)
//! - **Local callback server** for OAuth browser redirects
//! - **File-backed token persistence** with silent refresh
//!
//! The central abstraction is [`CredentialProvider`]: adapters ask it for a
//! valid access token and the provider decides between the cached token, a
//! refresh grant, or a fresh user-facing flow.
//!
//! # Architecture
//!
//! ```text
//! CredentialProvider
//! ├── GoogleInteractiveProvider    (authorization code + PKCE + callback)
//! ├── MicrosoftDeviceCodeProvider  (RFC 8628 device grant)
//! └── StaticTokenProvider          (pre-provisioned token)
//!         │
//!         └── TokenStore           (JSON file persistence)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use notifier_auth::{CredentialProvider, GoogleInteractiveProvider, OAuthConfig, TokenStore};
//!
//! # async fn example() -> notifier_auth::error::Result<()> {
//! let config = OAuthConfig::google_calendar(
//!     "my-client-id",
//!     "my-client-secret",
//!     "http://127.0.0.1:8411/callback",
//! );
//! let store = TokenStore::new("google_token.json");
//! let provider = GoogleInteractiveProvider::new(config, store);
//!
//! let token = provider.access_token().await?;
//! println!("bearer token: {token}");
//! # Ok(())
//! # }
//! ```

pub mod callback;
pub mod device_code;
pub mod error;
pub mod oauth;
pub mod provider;
pub mod token_store;

// Re-export key types at the crate root for convenience.
pub use callback::CallbackServer;
pub use device_code::{DeviceCodeConfig, DeviceCodeFlow, DeviceCodeResponse};
pub use error::{AuthError, Result};
pub use oauth::{OAuthConfig, OAuthFlow, OAuthTokens};
pub use provider::{
    CredentialProvider, GoogleInteractiveProvider, MicrosoftDeviceCodeProvider,
    StaticTokenProvider,
};
pub use token_store::TokenStore;
