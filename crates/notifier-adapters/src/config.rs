//! Environment-based adapter configuration.
//!
//! Each adapter has a small config struct loaded from environment
//! variables (the binary loads `.env` via `dotenvy` first). Missing
//! credentials are not an error at load time; the adapters report them
//! through their tool results when an operation actually needs them.

use std::env;

/// Default SMTP relay host.
const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

/// Default SMTP submission port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default Google Calendar identifier.
const DEFAULT_CALENDAR_ID: &str = "primary";

/// Default timezone applied to event datetimes.
const DEFAULT_TIMEZONE: &str = "Europe/Brussels";

/// Default Entra tenant for the Microsoft device-code flow.
const DEFAULT_MS_TENANT: &str = "common";

/// Default on-disk location of the Microsoft token cache.
const DEFAULT_MS_TOKEN_FILE: &str = "ms_token_cache.json";

/// Default on-disk location of the Google token file.
const DEFAULT_GOOGLE_TOKEN_FILE: &str = "google_token.json";

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// SMTP
// ---------------------------------------------------------------------------

/// SMTP connection and identity settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// Relay hostname.
    pub host: String,
    /// Submission port; 587 implies STARTTLS.
    pub port: u16,
    /// Account username. `None` until configured.
    pub username: Option<String>,
    /// Account password (typically an app password). `None` until configured.
    pub password: Option<String>,
    /// Default From address; falls back to the username.
    pub from_email: Option<String>,
}

impl SmtpConfig {
    /// Load from `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`,
    /// and `DEFAULT_FROM_EMAIL`.
    pub fn from_env() -> Self {
        let username = env_var("SMTP_USERNAME");
        let from_email = env_var("DEFAULT_FROM_EMAIL").or_else(|| username.clone());

        Self {
            host: env_var("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            port: env_var("SMTP_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            username,
            password: env_var("SMTP_PASSWORD"),
            from_email,
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SMTP_HOST.to_string(),
            port: DEFAULT_SMTP_PORT,
            username: None,
            password: None,
            from_email: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Google Calendar
// ---------------------------------------------------------------------------

/// Google Calendar OAuth client and defaults.
#[derive(Debug, Clone)]
pub struct GoogleCalendarConfig {
    /// OAuth client id.
    pub client_id: Option<String>,
    /// OAuth client secret.
    pub client_secret: Option<String>,
    /// Where the Google token is persisted.
    pub token_file: String,
    /// Calendar used when a call does not specify one.
    pub default_calendar_id: String,
    /// Timezone applied to normalized event datetimes.
    pub default_timezone: String,
}

impl GoogleCalendarConfig {
    /// Load from `GOOGLE_CALENDAR_CLIENT_ID`, `GOOGLE_CALENDAR_CLIENT_SECRET`,
    /// `GOOGLE_CALENDAR_TOKEN_FILE`, `DEFAULT_CALENDAR_ID`, and
    /// `DEFAULT_TIMEZONE`.
    pub fn from_env() -> Self {
        Self {
            client_id: env_var("GOOGLE_CALENDAR_CLIENT_ID"),
            client_secret: env_var("GOOGLE_CALENDAR_CLIENT_SECRET"),
            token_file: env_var("GOOGLE_CALENDAR_TOKEN_FILE")
                .unwrap_or_else(|| DEFAULT_GOOGLE_TOKEN_FILE.to_string()),
            default_calendar_id: env_var("DEFAULT_CALENDAR_ID")
                .unwrap_or_else(|| DEFAULT_CALENDAR_ID.to_string()),
            default_timezone: env_var("DEFAULT_TIMEZONE")
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
        }
    }
}

impl Default for GoogleCalendarConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            token_file: DEFAULT_GOOGLE_TOKEN_FILE.to_string(),
            default_calendar_id: DEFAULT_CALENDAR_ID.to_string(),
            default_timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Microsoft To-Do
// ---------------------------------------------------------------------------

/// Microsoft To-Do OAuth client and defaults.
#[derive(Debug, Clone)]
pub struct MsTodoConfig {
    /// Entra application (client) id.
    pub client_id: Option<String>,
    /// Entra tenant; "common" accepts personal and work accounts.
    pub tenant_id: String,
    /// Where the Microsoft token cache is persisted.
    pub token_file: String,
    /// Task list used when a call does not specify one. When unset, the
    /// first list returned by the API is used.
    pub default_list_id: Option<String>,
}

impl MsTodoConfig {
    /// Load from `MS_TODO_CLIENT_ID`, `MS_TODO_TENANT_ID`,
    /// `MS_TODO_TOKEN_FILE`, and `MS_TODO_DEFAULT_LIST_ID`.
    pub fn from_env() -> Self {
        Self {
            client_id: env_var("MS_TODO_CLIENT_ID"),
            tenant_id: env_var("MS_TODO_TENANT_ID")
                .unwrap_or_else(|| DEFAULT_MS_TENANT.to_string()),
            token_file: env_var("MS_TODO_TOKEN_FILE")
                .unwrap_or_else(|| DEFAULT_MS_TOKEN_FILE.to_string()),
            default_list_id: env_var("MS_TODO_DEFAULT_LIST_ID"),
        }
    }
}

impl Default for MsTodoConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            tenant_id: DEFAULT_MS_TENANT.to_string(),
            token_file: DEFAULT_MS_TOKEN_FILE.to_string(),
            default_list_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
