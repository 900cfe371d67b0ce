//! Notification adapters for the notifier server.
//!
//! Each adapter wraps one external service behind the common [`Adapter`]
//! trait:
//!
//! - [`EmailAdapter`] -- sends mail through an SMTP relay (STARTTLS).
//! - [`CalendarAdapter`] -- event CRUD on the Google Calendar API.
//! - [`TodoAdapter`] -- task CRUD on the Microsoft Graph To-Do API.
//!
//! Adapters are configured from the environment ([`config`]) and obtain
//! access tokens from injected `notifier_auth` credential providers, so a
//! single process can host several instances with independent accounts.
//!
//! Tool results follow one contract: operational failures (network, API
//! rejections, missing configuration) are reported as
//! `{"success": false, "error": ...}` payloads, while malformed parameters
//! and unknown tool names are the only typed errors.

pub mod calendar;
pub mod config;
pub mod datetime;
pub mod email;
pub mod error;
pub mod tasks;
pub mod traits;

pub use calendar::CalendarAdapter;
pub use config::{GoogleCalendarConfig, MsTodoConfig, SmtpConfig};
pub use datetime::normalize_datetime;
pub use email::EmailAdapter;
pub use error::{AdapterError, Result};
pub use tasks::TodoAdapter;
pub use traits::{Adapter, AdapterType, AuthRequirement, HealthStatus, ToolDefinition};
