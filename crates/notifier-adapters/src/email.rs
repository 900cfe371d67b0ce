//! Email adapter -- send notification emails over raw SMTP.
//!
//! One tool, `send_email`, delivers a message through a STARTTLS SMTP
//! relay (port 587 by default). The wire conversation is built from small
//! pure command builders so each piece stays testable without a server:
//! plain TCP connect, EHLO, STARTTLS, TLS handshake, EHLO again,
//! AUTH LOGIN, MAIL FROM, one RCPT TO per envelope recipient, DATA, QUIT.
//!
//! Transport and authentication failures never escape the tool: they come
//! back as a `{"success": false, "error": ...}` payload so the caller gets
//! one uniform result shape. Only invalid parameters are typed errors.

use async_trait::async_trait;
use rustls::ClientConfig;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};

use crate::config::SmtpConfig;
use crate::error::{AdapterError, Result};
use crate::traits::{Adapter, AdapterType, AuthRequirement, HealthStatus, ToolDefinition};

/// Connection and per-response timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Client name announced in EHLO.
const EHLO_DOMAIN: &str = "notifier.local";

// ---------------------------------------------------------------------------
// SMTP command builders (pure functions, testable)
// ---------------------------------------------------------------------------

/// Build an SMTP EHLO command.
pub fn smtp_ehlo_command(domain: &str) -> String {
    format!("EHLO {domain}\r\n")
}

/// Build an SMTP STARTTLS command.
pub fn smtp_starttls_command() -> String {
    "STARTTLS\r\n".to_string()
}

/// Build an SMTP AUTH LOGIN command.
pub fn smtp_auth_login_command() -> String {
    "AUTH LOGIN\r\n".to_string()
}

/// Encode a string to base64 for SMTP AUTH.
pub fn smtp_base64_encode(input: &str) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(input)
}

/// Build an SMTP MAIL FROM command.
pub fn smtp_mail_from_command(from: &str) -> String {
    format!("MAIL FROM:<{from}>\r\n")
}

/// Build an SMTP RCPT TO command.
pub fn smtp_rcpt_to_command(to: &str) -> String {
    format!("RCPT TO:<{to}>\r\n")
}

/// Build an SMTP DATA command.
pub fn smtp_data_command() -> String {
    "DATA\r\n".to_string()
}

/// Build an SMTP QUIT command.
pub fn smtp_quit_command() -> String {
    "QUIT\r\n".to_string()
}

/// Build the full MIME message sent after DATA, terminated with the SMTP
/// end-of-data marker.
///
/// Only From, To, and Cc appear as headers; Bcc recipients exist solely in
/// the envelope. The body is `text/html` when `html` is set, `text/plain`
/// otherwise.
pub fn build_mime_message(
    from: &str,
    to: &[String],
    cc: &[String],
    subject: &str,
    body: &str,
    html: bool,
) -> String {
    let content_type = if html { "text/html" } else { "text/plain" };

    let mut message = String::with_capacity(body.len() + 256);
    message.push_str(&format!("From: {from}\r\n"));
    message.push_str(&format!("To: {}\r\n", to.join(", ")));
    if !cc.is_empty() {
        message.push_str(&format!("Cc: {}\r\n", cc.join(", ")));
    }
    message.push_str(&format!("Subject: {subject}\r\n"));
    message.push_str("MIME-Version: 1.0\r\n");
    message.push_str(&format!(
        "Content-Type: {content_type}; charset=UTF-8\r\n"
    ));
    message.push_str("\r\n");
    message.push_str(body);
    message.push_str("\r\n.\r\n");
    message
}

// ---------------------------------------------------------------------------
// Recipient normalization
// ---------------------------------------------------------------------------

/// Normalize a recipient parameter to a list of addresses.
///
/// Accepts a single string or an array of strings; `"a@x"` and `["a@x"]`
/// produce the same envelope. Returns `None` for missing or ill-typed
/// values (including arrays containing non-strings).
pub fn normalize_recipients(value: Option<&Value>) -> Option<Vec<String>> {
    match value {
        Some(Value::String(s)) => Some(vec![s.clone()]),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(item.as_str()?.to_string());
            }
            Some(out)
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// SMTP response handling
// ---------------------------------------------------------------------------

/// Read an SMTP response (one or more lines) until the final status line.
///
/// SMTP multi-line responses use "NNN-text" for continuation lines and
/// "NNN text" for the final line.
async fn smtp_read_response<R>(reader: &mut R) -> Result<(u16, Vec<String>)>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(CONNECT_TIMEOUT_SECS);

    loop {
        let mut line = String::new();
        let read_result = tokio::time::timeout_at(deadline, reader.read_line(&mut line)).await;

        match read_result {
            Ok(Ok(0)) => break,
            Ok(Ok(_)) => {
                let trimmed = line.trim().to_string();
                debug!(smtp_line = %trimmed, "SMTP response line");
                lines.push(trimmed.clone());

                if trimmed.len() >= 4 {
                    let fourth_char = trimmed.as_bytes().get(3).copied();
                    if fourth_char == Some(b' ') || fourth_char.is_none() {
                        break;
                    }
                } else {
                    break;
                }
            }
            Ok(Err(e)) => {
                return Err(AdapterError::ExecutionFailed {
                    tool_name: "send_email".into(),
                    reason: format!("SMTP read error: {e}"),
                });
            }
            Err(_) => {
                return Err(AdapterError::Timeout {
                    seconds: CONNECT_TIMEOUT_SECS,
                    reason: "SMTP response timed out".into(),
                });
            }
        }
    }

    // Parse status code from the first line.
    let status = lines
        .first()
        .and_then(|l| l.get(..3))
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);

    Ok((status, lines))
}

/// Send a command and check that the response status falls in the expected
/// class (2xx or 3xx).
async fn smtp_send_cmd<S>(
    stream: &mut S,
    cmd: &str,
    expected_status_prefix: u16,
) -> Result<(u16, Vec<String>)>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    stream
        .write_all(cmd.as_bytes())
        .await
        .map_err(|e| AdapterError::ExecutionFailed {
            tool_name: "send_email".into(),
            reason: format!("SMTP write error: {e}"),
        })?;

    let (status, lines) = smtp_read_response(stream).await?;
    let expected_first_digit = expected_status_prefix / 100;
    if status / 100 != expected_first_digit {
        return Err(AdapterError::ExecutionFailed {
            tool_name: "send_email".into(),
            reason: format!(
                "SMTP error: expected {}xx, got {status}: {}",
                expected_first_digit,
                lines.join("; ")
            ),
        });
    }
    Ok((status, lines))
}

// ---------------------------------------------------------------------------
// TLS helpers
// ---------------------------------------------------------------------------

/// Build a rustls `ClientConfig` using Mozilla's bundled root certificates.
fn tls_client_config() -> Arc<ClientConfig> {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    Arc::new(config)
}

// ---------------------------------------------------------------------------
// Email adapter
// ---------------------------------------------------------------------------

/// SMTP email adapter.
///
/// Holds the relay configuration and identity loaded at startup; each
/// `send_email` call opens a fresh connection, delivers one message, and
/// disconnects. No retries.
pub struct EmailAdapter {
    /// Unique identifier for this adapter instance.
    id: String,
    /// Whether the adapter is logically connected (ready to process tools).
    connected: bool,
    /// SMTP relay configuration.
    config: SmtpConfig,
}

impl EmailAdapter {
    /// Create an email adapter from environment configuration.
    pub fn from_env(id: impl Into<String>) -> Self {
        Self::with_config(id, SmtpConfig::from_env())
    }

    /// Create an email adapter with explicit configuration.
    pub fn with_config(id: impl Into<String>, config: SmtpConfig) -> Self {
        Self {
            id: id.into(),
            connected: false,
            config,
        }
    }

    /// Extract a required string parameter.
    fn extract_str<'a>(params: &'a Value, field: &str) -> Result<&'a str> {
        params
            .get(field)
            .and_then(|v| v.as_str())
            .ok_or_else(|| AdapterError::InvalidParams {
                tool_name: "send_email".into(),
                reason: format!("missing required string field `{field}`"),
            })
    }

    /// Drive the full SMTP conversation for one message.
    ///
    /// `envelope` is the flattened To+Cc+Bcc recipient list; `message` is
    /// the complete MIME payload including the end-of-data marker.
    async fn deliver(
        &self,
        username: &str,
        password: &str,
        from: &str,
        envelope: &[String],
        message: &str,
    ) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let tcp_stream = tokio::time::timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            TcpStream::connect(&addr),
        )
        .await
        .map_err(|_| AdapterError::Timeout {
            seconds: CONNECT_TIMEOUT_SECS,
            reason: format!("TCP connection to {addr} timed out"),
        })?
        .map_err(|e| AdapterError::ExecutionFailed {
            tool_name: "send_email".into(),
            reason: format!("TCP connection to {addr} failed: {e}"),
        })?;

        // Plain-text phase: greeting, EHLO, STARTTLS.
        let mut plain = BufReader::new(tcp_stream);

        let (greeting_status, _) = smtp_read_response(&mut plain).await?;
        if greeting_status / 100 != 2 {
            return Err(AdapterError::ExecutionFailed {
                tool_name: "send_email".into(),
                reason: format!("SMTP server rejected connection with status {greeting_status}"),
            });
        }

        let ehlo = smtp_ehlo_command(EHLO_DOMAIN);
        smtp_send_cmd(&mut plain, &ehlo, 200).await?;
        smtp_send_cmd(&mut plain, &smtp_starttls_command(), 200).await?;

        // Upgrade to TLS. The server speaks next only after our handshake,
        // so the read buffer is empty at this point.
        let connector = TlsConnector::from(tls_client_config());
        let server_name = rustls::pki_types::ServerName::try_from(self.config.host.clone())
            .map_err(|e| AdapterError::ExecutionFailed {
            tool_name: "send_email".into(),
            reason: format!("invalid server name '{}': {e}", self.config.host),
        })?;

        let tls_stream = tokio::time::timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            connector.connect(server_name, plain.into_inner()),
        )
        .await
        .map_err(|_| AdapterError::Timeout {
            seconds: CONNECT_TIMEOUT_SECS,
            reason: format!("TLS handshake with {} timed out", self.config.host),
        })?
        .map_err(|e| AdapterError::ExecutionFailed {
            tool_name: "send_email".into(),
            reason: format!("TLS handshake with {} failed: {e}", self.config.host),
        })?;

        let mut stream = BufReader::new(tls_stream);

        // EHLO again on the encrypted channel, then authenticate.
        smtp_send_cmd(&mut stream, &ehlo, 200).await?;
        smtp_send_cmd(&mut stream, &smtp_auth_login_command(), 300).await?;

        let b64_user = format!("{}\r\n", smtp_base64_encode(username));
        smtp_send_cmd(&mut stream, &b64_user, 300).await?;

        let b64_pass = format!("{}\r\n", smtp_base64_encode(password));
        smtp_send_cmd(&mut stream, &b64_pass, 200).await?;

        // Envelope.
        smtp_send_cmd(&mut stream, &smtp_mail_from_command(from), 200).await?;
        for recipient in envelope {
            smtp_send_cmd(&mut stream, &smtp_rcpt_to_command(recipient), 200).await?;
        }

        // Message.
        smtp_send_cmd(&mut stream, &smtp_data_command(), 300).await?;
        smtp_send_cmd(&mut stream, message, 200).await?;

        let _ = stream.write_all(smtp_quit_command().as_bytes()).await;

        Ok(())
    }

    /// Send a notification email.
    async fn tool_send_email(&self, params: Value) -> Result<Value> {
        let to = normalize_recipients(params.get("to")).ok_or_else(|| {
            AdapterError::InvalidParams {
                tool_name: "send_email".into(),
                reason: "field `to` must be a string or an array of strings".into(),
            }
        })?;
        let subject = Self::extract_str(&params, "subject")?;
        let body = Self::extract_str(&params, "body")?;

        let cc = normalize_recipients(params.get("cc")).unwrap_or_default();
        let bcc = normalize_recipients(params.get("bcc")).unwrap_or_default();
        let html = params.get("html").and_then(|v| v.as_bool()).unwrap_or(false);

        // Credentials are checked before any socket is opened; a config gap
        // is reported through the uniform result shape.
        let (username, password) = match (&self.config.username, &self.config.password) {
            (Some(u), Some(p)) => (u.clone(), p.clone()),
            _ => {
                warn!(id = %self.id, "send_email called without SMTP credentials configured");
                return Ok(json!({
                    "success": false,
                    "error": "SMTP credentials not configured (set SMTP_USERNAME and SMTP_PASSWORD)",
                    "recipients": to,
                    "subject": subject,
                }));
            }
        };

        let from = params
            .get("from_email")
            .and_then(|v| v.as_str())
            .map(String::from)
            .or_else(|| self.config.from_email.clone())
            .unwrap_or_else(|| username.clone());

        // The envelope carries every recipient; headers show only To and Cc.
        let mut envelope = to.clone();
        envelope.extend(cc.iter().cloned());
        envelope.extend(bcc.iter().cloned());

        let message = build_mime_message(&from, &to, &cc, subject, body, html);

        info!(
            host = %self.config.host,
            recipients = envelope.len(),
            subject = subject,
            "sending email"
        );

        match self
            .deliver(&username, &password, &from, &envelope, &message)
            .await
        {
            Ok(()) => Ok(json!({
                "success": true,
                "message": "Email sent successfully",
                "recipients": to,
                "cc": cc,
                "bcc_count": bcc.len(),
                "subject": subject,
            })),
            Err(e) => {
                warn!(error = %e, "email delivery failed");
                Ok(json!({
                    "success": false,
                    "error": e.to_string(),
                    "recipients": to,
                    "subject": subject,
                }))
            }
        }
    }
}

#[async_trait]
impl Adapter for EmailAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Messaging
    }

    async fn connect(&mut self) -> Result<()> {
        info!(id = %self.id, host = %self.config.host, "email adapter connected");
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        info!(id = %self.id, "email adapter disconnected");
        self.connected = false;
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        if !self.connected {
            return Ok(HealthStatus::Unhealthy);
        }
        if self.config.username.is_some() && self.config.password.is_some() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded)
        }
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: "send_email".into(),
            description: "Send an email notification via SMTP".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "to": {
                        "oneOf": [
                            {"type": "string"},
                            {"type": "array", "items": {"type": "string"}}
                        ],
                        "description": "Recipient email address or list of addresses"
                    },
                    "subject": {
                        "type": "string",
                        "description": "Email subject line"
                    },
                    "body": {
                        "type": "string",
                        "description": "Email body content"
                    },
                    "cc": {
                        "oneOf": [
                            {"type": "string"},
                            {"type": "array", "items": {"type": "string"}}
                        ],
                        "description": "CC recipient(s)"
                    },
                    "bcc": {
                        "oneOf": [
                            {"type": "string"},
                            {"type": "array", "items": {"type": "string"}}
                        ],
                        "description": "BCC recipient(s)"
                    },
                    "html": {
                        "type": "boolean",
                        "description": "Send the body as HTML instead of plain text"
                    },
                    "from_email": {
                        "type": "string",
                        "description": "Sender address (overrides the configured default)"
                    }
                },
                "required": ["to", "subject", "body"]
            }),
        }]
    }

    async fn execute_tool(&self, name: &str, params: Value) -> Result<Value> {
        if !self.connected {
            return Err(AdapterError::ExecutionFailed {
                tool_name: name.to_string(),
                reason: format!("adapter `{}` is not connected", self.id),
            });
        }

        match name {
            "send_email" => self.tool_send_email(params).await,
            _ => Err(AdapterError::ToolNotFound {
                adapter_id: self.id.clone(),
                tool_name: name.to_string(),
            }),
        }
    }

    fn required_auth(&self) -> Option<AuthRequirement> {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
