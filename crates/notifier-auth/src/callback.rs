//! Local HTTP callback listener for the OAuth redirect.
//!
//! When the user approves access in the browser, the authorization server
//! redirects to a local URL carrying `?code=xxx&state=yyy`. This module is a
//! minimal single-request TCP server that accepts that one redirect, hands
//! back a small success page, and returns the extracted code and state. Raw
//! [`tokio::net::TcpListener`] is enough here; no HTTP framework needed.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::error::{AuthError, Result};

/// The HTML page returned to the browser after a successful callback.
const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Authorization Successful</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            height: 100vh;
            margin: 0;
            background: #f5f5f5;
            color: #333;
        }
        .card {
            text-align: center;
            padding: 3rem;
            background: white;
            border-radius: 12px;
            box-shadow: 0 2px 10px rgba(0,0,0,0.08);
        }
        h1 { color: #22c55e; margin-bottom: 0.5rem; }
        p { color: #666; }
    </style>
</head>
<body>
    <div class="card">
        <h1>Authorization Successful</h1>
        <p>You can close this tab and return to the notifier.</p>
    </div>
</body>
</html>"#;

/// A minimal HTTP callback server that listens for a single OAuth redirect.
pub struct CallbackServer;

impl CallbackServer {
    /// Start the callback server and wait for the OAuth redirect.
    ///
    /// Binds to `127.0.0.1:{port}`, waits for a single GET request with
    /// `?code=xxx&state=yyy` query parameters, returns a success HTML page
    /// to the browser, and returns the extracted `(code, state)` tuple.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Timeout`] if `timeout_secs` elapse before a request
    ///   arrives.
    /// - [`AuthError::Io`] if the TCP listener cannot bind.
    /// - [`AuthError::FlowFailed`] if the request is missing required query
    ///   parameters or the server redirected with an `error` parameter.
    pub async fn start(port: u16, timeout_secs: u64) -> Result<(String, String)> {
        let addr = format!("127.0.0.1:{port}");
        let listener = TcpListener::bind(&addr).await?;

        tracing::info!(addr = %addr, "callback server listening for OAuth redirect");

        let timeout = tokio::time::Duration::from_secs(timeout_secs);
        let result = tokio::time::timeout(timeout, Self::accept_one(&listener)).await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(AuthError::Timeout { timeout_secs }),
        }
    }

    /// Accept a single connection, parse the request, send a response.
    async fn accept_one(listener: &TcpListener) -> Result<(String, String)> {
        let (mut stream, peer) = listener.accept().await?;

        tracing::debug!(peer = %peer, "accepted callback connection");

        // OAuth redirects are small GET requests, 4KB is plenty.
        let mut buf = [0u8; 4096];
        let n = stream.read(&mut buf).await?;
        let request = String::from_utf8_lossy(&buf[..n]);

        let (code, state) = Self::parse_callback_request(&request)?;

        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            SUCCESS_HTML.len(),
            SUCCESS_HTML
        );

        stream.write_all(response.as_bytes()).await?;
        stream.flush().await?;

        tracing::info!("callback received, authorization code extracted");

        Ok((code, state))
    }

    /// Parse the query parameters from the first line of an HTTP GET request.
    ///
    /// Expected format: `GET /some/path?code=xxx&state=yyy HTTP/1.1`
    fn parse_callback_request(request: &str) -> Result<(String, String)> {
        let request_line = request.lines().next().ok_or_else(|| AuthError::FlowFailed {
            reason: "empty HTTP request".to_string(),
        })?;

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() < 2 {
            return Err(AuthError::FlowFailed {
                reason: format!("malformed HTTP request line: {request_line}"),
            });
        }

        let path = parts[1];

        // The path may be "/callback?code=xxx&state=yyy" or just "/?code=...".
        let query = path
            .split_once('?')
            .map(|(_, q)| q)
            .ok_or_else(|| AuthError::FlowFailed {
                reason: "callback request has no query string".to_string(),
            })?;

        let mut code: Option<String> = None;
        let mut state: Option<String> = None;

        for param in query.split('&') {
            if let Some((key, value)) = param.split_once('=') {
                let decoded = Self::percent_decode(value);
                match key {
                    "code" => code = Some(decoded),
                    "state" => state = Some(decoded),
                    "error" => {
                        return Err(AuthError::FlowFailed {
                            reason: format!("authorization server returned error: {decoded}"),
                        });
                    }
                    _ => {}
                }
            }
        }

        let code = code.ok_or_else(|| AuthError::FlowFailed {
            reason: "callback missing 'code' parameter".to_string(),
        })?;

        let state = state.ok_or_else(|| AuthError::FlowFailed {
            reason: "callback missing 'state' parameter".to_string(),
        })?;

        Ok((code, state))
    }

    /// Minimal percent-decoding for query parameter values.
    ///
    /// Handles `%XX` sequences and `+` as space.
    fn percent_decode(input: &str) -> String {
        let mut output = String::with_capacity(input.len());
        let mut chars = input.bytes();

        while let Some(b) = chars.next() {
            match b {
                b'%' => {
                    let hi = chars.next();
                    let lo = chars.next();
                    if let (Some(h), Some(l)) = (hi, lo) {
                        let hex = [h, l];
                        if let Ok(s) = std::str::from_utf8(&hex)
                            && let Ok(byte) = u8::from_str_radix(s, 16)
                        {
                            output.push(byte as char);
                            continue;
                        }
                        // If decoding fails, output the literal characters.
                        output.push('%');
                        output.push(h as char);
                        output.push(l as char);
                    }
                }
                b'+' => output.push(' '),
                _ => output.push(b as char),
            }
        }

        output
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
