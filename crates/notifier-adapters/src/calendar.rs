//! Google Calendar adapter -- event CRUD against the Calendar REST API.
//!
//! Four tools: `create_calendar_event`, `list_calendar_events`,
//! `update_calendar_event`, `delete_calendar_event`. Access tokens come
//! from an injected [`CredentialProvider`], so the adapter itself never
//! runs an OAuth flow. Updates are read-merge-write: the existing event is
//! fetched, the caller's fields are overlaid, and the merged body is PUT
//! back so unspecified fields survive.
//!
//! Credential and API failures are reported through the uniform
//! `{"success": false, "error": ...}` result shape; only invalid
//! parameters surface as typed errors.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use notifier_auth::CredentialProvider;

use crate::config::GoogleCalendarConfig;
use crate::datetime::normalize_datetime;
use crate::error::{AdapterError, Result};
use crate::traits::{Adapter, AdapterType, AuthRequirement, HealthStatus, ToolDefinition};

/// Production Calendar API base; tests point this at a local stub.
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

// ---------------------------------------------------------------------------
// Event merging (pure, testable)
// ---------------------------------------------------------------------------

/// Overlay update parameters onto an existing event body.
///
/// `summary`, `start_time`, and `end_time` are applied only when
/// they are non-empty strings. `description` and `location` are applied
/// whenever the key is present, so an explicit empty string clears the
/// field. Everything else on the event passes through untouched.
pub fn merge_event(existing: &mut Value, params: &Value, timezone: &str) {
    if let Some(summary) = params.get("summary").and_then(|v| v.as_str())
        && !summary.is_empty()
    {
        existing["summary"] = json!(summary);
    }
    if let Some(start) = params.get("start_time").and_then(|v| v.as_str())
        && !start.is_empty()
    {
        existing["start"] = json!({
            "dateTime": normalize_datetime(start),
            "timeZone": timezone,
        });
    }
    if let Some(end) = params.get("end_time").and_then(|v| v.as_str())
        && !end.is_empty()
    {
        existing["end"] = json!({
            "dateTime": normalize_datetime(end),
            "timeZone": timezone,
        });
    }
    if let Some(description) = params.get("description").and_then(|v| v.as_str()) {
        existing["description"] = json!(description);
    }
    if let Some(location) = params.get("location").and_then(|v| v.as_str()) {
        existing["location"] = json!(location);
    }
}

/// Extract the display start/end of an event, preferring `dateTime` and
/// falling back to `date` for all-day events.
fn event_time(event: &Value, field: &str) -> String {
    let slot = &event[field];
    slot.get("dateTime")
        .or_else(|| slot.get("date"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

// ---------------------------------------------------------------------------
// Calendar adapter
// ---------------------------------------------------------------------------

/// Google Calendar adapter backed by the Calendar REST API v3.
pub struct CalendarAdapter {
    /// Unique identifier for this adapter instance.
    id: String,
    /// Whether the adapter is logically connected.
    connected: bool,
    /// Calendar configuration (default calendar, timezone).
    config: GoogleCalendarConfig,
    /// Provides bearer tokens; handles refresh and interactive auth.
    provider: Arc<dyn CredentialProvider>,
    /// API base URL, overridable for tests.
    api_base: String,
    client: reqwest::Client,
}

impl CalendarAdapter {
    /// Create a calendar adapter with the given configuration and
    /// credential provider.
    pub fn new(
        id: impl Into<String>,
        config: GoogleCalendarConfig,
        provider: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            id: id.into(),
            connected: false,
            config,
            provider,
            api_base: CALENDAR_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the API base URL. Used by tests to target a stub server.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn extract_str<'a>(params: &'a Value, tool: &str, field: &str) -> Result<&'a str> {
        params
            .get(field)
            .and_then(|v| v.as_str())
            .ok_or_else(|| AdapterError::InvalidParams {
                tool_name: tool.to_string(),
                reason: format!("missing required string field `{field}`"),
            })
    }

    fn calendar_id(&self, params: &Value) -> String {
        params
            .get("calendar_id")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.config.default_calendar_id)
            .to_string()
    }

    fn timezone(&self, params: &Value) -> String {
        params
            .get("timezone")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.config.default_timezone)
            .to_string()
    }

    /// Issue an authenticated Calendar API request.
    ///
    /// Non-2xx statuses become errors carrying the response body; an empty
    /// success body (DELETE returns one) maps to `{}`.
    async fn api_request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        let token =
            self.provider
                .access_token()
                .await
                .map_err(|e| AdapterError::ExecutionFailed {
                    tool_name: "calendar".into(),
                    reason: format!("credential error: {e}"),
                })?;

        let mut request = self.client.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AdapterError::ExecutionFailed {
                tool_name: "calendar".into(),
                reason: format!("Calendar API request failed: {e}"),
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AdapterError::ExecutionFailed {
                tool_name: "calendar".into(),
                reason: format!("failed to read Calendar API response: {e}"),
            })?;

        if !status.is_success() {
            return Err(AdapterError::ExecutionFailed {
                tool_name: "calendar".into(),
                reason: format!("Calendar API error {status}: {text}"),
            });
        }

        if text.is_empty() {
            Ok(json!({}))
        } else {
            serde_json::from_str(&text).map_err(AdapterError::from)
        }
    }

    /// Create an event on the configured (or given) calendar.
    async fn tool_create_event(&self, params: Value) -> Result<Value> {
        let tool = "create_calendar_event";
        let summary = Self::extract_str(&params, tool, "summary")?;
        let start = Self::extract_str(&params, tool, "start_time")?;
        let end = Self::extract_str(&params, tool, "end_time")?;

        let calendar_id = self.calendar_id(&params);
        let timezone = self.timezone(&params);
        let start = normalize_datetime(start);
        let end = normalize_datetime(end);

        let mut event = json!({
            "summary": summary,
            "start": {"dateTime": start, "timeZone": timezone},
            "end": {"dateTime": end, "timeZone": timezone},
        });
        if let Some(description) = params.get("description").and_then(|v| v.as_str()) {
            event["description"] = json!(description);
        }
        if let Some(location) = params.get("location").and_then(|v| v.as_str()) {
            event["location"] = json!(location);
        }
        if let Some(attendees) = params.get("attendees").and_then(|v| v.as_array()) {
            let entries: Vec<Value> = attendees
                .iter()
                .filter_map(|a| a.as_str())
                .map(|email| json!({"email": email}))
                .collect();
            if !entries.is_empty() {
                event["attendees"] = json!(entries);
            }
        }

        let url = format!("{}/calendars/{calendar_id}/events", self.api_base);
        match self.api_request(Method::POST, &url, Some(&event)).await {
            Ok(created) => {
                info!(event_id = %created["id"], "calendar event created");
                Ok(json!({
                    "success": true,
                    "event_id": created["id"],
                    "summary": created["summary"],
                    "start": start,
                    "end": end,
                    "html_link": created.get("htmlLink").cloned().unwrap_or(Value::Null),
                    "message": "Event created successfully",
                }))
            }
            Err(e) => {
                warn!(error = %e, "calendar event creation failed");
                Ok(json!({
                    "success": false,
                    "error": e.to_string(),
                    "summary": summary,
                }))
            }
        }
    }

    /// List upcoming events, expanded to single instances and ordered by
    /// start time.
    async fn tool_list_events(&self, params: Value) -> Result<Value> {
        let calendar_id = self.calendar_id(&params);
        let max_results = params
            .get("max_results")
            .and_then(|v| v.as_u64())
            .unwrap_or(10);

        // The API wants offset-qualified bounds; normalized wall-clock
        // values are sent as UTC.
        let time_min = params
            .get("time_min")
            .and_then(|v| v.as_str())
            .map(|v| format!("{}Z", normalize_datetime(v)))
            .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string());

        let mut url = format!(
            "{}/calendars/{calendar_id}/events?singleEvents=true&orderBy=startTime&maxResults={max_results}&timeMin={time_min}",
            self.api_base
        );
        if let Some(time_max) = params.get("time_max").and_then(|v| v.as_str()) {
            url.push_str(&format!("&timeMax={}Z", normalize_datetime(time_max)));
        }

        match self.api_request(Method::GET, &url, None).await {
            Ok(response) => {
                let events: Vec<Value> = response["items"]
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .map(|event| {
                                let mut entry = json!({
                                    "id": event["id"],
                                    "summary": event
                                        .get("summary")
                                        .and_then(|v| v.as_str())
                                        .unwrap_or("No title"),
                                    "start": event_time(event, "start"),
                                    "end": event_time(event, "end"),
                                });
                                if let Some(location) =
                                    event.get("location").and_then(|v| v.as_str())
                                {
                                    entry["location"] = json!(location);
                                }
                                if let Some(description) =
                                    event.get("description").and_then(|v| v.as_str())
                                {
                                    entry["description"] = json!(description);
                                }
                                if let Some(link) =
                                    event.get("htmlLink").and_then(|v| v.as_str())
                                {
                                    entry["html_link"] = json!(link);
                                }
                                entry
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                Ok(json!({
                    "success": true,
                    "count": events.len(),
                    "events": events,
                }))
            }
            Err(e) => {
                warn!(error = %e, "calendar event listing failed");
                Ok(json!({"success": false, "error": e.to_string()}))
            }
        }
    }

    /// Update an event by fetching it, overlaying the given fields, and
    /// writing the merged body back.
    async fn tool_update_event(&self, params: Value) -> Result<Value> {
        let tool = "update_calendar_event";
        let event_id = Self::extract_str(&params, tool, "event_id")?;
        let calendar_id = self.calendar_id(&params);
        let timezone = self.timezone(&params);

        let url = format!(
            "{}/calendars/{calendar_id}/events/{event_id}",
            self.api_base
        );

        let mut existing = match self.api_request(Method::GET, &url, None).await {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, event_id, "calendar event fetch for update failed");
                return Ok(json!({
                    "success": false,
                    "error": e.to_string(),
                    "event_id": event_id,
                }));
            }
        };

        merge_event(&mut existing, &params, &timezone);

        match self.api_request(Method::PUT, &url, Some(&existing)).await {
            Ok(updated) => {
                info!(event_id, "calendar event updated");
                Ok(json!({
                    "success": true,
                    "event_id": updated["id"],
                    "summary": updated["summary"],
                    "message": "Event updated successfully",
                }))
            }
            Err(e) => {
                warn!(error = %e, event_id, "calendar event update failed");
                Ok(json!({
                    "success": false,
                    "error": e.to_string(),
                    "event_id": event_id,
                }))
            }
        }
    }

    /// Delete an event.
    async fn tool_delete_event(&self, params: Value) -> Result<Value> {
        let tool = "delete_calendar_event";
        let event_id = Self::extract_str(&params, tool, "event_id")?;
        let calendar_id = self.calendar_id(&params);

        let url = format!(
            "{}/calendars/{calendar_id}/events/{event_id}",
            self.api_base
        );

        match self.api_request(Method::DELETE, &url, None).await {
            Ok(_) => {
                info!(event_id, "calendar event deleted");
                Ok(json!({
                    "success": true,
                    "message": "Event deleted successfully",
                    "event_id": event_id,
                }))
            }
            Err(e) => {
                warn!(error = %e, event_id, "calendar event deletion failed");
                Ok(json!({
                    "success": false,
                    "error": e.to_string(),
                    "event_id": event_id,
                }))
            }
        }
    }
}

#[async_trait]
impl Adapter for CalendarAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Productivity
    }

    async fn connect(&mut self) -> Result<()> {
        info!(id = %self.id, calendar = %self.config.default_calendar_id, "calendar adapter connected");
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        info!(id = %self.id, "calendar adapter disconnected");
        self.connected = false;
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        if !self.connected {
            return Ok(HealthStatus::Unhealthy);
        }
        if self.config.client_id.is_some() && self.config.client_secret.is_some() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded)
        }
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "create_calendar_event".into(),
                description: "Create an event in Google Calendar".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "summary": {
                            "type": "string",
                            "description": "Event title"
                        },
                        "start_time": {
                            "type": "string",
                            "description": "Start time, e.g. '2026-01-20T10:00:00' or '2026-01-20'"
                        },
                        "end_time": {
                            "type": "string",
                            "description": "End time in the same formats"
                        },
                        "description": {
                            "type": "string",
                            "description": "Event description"
                        },
                        "location": {
                            "type": "string",
                            "description": "Event location"
                        },
                        "attendees": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "Attendee email addresses"
                        },
                        "timezone": {
                            "type": "string",
                            "description": "IANA timezone (defaults to the configured one)"
                        },
                        "calendar_id": {
                            "type": "string",
                            "description": "Target calendar (defaults to the configured one)"
                        }
                    },
                    "required": ["summary", "start_time", "end_time"]
                }),
            },
            ToolDefinition {
                name: "list_calendar_events".into(),
                description: "List upcoming Google Calendar events".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "max_results": {
                            "type": "integer",
                            "description": "Maximum number of events to return (default 10)"
                        },
                        "time_min": {
                            "type": "string",
                            "description": "Earliest event start to include"
                        },
                        "time_max": {
                            "type": "string",
                            "description": "Latest event start to include"
                        },
                        "calendar_id": {
                            "type": "string",
                            "description": "Calendar to list (defaults to the configured one)"
                        }
                    },
                    "required": []
                }),
            },
            ToolDefinition {
                name: "update_calendar_event".into(),
                description: "Update fields of an existing Google Calendar event".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "event_id": {
                            "type": "string",
                            "description": "ID of the event to update"
                        },
                        "summary": {
                            "type": "string",
                            "description": "New event title"
                        },
                        "start_time": {
                            "type": "string",
                            "description": "New start time"
                        },
                        "end_time": {
                            "type": "string",
                            "description": "New end time"
                        },
                        "description": {
                            "type": "string",
                            "description": "New description (empty string clears it)"
                        },
                        "location": {
                            "type": "string",
                            "description": "New location (empty string clears it)"
                        },
                        "calendar_id": {
                            "type": "string",
                            "description": "Calendar holding the event"
                        }
                    },
                    "required": ["event_id"]
                }),
            },
            ToolDefinition {
                name: "delete_calendar_event".into(),
                description: "Delete a Google Calendar event".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "event_id": {
                            "type": "string",
                            "description": "ID of the event to delete"
                        },
                        "calendar_id": {
                            "type": "string",
                            "description": "Calendar holding the event"
                        }
                    },
                    "required": ["event_id"]
                }),
            },
        ]
    }

    async fn execute_tool(&self, name: &str, params: Value) -> Result<Value> {
        if !self.connected {
            return Err(AdapterError::ExecutionFailed {
                tool_name: name.to_string(),
                reason: format!("adapter `{}` is not connected", self.id),
            });
        }

        match name {
            "create_calendar_event" => self.tool_create_event(params).await,
            "list_calendar_events" => self.tool_list_events(params).await,
            "update_calendar_event" => self.tool_update_event(params).await,
            "delete_calendar_event" => self.tool_delete_event(params).await,
            _ => Err(AdapterError::ToolNotFound {
                adapter_id: self.id.clone(),
                tool_name: name.to_string(),
            }),
        }
    }

    fn required_auth(&self) -> Option<AuthRequirement> {
        Some(AuthRequirement {
            provider: "google".into(),
            scopes: vec!["https://www.googleapis.com/auth/calendar".into()],
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use notifier_auth::StaticTokenProvider;

    fn test_config() -> GoogleCalendarConfig {
        GoogleCalendarConfig {
            client_id: Some("client-id".to_string()),
            client_secret: Some("client-secret".to_string()),
            token_file: "google_token.json".into(),
            default_calendar_id: "primary".to_string(),
            default_timezone: "Europe/Brussels".to_string(),
        }
    }

    fn test_adapter(api_base: &str) -> CalendarAdapter {
        let provider = Arc::new(StaticTokenProvider::new("google", "test-token"));
        CalendarAdapter::new("calendar", test_config(), provider).with_api_base(api_base)
    }

    async fn connected_adapter(api_base: &str) -> CalendarAdapter {
        let mut adapter = test_adapter(api_base);
        adapter.connect().await.unwrap();
        adapter
    }

    // -- Event merging -------------------------------------------------------

    fn sample_event() -> Value {
        json!({
            "id": "evt-1",
            "summary": "Team sync",
            "start": {"dateTime": "2026-01-20T10:00:00", "timeZone": "Europe/Brussels"},
            "end": {"dateTime": "2026-01-20T11:00:00", "timeZone": "Europe/Brussels"},
            "description": "Weekly sync",
            "location": "Room 4",
            "attendees": [{"email": "a@x.com"}],
        })
    }

    #[test]
    fn merge_overlays_only_given_fields() {
        let mut event = sample_event();
        merge_event(
            &mut event,
            &json!({"summary": "Renamed sync"}),
            "Europe/Brussels",
        );

        assert_eq!(event["summary"], "Renamed sync");
        assert_eq!(event["start"]["dateTime"], "2026-01-20T10:00:00");
        assert_eq!(event["description"], "Weekly sync");
        assert_eq!(event["location"], "Room 4");
        // Unrelated payload survives the merge.
        assert_eq!(event["attendees"][0]["email"], "a@x.com");
    }

    #[test]
    fn merge_location_only_preserves_summary_and_times() {
        let mut event = sample_event();
        merge_event(&mut event, &json!({"location": "Room 7"}), "Europe/Brussels");

        assert_eq!(event["location"], "Room 7");
        assert_eq!(event["summary"], "Team sync");
        assert_eq!(event["start"]["dateTime"], "2026-01-20T10:00:00");
        assert_eq!(event["end"]["dateTime"], "2026-01-20T11:00:00");
    }

    #[test]
    fn merge_normalizes_new_times() {
        let mut event = sample_event();
        merge_event(
            &mut event,
            &json!({"start_time": "2026-01-21 09:30:00"}),
            "Europe/Brussels",
        );

        assert_eq!(event["start"]["dateTime"], "2026-01-21T09:30:00");
        assert_eq!(event["start"]["timeZone"], "Europe/Brussels");
        assert_eq!(event["end"]["dateTime"], "2026-01-20T11:00:00");
    }

    #[test]
    fn merge_ignores_empty_summary_and_times() {
        let mut event = sample_event();
        merge_event(
            &mut event,
            &json!({"summary": "", "start_time": "", "end_time": ""}),
            "Europe/Brussels",
        );

        assert_eq!(event["summary"], "Team sync");
        assert_eq!(event["start"]["dateTime"], "2026-01-20T10:00:00");
    }

    #[test]
    fn merge_empty_description_clears_field() {
        let mut event = sample_event();
        merge_event(
            &mut event,
            &json!({"description": "", "location": ""}),
            "Europe/Brussels",
        );

        assert_eq!(event["description"], "");
        assert_eq!(event["location"], "");
    }

    // -- Adapter trait basics ------------------------------------------------

    #[test]
    fn adapter_id_type_and_auth() {
        let adapter = test_adapter("http://localhost");
        assert_eq!(adapter.id(), "calendar");
        assert_eq!(adapter.adapter_type(), AdapterType::Productivity);
        assert_eq!(adapter.required_auth().unwrap().provider, "google");
    }

    #[test]
    fn tools_exposes_event_crud() {
        let adapter = test_adapter("http://localhost");
        let names: Vec<String> = adapter.tools().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "create_calendar_event",
                "list_calendar_events",
                "update_calendar_event",
                "delete_calendar_event",
            ]
        );
    }

    #[tokio::test]
    async fn execute_rejects_when_not_connected() {
        let adapter = test_adapter("http://localhost");
        let result = adapter.execute_tool("list_calendar_events", json!({})).await;
        assert!(result.unwrap_err().to_string().contains("not connected"));
    }

    #[tokio::test]
    async fn create_rejects_missing_summary() {
        let adapter = connected_adapter("http://localhost").await;
        let result = adapter
            .execute_tool(
                "create_calendar_event",
                json!({"start_time": "2026-01-20", "end_time": "2026-01-20"}),
            )
            .await;
        assert!(result.unwrap_err().to_string().contains("summary"));
    }

    // -- API interaction -----------------------------------------------------

    #[tokio::test]
    async fn create_event_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/calendars/primary/events")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_body(
                json!({
                    "id": "evt-42",
                    "summary": "Dentist",
                    "htmlLink": "https://calendar.google.com/event?eid=evt-42",
                })
                .to_string(),
            )
            .create_async()
            .await;

        let adapter = connected_adapter(&server.url()).await;
        let result = adapter
            .execute_tool(
                "create_calendar_event",
                json!({
                    "summary": "Dentist",
                    "start_time": "2026-01-20 10:00:00",
                    "end_time": "2026-01-20T11:00",
                }),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result["success"], true);
        assert_eq!(result["event_id"], "evt-42");
        assert_eq!(result["start"], "2026-01-20T10:00:00");
        assert_eq!(result["end"], "2026-01-20T11:00:00");
        assert_eq!(
            result["html_link"],
            "https://calendar.google.com/event?eid=evt-42"
        );
    }

    #[tokio::test]
    async fn create_event_api_error_becomes_result() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/calendars/primary/events")
            .with_status(403)
            .with_body(json!({"error": {"message": "forbidden"}}).to_string())
            .create_async()
            .await;

        let adapter = connected_adapter(&server.url()).await;
        let result = adapter
            .execute_tool(
                "create_calendar_event",
                json!({
                    "summary": "Dentist",
                    "start_time": "2026-01-20T10:00:00",
                    "end_time": "2026-01-20T11:00:00",
                }),
            )
            .await
            .unwrap();

        assert_eq!(result["success"], false);
        assert!(result["error"].as_str().unwrap().contains("403"));
        assert_eq!(result["summary"], "Dentist");
    }

    #[tokio::test]
    async fn list_events_maps_titles_and_all_day_dates() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock(
                "GET",
                mockito::Matcher::Regex("^/calendars/primary/events".to_string()),
            )
            .with_status(200)
            .with_body(
                json!({
                    "items": [
                        {
                            "id": "evt-1",
                            "summary": "Standup",
                            "start": {"dateTime": "2026-01-20T09:00:00"},
                            "end": {"dateTime": "2026-01-20T09:15:00"},
                            "location": "Zoom",
                        },
                        {
                            "id": "evt-2",
                            "start": {"date": "2026-01-21"},
                            "end": {"date": "2026-01-22"},
                        },
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let adapter = connected_adapter(&server.url()).await;
        let result = adapter
            .execute_tool("list_calendar_events", json!({"max_results": 5}))
            .await
            .unwrap();

        assert_eq!(result["success"], true);
        assert_eq!(result["count"], 2);
        assert_eq!(result["events"][0]["summary"], "Standup");
        assert_eq!(result["events"][0]["location"], "Zoom");
        // Untitled all-day event falls back to a placeholder title and the
        // date form of its start.
        assert_eq!(result["events"][1]["summary"], "No title");
        assert_eq!(result["events"][1]["start"], "2026-01-21");
    }

    #[tokio::test]
    async fn update_event_merges_before_writing() {
        let mut server = mockito::Server::new_async().await;
        let get_mock = server
            .mock("GET", "/calendars/primary/events/evt-7")
            .with_status(200)
            .with_body(
                json!({
                    "id": "evt-7",
                    "summary": "Old title",
                    "start": {"dateTime": "2026-01-20T10:00:00", "timeZone": "Europe/Brussels"},
                    "end": {"dateTime": "2026-01-20T11:00:00", "timeZone": "Europe/Brussels"},
                    "location": "Room 4",
                })
                .to_string(),
            )
            .create_async()
            .await;
        // The PUT body must still carry the untouched location and end time.
        let put_mock = server
            .mock("PUT", "/calendars/primary/events/evt-7")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::PartialJson(json!({"summary": "New title"})),
                mockito::Matcher::PartialJson(json!({"location": "Room 4"})),
                mockito::Matcher::PartialJson(
                    json!({"end": {"dateTime": "2026-01-20T11:00:00"}}),
                ),
            ]))
            .with_status(200)
            .with_body(json!({"id": "evt-7", "summary": "New title"}).to_string())
            .create_async()
            .await;

        let adapter = connected_adapter(&server.url()).await;
        let result = adapter
            .execute_tool(
                "update_calendar_event",
                json!({"event_id": "evt-7", "summary": "New title"}),
            )
            .await
            .unwrap();

        get_mock.assert_async().await;
        put_mock.assert_async().await;
        assert_eq!(result["success"], true);
        assert_eq!(result["summary"], "New title");
    }

    #[tokio::test]
    async fn update_missing_event_becomes_result() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/calendars/primary/events/gone")
            .with_status(404)
            .with_body(json!({"error": {"message": "Not Found"}}).to_string())
            .create_async()
            .await;

        let adapter = connected_adapter(&server.url()).await;
        let result = adapter
            .execute_tool(
                "update_calendar_event",
                json!({"event_id": "gone", "summary": "x"}),
            )
            .await
            .unwrap();

        assert_eq!(result["success"], false);
        assert_eq!(result["event_id"], "gone");
        assert!(result["error"].as_str().unwrap().contains("404"));
    }

    #[tokio::test]
    async fn delete_event_success_with_empty_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/calendars/primary/events/evt-9")
            .with_status(204)
            .create_async()
            .await;

        let adapter = connected_adapter(&server.url()).await;
        let result = adapter
            .execute_tool("delete_calendar_event", json!({"event_id": "evt-9"}))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result["success"], true);
        assert_eq!(result["event_id"], "evt-9");
    }

    #[tokio::test]
    async fn provider_failure_becomes_result() {
        struct FailingProvider;

        #[async_trait]
        impl CredentialProvider for FailingProvider {
            fn name(&self) -> &str {
                "failing"
            }

            async fn access_token(&self) -> notifier_auth::Result<String> {
                Err(notifier_auth::AuthError::NotAuthenticated {
                    provider: "failing".to_string(),
                })
            }
        }

        let mut adapter =
            CalendarAdapter::new("calendar", test_config(), Arc::new(FailingProvider))
                .with_api_base("http://localhost");
        adapter.connect().await.unwrap();

        let result = adapter
            .execute_tool("list_calendar_events", json!({}))
            .await
            .unwrap();

        assert_eq!(result["success"], false);
        assert!(result["error"].as_str().unwrap().contains("credential"));
    }
}
