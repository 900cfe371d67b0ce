//! Microsoft To-Do adapter -- task CRUD against the Microsoft Graph API.
//!
//! Five tools: `create_todo`, `list_todos`, `update_todo`, `delete_todo`,
//! and `list_todo_lists`. Tokens come from an injected
//! [`CredentialProvider`] (the device-code variant in production).
//!
//! Target list resolution is a three-step chain: an explicit `list_id`
//! parameter wins, then the configured default list id, then the first
//! list returned by Graph. When the account has no lists at all,
//! `list_todos` reports an empty result and the mutating tools report a
//! failure, both through the uniform `{"success": ...}` shape.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use notifier_auth::CredentialProvider;

use crate::config::MsTodoConfig;
use crate::datetime::normalize_datetime;
use crate::error::{AdapterError, Result};
use crate::traits::{Adapter, AdapterType, AuthRequirement, HealthStatus, ToolDefinition};

/// Production Graph API base; tests point this at a local stub.
const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Default page size for `list_todos`.
const DEFAULT_LIST_TOP: u64 = 50;

/// Graph dateTimeTimeZone values are sent as UTC wall-clock times.
const GRAPH_TIMEZONE: &str = "UTC";

/// Microsoft To-Do adapter backed by the Graph To-Do API.
pub struct TodoAdapter {
    /// Unique identifier for this adapter instance.
    id: String,
    /// Whether the adapter is logically connected.
    connected: bool,
    /// To-Do configuration (app registration, default list).
    config: MsTodoConfig,
    /// Provides bearer tokens; handles refresh and device-code auth.
    provider: Arc<dyn CredentialProvider>,
    /// API base URL, overridable for tests.
    graph_base: String,
    client: reqwest::Client,
}

impl TodoAdapter {
    /// Create a To-Do adapter with the given configuration and credential
    /// provider.
    pub fn new(
        id: impl Into<String>,
        config: MsTodoConfig,
        provider: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            id: id.into(),
            connected: false,
            config,
            provider,
            graph_base: GRAPH_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the Graph base URL. Used by tests to target a stub server.
    pub fn with_graph_base(mut self, base: impl Into<String>) -> Self {
        self.graph_base = base.into();
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

    /// Issue an authenticated Graph request.
    ///
    /// Non-2xx statuses become errors carrying the response body; 204 and
    /// other empty success bodies map to `{}`.
    async fn graph_request(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value> {
        let token =
            self.provider
                .access_token()
                .await
                .map_err(|e| AdapterError::ExecutionFailed {
                    tool_name: "todo".into(),
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
                tool_name: "todo".into(),
                reason: format!("Graph API request failed: {e}"),
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AdapterError::ExecutionFailed {
                tool_name: "todo".into(),
                reason: format!("failed to read Graph API response: {e}"),
            })?;

        if !status.is_success() {
            return Err(AdapterError::ExecutionFailed {
                tool_name: "todo".into(),
                reason: format!("Graph API error {status}: {text}"),
            });
        }

        if text.is_empty() {
            Ok(json!({}))
        } else {
            serde_json::from_str(&text).map_err(AdapterError::from)
        }
    }

    /// Resolve the target list id: explicit parameter, then the configured
    /// default, then the account's first list. `Ok(None)` means the account
    /// has no lists at all.
    async fn resolve_list_id(&self, params: &Value) -> Result<Option<String>> {
        if let Some(list_id) = params.get("list_id").and_then(|v| v.as_str())
            && !list_id.is_empty()
        {
            return Ok(Some(list_id.to_string()));
        }
        if let Some(default) = &self.config.default_list_id {
            return Ok(Some(default.clone()));
        }

        let url = format!("{}/me/todo/lists", self.graph_base);
        let response = self.graph_request(Method::GET, &url, None).await?;
        let first = response["value"]
            .as_array()
            .and_then(|lists| lists.first())
            .and_then(|list| list["id"].as_str())
            .map(String::from);
        Ok(first)
    }

    /// Create a task.
    async fn tool_create_todo(&self, params: Value) -> Result<Value> {
        let tool = "create_todo";
        let title = Self::extract_str(&params, tool, "title")?;

        let list_id = match self.resolve_list_id(&params).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                return Ok(json!({
                    "success": false,
                    "error": "No To-Do lists found for this account",
                    "title": title,
                }));
            }
            Err(e) => {
                warn!(error = %e, "todo list resolution failed");
                return Ok(json!({
                    "success": false,
                    "error": e.to_string(),
                    "title": title,
                }));
            }
        };

        let importance = params
            .get("importance")
            .and_then(|v| v.as_str())
            .unwrap_or("normal");

        let mut task = json!({"title": title, "importance": importance});
        if let Some(body) = params.get("body").and_then(|v| v.as_str()) {
            task["body"] = json!({"content": body, "contentType": "text"});
        }
        if let Some(due) = params.get("due_date").and_then(|v| v.as_str())
            && !due.is_empty()
        {
            task["dueDateTime"] = json!({
                "dateTime": normalize_datetime(due),
                "timeZone": GRAPH_TIMEZONE,
            });
        }
        if let Some(reminder) = params.get("reminder_date").and_then(|v| v.as_str())
            && !reminder.is_empty()
        {
            task["reminderDateTime"] = json!({
                "dateTime": normalize_datetime(reminder),
                "timeZone": GRAPH_TIMEZONE,
            });
            task["isReminderOn"] = json!(true);
        }

        let url = format!("{}/me/todo/lists/{list_id}/tasks", self.graph_base);
        match self.graph_request(Method::POST, &url, Some(&task)).await {
            Ok(created) => {
                info!(task_id = %created["id"], "todo task created");
                Ok(json!({
                    "success": true,
                    "task_id": created["id"],
                    "title": created["title"],
                    "status": created["status"],
                    "importance": created["importance"],
                    "created_at": created["createdDateTime"],
                    "list_id": list_id,
                    "message": "Task created successfully",
                }))
            }
            Err(e) => {
                warn!(error = %e, "todo task creation failed");
                Ok(json!({
                    "success": false,
                    "error": e.to_string(),
                    "title": title,
                }))
            }
        }
    }

    /// List tasks in a list, open tasks only unless asked otherwise.
    async fn tool_list_todos(&self, params: Value) -> Result<Value> {
        let list_id = match self.resolve_list_id(&params).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                // An account without lists has no tasks; that is an empty
                // result, not a failure.
                return Ok(json!({"success": true, "count": 0, "tasks": []}));
            }
            Err(e) => {
                warn!(error = %e, "todo list resolution failed");
                return Ok(json!({"success": false, "error": e.to_string()}));
            }
        };

        let top = params
            .get("max_results")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_LIST_TOP);

        let mut url = format!(
            "{}/me/todo/lists/{list_id}/tasks?$top={top}",
            self.graph_base
        );
        if let Some(status) = params.get("filter_status").and_then(|v| v.as_str())
            && !status.is_empty()
        {
            url.push_str(&format!("&$filter=status%20eq%20'{status}'"));
        }

        match self.graph_request(Method::GET, &url, None).await {
            Ok(response) => {
                let tasks: Vec<Value> = response["value"]
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .map(|task| {
                                json!({
                                    "id": task["id"],
                                    "title": task["title"],
                                    "status": task["status"],
                                    "importance": task["importance"],
                                    "due_date": task["dueDateTime"]["dateTime"],
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                Ok(json!({
                    "success": true,
                    "count": tasks.len(),
                    "list_id": list_id,
                    "tasks": tasks,
                }))
            }
            Err(e) => {
                warn!(error = %e, "todo task listing failed");
                Ok(json!({"success": false, "error": e.to_string()}))
            }
        }
    }

    /// Update a task with a sparse PATCH body.
    async fn tool_update_todo(&self, params: Value) -> Result<Value> {
        let tool = "update_todo";
        let task_id = Self::extract_str(&params, tool, "task_id")?;

        let list_id = match self.resolve_list_id(&params).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                return Ok(json!({
                    "success": false,
                    "error": "No To-Do lists found for this account",
                    "task_id": task_id,
                }));
            }
            Err(e) => {
                return Ok(json!({
                    "success": false,
                    "error": e.to_string(),
                    "task_id": task_id,
                }));
            }
        };

        // Only the fields the caller supplied go on the wire; Graph leaves
        // the rest of the task untouched.
        let mut patch = json!({});
        if let Some(title) = params.get("title").and_then(|v| v.as_str())
            && !title.is_empty()
        {
            patch["title"] = json!(title);
        }
        if let Some(body) = params.get("body").and_then(|v| v.as_str()) {
            patch["body"] = json!({"content": body, "contentType": "text"});
        }
        if let Some(due) = params.get("due_date").and_then(|v| v.as_str())
            && !due.is_empty()
        {
            patch["dueDateTime"] = json!({
                "dateTime": normalize_datetime(due),
                "timeZone": GRAPH_TIMEZONE,
            });
        }
        if let Some(status) = params.get("status").and_then(|v| v.as_str()) {
            patch["status"] = json!(status);
        }
        if let Some(importance) = params.get("importance").and_then(|v| v.as_str()) {
            patch["importance"] = json!(importance);
        }

        let url = format!(
            "{}/me/todo/lists/{list_id}/tasks/{task_id}",
            self.graph_base
        );
        match self.graph_request(Method::PATCH, &url, Some(&patch)).await {
            Ok(updated) => {
                info!(task_id, "todo task updated");
                Ok(json!({
                    "success": true,
                    "task_id": task_id,
                    "title": updated["title"],
                    "message": "Task updated successfully",
                }))
            }
            Err(e) => {
                warn!(error = %e, task_id, "todo task update failed");
                Ok(json!({
                    "success": false,
                    "error": e.to_string(),
                    "task_id": task_id,
                }))
            }
        }
    }

    /// Delete a task.
    async fn tool_delete_todo(&self, params: Value) -> Result<Value> {
        let tool = "delete_todo";
        let task_id = Self::extract_str(&params, tool, "task_id")?;

        let list_id = match self.resolve_list_id(&params).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                return Ok(json!({
                    "success": false,
                    "error": "No To-Do lists found for this account",
                    "task_id": task_id,
                }));
            }
            Err(e) => {
                return Ok(json!({
                    "success": false,
                    "error": e.to_string(),
                    "task_id": task_id,
                }));
            }
        };

        let url = format!(
            "{}/me/todo/lists/{list_id}/tasks/{task_id}",
            self.graph_base
        );
        match self.graph_request(Method::DELETE, &url, None).await {
            Ok(_) => {
                info!(task_id, "todo task deleted");
                Ok(json!({
                    "success": true,
                    "message": "Task deleted successfully",
                    "task_id": task_id,
                }))
            }
            Err(e) => {
                warn!(error = %e, task_id, "todo task deletion failed");
                Ok(json!({
                    "success": false,
                    "error": e.to_string(),
                    "task_id": task_id,
                }))
            }
        }
    }

    /// List the account's To-Do lists.
    async fn tool_list_todo_lists(&self) -> Result<Value> {
        let url = format!("{}/me/todo/lists", self.graph_base);
        match self.graph_request(Method::GET, &url, None).await {
            Ok(response) => {
                let lists: Vec<Value> = response["value"]
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .map(|list| {
                                json!({
                                    "id": list["id"],
                                    "name": list["displayName"],
                                    "is_owner": list["isOwner"],
                                    "is_shared": list["isShared"],
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                Ok(json!({
                    "success": true,
                    "count": lists.len(),
                    "lists": lists,
                }))
            }
            Err(e) => {
                warn!(error = %e, "todo list listing failed");
                Ok(json!({"success": false, "error": e.to_string()}))
            }
        }
    }
}

#[async_trait]
impl Adapter for TodoAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Productivity
    }

    async fn connect(&mut self) -> Result<()> {
        info!(id = %self.id, "todo adapter connected");
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        info!(id = %self.id, "todo adapter disconnected");
        self.connected = false;
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        if !self.connected {
            return Ok(HealthStatus::Unhealthy);
        }
        if self.config.client_id.is_some() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded)
        }
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "create_todo".into(),
                description: "Create a task in Microsoft To-Do".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "title": {
                            "type": "string",
                            "description": "Task title"
                        },
                        "body": {
                            "type": "string",
                            "description": "Task body text"
                        },
                        "due_date": {
                            "type": "string",
                            "description": "Due date, e.g. '2026-01-20' or '2026-01-20T17:00:00'"
                        },
                        "reminder_date": {
                            "type": "string",
                            "description": "Reminder time; also turns the reminder on"
                        },
                        "importance": {
                            "type": "string",
                            "enum": ["low", "normal", "high"],
                            "description": "Task importance (default normal)"
                        },
                        "list_id": {
                            "type": "string",
                            "description": "Target list (defaults to the configured or first list)"
                        }
                    },
                    "required": ["title"]
                }),
            },
            ToolDefinition {
                name: "list_todos".into(),
                description: "List tasks in a Microsoft To-Do list".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "list_id": {
                            "type": "string",
                            "description": "List to read (defaults to the configured or first list)"
                        },
                        "max_results": {
                            "type": "integer",
                            "description": "Maximum number of tasks to return (default 50)"
                        },
                        "filter_status": {
                            "type": "string",
                            "enum": ["notStarted", "inProgress", "completed"],
                            "description": "Only return tasks with this status"
                        }
                    },
                    "required": []
                }),
            },
            ToolDefinition {
                name: "update_todo".into(),
                description: "Update fields of a Microsoft To-Do task".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "task_id": {
                            "type": "string",
                            "description": "ID of the task to update"
                        },
                        "title": {
                            "type": "string",
                            "description": "New task title"
                        },
                        "body": {
                            "type": "string",
                            "description": "New body text"
                        },
                        "due_date": {
                            "type": "string",
                            "description": "New due date"
                        },
                        "status": {
                            "type": "string",
                            "enum": ["notStarted", "inProgress", "completed"],
                            "description": "New task status"
                        },
                        "importance": {
                            "type": "string",
                            "enum": ["low", "normal", "high"],
                            "description": "New importance"
                        },
                        "list_id": {
                            "type": "string",
                            "description": "List holding the task"
                        }
                    },
                    "required": ["task_id"]
                }),
            },
            ToolDefinition {
                name: "delete_todo".into(),
                description: "Delete a Microsoft To-Do task".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "task_id": {
                            "type": "string",
                            "description": "ID of the task to delete"
                        },
                        "list_id": {
                            "type": "string",
                            "description": "List holding the task"
                        }
                    },
                    "required": ["task_id"]
                }),
            },
            ToolDefinition {
                name: "list_todo_lists".into(),
                description: "List Microsoft To-Do task lists".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {},
                    "required": []
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
            "create_todo" => self.tool_create_todo(params).await,
            "list_todos" => self.tool_list_todos(params).await,
            "update_todo" => self.tool_update_todo(params).await,
            "delete_todo" => self.tool_delete_todo(params).await,
            "list_todo_lists" => self.tool_list_todo_lists().await,
            _ => Err(AdapterError::ToolNotFound {
                adapter_id: self.id.clone(),
                tool_name: name.to_string(),
            }),
        }
    }

    fn required_auth(&self) -> Option<AuthRequirement> {
        Some(AuthRequirement {
            provider: "microsoft".into(),
            scopes: vec!["Tasks.ReadWrite".into()],
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
