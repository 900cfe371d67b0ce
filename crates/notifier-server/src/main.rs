//! Entry point for the notifier MCP server.
//!
//! Loads adapter configuration from the environment (a `.env` file is
//! honored), wires each adapter to its credential provider, and serves the
//! MCP endpoint over HTTP. Missing credentials never abort startup; the
//! affected tools report the gap in their results instead.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use notifier_adapters::{
    Adapter, CalendarAdapter, EmailAdapter, GoogleCalendarConfig, MsTodoConfig, TodoAdapter,
};
use notifier_auth::{
    DeviceCodeConfig, GoogleInteractiveProvider, MicrosoftDeviceCodeProvider, OAuthConfig,
    TokenStore,
};
use notifier_server::{HttpServer, ServerConfig};

/// Redirect target for the interactive Google flow. Must be registered on
/// the OAuth client and match the local callback listener port.
const GOOGLE_REDIRECT_URI: &str = "http://localhost:8411/callback";

/// notifier — MCP server for email, calendar, and to-do notifications.
#[derive(Parser)]
#[command(
    name = "notifier",
    version,
    about = "MCP server exposing email, Google Calendar, and Microsoft To-Do tools"
)]
struct Cli {
    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Also expose the Microsoft To-Do tools.
    #[arg(long)]
    expose_tasks: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing("info");

    let mut adapters: Vec<Arc<dyn Adapter>> = Vec::new();

    // Email over SMTP.
    let mut email = EmailAdapter::from_env("email");
    email.connect().await?;
    adapters.push(Arc::new(email));

    // Google Calendar with the interactive auth-code provider. An empty
    // client id just means every calendar call reports the config gap.
    let calendar_config = GoogleCalendarConfig::from_env();
    let oauth_config = OAuthConfig::google_calendar(
        calendar_config.client_id.clone().unwrap_or_default(),
        calendar_config.client_secret.clone().unwrap_or_default(),
        GOOGLE_REDIRECT_URI,
    );
    let google_provider = Arc::new(GoogleInteractiveProvider::new(
        oauth_config,
        TokenStore::new(&calendar_config.token_file),
    ));
    let mut calendar = CalendarAdapter::new("calendar", calendar_config, google_provider);
    calendar.connect().await?;
    adapters.push(Arc::new(calendar));

    // Microsoft To-Do with the device-code provider, opt-in.
    if cli.expose_tasks {
        let todo_config = MsTodoConfig::from_env();
        let device_config = DeviceCodeConfig::microsoft_todo(
            todo_config.client_id.clone().unwrap_or_default(),
            &todo_config.tenant_id,
        );
        let microsoft_provider = Arc::new(MicrosoftDeviceCodeProvider::new(
            device_config,
            TokenStore::new(&todo_config.token_file),
        ));
        let mut todo = TodoAdapter::new("todo", todo_config, microsoft_provider);
        todo.connect().await?;
        adapters.push(Arc::new(todo));
    }

    info!(
        adapter_count = adapters.len(),
        expose_tasks = cli.expose_tasks,
        "adapters initialized"
    );

    let config = ServerConfig {
        bind_addr: cli.bind,
        port: cli.port,
    };
    HttpServer::new(config, adapters)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("server error: {e}"))
}

/// Initialize the tracing subscriber, honoring `RUST_LOG` when set.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
