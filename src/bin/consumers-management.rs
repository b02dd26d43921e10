//! OAuth consumer management CLI.
//!
//! Talks to a running consumer registry over HTTP.
//!
//! ```bash
//! consumers-management --base-url http://localhost:8080 list
//! consumers-management get slack
//! consumers-management register \
//!   --component-id slack --friendly-name Slack \
//!   --app-key k1 --app-secret s1 --oauth-version 2.0 \
//!   --auth-url https://slack.com/oauth/authorize \
//!   --token-url https://slack.com/api/oauth.access
//! ```
//!
//! Credentials come from `--token` / `CONSUMERS_TOKEN` and, for registration,
//! `--tenant-token` / `CONSUMERS_TENANT_TOKEN`.
//!
//! Exit codes: 0 success, 1 general error, 2 registry error, 3 authentication error.

use clap::{Args, Parser, Subcommand, ValueEnum};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::process;

const TENANT_TOKEN_HEADER: &str = "X-Tenant-Token";

#[derive(Parser)]
#[command(
    name = "consumers-management",
    about = "OAuth consumer registry management CLI",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Base URL of the consumer registry
    #[arg(long, env = "CONSUMERS_BASE_URL", default_value = "http://localhost:8080")]
    base_url: String,

    /// Bearer credential checked by the identity authority
    #[arg(long, env = "CONSUMERS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(short, long, help = "Enable verbose output for debugging")]
    verbose: bool,

    #[arg(long, value_enum, default_value = "json-pretty")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Json,
    JsonPretty,
    /// Human-readable key/value listing
    Table,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered consumers
    List,
    /// Show one consumer
    Get(GetArgs),
    /// Register a new consumer
    Register(RegisterArgs),
}

#[derive(Args)]
struct GetArgs {
    component_id: String,
}

#[derive(Debug, Clone, Serialize, ValueEnum)]
enum OAuthVersion {
    #[value(name = "1.0")]
    #[serde(rename = "1.0")]
    V1,
    #[value(name = "2.0")]
    #[serde(rename = "2.0")]
    V2,
}

#[derive(Args)]
struct RegisterArgs {
    /// Tenant token the remote ciphertext is bound to
    #[arg(long, env = "CONSUMERS_TENANT_TOKEN", hide_env_values = true)]
    tenant_token: Option<String>,

    #[arg(long)]
    component_id: String,

    #[arg(long)]
    friendly_name: String,

    #[arg(long)]
    app_key: String,

    #[arg(long, env = "CONSUMERS_APP_SECRET", hide_env_values = true)]
    app_secret: String,

    #[arg(long, value_enum)]
    oauth_version: OAuthVersion,

    #[arg(long)]
    auth_url: String,

    #[arg(long)]
    token_url: String,

    /// Required for OAuth 1.0 consumers
    #[arg(long)]
    request_token_url: Option<String>,
}

#[derive(Serialize)]
struct ConsumerDefinition<'a> {
    component_id: &'a str,
    friendly_name: &'a str,
    app_key: &'a str,
    app_secret: &'a str,
    oauth_version: &'a OAuthVersion,
    auth_url: &'a str,
    token_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_token_url: Option<&'a str>,
}

#[derive(Debug)]
enum AppError {
    Network(reqwest::Error),
    Json(serde_json::Error),
    Registry(String),
    Authentication(String),
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Json(err)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Network(err) => write!(f, "Network error: {}", err),
            AppError::Json(err) => write!(f, "JSON error: {}", err),
            AppError::Registry(msg) => write!(f, "Registry error: {}", msg),
            AppError::Authentication(msg) => write!(f, "Authentication error: {}", msg),
        }
    }
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::Network(_) | AppError::Json(_) => 1,
            AppError::Registry(_) => 2,
            AppError::Authentication(_) => 3,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let client = Client::new();

    let result = match &cli.command {
        Commands::List => list_consumers(&cli, &client).await,
        Commands::Get(args) => get_consumer(&cli, &client, args).await,
        Commands::Register(args) => register_consumer(&cli, &client, args).await,
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        process::exit(err.exit_code());
    }
}

fn with_token(cli: &Cli, request: RequestBuilder) -> RequestBuilder {
    match &cli.token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

async fn list_consumers(cli: &Cli, client: &Client) -> Result<(), AppError> {
    let url = format!("{}/consumers", cli.base_url.trim_end_matches('/'));
    if cli.verbose {
        eprintln!("GET {}", url);
    }

    let response = with_token(cli, client.get(&url)).send().await?;
    handle_response(cli, response, StatusCode::OK).await
}

async fn get_consumer(cli: &Cli, client: &Client, args: &GetArgs) -> Result<(), AppError> {
    let mut url = reqwest::Url::parse(&cli.base_url)
        .map_err(|e| AppError::Registry(format!("Invalid base URL: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| AppError::Registry("Base URL cannot carry a path".to_string()))?
        .pop_if_empty()
        .push("consumers")
        .push(&args.component_id);
    if cli.verbose {
        eprintln!("GET {}", url);
    }

    let response = with_token(cli, client.get(url)).send().await?;
    handle_response(cli, response, StatusCode::OK).await
}

async fn register_consumer(
    cli: &Cli,
    client: &Client,
    args: &RegisterArgs,
) -> Result<(), AppError> {
    let definition = ConsumerDefinition {
        component_id: &args.component_id,
        friendly_name: &args.friendly_name,
        app_key: &args.app_key,
        app_secret: &args.app_secret,
        oauth_version: &args.oauth_version,
        auth_url: &args.auth_url,
        token_url: &args.token_url,
        request_token_url: args.request_token_url.as_deref(),
    };

    let url = format!("{}/consumers", cli.base_url.trim_end_matches('/'));
    if cli.verbose {
        eprintln!("POST {} (component {})", url, args.component_id);
    }

    let mut request = with_token(cli, client.post(&url)).json(&definition);
    if let Some(tenant_token) = &args.tenant_token {
        request = request.header(TENANT_TOKEN_HEADER, tenant_token);
    }

    let response = request.send().await?;
    handle_response(cli, response, StatusCode::CREATED).await
}

async fn handle_response(
    cli: &Cli,
    response: reqwest::Response,
    expected: StatusCode,
) -> Result<(), AppError> {
    let status = response.status();
    if cli.verbose {
        eprintln!("Response status: {}", status);
    }

    if status == expected {
        let body: Value = response.json().await?;
        return output_response(&cli.format, &body);
    }

    let body: Value = response.json().await.unwrap_or(Value::Null);
    let description = body
        .get("error_description")
        .and_then(Value::as_str)
        .unwrap_or("no description")
        .to_string();

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AppError::Authentication(description)),
        _ => Err(AppError::Registry(format!(
            "Request failed with status {}: {}",
            status, description
        ))),
    }
}

fn output_response<T: Serialize>(format: &OutputFormat, data: &T) -> Result<(), AppError> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(data)?);
        }
        OutputFormat::JsonPretty => {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
        OutputFormat::Table => {
            let json_value: Value = serde_json::to_value(data)?;
            print_table(&json_value, 0);
        }
    }
    Ok(())
}

/// Print data in table format (recursive for nested objects)
fn print_table(value: &Value, indent: usize) {
    let prefix = "  ".repeat(indent);

    match value {
        Value::Object(map) => {
            for (key, val) in map {
                match val {
                    Value::Object(_) | Value::Array(_) => {
                        println!("{}{}:", prefix, key);
                        print_table(val, indent + 1);
                    }
                    _ => println!("{}{}: {}", prefix, key, format_value(val)),
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                println!("{}[{}]:", prefix, i);
                print_table(item, indent + 1);
            }
        }
        _ => println!("{}{}", prefix, format_value(value)),
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        _ => value.to_string(),
    }
}
