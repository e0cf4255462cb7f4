use std::path::PathBuf;
use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use api_gateway::proxy::ChangeEvent;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the API gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "GATEWAY_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway status and breaker totals
    Status,
    /// List servers with breaker status and recent traffic
    Servers,
    /// List clusters and their members
    Clusters,
    /// List APIs in match order
    Apis,
    /// Move a server from circuit close to half
    Promote {
        /// Server id
        id: String,
    },
    /// Apply a JSON array of change events atomically
    Apply {
        /// File holding the events
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)),
        Commands::Servers => client.get(format!("{}/admin/servers", cli.url)),
        Commands::Clusters => client.get(format!("{}/admin/clusters", cli.url)),
        Commands::Apis => client.get(format!("{}/admin/apis", cli.url)),
        Commands::Promote { id } => client.post(format!("{}/admin/servers/{}/half", cli.url, id)),
        Commands::Apply { file } => {
            // Parse locally so malformed events never reach the gateway
            let events: Vec<ChangeEvent> = serde_json::from_str(&std::fs::read_to_string(file)?)?;
            client.post(format!("{}/admin/events", cli.url)).json(&events)
        }
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
