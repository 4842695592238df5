use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use url::Url;

use outfit_api::billing::schema::entitlements_sql;

#[derive(Parser)]
#[command(name = "outfit-cli")]
#[command(about = "Operations CLI for the outfit studio API", long_about = None)]
struct Cli {
    /// Base URL of a running service.
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service status and which settings are present
    Health,
    /// Show the entitlements of the user owning a session token
    Entitlements {
        /// Session access token
        #[arg(short, long, env = "OUTFIT_TOKEN")]
        token: String,
    },
    /// Print the entitlement view and function SQL
    MigrateSql,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Health => {
            let res = reqwest::Client::new()
                .get(endpoint(&cli.url, "/api/health")?)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Entitlements { token } => {
            let mut headers = HeaderMap::new();
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
            let res = reqwest::Client::new()
                .get(endpoint(&cli.url, "/api/billing/entitlements")?)
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::MigrateSql => {
            print!("{}", entitlements_sql());
        }
    }

    Ok(())
}

fn endpoint(base: &str, path: &str) -> Result<Url, url::ParseError> {
    Url::parse(base)?.join(path)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    let body = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };

    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        eprintln!("{}", body);
        std::process::exit(1);
    }

    println!("{}", body);
    Ok(())
}
