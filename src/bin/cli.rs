//! ClinicDesk CLI
//!
//! Command-line client for a running ClinicDesk API:
//! - Provision the first administrator
//! - Browse configured entities and their records
//! - Print the practice report
//! - Check server status
//! - Generate a default config file

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;

/// Header carrying the acting user id
const ACTOR_HEADER: &str = "x-user-id";

#[derive(Parser)]
#[command(name = "clinicdesk")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Command-line client for the ClinicDesk practice backend")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:8090", global = true)]
    pub api_url: String,

    /// Acting user id sent with mutating requests
    #[arg(long, default_value = "cli", global = true)]
    pub user: String,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Provision an administrator account
    SeedAdmin {
        /// Authentication uid of the account
        uid: String,
        /// Login email
        email: String,
        /// Display name (default: the email's local part)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// List entities declared in the project configuration
    Entities,

    /// List records of an entity
    List {
        /// Entity name, e.g. `suppliers`
        entity: String,
        /// Free-text search
        #[arg(short, long)]
        search: Option<String>,
        /// Page number (1-based)
        #[arg(short, long, default_value = "1")]
        page: usize,
    },

    /// Print the practice report
    Reports,

    /// Show server status
    Status,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match &cli.command {
        Commands::SeedAdmin { uid, email, name } => {
            let display_name = name
                .clone()
                .unwrap_or_else(|| email.split('@').next().unwrap_or(email).to_string());

            let body = json!({
                "uid": uid,
                "email": email,
                "displayName": display_name,
                "role": "admin",
                "isActive": true,
            });

            let response = client
                .post(format!("{}/api/v1/users", cli.api_url))
                .header(ACTOR_HEADER, &cli.user)
                .json(&body)
                .send()
                .await
                .with_context(|| connect_hint(&cli.api_url))?;

            let user = read_json(response).await?;
            println!(
                "Admin {} ({}) ready",
                user["displayName"].as_str().unwrap_or("-"),
                user["id"].as_str().unwrap_or(uid)
            );
        }

        Commands::Entities => {
            let response = client
                .get(format!("{}/api/v1/config", cli.api_url))
                .send()
                .await
                .with_context(|| connect_hint(&cli.api_url))?;

            let config = read_json(response).await?;
            let entities = config["entities"].as_array().cloned().unwrap_or_default();

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&entities)?);
            } else if entities.is_empty() {
                println!("No entities configured.");
            } else {
                println!("{:<20} {:<25} {}", "Name", "Label", "Fields");
                println!("{}", "-".repeat(60));
                for entity in entities {
                    println!(
                        "{:<20} {:<25} {}",
                        entity["name"].as_str().unwrap_or("-"),
                        entity["label"].as_str().unwrap_or("-"),
                        entity["schema"].as_array().map_or(0, Vec::len)
                    );
                }
            }
        }

        Commands::List {
            entity,
            search,
            page,
        } => {
            let mut request = client
                .get(format!("{}/api/v1/entities/{}", cli.api_url, entity))
                .query(&[("page", page.to_string())]);
            if let Some(search) = search {
                request = request.query(&[("search", search)]);
            }

            let response = request
                .send()
                .await
                .with_context(|| connect_hint(&cli.api_url))?;
            let page = read_json(response).await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&page)?);
            } else {
                print_page(&page);
            }
        }

        Commands::Reports => {
            let response = client
                .get(format!("{}/api/v1/reports", cli.api_url))
                .send()
                .await
                .with_context(|| connect_hint(&cli.api_url))?;
            let report = read_json(response).await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }

        Commands::Status => {
            let response = client
                .get(format!("{}/health", cli.api_url))
                .send()
                .await
                .with_context(|| connect_hint(&cli.api_url))?;
            let health = read_json(response).await?;

            println!("ClinicDesk v{}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("API Status: {}", health["status"].as_str().unwrap_or("unknown"));
            println!(
                "Storage:    {} ({})",
                health["storage"].as_str().unwrap_or("unknown"),
                health["backend"].as_str().unwrap_or("-")
            );
            if let Some(connections) = health["websocket_connections"].as_u64() {
                println!("WebSocket:  {} connections", connections);
            }
            if let Some(uptime) = health["uptime_seconds"].as_u64() {
                println!("Uptime:     {}", format_duration(uptime));
            }
        }

        Commands::Config { output } => {
            let config = clinicdesk::config::generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

fn connect_hint(api_url: &str) -> String {
    format!(
        "Cannot connect to ClinicDesk API at {} (start it with: cargo run --bin clinicdesk-api)",
        api_url
    )
}

/// Decode a JSON body, turning API error envelopes into an error
async fn read_json(response: reqwest::Response) -> anyhow::Result<Value> {
    let status = response.status();
    let body: Value = response.json().await.context("Invalid JSON response")?;

    if status.is_success() {
        return Ok(body);
    }

    let error = &body["error"];
    let mut message = format!(
        "{} ({}): {}",
        error["code"].as_str().unwrap_or("ERROR"),
        status,
        error["message"].as_str().unwrap_or("unknown error")
    );
    if let Some(fields) = error["fields"].as_object() {
        for (field, reason) in fields {
            message.push_str(&format!("\n  {}: {}", field, reason.as_str().unwrap_or("-")));
        }
    }
    bail!(message)
}

fn print_page(page: &Value) {
    let items = page["items"].as_array().cloned().unwrap_or_default();
    if items.is_empty() {
        println!("No records");
        return;
    }

    // Column order follows the first record
    let columns: Vec<String> = items[0]
        .as_object()
        .map(|obj| {
            obj.keys()
                .filter(|k| *k != "id")
                .take(4)
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    print!("{:<22}", "id");
    for column in &columns {
        print!(" | {:<16}", column);
    }
    println!();
    println!("{}", "-".repeat(22 + columns.len() * 19));

    for item in &items {
        print!("{:<22}", truncate(&cell(&item["id"]), 22));
        for column in &columns {
            print!(" | {:<16}", truncate(&cell(&item[column]), 16));
        }
        println!();
    }

    println!();
    println!(
        "Page {} of {} ({} records)",
        page["page"].as_u64().unwrap_or(1),
        page["total_pages"].as_u64().unwrap_or(1),
        page["total_items"].as_u64().unwrap_or(0)
    );
}

fn print_report(report: &Value) {
    let count = |key: &str| report[key].as_u64().unwrap_or(0);
    let amount = |key: &str| report[key].as_f64().unwrap_or(0.0);

    println!("Patients:       {} ({} active)", count("totalPatients"), count("activePatients"));
    println!(
        "Consultations:  {} ({} completed, {} pending, {} cancelled)",
        count("totalConsultations"),
        count("completedConsultations"),
        count("pendingConsultations"),
        count("cancelledConsultations")
    );
    println!(
        "Invoices:       {} ({} paid, {} pending)",
        count("totalInvoices"),
        count("paidInvoices"),
        count("pendingInvoices")
    );
    println!();
    println!("Revenue:        {:.2}", amount("totalRevenue"));
    println!("Pending:        {:.2}", amount("pendingRevenue"));
    println!("This month:     {:.2}", amount("monthRevenue"));
    println!("Per patient:    {:.2}", amount("avgRevenuePerPatient"));
    println!();
    println!("Completion:     {:.1}%", amount("completionRate"));
    println!("Collection:     {:.1}%", amount("collectionRate"));
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}
