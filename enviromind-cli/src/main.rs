//! enviromind-cli: terminal client for the EnviroMind chat API
//!
//! # Subcommands
//! - `ask <question> [--json]` ask a question and print the answer
//! - `list [--json]`           print every past interaction, newest first
//! - `get <id> [--json]`       print one past interaction
//! - `status`                  check that the server is up

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "enviromind-cli",
    version,
    about = "Ask EnviroMind environmental questions and browse past answers"
)]
struct Cli {
    /// EnviroMind HTTP server URL (overrides ENVIROMIND_URL env var)
    #[arg(long, env = "ENVIROMIND_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ask a question
    Ask {
        /// Question text
        question: String,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// List past interactions, newest first
    List {
        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Show one past interaction
    Get {
        /// Record id as returned by `ask` or `list`
        id: String,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Show server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

/// Response of POST /api/chat
#[derive(Debug, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub id: String,
    #[serde(rename = "askedAt")]
    pub asked_at: String,
}

/// One stored interaction from GET /api/chat and GET /api/chat/{id}
#[derive(Debug, Deserialize)]
pub struct ChatRecord {
    pub id: String,
    pub question: String,
    pub answer: String,
    #[serde(rename = "askedAt")]
    pub asked_at: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

// ============================================================================
// Rendering
// ============================================================================

/// Single-line summary used by `list`.
pub fn summary_line(r: &ChatRecord) -> String {
    let question: String = r.question.chars().take(60).collect();
    let ellipsis = if r.question.chars().count() > 60 { "…" } else { "" };
    format!("{}  {}  {}{}", r.asked_at, r.id, question, ellipsis)
}

/// Full rendering used by `get`.
pub fn render_record(r: &ChatRecord) -> String {
    format!(
        "id:      {}\nasked:   {}\nquestion: {}\n\n{}",
        r.id, r.asked_at, r.question, r.answer
    )
}

/// Pull the `detail` message out of an error body, falling back to the raw text.
pub fn error_detail(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.detail)
        .unwrap_or_else(|_| body.to_string())
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send the request and return the body, exiting with the server's message on non-2xx.
fn fetch(req: reqwest::blocking::RequestBuilder, url: &str) -> anyhow::Result<String> {
    let resp = match req.send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("enviromind-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let body = resp.text().unwrap_or_default();
    if !status.is_success() {
        eprintln!("enviromind-cli: server returned {}: {}", status, error_detail(&body));
        std::process::exit(1);
    }
    Ok(body)
}

fn do_ask(server: &str, question: &str, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/api/chat", server);
    // Generation can be slow; allow longer than the read endpoints.
    let req = client(90)?
        .post(&url)
        .json(&serde_json::json!({ "question": question }));
    let body = fetch(req, &url)?;

    if json_output {
        println!("{}", body);
        return Ok(());
    }

    let resp: AskResponse = serde_json::from_str(&body)?;
    println!("{}\n", resp.answer);
    println!("id: {}  asked: {}", resp.id, resp.asked_at);
    Ok(())
}

fn do_list(server: &str, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/api/chat", server);
    let body = fetch(client(30)?.get(&url), &url)?;

    if json_output {
        println!("{}", body);
        return Ok(());
    }

    let records: Vec<ChatRecord> = serde_json::from_str(&body)?;
    if records.is_empty() {
        eprintln!("No chats yet.");
        return Ok(());
    }
    for r in &records {
        println!("{}", summary_line(r));
    }
    Ok(())
}

fn do_get(server: &str, id: &str, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/api/chat/{}", server, id);
    let body = fetch(client(30)?.get(&url), &url)?;

    if json_output {
        println!("{}", body);
        return Ok(());
    }

    let record: ChatRecord = serde_json::from_str(&body)?;
    println!("{}", render_record(&record));
    Ok(())
}

/// Show the server status by calling GET /healthz.
fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/healthz", server);

    match client(10)?.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("EnviroMind server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("URL:               {}", server);
        }
        Ok(r) => {
            eprintln!("enviromind-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("enviromind-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Ask { question, json } => do_ask(&server, &question, json),
        Commands::List { json } => do_list(&server, json),
        Commands::Get { id, json } => do_get(&server, &id, json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("enviromind-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
