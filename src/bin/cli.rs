//! MathAgent CLI
//!
//! Command-line front-end for a running gateway: create agents, dispatch
//! operations over HTTP or an interactive leg, and inspect configuration.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use mathagent::client::{GatewayClient, Incoming, LegClient};
use mathagent::config::{self, validate_config, Config};
use mathagent::gateway::protocol::{OperationRequest, ServerFrame};
use mathagent::VERSION;
use serde_json::Value;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser)]
#[command(
    name = "mathagent",
    version = VERSION,
    about = "MathAgent - operate a math agent gateway",
    long_about = None
)]
struct Cli {
    /// Gateway base URL (overrides config and MATHAGENT_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Configuration file
    #[arg(long, global = true, env = "MATHAGENT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an agent and print its id
    Create {
        /// Display name
        #[arg(long, short)]
        name: Option<String>,
    },

    /// Dispatch one operation, e.g. `call <agent> add a=2 b=3`
    Call {
        agent: String,
        method: String,
        /// Parameters as key=value
        params: Vec<String>,
    },

    /// List the operations an agent offers (creates a throwaway agent if none given)
    Discover { agent: Option<String> },

    /// Gateway liveness
    Status,

    /// Show an agent's name and open connections
    Info { agent: String },

    /// Push a JSON object to every open leg of an agent
    Broadcast { agent: String, message: String },

    /// Open an interactive leg
    Connect { agent: String },

    /// Print the effective configuration
    ShowConfig,

    /// Validate the configuration
    CheckConfig,

    /// Write the default configuration to a file
    InitConfig {
        /// Destination (.json or .toml); defaults to the config path
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,mathagent=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = config::load_config_with(cli.config.as_deref())?;
    if let Some(url) = cli.url {
        config.client.base_url = url;
    }

    match cli.command {
        Commands::Create { name } => create(&config, name.as_deref()).await,
        Commands::Call {
            agent,
            method,
            params,
        } => call(&config, &agent, &method, &params).await,
        Commands::Discover { agent } => discover(&config, agent).await,
        Commands::Status => status(&config).await,
        Commands::Info { agent } => info(&config, &agent).await,
        Commands::Broadcast { agent, message } => broadcast(&config, &agent, &message).await,
        Commands::Connect { agent } => connect(&config, &agent).await,
        Commands::ShowConfig => show_config(&config),
        Commands::CheckConfig => check_config(&config),
        Commands::InitConfig { path, force } => init_config(path, force),
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Parse `key=value` pairs. Values are read as JSON when they parse, so
/// `a=2` is a number and `a=abc` a string.
fn parse_params(method: &str, pairs: &[String]) -> Result<OperationRequest> {
    let mut request = OperationRequest::new(method);
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("Expected key=value, got {:?}", pair);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Empty parameter name in {:?}", pair);
        }
        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        request = request.with_param(key, value);
    }
    Ok(request)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// HTTP commands
// ============================================================================

async fn create(config: &Config, name: Option<&str>) -> Result<()> {
    let client = GatewayClient::new(&config.client)?;
    let agent_id = client.create_agent(name).await?;
    println!("{}", agent_id);
    Ok(())
}

async fn call(config: &Config, agent: &str, method: &str, params: &[String]) -> Result<()> {
    let client = GatewayClient::new(&config.client)?;
    let request = parse_params(method, params)?;
    match client.call(agent, &request).await {
        Ok(result) => print_json(&result),
        Err(e) => {
            eprintln!("{} {} ({})", style("✗").red(), e, e.kind());
            std::process::exit(1);
        }
    }
}

async fn discover(config: &Config, agent: Option<String>) -> Result<()> {
    let client = GatewayClient::new(&config.client)?;
    let agent = match agent {
        Some(agent) => agent,
        None => client.create_agent(Some("discover")).await?,
    };
    let catalog = client.discover(&agent).await?;
    let tools = catalog["tools"].as_array().cloned().unwrap_or_default();

    println!("{}", style(format!("{} operations", tools.len())).bold());
    for tool in tools {
        let name = tool["name"].as_str().unwrap_or("?");
        let description = tool["description"].as_str().unwrap_or("");
        let required: Vec<&str> = tool["parameters"]["required"]
            .as_array()
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let optional: Vec<String> = tool["parameters"]["properties"]
            .as_object()
            .map(|p| {
                p.keys()
                    .filter(|k| !required.contains(&k.as_str()))
                    .map(|k| format!("[{}]", k))
                    .collect()
            })
            .unwrap_or_default();
        println!(
            "  {} {} {} - {}",
            style(name).cyan(),
            required.join(" "),
            style(optional.join(" ")).dim(),
            description
        );
    }
    Ok(())
}

async fn status(config: &Config) -> Result<()> {
    let client = GatewayClient::new(&config.client)?;
    match client.status().await {
        Ok(status) => {
            println!(
                "{} {} at {} (agents: {})",
                style("✓").green(),
                status.status,
                status.timestamp,
                status.agent_count
            );
            Ok(())
        }
        Err(e) => {
            println!("{} {}: {}", style("✗").red(), config.client.base_url, e);
            std::process::exit(1);
        }
    }
}

async fn info(config: &Config, agent: &str) -> Result<()> {
    let client = GatewayClient::new(&config.client)?;
    print_json(&client.agent_info(agent).await?)
}

async fn broadcast(config: &Config, agent: &str, message: &str) -> Result<()> {
    let client = GatewayClient::new(&config.client)?;
    let message: Value = serde_json::from_str(message).context("Message must be JSON")?;
    let delivered = client.broadcast(agent, message).await?;
    println!("Delivered to {} leg(s)", delivered);
    Ok(())
}

// ============================================================================
// Interactive leg
// ============================================================================

async fn connect(config: &Config, agent: &str) -> Result<()> {
    let mut leg = LegClient::connect(&config.client, agent).await?;
    println!(
        "{} Connected to {} (leg {})",
        style("✓").green(),
        style(leg.agent_id()).cyan(),
        leg.session_id()
    );
    println!(
        "{}",
        style("Commands: ping | <method> key=value ... | listen | quit").dim()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let rest: Vec<String> = words.map(str::to_string).collect();

        match command {
            "quit" | "exit" => break,
            "ping" => match leg.ping().await {
                Ok(()) => println!("{}", style("pong").green()),
                Err(e) => println!("{} {}", style("✗").red(), e),
            },
            "listen" => {
                println!("{}", style("Waiting for one message...").dim());
                match leg.recv().await? {
                    Some(Incoming::Frame(ServerFrame::Error { error, .. })) => {
                        println!("{} {}", style("✗").red(), error)
                    }
                    Some(Incoming::Frame(frame)) => print_json(&frame)?,
                    Some(Incoming::Other(value)) => print_json(&value)?,
                    None => {
                        println!("{}", style("Leg closed by gateway").yellow());
                        break;
                    }
                }
            }
            method => {
                let request = match parse_params(method, &rest) {
                    Ok(request) => request,
                    Err(e) => {
                        println!("{} {}", style("✗").red(), e);
                        continue;
                    }
                };
                match leg.call(request).await {
                    Ok(result) => print_json(&result)?,
                    Err(e) => println!("{} {}", style("✗").red(), e),
                }
            }
        }
    }

    leg.close().await?;
    Ok(())
}

// ============================================================================
// Configuration
// ============================================================================

fn show_config(config: &Config) -> Result<()> {
    print_json(config)
}

fn check_config(config: &Config) -> Result<()> {
    let result = validate_config(config);
    for issue in &result.errors {
        println!("{} {}", style("✗").red(), issue);
    }
    for issue in &result.warnings {
        println!("{} {}", style("!").yellow(), issue);
    }
    if result.valid {
        println!("{} Configuration is valid", style("✓").green());
        Ok(())
    } else {
        bail!("{} configuration error(s)", result.errors.len())
    }
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = path.unwrap_or_else(config::config_path);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    config::save_config(&Config::default(), &path)?;
    println!("{} Wrote {}", style("✓").green(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params_types() {
        let request = parse_params(
            "log",
            &["value=8".to_string(), "base=2".to_string(), "label=abc".to_string()],
        )
        .unwrap();
        assert_eq!(request.method, "log");
        assert_eq!(request.params["value"], 8);
        assert_eq!(request.params["base"], 2);
        assert_eq!(request.params["label"], "abc");
    }

    #[test]
    fn test_parse_params_rejects_bare_words() {
        assert!(parse_params("add", &["a".to_string()]).is_err());
        assert!(parse_params("add", &["=1".to_string()]).is_err());
    }

    #[test]
    fn test_cli_parses_call() {
        let cli = Cli::try_parse_from(["mathagent", "call", "agent-1-a", "add", "a=1", "b=2"]).unwrap();
        match cli.command {
            Commands::Call { agent, method, params } => {
                assert_eq!(agent, "agent-1-a");
                assert_eq!(method, "add");
                assert_eq!(params, vec!["a=1", "b=2"]);
            }
            _ => panic!("Expected call"),
        }
    }
}
