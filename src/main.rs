use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;

use jarvis::bridge;
use jarvis::config::Config;
use jarvis::context::ToolContext;
use jarvis::tools::default_registry;

#[derive(Parser)]
#[command(name = "jarvis")]
#[command(about = "Desktop skills for a realtime voice assistant")]
struct Args {
    #[arg(short, long, global = true, help = "Verbose output")]
    verbose: bool,

    #[arg(long, global = true, help = "Path to a config.toml")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tool definitions as JSON
    Tools,
    /// Run a single tool and print its result envelope
    Call {
        /// Tool name, e.g. get_battery_info
        name: String,
        /// JSON object with the tool arguments
        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// Serve line-delimited JSON requests on stdin/stdout
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from the data directory .env file
    if let Ok(data_dir) = jarvis::utils::paths::get_jarvis_data_dir() {
        let env_path = data_dir.join(".env");
        if env_path.exists() {
            dotenv::from_path(env_path).ok();
        }
    }

    let args = Args::parse();

    // stdout carries JSON, so logs go to stderr
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::load(args.config.as_deref())?;
    let registry = default_registry();

    match args.command {
        Commands::Tools => {
            let definitions = registry.definitions();
            println!("{}", serde_json::to_string_pretty(&definitions)?);
        }
        Commands::Call { name, args } => {
            let arguments: serde_json::Value =
                serde_json::from_str(&args).context("--args must be a JSON object")?;
            let ctx = Arc::new(ToolContext::new(config));
            let result = registry.dispatch(&ctx, &name, arguments).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.is_ok() {
                std::process::exit(1);
            }
        }
        Commands::Serve => {
            info!("Starting Jarvis bridge...");
            let ctx = Arc::new(ToolContext::new(config));
            let stdin = BufReader::new(tokio::io::stdin());
            let stdout = tokio::io::stdout();
            let shutdown = async {
                tokio::signal::ctrl_c().await.ok();
            };
            bridge::serve(&registry, &ctx, stdin, stdout, shutdown).await?;
            info!("👋 Bridge stopped");
        }
    }

    Ok(())
}
