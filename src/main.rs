//! `chatshare` CLI - extract shared AI chat conversations

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use chatshare::{detect, Config, ExtractionMethod, ExtractionResult, Extractor, Platform};

#[derive(Parser)]
#[command(name = "chatshare")]
#[command(about = "Extract shared AI chat conversations into one normalized schema")]
#[command(version)]
struct Cli {
    /// Debug logging on stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the conversation behind a share URL
    Extract {
        /// Share URL (Claude, ChatGPT, Gemini, Copilot, Grok)
        url: String,

        /// Print the full result envelope as JSON
        #[arg(long)]
        json: bool,

        /// Force an extraction method (json, html, md)
        #[arg(short, long)]
        method: Option<ExtractionMethod>,

        /// Browser navigation timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Chrome/Chromium executable
        #[arg(long, value_name = "PATH")]
        chrome: Option<PathBuf>,

        /// Show the browser window
        #[arg(long)]
        headful: bool,
    },

    /// Show which platform a URL belongs to
    Detect {
        /// URL to classify
        url: String,
    },

    /// List supported platforms
    Platforms,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Extract {
            url,
            json,
            method,
            timeout_ms,
            chrome,
            headful,
        } => {
            let result = cmd_extract(&url, method, timeout_ms, chrome, headful).await?;
            print_result(&result, json)?;
            if !result.success {
                std::process::exit(1);
            }
        }
        Commands::Detect { url } => cmd_detect(&url)?,
        Commands::Platforms => cmd_platforms(),
    }

    Ok(())
}

/// Log to stderr so stdout stays machine-readable.
fn init_logging(verbose: bool) {
    let default = if verbose { "chatshare=debug" } else { "chatshare=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

async fn cmd_extract(
    url: &str,
    method: Option<ExtractionMethod>,
    timeout_ms: Option<u64>,
    chrome: Option<PathBuf>,
    headful: bool,
) -> Result<ExtractionResult> {
    let config = Config::load()?;

    let mut options = config.extract_options();
    if method.is_some() {
        options.method = method;
    }
    if let Some(ms) = timeout_ms {
        options.browser_timeout = Duration::from_millis(ms);
    }

    let mut launch = config.launch_options();
    if chrome.is_some() {
        launch.executable = chrome;
    }
    if headful {
        launch.headless = false;
    }

    let extractor = Extractor::new()?
        .with_options(options)
        .with_launch_options(launch);
    Ok(extractor.extract_conversation(url).await)
}

fn print_result(result: &ExtractionResult, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(result).context("failed to serialize result")?;
        println!("{out}");
        return Ok(());
    }

    let elapsed = result.metadata.as_ref().map_or(0, |m| m.extraction_time);
    match &result.conversation {
        Some(conversation) => {
            let method = result
                .metadata
                .as_ref()
                .map_or(ExtractionMethod::Unknown, |m| m.method);
            println!("✅ {}", conversation.title);
            println!(
                "   {} · {} messages · {method} · {elapsed}ms",
                conversation.platform.display_name(),
                conversation.messages.len()
            );
            if let Some(model) = &conversation.model {
                println!("   model: {model}");
            }
            println!("\n{}", conversation.transcript());
        }
        None => {
            let code = result.code.as_deref().unwrap_or("UNKNOWN_ERROR");
            let error = result.error.as_deref().unwrap_or("unknown error");
            eprintln!("❌ {error} [{code}] ({elapsed}ms)");
        }
    }
    Ok(())
}

fn cmd_detect(url: &str) -> Result<()> {
    let platform = detect(url).with_context(|| format!("cannot classify {url}"))?;
    let shape = if platform.is_valid_url(url.trim()) {
        "valid share URL"
    } else {
        "malformed share URL"
    };
    println!(
        "{platform} ({}, {}) - {shape}",
        platform.display_name(),
        platform.method()
    );
    Ok(())
}

fn cmd_platforms() {
    for platform in Platform::ALL {
        let config = platform.config();
        let api = if config.has_internal_api { "api" } else { "-" };
        println!(
            "{:<12} {:<16} {:<6} {api}",
            platform.as_str(),
            platform.display_name(),
            platform.method().as_str()
        );
    }
}
