//! Parlance CLI - render assistant transcripts in the terminal
//!
//! `parlance render` draws each message of a recorded transcript the way a
//! chat front end would: streamed tool text inside its tool, charts detected
//! in tool output, duplicate chart fences hidden. `parlance classify` runs
//! chart detection on a single tool output.
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use parlance::RenderConfig;

mod commands;
mod display;
mod theme;

use commands::RenderOptions;
use theme::Theme;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a config file (defaults to ~/.config/parlance/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Treat tools whose name contains KEYWORD as text-streaming
    #[arg(long = "streaming-tool", value_name = "KEYWORD", global = true)]
    streaming_tools: Vec<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a transcript (JSON message or message list; `-` for stdin)
    Render {
        transcript: PathBuf,

        /// Write every detected chart spec to DIR as <tool_call_id>.vl.json
        #[arg(long, value_name = "DIR")]
        export_charts: Option<PathBuf>,

        /// Approve a tool call awaiting approval
        #[arg(long, value_name = "TOOL_CALL_ID")]
        approve: Vec<String>,

        /// Deny a tool call awaiting approval
        #[arg(long, value_name = "TOOL_CALL_ID")]
        deny: Vec<String>,
    },
    /// Detect a chart spec in a tool output (`-` for stdin)
    Classify {
        #[arg(default_value = "-")]
        input: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn load_config(args: &Args) -> Result<RenderConfig> {
    let mut config = match &args.config {
        Some(path) => RenderConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RenderConfig::load().context("Failed to load config")?,
    };
    for keyword in &args.streaming_tools {
        config.add_streaming_tool(keyword.as_str());
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(&args)?;

    match args.command {
        Command::Render {
            transcript,
            export_charts,
            approve,
            deny,
        } => {
            let options = RenderOptions {
                config,
                export_dir: export_charts,
                approve,
                deny,
            };
            commands::render(&transcript, &options, &Theme::load())?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Classify { input } => {
            let found = commands::classify(&input, &config)?;
            Ok(if found {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
