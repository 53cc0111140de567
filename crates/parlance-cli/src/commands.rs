//! Command implementations for the CLI.

use std::io::Read as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use parlance::{
    ApprovalHandler, ApprovalQueue, Collaborators, OutputClassifier, RenderConfig, RenderPlan,
    RenderSummary, render_plan,
};
use parlance_common::{ChatMessage, LogObserver};
use serde::Deserialize;
use serde_json::Value;

use crate::display::{Screen, TerminalCharts, TerminalChrome, TerminalOutput, TerminalProse};
use crate::theme::Theme;

/// A transcript file: a list of messages or a single message.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Transcript {
    Messages(Vec<ChatMessage>),
    Message(Box<ChatMessage>),
}

impl Transcript {
    fn into_messages(self) -> Vec<ChatMessage> {
        match self {
            Self::Messages(messages) => messages,
            Self::Message(message) => vec![*message],
        }
    }
}

/// Options for `parlance render`.
#[derive(Debug, Default)]
pub struct RenderOptions {
    pub config: RenderConfig,
    pub export_dir: Option<PathBuf>,
    pub approve: Vec<String>,
    pub deny: Vec<String>,
}

/// Reads a file, or stdin when `path` is `-`.
fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut contents = String::new();
        std::io::stdin()
            .read_to_string(&mut contents)
            .context("Failed to read stdin")?;
        return Ok(contents);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Parses transcript JSON into messages.
pub fn parse_transcript(contents: &str) -> Result<Vec<ChatMessage>> {
    let transcript: Transcript =
        serde_json::from_str(contents).context("Transcript is not a message or message list")?;
    Ok(transcript.into_messages())
}

/// Renders every message of a transcript to a string.
pub fn render_transcript(
    messages: &[ChatMessage],
    options: &RenderOptions,
    approvals: &ApprovalQueue,
    theme: &Theme,
) -> Result<(String, RenderSummary)> {
    if let Some(dir) = &options.export_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let screen = Screen::default();
    let mut total = RenderSummary::default();
    let mut charts = TerminalCharts::new(&screen, theme, options.export_dir.clone());

    for message in messages {
        let plan = RenderPlan::build_with(message, &options.config, &LogObserver);
        log::debug!(
            "message {}: {} parts, {} units",
            message.id,
            message.parts.len(),
            plan.units.len()
        );

        let role = format!("{:?}", message.role);
        screen.line(theme.message_header.render(&[("role", &role)]));

        let summary = render_plan(
            &plan,
            &mut Collaborators {
                chrome: &mut TerminalChrome { screen: &screen, theme },
                prose: &mut TerminalProse { screen: &screen, theme },
                output: &mut TerminalOutput { screen: &screen, theme },
                charts: &mut charts,
                approvals,
            },
        );
        total.charts += summary.charts;
        total.chart_failures += summary.chart_failures;
    }

    Ok((screen.take(), total))
}

/// Submits approve/deny decisions, warning about ids no message waits on.
pub fn submit_decisions(
    messages: &[ChatMessage],
    options: &RenderOptions,
    approvals: &mut ApprovalQueue,
) -> Result<()> {
    let waiting: Vec<String> = messages
        .iter()
        .flat_map(|m| {
            RenderPlan::build(m, &options.config)
                .awaiting_approval()
                .map(|t| t.part.tool_call_id.clone())
                .collect::<Vec<_>>()
        })
        .collect();

    let decisions = options
        .approve
        .iter()
        .map(|id| (id, true))
        .chain(options.deny.iter().map(|id| (id, false)));
    for (id, approve) in decisions {
        if !waiting.contains(id) {
            log::warn!("tool call {id} is not awaiting approval");
        }
        approvals
            .submit(id, approve)
            .with_context(|| format!("Failed to submit decision for {id}"))?;
    }
    Ok(())
}

/// `parlance render`.
pub fn render(path: &Path, options: &RenderOptions, theme: &Theme) -> Result<()> {
    let messages = parse_transcript(&read_input(path)?)?;
    let mut approvals = ApprovalQueue::new();
    submit_decisions(&messages, options, &mut approvals)?;

    let (drawn, summary) = render_transcript(&messages, options, &approvals, theme)?;
    print!("{drawn}");

    if summary.chart_failures > 0 {
        eprintln!(
            "{} {} chart(s) failed to render",
            "Warning:".bright_yellow(),
            summary.chart_failures
        );
    }
    log::info!(
        "rendered {} message(s), {} chart(s)",
        messages.len(),
        summary.charts
    );

    for decision in approvals.drain() {
        println!("{}", serde_json::to_string(&decision)?);
    }
    Ok(())
}

/// Decodes classifier input; text that is not JSON is classified as a string.
pub fn parse_output(contents: &str) -> Value {
    serde_json::from_str(contents).unwrap_or_else(|_| Value::String(contents.to_string()))
}

/// `parlance classify`; returns whether a chart was found.
pub fn classify(path: &Path, config: &RenderConfig) -> Result<bool> {
    let output = parse_output(&read_input(path)?);
    let classifier = OutputClassifier::from_config(config);

    match classifier.classify_with(&output, &LogObserver) {
        Some(spec) => {
            println!("{}", serde_json::to_string_pretty(spec.as_map())?);
            Ok(true)
        }
        None => {
            println!("{}", "not found".bright_red());
            Ok(false)
        }
    }
}
