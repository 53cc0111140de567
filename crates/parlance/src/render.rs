//! Render planning and the collaborators that draw the result.
//!
//! [`RenderPlan::build`] runs the whole pipeline for one message: it drops
//! out-of-band errors, segments the parts, captures streamed tool text and
//! classifies tool output. The plan is a list of [`RenderUnit`]s that
//! [`render_plan`] hands to the host's renderers.
//!
//! # Example
//!
//! ```
//! use parlance::{RenderConfig, RenderPlan, RenderUnit, ToolView};
//! use parlance_common::{ChatMessage, DynamicToolPart, MessagePart, ToolState};
//! use serde_json::json;
//!
//! let message = ChatMessage::assistant(vec![
//!     MessagePart::DynamicTool(
//!         DynamicToolPart::builder()
//!             .tool_call_id("call_1")
//!             .tool_name("chart_tool")
//!             .state(ToolState::OutputAvailable)
//!             .output(json!({ "mark": "bar", "data": { "values": [] } }))
//!             .build(),
//!     ),
//!     MessagePart::text("Sales by region."),
//! ]);
//!
//! let plan = RenderPlan::build(&message, &RenderConfig::default());
//! assert_eq!(plan.units.len(), 2);
//! let RenderUnit::Tool(tool) = &plan.units[0] else { unreachable!() };
//! assert!(matches!(tool.view, ToolView::Chart(_)));
//! ```

use std::collections::HashMap;
use std::fmt;

use parlance_common::{
    ChartSpec, ChatMessage, DynamicToolPart, ErrorPayload, FilePart, MessagePart, MessageRole,
    NoopObserver, PipelineObserver, SourceUrl, ToolState,
};
use serde_json::Value;
use uuid::Uuid;

use crate::approval::{ApprovalHandler, ApprovalStatus};
use crate::capture::StreamCapture;
use crate::classify::OutputClassifier;
use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::prose::{ProseBlock, ProseOverrides};
use crate::segment::{inline_parts, segment_with};

/// Export formats a chart renderer may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Raster image.
    Png,
    /// Vector image.
    Svg,
    /// The spec itself.
    Json,
}

impl ExportFormat {
    /// File extension for exported files.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
            Self::Json => "vl.json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Png => "png",
            Self::Svg => "svg",
            Self::Json => "json",
        };
        f.write_str(name)
    }
}

/// How a tool call is displayed.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolView {
    /// Still running or streaming its input.
    Pending,
    /// Waiting for the user to approve or deny.
    AwaitingApproval,
    /// The user denied the call.
    Denied,
    /// The call failed with this error text.
    Error(String),
    /// The output holds a chart.
    Chart(ChartSpec),
    /// Generic structured or text output.
    Structured(Value),
    /// Finished without output.
    Empty,
}

impl ToolView {
    fn for_tool(
        tool: &DynamicToolPart,
        classifier: &OutputClassifier,
        observer: &dyn PipelineObserver,
    ) -> Self {
        if let Some(error) = tool.error_text.as_deref().filter(|e| !e.is_empty()) {
            return Self::Error(error.to_string());
        }

        match tool.state {
            ToolState::InputStreaming | ToolState::InputAvailable => Self::Pending,
            ToolState::ApprovalRequested => Self::AwaitingApproval,
            ToolState::ApprovalResponded => {
                let denied = tool.approval.as_ref().and_then(|a| a.approved) == Some(false);
                if denied { Self::Denied } else { Self::Pending }
            }
            ToolState::OutputDenied => Self::Denied,
            _ => match tool.display_output() {
                Some(output) => classifier
                    .classify_with(output, observer)
                    .map_or_else(|| Self::Structured(output.clone()), Self::Chart),
                None => Self::Empty,
            },
        }
    }
}

/// Text a text-streaming tool produced, shown inside the tool.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedText {
    /// The text, split and overridden like any prose.
    pub blocks: Vec<ProseBlock>,
    /// Citations that came with it.
    pub citations: Vec<SourceUrl>,
}

/// A tool call ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUnit {
    /// The call.
    pub part: DynamicToolPart,
    /// Header label from a preceding name marker.
    pub display_name: Option<String>,
    /// What to show for it.
    pub view: ToolView,
    /// Streamed text the tool owns.
    pub captured: Option<CapturedText>,
}

impl ToolUnit {
    /// Header label: the display name if one was given, else the tool name.
    #[must_use]
    pub fn title(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.part.tool_name)
    }
}

/// One visual unit of a message.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderUnit {
    /// Model prose and the citations that annotate it.
    Prose {
        /// Split and overridden prose.
        blocks: Vec<ProseBlock>,
        /// Citations grouped with the text.
        citations: Vec<SourceUrl>,
    },
    /// Visible reasoning.
    Reasoning(String),
    /// Citations without text to attach to.
    Citations(Vec<SourceUrl>),
    /// A tool call.
    Tool(Box<ToolUnit>),
    /// An inline error.
    Error(ErrorPayload),
    /// An attached file.
    File(FilePart),
    /// A part type this crate does not know.
    Unknown,
}

/// Everything needed to render one message.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan {
    /// The message rendered.
    pub message_id: Uuid,
    /// Its author.
    pub role: MessageRole,
    /// Units in display order.
    pub units: Vec<RenderUnit>,
}

impl RenderPlan {
    /// Plans a message.
    #[must_use]
    pub fn build(message: &ChatMessage, config: &RenderConfig) -> Self {
        Self::build_with(message, config, &NoopObserver)
    }

    /// Plans a message, reporting pipeline decisions to `observer`.
    pub fn build_with(
        message: &ChatMessage,
        config: &RenderConfig,
        observer: &dyn PipelineObserver,
    ) -> Self {
        let parts = inline_parts(&message.parts);
        let segments = segment_with(&parts, observer);
        let captures = StreamCapture::from_config(config).scan_with(&segments, observer);
        let classifier = OutputClassifier::from_config(config);

        let views: Vec<Option<ToolView>> = segments
            .iter()
            .map(|s| s.tool().map(|t| ToolView::for_tool(t, &classifier, observer)))
            .collect();
        let chart_shown = views
            .iter()
            .flatten()
            .any(|v| matches!(v, ToolView::Chart(_)));
        let overrides = ProseOverrides::new(config, chart_shown);

        let mut captured: HashMap<usize, CapturedText> = HashMap::new();
        for (segment, capture) in segments.iter().zip(&captures) {
            if let (Some(capture), Some(text)) = (capture, segment.text()) {
                captured.insert(
                    capture.tool_index,
                    CapturedText {
                        blocks: overrides.render(text),
                        citations: segment.citations().cloned().collect(),
                    },
                );
            }
        }

        let mut units = Vec::with_capacity(segments.len());
        let mut pending_name: Option<String> = None;

        for (index, (segment, view)) in segments.iter().zip(views).enumerate() {
            if let Some(name) = segment.name_marker() {
                pending_name = Some(name.to_string());
                continue;
            }
            if captures.get(index).is_some_and(Option::is_some) {
                continue;
            }

            if let Some(text) = segment.text() {
                pending_name = None;
                units.push(RenderUnit::Prose {
                    blocks: overrides.render(text),
                    citations: segment.citations().cloned().collect(),
                });
                continue;
            }

            let unit = match (segment.first(), view) {
                (MessagePart::DynamicTool(part), Some(view)) => {
                    RenderUnit::Tool(Box::new(ToolUnit {
                        part: part.clone(),
                        display_name: pending_name.take(),
                        view,
                        captured: captured.remove(&index),
                    }))
                }
                (MessagePart::Reasoning { text }, _) => RenderUnit::Reasoning(text.clone()),
                (MessagePart::SourceUrl(_), _) => {
                    RenderUnit::Citations(segment.citations().cloned().collect())
                }
                (MessagePart::DataError { data }, _) => RenderUnit::Error(data.clone()),
                (MessagePart::File(file), _) => RenderUnit::File(file.clone()),
                _ => RenderUnit::Unknown,
            };
            units.push(unit);
        }

        Self {
            message_id: message.id,
            role: message.role,
            units,
        }
    }

    /// Charts detected in tool output, keyed by tool call id.
    pub fn charts(&self) -> impl Iterator<Item = (&str, &ChartSpec)> {
        self.units.iter().filter_map(|unit| match unit {
            RenderUnit::Tool(tool) => match &tool.view {
                ToolView::Chart(spec) => Some((tool.part.tool_call_id.as_str(), spec)),
                _ => None,
            },
            _ => None,
        })
    }

    /// Tool calls waiting on the approval workflow.
    pub fn awaiting_approval(&self) -> impl Iterator<Item = &ToolUnit> {
        self.units.iter().filter_map(|unit| match unit {
            RenderUnit::Tool(tool) if tool.view == ToolView::AwaitingApproval => Some(&**tool),
            _ => None,
        })
    }
}

/// Draws charts.
///
/// Rendering errors are reported through the `Err` path, never through
/// the success path.
pub trait ChartRenderer {
    /// Renders `spec` into the target identified by `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec cannot be rendered.
    fn render_chart(&mut self, spec: &ChartSpec, target: &str) -> Result<(), RenderError>;

    /// Exports the last rendered chart.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing was rendered or the format is unsupported.
    fn export(&self, format: ExportFormat) -> Result<Vec<u8>, RenderError>;
}

/// Draws generic tool output; knows nothing about charts.
pub trait OutputRenderer {
    /// Renders `value`, or an error block when `error_text` is given.
    fn render_output(&mut self, value: &Value, error_text: Option<&str>);
}

/// Draws prose that already went through the overrides.
pub trait ProseRenderer {
    /// Renders prose blocks followed by their citations.
    fn render_prose(&mut self, blocks: &[ProseBlock], citations: &[SourceUrl]);
}

/// The component library: headers, badges and panels around content.
pub trait Chrome {
    /// Header of a tool call.
    fn tool_header(&mut self, tool: &ToolUnit, approval: ApprovalStatus);
    /// Reasoning panel.
    fn reasoning(&mut self, text: &str);
    /// Citation list without text.
    fn citations(&mut self, sources: &[SourceUrl]);
    /// Inline error block.
    fn error(&mut self, error: &ErrorPayload);
    /// File attachment.
    fn file(&mut self, file: &FilePart);
    /// Placeholder for an unknown part.
    fn unknown(&mut self) {}
}

/// The host's renderers, borrowed for one render pass.
pub struct Collaborators<'a> {
    pub chrome: &'a mut dyn Chrome,
    pub prose: &'a mut dyn ProseRenderer,
    pub output: &'a mut dyn OutputRenderer,
    pub charts: &'a mut dyn ChartRenderer,
    pub approvals: &'a dyn ApprovalHandler,
}

/// What a render pass drew.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    /// Charts rendered successfully.
    pub charts: usize,
    /// Charts that failed and fell back to structured output.
    pub chart_failures: usize,
}

/// Hands every unit of `plan` to the matching collaborator.
pub fn render_plan(plan: &RenderPlan, with: &mut Collaborators<'_>) -> RenderSummary {
    let mut summary = RenderSummary::default();

    for unit in &plan.units {
        match unit {
            RenderUnit::Prose { blocks, citations } => {
                render_prose_blocks(blocks, citations, with, &mut summary);
            }
            RenderUnit::Reasoning(text) => with.chrome.reasoning(text),
            RenderUnit::Citations(sources) => with.chrome.citations(sources),
            RenderUnit::Tool(tool) => {
                let approval = with.approvals.status(&tool.part.tool_call_id);
                with.chrome.tool_header(tool, approval);
                match &tool.view {
                    ToolView::Chart(spec) => {
                        draw_chart(spec, &tool.part.tool_call_id, with, &mut summary);
                    }
                    ToolView::Structured(value) => with.output.render_output(value, None),
                    ToolView::Error(text) => with
                        .output
                        .render_output(tool.part.output.as_ref().unwrap_or(&Value::Null), Some(text)),
                    ToolView::Pending
                    | ToolView::AwaitingApproval
                    | ToolView::Denied
                    | ToolView::Empty => {}
                }
                if let Some(captured) = &tool.captured {
                    render_prose_blocks(&captured.blocks, &captured.citations, with, &mut summary);
                }
            }
            RenderUnit::Error(error) => with.chrome.error(error),
            RenderUnit::File(file) => with.chrome.file(file),
            RenderUnit::Unknown => with.chrome.unknown(),
        }
    }

    summary
}

fn draw_chart(
    spec: &ChartSpec,
    target: &str,
    with: &mut Collaborators<'_>,
    summary: &mut RenderSummary,
) {
    match with.charts.render_chart(spec, target) {
        Ok(()) => summary.charts += 1,
        Err(e) => {
            log::warn!("chart for {target} failed to render: {e}");
            summary.chart_failures += 1;
            with
                .output
                .render_output(&spec.clone().into_value(), Some(&e.to_string()));
        }
    }
}

/// Chart blocks go to the chart renderer; runs of other blocks to prose.
fn render_prose_blocks(
    blocks: &[ProseBlock],
    citations: &[SourceUrl],
    with: &mut Collaborators<'_>,
    summary: &mut RenderSummary,
) {
    let mut start = 0;
    for (i, block) in blocks.iter().enumerate() {
        if let ProseBlock::Chart(spec) = block {
            if i > start {
                with.prose.render_prose(&blocks[start..i], &[]);
            }
            draw_chart(spec, "prose", with, summary);
            start = i + 1;
        }
    }
    if start < blocks.len() || !citations.is_empty() {
        with.prose.render_prose(&blocks[start..], citations);
    }
}
