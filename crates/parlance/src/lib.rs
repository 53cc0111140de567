//! # parlance
//!
//! Turns the parts of an assistant message into an ordered list of things
//! to draw.
//!
//! A message arrives as a flat list of parts: prose, reasoning, citations,
//! tool calls, files and errors. Rendering it well needs a few decisions
//! that a naive part-by-part loop gets wrong: citations belong to the text
//! before them, text streamed by some tools belongs inside that tool, and
//! a chart may hide inside a table cell or a JSON string.
//!
//! ## Quick Start
//!
//! ```rust
//! use parlance::{classify, segment, RenderConfig, RenderPlan, RenderUnit};
//! use parlance_common::{ChatMessage, DynamicToolPart, MessagePart, ToolState};
//! use serde_json::json;
//!
//! // A chart wrapped in a SQL-style result
//! let output = json!({
//!     "columns": ["spec"],
//!     "rows": [["{\"mark\":\"bar\",\"data\":{\"values\":[]}}"]]
//! });
//! assert!(classify(&output).is_some());
//!
//! // Citations group with the text they follow
//! let parts = vec![
//!     MessagePart::text("Paris is the capital."),
//!     MessagePart::source_url("https://en.wikipedia.org/wiki/Paris"),
//! ];
//! assert_eq!(segment(&parts).len(), 1);
//!
//! // The full pipeline
//! let message = ChatMessage::assistant(vec![
//!     MessagePart::DynamicTool(
//!         DynamicToolPart::builder()
//!             .tool_call_id("call_1")
//!             .tool_name("genie_query")
//!             .state(ToolState::OutputAvailable)
//!             .build(),
//!     ),
//!     MessagePart::text("| region | sales |"),
//! ]);
//! let plan = RenderPlan::build(&message, &RenderConfig::default());
//! assert_eq!(plan.units.len(), 1);
//! assert!(matches!(plan.units[0], RenderUnit::Tool(_)));
//! ```
//!
//! ## Features
//!
//! - **Segmentation**: groups parts into visual units and suppresses name markers
//! - **Stream capture**: attaches streamed text to text-streaming tools
//! - **Chart detection**: finds chart specs in direct, tabular, enveloped and encoded output
//! - **Prose overrides**: hides chart fences and images duplicated by tool output
//! - **Approvals**: tracks approve/deny decisions for gated tool calls

pub mod approval;
pub mod capture;
pub mod classify;
pub mod config;
pub mod error;
pub mod prose;
pub mod render;
pub mod segment;

pub use approval::{ApprovalHandler, ApprovalQueue, ApprovalStatus, Decision};
pub use capture::{Capture, StreamCapture, StreamingToolMatcher};
pub use classify::{DEFAULT_MAX_DECODE_DEPTH, OutputClassifier, OutputShape, classify};
pub use config::RenderConfig;
pub use error::{ApprovalError, Error, RenderError, Result};
pub use prose::{ProseBlock, ProseOverrides, split_prose};
pub use render::{
    CapturedText, ChartRenderer, Chrome, Collaborators, ExportFormat, OutputRenderer,
    ProseRenderer, RenderPlan, RenderSummary, RenderUnit, ToolUnit, ToolView, render_plan,
};
pub use segment::{Segment, inline_parts, segment, segment_with};
