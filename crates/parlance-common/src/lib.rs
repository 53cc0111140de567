//! # parlance-common
//!
//! Shared types for rendering assistant conversations.
//!
//! This crate provides the data the rendering pipeline works on:
//! - Message parts as streamed by the backend, and the tool call lifecycle
//! - Chart specifications and tabular results found in tool output
//! - Events the pipeline reports to an optional observer
//!
//! ## Example
//!
//! ```
//! use parlance_common::{ChartSpec, ChatMessage, DynamicToolPart, MessagePart, ToolState};
//! use serde_json::json;
//!
//! let tool = DynamicToolPart::builder()
//!     .tool_call_id("call_1")
//!     .tool_name("genie_query")
//!     .state(ToolState::OutputAvailable)
//!     .output(json!({ "mark": "bar", "data": { "values": [] } }))
//!     .build();
//!
//! let message = ChatMessage::assistant(vec![
//!     MessagePart::name_marker_for("genie"),
//!     MessagePart::DynamicTool(tool),
//!     MessagePart::text("| region | sales |"),
//! ]);
//!
//! assert_eq!(message.parts.len(), 3);
//! assert!(message.parts[0].is_name_marker());
//! let output = message.parts[1].as_tool().and_then(|t| t.display_output()).unwrap();
//! assert!(ChartSpec::recognize(output).is_some());
//! ```

/// Chart specifications and tabular results.
pub mod chart;
/// Pipeline instrumentation events and observers.
pub mod events;
/// Message parts, tool states and messages.
pub mod parts;

pub use chart::{ChartSpec, TabularResult};
pub use events::{
    ClassifierBranch, LogObserver, NoopObserver, PipelineEvent, PipelineObserver,
    RecordingObserver,
};
pub use parts::{
    ApprovalMetadata, ChatMessage, DynamicToolPart, ErrorPayload, FilePart, MessagePart,
    MessageRole, PartKind, SourceUrl, ToolState,
};
