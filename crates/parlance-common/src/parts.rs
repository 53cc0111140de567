//! Message parts as streamed by the assistant backend.
//!
//! An assistant message is an ordered list of [`MessagePart`]s. Order is the
//! arrival order from the backend and is significant: citations annotate the
//! text before them, and a text-streaming tool's answer arrives as the text
//! part right after the tool call.
//!
//! # Wire format
//!
//! Parts are internally tagged by a `type` field using the backend's
//! kebab-case names. Tags this crate does not know decode to
//! [`MessagePart::Unknown`] instead of failing, so a newer backend never
//! breaks rendering of an older client.
//!
//! ```
//! use parlance_common::parts::{MessagePart, PartKind, ToolState};
//! use serde_json::json;
//!
//! let parts: Vec<MessagePart> = serde_json::from_value(json!([
//!     { "type": "text", "text": "Paris is the capital" },
//!     { "type": "source-url", "url": "https://a.example" },
//!     {
//!         "type": "dynamic-tool",
//!         "toolCallId": "call_1",
//!         "toolName": "genie_query",
//!         "state": "output-available",
//!         "input": {},
//!         "output": { "columns": [], "rows": [] }
//!     },
//!     { "type": "step-start" }
//! ]))
//! .unwrap();
//!
//! assert_eq!(parts[1].kind(), PartKind::SourceUrl);
//! assert_eq!(parts[3].kind(), PartKind::Unknown);
//! if let MessagePart::DynamicTool(tool) = &parts[2] {
//!     assert_eq!(tool.state, ToolState::OutputAvailable);
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use typed_builder::TypedBuilder;
use uuid::Uuid;

const NAME_OPEN: &str = "<name>";
const NAME_CLOSE: &str = "</name>";

/// Lifecycle of a tool invocation.
///
/// The workflow is `input-streaming → input-available →
/// (approval-requested → approval-responded) → output-available |
/// output-denied`. Not every tool passes through the approval states.
/// `output-error` marks an execution that finished with `errorText`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum ToolState {
    /// The model is still streaming the tool arguments.
    InputStreaming,
    /// Arguments are complete; the tool is running.
    InputAvailable,
    /// Execution is blocked on a user decision.
    ApprovalRequested,
    /// The user decided; execution resumes or stops.
    ApprovalResponded,
    /// The tool returned a result.
    OutputAvailable,
    /// The user denied the call.
    OutputDenied,
    /// The tool failed.
    OutputError,
}

impl ToolState {
    /// Returns `true` while the call is waiting on the approval workflow.
    #[must_use]
    pub const fn awaits_approval(self) -> bool {
        matches!(self, Self::ApprovalRequested)
    }

    /// The backend's name for this state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InputStreaming => "input-streaming",
            Self::InputAvailable => "input-available",
            Self::ApprovalRequested => "approval-requested",
            Self::ApprovalResponded => "approval-responded",
            Self::OutputAvailable => "output-available",
            Self::OutputDenied => "output-denied",
            Self::OutputError => "output-error",
        }
    }
}

/// Approval bookkeeping attached to a tool call that required consent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalMetadata {
    /// Identifier of the approval request.
    pub id: String,
    /// The decision, once one was made.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
    /// Optional reason given with the decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A tool invocation and everything known about it so far.
///
/// # Examples
///
/// ```
/// use parlance_common::parts::{DynamicToolPart, ToolState};
/// use serde_json::json;
///
/// let tool = DynamicToolPart::builder()
///     .tool_call_id("call_1")
///     .tool_name("weather_lookup")
///     .state(ToolState::OutputAvailable)
///     .output(json!({ "temp": 18 }))
///     .build();
///
/// assert!(!tool.has_error());
/// assert_eq!(tool.display_output(), Some(&json!({ "temp": 18 })));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct DynamicToolPart {
    /// Identifier correlating the call with its result and approval.
    #[builder(setter(into))]
    pub tool_call_id: String,
    /// Name of the tool as registered with the backend.
    #[builder(setter(into))]
    pub tool_name: String,
    /// Current lifecycle state.
    pub state: ToolState,
    /// Arguments passed to the tool, possibly partial while streaming.
    #[serde(default)]
    #[builder(default)]
    pub input: Value,
    /// The value the tool returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub output: Option<Value>,
    /// Error text reported by the tool or the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option, into))]
    pub error_text: Option<String>,
    /// Whether the provider ran the tool itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub provider_executed: Option<bool>,
    /// Approval request details, for tools that require consent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub approval: Option<ApprovalMetadata>,
}

impl DynamicToolPart {
    /// Returns `true` if the call carries error text.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error_text.as_deref().is_some_and(|e| !e.is_empty())
    }

    /// The output to display, or `None` when the call errored.
    ///
    /// Chart detection never runs against an erroring call, so callers
    /// should go through this accessor rather than reading `output`.
    #[must_use]
    pub fn display_output(&self) -> Option<&Value> {
        if self.has_error() {
            return None;
        }
        self.output.as_ref()
    }
}

/// A citation attached to the text before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUrl {
    /// Target of the citation.
    pub url: String,
    /// Display title, when the backend supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl SourceUrl {
    /// Host portion of the URL, if it parses.
    #[must_use]
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    /// Title if present, otherwise the host, otherwise the raw URL.
    #[must_use]
    pub fn label(&self) -> String {
        self.title
            .clone()
            .or_else(|| self.host())
            .unwrap_or_else(|| self.url.clone())
    }
}

/// Error surfaced by the backend as a message part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Human-readable error.
    pub message: String,
    /// Machine-readable code, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Whether the error belongs inline in the message. Out-of-band errors
    /// are shown elsewhere by the host and filtered before segmentation.
    #[serde(default = "default_inline")]
    pub inline: bool,
}

const fn default_inline() -> bool {
    true
}

/// A file attached to the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePart {
    /// Location of the file content.
    pub url: String,
    /// Original filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// MIME type of the content.
    pub media_type: String,
}

/// Discriminant of a [`MessagePart`], used to dispatch segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    /// Prose, including name markers.
    Text,
    /// Model reasoning.
    Reasoning,
    /// A citation.
    SourceUrl,
    /// A tool call.
    DynamicTool,
    /// An error reported by the backend.
    DataError,
    /// An attached file.
    File,
    /// A part type this crate does not understand.
    Unknown,
}

/// One fragment of an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessagePart {
    /// Prose from the model.
    Text {
        /// Markdown text.
        text: String,
    },
    /// The model's visible reasoning.
    Reasoning {
        /// Reasoning text.
        text: String,
    },
    /// A citation.
    SourceUrl(SourceUrl),
    /// A tool call and its lifecycle.
    DynamicTool(DynamicToolPart),
    /// An error reported by the backend.
    DataError {
        /// The error.
        data: ErrorPayload,
    },
    /// An attached file.
    File(FilePart),
    /// Any part type this crate does not understand.
    #[serde(other)]
    Unknown,
}

impl MessagePart {
    /// Creates a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Creates a reasoning part.
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::Reasoning { text: text.into() }
    }

    /// Creates a citation part without a title.
    pub fn source_url(url: impl Into<String>) -> Self {
        Self::SourceUrl(SourceUrl {
            url: url.into(),
            title: None,
        })
    }

    /// Creates a name marker part for the given display name.
    pub fn name_marker_for(name: &str) -> Self {
        Self::text(format!("{NAME_OPEN}{name}{NAME_CLOSE}"))
    }

    /// The discriminant of this part.
    #[must_use]
    pub const fn kind(&self) -> PartKind {
        match self {
            Self::Text { .. } => PartKind::Text,
            Self::Reasoning { .. } => PartKind::Reasoning,
            Self::SourceUrl(_) => PartKind::SourceUrl,
            Self::DynamicTool(_) => PartKind::DynamicTool,
            Self::DataError { .. } => PartKind::DataError,
            Self::File(_) => PartKind::File,
            Self::Unknown => PartKind::Unknown,
        }
    }

    /// The text of a text part.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// The tool call of a dynamic-tool part.
    #[must_use]
    pub const fn as_tool(&self) -> Option<&DynamicToolPart> {
        match self {
            Self::DynamicTool(tool) => Some(tool),
            _ => None,
        }
    }

    /// The display name carried by a name marker part.
    ///
    /// A name marker is a text part whose trimmed content is exactly
    /// `<name>…</name>`. It labels a tool header elsewhere and is never
    /// shown as prose.
    #[must_use]
    pub fn name_marker(&self) -> Option<&str> {
        let inner = self
            .as_text()?
            .trim()
            .strip_prefix(NAME_OPEN)?
            .strip_suffix(NAME_CLOSE)?;
        // A second tag means there is content between two markers.
        if inner.contains(NAME_OPEN) || inner.contains(NAME_CLOSE) {
            return None;
        }
        Some(inner.trim())
    }

    /// Returns `true` for name marker parts.
    #[must_use]
    pub fn is_name_marker(&self) -> bool {
        self.name_marker().is_some()
    }

    /// Returns `false` for error parts the host shows out of band.
    #[must_use]
    pub const fn is_inline(&self) -> bool {
        match self {
            Self::DataError { data } => data.inline,
            _ => true,
        }
    }
}

/// Who authored a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A message and its parts, one entry of a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct ChatMessage {
    /// Unique identifier; generated when absent from the input.
    #[serde(default = "Uuid::new_v4")]
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,
    /// Author of the message.
    pub role: MessageRole,
    /// Parts in stream order.
    #[serde(default)]
    #[builder(default)]
    pub parts: Vec<MessagePart>,
    /// When the message was created.
    #[serde(default = "Utc::now", rename = "createdAt")]
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Creates an assistant message from its parts.
    #[must_use]
    pub fn assistant(parts: Vec<MessagePart>) -> Self {
        Self::builder()
            .role(MessageRole::Assistant)
            .parts(parts)
            .build()
    }

    /// Creates a user message holding a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self::builder()
            .role(MessageRole::User)
            .parts(vec![MessagePart::text(text)])
            .build()
    }
}
