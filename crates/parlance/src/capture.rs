//! Attaching streamed text to the tool that produced it.
//!
//! Text-streaming tools deliver their answer as the text part right after
//! the call rather than as structured output. That text belongs inside the
//! tool's display, not next to it as model commentary.
//!
//! [`StreamCapture`] walks the segment list once. A text segment is captured
//! when the nearest preceding segment, skipping reasoning and suppressed
//! name markers, is a text-streaming tool. Only the first such text is
//! captured; anything else in between (another tool, another text, a file,
//! an error, the start of the message) prevents capture.

use parlance_common::{
    DynamicToolPart, NoopObserver, PartKind, PipelineEvent, PipelineObserver,
};

use crate::config::RenderConfig;
use crate::segment::Segment;

/// A text segment claimed by a tool as its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Call that owns the text.
    pub tool_call_id: String,
    /// Name of that tool.
    pub tool_name: String,
    /// Position of the tool segment.
    pub tool_index: usize,
}

/// Decides which tools stream their answer as trailing text.
///
/// Matching is case-insensitive substring containment on the tool name,
/// so unrelated tools that happen to contain a keyword also match.
#[derive(Debug, Clone)]
pub struct StreamingToolMatcher {
    keywords: Vec<String>,
}

impl StreamingToolMatcher {
    /// Creates a matcher from keywords.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Creates a matcher from the configured keywords.
    #[must_use]
    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(&config.text_streaming_tools)
    }

    /// Returns `true` if the tool streams its answer as text.
    #[must_use]
    pub fn matches(&self, tool_name: &str) -> bool {
        let name = tool_name.to_lowercase();
        let hit = self.keywords.iter().find(|k| name.contains(k.as_str()));
        if let Some(keyword) = hit {
            log::debug!("tool '{tool_name}' treated as text-streaming (keyword '{keyword}')");
        }
        hit.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
struct ToolRef<'a> {
    index: usize,
    part: &'a DynamicToolPart,
}

/// Position of the scan relative to the last segment that matters.
#[derive(Debug, Clone, Copy)]
enum ScanState<'a> {
    /// Nothing that could own text precedes.
    Scanning,
    /// Inside a run of reasoning or name segments, possibly after a tool.
    FoundReasoningOrName(Option<ToolRef<'a>>),
    /// A text-streaming tool was the last segment.
    FoundTool(ToolRef<'a>),
    /// An uncaptured text segment was the last segment.
    ///
    /// Behaves like `Scanning`. Kept distinct so the per-segment trace log
    /// shows free-standing prose apart from segments that can never own text.
    FoundOtherText,
    /// The last segment was text captured by a tool.
    Done,
}

impl<'a> ScanState<'a> {
    const fn pending_tool(self) -> Option<ToolRef<'a>> {
        match self {
            Self::FoundTool(tool) | Self::FoundReasoningOrName(Some(tool)) => Some(tool),
            _ => None,
        }
    }
}

/// Single-pass capture of streamed tool text.
#[derive(Debug, Clone)]
pub struct StreamCapture {
    matcher: StreamingToolMatcher,
}

impl StreamCapture {
    /// Creates a capture pass with the given matcher.
    #[must_use]
    pub const fn new(matcher: StreamingToolMatcher) -> Self {
        Self { matcher }
    }

    /// Creates a capture pass from configuration.
    #[must_use]
    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(StreamingToolMatcher::from_config(config))
    }

    /// Returns one entry per segment; `Some` marks a captured text segment.
    #[must_use]
    pub fn scan(&self, segments: &[Segment]) -> Vec<Option<Capture>> {
        self.scan_with(segments, &NoopObserver)
    }

    /// Like [`scan`](Self::scan), reporting captures to `observer`.
    pub fn scan_with(
        &self,
        segments: &[Segment],
        observer: &dyn PipelineObserver,
    ) -> Vec<Option<Capture>> {
        let mut state = ScanState::Scanning;
        let mut captures = Vec::with_capacity(segments.len());

        for (index, segment) in segments.iter().enumerate() {
            let mut captured = None;

            state = if segment.is_suppressed() || segment.leading() == PartKind::Reasoning {
                ScanState::FoundReasoningOrName(state.pending_tool())
            } else {
                match segment.leading() {
                    PartKind::DynamicTool => match segment.tool() {
                        Some(part) if self.matcher.matches(&part.tool_name) => {
                            ScanState::FoundTool(ToolRef { index, part })
                        }
                        _ => ScanState::Scanning,
                    },
                    PartKind::Text => {
                        if let Some(tool) = state.pending_tool() {
                            observer.observe(&PipelineEvent::TextCaptured {
                                index,
                                tool_call_id: tool.part.tool_call_id.clone(),
                            });
                            captured = Some(Capture {
                                tool_call_id: tool.part.tool_call_id.clone(),
                                tool_name: tool.part.tool_name.clone(),
                                tool_index: tool.index,
                            });
                            ScanState::Done
                        } else {
                            ScanState::FoundOtherText
                        }
                    }
                    _ => ScanState::Scanning,
                }
            };

            log::trace!("capture: segment {index} -> {state:?}");
            captures.push(captured);
        }

        captures
    }
}

impl Default for StreamCapture {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::segment::segment;
    use parlance_common::{FilePart, MessagePart, ToolState};

    fn tool(name: &str) -> MessagePart {
        MessagePart::DynamicTool(
            DynamicToolPart::builder()
                .tool_call_id(format!("call_{name}"))
                .tool_name(name)
                .state(ToolState::OutputAvailable)
                .build(),
        )
    }

    fn captured(parts: &[MessagePart]) -> Vec<Option<Capture>> {
        StreamCapture::default().scan(&segment(parts))
    }

    #[test]
    fn test_text_after_streaming_tool_is_captured() {
        let result = captured(&[tool("genie_query"), MessagePart::text("| col1 | col2 |\n...")]);
        assert_eq!(result[0], None);
        let capture = result[1].as_ref().unwrap();
        assert_eq!(capture.tool_call_id, "call_genie_query");
        assert_eq!(capture.tool_index, 0);
    }

    #[test]
    fn test_text_after_other_tool_renders_independently() {
        let result = captured(&[tool("weather_lookup"), MessagePart::text("It is sunny")]);
        assert!(result.iter().all(Option::is_none));
    }

    #[test]
    fn test_reasoning_and_names_are_skipped() {
        let result = captured(&[
            tool("genie_space"),
            MessagePart::reasoning("reading the table"),
            MessagePart::name_marker_for("genie"),
            MessagePart::reasoning("done"),
            MessagePart::text("answer"),
        ]);
        assert_eq!(result[4].as_ref().unwrap().tool_index, 0);
    }

    #[test]
    fn test_only_first_text_is_captured() {
        let result = captured(&[
            tool("genie"),
            MessagePart::text("table"),
            MessagePart::text("commentary"),
            MessagePart::reasoning("hmm"),
            MessagePart::text("more commentary"),
        ]);
        assert!(result[1].is_some());
        assert!(result[2].is_none());
        assert!(result[4].is_none());
    }

    #[test]
    fn test_intervening_segments_block_capture() {
        let file = MessagePart::File(FilePart {
            url: "https://f".to_string(),
            filename: None,
            media_type: "text/csv".to_string(),
        });
        let result = captured(&[tool("genie"), file, MessagePart::text("x")]);
        assert!(result[2].is_none());

        let result = captured(&[tool("genie"), tool("weather"), MessagePart::text("x")]);
        assert!(result[2].is_none());
    }

    #[test]
    fn test_text_without_tool_is_not_captured() {
        let result = captured(&[MessagePart::reasoning("r"), MessagePart::text("x")]);
        assert!(result.iter().all(Option::is_none));
    }

    #[test]
    fn test_each_streaming_tool_captures_its_own_text() {
        let result = captured(&[
            tool("genie_a"),
            MessagePart::text("first"),
            tool("genie_b"),
            MessagePart::text("second"),
        ]);
        assert_eq!(result[1].as_ref().unwrap().tool_name, "genie_a");
        assert_eq!(result[3].as_ref().unwrap().tool_name, "genie_b");
    }

    #[test]
    fn test_text_with_citations_can_be_captured() {
        let result = captured(&[
            tool("genie"),
            MessagePart::text("answer"),
            MessagePart::source_url("https://a"),
        ]);
        assert_eq!(result.len(), 2);
        assert!(result[1].is_some());
    }

    #[test]
    fn test_citations_before_text_are_captured_with_it() {
        let result = captured(&[
            tool("genie"),
            MessagePart::source_url("https://a"),
            MessagePart::text("answer"),
        ]);
        assert_eq!(result.len(), 2);
        assert_eq!(result[1].as_ref().unwrap().tool_index, 0);

        let result = captured(&[
            tool("genie"),
            MessagePart::source_url("https://a"),
            tool("weather"),
            MessagePart::text("answer"),
        ]);
        assert!(result.iter().all(Option::is_none));
    }

    #[test]
    fn test_matcher_is_case_insensitive_substring() {
        let matcher = StreamingToolMatcher::new(["Genie", " "]);
        assert!(matcher.matches("query_GENIE_space"));
        assert!(matcher.matches("eugenie_lookup"));
        assert!(!matcher.matches("weather"));
        assert!(!StreamingToolMatcher::new(Vec::<String>::new()).matches("genie"));
    }
}
