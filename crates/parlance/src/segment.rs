//! Grouping of message parts into renderable segments.
//!
//! A segment is one or more adjacent parts that render as a single visual
//! unit. Segmentation is a partition: concatenating the parts of every
//! segment, in order, gives back the input exactly.
//!
//! Grouping rules, applied in one pass:
//!
//! - A name marker (`<name>…</name>` text) is a segment of its own, flagged
//!   suppressed. It labels a tool header and is never shown as prose.
//! - A citation joins the preceding segment when that segment ends in
//!   ordinary text or another citation, so citations stay with the text
//!   they annotate.
//! - Ordinary text joins a preceding run of citations that has no text yet,
//!   so `[url, url, text]` is one segment just like `[text, url, url]`.
//! - Every other part starts a new one-part segment. Unknown part types are
//!   tolerated and get a segment like anything else.

use parlance_common::{
    DynamicToolPart, MessagePart, NoopObserver, PartKind, PipelineEvent, PipelineObserver,
    SourceUrl,
};
use smallvec::{SmallVec, smallvec};

/// Adjacent parts rendered as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    parts: SmallVec<[MessagePart; 2]>,
    leading: PartKind,
    suppressed: bool,
}

impl Segment {
    fn open(part: MessagePart) -> Self {
        let leading = part.kind();
        let suppressed = part.is_name_marker();
        Self {
            parts: smallvec![part],
            leading,
            suppressed,
        }
    }

    fn is_citation_run(&self) -> bool {
        !self.suppressed && self.parts.iter().all(|p| p.kind() == PartKind::SourceUrl)
    }

    fn accepts_citation(&self) -> bool {
        !self.suppressed
            && self
                .parts
                .last()
                .is_some_and(|p| matches!(p.kind(), PartKind::Text | PartKind::SourceUrl))
    }

    /// The parts of this segment, never empty.
    #[must_use]
    pub fn parts(&self) -> &[MessagePart] {
        &self.parts
    }

    /// Consumes the segment, returning its parts.
    #[must_use]
    pub fn into_parts(self) -> Vec<MessagePart> {
        self.parts.into_vec()
    }

    /// Kind used to dispatch rendering: `Text` once the segment holds
    /// prose, otherwise the kind of its first part.
    #[must_use]
    pub const fn leading(&self) -> PartKind {
        self.leading
    }

    /// Returns `true` if the segment must not be rendered on its own.
    #[must_use]
    pub const fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    /// The first part.
    #[must_use]
    pub fn first(&self) -> &MessagePart {
        // Segments are only built by `Segment::open`, which seeds one part.
        &self.parts[0]
    }

    /// The tool call, for a segment led by a dynamic-tool part.
    #[must_use]
    pub fn tool(&self) -> Option<&DynamicToolPart> {
        self.first().as_tool()
    }

    /// The prose text, for a segment that is not a name marker.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        if self.suppressed {
            return None;
        }
        self.parts.iter().find_map(MessagePart::as_text)
    }

    /// The display name, for a suppressed name marker segment.
    #[must_use]
    pub fn name_marker(&self) -> Option<&str> {
        self.first().name_marker()
    }

    /// Citations in this segment, in order.
    pub fn citations(&self) -> impl Iterator<Item = &SourceUrl> {
        self.parts.iter().filter_map(|p| match p {
            MessagePart::SourceUrl(src) => Some(src),
            _ => None,
        })
    }

    /// Returns `true` for a text segment that is shown as prose.
    #[must_use]
    pub fn is_prose(&self) -> bool {
        self.leading == PartKind::Text && !self.suppressed
    }
}

/// Drops error parts that the host shows out of band.
#[must_use]
pub fn inline_parts(parts: &[MessagePart]) -> Vec<MessagePart> {
    parts.iter().filter(|p| p.is_inline()).cloned().collect()
}

/// Segments a message's parts.
#[must_use]
pub fn segment(parts: &[MessagePart]) -> Vec<Segment> {
    segment_with(parts, &NoopObserver)
}

/// Segments a message's parts, reporting each decision to `observer`.
pub fn segment_with(parts: &[MessagePart], observer: &dyn PipelineObserver) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::with_capacity(parts.len());

    for part in parts {
        if part.kind() == PartKind::SourceUrl
            && let Some(last) = segments.last_mut()
            && last.accepts_citation()
        {
            last.parts.push(part.clone());
            observer.observe(&PipelineEvent::CitationGrouped {
                index: segments.len() - 1,
            });
            continue;
        }

        if part.kind() == PartKind::Text
            && !part.is_name_marker()
            && let Some(last) = segments.last_mut()
            && last.is_citation_run()
        {
            last.parts.push(part.clone());
            last.leading = PartKind::Text;
            observer.observe(&PipelineEvent::TextGrouped {
                index: segments.len() - 1,
            });
            continue;
        }

        let segment = Segment::open(part.clone());
        let index = segments.len();
        observer.observe(&PipelineEvent::SegmentOpened {
            index,
            leading: segment.leading,
        });
        if let Some(name) = segment.name_marker() {
            observer.observe(&PipelineEvent::NameSuppressed {
                index,
                name: name.to_string(),
            });
        }
        segments.push(segment);
    }

    segments
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use parlance_common::{ErrorPayload, FilePart, RecordingObserver, ToolState};
    use proptest::prelude::*;

    fn tool(name: &str) -> MessagePart {
        MessagePart::DynamicTool(
            DynamicToolPart::builder()
                .tool_call_id(format!("call_{name}"))
                .tool_name(name)
                .state(ToolState::OutputAvailable)
                .build(),
        )
    }

    fn flatten(segments: &[Segment]) -> Vec<MessagePart> {
        segments.iter().flat_map(|s| s.parts().to_vec()).collect()
    }

    #[test]
    fn test_text_with_citations_is_one_segment() {
        let parts = vec![
            MessagePart::text("Paris is the capital"),
            MessagePart::source_url("https://a"),
            MessagePart::source_url("https://b"),
        ];
        let segments = segment(&parts);

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].parts().len(), 3);
        assert_eq!(segments[0].leading(), PartKind::Text);
        assert_eq!(segments[0].citations().count(), 2);
    }

    #[test]
    fn test_name_marker_is_suppressed_anywhere() {
        let parts = vec![
            MessagePart::name_marker_for("agent"),
            MessagePart::text("hello"),
            MessagePart::name_marker_for("genie"),
        ];
        let segments = segment(&parts);

        assert_eq!(segments.len(), 3);
        assert!(segments[0].is_suppressed());
        assert!(!segments[1].is_suppressed());
        assert!(segments[2].is_suppressed());
        assert_eq!(segments[2].name_marker(), Some("genie"));
        assert!(!segments[2].is_prose());
    }

    #[test]
    fn test_citation_after_name_marker_starts_new_segment() {
        let parts = vec![
            MessagePart::name_marker_for("agent"),
            MessagePart::source_url("https://a"),
            MessagePart::source_url("https://b"),
        ];
        let segments = segment(&parts);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].leading(), PartKind::SourceUrl);
        assert_eq!(segments[1].parts().len(), 2);
    }

    #[test]
    fn test_citation_after_tool_is_orphaned() {
        let parts = vec![tool("search"), MessagePart::source_url("https://a")];
        let segments = segment(&parts);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].leading(), PartKind::SourceUrl);
        assert!(segments[1].text().is_none());
    }

    #[test]
    fn test_text_after_citations_is_one_segment() {
        let parts = vec![
            MessagePart::source_url("https://a"),
            MessagePart::source_url("https://b"),
            MessagePart::text("Paris is the capital"),
        ];
        let segments = segment(&parts);

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].parts().len(), 3);
        assert_eq!(segments[0].leading(), PartKind::Text);
        assert!(segments[0].is_prose());
        assert_eq!(segments[0].text(), Some("Paris is the capital"));
        assert_eq!(segments[0].citations().count(), 2);
    }

    #[test]
    fn test_citations_take_one_text_only() {
        let parts = vec![
            tool("search"),
            MessagePart::source_url("https://a"),
            MessagePart::text("first"),
            MessagePart::source_url("https://b"),
            MessagePart::text("second"),
            MessagePart::source_url("https://c"),
            MessagePart::name_marker_for("agent"),
        ];
        let segments = segment(&parts);

        assert_eq!(segments.len(), 4);
        assert_eq!(segments[1].parts().len(), 3);
        assert_eq!(segments[1].text(), Some("first"));
        assert_eq!(segments[2].leading(), PartKind::Text);
        assert_eq!(segments[2].text(), Some("second"));
        assert_eq!(segments[2].citations().count(), 1);
        assert!(segments[3].is_suppressed());
    }

    #[test]
    fn test_name_marker_does_not_join_citations() {
        let parts = vec![
            MessagePart::source_url("https://a"),
            MessagePart::name_marker_for("genie"),
        ];
        let segments = segment(&parts);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].leading(), PartKind::SourceUrl);
        assert!(segments[1].text().is_none());
        assert_eq!(segments[1].name_marker(), Some("genie"));
    }

    #[test]
    fn test_other_parts_stand_alone() {
        let parts = vec![
            MessagePart::reasoning("thinking"),
            MessagePart::reasoning("more"),
            tool("a"),
            tool("b"),
            MessagePart::text("one"),
            MessagePart::text("two"),
            MessagePart::Unknown,
        ];
        let segments = segment(&parts);

        assert_eq!(segments.len(), parts.len());
        assert!(segments.iter().all(|s| s.parts().len() == 1));
        assert_eq!(segments[6].leading(), PartKind::Unknown);
    }

    #[test]
    fn test_inline_parts_filters_out_of_band_errors() {
        let parts = vec![
            MessagePart::text("a"),
            MessagePart::DataError {
                data: ErrorPayload {
                    message: "quota".to_string(),
                    code: None,
                    inline: false,
                },
            },
            MessagePart::DataError {
                data: ErrorPayload {
                    message: "tool failed".to_string(),
                    code: Some("E1".to_string()),
                    inline: true,
                },
            },
        ];
        let kept = inline_parts(&parts);
        assert_eq!(kept.len(), 2);
        assert_eq!(segment(&kept)[1].leading(), PartKind::DataError);
    }

    #[test]
    fn test_observer_sees_decisions() {
        let recorder = RecordingObserver::new();
        let parts = vec![
            MessagePart::name_marker_for("genie"),
            MessagePart::text("x"),
            MessagePart::source_url("https://a"),
        ];
        let segments = segment_with(&parts, &recorder);

        assert_eq!(segments, segment(&parts));
        let events = recorder.take();
        assert!(events.contains(&PipelineEvent::NameSuppressed {
            index: 0,
            name: "genie".to_string()
        }));
        assert!(events.contains(&PipelineEvent::CitationGrouped { index: 1 }));

        let leading_citation = [MessagePart::source_url("https://a"), MessagePart::text("x")];
        segment_with(&leading_citation, &recorder);
        assert!(recorder.take().contains(&PipelineEvent::TextGrouped { index: 0 }));
    }

    #[test]
    fn test_empty_input() {
        assert!(segment(&[]).is_empty());
    }

    fn arb_part() -> impl Strategy<Value = MessagePart> {
        prop_oneof![
            "[a-z ]{0,12}".prop_map(MessagePart::text),
            "[a-z]{1,6}".prop_map(|n| MessagePart::name_marker_for(&n)),
            "[a-z]{0,8}".prop_map(MessagePart::reasoning),
            "[a-z]{1,6}".prop_map(|h| MessagePart::source_url(format!("https://{h}"))),
            "[a-z_]{1,10}".prop_map(|n| tool(&n)),
            ("[a-z]{1,8}", any::<bool>()).prop_map(|(message, inline)| MessagePart::DataError {
                data: ErrorPayload {
                    message,
                    code: None,
                    inline,
                },
            }),
            "[a-z]{1,8}".prop_map(|name| MessagePart::File(FilePart {
                url: format!("https://files/{name}"),
                filename: Some(name),
                media_type: "text/csv".to_string(),
            })),
            Just(MessagePart::Unknown),
        ]
    }

    /// Parts, with runs of citations placed in front of text.
    fn arb_parts() -> impl Strategy<Value = Vec<MessagePart>> {
        prop::collection::vec(
            prop_oneof![
                3 => arb_part().prop_map(|p| vec![p]),
                1 => (1usize..4, "[a-z ]{1,12}").prop_map(|(n, text)| {
                    let mut run: Vec<MessagePart> = (0..n)
                        .map(|i| MessagePart::source_url(format!("https://src/{i}")))
                        .collect();
                    run.push(MessagePart::text(text));
                    run
                }),
            ],
            0..20,
        )
        .prop_map(|chunks| chunks.into_iter().flatten().collect())
    }

    proptest! {
        #[test]
        fn prop_segmentation_is_a_partition(parts in arb_parts()) {
            let segments = segment(&parts);
            prop_assert_eq!(flatten(&segments), parts.clone());
            prop_assert!(segments.iter().all(|s| !s.parts().is_empty()));
            for s in &segments {
                let texts = s
                    .parts()
                    .iter()
                    .filter(|p| p.kind() == PartKind::Text)
                    .count();
                prop_assert!(texts <= 1);
                let expected = if texts == 1 { PartKind::Text } else { s.first().kind() };
                prop_assert_eq!(s.leading(), expected);
                prop_assert_eq!(s.is_suppressed(), s.first().is_name_marker());
                if s.parts().len() > 1 {
                    prop_assert!(!s.is_suppressed());
                    prop_assert!(s.parts().iter().all(|p| matches!(
                        p.kind(),
                        PartKind::Text | PartKind::SourceUrl
                    )));
                }
            }
        }

        #[test]
        fn prop_citations_before_text_are_grouped(n in 1usize..5, text in "[a-z ]{1,12}") {
            let mut parts: Vec<MessagePart> = (0..n)
                .map(|i| MessagePart::source_url(format!("https://src/{i}")))
                .collect();
            parts.push(MessagePart::text(text));
            let segments = segment(&parts);
            prop_assert_eq!(segments.len(), 1);
            prop_assert!(segments[0].is_prose());
            prop_assert_eq!(segments[0].citations().count(), n);
        }

        #[test]
        fn prop_segmentation_is_idempotent(parts in arb_parts()) {
            prop_assert_eq!(segment(&parts), segment(&parts));
        }
    }
}
