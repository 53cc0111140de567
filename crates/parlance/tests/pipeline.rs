//! End-to-end rendering of recorded transcripts.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use parlance::{
    ApprovalHandler, ApprovalQueue, ApprovalStatus, ProseBlock, RenderConfig, RenderPlan,
    RenderUnit, ToolUnit, ToolView, classify, segment,
};
use parlance_common::{
    ChatMessage, ClassifierBranch, DynamicToolPart, MessagePart, MessageRole, PipelineEvent,
    RecordingObserver, ToolState,
};
use serde_json::json;

fn transcript() -> Vec<ChatMessage> {
    let raw = include_str!("fixtures/transcript.json");
    serde_json::from_str(raw).expect("fixture should deserialize")
}

fn assistant() -> ChatMessage {
    transcript()
        .into_iter()
        .find(|m| m.role == MessageRole::Assistant)
        .unwrap()
}

fn tools(plan: &RenderPlan) -> Vec<&ToolUnit> {
    plan.units
        .iter()
        .filter_map(|u| match u {
            RenderUnit::Tool(t) => Some(&**t),
            _ => None,
        })
        .collect()
}

#[test]
fn test_transcript_plans_in_display_order() {
    let plan = RenderPlan::build(&assistant(), &RenderConfig::default());

    let kinds: Vec<&str> = plan
        .units
        .iter()
        .map(|u| match u {
            RenderUnit::Prose { .. } => "prose",
            RenderUnit::Reasoning(_) => "reasoning",
            RenderUnit::Citations(_) => "citations",
            RenderUnit::Tool(_) => "tool",
            RenderUnit::Error(_) => "error",
            RenderUnit::File(_) => "file",
            RenderUnit::Unknown => "unknown",
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["unknown", "reasoning", "tool", "prose", "tool", "error", "file"]
    );
}

#[test]
fn test_genie_tool_owns_its_table_and_chart() {
    let plan = RenderPlan::build(&assistant(), &RenderConfig::default());
    let genie = tools(&plan)[0];

    assert_eq!(genie.title(), "Sales Genie");
    let ToolView::Chart(spec) = &genie.view else {
        unreachable!("expected a chart, got {:?}", genie.view);
    };
    assert_eq!(spec.mark(), Some("bar"));
    assert_eq!(spec.data_row_count(), Some(2));

    let captured = genie.captured.as_ref().unwrap();
    assert!(
        matches!(&captured.blocks[0], ProseBlock::Text(t) if t.starts_with("| region | sales |"))
    );
}

#[test]
fn test_commentary_hides_duplicate_chart() {
    let plan = RenderPlan::build(&assistant(), &RenderConfig::default());
    let (blocks, citations) = plan
        .units
        .iter()
        .find_map(|u| match u {
            RenderUnit::Prose { blocks, citations } => Some((blocks, citations)),
            _ => None,
        })
        .unwrap();

    assert_eq!(blocks, &vec![ProseBlock::Text("EMEA led the quarter.\n".to_string())]);
    assert_eq!(citations.len(), 2);
    assert_eq!(citations[0].label(), "Q1 report");
    assert_eq!(citations[1].label(), "intranet.example.com");
}

#[test]
fn test_commentary_keeps_chart_without_tool_chart() {
    let config = RenderConfig {
        text_streaming_tools: Vec::new(),
        hide_duplicate_chart_fences: false,
        ..RenderConfig::default()
    };
    let plan = RenderPlan::build(&assistant(), &config);

    // With capture disabled the table renders as prose of its own.
    let prose = plan
        .units
        .iter()
        .filter(|u| matches!(u, RenderUnit::Prose { .. }))
        .count();
    assert_eq!(prose, 2);
    assert!(tools(&plan)[0].captured.is_none());

    let has_chart_block = plan.units.iter().any(|u| match u {
        RenderUnit::Prose { blocks, .. } => blocks.iter().any(|b| matches!(b, ProseBlock::Chart(_))),
        _ => false,
    });
    assert!(has_chart_block);
}

#[test]
fn test_approval_round_trip() {
    let plan = RenderPlan::build(&assistant(), &RenderConfig::default());
    let waiting: Vec<&ToolUnit> = plan.awaiting_approval().collect();
    assert_eq!(waiting.len(), 1);
    let id = &waiting[0].part.tool_call_id;

    let mut queue = ApprovalQueue::new();
    assert_eq!(queue.status(id), ApprovalStatus::Idle);
    queue.submit(id, false).unwrap();
    assert_eq!(queue.status(id), ApprovalStatus::Submitting);

    let shipped = queue.drain();
    assert_eq!(shipped.len(), 1);
    assert_eq!(
        serde_json::to_value(&shipped[0]).unwrap(),
        json!({ "toolCallId": "call_delete_1", "approve": false })
    );
    assert_eq!(queue.status(id), ApprovalStatus::Denied);
}

#[test]
fn test_observer_reports_pipeline_decisions() {
    let recorder = RecordingObserver::new();
    let plan = RenderPlan::build_with(&assistant(), &RenderConfig::default(), &recorder);
    let events = recorder.take();

    assert!(events.contains(&PipelineEvent::TextCaptured {
        index: 4,
        tool_call_id: "call_genie_1".to_string()
    }));
    assert!(events.contains(&PipelineEvent::Classified {
        branch: ClassifierBranch::TabularCell,
        depth: 0
    }));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, PipelineEvent::NameSuppressed { name, .. } if name == "Sales Genie"))
    );

    // Observing never changes the plan.
    assert_eq!(plan, RenderPlan::build(&assistant(), &RenderConfig::default()));
}

#[test]
fn test_citation_grouping_example() {
    let parts = vec![
        MessagePart::text("Paris is the capital"),
        MessagePart::source_url("https://a"),
        MessagePart::source_url("https://b"),
    ];
    let segments = segment(&parts);
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].parts(), parts.as_slice());
}

#[test]
fn test_leading_citations_render_with_their_text() {
    let message = ChatMessage::assistant(vec![
        MessagePart::source_url("https://a"),
        MessagePart::source_url("https://b"),
        MessagePart::text("Paris is the capital"),
    ]);
    let plan = RenderPlan::build(&message, &RenderConfig::default());

    assert_eq!(plan.units.len(), 1);
    match &plan.units[0] {
        RenderUnit::Prose { blocks, citations } => {
            assert_eq!(blocks, &vec![ProseBlock::Text("Paris is the capital".to_string())]);
            assert_eq!(citations.len(), 2);
            assert_eq!(citations[0].url, "https://a");
        }
        other => unreachable!("expected prose, got {other:?}"),
    }
}

#[test]
fn test_text_after_tool_depends_on_tool_name() {
    let message = |name: &str| {
        ChatMessage::assistant(vec![
            MessagePart::DynamicTool(
                DynamicToolPart::builder()
                    .tool_call_id("call_1")
                    .tool_name(name)
                    .state(ToolState::OutputAvailable)
                    .build(),
            ),
            MessagePart::text("| col1 | col2 |\n..."),
        ])
    };
    let config = RenderConfig::default();

    let genie = RenderPlan::build(&message("genie_query"), &config);
    assert_eq!(genie.units.len(), 1);
    assert!(tools(&genie)[0].captured.is_some());

    let weather = RenderPlan::build(&message("weather_lookup"), &config);
    assert_eq!(weather.units.len(), 2);
    assert!(matches!(weather.units[1], RenderUnit::Prose { .. }));
}

#[test]
fn test_classifier_examples() {
    let direct = json!({
        "$schema": "https://vega.github.io/schema/vega-lite/v5.json",
        "mark": "bar",
        "data": { "values": [] }
    });
    assert_eq!(classify(&direct).unwrap().into_value(), direct);

    let wrapped = json!({
        "columns": ["spec"],
        "rows": [["{\"mark\":\"bar\",\"data\":{\"values\":[]}}"]]
    });
    assert_eq!(
        classify(&wrapped).unwrap().into_value(),
        json!({ "mark": "bar", "data": { "values": [] } })
    );

    assert!(classify(&json!({ "columns": ["id", "name"], "rows": [[1, "Alice"]] })).is_none());
    assert!(classify(&json!("{not valid json")).is_none());
    assert!(classify(&json!({ "columns": [], "rows": [] })).is_none());
}
