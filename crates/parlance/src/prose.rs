//! Markdown override hooks for prose.
//!
//! Models often echo a chart spec as a fenced code block or link a chart
//! image next to the tool output that already renders it. The prose
//! renderer receives prose pre-split into [`ProseBlock`]s, with these
//! overrides applied so the chart is not shown twice.

use parlance_common::ChartSpec;
use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use serde_json::Value;

use crate::classify::OutputClassifier;
use crate::config::RenderConfig;

/// A piece of prose as seen by the prose renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum ProseBlock {
    /// Markdown text.
    Text(String),
    /// A fenced code block.
    Code {
        /// Info string after the opening fence.
        lang: Option<String>,
        /// Contents between the fences.
        body: String,
    },
    /// A markdown image.
    Image {
        /// Alt text.
        alt: String,
        /// Image location.
        url: String,
    },
    /// A code block whose body is a chart spec.
    Chart(ChartSpec),
}

/// A fenced code block or image whose closing event has not arrived yet.
enum Open {
    Code { lang: Option<String>, body: String },
    Image { alt: String, url: String, end: usize },
}

/// Splits markdown into text, fenced code and image blocks.
///
/// Text blocks are the original markdown source between the other blocks.
/// Indented code stays text. An unterminated fence runs to the end of the
/// text, which is what a partially streamed message looks like.
#[must_use]
pub fn split_prose(text: &str) -> Vec<ProseBlock> {
    let mut blocks = Vec::new();
    let mut consumed = 0;
    let mut open: Option<Open> = None;

    for (event, range) in Parser::new(text).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) if open.is_none() => {
                push_text(&mut blocks, text.get(consumed..range.start));
                let lang = info
                    .split_whitespace()
                    .next()
                    .map(str::to_ascii_lowercase);
                open = Some(Open::Code {
                    lang,
                    body: String::new(),
                });
            }
            Event::Start(Tag::Image { dest_url, .. }) if open.is_none() => {
                push_text(&mut blocks, text.get(consumed..range.start));
                open = Some(Open::Image {
                    alt: String::new(),
                    url: dest_url.into_string(),
                    end: range.end,
                });
            }
            Event::Text(chunk) | Event::Code(chunk) => match &mut open {
                Some(Open::Code { body, .. }) => body.push_str(&chunk),
                Some(Open::Image { alt, .. }) => alt.push_str(&chunk),
                None => {}
            },
            Event::End(TagEnd::CodeBlock) => {
                if let Some(Open::Code { lang, body }) =
                    open.take_if(|o| matches!(o, Open::Code { .. }))
                {
                    blocks.push(ProseBlock::Code { lang, body });
                    consumed = past_line_end(text, range.end);
                }
            }
            Event::End(TagEnd::Image) => {
                if let Some(Open::Image { alt, url, .. }) =
                    open.take_if(|o| matches!(o, Open::Image { end, .. } if *end == range.end))
                {
                    blocks.push(ProseBlock::Image { alt, url });
                    consumed = range.end;
                }
            }
            _ => {}
        }
    }

    push_text(&mut blocks, text.get(consumed..));
    blocks
}

/// The closing fence line owns its line ending.
fn past_line_end(text: &str, at: usize) -> usize {
    if text.get(..at).is_some_and(|before| before.ends_with('\n')) {
        return at;
    }
    let rest = text.get(at..).unwrap_or_default();
    if rest.starts_with("\r\n") {
        at + 2
    } else if rest.starts_with('\n') {
        at + 1
    } else {
        at
    }
}

fn push_text(blocks: &mut Vec<ProseBlock>, text: Option<&str>) {
    if let Some(text) = text.filter(|t| !t.is_empty()) {
        blocks.push(ProseBlock::Text(text.to_string()));
    }
}

/// Override behaviors applied to split prose.
#[derive(Debug, Clone)]
pub struct ProseOverrides<'a> {
    config: &'a RenderConfig,
    classifier: OutputClassifier,
    chart_shown: bool,
}

impl<'a> ProseOverrides<'a> {
    /// Creates overrides; `chart_shown` tells whether the message already
    /// renders a chart from tool output.
    #[must_use]
    pub const fn new(config: &'a RenderConfig, chart_shown: bool) -> Self {
        Self {
            config,
            classifier: OutputClassifier::from_config(config),
            chart_shown,
        }
    }

    fn hides_duplicates(&self) -> bool {
        self.chart_shown && self.config.hide_duplicate_chart_fences
    }

    fn is_chart_language(&self, lang: Option<&str>) -> bool {
        lang.is_some_and(|l| {
            self.config
                .chart_fence_languages
                .iter()
                .any(|c| c.eq_ignore_ascii_case(l))
        })
    }

    /// Splits `text` and applies the overrides.
    #[must_use]
    pub fn render(&self, text: &str) -> Vec<ProseBlock> {
        self.apply(split_prose(text))
    }

    /// Applies the overrides to already split blocks.
    ///
    /// Chart code fences become [`ProseBlock::Chart`], or disappear when a
    /// chart is already shown. Images whose alt text starts with "chart"
    /// disappear when a chart is already shown.
    #[must_use]
    pub fn apply(&self, blocks: Vec<ProseBlock>) -> Vec<ProseBlock> {
        blocks
            .into_iter()
            .filter_map(|block| match block {
                ProseBlock::Code { lang, body } if self.is_chart_language(lang.as_deref()) => {
                    match self.classifier.classify(&Value::String(body.clone())) {
                        Some(_) if self.hides_duplicates() => None,
                        Some(spec) => Some(ProseBlock::Chart(spec)),
                        None => Some(ProseBlock::Code { lang, body }),
                    }
                }
                ProseBlock::Image { ref alt, .. }
                    if self.hides_duplicates() && is_chart_image(alt) =>
                {
                    None
                }
                other => Some(other),
            })
            .collect()
    }
}

fn is_chart_image(alt: &str) -> bool {
    alt.trim_start()
        .get(..5)
        .is_some_and(|p| p.eq_ignore_ascii_case("chart"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;

    const SPEC_FENCE: &str =
        "Here it is:\n```vega-lite\n{\"mark\":\"bar\",\"data\":{\"values\":[]}}\n```\nDone.\n";

    #[test]
    fn test_split_plain_text() {
        assert_eq!(
            split_prose("just words"),
            vec![ProseBlock::Text("just words".to_string())]
        );
        assert!(split_prose("").is_empty());
    }

    #[test]
    fn test_split_code_fence() {
        let blocks = split_prose("before\n```Rust ignore\nfn main() {}\n```\nafter");
        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[1],
            ProseBlock::Code {
                lang: Some("rust".to_string()),
                body: "fn main() {}\n".to_string()
            }
        );
        assert_eq!(blocks[2], ProseBlock::Text("after".to_string()));
    }

    #[test]
    fn test_longer_fence_needs_matching_close() {
        let blocks = split_prose("````md\n```\ninner\n```\n````\n");
        assert_eq!(
            blocks,
            vec![ProseBlock::Code {
                lang: Some("md".to_string()),
                body: "```\ninner\n```\n".to_string()
            }]
        );
    }

    #[test]
    fn test_longer_closing_fence_closes_block() {
        let blocks = split_prose("```json\n{}\n````\nafter\n");
        assert_eq!(
            blocks,
            vec![
                ProseBlock::Code {
                    lang: Some("json".to_string()),
                    body: "{}\n".to_string()
                },
                ProseBlock::Text("after\n".to_string()),
            ]
        );
    }

    #[test]
    fn test_tilde_fence_and_indented_code() {
        let blocks = split_prose("~~~vega\n{}\n~~~\n\n    indented\n");
        assert_eq!(
            blocks[0],
            ProseBlock::Code {
                lang: Some("vega".to_string()),
                body: "{}\n".to_string()
            }
        );
        assert_eq!(blocks.len(), 2);
        assert!(matches!(&blocks[1], ProseBlock::Text(t) if t.contains("    indented")));
    }

    #[test]
    fn test_unterminated_fence_runs_to_end() {
        let blocks = split_prose("```json\n{\"mark\":");
        assert_eq!(
            blocks,
            vec![ProseBlock::Code {
                lang: Some("json".to_string()),
                body: "{\"mark\":".to_string()
            }]
        );
    }

    #[test]
    fn test_split_images() {
        let blocks = split_prose("see ![Chart of sales](https://x/c.png \"title\") and more");
        assert_eq!(
            blocks,
            vec![
                ProseBlock::Text("see ".to_string()),
                ProseBlock::Image {
                    alt: "Chart of sales".to_string(),
                    url: "https://x/c.png".to_string()
                },
                ProseBlock::Text(" and more".to_string()),
            ]
        );
    }

    #[test]
    fn test_image_syntax_in_code_span_is_text() {
        let text = "Use `![chart](x.png)` syntax";
        assert_eq!(split_prose(text), vec![ProseBlock::Text(text.to_string())]);

        let config = RenderConfig::default();
        let blocks = ProseOverrides::new(&config, true).render(text);
        assert_eq!(blocks, vec![ProseBlock::Text(text.to_string())]);
    }

    #[test]
    fn test_chart_fence_becomes_chart_block() {
        let config = RenderConfig::default();
        let blocks = ProseOverrides::new(&config, false).render(SPEC_FENCE);
        assert_eq!(blocks.len(), 3);
        assert!(matches!(blocks[1], ProseBlock::Chart(_)));
    }

    #[test]
    fn test_chart_fence_hidden_when_chart_shown() {
        let config = RenderConfig::default();
        let blocks = ProseOverrides::new(&config, true).render(SPEC_FENCE);
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| matches!(b, ProseBlock::Text(_))));

        let keep_all = RenderConfig {
            hide_duplicate_chart_fences: false,
            ..RenderConfig::default()
        };
        let blocks = ProseOverrides::new(&keep_all, true).render(SPEC_FENCE);
        assert!(matches!(blocks[1], ProseBlock::Chart(_)));
    }

    #[test]
    fn test_non_chart_json_fence_is_kept() {
        let config = RenderConfig::default();
        let text = "```json\n{\"id\": 1}\n```\n";
        let blocks = ProseOverrides::new(&config, true).render(text);
        assert!(matches!(blocks[0], ProseBlock::Code { .. }));

        let python = "```python\n{\"mark\":\"bar\",\"data\":{}}\n```\n";
        let blocks = ProseOverrides::new(&config, true).render(python);
        assert!(matches!(blocks[0], ProseBlock::Code { .. }));
    }

    #[test]
    fn test_chart_image_hidden_only_when_chart_shown() {
        let config = RenderConfig::default();
        let text = "![chart: sales](https://x/c.png)![logo](https://x/l.png)";

        let shown = ProseOverrides::new(&config, true).render(text);
        assert_eq!(shown.len(), 1);
        assert!(matches!(&shown[0], ProseBlock::Image { alt, .. } if alt == "logo"));

        let not_shown = ProseOverrides::new(&config, false).render(text);
        assert_eq!(not_shown.len(), 2);
    }
}
