//! Terminal implementations of the rendering collaborators.
//!
//! Each collaborator appends to a shared [`Screen`]; the caller prints it
//! once a message is fully rendered.

use std::cell::{Cell, RefCell};
use std::fmt::Write as _;
use std::path::PathBuf;

use parlance::{
    ApprovalStatus, ChartRenderer, Chrome, ExportFormat, OutputRenderer, ProseBlock,
    ProseRenderer, RenderError, ToolUnit, ToolView,
};
use parlance_common::{ChartSpec, ErrorPayload, FilePart, SourceUrl, TabularResult};
use serde_json::Value;

use crate::theme::Theme;

const MAX_OUTPUT_CHARS: usize = 2000;
const MAX_TABLE_ROWS: usize = 20;
const MAX_CELL_WIDTH: usize = 32;

/// Text buffer the collaborators draw into.
#[derive(Debug, Default)]
pub struct Screen {
    buf: RefCell<String>,
}

impl Screen {
    pub fn line(&self, text: impl AsRef<str>) {
        let mut buf = self.buf.borrow_mut();
        buf.push_str(text.as_ref());
        buf.push('\n');
    }

    /// Takes everything drawn so far.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.buf.borrow_mut())
    }
}

/// Tool headers, reasoning, citations, errors and files.
pub struct TerminalChrome<'a> {
    pub screen: &'a Screen,
    pub theme: &'a Theme,
}

impl Chrome for TerminalChrome<'_> {
    fn tool_header(&mut self, tool: &ToolUnit, approval: ApprovalStatus) {
        let status = match (approval, &tool.view) {
            (ApprovalStatus::Idle, ToolView::AwaitingApproval) => Some("awaiting approval"),
            (ApprovalStatus::Idle, _) => None,
            (ApprovalStatus::Submitting, _) => Some("submitting"),
            (ApprovalStatus::Approved, _) => Some("approved"),
            (ApprovalStatus::Denied, _) => Some("denied"),
        };
        let badge = status.map_or_else(String::new, |s| {
            self.theme.approval.render(&[("status", s)])
        });

        self.screen.line(self.theme.tool_header.render(&[
            ("title", tool.title()),
            ("name", &tool.part.tool_name),
            ("state", tool.part.state.as_str()),
            ("approval", &badge),
        ]));

        if let Some(args) = tool.part.input.as_object() {
            for (key, value) in args {
                let value = compact(value);
                self.screen
                    .line(self.theme.tool_arg.render(&[("key", key), ("value", &value)]));
            }
        }
    }

    fn reasoning(&mut self, text: &str) {
        self.screen
            .line(self.theme.reasoning.render(&[("text", text.trim_end())]));
    }

    fn citations(&mut self, sources: &[SourceUrl]) {
        draw_citations(self.screen, self.theme, sources);
    }

    fn error(&mut self, error: &ErrorPayload) {
        let message = error.code.as_ref().map_or_else(
            || error.message.clone(),
            |code| format!("{} ({code})", error.message),
        );
        self.screen
            .line(self.theme.error.render(&[("message", &message)]));
    }

    fn file(&mut self, file: &FilePart) {
        let name = file.filename.as_deref().unwrap_or(&file.url);
        self.screen.line(self.theme.file.render(&[
            ("name", name),
            ("url", &file.url),
            ("media_type", &file.media_type),
        ]));
    }

    fn unknown(&mut self) {
        let placeholder = self.theme.unknown.render(&[]);
        if !placeholder.is_empty() {
            self.screen.line(placeholder);
        }
    }
}

/// Markdown prose, printed mostly as-is.
pub struct TerminalProse<'a> {
    pub screen: &'a Screen,
    pub theme: &'a Theme,
}

impl ProseRenderer for TerminalProse<'_> {
    fn render_prose(&mut self, blocks: &[ProseBlock], citations: &[SourceUrl]) {
        for block in blocks {
            match block {
                ProseBlock::Text(text) => {
                    let text = text.trim_matches('\n');
                    if !text.is_empty() {
                        self.screen.line(text);
                    }
                }
                ProseBlock::Code { lang, body } => {
                    self.screen.line(self.theme.code.render(&[
                        ("lang", lang.as_deref().unwrap_or_default()),
                        ("body", body),
                    ]));
                }
                ProseBlock::Image { alt, url } => {
                    self.screen
                        .line(self.theme.image.render(&[("alt", alt), ("url", url)]));
                }
                ProseBlock::Chart(spec) => draw_chart_summary(self.screen, self.theme, spec),
            }
        }
        draw_citations(self.screen, self.theme, citations);
    }
}

/// Structured tool output: tables, text or pretty JSON.
pub struct TerminalOutput<'a> {
    pub screen: &'a Screen,
    pub theme: &'a Theme,
}

impl OutputRenderer for TerminalOutput<'_> {
    fn render_output(&mut self, value: &Value, error_text: Option<&str>) {
        if let Some(message) = error_text {
            self.screen
                .line(self.theme.tool_error.render(&[("message", message)]));
            return;
        }

        match value {
            Value::Null => {}
            Value::String(text) => self.screen.line(truncate(text)),
            _ => match TabularResult::from_value(value) {
                Some(table) => self.screen.line(format_table(&table)),
                None => {
                    let pretty = serde_json::to_string_pretty(value)
                        .unwrap_or_else(|_| value.to_string());
                    self.screen.line(truncate(&pretty));
                }
            },
        }
    }
}

/// Chart summaries, optionally exporting each spec to disk.
pub struct TerminalCharts<'a> {
    pub screen: &'a Screen,
    pub theme: &'a Theme,
    pub export_dir: Option<PathBuf>,
    last: Option<ChartSpec>,
    prose_charts: Cell<usize>,
}

impl<'a> TerminalCharts<'a> {
    pub const fn new(screen: &'a Screen, theme: &'a Theme, export_dir: Option<PathBuf>) -> Self {
        Self {
            screen,
            theme,
            export_dir,
            last: None,
            prose_charts: Cell::new(0),
        }
    }

    fn export_name(&self, target: &str) -> String {
        let stem = if target == "prose" {
            let n = self.prose_charts.get() + 1;
            self.prose_charts.set(n);
            format!("prose-{n}")
        } else {
            target.replace(['/', '\\'], "_")
        };
        format!("{stem}.{}", ExportFormat::Json.extension())
    }
}

impl ChartRenderer for TerminalCharts<'_> {
    fn render_chart(&mut self, spec: &ChartSpec, target: &str) -> Result<(), RenderError> {
        draw_chart_summary(self.screen, self.theme, spec);
        self.last = Some(spec.clone());

        if let Some(dir) = &self.export_dir {
            let path = dir.join(self.export_name(target));
            std::fs::write(&path, self.export(ExportFormat::Json)?)?;
            log::info!("exported chart to {}", path.display());
        }
        Ok(())
    }

    fn export(&self, format: ExportFormat) -> Result<Vec<u8>, RenderError> {
        let spec = self.last.as_ref().ok_or(RenderError::NothingRendered)?;
        match format {
            ExportFormat::Json => serde_json::to_vec_pretty(spec.as_map())
                .map_err(|e| RenderError::Chart(e.to_string())),
            other => Err(RenderError::ExportUnsupported(other)),
        }
    }
}

fn draw_chart_summary(screen: &Screen, theme: &Theme, spec: &ChartSpec) {
    let mark = match spec.mark() {
        Some(mark) => mark,
        None if spec.is_composite() => "composite",
        None => "chart",
    };
    let rows = spec
        .data_row_count()
        .map_or_else(|| "?".to_string(), |n| n.to_string());
    let fields = spec.encoded_fields();
    let fields = if fields.is_empty() {
        "-".to_string()
    } else {
        fields.join(", ")
    };
    screen.line(theme.chart.render(&[
        ("mark", mark),
        ("rows", &rows),
        ("fields", &fields),
        ("schema", spec.schema().unwrap_or_default()),
    ]));
}

fn draw_citations(screen: &Screen, theme: &Theme, sources: &[SourceUrl]) {
    for (i, source) in sources.iter().enumerate() {
        let index = (i + 1).to_string();
        screen.line(theme.citation.render(&[
            ("index", &index),
            ("label", &source.label()),
            ("url", &source.url),
        ]));
    }
}

fn compact(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_OUTPUT_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(MAX_OUTPUT_CHARS).collect();
    format!("{cut}... ({} chars)", text.chars().count())
}

fn clip(cell: &str) -> String {
    if cell.chars().count() <= MAX_CELL_WIDTH {
        return cell.to_string();
    }
    let mut clipped: String = cell.chars().take(MAX_CELL_WIDTH - 1).collect();
    clipped.push('…');
    clipped
}

/// Formats a tabular result as an aligned text table.
///
/// Cells are laid out by column name; cells past the last column are not
/// shown and missing ones are left blank.
pub fn format_table(table: &TabularResult) -> String {
    let header: Vec<String> = table.columns.iter().map(|c| clip(c)).collect();
    let rows: Vec<Vec<String>> = table
        .records()
        .iter()
        .take(MAX_TABLE_ROWS)
        .map(|record| {
            table
                .columns
                .iter()
                .map(|name| record.get(name).map_or_else(String::new, |v| clip(&compact(v))))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    write_row(&mut out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    write_row(&mut out, &rule, &widths);
    for row in &rows {
        write_row(&mut out, row, &widths);
    }
    if table.rows.len() > MAX_TABLE_ROWS {
        let _ = writeln!(out, "... {} more rows", table.rows.len() - MAX_TABLE_ROWS);
    }
    out.trim_end().to_string()
}

fn write_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let cell = cells.get(i).map_or("", String::as_str);
            format!("{cell:<w$}")
        })
        .collect();
    let _ = writeln!(out, "| {} |", line.join(" | "));
}
