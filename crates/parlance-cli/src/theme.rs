//! Customizable terminal theming.
//!
//! Every element the renderer prints is a template string with
//! `<style>text</>` tags and `{variable}` placeholders. Users override any
//! of them in `~/.config/parlance/theme.toml`:
//!
//! ```toml
//! [tool]
//! header = "<bold>▶ {title}</> <dim>{state}</>"
//!
//! [chart]
//! summary = "<green>chart</> {mark} ({rows} rows)"
//! ```

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use serde::Deserialize;

const RESET: &str = "\x1b[0m";

const MESSAGE_HEADER: &str = "\n╭─● <bold bright_magenta>{role}</>\n╰───────────○";
const TOOL_HEADER: &str = "\n○ <bright_yellow>{title}</> <dim>{state}</>{approval}";
const TOOL_ARG: &str = "  <cyan>{key}</>: {value}";
const TOOL_ERROR: &str = "○ <bright_red>Failed:</> {message}";
const APPROVAL: &str = " <bold bright_yellow>[{status}]</>";
const REASONING: &str = "<dim italic>{text}</>";
const CITATION: &str = "  <cyan>[{index}]</> {label} <dim>{url}</>";
const CODE: &str = "<dim>```{lang}</>\n{body}<dim>```</>";
const IMAGE: &str = "<bright_blue>[image: {alt}]</> <dim>{url}</>";
const CHART: &str =
    "○ <bright_green>Chart:</> <bold>{mark}</> · {rows} rows · fields: <cyan>{fields}</>";
const ERROR: &str = "<bold bright_red>Error:</> {message}";
const FILE: &str = "<bright_blue>File:</> {name} <dim>{media_type}</>";
const UNKNOWN: &str = "<dim>(unsupported part)</>";

fn color_code(name: &str) -> Option<u8> {
    match name {
        "black" => Some(30),
        "red" => Some(31),
        "green" => Some(32),
        "yellow" => Some(33),
        "blue" => Some(34),
        "magenta" => Some(35),
        "cyan" => Some(36),
        "white" => Some(37),
        "bright_black" => Some(90),
        "bright_red" => Some(91),
        "bright_green" => Some(92),
        "bright_yellow" => Some(93),
        "bright_blue" => Some(94),
        "bright_magenta" => Some(95),
        "bright_cyan" => Some(96),
        "bright_white" => Some(97),
        _ => None,
    }
}

fn modifier_code(name: &str) -> Option<u8> {
    match name {
        "bold" => Some(1),
        "dim" => Some(2),
        "italic" => Some(3),
        "underline" => Some(4),
        _ => None,
    }
}

/// Converts a space-separated style spec (e.g. "bold `bright_yellow`")
/// into an ANSI escape sequence (e.g. `\x1b[1;93m`).
fn style_to_ansi(spec: &str) -> Result<String> {
    let codes = spec
        .split_whitespace()
        .map(|token| {
            modifier_code(token)
                .or_else(|| color_code(token))
                .ok_or_else(|| anyhow::anyhow!("unknown style token: '{token}'"))
        })
        .collect::<Result<Vec<u8>>>()?;

    if codes.is_empty() {
        return Ok(String::new());
    }

    let mut out = String::from("\x1b[");
    for (i, code) in codes.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        let _ = write!(out, "{code}");
    }
    out.push('m');
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Variable(String),
}

/// A parsed template with pre-compiled escape sequences.
#[derive(Debug, Clone, Default)]
pub struct Template {
    pieces: Vec<Piece>,
}

impl Template {
    /// Parses a template; style tags are validated but dropped when
    /// `color` is `false`.
    pub fn parse(input: &str, color: bool) -> Result<Self> {
        let mut pieces = Vec::new();
        let mut buf = String::new();
        let mut chars = input.chars();

        while let Some(ch) = chars.next() {
            match ch {
                '<' | '{' => {
                    let close = if ch == '<' { '>' } else { '}' };
                    let mut inner = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == close {
                            closed = true;
                            break;
                        }
                        inner.push(c);
                    }
                    if !closed {
                        bail!("unclosed '{ch}' in template");
                    }

                    if !buf.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut buf)));
                    }
                    if ch == '{' {
                        pieces.push(Piece::Variable(inner));
                    } else {
                        // Validate even when colors are off.
                        let ansi = if inner == "/" {
                            RESET.to_string()
                        } else {
                            style_to_ansi(&inner)?
                        };
                        if color {
                            pieces.push(Piece::Literal(ansi));
                        }
                    }
                }
                '\\' => match chars.clone().next() {
                    Some('n') => {
                        chars.next();
                        buf.push('\n');
                    }
                    Some('t') => {
                        chars.next();
                        buf.push('\t');
                    }
                    _ => buf.push('\\'),
                },
                _ => buf.push(ch),
            }
        }

        if !buf.is_empty() {
            pieces.push(Piece::Literal(buf));
        }

        Ok(Self { pieces })
    }

    /// Renders the template. Unknown variables render as empty strings.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(s) => out.push_str(s),
                Piece::Variable(name) => {
                    if let Some((_, val)) = vars.iter().find(|(k, _)| k == name) {
                        out.push_str(val);
                    }
                }
            }
        }
        out
    }
}

/// All themeable display elements.
#[derive(Debug, Clone)]
pub struct Theme {
    pub message_header: Template,
    pub tool_header: Template,
    pub tool_arg: Template,
    pub tool_error: Template,
    pub approval: Template,
    pub reasoning: Template,
    pub citation: Template,
    pub code: Template,
    pub image: Template,
    pub chart: Template,
    pub error: Template,
    pub file: Template,
    pub unknown: Template,
}

/// Raw TOML representation for deserialization.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ThemeFile {
    message: MessageSection,
    tool: ToolSection,
    prose: ProseSection,
    chart: ChartSection,
    part: PartSection,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct MessageSection {
    header: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ToolSection {
    header: Option<String>,
    arg: Option<String>,
    error: Option<String>,
    approval: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ProseSection {
    reasoning: Option<String>,
    citation: Option<String>,
    code: Option<String>,
    image: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ChartSection {
    summary: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct PartSection {
    error: Option<String>,
    file: Option<String>,
    unknown: Option<String>,
}

fn parse_or_default(custom: Option<&str>, default: &str, color: bool) -> Template {
    custom
        .and_then(|s| match Template::parse(s, color) {
            Ok(t) => Some(t),
            Err(e) => {
                log::warn!("theme: failed to parse template '{s}': {e}");
                None
            }
        })
        .unwrap_or_else(|| Template::parse(default, color).unwrap_or_default())
}

impl Default for Theme {
    fn default() -> Self {
        Self::from_file(ThemeFile::default(), colored::control::SHOULD_COLORIZE.should_colorize())
    }
}

impl Theme {
    /// Theme with every style tag dropped.
    #[cfg(test)]
    pub fn plain() -> Self {
        Self::from_file(ThemeFile::default(), false)
    }

    /// Loads the theme from `~/.config/parlance/theme.toml`.
    /// Falls back to defaults on a missing file or parse errors.
    pub fn load() -> Self {
        theme_path().map_or_else(Self::default, |path| Self::load_from(&path))
    }

    /// Loads the theme from `path`, falling back to defaults.
    pub fn load_from(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Self::default();
            }
            Err(e) => {
                log::warn!("theme: failed to read {}: {e}", path.display());
                return Self::default();
            }
        };

        match toml::from_str::<ThemeFile>(&contents) {
            Ok(file) => Self::from_file(file, colored::control::SHOULD_COLORIZE.should_colorize()),
            Err(e) => {
                log::warn!("theme: failed to parse TOML: {e}");
                Self::default()
            }
        }
    }

    fn from_file(file: ThemeFile, color: bool) -> Self {
        let pick = |custom: Option<String>, default: &str| {
            parse_or_default(custom.as_deref(), default, color)
        };

        Self {
            message_header: pick(file.message.header, MESSAGE_HEADER),
            tool_header: pick(file.tool.header, TOOL_HEADER),
            tool_arg: pick(file.tool.arg, TOOL_ARG),
            tool_error: pick(file.tool.error, TOOL_ERROR),
            approval: pick(file.tool.approval, APPROVAL),
            reasoning: pick(file.prose.reasoning, REASONING),
            citation: pick(file.prose.citation, CITATION),
            code: pick(file.prose.code, CODE),
            image: pick(file.prose.image, IMAGE),
            chart: pick(file.chart.summary, CHART),
            error: pick(file.part.error, ERROR),
            file: pick(file.part.file, FILE),
            unknown: pick(file.part.unknown, UNKNOWN),
        }
    }
}

fn theme_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("parlance").join("theme.toml"))
}
