//! Metadata extraction from styled HTML articles.
//!
//! Extraction never fails: every field falls back to a documented default
//! when the expected structure is missing, and the result is a pure function
//! of the document's path and content.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use tracing::debug;

use crate::document::Document;

pub const DEFAULT_TITLE: &str = "Untitled";
pub const EXCERPT_LIMIT: usize = 300;
pub const ELLIPSIS: &str = "...";

/// Class token marking glitched spans.
pub const GLITCH_MARKER: &str = "glitch";
/// Class token marking corrupted mathematics.
pub const MATH_MARKER: &str = "math-corrupt";

/// Decoration characters trimmed from around titles.
const TITLE_DECORATIONS: &[char] = &['⟨', '⟩', '〈', '〉', '《', '》', '«', '»'];

/// Phase markers checked in priority order; each phase accepts the stylized
/// and the ASCII-transliterated spelling.
const PHASE_MARKERS: [(Phase, [&str; 2]); 3] = [
    (Phase::Alpha, ["phaseα", "phasea"]),
    (Phase::Beta, ["phaseβ", "phaseb"]),
    (Phase::Gamma, ["phaseγ", "phaseg"]),
];

/// Coarse category of a document, derived from its storage path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Alpha,
    Beta,
    Gamma,
    /// Pseudo-phase of digest posts; never produced by [`extract`].
    Update,
    Unknown,
}

impl Phase {
    /// Resolve the phase from a path, case-insensitively. First match wins.
    pub fn from_path(path: &str) -> Phase {
        let lower = path.to_lowercase();
        PHASE_MARKERS
            .iter()
            .find(|(_, markers)| markers.iter().any(|m| lower.contains(m)))
            .map(|(phase, _)| *phase)
            .unwrap_or(Phase::Unknown)
    }

    /// Parse an exact marker name such as `phaseβ` or `phaseb`.
    pub fn from_marker(name: &str) -> Option<Phase> {
        let lower = name.to_lowercase();
        PHASE_MARKERS
            .iter()
            .find(|(_, markers)| markers.contains(&lower.as_str()))
            .map(|(phase, _)| *phase)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Alpha => "phaseα",
            Phase::Beta => "phaseβ",
            Phase::Gamma => "phaseγ",
            Phase::Update => "update",
            Phase::Unknown => "unknown",
        }
    }

    /// Classification tag for content records, if the phase has one.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            Phase::Alpha => Some("phase-alpha"),
            Phase::Beta => Some("phase-beta"),
            Phase::Gamma => Some("phase-gamma"),
            Phase::Update => Some("update"),
            Phase::Unknown => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata derived from a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleMetadata {
    pub title: String,
    /// First paragraph, at most 300 characters plus an ellipsis.
    pub excerpt: String,
    pub has_glitch: bool,
    pub has_math: bool,
    pub phase: Phase,
}

/// Regex source matching an opening tag whose `class` attribute contains `token`.
pub(crate) fn class_attr_pattern(element: &str, token: &str) -> String {
    format!(
        r#"<{element}\b[^>]*\bclass\s*=\s*["'](?:[^"']*\s)?{}(?:\s[^"']*)?["'][^>]*>"#,
        regex::escape(token)
    )
}

static RE_H1: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<h1\b[^>]*>(.*?)</h1>").unwrap());
static RE_P: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p>").unwrap());
static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static RE_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static RE_GLITCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&class_attr_pattern("[A-Za-z0-9]+", GLITCH_MARKER)).unwrap());
static RE_MATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&class_attr_pattern("[A-Za-z0-9]+", MATH_MARKER)).unwrap());

/// Derive [`ArticleMetadata`] from a document.
pub fn extract(document: &Document) -> ArticleMetadata {
    let content = &document.content;

    let title = RE_H1
        .captures(content)
        .map(|c| inline_text(&c[1]))
        .map(|t| t.trim_matches(|c: char| c.is_whitespace() || TITLE_DECORATIONS.contains(&c)).to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let excerpt = RE_P
        .captures(content)
        .map(|c| truncate_excerpt(&inline_text(&c[1])))
        .unwrap_or_default();

    let metadata = ArticleMetadata {
        title,
        excerpt,
        has_glitch: RE_GLITCH.is_match(content),
        has_math: RE_MATH.is_match(content),
        phase: Phase::from_path(&document.path),
    };

    debug!(
        path = %document.path,
        title = %metadata.title,
        phase = %metadata.phase,
        has_glitch = metadata.has_glitch,
        has_math = metadata.has_math,
        "Extracted article metadata"
    );
    metadata
}

/// Plain text of an inline fragment: tags dropped, entities decoded, whitespace collapsed.
fn inline_text(fragment: &str) -> String {
    let stripped = RE_TAG.replace_all(fragment, "");
    let decoded = html_escape::decode_html_entities(&stripped);
    RE_WS.replace_all(decoded.trim(), " ").into_owned()
}

fn truncate_excerpt(text: &str) -> String {
    if text.chars().count() > EXCERPT_LIMIT {
        let mut cut: String = text.chars().take(EXCERPT_LIMIT).collect();
        cut.push_str(ELLIPSIS);
        cut
    } else {
        text.to_string()
    }
}
