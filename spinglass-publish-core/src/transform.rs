//! Markup normalization: rewrites a styled HTML article into markdown-like text.
//!
//! The transformer is an ordered pipeline of independent, pure text→text
//! [`Stage`]s. Order matters: each stage assumes the ones before it already
//! collapsed the structural wrappers it would otherwise trip over. This is a
//! best-effort rewriter, not a DOM converter; a document lacking the expected
//! structure still comes out as tag-stripped text.

use regex::{Captures, Regex};
use std::sync::LazyLock;
use tracing::{debug, trace};

use crate::document::Document;
use crate::extract::{class_attr_pattern, GLITCH_MARKER, MATH_MARKER};

/// Canonical publishing location named in the attribution footer.
pub const CANONICAL_URL: &str = "https://spin.pyokosmeme.group/";
/// Final line of every normalized document.
pub const CLOSING_GLYPH: &str = "⟨⟨ ∎ ⟩⟩";

/// One rewrite step of the pipeline.
pub struct Stage {
    pub name: &'static str,
    pub apply: fn(&str) -> String,
}

/// The rewrite stages, in the order they must run.
pub const STAGES: [Stage; 10] = [
    Stage { name: "body", apply: extract_body },
    Stage { name: "decorations", apply: remove_decorations },
    Stage { name: "headings", apply: convert_headings },
    Stage { name: "paragraphs", apply: convert_paragraphs },
    Stage { name: "emphasis", apply: convert_emphasis },
    Stage { name: "markers", apply: convert_markers },
    Stage { name: "code", apply: convert_code },
    Stage { name: "lists", apply: convert_lists },
    Stage { name: "strip", apply: strip_tags },
    Stage { name: "collapse", apply: collapse_blank_lines },
];

/// Runs [`STAGES`] and appends the attribution footer.
#[derive(Debug, Clone)]
pub struct Transformer {
    canonical_url: String,
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new(CANONICAL_URL)
    }
}

impl Transformer {
    pub fn new(canonical_url: impl Into<String>) -> Self {
        Self {
            canonical_url: canonical_url.into(),
        }
    }

    pub fn transform(&self, document: &Document) -> String {
        let normalized = self.transform_text(&document.content);
        debug!(
            path = %document.path,
            input_len = document.content.len(),
            output_len = normalized.len(),
            "Normalized document content"
        );
        normalized
    }

    /// Normalize raw markup; never fails.
    pub fn transform_text(&self, raw: &str) -> String {
        let body = STAGES.iter().fold(raw.to_string(), |text, stage| {
            let out = (stage.apply)(&text);
            trace!(stage = stage.name, len = out.len(), "Applied rewrite stage");
            out
        });
        format!("{}\n\n{}", body.trim(), self.footer())
            .trim()
            .to_string()
    }

    fn footer(&self) -> String {
        format!(
            "---\n\nOriginally published at {}\n\n{}",
            self.canonical_url, CLOSING_GLYPH
        )
    }
}

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

static RE_BODY: LazyLock<Regex> = LazyLock::new(|| regex(r"(?is)<body\b[^>]*>(.*)</body>"));
static RE_SCANLINE: LazyLock<Regex> =
    LazyLock::new(|| regex(&format!("(?is){}.*?</div>", class_attr_pattern("div", "scanline"))));
static RE_SCRIPT_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"(?is)<script\b[^>]*>.*?</script>|<style\b[^>]*>.*?</style>|<!--.*?-->")
});
static RE_H1: LazyLock<Regex> = LazyLock::new(|| regex(r"(?is)<h1\b[^>]*>(.*?)</h1>"));
static RE_H2: LazyLock<Regex> = LazyLock::new(|| regex(r"(?is)<h2\b[^>]*>(.*?)</h2>"));
static RE_P: LazyLock<Regex> = LazyLock::new(|| regex(r"(?is)<p\b[^>]*>(.*?)</p>"));
static RE_EM: LazyLock<Regex> = LazyLock::new(|| regex(r"(?is)<(?:em|i)\b[^>]*>(.*?)</(?:em|i)>"));
static RE_STRONG: LazyLock<Regex> =
    LazyLock::new(|| regex(r"(?is)<(?:strong|b)\b[^>]*>(.*?)</(?:strong|b)>"));
static RE_GLITCH: LazyLock<Regex> =
    LazyLock::new(|| regex(&format!("(?is){}(.*?)</span>", class_attr_pattern("span", GLITCH_MARKER))));
static RE_MATH: LazyLock<Regex> =
    LazyLock::new(|| regex(&format!("(?is){}(.*?)</span>", class_attr_pattern("span", MATH_MARKER))));
static RE_PRE_CODE: LazyLock<Regex> =
    LazyLock::new(|| regex(r"(?is)<pre\b[^>]*>\s*<code\b[^>]*>(.*?)</code>\s*</pre>"));
static RE_PRE: LazyLock<Regex> = LazyLock::new(|| regex(r"(?is)<pre\b[^>]*>(.*?)</pre>"));
static RE_CODE: LazyLock<Regex> = LazyLock::new(|| regex(r"(?is)<code\b[^>]*>(.*?)</code>"));
static RE_LI: LazyLock<Regex> = LazyLock::new(|| regex(r"(?is)<li\b[^>]*>(.*?)</li>"));
static RE_UL: LazyLock<Regex> = LazyLock::new(|| regex(r"(?i)</?ul\b[^>]*>"));
static RE_TAG: LazyLock<Regex> = LazyLock::new(|| regex(r"(?s)<[^>]+>"));
static RE_TRAILING_WS: LazyLock<Regex> = LazyLock::new(|| regex(r"(?m)[ \t]+$"));
static RE_BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| regex(r"\n{3,}"));

/// Stage 1: keep only the body region; documents without one pass whole.
pub fn extract_body(text: &str) -> String {
    RE_BODY
        .captures(text)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| text.to_string())
}

/// Stage 2: drop scanline overlays, scripts, styles and comments with their contents.
pub fn remove_decorations(text: &str) -> String {
    let text = RE_SCANLINE.replace_all(text, "");
    RE_SCRIPT_STYLE.replace_all(&text, "").into_owned()
}

/// Stage 3: `<h1>` → `# `, `<h2>` → `## ` preceded by a blank line.
pub fn convert_headings(text: &str) -> String {
    let text = RE_H1.replace_all(text, |c: &Captures| format!("\n# {}\n\n", c[1].trim()));
    RE_H2
        .replace_all(&text, |c: &Captures| format!("\n\n## {}\n\n", c[1].trim()))
        .into_owned()
}

/// Stage 4: paragraphs become text flanked by blank lines.
pub fn convert_paragraphs(text: &str) -> String {
    RE_P.replace_all(text, |c: &Captures| format!("\n\n{}\n\n", c[1].trim()))
        .into_owned()
}

/// Stage 5: emphasis to `*text*`, strong to `**text**`.
pub fn convert_emphasis(text: &str) -> String {
    let text = RE_STRONG.replace_all(text, "**${1}**");
    RE_EM.replace_all(&text, "*${1}*").into_owned()
}

/// Stage 6: glitch spans to `⟨text⟩`, corrupted math to `∂[text]∂`.
pub fn convert_markers(text: &str) -> String {
    let text = RE_GLITCH.replace_all(text, "⟨${1}⟩");
    RE_MATH.replace_all(&text, "∂[${1}]∂").into_owned()
}

/// Stage 7: fenced blocks to triple backticks, inline code to single backticks.
pub fn convert_code(text: &str) -> String {
    let text = RE_PRE_CODE.replace_all(text, fence);
    let text = RE_PRE.replace_all(&text, fence);
    RE_CODE.replace_all(&text, "`${1}`").into_owned()
}

fn fence(c: &Captures) -> String {
    format!("\n\n```\n{}\n```\n\n", c[1].trim_matches('\n'))
}

/// Stage 8: list items to `- ` lines inside blank-line-delimited blocks.
pub fn convert_lists(text: &str) -> String {
    let text = RE_LI.replace_all(text, |c: &Captures| format!("- {}\n", c[1].trim()));
    RE_UL.replace_all(&text, "\n\n").into_owned()
}

/// Stage 9: strip every remaining tag, then decode entities in the text left
/// behind. Decoding after the strip keeps `&lt;` from turning into a tag.
pub fn strip_tags(text: &str) -> String {
    let stripped = RE_TAG.replace_all(text, "");
    html_escape::decode_html_entities(&stripped).into_owned()
}

/// Stage 10: runs of blank lines collapse to a single blank line.
pub fn collapse_blank_lines(text: &str) -> String {
    let text = RE_TRAILING_WS.replace_all(text, "");
    RE_BLANK_RUN.replace_all(&text, "\n\n").into_owned()
}
