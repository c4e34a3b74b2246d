//! Announcement templates and rendering.
//!
//! Templates are parsed once into literal and placeholder segments, so an
//! unrecognized `{name}` is rejected when the registry is built rather than
//! at render time. The registry is immutable after construction; the
//! built-in set lives in a process-wide static.
//!
//! Recognized placeholders: `{title}`, `{excerpt}`, `{url}`,
//! `{encodedTitle}`, `{wordCount}`, `{topologyStatus}` (the snake_case
//! spellings `{encoded_title}`, `{word_count}`, `{topology_status}` are
//! accepted too).

use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};

use crate::extract::{ArticleMetadata, Phase, ELLIPSIS};

/// Requested template name that enables automatic selection.
pub const AUTO: &str = "auto";
pub const DEFAULT_TEMPLATE: &str = "default";
pub const MINIMAL_TEMPLATE: &str = "minimal";
pub const GLITCH_TEMPLATE: &str = "glitch";
pub const MATH_TEMPLATE: &str = "mathematical";

/// Ceiling on rendered announcement length, in characters.
pub const FEED_TEXT_LIMIT: usize = 300;
/// Title length used by the minimal fallback render.
pub const MINIMAL_TITLE_LIMIT: usize = 50;

const BUILTIN_NAMED: &[(&str, &str)] = &[
    (
        DEFAULT_TEMPLATE,
        "\n⟨⟨ NEW SPINGL∆SS NODE ⟩⟩\n\n{title}\n\n\"{excerpt}\"\n\n→ {url}\n",
    ),
    (MINIMAL_TEMPLATE, "\nnew node: {title}\n{url}\n"),
    (
        GLITCH_TEMPLATE,
        "\ng̸l̸i̸t̸c̸h̸ ̸d̸e̸t̸e̸c̸t̸e̸d̸\n{title}\nsys.tem.mal//function\n{url}\n",
    ),
    (
        MATH_TEMPLATE,
        "\n∂[NEW]/∂t = {title}\n∫∫∫ {excerpt} dx dy dz\nlim(t→∞) = {url}\n",
    ),
    (
        "cryptic",
        "\n◈◈◈◈◈◈◈◈◈◈◈◈\n{encodedTitle}\n◈◈◈◈◈◈◈◈◈◈◈◈\n{url}\n",
    ),
    (
        "network_state",
        "\nCONSENSUS.BROADCAST()\nnode: {title}\nstake: {wordCount} words\nvalidators: pending\n{url}\n",
    ),
];

const BUILTIN_PHASES: &[(Phase, &str)] = &[
    (
        Phase::Alpha,
        "\n⟨⟨ PH∆SE Α EMISSION ⟩⟩\n{title}\n\"{excerpt}\"\n∂S/∂t → ∞\n{url}\n",
    ),
    (
        Phase::Beta,
        "\n⟨⟨ PH∆SE β CRYSTALLIZATION ⟩⟩\n{title}\nspin glass transition detected\n{url}\n",
    ),
    (
        Phase::Gamma,
        "\n⟨⟨ PH∆SE γ RADIATION ⟩⟩\n{title}\ntopology: {topologyStatus}\n{url}\n",
    ),
];

static BUILTIN: LazyLock<TemplateRegistry> = LazyLock::new(|| {
    TemplateRegistry::from_sources(
        BUILTIN_NAMED.iter().map(|(n, t)| (n.to_string(), *t)),
        BUILTIN_PHASES.iter().copied(),
    )
    .expect("built-in templates use only recognized placeholders")
});

static RE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unknown placeholder `{{{0}}}`")]
    UnknownPlaceholder(String),

    #[error("template `{name}` is invalid")]
    Invalid {
        name: String,
        #[source]
        source: Box<TemplateError>,
    },
}

/// The closed set of values a template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Title,
    Excerpt,
    Url,
    EncodedTitle,
    WordCount,
    TopologyStatus,
}

impl Placeholder {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "title" => Some(Self::Title),
            "excerpt" => Some(Self::Excerpt),
            "url" => Some(Self::Url),
            "encodedTitle" | "encoded_title" => Some(Self::EncodedTitle),
            "wordCount" | "word_count" => Some(Self::WordCount),
            "topologyStatus" | "topology_status" => Some(Self::TopologyStatus),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Slot(Placeholder),
}

/// A parsed announcement template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse template text, rejecting unrecognized placeholders.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut last = 0;
        for caps in RE_PLACEHOLDER.captures_iter(source) {
            let Some(whole) = caps.get(0) else { continue };
            let placeholder = Placeholder::parse(&caps[1])
                .ok_or_else(|| TemplateError::UnknownPlaceholder(caps[1].to_string()))?;
            if whole.start() > last {
                segments.push(Segment::Text(source[last..whole.start()].to_string()));
            }
            segments.push(Segment::Slot(placeholder));
            last = whole.end();
        }
        if last < source.len() {
            segments.push(Segment::Text(source[last..].to_string()));
        }
        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn placeholders(&self) -> impl Iterator<Item = Placeholder> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Slot(p) => Some(*p),
            Segment::Text(_) => None,
        })
    }

    fn render(&self, values: &RenderValues<'_>) -> String {
        let mut out = String::with_capacity(self.source.len() + 64);
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Slot(p) => out.push_str(&values.get(*p)),
            }
        }
        out.trim().to_string()
    }
}

/// Values substituted into a template, derived once per render.
struct RenderValues<'a> {
    title: &'a str,
    excerpt: &'a str,
    url: &'a str,
    encoded_title: String,
    word_count: usize,
    topology_status: &'static str,
}

impl<'a> RenderValues<'a> {
    fn new(metadata: &ArticleMetadata, title: &'a str, excerpt: &'a str, url: &'a str) -> Self {
        Self {
            title,
            excerpt,
            url,
            encoded_title: encode_title(title),
            word_count: excerpt.split_whitespace().count(),
            topology_status: if metadata.has_glitch { "WARPED" } else { "STABLE" },
        }
    }

    fn get(&self, placeholder: Placeholder) -> String {
        match placeholder {
            Placeholder::Title => self.title.to_string(),
            Placeholder::Excerpt => self.excerpt.to_string(),
            Placeholder::Url => self.url.to_string(),
            Placeholder::EncodedTitle => self.encoded_title.clone(),
            Placeholder::WordCount => self.word_count.to_string(),
            Placeholder::TopologyStatus => self.topology_status.to_string(),
        }
    }
}

/// Shift every character of the title up by one code point.
///
/// Characters whose successor is not a Unicode scalar value (U+D7FF,
/// U+10FFFF) are left unchanged.
pub fn encode_title(title: &str) -> String {
    title
        .chars()
        .map(|c| char::from_u32(c as u32 + 1).unwrap_or(c))
        .collect()
}

/// Identifies a template in a [`TemplateRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateKey {
    Named(String),
    Phase(Phase),
}

impl TemplateKey {
    pub fn named(name: &str) -> Self {
        TemplateKey::Named(name.to_string())
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateKey::Named(name) => f.write_str(name),
            TemplateKey::Phase(phase) => write!(f, "{phase}"),
        }
    }
}

/// Named templates plus phase-specific variants.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    named: BTreeMap<String, Template>,
    phase_specific: BTreeMap<Phase, Template>,
}

impl TemplateRegistry {
    /// The built-in template set.
    pub fn builtin() -> &'static TemplateRegistry {
        &BUILTIN
    }

    /// The built-in set with `overrides` added or replacing entries. A name
    /// that is a phase marker (`phaseα`, `phaseb`, ...) sets that phase's variant.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Result<Self, TemplateError> {
        let mut registry = BUILTIN.clone();
        for (name, text) in overrides {
            let template = Template::parse(text).map_err(|e| TemplateError::Invalid {
                name: name.clone(),
                source: Box::new(e),
            })?;
            match Phase::from_marker(name) {
                Some(phase) => registry.phase_specific.insert(phase, template),
                None => registry.named.insert(name.clone(), template),
            };
            debug!(template = %name, "Registered template override");
        }
        Ok(registry)
    }

    fn from_sources<'s>(
        named: impl IntoIterator<Item = (String, &'s str)>,
        phases: impl IntoIterator<Item = (Phase, &'s str)>,
    ) -> Result<Self, TemplateError> {
        let wrap = |name: String| move |e: TemplateError| TemplateError::Invalid {
            name,
            source: Box::new(e),
        };
        let mut registry = TemplateRegistry {
            named: BTreeMap::new(),
            phase_specific: BTreeMap::new(),
        };
        for (name, text) in named {
            let template = Template::parse(text).map_err(wrap(name.clone()))?;
            registry.named.insert(name, template);
        }
        for (phase, text) in phases {
            let template = Template::parse(text).map_err(wrap(phase.to_string()))?;
            registry.phase_specific.insert(phase, template);
        }
        Ok(registry)
    }

    pub fn get(&self, key: &TemplateKey) -> Option<&Template> {
        match key {
            TemplateKey::Named(name) => self.named.get(name),
            TemplateKey::Phase(phase) => self.phase_specific.get(phase),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.named.keys().map(String::as_str)
    }

    /// Choose the template for an announcement.
    ///
    /// An explicit request is honoured when it names a known template or a
    /// configured phase variant, otherwise it falls back to `default`. With
    /// [`AUTO`], priority is glitch, then mathematical, then the document's
    /// phase variant, then `default`.
    pub fn select(&self, metadata: &ArticleMetadata, requested: &str) -> TemplateKey {
        if requested != AUTO {
            if self.named.contains_key(requested) {
                return TemplateKey::named(requested);
            }
            if let Some(phase) = Phase::from_marker(requested) {
                if self.phase_specific.contains_key(&phase) {
                    return TemplateKey::Phase(phase);
                }
            }
            warn!(requested = %requested, "Unknown announcement template, using default");
            return TemplateKey::named(DEFAULT_TEMPLATE);
        }

        if metadata.has_glitch {
            TemplateKey::named(GLITCH_TEMPLATE)
        } else if metadata.has_math {
            TemplateKey::named(MATH_TEMPLATE)
        } else if self.phase_specific.contains_key(&metadata.phase) {
            TemplateKey::Phase(metadata.phase)
        } else {
            TemplateKey::named(DEFAULT_TEMPLATE)
        }
    }

    /// Render the template at `key`.
    ///
    /// Output longer than [`FEED_TEXT_LIMIT`] is replaced by the minimal
    /// template with the title cut to [`MINIMAL_TITLE_LIMIT`] characters.
    pub fn render(
        &self,
        key: &TemplateKey,
        metadata: &ArticleMetadata,
        title: &str,
        excerpt: &str,
        url: &str,
    ) -> String {
        let template = self.get(key).unwrap_or_else(|| self.fallback(DEFAULT_TEMPLATE));
        let text = template.render(&RenderValues::new(metadata, title, excerpt, url));
        let length = text.chars().count();
        if length <= FEED_TEXT_LIMIT {
            return text;
        }

        debug!(template = %key, length, "Rendered announcement too long, using minimal template");
        let short_title = truncate_chars(title, MINIMAL_TITLE_LIMIT);
        let minimal = self
            .fallback(MINIMAL_TEMPLATE)
            .render(&RenderValues::new(metadata, &short_title, excerpt, url));
        if minimal.chars().count() > FEED_TEXT_LIMIT {
            warn!(length = minimal.chars().count(), "Minimal announcement still too long, truncating");
            return truncate_chars(&minimal, FEED_TEXT_LIMIT - ELLIPSIS.len());
        }
        minimal
    }

    fn fallback(&self, name: &str) -> &Template {
        self.named
            .get(name)
            .or_else(|| BUILTIN.named.get(name))
            .expect("built-in registry defines default and minimal templates")
    }
}

/// Cut `text` to `limit` characters, appending an ellipsis when cut.
fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(limit).collect();
    cut.push_str(ELLIPSIS);
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_unknown_placeholder() {
        let err = Template::parse("hello {nope}").unwrap_err();
        assert!(matches!(err, TemplateError::UnknownPlaceholder(ref n) if n == "nope"));
    }

    #[test]
    fn parse_keeps_non_placeholder_braces_literal() {
        let t = Template::parse("set {1, 2} and { title }").unwrap();
        assert_eq!(t.placeholders().count(), 0);
    }

    #[test]
    fn encode_title_keeps_boundary_code_points() {
        assert_eq!(encode_title("HAL"), "IBM");
        assert_eq!(encode_title("\u{10FFFF}"), "\u{10FFFF}");
        assert_eq!(encode_title("\u{D7FF}"), "\u{D7FF}");
    }

    #[test]
    fn truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("αβγ", 2), "αβ...");
        assert_eq!(truncate_chars("αβ", 2), "αβ");
    }
}
