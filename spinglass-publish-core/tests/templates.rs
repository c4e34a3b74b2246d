use std::collections::BTreeMap;

use spinglass_publish_core::extract::{ArticleMetadata, Phase};
use spinglass_publish_core::templates::{
    TemplateError, TemplateKey, TemplateRegistry, AUTO, FEED_TEXT_LIMIT,
};

fn meta(has_glitch: bool, has_math: bool, phase: Phase) -> ArticleMetadata {
    ArticleMetadata {
        title: "Test".to_string(),
        excerpt: "Hello world".to_string(),
        has_glitch,
        has_math,
        phase,
    }
}

#[test]
fn test_auto_selection_priority() {
    struct TestCase {
        name: &'static str,
        metadata: ArticleMetadata,
        expected: TemplateKey,
    }

    let cases = vec![
        TestCase {
            name: "glitch beats math and phase",
            metadata: meta(true, true, Phase::Alpha),
            expected: TemplateKey::named("glitch"),
        },
        TestCase {
            name: "math beats phase",
            metadata: meta(false, true, Phase::Beta),
            expected: TemplateKey::named("mathematical"),
        },
        TestCase {
            name: "phase variant",
            metadata: meta(false, false, Phase::Gamma),
            expected: TemplateKey::Phase(Phase::Gamma),
        },
        TestCase {
            name: "unknown phase falls to default",
            metadata: meta(false, false, Phase::Unknown),
            expected: TemplateKey::named("default"),
        },
        TestCase {
            name: "digest update pseudo-phase falls to default",
            metadata: meta(false, false, Phase::Update),
            expected: TemplateKey::named("default"),
        },
    ];

    let registry = TemplateRegistry::builtin();
    for case in cases {
        assert_eq!(registry.select(&case.metadata, AUTO), case.expected, "{}", case.name);
    }
}

#[test]
fn test_explicit_selection() {
    let registry = TemplateRegistry::builtin();
    let m = meta(true, true, Phase::Alpha);

    assert_eq!(registry.select(&m, "cryptic"), TemplateKey::named("cryptic"));
    assert_eq!(registry.select(&m, "phaseβ"), TemplateKey::Phase(Phase::Beta));
    assert_eq!(registry.select(&m, "phaseg"), TemplateKey::Phase(Phase::Gamma));
    assert_eq!(registry.select(&m, "no-such-template"), TemplateKey::named("default"));
}

#[test]
fn test_default_render_contains_title_and_excerpt() {
    let registry = TemplateRegistry::builtin();
    let m = meta(false, false, Phase::Unknown);
    let key = registry.select(&m, AUTO);
    let text = registry.render(&key, &m, &m.title, &m.excerpt, "→ Site: https://example.org/");

    assert_eq!(
        text,
        "⟨⟨ NEW SPINGL∆SS NODE ⟩⟩\n\nTest\n\n\"Hello world\"\n\n→ → Site: https://example.org/"
    );
}

#[test]
fn test_derived_placeholders() {
    let registry = TemplateRegistry::builtin();

    let m = meta(false, false, Phase::Unknown);
    let cryptic = registry.render(&TemplateKey::named("cryptic"), &m, "HAL", "", "u");
    assert!(cryptic.contains("\nIBM\n"), "got: {cryptic}");

    let network = registry.render(&TemplateKey::named("network_state"), &m, "t", "one two  three", "u");
    assert!(network.contains("stake: 3 words"), "got: {network}");

    let stable = registry.render(&TemplateKey::Phase(Phase::Gamma), &m, "t", "e", "u");
    assert!(stable.contains("topology: STABLE"));

    let glitched = meta(true, false, Phase::Gamma);
    let warped = registry.render(&TemplateKey::Phase(Phase::Gamma), &glitched, "t", "e", "u");
    assert!(warped.contains("topology: WARPED"));
}

#[test]
fn test_length_guard_falls_back_to_minimal() {
    let registry = TemplateRegistry::builtin();
    let m = meta(false, false, Phase::Unknown);
    let title = "T".repeat(120);
    let excerpt = "e".repeat(280);

    let text = registry.render(&TemplateKey::named("default"), &m, &title, &excerpt, "https://x.y/");

    assert!(text.chars().count() <= FEED_TEXT_LIMIT);
    let first_line = text.lines().next().unwrap();
    let rendered_title = first_line.strip_prefix("new node: ").expect("minimal template");
    assert_eq!(rendered_title, format!("{}...", "T".repeat(50)));
    assert!(rendered_title.chars().count() <= 53);
    assert!(!text.contains(&excerpt));
}

#[test]
fn test_length_guard_short_title_kept_whole() {
    let registry = TemplateRegistry::builtin();
    let m = meta(false, false, Phase::Unknown);
    let excerpt = "e".repeat(300);

    let text = registry.render(&TemplateKey::named("default"), &m, "Short", &excerpt, "u");
    assert_eq!(text, "new node: Short\nu");
}

#[test]
fn test_length_guard_hard_truncates_oversized_minimal() {
    let registry = TemplateRegistry::builtin();
    let m = meta(false, false, Phase::Unknown);
    let url = "https://x.y/".repeat(40);

    let text = registry.render(&TemplateKey::named("minimal"), &m, "t", "", &url);
    assert_eq!(text.chars().count(), FEED_TEXT_LIMIT);
    assert!(text.ends_with("..."));
}

#[test]
fn test_overrides_replace_add_and_set_phase_variants() {
    let mut overrides = BTreeMap::new();
    overrides.insert("default".to_string(), "custom {title}".to_string());
    overrides.insert("short".to_string(), "{title} {url}".to_string());
    overrides.insert("phaseα".to_string(), "alpha {wordCount}".to_string());
    let registry = TemplateRegistry::with_overrides(&overrides).unwrap();
    let m = meta(false, false, Phase::Alpha);

    assert_eq!(registry.render(&TemplateKey::named("default"), &m, "X", "", "u"), "custom X");
    assert_eq!(registry.render(&registry.select(&m, "short"), &m, "X", "", "u"), "X u");
    assert_eq!(registry.render(&registry.select(&m, AUTO), &m, "X", "a b", "u"), "alpha 2");

    // Built-ins stay untouched.
    let builtin = TemplateRegistry::builtin();
    assert!(builtin.get(&TemplateKey::named("short")).is_none());
}

#[test]
fn test_overrides_reject_unknown_placeholders() {
    let mut overrides = BTreeMap::new();
    overrides.insert("bad".to_string(), "hello {nickname}".to_string());

    match TemplateRegistry::with_overrides(&overrides) {
        Err(TemplateError::Invalid { name, source }) => {
            assert_eq!(name, "bad");
            assert!(matches!(*source, TemplateError::UnknownPlaceholder(ref p) if p == "nickname"));
        }
        other => panic!("expected invalid template error, got {other:?}"),
    }
}

#[test]
fn test_builtin_names() {
    let names: Vec<&str> = TemplateRegistry::builtin().names().collect();
    for expected in ["default", "minimal", "glitch", "mathematical", "cryptic", "network_state"] {
        assert!(names.contains(&expected), "missing {expected}");
    }
}
