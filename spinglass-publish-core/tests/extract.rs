use chrono::Utc;
use spinglass_publish_core::document::Document;
use spinglass_publish_core::extract::{extract, Phase};

fn doc(path: &str, content: &str) -> Document {
    Document::new(path, content, Utc::now())
}

#[test]
fn test_extract_plain_article() {
    let d = doc(
        "articles/test.html",
        "<html><body><h1>Test</h1><p>Hello world</p></body></html>",
    );
    let meta = extract(&d);

    assert_eq!(meta.title, "Test");
    assert_eq!(meta.excerpt, "Hello world");
    assert!(!meta.has_glitch);
    assert!(!meta.has_math);
    assert_eq!(meta.phase, Phase::Unknown);
}

#[test]
fn test_extract_is_deterministic() {
    let d = doc(
        "phaseβ/node.html",
        r#"<h1 class="title">⟨⟨ Node ⟩⟩</h1><p>a <span class="glitch">b</span></p>"#,
    );
    assert_eq!(extract(&d), extract(&d));
}

#[test]
fn test_extract_defaults_when_structure_missing() {
    let meta = extract(&doc("x.html", "just some text, no markup"));
    assert_eq!(meta.title, "Untitled");
    assert_eq!(meta.excerpt, "");
}

#[test]
fn test_extract_title_strips_decorations_and_decodes_entities() {
    let meta = extract(&doc(
        "x.html",
        "<h1>⟨⟨ Spin &amp; <em>Glass</em> ⟩⟩</h1><p>Caf&eacute; &lt;3</p>",
    ));
    assert_eq!(meta.title, "Spin & Glass");
    assert_eq!(meta.excerpt, "Café <3");
}

#[test]
fn test_excerpt_length_invariant() {
    struct TestCase {
        name: &'static str,
        paragraph_len: usize,
        expect_ellipsis: bool,
    }

    let cases = vec![
        TestCase { name: "short", paragraph_len: 12, expect_ellipsis: false },
        TestCase { name: "exactly at limit", paragraph_len: 300, expect_ellipsis: false },
        TestCase { name: "one over limit", paragraph_len: 301, expect_ellipsis: true },
        TestCase { name: "far over limit", paragraph_len: 2000, expect_ellipsis: true },
    ];

    for case in cases {
        let paragraph = "α".repeat(case.paragraph_len);
        let meta = extract(&doc("x.html", &format!("<p>{paragraph}</p>")));
        let len = meta.excerpt.chars().count();

        assert!(len <= 303, "{}: excerpt has {} chars", case.name, len);
        assert_eq!(meta.excerpt.ends_with("..."), case.expect_ellipsis, "{}", case.name);
        if case.expect_ellipsis {
            assert_eq!(len, 303, "{}", case.name);
        } else {
            assert_eq!(len, case.paragraph_len, "{}", case.name);
        }
    }
}

#[test]
fn test_marker_flags_are_independent() {
    let both = extract(&doc(
        "x.html",
        r#"<p><span class="glitch">x</span><span class="eq math-corrupt">y</span></p>"#,
    ));
    assert!(both.has_glitch && both.has_math);

    let math_only = extract(&doc("x.html", r#"<div class="math-corrupt">∫</div>"#));
    assert!(!math_only.has_glitch && math_only.has_math);

    let neither = extract(&doc("x.html", "<p>a glitch in the math-corrupt text</p>"));
    assert!(!neither.has_glitch && !neither.has_math);
}

#[test]
fn test_phase_priority() {
    let cases = [
        ("store/phaseα/a.html", Phase::Alpha),
        ("store/phaseβ/phaseα/a.html", Phase::Alpha),
        ("store/PHASEB/a.html", Phase::Beta),
        ("store/phaseγ/a.html", Phase::Gamma),
        ("store/phaseg/phaseb.html", Phase::Beta),
        ("store/drafts/a.html", Phase::Unknown),
    ];
    for (path, expected) in cases {
        assert_eq!(Phase::from_path(path), expected, "path {path}");
        assert_eq!(extract(&doc(path, "")).phase, expected, "path {path}");
    }
}
