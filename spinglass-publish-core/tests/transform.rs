use chrono::Utc;
use spinglass_publish_core::document::Document;
use spinglass_publish_core::transform::{
    collapse_blank_lines, convert_code, convert_headings, convert_lists, convert_markers,
    extract_body, remove_decorations, strip_tags, Transformer, CLOSING_GLYPH, STAGES,
};

#[test]
fn test_transform_minimal_article() {
    let d = Document::new(
        "articles/test.html",
        "<html><head><title>x</title></head><body><h1>Test</h1><p>Hello world</p></body></html>",
        Utc::now(),
    );
    let out = Transformer::default().transform(&d);

    assert_eq!(
        out,
        "# Test\n\nHello world\n\n---\n\nOriginally published at https://spin.pyokosmeme.group/\n\n⟨⟨ ∎ ⟩⟩"
    );
}

#[test]
fn test_transform_uses_configured_canonical_url() {
    let out = Transformer::new("https://example.org/").transform_text("<p>x</p>");
    assert!(out.contains("Originally published at https://example.org/"));
    assert!(out.ends_with(CLOSING_GLYPH));
}

#[test]
fn test_stage_order() {
    let names: Vec<&str> = STAGES.iter().map(|s| s.name).collect();
    assert_eq!(
        names,
        [
            "body", "decorations", "headings", "paragraphs", "emphasis", "markers", "code",
            "lists", "strip", "collapse"
        ]
    );
}

#[test]
fn test_extract_body_falls_back_to_whole_document() {
    assert_eq!(extract_body("<body class=\"x\">inner</body>"), "inner");
    assert_eq!(extract_body("<p>no body</p>"), "<p>no body</p>");
}

#[test]
fn test_remove_decorations_drops_scanline_with_contents() {
    let out = remove_decorations(
        r#"a<div class="scanline">noise</div>b<script>x()</script>c<!-- note -->d"#,
    );
    assert_eq!(out, "abcd");
}

#[test]
fn test_convert_headings_inserts_blank_line_before_h2() {
    let out = convert_headings("<h1>One</h1>text<h2> Two </h2>");
    assert_eq!(out, "\n# One\n\ntext\n\n## Two\n\n");
}

#[test]
fn test_convert_markers() {
    let out = convert_markers(
        r#"<span class="glitch">err</span> and <span class="math-corrupt">x²</span>"#,
    );
    assert_eq!(out, "⟨err⟩ and ∂[x²]∂");
}

#[test]
fn test_convert_code_blocks_and_inline() {
    let out = convert_code("<pre><code>\nfn main() {}\n</code></pre>use <code>cargo</code>");
    assert_eq!(out, "\n\n```\nfn main() {}\n```\n\nuse `cargo`");
}

#[test]
fn test_convert_lists() {
    let out = convert_lists("<ul><li>a</li><li> b </li></ul>");
    assert_eq!(out, "\n\n- a\n- b\n\n\n");
}

#[test]
fn test_collapse_blank_lines() {
    assert_eq!(collapse_blank_lines("a  \n\n\n\n\nb\n\nc"), "a\n\nb\n\nc");
}

#[test]
fn test_full_pipeline_with_markup_mix() {
    let html = r#"<body>
<div class="scanline"><p>overlay</p></div>
<h1>Title</h1>
<p>Some <em>soft</em> and <strong>loud</strong> words with a <span class="glitch">fault</span>.</p>
<ul>
  <li>first</li>
  <li>second</li>
</ul>
<p>Call <code>run()</code>.</p>
</body>"#;
    let out = Transformer::default().transform_text(html);

    assert!(out.starts_with("# Title\n\n"), "got: {out}");
    assert!(out.contains("Some *soft* and **loud** words with a ⟨fault⟩."));
    assert!(out.contains("- first\n"));
    assert!(out.contains("- second\n"));
    assert!(out.contains("Call `run()`."));
    assert!(!out.contains("overlay"));
    assert!(!out.contains('<'));
    assert!(!out.contains("\n\n\n"));
}

#[test]
fn test_degrades_to_tag_stripped_text() {
    let out = Transformer::default().transform_text("<div><span>bare</span> text</div>");
    assert!(out.starts_with("bare text\n\n---"));
}

#[test]
fn test_strip_tags_decodes_entities_after_stripping() {
    struct TestCase {
        input: &'static str,
        expected: &'static str,
    }

    let cases = vec![
        TestCase {
            input: "<p>if a &lt; b and c &gt; d then done</p>",
            expected: "if a < b and c > d then done",
        },
        TestCase {
            input: "<b>Spin &amp; Glass</b>",
            expected: "Spin & Glass",
        },
        TestCase {
            input: "&lt;em&gt;literal&lt;/em&gt;",
            expected: "<em>literal</em>",
        },
    ];

    for case in cases {
        assert_eq!(strip_tags(case.input), case.expected, "input: {}", case.input);
    }
}
