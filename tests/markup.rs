mod common;

use common::*;
use htmlide_pdf::{Config, Error, HtmlRenderer};

fn render_in(dir: &std::path::Path, html: &str) -> Result<Vec<u8>, Error> {
    init_logging();
    let config = Config {
        base_path: format!("{}/", dir.display()),
        ..config()
    };
    htmlide_pdf::render_html(html, &config)
}

#[test]
fn paragraphs_are_separated_by_a_blank_line() {
    let pdf = render("<p>A</p><p>B</p>");
    let ops = text_ops(&pdf);
    let (a, b) = (find_text(&ops, "A"), find_text(&ops, "B"));
    assert!(a.y - b.y >= 2.0 * 14.3 - 0.05, "{} -> {}", a.y, b.y);
    assert!((a.x - b.x).abs() < 0.01);
}

#[test]
fn heading_is_scaled_and_bookmarked() {
    let pdf = render("<h1>Intro</h1><p>body</p>");
    assert!(count(&pdf, "22.00 Tf") >= 1);
    assert!(count(&pdf, "/Helvetica-Bold") >= 1);
    assert_eq!(count(&pdf, "/Type /Outlines"), 1);
    assert!(count(&pdf, "/Title (Intro)") >= 1);
    find_text(&text_ops(&pdf), "Intro");
}

#[test]
fn links_become_annotations() {
    let pdf = render(
        r##"<p><a href="#end">jump</a> and <a href="http://example.com">out</a></p>
        <p><a name="end">target</a></p>"##,
    );
    assert_eq!(count(&pdf, "/Subtype /Link"), 2);
    assert_eq!(count(&pdf, "/URI (http://example.com)"), 1);
    assert!(count(&pdf, "0.000 0.000 1.000 rg") >= 1);
}

#[test]
fn missing_image_uses_placeholder() {
    let pdf = render(r#"<p>before <img src="nowhere/missing.png" width="20" height="10"> after</p>"#);
    assert_eq!(count(&pdf, "/Subtype /Image"), 1);
    assert!(count(&pdf, " Do Q") >= 1);
}

#[test]
fn png_is_embedded_from_base_path() {
    let dir = scratch_dir("png");
    std::fs::write(dir.join("pixel.png"), png_fixture(4, 3)).unwrap();
    let pdf = render_in(&dir, r#"<img src="pixel.png">"#).unwrap();
    assert_eq!(count(&pdf, "/Subtype /Image"), 1);
    assert_eq!(count(&pdf, "/Width 4"), 1);
    assert_eq!(count(&pdf, "/Height 3"), 1);
}

#[test]
fn same_image_is_embedded_once() {
    let dir = scratch_dir("png-twice");
    std::fs::write(dir.join("pixel.png"), png_fixture(2, 2)).unwrap();
    let pdf = render_in(&dir, r#"<img src="pixel.png"><img src="pixel.png">"#).unwrap();
    assert_eq!(count(&pdf, "/Subtype /Image"), 1);
    assert!(count(&pdf, "/I1 Do") >= 2);
}

#[test]
fn corrupt_image_is_fatal() {
    let dir = scratch_dir("garbage");
    std::fs::write(dir.join("broken.png"), b"definitely not an image").unwrap();
    let result = render_in(&dir, r#"<img src="broken.png">"#);
    assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
}

#[test]
fn css_class_and_inline_styles_apply() {
    let pdf = render(
        r#"<style>.alert { color: #ff0000 } p.quiet { text-transform: uppercase }</style>
        <p class="alert">red</p><p class="quiet">shout</p><p style="text-transform: capitalize">two words</p>"#,
    );
    assert!(count(&pdf, "1.000 0.000 0.000 rg") >= 1);
    let ops = text_ops(&pdf);
    find_text(&ops, "red");
    find_text(&ops, "SHOUT");
    find_text(&ops, "Two Words");
}

#[test]
fn entities_are_decoded() {
    let pdf = render("<p>fish &amp; chips &lt;3 &#65;&#x42;</p>");
    find_text(&text_ops(&pdf), "fish & chips <3 AB");
}

#[test]
fn form_controls_render_inline() {
    let pdf = render(
        r#"<form>
        <input type="text" value="name"> <input type="checkbox" checked>
        <input type="submit" value="Send">
        <select><option>one</option><option selected>two</option></select>
        <textarea cols="10">notes</textarea>
        </form>"#,
    );
    let ops = text_ops(&pdf);
    find_text(&ops, "name");
    find_text(&ops, "Send");
    find_text(&ops, "two");
    find_text(&ops, "notes");
    assert!(count(&pdf, " re B") >= 4);
}

#[test]
fn preformatted_text_keeps_spaces_and_lines() {
    let pdf = render("<pre>a  b\nc</pre>");
    let ops = text_ops(&pdf);
    let first = find_text(&ops, "a\u{fffd}\u{fffd}b");
    let second = find_text(&ops, "c");
    assert!(second.y < first.y);
    assert!(count(&pdf, "/Courier") >= 1);
}

#[test]
fn line_break_returns_to_the_left_edge() {
    let pdf = render("<p>first<br>second</p>");
    let ops = text_ops(&pdf);
    let (a, b) = (find_text(&ops, "first"), find_text(&ops, "second"));
    assert!((a.x - b.x).abs() < 0.01);
    assert!((a.y - b.y - 14.3).abs() < 0.05);
}

#[test]
fn horizontal_rule_draws_a_line() {
    let pdf = render("<p>x</p><hr><p>y</p>");
    assert_eq!(count(&pdf, " l S"), 1);
}

#[test]
fn page_numbers_use_the_total_alias() {
    let config = Config {
        page_numbers: true,
        ..config()
    };
    let pdf = render_with("<p>only page</p>", &config);
    find_text(&text_ops(&pdf), "1/1");
    assert_eq!(count(&pdf, "{nb}"), 0);
}

#[test]
fn title_element_sets_info_title() {
    let pdf = render("<html><head><title>Doc Title</title></head><body><p>x</p></body></html>");
    assert_eq!(count(&pdf, "/Title (Doc Title)"), 1);
    assert!(text_ops(&pdf).iter().all(|op| !op.text.contains("Doc Title")));
}

#[test]
fn configured_title_wins_over_title_element() {
    let config = Config {
        title: Some("Configured".to_string()),
        ..config()
    };
    let pdf = render_with("<title>From Markup</title><p>x</p>", &config);
    assert_eq!(count(&pdf, "/Title (Configured)"), 1);
    assert_eq!(count(&pdf, "From Markup"), 0);
}

#[test]
fn scripts_are_dropped() {
    let pdf = render("<p>shown</p><script>document.write('hidden')</script>");
    find_text(&text_ops(&pdf), "shown");
    assert_eq!(count(&pdf, "hidden"), 0);
}

#[test]
fn renderer_accepts_html_in_pieces() {
    init_logging();
    let mut renderer = HtmlRenderer::new(&config()).unwrap();
    renderer.add_css(".big { font-size: 20pt }");
    renderer.write_html("<p class=\"big\">one</p>").unwrap();
    renderer.write_html("<p>two</p>").unwrap();
    let mut doc = renderer.finish().unwrap();
    let pdf = doc.output_bytes().unwrap().to_vec();
    assert!(count(&pdf, "20.00 Tf") >= 1);
    let ops = text_ops(&pdf);
    find_text(&ops, "one");
    find_text(&ops, "two");
}

#[test]
fn superscript_rise_ends_with_its_run() {
    let pdf = render("<p>x<sup>2</sup> after</p>");
    let text = String::from_utf8_lossy(&pdf);
    let sup = text.find("(2) Tj 0 Ts ET").expect("raised run resets its rise");
    let after = text.find("after)").unwrap();
    assert!(after > sup);
    let tail = &text[sup + "(2) Tj 0 Ts ET".len()..];
    assert!(!tail.contains(" Ts "), "rise leaks past the superscript");
    let ops = text_ops(&pdf);
    let two = find_text(&ops, "2");
    assert!(ops.iter().any(|op| op.text.ends_with('x') && op.x < two.x));
}

#[test]
fn subscript_rise_is_negative_and_reset() {
    let pdf = render("<p>H<sub>2</sub>O</p>");
    let text = String::from_utf8_lossy(&pdf);
    let run = text.find(" Ts (2) Tj 0 Ts ET").expect("lowered run resets its rise");
    let rise = text[..run].rsplit(' ').next().unwrap();
    assert!(rise.parse::<f32>().unwrap() < 0.0, "{rise}");
    assert!(text.contains("O) Tj ET"));
}

#[test]
fn paragraph_close_inside_a_list_ends_the_list() {
    let pdf = htmlide_pdf::render_html("<p>intro<ul><li>A</p><p>next</p>", &config()).unwrap();
    let ops = text_ops(&pdf);
    let (a, next) = (find_text(&ops, "A"), find_text(&ops, "next"));
    assert!(next.y < a.y);
    assert!(next.x < a.x, "text after the list is no longer indented");

    let pdf = htmlide_pdf::render_html("<ul><li>A</p>tail", &config()).unwrap();
    let ops = text_ops(&pdf);
    find_text(&ops, "A");
    find_text(&ops, "tail");
}

#[test]
fn malformed_colors_fall_back_to_the_default() {
    let pdf = htmlide_pdf::render_html(r##"<font color="#éa">x</font>"##, &config()).unwrap();
    find_text(&text_ops(&pdf), "x");
    assert_eq!(count(&pdf, " rg"), 0);

    let pdf = htmlide_pdf::render_html(
        r##"<table><tr><td bgcolor="#ffé0">cell</td><td style="color: #+f+f+f">other</td></tr></table>"##,
        &config(),
    )
    .unwrap();
    let ops = text_ops(&pdf);
    find_text(&ops, "cell");
    find_text(&ops, "other");
    assert_eq!(count(&pdf, " re f"), 0);
    assert_eq!(count(&pdf, " rg"), 0);
}
