mod common;

use common::*;
use htmlide_pdf::fonts::FontStyle;
use htmlide_pdf::pdf::{PaintStyle, State};
use htmlide_pdf::{Config, Document, Error, HtmlRenderer};

const RICH: &str = r#"<html><head><title>Structure</title>
<style>.note { color: #336699; font-style: italic }</style></head>
<body>
<h1>Heading</h1>
<p>Some <b>bold</b>, <i>italic</i> and <u>underlined</u> text with a <a href="http://example.com">link</a>.</p>
<p class="note">A note in a class.</p>
<ul><li>one</li><li>two<ol><li>nested</li></ol></li></ul>
<table border="1"><tr><th>A</th><th>B</th></tr><tr><td>1</td><td>2</td></tr></table>
<img src="missing.png" width="20" height="10">
</body></html>"#;

#[test]
fn xref_offsets_match_object_markers() {
    for compress in [false, true] {
        let pdf = render_with(RICH, &Config { compress, ..config() });
        let offsets = xref_offsets(&pdf);
        assert!(offsets.len() > 5, "only {} xref entries", offsets.len());
        assert_eq!(offsets[0], 0);
        for (id, &offset) in offsets.iter().enumerate().skip(1) {
            let marker = format!("{id} 0 obj");
            assert_eq!(
                &pdf[offset..offset + marker.len()],
                marker.as_bytes(),
                "object {id} (compress={compress})"
            );
        }
    }
}

#[test]
fn xref_entries_are_fixed_width() {
    let pdf = render(RICH);
    let lines = xref_lines(&pdf);
    assert_eq!(lines[0], "0000000000 65535 f ");
    for line in &lines {
        assert_eq!(line.len(), 19, "{line:?}");
    }
    assert!(lines[1..].iter().all(|l| l.ends_with(" 00000 n ")));
}

#[test]
fn header_and_trailer() {
    let pdf = render("<p>x</p>");
    assert!(pdf.starts_with(b"%PDF-1.3\n"));
    assert!(pdf.ends_with(b"%%EOF\n"));
    let size = xref_offsets(&pdf).len();
    assert_eq!(count(&pdf, &format!("/Size {size}\n")), 1);
    assert_eq!(count(&pdf, "/Root "), 1);
    assert_eq!(count(&pdf, "/Info "), 1);
}

#[test]
fn lifecycle_rejects_out_of_state_writes() {
    init_logging();
    let mut doc = Document::new(&config());
    assert_eq!(doc.state(), State::Unopened);
    assert!(matches!(doc.write(b"0 g"), Err(Error::Structural(_))));

    doc.open().unwrap();
    assert_eq!(doc.state(), State::Opened);
    doc.add_page(None).unwrap();
    assert_eq!(doc.state(), State::PageActive);
    doc.rect(10.0, 10.0, 20.0, 5.0, PaintStyle::Stroke).unwrap();

    doc.close().unwrap();
    assert_eq!(doc.state(), State::Finalized);
    let len = doc.output_bytes().unwrap().len();
    doc.close().unwrap();
    assert_eq!(doc.output_bytes().unwrap().len(), len);

    assert!(matches!(doc.write(b"0 g"), Err(Error::Structural(_))));
    assert!(matches!(doc.add_page(None), Err(Error::Structural(_))));
}

#[test]
fn contradictory_primitive_arguments_are_rejected() {
    let mut doc = Document::new(&config());
    doc.add_page(None).unwrap();
    assert!(matches!(
        doc.rect(0.0, 0.0, -1.0, 5.0, PaintStyle::Fill),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        doc.ellipse(50.0, 50.0, 0.0, 5.0, PaintStyle::Stroke),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(doc.dotted_rect(0.0, 0.0, 10.0, 10.0, 0.0), Err(Error::InvalidArgument(_))));
}

#[test]
fn missing_font_metrics_are_fatal() {
    init_logging();
    let mut doc = Document::new(&config());
    doc.add_page(None).unwrap();
    assert!(matches!(
        doc.set_font("no-such-family", FontStyle::REGULAR, 10.0),
        Err(Error::MissingResource(_))
    ));

    let config = Config {
        font_family: "no-such-family".to_string(),
        ..config()
    };
    assert!(matches!(HtmlRenderer::new(&config), Err(Error::MissingResource(_))));
}

#[test]
fn core_fonts_are_registered_once() {
    let pdf = render("<p>a <b>b</b> c <b>d</b> <i>e</i></p>");
    assert_eq!(count(&pdf, "/BaseFont /Helvetica\n"), 1);
    assert_eq!(count(&pdf, "/BaseFont /Helvetica-Bold\n"), 1);
    assert_eq!(count(&pdf, "/BaseFont /Helvetica-Oblique\n"), 1);
}

#[test]
fn compression_shrinks_page_streams() {
    let html = "<p>repeated text </p>".repeat(200);
    let plain = render_with(&html, &config());
    let packed = render_with(&html, &Config::default());
    assert!(count(&packed, "/Filter /FlateDecode") >= 1);
    assert_eq!(count(&plain, "/Filter /FlateDecode"), 0);
    assert!(packed.len() < plain.len());
}
