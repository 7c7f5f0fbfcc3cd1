mod common;

use common::*;
use htmlide_pdf::fonts::FontStyle;
use htmlide_pdf::html::style::{RunItem, StyleContext};
use htmlide_pdf::html::table::{Table, TableCell};
use htmlide_pdf::{Config, Document, HtmlRenderer};

fn text_cell(text: &str) -> TableCell {
    TableCell {
        content: vec![RunItem::Text {
            text: text.to_string(),
            style: StyleContext::new("helvetica", 11.0),
        }],
        ..TableCell::default()
    }
}

/// Small deterministic generator so failures reproduce.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound
    }
}

#[test]
fn single_cell_table_shrinks_to_its_text() {
    let pdf = render(r#"<table border="1"><tr><td>Hi</td></tr></table>"#);
    let rects = stroked_rects(&pdf);
    assert_eq!(rects.len(), 1, "{rects:?}");

    let mut d = Document::new(&config());
    d.add_page(None).unwrap();
    d.set_font("helvetica", FontStyle::REGULAR, 11.0).unwrap();
    let k = d.k();
    let expected = (d.get_string_width("Hi") + 2.0 * d.cell_margin()) * k;
    assert!((rects[0][2] - expected).abs() < 0.02, "{} vs {expected}", rects[0][2]);
    assert!(rects[0][2] < d.content_width() * k / 4.0);
    find_text(&text_ops(&pdf), "Hi");
}

#[test]
fn resolved_widths_stay_within_bounds() {
    let words = ["a", "table", "of", "pseudo", "random", "content", "with", "unbreakable-ish", "words"];
    let mut rng = Lcg(7);
    let mut d = Document::new(&config());
    d.add_page(None).unwrap();
    d.set_font("helvetica", FontStyle::REGULAR, 11.0).unwrap();

    for round in 0..40 {
        let available = 40.0 + rng.next(160) as f32;
        let mut t = Table::new(5.0);
        if rng.next(3) == 0 {
            t.width = Some(20.0 + rng.next(300) as f32);
        }
        let rows = 1 + rng.next(4);
        let cols = 1 + rng.next(4);
        for _ in 0..rows {
            t.start_row();
            for _ in 0..cols {
                let len = rng.next(12) as usize;
                let text: Vec<&str> = (0..len).map(|_| words[rng.next(words.len() as u64) as usize]).collect();
                let mut cell = text_cell(&text.join(" "));
                if rng.next(5) == 0 {
                    cell.colspan = 2;
                }
                t.add_cell(cell);
            }
            t.end_row();
        }
        t.layout(&mut d, available).unwrap();

        let sum_min: f32 = t.columns().iter().map(|c| c.min).sum();
        let total = t.total_width();
        assert!(total + 1e-3 >= sum_min, "round {round}");
        assert!(total <= available.max(sum_min) + 1e-3, "round {round}");
        let summed: f32 = t.column_widths().iter().sum();
        assert!((summed - total).abs() < 1e-2, "round {round}: {summed} vs {total}");
        for (w, c) in t.column_widths().iter().zip(t.columns()) {
            assert!(*w + 1e-3 >= c.min, "round {round}");
        }
    }
}

fn long_table() -> String {
    let mut html = String::from(r#"<table border="1"><tr><th>Head</th></tr>"#);
    for i in 0..120 {
        html.push_str(&format!("<tr><td>row {i}</td></tr>"));
    }
    html.push_str("</table>");
    html
}

fn render_long_table(repeat_table_header: bool) -> (Vec<u8>, usize) {
    init_logging();
    let config = Config {
        repeat_table_header,
        ..config()
    };
    let mut renderer = HtmlRenderer::new(&config).unwrap();
    renderer.write_html(&long_table()).unwrap();
    let mut doc = renderer.finish().unwrap();
    let pages = doc.page_no();
    (doc.output_bytes().unwrap().to_vec(), pages)
}

#[test]
fn header_row_repeats_on_every_page() {
    let (pdf, pages) = render_long_table(true);
    assert!(pages > 1);
    let heads = text_ops(&pdf).iter().filter(|op| op.text == "Head").count();
    assert_eq!(heads, pages);

    let (pdf, pages) = render_long_table(false);
    assert!(pages > 1);
    let heads = text_ops(&pdf).iter().filter(|op| op.text == "Head").count();
    assert_eq!(heads, 1);
}

#[test]
fn rows_never_cross_the_bottom_margin() {
    let doc = render_document(&long_table());
    let limit = doc.page_break_trigger();
    let pdf = render(&long_table());
    let k = doc.k();
    for [_, y, _, h] in stroked_rects(&pdf) {
        let bottom = doc.page_height() - (y + h) / k;
        assert!(bottom <= limit + 0.01, "row bottom {bottom} past {limit}");
    }
}

#[test]
fn spanning_cells_shift_later_cells() {
    let pdf = render(
        r#"<table border="1">
        <tr><td rowspan="2">A</td><td>B</td></tr>
        <tr><td>C</td></tr>
        <tr><td colspan="2">D</td></tr>
        </table>"#,
    );
    let ops = text_ops(&pdf);
    let (a, b, c, d) = (
        find_text(&ops, "A"),
        find_text(&ops, "B"),
        find_text(&ops, "C"),
        find_text(&ops, "D"),
    );
    assert!((c.x - b.x).abs() < 0.01);
    assert!(c.y < b.y);
    assert!(b.x > a.x);
    assert!(d.y < c.y);
    assert!((d.x - a.x).abs() < 0.01);
}

#[test]
fn nested_table_content_is_kept() {
    let pdf = render("<table><tr><td>outer<table><tr><td>inner</td></tr></table></td></tr></table>");
    let all: String = text_ops(&pdf).iter().map(|op| op.text.as_str()).collect::<Vec<_>>().join(" ");
    assert!(all.contains("outer"), "{all}");
    assert!(all.contains("inner"), "{all}");
}

#[test]
fn cell_background_is_filled() {
    let pdf = render(r##"<table><tr><td bgcolor="#ff0000">x</td></tr></table>"##);
    assert!(count(&pdf, "1.000 0.000 0.000 rg") >= 1);
    assert!(count(&pdf, " re f") >= 1);
}

fn straddling_table(filler_rows: usize) -> String {
    let mut html = String::from(r#"<table border="1">"#);
    for _ in 0..filler_rows {
        html.push_str("<tr><td>f</td><td>f</td></tr>");
    }
    html.push_str(r#"<tr><td rowspan="6" style="border: 1px solid #00ff00">span</td><td>a</td></tr>"#);
    for _ in 0..5 {
        html.push_str("<tr><td>b</td></tr>");
    }
    html.push_str("</table>");
    html
}

#[test]
fn rowspan_across_a_page_break_is_clipped_and_continued() {
    let doc = render_document("<p>x</p>");
    let (k, limit, page_height) = (doc.k(), doc.page_break_trigger(), doc.page_height());
    let mut straddled = false;
    for filler in 38..56 {
        let pdf = render(&straddling_table(filler));
        for [_, y, _, h] in stroked_rects(&pdf) {
            let bottom = page_height - (y + h) / k;
            assert!(bottom <= limit + 0.01, "filler {filler}: frame bottom {bottom} past {limit}");
        }
        let frames = count(&pdf, "0.000 1.000 0.000 RG");
        assert!((1..=2).contains(&frames), "filler {filler}: {frames} span frames");
        straddled |= frames == 2;
    }
    assert!(straddled);
}

#[test]
fn huge_colspan_is_clamped() {
    let pdf = render(r#"<table border="1"><tr><td colspan="3000000" rowspan="100000">wide</td></tr><tr><td>next</td></tr></table>"#);
    let ops = text_ops(&pdf);
    find_text(&ops, "wide");
    find_text(&ops, "next");
}
