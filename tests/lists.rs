mod common;

use common::*;
use htmlide_pdf::html::list::{MAX_ALPHA, alpha_numbering, roman_numbering};

fn markers(pdf: &[u8]) -> Vec<String> {
    text_ops(pdf)
        .into_iter()
        .map(|op| op.text)
        .filter(|t| t.ends_with('.'))
        .collect()
}

fn decode_alpha(s: &str) -> usize {
    s.bytes().fold(0, |n, b| n * 26 + (b - b'A' + 1) as usize)
}

#[test]
fn alpha_numbering_boundaries() {
    assert_eq!(alpha_numbering(26, true), "Z");
    assert_eq!(alpha_numbering(27, true), "AA");
    assert_eq!(alpha_numbering(702, true), "ZZ");
    assert_eq!(alpha_numbering(703, true), "AAA");
    assert_eq!(alpha_numbering(3, false), "c");
    assert_eq!(alpha_numbering(0, true), "?");
    assert_eq!(alpha_numbering(MAX_ALPHA + 1, true), "?");
}

#[test]
fn alpha_numbering_is_bijective() {
    let mut previous = String::new();
    for n in 1..=MAX_ALPHA {
        let s = alpha_numbering(n, true);
        assert!(s.bytes().all(|b| b.is_ascii_uppercase()), "{n} -> {s}");
        assert_eq!(decode_alpha(&s), n);
        assert_ne!(s, previous);
        previous = s;
    }
}

#[test]
fn roman_numbering_samples() {
    assert_eq!(roman_numbering(3, true), "III");
    assert_eq!(roman_numbering(9, false), "ix");
    assert_eq!(roman_numbering(2024, true), "MMXXIV");
    assert_eq!(roman_numbering(4000, true), "?");
}

#[test]
fn nested_ordered_lists_indent_and_resume() {
    let pdf = render("<ol><li>A<ol><li>B</li></ol></li><li>C</li></ol>");
    assert_eq!(markers(&pdf), vec!["1.", "1.", "2."]);

    let ops = text_ops(&pdf);
    let (a, b, c) = (find_text(&ops, "A"), find_text(&ops, "B"), find_text(&ops, "C"));
    assert!(b.x > a.x);
    assert!((c.x - a.x).abs() < 0.01);
    assert!(a.y > b.y && b.y > c.y);
}

#[test]
fn start_and_type_attributes() {
    assert_eq!(markers(&render(r#"<ol start="3"><li>x</li><li>y</li></ol>"#)), vec!["3.", "4."]);
    assert_eq!(markers(&render(r#"<ol type="A"><li>x</li><li>y</li></ol>"#)), vec!["A.", "B."]);
    assert_eq!(markers(&render(r#"<ol type="i"><li>x</li><li>y</li></ol>"#)), vec!["i.", "ii."]);
    assert_eq!(
        markers(&render(r#"<ol style="list-style-type: lower-alpha"><li>x</li><li>y</li></ol>"#)),
        vec!["a.", "b."]
    );
}

#[test]
fn sibling_lists_restart_numbering() {
    let pdf = render("<ol><li>one</li><li>two</li></ol><p>between</p><ol><li>three</li></ol>");
    assert_eq!(markers(&pdf), vec!["1.", "2.", "1."]);
}

#[test]
fn unordered_list_uses_dingbat_bullets() {
    let pdf = render("<ul><li>one</li><li>two</li></ul>");
    assert_eq!(count(&pdf, "/BaseFont /ZapfDingbats"), 1);
    let bullets = text_ops(&pdf).iter().filter(|op| op.text == "l").count();
    assert_eq!(bullets, 2);
    find_text(&text_ops(&pdf), "one");
    find_text(&text_ops(&pdf), "two");
}

#[test]
fn long_item_wraps_under_its_own_indent() {
    let item = "word ".repeat(80);
    let pdf = render(&format!("<ul><li>{item}</li></ul>"));
    let ops = text_ops(&pdf);
    let lines: Vec<_> = ops.iter().filter(|op| op.text.starts_with("word")).collect();
    assert!(lines.len() > 1);
    for line in &lines[1..] {
        assert!((line.x - lines[0].x).abs() < 0.01);
    }
}
