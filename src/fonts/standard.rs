//! Metrics for the standard PDF fonts that are referenced by name and never
//! embedded.

use super::{FontKind, FontMetrics, FontStyle};

/// Printable ASCII widths (0x20..=0x7E) per face, in 1/1000 em.
type AsciiWidths = [u16; 95];

#[rustfmt::skip]
const HELVETICA: AsciiWidths = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: AsciiWidths = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
const TIMES_ROMAN: AsciiWidths = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

#[rustfmt::skip]
const TIMES_BOLD: AsciiWidths = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778,
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500,
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500,
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
];

#[rustfmt::skip]
const TIMES_ITALIC: AsciiWidths = [
    250, 333, 420, 500, 500, 833, 778, 214, 333, 333, 500, 675, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 675, 675, 675, 500,
    920, 611, 611, 667, 722, 611, 611, 722, 722, 333, 444, 667, 556, 833, 667, 722,
    611, 722, 611, 500, 556, 722, 611, 833, 611, 556, 556, 389, 278, 389, 422, 500,
    333, 500, 500, 444, 500, 444, 278, 500, 500, 278, 278, 444, 278, 722, 500, 500,
    500, 500, 389, 389, 278, 500, 444, 667, 444, 444, 389, 400, 275, 400, 541,
];

#[rustfmt::skip]
const TIMES_BOLD_ITALIC: AsciiWidths = [
    250, 389, 555, 500, 500, 833, 778, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    832, 667, 667, 667, 722, 667, 667, 722, 778, 389, 500, 667, 611, 889, 722, 722,
    611, 722, 667, 556, 611, 722, 667, 889, 667, 611, 611, 333, 278, 333, 570, 500,
    333, 500, 500, 444, 500, 444, 333, 500, 556, 278, 278, 500, 278, 778, 556, 500,
    500, 500, 389, 389, 278, 556, 444, 667, 500, 444, 389, 348, 220, 348, 570,
];

#[rustfmt::skip]
const SYMBOL: AsciiWidths = [
    250, 333, 713, 500, 549, 833, 778, 439, 333, 333, 500, 549, 250, 549, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 549, 549, 549, 444,
    549, 722, 667, 722, 612, 611, 763, 603, 722, 333, 631, 722, 686, 889, 722, 722,
    768, 741, 556, 592, 611, 690, 439, 768, 645, 795, 611, 333, 863, 333, 658, 500,
    500, 631, 549, 549, 494, 439, 521, 411, 603, 329, 603, 549, 549, 576, 521, 549,
    549, 521, 549, 603, 439, 576, 713, 686, 493, 686, 494, 480, 200, 480, 549,
];

#[rustfmt::skip]
const ZAPF_DINGBATS: AsciiWidths = [
    278, 974, 961, 974, 980, 719, 789, 790, 791, 690, 960, 939, 549, 855, 911, 933,
    911, 945, 974, 755, 846, 762, 761, 571, 677, 763, 760, 759, 754, 494, 552, 537,
    577, 692, 786, 788, 788, 790, 793, 794, 816, 823, 789, 841, 823, 833, 816, 831,
    923, 744, 723, 749, 790, 792, 695, 776, 768, 792, 759, 707, 708, 682, 701, 826,
    815, 789, 789, 707, 687, 696, 689, 786, 787, 713, 791, 785, 791, 873, 761, 762,
    762, 759, 759, 892, 892, 788, 784, 438, 138, 277, 415, 392, 392, 668, 668,
];

/// Map a CSS/HTML family name onto one of the five core families.
pub fn core_family(name: &str) -> Option<&'static str> {
    let name = name.trim().trim_matches(|c| c == '"' || c == '\'').to_lowercase();
    match name.as_str() {
        "arial" | "helvetica" | "verdana" | "tahoma" | "sans-serif" | "sans" => Some("helvetica"),
        "times" | "times new roman" | "timesnewroman" | "georgia" | "serif" => Some("times"),
        "courier" | "courier new" | "couriernew" | "monospace" => Some("courier"),
        "symbol" => Some("symbol"),
        "zapfdingbats" | "dingbats" => Some("zapfdingbats"),
        _ => None,
    }
}

/// Metrics for a core face, or `None` when `family` is not a core family.
pub(super) fn core_metrics(family: &str, style: FontStyle) -> Option<FontMetrics> {
    let family = core_family(family)?;
    let (name, ascii): (&str, Option<&AsciiWidths>) = match (family, style.bold, style.italic) {
        ("courier", false, false) => ("Courier", None),
        ("courier", true, false) => ("Courier-Bold", None),
        ("courier", false, true) => ("Courier-Oblique", None),
        ("courier", true, true) => ("Courier-BoldOblique", None),
        ("helvetica", false, false) => ("Helvetica", Some(&HELVETICA)),
        ("helvetica", true, false) => ("Helvetica-Bold", Some(&HELVETICA_BOLD)),
        ("helvetica", false, true) => ("Helvetica-Oblique", Some(&HELVETICA)),
        ("helvetica", true, true) => ("Helvetica-BoldOblique", Some(&HELVETICA_BOLD)),
        ("times", false, false) => ("Times-Roman", Some(&TIMES_ROMAN)),
        ("times", true, false) => ("Times-Bold", Some(&TIMES_BOLD)),
        ("times", false, true) => ("Times-Italic", Some(&TIMES_ITALIC)),
        ("times", true, true) => ("Times-BoldItalic", Some(&TIMES_BOLD_ITALIC)),
        // Symbolic faces have no styled variants; the style is ignored.
        ("symbol", _, _) => ("Symbol", Some(&SYMBOL)),
        _ => ("ZapfDingbats", Some(&ZAPF_DINGBATS)),
    };

    let widths = match ascii {
        None => [600u16; 256],
        Some(table) if family == "symbol" || family == "zapfdingbats" => {
            let mut widths = [table[0]; 256];
            widths[0x20..0x7F].copy_from_slice(table);
            for w in widths[0x80..].iter_mut() {
                *w = 500;
            }
            widths
        }
        Some(table) => latin_widths(table),
    };

    Some(FontMetrics {
        kind: FontKind::Core,
        name: name.to_string(),
        descriptor: Vec::new(),
        widths,
        differences: None,
        underline_position: -100,
        underline_thickness: 50,
        file: None,
    })
}

/// Extend ASCII widths to the full WinAnsi range by borrowing the width of the
/// closest ASCII glyph for each upper-half character.
fn latin_widths(ascii: &AsciiWidths) -> [u16; 256] {
    let of = |c: u8| ascii[(c - 0x20) as usize];
    let mut widths = [of(b' '); 256];
    widths[0x20..0x7F].copy_from_slice(ascii);
    for byte in 0x7Fu16..=0xFF {
        let byte = byte as u8;
        widths[byte as usize] = of(latin_stand_in(byte));
    }
    widths
}

fn latin_stand_in(byte: u8) -> u8 {
    match byte {
        0x80 | 0x83 | 0x86 | 0x87 | 0x96 | 0xA2..=0xA5 | 0xA7 | 0xAB | 0xB6 | 0xBB => b'0',
        0x82 => b',',
        0x84 | 0x93 | 0x94 => b'"',
        0x85 | 0x89 | 0x8C | 0x97 | 0x99 => b'W',
        0x88 | 0x98 => b'^',
        0x8A => b'S',
        0x8B | 0x9B | 0xAD | 0xB2 | 0xB3 | 0xB9 => b'-',
        0x8E => b'Z',
        0x91 | 0x92 => b'\'',
        0x95 | 0xB0 => b'*',
        0x9A => b's',
        0x9C | 0xE6 => b'm',
        0x9E => b'z',
        0x9F | 0xDD => b'Y',
        0xA1 => b'!',
        0xA6 => b'|',
        0xA8 | 0xAF | 0xB4 | 0xB8 => b'`',
        0xA9 | 0xAE => b'O',
        0xAA | 0xBA => b'r',
        0xAC | 0xB1 | 0xD7 | 0xF7 => b'+',
        0xB5 => b'u',
        0xB7 => b'.',
        0xBC..=0xBE => b'M',
        0xBF => b'?',
        0xC0..=0xC5 => b'A',
        0xC6 => b'W',
        0xC7 => b'C',
        0xC8..=0xCB => b'E',
        0xCC..=0xCF => b'I',
        0xD0 => b'D',
        0xD1 => b'N',
        0xD2..=0xD6 | 0xD8 => b'O',
        0xD9..=0xDC => b'U',
        0xDE => b'P',
        0xDF => b'b',
        0xE0..=0xE5 => b'a',
        0xE7 => b'c',
        0xE8..=0xEB => b'e',
        0xEC..=0xEF => b'i',
        0xF0 | 0xF2..=0xF6 | 0xF8 => b'o',
        0xF1 => b'n',
        0xF9..=0xFC => b'u',
        0xFD | 0xFF => b'y',
        0xFE => b'p',
        _ => b' ',
    }
}
