#![allow(dead_code)]

use std::sync::OnceLock;

use htmlide_pdf::{Config, Document, HtmlRenderer};
use regex::Regex;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Defaults with uncompressed page streams so content can be inspected.
pub fn config() -> Config {
    Config {
        compress: false,
        ..Config::default()
    }
}

pub fn render(html: &str) -> Vec<u8> {
    render_with(html, &config())
}

pub fn render_with(html: &str, config: &Config) -> Vec<u8> {
    init_logging();
    htmlide_pdf::render_html(html, config).unwrap()
}

/// Render and keep the closed document for geometry queries.
pub fn render_document(html: &str) -> Document {
    init_logging();
    let mut renderer = HtmlRenderer::new(&config()).unwrap();
    renderer.write_html(html).unwrap();
    renderer.finish().unwrap()
}

/// Byte offsets listed in the xref table, indexed by object id (entry 0 is
/// the free-list head).
pub fn xref_offsets(pdf: &[u8]) -> Vec<usize> {
    let text = String::from_utf8_lossy(pdf);
    let start = text.rfind("\nxref\n").expect("no xref table") + "\nxref\n".len();
    let mut lines = text[start..].lines();
    let header = lines.next().expect("no xref subsection header");
    let count: usize = header
        .split_whitespace()
        .nth(1)
        .and_then(|n| n.parse().ok())
        .expect("bad xref subsection header");
    lines
        .take(count)
        .map(|l| l[..10].parse().expect("bad xref entry"))
        .collect()
}

/// Raw xref entry lines, including their trailing space.
pub fn xref_lines(pdf: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(pdf);
    let start = text.rfind("\nxref\n").expect("no xref table") + "\nxref\n".len();
    text[start..]
        .split('\n')
        .skip(1)
        .take_while(|l| !l.starts_with("trailer"))
        .map(str::to_string)
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextOp {
    pub x: f32,
    pub y: f32,
    pub text: String,
}

static TEXT_OP: OnceLock<Regex> = OnceLock::new();
static RECT_OP: OnceLock<Regex> = OnceLock::new();

/// Every `BT x y Td (...) Tj ET` in document order, coordinates in points.
pub fn text_ops(pdf: &[u8]) -> Vec<TextOp> {
    let re = TEXT_OP.get_or_init(|| {
        Regex::new(r"BT (-?[\d.]+) (-?[\d.]+) Td (?:-?[\d.]+ Ts )?\(((?:[^()\\]|\\.)*)\) Tj (?:0 Ts )?ET").unwrap()
    });
    let text = String::from_utf8_lossy(pdf);
    re.captures_iter(&text)
        .map(|c| TextOp {
            x: c[1].parse().unwrap(),
            y: c[2].parse().unwrap(),
            text: unescape(&c[3]),
        })
        .collect()
}

pub fn find_text<'a>(ops: &'a [TextOp], text: &str) -> &'a TextOp {
    ops.iter()
        .find(|op| op.text == text)
        .unwrap_or_else(|| panic!("no text op {text:?} in {ops:?}"))
}

/// Stroked rectangles `x y w h re S`, in points.
pub fn stroked_rects(pdf: &[u8]) -> Vec<[f32; 4]> {
    let re = RECT_OP.get_or_init(|| {
        Regex::new(r"(-?[\d.]+) (-?[\d.]+) (-?[\d.]+) (-?[\d.]+) re S").unwrap()
    });
    let text = String::from_utf8_lossy(pdf);
    re.captures_iter(&text)
        .map(|c| {
            [
                c[1].parse().unwrap(),
                c[2].parse().unwrap(),
                c[3].parse().unwrap(),
                c[4].parse().unwrap(),
            ]
        })
        .collect()
}

pub fn count(pdf: &[u8], needle: &str) -> usize {
    String::from_utf8_lossy(pdf).matches(needle).count()
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// A small RGB PNG built in memory.
pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| image::Rgb([(x * 40) as u8, (y * 40) as u8, 128]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    bytes.into_inner()
}

/// Fresh scratch directory under the system temp dir.
pub fn scratch_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("htmlide-pdf-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
