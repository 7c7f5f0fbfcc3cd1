//! Text style snapshots and the styled run sequence buffered between block
//! boundaries.

use crate::error::Error;
use crate::fonts::FontStyle;
use crate::pdf::{Align, Border, Color, Document, InlineObject, Link, wrap_words};

use super::css::{self, Properties};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextTransform {
    #[default]
    None,
    Upper,
    Lower,
    Capitalize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StyleFlag {
    Bold,
    Italic,
    Underline,
}

/// Everything that styles a run of text. Saved by value when a tag opens
/// and restored when it closes.
#[derive(Clone, Debug, PartialEq)]
pub struct StyleContext {
    pub family: String,
    pub size_pt: f32,
    /// Nesting counters clamped to `[0, 1]`.
    pub bold: u8,
    pub italic: u8,
    pub underline: u8,
    pub strike: bool,
    pub sub: bool,
    pub sup: bool,
    pub color: Color,
    pub background: Option<Color>,
    pub link: Option<Link>,
    pub transform: TextTransform,
    pub align: Option<Align>,
}

impl StyleContext {
    pub fn new(family: &str, size_pt: f32) -> Self {
        Self {
            family: family.to_string(),
            size_pt,
            bold: 0,
            italic: 0,
            underline: 0,
            strike: false,
            sub: false,
            sup: false,
            color: Color::BLACK,
            background: None,
            link: None,
            transform: TextTransform::None,
            align: None,
        }
    }

    /// Step a flag counter up on open and down on close, staying in `[0, 1]`.
    pub fn bump(&mut self, flag: StyleFlag, open: bool) {
        let counter = match flag {
            StyleFlag::Bold => &mut self.bold,
            StyleFlag::Italic => &mut self.italic,
            StyleFlag::Underline => &mut self.underline,
        };
        *counter = if open {
            (*counter + 1).min(1)
        } else {
            counter.saturating_sub(1)
        };
    }

    pub fn font_style(&self) -> FontStyle {
        FontStyle {
            bold: self.bold > 0,
            italic: self.italic > 0,
            underline: self.underline > 0,
        }
    }

    /// Size the glyphs are drawn at; sub/superscripts are smaller.
    pub fn render_size_pt(&self) -> f32 {
        if self.sub || self.sup {
            self.size_pt * 0.7
        } else {
            self.size_pt
        }
    }

    pub fn rise_pt(&self) -> f32 {
        if self.sup {
            self.size_pt * 0.33
        } else if self.sub {
            -self.size_pt * 0.15
        } else {
            0.0
        }
    }

    /// Make this the document's current text style.
    pub fn apply(&self, doc: &mut Document) -> Result<(), Error> {
        doc.set_font(&self.family, self.font_style(), self.render_size_pt())?;
        doc.set_text_color(self.color);
        doc.set_strike(self.strike);
        doc.set_text_rise(self.rise_pt());
        doc.set_link_target(self.link.clone());
        Ok(())
    }

    /// Width of `text` in user units in this style.
    pub fn measure(&self, doc: &mut Document, text: &str) -> Result<f32, Error> {
        doc.measure_text(text, &self.family, self.font_style().face(), self.render_size_pt())
    }

    pub fn transform(&self, text: &str) -> String {
        match self.transform {
            TextTransform::None => text.to_string(),
            TextTransform::Upper => text.to_uppercase(),
            TextTransform::Lower => text.to_lowercase(),
            TextTransform::Capitalize => {
                let mut out = String::with_capacity(text.len());
                let mut at_word_start = true;
                for c in text.chars() {
                    if at_word_start && c.is_alphabetic() {
                        out.extend(c.to_uppercase());
                    } else {
                        out.push(c);
                    }
                    at_word_start = c.is_whitespace();
                }
                out
            }
        }
    }

    /// Fold the recognized text properties of `props` into the style.
    pub fn apply_css(&mut self, props: &Properties) {
        for (name, value) in props {
            let v = value.trim().to_ascii_lowercase();
            match name.as_str() {
                "FONT-FAMILY" => {
                    if let Some(family) = css::known_font_family(value) {
                        self.family = family.to_string();
                    }
                }
                "FONT-SIZE" => {
                    if let Some(size) = css::font_size_pt(value, self.size_pt) {
                        self.size_pt = size;
                    }
                }
                "FONT-STYLE" => match v.as_str() {
                    "italic" | "oblique" => self.italic = 1,
                    "normal" => self.italic = 0,
                    _ => {}
                },
                "FONT-WEIGHT" => {
                    let bold = match v.as_str() {
                        "bold" | "bolder" => Some(true),
                        "normal" | "lighter" => Some(false),
                        n => n.parse::<u16>().ok().map(|w| w >= 600),
                    };
                    if let Some(bold) = bold {
                        self.bold = bold as u8;
                    }
                }
                "TEXT-DECORATION" => {
                    if v.contains("underline") {
                        self.underline = 1;
                    }
                    if v.contains("line-through") {
                        self.strike = true;
                    }
                    if v == "none" {
                        self.underline = 0;
                        self.strike = false;
                    }
                }
                "TEXT-TRANSFORM" => {
                    self.transform = match v.as_str() {
                        "uppercase" => TextTransform::Upper,
                        "lowercase" => TextTransform::Lower,
                        "capitalize" => TextTransform::Capitalize,
                        _ => TextTransform::None,
                    }
                }
                "TEXT-ALIGN" => {
                    if let Some(align) = Align::parse(&v) {
                        self.align = Some(align);
                    }
                }
                "COLOR" => {
                    if let Some(color) = css::parse_color(&v) {
                        self.color = color;
                    }
                }
                "BACKGROUND" | "BACKGROUND-COLOR" => {
                    self.background = v.split_whitespace().find_map(css::parse_color);
                }
                _ => {}
            }
        }
    }
}

/// Image placed in the run sequence, sizes in user units.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageRun {
    pub index: usize,
    pub width: f32,
    pub height: f32,
    pub link: Option<Link>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Special {
    LineBreak,
    Image(ImageRun),
    Control(InlineObject),
}

/// One entry of a buffered block.
#[derive(Clone, Debug, PartialEq)]
pub enum RunItem {
    Text { text: String, style: StyleContext },
    Special { kind: Special, style: StyleContext },
}

impl RunItem {
    pub fn is_blank(&self) -> bool {
        match self {
            RunItem::Text { text, .. } => text.trim().is_empty(),
            RunItem::Special { kind, .. } => matches!(kind, Special::LineBreak),
        }
    }
}

pub fn has_content(runs: &[RunItem]) -> bool {
    runs.iter().any(|r| !r.is_blank())
}

/// Box a run sequence is rendered into.
#[derive(Clone, Copy, Debug)]
pub struct RunLayout {
    pub x: f32,
    pub width: f32,
    pub line_height: f32,
    pub align: Align,
    pub is_table: bool,
    pub out_of_block: bool,
}

/// Flow `runs` through the document starting at the current y. Line
/// breaks and images close the current flowing block; text and controls
/// are written into it. Returns the number of text lines emitted.
pub fn render_runs(doc: &mut Document, runs: &[RunItem], layout: &RunLayout) -> Result<usize, Error> {
    let mut lines = 0;
    let mut open = false;
    let mut written = false;

    for run in runs {
        match run {
            RunItem::Text { text, style } => {
                let text = if written { text.as_str() } else { text.trim_start() };
                if text.is_empty() {
                    continue;
                }
                if !open {
                    start_block(doc, layout)?;
                    open = true;
                }
                style.apply(doc)?;
                doc.write_flowing_block(text, layout.out_of_block)?;
                written = true;
            }
            RunItem::Special { kind, style } => match kind {
                Special::Control(obj) => {
                    if !open {
                        start_block(doc, layout)?;
                        open = true;
                    }
                    style.apply(doc)?;
                    doc.write_inline(obj.clone())?;
                    written = true;
                }
                Special::LineBreak => {
                    let emitted = if open {
                        open = false;
                        doc.finish_flowing_block(layout.out_of_block)?.len()
                    } else {
                        0
                    };
                    if emitted == 0 {
                        doc.ln(Some(layout.line_height));
                        lines += 1;
                    }
                    lines += emitted;
                    written = false;
                }
                Special::Image(img) => {
                    if open {
                        open = false;
                        lines += doc.finish_flowing_block(layout.out_of_block)?.len();
                    }
                    place_image(doc, img, layout)?;
                    written = false;
                }
            },
        }
    }
    if open {
        lines += doc.finish_flowing_block(layout.out_of_block)?.len();
    }
    Ok(lines)
}

fn start_block(doc: &mut Document, layout: &RunLayout) -> Result<(), Error> {
    doc.set_x(layout.x);
    doc.new_flowing_block(
        layout.width,
        layout.line_height,
        Border::NONE,
        layout.align,
        false,
        layout.is_table,
    )
}

/// Scale `img` down to fit `max_width`, keeping the aspect ratio.
pub fn fit_image(img: &ImageRun, max_width: f32) -> (f32, f32) {
    if img.width > max_width && img.width > 0.0 {
        (max_width, img.height * max_width / img.width)
    } else {
        (img.width, img.height)
    }
}

fn place_image(doc: &mut Document, img: &ImageRun, layout: &RunLayout) -> Result<(), Error> {
    let (w, h) = fit_image(img, layout.width);
    let x = match layout.align {
        Align::Center => layout.x + (layout.width - w) / 2.0,
        Align::Right => layout.x + layout.width - w,
        _ => layout.x,
    };
    doc.set_x(x);
    doc.image(img.index, None, None, w, h, img.link.as_ref())?;
    doc.set_x(layout.x);
    Ok(())
}

/// Narrowest and widest one-line extents of a run sequence, in user units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunExtents {
    /// Widest unbreakable piece (word, image or control).
    pub min_width: f32,
    /// Widest line when nothing wraps.
    pub max_width: f32,
}

pub fn measure_runs(doc: &mut Document, runs: &[RunItem]) -> Result<RunExtents, Error> {
    let mut ext = RunExtents::default();
    let mut line = 0.0f32;
    let mut at_line_start = true;
    for run in runs {
        match run {
            RunItem::Text { text, style } => {
                let text = if at_line_start { text.trim_start() } else { text.as_str() };
                for word in text.split(' ').filter(|w| !w.is_empty()) {
                    ext.min_width = ext.min_width.max(style.measure(doc, word)?);
                }
                line += style.measure(doc, text)?;
                if !text.is_empty() {
                    at_line_start = false;
                }
            }
            RunItem::Special { kind, .. } => match kind {
                Special::LineBreak => {
                    ext.max_width = ext.max_width.max(line);
                    line = 0.0;
                    at_line_start = true;
                }
                Special::Image(img) => {
                    ext.min_width = ext.min_width.max(img.width);
                    ext.max_width = ext.max_width.max(line).max(img.width);
                    line = 0.0;
                    at_line_start = true;
                }
                Special::Control(obj) => {
                    ext.min_width = ext.min_width.max(obj.width);
                    line += obj.width;
                    at_line_start = false;
                }
            },
        }
    }
    ext.max_width = ext.max_width.max(line);
    Ok(ext)
}

/// Estimated text line count and image height of `runs` wrapped at
/// `width`. Text is wrapped in its plain (regular) face; runs in bold or
/// italic narrow the wrap width by the ratio of their styled to plain width.
pub fn estimate_height(doc: &mut Document, runs: &[RunItem], width: f32) -> Result<(usize, f32), Error> {
    let mut lines = 0;
    let mut image_height = 0.0;
    let mut segment: Vec<&RunItem> = Vec::new();
    for run in runs {
        match run {
            RunItem::Special {
                kind: Special::LineBreak,
                ..
            } => {
                lines += estimate_segment(doc, &segment, width)?.max(1);
                segment.clear();
            }
            RunItem::Special {
                kind: Special::Image(img),
                ..
            } => {
                lines += estimate_segment(doc, &segment, width)?;
                segment.clear();
                image_height += fit_image(img, width).1;
            }
            other => segment.push(other),
        }
    }
    lines += estimate_segment(doc, &segment, width)?;
    Ok((lines, image_height))
}

fn estimate_segment(doc: &mut Document, segment: &[&RunItem], width: f32) -> Result<usize, Error> {
    let mut text = String::new();
    let mut styled = 0.0;
    let mut plain_style: Option<&StyleContext> = None;
    for run in segment {
        match run {
            RunItem::Text { text: t, style } => {
                text.push_str(t);
                styled += style.measure(doc, t)?;
                plain_style.get_or_insert(style);
            }
            RunItem::Special {
                kind: Special::Control(obj),
                style,
            } => {
                styled += obj.width;
                plain_style.get_or_insert(style);
            }
            RunItem::Special { .. } => {}
        }
    }
    let Some(base) = plain_style else {
        return Ok(0);
    };
    if text.trim().is_empty() {
        return Ok(usize::from(styled > 0.0));
    }
    let (family, size) = (base.family.clone(), base.render_size_pt());
    let plain = doc.measure_text(&text, &family, FontStyle::REGULAR, size)?;
    let ratio = if plain > 0.0 { (styled / plain).max(1.0) } else { 1.0 };
    let wrapped = wrap_words(&text, width / ratio, |s| {
        doc.measure_text(s, &family, FontStyle::REGULAR, size).unwrap_or(0.0)
    });
    Ok(wrapped.line_count().max(1))
}
