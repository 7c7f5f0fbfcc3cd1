use crate::error::Error;

use super::flow::{InlineKind, InlineObject};
use super::images::{self, ImageInfo};
use super::writer::escape;
use super::{Color, Document, ImageEntry, Link};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl Align {
    pub fn parse(val: &str) -> Option<Self> {
        match val.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Some(Align::Left),
            "center" | "middle" | "c" => Some(Align::Center),
            "right" | "r" => Some(Align::Right),
            "justify" | "j" => Some(Align::Justify),
            _ => None,
        }
    }
}

/// Cell border: either the full frame, or any combination of sides drawn as
/// independent segments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Border {
    pub frame: bool,
    pub left: bool,
    pub top: bool,
    pub right: bool,
    pub bottom: bool,
}

impl Border {
    pub const NONE: Border = Border {
        frame: false,
        left: false,
        top: false,
        right: false,
        bottom: false,
    };
    pub const FRAME: Border = Border {
        frame: true,
        left: false,
        top: false,
        right: false,
        bottom: false,
    };

    /// `"1"` is a frame, `"0"` or empty is none, otherwise any of `L T R B`.
    pub fn parse(spec: &str) -> Self {
        match spec.trim() {
            "1" => Border::FRAME,
            "" | "0" => Border::NONE,
            sides => {
                let upper = sides.to_ascii_uppercase();
                Border {
                    frame: false,
                    left: upper.contains('L'),
                    top: upper.contains('T'),
                    right: upper.contains('R'),
                    bottom: upper.contains('B'),
                }
            }
        }
    }

    pub fn is_none(self) -> bool {
        self == Border::NONE
    }
}

/// Where the cursor goes after a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineFeed {
    /// To the right of the cell.
    Right,
    /// To the start of the next line.
    NextLine,
    /// Below the cell, same x.
    Below,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaintStyle {
    Stroke,
    Fill,
    FillStroke,
}

impl PaintStyle {
    fn operator(self) -> &'static str {
        match self {
            PaintStyle::Stroke => "S",
            PaintStyle::Fill => "f",
            PaintStyle::FillStroke => "B",
        }
    }
}

/// Horizontal text position inside a cell.
#[derive(Clone, Copy, Debug)]
pub(crate) enum TextOffset {
    Aligned(Align),
    /// Fixed distance from the cell's left edge.
    Fixed(f32),
}

/// Where an image ended up, in user units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Document {
    /// Print a cell: optional border/background, then `text` aligned inside
    /// it. A width of 0 extends the cell to the right margin. With
    /// `LineFeed::NextLine` the cursor returns to `forced_x` (or the left
    /// margin) on the next line.
    pub fn cell(
        &mut self,
        w: f32,
        h: f32,
        text: &str,
        border: Border,
        ln: LineFeed,
        align: Align,
        fill: bool,
        link: Option<&Link>,
        forced_x: Option<f32>,
    ) -> Result<(), Error> {
        self.emit_cell(w, h, text, border, ln, TextOffset::Aligned(align), fill, link, forced_x)
    }

    pub(crate) fn emit_cell(
        &mut self,
        w: f32,
        h: f32,
        text: &str,
        border: Border,
        ln: LineFeed,
        offset: TextOffset,
        fill: bool,
        link: Option<&Link>,
        forced_x: Option<f32>,
    ) -> Result<(), Error> {
        if w < 0.0 || h < 0.0 {
            return Err(Error::invalid(format!("cell size {w}x{h} is negative")));
        }
        let k = self.k;
        if self.y + h > self.page_break_trigger && !self.in_footer && self.auto_page_break {
            let x = self.x;
            let ws = self.ws;
            if ws > 0.0 {
                self.ws = 0.0;
                self.out("0 Tw")?;
            }
            self.add_page(Some(self.cur_orientation))?;
            self.x = x;
            if ws > 0.0 {
                self.ws = ws;
                self.out(&format!("{:.3} Tw", ws * k))?;
            }
        }
        let w = if w == 0.0 { self.w - self.r_margin - self.x } else { w };

        let mut s: Vec<u8> = Vec::new();
        if fill || border.frame {
            let op = match (fill, border.frame) {
                (true, true) => "B",
                (true, false) => "f",
                _ => "S",
            };
            s.extend(
                format!(
                    "{:.2} {:.2} {:.2} {:.2} re {op} ",
                    self.x * k,
                    (self.h - self.y) * k,
                    w * k,
                    -h * k
                )
                .into_bytes(),
            );
        }
        if !border.frame {
            let (x, y) = (self.x, self.y);
            let mut segment = |x1: f32, y1: f32, x2: f32, y2: f32| {
                s.extend(
                    format!(
                        "{:.2} {:.2} m {:.2} {:.2} l S ",
                        x1 * k,
                        (self.h - y1) * k,
                        x2 * k,
                        (self.h - y2) * k
                    )
                    .into_bytes(),
                );
            };
            if border.left {
                segment(x, y, x, y + h);
            }
            if border.top {
                segment(x, y, x + w, y);
            }
            if border.right {
                segment(x + w, y, x + w, y + h);
            }
            if border.bottom {
                segment(x, y + h, x + w, y + h);
            }
        }

        if !text.is_empty() {
            let metrics = self
                .current_metrics()
                .ok_or_else(|| Error::structural("text printed before a font was selected"))?;
            let encoded = escape(&metrics.encode(text));
            let string_width = self.get_string_width(text);
            let dx = match offset {
                TextOffset::Aligned(Align::Right) => w - self.c_margin - string_width,
                TextOffset::Aligned(Align::Center) => (w - string_width) / 2.0,
                TextOffset::Aligned(_) => self.c_margin,
                TextOffset::Fixed(dx) => dx,
            };
            let color_flag = self.color_flag();
            if color_flag {
                s.extend(format!("q {} ", self.text_color.operator(false)).into_bytes());
            }
            let baseline = self.y + 0.5 * h + 0.3 * self.font_size;
            s.extend(format!("BT {:.2} {:.2} Td ", (self.x + dx) * k, (self.h - baseline) * k).into_bytes());
            if self.text_rise != 0.0 {
                s.extend(format!("{:.2} Ts ", self.text_rise).into_bytes());
            }
            s.push(b'(');
            s.extend(encoded);
            s.extend_from_slice(b") Tj ");
            // Ts is text state and outlives ET
            if self.text_rise != 0.0 {
                s.extend_from_slice(b"0 Ts ");
            }
            s.extend_from_slice(b"ET");
            if self.underline {
                s.push(b' ');
                s.extend(self.decoration_rect(self.x + dx, baseline, text, false).into_bytes());
            }
            if self.strike {
                s.push(b' ');
                s.extend(self.decoration_rect(self.x + dx, baseline, text, true).into_bytes());
            }
            if color_flag {
                s.extend_from_slice(b" Q");
            }
            if let Some(target) = link {
                let (lx, ly) = (self.x + dx, self.y + 0.5 * h - 0.5 * self.font_size);
                let font_size = self.font_size;
                self.link(lx, ly, string_width, font_size, target.clone())?;
            }
        }
        if !s.is_empty() {
            self.out_bytes(&s)?;
        }

        self.lasth = h;
        match ln {
            LineFeed::Right => self.x += w,
            LineFeed::NextLine => {
                self.y += h;
                self.x = forced_x.unwrap_or(self.l_margin);
            }
            LineFeed::Below => self.y += h,
        }
        Ok(())
    }

    /// Filled rectangle under (or through) `text` starting at `x` on the
    /// baseline `y`, sized from the font's underline metrics.
    fn decoration_rect(&self, x: f32, y: f32, text: &str, strike: bool) -> String {
        let (up, ut) = self
            .current_metrics()
            .map(|m| (m.underline_position as f32, m.underline_thickness as f32))
            .unwrap_or((-100.0, 50.0));
        let spaces = text.matches(' ').count() as f32;
        let w = self.get_string_width(text) + self.ws * spaces / self.k;
        let top = if strike {
            y - 0.3 * self.font_size
        } else {
            y - up / 1000.0 * self.font_size
        };
        format!(
            "{:.2} {:.2} {:.2} {:.2} re f",
            x * self.k,
            (self.h - top) * self.k,
            w * self.k,
            -ut / 1000.0 * self.font_size_pt
        )
    }

    /// Line break: back to the left margin, down by `h` (default: height of
    /// the last cell).
    pub fn ln(&mut self, h: Option<f32>) {
        self.x = self.l_margin;
        self.y += h.unwrap_or(self.lasth);
    }

    /// Print `text` with its baseline at (`x`, `y`), outside the cell flow.
    pub fn text(&mut self, x: f32, y: f32, text: &str) -> Result<(), Error> {
        let metrics = self
            .current_metrics()
            .ok_or_else(|| Error::structural("text printed before a font was selected"))?;
        let encoded = escape(&metrics.encode(text));
        let mut s = format!("BT {:.2} {:.2} Td (", x * self.k, (self.h - y) * self.k).into_bytes();
        s.extend(encoded);
        s.extend_from_slice(b") Tj ET");
        if self.underline && !text.is_empty() {
            s.push(b' ');
            s.extend(self.decoration_rect(x, y, text, false).into_bytes());
        }
        if self.color_flag() {
            let mut wrapped = format!("q {} ", self.text_color.operator(false)).into_bytes();
            wrapped.extend(s);
            wrapped.extend_from_slice(b" Q");
            s = wrapped;
        }
        self.out_bytes(&s)
    }

    pub fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Result<(), Error> {
        let (k, h) = (self.k, self.h);
        self.out(&format!(
            "{:.2} {:.2} m {:.2} {:.2} l S",
            x1 * k,
            (h - y1) * k,
            x2 * k,
            (h - y2) * k
        ))
    }

    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, style: PaintStyle) -> Result<(), Error> {
        if w < 0.0 || h < 0.0 {
            return Err(Error::invalid(format!("rectangle size {w}x{h} is negative")));
        }
        let k = self.k;
        self.out(&format!(
            "{:.2} {:.2} {:.2} {:.2} re {}",
            x * k,
            (self.h - y) * k,
            w * k,
            -h * k,
            style.operator()
        ))
    }

    pub fn circle(&mut self, x: f32, y: f32, r: f32, style: PaintStyle) -> Result<(), Error> {
        self.ellipse(x, y, r, r, style)
    }

    /// Ellipse centered on (`x`, `y`), drawn as four Bézier arcs.
    pub fn ellipse(&mut self, x: f32, y: f32, rx: f32, ry: f32, style: PaintStyle) -> Result<(), Error> {
        if rx <= 0.0 || ry <= 0.0 {
            return Err(Error::invalid(format!("ellipse radii {rx}/{ry} must be positive")));
        }
        let k = self.k;
        let h = self.h;
        let lx = 4.0 / 3.0 * (std::f32::consts::SQRT_2 - 1.0) * rx;
        let ly = 4.0 / 3.0 * (std::f32::consts::SQRT_2 - 1.0) * ry;
        let p = |px: f32, py: f32| format!("{:.2} {:.2}", px * k, (h - py) * k);
        self.out(&format!(
            "{} m {} {} {} c",
            p(x + rx, y),
            p(x + rx, y - ly),
            p(x + lx, y - ry),
            p(x, y - ry)
        ))?;
        self.out(&format!("{} {} {} c", p(x - lx, y - ry), p(x - rx, y - ly), p(x - rx, y)))?;
        self.out(&format!("{} {} {} c", p(x - rx, y + ly), p(x - lx, y + ry), p(x, y + ry)))?;
        self.out(&format!(
            "{} {} {} c {}",
            p(x + lx, y + ry),
            p(x + rx, y + ly),
            p(x + rx, y),
            style.operator()
        ))
    }

    /// Rectangle outline made of filled dots every `interval` user units,
    /// painted in the draw color.
    pub fn dotted_rect(&mut self, x: f32, y: f32, w: f32, h: f32, interval: f32) -> Result<(), Error> {
        if interval <= 0.0 {
            return Err(Error::invalid(format!("dot interval {interval} must be positive")));
        }
        if w < 0.0 || h < 0.0 {
            return Err(Error::invalid(format!("rectangle size {w}x{h} is negative")));
        }
        let radius = (self.line_width / 2.0).max(0.1 / self.k);
        let fill = self.draw_color;
        self.out(&format!("q {}", fill.operator(false)))?;
        let mut dots = Vec::new();
        let mut t = 0.0;
        while t < w {
            dots.push((x + t, y));
            dots.push((x + w - t, y + h));
            t += interval;
        }
        t = 0.0;
        while t < h {
            dots.push((x + w, y + t));
            dots.push((x, y + h - t));
            t += interval;
        }
        for (dx, dy) in dots {
            self.ellipse(dx, dy, radius, radius, PaintStyle::Fill)?;
        }
        self.out("Q")
    }

    /// Register an image file (once per source) and return its index.
    pub fn register_image(&mut self, src: &str) -> Result<usize, Error> {
        if let Some(&idx) = self.image_index.get(src) {
            return Ok(idx);
        }
        let data = self.loader.load(src)?;
        self.register_image_data(src, &data)
    }

    /// Register in-memory image bytes under `key`.
    pub fn register_image_data(&mut self, key: &str, data: &[u8]) -> Result<usize, Error> {
        if let Some(&idx) = self.image_index.get(key) {
            return Ok(idx);
        }
        let info = images::parse_image(data).map_err(|e| match e {
            Error::UnsupportedFormat(msg) => Error::UnsupportedFormat(format!("{key}: {msg}")),
            other => other,
        })?;
        Ok(self.push_image(key, info))
    }

    /// The built-in "image not found" picture.
    pub fn register_placeholder(&mut self) -> Result<usize, Error> {
        const KEY: &str = "\u{0}placeholder";
        if let Some(&idx) = self.image_index.get(KEY) {
            return Ok(idx);
        }
        Ok(self.push_image(KEY, images::placeholder()))
    }

    fn push_image(&mut self, key: &str, info: ImageInfo) -> usize {
        log::debug!(
            "Registered image {:?} as /I{} ({}x{} {:?})",
            key,
            self.images.len() + 1,
            info.width,
            info.height,
            info.color_space
        );
        self.images.push(ImageEntry { info, obj_id: 0 });
        let idx = self.images.len() - 1;
        self.image_index.insert(key.to_string(), idx);
        idx
    }

    /// Natural size of a registered image in user units, honoring its DPI.
    pub fn image_size(&self, idx: usize) -> Option<(f32, f32)> {
        let info = &self.images.get(idx)?.info;
        let scale = 72.0 / info.dpi.unwrap_or(72.0) / self.k;
        Some((info.width as f32 * scale, info.height as f32 * scale))
    }

    /// Place image `idx`. Zero `w` and `h` use the natural size; one zero
    /// keeps the aspect ratio. Without an explicit position the image goes at
    /// the cursor, wrapping to the next line or page when it does not fit,
    /// and the cursor moves below it.
    pub fn image(
        &mut self,
        idx: usize,
        x: Option<f32>,
        y: Option<f32>,
        w: f32,
        h: f32,
        link: Option<&Link>,
    ) -> Result<Placement, Error> {
        if w < 0.0 || h < 0.0 {
            return Err(Error::invalid(format!("image size {w}x{h} is negative")));
        }
        let (nat_w, nat_h) = self
            .image_size(idx)
            .ok_or_else(|| Error::invalid(format!("unknown image {idx}")))?;
        let (w, h) = match (w == 0.0, h == 0.0) {
            (true, true) => (nat_w, nat_h),
            (true, false) => (h * nat_w / nat_h, h),
            (false, true) => (w, w * nat_h / nat_w),
            (false, false) => (w, h),
        };

        let flowing = x.is_none() && y.is_none();
        let mut px = x.unwrap_or(self.x);
        let mut py = y.unwrap_or(self.y);
        if flowing {
            if px + w > self.w - self.r_margin && px > self.l_margin {
                px = self.l_margin;
                py += self.lasth;
                self.y = py;
            }
            if py + h > self.page_break_trigger && !self.in_footer && self.auto_page_break {
                self.add_page(Some(self.cur_orientation))?;
                px = self.x;
                py = self.y;
            }
        }

        let k = self.k;
        self.out(&format!(
            "q {:.2} 0 0 {:.2} {:.2} {:.2} cm /I{} Do Q",
            w * k,
            h * k,
            px * k,
            (self.h - (py + h)) * k,
            idx + 1
        ))?;
        if let Some(target) = link {
            self.link(px, py, w, h, target.clone())?;
        }
        if flowing {
            self.y = py + h;
            self.x = self.l_margin;
        }
        Ok(Placement { x: px, y: py, w, h })
    }

    /// Paint a form control inside the line box at (`x`, `y`) of height `h`.
    pub(crate) fn paint_inline(&mut self, obj: &InlineObject, x: f32, y: f32, h: f32) -> Result<(), Error> {
        let k = self.k;
        let box_h = (self.font_size * 1.3).min(h);
        let top = y + (h - box_h) / 2.0;
        let border = Color::gray(128);
        self.out("q")?;
        self.out(&border.operator(true))?;
        match &obj.kind {
            InlineKind::TextField { value, password } => {
                self.out(&Color::WHITE.operator(false))?;
                self.rect(x, top, obj.width, box_h, PaintStyle::FillStroke)?;
                let shown = if *password { "*".repeat(value.chars().count()) } else { value.clone() };
                self.inline_label(x + self.c_margin, top, box_h, &shown)?;
            }
            InlineKind::Checkbox { checked } => {
                let side = box_h * 0.7;
                let (bx, by) = (x + (obj.width - side) / 2.0, top + (box_h - side) / 2.0);
                self.out(&Color::WHITE.operator(false))?;
                self.rect(bx, by, side, side, PaintStyle::FillStroke)?;
                if *checked {
                    self.out(&Color::BLACK.operator(true))?;
                    self.line(bx, by, bx + side, by + side)?;
                    self.line(bx, by + side, bx + side, by)?;
                }
            }
            InlineKind::Radio { checked } => {
                let r = box_h * 0.35;
                let (cx, cy) = (x + obj.width / 2.0, top + box_h / 2.0);
                self.out(&Color::WHITE.operator(false))?;
                self.circle(cx, cy, r, PaintStyle::FillStroke)?;
                if *checked {
                    self.out(&Color::BLACK.operator(false))?;
                    self.circle(cx, cy, r * 0.5, PaintStyle::Fill)?;
                }
            }
            InlineKind::Button { label } => {
                self.out(&Color::gray(212).operator(false))?;
                self.rect(x, top, obj.width, box_h, PaintStyle::FillStroke)?;
                let lw = self.get_string_width(label);
                self.inline_label(x + (obj.width - lw) / 2.0, top, box_h, label)?;
            }
            InlineKind::Select { value } => {
                self.out(&Color::WHITE.operator(false))?;
                self.rect(x, top, obj.width, box_h, PaintStyle::FillStroke)?;
                self.inline_label(x + self.c_margin, top, box_h, value)?;
                let arrow = box_h * 0.8;
                let ax = x + obj.width - arrow - 0.1 * box_h;
                self.out(&Color::gray(212).operator(false))?;
                self.rect(ax, top + 0.1 * box_h, arrow, arrow, PaintStyle::FillStroke)?;
                let (cx, cy) = (ax + arrow / 2.0, top + 0.1 * box_h + arrow / 2.0);
                let d = arrow / 4.0;
                self.out(&Color::BLACK.operator(false))?;
                self.out(&format!(
                    "{:.2} {:.2} m {:.2} {:.2} l {:.2} {:.2} l f",
                    (cx - d) * k,
                    (self.h - (cy - d / 2.0)) * k,
                    (cx + d) * k,
                    (self.h - (cy - d / 2.0)) * k,
                    cx * k,
                    (self.h - (cy + d / 2.0)) * k
                ))?;
            }
        }
        self.out("Q")
    }

    fn inline_label(&mut self, x: f32, top: f32, box_h: f32, text: &str) -> Result<(), Error> {
        if text.is_empty() {
            return Ok(());
        }
        self.out(&Color::BLACK.operator(false))?;
        let baseline = top + 0.5 * box_h + 0.3 * self.font_size;
        let underline = std::mem::replace(&mut self.underline, false);
        let result = self.text(x, baseline, text);
        self.underline = underline;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::fonts::FontStyle;

    fn page() -> Document {
        let config = Config {
            compress: false,
            ..Config::default()
        };
        let mut d = Document::new(&config);
        d.add_page(None).unwrap();
        d.set_font("helvetica", FontStyle::REGULAR, 12.0).unwrap();
        d
    }

    fn content(d: &Document) -> String {
        String::from_utf8_lossy(&d.pages[d.page - 1].content).into_owned()
    }

    #[test]
    fn border_spec_parsing() {
        assert_eq!(Border::parse("1"), Border::FRAME);
        assert!(Border::parse("0").is_none());
        let lb = Border::parse("lb");
        assert!(lb.left && lb.bottom && !lb.top && !lb.right);
    }

    #[test]
    fn zero_width_cell_runs_to_right_margin() {
        let mut d = page();
        let start = d.x();
        d.cell(0.0, 5.0, "", Border::FRAME, LineFeed::Right, Align::Left, false, None, None)
            .unwrap();
        assert!((d.x() - (d.page_width() - d.right_margin())).abs() < 1e-3);
        assert!(start < d.x());
    }

    #[test]
    fn right_aligned_text_offset() {
        let mut d = page();
        let w = 50.0;
        let sw = d.get_string_width("Hi");
        d.cell(w, 5.0, "Hi", Border::NONE, LineFeed::NextLine, Align::Right, false, None, None)
            .unwrap();
        let expected_x = (d.left_margin() + (w - d.cell_margin() - sw)) * d.k();
        assert!(content(&d).contains(&format!("BT {expected_x:.2} ")));
        assert!((d.x() - d.left_margin()).abs() < 1e-6);
    }

    #[test]
    fn cell_page_break_restores_word_spacing_scaled() {
        let mut d = page();
        d.ws = 1.5;
        d.set_y(d.page_break_trigger() - 1.0);
        d.cell(10.0, 5.0, "x", Border::NONE, LineFeed::NextLine, Align::Left, false, None, None)
            .unwrap();
        assert_eq!(d.page_no(), 2);
        let expected = format!("{:.3} Tw", 1.5 * d.k());
        assert!(content(&d).contains(&expected));
    }

    #[test]
    fn primitives_reject_bad_arguments() {
        let mut d = page();
        assert!(matches!(d.circle(10.0, 10.0, 0.0, PaintStyle::Stroke), Err(Error::InvalidArgument(_))));
        assert!(matches!(d.dotted_rect(0.0, 0.0, 10.0, 10.0, 0.0), Err(Error::InvalidArgument(_))));
        assert!(matches!(d.rect(0.0, 0.0, -1.0, 1.0, PaintStyle::Fill), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn underline_rect_follows_text() {
        let mut d = page();
        d.set_font("", FontStyle::parse("U"), 0.0).unwrap();
        d.cell(40.0, 6.0, "under", Border::NONE, LineFeed::Right, Align::Left, false, None, None)
            .unwrap();
        let c = content(&d);
        let tj = c.find(") Tj ET").unwrap();
        assert!(c[tj..].contains(" re f"));
    }

    #[test]
    fn text_rise_is_reset_after_the_run() {
        let mut d = page();
        d.set_text_rise(3.0);
        d.cell(10.0, 6.0, "2", Border::NONE, LineFeed::Right, Align::Left, false, None, None)
            .unwrap();
        d.set_text_rise(0.0);
        d.cell(10.0, 6.0, "after", Border::NONE, LineFeed::Right, Align::Left, false, None, None)
            .unwrap();
        let c = content(&d);
        assert!(c.contains("3.00 Ts (2) Tj 0 Ts ET"));
        let after = c.find("(after)").unwrap();
        assert!(!c[after..].contains("Ts"));
    }
}
