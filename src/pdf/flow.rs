//! Flowing blocks: styled runs accumulated into width-constrained lines,
//! broken at spaces, optionally justified, and emitted as cells.

use crate::error::Error;
use crate::fonts::FontStyle;

use super::graphics::TextOffset;
use super::{Align, Border, Color, Document, LineFeed, Link};

/// Slack for float accumulation when testing for line overflow, in points.
const OVERFLOW_EPSILON: f32 = 0.001;

/// Value snapshot of everything that styles a run. Captured when a run is
/// written and re-applied when it is measured or emitted.
#[derive(Clone, Debug, PartialEq)]
pub struct FontState {
    pub family: String,
    pub style: FontStyle,
    pub size_pt: f32,
    pub text_color: Color,
    pub fill_color: Color,
    pub link: Option<Link>,
    pub strike: bool,
    pub rise_pt: f32,
}

/// Form control painted inline as one unbreakable unit.
#[derive(Clone, Debug, PartialEq)]
pub enum InlineKind {
    TextField { value: String, password: bool },
    Checkbox { checked: bool },
    Radio { checked: bool },
    Button { label: String },
    Select { value: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct InlineObject {
    pub kind: InlineKind,
    /// Width in user units.
    pub width: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Chunk {
    Text(String),
    Inline(InlineObject),
}

impl Chunk {
    fn spaces(&self) -> usize {
        match self {
            Chunk::Text(t) => t.matches(' ').count(),
            Chunk::Inline(_) => 0,
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, Chunk::Text(t) if t.is_empty())
    }
}

/// Geometry of one emitted line. Widths are in points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineMetrics {
    pub max_width: f32,
    /// Natural width of the runs, spaces included, excluding word spacing.
    pub content_width: f32,
    /// `Tw` value applied to the line, in points.
    pub word_spacing: f32,
    pub spaces: usize,
    pub chunks: usize,
    /// Top of the line in user units.
    pub y: f32,
    pub page: usize,
}

pub(crate) struct FlowingBlock {
    /// Points.
    max_width: f32,
    /// User units.
    line_height: f32,
    border: Border,
    align: Align,
    fill: bool,
    chunks: Vec<(Chunk, FontState)>,
    /// Points.
    content_width: f32,
    line_count: usize,
    origin_x: f32,
    lines: Vec<LineMetrics>,
}

/// Result of [`wrap_words`].
#[derive(Clone, Debug, PartialEq)]
pub struct WrapResult {
    pub lines: Vec<String>,
    /// Width of the widest word that is wider than the limit on its own.
    pub too_narrow: Option<f32>,
}

impl WrapResult {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Line count, or the negated width of the widest word that does not fit.
    pub fn count_or_sentinel(&self) -> f32 {
        match self.too_narrow {
            Some(width) => -width,
            None => self.lines.len() as f32,
        }
    }
}

/// Greedy word wrap of `text` at `max_width`, measuring with `measure`.
/// Explicit newlines always start a new line; a word wider than the limit
/// gets a line of its own and is reported through `too_narrow`.
pub fn wrap_words(text: &str, max_width: f32, mut measure: impl FnMut(&str) -> f32) -> WrapResult {
    let text = text.trim();
    if text.is_empty() {
        return WrapResult {
            lines: Vec::new(),
            too_narrow: None,
        };
    }
    let space = measure(" ");
    let mut lines = Vec::new();
    let mut biggest: Option<f32> = None;
    for raw_line in text.split('\n') {
        let mut current = String::new();
        let mut width = 0.0;
        for word in raw_line.split(' ').filter(|w| !w.is_empty()) {
            let word_width = measure(word);
            if word_width > max_width {
                biggest = Some(biggest.map_or(word_width, |b: f32| b.max(word_width)));
            }
            if current.is_empty() || width + word_width <= max_width {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
                width += word_width + space;
            } else {
                lines.push(std::mem::take(&mut current));
                current.push_str(word);
                width = word_width + space;
            }
        }
        lines.push(current);
    }
    WrapResult {
        lines,
        too_narrow: biggest,
    }
}

impl Document {
    pub fn set_link_target(&mut self, link: Option<Link>) {
        self.link_target = link;
    }

    pub fn font_state(&self) -> FontState {
        FontState {
            family: self.font_family.clone(),
            style: self.font_style(),
            size_pt: self.font_size_pt,
            text_color: self.text_color,
            fill_color: self.fill_color,
            link: self.link_target.clone(),
            strike: self.strike,
            rise_pt: self.text_rise,
        }
    }

    pub fn apply_font_state(&mut self, state: &FontState) -> Result<(), Error> {
        self.set_font(&state.family, state.style, state.size_pt)?;
        self.text_color = state.text_color;
        if self.fill_color != state.fill_color {
            self.set_fill_color(state.fill_color)?;
        }
        self.link_target = state.link.clone();
        self.strike = state.strike;
        self.text_rise = state.rise_pt;
        Ok(())
    }

    /// Width of `text` in points under `state`, without touching the page.
    fn measure_in(&mut self, text: &str, state: &FontState) -> Result<f32, Error> {
        let idx = self.ensure_font(&state.family, state.style)?;
        Ok(self.fonts[idx].metrics.string_width(text, state.size_pt))
    }

    /// Width of `text` in user units for a face and size, without selecting
    /// it on the page.
    pub fn measure_text(&mut self, text: &str, family: &str, style: FontStyle, size_pt: f32) -> Result<f32, Error> {
        let family = if family.is_empty() {
            self.font_family.clone()
        } else {
            Self::normalize_family(family)
        };
        let style = if family == "symbol" || family == "zapfdingbats" {
            FontStyle::REGULAR
        } else {
            style
        };
        let idx = self.ensure_font(&family, style)?;
        Ok(self.fonts[idx].metrics.string_width(text, size_pt) / self.k)
    }

    fn measure_chunk(&mut self, chunk: &Chunk, state: &FontState) -> Result<f32, Error> {
        match chunk {
            Chunk::Text(t) => self.measure_in(t, state),
            Chunk::Inline(obj) => Ok(obj.width * self.k),
        }
    }

    fn char_width_pt(&self, ch: char) -> f32 {
        self.current_metrics()
            .map(|m| m.char_width(ch) as f32 * self.font_size_pt / 1000.0)
            .unwrap_or(0.0)
    }

    /// Greedy wrap with the current font, widths in user units.
    pub fn word_wrap(&self, text: &str, max_width: f32) -> WrapResult {
        match self.current_metrics() {
            Some(m) => {
                let (size, k) = (self.font_size_pt, self.k);
                wrap_words(text, max_width, |s| m.string_width(s, size) / k)
            }
            None => wrap_words(text, max_width, |_| 0.0),
        }
    }

    pub fn has_flowing_block(&self) -> bool {
        self.flowing_block.is_some()
    }

    /// Open a flowing block `w` user units wide with lines `h` high. Outside
    /// tables the cell margins are taken off the usable width.
    pub fn new_flowing_block(
        &mut self,
        w: f32,
        h: f32,
        border: Border,
        align: Align,
        fill: bool,
        is_table: bool,
    ) -> Result<(), Error> {
        if self.flowing_block.is_some() {
            return Err(Error::structural("a flowing block is already open"));
        }
        if w <= 0.0 || h <= 0.0 {
            return Err(Error::invalid(format!("flowing block size {w}x{h} must be positive")));
        }
        let max_width = if is_table {
            w * self.k
        } else {
            w * self.k - 2.0 * self.c_margin * self.k
        };
        self.flowing_block = Some(FlowingBlock {
            max_width,
            line_height: h,
            border,
            align,
            fill,
            chunks: Vec::new(),
            content_width: 0.0,
            line_count: 0,
            origin_x: self.x,
            lines: Vec::new(),
        });
        Ok(())
    }

    /// Add `text` in the current style, emitting every line that fills up.
    /// With `out_of_block` the text is loose body text: lines are laid out
    /// without alignment slack and widen to the page after the first break.
    pub fn write_flowing_block(&mut self, text: &str, out_of_block: bool) -> Result<(), Error> {
        let mut block = self
            .flowing_block
            .take()
            .ok_or_else(|| Error::structural("write_flowing_block without an open block"))?;
        let result = self.flow_text(&mut block, text, out_of_block);
        self.flowing_block = Some(block);
        result
    }

    /// Add an unbreakable inline object (form control) in the current style.
    pub fn write_inline(&mut self, obj: InlineObject) -> Result<(), Error> {
        let mut block = self
            .flowing_block
            .take()
            .ok_or_else(|| Error::structural("write_inline without an open block"))?;
        let result = self.flow_inline(&mut block, obj);
        self.flowing_block = Some(block);
        result
    }

    fn flow_text(&mut self, block: &mut FlowingBlock, text: &str, out_of_block: bool) -> Result<(), Error> {
        let state = self.font_state();
        block.chunks.push((Chunk::Text(String::new()), state));
        for ch in text.chars() {
            let cw = self.char_width_pt(ch);
            if ch != ' '
                && block.content_width > 0.0
                && block.content_width + cw > block.max_width + OVERFLOW_EPSILON
            {
                self.break_line(block, out_of_block)?;
            }
            if let Some((Chunk::Text(t), _)) = block.chunks.last_mut() {
                t.push(ch);
            }
            block.content_width += cw;
        }
        Ok(())
    }

    fn flow_inline(&mut self, block: &mut FlowingBlock, obj: InlineObject) -> Result<(), Error> {
        let width_pt = obj.width * self.k;
        let state = self.font_state();
        if block.content_width > 0.0 && block.content_width + width_pt > block.max_width + OVERFLOW_EPSILON {
            block.chunks.push((Chunk::Text(String::new()), state.clone()));
            self.break_line(block, false)?;
            block.chunks.clear();
            block.content_width = 0.0;
        }
        block.chunks.push((Chunk::Inline(obj), state.clone()));
        block.chunks.push((Chunk::Text(String::new()), state));
        block.content_width += width_pt;
        Ok(())
    }

    /// Cut the block at the last space of the current run (or carry the
    /// whole run, or hard-break mid-word), emit the finished line and leave
    /// the carried remainder in the block.
    fn break_line(&mut self, block: &mut FlowingBlock, out_of_block: bool) -> Result<(), Error> {
        block.line_count += 1;
        if out_of_block && block.line_count == 1 {
            block.max_width = self.content_width() * self.k;
        }

        let Some((last_chunk, last_state)) = block.chunks.last().cloned() else {
            return Ok(());
        };
        let last_text = match &last_chunk {
            Chunk::Text(t) => t.clone(),
            Chunk::Inline(_) => String::new(),
        };
        let carried = if let Some(pos) = last_text.rfind(' ') {
            let keep = last_text[..pos].trim_end().to_string();
            let rest = last_text[pos + 1..].to_string();
            if let Some((Chunk::Text(t), _)) = block.chunks.last_mut() {
                *t = keep;
            }
            (Chunk::Text(rest), last_state)
        } else if block.chunks.len() > 1 {
            // The partial word started in this run; move the run down whole.
            let popped = block.chunks.pop();
            if let Some((Chunk::Text(t), _)) = block.chunks.last_mut() {
                let trimmed = t.trim_end().len();
                t.truncate(trimmed);
            }
            popped.unwrap_or((Chunk::Text(String::new()), last_state))
        } else {
            (Chunk::Text(String::new()), last_state)
        };

        let mut line = std::mem::replace(&mut block.chunks, vec![carried]);
        while line.len() > 1 && line.last().is_some_and(|(c, _)| c.is_empty()) {
            line.pop();
        }

        let mut content_width = 0.0;
        let mut spaces = 0;
        for (chunk, state) in &line {
            content_width += self.measure_chunk(chunk, state)?;
            spaces += chunk.spaces();
        }
        let ws = if block.align == Align::Justify && spaces > 0 {
            (block.max_width - content_width) / spaces as f32
        } else {
            0.0
        };
        self.ws = ws;
        self.out(&format!("{ws:.3} Tw"))?;

        if self.y + block.line_height > self.page_break_trigger && !self.in_footer && self.auto_page_break {
            let x = self.x;
            if ws > 0.0 {
                self.ws = 0.0;
                self.out("0 Tw")?;
            }
            self.add_page(Some(self.cur_orientation))?;
            self.x = x;
            if ws > 0.0 {
                self.ws = ws;
                self.out(&format!("{ws:.3} Tw"))?;
            }
        }

        self.emit_line(block, &line, content_width, spaces, false, out_of_block)?;

        let (chunk, state) = block.chunks[0].clone();
        self.apply_font_state(&state)?;
        block.content_width = self.measure_chunk(&chunk, &state)?;
        Ok(())
    }

    /// Print one line as a row of cells. The first cell carries the leading
    /// margin and the last the trailing one; leftover width goes after the
    /// text for left/justify, before it for right, and is split for center.
    fn emit_line(
        &mut self,
        block: &mut FlowingBlock,
        line: &[(Chunk, FontState)],
        content_width: f32,
        spaces: usize,
        last_line: bool,
        out_of_block: bool,
    ) -> Result<(), Error> {
        let k = self.k;
        let ws = self.ws;
        let c = self.c_margin;
        let empty = if out_of_block {
            0.0
        } else {
            ((block.max_width - content_width - ws * spaces as f32) / k).max(0.0)
        };
        let (lead, trail) = if out_of_block {
            (c / 2.0, c / 2.0)
        } else {
            match block.align {
                Align::Right => (c + empty, c),
                Align::Center => (c + empty / 2.0, c + empty / 2.0),
                Align::Left | Align::Justify => (c, c + empty),
            }
        };
        let forced_x = if out_of_block { None } else { Some(block.origin_x) };
        let h = block.line_height;
        let frame = block.border.frame;
        let top = block.lines.is_empty();
        let y = self.y;
        let n = line.len();

        for (i, (chunk, state)) in line.iter().enumerate() {
            self.apply_font_state(state)?;
            let (first, last) = (i == 0, i + 1 == n);
            let natural = match chunk {
                Chunk::Text(t) => self.get_string_width(t) + ws * chunk.spaces() as f32 / k,
                Chunk::Inline(obj) => obj.width,
            };
            let w = natural + if first { lead } else { 0.0 } + if last { trail } else { 0.0 };
            let dx = if first { lead } else { 0.0 };
            let border = if block.border.is_none() {
                Border::NONE
            } else {
                Border {
                    frame: false,
                    left: first && (frame || block.border.left),
                    top: top && (frame || block.border.top),
                    right: last && (frame || block.border.right),
                    bottom: last_line && (frame || block.border.bottom),
                }
            };
            let ln = if last { LineFeed::NextLine } else { LineFeed::Right };
            match chunk {
                Chunk::Text(t) => {
                    let link = state.link.clone();
                    self.emit_cell(w, h, t, border, ln, TextOffset::Fixed(dx), block.fill, link.as_ref(), forced_x)?;
                }
                Chunk::Inline(obj) => {
                    let (x0, y0) = (self.x, self.y);
                    self.emit_cell(w, h, "", border, ln, TextOffset::Fixed(dx), block.fill, None, forced_x)?;
                    self.paint_inline(obj, x0 + dx, y0, h)?;
                }
            }
        }

        block.lines.push(LineMetrics {
            max_width: block.max_width,
            content_width,
            word_spacing: ws,
            spaces,
            chunks: n,
            y,
            page: self.page,
        });
        Ok(())
    }

    /// Emit the last line with normal word spacing and close the block.
    pub fn finish_flowing_block(&mut self, out_of_block: bool) -> Result<Vec<LineMetrics>, Error> {
        let mut block = self
            .flowing_block
            .take()
            .ok_or_else(|| Error::structural("finish_flowing_block without an open block"))?;
        self.out("0.000 Tw")?;
        self.ws = 0.0;

        let mut line = std::mem::take(&mut block.chunks);
        if let Some((Chunk::Text(t), _)) = line.last_mut() {
            let trimmed = t.trim_end().len();
            t.truncate(trimmed);
        }
        while line.last().is_some_and(|(c, _)| c.is_empty()) {
            line.pop();
        }
        if line.is_empty() {
            return Ok(block.lines);
        }

        let mut content_width = 0.0;
        let mut spaces = 0;
        for (chunk, state) in &line {
            content_width += self.measure_chunk(chunk, state)?;
            spaces += chunk.spaces();
        }
        block.line_count += 1;
        self.emit_line(&mut block, &line, content_width, spaces, true, out_of_block)?;
        Ok(block.lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn doc() -> Document {
        let config = Config {
            compress: false,
            ..Config::default()
        };
        let mut d = Document::new(&config);
        d.add_page(None).unwrap();
        d.set_font("helvetica", FontStyle::REGULAR, 10.0).unwrap();
        d
    }

    #[test]
    fn wrap_reports_too_narrow_words() {
        let measure = |s: &str| s.chars().count() as f32;
        let r = wrap_words("aa bb cc", 5.0, measure);
        assert_eq!(r.lines, vec!["aa bb", "cc"]);
        assert_eq!(r.count_or_sentinel(), 2.0);

        let r = wrap_words("a abcdefgh b", 5.0, measure);
        assert_eq!(r.count_or_sentinel(), -8.0);
        assert!(r.lines.iter().all(|l| l.chars().count() <= 5 || !l.contains(' ')));
    }

    #[test]
    fn wrap_keeps_explicit_newlines() {
        let r = wrap_words("one\ntwo three", 100.0, |s| s.len() as f32);
        assert_eq!(r.lines, vec!["one", "two three"]);
        assert_eq!(wrap_words("   ", 10.0, |s| s.len() as f32).line_count(), 0);
    }

    #[test]
    fn writing_without_block_is_structural() {
        let mut d = doc();
        assert!(matches!(d.write_flowing_block("x", false), Err(Error::Structural(_))));
        assert!(matches!(d.finish_flowing_block(false), Err(Error::Structural(_))));
    }

    #[test]
    fn justified_lines_fill_the_block() {
        let mut d = doc();
        d.new_flowing_block(60.0, 5.0, Border::NONE, Align::Justify, false, false)
            .unwrap();
        d.write_flowing_block(
            "The quick brown fox jumps over the lazy dog while the cat watches from the fence",
            false,
        )
        .unwrap();
        let lines = d.finish_flowing_block(false).unwrap();
        assert!(lines.len() > 1);
        for line in &lines[..lines.len() - 1] {
            let total = line.word_spacing * line.spaces as f32 + line.content_width;
            assert!((total - line.max_width).abs() < 0.01, "{line:?}");
        }
        assert_eq!(lines.last().unwrap().word_spacing, 0.0);
    }

    #[test]
    fn mixed_styles_share_a_line() {
        let mut d = doc();
        d.new_flowing_block(100.0, 5.0, Border::NONE, Align::Left, false, false)
            .unwrap();
        d.write_flowing_block("plain ", false).unwrap();
        d.set_font("", FontStyle::parse("B"), 0.0).unwrap();
        d.write_flowing_block("bold", false).unwrap();
        let lines = d.finish_flowing_block(false).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].chunks, 2);
    }

    #[test]
    fn unbreakable_word_breaks_hard() {
        let mut d = doc();
        d.new_flowing_block(10.0, 5.0, Border::NONE, Align::Left, false, false)
            .unwrap();
        d.write_flowing_block("Supercalifragilisticexpialidocious", false)
            .unwrap();
        let lines = d.finish_flowing_block(false).unwrap();
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.content_width <= line.max_width + 0.01);
        }
    }
}
