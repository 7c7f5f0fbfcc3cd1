//! Nested ordered/unordered lists: numbering per nesting level and sibling
//! occurrence, buffered until the outermost list closes.

use std::collections::HashMap;

use crate::error::Error;
use crate::fonts::FontStyle;
use crate::pdf::{Align, Border, Document, LineFeed};

use super::style::{RunItem, RunLayout, StyleContext, has_content, render_runs};

/// Highest value [`alpha_numbering`] can spell (`ZZZ`).
pub const MAX_ALPHA: usize = 18278;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Numbering {
    Decimal,
    UpperAlpha,
    LowerAlpha,
    UpperRoman,
    LowerRoman,
    Disc,
    Circle,
    Square,
}

/// What goes in the bullet cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Marker {
    Text(String),
    /// ZapfDingbats glyph.
    Glyph(char),
}

impl Numbering {
    /// `type` attribute of `<ol>`/`<ul>`/`<li>`.
    pub fn from_type_attr(value: &str) -> Option<Self> {
        match value.trim() {
            "1" => Some(Numbering::Decimal),
            "A" => Some(Numbering::UpperAlpha),
            "a" => Some(Numbering::LowerAlpha),
            "I" => Some(Numbering::UpperRoman),
            "i" => Some(Numbering::LowerRoman),
            other => Self::from_css(other),
        }
    }

    /// `list-style-type` value.
    pub fn from_css(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "decimal" => Some(Numbering::Decimal),
            "upper-alpha" | "upper-latin" => Some(Numbering::UpperAlpha),
            "lower-alpha" | "lower-latin" => Some(Numbering::LowerAlpha),
            "upper-roman" => Some(Numbering::UpperRoman),
            "lower-roman" => Some(Numbering::LowerRoman),
            "disc" => Some(Numbering::Disc),
            "circle" => Some(Numbering::Circle),
            "square" => Some(Numbering::Square),
            _ => None,
        }
    }

    /// Default bullet of an unordered list at `level` (1-based).
    pub fn bullet_for_level(level: usize) -> Self {
        match level {
            0 | 1 => Numbering::Disc,
            2 => Numbering::Circle,
            _ => Numbering::Square,
        }
    }

    pub fn is_bullet(self) -> bool {
        matches!(self, Numbering::Disc | Numbering::Circle | Numbering::Square)
    }

    pub fn marker(self, n: usize) -> Marker {
        match self {
            Numbering::Decimal => Marker::Text(format!("{n}.")),
            Numbering::UpperAlpha => Marker::Text(format!("{}.", alpha_numbering(n, true))),
            Numbering::LowerAlpha => Marker::Text(format!("{}.", alpha_numbering(n, false))),
            Numbering::UpperRoman => Marker::Text(format!("{}.", roman_numbering(n, true))),
            Numbering::LowerRoman => Marker::Text(format!("{}.", roman_numbering(n, false))),
            Numbering::Disc => Marker::Glyph('l'),
            Numbering::Circle => Marker::Glyph('m'),
            Numbering::Square => Marker::Glyph('n'),
        }
    }
}

/// Bijective base-26: 1 = A, 26 = Z, 27 = AA, 702 = ZZ, 703 = AAA. Values
/// outside `1..=18278` give `"?"`.
pub fn alpha_numbering(n: usize, upper: bool) -> String {
    if n == 0 || n > MAX_ALPHA {
        return "?".to_string();
    }
    let base = if upper { b'A' } else { b'a' };
    let mut letters = Vec::new();
    let mut rest = n;
    while rest > 0 {
        rest -= 1;
        letters.push((base + (rest % 26) as u8) as char);
        rest /= 26;
    }
    letters.iter().rev().collect()
}

/// Roman numerals for `1..=3999`; anything else gives `"?"`.
pub fn roman_numbering(n: usize, upper: bool) -> String {
    const TABLE: &[(usize, &str)] = &[
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    if n == 0 || n > 3999 {
        return "?".to_string();
    }
    let mut out = String::new();
    let mut rest = n;
    for &(value, digits) in TABLE {
        while rest >= value {
            out.push_str(digits);
            rest -= value;
        }
    }
    if upper { out } else { out.to_lowercase() }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListItem {
    /// Nesting depth, 1 for the outermost list.
    pub level: usize,
    pub number: usize,
    pub numbering: Numbering,
    /// Text that follows a nested list inside the same item: no bullet.
    pub continuation: bool,
    pub runs: Vec<RunItem>,
}

impl ListItem {
    pub fn marker(&self) -> Option<Marker> {
        (!self.continuation).then(|| self.numbering.marker(self.number))
    }
}

/// Numbering state of the open lists plus the items buffered so far.
#[derive(Debug, Default)]
pub struct ListContext {
    level: usize,
    /// Lists opened so far at each depth (index `level - 1`).
    occurrence: Vec<usize>,
    numbering: HashMap<(usize, usize), Numbering>,
    max_num: HashMap<(usize, usize), usize>,
    current: usize,
    after_nested: bool,
    items: Vec<ListItem>,
}

impl ListContext {
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn is_open(&self) -> bool {
        self.level > 0
    }

    fn key(&self) -> (usize, usize) {
        (self.level, self.occurrence.get(self.level.wrapping_sub(1)).copied().unwrap_or(0))
    }

    pub fn open_list(&mut self, numbering: Numbering, start: usize) {
        self.level += 1;
        if self.occurrence.len() < self.level {
            self.occurrence.push(0);
        }
        self.occurrence[self.level - 1] += 1;
        let key = self.key();
        self.numbering.insert(key, numbering);
        self.current = start.saturating_sub(1);
        self.max_num.insert(key, self.current);
        self.after_nested = false;
        log::debug!("Opened list level {} occurrence {} ({numbering:?})", key.0, key.1);
    }

    /// Start an item in the innermost list. `numbering` overrides the
    /// list's own type and `value` resets the counter.
    pub fn open_item(&mut self, numbering: Option<Numbering>, value: Option<usize>) {
        if !self.is_open() {
            return;
        }
        let key = self.key();
        self.current = value.unwrap_or(self.current + 1);
        self.max_num.insert(key, self.current);
        let numbering = numbering
            .or_else(|| self.numbering.get(&key).copied())
            .unwrap_or(Numbering::Decimal);
        self.items.push(ListItem {
            level: self.level,
            number: self.current,
            numbering,
            continuation: false,
            runs: Vec::new(),
        });
        self.after_nested = false;
    }

    /// Append a run to the current item. Content after a nested list (or
    /// before the first item) opens an unbulleted continuation.
    pub fn push_run(&mut self, run: RunItem) {
        if !self.is_open() {
            return;
        }
        if self.after_nested || self.items.is_empty() {
            if run.is_blank() {
                return;
            }
            self.items.push(ListItem {
                level: self.level,
                number: 0,
                numbering: Numbering::Decimal,
                continuation: true,
                runs: Vec::new(),
            });
            self.after_nested = false;
        }
        if let Some(item) = self.items.last_mut() {
            item.runs.push(run);
        }
    }

    /// Close the innermost list. The parent's counter picks up where it
    /// was; closing the outermost list hands back every buffered item.
    pub fn close_list(&mut self) -> Option<Vec<ListItem>> {
        if !self.is_open() {
            return None;
        }
        self.level -= 1;
        if self.level > 0 {
            let key = self.key();
            self.current = self.max_num.get(&key).copied().unwrap_or(0);
            self.after_nested = true;
            return None;
        }
        self.occurrence.clear();
        self.numbering.clear();
        self.max_num.clear();
        self.current = 0;
        self.after_nested = false;
        Some(std::mem::take(&mut self.items))
    }

    /// Close every open list at once.
    pub fn close_all(&mut self) -> Vec<ListItem> {
        while self.is_open() {
            if let Some(items) = self.close_list() {
                return items;
            }
        }
        Vec::new()
    }
}

/// Geometry for rendering buffered list items.
#[derive(Clone, Debug)]
pub struct ListLayout {
    pub left: f32,
    pub right: f32,
    pub indent: f32,
    pub line_height: f32,
    pub base_style: StyleContext,
}

/// Emit each item as a bullet cell followed by its flowed content, indented
/// by its nesting depth.
pub fn render_items(doc: &mut Document, items: &[ListItem], layout: &ListLayout) -> Result<(), Error> {
    log::debug!("Rendering {} list items", items.len());
    for item in items {
        if item.continuation && !has_content(&item.runs) {
            continue;
        }
        let x = layout.left + (item.level.saturating_sub(1)) as f32 * layout.indent;
        let content_x = x + layout.indent;
        let style = item
            .runs
            .iter()
            .find_map(|r| match r {
                RunItem::Text { style, .. } => Some(style),
                RunItem::Special { .. } => None,
            })
            .unwrap_or(&layout.base_style);

        doc.set_x(x);
        if let Some(marker) = item.marker() {
            match marker {
                Marker::Text(text) => {
                    let plain = StyleContext {
                        underline: 0,
                        strike: false,
                        link: None,
                        ..style.clone()
                    };
                    plain.apply(doc)?;
                    doc.cell(layout.indent, layout.line_height, &text, Border::NONE, LineFeed::Right, Align::Right, false, None, None)?;
                }
                Marker::Glyph(glyph) => {
                    doc.set_text_color(style.color);
                    doc.set_strike(false);
                    doc.set_text_rise(0.0);
                    doc.set_font("zapfdingbats", FontStyle::REGULAR, style.size_pt * 0.45)?;
                    doc.cell(
                        layout.indent,
                        layout.line_height,
                        &glyph.to_string(),
                        Border::NONE,
                        LineFeed::Right,
                        Align::Center,
                        false,
                        None,
                        None,
                    )?;
                }
            }
        }

        let run_layout = RunLayout {
            x: content_x,
            width: (layout.right - content_x).max(layout.indent),
            line_height: layout.line_height,
            align: style.align.unwrap_or(Align::Left),
            is_table: false,
            out_of_block: false,
        };
        let lines = if has_content(&item.runs) {
            render_runs(doc, &item.runs, &run_layout)?
        } else {
            0
        };
        if lines == 0 {
            doc.ln(Some(layout.line_height));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> RunItem {
        RunItem::Text {
            text: s.to_string(),
            style: StyleContext::new("helvetica", 11.0),
        }
    }

    #[test]
    fn alpha_boundaries() {
        assert_eq!(alpha_numbering(1, true), "A");
        assert_eq!(alpha_numbering(26, true), "Z");
        assert_eq!(alpha_numbering(27, true), "AA");
        assert_eq!(alpha_numbering(702, true), "ZZ");
        assert_eq!(alpha_numbering(703, true), "AAA");
        assert_eq!(alpha_numbering(MAX_ALPHA, false), "zzz");
        assert_eq!(alpha_numbering(0, true), "?");
        assert_eq!(alpha_numbering(MAX_ALPHA + 1, true), "?");
    }

    #[test]
    fn roman() {
        assert_eq!(roman_numbering(1994, true), "MCMXCIV");
        assert_eq!(roman_numbering(4, false), "iv");
        assert_eq!(roman_numbering(0, true), "?");
    }

    #[test]
    fn nested_counters_resume() {
        let mut lists = ListContext::default();
        lists.open_list(Numbering::Decimal, 1);
        lists.open_item(None, None);
        lists.push_run(text("A"));
        lists.open_list(Numbering::LowerAlpha, 1);
        lists.open_item(None, None);
        lists.push_run(text("B"));
        assert!(lists.close_list().is_none());
        lists.push_run(text("tail"));
        lists.open_item(None, None);
        lists.push_run(text("C"));
        let items = lists.close_list().unwrap();

        let summary: Vec<_> = items
            .iter()
            .map(|i| (i.level, i.number, i.continuation, i.marker()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, 1, false, Some(Marker::Text("1.".into()))),
                (2, 1, false, Some(Marker::Text("a.".into()))),
                (1, 0, true, None),
                (1, 2, false, Some(Marker::Text("2.".into()))),
            ]
        );
        assert!(!lists.is_open());
    }

    #[test]
    fn sibling_lists_at_same_depth_restart() {
        let mut lists = ListContext::default();
        lists.open_list(Numbering::Decimal, 1);
        lists.open_item(None, None);
        lists.open_list(Numbering::Decimal, 1);
        lists.open_item(None, None);
        lists.open_item(None, None);
        lists.close_list();
        lists.open_item(None, None);
        lists.open_list(Numbering::Decimal, 1);
        lists.open_item(None, None);
        lists.close_list();
        let items = lists.close_all();
        let numbers: Vec<_> = items.iter().map(|i| (i.level, i.number)).collect();
        assert_eq!(numbers, vec![(1, 1), (2, 1), (2, 2), (1, 2), (2, 1)]);
    }
}
