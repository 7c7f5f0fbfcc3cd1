//! Tag interpreter: walks the token stream, keeps the style stack and the
//! buffered runs, and hands finished blocks to the flow engine, the list
//! renderer and the table layout.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use crate::config::Config;
use crate::error::Error;
use crate::pdf::{Align, Border, Color, Document, InlineKind, InlineObject, Link};
use crate::resource::resolve_path;

use super::css::{self, BorderStyle, Properties, StyleSheet};
use super::list::{ListContext, ListLayout, Numbering, render_items};
use super::style::{ImageRun, RunItem, RunLayout, Special, StyleContext, StyleFlag, has_content, render_runs};
use super::table::{MAX_COLSPAN, MAX_ROWSPAN, Table, TableCell, VAlign};
use super::{Attributes, Token, tokenize};

type OpenFn = fn(&mut HtmlRenderer, &str, &Attributes, &Properties) -> Result<(), Error>;
type CloseFn = fn(&mut HtmlRenderer, &str) -> Result<(), Error>;

#[derive(Clone, Copy)]
struct TagHandler {
    open: OpenFn,
    /// `None` for void elements, which never get a stack frame.
    close: Option<CloseFn>,
}

static HANDLERS: OnceLock<HashMap<&'static str, TagHandler>> = OnceLock::new();

fn add(map: &mut HashMap<&'static str, TagHandler>, tags: &[&'static str], open: OpenFn, close: CloseFn) {
    for tag in tags {
        map.insert(tag, TagHandler { open, close: Some(close) });
    }
}

fn add_void(map: &mut HashMap<&'static str, TagHandler>, tags: &[&'static str], open: OpenFn) {
    for tag in tags {
        map.insert(tag, TagHandler { open, close: None });
    }
}

fn handlers() -> &'static HashMap<&'static str, TagHandler> {
    HANDLERS.get_or_init(|| {
        let mut m = HashMap::new();
        add(&mut m, &["h1", "h2", "h3", "h4", "h5", "h6"], open_heading, close_heading);
        add(&mut m, &["p"], open_block, close_paragraph);
        add(&mut m, &["div", "center", "form"], open_block, close_block);
        add(&mut m, &["pre"], open_pre, close_paragraph);
        add(&mut m, &["span"], open_inline, close_inline);
        add(&mut m, &["font"], open_font, close_inline);
        add(&mut m, &["b", "strong"], open_bold, close_inline);
        add(&mut m, &["i", "em", "cite"], open_italic, close_inline);
        add(&mut m, &["u", "ins"], open_underline, close_inline);
        add(&mut m, &["s", "strike", "del"], open_strike, close_inline);
        add(&mut m, &["sub", "sup"], open_script, close_inline);
        add(&mut m, &["small", "big"], open_relative_size, close_inline);
        add(&mut m, &["code", "tt", "kbd"], open_monospace, close_inline);
        add(&mut m, &["a"], open_anchor, close_inline);
        add(&mut m, &["table"], open_table, close_table);
        add(&mut m, &["thead", "tbody", "tfoot"], open_inline, close_inline);
        add(&mut m, &["tr"], open_row, close_row);
        add(&mut m, &["td", "th"], open_cell, close_inline);
        add(&mut m, &["ol", "ul"], open_list, close_list);
        add(&mut m, &["li"], open_item, close_inline);
        add(&mut m, &["select"], open_select, close_select);
        add(&mut m, &["option"], open_option, close_inline);
        add(&mut m, &["textarea"], open_textarea, close_textarea);
        add(&mut m, &["title", "style", "script"], open_inline, close_raw);
        add_void(&mut m, &["br"], open_break);
        add_void(&mut m, &["hr"], open_rule);
        add_void(&mut m, &["img"], open_image);
        add_void(&mut m, &["input"], open_input);
        add_void(&mut m, &["link"], open_stylesheet_link);
        add_void(&mut m, &["base"], open_base);
        m
    })
}

/// Tag names with a handler, sorted.
pub fn supported_tags() -> Vec<&'static str> {
    let mut tags: Vec<&'static str> = handlers().keys().copied().collect();
    tags.sort_unstable();
    tags
}

/// Structural tags that carry nothing to render.
const SILENT_TAGS: &[&str] = &["html", "head", "body", "meta", "label", "nobr", "fieldset", "legend"];

/// Tags whose frames make loose text part of a block.
const BLOCK_TAGS: &[&str] = &["p", "div", "center", "form", "pre", "h1", "h2", "h3", "h4", "h5", "h6"];

/// Opening one of these closes an open `<p>`.
const CLOSES_PARAGRAPH: &[&str] = &[
    "p", "div", "center", "form", "pre", "h1", "h2", "h3", "h4", "h5", "h6", "table", "ol", "ul", "hr",
];

const HEADING_RATIOS: [f32; 6] = [2.0, 1.5, 1.17, 1.0, 0.83, 0.67];

/// `<font size>` 1 to 7, in points.
const FONT_SIZES: [f32; 7] = [8.0, 10.0, 12.0, 14.0, 18.0, 24.0, 36.0];

const LINE_HEIGHT_FACTOR: f32 = 1.3;
const LIST_INDENT_PT: f32 = 20.0;
const LINK_COLOR: Color = Color { r: 0, g: 0, b: 255 };

struct Frame {
    tag: String,
    style: StyleContext,
    line_height: f32,
}

#[derive(Default)]
struct SelectState {
    options: Vec<(String, bool)>,
}

/// Pending heading bookmark: level, title so far, page and y at open.
struct HeadingCapture {
    level: usize,
    title: String,
    page: usize,
    y: f32,
}

/// Renders a token stream into a [`Document`].
///
/// Open tags save the current [`StyleContext`] on a stack; the matching
/// close tag runs its handler and restores it. Text is buffered as styled
/// runs until a block boundary, the end of a list, or the end of a table.
pub struct HtmlRenderer {
    doc: Document,
    config: Config,
    base_path: String,
    sheet: StyleSheet,
    style: StyleContext,
    line_height: f32,
    stack: Vec<Frame>,
    runs: Vec<RunItem>,
    /// Last buffered character was a space (or nothing was buffered yet).
    at_space: bool,
    lists: ListContext,
    table: Option<Table>,
    nested_tables: usize,
    table_border: bool,
    table_background: Option<Color>,
    row_background: Option<Color>,
    select: Option<SelectState>,
    textarea: Option<(String, usize)>,
    title: String,
    heading: Option<HeadingCapture>,
    anchors: HashMap<String, usize>,
    placed_anchors: HashSet<String>,
}

impl HtmlRenderer {
    pub fn new(config: &Config) -> Result<Self, Error> {
        Self::with_document(Document::new(config), config)
    }

    /// Render into a prepared document (custom metrics or loader).
    pub fn with_document(mut doc: Document, config: &Config) -> Result<Self, Error> {
        if config.creator.is_none() {
            doc.set_creator("htmlide-pdf");
        }
        doc.add_page(None)?;
        let style = StyleContext::new(&config.font_family, config.font_size);
        style.apply(&mut doc)?;
        let line_height = config.font_size * LINE_HEIGHT_FACTOR / doc.k();
        Ok(Self {
            doc,
            config: config.clone(),
            base_path: config.base_path.clone(),
            sheet: StyleSheet::default(),
            style,
            line_height,
            stack: Vec::new(),
            runs: Vec::new(),
            at_space: true,
            lists: ListContext::default(),
            table: None,
            nested_tables: 0,
            table_border: false,
            table_background: None,
            row_background: None,
            select: None,
            textarea: None,
            title: String::new(),
            heading: None,
            anchors: HashMap::new(),
            placed_anchors: HashSet::new(),
        })
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Base line height in user units.
    pub fn line_height(&self) -> f32 {
        self.line_height
    }

    /// Add CSS rules ahead of any `<style>` in the markup.
    pub fn add_css(&mut self, css: &str) {
        self.sheet.add_css(css);
    }

    pub fn write_html(&mut self, html: &str) -> Result<(), Error> {
        let tokens = tokenize(html);
        log::debug!("Tokenized {} bytes into {} tokens", html.len(), tokens.len());
        for token in &tokens {
            self.feed(token)?;
        }
        Ok(())
    }

    pub fn feed(&mut self, token: &Token) -> Result<(), Error> {
        match token {
            Token::Text(text) => self.text(text),
            Token::Open { name, attrs } => self.open_tag(name, attrs),
            Token::Close(name) => self.close_tag(name),
        }
    }

    /// Close what is still open, flush the last block and finalize the
    /// document. An unterminated table or list is a structural error.
    pub fn finish(mut self) -> Result<Document, Error> {
        if self.table.is_some() {
            return Err(Error::structural("unterminated <table> at end of input"));
        }
        if self.lists.is_open() {
            return Err(Error::structural("unterminated list at end of input"));
        }
        while let Some(tag) = self.stack.first().map(|f| f.tag.clone()) {
            self.close_tag(&tag)?;
        }
        self.flush()?;

        let mut missing: Vec<&String> = self
            .anchors
            .keys()
            .filter(|name| !self.placed_anchors.contains(*name))
            .collect();
        missing.sort();
        for name in missing {
            log::warn!("Internal link #{name} has no matching anchor");
        }

        self.doc.close()?;
        Ok(self.doc)
    }

    fn open_tag(&mut self, name: &str, attrs: &Attributes) -> Result<(), Error> {
        let Some(handler) = handlers().get(name).copied() else {
            if SILENT_TAGS.contains(&name) {
                log::trace!("Ignoring <{name}>");
            } else {
                log::warn!("Skipping unsupported tag <{name}>");
            }
            return Ok(());
        };
        self.close_implicit(name)?;
        let props = self
            .sheet
            .resolve(name, attrs.get("class"), attrs.get("id"), attrs.get("style"));
        if handler.close.is_some() {
            self.stack.push(Frame {
                tag: name.to_string(),
                style: self.style.clone(),
                line_height: self.line_height,
            });
        }
        (handler.open)(self, name, attrs, &props)?;
        self.style.apply_css(&props);
        Ok(())
    }

    /// Close every frame down to the innermost `name`, running each close
    /// handler before its style is restored. A `</p>` or `</div>` with no
    /// open frame of its own closes a pending list instead; other stray
    /// close tags are ignored.
    fn close_tag(&mut self, name: &str) -> Result<(), Error> {
        let pos = match self.stack.iter().rposition(|f| f.tag == name) {
            Some(pos) => pos,
            None if matches!(name, "p" | "div") && self.lists.is_open() => {
                let Some(list) = self.stack.iter().position(|f| f.tag == "ol" || f.tag == "ul") else {
                    return Ok(());
                };
                log::debug!("</{name}> closes the open list");
                list
            }
            None => {
                log::debug!("Ignoring stray </{name}>");
                return Ok(());
            }
        };
        while self.stack.len() > pos {
            let Some(tag) = self.stack.last().map(|f| f.tag.clone()) else {
                break;
            };
            if let Some(close) = handlers().get(tag.as_str()).and_then(|h| h.close) {
                close(self, &tag)?;
            }
            if let Some(frame) = self.stack.pop() {
                self.style = frame.style;
                self.line_height = frame.line_height;
            }
        }
        Ok(())
    }

    /// HTML's optional end tags: a new paragraph, item, row, cell or option
    /// ends the previous one.
    fn close_implicit(&mut self, name: &str) -> Result<(), Error> {
        let open = match name {
            n if CLOSES_PARAGRAPH.contains(&n) => self.open_above(&["p"], &["td", "th", "li", "div", "table"]),
            "li" => self.open_above(&["li"], &["ol", "ul"]),
            "tr" => self.open_above(&["tr"], &["table"]),
            "td" | "th" => self.open_above(&["td", "th"], &["tr", "table"]),
            "option" => self.open_above(&["option"], &["select"]),
            _ => None,
        };
        match open {
            Some(tag) => self.close_tag(&tag),
            None => Ok(()),
        }
    }

    /// Innermost open frame named in `tags`, not searching past `boundary`.
    fn open_above(&self, tags: &[&str], boundary: &[&str]) -> Option<String> {
        for frame in self.stack.iter().rev() {
            if tags.contains(&frame.tag.as_str()) {
                return Some(frame.tag.clone());
            }
            if boundary.contains(&frame.tag.as_str()) {
                return None;
            }
        }
        None
    }

    fn inside(&self, tag: &str) -> bool {
        self.stack.iter().any(|f| f.tag == tag)
    }

    fn in_cell(&self) -> bool {
        self.inside("td") || self.inside("th")
    }

    fn text(&mut self, text: &str) -> Result<(), Error> {
        if self.inside("script") {
            return Ok(());
        }
        if self.inside("style") {
            self.sheet.add_css(text);
            return Ok(());
        }
        if self.inside("title") {
            self.title.push_str(text);
            return Ok(());
        }
        if let Some((value, _)) = &mut self.textarea {
            value.push_str(text);
            return Ok(());
        }
        if let Some(select) = &mut self.select {
            if let Some((label, _)) = select.options.last_mut() {
                label.push_str(text);
            }
            return Ok(());
        }

        if self.inside("pre") {
            let text = text.strip_prefix('\n').filter(|_| self.at_space).unwrap_or(text);
            for (i, line) in text.split('\n').enumerate() {
                if i > 0 {
                    self.push_special(Special::LineBreak);
                }
                let line = line.trim_end_matches('\r').replace('\t', "    ").replace(' ', "\u{a0}");
                if !line.is_empty() {
                    self.push_text(line);
                }
            }
            return Ok(());
        }

        let mut collapsed = collapse_whitespace(text);
        if self.at_space && collapsed.starts_with(' ') {
            collapsed.remove(0);
        }
        if collapsed.is_empty() {
            return Ok(());
        }
        if let Some(heading) = &mut self.heading {
            heading.title.push_str(&collapsed);
        }
        self.push_text(collapsed);
        Ok(())
    }

    fn push_text(&mut self, text: String) {
        self.at_space = text.ends_with(' ');
        let run = RunItem::Text {
            text: self.style.transform(&text),
            style: self.style.clone(),
        };
        self.push_run(run);
    }

    fn push_special(&mut self, kind: Special) {
        if matches!(kind, Special::LineBreak) {
            self.at_space = true;
        } else {
            self.at_space = false;
        }
        let run = RunItem::Special {
            kind,
            style: self.style.clone(),
        };
        self.push_run(run);
    }

    /// Route a run to the open cell, the open list item, or the block buffer.
    /// Content between table cells is dropped.
    fn push_run(&mut self, run: RunItem) {
        let in_cell = self.in_cell();
        if let Some(table) = &mut self.table {
            if in_cell {
                if let Some(cell) = table.last_cell_mut() {
                    cell.content.push(run);
                }
            }
            return;
        }
        if self.lists.is_open() {
            self.lists.push_run(run);
            return;
        }
        self.runs.push(run);
    }

    /// Render the buffered block at the left margin. Tables and lists
    /// render themselves when they close.
    fn flush(&mut self) -> Result<(), Error> {
        self.at_space = true;
        if self.table.is_some() || self.lists.is_open() {
            return Ok(());
        }
        let runs = std::mem::take(&mut self.runs);
        if !has_content(&runs) {
            return Ok(());
        }
        let in_block = self.stack.iter().any(|f| BLOCK_TAGS.contains(&f.tag.as_str()));
        let layout = RunLayout {
            x: self.doc.left_margin(),
            width: self.doc.content_width(),
            line_height: self.line_height,
            align: self.style.align.unwrap_or(Align::Left),
            is_table: false,
            out_of_block: !in_block,
        };
        let lines = render_runs(&mut self.doc, &runs, &layout)?;
        log::trace!("Flushed {} runs into {lines} lines", runs.len());
        Ok(())
    }

    /// End a block: inside a cell or list item this is a line break in the
    /// buffered content, otherwise the block is flushed and a blank line
    /// follows.
    fn block_break(&mut self) -> Result<(), Error> {
        if self.table.is_some() || self.lists.is_open() {
            self.push_special(Special::LineBreak);
            return Ok(());
        }
        self.flush()?;
        self.doc.ln(Some(self.line_height));
        Ok(())
    }

    fn render_list(&mut self, items: Vec<super::list::ListItem>) -> Result<(), Error> {
        if items.is_empty() {
            return Ok(());
        }
        let layout = ListLayout {
            left: self.doc.left_margin(),
            right: self.doc.page_width() - self.doc.right_margin(),
            indent: LIST_INDENT_PT / self.doc.k(),
            line_height: self.line_height,
            base_style: self.style.clone(),
        };
        render_items(&mut self.doc, &items, &layout)?;
        self.at_space = true;
        Ok(())
    }

    /// Convert a length attribute or property. Bare numbers are pixels and
    /// percentages are of the content width.
    fn length(&self, value: &str) -> Option<f32> {
        css::convert_size(value, self.doc.k(), self.doc.content_width(), self.style.size_pt)
    }

    fn dimension(&self, attrs: &Attributes, props: &Properties, name: &str) -> Option<f32> {
        props
            .get(&name.to_ascii_uppercase())
            .map(String::as_str)
            .or_else(|| attrs.get(name))
            .and_then(|v| self.length(v))
            .filter(|v| *v > 0.0)
    }

    fn link_for(&mut self, name: &str) -> usize {
        if let Some(&id) = self.anchors.get(name) {
            return id;
        }
        let id = self.doc.add_link();
        self.anchors.insert(name.to_string(), id);
        id
    }

    fn inline_control(&mut self, kind: InlineKind, width: f32) {
        self.push_special(Special::Control(InlineObject { kind, width }));
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    out
}

fn html_font_size(value: &str) -> Option<f32> {
    let value = value.trim();
    let n: i32 = match value.strip_prefix('+') {
        Some(rel) => 3 + rel.parse::<i32>().ok()?,
        None if value.starts_with('-') => 3 + value.parse::<i32>().ok()?,
        None => value.parse().ok()?,
    };
    Some(FONT_SIZES[(n.clamp(1, 7) - 1) as usize])
}

fn parse_span(attrs: &Attributes, name: &str) -> usize {
    let limit = if name == "rowspan" { MAX_ROWSPAN } else { MAX_COLSPAN };
    attrs
        .get(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, limit)
}

fn set_align(r: &mut HtmlRenderer, attrs: &Attributes) {
    if let Some(align) = attrs.get("align").and_then(Align::parse) {
        r.style.align = Some(align);
    }
}

fn open_inline(_: &mut HtmlRenderer, _: &str, _: &Attributes, _: &Properties) -> Result<(), Error> {
    Ok(())
}

fn close_inline(_: &mut HtmlRenderer, _: &str) -> Result<(), Error> {
    Ok(())
}

fn open_block(r: &mut HtmlRenderer, tag: &str, attrs: &Attributes, _: &Properties) -> Result<(), Error> {
    r.flush()?;
    if tag == "center" {
        r.style.align = Some(Align::Center);
    }
    set_align(r, attrs);
    Ok(())
}

fn close_block(r: &mut HtmlRenderer, _: &str) -> Result<(), Error> {
    if r.table.is_some() || r.lists.is_open() {
        r.push_special(Special::LineBreak);
        return Ok(());
    }
    r.flush()
}

fn close_paragraph(r: &mut HtmlRenderer, _: &str) -> Result<(), Error> {
    r.block_break()
}

fn open_heading(r: &mut HtmlRenderer, tag: &str, attrs: &Attributes, _: &Properties) -> Result<(), Error> {
    let level = tag[1..].parse::<usize>().unwrap_or(1).clamp(1, 6);
    let ratio = HEADING_RATIOS[level - 1];
    let free = r.table.is_none() && !r.lists.is_open();
    if free {
        r.flush()?;
    } else if has_pending_content(r) {
        r.push_special(Special::LineBreak);
    }
    r.style.size_pt = r.config.font_size * ratio;
    r.line_height = r.config.font_size * LINE_HEIGHT_FACTOR * ratio / r.doc.k();
    r.style.bump(StyleFlag::Bold, true);
    set_align(r, attrs);
    if free && r.config.bookmark_headings {
        r.heading = Some(HeadingCapture {
            level,
            title: String::new(),
            page: r.doc.page_no(),
            y: r.doc.y(),
        });
    }
    Ok(())
}

fn has_pending_content(r: &HtmlRenderer) -> bool {
    !r.at_space
}

fn close_heading(r: &mut HtmlRenderer, _: &str) -> Result<(), Error> {
    if r.table.is_some() || r.lists.is_open() {
        r.push_special(Special::LineBreak);
        return Ok(());
    }
    r.flush()?;
    if let Some(heading) = r.heading.take() {
        let title = heading.title.trim();
        if !title.is_empty() {
            // a heading pushed to the next page is bookmarked at its top
            let y = if r.doc.page_no() == heading.page {
                heading.y
            } else {
                r.doc.top_margin()
            };
            r.doc.bookmark(title, heading.level - 1, Some(y));
        }
    }
    Ok(())
}

fn open_pre(r: &mut HtmlRenderer, tag: &str, attrs: &Attributes, props: &Properties) -> Result<(), Error> {
    open_block(r, tag, attrs, props)?;
    r.style.family = "courier".to_string();
    Ok(())
}

fn open_font(r: &mut HtmlRenderer, _: &str, attrs: &Attributes, _: &Properties) -> Result<(), Error> {
    if let Some(family) = attrs.get("face").and_then(css::known_font_family) {
        r.style.family = family.to_string();
    }
    if let Some(size) = attrs.get("size").and_then(html_font_size) {
        r.style.size_pt = size;
    }
    if let Some(color) = attrs.get("color").and_then(css::parse_color) {
        r.style.color = color;
    }
    Ok(())
}

fn open_bold(r: &mut HtmlRenderer, _: &str, _: &Attributes, _: &Properties) -> Result<(), Error> {
    r.style.bump(StyleFlag::Bold, true);
    Ok(())
}

fn open_italic(r: &mut HtmlRenderer, _: &str, _: &Attributes, _: &Properties) -> Result<(), Error> {
    r.style.bump(StyleFlag::Italic, true);
    Ok(())
}

fn open_underline(r: &mut HtmlRenderer, _: &str, _: &Attributes, _: &Properties) -> Result<(), Error> {
    r.style.bump(StyleFlag::Underline, true);
    Ok(())
}

fn open_strike(r: &mut HtmlRenderer, _: &str, _: &Attributes, _: &Properties) -> Result<(), Error> {
    r.style.strike = true;
    Ok(())
}

fn open_script(r: &mut HtmlRenderer, tag: &str, _: &Attributes, _: &Properties) -> Result<(), Error> {
    if tag == "sub" {
        r.style.sub = true;
        r.style.sup = false;
    } else {
        r.style.sup = true;
        r.style.sub = false;
    }
    Ok(())
}

fn open_relative_size(r: &mut HtmlRenderer, tag: &str, _: &Attributes, _: &Properties) -> Result<(), Error> {
    r.style.size_pt *= if tag == "small" { 0.83 } else { 1.2 };
    Ok(())
}

fn open_monospace(r: &mut HtmlRenderer, _: &str, _: &Attributes, _: &Properties) -> Result<(), Error> {
    r.style.family = "courier".to_string();
    Ok(())
}

fn open_anchor(r: &mut HtmlRenderer, _: &str, attrs: &Attributes, _: &Properties) -> Result<(), Error> {
    if let Some(name) = attrs.get("name").or_else(|| attrs.get("id")) {
        let name = name.trim().to_string();
        if !name.is_empty() {
            let id = r.link_for(&name);
            let y = r.doc.y();
            r.doc.set_link(id, Some(y), None)?;
            r.placed_anchors.insert(name);
        }
    }
    let Some(href) = attrs.get("href").map(str::trim) else {
        return Ok(());
    };
    let target = if let Some(name) = href.strip_prefix('#') {
        Link::Internal(r.link_for(name))
    } else if href.contains(':') {
        Link::Uri(href.to_string())
    } else {
        Link::Uri(resolve_path(&r.base_path, href).unwrap_or_else(|| href.to_string()))
    };
    r.style.link = Some(target);
    r.style.color = LINK_COLOR;
    r.style.bump(StyleFlag::Underline, true);
    Ok(())
}

fn open_base(r: &mut HtmlRenderer, _: &str, attrs: &Attributes, _: &Properties) -> Result<(), Error> {
    if let Some(href) = attrs.get("href") {
        r.base_path = href.trim().to_string();
    }
    Ok(())
}

fn open_break(r: &mut HtmlRenderer, _: &str, _: &Attributes, _: &Properties) -> Result<(), Error> {
    r.push_special(Special::LineBreak);
    Ok(())
}

fn open_rule(r: &mut HtmlRenderer, _: &str, attrs: &Attributes, props: &Properties) -> Result<(), Error> {
    if r.table.is_some() || r.lists.is_open() {
        r.push_special(Special::LineBreak);
        return Ok(());
    }
    r.flush()?;
    let full = r.doc.content_width();
    let width = r.dimension(attrs, props, "width").unwrap_or(full).min(full);
    let left = r.doc.left_margin();
    let x = match attrs.get("align").and_then(Align::parse) {
        Some(Align::Left) => left,
        Some(Align::Right) => left + full - width,
        _ => left + (full - width) / 2.0,
    };
    let y = r.doc.y() + r.line_height / 2.0;
    r.doc.line(x, y, x + width, y)?;
    r.doc.set_y(y + r.line_height / 2.0);
    Ok(())
}

fn open_image(r: &mut HtmlRenderer, _: &str, attrs: &Attributes, props: &Properties) -> Result<(), Error> {
    let Some(src) = attrs.get("src").map(str::trim).filter(|s| !s.is_empty()) else {
        log::warn!("<img> without src skipped");
        return Ok(());
    };
    let location = resolve_path(&r.base_path, src).unwrap_or_else(|| src.to_string());
    let index = match r.doc.register_image(&location) {
        Ok(index) => index,
        Err(Error::MissingResource(msg)) => {
            log::warn!("Image {location} not found, using placeholder: {msg}");
            r.doc.register_placeholder()?
        }
        Err(e) => return Err(e),
    };
    let (nat_w, nat_h) = r
        .doc
        .image_size(index)
        .ok_or_else(|| Error::invalid(format!("image {index} was not registered")))?;
    let (width, height) = match (r.dimension(attrs, props, "width"), r.dimension(attrs, props, "height")) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, w * nat_h / nat_w),
        (None, Some(h)) => (h * nat_w / nat_h, h),
        (None, None) => (nat_w, nat_h),
    };
    let link = r.style.link.clone();
    r.push_special(Special::Image(ImageRun {
        index,
        width,
        height,
        link,
    }));
    Ok(())
}

fn open_input(r: &mut HtmlRenderer, _: &str, attrs: &Attributes, _: &Properties) -> Result<(), Error> {
    let kind = attrs.get("type").unwrap_or("text").trim().to_ascii_lowercase();
    let value = attrs.get("value").unwrap_or("").to_string();
    let margin = r.doc.cell_margin();
    let box_side = r.style.render_size_pt() / r.doc.k() * 1.3;
    match kind.as_str() {
        "hidden" => {}
        "checkbox" | "radio" => {
            let checked = attrs.has("checked");
            let kind = if kind == "checkbox" {
                InlineKind::Checkbox { checked }
            } else {
                InlineKind::Radio { checked }
            };
            r.inline_control(kind, box_side);
        }
        "submit" | "reset" | "button" => {
            let label = if value.is_empty() {
                match kind.as_str() {
                    "submit" => "Submit".to_string(),
                    "reset" => "Reset".to_string(),
                    _ => " ".to_string(),
                }
            } else {
                value
            };
            let width = r.style.measure(&mut r.doc, &label)? + 4.0 * margin;
            r.inline_control(InlineKind::Button { label }, width);
        }
        "text" | "password" => {
            let chars = attrs.get("size").and_then(|s| s.trim().parse::<usize>().ok()).unwrap_or(20);
            let field = r.style.measure(&mut r.doc, &"n".repeat(chars))?;
            let width = field.max(r.style.measure(&mut r.doc, &value)?) + 2.0 * margin;
            let password = kind == "password";
            r.inline_control(InlineKind::TextField { value, password }, width);
        }
        other => log::warn!("Skipping unsupported input type {other:?}"),
    }
    Ok(())
}

fn open_select(r: &mut HtmlRenderer, _: &str, _: &Attributes, _: &Properties) -> Result<(), Error> {
    r.select = Some(SelectState::default());
    Ok(())
}

fn open_option(r: &mut HtmlRenderer, _: &str, attrs: &Attributes, _: &Properties) -> Result<(), Error> {
    if let Some(select) = &mut r.select {
        select.options.push((String::new(), attrs.has("selected")));
    }
    Ok(())
}

fn close_select(r: &mut HtmlRenderer, _: &str) -> Result<(), Error> {
    let Some(select) = r.select.take() else {
        return Ok(());
    };
    let labels: Vec<String> = select
        .options
        .iter()
        .map(|(label, _)| collapse_whitespace(label).trim().to_string())
        .collect();
    let value = select
        .options
        .iter()
        .position(|(_, selected)| *selected)
        .or_else(|| (!labels.is_empty()).then_some(0))
        .map(|i| labels[i].clone())
        .unwrap_or_default();
    let mut widest = 0.0f32;
    for label in &labels {
        widest = widest.max(r.style.measure(&mut r.doc, label)?);
    }
    let arrow = r.style.render_size_pt() / r.doc.k();
    let width = widest + 2.0 * r.doc.cell_margin() + arrow;
    r.inline_control(InlineKind::Select { value }, width);
    Ok(())
}

fn open_textarea(r: &mut HtmlRenderer, _: &str, attrs: &Attributes, _: &Properties) -> Result<(), Error> {
    let cols = attrs.get("cols").and_then(|s| s.trim().parse::<usize>().ok()).unwrap_or(20);
    r.textarea = Some((String::new(), cols));
    Ok(())
}

fn close_textarea(r: &mut HtmlRenderer, _: &str) -> Result<(), Error> {
    let Some((value, cols)) = r.textarea.take() else {
        return Ok(());
    };
    let value = collapse_whitespace(&value).trim().to_string();
    let width = r.style.measure(&mut r.doc, &"n".repeat(cols))? + 2.0 * r.doc.cell_margin();
    r.inline_control(InlineKind::TextField { value, password: false }, width);
    Ok(())
}

fn close_raw(r: &mut HtmlRenderer, tag: &str) -> Result<(), Error> {
    if tag == "title" {
        let title = collapse_whitespace(&r.title).trim().to_string();
        if r.config.title.is_none() && !title.is_empty() {
            r.doc.set_title(&title);
        }
        r.title.clear();
    }
    Ok(())
}

fn open_stylesheet_link(r: &mut HtmlRenderer, _: &str, attrs: &Attributes, _: &Properties) -> Result<(), Error> {
    let is_sheet = attrs
        .get("rel")
        .is_some_and(|rel| rel.to_ascii_lowercase().split_whitespace().any(|t| t == "stylesheet"));
    let Some(href) = attrs.get("href").filter(|_| is_sheet) else {
        return Ok(());
    };
    let Some(location) = resolve_path(&r.base_path, href) else {
        return Ok(());
    };
    match r.doc.loader().load_text(&location) {
        Ok(css) => {
            log::debug!("Loaded stylesheet {location} ({} bytes)", css.len());
            r.sheet.add_css(&css);
        }
        Err(e) => log::warn!("Stylesheet {location} skipped: {e}"),
    }
    Ok(())
}

fn open_list(r: &mut HtmlRenderer, tag: &str, attrs: &Attributes, props: &Properties) -> Result<(), Error> {
    if r.table.is_some() {
        if has_pending_content(r) {
            r.push_special(Special::LineBreak);
        }
        return Ok(());
    }
    if !r.lists.is_open() {
        r.flush()?;
    }
    let numbering = attrs
        .get("type")
        .and_then(Numbering::from_type_attr)
        .or_else(|| props.get("LIST-STYLE-TYPE").and_then(|v| Numbering::from_css(v)))
        .unwrap_or(if tag == "ol" {
            Numbering::Decimal
        } else {
            Numbering::bullet_for_level(r.lists.level() + 1)
        });
    let start = attrs
        .get("start")
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(1);
    r.lists.open_list(numbering, start);
    Ok(())
}

fn close_list(r: &mut HtmlRenderer, _: &str) -> Result<(), Error> {
    if r.table.is_some() {
        r.push_special(Special::LineBreak);
        return Ok(());
    }
    if let Some(items) = r.lists.close_list() {
        r.render_list(items)?;
    }
    r.at_space = true;
    Ok(())
}

fn open_item(r: &mut HtmlRenderer, _: &str, attrs: &Attributes, props: &Properties) -> Result<(), Error> {
    if r.table.is_some() || !r.lists.is_open() {
        if r.table.is_none() {
            log::warn!("<li> outside of a list");
        }
        if has_pending_content(r) {
            r.push_special(Special::LineBreak);
        }
        return Ok(());
    }
    let numbering = attrs
        .get("type")
        .and_then(Numbering::from_type_attr)
        .or_else(|| props.get("LIST-STYLE-TYPE").and_then(|v| Numbering::from_css(v)));
    let value = attrs.get("value").and_then(|v| v.trim().parse::<usize>().ok());
    r.lists.open_item(numbering, value);
    r.at_space = true;
    Ok(())
}

fn open_table(r: &mut HtmlRenderer, _: &str, attrs: &Attributes, props: &Properties) -> Result<(), Error> {
    if r.table.is_some() {
        r.nested_tables += 1;
        log::warn!("Nested <table> flattened into the enclosing cell");
        return Ok(());
    }
    if r.lists.is_open() {
        log::warn!("<table> inside a list: closing the list first");
        let items = r.lists.close_all();
        r.render_list(items)?;
    }
    r.flush()?;

    let mut table = Table::new(r.line_height);
    table.width = r.dimension(attrs, props, "width");
    if let Some(align) = attrs.get("align").and_then(Align::parse) {
        table.align = align;
    }
    r.table_border = attrs
        .get("border")
        .is_some_and(|b| b.trim().parse::<f32>().map_or(!b.trim().is_empty(), |w| w > 0.0))
        || props
            .get("BORDER")
            .is_some_and(|b| css::parse_border(b).style != BorderStyle::None);
    r.table_background = attrs
        .get("bgcolor")
        .and_then(css::parse_color)
        .or_else(|| background(props));
    r.row_background = None;
    log::debug!("Table opened at y={:.1}", r.doc.y());
    r.table = Some(table);
    Ok(())
}

fn background(props: &Properties) -> Option<Color> {
    props
        .get("BACKGROUND-COLOR")
        .or_else(|| props.get("BACKGROUND"))
        .and_then(|v| v.split_whitespace().find_map(css::parse_color))
}

fn close_table(r: &mut HtmlRenderer, _: &str) -> Result<(), Error> {
    if r.nested_tables > 0 {
        r.nested_tables -= 1;
        return Ok(());
    }
    let Some(mut table) = r.table.take() else {
        return Ok(());
    };
    r.at_space = true;
    if table.is_empty() {
        return Ok(());
    }
    let available = r.doc.content_width();
    table.layout(&mut r.doc, available)?;
    table.render(&mut r.doc, r.config.repeat_table_header)?;
    r.doc.set_x(r.doc.left_margin());
    Ok(())
}

fn open_row(r: &mut HtmlRenderer, _: &str, attrs: &Attributes, props: &Properties) -> Result<(), Error> {
    if r.nested_tables > 0 {
        if has_pending_content(r) {
            r.push_special(Special::LineBreak);
        }
        return Ok(());
    }
    r.row_background = attrs
        .get("bgcolor")
        .and_then(css::parse_color)
        .or_else(|| background(props));
    if let Some(table) = &mut r.table {
        table.start_row();
    }
    Ok(())
}

fn close_row(r: &mut HtmlRenderer, _: &str) -> Result<(), Error> {
    if r.nested_tables > 0 {
        return Ok(());
    }
    if let Some(table) = &mut r.table {
        table.end_row();
    }
    r.row_background = None;
    Ok(())
}

fn open_cell(r: &mut HtmlRenderer, tag: &str, attrs: &Attributes, props: &Properties) -> Result<(), Error> {
    if r.nested_tables > 0 {
        if has_pending_content(r) {
            r.push_text(" ".to_string());
        }
        return Ok(());
    }
    if r.table.is_none() {
        return Ok(());
    }
    let header = tag == "th";
    let align = attrs
        .get("align")
        .and_then(Align::parse)
        .or_else(|| props.get("TEXT-ALIGN").and_then(|v| Align::parse(v)))
        .unwrap_or(if header { Align::Center } else { Align::Left });
    let valign = attrs
        .get("valign")
        .and_then(VAlign::parse)
        .or_else(|| props.get("VERTICAL-ALIGN").and_then(|v| VAlign::parse(v)))
        .unwrap_or_default();
    let mut cell = TableCell {
        width: r.dimension(attrs, props, "width"),
        height: r.dimension(attrs, props, "height"),
        align,
        valign,
        border: if r.table_border { Border::FRAME } else { Border::NONE },
        background: attrs
            .get("bgcolor")
            .and_then(css::parse_color)
            .or_else(|| background(props))
            .or(r.row_background)
            .or(r.table_background),
        colspan: parse_span(attrs, "colspan"),
        rowspan: parse_span(attrs, "rowspan"),
        nowrap: attrs.has("nowrap") || props.get("WHITE-SPACE").is_some_and(|v| v.eq_ignore_ascii_case("nowrap")),
        header,
        ..TableCell::default()
    };
    if let Some(spec) = props.get("BORDER").map(|b| css::parse_border(b)) {
        cell.border = if spec.style == BorderStyle::None { Border::NONE } else { Border::FRAME };
        cell.border_style = spec.style;
        cell.border_color = spec.color;
    }
    if header {
        r.style.bump(StyleFlag::Bold, true);
    }
    if let Some(table) = &mut r.table {
        table.add_cell(cell);
    }
    r.at_space = true;
    Ok(())
}
