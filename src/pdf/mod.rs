mod flow;
mod graphics;
mod images;
mod output;
mod writer;

use std::collections::HashMap;

use crate::config::{Config, Orientation};
use crate::error::Error;
use crate::fonts::{FontLibrary, FontMetrics, FontStyle, MetricsProvider, core_family};
use crate::resource::{FsLoader, ResourceLoader};

pub use flow::{Chunk, FontState, InlineObject, InlineKind, LineMetrics, WrapResult, wrap_words};
pub use graphics::{Align, Border, LineFeed, PaintStyle, Placement};
pub use images::{ColorSpace, ImageInfo};
pub use output::{CgiResponse, ResponseSink};

use flow::FlowingBlock;

/// Lifecycle of a [`Document`]. Page content can only be written while a
/// page is active; everything else goes to the document buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Unopened,
    Opened,
    PageActive,
    PageClosed,
    Finalized,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255 };

    pub fn gray(level: u8) -> Self {
        Color { r: level, g: level, b: level }
    }

    fn is_gray(self) -> bool {
        self.r == self.g && self.g == self.b
    }

    /// Stroking operator (`G`/`RG`) when `stroke`, otherwise non-stroking (`g`/`rg`).
    fn operator(self, stroke: bool) -> String {
        let c = |v: u8| v as f32 / 255.0;
        match (self.is_gray(), stroke) {
            (true, true) => format!("{:.3} G", c(self.r)),
            (true, false) => format!("{:.3} g", c(self.r)),
            (false, true) => format!("{:.3} {:.3} {:.3} RG", c(self.r), c(self.g), c(self.b)),
            (false, false) => format!("{:.3} {:.3} {:.3} rg", c(self.r), c(self.g), c(self.b)),
        }
    }
}

/// Link target for a cell or image.
#[derive(Clone, Debug, PartialEq)]
pub enum Link {
    /// Index returned by [`Document::add_link`].
    Internal(usize),
    Uri(String),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ZoomMode {
    FullPage,
    FullWidth,
    Real,
    Default,
    Percent(f32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutMode {
    Single,
    Continuous,
    Two,
    Default,
}

/// Link annotation in page points (top-left corner, PDF y axis).
#[derive(Clone, Debug)]
pub(crate) struct PageLink {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub target: Link,
}

pub(crate) struct Page {
    pub content: Vec<u8>,
    pub w_pt: f32,
    pub h_pt: f32,
    pub links: Vec<PageLink>,
}

pub(crate) struct FontEntry {
    pub metrics: FontMetrics,
    /// 1-based index into the encoding differences list.
    pub diff: Option<usize>,
    pub obj_id: usize,
}

pub(crate) struct ImageEntry {
    pub info: ImageInfo,
    pub obj_id: usize,
}

pub(crate) struct Bookmark {
    pub title: String,
    pub level: usize,
    pub y: f32,
    pub page: usize,
}

/// Page header/footer hooks, invoked on every page start and end.
pub trait PageDecorator {
    fn header(&mut self, _doc: &mut Document) -> Result<(), Error> {
        Ok(())
    }

    fn footer(&mut self, _doc: &mut Document) -> Result<(), Error> {
        Ok(())
    }
}

/// Prints "page/total" centered at the bottom of every page.
pub struct PageNumberFooter {
    pub family: String,
    pub size: f32,
}

impl Default for PageNumberFooter {
    fn default() -> Self {
        Self {
            family: "helvetica".to_string(),
            size: 8.0,
        }
    }
}

impl PageDecorator for PageNumberFooter {
    fn footer(&mut self, doc: &mut Document) -> Result<(), Error> {
        let k = doc.k();
        // 15mm from the bottom edge
        doc.set_y(-42.52 / k);
        doc.set_font(&self.family, FontStyle::parse("I"), self.size)?;
        let alias = doc.alias_nb_pages.clone().unwrap_or_else(|| "{nb}".to_string());
        let text = format!("{}/{}", doc.page_no(), alias);
        doc.cell(0.0, 28.35 / k, &text, Border::NONE, LineFeed::Right, Align::Center, false, None, None)
    }
}

/// A PDF document under construction: the object writer plus the cursor,
/// font and color state the drawing primitives operate on.
///
/// All coordinates are in the user unit chosen at construction, measured
/// from the top-left corner of the page.
pub struct Document {
    state: State,
    /// Last allocated object id.
    n: usize,
    /// Byte offset of each object, indexed by object id.
    offsets: Vec<usize>,
    buffer: Vec<u8>,
    pages: Vec<Page>,
    /// Current page number (1-based, 0 before the first page).
    page: usize,
    k: f32,
    def_orientation: Orientation,
    cur_orientation: Orientation,
    /// Default page size in points, portrait.
    fw_pt: f32,
    fh_pt: f32,
    w_pt: f32,
    h_pt: f32,
    w: f32,
    h: f32,
    l_margin: f32,
    t_margin: f32,
    r_margin: f32,
    b_margin: f32,
    c_margin: f32,
    x: f32,
    y: f32,
    lasth: f32,
    line_width: f32,
    fonts: Vec<FontEntry>,
    font_index: HashMap<String, usize>,
    diffs: Vec<String>,
    images: Vec<ImageEntry>,
    image_index: HashMap<String, usize>,
    links: Vec<(usize, f32)>,
    font_family: String,
    font_style: FontStyle,
    underline: bool,
    strike: bool,
    /// Baseline shift in points for sub/superscript.
    text_rise: f32,
    /// Link attached to text written into flowing blocks.
    link_target: Option<Link>,
    current_font: Option<usize>,
    font_size_pt: f32,
    font_size: f32,
    draw_color: Color,
    fill_color: Color,
    text_color: Color,
    /// Word spacing in points, set by the flow engine. A cell that breaks
    /// the page restores it scaled by `k`.
    ws: f32,
    auto_page_break: bool,
    page_break_trigger: f32,
    in_footer: bool,
    zoom: ZoomMode,
    layout: LayoutMode,
    title: Option<String>,
    subject: Option<String>,
    author: Option<String>,
    keywords: Option<String>,
    creator: Option<String>,
    alias_nb_pages: Option<String>,
    compress: bool,
    outlines: Vec<Bookmark>,
    decorator: Option<Box<dyn PageDecorator>>,
    metrics: Box<dyn MetricsProvider>,
    loader: Box<dyn ResourceLoader>,
    flowing_block: Option<FlowingBlock>,
}

impl Document {
    pub fn new(config: &Config) -> Self {
        let library = FontLibrary::new(config.font_dirs.clone());
        Self::with_metrics(config, Box::new(library))
    }

    pub fn with_metrics(config: &Config, metrics: Box<dyn MetricsProvider>) -> Self {
        let k = config.unit.scale();
        let (fw_pt, fh_pt) = config.format.size_pt();
        let (w_pt, h_pt) = config.page_size_pt();
        let m = config.margins;
        let h = h_pt / k;

        let mut doc = Document {
            state: State::Unopened,
            n: 2,
            offsets: vec![0; 3],
            buffer: Vec::new(),
            pages: Vec::new(),
            page: 0,
            k,
            def_orientation: config.orientation,
            cur_orientation: config.orientation,
            fw_pt,
            fh_pt,
            w_pt,
            h_pt,
            w: w_pt / k,
            h,
            l_margin: m.left / k,
            t_margin: m.top / k,
            r_margin: m.right / k,
            b_margin: m.bottom / k,
            c_margin: 2.835 / k,
            x: m.left / k,
            y: m.top / k,
            lasth: 0.0,
            line_width: 0.567 / k,
            fonts: Vec::new(),
            font_index: HashMap::new(),
            diffs: Vec::new(),
            images: Vec::new(),
            image_index: HashMap::new(),
            links: Vec::new(),
            font_family: String::new(),
            font_style: FontStyle::REGULAR,
            underline: false,
            strike: false,
            text_rise: 0.0,
            link_target: None,
            current_font: None,
            font_size_pt: 12.0,
            font_size: 12.0 / k,
            draw_color: Color::BLACK,
            fill_color: Color::BLACK,
            text_color: Color::BLACK,
            ws: 0.0,
            auto_page_break: true,
            page_break_trigger: h - m.bottom / k,
            in_footer: false,
            zoom: ZoomMode::FullWidth,
            layout: LayoutMode::Continuous,
            title: config.title.clone(),
            subject: config.subject.clone(),
            author: config.author.clone(),
            keywords: config.keywords.clone(),
            creator: config.creator.clone(),
            alias_nb_pages: None,
            compress: config.compress,
            outlines: Vec::new(),
            decorator: None,
            metrics,
            loader: Box::new(FsLoader),
            flowing_block: None,
        };
        if config.page_numbers {
            doc.alias_nb_pages = Some(config.alias_nb_pages.clone());
            doc.decorator = Some(Box::new(PageNumberFooter::default()));
        }
        doc
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Points per user unit.
    pub fn k(&self) -> f32 {
        self.k
    }

    pub fn page_no(&self) -> usize {
        self.page
    }

    pub fn page_width(&self) -> f32 {
        self.w
    }

    pub fn page_height(&self) -> f32 {
        self.h
    }

    /// Printable width between the left and right margins.
    pub fn content_width(&self) -> f32 {
        self.w - self.l_margin - self.r_margin
    }

    pub fn page_break_trigger(&self) -> f32 {
        self.page_break_trigger
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn set_x(&mut self, x: f32) {
        self.x = if x >= 0.0 { x } else { self.w + x };
    }

    /// Move to `y` and back to the left margin; negative values count from
    /// the bottom of the page.
    pub fn set_y(&mut self, y: f32) {
        self.x = self.l_margin;
        self.y = if y >= 0.0 { y } else { self.h + y };
    }

    pub fn set_xy(&mut self, x: f32, y: f32) {
        self.set_y(y);
        self.set_x(x);
    }

    pub fn orientation(&self) -> Orientation {
        self.cur_orientation
    }

    pub fn top_margin(&self) -> f32 {
        self.t_margin
    }

    pub fn left_margin(&self) -> f32 {
        self.l_margin
    }

    pub fn right_margin(&self) -> f32 {
        self.r_margin
    }

    pub fn cell_margin(&self) -> f32 {
        self.c_margin
    }

    pub fn set_margins(&mut self, left: f32, top: f32, right: Option<f32>) {
        self.l_margin = left;
        self.t_margin = top;
        self.r_margin = right.unwrap_or(left);
    }

    pub fn set_left_margin(&mut self, margin: f32) {
        self.l_margin = margin;
        if self.page > 0 && self.x < margin {
            self.x = margin;
        }
    }

    pub fn set_right_margin(&mut self, margin: f32) {
        self.r_margin = margin;
    }

    pub fn set_cell_margin(&mut self, margin: f32) {
        self.c_margin = margin;
    }

    pub fn set_auto_page_break(&mut self, auto: bool, margin: f32) {
        self.auto_page_break = auto;
        self.b_margin = margin;
        self.page_break_trigger = self.h - margin;
    }

    pub fn auto_page_break(&self) -> bool {
        self.auto_page_break
    }

    pub fn bottom_margin(&self) -> f32 {
        self.b_margin
    }

    pub fn in_footer(&self) -> bool {
        self.in_footer
    }

    /// Height of the last printed cell.
    pub fn last_height(&self) -> f32 {
        self.lasth
    }

    pub fn set_compression(&mut self, compress: bool) {
        self.compress = compress;
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = Some(title.to_string());
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_subject(&mut self, subject: &str) {
        self.subject = Some(subject.to_string());
    }

    pub fn set_author(&mut self, author: &str) {
        self.author = Some(author.to_string());
    }

    pub fn set_keywords(&mut self, keywords: &str) {
        self.keywords = Some(keywords.to_string());
    }

    pub fn set_creator(&mut self, creator: &str) {
        self.creator = Some(creator.to_string());
    }

    pub fn set_display_mode(&mut self, zoom: ZoomMode, layout: LayoutMode) {
        self.zoom = zoom;
        self.layout = layout;
    }

    /// Enable replacement of `alias` by the page count when closing.
    pub fn alias_nb_pages(&mut self, alias: &str) {
        self.alias_nb_pages = Some(alias.to_string());
    }

    pub fn set_decorator(&mut self, decorator: Box<dyn PageDecorator>) {
        self.decorator = Some(decorator);
    }

    pub fn set_loader(&mut self, loader: Box<dyn ResourceLoader>) {
        self.loader = loader;
    }

    pub fn loader(&self) -> &dyn ResourceLoader {
        self.loader.as_ref()
    }

    pub fn set_draw_color(&mut self, color: Color) -> Result<(), Error> {
        self.draw_color = color;
        if self.page > 0 {
            self.out(&color.operator(true))?;
        }
        Ok(())
    }

    pub fn set_fill_color(&mut self, color: Color) -> Result<(), Error> {
        self.fill_color = color;
        if self.page > 0 {
            self.out(&color.operator(false))?;
        }
        Ok(())
    }

    pub fn set_text_color(&mut self, color: Color) {
        self.text_color = color;
    }

    pub fn draw_color(&self) -> Color {
        self.draw_color
    }

    pub fn fill_color(&self) -> Color {
        self.fill_color
    }

    pub fn text_color(&self) -> Color {
        self.text_color
    }

    /// Text is painted with its own color only when it differs from the fill.
    fn color_flag(&self) -> bool {
        self.fill_color != self.text_color
    }

    pub fn set_line_width(&mut self, width: f32) -> Result<(), Error> {
        self.line_width = width;
        if self.page > 0 {
            self.out(&format!("{:.2} w", width * self.k))?;
        }
        Ok(())
    }

    pub fn line_width(&self) -> f32 {
        self.line_width
    }

    pub fn set_strike(&mut self, strike: bool) {
        self.strike = strike;
    }

    /// Baseline shift in points (positive raises the text).
    pub fn set_text_rise(&mut self, rise_pt: f32) {
        self.text_rise = rise_pt;
    }

    pub fn font_family(&self) -> &str {
        &self.font_family
    }

    pub fn font_style(&self) -> FontStyle {
        FontStyle {
            underline: self.underline,
            ..self.font_style
        }
    }

    pub fn font_size_pt(&self) -> f32 {
        self.font_size_pt
    }

    /// Font size in user units.
    pub fn font_size(&self) -> f32 {
        self.font_size
    }

    fn normalize_family(family: &str) -> String {
        core_family(family)
            .map(str::to_string)
            .unwrap_or_else(|| family.trim().to_lowercase())
    }

    fn font_key(family: &str, style: FontStyle) -> String {
        format!("{family}{}", style.face_suffix())
    }

    /// Register custom metrics for `family` + `style`. Registering the same
    /// face twice is an error.
    pub fn add_font(&mut self, family: &str, style: FontStyle, metrics: FontMetrics) -> Result<usize, Error> {
        let family = Self::normalize_family(family);
        let key = Self::font_key(&family, style.face());
        if self.font_index.contains_key(&key) {
            return Err(Error::invalid(format!("font {key} is already registered")));
        }
        Ok(self.register_font(family, style.face(), metrics))
    }

    fn register_font(&mut self, family: String, style: FontStyle, metrics: FontMetrics) -> usize {
        let key = Self::font_key(&family, style);
        let diff = metrics.differences.as_ref().map(|d| {
            match self.diffs.iter().position(|existing| existing == d) {
                Some(pos) => pos + 1,
                None => {
                    self.diffs.push(d.clone());
                    self.diffs.len()
                }
            }
        });
        log::debug!("Registered font {key} as /F{} ({})", self.fonts.len() + 1, metrics.name);
        self.fonts.push(FontEntry {
            metrics,
            diff,
            obj_id: 0,
        });
        let idx = self.fonts.len() - 1;
        self.font_index.insert(key, idx);
        idx
    }

    /// Registry index for a face, loading it from the metrics provider on
    /// first use.
    fn ensure_font(&mut self, family: &str, style: FontStyle) -> Result<usize, Error> {
        let key = Self::font_key(family, style.face());
        if let Some(&idx) = self.font_index.get(&key) {
            return Ok(idx);
        }
        let metrics = self.metrics.load(family, style.face())?;
        Ok(self.register_font(family.to_string(), style.face(), metrics))
    }

    /// Select a font. An empty family keeps the current one and a zero size
    /// keeps the current size.
    pub fn set_font(&mut self, family: &str, style: FontStyle, size_pt: f32) -> Result<(), Error> {
        let family = if family.is_empty() {
            self.font_family.clone()
        } else {
            Self::normalize_family(family)
        };
        if family.is_empty() {
            return Err(Error::invalid("no font family selected"));
        }
        let mut style = style;
        if family == "symbol" || family == "zapfdingbats" {
            style = FontStyle::REGULAR;
        }
        self.underline = style.underline;
        let size_pt = if size_pt == 0.0 { self.font_size_pt } else { size_pt };

        if self.current_font.is_some()
            && self.font_family == family
            && self.font_style == style.face()
            && self.font_size_pt == size_pt
        {
            return Ok(());
        }

        let idx = self.ensure_font(&family, style)?;
        self.font_family = family;
        self.font_style = style.face();
        self.font_size_pt = size_pt;
        self.font_size = size_pt / self.k;
        self.current_font = Some(idx);
        if self.page > 0 {
            self.out(&format!("BT /F{} {:.2} Tf ET", idx + 1, size_pt))?;
        }
        Ok(())
    }

    pub fn set_font_size(&mut self, size_pt: f32) -> Result<(), Error> {
        if self.font_size_pt == size_pt {
            return Ok(());
        }
        self.font_size_pt = size_pt;
        self.font_size = size_pt / self.k;
        if self.page > 0
            && let Some(idx) = self.current_font
        {
            self.out(&format!("BT /F{} {:.2} Tf ET", idx + 1, size_pt))?;
        }
        Ok(())
    }

    pub(crate) fn current_metrics(&self) -> Option<&FontMetrics> {
        self.current_font.map(|idx| &self.fonts[idx].metrics)
    }

    /// Width of `text` in user units with the current font.
    pub fn get_string_width(&self, text: &str) -> f32 {
        match self.current_metrics() {
            Some(m) => m.string_width(text, self.font_size_pt) / self.k,
            None => 0.0,
        }
    }

    /// Create an internal link target; place it with [`Document::set_link`].
    pub fn add_link(&mut self) -> usize {
        self.links.push((0, 0.0));
        self.links.len() - 1
    }

    /// Point `link` at `y` (default: current y) on `page` (default: current page).
    pub fn set_link(&mut self, link: usize, y: Option<f32>, page: Option<usize>) -> Result<(), Error> {
        let y = y.unwrap_or(self.y);
        let page = page.unwrap_or(self.page);
        let slot = self
            .links
            .get_mut(link)
            .ok_or_else(|| Error::invalid(format!("unknown link {link}")))?;
        *slot = (page, y);
        Ok(())
    }

    /// Put a link annotation on the current page.
    pub fn link(&mut self, x: f32, y: f32, w: f32, h: f32, target: Link) -> Result<(), Error> {
        let k = self.k;
        let h_pt = self.h_pt;
        let page = self.current_page_mut()?;
        page.links.push(PageLink {
            x: x * k,
            y: h_pt - y * k,
            w: w * k,
            h: h * k,
            target,
        });
        Ok(())
    }

    /// Add an outline entry pointing at `y` (default: current y) on the
    /// current page. Levels deeper than one past the previous entry are
    /// clamped so the outline tree stays well formed.
    pub fn bookmark(&mut self, title: &str, level: usize, y: Option<f32>) {
        let max_level = self.outlines.last().map(|b| b.level + 1).unwrap_or(0);
        let level = level.min(max_level);
        self.outlines.push(Bookmark {
            title: title.to_string(),
            level,
            y: y.unwrap_or(self.y),
            page: self.page,
        });
    }

    fn current_page_mut(&mut self) -> Result<&mut Page, Error> {
        if self.page == 0 {
            return Err(Error::structural("no page has been added"));
        }
        let idx = self.page - 1;
        self.pages
            .get_mut(idx)
            .ok_or_else(|| Error::structural(format!("page {} does not exist", idx + 1)))
    }

    fn call_header(&mut self) -> Result<(), Error> {
        if let Some(mut decorator) = self.decorator.take() {
            let result = decorator.header(self);
            self.decorator = Some(decorator);
            result?;
        }
        Ok(())
    }

    fn call_footer(&mut self) -> Result<(), Error> {
        self.in_footer = true;
        let result = match self.decorator.take() {
            Some(mut decorator) => {
                let result = decorator.footer(self);
                self.decorator = Some(decorator);
                result
            }
            None => Ok(()),
        };
        self.in_footer = false;
        result
    }
}
