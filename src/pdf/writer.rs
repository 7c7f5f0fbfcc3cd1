use std::time::Instant;

use crate::config::Orientation;
use crate::error::Error;
use crate::fonts::{FontKind, to_winansi_bytes};

use super::{Color, Document, LayoutMode, Link, Page, State, ZoomMode};

/// Escape a PDF literal string body.
pub(crate) fn escape(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 8);
    for &b in bytes {
        match b {
            b'\\' | b'(' | b')' => {
                out.push(b'\\');
                out.push(b);
            }
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(b),
        }
    }
    out
}

/// `(text)` in WinAnsi, for metadata and outline titles.
fn text_string(s: &str) -> Vec<u8> {
    let mut out = vec![b'('];
    out.extend(escape(&to_winansi_bytes(s)));
    out.push(b')');
    out
}

fn replace_bytes(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            out.extend_from_slice(replacement);
            i += needle.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}

fn deflate(data: &[u8]) -> Vec<u8> {
    miniz_oxide::deflate::compress_to_vec_zlib(data, 6)
}

impl Document {
    /// Start the document: emits the header and moves to `Opened`.
    pub fn open(&mut self) -> Result<(), Error> {
        match self.state {
            State::Unopened => {
                self.state = State::Opened;
                self.out("%PDF-1.3")
            }
            State::Finalized => Err(Error::structural("document is already closed")),
            _ => Ok(()),
        }
    }

    /// Append raw bytes: to the active page's content stream while a page is
    /// open, otherwise to the document buffer.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        match self.state {
            State::PageActive => {
                let page = self.current_page_mut()?;
                page.content.extend_from_slice(bytes);
                Ok(())
            }
            State::Opened | State::PageClosed => {
                self.buffer.extend_from_slice(bytes);
                Ok(())
            }
            State::Unopened => Err(Error::structural("write before the document was opened")),
            State::Finalized => Err(Error::structural("write after the document was closed")),
        }
    }

    /// Write one line of operators or object syntax.
    pub(crate) fn out(&mut self, line: &str) -> Result<(), Error> {
        self.out_bytes(line.as_bytes())
    }

    pub(crate) fn out_bytes(&mut self, line: &[u8]) -> Result<(), Error> {
        self.write(line)?;
        self.write(b"\n")
    }

    /// Allocate the next object id, record the current buffer length as its
    /// offset and open the object.
    // Objects are emitted once, in order, so recorded offsets stay valid for
    // the fixed-width PDF 1.3 xref table.
    pub fn new_object(&mut self) -> Result<usize, Error> {
        if !matches!(self.state, State::Opened | State::PageClosed) {
            return Err(Error::structural(format!(
                "cannot start an object in state {:?}",
                self.state
            )));
        }
        self.n += 1;
        self.offsets.resize(self.n + 1, 0);
        self.offsets[self.n] = self.buffer.len();
        self.out(&format!("{} 0 obj", self.n))?;
        Ok(self.n)
    }

    fn put_stream(&mut self, data: &[u8]) -> Result<(), Error> {
        self.out("stream")?;
        self.out_bytes(data)?;
        self.out("endstream")
    }

    /// Finish the current page (running its footer) and start a new one,
    /// carrying the font, colors and line width over.
    pub fn add_page(&mut self, orientation: Option<Orientation>) -> Result<(), Error> {
        match self.state {
            State::Unopened => self.open()?,
            State::Finalized => return Err(Error::structural("cannot add a page to a closed document")),
            _ => {}
        }
        let family = self.font_family.clone();
        let style = self.font_style();
        let size = self.font_size_pt;
        let lw = self.line_width;
        let dc = self.draw_color;
        let fc = self.fill_color;
        let tc = self.text_color;

        if self.page > 0 {
            self.call_footer()?;
            self.end_page();
        }
        self.begin_page(orientation);

        self.out("2 J")?;
        self.line_width = lw;
        self.out(&format!("{:.2} w", lw * self.k))?;
        if !family.is_empty() {
            self.set_font(&family, style, size)?;
        }
        self.draw_color = dc;
        if dc != Color::BLACK {
            self.out(&dc.operator(true))?;
        }
        self.fill_color = fc;
        if fc != Color::BLACK {
            self.out(&fc.operator(false))?;
        }
        self.text_color = tc;

        self.call_header()?;

        if self.line_width != lw {
            self.line_width = lw;
            self.out(&format!("{:.2} w", lw * self.k))?;
        }
        if !family.is_empty() {
            self.set_font(&family, style, size)?;
        }
        if self.draw_color != dc {
            self.draw_color = dc;
            self.out(&dc.operator(true))?;
        }
        if self.fill_color != fc {
            self.fill_color = fc;
            self.out(&fc.operator(false))?;
        }
        self.text_color = tc;

        log::debug!("Started page {} ({:?})", self.page, self.cur_orientation);
        Ok(())
    }

    fn begin_page(&mut self, orientation: Option<Orientation>) {
        self.page += 1;
        let orientation = orientation.unwrap_or(self.def_orientation);
        if orientation != self.cur_orientation {
            let (w_pt, h_pt) = match orientation {
                Orientation::Portrait => (self.fw_pt, self.fh_pt),
                Orientation::Landscape => (self.fh_pt, self.fw_pt),
            };
            self.w_pt = w_pt;
            self.h_pt = h_pt;
            self.w = w_pt / self.k;
            self.h = h_pt / self.k;
            self.page_break_trigger = self.h - self.b_margin;
            self.cur_orientation = orientation;
        }
        self.pages.push(Page {
            content: Vec::new(),
            w_pt: self.w_pt,
            h_pt: self.h_pt,
            links: Vec::new(),
        });
        self.state = State::PageActive;
        self.x = self.l_margin;
        self.y = self.t_margin;
        self.font_family.clear();
    }

    fn end_page(&mut self) {
        self.state = State::PageClosed;
    }

    /// Terminate the document: footer of the last page, then every object,
    /// the xref table and the trailer. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), Error> {
        match self.state {
            State::Finalized => return Ok(()),
            State::Unopened => self.open()?,
            _ => {}
        }
        if self.flowing_block.is_some() {
            return Err(Error::structural("flowing block was not finished before close"));
        }
        if self.page == 0 {
            self.add_page(None)?;
        }
        self.call_footer()?;
        self.end_page();
        self.end_doc()
    }

    fn end_doc(&mut self) -> Result<(), Error> {
        let t0 = Instant::now();
        self.put_pages()?;
        let outline_root = self.put_resources()?;

        self.new_object()?;
        self.out("<<")?;
        self.put_info()?;
        self.out(">>")?;
        self.out("endobj")?;

        self.new_object()?;
        self.out("<<")?;
        self.put_catalog(outline_root)?;
        self.out(">>")?;
        self.out("endobj")?;

        let xref_offset = self.buffer.len();
        self.out("xref")?;
        self.out(&format!("0 {}", self.n + 1))?;
        self.out("0000000000 65535 f ")?;
        for i in 1..=self.n {
            let offset = self.offsets[i];
            self.out(&format!("{offset:010} 00000 n "))?;
        }

        self.out("trailer")?;
        self.out("<<")?;
        self.out(&format!("/Size {}", self.n + 1))?;
        self.out(&format!("/Root {} 0 R", self.n))?;
        self.out(&format!("/Info {} 0 R", self.n - 1))?;
        self.out(">>")?;
        self.out("startxref")?;
        self.out(&xref_offset.to_string())?;
        self.out("%%EOF")?;
        self.state = State::Finalized;

        log::debug!(
            "Wrote {} objects, {} pages, {} bytes in {:.1}ms",
            self.n,
            self.pages.len(),
            self.buffer.len(),
            t0.elapsed().as_secs_f64() * 1000.0
        );
        Ok(())
    }

    fn put_pages(&mut self) -> Result<(), Error> {
        let nb = self.pages.len();
        if let Some(alias) = self.alias_nb_pages.clone() {
            let total = nb.to_string();
            for page in &mut self.pages {
                page.content = replace_bytes(&page.content, alias.as_bytes(), total.as_bytes());
            }
        }
        let (w_pt, h_pt) = match self.def_orientation {
            Orientation::Portrait => (self.fw_pt, self.fh_pt),
            Orientation::Landscape => (self.fh_pt, self.fw_pt),
        };
        let filter = if self.compress { "/Filter /FlateDecode " } else { "" };

        for i in 0..nb {
            self.new_object()?;
            self.out("<</Type /Page")?;
            self.out("/Parent 1 0 R")?;
            let (page_w, page_h) = (self.pages[i].w_pt, self.pages[i].h_pt);
            if page_w != w_pt || page_h != h_pt {
                self.out(&format!("/MediaBox [0 0 {page_w:.2} {page_h:.2}]"))?;
            }
            self.out("/Resources 2 0 R")?;
            let annots = self.page_annotations(i);
            if !annots.is_empty() {
                self.out_bytes(&annots)?;
            }
            self.out(&format!("/Contents {} 0 R>>", self.n + 1))?;
            self.out("endobj")?;

            let content = std::mem::take(&mut self.pages[i].content);
            let data = if self.compress { deflate(&content) } else { content };
            self.new_object()?;
            self.out(&format!("<<{filter}/Length {}>>", data.len()))?;
            self.put_stream(&data)?;
            self.out("endobj")?;
        }

        self.offsets[1] = self.buffer.len();
        self.out("1 0 obj")?;
        self.out("<</Type /Pages")?;
        let kids: String = (0..nb).map(|i| format!("{} 0 R ", 3 + 2 * i)).collect();
        self.out(&format!("/Kids [{kids}]"))?;
        self.out(&format!("/Count {nb}"))?;
        self.out(&format!("/MediaBox [0 0 {w_pt:.2} {h_pt:.2}]"))?;
        self.out(">>")?;
        self.out("endobj")
    }

    fn page_annotations(&self, page_idx: usize) -> Vec<u8> {
        let links = &self.pages[page_idx].links;
        if links.is_empty() {
            return Vec::new();
        }
        let mut annots = b"/Annots [".to_vec();
        for link in links {
            let rect = format!(
                "<</Type /Annot /Subtype /Link /Rect [{:.2} {:.2} {:.2} {:.2}] /Border [0 0 0] ",
                link.x,
                link.y,
                link.x + link.w,
                link.y - link.h
            );
            match &link.target {
                Link::Uri(uri) => {
                    annots.extend_from_slice(rect.as_bytes());
                    annots.extend_from_slice(b"/A <</S /URI /URI (");
                    annots.extend(escape(uri.as_bytes()));
                    annots.extend_from_slice(b")>>>>");
                }
                Link::Internal(id) => {
                    let Some(&(page, y)) = self.links.get(*id) else {
                        continue;
                    };
                    if page == 0 || page > self.pages.len() {
                        log::warn!("Internal link {id} has no target, skipping");
                        continue;
                    }
                    let target_h = self.pages[page - 1].h_pt;
                    annots.extend_from_slice(rect.as_bytes());
                    annots.extend_from_slice(
                        format!("/Dest [{} 0 R /XYZ 0 {:.2} null]>>", 1 + 2 * page, target_h - y * self.k)
                            .as_bytes(),
                    );
                }
            }
        }
        annots.push(b']');
        annots
    }

    fn put_fonts(&mut self) -> Result<(), Error> {
        let nf = self.n;
        for diff in self.diffs.clone() {
            self.new_object()?;
            self.out(&format!(
                "<</Type /Encoding /BaseEncoding /WinAnsiEncoding /Differences [{diff}]>>"
            ))?;
            self.out("endobj")?;
        }

        let mut file_objs = vec![None; self.fonts.len()];
        for (i, slot) in file_objs.iter_mut().enumerate() {
            let Some(file) = self.fonts[i].metrics.file.take() else {
                continue;
            };
            *slot = Some(self.new_object()?);
            self.out(&format!("<</Length {}", file.data.len()))?;
            if file.compressed {
                self.out("/Filter /FlateDecode")?;
            }
            self.out(&format!("/Length1 {}", file.length1))?;
            if let Some(length2) = file.length2 {
                self.out(&format!("/Length2 {length2} /Length3 0"))?;
            }
            self.out(">>")?;
            self.put_stream(&file.data)?;
            self.out("endobj")?;
        }

        for i in 0..self.fonts.len() {
            self.fonts[i].obj_id = self.n + 1;
            let kind = self.fonts[i].metrics.kind;
            let name = self.fonts[i].metrics.name.clone();
            self.new_object()?;
            self.out("<</Type /Font")?;
            self.out(&format!("/BaseFont /{name}"))?;
            if kind == FontKind::Core {
                self.out("/Subtype /Type1")?;
                if name != "Symbol" && name != "ZapfDingbats" {
                    self.out("/Encoding /WinAnsiEncoding")?;
                }
                self.out(">>")?;
                self.out("endobj")?;
                continue;
            }

            let subtype = if kind == FontKind::Type1 { "Type1" } else { "TrueType" };
            self.out(&format!("/Subtype /{subtype}"))?;
            self.out("/FirstChar 32 /LastChar 255")?;
            self.out(&format!("/Widths {} 0 R", self.n + 1))?;
            self.out(&format!("/FontDescriptor {} 0 R", self.n + 2))?;
            match self.fonts[i].diff {
                Some(d) => self.out(&format!("/Encoding {} 0 R", nf + d))?,
                None => self.out("/Encoding /WinAnsiEncoding")?,
            }
            self.out(">>")?;
            self.out("endobj")?;

            self.new_object()?;
            let widths: String = self.fonts[i].metrics.widths[32..]
                .iter()
                .map(|w| format!("{w} "))
                .collect();
            self.out(&format!("[{widths}]"))?;
            self.out("endobj")?;

            self.new_object()?;
            let mut desc = format!("<</Type /FontDescriptor /FontName /{name}");
            for (key, value) in &self.fonts[i].metrics.descriptor {
                desc.push_str(&format!(" /{key} {value}"));
            }
            if let Some(file_obj) = file_objs[i] {
                let suffix = if kind == FontKind::Type1 { "" } else { "2" };
                desc.push_str(&format!(" /FontFile{suffix} {file_obj} 0 R"));
            }
            desc.push_str(">>");
            self.out(&desc)?;
            self.out("endobj")?;
        }
        Ok(())
    }

    fn put_images(&mut self) -> Result<(), Error> {
        let filter = if self.compress { "/Filter /FlateDecode " } else { "" };
        for i in 0..self.images.len() {
            let obj = self.new_object()?;
            self.images[i].obj_id = obj;
            let data = std::mem::take(&mut self.images[i].info.data);
            let palette = std::mem::take(&mut self.images[i].info.palette);
            let info = &self.images[i].info;
            let mut dict = vec![
                "<</Type /XObject".to_string(),
                "/Subtype /Image".to_string(),
                format!("/Width {}", info.width),
                format!("/Height {}", info.height),
            ];
            if info.color_space == super::ColorSpace::Indexed {
                dict.push(format!(
                    "/ColorSpace [/Indexed /DeviceRGB {} {} 0 R]",
                    (palette.len() / 3).saturating_sub(1),
                    obj + 1
                ));
            } else {
                dict.push(format!("/ColorSpace /{}", info.color_space.pdf_name()));
                if info.color_space == super::ColorSpace::DeviceCMYK {
                    dict.push("/Decode [1 0 1 0 1 0 1 0]".to_string());
                }
            }
            dict.push(format!("/BitsPerComponent {}", info.bits_per_component));
            if let Some(f) = info.filter {
                dict.push(format!("/Filter /{f}"));
            }
            if let Some(parms) = &info.decode_parms {
                dict.push(parms.clone());
            }
            if let Some(trns) = &info.transparency {
                let mask: String = trns.iter().map(|v| format!("{v} {v} ")).collect();
                dict.push(format!("/Mask [{mask}]"));
            }
            dict.push(format!("/Length {}>>", data.len()));
            let is_indexed = info.color_space == super::ColorSpace::Indexed;
            for line in dict {
                self.out(&line)?;
            }
            self.put_stream(&data)?;
            self.out("endobj")?;

            if is_indexed {
                self.new_object()?;
                let pal = if self.compress { deflate(&palette) } else { palette };
                self.out(&format!("<<{filter}/Length {}>>", pal.len()))?;
                self.put_stream(&pal)?;
                self.out("endobj")?;
            }
        }
        Ok(())
    }

    /// Fonts, images, the shared resource dictionary (object 2) and the
    /// outline tree. Returns the outline root, if any.
    fn put_resources(&mut self) -> Result<Option<usize>, Error> {
        self.put_fonts()?;
        self.put_images()?;

        self.offsets[2] = self.buffer.len();
        self.out("2 0 obj")?;
        self.out("<</ProcSet [/PDF /Text /ImageB /ImageC /ImageI]")?;
        self.out("/Font <<")?;
        let fonts: Vec<String> = self
            .fonts
            .iter()
            .enumerate()
            .map(|(i, f)| format!("/F{} {} 0 R", i + 1, f.obj_id))
            .collect();
        for line in fonts {
            self.out(&line)?;
        }
        self.out(">>")?;
        if !self.images.is_empty() {
            self.out("/XObject <<")?;
            let images: Vec<String> = self
                .images
                .iter()
                .enumerate()
                .map(|(i, img)| format!("/I{} {} 0 R", i + 1, img.obj_id))
                .collect();
            for line in images {
                self.out(&line)?;
            }
            self.out(">>")?;
        }
        self.out(">>")?;
        self.out("endobj")?;

        self.put_bookmarks()
    }

    fn put_bookmarks(&mut self) -> Result<Option<usize>, Error> {
        let nb = self.outlines.len();
        if nb == 0 {
            return Ok(None);
        }
        let mut parent = vec![nb; nb];
        let mut prev = vec![None; nb];
        let mut next = vec![None; nb];
        let mut first = vec![None; nb];
        let mut last = vec![None; nb];
        let mut lru: Vec<usize> = Vec::new();
        let mut level = 0;
        for i in 0..nb {
            let l = self.outlines[i].level;
            if l > 0 {
                let p = lru[l - 1];
                parent[i] = p;
                last[p] = Some(i);
                if l > level {
                    first[p] = Some(i);
                }
            }
            if l <= level && i > 0 {
                let pv = lru[l];
                next[pv] = Some(i);
                prev[i] = Some(pv);
            }
            if lru.len() <= l {
                lru.resize(l + 1, 0);
            }
            lru[l] = i;
            level = l;
        }

        let base = self.n + 1;
        for i in 0..nb {
            self.new_object()?;
            let mut title = b"<</Title ".to_vec();
            title.extend(text_string(&self.outlines[i].title));
            self.out_bytes(&title)?;
            self.out(&format!("/Parent {} 0 R", base + parent[i]))?;
            for (key, link) in [("Prev", prev[i]), ("Next", next[i]), ("First", first[i]), ("Last", last[i])] {
                if let Some(target) = link {
                    self.out(&format!("/{key} {} 0 R", base + target))?;
                }
            }
            let page = self.outlines[i].page.clamp(1, self.pages.len().max(1));
            let page_h = self.pages.get(page - 1).map(|p| p.h_pt).unwrap_or(self.h_pt);
            self.out(&format!(
                "/Dest [{} 0 R /XYZ 0 {:.2} null]",
                1 + 2 * page,
                page_h - self.outlines[i].y * self.k
            ))?;
            self.out("/Count 0>>")?;
            self.out("endobj")?;
        }

        let root = self.new_object()?;
        self.out(&format!("<</Type /Outlines /First {base} 0 R"))?;
        self.out(&format!("/Last {} 0 R>>", base + lru[0]))?;
        self.out("endobj")?;
        Ok(Some(root))
    }

    fn put_info(&mut self) -> Result<(), Error> {
        let producer = format!("htmlide-pdf {}", env!("CARGO_PKG_VERSION"));
        let mut entries = vec![("Producer", producer)];
        for (key, value) in [
            ("Title", &self.title),
            ("Subject", &self.subject),
            ("Author", &self.author),
            ("Keywords", &self.keywords),
            ("Creator", &self.creator),
        ] {
            if let Some(v) = value {
                entries.push((key, v.clone()));
            }
        }
        let date = chrono::Local::now().format("D:%Y%m%d%H%M%S").to_string();
        entries.push(("CreationDate", date));
        for (key, value) in entries {
            let mut line = format!("/{key} ").into_bytes();
            line.extend(text_string(&value));
            self.out_bytes(&line)?;
        }
        Ok(())
    }

    fn put_catalog(&mut self, outline_root: Option<usize>) -> Result<(), Error> {
        self.out("/Type /Catalog")?;
        self.out("/Pages 1 0 R")?;
        match self.zoom {
            ZoomMode::FullPage => self.out("/OpenAction [3 0 R /Fit]")?,
            ZoomMode::FullWidth => self.out("/OpenAction [3 0 R /FitH null]")?,
            ZoomMode::Real => self.out("/OpenAction [3 0 R /XYZ null null 1]")?,
            ZoomMode::Percent(z) => self.out(&format!("/OpenAction [3 0 R /XYZ null null {}]", z / 100.0))?,
            ZoomMode::Default => {}
        }
        match self.layout {
            LayoutMode::Single => self.out("/PageLayout /SinglePage")?,
            LayoutMode::Continuous => self.out("/PageLayout /OneColumn")?,
            LayoutMode::Two => self.out("/PageLayout /TwoColumnLeft")?,
            LayoutMode::Default => {}
        }
        if let Some(root) = outline_root {
            self.out(&format!("/Outlines {root} 0 R"))?;
            self.out("/PageMode /UseOutlines")?;
        }
        Ok(())
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
        Document::new(&config)
    }

    #[test]
    fn write_before_open_is_structural() {
        let mut d = doc();
        assert!(matches!(d.write(b"x"), Err(Error::Structural(_))));
    }

    #[test]
    fn page_content_goes_to_page_stream() {
        let mut d = doc();
        d.open().unwrap();
        d.add_page(None).unwrap();
        let before = d.buffer.len();
        d.out("0 0 m").unwrap();
        assert_eq!(d.buffer.len(), before);
        assert!(d.pages[0].content.ends_with(b"0 0 m\n"));
    }

    #[test]
    fn close_is_idempotent_and_seals_the_document() {
        let mut d = doc();
        d.close().unwrap();
        let len = d.buffer.len();
        d.close().unwrap();
        assert_eq!(d.buffer.len(), len);
        assert_eq!(d.state(), State::Finalized);
        assert!(matches!(d.add_page(None), Err(Error::Structural(_))));
        assert!(d.buffer.starts_with(b"%PDF-1.3\n"));
        assert!(d.buffer.ends_with(b"%%EOF\n"));
    }

    #[test]
    fn alias_is_replaced_with_page_count() {
        let mut d = doc();
        d.alias_nb_pages("{nb}");
        d.add_page(None).unwrap();
        d.out("({nb})").unwrap();
        d.add_page(None).unwrap();
        d.close().unwrap();
        let text = String::from_utf8_lossy(&d.buffer);
        assert!(text.contains("(2)"));
        assert!(!text.contains("{nb}"));
    }

    #[test]
    fn landscape_page_overrides_media_box() {
        let mut d = doc();
        d.add_page(None).unwrap();
        d.add_page(Some(Orientation::Landscape)).unwrap();
        d.close().unwrap();
        let text = String::from_utf8_lossy(&d.buffer);
        assert_eq!(text.matches("/MediaBox [0 0 841.89 595.28]").count(), 1);
        assert!(text.contains("/MediaBox [0 0 595.28 841.89]"));
    }

    #[test]
    fn escape_handles_delimiters() {
        assert_eq!(escape(b"a(b)\\c"), b"a\\(b\\)\\\\c".to_vec());
    }
}
