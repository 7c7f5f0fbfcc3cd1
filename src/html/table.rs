//! Table layout: a cell arena with an occupancy index, column widths from
//! content extents, row heights from wrapped line counts, and row-by-row
//! rendering that replays the first row after a page break.

use std::collections::HashMap;

use crate::error::Error;
use crate::pdf::{Align, Border, Color, Document, PaintStyle};

use super::css::BorderStyle;
use super::style::{RunItem, RunLayout, estimate_height, measure_runs, render_runs};

/// Line count multiplier used for row heights.
const LINE_SPACING: f32 = 1.1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VAlign {
    Top,
    #[default]
    Middle,
    Bottom,
}

impl VAlign {
    pub fn parse(val: &str) -> Option<Self> {
        match val.trim().to_ascii_lowercase().as_str() {
            "top" => Some(VAlign::Top),
            "middle" | "center" => Some(VAlign::Middle),
            "bottom" => Some(VAlign::Bottom),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableCell {
    /// Declared width in user units.
    pub width: Option<f32>,
    /// Declared height in user units.
    pub height: Option<f32>,
    pub align: Align,
    pub valign: VAlign,
    pub border: Border,
    pub border_style: BorderStyle,
    pub border_color: Color,
    pub background: Option<Color>,
    pub colspan: usize,
    pub rowspan: usize,
    pub nowrap: bool,
    pub header: bool,
    pub content: Vec<RunItem>,
}

impl Default for TableCell {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            align: Align::Left,
            valign: VAlign::Middle,
            border: Border::NONE,
            border_style: BorderStyle::Solid,
            border_color: Color::BLACK,
            background: None,
            colspan: 1,
            rowspan: 1,
            nowrap: false,
            header: false,
            content: Vec::new(),
        }
    }
}

/// Occupancy of one grid position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    /// Top-left corner of the cell at this arena index.
    Origin(usize),
    /// Covered by a span of the cell at this arena index.
    Covered(usize),
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ColumnWidth {
    pub min: f32,
    pub max: f32,
    pub fixed: Option<f32>,
}

impl ColumnWidth {
    /// Width the column asks for when space is plentiful.
    fn preferred(&self) -> f32 {
        match self.fixed {
            Some(f) => f.max(self.min),
            None => self.max.max(self.min),
        }
    }
}

#[derive(Clone, Debug)]
struct PlacedCell {
    cell: TableCell,
    row: usize,
    col: usize,
    min_width: f32,
    max_width: f32,
    lines: usize,
    image_height: f32,
    height: f32,
}

/// Largest `colspan` honoured.
pub const MAX_COLSPAN: usize = 1000;
/// Largest `rowspan` honoured.
pub const MAX_ROWSPAN: usize = 65534;

/// A rowspan still reaching into rows not started yet.
#[derive(Clone, Copy, Debug)]
struct PendingSpan {
    idx: usize,
    col: usize,
    colspan: usize,
    last_row: usize,
}

#[derive(Debug)]
pub struct Table {
    /// Declared total width in user units.
    pub width: Option<f32>,
    pub align: Align,
    pub line_height: f32,
    cells: Vec<PlacedCell>,
    grid: HashMap<(usize, usize), Slot>,
    pending: Vec<PendingSpan>,
    rows: usize,
    cols: usize,
    row_open: bool,
    columns: Vec<ColumnWidth>,
    col_widths: Vec<f32>,
    row_heights: Vec<f32>,
    total_width: f32,
}

impl Table {
    pub fn new(line_height: f32) -> Self {
        Self {
            width: None,
            align: Align::Left,
            line_height,
            cells: Vec::new(),
            grid: HashMap::new(),
            pending: Vec::new(),
            rows: 0,
            cols: 0,
            row_open: false,
            columns: Vec::new(),
            col_widths: Vec::new(),
            row_heights: Vec::new(),
            total_width: 0.0,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Open the next row and mark the slots that earlier rowspans cover in
    /// it. Covered slots only ever exist for rows that were started.
    pub fn start_row(&mut self) {
        self.rows += 1;
        self.row_open = true;
        let row = self.rows - 1;
        self.pending.retain(|span| span.last_row >= row);
        for span in &self.pending {
            for c in span.col..span.col + span.colspan {
                self.grid.insert((row, c), Slot::Covered(span.idx));
            }
        }
    }

    pub fn end_row(&mut self) {
        self.row_open = false;
    }

    pub fn row_open(&self) -> bool {
        self.row_open
    }

    /// Place `cell` at the first free column of the current row and mark
    /// every position its spans cover. Returns the arena index.
    pub fn add_cell(&mut self, mut cell: TableCell) -> usize {
        if !self.row_open {
            self.start_row();
        }
        cell.colspan = cell.colspan.clamp(1, MAX_COLSPAN);
        cell.rowspan = cell.rowspan.clamp(1, MAX_ROWSPAN);
        let row = self.rows - 1;
        let mut col = 0;
        while self.grid.contains_key(&(row, col)) {
            col += 1;
        }
        let idx = self.cells.len();
        self.grid.insert((row, col), Slot::Origin(idx));
        for c in col + 1..col + cell.colspan {
            self.grid.insert((row, c), Slot::Covered(idx));
        }
        if cell.rowspan > 1 {
            self.pending.push(PendingSpan {
                idx,
                col,
                colspan: cell.colspan,
                last_row: row + cell.rowspan - 1,
            });
        }
        self.cols = self.cols.max(col + cell.colspan);
        self.cells.push(PlacedCell {
            cell,
            row,
            col,
            min_width: 0.0,
            max_width: 0.0,
            lines: 0,
            image_height: 0.0,
            height: 0.0,
        });
        idx
    }

    pub fn slot(&self, row: usize, col: usize) -> Option<Slot> {
        self.grid.get(&(row, col)).copied()
    }

    pub fn cell(&self, idx: usize) -> Option<&TableCell> {
        self.cells.get(idx).map(|p| &p.cell)
    }

    pub fn last_cell_mut(&mut self) -> Option<&mut TableCell> {
        self.cells.last_mut().map(|p| &mut p.cell)
    }

    pub fn columns(&self) -> &[ColumnWidth] {
        &self.columns
    }

    pub fn column_widths(&self) -> &[f32] {
        &self.col_widths
    }

    pub fn row_heights(&self) -> &[f32] {
        &self.row_heights
    }

    pub fn total_width(&self) -> f32 {
        self.total_width
    }

    /// Resolve column widths and row heights for a table at most
    /// `available` wide.
    pub fn layout(&mut self, doc: &mut Document, available: f32) -> Result<(), Error> {
        let rows = self.rows;
        let cols = self.cols;
        for p in &mut self.cells {
            p.cell.rowspan = p.cell.rowspan.min(rows.saturating_sub(p.row)).max(1);
            p.cell.colspan = p.cell.colspan.min(cols.saturating_sub(p.col)).max(1);
        }
        self.measure_cells(doc)?;
        self.resolve_columns();
        self.resolve_width(available);
        self.resolve_heights(doc)?;
        log::debug!(
            "Table {}x{}: width {:.1} of {:.1}, columns {:?}",
            rows,
            cols,
            self.total_width,
            available,
            self.col_widths
        );
        Ok(())
    }

    fn measure_cells(&mut self, doc: &mut Document) -> Result<(), Error> {
        let padding = 2.0 * doc.cell_margin();
        for p in &mut self.cells {
            let ext = measure_runs(doc, &p.cell.content)?;
            p.min_width = ext.min_width + padding;
            p.max_width = ext.max_width + padding;
            if p.cell.nowrap {
                p.min_width = p.max_width;
            }
        }
        Ok(())
    }

    /// Per-column minimum and maximum widths. Single-column cells set them
    /// directly; spanning cells then widen their columns in proportion.
    fn resolve_columns(&mut self) {
        let mut columns = vec![ColumnWidth::default(); self.cols];
        for p in self.cells.iter().filter(|p| p.cell.colspan == 1) {
            let col = &mut columns[p.col];
            col.min = col.min.max(p.min_width);
            col.max = col.max.max(p.max_width);
            if let Some(w) = p.cell.width {
                col.fixed = Some(col.fixed.map_or(w, |f| f.max(w)));
            }
        }
        for p in self.cells.iter().filter(|p| p.cell.colspan > 1) {
            let span = &mut columns[p.col..p.col + p.cell.colspan];
            grow_span(span, |c| &mut c.min, p.min_width);
            grow_span(span, |c| &mut c.max, p.max_width);
            if let Some(w) = p.cell.width {
                grow_span(span, |c| &mut c.max, w);
            }
        }
        for col in &mut columns {
            col.max = col.max.max(col.min);
        }
        self.columns = columns;
    }

    fn resolve_width(&mut self, available: f32) {
        let sum_min: f32 = self.columns.iter().map(|c| c.min).sum();
        let sum_pref: f32 = self.columns.iter().map(ColumnWidth::preferred).sum();
        let mut total = self.width.unwrap_or(sum_pref);
        if total > available {
            total = available;
        }
        total = total.max(sum_min);

        let widths: Vec<f32> = if total >= sum_pref {
            let mut widths: Vec<f32> = self.columns.iter().map(ColumnWidth::preferred).collect();
            let slack = total - sum_pref;
            if slack > 0.0 {
                let flexible: Vec<usize> = (0..widths.len())
                    .filter(|&i| self.columns[i].fixed.is_none())
                    .collect();
                let targets = if flexible.is_empty() {
                    (0..widths.len()).collect()
                } else {
                    flexible
                };
                let base: f32 = targets.iter().map(|&i| widths[i]).sum();
                for &i in &targets {
                    widths[i] += if base > 0.0 {
                        slack * widths[i] / base
                    } else {
                        slack / targets.len() as f32
                    };
                }
            }
            widths
        } else {
            let range = sum_pref - sum_min;
            let t = if range > 0.0 { (total - sum_min) / range } else { 0.0 };
            self.columns
                .iter()
                .map(|c| c.min + (c.preferred() - c.min) * t)
                .collect()
        };
        self.total_width = total;
        self.col_widths = widths;
    }

    fn span_width(&self, col: usize, span: usize) -> f32 {
        self.col_widths[col..col + span].iter().sum()
    }

    fn resolve_heights(&mut self, doc: &mut Document) -> Result<(), Error> {
        let padding = 2.0 * doc.cell_margin();
        let lh = self.line_height;
        for i in 0..self.cells.len() {
            let (col, span) = (self.cells[i].col, self.cells[i].cell.colspan);
            let inner = (self.span_width(col, span) - padding).max(0.0);
            let p = &mut self.cells[i];
            let (lines, image_height) = estimate_height(doc, &p.cell.content, inner)?;
            p.lines = lines;
            p.image_height = image_height;
            let mut h = lines.max(1) as f32 * LINE_SPACING * lh + image_height;
            if image_height > 0.0 && lines == 0 {
                h = image_height + (LINE_SPACING - 1.0) * lh;
            }
            p.height = p.cell.height.map_or(h, |d| d.max(h));
        }

        let mut heights = vec![0.0f32; self.rows];
        for p in self.cells.iter().filter(|p| p.cell.rowspan == 1) {
            heights[p.row] = heights[p.row].max(p.height);
        }
        for p in self.cells.iter().filter(|p| p.cell.rowspan > 1) {
            let span = &mut heights[p.row..p.row + p.cell.rowspan];
            let current: f32 = span.iter().sum();
            if p.height > current {
                distribute(span, p.height - current);
            }
        }
        for h in &mut heights {
            if *h <= 0.0 {
                *h = LINE_SPACING * lh;
            }
        }
        self.row_heights = heights;
        Ok(())
    }

    /// Draw the table at the current y. When a row would cross the page
    /// break trigger a new page is started and, with `repeat_header`, the
    /// first row is drawn again before it. Rowspans are clipped at the page
    /// end and their frame continues on the next page.
    pub fn render(&self, doc: &mut Document, repeat_header: bool) -> Result<(), Error> {
        let left = doc.left_margin();
        let x0 = match self.align {
            Align::Center => left + (doc.content_width() - self.total_width) / 2.0,
            Align::Right => left + doc.content_width() - self.total_width,
            _ => left,
        };
        let breaks = self.page_breaks(doc, repeat_header);
        let mut y = doc.y();
        for row in 0..self.rows {
            if breaks[row] {
                log::debug!("Table row {row} moves to a new page");
                doc.add_page(Some(doc.orientation()))?;
                y = doc.y();
                if repeat_header && row > 0 {
                    y = self.render_row(doc, 0, x0, y, &breaks, true)?;
                }
                self.without_page_break(doc, |t, doc| t.paint_continued_spans(doc, row, x0, y, &breaks))?;
            }
            y = self.render_row(doc, row, x0, y, &breaks, false)?;
        }
        doc.set_y(y);
        Ok(())
    }

    /// Rows that start a new page, decided before anything is drawn so that
    /// spanning cells know where they get cut.
    fn page_breaks(&self, doc: &Document, repeat_header: bool) -> Vec<bool> {
        let mut breaks = vec![false; self.rows];
        if !doc.auto_page_break() {
            return breaks;
        }
        let top = doc.top_margin();
        let trigger = doc.page_break_trigger();
        let mut y = doc.y();
        for (row, &h) in self.row_heights.iter().enumerate() {
            let at_top = y <= top + 0.01;
            if y + h > trigger && !at_top {
                breaks[row] = true;
                y = top;
                if repeat_header && row > 0 {
                    y += self.row_heights[0];
                }
            }
            y += h;
        }
        breaks
    }

    /// Rows of a span starting at `row` that land on the same page.
    fn rows_on_page(&self, row: usize, span: usize, breaks: &[bool]) -> usize {
        1 + (row + 1..row + span).take_while(|&r| !breaks[r]).count()
    }

    fn without_page_break<T>(
        &self,
        doc: &mut Document,
        paint: impl FnOnce(&Self, &mut Document) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let auto = doc.auto_page_break();
        let bottom = doc.bottom_margin();
        doc.set_auto_page_break(false, bottom);
        let result = paint(self, doc);
        doc.set_auto_page_break(auto, bottom);
        result
    }

    fn render_row(
        &self,
        doc: &mut Document,
        row: usize,
        x0: f32,
        y: f32,
        breaks: &[bool],
        replay: bool,
    ) -> Result<f32, Error> {
        self.without_page_break(doc, |t, doc| t.paint_row(doc, row, x0, y, breaks, replay))?;
        Ok(y + self.row_heights[row])
    }

    fn paint_row(
        &self,
        doc: &mut Document,
        row: usize,
        x0: f32,
        y: f32,
        breaks: &[bool],
        replay: bool,
    ) -> Result<(), Error> {
        let c = doc.cell_margin();
        let room = (doc.page_break_trigger() - y).max(self.row_heights[row]);
        for p in self.cells.iter().filter(|p| p.row == row) {
            let x = x0 + self.span_width(0, p.col);
            let w = self.span_width(p.col, p.cell.colspan);
            let rows = if replay {
                1
            } else {
                self.rows_on_page(row, p.cell.rowspan, breaks)
            };
            let h = self.row_heights[row..row + rows].iter().sum::<f32>().min(room);
            self.paint_frame(doc, &p.cell, x, y, w, h)?;

            let content_h = p.lines as f32 * self.line_height + p.image_height;
            let top = match p.cell.valign {
                VAlign::Top => y,
                VAlign::Middle => y + ((h - content_h) / 2.0).max(0.0),
                VAlign::Bottom => y + (h - content_h).max(0.0),
            };
            doc.set_xy(x, top);
            let layout = RunLayout {
                x,
                width: (w - 2.0 * c).max(0.01),
                line_height: self.line_height,
                align: p.cell.align,
                is_table: true,
                out_of_block: false,
            };
            render_runs(doc, &p.cell.content, &layout)?;
        }
        Ok(())
    }

    /// Background and border of the cells whose rowspan started on an
    /// earlier page and reaches into `row`.
    fn paint_continued_spans(&self, doc: &mut Document, row: usize, x0: f32, y: f32, breaks: &[bool]) -> Result<(), Error> {
        let room = (doc.page_break_trigger() - y).max(self.row_heights[row]);
        for p in self.cells.iter().filter(|p| p.row < row && row < p.row + p.cell.rowspan) {
            let x = x0 + self.span_width(0, p.col);
            let w = self.span_width(p.col, p.cell.colspan);
            let rows = self.rows_on_page(row, p.row + p.cell.rowspan - row, breaks);
            let h = self.row_heights[row..row + rows].iter().sum::<f32>().min(room);
            self.paint_frame(doc, &p.cell, x, y, w, h)?;
        }
        Ok(())
    }

    fn paint_frame(&self, doc: &mut Document, cell: &TableCell, x: f32, y: f32, w: f32, h: f32) -> Result<(), Error> {
        if let Some(bg) = cell.background {
            let previous = doc.fill_color();
            doc.set_fill_color(bg)?;
            doc.rect(x, y, w, h, PaintStyle::Fill)?;
            doc.set_fill_color(previous)?;
        }
        if !cell.border.is_none() && cell.border_style != BorderStyle::None {
            self.paint_border(doc, cell, x, y, w, h)?;
        }
        Ok(())
    }

    fn paint_border(&self, doc: &mut Document, cell: &TableCell, x: f32, y: f32, w: f32, h: f32) -> Result<(), Error> {
        let previous = doc.draw_color();
        if cell.border_color != previous {
            doc.set_draw_color(cell.border_color)?;
        }
        let b = cell.border;
        if cell.border_style == BorderStyle::Dotted {
            doc.dotted_rect(x, y, w, h, 1.0)?;
        } else if b.frame {
            doc.rect(x, y, w, h, PaintStyle::Stroke)?;
        } else {
            if b.left {
                doc.line(x, y, x, y + h)?;
            }
            if b.top {
                doc.line(x, y, x + w, y)?;
            }
            if b.right {
                doc.line(x + w, y, x + w, y + h)?;
            }
            if b.bottom {
                doc.line(x, y + h, x + w, y + h)?;
            }
        }
        if cell.border_color != previous {
            doc.set_draw_color(previous)?;
        }
        Ok(())
    }
}

/// Widen the columns of `span` so that their summed field reaches `target`,
/// in proportion to their current values (evenly when all are zero).
fn grow_span(span: &mut [ColumnWidth], field: impl Fn(&mut ColumnWidth) -> &mut f32, target: f32) {
    let mut values: Vec<f32> = span.iter_mut().map(|c| *field(c)).collect();
    let current: f32 = values.iter().sum();
    if target <= current {
        return;
    }
    distribute(&mut values, target - current);
    for (col, v) in span.iter_mut().zip(values) {
        *field(col) = v;
    }
}

fn distribute(values: &mut [f32], extra: f32) {
    let sum: f32 = values.iter().sum();
    let n = values.len() as f32;
    for v in values.iter_mut() {
        *v += if sum > 0.0 { extra * *v / sum } else { extra / n };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::html::style::StyleContext;

    fn doc() -> Document {
        let config = Config {
            compress: false,
            ..Config::default()
        };
        let mut d = Document::new(&config);
        d.add_page(None).unwrap();
        d
    }

    fn cell(text: &str) -> TableCell {
        TableCell {
            content: vec![RunItem::Text {
                text: text.to_string(),
                style: StyleContext::new("helvetica", 11.0),
            }],
            ..TableCell::default()
        }
    }

    #[test]
    fn spans_mark_covered_slots() {
        let mut t = Table::new(5.0);
        t.start_row();
        let a = t.add_cell(TableCell {
            rowspan: 2,
            colspan: 2,
            ..cell("a")
        });
        let b = t.add_cell(cell("b"));
        t.end_row();
        t.start_row();
        let c = t.add_cell(cell("c"));
        t.end_row();

        assert_eq!(t.slot(0, 0), Some(Slot::Origin(a)));
        assert_eq!(t.slot(1, 1), Some(Slot::Covered(a)));
        assert_eq!(t.slot(0, 2), Some(Slot::Origin(b)));
        assert_eq!(t.slot(1, 2), Some(Slot::Origin(c)));
        assert_eq!((t.rows(), t.cols()), (2, 3));
    }

    #[test]
    fn width_bounds_hold() {
        let mut d = doc();
        let available = d.content_width();
        let long = "lorem ipsum dolor sit amet ".repeat(20);
        for declared in [None, Some(50.0), Some(1000.0)] {
            let mut t = Table::new(5.0);
            t.width = declared;
            t.start_row();
            t.add_cell(cell(&long));
            t.add_cell(cell("short"));
            t.end_row();
            t.start_row();
            t.add_cell(TableCell {
                colspan: 2,
                ..cell("a rather wide spanning cell")
            });
            t.layout(&mut d, available).unwrap();

            let sum_min: f32 = t.columns().iter().map(|c| c.min).sum();
            let sum_max: f32 = t.columns().iter().map(|c| c.max).sum();
            let total = t.total_width();
            assert!(sum_min <= total + 1e-3, "{declared:?}");
            assert!(total <= available.max(sum_max) + 1e-3, "{declared:?}");
            let summed: f32 = t.column_widths().iter().sum();
            assert!((summed - total).abs() < 1e-2);
        }
    }

    #[test]
    fn single_cell_shrinks_to_content() {
        let mut d = doc();
        let mut t = Table::new(5.0);
        t.add_cell(cell("Hi"));
        let width = d.content_width();
        t.layout(&mut d, width).unwrap();
        d.set_font("helvetica", crate::fonts::FontStyle::REGULAR, 11.0).unwrap();
        let expected = d.get_string_width("Hi") + 2.0 * d.cell_margin();
        assert!((t.total_width() - expected).abs() < 1e-4);
    }

    #[test]
    fn colspan_deficit_spreads_evenly_over_empty_columns() {
        let mut d = doc();
        let mut t = Table::new(5.0);
        t.add_cell(TableCell {
            colspan: 2,
            ..cell("spanning")
        });
        t.end_row();
        t.add_cell(TableCell::default());
        t.add_cell(TableCell::default());
        let width = d.content_width();
        t.layout(&mut d, width).unwrap();
        let cols = t.columns();
        assert!((cols[0].min - cols[1].min).abs() < 1e-4);
    }

    #[test]
    fn oversized_spans_are_bounded() {
        let mut t = Table::new(5.0);
        t.add_cell(TableCell {
            colspan: 3_000_000,
            rowspan: usize::MAX / 2,
            ..cell("huge")
        });
        t.end_row();
        assert_eq!(t.cols(), MAX_COLSPAN);
        assert_eq!(t.grid.len(), MAX_COLSPAN);
        assert_eq!(t.slot(1, 0), None);

        t.start_row();
        assert_eq!(t.slot(1, 0), Some(Slot::Covered(0)));
        assert_eq!(t.grid.len(), 2 * MAX_COLSPAN);
    }

    #[test]
    fn rowspan_height_is_distributed() {
        let mut d = doc();
        let mut t = Table::new(5.0);
        t.add_cell(TableCell {
            rowspan: 2,
            height: Some(40.0),
            ..cell("tall")
        });
        t.add_cell(cell("x"));
        t.end_row();
        t.add_cell(cell("y"));
        let width = d.content_width();
        t.layout(&mut d, width).unwrap();
        let heights = t.row_heights();
        assert!((heights[0] + heights[1] - 40.0).abs() < 1e-3);
    }
}
