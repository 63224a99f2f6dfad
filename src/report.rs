//! PDF summary report.
//!
//! Layout on A4: title, row/column counts, the free-text summary, then the
//! numeric statistics as a grid whose header row repeats on every page.
//! Text uses the PDF builtin Helvetica faces, so widths are estimated.

use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Rect, Rgb,
    path::PaintMode,
};
use thiserror::Error;

use crate::config::ExplorerConfig;
use crate::data::model::Table;
use crate::stats::{describe, Include, StatsGrid};

/// Column names listed in the default summary before it is cut short.
const SUMMARY_COLUMNS: usize = 10;

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN: f32 = 20.0;
const PT_TO_MM: f32 = 0.352_778;
/// Average Helvetica glyph width as a fraction of the font size.
const GLYPH_WIDTH: f32 = 0.5;

const TITLE_PT: f32 = 18.0;
const HEADING_PT: f32 = 13.0;
const BODY_PT: f32 = 10.0;
const CELL_PT: f32 = 8.0;
const LINE_MM: f32 = 5.0;
const ROW_MM: f32 = 7.0;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("PDF rendering failed: {0}")]
    Pdf(String),
}

/// Parts of the report that can be left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSection {
    Statistics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Omission {
    pub section: ReportSection,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub bytes: Vec<u8>,
    pub pages: usize,
    pub omitted: Vec<Omission>,
}

/// The editable summary offered before the report is generated.
pub fn default_summary(file_name: &str, table: &Table) -> String {
    let names = table.column_names();
    let mut listed = names
        .iter()
        .take(SUMMARY_COLUMNS)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if names.len() > SUMMARY_COLUMNS {
        listed.push_str("...");
    }
    format!(
        "This report summarizes the dataset {file_name}.\n\
         \n\
         - Total rows: {}\n\
         - Total columns: {}\n\
         - Columns: {listed}\n\
         \n\
         Key insights:\n\
         - Add your observations about outliers, trends, and patterns.\n\
         - Mention any business-related insights from charts.\n",
        table.n_rows(),
        table.n_cols(),
    )
}

pub fn render_report(
    table: &Table,
    summary_text: &str,
    config: &ExplorerConfig,
) -> Result<Report, ReportError> {
    let cfg = &config.report;
    let mut w = PageWriter::new(&cfg.title)?;
    let mut omitted = Vec::new();

    w.centered(&cfg.title, TITLE_PT, true);
    w.gap(4.0);
    w.line(
        &format!("Rows: {}    Columns: {}", table.n_rows(), table.n_cols()),
        BODY_PT,
        false,
    );
    w.gap(4.0);

    w.heading("Summary:");
    for paragraph in summary_text.lines() {
        if paragraph.trim().is_empty() {
            w.gap(LINE_MM);
            continue;
        }
        for line in wrap(paragraph, w.chars_per_line(BODY_PT)) {
            w.line(&line, BODY_PT, false);
        }
    }
    w.gap(4.0);

    match describe(table, Include::Numeric) {
        Ok(description) => {
            let grid = description.round(cfg.decimals).numeric_grid(cfg.stats_rows);
            w.heading("Descriptive Statistics:");
            w.grid(&grid);
        }
        Err(e) => {
            log::warn!("report statistics omitted: {e}");
            omitted.push(Omission {
                section: ReportSection::Statistics,
                reason: e.to_string(),
            });
        }
    }

    let pages = w.pages;
    let bytes = w
        .doc
        .save_to_bytes()
        .map_err(|e| ReportError::Pdf(e.to_string()))?;
    log::info!("rendered report: {pages} page(s), {} bytes", bytes.len());
    Ok(Report {
        bytes,
        pages,
        omitted,
    })
}

/// Greedy word wrap to at most `width` characters per line; longer words
/// are split.
pub(crate) fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let needed = if current.is_empty() { word.len() } else { current.chars().count() + 1 + word.len() };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn text_width(text: &str, pt: f32) -> f32 {
    text.chars().count() as f32 * pt * GLYPH_WIDTH * PT_TO_MM
}

fn fit(text: &str, pt: f32, width: f32) -> String {
    let max = (width / (pt * GLYPH_WIDTH * PT_TO_MM)).floor().max(1.0) as usize;
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max.saturating_sub(1)).chain(['.']).collect()
    }
}

fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::Rgb(Rgb::new(
        f32::from(r) / 255.0,
        f32::from(g) / 255.0,
        f32::from(b) / 255.0,
        None,
    ))
}

struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    /// Baseline cursor, millimetres from the bottom edge.
    y: f32,
    pages: usize,
}

impl PageWriter {
    fn new(title: &str) -> Result<Self, ReportError> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ReportError::Pdf(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ReportError::Pdf(e.to_string()))?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(PageWriter {
            doc,
            layer,
            regular,
            bold,
            y: PAGE_H - MARGIN,
            pages: 1,
        })
    }

    fn new_page(&mut self) {
        self.pages += 1;
        let (page, layer) =
            self.doc
                .add_page(Mm(PAGE_W), Mm(PAGE_H), format!("Page {}", self.pages));
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_H - MARGIN;
    }

    /// Start a new page unless `height` more millimetres fit.
    fn reserve(&mut self, height: f32) -> bool {
        if self.y - height < MARGIN {
            self.new_page();
            true
        } else {
            false
        }
    }

    fn font(&self, bold: bool) -> &IndirectFontRef {
        if bold {
            &self.bold
        } else {
            &self.regular
        }
    }

    fn chars_per_line(&self, pt: f32) -> usize {
        ((PAGE_W - 2.0 * MARGIN) / (pt * GLYPH_WIDTH * PT_TO_MM)) as usize
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }

    fn line(&mut self, text: &str, pt: f32, bold: bool) {
        let height = (pt * PT_TO_MM * 1.4).max(LINE_MM);
        self.reserve(height);
        self.y -= height;
        self.layer.set_fill_color(rgb(0, 0, 0));
        self.layer
            .use_text(text, pt, Mm(MARGIN), Mm(self.y), self.font(bold));
    }

    fn centered(&mut self, text: &str, pt: f32, bold: bool) {
        let height = pt * PT_TO_MM * 1.4;
        self.reserve(height);
        self.y -= height;
        let x = ((PAGE_W - text_width(text, pt)) / 2.0).max(MARGIN);
        self.layer.set_fill_color(rgb(0, 0, 0));
        self.layer.use_text(text, pt, Mm(x), Mm(self.y), self.font(bold));
    }

    fn heading(&mut self, text: &str) {
        // keep a heading together with at least two lines below it
        self.reserve(HEADING_PT * PT_TO_MM * 1.4 + 2.0 * ROW_MM);
        self.line(text, HEADING_PT, true);
        self.gap(2.0);
    }

    fn row(&mut self, cells: &[String], widths: f32, header: bool) {
        let top = self.y;
        let bottom = top - ROW_MM;
        let right = MARGIN + widths * cells.len() as f32;

        if header {
            self.layer.set_fill_color(rgb(0x22, 0x22, 0x22));
            self.layer.add_rect(
                Rect::new(Mm(MARGIN), Mm(bottom), Mm(right), Mm(top)).with_mode(PaintMode::Fill),
            );
        }

        self.layer.set_outline_color(rgb(128, 128, 128));
        self.layer.set_outline_thickness(0.5);
        let segment = |x1: f32, y1: f32, x2: f32, y2: f32| Line {
            points: vec![
                (Point::new(Mm(x1), Mm(y1)), false),
                (Point::new(Mm(x2), Mm(y2)), false),
            ],
            is_closed: false,
        };
        self.layer.add_line(segment(MARGIN, top, right, top));
        self.layer.add_line(segment(MARGIN, bottom, right, bottom));
        for i in 0..=cells.len() {
            let x = MARGIN + widths * i as f32;
            self.layer.add_line(segment(x, bottom, x, top));
        }

        let (color, font) = if header {
            (rgb(255, 255, 255), self.bold.clone())
        } else {
            (rgb(0, 0, 0), self.regular.clone())
        };
        self.layer.set_fill_color(color);
        let baseline = bottom + (ROW_MM - CELL_PT * PT_TO_MM) / 2.0 + 0.5;
        for (i, cell) in cells.iter().enumerate() {
            let text = fit(cell, CELL_PT, widths - 2.0);
            let center = MARGIN + widths * (i as f32 + 0.5);
            let x = center - text_width(&text, CELL_PT) / 2.0;
            self.layer.use_text(text, CELL_PT, Mm(x), Mm(baseline), &font);
        }
        self.y = bottom;
    }

    fn grid(&mut self, grid: &StatsGrid) {
        let columns = grid.header.len().max(1);
        let widths = (PAGE_W - 2.0 * MARGIN) / columns as f32;
        self.reserve(2.0 * ROW_MM);
        self.row(&grid.header, widths, true);
        for cells in &grid.rows {
            if self.reserve(ROW_MM) {
                self.row(&grid.header, widths, true);
            }
            self.row(cells, widths, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{CellValue, Column};

    fn table() -> Table {
        Table::new(vec![
            Column::new("units", (1..=6).map(CellValue::Integer).collect()),
            Column::new("price", (1..=6).map(|i| CellValue::Float(i as f64 * 1.25)).collect()),
            Column::new("region", vec![CellValue::Text("north".into()); 6]),
        ])
    }

    #[test]
    fn renders_a_pdf_with_statistics() {
        let t = table();
        let report = render_report(&t, &default_summary("sales.csv", &t), &ExplorerConfig::default())
            .unwrap();
        assert!(report.bytes.starts_with(b"%PDF"));
        assert_eq!(report.pages, 1);
        assert!(report.omitted.is_empty());
    }

    #[test]
    fn statistics_are_omitted_without_numeric_columns() {
        let t = Table::new(vec![Column::new("name", vec![CellValue::Text("a".into())])]);
        let report = render_report(&t, "notes", &ExplorerConfig::default()).unwrap();
        assert!(report.bytes.starts_with(b"%PDF"));
        assert_eq!(report.omitted.len(), 1);
        assert_eq!(report.omitted[0].section, ReportSection::Statistics);
    }

    #[test]
    fn long_summaries_continue_on_new_pages() {
        let text = "A line of commentary about the data.\n".repeat(120);
        let report = render_report(&table(), &text, &ExplorerConfig::default()).unwrap();
        assert!(report.pages >= 2);
    }

    #[test]
    fn default_summary_lists_at_most_ten_columns() {
        let columns = (0..12)
            .map(|i| Column::new(format!("c{i}"), vec![CellValue::Integer(i)]))
            .collect();
        let s = default_summary("wide.xlsx", &Table::new(columns));
        assert!(s.starts_with("This report summarizes the dataset wide.xlsx."));
        assert!(s.contains("- Total columns: 12"));
        assert!(s.contains("- Columns: c0, c1, c2, c3, c4, c5, c6, c7, c8, c9..."));
        assert!(!s.contains("c10"));
    }

    #[test]
    fn wrap_breaks_on_words_and_splits_long_ones() {
        assert_eq!(wrap("alpha beta gamma", 10), vec!["alpha beta", "gamma"]);
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap("", 5), vec![""]);
    }

    #[test]
    fn cells_are_cut_to_the_column_width() {
        let s = fit("a-very-long-column-name", CELL_PT, 10.0);
        assert!(s.ends_with('.'));
        assert!(text_width(&s, CELL_PT) <= 10.0);
        assert_eq!(fit("ok", CELL_PT, 10.0), "ok");
    }
}
