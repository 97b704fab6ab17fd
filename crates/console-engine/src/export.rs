//! CSV and PDF export
//!
//! Both formats are produced from one [`ExportTable`], the header and body
//! arrays built from a view's column descriptors and its rows in display
//! order. CSV and PDF output of one invocation are therefore row-for-row
//! identical.

use crate::error::{ConsoleError, Result};
use crate::table::{Column, export_columns};
use console_core::config::ExportConfig;
use console_core::utils::to_latin1_lossy;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A4 landscape, in points
const PAGE_WIDTH: i64 = 842;
const PAGE_HEIGHT: i64 = 595;
const MARGIN: i64 = 40;
const TITLE_FONT_SIZE: i64 = 14;

/// Output file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Comma separated values
    Csv,
    /// Landscape PDF table
    Pdf,
}

impl ExportFormat {
    /// File extension without the dot
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Pdf => "pdf",
        }
    }

    /// MIME type of the artifact
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv;charset=utf-8",
            Self::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Which rows an export covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportScope {
    /// Rows currently displayed, in displayed order
    #[default]
    VisiblePage,
    /// Every page of the current filter, search and sort
    FullFilteredSet,
}

/// Header and body cells shared by every output format
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportTable {
    /// Column headers, in order
    pub headers: Vec<String>,
    /// One entry per row, one cell per header
    pub body: Vec<Vec<String>>,
}

impl ExportTable {
    /// Apply the export-scoped `columns` to `rows`, keeping row order
    pub fn build<T>(rows: &[&T], columns: &[Column<T>]) -> Self {
        let columns = export_columns(columns);
        Self {
            headers: columns.iter().map(|c| c.header().to_string()).collect(),
            body: rows
                .iter()
                .map(|row| columns.iter().map(|c| c.value(row).to_string()).collect())
                .collect(),
        }
    }

    /// Number of body rows
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Whether the body is empty
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

fn csv_records<'a>(
    style: QuoteStyle,
    records: impl IntoIterator<Item = &'a Vec<String>>,
) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .quote_style(style)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for record in records {
        writer
            .write_record(record)
            .map_err(|e| ConsoleError::export(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| ConsoleError::export(e.to_string()))
}

/// Render `table` as CSV
///
/// The header row is written as plain text. Every body field is quoted
/// with embedded quotes doubled. Records are separated by `\n` with no
/// terminator after the last one.
///
/// # Errors
///
/// Returns an export error if the writer fails.
pub fn to_csv(table: &ExportTable) -> Result<String> {
    let mut bytes = csv_records(QuoteStyle::Necessary, [&table.headers])?;
    bytes.extend(csv_records(QuoteStyle::Always, &table.body)?);
    let mut text = String::from_utf8(bytes).map_err(|e| ConsoleError::export(e.to_string()))?;
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

/// PDF page geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfLayout {
    /// Body font size in points
    pub font_size: u32,
    /// Body rows per page, header excluded
    pub rows_per_page: usize,
}

impl Default for PdfLayout {
    fn default() -> Self {
        Self::from(&ExportConfig::default())
    }
}

impl From<&ExportConfig> for PdfLayout {
    fn from(config: &ExportConfig) -> Self {
        Self {
            font_size: config.pdf_font_size,
            rows_per_page: config.pdf_rows_per_page,
        }
    }
}

fn text_ops(ops: &mut Vec<Operation>, size: i64, x: i64, y: i64, text: &str) {
    let latin1: Vec<u8> = to_latin1_lossy(text)
        .chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect();
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec!["F1".into(), size.into()]));
    ops.push(Operation::new("Td", vec![x.into(), y.into()]));
    ops.push(Operation::new("Tj", vec![Object::string_literal(latin1)]));
    ops.push(Operation::new("ET", vec![]));
}

fn fit(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

fn page_content(table: &ExportTable, rows: &[Vec<String>], title: &str, layout: PdfLayout) -> Vec<Operation> {
    let font = i64::from(layout.font_size.max(4));
    let line = font + 4;
    let columns = i64::try_from(table.headers.len().max(1)).unwrap_or(1);
    let column_width = (PAGE_WIDTH - 2 * MARGIN) / columns;
    // Helvetica averages a little over half an em per glyph.
    let max_chars = usize::try_from(column_width * 2 / font).unwrap_or(8).max(4);

    let mut ops = Vec::new();
    let mut y = PAGE_HEIGHT - MARGIN;
    text_ops(&mut ops, TITLE_FONT_SIZE, MARGIN, y, title);
    y -= TITLE_FONT_SIZE + 10;

    let mut x = MARGIN;
    for header in &table.headers {
        text_ops(&mut ops, font, x, y, &fit(header, max_chars));
        x += column_width;
    }
    let rule = y - 4;
    ops.push(Operation::new("m", vec![MARGIN.into(), rule.into()]));
    ops.push(Operation::new("l", vec![(PAGE_WIDTH - MARGIN).into(), rule.into()]));
    ops.push(Operation::new("S", vec![]));
    y -= line + 2;

    for row in rows {
        let mut x = MARGIN;
        for cell in row {
            text_ops(&mut ops, font, x, y, &fit(cell, max_chars));
            x += column_width;
        }
        y -= line;
    }
    ops
}

/// Render `table` as a landscape PDF with a title band
///
/// Rows are split across pages of `layout.rows_per_page`; every page
/// repeats the title and header row. An empty table still yields one page.
///
/// # Errors
///
/// Returns an export error if the document cannot be encoded.
pub fn to_pdf(table: &ExportTable, title: &str, layout: PdfLayout) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let chunks: Vec<&[Vec<String>]> = if table.body.is_empty() {
        vec![&[]]
    } else {
        table.body.chunks(layout.rows_per_page.max(1)).collect()
    };

    let mut kids: Vec<ObjectId> = Vec::with_capacity(chunks.len());
    for rows in chunks {
        let content = Content {
            operations: page_content(table, rows, title, layout),
        };
        let encoded = content
            .encode()
            .map_err(|e| ConsoleError::export(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        kids.push(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        }));
    }

    let count = i64::try_from(kids.len()).unwrap_or(i64::MAX);
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids.into_iter().map(Object::from).collect::<Vec<_>>(),
        "Count" => Object::Integer(count),
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(PAGE_WIDTH),
            Object::Integer(PAGE_HEIGHT),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| ConsoleError::export(e.to_string()))?;
    debug!(pages = count, rows = table.len(), "Rendered PDF");
    Ok(bytes)
}

/// Finished export file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    /// File name, e.g. `users.csv`
    pub filename: String,
    /// MIME type
    pub content_type: &'static str,
    /// File content
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    /// Render `table` in `format`
    ///
    /// # Errors
    ///
    /// Returns an export error if rendering fails.
    pub fn render(
        format: ExportFormat,
        table: &ExportTable,
        stem: &str,
        title: &str,
        layout: PdfLayout,
    ) -> Result<Self> {
        let bytes = match format {
            ExportFormat::Csv => to_csv(table)?.into_bytes(),
            ExportFormat::Pdf => to_pdf(table, title, layout)?,
        };
        Ok(Self {
            filename: format!("{stem}.{}", format.extension()),
            content_type: format.content_type(),
            bytes,
        })
    }

    /// Write the file into `dir`, creating the directory if needed
    ///
    /// # Errors
    ///
    /// Returns a storage error if the directory or file cannot be written.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir).map_err(|e| ConsoleError::storage(dir, e.to_string()))?;
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.bytes).map_err(|e| ConsoleError::storage(&path, e.to_string()))?;
        info!(path = %path.display(), bytes = self.bytes.len(), "Export written");
        Ok(path)
    }
}

/// Build the table for `rows` and render it in one step
///
/// # Errors
///
/// Returns an export error if rendering fails.
pub fn export_rows<T>(
    format: ExportFormat,
    rows: &[&T],
    columns: &[Column<T>],
    stem: &str,
    title: &str,
    layout: PdfLayout,
) -> Result<ExportArtifact> {
    let table = ExportTable::build(rows, columns);
    info!(%format, rows = table.len(), stem, "Exporting");
    ExportArtifact::render(format, &table, stem, title, layout)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    struct Payment {
        name: String,
        amount: u64,
    }

    fn columns() -> Vec<Column<Payment>> {
        vec![
            Column::new("name", "Student Name", |p: &Payment| p.name.clone()),
            Column::new("amount", "Amount", |p: &Payment| console_core::utils::format_inr(p.amount))
                .display_only(),
            Column::new("amount_raw", "Amount", |p: &Payment| p.amount).export_only(),
        ]
    }

    fn table(names: &[&str]) -> ExportTable {
        let rows: Vec<Payment> = names
            .iter()
            .enumerate()
            .map(|(i, name)| Payment {
                name: (*name).to_string(),
                amount: 499 * (i as u64 + 1),
            })
            .collect();
        let refs: Vec<&Payment> = rows.iter().collect();
        ExportTable::build(&refs, &columns())
    }

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack.windows(needle.len()).filter(|w| *w == needle).count()
    }

    #[test]
    fn test_csv_quotes_every_body_field() {
        let csv = to_csv(&table(&["Aarav Shah", "Meera, Iyer"])).unwrap();
        assert_eq!(
            csv,
            "Student Name,Amount\n\"Aarav Shah\",\"499\"\n\"Meera, Iyer\",\"998\""
        );
    }

    #[test]
    fn test_csv_escapes_quotes_and_newlines() {
        let csv = to_csv(&table(&["He said \"hi\", then left\n"])).unwrap();
        assert_eq!(
            csv,
            "Student Name,Amount\n\"He said \"\"hi\"\", then left\n\",\"499\""
        );
    }

    #[test]
    fn test_csv_header_only_when_empty() {
        assert_eq!(to_csv(&table(&[])).unwrap(), "Student Name,Amount");
    }

    #[test]
    fn test_pdf_repeats_header_per_page() {
        let names: Vec<String> = (0..60).map(|i| format!("Student {i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let layout = PdfLayout {
            font_size: 9,
            rows_per_page: 28,
        };

        let bytes = to_pdf(&table(&refs), "Transactions", layout).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        assert_eq!(Document::load_mem(&bytes).unwrap().get_pages().len(), 3);
        assert_eq!(count(&bytes, b"(Student Name)"), 3);
        assert_eq!(count(&bytes, b"(Transactions)"), 3);
        assert_eq!(count(&bytes, b"(Student 59)"), 1);
    }

    #[test]
    fn test_pdf_empty_table_has_one_page() {
        let bytes = to_pdf(&table(&[]), "Users", PdfLayout::default()).unwrap();
        assert_eq!(Document::load_mem(&bytes).unwrap().get_pages().len(), 1);
    }

    #[test]
    fn test_pdf_text_is_latin1() {
        let text = ExportTable {
            headers: vec!["Amount".into()],
            body: vec![vec!["₹1,499".into()]],
        };
        let bytes = to_pdf(&text, "Revenue — monthly", PdfLayout::default()).unwrap();
        assert_eq!(count(&bytes, b"(Rs.1,499)"), 1);
        assert_eq!(count(&bytes, b"(Revenue - monthly)"), 1);
    }

    #[test]
    fn test_artifact_write_to() {
        let dir = tempfile::tempdir().unwrap();
        let artifact =
            ExportArtifact::render(ExportFormat::Csv, &table(&["A"]), "transactions", "Transactions", PdfLayout::default())
                .unwrap();

        assert_eq!(artifact.filename, "transactions.csv");
        assert_eq!(artifact.content_type, "text/csv;charset=utf-8");
        let path = artifact.write_to(&dir.path().join("out")).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), artifact.bytes);
    }

    proptest! {
        #[test]
        fn prop_csv_round_trip(cells in proptest::collection::vec("[a-z\",\n ]{0,12}", 1..8)) {
            let rows: Vec<Vec<String>> = cells.iter().map(|c| vec![c.clone(), "x".to_string()]).collect();
            let table = ExportTable {
                headers: vec!["Name".into(), "Flag".into()],
                body: rows.clone(),
            };
            let csv = to_csv(&table).unwrap();

            let mut reader = csv::ReaderBuilder::new().from_reader(csv.as_bytes());
            let parsed: Vec<Vec<String>> = reader
                .records()
                .map(|r| r.unwrap().iter().map(str::to_string).collect())
                .collect();
            prop_assert_eq!(parsed, rows);
        }
    }
}
