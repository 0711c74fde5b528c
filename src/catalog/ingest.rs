//! Row sources: turn an uploaded file into header-keyed rows.
//!
//! Delimited text goes through encoding detection and a tab/comma
//! heuristic; workbooks are read straight from their first worksheet.

use crate::catalog::columns::RawRow;
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use encoding_rs::{Encoding, UTF_16LE, UTF_8, WINDOWS_1251};
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

/// Characters of decoded text echoed back when a file fails to parse.
pub const PREVIEW_CHARS: usize = 500;

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{message}")]
    Delimited {
        message: String,
        delimiter: char,
        preview: String,
        content_length: usize,
    },
    #[error("workbook could not be read: {0}")]
    Workbook(String),
    #[error("workbook has no worksheets")]
    NoWorksheet,
}

/// Rows read from a source, with the header row kept for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct SourceRows {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// Anything that can produce ordered header-to-value rows.
pub trait RowSource: Send {
    /// Short label for logs and error payloads (`"\t"`, `","`, `"workbook"`).
    fn describe(&self) -> String;

    fn read_rows(&self) -> Result<SourceRows, IngestError>;
}

/// Picks a source for the uploaded bytes.
///
/// Only a ZIP or OLE2 signature selects the workbook reader. Legacy
/// exports often carry an `.xls` name over tab-separated text, so an
/// extension alone does not.
pub fn source_for(filename: &str, bytes: Vec<u8>) -> Box<dyn RowSource> {
    if has_workbook_signature(&bytes) {
        return Box::new(WorkbookSource::new(bytes));
    }
    if has_workbook_extension(filename) {
        debug!(
            target = "catalog.parser",
            filename,
            "workbook extension without workbook signature, reading as text"
        );
    }
    Box::new(DelimitedSource::from_bytes(&bytes))
}

pub fn has_workbook_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC)
}

fn has_workbook_extension(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            WORKBOOK_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext.trim()))
        })
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    pub encoding: &'static str,
    pub lossy: bool,
}

/// Decodes file bytes, honouring a BOM, then trying UTF-8, Windows-1251
/// and UTF-16LE strictly, then falling back to lossy UTF-8.
pub fn decode_text(bytes: &[u8]) -> DecodedText {
    // Windows-1251 maps nearly every byte, so UTF-16LE is only reached
    // for input with unassigned 1251 bytes.
    decode_with(bytes, &[UTF_8, WINDOWS_1251, UTF_16LE])
}

fn decode_with(bytes: &[u8], candidates: &[&'static Encoding]) -> DecodedText {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes)
        && let Some(text) =
            encoding.decode_without_bom_handling_and_without_replacement(&bytes[bom_len..])
    {
        return DecodedText {
            text: text.into_owned(),
            encoding: encoding.name(),
            lossy: false,
        };
    }

    for encoding in candidates {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            return DecodedText {
                text: text.into_owned(),
                encoding: encoding.name(),
                lossy: false,
            };
        }
    }

    let (text, _) = UTF_8.decode_without_bom_handling(bytes);
    DecodedText {
        text: text.into_owned(),
        encoding: UTF_8.name(),
        lossy: true,
    }
}

/// Tab if the text contains one anywhere, comma otherwise.
pub fn detect_delimiter(text: &str) -> char {
    if text.contains('\t') { '\t' } else { ',' }
}

/// CSV or tab-separated text.
#[derive(Debug, Clone)]
pub struct DelimitedSource {
    text: String,
    delimiter: char,
}

impl DelimitedSource {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let decoded = decode_text(bytes);
        let source = Self::from_text(decoded.text);
        debug!(
            target = "catalog.parser",
            encoding = decoded.encoding,
            lossy = decoded.lossy,
            delimiter = ?source.delimiter(),
            "decoded delimited text"
        );
        source
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let delimiter = detect_delimiter(&text);
        Self { text, delimiter }
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    fn format_error(&self, err: csv::Error) -> IngestError {
        IngestError::Delimited {
            message: err.to_string(),
            delimiter: self.delimiter,
            preview: self.text.chars().take(PREVIEW_CHARS).collect(),
            content_length: self.text.chars().count(),
        }
    }
}

impl RowSource for DelimitedSource {
    fn describe(&self) -> String {
        self.delimiter.to_string()
    }

    fn read_rows(&self) -> Result<SourceRows, IngestError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter as u8)
            .has_headers(true)
            .flexible(true)
            .from_reader(self.text.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|err| self.format_error(err))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| self.format_error(err))?;
            rows.push(zip_row(&headers, record.iter()));
        }
        Ok(SourceRows { headers, rows })
    }
}

/// First worksheet of an Excel/OpenDocument workbook.
#[derive(Debug, Clone)]
pub struct WorkbookSource {
    bytes: Vec<u8>,
}

impl WorkbookSource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl RowSource for WorkbookSource {
    fn describe(&self) -> String {
        "workbook".to_string()
    }

    fn read_rows(&self) -> Result<SourceRows, IngestError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(self.bytes.clone()))
            .map_err(|err| IngestError::Workbook(err.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(IngestError::NoWorksheet)?
            .map_err(|err| IngestError::Workbook(err.to_string()))?;

        let mut lines = range.rows();
        let headers: Vec<String> = lines
            .next()
            .map(|cells| cells.iter().map(cell_text).collect())
            .unwrap_or_default();
        let rows = lines
            .map(|cells| {
                let values: Vec<String> = cells.iter().map(cell_text).collect();
                zip_row(&headers, values.iter().map(String::as_str))
            })
            .collect();
        Ok(SourceRows { headers, rows })
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(value) => value.clone(),
        Data::Float(value) => value.to_string(),
        Data::Int(value) => value.to_string(),
        Data::Bool(value) => value.to_string(),
        Data::DateTime(value) => value.as_f64().to_string(),
        Data::DateTimeIso(value) | Data::DurationIso(value) => value.clone(),
        _ => String::new(),
    }
}

/// Pairs header names with cells. Short rows get empty cells, surplus
/// cells are dropped, and a repeated header keeps its last value.
fn zip_row<'a>(headers: &[String], mut cells: impl Iterator<Item = &'a str>) -> RawRow {
    let mut row = RawRow::with_capacity(headers.len());
    for header in headers {
        let value = cells.next().unwrap_or("");
        row.insert(header.clone(), value.to_string());
    }
    row
}
