//! Broker file loader with encoding and delimiter auto-detection.
//!
//! Decodes a delimited export (or a JSON table produced from a spreadsheet)
//! into a [`Table`]. Values are kept as text; interpretation is left to the
//! repair engine.

use serde::Serialize;
use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::models::{Cell, Table};

/// Result of parsing with metadata
#[derive(Debug, Clone, Serialize)]
pub struct ParseResult {
    pub table: Table,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to a string using the given encoding.
///
/// Unknown encodings fall back to lossy UTF-8. A leading byte order mark is
/// dropped.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };
    match decoded.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => decoded,
    }
}

/// Detect the delimiter by counting occurrences in the header line.
///
/// Broker exports are predominantly semicolon separated, so `;` wins ties
/// and is the default.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ';';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse delimited text into a table.
///
/// The first record is the header. Header names are trimmed; data fields are
/// kept verbatim, with whitespace-only fields read as absent. Records may be
/// ragged; every row is padded to the widest record with absent cells.
pub fn parse_str(content: &str, delimiter: char) -> CsvResult<Table> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record.map_err(parse_error)?,
        None => return Err(CsvError::EmptyFile),
    };
    let headers: Vec<String> = header.iter().map(|s| s.trim().to_string()).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::NoHeaders);
    }

    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(parse_error)?;
        rows.push(record.iter().map(Cell::text).collect());
    }

    let mut table = Table::new(headers, rows);
    table.pad_rows();
    Ok(table)
}

fn parse_error(err: csv::Error) -> CsvError {
    let line = err.position().map_or(0, |p| p.line() as usize);
    CsvError::ParseError {
        line,
        message: err.to_string(),
    }
}

/// Parse a JSON table: `{"headers": [...], "rows": [[...], ...]}`.
///
/// Cells are strings, numbers or `null`, so values decoded by a spreadsheet
/// loader keep their numeric type.
pub fn parse_json_table(content: &str) -> CsvResult<Table> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }
    let mut table: Table = serde_json::from_str(content)?;
    if table.headers.is_empty() {
        return Err(CsvError::NoHeaders);
    }
    table.pad_rows();
    Ok(table)
}

/// Parse delimited bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    // Detect encoding
    let encoding = detect_encoding(bytes);

    // Decode content
    let content = decode_content(bytes, &encoding);

    // Detect delimiter
    let delimiter = detect_delimiter(&content);

    Ok(ParseResult {
        table: parse_str(&content, delimiter)?,
        encoding,
        delimiter,
    })
}

/// Parse a file, choosing the format by extension.
///
/// `.json` files are read as JSON tables; everything else as delimited text.
///
/// # Example
/// ```ignore
/// let result = parse_file_auto("exports/dhl_2024_03.csv")?;
/// println!("Encoding: {}, Delimiter: '{}'", result.encoding, result.delimiter);
/// println!("Rows: {}", result.table.rows.len());
/// ```
pub fn parse_file_auto<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        let content = decode_content(&bytes, "utf-8");
        return Ok(ParseResult {
            table: parse_json_table(&content)?,
            encoding: "utf-8".to_string(),
            delimiter: ',',
        });
    }

    parse_bytes_auto(&bytes)
}
