//! Delimited file parsing with encoding and delimiter auto-detection.
//!
//! Each data row becomes a JSON object keyed by header, the shape the
//! delimited reader expects under `objects["DELIMITED"]`.

use serde_json::{Map, Value};
use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::models::{EntityType, ProcessingContext};

/// Parsed rows plus what was detected.
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub records: Vec<Value>,
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes; unknown encodings fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Most frequent separator on the header line.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best = (',', 0);
    for sep in [',', ';', '\t', '|'] {
        let count = first_line.matches(sep).count();
        if count > best.1 {
            best = (sep, count);
        }
    }
    best.0
}

/// Parse delimited text with an explicit delimiter.
pub fn parse_delimited(content: &str, delimiter: char) -> CsvResult<(Vec<String>, Vec<Value>)> {
    if content.trim().is_empty() {
        return Err(CsvError::new(1, "Empty file"));
    }
    let delimiter = u8::try_from(delimiter)
        .map_err(|_| CsvError::new(0, format!("Delimiter '{}' is not a single byte", delimiter)))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CsvError::new(1, format!("Cannot read header: {}", e)))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.iter().all(String::is_empty) {
        return Err(CsvError::new(1, "No headers found"));
    }

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let line = index + 2;
        let row = row.map_err(|e| CsvError::new(line, e.to_string()))?;
        if row.iter().all(str::is_empty) {
            continue;
        }
        if row.len() > headers.len() && row.iter().skip(headers.len()).any(|v| !v.is_empty()) {
            return Err(CsvError::new(line, format!("{} values for {} columns", row.len(), headers.len()))
                .with_value(row.iter().skip(headers.len()).collect::<Vec<_>>().join(",")));
        }

        let mut obj = Map::new();
        for (i, header) in headers.iter().enumerate() {
            obj.insert(header.clone(), Value::String(row.get(i).unwrap_or("").to_string()));
        }
        records.push(Value::Object(obj));
    }

    Ok((headers, records))
}

/// Parse bytes, detecting encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    let (headers, records) = parse_delimited(&content, delimiter)?;

    Ok(ParseResult {
        records,
        encoding,
        delimiter,
        headers,
    })
}

/// Parse a file, detecting encoding and delimiter.
pub fn parse_file_auto(path: impl AsRef<Path>) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())
        .map_err(|e| CsvError::new(0, format!("Cannot read file: {}", e)))?;
    parse_bytes_auto(&bytes)
}

/// One context per row, each seeded from `template` with the row stored as
/// the delimited record.
pub fn rows_to_contexts(records: &[Value], template: &ProcessingContext) -> Vec<ProcessingContext> {
    records
        .iter()
        .map(|row| {
            let mut ctx = template.clone();
            ctx.id = uuid::Uuid::new_v4().to_string();
            ctx.put_object(EntityType::Delimited, row.to_string());
            ctx
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semicolon_file() {
        let (headers, rows) = parse_delimited("title;barcode\nSemantic web;39001\nRust;39002", ';').unwrap();
        assert_eq!(headers, vec!["title", "barcode"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["barcode"], "39002");
    }

    #[test]
    fn test_quoted_values_with_delimiter() {
        let (_, rows) = parse_delimited("title,note\n\"Web, semantic\",\"a \"\"quoted\"\" note\"", ',').unwrap();
        assert_eq!(rows[0]["title"], "Web, semantic");
        assert_eq!(rows[0]["note"], "a \"quoted\" note");
    }

    #[test]
    fn test_short_rows_and_blank_lines() {
        let (_, rows) = parse_delimited("a;b;c\n1;;3\n\n4\n", ';').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["b"], "");
        assert_eq!(rows[1]["c"], "");
    }

    #[test]
    fn test_too_many_values_is_an_error() {
        let err = parse_delimited("a;b\n1;2;3", ';').unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_empty_file() {
        let err = parse_delimited("", ';').unwrap_err();
        assert!(err.message.contains("Empty"));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
    }

    #[test]
    fn test_auto_parse_latin1() {
        // "titre;lieu\nSociété;Annexe" in ISO-8859-1
        let mut bytes = b"titre;lieu\nSoci".to_vec();
        bytes.extend_from_slice(&[0xE9, b't', 0xE9]);
        bytes.extend_from_slice(b";Annexe");
        let result = parse_bytes_auto(&bytes).unwrap();
        assert_eq!(result.delimiter, ';');
        assert_eq!(result.records[0]["lieu"], "Annexe");
        assert!(result.records[0]["titre"].as_str().unwrap().starts_with("Soci"));
    }

    #[test]
    fn test_rows_to_contexts() {
        let (_, rows) = parse_delimited("barcode\n1\n2", ',').unwrap();
        let template = ProcessingContext::new("DI_DELIMITED_ROW");
        let contexts = rows_to_contexts(&rows, &template);
        assert_eq!(contexts.len(), 2);
        assert_ne!(contexts[0].id, contexts[1].id);
        assert_eq!(contexts[1].object(EntityType::Delimited), Some(r#"{"barcode":"2"}"#));
    }
}
