use std::collections::HashMap;
use std::path::Path;
use anyhow::{Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use serde::{Deserialize, Serialize};
use log::*;

/// One data row, keyed by header name.
pub type Record = HashMap<String, String>;

/// The parsed contents of one uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dataset {
    pub file_name: String,
    pub size_bytes: u64,
    pub headers: Vec<String>,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Returns the header row and the records of `content`.
///
/// Lines that are blank after trimming are skipped and the first remaining
/// line is the header row. Fields follow RFC 4180 quoting (a quoted comma is
/// kept, `""` is a literal quote) and are trimmed. Short rows are padded with
/// empty values, extra trailing fields are ignored.
pub fn parse_csv_with_headers(content: &str) -> (Vec<String>, Vec<Record>) {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let kept: Vec<&str> = content.lines().filter(|line| !line.trim().is_empty()).collect();
    if kept.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let text = kept.join("\n");

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut rows = reader.records().filter_map(|row| match row {
        Ok(row) => Some(row),
        Err(e) => {
            warn!("Skipping unreadable CSV row: {}", e);
            None
        }
    });

    let headers: Vec<String> = match rows.next() {
        Some(row) => row.iter().map(str::to_string).collect(),
        None => return (Vec::new(), Vec::new()),
    };

    let records = rows
        .map(|row| {
            headers
                .iter()
                .enumerate()
                .map(|(i, header)| (header.clone(), row.get(i).unwrap_or_default().to_string()))
                .collect::<Record>()
        })
        .collect();

    (headers, records)
}

pub fn parse_csv(content: &str) -> Vec<Record> {
    parse_csv_with_headers(content).1
}

/// Builds a dataset from the raw bytes of an uploaded file.
pub fn parse_dataset(file_name: &str, bytes: &[u8]) -> Dataset {
    let text = decode_text(bytes);
    let (headers, records) = parse_csv_with_headers(&text);

    if records.is_empty() {
        warn!("{}: no data rows found", file_name);
    } else {
        debug!("{}: {} rows, {} columns", file_name, records.len(), headers.len());
    }

    Dataset {
        file_name: file_name.to_string(),
        size_bytes: bytes.len() as u64,
        headers,
        records,
    }
}

/// Reads a CSV file from disk. I/O failures are errors; unparseable content
/// degrades to an empty dataset.
pub async fn read_dataset_file(path: &Path) -> Result<Dataset> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| anyhow!("Failed to read dataset file {}: {}", path.display(), e))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(parse_dataset(&file_name, &bytes))
}

/// Spreadsheet exports are often UTF-16 with a BOM; anything without a BOM
/// is read as UTF-8, replacing invalid sequences.
fn decode_text(bytes: &[u8]) -> String {
    let (encoding, bom_len) = Encoding::for_bom(bytes).unwrap_or((UTF_8, 0));
    let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
    if had_errors {
        warn!("Input is not valid {}, invalid sequences were replaced", encoding.name());
    }
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_comma_is_kept_in_value() {
        let records = parse_csv("sku,rating\nA1,5\nA2,\"4, good\"");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["sku"], "A1");
        assert_eq!(records[0]["rating"], "5");
        assert_eq!(records[1]["rating"], "4, good");
    }

    #[test]
    fn doubled_quote_becomes_literal_quote() {
        let records = parse_csv("x,quote,y\n1,\"she said \"\"hi\"\", then left\",2");
        assert_eq!(records[0]["quote"], r#"she said "hi", then left"#);
        assert_eq!(records[0]["y"], "2");
    }

    #[test]
    fn quoted_values_are_trimmed() {
        let records = parse_csv("sku , note\n A9 ,\"  padded, text  \"");
        assert_eq!(records[0]["sku"], "A9");
        assert_eq!(records[0]["note"], "padded, text");
    }

    #[test]
    fn every_header_gets_a_value() {
        let records = parse_csv("a,b,c\n1,2,3\n4\n5,6");
        assert_eq!(records.len(), 3);
        for record in &records {
            assert_eq!(record.len(), 3);
        }
        assert_eq!(records[1]["b"], "");
        assert_eq!(records[1]["c"], "");
        assert_eq!(records[2]["b"], "6");
    }

    #[test]
    fn extra_fields_are_ignored() {
        let records = parse_csv("a,b\n1,2,3,4");
        assert_eq!(records[0].len(), 2);
        assert_eq!(records[0]["b"], "2");
    }

    #[test]
    fn blank_lines_and_whitespace_are_dropped() {
        let (headers, records) = parse_csv_with_headers("\r\n  \n name , price \r\n\n  Widget ,  9.99 \r\n   \n");
        assert_eq!(headers, vec!["name", "price"]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["name"], "Widget");
        assert_eq!(records[0]["price"], "9.99");
    }

    #[test]
    fn empty_input_gives_empty_dataset() {
        assert!(parse_csv("").is_empty());
        assert!(parse_csv("\n   \n\t\n").is_empty());
        let dataset = parse_dataset("empty.csv", b"   \n");
        assert!(dataset.is_empty());
        assert!(dataset.headers.is_empty());
    }

    #[test]
    fn header_only_has_no_records() {
        let (headers, records) = parse_csv_with_headers("sku,title\n");
        assert_eq!(headers.len(), 2);
        assert!(records.is_empty());
    }

    #[test]
    fn utf8_bom_is_not_part_of_first_header() {
        let dataset = parse_dataset("bom.csv", b"\xEF\xBB\xBFsku,price\nA1,3");
        assert_eq!(dataset.headers[0], "sku");
        assert_eq!(dataset.records[0]["sku"], "A1");
        assert_eq!(dataset.size_bytes, 17);
    }

    #[test]
    fn utf16le_export_is_decoded() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "sku,rating\nB7,4".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let dataset = parse_dataset("export.csv", &bytes);
        assert_eq!(dataset.records.len(), 1);
        assert_eq!(dataset.records[0]["rating"], "4");
    }

    #[tokio::test]
    async fn reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reviews.csv");
        std::fs::write(&path, "sku,stars,review\nA1,5,\"Great, loud\"\n").unwrap();

        let dataset = read_dataset_file(&path).await.unwrap();
        assert_eq!(dataset.file_name, "reviews.csv");
        assert_eq!(dataset.records[0]["review"], "Great, loud");

        assert!(read_dataset_file(&dir.path().join("missing.csv")).await.is_err());
    }
}
