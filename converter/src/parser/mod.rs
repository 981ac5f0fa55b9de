//! Record reader: delimited text to flat records.
//!
//! Handles encoding and delimiter detection, multi-row headers and a
//! configurable first data row. No department-specific logic here.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::models::{Fields, Record};

/// Delimiter candidates for auto-detection, in tie-break order.
const DELIMITER_CANDIDATES: [char; 4] = [';', ',', '\t', '|'];

/// Reader settings of a department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvSettings {
    /// Single character, a name (`tab`, `pipe`, `semicolon`, `comma`) or `auto`.
    pub delimiter: String,
    /// Number of leading rows merged into the header.
    pub header_rows: usize,
    /// 1-based physical line of the first data row, blank lines included;
    /// 0 means right after the header.
    pub data_start_row: usize,
    /// Encoding label, or `auto` to detect.
    pub encoding: String,
    pub quote_char: char,
}

impl Default for CsvSettings {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
            header_rows: 1,
            data_start_row: 0,
            encoding: "utf-8".to_string(),
            quote_char: '"',
        }
    }
}

impl CsvSettings {
    /// Explicit delimiter, or `None` for auto-detection.
    pub fn delimiter_char(&self) -> CsvResult<Option<char>> {
        let delimiter = match self.delimiter.trim().to_lowercase().as_str() {
            "auto" => return Ok(None),
            "tab" | "\\t" | "\t" => '\t',
            "pipe" | "|" => '|',
            "semicolon" | ";" => ';',
            "comma" | "," | "" => ',',
            _ => {
                let mut chars = self.delimiter.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii() => c,
                    _ => {
                        return Err(CsvError::InvalidSettings(format!(
                            "delimiter '{}' is not a single ASCII character",
                            self.delimiter
                        )))
                    }
                }
            }
        };
        Ok(Some(delimiter))
    }

    /// Physical line of the first data row, `None` when data follows the header.
    fn data_start_line(&self) -> CsvResult<Option<usize>> {
        if self.data_start_row == 0 {
            return Ok(None);
        }
        if self.data_start_row <= self.header_rows {
            return Err(CsvError::InvalidSettings(format!(
                "data_start_row {} must come after {} header row(s)",
                self.data_start_row, self.header_rows
            )));
        }
        Ok(Some(self.data_start_row))
    }
}

/// Records of one input file with reader metadata.
#[derive(Debug, Clone)]
pub struct RecordSet {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
    /// Encoding used to decode the input
    pub encoding: String,
    /// Delimiter used to split the input
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let (charset, _, _) = chardet::detect(bytes);

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding.
///
/// UTF-8 input with invalid sequences is decoded lossily. A leading byte
/// order mark is removed.
pub fn decode_content(bytes: &[u8], encoding: &str) -> CsvResult<String> {
    let label = encoding.trim().to_lowercase();
    let decoded = match label.as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        "latin1" | "latin-1" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        other => {
            let codec = encoding_rs::Encoding::for_label(other.as_bytes()).ok_or_else(|| {
                CsvError::EncodingError {
                    encoding: encoding.to_string(),
                    message: "unknown encoding label".to_string(),
                }
            })?;
            codec.decode(bytes).0.into_owned()
        }
    };

    Ok(match decoded.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => decoded,
    })
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best = ',';
    let mut best_count = 0;
    for candidate in DELIMITER_CANDIDATES {
        let count = first_line.matches(candidate).count();
        if count > best_count {
            best_count = count;
            best = candidate;
        }
    }
    best
}

/// Read and parse a file.
pub fn read_file(path: impl AsRef<Path>, settings: &CsvSettings) -> CsvResult<RecordSet> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes(&bytes, settings)
}

/// Parse raw bytes: decode per settings, then parse.
pub fn parse_bytes(bytes: &[u8], settings: &CsvSettings) -> CsvResult<RecordSet> {
    let encoding = if settings.encoding.trim().eq_ignore_ascii_case("auto") {
        detect_encoding(bytes)
    } else {
        settings.encoding.clone()
    };
    let content = decode_content(bytes, &encoding)?;
    parse_str(&content, settings, encoding)
}

/// Parse decoded text.
pub fn parse_str(content: &str, settings: &CsvSettings, encoding: String) -> CsvResult<RecordSet> {
    if settings.header_rows == 0 {
        return Err(CsvError::InvalidSettings("header_rows must be at least 1".to_string()));
    }
    if !settings.quote_char.is_ascii() {
        return Err(CsvError::InvalidSettings(format!(
            "quote character '{}' is not ASCII",
            settings.quote_char
        )));
    }
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let delimiter = settings.delimiter_char()?.unwrap_or_else(|| detect_delimiter(content));
    let start_line = settings.data_start_line()?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter as u8)
        .quote(settings.quote_char as u8)
        .from_reader(content.as_bytes());

    // Blank lines are dropped by the reader; rows keep their physical line.
    let mut rows: Vec<(usize, Vec<String>)> = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.map_err(|e| CsvError::ParseError {
            line: e.position().map(|p| p.line() as usize).unwrap_or(index + 1),
            message: e.to_string(),
        })?;
        let line = row.position().map(|p| p.line() as usize).unwrap_or(index + 1);
        rows.push((line, row.iter().map(str::to_string).collect()));
    }

    if rows.len() < settings.header_rows {
        return Err(CsvError::NoHeaders);
    }

    let header_rows: Vec<Vec<String>> = rows[..settings.header_rows].iter().map(|(_, r)| r.clone()).collect();
    let headers = merge_headers(&header_rows);
    if headers.is_empty() {
        return Err(CsvError::NoHeaders);
    }

    let records = rows
        .iter()
        .skip(settings.header_rows)
        .filter(|(line, row)| start_line.map_or(true, |start| *line >= start) && !is_row_empty(row))
        .map(|(line, row)| Record::new(*line, to_fields(&headers, row)))
        .collect();

    Ok(RecordSet {
        headers,
        records,
        encoding,
        delimiter,
    })
}

/// Merge header rows column by column, joining non-empty parts with a space.
fn merge_headers(header_rows: &[Vec<String>]) -> Vec<String> {
    let width = header_rows.iter().map(Vec::len).max().unwrap_or(0);

    (0..width)
        .map(|column| {
            let merged = header_rows
                .iter()
                .filter_map(|row| row.get(column))
                .map(|part| part.trim())
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ");

            if merged.is_empty() {
                format!("Column_{}", column + 1)
            } else {
                merged
            }
        })
        .collect()
}

fn is_row_empty(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

fn to_fields(headers: &[String], row: &[String]) -> Fields {
    headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            let value = row.get(i).map(|v| v.trim()).unwrap_or("");
            (header.clone(), value.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str, settings: &CsvSettings) -> RecordSet {
        parse_str(content, settings, "utf-8".to_string()).unwrap()
    }

    #[test]
    fn test_simple_csv() {
        let set = parse("name,age\nAlice,30\nBob,25", &CsvSettings::default());

        assert_eq!(set.headers, vec!["name", "age"]);
        assert_eq!(set.records.len(), 2);
        assert_eq!(set.records[0].fields["name"], "Alice");
        assert_eq!(set.records[0].row_number, 2);
        assert_eq!(set.records[1].fields["age"], "25");
        assert_eq!(set.records[1].row_number, 3);
    }

    #[test]
    fn test_quoted_values_with_delimiter() {
        let set = parse("name,memo\n\"Smith, J\",\"said \"\"hi\"\"\"", &CsvSettings::default());
        assert_eq!(set.records[0].fields["name"], "Smith, J");
        assert_eq!(set.records[0].fields["memo"], "said \"hi\"");
    }

    #[test]
    fn test_empty_lines_skipped_and_values_trimmed() {
        let set = parse("a,b\n 1 , 2 \n,\n\n3,4\n", &CsvSettings::default());
        assert_eq!(set.records.len(), 2);
        assert_eq!(set.records[0].fields["a"], "1");
        assert_eq!(set.records[1].row_number, 5);
    }

    #[test]
    fn test_short_and_long_rows() {
        let set = parse("a,b,c\n1\n1,2,3,4", &CsvSettings::default());
        assert_eq!(set.records[0].fields["b"], "");
        assert_eq!(set.records[0].fields["c"], "");
        assert_eq!(set.records[1].fields.len(), 3);
    }

    #[test]
    fn test_multi_row_header_merge() {
        let settings = CsvSettings { header_rows: 2, ..Default::default() };
        let set = parse("Transaction,,Policy,\nNumber,Amount,Number,\n1,2,3,4", &settings);
        assert_eq!(set.headers, vec!["Transaction Number", "Amount", "Policy Number", "Column_4"]);
        assert_eq!(set.records[0].fields["Policy Number"], "3");
        assert_eq!(set.records[0].row_number, 3);
    }

    #[test]
    fn test_data_start_row() {
        let settings = CsvSettings { data_start_row: 4, ..Default::default() };
        let set = parse("a\nskip\nskip\n1\n2", &settings);
        let values: Vec<&str> = set.records.iter().map(|r| r.fields["a"].as_str()).collect();
        assert_eq!(values, vec!["1", "2"]);

        let set = parse("a\n\nskip\n1\n2", &settings);
        let values: Vec<&str> = set.records.iter().map(|r| r.fields["a"].as_str()).collect();
        assert_eq!(values, vec!["1", "2"]);
        assert_eq!(set.records[0].row_number, 4);

        let bad = CsvSettings { data_start_row: 1, ..Default::default() };
        assert!(matches!(parse_str("a\n1", &bad, "utf-8".into()), Err(CsvError::InvalidSettings(_))));
    }

    #[test]
    fn test_named_and_auto_delimiters() {
        let pipe = CsvSettings { delimiter: "pipe".into(), ..Default::default() };
        assert_eq!(parse("a|b\n1|2", &pipe).records[0].fields["b"], "2");

        let auto = CsvSettings { delimiter: "auto".into(), ..Default::default() };
        let set = parse("a;b;c\n1;2;3", &auto);
        assert_eq!(set.delimiter, ';');
        assert_eq!(set.records[0].fields["c"], "3");

        let bad = CsvSettings { delimiter: "::".into(), ..Default::default() };
        assert!(bad.delimiter_char().is_err());
    }

    #[test]
    fn test_custom_quote_char() {
        let settings = CsvSettings { quote_char: '\'', ..Default::default() };
        let set = parse("a,b\n'x, y',z", &settings);
        assert_eq!(set.records[0].fields["a"], "x, y");
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(parse_str("", &CsvSettings::default(), "utf-8".into()), Err(CsvError::EmptyFile)));
        assert!(matches!(parse_str(" \n", &CsvSettings::default(), "utf-8".into()), Err(CsvError::EmptyFile)));
    }

    #[test]
    fn test_header_only() {
        let set = parse("a,b\n", &CsvSettings::default());
        assert!(set.records.is_empty());
        assert_eq!(set.headers.len(), 2);
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_bom_is_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"id,name\n1,x");
        let set = parse_bytes(&bytes, &CsvSettings::default()).unwrap();
        assert_eq!(set.headers[0], "id");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        assert_eq!(decode_content(bytes, "iso-8859-1").unwrap(), "Société");
        assert!(decode_content(bytes, "klingon-7").is_err());
    }

    #[test]
    fn test_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.csv");
        std::fs::write(&path, "Check,Amount\n1001,10.00\n").unwrap();

        let set = read_file(&path, &CsvSettings::default()).unwrap();
        assert_eq!(set.records[0].fields["Amount"], "10.00");
        assert!(matches!(read_file(dir.path().join("missing.csv"), &CsvSettings::default()), Err(CsvError::IoError(_))));
    }
}
