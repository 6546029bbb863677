use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::Path;

use csv::ReaderBuilder;
use encoding_rs::Encoding;
use log::{debug, info};

use crate::error::{ReportError, Result};

pub const DEFAULT_ENCODINGS: [&str; 4] = ["utf-8", "latin-1", "iso-8859-1", "cp1252"];

/// An in-memory delimited table. Every row has exactly `headers.len()` cells.
#[derive(Debug, Clone)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Label of the candidate encoding that decoded the source.
    pub encoding: String,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Table {
            headers,
            rows,
            encoding: "utf-8".to_string(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Resolves every name to its column index, or reports all the absent ones at once.
    pub fn require_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>> {
        let mut indices = Vec::with_capacity(names.len());
        let mut missing = Vec::new();

        for name in names {
            match self.column_index(name.as_ref()) {
                Some(idx) => indices.push(idx),
                None if !missing.iter().any(|m| m == name.as_ref()) => {
                    missing.push(name.as_ref().to_string())
                }
                None => {}
            }
        }

        if missing.is_empty() {
            Ok(indices)
        } else {
            Err(ReportError::missing_column(missing, &self.headers))
        }
    }
}

/// Resolves an encoding label, also accepting spellings such as `latin-1`
/// that the WHATWG label list only knows without separators.
pub fn resolve_encoding(label: &str) -> Option<&'static Encoding> {
    let label = label.trim();
    Encoding::for_label(label.as_bytes()).or_else(|| {
        let squashed: String = label.chars().filter(|c| *c != '-' && *c != '_').collect();
        Encoding::for_label(squashed.as_bytes())
    })
}

fn decode<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> Option<Cow<'a, str>> {
    let decoded = encoding.decode_without_bom_handling_and_without_replacement(bytes)?;
    match decoded {
        Cow::Borrowed(text) => Some(Cow::Borrowed(text.trim_start_matches('\u{feff}'))),
        Cow::Owned(text) => match text.strip_prefix('\u{feff}') {
            Some(stripped) => Some(Cow::Owned(stripped.to_string())),
            None => Some(Cow::Owned(text)),
        },
    }
}

pub fn parse_table(text: &str, delimiter: u8) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() > headers.len() {
            return Err(ReportError::RaggedRow {
                line: record.position().map_or(0, |p| p.line()),
                expected: headers.len(),
                found: record.len(),
            });
        }
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }

    Ok((headers, rows))
}

/// Loads a delimited file, trying each candidate encoding in order until one
/// decodes the whole byte stream without error.
pub fn load_table<S: AsRef<str>>(path: &Path, encodings: &[S], delimiter: u8) -> Result<Table> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ReportError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ReportError::Io(e),
    })?;

    for label in encodings {
        let label = label.as_ref();
        let encoding = resolve_encoding(label).ok_or_else(|| ReportError::UnknownEncoding(label.to_string()))?;

        let Some(text) = decode(&bytes, encoding) else {
            debug!("{} is not valid {}", path.display(), label);
            continue;
        };

        let (headers, rows) = parse_table(&text, delimiter)?;
        info!(
            "Successfully loaded {} with {} encoding ({} records)",
            path.display(),
            label,
            rows.len()
        );
        debug!("Columns available: {:?}", headers);

        return Ok(Table {
            headers,
            rows,
            encoding: label.to_string(),
        });
    }

    Err(ReportError::UnreadableEncoding {
        path: path.to_path_buf(),
        tried: encodings.iter().map(|e| e.as_ref().to_string()).collect(),
    })
}
