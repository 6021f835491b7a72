//! Record parsing: raw CSV text → ordered [`FieldMapping`]s.
//!
//! The dialect is deliberately small: `\n` separates rows, `,` separates
//! fields, and a `"` toggles a quoted section in which commas are literal.
//! There is no escaped-quote (`""`) handling; the quote characters are simply
//! dropped. This matches what spreadsheet "Save as CSV" produces for contact
//! lists, where quotes appear only around addresses containing commas.
//!
//! Contact exports often repeat a header (two `email` columns). Repeated
//! headers collapse into a single [`FieldValue::Multiple`] so downstream code
//! sees one logical field with an ordered list of values.

use crate::error::QrCardError;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use tracing::{debug, info};

/// A cell value: one string, or the ordered values of a repeated header.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Single(String),
    Multiple(Vec<String>),
}

impl FieldValue {
    /// The first non-empty string held by this value, if any.
    pub fn first(&self) -> Option<&str> {
        match self {
            FieldValue::Single(s) if !s.is_empty() => Some(s),
            FieldValue::Single(_) => None,
            FieldValue::Multiple(v) => v.iter().map(String::as_str).find(|s| !s.is_empty()),
        }
    }

    /// All non-empty strings, a scalar counting as a one-element sequence.
    pub fn values(&self) -> Vec<&str> {
        match self {
            FieldValue::Single(s) if !s.is_empty() => vec![s.as_str()],
            FieldValue::Single(_) => Vec::new(),
            FieldValue::Multiple(v) => v
                .iter()
                .map(String::as_str)
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first().is_none()
    }
}

/// One CSV row keyed by header name, in header order.
///
/// Lookups are exact; synonym handling lives in
/// [`crate::pipeline::fields`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    entries: Vec<(String, FieldValue)>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a header by exact name.
    pub fn get(&self, header: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v)
    }

    /// Insert a raw cell value, merging repeated headers into a sequence.
    ///
    /// The first occurrence is stored as-is. The second turns the stored
    /// value into a sequence (keeping it only if non-empty) and appends the
    /// new value when non-empty; later occurrences append non-empty values.
    pub fn insert(&mut self, header: &str, value: String) {
        match self.entries.iter_mut().find(|(h, _)| h == header) {
            None => self.entries.push((header.to_string(), FieldValue::Single(value))),
            Some((_, slot)) => match slot {
                FieldValue::Multiple(values) => {
                    if !value.is_empty() {
                        values.push(value);
                    }
                }
                FieldValue::Single(existing) => {
                    let mut values = Vec::with_capacity(2);
                    if !existing.is_empty() {
                        values.push(std::mem::take(existing));
                    }
                    if !value.is_empty() {
                        values.push(value);
                    }
                    *slot = FieldValue::Multiple(values);
                }
            },
        }
    }

    /// Header names in column order (repeated headers appear once).
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(h, _)| h.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(h, v)| (h.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the mapping has no entries or every value is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|(_, v)| v.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut mapping = FieldMapping::new();
        for (k, v) in iter {
            mapping.insert(&k.into(), v.into());
        }
        mapping
    }
}

impl Serialize for FieldMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (header, value) in &self.entries {
            map.serialize_entry(header, value)?;
        }
        map.end()
    }
}

/// The parsed CSV: trimmed headers plus one mapping per non-blank data line.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub records: Vec<FieldMapping>,
}

/// Parse CSV text into records.
///
/// # Errors
/// - [`QrCardError::NoData`] when fewer than two non-blank lines exist
///   (a header alone is not enough).
/// - [`QrCardError::NoRecords`] when every data row is empty. A row of empty
///   cells among populated ones keeps its slot.
pub fn parse_records(text: &str) -> Result<ParsedTable, QrCardError> {
    let lines: Vec<&str> = text.split('\n').filter(|l| !l.trim().is_empty()).collect();
    if lines.len() < 2 {
        return Err(QrCardError::NoData { lines: lines.len() });
    }

    let headers: Vec<String> = split_line(lines[0])
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();
    debug!("CSV headers: {:?}", headers);

    let records: Vec<FieldMapping> = lines[1..]
        .iter()
        .map(|line| {
            let values = split_line(line);
            let mut row = FieldMapping::new();
            for (i, header) in headers.iter().enumerate() {
                let value = values.get(i).map(|v| v.trim()).unwrap_or("");
                row.insert(header, value.to_string());
            }
            row
        })
        .collect();

    if records.iter().all(FieldMapping::is_empty) {
        return Err(QrCardError::NoRecords);
    }

    let empty = records.iter().filter(|r| r.is_empty()).count();
    if empty > 0 {
        debug!("{} data rows have no values", empty);
    }
    info!("Parsed {} records", records.len());

    Ok(ParsedTable { headers, records })
}

/// Split one line on commas that are outside double quotes.
///
/// Quote characters toggle the quoted state and are not kept. Always returns
/// at least one (possibly empty) field.
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}
