//! Logical-field resolution over a static synonym table.
//!
//! Contact sheets arrive with Korean or English headers in inconsistent
//! case. Each logical field lists its accepted header spellings in priority
//! order; the first synonym holding a non-empty value wins.

use crate::pipeline::normalize::{normalize_opt, normalize_phone, normalize_text};
use crate::pipeline::parse::FieldMapping;
use serde::Serialize;

/// A contact attribute independent of how the CSV header spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LogicalField {
    Name,
    Position,
    Phone,
    Mobile,
    Email,
    Department,
}

impl LogicalField {
    /// Accepted header names, highest priority first.
    pub fn synonyms(self) -> &'static [&'static str] {
        match self {
            LogicalField::Name => &["이름", "name", "Name"],
            LogicalField::Position => &["직책", "position", "Position", "직위"],
            LogicalField::Phone => &["전화번호", "phone", "Phone", "핸드폰"],
            LogicalField::Mobile => &["휴대폰", "mobile", "Mobile"],
            LogicalField::Email => &["이메일", "email", "Email"],
            LogicalField::Department => &["부서", "department", "Department"],
        }
    }
}

/// Header list the `tel:` fallback payload dials from: mobile spellings
/// first, then the two primary phone spellings.
pub const DIAL_SYNONYMS: &[&str] = &["휴대폰", "mobile", "Mobile", "전화번호", "phone"];

/// First non-empty value among `synonyms`, raw (not normalised).
pub fn lookup<'a>(row: &'a FieldMapping, synonyms: &[&str]) -> Option<&'a str> {
    synonyms
        .iter()
        .find_map(|key| row.get(key).and_then(|v| v.first()))
}

/// Raw value of a scalar logical field.
pub fn resolve<'a>(row: &'a FieldMapping, field: LogicalField) -> Option<&'a str> {
    lookup(row, field.synonyms())
}

/// Ordered values of the first email synonym that holds any.
pub fn resolve_emails(row: &FieldMapping) -> Vec<&str> {
    LogicalField::Email
        .synonyms()
        .iter()
        .filter_map(|key| row.get(key))
        .map(|v| v.values())
        .find(|values| !values.is_empty())
        .unwrap_or_default()
}

/// Every logical field of one row, normalised and ready for rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContactFields {
    pub name: String,
    /// Trimmed only: titles like "CEO" or "VP, Sales" keep their case and punctuation.
    pub position: String,
    pub phone: String,
    /// Falls back to `phone` when no mobile column is filled.
    pub mobile: String,
    pub emails: Vec<String>,
    pub department: String,
}

impl ContactFields {
    pub fn resolve(row: &FieldMapping) -> Self {
        let phone_raw = resolve(row, LogicalField::Phone);
        let mobile_raw = resolve(row, LogicalField::Mobile).or(phone_raw);

        Self {
            name: normalize_opt(resolve(row, LogicalField::Name)),
            position: resolve(row, LogicalField::Position)
                .map(|p| p.trim().to_string())
                .unwrap_or_default(),
            phone: phone_raw.map(normalize_phone).unwrap_or_default(),
            mobile: mobile_raw.map(normalize_phone).unwrap_or_default(),
            emails: resolve_emails(row)
                .into_iter()
                .map(normalize_text)
                .filter(|e| !e.is_empty())
                .collect(),
            department: normalize_opt(resolve(row, LogicalField::Department)),
        }
    }

    /// True when no logical field carries a value.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.position.is_empty()
            && self.phone.is_empty()
            && self.mobile.is_empty()
            && self.emails.is_empty()
            && self.department.is_empty()
    }
}
