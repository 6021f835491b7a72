//! Candidate payload ladder for one record.
//!
//! Payloads are ordered richest-first, cheapest-last:
//!
//! 1. full vCard
//! 2. minimal vCard (skipped when identical to the full one)
//! 3. `tel:` link
//! 4. one `mailto:` link per email
//! 5. the bare name
//!
//! Each step is shorter and uses a simpler character set than the one
//! before it, so the fallback controller can walk the list until something
//! encodes.

use crate::config::GenerationConfig;
use crate::pipeline::fields::{lookup, resolve, ContactFields, LogicalField, DIAL_SYNONYMS};
use crate::pipeline::normalize::{normalize_opt, normalize_phone};
use crate::pipeline::parse::FieldMapping;
use crate::pipeline::vcard::{render, CardTier, OrganizationContext};
use std::collections::HashSet;

/// Build the ranked, de-duplicated candidate payloads for one record.
///
/// ```rust
/// use csv2qr::pipeline::parse::FieldMapping;
/// use csv2qr::pipeline::payload::build_payloads;
/// use csv2qr::OrganizationContext;
///
/// let row: FieldMapping = [("이름", "김철수"), ("휴대폰", "010-1234-5678")]
///     .into_iter()
///     .collect();
/// let payloads = build_payloads(&row, &OrganizationContext::default());
/// assert!(payloads.contains(&"tel:010-1234-5678".to_string()));
/// assert_eq!(payloads.last().map(String::as_str), Some("김철수"));
/// ```
pub fn build_payloads(row: &FieldMapping, org: &OrganizationContext) -> Vec<String> {
    let contact = ContactFields::resolve(row);
    let dial = lookup(row, DIAL_SYNONYMS)
        .map(normalize_phone)
        .unwrap_or_default();

    let full = render(&contact, org, CardTier::Full);
    let minimal = render(&contact, org, CardTier::Minimal);

    let mut payloads = Vec::with_capacity(4 + contact.emails.len());
    payloads.push(full.clone());
    if minimal != full {
        payloads.push(minimal);
    }
    if !dial.is_empty() {
        payloads.push(format!("tel:{dial}"));
    }
    for email in &contact.emails {
        payloads.push(format!("mailto:{email}"));
    }
    payloads.push(contact.name);

    dedup_preserving_order(payloads)
}

/// Everything the fallback controller needs to know about one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPlan {
    /// 0-based position in the input.
    pub index: usize,
    /// Normalised name, or `{unnamed_prefix}{index + 1}` for nameless rows.
    pub display_name: String,
    pub display_position: String,
    /// Ranked candidates, richest first.
    pub payloads: Vec<String>,
}

impl RecordPlan {
    pub fn new(index: usize, row: &FieldMapping, config: &GenerationConfig) -> Self {
        let name = normalize_opt(resolve(row, LogicalField::Name));
        let display_name = if name.is_empty() {
            format!("{}{}", config.unnamed_prefix, index + 1)
        } else {
            name
        };
        let display_position = resolve(row, LogicalField::Position)
            .map(|p| p.trim().to_string())
            .unwrap_or_default();

        Self {
            index,
            display_name,
            display_position,
            payloads: build_payloads(row, &config.organization),
        }
    }
}

/// Drop empty strings and exact duplicates, keeping first occurrences in order.
pub fn dedup_preserving_order(payloads: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(payloads.len());
    payloads
        .into_iter()
        .filter(|p| !p.is_empty())
        .filter(|p| seen.insert(p.clone()))
        .collect()
}
