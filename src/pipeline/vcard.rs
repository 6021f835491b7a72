//! vCard 3.0 rendering in two richness tiers.
//!
//! The layout follows what common phone scanners import reliably:
//!
//! ```text
//! BEGIN:VCARD
//! VERSION:3.0
//! N:양승대
//! ORG:남양인터내셔날
//! TEL:01081905377
//! URL:http://www.namyang-intl.com
//! EMAIL:hello@example.com
//! ADR:서울 성동구 뚝섬로1길 63\, 701호
//! END:VCARD
//! ```
//!
//! Only `N` is emitted (no `FN`), lines are joined with a bare `\n`, and
//! `TITLE` goes last. The minimal tier drops everything organisational so
//! that the symbol stays small enough to encode when the full card does not.

use crate::pipeline::fields::ContactFields;
use crate::pipeline::normalize::normalize_text;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const HEADER: [&str; 2] = ["BEGIN:VCARD", "VERSION:3.0"];
const TERMINATOR: &str = "END:VCARD";

static RE_URL_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^https?://").unwrap());

/// Organisation details shared by every card in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationContext {
    pub name: String,
    pub address: String,
    pub website: String,
}

impl OrganizationContext {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        website: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            website: website.into(),
        }
    }
}

/// Which fields a rendering includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardTier {
    /// Name, organisation, phones, website, emails, address, title.
    Full,
    /// Name, emails, mobile phone only.
    Minimal,
}

/// Render one contact as a vCard of the given tier.
pub fn render(contact: &ContactFields, org: &OrganizationContext, tier: CardTier) -> String {
    match tier {
        CardTier::Full => render_full(contact, org),
        CardTier::Minimal => render_minimal(contact),
    }
}

/// Full card: every field we know, in scanner-friendly order.
pub fn render_full(contact: &ContactFields, org: &OrganizationContext) -> String {
    let org_name = normalize_text(&org.name);
    let address = normalize_text(&org.address);
    let website = normalize_text(&org.website);

    let mut lines: Vec<String> = HEADER.iter().map(|s| s.to_string()).collect();

    if !contact.name.is_empty() {
        lines.push(format!("N:{}", contact.name));
    }
    if !org_name.is_empty() {
        lines.push(format!("ORG:{org_name}"));
    }
    if !contact.mobile.is_empty() {
        lines.push(format!("TEL:{}", contact.mobile));
    }
    if !contact.phone.is_empty() && contact.phone != contact.mobile {
        lines.push(format!("TEL:{}", contact.phone));
    }
    if !website.is_empty() {
        lines.push(format!("URL:{}", with_default_scheme(&website)));
    }
    for email in contact.emails.iter().filter(|e| !e.is_empty()) {
        lines.push(format!("EMAIL:{email}"));
    }
    if !address.is_empty() {
        lines.push(format!("ADR:{}", escape_value(&address)));
    }
    if !contact.position.is_empty() {
        lines.push(format!("TITLE:{}", contact.position));
    }

    lines.push(TERMINATOR.to_string());
    lines.join("\n")
}

/// Minimal card: name, emails, mobile. Organisation data is never included.
pub fn render_minimal(contact: &ContactFields) -> String {
    let mut lines: Vec<String> = HEADER.iter().map(|s| s.to_string()).collect();

    if !contact.name.is_empty() {
        lines.push(format!("N:{}", contact.name));
    }
    for email in contact.emails.iter().filter(|e| !e.is_empty()) {
        lines.push(format!("EMAIL:{email}"));
    }
    if !contact.mobile.is_empty() {
        lines.push(format!("TEL:{}", contact.mobile));
    }

    lines.push(TERMINATOR.to_string());
    lines.join("\n")
}

/// Prefix `http://` unless the URL already carries an http(s) scheme.
pub fn with_default_scheme(url: &str) -> String {
    if RE_URL_SCHEME.is_match(url) {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}

/// Backslash-escape `,` and `;` as vCard 3.0 text values require.
pub fn escape_value(value: &str) -> String {
    value.replace(',', "\\,").replace(';', "\\;")
}
