//! Field normalisation: whitespace and phone-number cleanup.
//!
//! Both functions are pure and idempotent, so they can be applied at any
//! stage (parse, synthesis, filename building) without double-processing
//! surprises.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

// ASCII digits only: `\d` would also keep Arabic-Indic and full-width digits.
static RE_NON_PHONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9+\-() ]").unwrap());

/// Trim and collapse every run of whitespace to a single space.
///
/// ```rust
/// use csv2qr::pipeline::normalize::normalize_text;
/// assert_eq!(normalize_text("  Kim \t Chul\n Soo "), "Kim Chul Soo");
/// ```
pub fn normalize_text(value: &str) -> String {
    RE_WHITESPACE.replace_all(value.trim(), " ").into_owned()
}

/// [`normalize_text`] for an optional value; absent input yields `""`.
pub fn normalize_opt(value: Option<&str>) -> String {
    value.map(normalize_text).unwrap_or_default()
}

/// Normalise, then keep only digits, `+`, `-`, `(`, `)` and space.
pub fn normalize_phone(value: &str) -> String {
    let text = normalize_text(value);
    let stripped = RE_NON_PHONE.replace_all(&text, "");
    // Stripping can expose edge or doubled spaces ("010 . 1234" → "010  1234").
    normalize_text(&stripped)
}
