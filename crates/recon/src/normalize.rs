//! Value normalizers: phone numbers, currency amounts, dates.
//!
//! Every function here is total. A value that cannot be normalized comes back
//! as `None` (or `0` for amounts) and never as an error.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::table::Cell;

// ---------------------------------------------------------------------------
// Phone
// ---------------------------------------------------------------------------

/// Locale rules for domestic mobile numbers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PhoneLocale {
    /// International calling code without `+`, e.g. `"82"`.
    #[serde(default = "default_country_code")]
    pub country_code: String,
    /// Digit that follows the domestic leading zero on mobile numbers.
    #[serde(default = "default_mobile_digit")]
    pub mobile_digit: char,
}

fn default_country_code() -> String {
    "82".into()
}

fn default_mobile_digit() -> char {
    '1'
}

impl Default for PhoneLocale {
    fn default() -> Self {
        Self {
            country_code: default_country_code(),
            mobile_digit: default_mobile_digit(),
        }
    }
}

/// Canonical mobile number: `0` + mobile digit + 8 or 9 digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NormalizedPhone(String);

impl NormalizedPhone {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NormalizedPhone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonicalize a raw phone-like string, or `None` when it is not a mobile number.
pub fn normalize_phone(raw: &str, locale: &PhoneLocale) -> Option<NormalizedPhone> {
    let mut digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    if !locale.country_code.is_empty() && digits.starts_with(&locale.country_code) {
        digits = format!("0{}", &digits[locale.country_code.len()..]);
    }

    // Spreadsheets drop the leading zero of numeric cells.
    if digits.len() == 10 && digits.starts_with(locale.mobile_digit) {
        digits.insert(0, '0');
    }

    // Several numbers glued into one cell: keep the trailing 11.
    if digits.len() > 11 {
        digits = digits[digits.len() - 11..].to_string();
    }

    is_canonical(&digits, locale).then(|| NormalizedPhone(digits))
}

/// Normalize a cell of either type; numeric cells go through their display form.
pub fn phone_of(cell: &Cell, locale: &PhoneLocale) -> Option<NormalizedPhone> {
    match cell {
        Cell::Empty => None,
        Cell::Text(s) => normalize_phone(s, locale),
        Cell::Number(n) if n.is_finite() && *n >= 0.0 => normalize_phone(&cell.display(), locale),
        Cell::Number(_) => None,
    }
}

fn is_canonical(digits: &str, locale: &PhoneLocale) -> bool {
    let bytes = digits.as_bytes();
    (bytes.len() == 10 || bytes.len() == 11)
        && bytes[0] == b'0'
        && bytes[1] as char == locale.mobile_digit
        && bytes.iter().all(u8::is_ascii_digit)
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// Canonicalize a currency-like string to a non-negative integer.
///
/// Currency symbols, separators and whitespace are stripped; the fractional
/// part truncates. Negative, empty, or unparseable input yields `0`.
pub fn normalize_amount(raw: &str) -> u64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    match cleaned.parse::<f64>() {
        Ok(n) => clamp_amount(n),
        Err(_) => 0,
    }
}

pub fn amount_of(cell: &Cell) -> u64 {
    match cell {
        Cell::Empty => 0,
        Cell::Text(s) => normalize_amount(s),
        Cell::Number(n) => clamp_amount(*n),
    }
}

fn clamp_amount(n: f64) -> u64 {
    if !n.is_finite() || n <= 0.0 {
        return 0;
    }
    // `as` saturates at u64::MAX and truncates toward zero.
    n.trunc() as u64
}

// ---------------------------------------------------------------------------
// Date
// ---------------------------------------------------------------------------

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d", "%Y%m%d"];

/// Largest serial a spreadsheet can hold (9999-12-31).
const MAX_SERIAL: f64 = 2_958_465.0;

/// Parse a payment date from text or from a 1900-system spreadsheet serial.
pub fn date_of(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Empty => None,
        Cell::Number(n) => date_from_serial(*n),
        Cell::Text(s) => parse_date(s),
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let mut tokens = raw.split_whitespace();
    let mut date_part = tokens.next()?.split('T').next()?.to_string();

    // "2024. 3. 5. 오후 2:10" style exports put spaces after the dots.
    while date_part.ends_with('.') {
        match tokens.next() {
            Some(t) if t.chars().all(|c| c.is_ascii_digit() || c == '.') => date_part.push_str(t),
            _ => break,
        }
    }

    let date_part = date_part.trim_end_matches('.');
    if date_part.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

fn date_from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_SERIAL {
        return None;
    }
    // Epoch 1899-12-30 absorbs the 1900 leap-year bug for serials after Feb 1900.
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}
