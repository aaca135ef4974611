//! Column locator: find the column that holds a semantic field.
//!
//! Strategies run in rank order: header-name match (sanity-checked against the
//! body), content scoring, then an explicit fixed index.

use serde::{Deserialize, Serialize};

use crate::normalize::{amount_of, date_of, phone_of, PhoneLocale};
use crate::table::{cell, Cell, Row, Table};

// ---------------------------------------------------------------------------
// Field kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Phone,
    Amount,
    Status,
    Name,
    Email,
    Source,
    Date,
    JoinDate,
}

impl FieldKind {
    pub const ALL: [FieldKind; 8] = [
        Self::Phone,
        Self::Amount,
        Self::Status,
        Self::Name,
        Self::Email,
        Self::Source,
        Self::Date,
        Self::JoinDate,
    ];

    /// Built-in header synonyms, most specific first.
    pub fn default_synonyms(self) -> &'static [&'static str] {
        match self {
            Self::Phone => &[
                "전화번호", "연락처", "휴대폰", "휴대전화", "핸드폰",
                "phone number", "mobile", "phone", "contact", "tel",
            ],
            Self::Amount => &[
                "최종결제금액", "최종금액", "최종 금액", "결제금액", "결제 금액", "금액",
                "amount", "price", "total",
            ],
            Self::Status => &["결제상태", "상태", "status"],
            Self::Name => &["이름", "성함", "신청자", "구매자", "name"],
            Self::Email => &["이메일", "email", "e-mail"],
            Self::Source => &[
                "유입경로", "유입 경로", "유입매체", "매체",
                "utm_source", "source", "channel", "medium",
            ],
            Self::Date => &["결제일시", "결제일", "주문일시", "날짜", "paid at", "date"],
            Self::JoinDate => &["가입일시", "가입일", "signup date", "joined", "created at"],
        }
    }

    /// Whether body cells can confirm or reject a column for this kind.
    pub fn has_content_evidence(self) -> bool {
        matches!(self, Self::Phone | Self::Amount | Self::Date)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Phone => "phone",
            Self::Amount => "amount",
            Self::Status => "status",
            Self::Name => "name",
            Self::Email => "email",
            Self::Source => "source",
            Self::Date => "date",
            Self::JoinDate => "join_date",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FieldKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown field '{s}' (expected one of: {})", names.join(", "))
            })
    }
}

// ---------------------------------------------------------------------------
// Settings + per-field rules
// ---------------------------------------------------------------------------

/// Bounds for the heuristic scans.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LocatorSettings {
    /// Rows tried as header candidates per sheet by the table selector.
    pub header_scan_rows: usize,
    /// Body rows scanned by content scoring.
    pub content_sample_rows: usize,
    /// Body rows used to sanity-check a header match.
    pub sanity_sample_rows: usize,
    /// Hits needed for a header match to survive the sanity check.
    pub sanity_min_hits: usize,
    /// Hits needed for content scoring to pick a column.
    pub min_content_hits: usize,
    /// Body rows scored beneath a header candidate by the table selector.
    pub score_sample_rows: usize,
}

impl Default for LocatorSettings {
    fn default() -> Self {
        Self {
            header_scan_rows: 150,
            content_sample_rows: 400,
            sanity_sample_rows: 200,
            sanity_min_hits: 5,
            min_content_hits: 1,
            score_sample_rows: 800,
        }
    }
}

/// Which strategies a field accepts, plus optional overrides.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnRule {
    /// Synonym list replacing the built-in one.
    #[serde(default)]
    pub headers: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub header: bool,
    #[serde(default = "default_true")]
    pub content: bool,
    /// Last-resort fixed column index.
    #[serde(default)]
    pub index: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl Default for ColumnRule {
    fn default() -> Self {
        Self {
            headers: None,
            header: true,
            content: true,
            index: None,
        }
    }
}

impl ColumnRule {
    pub fn synonyms(&self, kind: FieldKind) -> Vec<String> {
        match &self.headers {
            Some(list) => list.clone(),
            None => kind.default_synonyms().iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Header,
    Content,
    Fixed,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Header => write!(f, "header"),
            Self::Content => write!(f, "content"),
            Self::Fixed => write!(f, "fixed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    pub index: usize,
    pub strategy: Strategy,
}

// ---------------------------------------------------------------------------
// Header strategy
// ---------------------------------------------------------------------------

/// Trim, collapse inner whitespace, lowercase.
pub fn normalize_header(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// First column whose header equals a synonym, else first that contains one.
/// Earlier synonyms win over later ones within each pass.
pub fn header_match<S: AsRef<str>>(header: &Row, synonyms: &[S]) -> Option<usize> {
    let cols: Vec<String> = header.iter().map(|c| normalize_header(&c.display())).collect();
    let targets: Vec<String> = synonyms
        .iter()
        .map(|s| normalize_header(s.as_ref()))
        .filter(|s| !s.is_empty())
        .collect();

    for target in &targets {
        if let Some(idx) = cols.iter().position(|h| h == target) {
            return Some(idx);
        }
    }
    for target in &targets {
        if let Some(idx) = cols.iter().position(|h| h.contains(target.as_str())) {
            return Some(idx);
        }
    }
    None
}

/// Whether a body cell repeats one of the header labels.
pub fn looks_like_header<S: AsRef<str>>(value: &Cell, synonyms: &[S]) -> bool {
    let v = normalize_header(&value.display());
    if v.is_empty() {
        return false;
    }
    synonyms.iter().any(|s| {
        let s = normalize_header(s.as_ref());
        !s.is_empty() && v.contains(&s)
    })
}

// ---------------------------------------------------------------------------
// Locator
// ---------------------------------------------------------------------------

pub struct Locator<'a> {
    pub locale: &'a PhoneLocale,
    pub settings: &'a LocatorSettings,
}

impl<'a> Locator<'a> {
    pub fn new(locale: &'a PhoneLocale, settings: &'a LocatorSettings) -> Self {
        Self { locale, settings }
    }

    /// Whether `value` parses as `kind`. `None` for kinds without content evidence.
    pub fn fits(&self, kind: FieldKind, value: &Cell) -> Option<bool> {
        match kind {
            FieldKind::Phone => Some(phone_of(value, self.locale).is_some()),
            // Phone numbers also read as large positive amounts.
            FieldKind::Amount => {
                Some(amount_of(value) > 0 && phone_of(value, self.locale).is_none())
            }
            FieldKind::Date => Some(date_of(value).is_some()),
            _ => None,
        }
    }

    /// Number of cells in column `col` of the first `sample` rows that fit `kind`.
    pub fn hits(&self, body: &[Row], col: usize, kind: FieldKind, sample: usize) -> usize {
        body.iter()
            .take(sample)
            .filter(|r| self.fits(kind, cell(r, col)) == Some(true))
            .count()
    }

    /// Content strategy: the column with the most fitting cells, if it has
    /// at least `min_content_hits`. Ties go to the earlier column.
    pub fn content_match(&self, table: &Table, kind: FieldKind, exclude: &[usize]) -> Option<usize> {
        if !kind.has_content_evidence() {
            return None;
        }
        let sample = self.settings.content_sample_rows;
        let width = table.body.iter().take(sample).map(Vec::len).max().unwrap_or(0);

        let mut best: Option<(usize, usize)> = None;
        for col in (0..width).filter(|c| !exclude.contains(c)) {
            let hits = self.hits(&table.body, col, kind, sample);
            if hits > best.map_or(0, |(_, h)| h) {
                best = Some((col, hits));
            }
        }

        best.filter(|(_, hits)| *hits >= self.settings.min_content_hits.max(1))
            .map(|(col, _)| col)
    }

    /// Sanity check for a header-matched column. Small tables need fewer hits,
    /// but a non-empty sample always needs at least one.
    fn header_survives(&self, table: &Table, kind: FieldKind, col: usize) -> bool {
        if !kind.has_content_evidence() {
            return true;
        }
        let sample = self.settings.sanity_sample_rows;
        let sampled = table.body.len().min(sample);
        if sampled == 0 {
            return true;
        }
        let hits = self.hits(&table.body, col, kind, sample);
        hits >= self.settings.sanity_min_hits.min(sampled).max(1)
    }

    /// Run the ranked strategies for one field.
    pub fn locate(
        &self,
        table: &Table,
        kind: FieldKind,
        rule: &ColumnRule,
        fixed: Option<usize>,
        exclude: &[usize],
    ) -> Option<Located> {
        if rule.header {
            if let Some(index) = header_match(&table.header, &rule.synonyms(kind)) {
                if self.header_survives(table, kind, index) {
                    return Some(Located {
                        index,
                        strategy: Strategy::Header,
                    });
                }
                log::warn!(
                    "{}: header match for {kind} at column {index} has too few valid values, falling back",
                    table.provenance
                );
            }
        }

        if rule.content {
            if let Some(index) = self.content_match(table, kind, exclude) {
                return Some(Located {
                    index,
                    strategy: Strategy::Content,
                });
            }
        }

        // Named fixed layouts only apply when the table is wide enough to hold them.
        rule.index
            .or(fixed)
            .filter(|&index| index < table.width())
            .map(|index| Located {
                index,
                strategy: Strategy::Fixed,
            })
    }
}
