//! Dataset loader: reads the firm and state-aid registries into typed,
//! normalized records.
//!
//! RULES:
//!   - Normalization never raises: an unparsable cell becomes `None`
//!     (or the documented default), never an error.
//!   - Only a missing MANDATORY column is fatal (`AnalysisError::Schema`):
//!     `survived_24m` for firms, `aid_amount` for aid.
//!   - Optional columns that are absent are recorded in `FirmColumnsPresent`
//!     so downstream stages can skip themselves with a precise reason.

use crate::{
    config::{AidColumns, FirmColumns},
    error::{AnalysisError, AnalysisResult},
    types::FirmId,
};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;

// ── Public types ─────────────────────────────────────────────────────────────

/// One row of the firm registry: a firm observed in a given year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmRecord {
    pub firm_id:               Option<FirmId>,
    pub observation_year:      Option<i32>,
    pub administrative_status: String,
    pub enterprise_category:   String,
    pub primary_sector_code:   String,
    pub age_years:             Option<f64>,
    pub workforce_band_code:   String,
    /// Externally supplied; never re-derived from `administrative_status`.
    pub survived_24m:          bool,
}

/// Which optional firm columns the source actually carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmColumnsPresent {
    pub firm_id:               bool,
    pub observation_year:      bool,
    pub administrative_status: bool,
    pub enterprise_category:   bool,
    pub primary_sector_code:   bool,
    pub age_years:             bool,
    pub workforce_band_code:   bool,
}

impl FirmColumnsPresent {
    pub fn all() -> Self {
        Self {
            firm_id: true,
            observation_year: true,
            administrative_status: true,
            enterprise_category: true,
            primary_sector_code: true,
            age_years: true,
            workforce_band_code: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FirmTable {
    pub records: Vec<FirmRecord>,
    pub present: FirmColumnsPresent,
    /// Header names, used to word skip reasons.
    pub columns: FirmColumns,
}

/// One row of the state-aid registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AidRecord {
    pub enterprise_category:    String,
    pub aid_measure_name:       String,
    pub aid_measure_short_name: String,
    pub aid_amount:             f64,
}

#[derive(Debug, Clone)]
pub struct AidTable {
    pub records: Vec<AidRecord>,
}

// ── Loader ───────────────────────────────────────────────────────────────────

pub struct DatasetLoader {
    firm_columns: FirmColumns,
    aid_columns:  AidColumns,
}

impl DatasetLoader {
    pub fn new(firm_columns: FirmColumns, aid_columns: AidColumns) -> Self {
        Self { firm_columns, aid_columns }
    }

    pub fn load_firms_path(&self, path: &Path) -> AnalysisResult<FirmTable> {
        let file = std::fs::File::open(path)?;
        self.load_firms(file, &path.display().to_string())
    }

    pub fn load_aid_path(&self, path: &Path) -> AnalysisResult<AidTable> {
        let file = std::fs::File::open(path)?;
        self.load_aid(file, &path.display().to_string())
    }

    /// Parse the firm registry. `source_name` only labels errors.
    pub fn load_firms<R: Read>(&self, source: R, source_name: &str) -> AnalysisResult<FirmTable> {
        let mut reader = csv_reader(source);
        let headers = HeaderIndex::new(reader.headers()?, &BTreeMap::new());
        let cols = &self.firm_columns;

        let survived = headers.require(&cols.survived_24m, source_name)?;
        let firm_id = headers.get(&cols.firm_id);
        let year = headers.get(&cols.observation_year);
        let status = headers.get(&cols.administrative_status);
        let category = headers.get(&cols.enterprise_category);
        let sector = headers.get(&cols.primary_sector_code);
        let age = headers.get(&cols.age_years);
        let workforce = headers.get(&cols.workforce_band_code);

        let present = FirmColumnsPresent {
            firm_id:               firm_id.is_some(),
            observation_year:      year.is_some(),
            administrative_status: status.is_some(),
            enterprise_category:   category.is_some(),
            primary_sector_code:   sector.is_some(),
            age_years:             age.is_some(),
            workforce_band_code:   workforce.is_some(),
        };

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            records.push(FirmRecord {
                firm_id:               parse_integer(cell(&row, firm_id)),
                observation_year:      parse_integer(cell(&row, year)).and_then(|y| i32::try_from(y).ok()),
                administrative_status: normalize_status(cell(&row, status)),
                enterprise_category:   cell(&row, category).trim().to_string(),
                primary_sector_code:   cell(&row, sector).trim().to_string(),
                age_years:             parse_age(cell(&row, age)),
                workforce_band_code:   normalize_workforce_code(cell(&row, workforce)),
                survived_24m:          parse_survival_flag(cell(&row, Some(survived))),
            });
        }

        log::info!("loaded {} firm rows from {source_name}", records.len());
        Ok(FirmTable { records, present, columns: cols.clone() })
    }

    /// Parse the state-aid registry. Aliased headers are renamed first.
    pub fn load_aid<R: Read>(&self, source: R, source_name: &str) -> AnalysisResult<AidTable> {
        let mut reader = csv_reader(source);
        let cols = &self.aid_columns;
        let headers = HeaderIndex::new(reader.headers()?, &cols.aliases);

        let amount = headers.require(&cols.aid_amount, source_name)?;
        let category = headers.get(&cols.enterprise_category);
        let measure = headers.get(&cols.aid_measure_name);
        let short = headers.get(&cols.aid_measure_short_name);

        let mut records = Vec::new();
        let mut clamped = 0usize;
        for row in reader.records() {
            let row = row?;
            let raw = cell(&row, Some(amount));
            let aid_amount = match parse_amount(raw) {
                Some(v) if v.is_finite() && v >= 0.0 => v,
                Some(_) => {
                    clamped += 1;
                    0.0
                }
                None => 0.0,
            };
            records.push(AidRecord {
                enterprise_category:    cell(&row, category).trim().to_string(),
                aid_measure_name:       cell(&row, measure).trim().to_string(),
                aid_measure_short_name: cell(&row, short).trim().to_string(),
                aid_amount,
            });
        }

        if clamped > 0 {
            log::warn!("{source_name}: {clamped} negative or non-finite aid amount(s) set to 0");
        }
        log::info!("loaded {} aid rows from {source_name}", records.len());
        Ok(AidTable { records })
    }
}

fn csv_reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(source)
}

/// Header name -> column position, after alias rewriting.
struct HeaderIndex {
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    fn new(headers: &StringRecord, aliases: &BTreeMap<String, String>) -> Self {
        let mut positions = HashMap::new();
        for (i, raw) in headers.iter().enumerate() {
            let name = raw.trim().trim_start_matches('\u{feff}');
            let canonical = aliases.get(name).map(String::as_str).unwrap_or(name);
            // First occurrence wins when an alias collides with a canonical header.
            positions.entry(canonical.to_string()).or_insert(i);
        }
        Self { positions }
    }

    fn get(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    fn require(&self, name: &str, source_name: &str) -> AnalysisResult<usize> {
        self.get(name).ok_or_else(|| AnalysisError::Schema {
            source_name: source_name.to_string(),
            column: name.to_string(),
        })
    }
}

fn cell(row: &StringRecord, idx: Option<usize>) -> &str {
    idx.and_then(|i| row.get(i)).unwrap_or("")
}

// ── Normalization ────────────────────────────────────────────────────────────

pub fn normalize_status(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Integers, also accepting integral floats such as `"2020.0"`.
pub fn parse_integer(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Some(v as i64),
        _ => None,
    }
}

pub fn parse_real(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Ages are non-negative; anything else is unknown.
pub fn parse_age(raw: &str) -> Option<f64> {
    parse_real(raw).filter(|v| *v >= 0.0)
}

/// Missing or unparsable -> 0, then clamped to {0, 1}.
pub fn parse_survival_flag(raw: &str) -> bool {
    let s = raw.trim();
    let value = s
        .parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v.trunc() as i64))
        .unwrap_or(0);
    value.clamp(0, 1) == 1
}

/// Aid amounts may come in French notation: `"1 234,56 €"`, `"1.234.567,89"`.
///
/// When both `,` and `.` appear, the last one is the decimal mark and the
/// other groups thousands. A mark repeated on its own is a grouping mark.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{202f}' && *c != '€')
        .collect();
    if s.is_empty() {
        return None;
    }
    let normalized = match (s.rfind(','), s.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (Some(_), None) if s.matches(',').count() > 1 => s.replace(',', ""),
        (Some(_), None) => s.replace(',', "."),
        (None, Some(_)) if s.matches('.').count() > 1 => s.replace('.', ""),
        _ => s,
    };
    normalized.parse::<f64>().ok()
}

/// Workforce codes are two characters; numeric exports lose the leading zero.
pub fn normalize_workforce_code(raw: &str) -> String {
    let s = raw.trim();
    match parse_integer(s) {
        Some(v) if (0..100).contains(&v) => format!("{v:02}"),
        _ => s.to_uppercase(),
    }
}
