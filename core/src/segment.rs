//! Segment aggregator: closure and survival rates grouped by one or more
//! dimensions.
//!
//! Two denominator modes:
//!   - `UniqueFirms`: distinct firm ids per group (share metrics).
//!   - `Rows`: raw row count per group (year-level metrics, one row = one
//!     firm-year).
//!
//! Numeric and coded dimensions go through an ordinal labelling step first:
//! age is binned, workforce codes are mapped through the band table.
//! Groups are ordered by their ordinal rank, then by label.

use crate::{
    cohort::CohortFirm,
    config::{AgeBins, DimensionKind, WorkforceConfig},
    loader::FirmRecord,
    types::{rate_pct, FirmId},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

pub const UNCLASSIFIED_LABEL: &str = "unclassified";

/// Read access to the fields a dimension can group on.
pub trait FirmProfile {
    fn firm_id(&self) -> Option<FirmId>;
    fn observation_year(&self) -> Option<i32>;
    fn administrative_status(&self) -> &str;
    fn enterprise_category(&self) -> &str;
    fn primary_sector_code(&self) -> &str;
    fn age_years(&self) -> Option<f64>;
    fn workforce_band_code(&self) -> &str;
    fn survived_24m(&self) -> bool;
}

impl FirmProfile for FirmRecord {
    fn firm_id(&self) -> Option<FirmId>         { self.firm_id }
    fn observation_year(&self) -> Option<i32>   { self.observation_year }
    fn administrative_status(&self) -> &str     { &self.administrative_status }
    fn enterprise_category(&self) -> &str       { &self.enterprise_category }
    fn primary_sector_code(&self) -> &str       { &self.primary_sector_code }
    fn age_years(&self) -> Option<f64>          { self.age_years }
    fn workforce_band_code(&self) -> &str       { &self.workforce_band_code }
    fn survived_24m(&self) -> bool              { self.survived_24m }
}

impl FirmProfile for CohortFirm {
    fn firm_id(&self) -> Option<FirmId>         { Some(self.firm_id) }
    fn observation_year(&self) -> Option<i32>   { Some(self.observation_year) }
    fn administrative_status(&self) -> &str     { &self.administrative_status }
    fn enterprise_category(&self) -> &str       { &self.enterprise_category }
    fn primary_sector_code(&self) -> &str       { &self.primary_sector_code }
    fn age_years(&self) -> Option<f64>          { self.age_years }
    fn workforce_band_code(&self) -> &str       { &self.workforce_band_code }
    fn survived_24m(&self) -> bool              { self.survived_24m }
}

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Category,
    Sector,
    Year,
    /// Ages outside every bin are dropped, or grouped as "unclassified".
    AgeBand { keep_unclassified: bool },
    WorkforceBand,
}

impl Dimension {
    pub fn name(&self) -> &'static str {
        DimensionKind::from(*self).name()
    }
}

impl From<DimensionKind> for Dimension {
    fn from(kind: DimensionKind) -> Self {
        match kind {
            DimensionKind::Category      => Dimension::Category,
            DimensionKind::Sector        => Dimension::Sector,
            DimensionKind::Year          => Dimension::Year,
            DimensionKind::AgeBand       => Dimension::AgeBand { keep_unclassified: false },
            DimensionKind::WorkforceBand => Dimension::WorkforceBand,
        }
    }
}

impl From<Dimension> for DimensionKind {
    fn from(dim: Dimension) -> Self {
        match dim {
            Dimension::Category         => DimensionKind::Category,
            Dimension::Sector           => DimensionKind::Sector,
            Dimension::Year             => DimensionKind::Year,
            Dimension::AgeBand { .. }   => DimensionKind::AgeBand,
            Dimension::WorkforceBand    => DimensionKind::WorkforceBand,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Denominator {
    UniqueFirms,
    Rows,
}

/// A group value plus its ordinal position within the dimension.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupLabel {
    pub rank:  u32,
    pub label: String,
}

impl GroupLabel {
    fn nominal(label: &str) -> Self {
        Self { rank: 0, label: label.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRow {
    pub group_key:       Vec<String>,
    pub count_total:     u64,
    pub count_numerator: u64,
    /// `100 * count_numerator / count_total`; `None` when the group is empty.
    pub rate:            Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentTable {
    pub dimensions:  Vec<String>,
    pub denominator: Denominator,
    pub rows:        Vec<SegmentRow>,
}

#[derive(Default)]
struct Tally {
    rows_total:      u64,
    rows_numerator:  u64,
    firms:           HashSet<FirmId>,
    firms_numerator: HashSet<FirmId>,
}

// ── Aggregator ───────────────────────────────────────────────────────────────

pub struct SegmentAggregator {
    age_bins:       AgeBins,
    workforce:      WorkforceConfig,
    workforce_rank: HashMap<String, (u32, String)>,
}

impl SegmentAggregator {
    pub fn new(age_bins: AgeBins, workforce: WorkforceConfig) -> Self {
        let workforce_rank = workforce
            .bands
            .iter()
            .enumerate()
            .map(|(i, band)| (band.code.clone(), (i as u32, band.label.clone())))
            .collect();
        Self { age_bins, workforce, workforce_rank }
    }

    /// Group `records` by `dimensions` and count how many satisfy `numerator`.
    ///
    /// A record with no value for any requested dimension is left out.
    /// In `UniqueFirms` mode, records without a firm id are left out and the
    /// numerator counts distinct firms with at least one matching row, so
    /// `count_numerator <= count_total` always holds.
    pub fn aggregate<R, F>(
        &self,
        records: &[R],
        dimensions: &[Dimension],
        numerator: F,
        denominator: Denominator,
    ) -> SegmentTable
    where
        R: FirmProfile,
        F: Fn(&R) -> bool,
    {
        let mut groups: BTreeMap<Vec<GroupLabel>, Tally> = BTreeMap::new();

        for record in records {
            let Some(key) = dimensions
                .iter()
                .map(|d| self.label(*d, record))
                .collect::<Option<Vec<_>>>()
            else {
                continue;
            };
            let hit = numerator(record);

            match denominator {
                Denominator::Rows => {
                    let tally = groups.entry(key).or_default();
                    tally.rows_total += 1;
                    if hit {
                        tally.rows_numerator += 1;
                    }
                }
                Denominator::UniqueFirms => {
                    let Some(id) = record.firm_id() else { continue };
                    let tally = groups.entry(key).or_default();
                    tally.firms.insert(id);
                    if hit {
                        tally.firms_numerator.insert(id);
                    }
                }
            }
        }

        let rows = groups
            .into_iter()
            .map(|(key, tally)| {
                let (total, num) = match denominator {
                    Denominator::Rows        => (tally.rows_total, tally.rows_numerator),
                    Denominator::UniqueFirms => (tally.firms.len() as u64, tally.firms_numerator.len() as u64),
                };
                SegmentRow {
                    group_key:       key.into_iter().map(|g| g.label).collect(),
                    count_total:     total,
                    count_numerator: num,
                    rate:            rate_pct(num, total),
                }
            })
            .collect();

        SegmentTable {
            dimensions: dimensions.iter().map(|d| d.name().to_string()).collect(),
            denominator,
            rows,
        }
    }

    /// The ordinal label of `record` along `dimension`, if it has one.
    pub fn label<R: FirmProfile>(&self, dimension: Dimension, record: &R) -> Option<GroupLabel> {
        match dimension {
            Dimension::Category => non_empty(record.enterprise_category()).map(GroupLabel::nominal),
            Dimension::Sector   => non_empty(record.primary_sector_code()).map(GroupLabel::nominal),
            Dimension::Year => record.observation_year().map(|y| GroupLabel {
                rank:  u32::try_from(y).unwrap_or(0),
                label: y.to_string(),
            }),
            Dimension::AgeBand { keep_unclassified } => {
                match record.age_years().and_then(|age| self.age_bin(age)) {
                    Some(i) => self.age_bins.labels.get(i).map(|label| GroupLabel {
                        rank:  i as u32,
                        label: label.clone(),
                    }),
                    None if keep_unclassified => Some(GroupLabel {
                        rank:  u32::MAX,
                        label: UNCLASSIFIED_LABEL.to_string(),
                    }),
                    None => None,
                }
            }
            Dimension::WorkforceBand => self.workforce_label(record.workforce_band_code()),
        }
    }

    /// Index of the left-closed, right-open bin holding `age`.
    pub fn age_bin(&self, age: f64) -> Option<usize> {
        let edges = &self.age_bins.edges;
        if !age.is_finite() || edges.is_empty() || age < edges[0] {
            return None;
        }
        // Last edge <= age; the final bin is open-ended.
        Some(edges.partition_point(|&e| e <= age) - 1)
    }

    /// Sentinel codes map to `None`; unknown codes to the "Other/NA" bucket.
    pub fn workforce_label(&self, code: &str) -> Option<GroupLabel> {
        let code = code.trim();
        if self.workforce.sentinel_codes.iter().any(|s| s.eq_ignore_ascii_case(code)) {
            return None;
        }
        Some(match self.workforce_rank.get(code) {
            Some((rank, label)) => GroupLabel { rank: *rank, label: label.clone() },
            None => GroupLabel {
                rank:  u32::MAX,
                label: self.workforce.other_label.clone(),
            },
        })
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator() -> SegmentAggregator {
        SegmentAggregator::new(AgeBins::default(), WorkforceConfig::default())
    }

    #[test]
    fn age_bins_are_left_closed() {
        let agg = aggregator();
        assert_eq!(agg.age_bin(0.0), Some(0));
        assert_eq!(agg.age_bin(4.99), Some(0));
        assert_eq!(agg.age_bin(5.0), Some(1));
        assert_eq!(agg.age_bin(99.9), Some(5));
        assert_eq!(agg.age_bin(100.0), Some(6));
        assert_eq!(agg.age_bin(250.0), Some(6));
        assert_eq!(agg.age_bin(-1.0), None);
        assert_eq!(agg.age_bin(f64::NAN), None);
    }

    #[test]
    fn workforce_sentinels_are_dropped_and_unknown_codes_sort_last() {
        let agg = aggregator();
        assert_eq!(agg.workforce_label("NN"), None);
        assert_eq!(agg.workforce_label(""), None);
        let small = agg.workforce_label("01").unwrap();
        let large = agg.workforce_label("53").unwrap();
        let other = agg.workforce_label("99").unwrap();
        assert!(small < large);
        assert!(large < other);
        assert_eq!(other.label, "Other/NA");
    }
}
