//! Closure and survival views built on the segment aggregator.
//!
//! Closure views read the (filtered) firm registry across all years.
//! Survival views read the cohort only.

use crate::{
    cohort::CohortFirm,
    loader::FirmRecord,
    segment::{Denominator, Dimension, SegmentAggregator, SegmentTable},
    types::rate_pct,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureOverview {
    pub firm_count:   u64,
    pub closed_count: u64,
    pub closure_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureShare {
    pub enterprise_category: String,
    pub closed_firms:        u64,
    /// Share of all closures, in percent.
    pub share_pct:           Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalOverview {
    pub cohort_year:   i32,
    pub cohort_size:   u64,
    pub survivors:     u64,
    pub non_survivors: u64,
    pub survival_rate: Option<f64>,
}

/// One row of the exported multi-dimension cohort summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortSummaryRow {
    pub group_key:          Vec<String>,
    pub firm_count:         u64,
    pub survivor_count:     u64,
    pub non_survivor_count: u64,
    pub survival_rate_pct:  Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortSummary {
    pub dimensions: Vec<String>,
    pub rows:       Vec<CohortSummaryRow>,
}

fn is_closed(closed_status: &str) -> impl Fn(&FirmRecord) -> bool + '_ {
    move |r: &FirmRecord| r.administrative_status == closed_status
}

pub fn closure_overview(
    agg: &SegmentAggregator,
    firms: &[FirmRecord],
    closed_status: &str,
) -> ClosureOverview {
    let table = agg.aggregate(firms, &[], is_closed(closed_status), Denominator::UniqueFirms);
    let (firm_count, closed_count) = table
        .rows
        .first()
        .map(|r| (r.count_total, r.count_numerator))
        .unwrap_or((0, 0));
    ClosureOverview {
        firm_count,
        closed_count,
        closure_rate: rate_pct(closed_count, firm_count),
    }
}

/// Categories with at least one closed firm, with their share of closures.
pub fn closure_shares_by_category(
    agg: &SegmentAggregator,
    firms: &[FirmRecord],
    closed_status: &str,
) -> Vec<ClosureShare> {
    let table = agg.aggregate(
        firms,
        &[Dimension::Category],
        is_closed(closed_status),
        Denominator::UniqueFirms,
    );
    let total_closed: u64 = table.rows.iter().map(|r| r.count_numerator).sum();
    table
        .rows
        .into_iter()
        .filter(|r| r.count_numerator > 0)
        .map(|r| ClosureShare {
            enterprise_category: r.group_key.into_iter().next().unwrap_or_default(),
            closed_firms:        r.count_numerator,
            share_pct:           rate_pct(r.count_numerator, total_closed),
        })
        .collect()
}

/// Sectors ranked by closure rate, highest first. Undefined rates sort last.
pub fn top_sectors_by_closure(
    agg: &SegmentAggregator,
    firms: &[FirmRecord],
    closed_status: &str,
    limit: usize,
) -> SegmentTable {
    let mut table = agg.aggregate(
        firms,
        &[Dimension::Sector],
        is_closed(closed_status),
        Denominator::UniqueFirms,
    );
    table.rows.sort_by(|a, b| {
        let by_rate = match (a.rate, b.rate) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None)    => Ordering::Less,
            (None, Some(_))    => Ordering::Greater,
            (None, None)       => Ordering::Equal,
        };
        by_rate.then_with(|| a.group_key.cmp(&b.group_key))
    });
    table.rows.truncate(limit);
    table
}

/// Share of closed rows per year; one row is one firm-year.
pub fn closure_rate_by_year(
    agg: &SegmentAggregator,
    firms: &[FirmRecord],
    closed_status: &str,
) -> SegmentTable {
    agg.aggregate(firms, &[Dimension::Year], is_closed(closed_status), Denominator::Rows)
}

pub fn closure_rate_by_age(
    agg: &SegmentAggregator,
    firms: &[FirmRecord],
    closed_status: &str,
) -> SegmentTable {
    agg.aggregate(
        firms,
        &[Dimension::AgeBand { keep_unclassified: false }],
        is_closed(closed_status),
        Denominator::UniqueFirms,
    )
}

pub fn survival_overview(cohort: &[CohortFirm], cohort_year: i32) -> SurvivalOverview {
    let cohort_size = cohort.len() as u64;
    let survivors = cohort.iter().filter(|f| f.survived_24m).count() as u64;
    SurvivalOverview {
        cohort_year,
        cohort_size,
        survivors,
        non_survivors: cohort_size - survivors,
        survival_rate: rate_pct(survivors, cohort_size),
    }
}

pub fn survival_by(
    agg: &SegmentAggregator,
    cohort: &[CohortFirm],
    dimensions: &[Dimension],
) -> SegmentTable {
    agg.aggregate(cohort, dimensions, |f: &CohortFirm| f.survived_24m, Denominator::UniqueFirms)
}

pub fn cohort_summary(
    agg: &SegmentAggregator,
    cohort: &[CohortFirm],
    dimensions: &[Dimension],
) -> CohortSummary {
    let table = survival_by(agg, cohort, dimensions);
    CohortSummary {
        dimensions: table.dimensions,
        rows: table
            .rows
            .into_iter()
            .map(|r| CohortSummaryRow {
                group_key:          r.group_key,
                firm_count:         r.count_total,
                survivor_count:     r.count_numerator,
                non_survivor_count: r.count_total - r.count_numerator,
                survival_rate_pct:  r.rate,
            })
            .collect(),
    }
}
