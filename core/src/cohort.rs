//! Cohort builder: the fixed observation cohort, one profile per firm.
//!
//! The cohort is the baseline of every survival metric. It is derived once
//! per run and never mutated afterwards.

use crate::{loader::FirmRecord, types::FirmId};
use serde::{Deserialize, Serialize};

/// A firm's profile in the cohort year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortFirm {
    pub firm_id:               FirmId,
    pub observation_year:      i32,
    pub administrative_status: String,
    pub enterprise_category:   String,
    pub primary_sector_code:   String,
    pub age_years:             Option<f64>,
    pub workforce_band_code:   String,
    pub survived_24m:          bool,
}

/// Filter to `year`, sort by firm id, keep the first row per firm.
///
/// The sort is stable, so among duplicate rows of one firm the earliest
/// in source order wins. Rows without a firm id cannot be deduplicated
/// and are left out. An empty result is a valid state, not an error.
pub fn build_cohort(firms: &[FirmRecord], year: i32) -> Vec<CohortFirm> {
    let mut rows: Vec<(FirmId, &FirmRecord)> = firms
        .iter()
        .filter(|f| f.observation_year == Some(year))
        .filter_map(|f| f.firm_id.map(|id| (id, f)))
        .collect();
    rows.sort_by_key(|(id, _)| *id);

    let in_year = rows.len();
    let mut cohort: Vec<CohortFirm> = Vec::with_capacity(rows.len());
    for (id, record) in rows {
        if cohort.last().is_some_and(|last| last.firm_id == id) {
            continue;
        }
        cohort.push(CohortFirm {
            firm_id:               id,
            observation_year:      year,
            administrative_status: record.administrative_status.clone(),
            enterprise_category:   record.enterprise_category.clone(),
            primary_sector_code:   record.primary_sector_code.clone(),
            age_years:             record.age_years,
            workforce_band_code:   record.workforce_band_code.clone(),
            // The loader already clamps; a bool cannot leave {0, 1}.
            survived_24m:          record.survived_24m,
        });
    }

    log::debug!(
        "cohort {year}: {} firm(s) from {in_year} row(s), {} duplicate(s) dropped",
        cohort.len(),
        in_year - cohort.len()
    );
    cohort
}
