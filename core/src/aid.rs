//! Aid intensity modeler: state aid per cohort firm, by category.
//!
//! Intensity is a category-level average (total aid / cohort firms in the
//! category), not a firm-level disbursement.

use crate::{cohort::CohortFirm, loader::AidRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAidIntensity {
    pub enterprise_category: String,
    pub total_aid_amount:    f64,
    pub firm_count_2020:     u64,
    /// `None` when the category has no cohort firm.
    pub intensity:           Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmIntensity {
    pub firm:      CohortFirm,
    pub intensity: f64,
}

/// Sum aid per category and divide by the category's cohort size.
///
/// Rows are the categories of the aid table, ordered by name. Blank
/// categories cannot be joined and are dropped.
pub fn compute_intensity(aid: &[AidRecord], cohort: &[CohortFirm]) -> Vec<CategoryAidIntensity> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for record in aid {
        let category = record.enterprise_category.trim();
        if category.is_empty() {
            continue;
        }
        *totals.entry(category).or_insert(0.0) += record.aid_amount;
    }

    let mut firm_counts: HashMap<&str, u64> = HashMap::new();
    for firm in cohort {
        *firm_counts.entry(firm.enterprise_category.as_str()).or_insert(0) += 1;
    }

    totals
        .into_iter()
        .map(|(category, total)| {
            let count = firm_counts.get(category).copied().unwrap_or(0);
            let intensity = (count > 0)
                .then(|| total / count as f64)
                .filter(|v| v.is_finite());
            CategoryAidIntensity {
                enterprise_category: category.to_string(),
                total_aid_amount:    total,
                firm_count_2020:     count,
                intensity,
            }
        })
        .collect()
}

/// Inner join: keep cohort firms whose category has a defined intensity.
///
/// A category missing from the aid table means "no aid data", which is not
/// the same as zero aid, so those firms are dropped.
pub fn join_to_firms(cohort: &[CohortFirm], intensities: &[CategoryAidIntensity]) -> Vec<FirmIntensity> {
    let by_category: HashMap<&str, f64> = intensities
        .iter()
        .filter_map(|c| c.intensity.map(|v| (c.enterprise_category.as_str(), v)))
        .collect();

    let joined: Vec<FirmIntensity> = cohort
        .iter()
        .filter_map(|firm| {
            by_category
                .get(firm.enterprise_category.as_str())
                .map(|&intensity| FirmIntensity { firm: firm.clone(), intensity })
        })
        .collect();

    log::debug!(
        "aid join: {} of {} cohort firm(s) have a defined intensity",
        joined.len(),
        cohort.len()
    );
    joined
}
