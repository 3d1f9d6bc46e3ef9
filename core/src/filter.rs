//! Record filter: restricts the firm registry before any stage runs.

use crate::loader::FirmRecord;
use serde::{Deserialize, Serialize};

/// Empty or absent criteria mean "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirmFilter {
    pub categories: Vec<String>,
    pub sectors:    Vec<String>,
    /// Inclusive bounds. When set, rows with unknown age are excluded.
    pub age_range:  Option<(f64, f64)>,
}

impl FirmFilter {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.sectors.is_empty() && self.age_range.is_none()
    }

    pub fn matches(&self, firm: &FirmRecord) -> bool {
        if !self.categories.is_empty()
            && !self.categories.iter().any(|c| c.trim() == firm.enterprise_category)
        {
            return false;
        }
        if !self.sectors.is_empty()
            && !self.sectors.iter().any(|s| s.trim() == firm.primary_sector_code)
        {
            return false;
        }
        match (self.age_range, firm.age_years) {
            (None, _) => true,
            (Some((lo, hi)), Some(age)) => lo <= age && age <= hi,
            (Some(_), None) => false,
        }
    }

    pub fn apply(&self, firms: &[FirmRecord]) -> Vec<FirmRecord> {
        firms.iter().filter(|f| self.matches(f)).cloned().collect()
    }
}
