//! Shared primitive types used across the entire pipeline.

/// A firm identifier (SIREN number).
pub type FirmId = i64;

/// The canonical run identifier.
pub type RunId = String;

/// Percentage `100 * numerator / total`, undefined when `total == 0`.
pub fn rate_pct(numerator: u64, total: u64) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(numerator as f64 / total as f64 * 100.0)
    }
}
