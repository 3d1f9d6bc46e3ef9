//! Grouping strategy: turns per-firm aid intensity into a few ordinal groups.
//!
//! CASCADE (fixed order, first accepted split wins):
//!   1. 4 groups: quantile split; equal-width split if the quantile split
//!      is degenerate
//!   2. 3 groups: same
//!   3. 2 groups: same
//!   4. Median split: "Low (≤ median)" / "High (> median)"
//!   5. Failed: fewer than 2 groups are achievable
//!
//! A split is accepted when it yields at least `MIN_GROUPS` distinct groups.
//! A k-group binned split needs more than k distinct input values; below
//! that it is degenerate at that cardinality.
//!
//! Nothing here panics or errors on degenerate input: every attempt returns
//! an `Attempt`, and exhausting the cascade yields `GroupingMethod::Failed`.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIN_GROUPS: usize = 2;

pub const LOW_LABEL: &str = "Low (≤ median)";
pub const HIGH_LABEL: &str = "High (> median)";

/// The cascade, in the order it is tried.
pub const CASCADE: [Strategy; 4] = [
    Strategy::Binned(4),
    Strategy::Binned(3),
    Strategy::Binned(2),
    Strategy::MedianSplit,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Quantile split into k groups, equal-width if the quantiles degenerate.
    Binned(usize),
    MedianSplit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum GroupingMethod {
    Quantile { groups: usize, edges: Vec<f64> },
    EqualWidth { groups: usize, edges: Vec<f64> },
    MedianSplit { median: f64 },
    Failed,
}

impl fmt::Display for GroupingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quantile { groups, .. }   => write!(f, "quantile({groups})"),
            Self::EqualWidth { groups, .. } => write!(f, "equal_width({groups})"),
            Self::MedianSplit { .. }        => write!(f, "median"),
            Self::Failed                    => write!(f, "failed"),
        }
    }
}

/// An ordinal intensity group. Lower rank = lower intensity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IntensityGroup {
    pub rank:  usize,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grouping {
    /// One group per input value, in input order. Empty when failed.
    pub assignments: Vec<IntensityGroup>,
    pub method:      GroupingMethod,
}

impl Grouping {
    fn failed() -> Self {
        Self { assignments: Vec::new(), method: GroupingMethod::Failed }
    }

    pub fn is_failed(&self) -> bool {
        self.method == GroupingMethod::Failed
    }

    pub fn distinct_groups(&self) -> usize {
        let mut ranks: Vec<usize> = self.assignments.iter().map(|g| g.rank).collect();
        ranks.sort_unstable();
        ranks.dedup();
        ranks.len()
    }
}

/// Outcome of one strategy attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    Split(Grouping),
    Degenerate(String),
}

/// Run the cascade over `values`.
pub fn make_groups(values: &[f64]) -> Grouping {
    for strategy in CASCADE {
        let attempt = match strategy {
            Strategy::Binned(k) => match quantile_split(values, k) {
                Attempt::Degenerate(reason) => {
                    log::debug!("quantile({k}) degenerate: {reason}; trying equal_width({k})");
                    equal_width_split(values, k)
                }
                split => split,
            },
            Strategy::MedianSplit => median_split(values),
        };

        match attempt {
            Attempt::Split(grouping) if grouping.distinct_groups() >= MIN_GROUPS => {
                log::debug!("grouping accepted: {}", grouping.method);
                return grouping;
            }
            Attempt::Split(grouping) => {
                log::debug!("{} produced {} group(s); rejected", grouping.method, grouping.distinct_groups());
            }
            Attempt::Degenerate(reason) => {
                log::debug!("{strategy:?} degenerate: {reason}");
            }
        }
    }
    Grouping::failed()
}

pub fn quantile_split(values: &[f64], k: usize) -> Attempt {
    let sorted = match binnable(values, k) {
        Ok(sorted) => sorted,
        Err(reason) => return Attempt::Degenerate(reason),
    };
    let edges: Vec<f64> = (0..=k).map(|i| quantile(&sorted, i as f64 / k as f64)).collect();
    if edges.windows(2).any(|w| w[0] >= w[1]) {
        return Attempt::Degenerate(format!("duplicate quantile edges {edges:?}"));
    }
    let assignments = assign(values, &edges, "Q");
    Attempt::Split(Grouping {
        assignments,
        method: GroupingMethod::Quantile { groups: k, edges },
    })
}

pub fn equal_width_split(values: &[f64], k: usize) -> Attempt {
    let sorted = match binnable(values, k) {
        Ok(sorted) => sorted,
        Err(reason) => return Attempt::Degenerate(reason),
    };
    let (min, max) = (sorted[0], sorted[sorted.len() - 1]);
    let width = max - min;
    let mut edges: Vec<f64> = (0..=k).map(|i| min + width * i as f64 / k as f64).collect();
    edges[k] = max;
    // Widen the lowest edge so the minimum falls inside the first bin.
    edges[0] -= width * 0.001;
    let assignments = assign(values, &edges, "B");
    Attempt::Split(Grouping {
        assignments,
        method: GroupingMethod::EqualWidth { groups: k, edges },
    })
}

pub fn median_split(values: &[f64]) -> Attempt {
    if values.is_empty() {
        return Attempt::Degenerate("no values".into());
    }
    let sorted = sorted_copy(values);
    let median = quantile(&sorted, 0.5);
    let assignments = values
        .iter()
        .map(|&v| {
            if v <= median {
                IntensityGroup { rank: 0, label: LOW_LABEL.into() }
            } else {
                IntensityGroup { rank: 1, label: HIGH_LABEL.into() }
            }
        })
        .collect();
    Attempt::Split(Grouping {
        assignments,
        method: GroupingMethod::MedianSplit { median },
    })
}

/// Sorted copy of `values` when a k-group binned split is possible.
fn binnable(values: &[f64], k: usize) -> Result<Vec<f64>, String> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err("non-finite value".into());
    }
    let sorted = sorted_copy(values);
    let mut distinct = sorted.clone();
    distinct.dedup();
    if distinct.len() <= k {
        return Err(format!("{} distinct value(s) for {k} groups", distinct.len()));
    }
    Ok(sorted)
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Linear interpolation between order statistics. `sorted` is non-empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Right-closed bins over `edges`, lowest edge included.
fn assign(values: &[f64], edges: &[f64], prefix: &str) -> Vec<IntensityGroup> {
    let k = edges.len() - 1;
    values
        .iter()
        .map(|&v| {
            let bin = edges[1..].partition_point(|&e| e < v).min(k - 1);
            IntensityGroup { rank: bin, label: format!("{prefix}{}", bin + 1) }
        })
        .collect()
}
