//! Independence tester: intensity group × 24-month survival.
//!
//! Test selection:
//!   - exactly 2×2 → Fisher's exact test (two-sided), with the sample
//!     odds ratio
//!   - any other shape → Pearson Chi-square test of independence, with
//!     degrees of freedom and the expected-frequency matrix
//!
//! Decision: reject independence iff p < alpha.
//!
//! The decision describes an association. It is never a causal claim, and
//! every consumer must carry `NON_CAUSAL_CAVEAT` alongside it.

use crate::{
    config::SignificanceLevel,
    error::StatisticalPrecondition,
    grouping::IntensityGroup,
};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use statrs::function::factorial::ln_binomial;
use std::collections::BTreeMap;

pub const NON_CAUSAL_CAVEAT: &str =
    "Association only: this test does not show that state aid caused (or prevented) firm survival.";

/// Column labels: survived_24m = 0, survived_24m = 1.
pub const OUTCOME_LABELS: [&str; 2] = ["0", "1"];

/// Relative tolerance when comparing table probabilities in Fisher's test.
const FISHER_RTOL: f64 = 1e-7;

// ── Contingency table ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContingencyTable {
    pub row_labels:    Vec<String>,
    pub column_labels: Vec<String>,
    pub counts:        Vec<Vec<u64>>,
}

impl ContingencyTable {
    /// Rows = groups sorted by rank, columns = outcome {0, 1}.
    pub fn from_outcomes<'a, I>(observations: I) -> Self
    where
        I: IntoIterator<Item = (&'a IntensityGroup, bool)>,
    {
        let mut rows: BTreeMap<&IntensityGroup, [u64; 2]> = BTreeMap::new();
        for (group, survived) in observations {
            rows.entry(group).or_insert([0, 0])[usize::from(survived)] += 1;
        }
        Self {
            row_labels:    rows.keys().map(|g| g.label.clone()).collect(),
            column_labels: OUTCOME_LABELS.iter().map(|s| s.to_string()).collect(),
            counts:        rows.into_values().map(|c| c.to_vec()).collect(),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.counts.len(), self.column_labels.len())
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    pub fn row_totals(&self) -> Vec<u64> {
        self.counts.iter().map(|r| r.iter().sum()).collect()
    }

    pub fn column_totals(&self) -> Vec<u64> {
        let (_, cols) = self.shape();
        (0..cols)
            .map(|j| self.counts.iter().map(|r| r.get(j).copied().unwrap_or(0)).sum())
            .collect()
    }
}

// ── Test result ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    RejectIndependence,
    FailToReject,
}

impl Decision {
    pub fn from_p_value(p_value: f64, alpha: SignificanceLevel) -> Self {
        if p_value < alpha.value() {
            Decision::RejectIndependence
        } else {
            Decision::FailToReject
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "test", rename_all = "snake_case")]
pub enum TestStatistics {
    FisherExact {
        /// (a·d)/(b·c); infinite when b·c = 0, NaN when both products are 0.
        odds_ratio: f64,
    },
    ChiSquare {
        statistic:          f64,
        degrees_of_freedom: usize,
        expected:           Vec<Vec<f64>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndependenceTest {
    pub test_name:  String,
    pub statistics: TestStatistics,
    pub p_value:    f64,
    pub threshold:  f64,
    pub decision:   Decision,
}

/// Pick and run the appropriate test on `table`.
pub fn test(
    table: &ContingencyTable,
    alpha: SignificanceLevel,
) -> Result<IndependenceTest, StatisticalPrecondition> {
    let (rows, cols) = table.shape();
    if rows == 0 || table.total() == 0 {
        return Err(StatisticalPrecondition::EmptyTable);
    }
    if rows < 2 {
        return Err(StatisticalPrecondition::TooFewRows { rows });
    }
    if cols < 2 {
        return Err(StatisticalPrecondition::TooFewColumns { columns: cols });
    }

    let (test_name, statistics, p_value) = if (rows, cols) == (2, 2) {
        let (odds_ratio, p) = fisher_exact(&table.counts);
        ("Fisher exact test", TestStatistics::FisherExact { odds_ratio }, p)
    } else {
        let (statistic, degrees_of_freedom, expected, p) = chi_square(table)?;
        (
            "Chi-square test of independence",
            TestStatistics::ChiSquare { statistic, degrees_of_freedom, expected },
            p,
        )
    };

    let p_value = p_value.clamp(0.0, 1.0);
    Ok(IndependenceTest {
        test_name: test_name.to_string(),
        statistics,
        p_value,
        threshold: alpha.value(),
        decision: Decision::from_p_value(p_value, alpha),
    })
}

/// Two-sided Fisher exact test on a 2×2 table: (odds ratio, p-value).
fn fisher_exact(counts: &[Vec<u64>]) -> (f64, f64) {
    let (a, b) = (counts[0][0], counts[0][1]);
    let (c, d) = (counts[1][0], counts[1][1]);

    let odds_ratio = {
        let num = a as f64 * d as f64;
        let den = b as f64 * c as f64;
        if den == 0.0 {
            if num == 0.0 { f64::NAN } else { f64::INFINITY }
        } else {
            num / den
        }
    };

    // Hypergeometric law of the top-left cell given the margins.
    let n = a + b + c + d;
    let row1 = a + b;
    let col1 = a + c;
    let ln_denominator = ln_binomial(n, row1);
    let prob = |x: u64| (ln_binomial(col1, x) + ln_binomial(n - col1, row1 - x) - ln_denominator).exp();

    let lo = (row1 + col1).saturating_sub(n);
    let hi = row1.min(col1);
    let observed = prob(a);
    let p: f64 = (lo..=hi)
        .map(prob)
        .filter(|&p| p <= observed * (1.0 + FISHER_RTOL))
        .sum();

    (odds_ratio, p.min(1.0))
}

type ChiSquareParts = (f64, usize, Vec<Vec<f64>>, f64);

fn chi_square(table: &ContingencyTable) -> Result<ChiSquareParts, StatisticalPrecondition> {
    let (rows, cols) = table.shape();
    let total = table.total() as f64;
    let row_totals = table.row_totals();
    let col_totals = table.column_totals();

    if let Some(i) = row_totals.iter().position(|&t| t == 0) {
        return Err(StatisticalPrecondition::ZeroExpectedFrequency {
            axis: "row".into(),
            label: table.row_labels[i].clone(),
        });
    }
    if let Some(j) = col_totals.iter().position(|&t| t == 0) {
        return Err(StatisticalPrecondition::ZeroExpectedFrequency {
            axis: "column survived_24m".into(),
            label: table.column_labels[j].clone(),
        });
    }

    let expected: Vec<Vec<f64>> = row_totals
        .iter()
        .map(|&r| col_totals.iter().map(|&c| r as f64 * c as f64 / total).collect())
        .collect();

    let statistic: f64 = table
        .counts
        .iter()
        .zip(&expected)
        .flat_map(|(obs, exp)| obs.iter().zip(exp))
        .map(|(&o, &e)| (o as f64 - e).powi(2) / e)
        .sum();

    let dof = (rows - 1) * (cols - 1);
    let p_value = ChiSquared::new(dof as f64)
        .map_err(|_| StatisticalPrecondition::TooFewColumns { columns: cols })?
        .sf(statistic);

    Ok((statistic, dof, expected, p_value))
}
