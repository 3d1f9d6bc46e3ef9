//! CSV export of the cohort summary, and the matching reader.
//!
//! Layout: one column per grouping dimension, then
//! `firm_count, survivor_count, non_survivor_count, survival_rate_pct`.
//! An undefined rate is written as an empty cell.

use crate::{
    error::{AnalysisError, AnalysisResult},
    metrics::{CohortSummary, CohortSummaryRow},
};
use std::io::{Read, Write};

pub const COUNT_COLUMNS: [&str; 4] = [
    "firm_count",
    "survivor_count",
    "non_survivor_count",
    "survival_rate_pct",
];

pub fn write_cohort_summary<W: Write>(summary: &CohortSummary, out: W) -> AnalysisResult<()> {
    let mut writer = csv::Writer::from_writer(out);

    let header: Vec<&str> = summary
        .dimensions
        .iter()
        .map(String::as_str)
        .chain(COUNT_COLUMNS)
        .collect();
    writer.write_record(&header)?;

    for row in &summary.rows {
        let mut record: Vec<String> = row.group_key.clone();
        record.push(row.firm_count.to_string());
        record.push(row.survivor_count.to_string());
        record.push(row.non_survivor_count.to_string());
        record.push(row.survival_rate_pct.map(|r| format!("{r:.4}")).unwrap_or_default());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_cohort_summary<R: Read>(source: R) -> AnalysisResult<CohortSummary> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(source);
    let headers = reader.headers()?.clone();
    let width = headers.len();

    if width < COUNT_COLUMNS.len()
        || headers.iter().skip(width - COUNT_COLUMNS.len()).ne(COUNT_COLUMNS)
    {
        let missing = COUNT_COLUMNS
            .iter()
            .find(|c| !headers.iter().any(|h| h == **c))
            .copied()
            .unwrap_or(COUNT_COLUMNS[0]);
        return Err(AnalysisError::Schema {
            source_name: "cohort summary CSV".into(),
            column: missing.to_string(),
        });
    }

    let n_dims = width - COUNT_COLUMNS.len();
    let dimensions = headers.iter().take(n_dims).map(String::from).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let count = |i: usize| -> AnalysisResult<u64> {
            let raw = record.get(n_dims + i).unwrap_or("").trim();
            raw.parse().map_err(|_| {
                AnalysisError::Other(anyhow::anyhow!(
                    "{}: '{raw}' is not a count",
                    COUNT_COLUMNS[i]
                ))
            })
        };
        rows.push(CohortSummaryRow {
            group_key:          record.iter().take(n_dims).map(String::from).collect(),
            firm_count:         count(0)?,
            survivor_count:     count(1)?,
            non_survivor_count: count(2)?,
            survival_rate_pct:  record.get(n_dims + 3).and_then(|r| r.trim().parse().ok()),
        });
    }

    Ok(CohortSummary { dimensions, rows })
}
