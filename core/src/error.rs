//! Error taxonomy for the analysis pipeline.
//!
//! RULE: only schema problems abort a run.
//! Everything else (empty cohort, missing optional column, a table the
//! statistics cannot be computed on) is a value, not an error: stages
//! return `StageOutcome::Skipped(SkipReason)` and the run carries on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Schema error: mandatory column '{column}' missing from {source_name}")]
    Schema { source_name: String, column: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Significance level {0} is not one of 0.01, 0.05, 0.10")]
    InvalidSignificance(f64),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Non-fatal data conditions that downgrade one section to "skipped".
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    #[error("column '{column}' is absent from the firm registry")]
    MissingColumn { column: String },

    #[error("no firm records for observation year {year}")]
    EmptyCohort { year: i32 },

    #[error("no firm records remain after filtering")]
    NoFirms,

    #[error("no state-aid registry was supplied")]
    NoAidRegistry,

    #[error("no cohort firm belongs to a category with a defined aid intensity")]
    NoEligibleFirms,

    #[error("intensity grouping produced fewer than 2 groups ({distinct_values} distinct intensity value(s))")]
    TooFewGroups { distinct_values: usize },

    #[error("none of the summary dimensions is available in the firm registry")]
    NoSummaryDimensions,
}

/// Non-fatal conditions under which a statistic cannot be computed.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatisticalPrecondition {
    #[error("contingency table has no rows")]
    EmptyTable,

    #[error("contingency table needs at least 2 rows, found {rows}")]
    TooFewRows { rows: usize },

    #[error("contingency table needs at least 2 outcome columns, found {columns}")]
    TooFewColumns { columns: usize },

    #[error("expected frequency is zero in {axis} '{label}'")]
    ZeroExpectedFrequency { axis: String, label: String },
}

/// Why a pipeline section was not computed.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", content = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("data quality: {0}")]
    DataQuality(#[from] DataQualityWarning),

    #[error("not computed: {0}")]
    Statistical(#[from] StatisticalPrecondition),
}
