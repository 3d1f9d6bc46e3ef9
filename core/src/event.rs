//! Run log: what happened, stage by stage.
//!
//! The pipeline appends one event per state change; the log travels with
//! the report so a reader can see why a section is missing without
//! re-running anything.

use crate::{error::SkipReason, types::RunId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    RunStarted {
        run_id:    RunId,
        firm_rows: usize,
        aid_rows:  Option<usize>,
    },
    FilterApplied {
        rows_before: usize,
        rows_after:  usize,
    },
    CohortBuilt {
        year:  i32,
        firms: usize,
    },
    StageComputed {
        stage: String,
    },
    StageSkipped {
        stage:  String,
        reason: SkipReason,
    },
    RunCompleted {
        computed: usize,
        skipped:  usize,
    },
}
