//! Report serialization: the full output of one run, as JSON.
//!
//! The report is what the presentation layer consumes: one section per
//! stage, in execution order, each either computed or skipped with its
//! reason, plus the run's event log.

use crate::{
    config::AnalysisConfig,
    error::AnalysisResult,
    event::PipelineEvent,
    filter::FirmFilter,
    metrics::CohortSummary,
    stage::{SectionPayload, StageOutcome},
    types::RunId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub name:    String,
    pub outcome: StageOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub run_id:       RunId,
    pub generated_at: DateTime<Utc>,
    pub cohort_year:  i32,
    pub alpha:        f64,
    pub filter:       FirmFilter,
    pub sections:     Vec<Section>,
    pub events:       Vec<PipelineEvent>,
}

impl AnalysisReport {
    pub fn new(config: &AnalysisConfig, filter: FirmFilter) -> Self {
        Self {
            run_id:       uuid::Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            cohort_year:  config.cohort_year,
            alpha:        config.alpha.value(),
            filter,
            sections:     Vec::new(),
            events:       Vec::new(),
        }
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// The payload of `name`, if that section was computed.
    pub fn payload(&self, name: &str) -> Option<&SectionPayload> {
        self.section(name).and_then(|s| s.outcome.payload())
    }

    pub fn cohort_summary(&self) -> Option<&CohortSummary> {
        match self.payload("cohort_summary") {
            Some(SectionPayload::CohortSummary(summary)) => Some(summary),
            _ => None,
        }
    }

    pub fn computed_count(&self) -> usize {
        self.sections.iter().filter(|s| s.outcome.payload().is_some()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.sections.len() - self.computed_count()
    }

    pub fn to_json(&self) -> AnalysisResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
