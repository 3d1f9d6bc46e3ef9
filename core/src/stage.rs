//! Stage trait and the shared, read-only context stages run against.
//!
//! RULE: every analysis section implements AnalysisStage.
//! A stage reads the context, never mutates it, and reports either a
//! computed payload or the precise precondition it is missing.

use crate::{
    aid::CategoryAidIntensity,
    cohort::CohortFirm,
    config::{AnalysisConfig, DimensionKind},
    error::{AnalysisResult, DataQualityWarning, SkipReason},
    grouping::GroupingMethod,
    independence::{ContingencyTable, IndependenceTest},
    loader::{AidRecord, FirmColumnsPresent, FirmRecord},
    metrics::{ClosureOverview, ClosureShare, CohortSummary, SurvivalOverview},
    segment::{SegmentAggregator, SegmentTable},
};
use serde::{Deserialize, Serialize};

/// Everything a stage may read. Built once per run.
pub struct StageContext<'a> {
    pub config:     &'a AnalysisConfig,
    pub aggregator: &'a SegmentAggregator,
    /// Firm rows after filtering, all years.
    pub firms:      &'a [FirmRecord],
    pub present:    FirmColumnsPresent,
    pub cohort:     &'a [CohortFirm],
    pub aid:        Option<&'a [AidRecord]>,
}

impl StageContext<'_> {
    fn missing(&self, present: bool, column: &str) -> Result<(), SkipReason> {
        if present {
            Ok(())
        } else {
            Err(DataQualityWarning::MissingColumn { column: column.to_string() }.into())
        }
    }

    pub fn require_dimension(&self, kind: DimensionKind) -> Result<(), SkipReason> {
        let cols = &self.config.firm_columns;
        match kind {
            DimensionKind::Category      => self.missing(self.present.enterprise_category, &cols.enterprise_category),
            DimensionKind::Sector        => self.missing(self.present.primary_sector_code, &cols.primary_sector_code),
            DimensionKind::Year          => self.missing(self.present.observation_year, &cols.observation_year),
            DimensionKind::AgeBand       => self.missing(self.present.age_years, &cols.age_years),
            DimensionKind::WorkforceBand => self.missing(self.present.workforce_band_code, &cols.workforce_band_code),
        }
    }

    pub fn dimension_available(&self, kind: DimensionKind) -> bool {
        self.require_dimension(kind).is_ok()
    }

    /// Closure metrics need the status column and at least one firm row.
    pub fn require_closures(&self) -> Result<(), SkipReason> {
        let cols = &self.config.firm_columns;
        self.missing(self.present.administrative_status, &cols.administrative_status)?;
        self.missing(self.present.firm_id, &cols.firm_id)?;
        if self.firms.is_empty() {
            return Err(DataQualityWarning::NoFirms.into());
        }
        Ok(())
    }

    /// Survival metrics need a non-empty cohort.
    pub fn require_cohort(&self) -> Result<(), SkipReason> {
        let cols = &self.config.firm_columns;
        self.missing(self.present.observation_year, &cols.observation_year)?;
        self.missing(self.present.firm_id, &cols.firm_id)?;
        if self.cohort.is_empty() {
            return Err(DataQualityWarning::EmptyCohort { year: self.config.cohort_year }.into());
        }
        Ok(())
    }
}

// ── Payloads ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub label:         String,
    pub firm_count:    u64,
    pub survivors:     u64,
    pub survival_rate: Option<f64>,
    pub min_intensity: f64,
    pub max_intensity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndependenceReport {
    pub grouping_method: GroupingMethod,
    pub joined_firms:    usize,
    pub groups:          Vec<GroupSummary>,
    pub table:           ContingencyTable,
    pub test:            IndependenceTest,
    pub caveat:          String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum SectionPayload {
    ClosureOverview(ClosureOverview),
    ClosureShares(Vec<ClosureShare>),
    Segments(SegmentTable),
    SurvivalOverview(SurvivalOverview),
    CohortSummary(CohortSummary),
    AidIntensity(Vec<CategoryAidIntensity>),
    Independence(Box<IndependenceReport>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum StageOutcome {
    Computed(SectionPayload),
    Skipped(SkipReason),
}

impl From<Result<SectionPayload, SkipReason>> for StageOutcome {
    fn from(result: Result<SectionPayload, SkipReason>) -> Self {
        match result {
            Ok(payload) => StageOutcome::Computed(payload),
            Err(reason) => StageOutcome::Skipped(reason),
        }
    }
}

impl StageOutcome {
    pub fn payload(&self) -> Option<&SectionPayload> {
        match self {
            StageOutcome::Computed(p) => Some(p),
            StageOutcome::Skipped(_)  => None,
        }
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            StageOutcome::Computed(_) => None,
            StageOutcome::Skipped(r)  => Some(r),
        }
    }
}

/// The contract every analysis section fulfills.
pub trait AnalysisStage {
    /// Unique stable name; also the section name in the report.
    fn name(&self) -> &'static str;

    fn run(&self, ctx: &StageContext<'_>) -> AnalysisResult<StageOutcome>;
}
