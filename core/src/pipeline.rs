//! The analysis pipeline: loads nothing, owns nothing, runs stages.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1.  closure_overview
//!   2.  closures_by_category
//!   3.  closures_by_sector
//!   4.  closure_rate_by_year
//!   5.  closure_rate_by_age
//!   6.  survival_overview
//!   7.  survival_by_category
//!   8.  survival_by_age
//!   9.  survival_by_workforce
//!   10. cohort_summary
//!   11. aid_intensity
//!   12. independence_test
//!
//! RULES:
//!   - Inputs are immutable once loaded; the filter and cohort are derived
//!     once per run and shared read-only by every stage.
//!   - A stage that cannot run reports `Skipped(reason)`; it never blocks
//!     the stages after it.
//!   - Only fatal errors (`AnalysisError`) abort a run. An invalid config
//!     is one of them.

use crate::{
    cohort::build_cohort,
    config::AnalysisConfig,
    error::AnalysisResult,
    event::PipelineEvent,
    filter::FirmFilter,
    loader::{AidTable, FirmTable},
    report::{AnalysisReport, Section},
    segment::{Dimension, SegmentAggregator},
    stage::{AnalysisStage, StageContext, StageOutcome},
    stages::{
        AidIntensityStage, ClosureAxis, ClosureOverviewStage, ClosureRateStage, ClosureSharesStage,
        CohortSummaryStage, IndependenceStage, SurvivalByStage, SurvivalOverviewStage, TopSectorsStage,
    },
};
use std::sync::Arc;

/// What one run analyses. Tables are shared, typically from a `DatasetCache`.
#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub firms:  Arc<FirmTable>,
    pub aid:    Option<Arc<AidTable>>,
    pub filter: FirmFilter,
}

impl PipelineInput {
    pub fn new(firms: Arc<FirmTable>, aid: Option<Arc<AidTable>>) -> Self {
        Self { firms, aid, filter: FirmFilter::default() }
    }

    pub fn with_filter(mut self, filter: FirmFilter) -> Self {
        self.filter = filter;
        self
    }
}

pub struct Pipeline {
    config:     AnalysisConfig,
    aggregator: SegmentAggregator,
    stages:     Vec<Box<dyn AnalysisStage>>,
}

impl Pipeline {
    pub fn new(config: AnalysisConfig) -> Self {
        let aggregator = SegmentAggregator::new(config.age_bins.clone(), config.workforce.clone());
        Self { config, aggregator, stages: Vec::new() }
    }

    /// Build a pipeline with every stage registered.
    /// Call this instead of new() + manual register() calls.
    pub fn build(config: AnalysisConfig) -> Self {
        let mut pipeline = Pipeline::new(config);

        // EXECUTION ORDER: fixed, documented, never reordered.
        pipeline.register(Box::new(ClosureOverviewStage));
        pipeline.register(Box::new(ClosureSharesStage));
        pipeline.register(Box::new(TopSectorsStage));
        pipeline.register(Box::new(ClosureRateStage { axis: ClosureAxis::Year }));
        pipeline.register(Box::new(ClosureRateStage { axis: ClosureAxis::AgeBand }));
        pipeline.register(Box::new(SurvivalOverviewStage));
        pipeline.register(Box::new(SurvivalByStage {
            name:      "survival_by_category",
            dimension: Dimension::Category,
        }));
        pipeline.register(Box::new(SurvivalByStage {
            name:      "survival_by_age",
            dimension: Dimension::AgeBand { keep_unclassified: false },
        }));
        pipeline.register(Box::new(SurvivalByStage {
            name:      "survival_by_workforce",
            dimension: Dimension::WorkforceBand,
        }));
        pipeline.register(Box::new(CohortSummaryStage));
        pipeline.register(Box::new(AidIntensityStage));
        pipeline.register(Box::new(IndependenceStage));
        pipeline
    }

    /// Register a stage. Call in the documented execution order.
    pub fn register(&mut self, stage: Box<dyn AnalysisStage>) {
        self.stages.push(stage);
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every registered stage once over `input`.
    /// A config that fails `AnalysisConfig::validate` aborts before any stage.
    pub fn run(&self, input: &PipelineInput) -> AnalysisResult<AnalysisReport> {
        self.config.validate()?;
        let mut report = AnalysisReport::new(&self.config, input.filter.clone());

        report.events.push(PipelineEvent::RunStarted {
            run_id:    report.run_id.clone(),
            firm_rows: input.firms.records.len(),
            aid_rows:  input.aid.as_ref().map(|a| a.records.len()),
        });

        let firms = if input.filter.is_empty() {
            input.firms.records.clone()
        } else {
            let filtered = input.filter.apply(&input.firms.records);
            report.events.push(PipelineEvent::FilterApplied {
                rows_before: input.firms.records.len(),
                rows_after:  filtered.len(),
            });
            filtered
        };

        let cohort = build_cohort(&firms, self.config.cohort_year);
        report.events.push(PipelineEvent::CohortBuilt {
            year:  self.config.cohort_year,
            firms: cohort.len(),
        });

        let ctx = StageContext {
            config:     &self.config,
            aggregator: &self.aggregator,
            firms:      &firms,
            present:    input.firms.present,
            cohort:     &cohort,
            aid:        input.aid.as_ref().map(|a| a.records.as_slice()),
        };

        // Execute each stage in registration order.
        for stage in &self.stages {
            let outcome = stage.run(&ctx)?;
            let event = match &outcome {
                StageOutcome::Computed(_) => {
                    log::info!("{}: computed", stage.name());
                    PipelineEvent::StageComputed { stage: stage.name().to_string() }
                }
                StageOutcome::Skipped(reason) => {
                    log::warn!("{}: skipped ({reason})", stage.name());
                    PipelineEvent::StageSkipped {
                        stage:  stage.name().to_string(),
                        reason: reason.clone(),
                    }
                }
            };
            report.events.push(event);
            report.sections.push(Section { name: stage.name().to_string(), outcome });
        }

        report.events.push(PipelineEvent::RunCompleted {
            computed: report.computed_count(),
            skipped:  report.skipped_count(),
        });
        Ok(report)
    }
}
