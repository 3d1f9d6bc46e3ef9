//! The concrete analysis stages, in the order the pipeline registers them.

use crate::{
    aid::{compute_intensity, join_to_firms},
    config::DimensionKind,
    error::{AnalysisResult, DataQualityWarning, SkipReason},
    grouping::{make_groups, IntensityGroup},
    independence::{self, ContingencyTable, NON_CAUSAL_CAVEAT},
    loader::{AidRecord, FirmRecord},
    metrics,
    segment::{Dimension, SegmentAggregator, SegmentTable},
    stage::{AnalysisStage, GroupSummary, IndependenceReport, SectionPayload, StageContext, StageOutcome},
    types::rate_pct,
};
use std::collections::BTreeMap;

// ── Closures (firm registry, all years) ──────────────────────────────────────

pub struct ClosureOverviewStage;

impl AnalysisStage for ClosureOverviewStage {
    fn name(&self) -> &'static str {
        "closure_overview"
    }

    fn run(&self, ctx: &StageContext<'_>) -> AnalysisResult<StageOutcome> {
        let result = ctx.require_closures().map(|()| {
            SectionPayload::ClosureOverview(metrics::closure_overview(
                ctx.aggregator,
                ctx.firms,
                &ctx.config.closed_status,
            ))
        });
        Ok(result.into())
    }
}

pub struct ClosureSharesStage;

impl AnalysisStage for ClosureSharesStage {
    fn name(&self) -> &'static str {
        "closures_by_category"
    }

    fn run(&self, ctx: &StageContext<'_>) -> AnalysisResult<StageOutcome> {
        let result = ctx
            .require_closures()
            .and_then(|()| ctx.require_dimension(DimensionKind::Category))
            .map(|()| {
                SectionPayload::ClosureShares(metrics::closure_shares_by_category(
                    ctx.aggregator,
                    ctx.firms,
                    &ctx.config.closed_status,
                ))
            });
        Ok(result.into())
    }
}

pub struct TopSectorsStage;

impl AnalysisStage for TopSectorsStage {
    fn name(&self) -> &'static str {
        "closures_by_sector"
    }

    fn run(&self, ctx: &StageContext<'_>) -> AnalysisResult<StageOutcome> {
        let result = ctx
            .require_closures()
            .and_then(|()| ctx.require_dimension(DimensionKind::Sector))
            .map(|()| {
                SectionPayload::Segments(metrics::top_sectors_by_closure(
                    ctx.aggregator,
                    ctx.firms,
                    &ctx.config.closed_status,
                    ctx.config.top_sectors,
                ))
            });
        Ok(result.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosureAxis {
    /// Row denominator: one row is one firm-year.
    Year,
    /// Unique-firm denominator over the age bins.
    AgeBand,
}

pub struct ClosureRateStage {
    pub axis: ClosureAxis,
}

impl AnalysisStage for ClosureRateStage {
    fn name(&self) -> &'static str {
        match self.axis {
            ClosureAxis::Year    => "closure_rate_by_year",
            ClosureAxis::AgeBand => "closure_rate_by_age",
        }
    }

    fn run(&self, ctx: &StageContext<'_>) -> AnalysisResult<StageOutcome> {
        let kind = match self.axis {
            ClosureAxis::Year    => DimensionKind::Year,
            ClosureAxis::AgeBand => DimensionKind::AgeBand,
        };
        let view: ClosureView = match self.axis {
            ClosureAxis::Year    => metrics::closure_rate_by_year,
            ClosureAxis::AgeBand => metrics::closure_rate_by_age,
        };
        let result = ctx
            .require_closures()
            .and_then(|()| ctx.require_dimension(kind))
            .map(|()| SectionPayload::Segments(view(ctx.aggregator, ctx.firms, &ctx.config.closed_status)));
        Ok(result.into())
    }
}

type ClosureView = fn(&SegmentAggregator, &[FirmRecord], &str) -> SegmentTable;

// ── Survival (cohort) ────────────────────────────────────────────────────────

pub struct SurvivalOverviewStage;

impl AnalysisStage for SurvivalOverviewStage {
    fn name(&self) -> &'static str {
        "survival_overview"
    }

    fn run(&self, ctx: &StageContext<'_>) -> AnalysisResult<StageOutcome> {
        let result = ctx.require_cohort().map(|()| {
            SectionPayload::SurvivalOverview(metrics::survival_overview(ctx.cohort, ctx.config.cohort_year))
        });
        Ok(result.into())
    }
}

pub struct SurvivalByStage {
    pub name:      &'static str,
    pub dimension: Dimension,
}

impl AnalysisStage for SurvivalByStage {
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(&self, ctx: &StageContext<'_>) -> AnalysisResult<StageOutcome> {
        let result = ctx
            .require_cohort()
            .and_then(|()| ctx.require_dimension(self.dimension.into()))
            .map(|()| SectionPayload::Segments(metrics::survival_by(ctx.aggregator, ctx.cohort, &[self.dimension])));
        Ok(result.into())
    }
}

/// The multi-dimension table behind the CSV export. Dimensions whose
/// column is absent are dropped; the table is skipped if none remain.
pub struct CohortSummaryStage;

impl AnalysisStage for CohortSummaryStage {
    fn name(&self) -> &'static str {
        "cohort_summary"
    }

    fn run(&self, ctx: &StageContext<'_>) -> AnalysisResult<StageOutcome> {
        let result = ctx.require_cohort().and_then(|()| {
            let dimensions: Vec<Dimension> = ctx
                .config
                .summary_dimensions
                .iter()
                .filter(|kind| {
                    let ok = ctx.dimension_available(**kind);
                    if !ok {
                        log::warn!("cohort_summary: dimension '{}' unavailable, dropped", kind.name());
                    }
                    ok
                })
                .map(|kind| Dimension::from(*kind))
                .collect();
            if dimensions.is_empty() {
                return Err(DataQualityWarning::NoSummaryDimensions.into());
            }
            Ok(SectionPayload::CohortSummary(metrics::cohort_summary(
                ctx.aggregator,
                ctx.cohort,
                &dimensions,
            )))
        });
        Ok(result.into())
    }
}

// ── State aid ────────────────────────────────────────────────────────────────

fn require_aid<'a>(ctx: &StageContext<'a>) -> Result<&'a [AidRecord], SkipReason> {
    ctx.aid.ok_or_else(|| DataQualityWarning::NoAidRegistry.into())
}

pub struct AidIntensityStage;

impl AnalysisStage for AidIntensityStage {
    fn name(&self) -> &'static str {
        "aid_intensity"
    }

    fn run(&self, ctx: &StageContext<'_>) -> AnalysisResult<StageOutcome> {
        let result = require_aid(ctx).and_then(|aid| {
            ctx.require_cohort()?;
            ctx.require_dimension(DimensionKind::Category)?;
            Ok(SectionPayload::AidIntensity(compute_intensity(aid, ctx.cohort)))
        });
        Ok(result.into())
    }
}

/// Aid intensity → ordinal groups → contingency table → independence test.
pub struct IndependenceStage;

impl IndependenceStage {
    fn compute(&self, ctx: &StageContext<'_>) -> Result<SectionPayload, SkipReason> {
        let aid = require_aid(ctx)?;
        ctx.require_cohort()?;
        ctx.require_dimension(DimensionKind::Category)?;

        let intensities = compute_intensity(aid, ctx.cohort);
        let joined = join_to_firms(ctx.cohort, &intensities);
        if joined.is_empty() {
            return Err(DataQualityWarning::NoEligibleFirms.into());
        }

        let values: Vec<f64> = joined.iter().map(|j| j.intensity).collect();
        let grouping = make_groups(&values);
        if grouping.is_failed() {
            let mut distinct = values.clone();
            distinct.sort_by(f64::total_cmp);
            distinct.dedup();
            return Err(DataQualityWarning::TooFewGroups { distinct_values: distinct.len() }.into());
        }

        let table = ContingencyTable::from_outcomes(
            grouping
                .assignments
                .iter()
                .zip(&joined)
                .map(|(group, j)| (group, j.firm.survived_24m)),
        );
        let test = independence::test(&table, ctx.config.alpha)?;

        let mut per_group: BTreeMap<&IntensityGroup, (u64, u64, f64, f64)> = BTreeMap::new();
        for (group, j) in grouping.assignments.iter().zip(&joined) {
            let entry = per_group
                .entry(group)
                .or_insert((0, 0, f64::INFINITY, f64::NEG_INFINITY));
            entry.0 += 1;
            entry.1 += u64::from(j.firm.survived_24m);
            entry.2 = entry.2.min(j.intensity);
            entry.3 = entry.3.max(j.intensity);
        }
        let groups = per_group
            .into_iter()
            .map(|(group, (count, survivors, min, max))| GroupSummary {
                label:         group.label.clone(),
                firm_count:    count,
                survivors,
                survival_rate: rate_pct(survivors, count),
                min_intensity: min,
                max_intensity: max,
            })
            .collect();

        log::info!(
            "independence: {} via {} on {} firm(s), p = {:.4}",
            test.test_name,
            grouping.method,
            joined.len(),
            test.p_value
        );

        Ok(SectionPayload::Independence(Box::new(IndependenceReport {
            grouping_method: grouping.method,
            joined_firms:    joined.len(),
            groups,
            table,
            test,
            caveat:          NON_CAUSAL_CAVEAT.to_string(),
        })))
    }
}

impl AnalysisStage for IndependenceStage {
    fn name(&self) -> &'static str {
        "independence_test"
    }

    fn run(&self, ctx: &StageContext<'_>) -> AnalysisResult<StageOutcome> {
        Ok(self.compute(ctx).into())
    }
}
