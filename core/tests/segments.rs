//! Segment aggregation and the closure / survival views built on it.

use relance_core::{
    cohort::build_cohort,
    config::{AgeBins, WorkforceConfig},
    loader::FirmRecord,
    metrics,
    segment::{Denominator, Dimension, SegmentAggregator, UNCLASSIFIED_LABEL},
};

fn aggregator() -> SegmentAggregator {
    SegmentAggregator::new(AgeBins::default(), WorkforceConfig::default())
}

fn firm(id: i64, year: i32, status: &str, category: &str, age: f64, survived: bool) -> FirmRecord {
    FirmRecord {
        firm_id:               Some(id),
        observation_year:      Some(year),
        administrative_status: status.into(),
        enterprise_category:   category.into(),
        primary_sector_code:   "47.11A".into(),
        age_years:             Some(age),
        workforce_band_code:   "01".into(),
        survived_24m:          survived,
    }
}

fn scenario_a() -> Vec<FirmRecord> {
    vec![
        firm(1, 2020, "C", "PME", 3.0, false),
        firm(2, 2020, "A", "PME", 12.0, true),
    ]
}

#[test]
fn scenario_a_closure_and_survival() {
    let agg = aggregator();
    let firms = scenario_a();

    let closures = metrics::closure_overview(&agg, &firms, "C");
    assert_eq!(closures.firm_count, 2);
    assert_eq!(closures.closed_count, 1);
    assert_eq!(closures.closure_rate, Some(50.0));

    let cohort = build_cohort(&firms, 2020);
    let survival = metrics::survival_overview(&cohort, 2020);
    assert_eq!(survival.cohort_size, 2);
    assert_eq!(survival.survivors, 1);
    assert_eq!(survival.non_survivors, 1);
    assert_eq!(survival.survival_rate, Some(50.0));
}

#[test]
fn numerator_never_exceeds_denominator() {
    let agg = aggregator();
    // Firm 1 appears three times, closed in two of them.
    let firms = vec![
        firm(1, 2019, "A", "PME", 3.0, true),
        firm(1, 2020, "C", "PME", 4.0, true),
        firm(1, 2021, "C", "PME", 5.0, true),
        firm(2, 2020, "A", "ETI", 30.0, false),
        firm(3, 2020, "C", "ETI", 31.0, false),
    ];
    for denominator in [Denominator::UniqueFirms, Denominator::Rows] {
        let table = agg.aggregate(&firms, &[Dimension::Category], |f: &FirmRecord| f.administrative_status == "C", denominator);
        for row in &table.rows {
            assert!(
                row.count_numerator <= row.count_total,
                "{denominator:?} {:?}: {} > {}",
                row.group_key,
                row.count_numerator,
                row.count_total
            );
            let rate = row.rate.expect("non-empty group has a rate");
            assert!((0.0..=100.0).contains(&rate));
        }
    }

    let unique = agg.aggregate(&firms, &[Dimension::Category], |f: &FirmRecord| f.administrative_status == "C", Denominator::UniqueFirms);
    let pme = &unique.rows[1];
    assert_eq!(pme.group_key, vec!["PME".to_string()]);
    assert_eq!((pme.count_total, pme.count_numerator), (1, 1), "firm 1 counted once");

    let rows = metrics::closure_rate_by_year(&agg, &firms, "C");
    let totals: Vec<u64> = rows.rows.iter().map(|r| r.count_total).collect();
    assert_eq!(totals, vec![1, 3, 1], "one row per firm-year");
    assert_eq!(rows.rows.iter().map(|r| r.count_total).sum::<u64>(), firms.len() as u64);
}

#[test]
fn age_bands_follow_bin_order_not_label_order() {
    let agg = aggregator();
    let firms = vec![
        firm(1, 2020, "A", "PME", 120.0, true),
        firm(2, 2020, "C", "PME", 7.0, true),
        firm(3, 2020, "A", "PME", 0.0, true),
        firm(4, 2020, "A", "PME", 25.0, true),
    ];
    let table = metrics::closure_rate_by_age(&agg, &firms, "C");
    let labels: Vec<&str> = table.rows.iter().map(|r| r.group_key[0].as_str()).collect();
    assert_eq!(labels, vec!["0–5", "5–10", "20–30", "100+"]);
}

#[test]
fn ages_outside_the_bins_are_dropped_or_unclassified() {
    let agg = aggregator();
    let negative = firm(1, 2020, "A", "PME", -1.0, true);
    let mut unknown = firm(2, 2020, "A", "PME", 0.0, true);
    unknown.age_years = None;
    let firms = vec![negative, unknown, firm(3, 2020, "A", "PME", 2.0, true)];

    let dropped = agg.aggregate(&firms, &[Dimension::AgeBand { keep_unclassified: false }], |_: &FirmRecord| true, Denominator::UniqueFirms);
    assert_eq!(dropped.rows.len(), 1);

    let kept = agg.aggregate(&firms, &[Dimension::AgeBand { keep_unclassified: true }], |_: &FirmRecord| true, Denominator::UniqueFirms);
    let last = kept.rows.last().expect("rows");
    assert_eq!(last.group_key, vec![UNCLASSIFIED_LABEL.to_string()]);
    assert_eq!(last.count_total, 2);
}

#[test]
fn workforce_sentinels_are_excluded_and_unknown_codes_sort_last() {
    let agg = aggregator();
    let mut firms = vec![
        firm(1, 2020, "A", "PME", 1.0, true),
        firm(2, 2020, "A", "PME", 1.0, false),
        firm(3, 2020, "A", "PME", 1.0, true),
        firm(4, 2020, "A", "PME", 1.0, true),
    ];
    firms[0].workforce_band_code = "NN".into();
    firms[1].workforce_band_code = "99".into();
    firms[2].workforce_band_code = "12".into();
    firms[3].workforce_band_code = "00".into();

    let cohort = build_cohort(&firms, 2020);
    let table = metrics::survival_by(&agg, &cohort, &[Dimension::WorkforceBand]);
    let labels: Vec<&str> = table.rows.iter().map(|r| r.group_key[0].as_str()).collect();
    assert_eq!(labels, vec!["0 salarié", "20–49 salariés", "Other/NA"]);
}

#[test]
fn top_sectors_rank_by_closure_rate_and_truncate() {
    let agg = aggregator();
    let mut firms = Vec::new();
    for (i, (sector, closed)) in [
        ("47.11A", "A"), ("47.11A", "C"),
        ("56.10A", "C"), ("56.10A", "C"),
        ("62.01Z", "A"), ("62.01Z", "A"),
    ]
    .into_iter()
    .enumerate()
    {
        let mut f = firm(i as i64, 2020, closed, "PME", 5.0, true);
        f.primary_sector_code = sector.into();
        firms.push(f);
    }
    let table = metrics::top_sectors_by_closure(&agg, &firms, "C", 2);
    let sectors: Vec<&str> = table.rows.iter().map(|r| r.group_key[0].as_str()).collect();
    assert_eq!(sectors, vec!["56.10A", "47.11A"]);
}

#[test]
fn closure_shares_cover_all_closures() {
    let agg = aggregator();
    let firms = vec![
        firm(1, 2020, "C", "PME", 1.0, false),
        firm(2, 2020, "C", "PME", 1.0, false),
        firm(3, 2020, "C", "GE", 1.0, false),
        firm(4, 2020, "A", "ETI", 1.0, true),
    ];
    let shares = metrics::closure_shares_by_category(&agg, &firms, "C");
    assert_eq!(shares.len(), 2, "ETI has no closure and is left out");
    let total: f64 = shares.iter().filter_map(|s| s.share_pct).sum();
    assert!((total - 100.0).abs() < 1e-9);
}

#[test]
fn cohort_summary_counts_add_up() {
    let agg = aggregator();
    let firms = vec![
        firm(1, 2020, "A", "PME", 3.0, true),
        firm(2, 2020, "A", "PME", 3.5, false),
        firm(3, 2020, "A", "ETI", 40.0, true),
    ];
    let cohort = build_cohort(&firms, 2020);
    let summary = metrics::cohort_summary(&agg, &cohort, &[Dimension::Category, Dimension::AgeBand { keep_unclassified: false }]);
    assert_eq!(summary.dimensions, vec!["enterprise_category", "age_band"]);
    for row in &summary.rows {
        assert_eq!(row.survivor_count + row.non_survivor_count, row.firm_count);
    }
    assert_eq!(summary.rows.iter().map(|r| r.firm_count).sum::<u64>(), 3);
}
