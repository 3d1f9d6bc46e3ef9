//! Aid intensity per category, the firm join, and its intensity grouping.

use relance_core::{
    aid::{compute_intensity, join_to_firms},
    cohort::CohortFirm,
    grouping::{make_groups, GroupingMethod, HIGH_LABEL, LOW_LABEL},
    loader::AidRecord,
};

fn aid(category: &str, amount: f64) -> AidRecord {
    AidRecord {
        enterprise_category:    category.into(),
        aid_measure_name:       "Fonds de solidarité".into(),
        aid_measure_short_name: "FDS".into(),
        aid_amount:             amount,
    }
}

fn cohort_firm(id: i64, category: &str) -> CohortFirm {
    CohortFirm {
        firm_id:               id,
        observation_year:      2020,
        administrative_status: "A".into(),
        enterprise_category:   category.into(),
        primary_sector_code:   "47.11A".into(),
        age_years:             Some(5.0),
        workforce_band_code:   "01".into(),
        survived_24m:          id % 2 == 0,
    }
}

/// 10 PME firms then 10 GE firms.
fn scenario_b_cohort() -> Vec<CohortFirm> {
    (0..20)
        .map(|i| cohort_firm(i, if i < 10 { "PME" } else { "GE" }))
        .collect()
}

#[test]
fn scenario_b_intensities_cascade_to_median_split() {
    let aid_table = vec![aid("PME", 600.0), aid("PME", 400.0), aid("GE", 9000.0)];
    let cohort = scenario_b_cohort();

    let intensities = compute_intensity(&aid_table, &cohort);
    let by_name: Vec<(&str, Option<f64>)> = intensities
        .iter()
        .map(|c| (c.enterprise_category.as_str(), c.intensity))
        .collect();
    assert_eq!(by_name, vec![("GE", Some(900.0)), ("PME", Some(100.0))]);
    assert_eq!(intensities[1].total_aid_amount, 1000.0, "aid summed per category");
    assert_eq!(intensities[1].firm_count_2020, 10);

    let joined = join_to_firms(&cohort, &intensities);
    assert_eq!(joined.len(), 20);

    let values: Vec<f64> = joined.iter().map(|j| j.intensity).collect();
    let grouping = make_groups(&values);
    assert!(
        matches!(grouping.method, GroupingMethod::MedianSplit { .. }),
        "two distinct values cannot be binned: {}",
        grouping.method
    );
    assert_eq!(grouping.distinct_groups(), 2);
    for (group, j) in grouping.assignments.iter().zip(&joined) {
        let expected = if j.firm.enterprise_category == "PME" { LOW_LABEL } else { HIGH_LABEL };
        assert_eq!(group.label, expected);
    }
}

#[test]
fn category_without_cohort_firms_has_no_intensity() {
    let intensities = compute_intensity(&[aid("ETI", 5000.0)], &scenario_b_cohort());
    assert_eq!(intensities.len(), 1);
    assert_eq!(intensities[0].firm_count_2020, 0);
    assert_eq!(intensities[0].intensity, None, "no division by zero");
}

#[test]
fn join_drops_firms_without_aid_data() {
    let mut cohort = scenario_b_cohort();
    cohort.push(cohort_firm(99, "ETI"));
    cohort.push(cohort_firm(100, ""));

    let intensities = compute_intensity(&[aid("PME", 1000.0), aid("", 50.0)], &cohort);
    assert!(intensities.iter().all(|c| !c.enterprise_category.is_empty()), "blank category dropped");

    let joined = join_to_firms(&cohort, &intensities);
    assert_eq!(joined.len(), 10, "only PME firms have an intensity");
    assert!(joined.iter().all(|j| j.firm.enterprise_category == "PME"));
    assert!(joined.iter().all(|j| j.intensity == 100.0));
}

#[test]
fn zero_aid_is_a_defined_intensity() {
    let intensities = compute_intensity(&[aid("PME", 0.0)], &scenario_b_cohort());
    assert_eq!(intensities[0].intensity, Some(0.0));
}
