//! Independence tester: test selection, p-values, decision rule.

use relance_core::{
    config::SignificanceLevel,
    error::StatisticalPrecondition,
    grouping::IntensityGroup,
    independence::{self, ContingencyTable, Decision, TestStatistics},
};

fn table(counts: Vec<Vec<u64>>) -> ContingencyTable {
    ContingencyTable {
        row_labels:    (1..=counts.len()).map(|i| format!("Q{i}")).collect(),
        column_labels: vec!["0".into(), "1".into()],
        counts,
    }
}

#[test]
fn scenario_c_two_by_two_uses_fisher() {
    let result = independence::test(&table(vec![vec![5, 5], vec![2, 8]]), SignificanceLevel::FivePercent)
        .expect("2x2 table is testable");
    assert_eq!(result.test_name, "Fisher exact test");
    match result.statistics {
        TestStatistics::FisherExact { odds_ratio } => assert!((odds_ratio - 4.0).abs() < 1e-12),
        other => panic!("expected Fisher statistics, got {other:?}"),
    }
    assert!((result.p_value - 0.349_845_201_2).abs() < 1e-8, "p = {}", result.p_value);
    assert_eq!(result.decision, Decision::FailToReject);
}

#[test]
fn larger_tables_use_chi_square() {
    let t = table(vec![vec![30, 10], vec![20, 20], vec![10, 30]]);
    let result = independence::test(&t, SignificanceLevel::FivePercent).expect("3x2 table is testable");
    assert_eq!(result.test_name, "Chi-square test of independence");
    match &result.statistics {
        TestStatistics::ChiSquare { statistic, degrees_of_freedom, expected } => {
            assert_eq!(*degrees_of_freedom, 2);
            // Row totals 40 each, column totals 60/60 → every expected cell is 20.
            assert!(expected.iter().flatten().all(|e| (e - 20.0).abs() < 1e-12));
            assert!((statistic - 20.0).abs() < 1e-9, "statistic = {statistic}");
        }
        other => panic!("expected Chi-square statistics, got {other:?}"),
    }
    assert!(result.p_value < 0.001);
    assert_eq!(result.decision, Decision::RejectIndependence);
}

#[test]
fn scenario_d_decision_rule() {
    let alpha = SignificanceLevel::FivePercent;
    assert_eq!(Decision::from_p_value(0.03, alpha), Decision::RejectIndependence);
    assert_eq!(Decision::from_p_value(0.20, alpha), Decision::FailToReject);
    assert_eq!(Decision::from_p_value(0.05, alpha), Decision::FailToReject, "p == alpha does not reject");
    assert_eq!(Decision::from_p_value(0.03, SignificanceLevel::OnePercent), Decision::FailToReject);
}

#[test]
fn p_value_stays_in_unit_interval() {
    let tables = [
        vec![vec![0, 10], vec![10, 0]],
        vec![vec![5, 5], vec![5, 5]],
        vec![vec![1, 0], vec![0, 1]],
        vec![vec![3, 9], vec![4, 2], vec![8, 8], vec![1, 12]],
    ];
    for counts in tables {
        let result = independence::test(&table(counts.clone()), SignificanceLevel::TenPercent)
            .unwrap_or_else(|e| panic!("{counts:?}: {e}"));
        assert!((0.0..=1.0).contains(&result.p_value), "{counts:?} -> p = {}", result.p_value);
    }
}

#[test]
fn balanced_table_has_p_of_one() {
    let result = independence::test(&table(vec![vec![5, 5], vec![5, 5]]), SignificanceLevel::FivePercent)
        .expect("testable");
    assert!((result.p_value - 1.0).abs() < 1e-9);
}

#[test]
fn untestable_tables_are_preconditions_not_errors() {
    let alpha = SignificanceLevel::FivePercent;
    assert_eq!(
        independence::test(&table(vec![]), alpha).unwrap_err(),
        StatisticalPrecondition::EmptyTable
    );
    assert_eq!(
        independence::test(&table(vec![vec![3, 4]]), alpha).unwrap_err(),
        StatisticalPrecondition::TooFewRows { rows: 1 }
    );
    // A whole outcome column is empty: expected frequencies are zero.
    let err = independence::test(&table(vec![vec![0, 4], vec![0, 6], vec![0, 2]]), alpha).unwrap_err();
    assert!(matches!(err, StatisticalPrecondition::ZeroExpectedFrequency { .. }), "{err}");
}

#[test]
fn table_from_outcomes_orders_rows_by_rank() {
    let high = IntensityGroup { rank: 1, label: "High (> median)".into() };
    let low = IntensityGroup { rank: 0, label: "Low (≤ median)".into() };
    let observations = vec![(&high, true), (&low, false), (&high, false), (&low, false), (&high, true)];

    let t = ContingencyTable::from_outcomes(observations);
    assert_eq!(t.row_labels, vec!["Low (≤ median)", "High (> median)"]);
    assert_eq!(t.column_labels, vec!["0", "1"]);
    assert_eq!(t.counts, vec![vec![2, 0], vec![1, 2]]);
    assert_eq!(t.total(), 5);
}
