//! Dataset loader: schema validation, alias rewriting, normalization.

use relance_core::{
    config::{AidColumns, FirmColumns},
    error::AnalysisError,
    loader::DatasetLoader,
};

fn loader() -> DatasetLoader {
    DatasetLoader::new(FirmColumns::default(), AidColumns::default())
}

const FIRMS: &str = "\
siren,annee,etatAdministratifUniteLegale,categorieEntreprise,activitePrincipaleUniteLegale,anciennete,trancheEffectifsUniteLegale,Survie_24m
101,2020,c,PME,47.11A,3,1,0
102,2020.0, A ,ETI,56.10A,12.5,22,1
103,n/a,A,PME,47.11A,,NN,3
,2020,A,GE,62.01Z,40,53,
";

#[test]
fn firm_rows_are_normalized_not_rejected() {
    let table = loader().load_firms(FIRMS.as_bytes(), "firms.csv").expect("load firms");
    assert_eq!(table.records.len(), 4, "no row is dropped at load time");

    let first = &table.records[0];
    assert_eq!(first.firm_id, Some(101));
    assert_eq!(first.administrative_status, "C", "status upper-cased");
    assert_eq!(first.workforce_band_code, "01", "workforce code zero-padded");
    assert!(!first.survived_24m);

    let second = &table.records[1];
    assert_eq!(second.observation_year, Some(2020), "integral float year accepted");
    assert_eq!(second.administrative_status, "A", "status trimmed");
    assert_eq!(second.age_years, Some(12.5));

    let third = &table.records[2];
    assert_eq!(third.observation_year, None, "unparsable year becomes None");
    assert_eq!(third.age_years, None);
    assert!(third.survived_24m, "survival flag clamped to 1");

    let fourth = &table.records[3];
    assert_eq!(fourth.firm_id, None);
    assert!(!fourth.survived_24m, "missing survival flag defaults to 0");

    assert!(table.present.age_years && table.present.workforce_band_code);
}

#[test]
fn missing_survival_column_is_a_schema_error() {
    let csv = "siren,annee,etatAdministratifUniteLegale\n1,2020,A\n";
    match loader().load_firms(csv.as_bytes(), "firms.csv") {
        Err(AnalysisError::Schema { source_name, column }) => {
            assert_eq!(column, "Survie_24m");
            assert_eq!(source_name, "firms.csv");
        }
        other => panic!("expected a schema error, got {other:?}"),
    }
}

#[test]
fn missing_optional_columns_are_recorded_not_fatal() {
    let csv = "siren,annee,etatAdministratifUniteLegale,Survie_24m\n1,2020,A,1\n";
    let table = loader().load_firms(csv.as_bytes(), "firms.csv").expect("load firms");
    assert!(table.present.firm_id);
    assert!(!table.present.enterprise_category);
    assert!(!table.present.age_years);
    assert!(!table.present.workforce_band_code);
    assert_eq!(table.records[0].enterprise_category, "");
}

#[test]
fn aid_aliases_are_rewritten_before_validation() {
    let csv = "\
categorie,nom_mesure,mesure_abregee,montant_aide
PME,Fonds de solidarité,FDS,\"1 234,50\"
GE,Prêt garanti par l'État,PGE,-10
ETI,Activité partielle,AP,
";
    let table = loader().load_aid(csv.as_bytes(), "aid.csv").expect("load aid");
    assert_eq!(table.records.len(), 3);

    let pme = &table.records[0];
    assert_eq!(pme.enterprise_category, "PME");
    assert_eq!(pme.aid_measure_short_name, "FDS");
    assert!((pme.aid_amount - 1234.5).abs() < 1e-9, "French notation parsed: {}", pme.aid_amount);

    assert_eq!(table.records[1].aid_amount, 0.0, "negative amount clamped to 0");
    assert_eq!(table.records[2].aid_amount, 0.0, "missing amount defaults to 0");
    assert!(table.records.iter().all(|r| r.aid_amount >= 0.0));
}

#[test]
fn missing_amount_column_is_a_schema_error() {
    let csv = "categorieEntreprise,mesure\nPME,FDS\n";
    let err = loader().load_aid(csv.as_bytes(), "aid.csv").expect_err("no amount column");
    assert!(
        matches!(&err, AnalysisError::Schema { column, .. } if column == "montant"),
        "unexpected error: {err}"
    );
}

#[test]
fn byte_order_mark_does_not_hide_the_first_header() {
    let csv = "\u{feff}Survie_24m,siren\n1,7\n";
    let table = loader().load_firms(csv.as_bytes(), "bom.csv").expect("load firms");
    assert!(table.records[0].survived_24m);
    assert_eq!(table.records[0].firm_id, Some(7));
}

#[test]
fn dot_grouped_amounts_keep_their_magnitude() {
    let csv = "\
categorieEntreprise,montant
PME,\"1.234,56\"
GE,\"1.234.567,89 €\"
";
    let table = loader().load_aid(csv.as_bytes(), "aid.csv").expect("load aid");
    assert!((table.records[0].aid_amount - 1234.56).abs() < 1e-9, "got {}", table.records[0].aid_amount);
    assert!((table.records[1].aid_amount - 1_234_567.89).abs() < 1e-6, "got {}", table.records[1].aid_amount);
}

#[test]
fn negative_age_is_unknown() {
    let csv = "siren,annee,anciennete,Survie_24m\n1,2020,-2,1\n2,2020,0,1\n";
    let table = loader().load_firms(csv.as_bytes(), "firms.csv").expect("load firms");
    assert_eq!(table.records[0].age_years, None);
    assert_eq!(table.records[1].age_years, Some(0.0));
}
