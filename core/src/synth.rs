//! Synthetic registry generator: plausible firm and state-aid CSV files
//! for demos and tests.
//!
//! Same seed + same firm count = byte-identical output. The aid file
//! depends on the seed alone.

use crate::{
    config::{AidColumns, FirmColumns},
    error::AnalysisResult,
    rng::SeededRng,
};
use std::path::{Path, PathBuf};

pub const FIRMS_FILE: &str = "firms.csv";
pub const AID_FILE: &str = "aid.csv";

const YEARS: [i32; 4] = [2019, 2020, 2021, 2022];

/// (category, population weight, 24-month survival probability, aid scale)
const CATEGORIES: [(&str, f64, f64, f64); 4] = [
    ("PME", 0.75, 0.82, 40_000.0),
    ("ETI", 0.15, 0.90, 400_000.0),
    ("GE",  0.05, 0.94, 4_000_000.0),
    ("",    0.05, 0.75, 0.0),
];

const SECTORS: [&str; 10] = [
    "47.11A", "56.10A", "41.20A", "62.01Z", "10.71C",
    "49.41A", "86.21Z", "68.20A", "55.10Z", "45.20A",
];

const MEASURES: [(&str, &str); 3] = [
    ("Fonds de solidarité", "FDS"),
    ("Prêt garanti par l'État", "PGE"),
    ("Activité partielle", "AP"),
];

fn workforce_codes(category: &str) -> &'static [&'static str] {
    match category {
        "PME" => &["00", "01", "02", "03", "11", "12", "21", "22", "NN"],
        "ETI" => &["22", "31", "32", "41"],
        "GE"  => &["42", "51", "52", "53"],
        _     => &["NN", "00", "01"],
    }
}

pub struct SyntheticDataset {
    pub firms_csv: Vec<u8>,
    pub aid_csv:   Vec<u8>,
}

impl SyntheticDataset {
    pub fn generate(seed: u64, firm_count: usize) -> AnalysisResult<Self> {
        let mut firm_rng = SeededRng::for_file(seed, FIRMS_FILE);
        let mut aid_rng = SeededRng::for_file(seed, AID_FILE);
        Ok(Self {
            firms_csv: firms_csv(&mut firm_rng, firm_count, &FirmColumns::default())?,
            aid_csv:   aid_csv(&mut aid_rng, &AidColumns::default())?,
        })
    }

    /// Write `firms.csv` and `aid.csv` into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> AnalysisResult<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(dir)?;
        let firms = dir.join(FIRMS_FILE);
        let aid = dir.join(AID_FILE);
        std::fs::write(&firms, &self.firms_csv)?;
        std::fs::write(&aid, &self.aid_csv)?;
        log::info!("synthetic dataset written to {}", dir.display());
        Ok((firms, aid))
    }
}

fn firms_csv(rng: &mut SeededRng, firm_count: usize, cols: &FirmColumns) -> AnalysisResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        &cols.firm_id,
        &cols.observation_year,
        &cols.administrative_status,
        &cols.enterprise_category,
        &cols.primary_sector_code,
        &cols.age_years,
        &cols.workforce_band_code,
        &cols.survived_24m,
    ])?;

    let weights: Vec<f64> = CATEGORIES.iter().map(|c| c.1).collect();
    for i in 0..firm_count {
        let siren = 300_000_000 + i as i64 * 7;
        let (category, _, base_survival, _) = CATEGORIES[rng.pick_weighted(&weights)];
        let sector = SECTORS[rng.index_below(SECTORS.len())];
        let codes = workforce_codes(category);
        let workforce = codes[rng.index_below(codes.len())];
        let age_2020 = ((rng.pareto(1.0, 1.3) - 1.0) * 8.0).min(150.0);

        let p_survive = if age_2020 < 5.0 { base_survival - 0.08 } else { base_survival };
        let survived = rng.chance(p_survive);
        // Status is an independent signal; a few survivors still show as ceased.
        let closed = if survived { rng.chance(0.02) } else { rng.chance(0.8) };

        for year in YEARS {
            let observed = if year == 2020 { rng.chance(0.92) } else { rng.chance(0.6) };
            if !observed {
                continue;
            }
            let age = (age_2020 + f64::from(year - 2020)).max(0.0);
            let status = if closed && year >= 2021 { "C" } else { "A" };
            let repeats = if year == 2020 && rng.chance(0.02) { 2 } else { 1 };
            for _ in 0..repeats {
                writer.write_record([
                    siren.to_string(),
                    year.to_string(),
                    status.to_string(),
                    category.to_string(),
                    sector.to_string(),
                    format!("{age:.1}"),
                    workforce.to_string(),
                    u8::from(survived).to_string(),
                ])?;
            }
        }
    }
    Ok(writer.into_inner().map_err(|e| e.into_error())?)
}

fn aid_csv(rng: &mut SeededRng, cols: &AidColumns) -> AnalysisResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    // Aliased amount header, as found in the published registry.
    writer.write_record([
        cols.enterprise_category.as_str(),
        cols.aid_measure_name.as_str(),
        cols.aid_measure_short_name.as_str(),
        "montant_aide",
    ])?;

    for (category, _, _, scale) in CATEGORIES {
        if category.is_empty() {
            continue;
        }
        for (measure, short) in MEASURES {
            let amount = rng.pareto(scale, 1.5);
            writer.write_record([category, measure, short, format!("{amount:.2}").as_str()])?;
        }
    }
    Ok(writer.into_inner().map_err(|e| e.into_error())?)
}
