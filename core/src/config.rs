use crate::error::{AnalysisError, AnalysisResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ── Significance level ─────────────────────────────────────────────

/// Threshold for the independence decision. Closed set by design of the
/// report: 1%, 5% or 10%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum SignificanceLevel {
    OnePercent,
    FivePercent,
    TenPercent,
}

impl SignificanceLevel {
    pub const ALL: [SignificanceLevel; 3] = [
        SignificanceLevel::OnePercent,
        SignificanceLevel::FivePercent,
        SignificanceLevel::TenPercent,
    ];

    pub fn value(self) -> f64 {
        match self {
            Self::OnePercent  => 0.01,
            Self::FivePercent => 0.05,
            Self::TenPercent  => 0.10,
        }
    }
}

impl Default for SignificanceLevel {
    fn default() -> Self {
        Self::FivePercent
    }
}

impl TryFrom<f64> for SignificanceLevel {
    type Error = AnalysisError;

    fn try_from(alpha: f64) -> AnalysisResult<Self> {
        Self::ALL
            .into_iter()
            .find(|level| (level.value() - alpha).abs() < 1e-9)
            .ok_or(AnalysisError::InvalidSignificance(alpha))
    }
}

impl From<SignificanceLevel> for f64 {
    fn from(level: SignificanceLevel) -> f64 {
        level.value()
    }
}

impl FromStr for SignificanceLevel {
    type Err = AnalysisError;

    fn from_str(s: &str) -> AnalysisResult<Self> {
        let alpha: f64 = s
            .trim()
            .parse()
            .map_err(|_| AnalysisError::InvalidSignificance(f64::NAN))?;
        Self::try_from(alpha)
    }
}

impl fmt::Display for SignificanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.value())
    }
}

// ── Input column layout ────────────────────────────────────────────

/// Header names of the firm registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmColumns {
    pub firm_id: String,
    pub observation_year: String,
    pub administrative_status: String,
    pub enterprise_category: String,
    pub primary_sector_code: String,
    pub age_years: String,
    pub workforce_band_code: String,
    pub survived_24m: String,
}

impl Default for FirmColumns {
    fn default() -> Self {
        Self {
            firm_id:               "siren".into(),
            observation_year:      "annee".into(),
            administrative_status: "etatAdministratifUniteLegale".into(),
            enterprise_category:   "categorieEntreprise".into(),
            primary_sector_code:   "activitePrincipaleUniteLegale".into(),
            age_years:             "anciennete".into(),
            workforce_band_code:   "trancheEffectifsUniteLegale".into(),
            survived_24m:          "Survie_24m".into(),
        }
    }
}

/// Header names of the state-aid registry, plus known aliases.
/// Aliases are rewritten to the canonical name before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AidColumns {
    pub enterprise_category: String,
    pub aid_measure_name: String,
    pub aid_measure_short_name: String,
    pub aid_amount: String,
    /// alias header -> canonical header
    pub aliases: BTreeMap<String, String>,
}

impl Default for AidColumns {
    fn default() -> Self {
        let amount = "montant";
        let aliases = [
            ("montant_aide", amount),
            ("montant_total", amount),
            ("Montant", amount),
            ("montant (€)", amount),
            ("aid_amount", amount),
            ("categorie_entreprise", "categorieEntreprise"),
            ("categorie", "categorieEntreprise"),
            ("nom_mesure", "mesure"),
            ("mesure_abregee", "mesure_courte"),
        ]
        .into_iter()
        .map(|(alias, canonical)| (alias.to_string(), canonical.to_string()))
        .collect();

        Self {
            enterprise_category:    "categorieEntreprise".into(),
            aid_measure_name:       "mesure".into(),
            aid_measure_short_name: "mesure_courte".into(),
            aid_amount:             amount.into(),
            aliases,
        }
    }
}

// ── Segmentation ───────────────────────────────────────────────────

/// Ordinal age bins: left-closed, right-open, lowest edge inclusive.
/// `edges[i]` is the lower edge of `labels[i]`; the last bin is open-ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgeBins {
    pub edges: Vec<f64>,
    pub labels: Vec<String>,
}

impl Default for AgeBins {
    fn default() -> Self {
        Self {
            edges: vec![0.0, 5.0, 10.0, 20.0, 30.0, 50.0, 100.0],
            labels: ["0–5", "5–10", "10–20", "20–30", "30–50", "50–100", "100+"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkforceBand {
    pub code: String,
    pub label: String,
}

/// Workforce band lookup. Table order is display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkforceConfig {
    /// Codes meaning "unknown" / "not applicable"; excluded entirely.
    pub sentinel_codes: Vec<String>,
    pub bands: Vec<WorkforceBand>,
    /// Label for codes missing from `bands`. Sorts last.
    pub other_label: String,
}

impl Default for WorkforceConfig {
    fn default() -> Self {
        let bands = [
            ("00", "0 salarié"),
            ("01", "1–2 salariés"),
            ("02", "3–5 salariés"),
            ("03", "6–9 salariés"),
            ("11", "10–19 salariés"),
            ("12", "20–49 salariés"),
            ("21", "50–99 salariés"),
            ("22", "100–199 salariés"),
            ("31", "200–249 salariés"),
            ("32", "250–499 salariés"),
            ("41", "500–999 salariés"),
            ("42", "1 000–1 999 salariés"),
            ("51", "2 000–4 999 salariés"),
            ("52", "5 000–9 999 salariés"),
            ("53", "10 000 salariés et plus"),
        ]
        .into_iter()
        .map(|(code, label)| WorkforceBand { code: code.into(), label: label.into() })
        .collect();

        Self {
            sentinel_codes: ["NN", "ND", "NA", "NAN", ""].into_iter().map(String::from).collect(),
            bands,
            other_label: "Other/NA".into(),
        }
    }
}

/// Grouping dimensions usable in aggregation tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionKind {
    Category,
    Sector,
    Year,
    AgeBand,
    WorkforceBand,
}

impl DimensionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Category      => "enterprise_category",
            Self::Sector        => "primary_sector_code",
            Self::Year          => "observation_year",
            Self::AgeBand       => "age_band",
            Self::WorkforceBand => "workforce_band",
        }
    }
}

// ── Top-level ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub cohort_year: i32,
    pub alpha: SignificanceLevel,
    pub closed_status: String,
    pub top_sectors: usize,
    pub firm_columns: FirmColumns,
    pub aid_columns: AidColumns,
    pub age_bins: AgeBins,
    pub workforce: WorkforceConfig,
    pub summary_dimensions: Vec<DimensionKind>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            cohort_year: 2020,
            alpha: SignificanceLevel::default(),
            closed_status: "C".into(),
            top_sectors: 10,
            firm_columns: FirmColumns::default(),
            aid_columns: AidColumns::default(),
            age_bins: AgeBins::default(),
            workforce: WorkforceConfig::default(),
            summary_dimensions: vec![
                DimensionKind::Category,
                DimensionKind::AgeBand,
                DimensionKind::WorkforceBand,
            ],
        }
    }
}

impl AnalysisConfig {
    /// Load from a JSON file. Missing keys fall back to defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: AnalysisConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Age bins need one label per edge and strictly increasing edges.
    pub fn validate(&self) -> anyhow::Result<()> {
        let bins = &self.age_bins;
        if bins.edges.is_empty() || bins.edges.len() != bins.labels.len() {
            anyhow::bail!(
                "age_bins: {} edges need as many labels, got {}",
                bins.edges.len(),
                bins.labels.len()
            );
        }
        if bins.edges.iter().any(|e| !e.is_finite()) || bins.edges.windows(2).any(|w| w[0] >= w[1]) {
            anyhow::bail!("age_bins: edges must be finite and strictly increasing");
        }
        Ok(())
    }
}
