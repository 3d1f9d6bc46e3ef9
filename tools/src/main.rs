//! relance-runner: headless closure and survival analysis.
//!
//! Usage:
//!   relance-runner --firms firms.csv --aid aid.csv --report report.json
//!   relance-runner --firms firms.csv --category PME --min-age 0 --max-age 10
//!   relance-runner --synthetic ./data --seed 42 --firm-count 5000 --export summary.csv

use anyhow::Result;
use relance_core::{
    cache::DatasetCache,
    config::{AnalysisConfig, SignificanceLevel},
    export::write_cohort_summary,
    filter::FirmFilter,
    loader::DatasetLoader,
    pipeline::{Pipeline, PipelineInput},
    report::AnalysisReport,
    stage::{SectionPayload, StageOutcome},
    synth::SyntheticDataset,
};
use std::env;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let firm_count = parse_arg(&args, "--firm-count", 2_000usize);
    let config_path = find_arg(&args, "--config");
    let report_path = find_arg(&args, "--report");
    let export_path = find_arg(&args, "--export");
    let synthetic_dir = find_arg(&args, "--synthetic");

    let mut config = match config_path {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(raw) = find_arg(&args, "--alpha") {
        config.alpha = raw.parse::<SignificanceLevel>()?;
    }

    let (mut firms_path, mut aid_path) = (
        find_arg(&args, "--firms").map(PathBuf::from),
        find_arg(&args, "--aid").map(PathBuf::from),
    );
    if let Some(dir) = synthetic_dir {
        let dataset = SyntheticDataset::generate(seed, firm_count)?;
        let (firms, aid) = dataset.write_to(Path::new(dir))?;
        firms_path.get_or_insert(firms);
        aid_path.get_or_insert(aid);
    }
    let Some(firms_path) = firms_path else {
        anyhow::bail!("--firms <path> is required (or --synthetic <dir>)");
    };

    let filter = FirmFilter {
        categories: collect_args(&args, "--category"),
        sectors:    collect_args(&args, "--sector"),
        age_range:  age_range(&args),
    };

    println!("Relance: closure & survival runner");
    println!("  firms:     {}", firms_path.display());
    println!("  aid:       {}", aid_path.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| "(none)".into()));
    println!("  cohort:    {}", config.cohort_year);
    println!("  alpha:     {}", config.alpha);
    if !filter.is_empty() {
        println!("  filter:    {}", serde_json::to_string(&filter)?);
    }
    println!();

    let loader = DatasetLoader::new(config.firm_columns.clone(), config.aid_columns.clone());
    let mut cache = DatasetCache::new();
    let firms = cache.firms(&loader, &firms_path)?;
    let aid = aid_path.as_deref().map(|p| cache.aid(&loader, p)).transpose()?;
    log::debug!("dataset cache: {} hit(s), {} miss(es)", cache.hits(), cache.misses());

    let pipeline = Pipeline::build(config);
    let report = pipeline.run(&PipelineInput::new(firms, aid).with_filter(filter))?;

    print_summary(&report);

    if let Some(path) = report_path {
        std::fs::write(path, report.to_json()?)
            .map_err(|e| anyhow::anyhow!("Cannot write {path}: {e}"))?;
        println!("\n  report written to {path}");
    }
    if let Some(path) = export_path {
        match report.cohort_summary() {
            Some(summary) => {
                let out = File::create(path).map_err(|e| anyhow::anyhow!("Cannot write {path}: {e}"))?;
                write_cohort_summary(summary, BufWriter::new(out))?;
                println!("  cohort summary written to {path}");
            }
            None => log::warn!("cohort_summary was skipped; nothing exported to {path}"),
        }
    }

    Ok(())
}

fn print_summary(report: &AnalysisReport) {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:         {}", report.run_id);
    println!("  cohort year:    {}", report.cohort_year);
    println!("  sections:       {} computed, {} skipped", report.computed_count(), report.skipped_count());
    for section in &report.sections {
        match &section.outcome {
            StageOutcome::Computed(_)     => println!("    {:<24} ok", section.name),
            StageOutcome::Skipped(reason) => println!("    {:<24} skipped: {reason}", section.name),
        }
    }

    println!();
    println!("=== SURVIVAL ===");
    match report.payload("survival_overview") {
        Some(SectionPayload::SurvivalOverview(s)) => {
            println!("  cohort size:    {}", s.cohort_size);
            println!("  survivors:      {}", s.survivors);
            println!("  non-survivors:  {}", s.non_survivors);
            println!("  survival rate:  {}", fmt_pct(s.survival_rate));
        }
        _ => println!("  (not computed)"),
    }
    if let Some(SectionPayload::ClosureOverview(c)) = report.payload("closure_overview") {
        println!("  closure rate:   {} ({} of {} firms)", fmt_pct(c.closure_rate), c.closed_count, c.firm_count);
    }

    println!();
    println!("=== AID INTENSITY vs SURVIVAL ===");
    match report.payload("independence_test") {
        Some(SectionPayload::Independence(r)) => {
            println!("  grouping:       {} over {} firm(s)", r.grouping_method, r.joined_firms);
            for g in &r.groups {
                println!(
                    "    {:<16} n={:<6} survival {}",
                    g.label,
                    g.firm_count,
                    fmt_pct(g.survival_rate)
                );
            }
            println!("  test:           {}", r.test.test_name);
            println!("  p-value:        {:.4} (alpha {:.2})", r.test.p_value, r.test.threshold);
            println!("  decision:       {:?}", r.test.decision);
            println!("  note:           {}", r.caveat);
        }
        _ => println!("  (not computed)"),
    }
}

fn fmt_pct(rate: Option<f64>) -> String {
    rate.map(|r| format!("{r:.2}%")).unwrap_or_else(|| "n/a".into())
}

fn age_range(args: &[String]) -> Option<(f64, f64)> {
    let min = find_arg(args, "--min-age").and_then(|v| v.parse::<f64>().ok());
    let max = find_arg(args, "--max-age").and_then(|v| v.parse::<f64>().ok());
    match (min, max) {
        (None, None) => None,
        (lo, hi) => Some((lo.unwrap_or(0.0), hi.unwrap_or(f64::MAX))),
    }
}

fn find_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

/// Every value of a repeatable flag, in command-line order.
fn collect_args(args: &[String], flag: &str) -> Vec<String> {
    args.windows(2).filter(|w| w[0] == flag).map(|w| w[1].clone()).collect()
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
