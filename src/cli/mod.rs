//! memsentinel CLI
//!
//! Subcommands for the full pipeline: preprocess, train, scan, report,
//! history and dataset inspection.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data::{load_csv_cached, DataSearcher};
use crate::preprocessing::{DatasetPreprocessor, ScalePolicy, CLASS_COLUMN};
use crate::report::{HtmlReport, ReportDocument};
use crate::scan::{ScanEngine, ScanHistory};
use crate::training::{require_artifact, ModelReport, ModelSelection, ModelTrainer};
use crate::visualization::{Pca, PcaConfig};

/// Fitted preprocessor artifact stored next to the models
const PREPROCESSOR_ARTIFACT: &str = "preprocessor.json";

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}
fn accent(s: &str) -> ColoredString {
    s.truecolor(120, 170, 255)
}
fn muted(s: &str) -> ColoredString {
    s.truecolor(140, 140, 140)
}
fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}
fn alert(s: &str) -> ColoredString {
    s.truecolor(255, 90, 90)
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "memsentinel")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Memory-forensics malware detection pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the preprocessing pipeline and show the resulting split
    Preprocess {
        /// Labeled dataset CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Scaler fit source (full, train-only)
        #[arg(long, default_value = "full")]
        scale_policy: String,

        /// Held-out fraction
        #[arg(long, default_value = "0.2")]
        test_fraction: f64,

        /// Split seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Train models and persist artifacts to the registry
    Train {
        /// Labeled dataset CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Which model families (base, advanced, all)
        #[arg(short, long, default_value = "all")]
        models: String,

        /// Model registry directory
        #[arg(short, long, default_value = "models")]
        registry: PathBuf,

        /// Scaler fit source (full, train-only)
        #[arg(long, default_value = "full")]
        scale_policy: String,
    },

    /// Scan feature rows with the persisted models
    Scan {
        /// Feature CSV to scan
        #[arg(short, long)]
        data: PathBuf,

        /// Model registry directory
        #[arg(short, long, default_value = "models")]
        registry: PathBuf,

        /// History JSON file to append the records to
        #[arg(long)]
        history: Option<PathBuf>,

        /// Write an HTML report here
        #[arg(long)]
        html: Option<PathBuf>,

        /// Write a PDF report here
        #[arg(long)]
        pdf: Option<PathBuf>,
    },

    /// Rebuild reports from stored history
    Report {
        /// History JSON file
        #[arg(long)]
        history: PathBuf,

        /// Write an HTML report here
        #[arg(long)]
        html: Option<PathBuf>,

        /// Write a PDF report here
        #[arg(long)]
        pdf: Option<PathBuf>,
    },

    /// Show, filter, export or clear the scan history
    History {
        /// History JSON file
        #[arg(short, long)]
        path: PathBuf,

        /// Only records with this status (Malware, Benign)
        #[arg(long)]
        status: Option<String>,

        /// Export the records as CSV
        #[arg(long)]
        export: Option<PathBuf>,

        /// Remove the history file
        #[arg(long)]
        clear: bool,
    },

    /// Show dataset shape, dtypes, nulls and PCA explained variance
    Inspect {
        /// Dataset CSV
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Filter a CSV with a query expression (e.g. "pslist.nproc > 40 & svcscan.kernel_drivers <= 3")
    Query {
        /// Dataset CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Query expression, clauses joined with '&'
        #[arg(short, long)]
        expr: String,
    },
}

fn parse_scale_policy(value: &str) -> anyhow::Result<ScalePolicy> {
    match value {
        "full" => Ok(ScalePolicy::FitFull),
        "train-only" => Ok(ScalePolicy::TrainOnly),
        other => anyhow::bail!("invalid scale policy '{other}' (expected full or train-only)"),
    }
}

fn parse_selection(value: &str) -> anyhow::Result<ModelSelection> {
    match value {
        "base" => Ok(ModelSelection::Base),
        "advanced" => Ok(ModelSelection::Advanced),
        "all" => Ok(ModelSelection::All),
        other => anyhow::bail!("invalid model selection '{other}' (expected base, advanced or all)"),
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_preprocess(
    data: &Path,
    scale_policy: &str,
    test_fraction: f64,
    seed: u64,
) -> anyhow::Result<()> {
    section("Preprocess");

    let policy = parse_scale_policy(scale_policy)?;
    step_run("Preparing dataset");
    let start = Instant::now();
    let mut preprocessor = DatasetPreprocessor::with_scale_policy(policy);
    let split = preprocessor.prepare(data, test_fraction, seed)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!(
        "  {:<18} {} × {}",
        muted("Train"),
        split.x_train.nrows(),
        split.feature_names.len()
    );
    println!(
        "  {:<18} {} × {}",
        muted("Test"),
        split.x_test.nrows(),
        split.feature_names.len()
    );

    if let Some(y) = &split.y_class_train {
        let malware = y.iter().filter(|&&v| v == 1).count();
        println!(
            "  {:<18} {} malware / {} benign (train)",
            muted("Class balance"),
            malware,
            y.len() - malware
        );
    } else {
        println!("  {:<18} {}", muted("Class balance"), alert("no Class column"));
    }

    if preprocessor.family_encoder().is_fitted() {
        println!("  {:<18}", muted("Family codes"));
        for (code, family) in preprocessor.family_encoder().classes().iter().enumerate() {
            println!("    {:>3}  {}", dim(&code.to_string()), family);
        }
    }
    println!();
    Ok(())
}

pub fn cmd_train(
    data: &Path,
    models: &str,
    registry: &Path,
    scale_policy: &str,
) -> anyhow::Result<()> {
    section("Train");

    let policy = parse_scale_policy(scale_policy)?;
    let selection = parse_selection(models)?;

    step_run("Preparing dataset");
    let start = Instant::now();
    let mut preprocessor = DatasetPreprocessor::with_scale_policy(policy);
    let split = preprocessor.prepare(data, 0.2, 42)?;
    step_done(&format!(
        "{} train / {} test rows in {:?}",
        split.x_train.nrows(),
        split.x_test.nrows(),
        start.elapsed()
    ));

    step_run(&format!("Training {} models", models.cyan()));
    let start = Instant::now();
    let mut trainer = ModelTrainer::new(registry);
    let reports = trainer.train(&split, selection)?.clone();
    step_done(&format!("{:?}", start.elapsed()));

    std::fs::create_dir_all(registry)?;
    preprocessor.save(registry.join(PREPROCESSOR_ARTIFACT))?;
    step_ok("fitted preprocessor persisted");

    println!();
    println!(
        "  {:<22} {:>9} {:>9} {:>9} {:>9}",
        muted("model"),
        muted("acc"),
        muted("prec"),
        muted("rec"),
        muted("f1")
    );
    for (name, report) in &reports {
        match report {
            ModelReport::Binary(m) => println!(
                "  {:<22} {:>9.4} {:>9.4} {:>9.4} {:>9.4}",
                name, m.accuracy, m.precision, m.recall, m.f1_score
            ),
            ModelReport::Multiclass(m) => println!(
                "  {:<22} {:>9.4} {:>9} {:>9} {:>9}",
                name,
                m.accuracy,
                dim("macro"),
                format!("{:.4}", m.macro_recall),
                format!("{:.4}", m.macro_f1)
            ),
            ModelReport::Anomaly { flagged_fraction } => println!(
                "  {:<22} {:>9} flagged {:.1}% of held-out rows",
                name,
                dim("-"),
                flagged_fraction * 100.0
            ),
        }
    }

    println!();
    for (artifact, present) in trainer.registry_status() {
        if present {
            step_ok(&artifact);
        }
    }
    println!();
    Ok(())
}

pub fn cmd_scan(
    data: &Path,
    registry: &Path,
    history: Option<&Path>,
    html: Option<&Path>,
    pdf: Option<&Path>,
) -> anyhow::Result<()> {
    section("Scan");

    step_run("Loading models");
    let preprocessor =
        DatasetPreprocessor::load_fitted(require_artifact(registry, PREPROCESSOR_ARTIFACT)?)?;
    let engine = ScanEngine::from_registry(preprocessor, registry)?;
    step_done("ensemble, anomaly detector, multiclass MLP");

    step_run("Scanning");
    let start = Instant::now();
    let df = load_csv_cached(data)?;
    let records = engine.scan(&df)?;
    step_done(&format!("{} rows in {:?}", records.len(), start.elapsed()));

    let malware = records.iter().filter(|r| r.is_malware()).count();
    let anomalies = records.iter().filter(|r| r.is_anomaly).count();
    println!();
    println!("  {:<12} {}", muted("Scanned"), records.len());
    println!("  {:<12} {}", muted("Benign"), records.len() - malware);
    println!(
        "  {:<12} {}",
        muted("Malware"),
        if malware > 0 {
            malware.to_string().red().bold()
        } else {
            malware.to_string().normal()
        }
    );
    println!("  {:<12} {}", muted("Anomalies"), anomalies);
    println!();

    for r in &records {
        let status = if r.is_malware() {
            r.status.red().bold()
        } else {
            r.status.green()
        };
        let flag = if r.is_anomaly { alert(" [anomaly]") } else { "".normal() };
        println!(
            "  {:>5}  {:<10} {:<14} {:>6.1}%  {:>8.4}{}",
            r.sample_id, status, r.malware_type, r.confidence, r.anomaly_score, flag
        );
    }

    if let Some(history_path) = history {
        ScanHistory::new(history_path).append_all(records.iter().cloned())?;
        step_ok(&format!("history appended → {}", history_path.display()));
    }
    write_reports(&records, html, pdf)?;

    println!();
    Ok(())
}

pub fn cmd_report(history: &Path, html: Option<&Path>, pdf: Option<&Path>) -> anyhow::Result<()> {
    section("Report");

    let records = ScanHistory::new(history).load();
    if records.is_empty() {
        println!("  {}", muted("history is empty, nothing to report"));
        println!();
        return Ok(());
    }
    println!("  {:<12} {}", muted("Records"), records.len());

    write_reports(&records, html, pdf)?;
    println!();
    Ok(())
}

pub fn cmd_history(
    path: &Path,
    status: Option<&str>,
    export: Option<&Path>,
    clear: bool,
) -> anyhow::Result<()> {
    section("History");

    let history = ScanHistory::new(path);

    if clear {
        history.clear()?;
        step_ok("history cleared");
        println!();
        return Ok(());
    }

    let records = match status {
        Some(status) => history.filter_by_status(status),
        None => history.load(),
    };
    println!("  {:<12} {}", muted("Records"), records.len());
    for r in &records {
        println!(
            "  {}  {:>5}  {:<10} {:<14} {:>6.1}%",
            dim(&r.timestamp),
            r.sample_id,
            r.status,
            r.malware_type,
            r.confidence
        );
    }

    if let Some(out) = export {
        history.export_csv(out)?;
        step_ok(&format!("exported → {}", out.display()));
    }
    println!();
    Ok(())
}

pub fn cmd_inspect(data: &Path) -> anyhow::Result<()> {
    section("Inspect");

    let df = load_csv_cached(data)?;
    println!("  {:<14} {} × {}", muted("Shape"), df.height(), df.width());

    println!("  {:<14}", muted("Columns"));
    let nulls = df.null_count();
    for (column, null_count) in df.get_columns().iter().zip(nulls.get_columns()) {
        let null_count = null_count
            .as_materialized_series()
            .get(0)
            .map(|v| v.to_string())
            .unwrap_or_else(|_| "0".to_string());
        println!(
            "    {:<34} {:<10} {} nulls",
            column.name().as_str(),
            dim(&column.dtype().to_string()),
            null_count
        );
    }

    if let Ok(class) = df.column(CLASS_COLUMN) {
        let series = class.as_materialized_series();
        let mut counts: std::collections::BTreeMap<String, usize> = Default::default();
        for i in 0..series.len() {
            if let Ok(v) = series.get(i) {
                *counts.entry(v.to_string().trim_matches('"').to_string()).or_default() += 1;
            }
        }
        println!("  {:<14}", muted("Class balance"));
        for (label, count) in counts {
            println!("    {:<12} {}", label, count);
        }
    }

    // PCA over the numeric columns, capped for responsiveness
    let numeric: Vec<&str> = df
        .get_columns()
        .iter()
        .filter(|c| c.dtype().is_primitive_numeric())
        .map(|c| c.name().as_str())
        .collect();
    if numeric.len() >= 2 {
        let capped = df.head(Some(df.height().min(2000)));
        let selected = capped.select(numeric.iter().copied())?;
        let x = frame_to_f64(&selected)?;
        let result = Pca::new(PcaConfig::default()).fit_transform(&x)?;
        println!("  {:<14}", muted("PCA variance"));
        for (i, ratio) in result.explained_variance_ratio.iter().enumerate() {
            println!("    PC{}  {:.1}%", i + 1, ratio * 100.0);
        }
    }
    println!();
    Ok(())
}

pub fn cmd_query(data: &Path, expr: &str) -> anyhow::Result<()> {
    section("Query");

    let df = load_csv_cached(data)?;
    let matched = DataSearcher::query(&df, expr);
    println!(
        "  {} of {} rows match {}",
        matched.height(),
        df.height(),
        dim(expr)
    );
    if matched.height() > 0 {
        println!("{}", matched.head(Some(20)));
    }
    println!();
    Ok(())
}

fn write_reports(
    records: &[crate::scan::ScanRecord],
    html: Option<&Path>,
    pdf: Option<&Path>,
) -> anyhow::Result<()> {
    if let Some(out) = html {
        let report = HtmlReport::new();
        std::fs::write(out, report.generate(records))?;
        step_ok(&format!("HTML report → {}", out.display()));
    }
    if let Some(out) = pdf {
        let doc = ReportDocument::from_records(records);
        std::fs::write(out, doc.to_pdf())?;
        step_ok(&format!("PDF report → {}", out.display()));
    }
    Ok(())
}

fn frame_to_f64(df: &DataFrame) -> anyhow::Result<ndarray::Array2<f64>> {
    let n_rows = df.height();
    let n_cols = df.width();
    let mut data = Vec::with_capacity(n_rows * n_cols);
    let casted: Vec<Series> = df
        .get_columns()
        .iter()
        .map(|c| c.as_materialized_series().cast(&DataType::Float64))
        .collect::<PolarsResult<_>>()?;
    for i in 0..n_rows {
        for series in &casted {
            data.push(series.f64()?.get(i).unwrap_or(f64::NAN));
        }
    }
    Ok(ndarray::Array2::from_shape_vec((n_rows, n_cols), data)?)
}

/// Dispatch a parsed command line
pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Preprocess {
            data,
            scale_policy,
            test_fraction,
            seed,
        } => cmd_preprocess(&data, &scale_policy, test_fraction, seed),
        Commands::Train {
            data,
            models,
            registry,
            scale_policy,
        } => cmd_train(&data, &models, &registry, &scale_policy),
        Commands::Scan {
            data,
            registry,
            history,
            html,
            pdf,
        } => cmd_scan(
            &data,
            &registry,
            history.as_deref(),
            html.as_deref(),
            pdf.as_deref(),
        ),
        Commands::Report { history, html, pdf } => {
            cmd_report(&history, html.as_deref(), pdf.as_deref())
        }
        Commands::History {
            path,
            status,
            export,
            clear,
        } => cmd_history(&path, status.as_deref(), export.as_deref(), clear),
        Commands::Inspect { data } => cmd_inspect(&data),
        Commands::Query { data, expr } => cmd_query(&data, &expr),
    }
}
