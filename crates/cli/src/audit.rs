//! `gstaudit` subcommands: engine runs, audit reports, statistics, exports,
//! graph summaries and invoice explanations.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;

use gstaudit_recon::engine::{
    parse_dashboard, parse_graph, parse_items, parse_trace, parse_vendors, summarize_graph,
};
use gstaudit_recon::model::{
    AnalyticsInput, AuditReport, BuyerTally, RiskBand, RootCauseEntry, SellerTally, Statistics,
};
use gstaudit_recon::trail::{explain_invoice, tax_vs_claimed};
use gstaudit_recon::{AnalyticsConfig, AuditError, AuditReportBuilder, Reconciliation};

use crate::exit_codes::EXIT_HIGH_RISK;
use crate::{emit, read_input, CliError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

/// Payloads shared by the report-producing commands.
#[derive(Args)]
pub struct Inputs {
    /// Reconciliation records (JSON array), or `-` for stdin
    #[arg(long)]
    items: PathBuf,

    /// Vendor detail payload (object or array)
    #[arg(long)]
    vendors: Option<PathBuf>,

    /// Dashboard summary payload (enables the compliance summary)
    #[arg(long)]
    dashboard: Option<PathBuf>,

    /// Analytics config (.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Run every derivation and print one JSON document
    #[command(after_help = "\
Examples:
  gstaudit run --items reconcile.json
  gstaudit run --items reconcile.json --graph graph.json --vendors vendors.json
  gstaudit run --items reconcile.json --config analytics.toml --output result.json")]
    Run {
        #[command(flatten)]
        inputs: Inputs,

        /// Graph snapshot payload (nodes + links)
        #[arg(long)]
        graph: Option<PathBuf>,

        /// Write JSON to file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Exit 6 when any HIGH-band record or vendor is present
        #[arg(long)]
        fail_on_high: bool,
    },

    /// Build the ITC audit report
    #[command(after_help = "\
Examples:
  gstaudit report --items reconcile.json --period 'FY 2025-26 Q2'
  gstaudit report --items reconcile.json --vendors vendors.json --format csv
  gstaudit report --items - --dashboard dashboard.json --fail-on-high < reconcile.json")]
    Report {
        #[command(flatten)]
        inputs: Inputs,

        /// Reporting period label (overrides config)
        #[arg(long)]
        period: Option<String>,

        /// Auditee GSTIN (overrides config)
        #[arg(long)]
        gstin: Option<String>,

        /// Pin the report timestamp (RFC 3339)
        #[arg(long)]
        generated_at: Option<String>,

        /// json: full report; csv: audit rows only
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,

        /// Write to file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Exit 6 when any HIGH-band record or vendor is present
        #[arg(long)]
        fail_on_high: bool,
    },

    /// Print reconciliation statistics, root causes and top parties
    #[command(after_help = "\
Examples:
  gstaudit stats --items reconcile.json
  gstaudit stats --items reconcile.json --top 10 --json")]
    Stats {
        /// Reconciliation records (JSON array), or `-` for stdin
        #[arg(long)]
        items: PathBuf,

        /// Number of sellers and buyers to rank
        #[arg(long, default_value_t = 5)]
        top: usize,

        /// Output JSON instead of the human summary
        #[arg(long)]
        json: bool,
    },

    /// Re-export reconciliation records as CSV or JSON
    #[command(after_help = "\
Examples:
  gstaudit export --items reconcile.json --format csv --output mismatches.csv")]
    Export {
        /// Reconciliation records (JSON array), or `-` for stdin
        #[arg(long)]
        items: PathBuf,

        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,

        /// Analytics config (.toml), for the CSV list delimiter
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write to file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Summarize a graph snapshot: degrees, risk quartiles, bands and states
    #[command(after_help = "\
Examples:
  gstaudit graph --graph graph.json
  gstaudit graph --graph graph.json --config analytics.toml --json")]
    Graph {
        /// Graph snapshot payload (nodes + links)
        #[arg(long)]
        graph: PathBuf,

        /// Analytics config (.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output JSON instead of the human summary
        #[arg(long)]
        json: bool,
    },

    /// Explain why a traced invoice is risky
    #[command(after_help = "\
Examples:
  gstaudit explain --trace trace.json")]
    Explain {
        /// Invoice trace payload
        #[arg(long)]
        trace: PathBuf,

        /// Output JSON instead of the sentence
        #[arg(long)]
        json: bool,
    },

    /// Validate an analytics config without running
    #[command(after_help = "\
Examples:
  gstaudit validate analytics.toml")]
    Validate {
        /// Path to the analytics .toml file
        config: PathBuf,
    },
}

pub fn cmd_audit(cmd: AuditCommands, quiet: bool) -> Result<(), CliError> {
    match cmd {
        AuditCommands::Run { inputs, graph, output, fail_on_high } => {
            cmd_run(inputs, graph, output, fail_on_high, quiet)
        }
        AuditCommands::Report { inputs, period, gstin, generated_at, format, output, fail_on_high } => {
            cmd_report(inputs, period, gstin, generated_at, format, output, fail_on_high, quiet)
        }
        AuditCommands::Stats { items, top, json } => cmd_stats(items, top, json),
        AuditCommands::Export { items, format, config, output } => cmd_export(items, format, config, output),
        AuditCommands::Graph { graph, config, json } => cmd_graph(graph, config, json),
        AuditCommands::Explain { trace, json } => cmd_explain(trace, json),
        AuditCommands::Validate { config } => cmd_validate(config),
    }
}

// ============================================================================
// Loading
// ============================================================================

fn input_err(path: &Path, e: AuditError) -> CliError {
    CliError::input(format!("{}: {e}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<AnalyticsConfig, CliError> {
    let Some(path) = path else {
        return Ok(AnalyticsConfig::default());
    };
    let text = read_input(path)?;
    AnalyticsConfig::from_toml(&text).map_err(|e| {
        CliError::config(format!("{}: {e}", path.display()))
            .with_hint(format!("gstaudit validate {}", path.display()))
    })
}

fn load_recon(path: &Path) -> Result<Reconciliation, CliError> {
    let text = read_input(path)?;
    Reconciliation::from_json(&text).map_err(|e| input_err(path, e))
}

/// At most one payload may come from stdin.
fn check_stdin(paths: &[Option<&Path>]) -> Result<(), CliError> {
    let stdin_count = paths
        .iter()
        .flatten()
        .filter(|p| **p == Path::new("-"))
        .count();
    if stdin_count > 1 {
        return Err(CliError::usage("only one input may be read from stdin (`-`)"));
    }
    Ok(())
}

fn load_inputs(inputs: &Inputs, graph: Option<&Path>) -> Result<(AnalyticsConfig, AnalyticsInput), CliError> {
    check_stdin(&[
        Some(inputs.items.as_path()),
        inputs.vendors.as_deref(),
        inputs.dashboard.as_deref(),
        inputs.config.as_deref(),
        graph,
    ])?;

    let config = load_config(inputs.config.as_deref())?;

    let items_text = read_input(&inputs.items)?;
    let items = parse_items(&items_text).map_err(|e| input_err(&inputs.items, e))?;

    let vendors = match inputs.vendors {
        Some(ref path) => parse_vendors(&read_input(path)?).map_err(|e| input_err(path, e))?,
        None => Vec::new(),
    };
    let dashboard = match inputs.dashboard {
        Some(ref path) => Some(parse_dashboard(&read_input(path)?).map_err(|e| input_err(path, e))?),
        None => None,
    };
    let graph = match graph {
        Some(path) => Some(parse_graph(&read_input(path)?).map_err(|e| input_err(path, e))?),
        None => None,
    };

    Ok((config, AnalyticsInput { items, graph, vendors, dashboard }))
}

fn has_high_risk(report: &AuditReport) -> bool {
    report.financial_impact.high_risk_vendors > 0
        || report
            .audit_items
            .iter()
            .any(|i| i.risk_level == Some(RiskBand::High))
}

fn high_risk_err(report: &AuditReport) -> CliError {
    let items = report
        .audit_items
        .iter()
        .filter(|i| i.risk_level == Some(RiskBand::High))
        .count();
    CliError {
        code: EXIT_HIGH_RISK,
        message: format!(
            "high-risk findings: {} record(s), {} vendor(s)",
            items, report.financial_impact.high_risk_vendors
        ),
        hint: None,
    }
}

fn print_report_summary(report: &AuditReport) {
    let fi = &report.financial_impact;
    eprintln!(
        "{}: {} records, ITC {} claimed, {} at risk ({:.1}%)",
        report.period,
        report.audit_items.len(),
        fi.total_itc_claimed,
        fi.itc_at_risk,
        fi.exposure_percentage,
    );
    eprintln!(
        "vendors: {} high, {} moderate, {} low",
        fi.high_risk_vendors, fi.moderate_risk_vendors, fi.low_risk_vendors,
    );
}

// ============================================================================
// run
// ============================================================================

fn cmd_run(
    inputs: Inputs,
    graph: Option<PathBuf>,
    output: Option<PathBuf>,
    fail_on_high: bool,
    quiet: bool,
) -> Result<(), CliError> {
    let (config, input) = load_inputs(&inputs, graph.as_deref())?;
    let result = gstaudit_recon::run(&config, &input);

    let json = serde_json::to_string_pretty(&result)
        .map_err(|e| CliError::export(format!("JSON serialization error: {e}")))?;
    emit(&json, output.as_deref())?;

    if !quiet {
        print_report_summary(&result.report);
        if let Some(ref g) = result.graph {
            eprintln!(
                "graph: {} top-degree node(s), {} node(s) at or above threshold",
                g.top_degrees.len(),
                g.filtered_node_count,
            );
        }
    }

    if fail_on_high && has_high_risk(&result.report) {
        return Err(high_risk_err(&result.report));
    }
    Ok(())
}

// ============================================================================
// report
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn cmd_report(
    inputs: Inputs,
    period: Option<String>,
    gstin: Option<String>,
    generated_at: Option<String>,
    format: ExportFormat,
    output: Option<PathBuf>,
    fail_on_high: bool,
    quiet: bool,
) -> Result<(), CliError> {
    let generated_at = match generated_at {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    CliError::usage(format!("invalid --generated-at '{raw}': {e}"))
                        .with_hint("use RFC 3339, e.g. 2025-10-01T00:00:00Z")
                })?,
        ),
        None => None,
    };

    let (mut config, input) = load_inputs(&inputs, None)?;
    if let Some(period) = period {
        config.report.period = period;
    }

    let recon = Reconciliation::new(input.items);
    let mut builder = AuditReportBuilder::from_config(&recon, &config).vendors(input.vendors);
    if let Some(gstin) = gstin {
        builder = builder.gstin(gstin);
    }
    if let Some(dashboard) = input.dashboard {
        builder = builder.dashboard(dashboard);
    }
    if let Some(at) = generated_at {
        builder = builder.generated_at(at);
    }

    let text = match format {
        ExportFormat::Json => builder.to_json(),
        ExportFormat::Csv => builder.to_csv(),
    }
    .map_err(|e| CliError::export(e.to_string()))?;
    emit(&text, output.as_deref())?;

    let report = builder.report();
    if !quiet {
        print_report_summary(report);
    }
    if fail_on_high && has_high_risk(report) {
        return Err(high_risk_err(report));
    }
    Ok(())
}

// ============================================================================
// stats
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsOutput {
    statistics: Statistics,
    root_causes: Vec<RootCauseEntry>,
    top_sellers: Vec<SellerTally>,
    top_buyers: Vec<BuyerTally>,
}

fn cmd_stats(items: PathBuf, top: usize, json: bool) -> Result<(), CliError> {
    let recon = load_recon(&items)?;
    let out = StatsOutput {
        statistics: recon.statistics(),
        root_causes: recon.root_cause_analysis(),
        top_sellers: recon.top_sellers(top),
        top_buyers: recon.top_buyers(top),
    };

    if json {
        let text = serde_json::to_string_pretty(&out)
            .map_err(|e| CliError::export(format!("JSON serialization error: {e}")))?;
        return emit(&text, None);
    }

    let s = &out.statistics;
    println!(
        "{} records: {} low, {} medium, {} high",
        s.total, s.low_risk, s.medium_risk, s.high_risk
    );
    if !out.root_causes.is_empty() {
        println!();
        println!("root causes:");
        for rc in &out.root_causes {
            println!("  {:>5.1}%  {:>4}  {}", rc.percentage, rc.count, rc.cause);
        }
    }
    if !out.top_sellers.is_empty() {
        println!();
        println!("top sellers:");
        for t in &out.top_sellers {
            println!("  {:>4}  {}", t.count, t.seller);
        }
    }
    if !out.top_buyers.is_empty() {
        println!();
        println!("top buyers:");
        for t in &out.top_buyers {
            println!("  {:>4}  {}", t.count, t.buyer);
        }
    }
    Ok(())
}

// ============================================================================
// export
// ============================================================================

fn cmd_export(
    items: PathBuf,
    format: ExportFormat,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    check_stdin(&[Some(items.as_path()), config.as_deref()])?;
    let config = load_config(config.as_deref())?;
    let recon = load_recon(&items)?;

    let text = match format {
        ExportFormat::Csv => recon.to_csv_with(&config.export),
        ExportFormat::Json => recon.to_json(),
    }
    .map_err(|e| CliError::export(e.to_string()))?;
    emit(&text, output.as_deref())
}

// ============================================================================
// graph
// ============================================================================

fn cmd_graph(graph: PathBuf, config: Option<PathBuf>, json: bool) -> Result<(), CliError> {
    check_stdin(&[Some(graph.as_path()), config.as_deref()])?;
    let config = load_config(config.as_deref())?;
    let snapshot = parse_graph(&read_input(&graph)?).map_err(|e| input_err(&graph, e))?;
    if snapshot.nodes.is_empty() {
        tracing::warn!(path = %graph.display(), "graph snapshot has no nodes");
    }
    let summary = summarize_graph(&config, &snapshot);

    if json {
        let text = serde_json::to_string_pretty(&summary)
            .map_err(|e| CliError::export(format!("JSON serialization error: {e}")))?;
        return emit(&text, None);
    }

    println!("{} nodes, {} links", snapshot.nodes.len(), snapshot.links.len());
    let b = &summary.band_counts;
    println!("bands: {} LOW, {} MEDIUM, {} HIGH", b.low, b.medium, b.high);
    if let Some(q) = summary.risk_distribution {
        println!(
            "risk: min {} / q1 {} / median {} / q3 {} / max {}",
            q.min, q.q1, q.median, q.q3, q.max
        );
    }
    println!(
        "{} node(s) with risk >= {}",
        summary.filtered_node_count, config.graph.risk_threshold
    );
    if !summary.top_degrees.is_empty() {
        println!();
        println!("top degree:");
        for d in &summary.top_degrees {
            println!("  {:>4}  {}", d.degree, d.id);
        }
    }
    if !summary.state_counts.is_empty() {
        println!();
        println!("states:");
        for (state, count) in &summary.state_counts {
            println!("  {:>4}  {}", count, state);
        }
    }
    Ok(())
}

// ============================================================================
// explain
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExplainOutput<'a> {
    invoice_id: &'a str,
    found: bool,
    explanation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tax_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    claimed_tax_amount: Option<f64>,
}

fn cmd_explain(trace: PathBuf, json: bool) -> Result<(), CliError> {
    let parsed = parse_trace(&read_input(&trace)?).map_err(|e| input_err(&trace, e))?;
    let explanation = explain_invoice(&parsed);

    if !json {
        println!("{explanation}");
        return Ok(());
    }

    let amounts = tax_vs_claimed(&parsed);
    let out = ExplainOutput {
        invoice_id: &parsed.invoice_id,
        found: parsed.found,
        explanation,
        tax_amount: amounts.map(|(t, _)| t),
        claimed_tax_amount: amounts.map(|(_, c)| c),
    };
    let text = serde_json::to_string_pretty(&out)
        .map_err(|e| CliError::export(format!("JSON serialization error: {e}")))?;
    emit(&text, None)
}

// ============================================================================
// validate
// ============================================================================

fn cmd_validate(config: PathBuf) -> Result<(), CliError> {
    let parsed = load_config(Some(&config))?;
    eprintln!(
        "{}: ok (period \"{}\", weighting {:?}, top_n {}, risk threshold {})",
        config.display(),
        parsed.report.period,
        parsed.report.root_cause_weighting,
        parsed.report.top_n,
        parsed.graph.risk_threshold,
    );
    Ok(())
}
