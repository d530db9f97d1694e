use std::path::PathBuf;

use gstaudit_recon::config::{AnalyticsConfig, RootCauseWeighting};
use gstaudit_recon::engine::{parse_dashboard, parse_graph, parse_items, parse_trace, parse_vendors, run};
use gstaudit_recon::model::{AnalyticsInput, IssueType, RiskBand, Statistics};
use gstaudit_recon::trail::{explain_invoice, tax_vs_claimed};
use gstaudit_recon::{AuditReportBuilder, Reconciliation};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture(name: &str) -> String {
    let path = fixtures_dir().join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

fn load_recon() -> Reconciliation {
    Reconciliation::from_json(&fixture("reconcile.json")).unwrap()
}

fn full_input() -> AnalyticsInput {
    AnalyticsInput {
        items: parse_items(&fixture("reconcile.json")).unwrap(),
        graph: Some(parse_graph(&fixture("graph.json")).unwrap()),
        vendors: parse_vendors(&fixture("vendors.json")).unwrap(),
        dashboard: Some(parse_dashboard(&fixture("dashboard.json")).unwrap()),
    }
}

fn config() -> AnalyticsConfig {
    AnalyticsConfig::from_toml(&fixture("analytics.toml")).unwrap()
}

// -------------------------------------------------------------------------
// Reconciliation aggregates
// -------------------------------------------------------------------------

#[test]
fn statistics_from_fixture() {
    let recon = load_recon();
    assert_eq!(recon.len(), 5);
    assert_eq!(
        recon.statistics(),
        Statistics { total: 5, low_risk: 2, medium_risk: 2, high_risk: 1 }
    );
}

#[test]
fn rankings_from_fixture() {
    let recon = load_recon();

    let sellers = recon.top_sellers(5);
    assert_eq!(sellers.len(), 3);
    assert_eq!(sellers[0].seller, "27ABCDE1234F1Z5");
    assert_eq!(sellers[0].count, 2);
    assert_eq!(sellers[1].seller, "33QWERT5678U1Z1");
    assert_eq!(sellers[2].count, 1);

    let buyers = recon.top_buyers(5);
    assert_eq!(buyers.len(), 4, "INV2005 has no buyer");

    let causes = recon.root_cause_analysis();
    let names: Vec<&str> = causes.iter().map(|c| c.cause.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Tax amount discrepancy detected",
            "Missing claim edge to buyer",
            "Invoice not reported in return"
        ]
    );
}

#[test]
fn json_export_round_trips() {
    let recon = load_recon();
    let back = Reconciliation::from_json(&recon.to_json().unwrap()).unwrap();
    assert_eq!(back.items(), recon.items());
}

#[test]
fn csv_export_shape() {
    let csv = load_recon().to_csv().unwrap();
    let mut reader = csv::Reader::from_reader(csv.as_bytes());
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers[2], "invoiceId");
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 5);
    assert_eq!(&rows[1][5], "Invoice not reported in return;Missing claim edge to buyer");
    assert_eq!(&rows[4][1], "");
    assert_eq!(&rows[2][7], "25000");
}

// -------------------------------------------------------------------------
// Audit report
// -------------------------------------------------------------------------

#[test]
fn audit_report_from_fixture() {
    let recon = load_recon();
    let vendors = parse_vendors(&fixture("vendors.json")).unwrap();
    let dashboard = parse_dashboard(&fixture("dashboard.json")).unwrap();
    let builder = AuditReportBuilder::from_config(&recon, &config())
        .vendors(vendors)
        .dashboard(dashboard);
    let report = builder.report();

    assert_eq!(report.period, "FY 2025-26 Q2");
    assert_eq!(report.gstin.as_deref(), Some("27ABCDE1234F1Z5"));

    let fi = &report.financial_impact;
    assert_eq!(fi.total_itc_claimed, 68500.0);
    assert_eq!(fi.itc_at_risk, 55000.0);
    assert_eq!(fi.valid_itc, 13500.0);
    assert!((fi.valid_itc + fi.itc_at_risk - fi.total_itc_claimed).abs() < 1e-9);
    assert!((fi.exposure_percentage - 100.0 * 55000.0 / 68500.0).abs() < 1e-9);
    assert_eq!((fi.high_risk_vendors, fi.moderate_risk_vendors, fi.low_risk_vendors), (1, 1, 1));

    let profiles = &report.vendor_risk_profiles;
    assert_eq!(profiles.len(), 3);
    assert_eq!(profiles[0].vendor, "27ABCDE1234F1Z5");
    assert_eq!(profiles[0].filing_consistency, 92.0);
    assert_eq!(profiles[0].total_exposure, 13500.0);
    assert_eq!(profiles[1].network_risk_score, 67.5);
    assert_eq!(profiles[1].filing_consistency, 50.0);
    assert_eq!(profiles[1].risk_level, RiskBand::Medium);
    assert_eq!(profiles[2].risk_level, RiskBand::High);

    assert_eq!(report.audit_items.len(), 5);
    assert_eq!(report.audit_items[1].issue_type, IssueType::NotFiled);

    let breakdown = &report.root_cause_breakdown;
    assert_eq!(breakdown[0].amount, 52500.0);
    assert_eq!(breakdown[1].cause, "Invoice not reported in return");
    assert_eq!(breakdown[1].amount, 37000.0);
    assert_eq!(breakdown[2].amount, 34000.0);
    assert!(breakdown.windows(2).all(|w| w[0].percentage >= w[1].percentage));
    let total: f64 = breakdown.iter().map(|b| b.percentage).sum();
    assert!((total - 100.0).abs() < 1e-9);

    assert_eq!(report.graph_audit_trails.len(), 4);
    let inv3003 = report
        .graph_audit_trails
        .iter()
        .find(|t| t.invoice == "INV3003")
        .unwrap();
    assert_eq!(inv3003.gstr1_status, "Not Filed");
    assert_eq!(inv3003.gstr3b_payment, "Underpaid");
    assert_eq!(inv3003.result, "ITC Blocked");

    let cs = report.compliance_summary.unwrap();
    assert_eq!(cs.vendor_compliance_score, 67);
    assert_eq!(cs.invoice_compliance_score, 80);
    assert_eq!(cs.returns_filed, 14);
}

#[test]
fn count_weighting_keeps_amounts() {
    let recon = load_recon();
    let builder = AuditReportBuilder::new(&recon, "Q2").weighting(RootCauseWeighting::Count);
    let breakdown = &builder.report().root_cause_breakdown;
    assert!((breakdown[0].percentage - 37.5).abs() < 1e-9);
    assert_eq!(breakdown[0].amount, 52500.0);
}

#[test]
fn report_json_parses_back() {
    let recon = load_recon();
    let builder = AuditReportBuilder::new(&recon, "Q2");
    let json = builder.to_json().unwrap();
    let parsed: gstaudit_recon::AuditReport = serde_json::from_str(&json).unwrap();
    assert_eq!(&parsed, builder.report());
}

// -------------------------------------------------------------------------
// One-call engine
// -------------------------------------------------------------------------

#[test]
fn full_run() {
    let result = run(&config(), &full_input());

    assert_eq!(result.meta.item_count, 5);
    assert_eq!(result.top_sellers.len(), 3);
    assert_eq!(result.top_buyers.len(), 3);

    let graph = result.graph.unwrap();
    let top: Vec<(&str, usize)> = graph.top_degrees.iter().map(|d| (d.id.as_str(), d.degree)).collect();
    assert_eq!(
        top,
        vec![
            ("33QWERT5678U1Z1", 3),
            ("INV1001", 2),
            ("29LMNOP4321Q1Z3", 2),
            ("15JKLM1234N1Z9", 2),
            ("27ABCDE1234F1Z5", 1),
        ]
    );

    let dist = graph.risk_distribution.unwrap();
    assert_eq!(dist.min, 0.0);
    assert_eq!(dist.q1, 27.5);
    assert_eq!(dist.median, 45.0);
    assert_eq!(dist.q3, 63.5);
    assert_eq!(dist.max, 85.0);

    assert_eq!((graph.band_counts.low, graph.band_counts.medium, graph.band_counts.high), (2, 2, 2));
    let states: Vec<&str> = graph.state_counts.keys().map(String::as_str).collect();
    assert_eq!(states, vec!["MH", "TN", "KA", "UP", "DL"]);
    assert_eq!(graph.state_counts["MH"], 2);
    assert_eq!(graph.filtered_node_count, 2);
}

#[test]
fn empty_run_is_well_formed() {
    let result = run(&AnalyticsConfig::default(), &AnalyticsInput::default());
    assert_eq!(result.statistics, Statistics::default());
    assert_eq!(result.report.financial_impact.exposure_percentage, 0.0);
    assert!(result.report.audit_items.is_empty());
    assert!(result.graph.is_none());

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["report"]["financialImpact"]["totalITCClaimed"], 0.0);
}

// -------------------------------------------------------------------------
// Invoice trace
// -------------------------------------------------------------------------

#[test]
fn trace_explanation_from_fixture() {
    let trace = parse_trace(&fixture("trace.json")).unwrap();
    assert_eq!(tax_vs_claimed(&trace), Some((22500.0, 25000.0)));
    assert_eq!(
        explain_invoice(&trace),
        "Invoice INV3003 is HIGH risk because involved party belongs to cluster 2 with root causes: \
         Tax amount discrepancy detected. Seller 29LMNOP4321Q1Z3 and Buyer 15JKLM1234N1Z9 show \
         risk scores 85, 72. Tax amounts: reported 22500 vs claimed 25000."
    );
}
