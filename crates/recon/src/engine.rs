use serde::de::DeserializeOwned;

use crate::aggregate::Reconciliation;
use crate::config::AnalyticsConfig;
use crate::error::AuditError;
use crate::graph::{band_counts, filter_by_risk, risk_scores, state_counts, top_degrees};
use crate::model::{
    AnalyticsInput, AnalyticsMeta, AnalyticsResult, DashboardSummary, GraphSnapshot, GraphSummary,
    InvoiceTrace, ReconcileItem, VendorInfo,
};
use crate::quantile::quantiles;
use crate::report::AuditReportBuilder;

/// Run every derivation for one request: statistics, rankings, the audit
/// report and, when a graph snapshot is supplied, the graph views.
pub fn run(config: &AnalyticsConfig, input: &AnalyticsInput) -> AnalyticsResult {
    let recon = Reconciliation::new(input.items.clone());

    let mut builder = AuditReportBuilder::from_config(&recon, config).vendors(input.vendors.iter().cloned());
    if let Some(ref dashboard) = input.dashboard {
        builder = builder.dashboard(dashboard.clone());
    }
    let report = builder.report().clone();

    let top_n = config.report.top_n;
    let result = AnalyticsResult {
        meta: AnalyticsMeta {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            item_count: recon.len(),
        },
        statistics: recon.statistics(),
        root_causes: recon.root_cause_analysis(),
        top_sellers: recon.top_sellers(top_n),
        top_buyers: recon.top_buyers(top_n),
        report,
        graph: input.graph.as_ref().map(|g| summarize_graph(config, g)),
    };

    tracing::debug!(
        items = result.meta.item_count,
        high_risk = result.statistics.high_risk,
        exposure = result.report.financial_impact.exposure_percentage,
        "analytics run complete"
    );
    result
}

/// Graph views used by the risk dashboards.
pub fn summarize_graph(config: &AnalyticsConfig, snapshot: &GraphSnapshot) -> GraphSummary {
    let filtered = filter_by_risk(snapshot, config.graph.risk_threshold);
    GraphSummary {
        top_degrees: top_degrees(&snapshot.links, config.graph.top_degree),
        risk_distribution: quantiles(&risk_scores(&snapshot.nodes)),
        band_counts: band_counts(&snapshot.nodes),
        state_counts: state_counts(&snapshot.nodes),
        filtered_node_count: filtered.nodes.len(),
    }
}

// ---------------------------------------------------------------------------
// Payload parsing
// ---------------------------------------------------------------------------

fn parse<T: DeserializeOwned>(what: &str, input: &str) -> Result<T, AuditError> {
    let value = serde_json::from_str(input)?;
    tracing::debug!(payload = what, bytes = input.len(), "parsed payload");
    Ok(value)
}

pub fn parse_items(input: &str) -> Result<Vec<ReconcileItem>, AuditError> {
    parse("items", input)
}

pub fn parse_graph(input: &str) -> Result<GraphSnapshot, AuditError> {
    parse("graph", input)
}

/// Accepts either a single vendor object or an array of them.
pub fn parse_vendors(input: &str) -> Result<Vec<VendorInfo>, AuditError> {
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<VendorInfo>),
        One(VendorInfo),
    }

    Ok(match parse::<OneOrMany>("vendors", input)? {
        OneOrMany::Many(v) => v,
        OneOrMany::One(v) => vec![v],
    })
}

pub fn parse_dashboard(input: &str) -> Result<DashboardSummary, AuditError> {
    parse("dashboard", input)
}

pub fn parse_trace(input: &str) -> Result<InvoiceTrace, AuditError> {
    parse("trace", input)
}
