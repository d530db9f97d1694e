use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::graph::classify;
use crate::quantile::FiveNumberSummary;

// ---------------------------------------------------------------------------
// Risk band
// ---------------------------------------------------------------------------

/// Three-band risk label. Strings outside LOW/MEDIUM/HIGH are kept verbatim
/// in `Unknown` so malformed upstream records round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RiskBand {
    Low,
    Medium,
    High,
    Unknown(String),
}

impl RiskBand {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "LOW" => Self::Low,
            "MEDIUM" => Self::Medium,
            "HIGH" => Self::High,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Unknown(raw) => raw,
        }
    }

    /// HIGH and MEDIUM items count toward ITC at risk.
    pub fn is_at_risk(&self) -> bool {
        matches!(self, Self::High | Self::Medium)
    }

    /// Representative score for a band when no numeric score was supplied.
    pub fn proxy_score(&self) -> Option<f64> {
        match self {
            Self::Low => Some(20.0),
            Self::Medium => Some(55.5),
            Self::High => Some(85.5),
            Self::Unknown(_) => None,
        }
    }
}

impl std::fmt::Display for RiskBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RiskBand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RiskBand {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Treat an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Input: mismatch records
// ---------------------------------------------------------------------------

/// One reconciliation mismatch record.
///
/// Accepts both the camelCase export names and the snake_case names the
/// reconcile endpoint emits. Amounts are not validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileItem {
    pub seller: String,
    #[serde(default)]
    pub buyer: Option<String>,
    #[serde(default, alias = "invoice_id", deserialize_with = "null_as_default")]
    pub invoice_id: String,
    #[serde(default, alias = "tax_amount", deserialize_with = "null_as_default")]
    pub tax_amount: f64,
    #[serde(default, alias = "claimed_tax_amount", deserialize_with = "null_as_default")]
    pub claimed_tax_amount: f64,
    #[serde(default, alias = "root_cause", deserialize_with = "null_as_default")]
    pub root_cause: Vec<String>,
    #[serde(default, alias = "risk_band")]
    pub risk_band: Option<RiskBand>,
    #[serde(default, alias = "itc_amount", deserialize_with = "null_as_default")]
    pub itc_amount: f64,
    #[serde(default, alias = "risk_score", skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
}

impl ReconcileItem {
    /// ITC at stake on this record: `itc_amount`, or the claimed tax when the
    /// upstream record carries no explicit ITC figure.
    pub fn itc_value(&self) -> f64 {
        if self.itc_amount != 0.0 {
            self.itc_amount
        } else {
            self.claimed_tax_amount
        }
    }

    /// Numeric risk indicator: explicit score first, band proxy second.
    pub fn indicator_score(&self) -> Option<f64> {
        self.risk_score
            .or_else(|| self.risk_band.as_ref().and_then(RiskBand::proxy_score))
    }

    /// Band the report reads for this record: the upstream band, else the
    /// band of `risk_score`. `None` when the record carries neither.
    pub fn effective_band(&self) -> Option<RiskBand> {
        self.risk_band.clone().or_else(|| self.risk_score.map(classify))
    }

    pub fn is_at_risk(&self) -> bool {
        self.effective_band().is_some_and(|b| b.is_at_risk())
    }

    /// Buyer id when present and non-empty.
    pub fn resolved_buyer(&self) -> Option<&str> {
        self.buyer.as_deref().filter(|b| !b.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Input: graph snapshot, vendor data, dashboard counts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub links: Vec<GraphLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub properties: NodeProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_band: Option<RiskBand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Everything else the graph store attaches (gstin, cluster_id, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// Vendor-level fields from the vendor-risk endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VendorInfo {
    pub gstin: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub risk_band: Option<RiskBand>,
    #[serde(default)]
    pub pagerank_score: Option<f64>,
    #[serde(default)]
    pub degree_centrality: Option<f64>,
    #[serde(default)]
    pub cluster_id: Option<i64>,
    #[serde(default)]
    pub component_id: Option<i64>,
    #[serde(default)]
    pub filing_consistency: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    #[serde(default)]
    pub taxpayers: u64,
    #[serde(default)]
    pub invoices: u64,
    #[serde(default)]
    pub returns: u64,
    #[serde(default)]
    pub high_risk_taxpayers: u64,
    #[serde(default)]
    pub high_risk_invoices: u64,
}

/// Supplementary dashboard counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub kpis: Kpis,
    #[serde(default)]
    pub clusters: BTreeMap<String, u64>,
    #[serde(default)]
    pub components: BTreeMap<String, u64>,
}

// ---------------------------------------------------------------------------
// Input: invoice trace
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceTrace {
    pub invoice_id: String,
    pub found: bool,
    #[serde(default)]
    pub root_cause: Vec<String>,
    #[serde(default)]
    pub path: Vec<TraceNode>,
    #[serde(default)]
    pub risk_indicators: RiskIndicators,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TraceNode {
    Seller {
        #[serde(default)]
        gstin: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
    Invoice {
        invoice_id: String,
        #[serde(default)]
        tax_amount: Option<f64>,
        #[serde(default)]
        claimed_tax_amount: Option<f64>,
    },
    Buyer {
        #[serde(default)]
        gstin: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
    Return {
        return_id: String,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        filing_date: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskIndicators {
    #[serde(default)]
    pub seller_risk: Option<f64>,
    #[serde(default)]
    pub buyer_risk: Option<f64>,
    #[serde(default)]
    pub cluster_id: Option<i64>,
    #[serde(default)]
    pub component_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total: usize,
    pub low_risk: usize,
    pub medium_risk: usize,
    pub high_risk: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCauseEntry {
    pub cause: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerTally {
    pub seller: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerTally {
    pub buyer: String,
    pub count: usize,
}

// ---------------------------------------------------------------------------
// Audit report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialImpact {
    #[serde(rename = "totalITCClaimed")]
    pub total_itc_claimed: f64,
    #[serde(rename = "validITC")]
    pub valid_itc: f64,
    #[serde(rename = "itcAtRisk")]
    pub itc_at_risk: f64,
    #[serde(rename = "exposurePercentage")]
    pub exposure_percentage: f64,
    #[serde(rename = "highRiskVendors")]
    pub high_risk_vendors: usize,
    #[serde(rename = "moderateRiskVendors")]
    pub moderate_risk_vendors: usize,
    #[serde(rename = "lowRiskVendors")]
    pub low_risk_vendors: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueType {
    #[serde(rename = "GSTR-1 Not Filed")]
    NotFiled,
    #[serde(rename = "Missing Buyer Claim")]
    MissingClaim,
    #[serde(rename = "Tax Amount Mismatch")]
    AmountMismatch,
    #[serde(rename = "Other")]
    Other,
    #[serde(rename = "Unclassified")]
    Unclassified,
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFiled => write!(f, "GSTR-1 Not Filed"),
            Self::MissingClaim => write!(f, "Missing Buyer Claim"),
            Self::AmountMismatch => write!(f, "Tax Amount Mismatch"),
            Self::Other => write!(f, "Other"),
            Self::Unclassified => write!(f, "Unclassified"),
        }
    }
}

/// One row of the ITC risk breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditItem {
    pub vendor: String,
    pub invoice_no: String,
    pub itc_amount: f64,
    pub issue_type: IssueType,
    pub risk_level: Option<RiskBand>,
    pub root_cause: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorRiskProfile {
    pub vendor: String,
    pub filing_consistency: f64,
    pub mismatch_count: usize,
    pub total_exposure: f64,
    pub network_risk_score: f64,
    pub risk_level: RiskBand,
}

/// Root cause share of the report, weighted by amount or by count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCauseBreakdown {
    pub cause: String,
    pub count: usize,
    pub amount: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphAuditTrail {
    pub invoice: String,
    pub buyer: String,
    pub supplier: String,
    pub gstr1_status: String,
    pub gstr3b_payment: String,
    pub result: String,
    pub path: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceSummary {
    pub vendor_compliance_score: u32,
    pub invoice_compliance_score: u32,
    pub returns_filed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gstin: Option<String>,
    pub period: String,
    pub financial_impact: FinancialImpact,
    pub audit_items: Vec<AuditItem>,
    pub vendor_risk_profiles: Vec<VendorRiskProfile>,
    pub root_cause_breakdown: Vec<RootCauseBreakdown>,
    pub graph_audit_trails: Vec<GraphAuditTrail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_summary: Option<ComplianceSummary>,
}

// ---------------------------------------------------------------------------
// Graph-derived views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegreeEntry {
    pub id: String,
    pub degree: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandCounts {
    #[serde(rename = "LOW")]
    pub low: usize,
    #[serde(rename = "MEDIUM")]
    pub medium: usize,
    #[serde(rename = "HIGH")]
    pub high: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSummary {
    pub top_degrees: Vec<DegreeEntry>,
    pub risk_distribution: Option<FiveNumberSummary>,
    pub band_counts: BandCounts,
    pub state_counts: IndexMap<String, usize>,
    pub filtered_node_count: usize,
}

// ---------------------------------------------------------------------------
// One-call engine input / output
// ---------------------------------------------------------------------------

/// Everything the engine needs for one request, already fetched.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsInput {
    pub items: Vec<ReconcileItem>,
    pub graph: Option<GraphSnapshot>,
    pub vendors: Vec<VendorInfo>,
    pub dashboard: Option<DashboardSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsMeta {
    pub engine_version: String,
    pub run_at: String,
    pub item_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResult {
    pub meta: AnalyticsMeta,
    pub statistics: Statistics,
    pub root_causes: Vec<RootCauseEntry>,
    pub top_sellers: Vec<SellerTally>,
    pub top_buyers: Vec<BuyerTally>,
    pub report: AuditReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<GraphSummary>,
}
