//! Audit report: financial impact, per-item risk rows, vendor profiles,
//! root-cause shares and audit trails layered on one [`Reconciliation`].

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use once_cell::sync::OnceCell;

use crate::aggregate::{share, Reconciliation};
use crate::config::{AnalyticsConfig, ExportConfig, RootCauseWeighting};
use crate::error::AuditError;
use crate::export;
use crate::graph::classify;
use crate::model::{
    AuditItem, AuditReport, ComplianceSummary, DashboardSummary, FinancialImpact, Kpis,
    ReconcileItem, RiskBand, RootCauseBreakdown, VendorInfo, VendorRiskProfile,
};
use crate::trail::{audit_trail, issue_type};

/// Builds one [`AuditReport`] on first request and hands out the same value
/// afterwards. Shared references may call [`report`](Self::report) from
/// several threads; the report is still built once.
pub struct AuditReportBuilder<'a> {
    recon: &'a Reconciliation,
    gstin: Option<String>,
    period: String,
    dashboard: Option<DashboardSummary>,
    vendors: IndexMap<String, VendorInfo>,
    weighting: RootCauseWeighting,
    default_filing_consistency: f64,
    export: ExportConfig,
    generated_at: Option<DateTime<Utc>>,
    report: OnceCell<AuditReport>,
}

impl<'a> AuditReportBuilder<'a> {
    pub fn new(recon: &'a Reconciliation, period: impl Into<String>) -> Self {
        let defaults = AnalyticsConfig::default();
        Self {
            recon,
            gstin: None,
            period: period.into(),
            dashboard: None,
            vendors: IndexMap::new(),
            weighting: defaults.report.root_cause_weighting,
            default_filing_consistency: defaults.report.default_filing_consistency,
            export: defaults.export,
            generated_at: None,
            report: OnceCell::new(),
        }
    }

    /// Builder seeded from the `[report]` and `[export]` config sections.
    pub fn from_config(recon: &'a Reconciliation, config: &AnalyticsConfig) -> Self {
        let mut builder = Self::new(recon, config.report.period.clone());
        builder.gstin = config.report.gstin.clone();
        builder.weighting = config.report.root_cause_weighting;
        builder.default_filing_consistency = config.report.default_filing_consistency;
        builder.export = config.export.clone();
        builder
    }

    pub fn gstin(mut self, gstin: impl Into<String>) -> Self {
        self.gstin = Some(gstin.into());
        self
    }

    pub fn dashboard(mut self, dashboard: DashboardSummary) -> Self {
        self.dashboard = Some(dashboard);
        self
    }

    /// Upstream vendor fields, keyed by GSTIN. A later entry for the same
    /// GSTIN replaces an earlier one.
    pub fn vendors(mut self, vendors: impl IntoIterator<Item = VendorInfo>) -> Self {
        for v in vendors {
            self.vendors.insert(v.gstin.clone(), v);
        }
        self
    }

    pub fn weighting(mut self, weighting: RootCauseWeighting) -> Self {
        self.weighting = weighting;
        self
    }

    /// Pin the report timestamp instead of reading the clock.
    pub fn generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = Some(at);
        self
    }

    pub fn reconciliation(&self) -> &Reconciliation {
        self.recon
    }

    pub fn report(&self) -> &AuditReport {
        self.report.get_or_init(|| self.build())
    }

    /// CSV of the audit rows.
    pub fn to_csv(&self) -> Result<String, AuditError> {
        export::audit_items_to_csv(&self.report().audit_items, &self.export)
    }

    /// JSON of the whole report.
    pub fn to_json(&self) -> Result<String, AuditError> {
        export::to_json(self.report())
    }

    fn build(&self) -> AuditReport {
        let items = self.recon.items();
        tracing::debug!(items = items.len(), vendors = self.vendors.len(), "building audit report");

        let vendor_risk_profiles = self.vendor_profiles(items);
        let financial_impact = financial_impact(items, &vendor_risk_profiles);

        AuditReport {
            generated_at: self.generated_at.unwrap_or_else(Utc::now),
            gstin: self.gstin.clone(),
            period: self.period.clone(),
            financial_impact,
            audit_items: items.iter().map(audit_item).collect(),
            vendor_risk_profiles,
            root_cause_breakdown: self.root_cause_breakdown(items),
            graph_audit_trails: items.iter().filter_map(audit_trail).collect(),
            compliance_summary: self.dashboard.as_ref().map(|d| compliance_summary(&d.kpis)),
        }
    }

    /// One profile per distinct seller, in first-seen order.
    ///
    /// A vendor with no upstream score and no scored or banded items gets a
    /// network score of 0, which classifies LOW and counts toward
    /// `lowRiskVendors`.
    fn vendor_profiles(&self, items: &[ReconcileItem]) -> Vec<VendorRiskProfile> {
        let mut by_vendor: IndexMap<&str, Vec<&ReconcileItem>> = IndexMap::new();
        for item in items {
            by_vendor.entry(item.seller.as_str()).or_default().push(item);
        }

        by_vendor
            .into_iter()
            .map(|(vendor, vendor_items)| {
                let info = self.vendors.get(vendor);
                let network_risk_score = info
                    .and_then(|v| v.risk_score)
                    .unwrap_or_else(|| mean(vendor_items.iter().filter_map(|i| i.indicator_score())));
                let filing_consistency = info
                    .and_then(|v| v.filing_consistency)
                    .unwrap_or(self.default_filing_consistency);

                VendorRiskProfile {
                    vendor: vendor.to_string(),
                    filing_consistency,
                    mismatch_count: vendor_items.len(),
                    total_exposure: sum(vendor_items.iter().map(|i| i.itc_value())),
                    network_risk_score,
                    risk_level: classify(network_risk_score),
                }
            })
            .collect()
    }

    fn root_cause_breakdown(&self, items: &[ReconcileItem]) -> Vec<RootCauseBreakdown> {
        let mut amounts: IndexMap<&str, f64> = IndexMap::new();
        for item in items {
            for cause in &item.root_cause {
                *amounts.entry(cause.as_str()).or_insert(0.0) += item.itc_value();
            }
        }
        let total_amount = sum(amounts.values().copied());
        let by_amount = self.weighting == RootCauseWeighting::Amount && total_amount > 0.0;

        let mut breakdown = self
            .recon
            .root_cause_analysis()
            .into_iter()
            .map(|entry| {
                let amount = amounts.get(entry.cause.as_str()).copied().unwrap_or(0.0);
                let percentage = if by_amount {
                    share(amount, total_amount)
                } else {
                    entry.percentage
                };
                RootCauseBreakdown { cause: entry.cause, count: entry.count, amount, percentage }
            })
            .collect::<Vec<_>>();
        if by_amount {
            // stable sort: equal shares keep count order
            breakdown.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));
        }
        breakdown
    }
}

fn audit_item(item: &ReconcileItem) -> AuditItem {
    AuditItem {
        vendor: item.seller.clone(),
        invoice_no: item.invoice_id.clone(),
        itc_amount: item.itc_value(),
        issue_type: issue_type(item),
        risk_level: item.effective_band(),
        root_cause: item.root_cause.clone(),
    }
}

fn financial_impact(items: &[ReconcileItem], profiles: &[VendorRiskProfile]) -> FinancialImpact {
    let total_itc_claimed = sum(items.iter().map(ReconcileItem::itc_value));
    let itc_at_risk = sum(items.iter().filter(|i| i.is_at_risk()).map(ReconcileItem::itc_value));

    let mut impact = FinancialImpact {
        total_itc_claimed,
        valid_itc: total_itc_claimed - itc_at_risk,
        itc_at_risk,
        exposure_percentage: 100.0 * itc_at_risk / total_itc_claimed.max(1.0),
        ..Default::default()
    };
    for profile in profiles {
        match profile.risk_level {
            RiskBand::High => impact.high_risk_vendors += 1,
            RiskBand::Medium => impact.moderate_risk_vendors += 1,
            RiskBand::Low => impact.low_risk_vendors += 1,
            RiskBand::Unknown(_) => {}
        }
    }
    impact
}

/// `round(100 * (1 - high_risk / max(total, 1)))`, floored at zero.
fn compliance_score(high_risk: u64, total: u64) -> u32 {
    let ratio = high_risk as f64 / total.max(1) as f64;
    (100.0 * (1.0 - ratio)).round().max(0.0) as u32
}

fn compliance_summary(kpis: &Kpis) -> ComplianceSummary {
    ComplianceSummary {
        vendor_compliance_score: compliance_score(kpis.high_risk_taxpayers, kpis.taxpayers),
        invoice_compliance_score: compliance_score(kpis.high_risk_invoices, kpis.invoices),
        returns_filed: kpis.returns,
    }
}

/// Plain left fold from `0.0`; an empty sum is positive zero.
fn sum(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(0.0, |acc, v| acc + v)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}
