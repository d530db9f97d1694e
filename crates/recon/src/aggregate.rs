use indexmap::IndexMap;

use crate::config::ExportConfig;
use crate::error::AuditError;
use crate::export;
use crate::model::{BuyerTally, ReconcileItem, RiskBand, RootCauseEntry, SellerTally, Statistics};

/// Owns one fetched set of mismatch records and derives report-grade
/// aggregates from it. Records are never modified after construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    items: Vec<ReconcileItem>,
}

impl Reconciliation {
    pub fn new(items: Vec<ReconcileItem>) -> Self {
        Self { items }
    }

    /// Parse a JSON array of records as the reconcile endpoint returns it.
    pub fn from_json(input: &str) -> Result<Self, AuditError> {
        let items: Vec<ReconcileItem> = serde_json::from_str(input)?;
        tracing::debug!(items = items.len(), "loaded reconciliation records");
        Ok(Self::new(items))
    }

    /// All records in insertion order.
    pub fn items(&self) -> &[ReconcileItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Band partition. Unbanded or unrecognised bands only count toward
    /// `total`.
    pub fn statistics(&self) -> Statistics {
        let mut stats = Statistics { total: self.items.len(), ..Default::default() };
        for item in &self.items {
            match item.risk_band {
                Some(RiskBand::Low) => stats.low_risk += 1,
                Some(RiskBand::Medium) => stats.medium_risk += 1,
                Some(RiskBand::High) => stats.high_risk += 1,
                Some(RiskBand::Unknown(_)) | None => {}
            }
        }
        stats
    }

    /// Cause frequency over every cause tag of every record, most frequent
    /// first. A record naming two causes counts once for each.
    pub fn root_cause_analysis(&self) -> Vec<RootCauseEntry> {
        let counts = tally(self.items.iter().flat_map(|i| i.root_cause.iter().map(String::as_str)));
        let occurrences: usize = counts.iter().map(|(_, n)| n).sum();

        counts
            .into_iter()
            .map(|(cause, count)| RootCauseEntry {
                cause,
                count,
                percentage: share(count as f64, occurrences as f64),
            })
            .collect()
    }

    pub fn top_sellers(&self, n: usize) -> Vec<SellerTally> {
        let mut counts = tally(self.items.iter().map(|i| i.seller.as_str()));
        counts.truncate(n);
        counts
            .into_iter()
            .map(|(seller, count)| SellerTally { seller, count })
            .collect()
    }

    /// Records without a buyer are left out.
    pub fn top_buyers(&self, n: usize) -> Vec<BuyerTally> {
        let mut counts = tally(self.items.iter().filter_map(ReconcileItem::resolved_buyer));
        counts.truncate(n);
        counts
            .into_iter()
            .map(|(buyer, count)| BuyerTally { buyer, count })
            .collect()
    }

    pub fn to_csv(&self) -> Result<String, AuditError> {
        self.to_csv_with(&ExportConfig::default())
    }

    pub fn to_csv_with(&self, opts: &ExportConfig) -> Result<String, AuditError> {
        export::items_to_csv(&self.items, opts)
    }

    pub fn to_json(&self) -> Result<String, AuditError> {
        export::to_json(&self.items)
    }
}

impl From<Vec<ReconcileItem>> for Reconciliation {
    fn from(items: Vec<ReconcileItem>) -> Self {
        Self::new(items)
    }
}

/// Count keys, then order by count descending. Equal counts keep the order
/// in which keys were first seen.
pub(crate) fn tally<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, usize)> =
        counts.into_iter().map(|(k, n)| (k.to_string(), n)).collect();
    // stable sort
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

/// `100 * part / whole`, zero when `whole` is zero.
pub(crate) fn share(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        100.0 * part / whole
    }
}
