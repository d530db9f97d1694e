//! Narrative reconstruction of flagged invoices: issue classification,
//! per-invoice audit trails and the invoice-trace explanation sentence.

use crate::export::format_amount;
use crate::graph::classify;
use crate::model::{GraphAuditTrail, InvoiceTrace, IssueType, ReconcileItem, RiskBand, TraceNode};

/// Claimed tax above reported tax by more than this is underpayment.
const TAX_TOLERANCE: f64 = 0.01;

fn mentions_non_filing(cause: &str) -> bool {
    let c = cause.to_ascii_lowercase();
    c.contains("not reported") || c.contains("not filed")
}

fn mentions_missing_claim(cause: &str) -> bool {
    cause.to_ascii_lowercase().contains("missing claim")
}

fn mentions_amount_mismatch(cause: &str) -> bool {
    let c = cause.to_ascii_lowercase();
    c.contains("discrepancy") || c.contains("mismatch")
}

fn recognise(cause: &str) -> Option<IssueType> {
    if mentions_non_filing(cause) {
        Some(IssueType::NotFiled)
    } else if mentions_missing_claim(cause) {
        Some(IssueType::MissingClaim)
    } else if mentions_amount_mismatch(cause) {
        Some(IssueType::AmountMismatch)
    } else {
        None
    }
}

/// Issue type from the first root cause tag that names a known problem.
pub fn issue_type(item: &ReconcileItem) -> IssueType {
    if item.root_cause.is_empty() {
        return IssueType::Unclassified;
    }
    item.root_cause
        .iter()
        .find_map(|c| recognise(c))
        .unwrap_or(IssueType::Other)
}

pub fn gstr1_status(item: &ReconcileItem) -> &'static str {
    if item.root_cause.iter().any(|c| mentions_non_filing(c)) {
        "Not Filed"
    } else {
        "Filed"
    }
}

pub fn gstr3b_payment(item: &ReconcileItem) -> &'static str {
    let discrepancy = item.root_cause.iter().any(|c| mentions_amount_mismatch(c));
    if discrepancy || item.claimed_tax_amount > item.tax_amount + TAX_TOLERANCE {
        "Underpaid"
    } else {
        "Paid"
    }
}

pub fn itc_outcome(band: Option<&RiskBand>) -> &'static str {
    match band {
        Some(RiskBand::High) => "ITC Blocked",
        Some(RiskBand::Medium) => "ITC Under Review",
        _ => "ITC Allowed",
    }
}

/// Build the audit trail for one record. Records without buyer, seller and
/// invoice id have no path to narrate and yield `None`.
pub fn audit_trail(item: &ReconcileItem) -> Option<GraphAuditTrail> {
    let buyer = item.resolved_buyer()?;
    if item.seller.is_empty() || item.invoice_id.is_empty() {
        return None;
    }

    let gstr1 = gstr1_status(item);
    let gstr3b = gstr3b_payment(item);
    let result = itc_outcome(item.effective_band().as_ref());

    let mut path = vec![
        format!(
            "Buyer {buyer} claimed ITC of {} on invoice {}",
            format_amount(item.itc_value()),
            item.invoice_id
        ),
        format!("Invoice {} issued by supplier {}", item.invoice_id, item.seller),
        format!("GSTR-1 filing by {}: {gstr1}", item.seller),
        format!(
            "GSTR-3B tax payment: {gstr3b} (reported {} vs claimed {})",
            format_amount(item.tax_amount),
            format_amount(item.claimed_tax_amount)
        ),
    ];
    if !item.root_cause.is_empty() {
        path.push(format!("Root cause: {}", item.root_cause.join(", ")));
    }
    path.push(format!("Result: {result}"));

    Some(GraphAuditTrail {
        invoice: item.invoice_id.clone(),
        buyer: buyer.to_string(),
        supplier: item.seller.clone(),
        gstr1_status: gstr1.into(),
        gstr3b_payment: gstr3b.into(),
        result: result.into(),
        path,
    })
}

/// Reported and claimed tax on the trace's invoice node.
pub fn tax_vs_claimed(trace: &InvoiceTrace) -> Option<(f64, f64)> {
    trace.path.iter().find_map(|node| match node {
        TraceNode::Invoice { tax_amount, claimed_tax_amount, .. } => {
            Some((tax_amount.unwrap_or(0.0), claimed_tax_amount.unwrap_or(0.0)))
        }
        _ => None,
    })
}

fn opt_display<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}

/// One-sentence explanation of why an invoice trace is risky.
pub fn explain_invoice(trace: &InvoiceTrace) -> String {
    if !trace.found {
        return format!("Invoice {} not found in graph.", trace.invoice_id);
    }

    let mut seller = None;
    let mut buyer = None;
    let mut invoice = None;
    for node in &trace.path {
        match node {
            TraceNode::Seller { gstin, .. } => seller = gstin.as_deref(),
            TraceNode::Buyer { gstin, .. } => buyer = gstin.as_deref(),
            TraceNode::Invoice { invoice_id, tax_amount, claimed_tax_amount } => {
                invoice = Some((invoice_id.as_str(), *tax_amount, *claimed_tax_amount));
            }
            TraceNode::Return { .. } => {}
        }
    }

    let ind = &trace.risk_indicators;
    let party_risk = ind
        .seller_risk
        .unwrap_or(0.0)
        .max(ind.buyer_risk.unwrap_or(0.0));
    let band = classify(party_risk);

    let invoice_id = invoice.map_or(trace.invoice_id.as_str(), |(id, _, _)| id);
    let mut text = format!("Invoice {invoice_id} is {band} risk");
    if let Some(cluster) = ind.cluster_id {
        text.push_str(&format!(" because involved party belongs to cluster {cluster}"));
    }
    if !trace.root_cause.is_empty() {
        text.push_str(&format!(" with root causes: {}", trace.root_cause.join(", ")));
    }
    text.push_str(&format!(
        ". Seller {} and Buyer {} show risk scores {}, {}.",
        opt_display(seller),
        opt_display(buyer),
        opt_display(ind.seller_risk),
        opt_display(ind.buyer_risk),
    ));
    let (tax, claimed) = invoice.map_or((None, None), |(_, t, c)| (t, c));
    text.push_str(&format!(
        " Tax amounts: reported {} vs claimed {}.",
        opt_display(tax.map(format_amount)),
        opt_display(claimed.map(format_amount)),
    ));
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RiskIndicators;

    fn item(buyer: Option<&str>, causes: &[&str], band: Option<RiskBand>) -> ReconcileItem {
        ReconcileItem {
            seller: "33QWERT5678U1Z1".into(),
            buyer: buyer.map(String::from),
            invoice_id: "INV2002".into(),
            tax_amount: 1000.0,
            claimed_tax_amount: 1000.0,
            root_cause: causes.iter().map(|c| c.to_string()).collect(),
            risk_band: band,
            itc_amount: 1200.0,
            risk_score: None,
        }
    }

    #[test]
    fn issue_type_uses_first_recognised_cause() {
        let it = item(None, &["Vendor on watchlist", "Missing claim edge to buyer", "Invoice not reported in return"], None);
        assert_eq!(issue_type(&it), IssueType::MissingClaim);
        assert_eq!(issue_type(&item(None, &["Tax amount discrepancy detected"], None)), IssueType::AmountMismatch);
        assert_eq!(issue_type(&item(None, &["Invoice NOT REPORTED in return"], None)), IssueType::NotFiled);
        assert_eq!(issue_type(&item(None, &["Vendor on watchlist"], None)), IssueType::Other);
        assert_eq!(issue_type(&item(None, &[], None)), IssueType::Unclassified);
    }

    #[test]
    fn trail_requires_buyer() {
        assert!(audit_trail(&item(None, &[], None)).is_none());
        assert!(audit_trail(&item(Some(""), &[], None)).is_none());
    }

    #[test]
    fn trail_requires_invoice_id() {
        let mut it = item(Some("07XYZAB9876C1Z7"), &[], None);
        it.invoice_id.clear();
        assert!(audit_trail(&it).is_none());
    }

    #[test]
    fn trail_for_unfiled_invoice() {
        let it = item(
            Some("07XYZAB9876C1Z7"),
            &["Invoice not reported in return", "Missing claim edge to buyer"],
            Some(RiskBand::Medium),
        );
        let trail = audit_trail(&it).unwrap();
        assert_eq!(trail.invoice, "INV2002");
        assert_eq!(trail.buyer, "07XYZAB9876C1Z7");
        assert_eq!(trail.supplier, "33QWERT5678U1Z1");
        assert_eq!(trail.gstr1_status, "Not Filed");
        assert_eq!(trail.gstr3b_payment, "Paid");
        assert_eq!(trail.result, "ITC Under Review");
        assert_eq!(trail.path.len(), 6);
        assert_eq!(trail.path[0], "Buyer 07XYZAB9876C1Z7 claimed ITC of 1200 on invoice INV2002");
        assert_eq!(trail.path[5], "Result: ITC Under Review");
    }

    #[test]
    fn overclaim_is_underpaid() {
        let mut it = item(Some("07XYZAB9876C1Z7"), &[], Some(RiskBand::High));
        it.claimed_tax_amount = 1000.5;
        let trail = audit_trail(&it).unwrap();
        assert_eq!(trail.gstr1_status, "Filed");
        assert_eq!(trail.gstr3b_payment, "Underpaid");
        assert_eq!(trail.result, "ITC Blocked");
        // No root cause step.
        assert_eq!(trail.path.len(), 5);
    }

    fn trace() -> InvoiceTrace {
        InvoiceTrace {
            invoice_id: "INV3003".into(),
            found: true,
            root_cause: vec!["Tax amount discrepancy detected".into()],
            path: vec![
                TraceNode::Seller { gstin: Some("29LMNOP4321Q1Z3".into()), name: None },
                TraceNode::Invoice {
                    invoice_id: "INV3003".into(),
                    tax_amount: Some(5000.0),
                    claimed_tax_amount: Some(7500.0),
                },
                TraceNode::Buyer { gstin: Some("15JKLM1234N1Z9".into()), name: None },
            ],
            risk_indicators: RiskIndicators {
                seller_risk: Some(85.0),
                buyer_risk: Some(25.0),
                cluster_id: Some(4),
                component_id: None,
            },
            explanation: None,
        }
    }

    #[test]
    fn explanation_sentence() {
        let text = explain_invoice(&trace());
        assert_eq!(
            text,
            "Invoice INV3003 is HIGH risk because involved party belongs to cluster 4 \
             with root causes: Tax amount discrepancy detected. Seller 29LMNOP4321Q1Z3 and \
             Buyer 15JKLM1234N1Z9 show risk scores 85, 25. Tax amounts: reported 5000 vs claimed 7500."
        );
    }

    #[test]
    fn explanation_uses_canonical_thresholds() {
        let mut t = trace();
        t.risk_indicators.seller_risk = Some(40.0);
        t.risk_indicators.buyer_risk = None;
        assert!(explain_invoice(&t).starts_with("Invoice INV3003 is MEDIUM risk"));
    }

    #[test]
    fn explanation_for_missing_invoice() {
        let mut t = trace();
        t.found = false;
        assert_eq!(explain_invoice(&t), "Invoice INV3003 not found in graph.");
    }

    #[test]
    fn tax_pair_from_invoice_node() {
        assert_eq!(tax_vs_claimed(&trace()), Some((5000.0, 7500.0)));
        let mut t = trace();
        t.path.retain(|n| !matches!(n, TraceNode::Invoice { .. }));
        assert_eq!(tax_vs_claimed(&t), None);
    }
}
