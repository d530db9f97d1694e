//! CSV and JSON export of mismatch records and audit rows.
//!
//! CSV: comma-delimited, header first, one row per record. Sequence fields
//! are joined into one cell with the configured list delimiter. Amounts are
//! plain decimals.

use serde::Serialize;

use crate::config::ExportConfig;
use crate::error::AuditError;
use crate::model::{AuditItem, ReconcileItem};

pub const ITEM_COLUMNS: [&str; 9] = [
    "seller",
    "buyer",
    "invoiceId",
    "taxAmount",
    "claimedTaxAmount",
    "rootCause",
    "riskBand",
    "itcAmount",
    "riskScore",
];

pub const AUDIT_ITEM_COLUMNS: [&str; 6] = [
    "vendor",
    "invoiceNo",
    "itcAmount",
    "issueType",
    "riskLevel",
    "rootCause",
];

/// Plain decimal, no grouping or currency symbol.
pub fn format_amount(value: f64) -> String {
    format!("{value}")
}

pub fn items_to_csv(items: &[ReconcileItem], opts: &ExportConfig) -> Result<String, AuditError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(ITEM_COLUMNS)?;

    for item in items {
        writer.write_record([
            item.seller.clone(),
            item.buyer.clone().unwrap_or_default(),
            item.invoice_id.clone(),
            format_amount(item.tax_amount),
            format_amount(item.claimed_tax_amount),
            item.root_cause.join(&opts.list_delimiter),
            item.risk_band.as_ref().map(ToString::to_string).unwrap_or_default(),
            format_amount(item.itc_amount),
            item.risk_score.map(format_amount).unwrap_or_default(),
        ])?;
    }

    finish(writer, items.len())
}

pub fn audit_items_to_csv(rows: &[AuditItem], opts: &ExportConfig) -> Result<String, AuditError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(AUDIT_ITEM_COLUMNS)?;

    for row in rows {
        writer.write_record([
            row.vendor.clone(),
            row.invoice_no.clone(),
            format_amount(row.itc_amount),
            row.issue_type.to_string(),
            row.risk_level.as_ref().map(ToString::to_string).unwrap_or_default(),
            row.root_cause.join(&opts.list_delimiter),
        ])?;
    }

    finish(writer, rows.len())
}

/// Pretty JSON with field order fixed by the struct definitions.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, AuditError> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn finish(writer: csv::Writer<Vec<u8>>, rows: usize) -> Result<String, AuditError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| AuditError::Csv(e.into_error().into()))?;
    let text = String::from_utf8(bytes).map_err(|e| AuditError::Utf8(e.to_string()))?;
    tracing::debug!(rows, bytes = text.len(), "csv export written");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IssueType, RiskBand};

    fn item() -> ReconcileItem {
        ReconcileItem {
            seller: "27ABCDE1234F1Z5".into(),
            buyer: None,
            invoice_id: "INV1001".into(),
            tax_amount: 12500.5,
            claimed_tax_amount: 13000.0,
            root_cause: vec!["Missing claim edge to buyer".into(), "Tax amount discrepancy detected".into()],
            risk_band: Some(RiskBand::Medium),
            itc_amount: 1234567.25,
            risk_score: None,
        }
    }

    #[test]
    fn header_then_one_row_per_item() {
        let csv = items_to_csv(&[item(), item()], &ExportConfig::default()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "seller,buyer,invoiceId,taxAmount,claimedTaxAmount,rootCause,riskBand,itcAmount,riskScore"
        );
        assert_eq!(
            lines[1],
            "27ABCDE1234F1Z5,,INV1001,12500.5,13000,Missing claim edge to buyer;Tax amount discrepancy detected,MEDIUM,1234567.25,"
        );
    }

    #[test]
    fn empty_set_is_header_only() {
        let csv = items_to_csv(&[], &ExportConfig::default()).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn commas_in_values_are_quoted() {
        let mut it = item();
        it.root_cause = vec!["late, by 3 days".into()];
        let csv = items_to_csv(&[it], &ExportConfig::default()).unwrap();
        assert!(csv.contains("\"late, by 3 days\""));

        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[5], "late, by 3 days");
    }

    #[test]
    fn custom_list_delimiter() {
        let opts = ExportConfig { list_delimiter: " | ".into() };
        let csv = items_to_csv(&[item()], &opts).unwrap();
        assert!(csv.contains("Missing claim edge to buyer | Tax amount discrepancy detected"));
    }

    #[test]
    fn audit_rows() {
        let row = AuditItem {
            vendor: "29LMNOP4321Q1Z3".into(),
            invoice_no: "INV3003".into(),
            itc_amount: 2500.0,
            issue_type: IssueType::AmountMismatch,
            risk_level: Some(RiskBand::High),
            root_cause: vec!["Tax amount discrepancy detected".into()],
        };
        let csv = audit_items_to_csv(&[row], &ExportConfig::default()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "vendor,invoiceNo,itcAmount,issueType,riskLevel,rootCause");
        assert_eq!(
            lines[1],
            "29LMNOP4321Q1Z3,INV3003,2500,Tax Amount Mismatch,HIGH,Tax amount discrepancy detected"
        );
    }

    #[test]
    fn amounts_have_no_grouping() {
        assert_eq!(format_amount(1234567.0), "1234567");
        assert_eq!(format_amount(0.5), "0.5");
    }
}
