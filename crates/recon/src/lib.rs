//! `gstaudit-recon`: ITC reconciliation and audit analytics engine.
//!
//! Pure engine crate: receives already-fetched mismatch records, graph
//! snapshots and vendor data, returns aggregates, reports and export text.
//! No network or filesystem access.

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod graph;
pub mod model;
pub mod quantile;
pub mod report;
pub mod trail;

pub use aggregate::Reconciliation;
pub use config::AnalyticsConfig;
pub use engine::run;
pub use error::AuditError;
pub use graph::classify;
pub use model::{AnalyticsInput, AnalyticsResult, AuditReport, ReconcileItem, RiskBand};
pub use quantile::{quantiles, FiveNumberSummary};
pub use report::AuditReportBuilder;
