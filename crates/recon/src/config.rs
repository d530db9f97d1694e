use serde::Deserialize;

use crate::error::AuditError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Analytics settings. Every section is optional; an empty document yields
/// the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyticsConfig {
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub graph: GraphConfig,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    #[serde(default = "default_period")]
    pub period: String,
    #[serde(default)]
    pub gstin: Option<String>,
    #[serde(default)]
    pub root_cause_weighting: RootCauseWeighting,
    /// Filing consistency used for vendors without an upstream figure.
    #[serde(default = "default_filing_consistency")]
    pub default_filing_consistency: f64,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            period: default_period(),
            gstin: None,
            root_cause_weighting: RootCauseWeighting::default(),
            default_filing_consistency: default_filing_consistency(),
            top_n: default_top_n(),
        }
    }
}

/// How the report's root-cause breakdown computes each cause's share.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootCauseWeighting {
    /// Share of the at-stake ITC amount; falls back to counts when no
    /// amounts are present.
    #[default]
    Amount,
    /// Share of cause occurrences.
    Count,
}

fn default_period() -> String {
    "Current Period".into()
}

fn default_filing_consistency() -> f64 {
    50.0
}

fn default_top_n() -> usize {
    5
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    /// Joins sequence-valued fields inside a single CSV cell.
    #[serde(default = "default_list_delimiter")]
    pub list_delimiter: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { list_delimiter: default_list_delimiter() }
    }
}

fn default_list_delimiter() -> String {
    ";".into()
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphConfig {
    #[serde(default = "default_risk_threshold")]
    pub risk_threshold: f64,
    #[serde(default = "default_top_degree")]
    pub top_degree: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            risk_threshold: default_risk_threshold(),
            top_degree: default_top_degree(),
        }
    }
}

fn default_risk_threshold() -> f64 {
    70.0
}

fn default_top_degree() -> usize {
    7
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl AnalyticsConfig {
    pub fn from_toml(input: &str) -> Result<Self, AuditError> {
        let config: AnalyticsConfig =
            toml::from_str(input).map_err(|e| AuditError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AuditError> {
        let fc = self.report.default_filing_consistency;
        if !(0.0..=100.0).contains(&fc) {
            return Err(AuditError::ConfigValidation(format!(
                "report.default_filing_consistency must be within 0..=100, got {fc}"
            )));
        }

        let threshold = self.graph.risk_threshold;
        if !(0.0..=100.0).contains(&threshold) {
            return Err(AuditError::ConfigValidation(format!(
                "graph.risk_threshold must be within 0..=100, got {threshold}"
            )));
        }

        let delim = &self.export.list_delimiter;
        if delim.is_empty() {
            return Err(AuditError::ConfigValidation(
                "export.list_delimiter must not be empty".into(),
            ));
        }
        if delim.contains([',', '"', '\n', '\r']) {
            return Err(AuditError::ConfigValidation(format!(
                "export.list_delimiter '{}' collides with CSV syntax",
                delim.escape_default()
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
