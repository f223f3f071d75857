//! The metrics scraped from a provider's explorer page.

use crate::SnapshotError;
use schemars::{JsonSchema, schema::RootSchema, schema_for};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary/secondary success rate pair as reported by the explorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SuccessRate {
    pub primary: f64,
    pub secondary: f64,
}

/// One observation of a provider's availability and success rates.
///
/// Every value is a percentage in `[0, 100]`. Construct it through
/// [`MetricsSnapshot::parse`] so the range is checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetricsSnapshot {
    pub availability_6h: f64,
    pub availability_24h: f64,
    pub success_rate_6h: SuccessRate,
    pub success_rate_24h: SuccessRate,
}

/// The six monitored values, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Availability6h,
    Availability24h,
    SuccessRate6hPrimary,
    SuccessRate6hSecondary,
    SuccessRate24hPrimary,
    SuccessRate24hSecondary,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Availability6h,
        Metric::Availability24h,
        Metric::SuccessRate6hPrimary,
        Metric::SuccessRate6hSecondary,
        Metric::SuccessRate24hPrimary,
        Metric::SuccessRate24hSecondary,
    ];

    /// Human readable name used in alert text.
    pub fn label(self) -> &'static str {
        match self {
            Metric::Availability6h => "6h Availability",
            Metric::Availability24h => "24h Availability",
            Metric::SuccessRate6hPrimary => "6h Primary Success Rate",
            Metric::SuccessRate6hSecondary => "6h Secondary Success Rate",
            Metric::SuccessRate24hPrimary => "24h Primary Success Rate",
            Metric::SuccessRate24hSecondary => "24h Secondary Success Rate",
        }
    }

    /// Dotted path of the field in the agent's json output.
    pub fn field(self) -> &'static str {
        match self {
            Metric::Availability6h => "availability_6h",
            Metric::Availability24h => "availability_24h",
            Metric::SuccessRate6hPrimary => "success_rate_6h.primary",
            Metric::SuccessRate6hSecondary => "success_rate_6h.secondary",
            Metric::SuccessRate24hPrimary => "success_rate_24h.primary",
            Metric::SuccessRate24hSecondary => "success_rate_24h.secondary",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl MetricsSnapshot {
    /// Validate the agent's final result against the snapshot schema.
    pub fn parse(raw: &str) -> Result<Self, SnapshotError> {
        let snapshot: MetricsSnapshot = serde_json::from_str(strip_code_fence(raw))?;

        for metric in Metric::ALL {
            let value = snapshot.value(metric);
            if !(0.0..=100.0).contains(&value) {
                return Err(SnapshotError::OutOfRange {
                    field: metric.field(),
                    value,
                });
            }
        }

        Ok(snapshot)
    }

    /// JSON schema handed to the agent as its required output shape.
    pub fn output_schema() -> RootSchema {
        schema_for!(MetricsSnapshot)
    }

    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Availability6h => self.availability_6h,
            Metric::Availability24h => self.availability_24h,
            Metric::SuccessRate6hPrimary => self.success_rate_6h.primary,
            Metric::SuccessRate6hSecondary => self.success_rate_6h.secondary,
            Metric::SuccessRate24hPrimary => self.success_rate_24h.primary,
            Metric::SuccessRate24hSecondary => self.success_rate_24h.secondary,
        }
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Availability 6h: {}%", self.availability_6h)?;
        writeln!(f, "Availability 24h: {}%", self.availability_24h)?;
        writeln!(
            f,
            "Success Rate 6h: {}% / {}%",
            self.success_rate_6h.primary, self.success_rate_6h.secondary
        )?;
        write!(
            f,
            "Success Rate 24h: {}% / {}%",
            self.success_rate_24h.primary, self.success_rate_24h.secondary
        )
    }
}

// Agents like to answer with a ```json fenced block.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return trimmed;
    };

    match body.split_once('\n') {
        Some((_info, inner)) => inner.trim(),
        None => body.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "availability_6h": 99.87,
        "availability_24h": 99.45,
        "success_rate_6h": { "primary": 48.80, "secondary": 95.87 },
        "success_rate_24h": { "primary": 46.60, "secondary": 95.85 }
    }"#;

    #[test]
    fn parses_agent_result() {
        let snapshot = MetricsSnapshot::parse(SAMPLE).unwrap();
        assert_eq!(snapshot.availability_6h, 99.87);
        assert_eq!(snapshot.availability_24h, 99.45);
        assert_eq!(snapshot.success_rate_6h.primary, 48.80);
        assert_eq!(snapshot.success_rate_24h.secondary, 95.85);
    }

    #[test]
    fn accepts_fenced_json() {
        let fenced = format!("```json\n{SAMPLE}\n```");
        let snapshot = MetricsSnapshot::parse(&fenced).unwrap();
        assert_eq!(snapshot.success_rate_6h.secondary, 95.87);
    }

    #[test]
    fn accepts_integer_percentages() {
        let raw = r#"{"availability_6h": 100, "availability_24h": 0,
            "success_rate_6h": {"primary": 50, "secondary": 90},
            "success_rate_24h": {"primary": 50, "secondary": 90}}"#;
        let snapshot = MetricsSnapshot::parse(raw).unwrap();
        assert_eq!(snapshot.availability_6h, 100.0);
        assert_eq!(snapshot.availability_24h, 0.0);
    }

    #[test]
    fn rejects_malformed_output() {
        let err = MetricsSnapshot::parse("Availability is 99.87 %").unwrap_err();
        assert!(matches!(err, SnapshotError::Json(_)));

        // Missing success_rate_24h
        let err = MetricsSnapshot::parse(
            r#"{"availability_6h": 99.0, "availability_24h": 99.0,
                "success_rate_6h": {"primary": 50.0, "secondary": 90.0}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SnapshotError::Json(_)));

        // Percent sign left in the value
        let err = MetricsSnapshot::parse(
            r#"{"availability_6h": "99.0 %", "availability_24h": 99.0,
                "success_rate_6h": {"primary": 50.0, "secondary": 90.0},
                "success_rate_24h": {"primary": 50.0, "secondary": 90.0}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SnapshotError::Json(_)));
    }

    #[test]
    fn rejects_values_outside_percentage_range() {
        let raw = r#"{"availability_6h": 99.0, "availability_24h": 99.0,
            "success_rate_6h": {"primary": 50.0, "secondary": 190.0},
            "success_rate_24h": {"primary": 50.0, "secondary": 90.0}}"#;
        match MetricsSnapshot::parse(raw) {
            Err(SnapshotError::OutOfRange { field, value }) => {
                assert_eq!(field, "success_rate_6h.secondary");
                assert_eq!(value, 190.0);
            }
            other => panic!("expected out of range error, got {other:?}"),
        }
    }

    #[test]
    fn schema_declares_every_field() {
        let schema = serde_json::to_value(MetricsSnapshot::output_schema()).unwrap();
        let properties = schema["properties"].as_object().unwrap();
        for key in [
            "availability_6h",
            "availability_24h",
            "success_rate_6h",
            "success_rate_24h",
        ] {
            assert!(properties.contains_key(key), "missing {key}");
        }
        assert!(schema["definitions"]["SuccessRate"].is_object());
    }

    #[test]
    fn value_follows_metric_order() {
        let snapshot = MetricsSnapshot::parse(SAMPLE).unwrap();
        let values: Vec<f64> = Metric::ALL.iter().map(|m| snapshot.value(*m)).collect();
        assert_eq!(values, vec![99.87, 99.45, 48.80, 95.87, 46.60, 95.85]);
    }
}
