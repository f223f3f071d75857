use crate::snapshot::{Metric, MetricsSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum acceptable value per monitored metric, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSet {
    pub min_availability_6h: f64,
    pub min_availability_24h: f64,
    pub min_success_rate_6h_primary: f64,
    pub min_success_rate_6h_secondary: f64,
    pub min_success_rate_24h_primary: f64,
    pub min_success_rate_24h_secondary: f64,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            min_availability_6h: 90.0,
            min_availability_24h: 90.0,
            min_success_rate_6h_primary: 20.0,
            min_success_rate_6h_secondary: 85.0,
            min_success_rate_24h_primary: 20.0,
            min_success_rate_24h_secondary: 85.0,
        }
    }
}

impl ThresholdSet {
    pub fn minimum(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Availability6h => self.min_availability_6h,
            Metric::Availability24h => self.min_availability_24h,
            Metric::SuccessRate6hPrimary => self.min_success_rate_6h_primary,
            Metric::SuccessRate6hSecondary => self.min_success_rate_6h_secondary,
            Metric::SuccessRate24hPrimary => self.min_success_rate_24h_primary,
            Metric::SuccessRate24hSecondary => self.min_success_rate_24h_secondary,
        }
    }

    pub fn minimum_mut(&mut self, metric: Metric) -> &mut f64 {
        match metric {
            Metric::Availability6h => &mut self.min_availability_6h,
            Metric::Availability24h => &mut self.min_availability_24h,
            Metric::SuccessRate6hPrimary => &mut self.min_success_rate_6h_primary,
            Metric::SuccessRate6hSecondary => &mut self.min_success_rate_6h_secondary,
            Metric::SuccessRate24hPrimary => &mut self.min_success_rate_24h_primary,
            Metric::SuccessRate24hSecondary => &mut self.min_success_rate_24h_secondary,
        }
    }

    /// Environment variable overriding the threshold, e.g. `MIN_AVAILABILITY_6H`.
    pub fn env_key(metric: Metric) -> &'static str {
        match metric {
            Metric::Availability6h => "MIN_AVAILABILITY_6H",
            Metric::Availability24h => "MIN_AVAILABILITY_24H",
            Metric::SuccessRate6hPrimary => "MIN_SUCCESS_RATE_6H_PRIMARY",
            Metric::SuccessRate6hSecondary => "MIN_SUCCESS_RATE_6H_SECONDARY",
            Metric::SuccessRate24hPrimary => "MIN_SUCCESS_RATE_24H_PRIMARY",
            Metric::SuccessRate24hSecondary => "MIN_SUCCESS_RATE_24H_SECONDARY",
        }
    }
}

/// A metric observed below its configured minimum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Violation {
    pub metric: Metric,
    pub value: f64,
    pub threshold: f64,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "⚠️ {} is low: {}% (threshold: {}%)",
            self.metric.label(),
            self.value,
            self.threshold
        )
    }
}

/// Compare every metric against its minimum with strict less-than.
///
/// Violations are collected independently and returned in [`Metric::ALL`]
/// order.
pub fn evaluate(snapshot: &MetricsSnapshot, thresholds: &ThresholdSet) -> Vec<Violation> {
    Metric::ALL
        .into_iter()
        .filter_map(|metric| {
            let value = snapshot.value(metric);
            let threshold = thresholds.minimum(metric);
            (value < threshold).then_some(Violation {
                metric,
                value,
                threshold,
            })
        })
        .collect()
}
