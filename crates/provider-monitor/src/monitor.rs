use crate::{
    FetchError,
    agent::BrowsingAgent,
    alert::{AlertMessage, Notifier},
    fetcher::Fetcher,
    settings::Settings,
    snapshot::{Metric, MetricsSnapshot},
    thresholds::{ThresholdSet, Violation, evaluate},
};
use chrono::Local;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Result of a single fetch and evaluate cycle.
#[derive(Debug)]
pub enum CheckOutcome {
    Healthy(MetricsSnapshot),
    Degraded {
        snapshot: MetricsSnapshot,
        violations: Vec<Violation>,
    },
    Failed(FetchError),
}

impl CheckOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CheckOutcome::Failed(_))
    }

    pub fn snapshot(&self) -> Option<&MetricsSnapshot> {
        match self {
            CheckOutcome::Healthy(snapshot) | CheckOutcome::Degraded { snapshot, .. } => {
                Some(snapshot)
            }
            CheckOutcome::Failed(_) => None,
        }
    }
}

/// Time left in the current interval; zero once the check overran it.
pub fn sleep_duration(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Periodically checks one provider and alerts through a [`Notifier`].
pub struct Monitor<A, N> {
    fetcher: Fetcher<A>,
    notifier: N,
    thresholds: ThresholdSet,
    interval: Duration,
    error_retry: Duration,
}

impl<A: BrowsingAgent, N: Notifier> Monitor<A, N> {
    pub fn new(settings: &Settings, agent: A, notifier: N) -> Self {
        Self {
            fetcher: Fetcher::new(agent, settings),
            notifier,
            thresholds: settings.thresholds,
            interval: settings.monitor.interval(),
            error_retry: settings.monitor.error_retry(),
        }
    }

    pub fn fetcher(&self) -> &Fetcher<A> {
        &self.fetcher
    }

    pub fn thresholds(&self) -> &ThresholdSet {
        &self.thresholds
    }

    /// Fetch, evaluate, and alert once. Never sleeps.
    pub async fn check(&self, address: Option<&str>) -> CheckOutcome {
        metrics::counter!("ftso_monitor_checks").increment(1);

        let provider = address
            .or(self.fetcher.default_address())
            .unwrap_or("Unknown")
            .to_string();

        let snapshot = match self.fetcher.fetch(address).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                let detail = format!("Error checking provider data: {err}");
                error!(%provider, ?err, "provider check failed");
                metrics::counter!("ftso_monitor_check_failed").increment(1);

                let alert = AlertMessage::failure(&provider, detail, Local::now());
                self.notifier.send(&alert.render()).await;
                return CheckOutcome::Failed(err);
            }
        };

        info!(%provider, ?snapshot, "provider data retrieved");
        record_snapshot(&snapshot);

        let violations = evaluate(&snapshot, &self.thresholds);
        if violations.is_empty() {
            info!(%provider, "all provider metrics are within acceptable thresholds");
            return CheckOutcome::Healthy(snapshot);
        }

        let lines: Vec<String> = violations.iter().map(ToString::to_string).collect();
        warn!(%provider, violations = ?lines, "threshold violations detected");
        metrics::counter!("ftso_monitor_threshold_violations").increment(violations.len() as u64);

        let alert = AlertMessage::violations(&provider, &violations, Local::now());
        self.notifier.send(&alert.render()).await;

        CheckOutcome::Degraded {
            snapshot,
            violations,
        }
    }

    /// Check the configured provider every interval until `shutdown` fires.
    ///
    /// A failed check is retried after the error backoff instead of the
    /// regular interval. Returns an error only when no provider address is
    /// configured.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), FetchError> {
        let Some(provider) = self.fetcher.default_address().map(str::to_string) else {
            let message = "PROVIDER_ADDRESS environment variable is not set!";
            error!("{message}");
            let alert = AlertMessage::failure("Unknown", message, Local::now());
            self.notifier.send(&alert.render()).await;
            return Err(FetchError::MissingAddress);
        };

        info!(
            %provider,
            network = %self.fetcher.network(),
            interval_secs = self.interval.as_secs(),
            "starting FTSO provider monitoring"
        );

        loop {
            let started = Instant::now();

            let outcome = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                outcome = self.check(Some(&provider)) => outcome,
            };

            let wait = if outcome.is_failure() {
                warn!(retry_in_secs = self.error_retry.as_secs(), "check failed; retrying early");
                self.error_retry
            } else {
                let elapsed = started.elapsed();
                let wait = sleep_duration(self.interval, elapsed);
                if wait.is_zero() {
                    warn!(
                        elapsed_secs = elapsed.as_secs_f64(),
                        interval_secs = self.interval.as_secs(),
                        "monitor check took longer than the interval"
                    );
                } else {
                    info!(wait_secs = wait.as_secs_f64(), "waiting until next check");
                }
                wait
            };

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        info!("monitoring stopped");
        Ok(())
    }
}

fn record_snapshot(snapshot: &MetricsSnapshot) {
    for metric in Metric::ALL {
        metrics::gauge!("ftso_monitor_metric_percent", "metric" => metric.field())
            .set(snapshot.value(metric));
    }
}
