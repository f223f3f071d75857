use crate::{fetcher::explorer_url, settings::Settings, snapshot::Metric};
use anyhow::{Result, bail};

/// Validate the configuration values
pub fn validate_config(settings: &Settings) -> Result<()> {
    // Validate log level
    let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&settings.log_level.to_lowercase().as_str()) {
        bail!(
            "Invalid log level '{}'. Valid options are: {:?}",
            settings.log_level,
            valid_log_levels
        );
    }

    // Validate provider settings
    if settings.provider.network.trim().is_empty() {
        bail!("Provider network cannot be empty");
    }

    // Validate explorer template
    let template = &settings.explorer.url_template;
    if !template.contains("{address}") {
        bail!("Explorer url_template must contain an {{address}} placeholder");
    }
    if let Err(err) = explorer_url(template, &settings.provider.network, "0x0") {
        bail!("Explorer url_template '{template}' does not form a valid url: {err}");
    }

    // Validate monitor settings
    if settings.monitor.interval_seconds == 0 {
        bail!("Monitor interval_seconds must be greater than 0");
    }
    if settings.monitor.error_retry_seconds == 0 {
        bail!("Monitor error_retry_seconds must be greater than 0");
    }

    // Validate thresholds
    for metric in Metric::ALL {
        let minimum = settings.thresholds.minimum(metric);
        if !(0.0..=100.0).contains(&minimum) {
            bail!(
                "Threshold for {} must be between 0 and 100, got {}",
                metric.label(),
                minimum
            );
        }
    }

    // Validate telegram settings
    let api_base = &settings.telegram.api_base_url;
    if !api_base.starts_with("http://") && !api_base.starts_with("https://") {
        bail!("Telegram api_base_url must start with http:// or https://");
    }
    if settings.telegram.timeout_seconds == 0 {
        bail!("Telegram timeout_seconds must be greater than 0");
    }

    // Validate agent settings
    if settings.agent.command.trim().is_empty() {
        bail!("Agent command cannot be empty");
    }
    if settings.agent.timeout_seconds == 0 {
        bail!("Agent timeout_seconds must be greater than 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_defaults() {
        assert!(validate_config(&Settings::default()).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.log_level = "verbose".to_string();
        assert!(validate_config(&settings).is_err());

        let mut settings = Settings::default();
        settings.provider.network = " ".to_string();
        assert!(validate_config(&settings).is_err());

        let mut settings = Settings::default();
        settings.monitor.interval_seconds = 0;
        assert!(validate_config(&settings).is_err());

        let mut settings = Settings::default();
        settings.thresholds.min_success_rate_6h_secondary = 120.0;
        let err = validate_config(&settings).unwrap_err();
        assert!(err.to_string().contains("6h Secondary Success Rate"));

        let mut settings = Settings::default();
        settings.thresholds.min_availability_24h = -1.0;
        assert!(validate_config(&settings).is_err());

        let mut settings = Settings::default();
        settings.telegram.api_base_url = "api.telegram.org".to_string();
        assert!(validate_config(&settings).is_err());

        let mut settings = Settings::default();
        settings.agent.command = String::new();
        assert!(validate_config(&settings).is_err());
    }

    #[test]
    fn test_validate_explorer_template() {
        let mut settings = Settings::default();
        settings.explorer.url_template = "https://explorer.example/providers".to_string();
        assert!(validate_config(&settings).is_err());

        let mut settings = Settings::default();
        settings.explorer.url_template = "not a url/{address}".to_string();
        assert!(validate_config(&settings).is_err());

        let mut settings = Settings::default();
        settings.explorer.url_template =
            "http://localhost:3000/{network}/providers/ftso/{address}".to_string();
        assert!(validate_config(&settings).is_ok());
    }
}
