pub mod validation;

use crate::{snapshot::Metric, thresholds::ThresholdSet};
use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::{fmt, net::SocketAddr, path::Path, time::Duration};
use validation::validate_config;

/// Main settings configuration for the provider monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Log level for application logging (e.g., "info", "debug", "warn", "error")
    pub log_level: String,
    /// The monitored provider and its network
    pub provider: ProviderSettings,
    /// Where the explorer page lives
    pub explorer: ExplorerSettings,
    /// Polling cadence
    pub monitor: MonitorSettings,
    /// Alert thresholds, in percent
    pub thresholds: ThresholdSet,
    /// Telegram bot used for alert delivery
    pub telegram: TelegramSettings,
    /// External browser-automation agent
    pub agent: AgentSettings,
    /// Prometheus exporter (optional)
    pub metrics: Option<MetricsSettings>,
    /// Legacy environment overrides that were unusable and ignored
    #[serde(skip)]
    ignored_env: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Default provider address; a one-shot check may pass its own
    pub address: Option<String>,
    /// Explorer network name, e.g. "flare" or "songbird"
    pub network: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerSettings {
    /// Provider page URL with `{network}` and `{address}` placeholders
    pub url_template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Target time between the starts of two checks (default: 900 = 15 minutes)
    pub interval_seconds: u64,
    /// Wait after a failed check before trying again (default: 60)
    pub error_retry_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    /// Bot API base url (default: https://api.telegram.org)
    pub api_base_url: String,
    /// Per-request timeout (default: 10)
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Executable running one browser-automation task per invocation
    pub command: String,
    /// Extra arguments passed to the command
    pub args: Vec<String>,
    /// LLM model the agent should drive the browser with
    pub model: String,
    /// Run the browser without a window
    pub headless: bool,
    /// Upper bound for a single agent run (default: 600)
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// Prometheus listener address
    pub addr: SocketAddr,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            provider: ProviderSettings::default(),
            explorer: ExplorerSettings::default(),
            monitor: MonitorSettings::default(),
            thresholds: ThresholdSet::default(),
            telegram: TelegramSettings::default(),
            agent: AgentSettings::default(),
            metrics: None,
            ignored_env: Vec::new(),
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            address: None,
            network: "flare".to_string(),
        }
    }
}

impl Default for ExplorerSettings {
    fn default() -> Self {
        Self {
            url_template: "https://{network}-systems-explorer.flare.network/providers/ftso/{address}"
                .to_string(),
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_seconds: 15 * 60,
            error_retry_seconds: 60,
        }
    }
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base_url: "https://api.telegram.org".to_string(),
            timeout_seconds: 10,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            command: "browser-use-agent".to_string(),
            args: Vec::new(),
            model: "gpt-4o".to_string(),
            headless: true,
            timeout_seconds: 600,
        }
    }
}

impl MonitorSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn error_retry(&self) -> Duration {
        Duration::from_secs(self.error_retry_seconds)
    }
}

impl TelegramSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl AgentSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Settings {
    /// Load configuration from an optional config file and the environment
    ///
    /// Precedence, lowest first: built-in defaults, the TOML file,
    /// `MONITOR__SECTION__KEY` variables, then the flat variables
    /// (`PROVIDER_ADDRESS`, `MIN_AVAILABILITY_6H`, ...).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // Load .env file if it exists
        // NOTE: It's ok if this fails (file might not exist)
        let _ = dotenvy::dotenv();

        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Same as [`Settings::load`] with the flat variables read through `lookup`
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = ConfigBuilder::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(&path.to_string_lossy()));
        }

        let mut settings: Settings = builder
            .add_source(
                Environment::with_prefix("MONITOR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        settings.apply_env_overrides(lookup);

        // Validate the configuration
        validate_config(&settings)?;

        Ok(settings)
    }

    /// Apply the flat environment variables on top of the loaded settings
    ///
    /// Numeric values that do not parse, or thresholds outside 0..=100, keep
    /// their current value and are recorded in [`Settings::ignored_env`].
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(address) = non_empty("PROVIDER_ADDRESS") {
            self.provider.address = Some(address.trim().to_string());
        }
        if let Some(network) = non_empty("NETWORK") {
            self.provider.network = network.trim().to_string();
        }
        if let Some(token) = non_empty("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(chat_id) = non_empty("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = Some(chat_id);
        }

        if let Some(raw) = non_empty("MONITORING_INTERVAL") {
            match raw.trim().parse::<f64>() {
                Ok(secs) if secs.is_finite() && secs >= 1.0 => {
                    self.monitor.interval_seconds = secs.round() as u64;
                }
                _ => self.ignored_env.push(format!("MONITORING_INTERVAL={raw}")),
            }
        }

        for metric in Metric::ALL {
            let key = ThresholdSet::env_key(metric);
            if let Some(raw) = non_empty(key) {
                match raw.trim().parse::<f64>() {
                    Ok(value) if (0.0..=100.0).contains(&value) => {
                        *self.thresholds.minimum_mut(metric) = value
                    }
                    _ => self.ignored_env.push(format!("{key}={raw}")),
                }
            }
        }
    }

    pub fn ignored_env(&self) -> &[String] {
        &self.ignored_env
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings {{\n\
             \tProvider: {}\n\
             \tNetwork: {}\n\
             \tInterval: {}s\n\
             \tThresholds: {:?}\n\
             \tTelegram configured: {}\n\
             \tAgent: {} (model {}, headless {})\n\
             }}",
            self.provider.address.as_deref().unwrap_or("<unset>"),
            self.provider.network,
            self.monitor.interval_seconds,
            self.thresholds,
            self.telegram.bot_token.is_some() && self.telegram.chat_id.is_some(),
            self.agent.command,
            self.agent.model,
            self.agent.headless,
        )
    }
}
