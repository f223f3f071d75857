use crate::{
    FetchError,
    agent::{AgentTask, BrowsingAgent},
    settings::Settings,
    snapshot::MetricsSnapshot,
};
use tracing::{debug, info};
use url::Url;

/// Builds the explorer task for a provider and turns the agent's answer into
/// a [`MetricsSnapshot`].
///
/// Every call starts a new agent run. There is no retry here; the monitor
/// loop decides when to try again.
pub struct Fetcher<A> {
    agent: A,
    default_address: Option<String>,
    network: String,
    url_template: String,
}

impl<A: BrowsingAgent> Fetcher<A> {
    pub fn new(agent: A, settings: &Settings) -> Self {
        Self {
            agent,
            default_address: settings.provider.address.clone(),
            network: settings.provider.network.clone(),
            url_template: settings.explorer.url_template.clone(),
        }
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn default_address(&self) -> Option<&str> {
        self.default_address.as_deref()
    }

    /// The explicit address if given, else the configured one. Blank values
    /// count as missing.
    pub fn resolve_address(&self, address: Option<&str>) -> Result<String, FetchError> {
        address
            .or(self.default_address.as_deref())
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(str::to_string)
            .ok_or(FetchError::MissingAddress)
    }

    pub fn build_task(&self, address: &str) -> Result<AgentTask, FetchError> {
        let start_url = explorer_url(&self.url_template, &self.network, address)?;
        Ok(AgentTask {
            task: task_instructions(&start_url),
            start_url,
            output_schema: MetricsSnapshot::output_schema(),
        })
    }

    /// Run one agent task against the provider's explorer page.
    pub async fn fetch(&self, address: Option<&str>) -> Result<MetricsSnapshot, FetchError> {
        let address = self.resolve_address(address)?;
        let task = self.build_task(&address)?;

        info!(provider = %address, network = %self.network, url = %task.start_url, "fetching provider metrics");

        let raw = self.agent.run(&task).await?.ok_or(FetchError::NoResult)?;
        debug!(raw = %raw, "agent final result");

        MetricsSnapshot::parse(&raw).map_err(|source| FetchError::Parse { source, raw })
    }
}

/// Fill the `{network}` and `{address}` placeholders of the explorer template.
pub fn explorer_url(template: &str, network: &str, address: &str) -> Result<Url, url::ParseError> {
    Url::parse(
        &template
            .replace("{network}", network)
            .replace("{address}", address),
    )
}

fn task_instructions(start_url: &Url) -> String {
    format!(
        r#"Navigate to '{start_url}' and return the provider's availability and success rates.
The page shows them like this:

  Availability
  LAST 6 HOURS   99.87 %
  LAST 24 HOURS  99.45 %
  Success Rate
  LAST 6 HOURS   48.80 % / 95.87 %
  LAST 24 HOURS  46.60 % / 95.85 %

Each success rate is a primary / secondary pair. Report plain numbers without
the percent sign, in exactly this shape:
{{
  "availability_6h": 99.87,
  "availability_24h": 99.45,
  "success_rate_6h": {{ "primary": 48.80, "secondary": 95.87 }},
  "success_rate_24h": {{ "primary": 46.60, "secondary": 95.85 }}
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AgentError, SnapshotError, agent::MockBrowsingAgent};

    const RESULT: &str = r#"{"availability_6h": 99.87, "availability_24h": 99.45,
        "success_rate_6h": {"primary": 48.80, "secondary": 95.87},
        "success_rate_24h": {"primary": 46.60, "secondary": 95.85}}"#;

    fn settings(address: Option<&str>) -> Settings {
        let mut settings = Settings::default();
        settings.provider.address = address.map(str::to_string);
        settings
    }

    #[test]
    fn test_explorer_url() {
        let url = explorer_url(
            &Settings::default().explorer.url_template,
            "songbird",
            "0xAbC123",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://songbird-systems-explorer.flare.network/providers/ftso/0xAbC123"
        );
    }

    #[test]
    fn test_resolve_address() {
        let fetcher = Fetcher::new(MockBrowsingAgent::new(), &settings(Some("0xdefault")));
        assert_eq!(fetcher.resolve_address(None).unwrap(), "0xdefault");
        assert_eq!(fetcher.resolve_address(Some("0xother")).unwrap(), "0xother");

        let fetcher = Fetcher::new(MockBrowsingAgent::new(), &settings(None));
        assert!(matches!(
            fetcher.resolve_address(None),
            Err(FetchError::MissingAddress)
        ));
        assert!(matches!(
            fetcher.resolve_address(Some("  ")),
            Err(FetchError::MissingAddress)
        ));
    }

    #[test]
    fn test_task_names_url_and_shape() {
        let fetcher = Fetcher::new(MockBrowsingAgent::new(), &settings(Some("0xdefault")));
        let task = fetcher.build_task("0xdefault").unwrap();
        assert!(
            task.task
                .contains("https://flare-systems-explorer.flare.network/providers/ftso/0xdefault")
        );
        assert!(task.task.contains("\"success_rate_24h\""));
        assert!(task.output_schema.schema.object.is_some());
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mut agent = MockBrowsingAgent::new();
        agent
            .expect_run()
            .withf(|task| task.start_url.path() == "/providers/ftso/0xdefault")
            .times(1)
            .returning(|_| Ok(Some(RESULT.to_string())));

        let fetcher = Fetcher::new(agent, &settings(Some("0xdefault")));
        let snapshot = fetcher.fetch(None).await.unwrap();
        assert_eq!(snapshot.availability_6h, 99.87);
        assert_eq!(snapshot.success_rate_24h.primary, 46.60);
    }

    #[tokio::test]
    async fn test_fetch_without_address_skips_agent() {
        let mut agent = MockBrowsingAgent::new();
        agent.expect_run().times(0);

        let fetcher = Fetcher::new(agent, &settings(None));
        assert!(matches!(
            fetcher.fetch(None).await,
            Err(FetchError::MissingAddress)
        ));
    }

    #[tokio::test]
    async fn test_fetch_agent_failure() {
        let mut agent = MockBrowsingAgent::new();
        agent
            .expect_run()
            .returning(|_| Err(AgentError::Reported("browser crashed".to_string())));

        let fetcher = Fetcher::new(agent, &settings(Some("0xdefault")));
        let err = fetcher.fetch(None).await.unwrap_err();
        assert!(matches!(err, FetchError::Agent(AgentError::Reported(_))));
        assert!(err.to_string().contains("browser crashed"));
    }

    #[tokio::test]
    async fn test_fetch_no_result() {
        let mut agent = MockBrowsingAgent::new();
        agent.expect_run().returning(|_| Ok(None));

        let fetcher = Fetcher::new(agent, &settings(Some("0xdefault")));
        assert!(matches!(
            fetcher.fetch(None).await,
            Err(FetchError::NoResult)
        ));
    }

    #[tokio::test]
    async fn test_fetch_malformed_result_is_parse_error() {
        let mut agent = MockBrowsingAgent::new();
        agent
            .expect_run()
            .returning(|_| Ok(Some("The availability is 99.87 %".to_string())));

        let fetcher = Fetcher::new(agent, &settings(Some("0xdefault")));
        match fetcher.fetch(None).await {
            Err(FetchError::Parse { source, raw }) => {
                assert!(matches!(source, SnapshotError::Json(_)));
                assert_eq!(raw, "The availability is 99.87 %");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
