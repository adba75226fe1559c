use std::time::Duration;

use kit::constants::DEFAULT_PROBE_TIMEOUT_MS;
use kit::futures::FutureExt;
use kit::reqwest;
use kit::services::{HubProbe, ServiceFuture};

/// Subset of a hub's `/hub_info` document the wallet relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubInfo {
    pub read_url_prefix: String,
    #[serde(default)]
    pub challenge_text: Option<String>,
    #[serde(default)]
    pub latest_auth_version: Option<String>,
    #[serde(default)]
    pub max_file_upload_size_megabytes: Option<u64>,
}

pub fn hub_info_url(hub_url: &str) -> String {
    format!("{}/hub_info", hub_url.trim_end_matches('/'))
}

#[derive(Debug, Clone)]
pub struct GaiaHubClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for GaiaHubClient {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS))
    }
}

impl GaiaHubClient {
    pub fn new(timeout: Duration) -> Self {
        Self { client: reqwest::Client::new(), timeout }
    }

    pub async fn fetch_hub_info(&self, hub_url: &str) -> Result<HubInfo, String> {
        let res = self
            .client
            .get(hub_info_url(hub_url))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| format!("Failed to reach hub: {}", e))?;

        if !res.status().is_success() {
            return Err(format!("Hub responded with status {}", res.status()));
        }

        let info = res
            .json::<HubInfo>()
            .await
            .map_err(|e| format!("Failed to parse hub info: {}", e))?;
        if info.read_url_prefix.is_empty() {
            return Err("Hub info has an empty read_url_prefix".to_string());
        }
        Ok(info)
    }
}

impl HubProbe for GaiaHubClient {
    fn probe<'a>(&'a self, url: &'a str) -> ServiceFuture<'a, bool> {
        async move { self.fetch_hub_info(url).await.is_ok() }.boxed()
    }
}
