use kit::constants::DEFAULT_GAIA_HUB_URL;

pub const STORAGE_CONFIG_KEY: &str = "storageConfig";

/// Where the user's app data lives. `None` means the default hub.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    pub own_gaia_hub_url: Option<String>,
}

impl StorageConfig {
    pub fn with_hub(url: &str) -> Self {
        Self { own_gaia_hub_url: Some(url.to_string()) }
    }

    pub fn is_configured(&self) -> bool {
        self.own_gaia_hub_url.is_some()
    }

    pub fn hub_url_or<'a>(&'a self, default_hub_url: &'a str) -> &'a str {
        self.own_gaia_hub_url.as_deref().unwrap_or(default_hub_url)
    }

    pub fn hub_url(&self) -> &str {
        self.hub_url_or(DEFAULT_GAIA_HUB_URL)
    }
}
