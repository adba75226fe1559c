use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dotenvy::dotenv;
use kit::constants::{
    DEFAULT_GAIA_HUB_URL, DEFAULT_PROBE_TIMEOUT_MS, HIGH_FEE_AMOUNT_USTX,
    HUMAN_REACTION_DEBOUNCE_TIME,
};

use crate::state::local_store::{FileStore, StoreError};

pub const GAIA_HUB_URL_KEY: &str = "STACKS_WALLET_GAIA_HUB_URL";
pub const DEBOUNCE_MS_KEY: &str = "STACKS_WALLET_DEBOUNCE_MS";
pub const PROBE_TIMEOUT_MS_KEY: &str = "STACKS_WALLET_PROBE_TIMEOUT_MS";
pub const DATA_DIR_KEY: &str = "STACKS_WALLET_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(String),
    #[error("failed to parse settings file: {0}")]
    Parse(String),
    #[error("invalid value for {key}: '{value}'")]
    InvalidVar { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletSettings {
    pub default_gaia_hub_url: String,
    pub debounce_ms: u64,
    pub probe_timeout_ms: u64,
    pub high_fee_threshold_ustx: u64,
    pub data_dir: Option<PathBuf>,
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            default_gaia_hub_url: DEFAULT_GAIA_HUB_URL.to_string(),
            debounce_ms: HUMAN_REACTION_DEBOUNCE_TIME,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            high_fee_threshold_ustx: HIGH_FEE_AMOUNT_USTX,
            data_dir: None,
        }
    }
}

impl WalletSettings {
    /// `<config_dir>/stacks-wallet/settings.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("stacks-wallet").join("settings.toml"))
    }

    /// Reads `path` (or the default settings file when present), then applies the
    /// environment, `.env` included.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        dotenv().ok();
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let mut file = std::fs::File::open(path)
            .map_err(|e| SettingsError::Io(format!("{}: {}", path.display(), e)))?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)
            .map_err(|e| SettingsError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&buf)
    }

    pub fn from_toml(source: &str) -> Result<Self, SettingsError> {
        toml::from_str(source).map_err(|e| SettingsError::Parse(e.to_string()))
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(GAIA_HUB_URL_KEY).filter(|v| !v.trim().is_empty()) {
            self.default_gaia_hub_url = url.trim().to_string();
        }
        if let Some(value) = lookup(DEBOUNCE_MS_KEY) {
            self.debounce_ms = parse_var(DEBOUNCE_MS_KEY, &value)?;
        }
        if let Some(value) = lookup(PROBE_TIMEOUT_MS_KEY) {
            self.probe_timeout_ms = parse_var(PROBE_TIMEOUT_MS_KEY, &value)?;
        }
        if let Some(dir) = lookup(DATA_DIR_KEY).filter(|v| !v.trim().is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn open_local_store(&self) -> Result<FileStore, StoreError> {
        FileStore::in_data_dir(self.data_dir.as_deref())
    }
}

fn parse_var(key: &'static str, value: &str) -> Result<u64, SettingsError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| SettingsError::InvalidVar { key, value: value.to_string() })
}
