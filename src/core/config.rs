use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};
use tracing::debug;

use crate::ledger::{BASE_CURRENCY, is_valid_code};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BalanceConfig {
    pub code: String,
    #[serde(default)]
    pub amount: f64,
}

impl BalanceConfig {
    pub fn new(code: &str, amount: f64) -> Self {
        BalanceConfig {
            code: code.to_string(),
            amount,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "localhost".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: "https://www.cbr-xml-daily.ru".to_string(),
            timeout_secs: 30,
            retries: 2,
            retry_delay_ms: 500,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RefreshConfig {
    pub period_minutes: u64,
    /// Fetch once right away instead of sleeping a full period first.
    pub fetch_on_start: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        RefreshConfig {
            period_minutes: 5,
            fetch_on_start: true,
        }
    }
}

impl RefreshConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_minutes.saturating_mul(60))
    }
}

fn default_balances() -> Vec<BalanceConfig> {
    vec![
        BalanceConfig::new("USD", 0.0),
        BalanceConfig::new("EUR", 0.0),
        BalanceConfig::new(BASE_CURRENCY, 0.0),
    ]
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_balances")]
    pub balances: Vec<BalanceConfig>,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Log the full report this often when balances or rates changed.
    pub report_interval_secs: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            balances: default_balances(),
            refresh: RefreshConfig::default(),
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
            report_interval_secs: None,
        }
    }
}

impl AppConfig {
    /// Loads the config from the default location, falling back to defaults
    /// when no file exists there.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(path = %config_path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "fxledger", "fxledger")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Overrides the starting amount of `code`, adding the currency if it is
    /// not configured yet.
    pub fn set_initial_balance(&mut self, code: &str, amount: f64) {
        let code = code.to_uppercase();
        match self.balances.iter_mut().find(|b| b.code.to_uppercase() == code) {
            Some(entry) => entry.amount = amount,
            None => self.balances.push(BalanceConfig::new(&code, amount)),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh.period_minutes == 0 {
            bail!("Refresh period must be a positive number of minutes");
        }
        if self.refresh.period_minutes.checked_mul(60).is_none() {
            bail!(
                "Refresh period of {} minutes is too large",
                self.refresh.period_minutes
            );
        }
        if self.report_interval_secs == Some(0) {
            bail!("Report interval must be a positive number of seconds");
        }
        for entry in &self.balances {
            if !is_valid_code(&entry.code) {
                bail!("Invalid currency code in balances: {:?}", entry.code);
            }
        }
        if !self
            .balances
            .iter()
            .any(|b| b.code.eq_ignore_ascii_case(BASE_CURRENCY))
        {
            bail!("Balances must include the base currency {BASE_CURRENCY}");
        }
        Ok(())
    }
}

pub const DEFAULT_CONFIG: &str = r#"---
balances:
  - code: "USD"
    amount: 0
  - code: "EUR"
    amount: 0
  - code: "RUB"
    amount: 0

refresh:
  period_minutes: 5
  fetch_on_start: true

server:
  host: "localhost"
  port: 8080

provider:
  base_url: "https://www.cbr-xml-daily.ru"
  timeout_secs: 30
"#;
