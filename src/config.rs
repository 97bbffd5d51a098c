//! Configuration file handling.
//!
//! The configuration file is stored at `$CARDSTAT_HOME/config.json` and holds the endpoint
//! settings, the month range restriction and the merchant lists used for classification. The
//! card system credentials live separately in `$CARDSTAT_HOME/.secrets/credentials.json`.

use crate::model::{Classifier, MonthSpan};
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const APP_NAME: &str = "cardstat";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const CACHE: &str = "cache";
const OUTPUT: &str = "output";
const CONFIG_JSON: &str = "config.json";
const CREDENTIALS_JSON: &str = "credentials.json";

/// The file whose presence marks a container runtime.
const CONTAINER_MARKER: &str = "/.dockerenv";

/// The output base used inside a container.
const CONTAINER_OUTPUT: &str = "/app/output";

const DEFAULT_ENDPOINT: &str = "https://ydapp.bjut.edu.cn/selftrade/queryCardSelfTradeList";
const DEFAULT_ORG_ID: &str = "2";
const DEFAULT_TRADE_TYPE: u32 = 1;
const DEFAULT_REQUEST_DELAY_MS: u64 = 500;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const DEFAULT_DINING_MERCHANTS: &[&str] = &[
    "北区新餐厅",
    "天天风味",
    "天天餐厅",
    "天天餐厅吧台",
    "奥运餐厅一层",
    "奥运餐厅二层",
    "清真餐厅基本伙",
    "清真餐厅水吧",
    "清真餐厅风味组",
    "美食园",
    "风味餐厅",
];

const DEFAULT_MARKET_MERCHANTS: &[&str] = &["京客隆超市", "京客隆", "超市"];

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$CARDSTAT_HOME` and from there it loads `config.json` and the credentials file.
/// It is immutable once loaded and is handed to each component that needs settings.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    cache: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    endpoint: Url,
    credentials: Credentials,
    output_base: PathBuf,
}

impl Config {
    /// Creates the home directory, its subdirectories, an initial `config.json` with default
    /// settings and the credentials file.
    ///
    /// # Errors
    /// - Returns an error if any file operations fail.
    pub async fn create(
        dir: impl Into<PathBuf>,
        openid: &str,
        cookie: &str,
    ) -> Result<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the cardstat home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let secrets = root.join(SECRETS);
        utils::make_dir(&secrets).await?;
        let cache = root.join(CACHE);
        utils::make_dir(&cache).await?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.is_file() {
            bail!(
                "A config file already exists at '{}', refusing to overwrite it",
                config_path.display()
            )
        }
        let credentials = Credentials::new(openid, cookie)?;
        let config_file = ConfigFile::default();
        let endpoint = config_file.endpoint()?;
        config_file.save(&config_path).await?;

        let credentials_path = resolve(&root, config_file.credentials_path());
        credentials.save(&credentials_path).await?;

        let output_base = output_base(&root, &config_file, in_container());
        Ok(Self {
            root,
            secrets,
            cache,
            config_path,
            config_file,
            endpoint,
            credentials,
            output_base,
        })
    }

    /// This will
    /// - validate that the home directory and the config file exist
    /// - load and validate the config file and the credentials
    /// - return the loaded configuration object
    pub async fn load(home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The cardstat home directory is missing, run 'cardstat init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        let endpoint = config_file.endpoint()?;

        let credentials_path = resolve(&root, config_file.credentials_path());
        let credentials = Credentials::load(&credentials_path).await?;

        let cache = root.join(CACHE);
        utils::make_dir(&cache).await?;

        let output_base = output_base(&root, &config_file, in_container());
        Ok(Self {
            root: root.clone(),
            secrets: root.join(SECRETS),
            cache,
            config_path,
            config_file,
            endpoint,
            credentials,
            output_base,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    /// The root of the month cache, `$CARDSTAT_HOME/cache`.
    pub fn cache_dir(&self) -> &Path {
        &self.cache
    }

    /// Where report files for `year` are written.
    pub fn output_dir(&self, year: i32) -> PathBuf {
        self.output_base.join(year.to_string())
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn org_id(&self) -> &str {
        &self.config_file.org_id
    }

    pub fn trade_type(&self) -> u32 {
        self.config_file.trade_type
    }

    /// The pause between two live fetches.
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.config_file.request_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config_file.request_timeout_secs)
    }

    /// The months to process: the test sub-range when `test_mode` is on, otherwise the full year.
    pub fn month_span(&self) -> Result<MonthSpan> {
        self.config_file.month_span()
    }

    /// Redirects report output, so tests never write to the container location.
    #[cfg(test)]
    pub(crate) fn with_output_base(mut self, output_base: impl Into<PathBuf>) -> Self {
        self.output_base = output_base.into();
        self
    }

    /// Builds the merchant classifier from the configured lists.
    pub fn classifier(&self) -> Classifier {
        Classifier::new(
            &self.config_file.dining_merchants,
            &self.config_file.market_merchants,
        )
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "cardstat",
///   "config_version": 1,
///   "endpoint": "https://ydapp.bjut.edu.cn/selftrade/queryCardSelfTradeList",
///   "org_id": "2",
///   "trade_type": 1,
///   "request_delay_ms": 500,
///   "request_timeout_secs": 30,
///   "test_mode": true,
///   "test_month_start": 3,
///   "test_month_end": 5,
///   "dining_merchants": ["天天餐厅", "美食园"],
///   "market_merchants": ["京客隆超市"]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "cardstat"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// The trade list endpoint
    #[serde(default = "default_endpoint")]
    endpoint: String,

    #[serde(default = "default_org_id")]
    org_id: String,

    #[serde(default = "default_trade_type")]
    trade_type: u32,

    /// Pause between live requests, in milliseconds
    #[serde(default = "default_request_delay_ms")]
    request_delay_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,

    /// Restricts processing to `test_month_start..=test_month_end`
    #[serde(default)]
    test_mode: bool,

    #[serde(default = "default_test_month")]
    test_month_start: u32,

    #[serde(default = "default_test_month")]
    test_month_end: u32,

    /// Merchant names counted as dining, checked first
    #[serde(default = "default_dining_merchants")]
    dining_merchants: Vec<String>,

    /// Merchant names counted as market
    #[serde(default = "default_market_merchants")]
    market_merchants: Vec<String>,

    /// Overrides the output base directory (relative to the home directory or absolute)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_dir: Option<PathBuf>,

    /// Path to the credentials file (relative to the home directory or absolute)
    /// Defaults to $CARDSTAT_HOME/.secrets/credentials.json if not specified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    credentials_path: Option<PathBuf>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            endpoint: default_endpoint(),
            org_id: default_org_id(),
            trade_type: default_trade_type(),
            request_delay_ms: default_request_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            test_mode: false,
            test_month_start: default_test_month(),
            test_month_end: default_test_month(),
            dining_merchants: default_dining_merchants(),
            market_merchants: default_market_merchants(),
            output_dir: None,
            credentials_path: None,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if its month range is invalid
    async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );

        config
            .month_span()
            .with_context(|| format!("Invalid test month range in {}", path.display()))?;
        config
            .endpoint()
            .with_context(|| format!("Invalid endpoint in {}", path.display()))?;

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    fn month_span(&self) -> Result<MonthSpan> {
        if self.test_mode {
            MonthSpan::new(self.test_month_start, self.test_month_end)
        } else {
            Ok(MonthSpan::full_year())
        }
    }

    fn endpoint(&self) -> Result<Url> {
        Url::parse(&self.endpoint)
            .with_context(|| format!("Unable to parse '{}' as a URL", self.endpoint))
    }

    fn credentials_path(&self) -> PathBuf {
        self.credentials_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(CREDENTIALS_JSON))
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_org_id() -> String {
    DEFAULT_ORG_ID.to_string()
}

fn default_trade_type() -> u32 {
    DEFAULT_TRADE_TYPE
}

fn default_request_delay_ms() -> u64 {
    DEFAULT_REQUEST_DELAY_MS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_test_month() -> u32 {
    1
}

fn default_dining_merchants() -> Vec<String> {
    DEFAULT_DINING_MERCHANTS.iter().map(|s| s.to_string()).collect()
}

fn default_market_merchants() -> Vec<String> {
    DEFAULT_MARKET_MERCHANTS.iter().map(|s| s.to_string()).collect()
}

/// The identity the card system expects with every request.
#[derive(Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Credentials {
    openid: String,
    cookie: String,
}

impl Credentials {
    pub fn new(openid: impl Into<String>, cookie: impl Into<String>) -> Result<Self> {
        let credentials = Self {
            openid: openid.into(),
            cookie: cookie.into(),
        };
        credentials.validate()?;
        Ok(credentials)
    }

    pub fn openid(&self) -> &str {
        &self.openid
    }

    pub fn cookie(&self) -> &str {
        &self.cookie
    }

    fn validate(&self) -> Result<()> {
        if self.openid.trim().is_empty() {
            bail!("The openid must not be empty");
        }
        if self.cookie.trim().is_empty() {
            bail!("The cookie must not be empty");
        }
        Ok(())
    }

    async fn load(path: &Path) -> Result<Self> {
        let credentials: Credentials = utils::deserialize(path)
            .await
            .context("Unable to load the card system credentials")?;
        credentials.validate()?;
        Ok(credentials)
    }

    async fn save(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize credentials")?;
        utils::write(path, json).await?;
        utils::restrict_permissions(path)
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("openid", &self.openid)
            .field("cookie", &"<redacted>")
            .finish()
    }
}

fn in_container() -> bool {
    Path::new(CONTAINER_MARKER).exists()
}

/// Picks the output base: an explicit setting wins, then the container location, then
/// `$CARDSTAT_HOME/output`.
fn output_base(root: &Path, config_file: &ConfigFile, in_container: bool) -> PathBuf {
    match &config_file.output_dir {
        Some(dir) => resolve(root, dir.clone()),
        None if in_container => PathBuf::from(CONTAINER_OUTPUT),
        None => root.join(OUTPUT),
    }
}

/// Returns `p` unchanged if it is absolute, otherwise joins it onto `root`.
fn resolve(root: &Path, p: PathBuf) -> PathBuf {
    if p.is_absolute() {
        return p;
    }
    root.join(p)
}
