use crate::error::ConfigError;
use crate::filter::{DropWords, KeywordRules, UrlFilter};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use url::Url;

/// Tokens accepted as "on" for boolean environment overrides
const TRUTHY_ENV: &[&str] = &["1", "true", "yes", "on"];
/// Tokens accepted as "off" for boolean environment overrides
const FALSY_ENV: &[&str] = &["0", "false", "no", "off"];

/// One page to poll, with its keyword rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique identifier of the source
    #[serde(default)]
    pub name: String,

    /// Page to fetch
    #[serde(default)]
    pub url: String,

    /// Case-insensitive substrings (or `/regex/`), any of which admits a link
    #[serde(default)]
    pub include_keywords: Vec<String>,

    /// Case-insensitive substrings (or `/regex/`), any of which rejects a link
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
}

impl SourceConfig {
    /// Create a source with no keyword rules
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            include_keywords: Vec::new(),
            exclude_keywords: Vec::new(),
        }
    }

    /// Set the include keywords
    pub fn with_include(mut self, keywords: &[&str]) -> Self {
        self.include_keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Set the exclude keywords
    pub fn with_exclude(mut self, keywords: &[&str]) -> Self {
        self.exclude_keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }
}

/// How pages are retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchBackend {
    /// Plain HTTP GET
    #[default]
    Http,
    /// Render through a WebDriver server (for script-built pages)
    WebDriver,
}

/// Configuration for page fetching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default)]
    pub backend: FetchBackend,

    /// Per-fetch timeout; a timed out fetch is an ordinary fetch error
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum number of sources fetched at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            backend: FetchBackend::default(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            max_concurrency: default_max_concurrency(),
            webdriver_url: default_webdriver_url(),
        }
    }
}

/// Configuration for the optional semantic classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Environment variable that, when set to a boolean token, overrides `enabled`
    #[serde(default = "default_llm_enabled_env")]
    pub enabled_env: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Environment variable that overrides `model`
    #[serde(default = "default_llm_model_env")]
    pub model_env: String,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Attach the model's one-line reason to each kept item
    #[serde(default)]
    pub rationale: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            enabled_env: default_llm_enabled_env(),
            model: default_llm_model(),
            model_env: default_llm_model_env(),
            api_key_env: default_api_key_env(),
            base_url: default_llm_base_url(),
            rationale: false,
        }
    }
}

impl LlmConfig {
    /// Whether the classifier is switched on, letting the environment override the file
    pub fn resolved_enabled(&self, env: impl Fn(&str) -> Option<String>) -> bool {
        env_flag(env(&self.enabled_env).as_deref()).unwrap_or(self.enabled)
    }

    /// Model name, letting the environment override the file
    pub fn resolved_model(&self, env: impl Fn(&str) -> Option<String>) -> String {
        env(&self.model_env)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.model.clone())
    }
}

/// Configuration for email delivery of the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub smtp_host: Option<String>,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub username: Option<String>,

    /// Environment variable that overrides `username`
    #[serde(default)]
    pub username_env: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Environment variable holding the SMTP password
    #[serde(default)]
    pub password_env: Option<String>,

    #[serde(default)]
    pub to: Option<String>,

    #[serde(default)]
    pub from: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: None,
            smtp_port: default_smtp_port(),
            username: None,
            username_env: None,
            password: None,
            password_env: None,
            to: None,
            from: None,
        }
    }
}

impl EmailConfig {
    /// SMTP username, preferring the environment
    pub fn resolved_username(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        self.username_env
            .as_deref()
            .and_then(|var| env(var))
            .filter(|u| !u.is_empty())
            .or_else(|| self.username.clone())
    }

    /// SMTP password: from `password_env` when named, otherwise the literal value
    pub fn resolved_password(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        match &self.password_env {
            Some(var) => env(var),
            None => self.password.clone(),
        }
        .filter(|p| !p.is_empty())
    }
}

/// The complete declarative monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// Words that drop a link from every source when found in its title
    #[serde(default = "default_drop_keywords")]
    pub drop_keywords: Vec<String>,

    /// Regex patterns for navigation URLs that are never announcements
    #[serde(default = "default_skip_url_patterns")]
    pub skip_url_patterns: Vec<String>,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub email: EmailConfig,
}

impl MonitorConfig {
    /// Configuration for the given sources with every other setting at its default
    pub fn with_sources(sources: Vec<SourceConfig>) -> Self {
        Self {
            sources,
            drop_keywords: default_drop_keywords(),
            skip_url_patterns: default_skip_url_patterns(),
            fetch: FetchConfig::default(),
            llm: LlmConfig::default(),
            email: EmailConfig::default(),
        }
    }

    /// Load and validate configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(yaml)?;
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                config.fetch.webdriver_url = webdriver_url;
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants every run depends on.
    ///
    /// Sources need a name and an absolute URL, names must be unique, and every
    /// keyword pattern must compile.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        let mut names = HashSet::new();
        for (index, source) in self.sources.iter().enumerate() {
            if source.name.trim().is_empty() {
                return Err(ConfigError::MissingField { index, field: "name" });
            }
            if source.url.trim().is_empty() {
                return Err(ConfigError::MissingField { index, field: "url" });
            }
            if !names.insert(source.name.as_str()) {
                return Err(ConfigError::DuplicateSource(source.name.clone()));
            }
            let parsed = Url::parse(&source.url).map_err(|_| ConfigError::InvalidUrl {
                source_name: source.name.clone(),
                url: source.url.clone(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidUrl {
                    source_name: source.name.clone(),
                    url: source.url.clone(),
                });
            }
            KeywordRules::for_source(source)?;
        }

        DropWords::new(&self.drop_keywords)?;
        UrlFilter::new(&self.skip_url_patterns)?;
        Ok(())
    }
}

/// Parse a boolean environment token; unrecognised or absent values yield `None`
pub fn env_flag(raw: Option<&str>) -> Option<bool> {
    let normalized = raw?.trim().to_ascii_lowercase();
    if TRUTHY_ENV.contains(&normalized.as_str()) {
        Some(true)
    } else if FALSY_ENV.contains(&normalized.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Process environment lookup used by the binary
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_user_agent() -> String {
    "rfp-monitor/1.0".to_string()
}

fn default_max_concurrency() -> usize {
    4
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_llm_enabled_env() -> String {
    "LLM_ENABLED".to_string()
}

fn default_llm_model() -> String {
    "gpt-5-nano".to_string()
}

fn default_llm_model_env() -> String {
    "LLM_MODEL".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

/// Trades that are never software/services procurement
fn default_drop_keywords() -> Vec<String> {
    [
        "asphalt",
        "paving",
        "plow",
        "snow removal",
        "hvac",
        "plumbing",
        "flooring",
        "roof",
        "roofing",
        "janitorial",
        "cleaning",
        "welding",
        "fleet",
        "truck",
        "bus",
        "vehicle",
        "tree removal",
        "landscaping",
        "fencing",
        "doors",
        "windows",
        "supplies",
        "parts",
        "hardware",
        "concrete",
        "demolition",
        "construction",
        "road",
        "pavement",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Portal navigation paths that match keywords but are never postings
fn default_skip_url_patterns() -> Vec<String> {
    [
        r"/login",
        r"/create",
        r"/vendor/",
        r"/fran(ç|%c3%a7)ais",
        r"/home/bidshomepage",
        r"/contact-",
        r"/privacy",
        r"/terms",
        r"/supplier",
        r"/buyer",
        r"/plans",
        r"/demo",
        r"/subscribe",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
