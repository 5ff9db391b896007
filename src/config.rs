use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Background refresh interval in minutes, 0 disables the loop
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub hackernews: HackerNewsConfig,
    #[serde(default)]
    pub rss: RssConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_refresh_interval() -> u64 {
    0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            refresh_interval: default_refresh_interval(),
            cache: CacheConfig::default(),
            hackernews: HackerNewsConfig::default(),
            rss: RssConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_stories_ttl")]
    pub stories_ttl_secs: u64,
    #[serde(default = "default_rss_ttl")]
    pub rss_ttl_secs: u64,
    #[serde(default = "default_unified_ttl")]
    pub unified_ttl_secs: u64,
    /// Upper bound on memoized analyses; unbounded when absent
    #[serde(default)]
    pub analysis_max_entries: Option<usize>,
    /// Lifetime of a memoized LLM failure fallback; kept forever when absent
    #[serde(default)]
    pub analysis_failure_ttl_secs: Option<u64>,
}

fn default_stories_ttl() -> u64 {
    5 * 60
}

fn default_rss_ttl() -> u64 {
    10 * 60
}

fn default_unified_ttl() -> u64 {
    5 * 60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stories_ttl_secs: default_stories_ttl(),
            rss_ttl_secs: default_rss_ttl(),
            unified_ttl_secs: default_unified_ttl(),
            analysis_max_entries: None,
            analysis_failure_ttl_secs: None,
        }
    }
}

impl CacheConfig {
    pub fn stories_ttl(&self) -> Duration {
        Duration::from_secs(self.stories_ttl_secs)
    }

    pub fn rss_ttl(&self) -> Duration {
        Duration::from_secs(self.rss_ttl_secs)
    }

    pub fn unified_ttl(&self) -> Duration {
        Duration::from_secs(self.unified_ttl_secs)
    }

    pub fn analysis_failure_ttl(&self) -> Option<Duration> {
        self.analysis_failure_ttl_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HackerNewsConfig {
    #[serde(default = "default_hn_api_base")]
    pub api_base: String,
    /// Cap applied to the `limit` query parameter
    #[serde(default = "default_max_stories")]
    pub max_stories: usize,
    /// Stories contributed to the unified feed
    #[serde(default = "default_hn_unified_limit")]
    pub unified_limit: usize,
}

fn default_hn_api_base() -> String {
    "https://hacker-news.firebaseio.com/v0".to_string()
}

fn default_max_stories() -> usize {
    100
}

fn default_hn_unified_limit() -> usize {
    20
}

impl Default for HackerNewsConfig {
    fn default() -> Self {
        Self {
            api_base: default_hn_api_base(),
            max_stories: default_max_stories(),
            unified_limit: default_hn_unified_limit(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RssConfig {
    /// Maximum number of selected feeds fetched per refresh
    #[serde(default = "default_fanout_limit")]
    pub fanout_limit: usize,
    #[serde(default = "default_max_articles")]
    pub max_articles: usize,
    /// Articles contributed to the unified feed
    #[serde(default = "default_rss_unified_limit")]
    pub unified_limit: usize,
    #[serde(default = "default_categories")]
    pub default_categories: Vec<String>,
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedConfig>,
}

fn default_fanout_limit() -> usize {
    8
}

fn default_max_articles() -> usize {
    50
}

fn default_rss_unified_limit() -> usize {
    25
}

fn default_categories() -> Vec<String> {
    [
        "Red Team",
        "Blue Team",
        "AI/Security",
        "Threat Intel",
        "Cyber News",
        "Write-ups",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}

const HTB_BLOG_FEEDS: &[(&str, &str, &str)] = &[
    ("All Content", "all", "All"),
    ("Red Teaming", "red-teaming", "Red Team"),
    ("Blue Teaming", "blue-teaming", "Blue Team"),
    ("Cyber Teams", "cyber-teams", "Cyber Teams"),
    ("Education", "education", "Education"),
    ("CISO Diaries", "ciso-diaries", "CISO"),
    ("Customer Stories", "customer-stories", "Case Studies"),
    ("Write-Ups", "write-ups", "Write-ups"),
    ("News", "news", "Cyber News"),
    ("Career Stories", "career-stories", "Career"),
    ("Humans of HTB", "humans-of-htb", "Community"),
    ("Artificial Intelligence", "artificial-intelligence", "AI/Security"),
    ("Threat Intelligence", "threat-intelligence", "Threat Intel"),
    ("Security 101", "security-101", "Security Basics"),
];

fn default_feeds() -> Vec<FeedConfig> {
    HTB_BLOG_FEEDS
        .iter()
        .map(|(name, path, category)| FeedConfig {
            name: name.to_string(),
            url: format!("https://www.hackthebox.com/rss/blog/{}", path),
            category: category.to_string(),
        })
        .collect()
}

impl Default for RssConfig {
    fn default() -> Self {
        Self {
            fanout_limit: default_fanout_limit(),
            max_articles: default_max_articles(),
            unified_limit: default_rss_unified_limit(),
            default_categories: default_categories(),
            feeds: default_feeds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    pub category: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_llm_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_llm_model() -> String {
    "openai/gpt-oss-20b:free".to_string()
}

fn default_max_tokens() -> u32 {
    400
}

fn default_temperature() -> f32 {
    0.3
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}

/// Credentials read from the environment rather than the config file.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub llm_api_key: Option<String>,
    pub cron_secret: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            llm_api_key: non_empty_var("OPENROUTER_API_KEY"),
            cron_secret: non_empty_var("CRON_SECRET"),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
