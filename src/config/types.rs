use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Placeholder substituted with the extension id in endpoint templates
pub const ID_PLACEHOLDER: &str = "{id}";

/// Main configuration structure for the archiver
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub endpoints: EndpointConfig,
}

/// Scheduling and request behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Width of the worker pool used for extensions without forums
    #[serde(rename = "parallel-workers", default = "default_parallel_workers")]
    pub parallel_workers: u32,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Lower bound of the random delay before each forum request (milliseconds)
    #[serde(rename = "pacing-min-delay", default = "default_pacing_min_delay")]
    pub pacing_min_delay: u64,

    /// Upper bound of the random delay before each forum request (milliseconds)
    #[serde(rename = "pacing-max-delay", default = "default_pacing_max_delay")]
    pub pacing_max_delay: u64,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            parallel_workers: default_parallel_workers(),
            request_timeout: default_request_timeout(),
            pacing_min_delay: default_pacing_min_delay(),
            pacing_max_delay: default_pacing_max_delay(),
        }
    }
}

fn default_parallel_workers() -> u32 {
    24
}

fn default_request_timeout() -> u64 {
    10
}

fn default_pacing_min_delay() -> u64 {
    500
}

fn default_pacing_max_delay() -> u64 {
    1000
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Archive location configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// Directory holding the sharded `<shard>/<id>.tar` files
    pub root: PathBuf,

    /// File listing the ids whose reviews and support pages are scraped
    #[serde(rename = "forum-roster", default)]
    pub forum_roster: Option<PathBuf>,
}

/// Remote endpoints; `{id}` is replaced with the extension id
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Sitemap index listing the shard sitemaps
    #[serde(default = "default_sitemap")]
    pub sitemap: String,

    /// Listing page template
    #[serde(default = "default_overview")]
    pub overview: String,

    /// Package download template (supports conditional GET)
    #[serde(default = "default_package")]
    pub package: String,

    /// Paginated reviews endpoint (POST)
    #[serde(default = "default_reviews")]
    pub reviews: String,

    /// Paginated support endpoint (POST)
    #[serde(default = "default_support")]
    pub support: String,
}

impl EndpointConfig {
    pub fn overview_url(&self, id: &str) -> String {
        self.overview.replace(ID_PLACEHOLDER, id)
    }

    pub fn package_url(&self, id: &str) -> String {
        self.package.replace(ID_PLACEHOLDER, id)
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            sitemap: default_sitemap(),
            overview: default_overview(),
            package: default_package(),
            reviews: default_reviews(),
            support: default_support(),
        }
    }
}

fn default_sitemap() -> String {
    "https://chrome.google.com/webstore/sitemap".to_string()
}

fn default_overview() -> String {
    "https://chrome.google.com/webstore/detail/{id}".to_string()
}

fn default_package() -> String {
    "https://clients2.google.com/service/update2/crx?response=redirect&prodversion=38.0&x=id%3D{id}%26uc"
        .to_string()
}

fn default_reviews() -> String {
    "https://chrome.google.com/reviews/components".to_string()
}

fn default_support() -> String {
    "https://chrome.google.com/reviews/components".to_string()
}
