//! HTTP fetcher implementation
//!
//! This module performs the four retrievals of one extension update:
//! - the listing (overview) page
//! - the package, as a conditional GET against the last archived copy
//! - two pages each of reviews and support threads, paced with jitter
//!
//! Every retrieval returns a `FetchOutcome` and leaves its diagnostic
//! sidecars (`.status`, `.headers`, `.url` or `.exception`) in the snapshot,
//! whether or not it succeeded. Nothing is retried.

use crate::archive::{PackageRef, SnapshotWriter};
use crate::config::{Config, EndpointConfig, UserAgentConfig};
use crate::crawler::pacing::Pacing;
use crate::crawler::result::FetchOutcome;
use crate::state::ExtensionId;
use regex::Regex;
use reqwest::header::{CONTENT_TYPE, IF_MODIFIED_SINCE};
use reqwest::{Client, Response, StatusCode, Url};
use std::fmt::Display;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Content type the package endpoint must answer with
pub const PACKAGE_CONTENT_TYPE: &str = "application/x-chrome-extension";

/// Artifact name used when the resolved URL carries no usable file name
pub const DEFAULT_PACKAGE_NAME: &str = "default.crx";

const OVERVIEW_ARTIFACT: &str = "overview.html";

/// Forum pages are requested in fixed windows of this size
pub const FORUM_PAGE_SIZE: u32 = 100;

/// Offsets of the forum pages fetched per run
pub const FORUM_PAGE_OFFSETS: [u32; 2] = [0, 100];

/// Upper bound on the body kept for diagnosing a rejected package
const DIAGNOSTIC_BODY_LIMIT: usize = 64 * 1024;

/// A package response that must not be stored as a package
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Did not find Content-Type header")]
    MissingContentType { body: String },

    #[error("Expected Content-Type application/x-chrome-extension, but got {found}")]
    UnexpectedContentType { found: String, body: String },

    #[error("{name} is not a valid extension file name")]
    InvalidFileName { name: String },
}

impl ValidationError {
    /// The (possibly truncated) response body, kept for postmortem
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::MissingContentType { body } | Self::UnexpectedContentType { body, .. } => {
                Some(body)
            }
            Self::InvalidFileName { .. } => None,
        }
    }
}

/// The two paginated forum endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForumKind {
    Reviews,
    Support,
}

impl ForumKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Reviews => "reviews",
            Self::Support => "support",
        }
    }

    fn group(&self) -> &'static str {
        match self {
            Self::Reviews => "chrome_webstore",
            Self::Support => "chrome_webstore_support",
        }
    }

    fn endpoint<'a>(&self, endpoints: &'a EndpointConfig) -> &'a str {
        match self {
            Self::Reviews => &endpoints.reviews,
            Self::Support => &endpoints.support,
        }
    }

    /// Artifact name of one page, e.g. `reviews100-199.text`
    pub fn page_artifact(&self, offset: u32) -> String {
        format!(
            "{}{:03}-{:03}.text",
            self.prefix(),
            offset,
            offset + FORUM_PAGE_SIZE - 1
        )
    }
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are followed: the package endpoint redirects to a URL whose
/// last segment is the package file name.
///
/// # Example
///
/// ```no_run
/// use extension_archiver::config::UserAgentConfig;
/// use extension_archiver::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "ExtensionArchiver".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(10)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Issues the network requests of one extension update
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    endpoints: EndpointConfig,
    pacing: Pacing,
}

impl Fetcher {
    pub fn new(client: Client, endpoints: EndpointConfig, pacing: Pacing) -> Self {
        Self {
            client,
            endpoints,
            pacing,
        }
    }

    /// Builds a fetcher with its own client from a full configuration
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.user_agent, config.crawler.request_timeout())?;
        Ok(Self::new(
            client,
            config.endpoints.clone(),
            Pacing::from_config(&config.crawler),
        ))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn endpoints(&self) -> &EndpointConfig {
        &self.endpoints
    }

    /// Fetches the listing page; success iff the status is 200
    pub async fn fetch_overview(&self, id: &ExtensionId, writer: &SnapshotWriter) -> FetchOutcome {
        let url = self.endpoints.overview_url(id.as_str());
        tracing::debug!("{}: GET overview {}", id, url);

        let outcome = match self.client.get(&url).send().await {
            Ok(response) => store_text(writer, OVERVIEW_ARTIFACT, response).await,
            Err(e) => {
                record_exception(writer, OVERVIEW_ARTIFACT, &e).await;
                FetchOutcome::from_transport(&e)
            }
        };

        tracing::debug!("{}: overview page {}", id, outcome);
        outcome
    }

    /// Fetches the package, conditional on the last archived copy
    ///
    /// On 304 only a `.link` record pointing at `previous` is written. On
    /// 200 the response is validated before a single payload byte is
    /// stored; a rejected response leaves only its sidecars.
    pub async fn fetch_package(
        &self,
        id: &ExtensionId,
        writer: &SnapshotWriter,
        previous: Option<&PackageRef>,
    ) -> FetchOutcome {
        let url = self.endpoints.package_url(id.as_str());
        let mut request = self.client.get(&url);
        if let Some(previous) = previous {
            request = request.header(IF_MODIFIED_SINCE, previous.run.http_date());
        }
        tracing::debug!(
            "{}: GET package {} (last: {})",
            id,
            url,
            previous.map_or_else(|| "n/a".to_string(), |p| p.run.http_date())
        );

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                record_exception(writer, DEFAULT_PACKAGE_NAME, &e).await;
                return FetchOutcome::from_transport(&e);
            }
        };

        let status = response.status();
        let outcome = if status == StatusCode::NOT_MODIFIED {
            store_link(writer, previous, response).await
        } else {
            store_package(writer, response).await
        };

        tracing::debug!("{}: package {}", id, outcome);
        outcome
    }

    /// Fetches the first two pages of user reviews
    pub async fn fetch_reviews(&self, id: &ExtensionId, writer: &SnapshotWriter) -> FetchOutcome {
        self.fetch_forum(ForumKind::Reviews, id, writer).await
    }

    /// Fetches the first two pages of support threads
    pub async fn fetch_support(&self, id: &ExtensionId, writer: &SnapshotWriter) -> FetchOutcome {
        self.fetch_forum(ForumKind::Support, id, writer).await
    }

    /// Posts for each forum page in turn, pausing before every request
    ///
    /// A transport failure stops the sequence; otherwise the first non-200
    /// page determines the outcome.
    async fn fetch_forum(
        &self,
        kind: ForumKind,
        id: &ExtensionId,
        writer: &SnapshotWriter,
    ) -> FetchOutcome {
        let mut aggregate = FetchOutcome::Ok;

        for offset in FORUM_PAGE_OFFSETS {
            self.pacing.pause().await;

            let artifact = kind.page_artifact(offset);
            let body = forum_request(kind, id, offset);
            tracing::debug!("{}: POST {} page at offset {}", id, kind.prefix(), offset);

            let response = match self
                .client
                .post(kind.endpoint(&self.endpoints))
                .form(&[("req", body)])
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    record_exception(writer, kind.prefix(), &e).await;
                    return FetchOutcome::from_transport(&e);
                }
            };

            let outcome = store_text(writer, &artifact, response).await;
            if outcome.has_exception() {
                return outcome;
            }
            if aggregate.is_ok() && !outcome.is_ok() {
                aggregate = outcome;
            }
        }

        tracing::debug!("{}: {} pages {}", id, kind.prefix(), aggregate);
        aggregate
    }
}

/// Checks that a 200 package response really carries a package
///
/// On a content-type mismatch the response is consumed to keep a bounded
/// prefix of its body on the error.
pub async fn validate_package_response(
    response: Response,
    file_name: &str,
) -> Result<Response, ValidationError> {
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

    match content_type {
        None => Err(ValidationError::MissingContentType {
            body: read_body_prefix(response).await,
        }),
        Some(found) if !is_package_content_type(&found) => {
            Err(ValidationError::UnexpectedContentType {
                found,
                body: read_body_prefix(response).await,
            })
        }
        Some(_) if !is_valid_package_name(file_name) => Err(ValidationError::InvalidFileName {
            name: file_name.to_string(),
        }),
        Some(_) => Ok(response),
    }
}

fn is_package_content_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|media| media.eq_ignore_ascii_case(PACKAGE_CONTENT_TYPE))
}

/// Returns true for names like `extension_1_2_3.crx`
pub fn is_valid_package_name(name: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^extension[_0-9]+\.crx$").expect("static pattern"))
        .is_match(name)
}

/// Derives the package artifact name from the URL after redirects
pub fn resolved_file_name(url: &Url) -> String {
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    if name.is_empty() || name.contains('&') {
        DEFAULT_PACKAGE_NAME.to_string()
    } else {
        name.to_string()
    }
}

fn forum_request(kind: ForumKind, id: &ExtensionId, offset: u32) -> String {
    serde_json::json!({
        "appId": 94,
        "version": "150922",
        "hl": "en",
        "specs": [{
            "type": "CommentThread",
            "url": format!("http://chrome.google.com/extensions/permalink?id={}", id),
            "groups": kind.group(),
            "startindex": offset.to_string(),
            "numresults": FORUM_PAGE_SIZE.to_string(),
            "id": "428",
        }],
        "internedKeys": [],
        "internedValues": [],
    })
    .to_string()
}

async fn read_body_prefix(mut response: Response) -> String {
    let mut body = Vec::new();
    while body.len() < DIAGNOSTIC_BODY_LIMIT {
        match response.chunk().await {
            Ok(Some(chunk)) => body.extend_from_slice(&chunk),
            _ => break,
        }
    }
    body.truncate(DIAGNOSTIC_BODY_LIMIT);
    String::from_utf8_lossy(&body).into_owned()
}

async fn record_exception(
    writer: &SnapshotWriter,
    artifact: &str,
    error: &(dyn Display + Sync),
) {
    if let Err(e) = writer.write_exception(artifact, error).await {
        tracing::warn!("Cannot record exception for {}: {}", artifact, e);
    }
}

/// Stores a textual response body plus its sidecars
async fn store_text(writer: &SnapshotWriter, artifact: &str, response: Response) -> FetchOutcome {
    let outcome = FetchOutcome::from_status(response.status());

    if let Err(e) = writer.write_response_metadata(artifact, &response).await {
        return FetchOutcome::WriteError(e.to_string());
    }

    match response.text().await {
        Ok(body) => match writer.write(artifact, body).await {
            Ok(()) => outcome,
            Err(e) => FetchOutcome::WriteError(e.to_string()),
        },
        Err(e) => {
            record_exception(writer, artifact, &e).await;
            FetchOutcome::from_transport(&e)
        }
    }
}

/// Records an unchanged package as a link to its previous copy
async fn store_link(
    writer: &SnapshotWriter,
    previous: Option<&PackageRef>,
    response: Response,
) -> FetchOutcome {
    let artifact = previous.map_or_else(
        || resolved_file_name(response.url()),
        |p| p.file_name.clone(),
    );

    if let Err(e) = writer.write_response_metadata(&artifact, &response).await {
        return FetchOutcome::WriteError(e.to_string());
    }

    match previous {
        Some(previous) => {
            if let Err(e) = writer.write_link(&artifact, &previous.link_target()).await {
                return FetchOutcome::WriteError(e.to_string());
            }
        }
        None => tracing::warn!("Package answered 304 without a previous package"),
    }

    FetchOutcome::NotModified
}

/// Validates and streams a package response to disk
async fn store_package(writer: &SnapshotWriter, response: Response) -> FetchOutcome {
    let artifact = resolved_file_name(response.url());
    let status = response.status();

    if let Err(e) = writer.write_response_metadata(&artifact, &response).await {
        return FetchOutcome::WriteError(e.to_string());
    }

    if status != StatusCode::OK {
        return FetchOutcome::from_status(status);
    }

    let mut response = match validate_package_response(response, &artifact).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Rejected package {}: {}", artifact, e);
            let report = match e.body() {
                Some(body) => format!("{}\n\n{}", e, body),
                None => e.to_string(),
            };
            record_exception(writer, &artifact, &report).await;
            return FetchOutcome::Rejected(e.to_string());
        }
    };

    let mut file = match writer.create(&artifact).await {
        Ok(file) => file,
        Err(e) => return FetchOutcome::WriteError(e.to_string()),
    };

    let mut failure = None;
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                if let Err(e) = file.write_all(&chunk).await {
                    failure = Some(FetchOutcome::WriteError(e.to_string()));
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                record_exception(writer, &artifact, &e).await;
                failure = Some(FetchOutcome::from_transport(&e));
                break;
            }
        }
    }

    if failure.is_none() {
        if let Err(e) = file.flush().await {
            failure = Some(FetchOutcome::WriteError(e.to_string()));
        }
    }
    drop(file);

    match failure {
        None => FetchOutcome::Ok,
        Some(outcome) => {
            // A truncated package is worse than none
            if let Err(e) = writer.discard(&artifact).await {
                tracing::warn!("Cannot remove partial package {}: {}", artifact, e);
            }
            outcome
        }
    }
}
