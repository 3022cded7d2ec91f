//! Extension id discovery
//!
//! Batches are assembled from three sources:
//! - ids that already have an archive on disk
//! - the forum roster file
//! - the store's public sitemap (optional, network bound)

mod roster;
mod sitemap;

pub use roster::{existing_ids, load_forum_roster, parse_forum_roster};
pub use sitemap::{extract_id, parse_locations, ShardMatcher};

use crate::config::EndpointConfig;
use crate::state::ExtensionId;
use crate::ArchiverError;
use reqwest::Client;
use std::collections::BTreeSet;

/// Enumerates the extension ids listed in the store sitemap
///
/// Fetches the sitemap index, keeps the shard entries that belong to the
/// configured index, fetches every shard and extracts one id per listing
/// URL. Any failed retrieval aborts discovery with an error; the caller
/// decides whether to continue without discovered ids.
pub async fn discover_ids(
    client: &Client,
    endpoints: &EndpointConfig,
) -> Result<BTreeSet<ExtensionId>, ArchiverError> {
    let matcher = ShardMatcher::new(&endpoints.sitemap)
        .map_err(|e| ArchiverError::Discovery(e.to_string()))?;

    let index = fetch_text(client, &endpoints.sitemap).await?;
    let locations = parse_locations(&index);
    let shards = matcher.shards(&locations);
    tracing::info!(
        "Sitemap lists {} entries, {} of them shards",
        locations.len(),
        shards.len()
    );

    let mut ids = BTreeSet::new();
    for shard in shards {
        let document = fetch_text(client, shard).await?;
        let before = ids.len();
        for listing in parse_locations(&document) {
            match extract_id(&listing) {
                Some(id) => {
                    ids.insert(id);
                }
                None => tracing::debug!("No extension id in listing URL {}", listing),
            }
        }
        tracing::debug!("Shard {} added {} ids", shard, ids.len() - before);
    }

    tracing::info!("Discovered {} extension ids", ids.len());
    Ok(ids)
}

async fn fetch_text(client: &Client, url: &str) -> Result<String, ArchiverError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| ArchiverError::Http {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ArchiverError::Discovery(format!(
            "{} answered with status {}",
            url,
            status.as_u16()
        )));
    }

    response.text().await.map_err(|source| ArchiverError::Http {
        url: url.to_string(),
        source,
    })
}
