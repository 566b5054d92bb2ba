//! crates.io API client for popularity, recent activity, owners and downloads.

use crate::config::SourceConfig;
use crate::registry::cache::OwnerCache;
use crate::types::{Artifact, PackageRecord, Result, SquatwatchError};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// `<name>-<semver>.crate`
const CRATE_FILE_PATTERN: &str = concat!(
    r"^[A-Za-z0-9_-]+-",
    r"(?:0|[1-9]\d*)\.(?:0|[1-9]\d*)\.(?:0|[1-9]\d*)",
    r"(?:-(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)",
    r"(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*)?",
    r"(?:\+[0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*)?",
    r"\.crate$",
);

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, Deserialize)]
struct CratesPage {
    crates: Vec<ApiCrate>,
}

#[derive(Debug, Deserialize)]
struct ApiCrate {
    name: String,
    description: Option<String>,
    homepage: Option<String>,
    repository: Option<String>,
    documentation: Option<String>,
    #[serde(default)]
    downloads: u64,
    max_version: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<ApiCrate> for PackageRecord {
    fn from(c: ApiCrate) -> Self {
        let mut record = PackageRecord::new(
            &c.name,
            std::iter::empty::<String>(),
            c.description.as_deref().unwrap_or(""),
        );
        record.homepage = c.homepage;
        record.repository = c.repository;
        record.documentation = c.documentation;
        record.downloads = c.downloads;
        record.max_version = c.max_version;
        record.published_at = c.created_at;
        record.updated_at = c.updated_at;
        record
    }
}

#[derive(Debug, Deserialize)]
struct OwnersResponse {
    users: Vec<ApiOwner>,
}

#[derive(Debug, Deserialize)]
struct ApiOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct VersionsResponse {
    versions: Vec<ApiVersion>,
}

#[derive(Debug, Deserialize)]
struct ApiVersion {
    num: String,
    #[serde(default)]
    yanked: bool,
}

/// Client for the crates.io web API.
///
/// Every API request waits on a shared rate limiter. Owner lookups are cached
/// because the same popular crate shows up as the target of many matches.
pub struct CratesIoClient {
    client: Client,
    cache: OwnerCache,
    rate_limiter: Arc<DirectLimiter>,
    api_url: String,
    page_size: u32,
    crate_file_re: Regex,
    show_progress: bool,
}

impl CratesIoClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        // Downloads answer with a redirect whose target is validated before it is fetched
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        let per_second = NonZeroU32::new(config.rate_limit).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(per_second);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        let crate_file_re = Regex::new(CRATE_FILE_PATTERN).map_err(|e| {
            SquatwatchError::RegistryError(format!("invalid crate file pattern: {}", e))
        })?;

        Ok(Self {
            client,
            cache: OwnerCache::new(config.cache_ttl),
            rate_limiter,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
            crate_file_re,
            show_progress: false,
        })
    }

    /// Show a progress bar while paging through listings.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// The `limit` crates with the most recent downloads, most downloaded first.
    pub async fn fetch_popular(&self, limit: usize) -> Result<Vec<PackageRecord>> {
        let pb = self.progress_bar(limit as u64, "Fetching popular crates");
        let mut records: Vec<PackageRecord> = Vec::with_capacity(limit);
        let mut page = 1;

        while records.len() < limit {
            let batch = self.fetch_page("recent-downloads", page).await?;
            let exhausted = batch.len() < self.page_size as usize;
            records.extend(batch.into_iter().map(PackageRecord::from));
            if let Some(ref pb) = pb {
                pb.set_position(records.len().min(limit) as u64);
            }
            if exhausted {
                break;
            }
            page += 1;
        }

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        records.truncate(limit);
        debug!("Fetched {} popular crates", records.len());
        Ok(records)
    }

    /// Crates updated within the last `days` days.
    pub async fn fetch_recent(&self, days: u32) -> Result<Vec<PackageRecord>> {
        let cutoff = Utc::now() - ChronoDuration::days(i64::from(days));
        self.fetch_recent_since(cutoff).await
    }

    /// Crates updated at or after `cutoff`, most recently updated first.
    pub async fn fetch_recent_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<PackageRecord>> {
        let pb = self.spinner("Fetching recently updated crates");
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            let batch = self.fetch_page("recent-updates", page).await?;
            let exhausted = batch.len() < self.page_size as usize;
            let mut past_cutoff = false;

            for c in batch {
                let updated_at = c.updated_at;
                match updated_at {
                    Some(updated) if updated >= cutoff => records.push(PackageRecord::from(c)),
                    Some(_) => past_cutoff = true,
                    None => trace!("Skipping {} without an update time", c.name),
                }
            }

            if let Some(ref pb) = pb {
                pb.set_message(format!("{} recently updated crates", records.len()));
            }
            if exhausted || past_cutoff {
                break;
            }
            page += 1;
        }

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        debug!("Fetched {} crates updated since {}", records.len(), cutoff);
        Ok(records)
    }

    /// Owner logins (users and teams) of a crate.
    pub async fn owners(&self, name: &str) -> Result<BTreeSet<String>> {
        if let Some(cached) = self.cache.get(name) {
            trace!("Cache hit for owners of {}", name);
            return Ok(cached);
        }

        let url = format!("{}/api/v1/crates/{}/owners", self.api_url, urlencoding::encode(name));
        let response: OwnersResponse = self.get_json(&url).await?;
        let owners: BTreeSet<String> = response.users.into_iter().map(|u| u.login).collect();

        self.cache.set(name, owners.clone());
        Ok(owners)
    }

    /// The highest non-yanked version by semver ordering.
    pub async fn latest_version(&self, name: &str) -> Result<Option<String>> {
        let url = format!("{}/api/v1/crates/{}/versions", self.api_url, urlencoding::encode(name));
        let response: VersionsResponse = self.get_json(&url).await?;

        let latest = response
            .versions
            .into_iter()
            .filter(|v| !v.yanked)
            .filter_map(|v| match semver::Version::parse(&v.num) {
                Ok(parsed) => Some((parsed, v.num)),
                Err(e) => {
                    warn!("Ignoring unparsable version {} of {}: {}", v.num, name, e);
                    None
                }
            })
            .max_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, num)| num);

        Ok(latest)
    }

    /// Download the `.crate` file of `name` at `version` into `dir`.
    ///
    /// The download endpoint must answer with a redirect to a file named like
    /// a crate archive; anything else is refused.
    pub async fn download(&self, name: &str, version: &str, dir: &Path) -> Result<Artifact> {
        let fail = |reason: String| SquatwatchError::DownloadError {
            name: name.to_string(),
            reason,
        };

        tokio::fs::create_dir_all(dir).await?;

        let url = format!(
            "{}/api/v1/crates/{}/{}/download",
            self.api_url,
            urlencoding::encode(name),
            urlencoding::encode(version)
        );

        self.rate_limiter.until_ready().await;
        trace!("Requesting download: {}", url);
        let response = self.client.get(&url).send().await?;

        if response.status() != StatusCode::FOUND {
            return Err(fail(format!("unexpected HTTP {} fetching {}", response.status(), url)));
        }

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| fail(format!("redirect without Location header fetching {}", url)))?;
        let location = url::Url::parse(&url)?.join(location)?;

        let crate_file = location
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string();
        if !self.crate_file_re.is_match(&crate_file) {
            return Err(fail(format!("invalid crate filename '{}' from {}", crate_file, url)));
        }

        let response = self.client.get(location.clone()).send().await?;
        if response.status() != StatusCode::OK {
            let status = response.status();
            return Err(fail(format!("unexpected HTTP {} fetching {}", status, location)));
        }
        let bytes = response.bytes().await?;

        let path = dir.join(&crate_file);
        tokio::fs::write(&path, &bytes).await?;
        debug!("Downloaded {} ({} bytes) to {}", crate_file, bytes.len(), path.display());

        Ok(Artifact {
            version: version.to_string(),
            path: path.display().to_string(),
            sha256: hash_bytes(&bytes),
        })
    }

    async fn fetch_page(&self, sort: &str, page: usize) -> Result<Vec<ApiCrate>> {
        let url = format!(
            "{}/api/v1/crates?sort={}&per_page={}&page={}",
            self.api_url, sort, self.page_size, page
        );
        let response: CratesPage = self.get_json(&url).await?;
        trace!("Page {} of {}: {} crates", page, sort, response.crates.len());
        Ok(response.crates)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.rate_limiter.until_ready().await;
        trace!("GET {}", url);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(SquatwatchError::RegistryError(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    fn progress_bar(&self, total: u64, message: &str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }

        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(message.to_string());
        Some(pb)
    }

    fn spinner(&self, message: &str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }

        let pb = ProgressBar::new_spinner();
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message(message.to_string());
        Some(pb)
    }
}

/// SHA256 of a byte buffer, hex encoded.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> CratesIoClient {
        CratesIoClient::new(&SourceConfig::default()).unwrap()
    }

    #[test]
    fn test_crate_file_pattern() {
        let re = client().crate_file_re;
        assert!(re.is_match("serde-1.0.193.crate"));
        assert!(re.is_match("tokio_util-0.7.10.crate"));
        assert!(re.is_match("foo-1.0.0-alpha.1+build.5.crate"));
        assert!(!re.is_match("serde-1.0.crate"));
        assert!(!re.is_match("../serde-1.0.0.crate"));
        assert!(!re.is_match("serde-1.0.0.tar.gz"));
        assert!(!re.is_match("serde-01.0.0.crate"));
    }

    #[test]
    fn test_api_crate_conversion() {
        let json = r#"{
            "name": "serde",
            "description": "A generic serialization/deserialization framework",
            "homepage": "https://serde.rs",
            "repository": "https://github.com/serde-rs/serde",
            "documentation": null,
            "downloads": 123456,
            "max_version": "1.0.193",
            "created_at": "2014-12-05T20:20:39.487502+00:00",
            "updated_at": "2023-11-20T01:02:03.000000+00:00"
        }"#;
        let api: ApiCrate = serde_json::from_str(json).unwrap();
        let record = PackageRecord::from(api);

        assert_eq!(record.name, "serde");
        assert!(record.owners.is_empty());
        assert_eq!(record.homepage.as_deref(), Some("https://serde.rs"));
        assert!(record.documentation.is_none());
        assert_eq!(record.downloads, 123456);
        assert!(record.updated_at.is_some());
    }

    #[test]
    fn test_missing_description_is_blank() {
        let api: ApiCrate = serde_json::from_str(r#"{"name": "x", "description": null}"#).unwrap();
        assert!(PackageRecord::from(api).has_blank_description());
    }

    #[test]
    fn test_hash_bytes() {
        assert_eq!(
            hash_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
