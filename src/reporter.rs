//! Turns accepted matches into report records and fetches their archives.
//!
//! Each suspicious crate is downloaded once, however many targets it
//! matched. Downloads run concurrently up to a fixed bound and a failed
//! download never stops the others.

use crate::registry::CratesIoClient;
use crate::types::{Artifact, CandidateMatch, DownloadStatus, MatchReport, Result};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default number of parallel downloads.
pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 4;

/// Where crate archives come from.
pub trait ArchiveSource {
    /// Highest non-yanked version, or `None` if there is none.
    fn resolve_latest(&self, name: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Store the archive of `name` at `version` under `dir`.
    fn fetch_archive(
        &self,
        name: &str,
        version: &str,
        dir: &Path,
    ) -> impl Future<Output = Result<Artifact>> + Send;
}

impl ArchiveSource for CratesIoClient {
    async fn resolve_latest(&self, name: &str) -> Result<Option<String>> {
        self.latest_version(name).await
    }

    async fn fetch_archive(&self, name: &str, version: &str, dir: &Path) -> Result<Artifact> {
        self.download(name, version, dir).await
    }
}

/// Output of a reporting pass.
#[derive(Debug, Default)]
pub struct Reported {
    pub matches: Vec<MatchReport>,
    /// One line per failed download.
    pub errors: Vec<String>,
}

pub struct Reporter<'a, S> {
    source: Option<&'a S>,
    download_dir: PathBuf,
    concurrency: usize,
}

impl<'a, S: ArchiveSource> Reporter<'a, S> {
    /// A reporter that downloads every reported crate from `source`.
    pub fn new(source: &'a S, download_dir: PathBuf) -> Self {
        Self {
            source: Some(source),
            download_dir,
            concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
        }
    }

    /// A reporter that records matches without downloading anything.
    pub fn without_downloads() -> Self {
        Self {
            source: None,
            download_dir: PathBuf::new(),
            concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Build one report per match, in input order.
    pub async fn report(&self, matches: &[CandidateMatch]) -> Reported {
        let mut seen = HashSet::new();
        let names: Vec<&str> = matches
            .iter()
            .map(|m| m.candidate_name())
            .filter(|name| seen.insert(*name))
            .collect();

        let statuses: HashMap<&str, DownloadStatus> = match self.source {
            Some(source) => {
                info!(
                    "Downloading {} crates to {}",
                    names.len(),
                    self.download_dir.display()
                );
                stream::iter(names)
                    .map(|name| async move { (name, self.fetch(source, name).await) })
                    .buffer_unordered(self.concurrency)
                    .collect()
                    .await
            }
            None => HashMap::new(),
        };

        let mut reported = Reported::default();
        for status in statuses.values() {
            if let DownloadStatus::Failed { error } = status {
                reported.errors.push(error.clone());
            }
        }
        reported.errors.sort();

        reported.matches = matches
            .iter()
            .map(|m| MatchReport {
                target: m.target_name().to_string(),
                target_rank: m.target.rank,
                candidate: m.candidate_name().to_string(),
                candidate_owners: m.candidate.owners.iter().cloned().collect(),
                candidate_version: m.candidate.max_version.clone(),
                candidate_downloads: m.candidate.downloads,
                rule: m.rule,
                similarity: m.similarity,
                download: statuses
                    .get(m.candidate_name())
                    .cloned()
                    .unwrap_or(DownloadStatus::Skipped),
            })
            .collect();

        reported
    }

    async fn fetch(&self, source: &S, name: &str) -> DownloadStatus {
        let version = match source.resolve_latest(name).await {
            Ok(Some(version)) => version,
            Ok(None) => {
                debug!("No versions available for {}", name);
                return DownloadStatus::NoVersions;
            }
            Err(e) => {
                warn!("Failed to resolve latest version of {}: {}", name, e);
                return DownloadStatus::Failed {
                    error: format!("{}: {}", name, e),
                };
            }
        };

        match source.fetch_archive(name, &version, &self.download_dir).await {
            Ok(artifact) => DownloadStatus::Downloaded(artifact),
            Err(e) => {
                warn!("Failed to download {} {}: {}", name, version, e);
                DownloadStatus::Failed {
                    error: format!("{}: {}", name, e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PackageRecord, PopularityTarget, RuleKind, SquatwatchError};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSource {
        fetched: Mutex<Vec<String>>,
    }

    impl ArchiveSource for FakeSource {
        async fn resolve_latest(&self, name: &str) -> Result<Option<String>> {
            match name {
                "empty" => Ok(None),
                _ => Ok(Some("0.1.0".to_string())),
            }
        }

        async fn fetch_archive(&self, name: &str, version: &str, dir: &Path) -> Result<Artifact> {
            if let Ok(mut fetched) = self.fetched.lock() {
                fetched.push(name.to_string());
            }
            if name == "broken" {
                return Err(SquatwatchError::DownloadError {
                    name: name.to_string(),
                    reason: "unexpected HTTP 500".to_string(),
                });
            }
            Ok(Artifact {
                version: version.to_string(),
                path: dir.join(format!("{}-{}.crate", name, version)).display().to_string(),
                sha256: "00".to_string(),
            })
        }
    }

    fn make_match(target: &str, candidate: &str) -> CandidateMatch {
        CandidateMatch::new(
            PopularityTarget {
                record: PackageRecord::new(target, ["A"], "HTTP library"),
                rank: 1,
            },
            PackageRecord::new(candidate, ["B"], "HTTP library"),
            RuleKind::Omission,
        )
    }

    #[tokio::test]
    async fn test_downloads_once_per_candidate() {
        let source = FakeSource::default();
        let reporter = Reporter::new(&source, PathBuf::from("/tmp/cratefiles"));
        let matches = vec![make_match("serde", "serd"), make_match("serd-json", "serd")];

        let reported = reporter.report(&matches).await;
        assert_eq!(reported.matches.len(), 2);
        assert_eq!(source.fetched.lock().unwrap().len(), 1);
        assert!(reported
            .matches
            .iter()
            .all(|m| matches!(m.download, DownloadStatus::Downloaded(_))));
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let source = FakeSource::default();
        let reporter = Reporter::new(&source, PathBuf::from("/tmp/cratefiles")).with_concurrency(2);
        let matches = vec![
            make_match("serde", "broken"),
            make_match("serde", "serd"),
            make_match("tokio", "empty"),
        ];

        let reported = reporter.report(&matches).await;
        assert!(matches!(reported.matches[0].download, DownloadStatus::Failed { .. }));
        assert!(matches!(reported.matches[1].download, DownloadStatus::Downloaded(_)));
        assert!(matches!(reported.matches[2].download, DownloadStatus::NoVersions));
        assert_eq!(reported.errors.len(), 1);
        assert!(reported.errors[0].starts_with("broken"));
    }

    #[tokio::test]
    async fn test_without_downloads() {
        let reporter: Reporter<'_, FakeSource> = Reporter::without_downloads();
        let reported = reporter.report(&[make_match("serde", "serd")]).await;
        assert!(matches!(reported.matches[0].download, DownloadStatus::Skipped));
        assert_eq!(reported.matches[0].candidate_owners, vec!["B".to_string()]);
        assert!(reported.errors.is_empty());
    }

    #[tokio::test]
    async fn test_report_carries_candidate_version() {
        let mut m = make_match("serde", "serd");
        m.candidate.max_version = Some("0.3.1".to_string());
        let reporter: Reporter<'_, FakeSource> = Reporter::without_downloads();

        let reported = reporter.report(&[m, make_match("tokio", "tokoi")]).await;
        assert_eq!(reported.matches[0].candidate_version.as_deref(), Some("0.3.1"));
        assert_eq!(reported.matches[1].candidate_version, None);
    }
}
