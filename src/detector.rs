//! Runs one detection pass end to end.

use crate::config::{ScanConfig, SourceConfig};
use crate::filter::ownership::owners_overlap;
use crate::filter::{AllowList, AllowListFilter, FilterChain, SimilarityFilter};
use crate::generate::TransformGenerator;
use crate::matcher::CandidateMatcher;
use crate::notify::{ConsoleOutput, TelegramNotifier};
use crate::registry::{CratesIoClient, PopularityIndex, RecentIndex};
use crate::reporter::Reporter;
use crate::similarity::{HttpSemanticScorer, ScoreTable, SimilarityStrategy};
use crate::types::{CandidateMatch, Result, RunReport};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Parallel owner lookups; the client's rate limiter still applies.
const OWNER_LOOKUP_CONCURRENCY: usize = 8;

/// Detector orchestrating sources, matching, filtering and reporting.
pub struct Detector {
    config: ScanConfig,
    client: CratesIoClient,
    scorer: Option<HttpSemanticScorer>,
    allowlist: AllowList,
    console: ConsoleOutput,
    telegram: Option<TelegramNotifier>,
}

impl Detector {
    /// Create a detector, reading registry settings from the config's `DB_CONFIG` file.
    pub fn new(config: ScanConfig, verbose: bool) -> Result<Self> {
        let source = config.source_config()?;
        Self::with_source(config, source, verbose)
    }

    pub fn with_source(config: ScanConfig, source: SourceConfig, verbose: bool) -> Result<Self> {
        config.validate()?;

        let console = ConsoleOutput::new(verbose, config.json, config.quiet);
        let client = CratesIoClient::new(&source)?.with_progress(console.shows_progress());
        let scorer = match config.similarity_url {
            Some(ref url) => Some(HttpSemanticScorer::new(url, source.timeout)?),
            None => None,
        };

        Ok(Self {
            config,
            client,
            scorer,
            allowlist: AllowList::builtin(),
            console,
            telegram: None,
        })
    }

    /// Configure Telegram notifications.
    pub fn with_telegram(mut self, token: &str, chat_id: &str) -> Result<Self> {
        self.telegram = Some(TelegramNotifier::new(token, chat_id)?);
        Ok(self)
    }

    pub fn with_allowlist(mut self, allowlist: AllowList) -> Self {
        self.allowlist = allowlist;
        self
    }

    /// Query the registry and report every likely typosquat.
    ///
    /// Registry query failures abort the run. Scorer, download and
    /// notification failures are logged and the run carries on.
    pub async fn run(&self) -> Result<RunReport> {
        let start_time = Instant::now();
        let mut errors: Vec<String> = Vec::new();
        self.console
            .print_run_start(self.config.check_days, self.config.most_popular);

        let popular_records = self.client.fetch_popular(self.config.most_popular).await?;
        let popular = PopularityIndex::build(popular_records, self.config.most_popular);

        let recent_records = self.client.fetch_recent(self.config.check_days).await?;
        let recent = RecentIndex::build(recent_records, &popular);
        self.console.print_progress(&format!(
            "{} popular crates, {} recently updated",
            popular.len(),
            recent.len()
        ));

        let transforms = TransformGenerator::without(&self.config.disabled_rules);
        let matcher =
            CandidateMatcher::new(&recent, transforms).with_bitflips(!self.config.no_bitflips);
        let raw = matcher.match_all(&popular);
        let raw_matches = raw.len();
        self.console
            .print_progress(&format!("{} name collisions to check", raw_matches));

        let matches = self.resolve_owners(raw).await?;

        // only owner-disjoint pairs reach the similarity filter
        let strategy = match self.scorer {
            Some(ref scorer) => {
                let scored = matches.iter().filter(|m| !owners_overlap(m));
                SimilarityStrategy::Semantic(ScoreTable::prefetch(scorer, scored).await)
            }
            None => SimilarityStrategy::EditDistance,
        };
        debug!("Description similarity strategy: {}", strategy.name());

        let chain = FilterChain::standard(
            SimilarityFilter::new(strategy, self.config.acceptance_policy()),
            AllowListFilter::new(self.allowlist.clone()),
        );
        let accepted = chain.run(matches);
        info!("{} of {} name collisions look like typosquats", accepted.len(), raw_matches);

        let reported = if self.config.no_download {
            Reporter::<CratesIoClient>::without_downloads().report(&accepted).await
        } else {
            Reporter::new(&self.client, self.config.download_dir())
                .with_concurrency(self.config.download_concurrency)
                .report(&accepted)
                .await
        };
        errors.extend(reported.errors);

        for report in &reported.matches {
            self.console.print_match(report);
            if let Some(ref telegram) = self.telegram {
                if let Err(e) = telegram.send_match(report).await {
                    warn!("Telegram notification for {} failed: {}", report.candidate, e);
                    errors.push(format!("Telegram notification failed: {}", e));
                }
            }
        }

        let run = RunReport {
            popular_count: popular.len(),
            recent_count: recent.len(),
            raw_matches,
            matches: reported.matches,
            check_days: self.config.check_days,
            duration_secs: start_time.elapsed().as_secs_f64(),
            errors,
        };

        if let Some(ref telegram) = self.telegram {
            if let Err(e) = telegram.send_summary(&run).await {
                warn!("Telegram summary failed: {}", e);
            }
        }

        Ok(run)
    }

    /// Look up owners of every crate involved in a match.
    ///
    /// Owners decide the ownership filter, so a failed lookup is as fatal as
    /// a failed listing.
    async fn resolve_owners(&self, matches: Vec<CandidateMatch>) -> Result<Vec<CandidateMatch>> {
        let names: BTreeSet<String> = matches
            .iter()
            .flat_map(|m| [m.target_name().to_string(), m.candidate_name().to_string()])
            .collect();
        if names.is_empty() {
            return Ok(matches);
        }
        debug!("Looking up owners of {} crates", names.len());

        let lookups: Vec<(String, Result<BTreeSet<String>>)> = stream::iter(names)
            .map(|name| async move {
                let owners = self.client.owners(&name).await;
                (name, owners)
            })
            .buffer_unordered(OWNER_LOOKUP_CONCURRENCY)
            .collect()
            .await;

        let mut owners: HashMap<String, BTreeSet<String>> = HashMap::with_capacity(lookups.len());
        for (name, result) in lookups {
            owners.insert(name, result?);
        }

        Ok(matches
            .into_iter()
            .map(|mut m| {
                if let Some(o) = owners.get(m.target_name()) {
                    m.target.record.owners = o.clone();
                }
                if let Some(o) = owners.get(m.candidate_name()) {
                    m.candidate.owners = o.clone();
                }
                m
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_config() {
        let config = ScanConfig {
            similarity_threshold: 2.0,
            ..Default::default()
        };
        assert!(Detector::with_source(config, SourceConfig::default(), false).is_err());
    }

    #[test]
    fn test_builds_scorer_when_configured() {
        let config = ScanConfig {
            similarity_url: Some("http://localhost:9/score".to_string()),
            ..Default::default()
        };
        let detector = Detector::with_source(config, SourceConfig::default(), false).unwrap();
        assert!(detector.scorer.is_some());
        assert!(detector.telegram.is_none());
    }
}
