//! Description similarity scoring.
//!
//! Two strategies exist and one is picked per run:
//! - `Semantic`: scores fetched from an external scorer before filtering
//! - `EditDistance`: Levenshtein distance between the descriptions
//!
//! A semantic run still falls back to edit distance for any pair the scorer
//! had no answer for, including every pair left over after the scorer failed.

use crate::types::{CandidateMatch, PackageRecord, Result, SimilarityScore, SquatwatchError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Default semantic acceptance floor.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.97;

/// Default edit-distance acceptance ceiling.
pub const DEFAULT_LEVENSHTEIN_THRESHOLD: usize = 10;

/// Levenshtein distance over characters.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Edit-distance score: `1 - distance / max(len(a), len(b))`.
pub fn edit_distance_score(a: &str, b: &str) -> SimilarityScore {
    let (a, b) = (a.trim(), b.trim());
    let distance = levenshtein(a, b);
    let longest = a.chars().count().max(b.chars().count());
    let normalized = if longest == 0 {
        1.0
    } else {
        1.0 - distance as f64 / longest as f64
    };
    SimilarityScore::EditDistance {
        distance,
        normalized,
    }
}

/// An external scorer of description similarity.
pub trait SemanticScorer {
    /// Score two descriptions in `[0, 1]`. `Ok(None)` means the scorer has
    /// no answer for this pair; `Err` means it is unavailable.
    fn score(&self, a: &str, b: &str) -> impl Future<Output = Result<Option<f64>>> + Send;
}

#[derive(Serialize)]
struct ScoreRequest<'a> {
    a: &'a str,
    b: &'a str,
}

#[derive(Deserialize)]
struct ScoreResponse {
    score: Option<f64>,
}

/// Semantic scorer reached over HTTP.
///
/// POSTs `{"a": ..., "b": ...}` and expects `{"score": <float or null>}`.
pub struct HttpSemanticScorer {
    client: Client,
    url: String,
}

impl HttpSemanticScorer {
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("squatwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl SemanticScorer for HttpSemanticScorer {
    async fn score(&self, a: &str, b: &str) -> Result<Option<f64>> {
        let response = self
            .client
            .post(&self.url)
            .json(&ScoreRequest { a, b })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SquatwatchError::ScorerError(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let body: ScoreResponse = response.json().await?;
        Ok(body
            .score
            .filter(|s| s.is_finite())
            .map(|s| s.clamp(0.0, 1.0)))
    }
}

/// Semantic scores fetched ahead of filtering, keyed by `(target, candidate)`.
#[derive(Debug, Clone, Default)]
pub struct ScoreTable {
    scores: HashMap<(String, String), f64>,
    degraded: bool,
}

impl ScoreTable {
    /// Ask `scorer` about every distinct pair in `matches`.
    ///
    /// Each pair is asked at most once, answered or not. The first scorer
    /// error stops all further calls; pairs without a score are handled by
    /// edit distance.
    pub async fn prefetch<'m, S, I>(scorer: &S, matches: I) -> Self
    where
        S: SemanticScorer,
        I: IntoIterator<Item = &'m CandidateMatch>,
    {
        let mut table = Self::default();
        let mut attempted: HashSet<(String, String)> = HashSet::new();

        for m in matches {
            if m.target.record.has_blank_description() || m.candidate.has_blank_description() {
                continue;
            }
            let key = (m.target_name().to_string(), m.candidate_name().to_string());
            if !attempted.insert(key.clone()) {
                continue;
            }

            match scorer
                .score(&m.target.record.description, &m.candidate.description)
                .await
            {
                Ok(Some(score)) => {
                    trace!("Semantic score {} vs {}: {:.3}", key.0, key.1, score);
                    table.scores.insert(key, score);
                }
                Ok(None) => trace!("No semantic score for {} vs {}", key.0, key.1),
                Err(e) => {
                    warn!(
                        "Semantic scorer failed, using edit distance for the rest of the run: {}",
                        e
                    );
                    table.degraded = true;
                    break;
                }
            }
        }

        debug!(
            "Prefetched {} semantic scores over {} pairs",
            table.scores.len(),
            attempted.len()
        );
        table
    }

    pub fn insert(&mut self, target: &str, candidate: &str, score: f64) {
        self.scores
            .insert((target.to_string(), candidate.to_string()), score);
    }

    pub fn get(&self, target: &str, candidate: &str) -> Option<f64> {
        self.scores
            .get(&(target.to_string(), candidate.to_string()))
            .copied()
    }

    /// True if the scorer failed during prefetch.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// How description similarity is computed for this run.
#[derive(Debug, Clone)]
pub enum SimilarityStrategy {
    Semantic(ScoreTable),
    EditDistance,
}

impl SimilarityStrategy {
    /// Two blank descriptions are identical. A blank description never
    /// resembles a written one.
    pub fn score(&self, target: &PackageRecord, candidate: &PackageRecord) -> SimilarityScore {
        match (target.has_blank_description(), candidate.has_blank_description()) {
            (true, true) => {
                return SimilarityScore::EditDistance {
                    distance: 0,
                    normalized: 1.0,
                }
            }
            (true, false) | (false, true) => return SimilarityScore::OneSidedBlank,
            (false, false) => {}
        }

        let fallback = || edit_distance_score(&target.description, &candidate.description);
        match self {
            Self::Semantic(table) => table
                .get(&target.name, &candidate.name)
                .map(|score| SimilarityScore::Semantic { score })
                .unwrap_or_else(fallback),
            Self::EditDistance => fallback(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Semantic(_) => "semantic",
            Self::EditDistance => "edit-distance",
        }
    }
}

/// Decides whether a description score is close enough to suggest
/// impersonation.
///
/// Semantic scores must exceed `similarity_threshold`; edit-distance scores
/// must have a raw distance below `levenshtein_threshold`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptancePolicy {
    pub similarity_threshold: f64,
    pub levenshtein_threshold: usize,
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            levenshtein_threshold: DEFAULT_LEVENSHTEIN_THRESHOLD,
        }
    }
}

impl AcceptancePolicy {
    pub fn new(similarity_threshold: f64, levenshtein_threshold: usize) -> Self {
        Self {
            similarity_threshold,
            levenshtein_threshold,
        }
    }

    pub fn accepts(&self, score: &SimilarityScore) -> bool {
        match *score {
            SimilarityScore::Semantic { score } => score > self.similarity_threshold,
            SimilarityScore::EditDistance { distance, .. } => {
                distance < self.levenshtein_threshold
            }
            SimilarityScore::OneSidedBlank => false,
        }
    }
}
