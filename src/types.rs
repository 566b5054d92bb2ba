//! Core types and errors for the typosquat detector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Errors that can occur during a detection run.
#[derive(Error, Debug)]
pub enum SquatwatchError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Registry error: {0}")]
    RegistryError(String),

    #[error("Download of {name} failed: {reason}")]
    DownloadError { name: String, reason: String },

    #[error("Telegram error: {0}")]
    TelegramError(String),

    #[error("Similarity scorer error: {0}")]
    ScorerError(String),
}

pub type Result<T> = std::result::Result<T, SquatwatchError>;

/// A package as returned by one of the registry queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageRecord {
    /// Registry-unique package name.
    pub name: String,
    /// Opaque owner identifiers (user logins and team names).
    pub owners: BTreeSet<String>,
    /// Free-text description, possibly empty.
    pub description: String,
    pub homepage: Option<String>,
    pub repository: Option<String>,
    pub documentation: Option<String>,
    /// All-time download count.
    pub downloads: u64,
    /// Highest published version, if the registry reported one.
    pub max_version: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PackageRecord {
    /// Create a record with the fields the detection pipeline relies on.
    pub fn new<I, S>(name: &str, owners: I, description: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            owners: owners.into_iter().map(Into::into).collect(),
            description: description.to_string(),
            homepage: None,
            repository: None,
            documentation: None,
            downloads: 0,
            max_version: None,
            published_at: None,
            updated_at: None,
        }
    }

    /// True if the two records have at least one owner in common.
    pub fn shares_owner_with(&self, other: &PackageRecord) -> bool {
        !self.owners.is_disjoint(&other.owners)
    }

    /// True if the description is missing or whitespace only.
    pub fn has_blank_description(&self) -> bool {
        self.description.trim().is_empty()
    }
}

/// A popular package that newly published names are compared against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PopularityTarget {
    pub record: PackageRecord,
    /// 1-based popularity rank, dense over the index.
    pub rank: usize,
}

impl PopularityTarget {
    pub fn name(&self) -> &str {
        &self.record.name
    }
}

/// A package published or updated inside the trailing window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecentCandidate {
    pub record: PackageRecord,
}

impl RecentCandidate {
    pub fn name(&self) -> &str {
        &self.record.name
    }
}

/// The edit pattern that produced a variant.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// One character removed (`reqests`).
    Omission,
    /// One character repeated (`requessts`).
    Duplication,
    /// Two adjacent characters swapped (`reqeusts`).
    Transposition,
    /// One character replaced by a keyboard neighbour (`rewuests`).
    KeyboardTypo,
    /// A character sequence replaced by a look-alike (`1og` for `log`).
    Homoglyph,
    /// A `-`, `_` or `.` inserted, removed or swapped.
    Separator,
    /// Delimited words reordered (`json-serde`).
    WordReorder,
    /// Trailing `s` added or removed.
    Plural,
    /// A decoy prefix or suffix added (`requests-rs`, `requests2`).
    Affix,
    /// A single bit flipped in the name's bytes.
    #[value(skip)]
    BitFlip,
}

impl RuleKind {
    /// All transform rules, in generation order.
    ///
    /// More specific rules come first so a variant reachable by several
    /// edits is tagged with the most telling one.
    pub const TRANSFORMS: [RuleKind; 9] = [
        RuleKind::Plural,
        RuleKind::Separator,
        RuleKind::WordReorder,
        RuleKind::Affix,
        RuleKind::Homoglyph,
        RuleKind::Duplication,
        RuleKind::Omission,
        RuleKind::Transposition,
        RuleKind::KeyboardTypo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Omission => "omission",
            Self::Duplication => "duplication",
            Self::Transposition => "transposition",
            Self::KeyboardTypo => "keyboard_typo",
            Self::Homoglyph => "homoglyph",
            Self::Separator => "separator",
            Self::WordReorder => "word_reorder",
            Self::Plural => "plural",
            Self::Affix => "affix",
            Self::BitFlip => "bit_flip",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A name produced from a target, not yet known to exist in the registry.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
pub struct GeneratedVariant {
    /// Name of the target the variant was derived from.
    pub target_name: String,
    /// The variant itself.
    pub name: String,
    pub rule: RuleKind,
}

/// Description similarity between a candidate and its target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SimilarityScore {
    /// Score returned by the semantic scorer, in `[0, 1]`.
    Semantic { score: f64 },
    /// Raw edit distance plus `1 - distance / max_len`.
    EditDistance { distance: usize, normalized: f64 },
    /// Exactly one of the two descriptions is blank. Never accepted.
    OneSidedBlank,
}

impl SimilarityScore {
    /// Score in `[0, 1]` regardless of how it was computed.
    pub fn value(&self) -> f64 {
        match self {
            Self::Semantic { score } => *score,
            Self::EditDistance { normalized, .. } => *normalized,
            Self::OneSidedBlank => 0.0,
        }
    }
}

/// A registry collision between a generated variant and a recent package.
///
/// Created by the matcher and annotated by each filter in turn.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateMatch {
    pub target: PopularityTarget,
    pub candidate: PackageRecord,
    pub rule: RuleKind,
    pub is_bit_flip: bool,
    pub owner_overlap: bool,
    pub similarity: Option<SimilarityScore>,
    pub allow_listed: bool,
}

impl CandidateMatch {
    pub fn new(target: PopularityTarget, candidate: PackageRecord, rule: RuleKind) -> Self {
        debug_assert_ne!(target.record.name, candidate.name);
        Self {
            target,
            candidate,
            rule,
            is_bit_flip: rule == RuleKind::BitFlip,
            owner_overlap: false,
            similarity: None,
            allow_listed: false,
        }
    }

    pub fn target_name(&self) -> &str {
        &self.target.record.name
    }

    pub fn candidate_name(&self) -> &str {
        &self.candidate.name
    }
}

/// A downloaded package artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub version: String,
    pub path: String,
    /// SHA256 of the file contents.
    pub sha256: String,
}

/// Outcome of fetching a candidate's artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadStatus {
    Downloaded(Artifact),
    /// The candidate has no non-yanked versions.
    NoVersions,
    Failed { error: String },
    Skipped,
}

/// One reported match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchReport {
    pub target: String,
    pub target_rank: usize,
    pub candidate: String,
    pub candidate_owners: Vec<String>,
    /// Newest version listed by the registry, if any.
    pub candidate_version: Option<String>,
    pub candidate_downloads: u64,
    pub rule: RuleKind,
    pub similarity: Option<SimilarityScore>,
    pub download: DownloadStatus,
}

/// Complete result of one detection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Number of protection targets.
    pub popular_count: usize,
    /// Number of recently published packages checked.
    pub recent_count: usize,
    /// Matches before any filter ran.
    pub raw_matches: usize,
    /// Matches that survived every filter.
    pub matches: Vec<MatchReport>,
    pub check_days: u32,
    pub duration_secs: f64,
    /// Non-fatal errors encountered during the run.
    pub errors: Vec<String>,
}

impl RunReport {
    /// Distinct candidate names among the reported matches.
    pub fn suspicious_candidates(&self) -> BTreeSet<&str> {
        self.matches.iter().map(|m| m.candidate.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shares_owner() {
        let a = PackageRecord::new("requests", ["alice", "bob"], "HTTP library");
        let b = PackageRecord::new("requessts", ["bob"], "HTTP client library");
        let c = PackageRecord::new("requesto", ["mallory"], "");

        assert!(a.shares_owner_with(&b));
        assert!(!a.shares_owner_with(&c));
        assert!(c.has_blank_description());
    }

    #[test]
    fn test_bit_flip_flag_follows_rule() {
        let target = PopularityTarget {
            record: PackageRecord::new("serde", ["dtolnay"], "serialization"),
            rank: 1,
        };
        let flipped = PackageRecord::new("sdrde", ["x"], "");
        let m = CandidateMatch::new(target.clone(), flipped, RuleKind::BitFlip);
        assert!(m.is_bit_flip);
        assert!(m.similarity.is_none());

        let omitted = PackageRecord::new("serd", ["x"], "");
        let m = CandidateMatch::new(target, omitted, RuleKind::Omission);
        assert!(!m.is_bit_flip);
        assert!(!m.owner_overlap);
        assert!(!m.allow_listed);
    }

    #[test]
    fn test_similarity_value() {
        assert_eq!(SimilarityScore::Semantic { score: 0.5 }.value(), 0.5);
        let s = SimilarityScore::EditDistance { distance: 2, normalized: 0.8 };
        assert_eq!(s.value(), 0.8);
        assert_eq!(SimilarityScore::OneSidedBlank.value(), 0.0);
        let json = serde_json::to_string(&SimilarityScore::OneSidedBlank).unwrap();
        assert_eq!(json, r#"{"method":"one_sided_blank"}"#);
    }

    #[test]
    fn test_rule_kind_serde_names() {
        let json = serde_json::to_string(&RuleKind::KeyboardTypo).unwrap();
        assert_eq!(json, "\"keyboard_typo\"");
        assert_eq!(RuleKind::BitFlip.to_string(), "bit_flip");
    }
}
