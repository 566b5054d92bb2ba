//! Known benign publishers whose packages trip the detection rules.
//!
//! Examples:
//! - blallo published a batch of xkcd-386 placeholder crates pointing at
//!   https://xkcd.com/386 to make a point about name squatting
//! - skerkour publishes the black-hat-rust book's demo crates, some of which
//!   deliberately mimic popular names

use crate::filter::MatchFilter;
use crate::types::{CandidateMatch, PackageRecord};
use tracing::debug;

/// An owner plus optional metadata that must match exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub owner: String,
    pub homepage: Option<String>,
    pub documentation: Option<String>,
    pub repository: Option<String>,
}

impl Signature {
    pub fn owner(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            homepage: None,
            documentation: None,
            repository: None,
        }
    }

    pub fn homepage(mut self, url: &str) -> Self {
        self.homepage = Some(url.to_string());
        self
    }

    pub fn documentation(mut self, url: &str) -> Self {
        self.documentation = Some(url.to_string());
        self
    }

    pub fn repository(mut self, url: &str) -> Self {
        self.repository = Some(url.to_string());
        self
    }

    /// True if `record` is owned by this signature's owner and carries every
    /// metadata value the signature specifies.
    pub fn matches(&self, record: &PackageRecord) -> bool {
        fn field_matches(expected: &Option<String>, actual: &Option<String>) -> bool {
            match expected {
                Some(expected) => actual.as_deref() == Some(expected.as_str()),
                None => true,
            }
        }

        record.owners.contains(&self.owner)
            && field_matches(&self.homepage, &record.homepage)
            && field_matches(&self.documentation, &record.documentation)
            && field_matches(&self.repository, &record.repository)
    }
}

/// Table of benign publisher signatures.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    signatures: Vec<Signature>,
}

impl AllowList {
    /// The built-in table.
    pub fn builtin() -> Self {
        Self {
            signatures: vec![
                Signature::owner("blallo")
                    .homepage("https://xkcd.com/386")
                    .documentation("https://crates.io/policies")
                    .repository("https://github.com/blallo/xkcd-386"),
                Signature::owner("skerkour")
                    .repository("https://github.com/skerkour/black-hat-rust"),
            ],
        }
    }

    pub fn with(mut self, signature: Signature) -> Self {
        self.signatures.push(signature);
        self
    }

    /// The first signature matching `record`, if any.
    pub fn matching(&self, record: &PackageRecord) -> Option<&Signature> {
        self.signatures.iter().find(|s| s.matches(record))
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

pub struct AllowListFilter {
    allowlist: AllowList,
}

impl AllowListFilter {
    pub fn new(allowlist: AllowList) -> Self {
        Self { allowlist }
    }
}

impl MatchFilter for AllowListFilter {
    fn name(&self) -> &'static str {
        "allow-list"
    }

    fn apply(&self, mut m: CandidateMatch) -> Option<CandidateMatch> {
        if let Some(signature) = self.allowlist.matching(&m.candidate) {
            m.allow_listed = true;
            debug!(
                "Filter: {} is from allow-listed publisher {}",
                m.candidate_name(),
                signature.owner
            );
            return None;
        }
        Some(m)
    }
}
