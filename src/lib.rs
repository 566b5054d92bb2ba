//! squatwatch - Typosquatting detector for crates.io.
//!
//! This library finds newly published crates whose names imitate popular ones by:
//! - Generating typo, look-alike, separator, affix and bit-flip variants of popular names
//! - Looking those variants up among recently updated crates
//! - Dropping collisions that share an owner with the original or whose
//!   description does not resemble it
//! - Reporting the survivors and downloading their archives for inspection
//!
//! # Example
//!
//! ```no_run
//! use squatwatch::config::ScanConfig;
//! use squatwatch::detector::Detector;
//!
//! #[tokio::main]
//! async fn main() {
//!     let detector = Detector::new(ScanConfig::default(), false).unwrap();
//!     let report = detector.run().await.unwrap();
//!     println!("Found {} suspicious crates", report.suspicious_candidates().len());
//! }
//! ```

pub mod config;
pub mod detector;
pub mod filter;
pub mod generate;
pub mod matcher;
pub mod notify;
pub mod registry;
pub mod reporter;
pub mod similarity;
pub mod types;

pub use config::{Commands, Config, ScanConfig, SourceConfig, VariantsConfig};
pub use detector::Detector;
pub use types::{
    Artifact, CandidateMatch, DownloadStatus, GeneratedVariant, MatchReport, PackageRecord,
    PopularityTarget, RecentCandidate, Result, RuleKind, RunReport, SimilarityScore,
    SquatwatchError,
};
