//! Registry access.
//!
//! Queries crates.io for popular and recently updated crates, looks up
//! owners and versions, downloads crate archives, and builds the immutable
//! indices the detection pipeline runs over.

mod cache;
pub mod crates_io;
pub mod index;

pub use cache::OwnerCache;
pub use crates_io::CratesIoClient;
pub use index::{PopularityIndex, RecentIndex};
