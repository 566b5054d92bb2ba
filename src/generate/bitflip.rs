//! Names one bit away from a protection target.
//!
//! Models squats that bet on a single flipped bit in memory or on disk
//! turning `serde` into `sdrde` somewhere between the manifest and the
//! registry request.

use crate::generate::tables::is_registry_name;
use crate::types::{GeneratedVariant, RuleKind};
use std::collections::HashSet;
use tracing::trace;

/// Generator for single-bit-flip variants.
#[derive(Debug, Clone, Copy, Default)]
pub struct BitFlipGenerator;

impl BitFlipGenerator {
    pub fn new() -> Self {
        Self
    }

    /// All distinct, registry-valid names reachable by flipping one bit of
    /// `target`'s UTF-8 bytes, in byte-then-bit order.
    pub fn variants(&self, target: &str) -> Vec<GeneratedVariant> {
        let bytes = target.as_bytes();
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for pos in 0..bytes.len() {
            for bit in 0..8u8 {
                let mut flipped = bytes.to_vec();
                flipped[pos] ^= 1 << bit;

                let name = match String::from_utf8(flipped) {
                    Ok(name) => name,
                    Err(_) => {
                        trace!("Bit {} of byte {} in {} is not valid UTF-8", bit, pos, target);
                        continue;
                    }
                };

                if name == target || !is_registry_name(&name) {
                    continue;
                }

                if seen.insert(name.clone()) {
                    out.push(GeneratedVariant {
                        target_name: target.to_string(),
                        name,
                        rule: RuleKind::BitFlip,
                    });
                }
            }
        }

        out
    }
}
