//! Variant generation for protection targets.
//!
//! This module produces candidate squat names from:
//! - Transform rules (omission, duplication, keyboard typos, homoglyphs, ...)
//! - Single bit flips of the name's bytes

pub mod bitflip;
pub mod tables;
pub mod transform;

pub use bitflip::BitFlipGenerator;
pub use tables::{is_registry_char, is_registry_name};
pub use transform::{TransformGenerator, Variants};
