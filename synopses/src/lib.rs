//! Probabilistic summary structures shared by the statistics pipeline:
//! distinct-count sketches and membership filters, plus the hash
//! primitives they are built on.

pub mod distinct;
pub mod membership;
pub mod utils;

pub use distinct::fm_sketch::{FmSketch, FmSketchWire};
pub use membership::bloom::{BloomFilter, Error as BloomError};
