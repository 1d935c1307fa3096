//! Mathematical primitives for mplc.
//!
//! Helpers used by contributivity estimation and its tests:
//!
//! - [`norms`] - L2 distance between score vectors
//! - [`stats`] - mean and sample standard deviation

pub mod norms;
pub mod stats;

pub use norms::l2_distance;
pub use stats::{mean, sample_std};
