//! Distances between score vectors.
//!
//! Used to compare contributivity estimates against each other, for example
//! Monte Carlo estimates against exact Shapley values.

/// Euclidean distance between two score vectors.
///
/// Extra trailing elements of the longer slice are ignored.
pub fn l2_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
