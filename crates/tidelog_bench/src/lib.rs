//! Benchmark utilities shared by the tidelog criterion benches.

#![deny(unsafe_code)]

/// Generates a deterministic payload of the given size.
#[must_use]
pub fn patterned_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}
