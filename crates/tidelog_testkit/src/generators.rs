//! Property-based test generators using proptest.

use proptest::prelude::*;

/// Strategy for a single record payload up to `max` bytes.
pub fn payload_strategy(max: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max)
}

/// Strategy for a batch of payloads, each up to `max` bytes.
pub fn payload_batch_strategy(batch: usize, max: usize) -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(payload_strategy(max), 1..=batch)
}

/// Strategy for opaque record flags.
pub fn flags_strategy() -> impl Strategy<Value = u32> {
    any::<u32>()
}
