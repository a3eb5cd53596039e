//! Bucket-count table for the hash engine.
//!
//! Every capacity is prime, so any non-zero probe step visits every bucket,
//! and consecutive entries grow by roughly the golden ratio.

/// Ascending prime bucket counts.
pub const PRIMES: [u64; 42] = [
    5,
    11,
    23,
    41,
    67,
    113,
    199,
    317,
    521,
    839,
    1_361,
    2_207,
    3_571,
    5_779,
    9_349,
    15_121,
    24_473,
    39_607,
    64_081,
    103_681,
    167_759,
    271_429,
    439_199,
    710_641,
    1_149_857,
    1_860_503,
    3_010_349,
    4_870_843,
    7_881_193,
    12_752_029,
    20_633_237,
    33_385_273,
    54_018_521,
    87_403_763,
    141_422_317,
    228_826_121,
    370_248_451,
    599_074_561,
    969_323_023,
    1_568_397_599,
    2_537_720_629,
    4_106_118_251,
];

/// Largest number of occupied buckets allowed at `capacity` (80%).
#[inline]
#[must_use]
pub const fn threshold(capacity: usize) -> usize {
    capacity / 5 * 4 + capacity % 5 * 4 / 5
}

/// Smallest table capacity whose threshold admits `count` entries.
///
/// `None` if `count` is beyond the table (or the platform's address space).
#[must_use]
pub fn capacity_for(count: usize) -> Option<usize> {
    PRIMES
        .iter()
        .filter_map(|&p| usize::try_from(p).ok())
        .find(|&p| threshold(p) >= count)
}

/// `true` if `capacity` is one of the table's sizes.
#[must_use]
pub fn is_table_prime(capacity: usize) -> bool {
    PRIMES.iter().any(|&p| p == capacity as u64)
}
