//! Prime schedule for hash-table sizing.
//!
//! Bucket counts are always drawn from the primes, selected as the
//! largest prime at or below a requested bound via a sieve.

use amber_core::CollectionError;

/// Largest table size the schedule supports.
pub const MAX_PRIME: u64 = 1_301_081;

/// Largest prime `p ≤ n`, computed with a sieve of Eratosthenes.
///
/// Fails with [`CollectionError::InvalidArgument`] when `n ≤ 1` or
/// `n > MAX_PRIME`.
pub fn prime_below(n: u64) -> Result<u64, CollectionError> {
    if n <= 1 || n > MAX_PRIME {
        return Err(CollectionError::InvalidArgument {
            detail: format!("no prime selection for {n}; supported range is 2..={MAX_PRIME}"),
        });
    }
    if n == MAX_PRIME {
        return Ok(MAX_PRIME);
    }

    let n = n as usize;
    let mut is_prime = vec![true; n + 1];
    is_prime[0] = false;
    is_prime[1] = false;
    let mut i = 2;
    while i * i <= n {
        if is_prime[i] {
            let mut j = i * i;
            while j <= n {
                is_prime[j] = false;
                j += i;
            }
        }
        i += 1;
    }

    for k in (2..=n).rev() {
        if is_prime[k] {
            return Ok(k as u64);
        }
    }
    // n ≥ 2, so 2 itself is always found above.
    unreachable!("sieve over 2..={n} found no prime")
}

/// Next bucket count when growing a table of `current` buckets:
/// the largest prime at or below `2 * current`, capped at
/// [`MAX_PRIME`]. Returns `current` itself once the schedule tops out.
pub(crate) fn next_table_size(current: u64) -> Result<u64, CollectionError> {
    prime_below((current * 2).min(MAX_PRIME))
}
