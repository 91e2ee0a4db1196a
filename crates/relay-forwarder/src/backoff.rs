//! Retry backoff schedule.

use std::time::Duration;

/// Delay before retry attempt `retry` (1-based): `base * 2^(retry - 1)`.
///
/// The first attempt (`retry == 0`) has no delay. Large exponents saturate
/// instead of overflowing.
///
/// | Retry | Delay (base = 500ms) |
/// |-------|----------------------|
/// | 0     | 0                    |
/// | 1     | 500ms                |
/// | 2     | 1s                   |
/// | 3     | 2s                   |
pub fn compute_backoff(retry: u32, base: Duration) -> Duration {
    if retry == 0 {
        return Duration::ZERO;
    }

    let multiplier = 1u32.checked_shl(retry - 1).unwrap_or(u32::MAX);
    base.saturating_mul(multiplier)
}
