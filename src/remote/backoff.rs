use std::time::Duration;

/// Delay before retry number `retry` (0-based): `base * 2^retry`, capped at `cap`
pub fn backoff_delay(retry: u32, base: Duration, cap: Duration) -> Duration {
    let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(cap).min(cap)
}
