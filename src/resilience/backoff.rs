//! Exponential backoff with jitter.
//!
//! Used by the tracking driver between re-resolutions of a record after an
//! infrastructure error. The nth delay is `base * 2^(n-1)`, capped at `max`,
//! plus up to 10% random jitter so resumed records do not poll in lockstep.

use rand::Rng;
use std::time::Duration;

/// Delay before retry number `attempt` (1-based). Attempt 0 means no wait.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let capped = capped_delay_ms(attempt, base_ms, max_ms);
    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };
    Duration::from_millis(capped + jitter)
}

fn capped_delay_ms(attempt: u32, base_ms: u64, max_ms: u64) -> u64 {
    if attempt == 0 {
        return 0;
    }
    let factor = 2u64.saturating_pow(attempt - 1);
    base_ms.saturating_mul(factor).min(max_ms)
}
