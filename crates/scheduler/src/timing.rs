// Cálculo de la rejilla de ticks.
use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

/// Redondea `timestamp` hacia abajo al múltiplo de `round` más cercano.
pub fn round_timestamp(timestamp: i64, round: i64) -> i64 {
    timestamp - timestamp.rem_euclid(round)
}

/// Menor múltiplo de `interval` estrictamente mayor que `now` (segundos).
///
/// `next_aligned_timestamp(7201, 3600) == 10800`.
pub fn next_aligned_timestamp(now: i64, interval: i64) -> i64 {
    round_timestamp(now, interval) + interval
}

/// Igual que `next_aligned_timestamp` pero sobre instantes. La fracción de
/// segundo de `now` se descarta antes de alinear.
pub fn next_aligned_instant(now: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    let next = next_aligned_timestamp(now.timestamp(), interval.as_secs() as i64);
    Utc.timestamp_opt(next, 0).single().unwrap_or(now)
}
