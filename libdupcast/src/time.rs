//! Day-count conversions used for the age cutoff

use chrono::{DateTime, Duration, Utc};

const MS_PER_DAY: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

/// Convert a (possibly fractional) number of days into a duration
///
/// The result has millisecond precision and saturates at the bounds of
/// [`Duration`].
pub fn days_to_duration(days: f64) -> Duration {
    let ms = (days * MS_PER_DAY).round() as i64;
    Duration::try_milliseconds(ms).unwrap_or(if ms < 0 {
        Duration::MIN
    } else {
        Duration::MAX
    })
}

/// The instant `days` days before now
///
/// Evaluated on every call. Saturates at the earliest (or, for negative
/// `days`, latest) representable instant.
pub fn n_days_ago(days: f64) -> DateTime<Utc> {
    Utc::now()
        .checked_sub_signed(days_to_duration(days))
        .unwrap_or(if days < 0.0 {
            DateTime::<Utc>::MAX_UTC
        } else {
            DateTime::<Utc>::MIN_UTC
        })
}
