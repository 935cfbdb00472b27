//! Play-time formatting and progress helpers.
//!
//! Transports report positions as fractional seconds; these helpers turn them into
//! the `MM:SS` labels and the integer progress ratio shown by the player bar.

/// Format seconds as zero-padded `MM:SS`.
///
/// Fractions are truncated. Negative or non-finite input formats as `00:00`, and
/// minutes keep growing past two digits instead of wrapping into hours.
#[must_use]
pub fn format_time(seconds: f64) -> String {
    let total = whole_seconds(seconds);
    let minutes = total / 60;
    let seconds = total % 60;

    format!("{minutes:02}:{seconds:02}")
}

/// Played ratio as a percentage, rounded up.
///
/// Returns 0 when the total is unknown (zero, negative or non-finite) and never
/// exceeds 100.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn progress_percent(played: f64, total: f64) -> u8 {
    if !total.is_finite() || total <= 0.0 || !played.is_finite() || played <= 0.0 {
        return 0;
    }

    (played * 100.0 / total).ceil().min(100.0) as u8
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_seconds(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    seconds.floor() as u64
}
