//! Efficiency ratio: actual reading speed over planned reading speed.

/// Ratio of actual pages-per-minute to target pages-per-minute.
///
/// A zero page goal cannot be assessed and yields exactly 1.0. Zero minutes
/// on either side are treated as "no speed" rather than a division by zero;
/// aggregates drop such records before calling this (see [`session_ratio`]).
/// No clamping happens here.
pub fn efficiency_ratio(
    target_pages: u32,
    target_minutes: u32,
    actual_pages: u32,
    actual_minutes: u32,
) -> f64 {
    let target_speed = safe_div(target_pages as f64, target_minutes as f64);
    let actual_speed = safe_div(actual_pages as f64, actual_minutes as f64);
    if target_speed <= 0.0 {
        return 1.0;
    }
    actual_speed / target_speed
}

/// Ratio for a record taking part in an aggregate, or `None` when either
/// minutes field is zero and the record must be skipped.
pub fn session_ratio(
    target_pages: u32,
    target_minutes: u32,
    actual_pages: u32,
    actual_minutes: u32,
) -> Option<f64> {
    if target_minutes == 0 || actual_minutes == 0 {
        return None;
    }
    Some(efficiency_ratio(target_pages, target_minutes, actual_pages, actual_minutes))
}

pub(crate) fn safe_div(a: f64, b: f64) -> f64 {
    if b == 0.0 { 0.0 } else { a / b }
}

/// Round to 2 decimal places for display. Internal math never calls this.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
