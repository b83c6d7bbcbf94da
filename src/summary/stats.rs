use serde::{Serialize, Deserialize};

/// Records needed before a trend label means anything.
pub const MIN_TREND_RECORDS: usize = 4;
/// Relative change between halves that counts as a trend.
pub const TREND_BAND: f64 = 0.05;
pub const NEUTRAL_CONSISTENCY: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
    Up,
    Down,
    Flat,
    Unknown,
}

/// Average of `(value, minutes)` pairs weighted by minutes; 0.0 when no
/// minutes were logged at all.
pub fn minutes_weighted_avg(pairs: &[(f64, u32)]) -> f64 {
    let total: f64 = pairs.iter().map(|&(_, w)| w as f64).sum();
    if total <= 0.0 {
        return 0.0;
    }
    pairs.iter().map(|&(v, w)| v * w as f64).sum::<f64>() / total
}

pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    Some(var.sqrt())
}

/// 0..=100 stability score: 100 at zero spread, 0 from σ = 0.5 upward.
pub fn consistency_score(ratios: &[f64]) -> f64 {
    match population_std_dev(ratios) {
        Some(std) => (100.0 - std * 200.0).max(0.0),
        None => NEUTRAL_CONSISTENCY,
    }
}

/// Compare the weighted efficiency of the earlier and later half of a
/// chronologically sorted series. The later half takes the odd record.
pub fn trend_label(sorted: &[(f64, u32)]) -> Trend {
    if sorted.len() < MIN_TREND_RECORDS {
        return Trend::Unknown;
    }
    let (first, second) = sorted.split_at(sorted.len() / 2);
    let a = minutes_weighted_avg(first);
    let b = minutes_weighted_avg(second);

    if b >= a * (1.0 + TREND_BAND) {
        Trend::Up
    } else if b <= a * (1.0 - TREND_BAND) {
        Trend::Down
    } else {
        Trend::Flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_weights_give_simple_mean() {
        assert_eq!(minutes_weighted_avg(&[(1.0, 60), (2.0, 60)]), 1.5);
    }

    #[test]
    fn weights_follow_minutes() {
        let avg = minutes_weighted_avg(&[(1.0, 30), (2.0, 90)]);
        assert!((avg - 1.75).abs() < 1e-12);
        assert_eq!(minutes_weighted_avg(&[]), 0.0);
        assert_eq!(minutes_weighted_avg(&[(3.0, 0)]), 0.0);
    }

    #[test]
    fn consistency_bounds() {
        assert_eq!(consistency_score(&[1.0, 1.0, 1.0]), 100.0);
        assert_eq!(consistency_score(&[0.5, 1.5]), 0.0);
        assert_eq!(consistency_score(&[0.0, 2.0]), 0.0);
        assert_eq!(consistency_score(&[]), 50.0);
        // σ = 0.1 -> 80
        let s = consistency_score(&[0.9, 1.1]);
        assert!((s - 80.0).abs() < 1e-9);
    }

    #[test]
    fn trend_needs_four_records() {
        assert_eq!(trend_label(&[(0.1, 60), (5.0, 60), (9.0, 60)]), Trend::Unknown);
    }

    #[test]
    fn trend_directions() {
        assert_eq!(trend_label(&[(1.0, 60), (1.0, 60), (1.1, 60), (1.1, 60)]), Trend::Up);
        assert_eq!(trend_label(&[(1.0, 60), (1.0, 60), (0.9, 60), (0.9, 60)]), Trend::Down);
        assert_eq!(trend_label(&[(1.0, 60), (1.0, 60), (1.02, 60), (1.0, 60)]), Trend::Flat);
    }

    #[test]
    fn odd_series_puts_extra_record_in_second_half() {
        // first half [1.0, 1.0], second half [1.0, 2.0, 2.0]
        let series = [(1.0, 60), (1.0, 60), (1.0, 60), (2.0, 60), (2.0, 60)];
        assert_eq!(trend_label(&series), Trend::Up);
        // heavy slow session in the middle drags the later half down
        let series = [(1.0, 60), (1.0, 60), (0.5, 600), (1.0, 60), (1.0, 60)];
        assert_eq!(trend_label(&series), Trend::Down);
    }
}
