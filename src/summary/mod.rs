pub mod stats;

use std::collections::{BTreeMap, HashMap};
use chrono::{Duration, NaiveDate};
use serde::{Serialize, Deserialize};
use crate::advisor::Thresholds;
use crate::efficiency::{round2, safe_div};
use crate::records::StudyRecord;
use stats::{consistency_score, minutes_weighted_avg, trend_label, Trend};

/// Date bounds for a summary. Missing bounds are taken from the records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl SummaryWindow {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        SummaryWindow { start: Some(start), end: Some(end) }
    }

    /// Rolling window ending today and reaching back `days` days.
    pub fn last_days(today: NaiveDate, days: i64) -> Self {
        Self::between(today - Duration::days(days), today)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Bands that drive the feedback sentences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackBands {
    /// Per-subject weighted efficiency considered on target.
    pub on_target_low: f64,
    pub on_target_high: f64,
    /// Overall weighted efficiency considered stable.
    pub overall_low: f64,
    pub overall_high: f64,
    /// Below this many actual minutes the week is flagged as sparse.
    pub sparse_minutes: u32,
}

impl Default for FeedbackBands {
    fn default() -> Self {
        FeedbackBands {
            on_target_low: 0.8,
            on_target_high: 1.2,
            overall_low: 0.9,
            overall_high: 1.1,
            sparse_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectWeeklySummary {
    pub subject_name: String,
    pub record_count: usize,

    pub total_target_minutes: u64,
    pub total_actual_minutes: u64,
    pub total_target_pages: u64,
    pub total_actual_pages: u64,

    pub avg_target_speed_ppm: f64,
    pub avg_actual_speed_ppm: f64,
    pub weighted_efficiency_ratio: f64,

    pub consistency_score: f64,
    pub trend: Trend,

    pub pace_factor: Option<f64>,
    pub pace_message: Option<String>,

    pub feedback: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyOverallSummary {
    pub week_start: Option<NaiveDate>,
    pub week_end: Option<NaiveDate>,

    pub total_target_minutes: u64,
    pub total_actual_minutes: u64,
    pub total_target_pages: u64,
    pub total_actual_pages: u64,

    pub avg_target_speed_ppm: f64,
    pub avg_actual_speed_ppm: f64,
    pub weighted_efficiency_ratio: f64,

    /// Records in the window left out because a minutes field was zero.
    pub skipped_records: usize,
    pub overall_feedback: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub overall: WeeklyOverallSummary,
    pub subjects: Vec<SubjectWeeklySummary>,
}

#[derive(Default)]
struct Totals {
    target_minutes: u64,
    actual_minutes: u64,
    target_pages: u64,
    actual_pages: u64,
}

impl Totals {
    fn add(&mut self, r: &StudyRecord) {
        self.target_minutes += r.target_minutes as u64;
        self.actual_minutes += r.actual_minutes as u64;
        self.target_pages += r.target_pages as u64;
        self.actual_pages += r.actual_pages as u64;
    }

    fn merge(&mut self, other: &Totals) {
        self.target_minutes += other.target_minutes;
        self.actual_minutes += other.actual_minutes;
        self.target_pages += other.target_pages;
        self.actual_pages += other.actual_pages;
    }

    fn target_speed(&self) -> f64 {
        safe_div(self.target_pages as f64, self.target_minutes as f64)
    }

    fn actual_speed(&self) -> f64 {
        safe_div(self.actual_pages as f64, self.actual_minutes as f64)
    }
}

/// Batch statistics over a window of study records.
#[derive(Debug, Clone, Copy)]
pub struct WeeklyAggregator {
    pub bands: FeedbackBands,
    /// Extreme gaps that earn a difficulty-change mention.
    pub difficulty: Thresholds,
}

impl Default for WeeklyAggregator {
    fn default() -> Self {
        WeeklyAggregator {
            bands: FeedbackBands::default(),
            difficulty: Thresholds::CONSERVATIVE,
        }
    }
}

impl WeeklyAggregator {
    pub fn new(bands: FeedbackBands, difficulty: Thresholds) -> Self {
        WeeklyAggregator { bands, difficulty }
    }

    /// Summarise `records` inside `window`. `pace` maps subject name to the
    /// owner's current pace factor and only feeds the commentary.
    pub fn summarize(
        &self,
        records: &[StudyRecord],
        window: &SummaryWindow,
        pace: Option<&HashMap<String, f64>>,
    ) -> WeeklySummary {
        let in_window: Vec<&StudyRecord> = records
            .iter()
            .filter(|r| window.contains(r.record_date))
            .collect();

        let week_start = window.start.or_else(|| in_window.iter().map(|r| r.record_date).min());
        let week_end = window.end.or_else(|| in_window.iter().map(|r| r.record_date).max());

        let mut skipped_records = 0;
        let mut by_subject: BTreeMap<String, Vec<(&StudyRecord, f64)>> = BTreeMap::new();
        for record in in_window {
            match record.efficiency() {
                Some(ratio) => by_subject
                    .entry(record.subject.trim().to_string())
                    .or_default()
                    .push((record, ratio)),
                None => skipped_records += 1,
            }
        }

        let mut overall = Totals::default();
        let mut overall_pairs: Vec<(f64, u32)> = Vec::new();
        let mut subjects = Vec::with_capacity(by_subject.len());

        for (subject_name, mut group) in by_subject {
            group.sort_by_key(|(r, _)| r.record_date);

            let mut totals = Totals::default();
            for (r, _) in &group {
                totals.add(r);
            }
            overall.merge(&totals);

            let pairs: Vec<(f64, u32)> = group.iter().map(|(r, ratio)| (*ratio, r.actual_minutes)).collect();
            let ratios: Vec<f64> = pairs.iter().map(|&(ratio, _)| ratio).collect();
            overall_pairs.extend_from_slice(&pairs);

            let weighted = round2(minutes_weighted_avg(&pairs));
            let pace_factor = pace
                .and_then(|p| p.get(&subject_name))
                .map(|&f| round2(f));

            subjects.push(SubjectWeeklySummary {
                record_count: group.len(),
                total_target_minutes: totals.target_minutes,
                total_actual_minutes: totals.actual_minutes,
                total_target_pages: totals.target_pages,
                total_actual_pages: totals.actual_pages,
                avg_target_speed_ppm: round2(totals.target_speed()),
                avg_actual_speed_ppm: round2(totals.actual_speed()),
                weighted_efficiency_ratio: weighted,
                consistency_score: round2(consistency_score(&ratios)),
                trend: trend_label(&pairs),
                pace_factor,
                pace_message: pace_factor.map(|f| pace_sentence(&subject_name, f)),
                feedback: self.subject_feedback(&subject_name, weighted),
                subject_name,
            });
        }

        // most-studied first; BTreeMap order breaks ties by name
        subjects.sort_by(|a, b| b.total_actual_minutes.cmp(&a.total_actual_minutes));

        let overall_eff = round2(minutes_weighted_avg(&overall_pairs));
        let overall_feedback = self.overall_feedback(overall_eff, overall.actual_minutes);

        tracing::debug!(
            subjects = subjects.len(),
            skipped = skipped_records,
            weighted_efficiency = overall_eff,
            "Weekly summary computed"
        );

        WeeklySummary {
            overall: WeeklyOverallSummary {
                week_start,
                week_end,
                total_target_minutes: overall.target_minutes,
                total_actual_minutes: overall.actual_minutes,
                total_target_pages: overall.target_pages,
                total_actual_pages: overall.actual_pages,
                avg_target_speed_ppm: round2(overall.target_speed()),
                avg_actual_speed_ppm: round2(overall.actual_speed()),
                weighted_efficiency_ratio: overall_eff,
                skipped_records,
                overall_feedback,
            },
            subjects,
        }
    }

    fn subject_feedback(&self, subject: &str, eff: f64) -> Vec<String> {
        let mut msgs = Vec::new();

        if eff >= self.bands.on_target_low && eff <= self.bands.on_target_high {
            msgs.push(format!("{}: goals matched your actual pace well.", subject));
        } else if eff > self.bands.on_target_high {
            msgs.push(format!("{}: you read faster than planned, so the page goal can go up a little.", subject));
        } else {
            msgs.push(format!("{}: you read slower than planned, so a slightly lower page goal is safer.", subject));
        }

        if eff >= self.difficulty.up {
            msgs.push(format!("{}: the gap is large; consider raising the difficulty one level.", subject));
        } else if eff <= self.difficulty.down {
            msgs.push(format!("{}: the gap is large; consider lowering the difficulty one level.", subject));
        }

        msgs
    }

    fn overall_feedback(&self, eff: f64, total_actual_minutes: u64) -> Vec<String> {
        let mut msgs = Vec::new();

        if total_actual_minutes < self.bands.sparse_minutes as u64 {
            msgs.push(format!(
                "Less than {} minutes were logged this week, so these numbers may be unreliable.",
                self.bands.sparse_minutes
            ));
        }

        if eff >= self.bands.overall_low && eff <= self.bands.overall_high {
            msgs.push("Overall, your actual pace stayed close to plan this week.".to_string());
        } else if eff > self.bands.overall_high {
            msgs.push("You moved faster than planned this week; next week's goals may rise a bit.".to_string());
        } else {
            msgs.push("You moved slower than planned this week; next week's goals can be a bit more conservative.".to_string());
        }

        msgs
    }
}

/// "N% faster/slower than baseline" commentary for a pace factor.
pub fn pace_sentence(subject: &str, pace_factor: f64) -> String {
    let diff_pct = ((pace_factor - 1.0) * 100.0).round() as i64;
    if diff_pct > 0 {
        format!("{} is going {}% faster than the baseline pace.", subject, diff_pct)
    } else if diff_pct < 0 {
        format!("{} is going {}% slower than the baseline pace.", subject, diff_pct.abs())
    } else {
        format!("{} is right at the baseline pace.", subject)
    }
}
