use chrono::NaiveDate;
use serde::{Serialize, Deserialize};
use crate::efficiency::round2;
use crate::error::{StudyError, ValidationError};
use crate::pace::DEFAULT_PACE_FACTOR;
use crate::records::StudyRecord;

/// Pages per hour at difficulty 1..=5 (pace-aware table).
pub const PAGES_PER_HOUR_BY_DIFFICULTY: [u32; 5] = [13, 11, 9, 8, 7];
/// Pages per 30 minutes at difficulty 1..=5 (older flat table).
pub const PAGES_PER_HALF_HOUR_BY_DIFFICULTY: [u32; 5] = [7, 6, 5, 4, 3];

/// Base reading-speed table used to turn minutes into pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateTable {
    #[default]
    PerHour,
    PerHalfHour,
}

impl RateTable {
    /// Base pages per hour for a difficulty level; slower as difficulty rises.
    pub fn pages_per_hour(self, difficulty: u8) -> Result<f64, ValidationError> {
        let idx = difficulty_index(difficulty)?;
        Ok(match self {
            RateTable::PerHour => PAGES_PER_HOUR_BY_DIFFICULTY[idx] as f64,
            RateTable::PerHalfHour => PAGES_PER_HALF_HOUR_BY_DIFFICULTY[idx] as f64 * 2.0,
        })
    }
}

fn difficulty_index(difficulty: u8) -> Result<usize, ValidationError> {
    if !(1..=5).contains(&difficulty) {
        return Err(ValidationError::DifficultyOutOfRange(difficulty));
    }
    Ok(difficulty as usize - 1)
}

/// Static subject metadata as seen by the allocator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub importance: u8,
    pub difficulty: u8,
    pub total_pages: u32,
    /// Pages still unread. Caps the recommendation when known.
    #[serde(default)]
    pub remaining_pages: Option<u32>,
}

impl Subject {
    pub fn new<S: Into<String>>(name: S, importance: u8, difficulty: u8, total_pages: u32) -> Self {
        Subject {
            name: name.into(),
            importance,
            difficulty,
            total_pages,
            remaining_pages: None,
        }
    }

    pub fn with_remaining(mut self, remaining_pages: u32) -> Self {
        self.remaining_pages = Some(remaining_pages);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptySubject);
        }
        if !(1..=5).contains(&self.importance) {
            return Err(ValidationError::ImportanceOutOfRange(self.importance));
        }
        difficulty_index(self.difficulty)?;
        Ok(())
    }

    fn page_cap(&self) -> u32 {
        self.remaining_pages
            .map_or(self.total_pages, |remaining| remaining.min(self.total_pages))
    }

    fn weight(&self) -> f64 {
        self.importance as f64 * self.total_pages as f64
    }
}

/// A subject together with the caller's current pace estimate for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectInput {
    #[serde(flatten)]
    pub subject: Subject,
    #[serde(default = "default_pace")]
    pub pace_factor: f64,
}

fn default_pace() -> f64 {
    DEFAULT_PACE_FACTOR
}

impl SubjectInput {
    pub fn new(subject: Subject, pace_factor: f64) -> Self {
        SubjectInput { subject, pace_factor }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyGoalRequest {
    pub total_minutes: u32,
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectGoal {
    pub name: String,
    pub study_minutes: u32,
    pub recommended_pages: u32,
    pub pace_factor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyGoal {
    pub total_minutes: u32,
    pub goals: Vec<SubjectGoal>,
}

impl DailyGoal {
    /// One pending record per goal; the targets become the record's
    /// planned side.
    pub fn pending_records(&self, owner: &str, date: NaiveDate) -> Vec<StudyRecord> {
        self.goals
            .iter()
            .map(|g| StudyRecord::pending(owner, &g.name, date, g.study_minutes, g.recommended_pages))
            .collect()
    }
}

/// Splits a time budget across subjects by importance × size and turns
/// each share into a page target.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoalAllocator {
    pub table: RateTable,
}

impl GoalAllocator {
    pub fn new(table: RateTable) -> Self {
        GoalAllocator { table }
    }

    pub fn allocate(&self, total_minutes: u32, subjects: &[SubjectInput]) -> Result<DailyGoal, StudyError> {
        for input in subjects {
            input.subject.validate()
                .map_err(|e| StudyError::from(e).with_subject(input.subject.name.clone()))?;
            if !input.pace_factor.is_finite() || input.pace_factor <= 0.0 {
                return Err(StudyError::from(ValidationError::NonPositivePace(input.pace_factor))
                    .with_subject(input.subject.name.clone()));
            }
        }

        let mut total_weight: f64 = subjects.iter().map(|s| s.subject.weight()).sum();
        if total_weight == 0.0 {
            total_weight = 1.0;
        }

        let mut goals = Vec::with_capacity(subjects.len());
        for input in subjects {
            let subject = &input.subject;
            let subject_minutes = total_minutes as f64 * subject.weight() / total_weight;

            let pages_per_minute = self.table.pages_per_hour(subject.difficulty)? * input.pace_factor / 60.0;
            let raw_pages = (subject_minutes * pages_per_minute).round_ties_even().max(0.0) as u32;
            let recommended_pages = raw_pages.max(1).min(subject.page_cap());

            tracing::debug!(
                subject = %subject.name,
                minutes = subject_minutes,
                pages_per_minute = pages_per_minute,
                recommended_pages = recommended_pages,
                "Allocated study time"
            );

            goals.push(SubjectGoal {
                name: subject.name.trim().to_string(),
                study_minutes: subject_minutes.round_ties_even() as u32,
                recommended_pages,
                pace_factor: round2(input.pace_factor),
            });
        }

        Ok(DailyGoal { total_minutes, goals })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, importance: u8, difficulty: u8, pages: u32, pace: f64) -> SubjectInput {
        SubjectInput::new(Subject::new(name, importance, difficulty, pages), pace)
    }

    #[test]
    fn single_subject_gets_whole_budget() {
        let plan = GoalAllocator::default()
            .allocate(180, &[input("Linear Algebra", 5, 4, 500, 1.0)])
            .unwrap();
        assert_eq!(plan.goals.len(), 1);
        let goal = &plan.goals[0];
        assert_eq!(goal.study_minutes, 180);
        // 8 pages/hour for 3 hours
        assert_eq!(goal.recommended_pages, 24);
        assert_eq!(goal.pace_factor, 1.0);
    }

    #[test]
    fn weight_is_importance_times_pages() {
        let plan = GoalAllocator::default()
            .allocate(120, &[
                input("a", 1, 3, 300, 1.0),
                input("b", 3, 3, 100, 1.0),
            ])
            .unwrap();
        // equal weights (300 each) split evenly
        assert_eq!(plan.goals[0].study_minutes, 60);
        assert_eq!(plan.goals[1].study_minutes, 60);
    }

    #[test]
    fn pace_scales_pages() {
        let plan = GoalAllocator::default()
            .allocate(60, &[input("a", 3, 3, 100, 1.5)])
            .unwrap();
        // 9 pages/hour * 1.5 = 13.5 -> ties to even
        assert_eq!(plan.goals[0].recommended_pages, 14);
    }

    #[test]
    fn recommendation_capped_by_material() {
        let plan = GoalAllocator::default()
            .allocate(600, &[input("short", 5, 1, 10, 2.0)])
            .unwrap();
        assert_eq!(plan.goals[0].recommended_pages, 10);

        let remaining = SubjectInput::new(Subject::new("rest", 5, 1, 500).with_remaining(4), 1.0);
        let plan = GoalAllocator::default().allocate(600, &[remaining]).unwrap();
        assert_eq!(plan.goals[0].recommended_pages, 4);
    }

    #[test]
    fn at_least_one_page_when_material_exists() {
        let plan = GoalAllocator::default()
            .allocate(1, &[input("tiny", 1, 5, 5, 0.3), input("huge", 5, 5, 5000, 1.0)])
            .unwrap();
        assert_eq!(plan.goals[0].recommended_pages, 1);
    }

    #[test]
    fn zero_weight_does_not_divide_by_zero() {
        let plan = GoalAllocator::default()
            .allocate(90, &[input("empty", 3, 3, 0, 1.0)])
            .unwrap();
        assert_eq!(plan.goals[0].study_minutes, 0);
        assert_eq!(plan.goals[0].recommended_pages, 0);
    }

    #[test]
    fn half_hour_table() {
        assert_eq!(RateTable::PerHalfHour.pages_per_hour(1).unwrap(), 14.0);
        assert_eq!(RateTable::PerHalfHour.pages_per_hour(5).unwrap(), 6.0);
        let plan = GoalAllocator::new(RateTable::PerHalfHour)
            .allocate(180, &[input("a", 5, 4, 500, 1.0)])
            .unwrap();
        assert_eq!(plan.goals[0].recommended_pages, 24);
    }

    #[test]
    fn tables_slow_down_with_difficulty() {
        for table in [RateTable::PerHour, RateTable::PerHalfHour] {
            let speeds: Vec<f64> = (1..=5).map(|d| table.pages_per_hour(d).unwrap()).collect();
            assert!(speeds.windows(2).all(|w| w[0] > w[1]));
        }
    }

    #[test]
    fn rejects_out_of_range_metadata() {
        let err = GoalAllocator::default()
            .allocate(60, &[input("bad", 6, 3, 10, 1.0)])
            .unwrap_err();
        assert!(err.is_validation());
        assert!(GoalAllocator::default().allocate(60, &[input("bad", 3, 0, 10, 1.0)]).is_err());
        assert!(GoalAllocator::default().allocate(60, &[input("bad", 3, 3, 10, 0.0)]).is_err());
    }

    #[test]
    fn pending_records_follow_plan() {
        let plan = GoalAllocator::default()
            .allocate(180, &[input("Linear Algebra", 5, 4, 500, 1.0)])
            .unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let records = plan.pending_records("u1", date);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target_minutes, 180);
        assert_eq!(records[0].target_pages, 24);
        assert_eq!(records[0].actual_minutes, 0);
    }
}
