//! Request-facing operations. Handlers in the embedding web service call
//! these with already-authenticated owners and deserialized payloads.

use chrono::NaiveDate;
use serde::{Serialize, Deserialize};
use crate::advisor::{validate_difficulty, DifficultyAdjustmentRequest, DifficultyAdvice, DifficultyAdvisor};
use crate::error::StudyError;
use crate::goals::{DailyGoal, DailyGoalRequest, GoalAllocator, SubjectInput};
use crate::records::{settle_month, MonthlySettlement, RecordStatus, SessionOutcome, StudyRecord};
use crate::state::app::AppState;
use crate::summary::{SummaryWindow, WeeklyAggregator, WeeklySummary};

/// Result of closing out one pending record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOutcome {
    pub record: StudyRecord,
    pub status: RecordStatus,
    /// `None` when the session had zero minutes and was not scored.
    pub efficiency_ratio: Option<f64>,
    /// Smoothed factor after this session, when it was updated.
    pub pace_factor: Option<f64>,
    pub advice: Option<DifficultyAdvice>,
}

fn track<T>(state: &AppState, result: Result<T, StudyError>) -> Result<T, StudyError> {
    if let Err(ref e) = result {
        if e.is_validation() {
            state.metrics.record_rejection();
        }
        tracing::warn!(error = %e, "Request rejected");
    }
    result
}

/// Plan today's targets: fetch each subject's pace, then allocate.
pub async fn calculate_daily_goal(
    state: &AppState,
    owner: &str,
    request: &DailyGoalRequest,
) -> Result<DailyGoal, StudyError> {
    let table = state.config.read().allocation.rate_table;

    let mut inputs = Vec::with_capacity(request.subjects.len());
    for subject in &request.subjects {
        let pace = match state.pace.get(owner, &subject.name).await {
            Ok(p) => p,
            Err(e) => return track(state, Err(e)),
        };
        inputs.push(SubjectInput::new(subject.clone(), pace));
    }

    let plan = track(state, GoalAllocator::new(table).allocate(request.total_minutes, &inputs))?;
    state.metrics.record_goals_allocated(plan.goals.len());
    tracing::info!(
        owner = owner,
        total_minutes = request.total_minutes,
        subjects = plan.goals.len(),
        "Daily goal calculated"
    );
    Ok(plan)
}

/// Plan today's targets and hand back the pending records to persist.
pub async fn create_daily_records(
    state: &AppState,
    owner: &str,
    request: &DailyGoalRequest,
    date: NaiveDate,
) -> Result<Vec<StudyRecord>, StudyError> {
    let plan = calculate_daily_goal(state, owner, request).await?;
    Ok(plan.pending_records(owner, date))
}

/// Close out a pending record, feed its efficiency into the pace factor
/// and suggest the next difficulty.
pub async fn complete_session(
    state: &AppState,
    mut record: StudyRecord,
    actual_minutes: u32,
    actual_pages: u32,
    current_difficulty: Option<u8>,
) -> Result<CompletionOutcome, StudyError> {
    let (fines, alpha, policy) = {
        let config = state.config.read();
        (config.fines, config.pace.alpha, config.difficulty)
    };

    if let Some(difficulty) = current_difficulty {
        track(state, validate_difficulty(difficulty).map_err(StudyError::from))?;
    }

    let status = track(state, record.complete(actual_minutes, actual_pages, &fines))?;
    state.metrics.record_completion();

    let efficiency_ratio = record.efficiency();
    let mut pace_factor = None;
    let mut advice = None;

    match efficiency_ratio {
        Some(ratio) => {
            let updated = track(state, state.pace.update(&record.owner, &record.subject, ratio, alpha).await)?;
            state.metrics.record_pace_update();
            pace_factor = Some(updated);

            if let Some(difficulty) = current_difficulty {
                advice = Some(track(state, DifficultyAdvisor::new(policy).advise(difficulty, ratio))?);
                state.metrics.record_advice();
            }
        }
        None => {
            tracing::info!(
                owner = %record.owner,
                subject = %record.subject,
                "Session has zero minutes, pace left unchanged"
            );
        }
    }

    Ok(CompletionOutcome {
        efficiency_ratio: efficiency_ratio.map(crate::efficiency::round2),
        status,
        record,
        pace_factor,
        advice,
    })
}

/// Single-session difficulty suggestion (sensitive regime).
pub fn adjust_difficulty(
    state: &AppState,
    request: &DifficultyAdjustmentRequest,
) -> Result<DifficultyAdvice, StudyError> {
    let policy = state.config.read().difficulty;
    let advice = track(state, DifficultyAdvisor::new(policy).advise_session(request))?;
    state.metrics.record_advice();
    Ok(advice)
}

/// Difficulty suggestion over several recent sessions (conservative regime).
pub fn adjust_difficulty_from_recent(
    state: &AppState,
    current_difficulty: u8,
    sessions: &[SessionOutcome],
) -> Result<DifficultyAdvice, StudyError> {
    let policy = state.config.read().difficulty;
    let advice = track(state, DifficultyAdvisor::new(policy).advise_recent(current_difficulty, sessions))?;
    state.metrics.record_advice();
    Ok(advice)
}

/// Weekly statistics for one owner, with pace commentary per subject.
pub async fn weekly_summary(
    state: &AppState,
    owner: &str,
    records: &[StudyRecord],
    window: &SummaryWindow,
) -> Result<WeeklySummary, StudyError> {
    let (bands, conservative) = {
        let config = state.config.read();
        (config.feedback, config.difficulty.conservative)
    };

    let owned: Vec<StudyRecord> = records
        .iter()
        .filter(|r| r.owner == owner && window.contains(r.record_date))
        .cloned()
        .collect();

    let mut subjects: Vec<&str> = owned.iter().map(|r| r.subject.as_str()).collect();
    subjects.sort_unstable();
    subjects.dedup();
    for subject in subjects {
        track(state, state.pace.get(owner, subject).await)?;
    }
    let pace = state.pace.snapshot(owner).await;

    let summary = WeeklyAggregator::new(bands, conservative).summarize(&owned, window, Some(&pace));
    state.metrics.record_summary();
    tracing::info!(
        owner = owner,
        subjects = summary.subjects.len(),
        weighted_efficiency = summary.overall.weighted_efficiency_ratio,
        "Weekly summary served"
    );
    Ok(summary)
}

pub fn monthly_settlement(records: &[StudyRecord], year: i32, month: u32) -> MonthlySettlement {
    settle_month(records, year, month)
}

pub async fn get_pace(state: &AppState, owner: &str, subject: &str) -> Result<f64, StudyError> {
    track(state, state.pace.get(owner, subject).await)
}
