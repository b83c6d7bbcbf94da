use serde::{Serialize, Deserialize};
use crate::efficiency::round2;
use crate::error::{StudyError, ValidationError};
use crate::records::SessionOutcome;
use crate::summary::stats::minutes_weighted_avg;

pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Suggestion {
    Up,
    Down,
    Keep,
}

/// Inclusive ratio bounds: `ratio >= up` moves up, `ratio <= down` moves down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub up: f64,
    pub down: f64,
}

impl Thresholds {
    /// Single-session suggestions.
    pub const SENSITIVE: Thresholds = Thresholds { up: 1.25, down: 0.70 };
    /// Aggregates over several sessions; only large, sustained gaps count.
    pub const CONSERVATIVE: Thresholds = Thresholds { up: 1.60, down: 0.55 };

    pub fn classify(&self, ratio: f64) -> Suggestion {
        if ratio >= self.up {
            Suggestion::Up
        } else if ratio <= self.down {
            Suggestion::Down
        } else {
            Suggestion::Keep
        }
    }
}

/// Both threshold regimes, configurable as a pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyPolicy {
    pub sensitive: Thresholds,
    pub conservative: Thresholds,
}

impl Default for DifficultyPolicy {
    fn default() -> Self {
        DifficultyPolicy {
            sensitive: Thresholds::SENSITIVE,
            conservative: Thresholds::CONSERVATIVE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyAdvice {
    pub efficiency_ratio: f64,
    pub suggestion: Suggestion,
    pub current_difficulty: u8,
    pub recommended_difficulty: u8,
    pub rationale: String,
}

/// Request shape for a single-session suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifficultyAdjustmentRequest {
    pub current_difficulty: u8,
    #[serde(flatten)]
    pub session: SessionOutcome,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DifficultyAdvisor {
    pub policy: DifficultyPolicy,
}

impl DifficultyAdvisor {
    pub fn new(policy: DifficultyPolicy) -> Self {
        DifficultyAdvisor { policy }
    }

    /// One efficiency ratio, sensitive regime.
    pub fn advise(&self, current_difficulty: u8, ratio: f64) -> Result<DifficultyAdvice, StudyError> {
        advise(current_difficulty, ratio, &self.policy.sensitive)
    }

    /// Minutes-weighted efficiency over recent sessions, conservative regime.
    /// Sessions with zero minutes are skipped; if none remain the ratio is
    /// treated as neutral and the difficulty is kept.
    pub fn advise_recent(
        &self,
        current_difficulty: u8,
        sessions: &[SessionOutcome],
    ) -> Result<DifficultyAdvice, StudyError> {
        let pairs: Vec<(f64, u32)> = sessions
            .iter()
            .filter_map(|s| s.efficiency().map(|r| (r, s.actual_minutes)))
            .collect();
        let ratio = if pairs.is_empty() { 1.0 } else { minutes_weighted_avg(&pairs) };
        tracing::debug!(
            sessions = sessions.len(),
            used = pairs.len(),
            ratio = ratio,
            "Aggregated recent efficiency"
        );
        advise(current_difficulty, ratio, &self.policy.conservative)
    }

    /// Single-session request: derive the ratio, then advise.
    pub fn advise_session(&self, request: &DifficultyAdjustmentRequest) -> Result<DifficultyAdvice, StudyError> {
        let session = &request.session;
        if session.target_minutes == 0 {
            return Err(ValidationError::ZeroMinutes { field: "target_minutes" }.into());
        }
        if session.actual_minutes == 0 {
            return Err(ValidationError::ZeroMinutes { field: "actual_minutes" }.into());
        }
        let ratio = crate::efficiency::efficiency_ratio(
            session.target_pages,
            session.target_minutes,
            session.actual_pages,
            session.actual_minutes,
        );
        self.advise(request.current_difficulty, ratio)
    }
}

pub fn validate_difficulty(difficulty: u8) -> Result<(), ValidationError> {
    if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&difficulty) {
        return Err(ValidationError::DifficultyOutOfRange(difficulty));
    }
    Ok(())
}

/// Classify `ratio` under `thresholds` and step the difficulty by one,
/// clamped to 1..=5.
pub fn advise(current_difficulty: u8, ratio: f64, thresholds: &Thresholds) -> Result<DifficultyAdvice, StudyError> {
    validate_difficulty(current_difficulty)?;
    if !ratio.is_finite() || ratio < 0.0 {
        return Err(ValidationError::InvalidRatio(ratio).into());
    }

    let suggestion = thresholds.classify(ratio);
    let recommended_difficulty = match suggestion {
        Suggestion::Up => (current_difficulty + 1).min(MAX_DIFFICULTY),
        Suggestion::Down => (current_difficulty - 1).max(MIN_DIFFICULTY),
        Suggestion::Keep => current_difficulty,
    };

    Ok(DifficultyAdvice {
        efficiency_ratio: round2(ratio),
        suggestion,
        current_difficulty,
        recommended_difficulty,
        rationale: rationale(suggestion, ratio),
    })
}

fn rationale(suggestion: Suggestion, ratio: f64) -> String {
    match suggestion {
        Suggestion::Up => format!(
            "Recent sessions ran at about {:.1}x the planned pace. \
             You are reliably ahead, so the next session can move up one difficulty level.",
            ratio
        ),
        Suggestion::Down => format!(
            "Recent sessions ran at about {:.1}x the planned pace. \
             Dropping one difficulty level should take some of the load off.",
            ratio
        ),
        Suggestion::Keep => format!(
            "Recent sessions ran at about {:.1}x the planned pace, which is steady. \
             The current difficulty looks right.",
            ratio
        ),
    }
}
