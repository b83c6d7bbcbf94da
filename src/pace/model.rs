use std::collections::HashMap;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use crate::efficiency::round2;
use crate::error::ValidationError;

pub const DEFAULT_PACE_FACTOR: f64 = 1.0;
pub const DEFAULT_ALPHA: f64 = 0.2;

/// Where 2-decimal rounding is applied to the smoothed pace factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaceRounding {
    /// Store full precision; only the value handed back is rounded.
    #[default]
    OutputOnly,
    /// Round the stored value on every update. Reproduces the legacy
    /// numbers exactly, at the cost of drift over long update chains.
    Stored,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaceEntry {
    pub pace_factor: f64,
    pub updated_at: DateTime<Utc>,
}

impl PaceEntry {
    pub fn fresh() -> Self {
        PaceEntry {
            pace_factor: DEFAULT_PACE_FACTOR,
            updated_at: Utc::now(),
        }
    }
}

/// Exponential smoothing step: move `alpha` of the way toward `observed`.
pub fn smooth(old: f64, observed: f64, alpha: f64) -> f64 {
    old * (1.0 - alpha) + observed * alpha
}

/// Pace factors keyed by owner, then subject name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaceTable {
    pub entries: HashMap<String, HashMap<String, PaceEntry>>,
}

impl PaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, owner: &str, subject: &str) -> Option<&PaceEntry> {
        self.entries.get(owner)?.get(subject)
    }

    /// Returns the entry and whether it was just created.
    pub fn get_or_create(&mut self, owner: &str, subject: &str) -> (&mut PaceEntry, bool) {
        let subjects = self.entries.entry(owner.to_string()).or_default();
        let created = !subjects.contains_key(subject);
        let entry = subjects
            .entry(subject.to_string())
            .or_insert_with(PaceEntry::fresh);
        (entry, created)
    }

    /// Apply one smoothing update and return the value to hand back to
    /// the caller (always 2 decimals).
    pub fn apply(
        &mut self,
        owner: &str,
        subject: &str,
        observed_ratio: f64,
        alpha: f64,
        rounding: PaceRounding,
    ) -> Result<f64, ValidationError> {
        validate_update(observed_ratio, alpha)?;

        let current = self
            .get(owner, subject)
            .map_or(DEFAULT_PACE_FACTOR, |entry| entry.pace_factor);
        let next = smooth(current, observed_ratio, alpha);
        let stored = match rounding {
            PaceRounding::OutputOnly => next,
            PaceRounding::Stored => round2(next),
        };
        if !stored.is_finite() || stored <= 0.0 {
            return Err(ValidationError::NonPositivePace(stored));
        }

        let (entry, _) = self.get_or_create(owner, subject);
        entry.pace_factor = stored;
        entry.updated_at = Utc::now();
        Ok(round2(stored))
    }

    /// Read-only copy of one owner's factors.
    pub fn snapshot(&self, owner: &str) -> HashMap<String, f64> {
        self.entries
            .get(owner)
            .map(|subjects| {
                subjects
                    .iter()
                    .map(|(name, entry)| (name.clone(), entry.pace_factor))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn validate_update(observed_ratio: f64, alpha: f64) -> Result<(), ValidationError> {
    if !observed_ratio.is_finite() || observed_ratio < 0.0 {
        return Err(ValidationError::InvalidRatio(observed_ratio));
    }
    if !alpha.is_finite() || alpha <= 0.0 || alpha > 1.0 {
        return Err(ValidationError::InvalidAlpha(alpha));
    }
    Ok(())
}

/// Subject names are matched after trimming surrounding whitespace.
pub fn normalize_subject(subject: &str) -> Result<String, ValidationError> {
    let trimmed = subject.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptySubject);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_from_default() {
        let mut table = PaceTable::new();
        let v = table.apply("u1", "math", 1.5, 0.2, PaceRounding::OutputOnly).unwrap();
        assert_eq!(v, 1.10);
        let v = PaceTable::new().apply("u1", "math", 0.5, 0.2, PaceRounding::OutputOnly).unwrap();
        assert_eq!(v, 0.90);
    }

    #[test]
    fn stored_rounding_keeps_two_decimals_in_table() {
        let mut table = PaceTable::new();
        table.apply("u1", "math", 1.37, 0.2, PaceRounding::Stored).unwrap();
        // 0.8 + 0.274 = 1.074 -> stored as 1.07
        assert_eq!(table.get("u1", "math").unwrap().pace_factor, 1.07);
    }

    #[test]
    fn output_only_keeps_full_precision_in_table() {
        let mut table = PaceTable::new();
        let returned = table.apply("u1", "math", 1.37, 0.2, PaceRounding::OutputOnly).unwrap();
        assert_eq!(returned, 1.07);
        let stored = table.get("u1", "math").unwrap().pace_factor;
        assert!((stored - 1.074).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_inputs() {
        let mut table = PaceTable::new();
        assert_eq!(
            table.apply("u1", "math", -0.1, 0.2, PaceRounding::OutputOnly),
            Err(ValidationError::InvalidRatio(-0.1))
        );
        assert!(table.apply("u1", "math", f64::NAN, 0.2, PaceRounding::OutputOnly).is_err());
        assert_eq!(
            table.apply("u1", "math", 1.0, 0.0, PaceRounding::OutputOnly),
            Err(ValidationError::InvalidAlpha(0.0))
        );
        assert!(table.apply("u1", "math", 1.0, 1.5, PaceRounding::OutputOnly).is_err());
        // nothing was materialised by the rejected calls
        assert!(table.is_empty());
    }

    #[test]
    fn zero_ratio_with_full_alpha_is_rejected() {
        let mut table = PaceTable::new();
        let err = table.apply("u1", "math", 0.0, 1.0, PaceRounding::OutputOnly).unwrap_err();
        assert_eq!(err, ValidationError::NonPositivePace(0.0));
        assert!(table.get("u1", "math").is_none());
        assert!(table.is_empty());

        table.apply("u1", "math", 1.5, 0.2, PaceRounding::OutputOnly).unwrap();
        let before = table.get("u1", "math").unwrap().pace_factor;
        table.apply("u1", "math", 0.0, 1.0, PaceRounding::OutputOnly).unwrap_err();
        assert_eq!(table.get("u1", "math").unwrap().pace_factor, before);
    }

    #[test]
    fn snapshot_is_scoped_to_owner() {
        let mut table = PaceTable::new();
        table.get_or_create("u1", "math");
        table.get_or_create("u2", "history");
        let snap = table.snapshot("u1");
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.get("math"), Some(&1.0));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn normalize_trims() {
        assert_eq!(normalize_subject("  Calculus ").unwrap(), "Calculus");
        assert_eq!(normalize_subject("   "), Err(ValidationError::EmptySubject));
    }
}
