use std::fmt;
use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Deserialize};
use crate::efficiency::session_ratio;
use crate::error::{StudyError, ValidationError};

/// Achievement of a study session. Only `Pending` may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "O")]
    Achieved,
    #[serde(rename = "PARTIAL")]
    Partial,
    #[serde(rename = "X")]
    Missed,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordStatus::Pending => "PENDING",
            RecordStatus::Achieved => "O",
            RecordStatus::Partial => "PARTIAL",
            RecordStatus::Missed => "X",
        };
        f.write_str(label)
    }
}

/// Fines charged when a session falls short of its goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinePolicy {
    /// Time was put in but the page goal was missed.
    pub partial: u32,
    /// Neither the page nor the time goal was met.
    pub missed: u32,
}

impl Default for FinePolicy {
    fn default() -> Self {
        FinePolicy { partial: 1000, missed: 2000 }
    }
}

/// The four numbers that describe one session, planned vs done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub target_minutes: u32,
    pub target_pages: u32,
    pub actual_minutes: u32,
    pub actual_pages: u32,
}

impl SessionOutcome {
    pub fn new(target_minutes: u32, target_pages: u32, actual_minutes: u32, actual_pages: u32) -> Self {
        SessionOutcome { target_minutes, target_pages, actual_minutes, actual_pages }
    }

    /// `None` when the session must be left out of aggregates.
    pub fn efficiency(&self) -> Option<f64> {
        session_ratio(self.target_pages, self.target_minutes, self.actual_pages, self.actual_minutes)
    }
}

/// One logged study session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StudyRecord {
    pub owner: String,
    pub subject: String,
    pub record_date: NaiveDate,
    pub target_minutes: u32,
    pub target_pages: u32,
    #[serde(default)]
    pub actual_minutes: u32,
    #[serde(default)]
    pub actual_pages: u32,
    #[serde(default = "default_status")]
    pub status: RecordStatus,
    #[serde(default)]
    pub fine: u32,
}

fn default_status() -> RecordStatus {
    RecordStatus::Pending
}

impl StudyRecord {
    /// Goal-time record: targets set, actuals zeroed.
    pub fn pending(
        owner: &str,
        subject: &str,
        record_date: NaiveDate,
        target_minutes: u32,
        target_pages: u32,
    ) -> Self {
        StudyRecord {
            owner: owner.to_string(),
            subject: subject.trim().to_string(),
            record_date,
            target_minutes,
            target_pages,
            actual_minutes: 0,
            actual_pages: 0,
            status: RecordStatus::Pending,
            fine: 0,
        }
    }

    /// Historical record that is already completed under the default fines.
    pub fn logged(
        owner: &str,
        subject: &str,
        record_date: NaiveDate,
        target: (u32, u32),
        actual: (u32, u32),
    ) -> Self {
        let mut record = Self::pending(owner, subject, record_date, target.0, target.1);
        record.apply_completion(actual.0, actual.1, &FinePolicy::default());
        record
    }

    pub fn is_pending(&self) -> bool {
        self.status == RecordStatus::Pending
    }

    /// Fill in what was actually done. Allowed once per record.
    pub fn complete(
        &mut self,
        actual_minutes: u32,
        actual_pages: u32,
        fines: &FinePolicy,
    ) -> Result<RecordStatus, StudyError> {
        if !self.is_pending() {
            return Err(StudyError::from(ValidationError::AlreadyCompleted {
                status: self.status.to_string(),
            })
            .with_subject(self.subject.clone()));
        }
        self.apply_completion(actual_minutes, actual_pages, fines);
        tracing::debug!(
            owner = %self.owner,
            subject = %self.subject,
            status = %self.status,
            fine = self.fine,
            "Study record completed"
        );
        Ok(self.status)
    }

    fn apply_completion(&mut self, actual_minutes: u32, actual_pages: u32, fines: &FinePolicy) {
        let (status, fine) = if actual_pages >= self.target_pages {
            (RecordStatus::Achieved, 0)
        } else if actual_minutes >= self.target_minutes {
            (RecordStatus::Partial, fines.partial)
        } else {
            (RecordStatus::Missed, fines.missed)
        };
        self.actual_minutes = actual_minutes;
        self.actual_pages = actual_pages;
        self.status = status;
        self.fine = fine;
    }

    pub fn outcome(&self) -> SessionOutcome {
        SessionOutcome::new(self.target_minutes, self.target_pages, self.actual_minutes, self.actual_pages)
    }

    pub fn efficiency(&self) -> Option<f64> {
        self.outcome().efficiency()
    }
}

/// Fine and achievement totals for one calendar month.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlySettlement {
    pub month: String,
    pub total_fine: u64,
    pub achieved: usize,
    pub partial: usize,
    pub missed: usize,
    pub pending: usize,
}

pub fn settle_month(records: &[StudyRecord], year: i32, month: u32) -> MonthlySettlement {
    let mut settlement = MonthlySettlement {
        month: format!("{}-{:02}", year, month),
        ..Default::default()
    };

    for record in records
        .iter()
        .filter(|r| r.record_date.year() == year && r.record_date.month() == month)
    {
        settlement.total_fine += record.fine as u64;
        match record.status {
            RecordStatus::Achieved => settlement.achieved += 1,
            RecordStatus::Partial => settlement.partial += 1,
            RecordStatus::Missed => settlement.missed += 1,
            RecordStatus::Pending => settlement.pending += 1,
        }
    }

    settlement
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[test]
    fn pending_has_zeroed_actuals() {
        let r = StudyRecord::pending("u1", " Calculus ", day(1), 60, 10);
        assert_eq!(r.subject, "Calculus");
        assert_eq!(r.status, RecordStatus::Pending);
        assert_eq!((r.actual_minutes, r.actual_pages, r.fine), (0, 0, 0));
        assert_eq!(r.efficiency(), None);
    }

    #[test]
    fn completion_statuses_and_fines() {
        let fines = FinePolicy::default();

        let mut r = StudyRecord::pending("u1", "math", day(1), 60, 10);
        assert_eq!(r.complete(50, 10, &fines).unwrap(), RecordStatus::Achieved);
        assert_eq!(r.fine, 0);

        let mut r = StudyRecord::pending("u1", "math", day(1), 60, 10);
        assert_eq!(r.complete(60, 9, &fines).unwrap(), RecordStatus::Partial);
        assert_eq!(r.fine, 1000);

        let mut r = StudyRecord::pending("u1", "math", day(1), 60, 10);
        assert_eq!(r.complete(59, 9, &fines).unwrap(), RecordStatus::Missed);
        assert_eq!(r.fine, 2000);
    }

    #[test]
    fn completion_happens_once() {
        let mut r = StudyRecord::pending("u1", "math", day(1), 60, 10);
        r.complete(60, 12, &FinePolicy::default()).unwrap();
        let before = r.clone();
        let err = r.complete(10, 1, &FinePolicy::default()).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(r, before);
    }

    #[test]
    fn status_serialises_with_legacy_labels() {
        assert_eq!(serde_json::to_string(&RecordStatus::Achieved).unwrap(), "\"O\"");
        assert_eq!(serde_json::to_string(&RecordStatus::Missed).unwrap(), "\"X\"");
        let s: RecordStatus = serde_json::from_str("\"PARTIAL\"").unwrap();
        assert_eq!(s, RecordStatus::Partial);
    }

    #[test]
    fn monthly_settlement_counts_only_that_month() {
        let mut records = vec![
            StudyRecord::logged("u1", "math", day(2), (60, 10), (60, 10)),
            StudyRecord::logged("u1", "math", day(3), (60, 10), (60, 5)),
            StudyRecord::logged("u1", "math", day(4), (60, 10), (10, 1)),
            StudyRecord::pending("u1", "math", day(5), 60, 10),
        ];
        records.push(StudyRecord::logged(
            "u1",
            "math",
            NaiveDate::from_ymd_opt(2026, 9, 30).unwrap(),
            (60, 10),
            (0, 0),
        ));

        let s = settle_month(&records, 2026, 10);
        assert_eq!(s.month, "2026-10");
        assert_eq!(s.total_fine, 3000);
        assert_eq!((s.achieved, s.partial, s.missed, s.pending), (1, 1, 1, 1));
    }
}
