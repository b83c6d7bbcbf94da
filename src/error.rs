use serde::{Serialize, Deserialize};
use std::fmt;

/// Unified error type for the study-pace engine.
/// Fallible operations return Result<T, StudyError>; degenerate-but-valid
/// inputs never produce one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyError {
    pub message: String,
    pub stage: String,
    pub subject: Option<String>,
    pub context: Option<String>,
    pub source: Option<String>,
}

impl StudyError {
    /// Create a new error with stage and message
    pub fn new<S: Into<String>>(message: S, stage: &'static str) -> Self {
        StudyError {
            message: message.into(),
            stage: stage.to_string(),
            subject: None,
            context: None,
            source: None,
        }
    }

    /// Attach the subject the failing operation was working on
    pub fn with_subject<S: Into<String>>(mut self, subject: S) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Add additional context information
    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add source error information
    pub fn with_source<S: Into<String>>(mut self, source: S) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn is_validation(&self) -> bool {
        self.stage == "validation"
    }
}

impl fmt::Display for StudyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.message)?;
        if let Some(ref subject) = self.subject {
            write!(f, " (subject: {})", subject)?;
        }
        if let Some(ref context) = self.context {
            write!(f, " (context: {})", context)?;
        }
        if let Some(ref source) = self.source {
            write!(f, " (source: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for StudyError {}

/// Caller contract violations. These are rejected before they can reach
/// the persisted pace state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("difficulty must be within 1..=5, got {0}")]
    DifficultyOutOfRange(u8),
    #[error("importance must be within 1..=5, got {0}")]
    ImportanceOutOfRange(u8),
    #[error("efficiency ratio must be finite and non-negative, got {0}")]
    InvalidRatio(f64),
    #[error("smoothing factor must be within (0, 1], got {0}")]
    InvalidAlpha(f64),
    #[error("{field} must be at least 1 minute when used as a divisor")]
    ZeroMinutes { field: &'static str },
    #[error("record is already {status} and can no longer change")]
    AlreadyCompleted { status: String },
    #[error("pace factor must stay positive, update produced {0}")]
    NonPositivePace(f64),
    #[error("subject name must not be empty")]
    EmptySubject,
}

impl From<ValidationError> for StudyError {
    fn from(err: ValidationError) -> Self {
        StudyError::new(err.to_string(), "validation")
    }
}

impl From<std::io::Error> for StudyError {
    fn from(err: std::io::Error) -> Self {
        StudyError::new(
            format!("I/O error: {}", err),
            "io"
        ).with_source("std::io")
    }
}

impl From<serde_json::Error> for StudyError {
    fn from(err: serde_json::Error) -> Self {
        StudyError::new(
            format!("JSON error: {}", err),
            "json_parse"
        ).with_source("serde_json")
    }
}

impl From<toml::de::Error> for StudyError {
    fn from(err: toml::de::Error) -> Self {
        StudyError::new(
            format!("TOML error: {}", err),
            "config"
        ).with_source("toml")
    }
}
