use thiserror::Error;

use crate::parse::RUN_TIME_FORMAT_HINT;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("invalid run time '{input}', expected format '{RUN_TIME_FORMAT_HINT}'")]
    InvalidRunTime { input: String },

    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },

    #[error("prompt cannot be empty")]
    EmptyPrompt,

    #[error("task number {index} is out of range (1..={count})")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("unknown timezone: {timezone}")]
    UnknownTimezone { timezone: String },

    #[error("{message}")]
    Message { message: String },

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_run_time(input: impl Into<String>) -> Self {
        Self::InvalidRunTime {
            input: input.into(),
        }
    }

    #[must_use]
    pub fn invalid_cron(expr: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCron {
            expr: expr.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn unknown_timezone(timezone: impl Into<String>) -> Self {
        Self::UnknownTimezone {
            timezone: timezone.into(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Errors caused by caller input. The task list is never modified when
    /// one of these is returned.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidRunTime { .. }
                | Self::InvalidCron { .. }
                | Self::EmptyPrompt
                | Self::IndexOutOfRange { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
