//! Outcomes surfaced to the request layer
//!
//! Every terminal branch of the gate maps to exactly one outcome, and every
//! outcome maps to one [`StatusCategory`].

use issuegate_core::{FieldErrors, Issue, SpamLogId};
use serde::{Deserialize, Serialize};

/// The one message shown for a spam rejection
///
/// Identical whether the challenge failed or challenges are disabled, so the
/// response does not reveal the anti-abuse configuration.
pub const SPAM_REJECTION_MESSAGE: &str =
    "Your issue has been recognized as spam. Please, change the content or solve the reCAPTCHA to proceed.";

/// HTTP-style status category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    /// Read succeeded
    Ok,
    /// Mutation applied, redirect to the issue
    Found,
    /// Missing, or hidden from this viewer
    NotFound,
    /// Validation failed or rejected as spam
    UnprocessableEntity,
}

impl StatusCategory {
    /// Numeric HTTP status
    #[inline]
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            StatusCategory::Ok => 200,
            StatusCategory::Found => 302,
            StatusCategory::NotFound => 404,
            StatusCategory::UnprocessableEntity => 422,
        }
    }
}

impl std::fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StatusCategory::Ok => "OK",
            StatusCategory::Found => "Found",
            StatusCategory::NotFound => "Not Found",
            StatusCategory::UnprocessableEntity => "Unprocessable Entity",
        };
        write!(f, "{} {}", self.http_status(), name)
    }
}

/// Result of a create or update submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MutationOutcome {
    /// Change stored
    Applied {
        /// Issue as stored
        issue: Issue,
        /// Applied on the strength of a verified challenge
        via_challenge: bool,
    },
    /// Target missing or not accessible to the viewer
    NotFound,
    /// Proposed fields violate structural constraints
    ValidationFailed {
        /// Messages per field
        errors: FieldErrors,
    },
    /// Flagged as spam and not applied
    RejectedAsSpam {
        /// User-facing message
        message: String,
        /// Spam log to reference when resubmitting with a challenge
        spam_log_id: SpamLogId,
    },
}

impl MutationOutcome {
    /// Spam rejection carrying the fixed message
    #[inline]
    #[must_use]
    pub fn rejected_as_spam(spam_log_id: SpamLogId) -> Self {
        Self::RejectedAsSpam {
            message: SPAM_REJECTION_MESSAGE.to_string(),
            spam_log_id,
        }
    }

    /// Status category for the response
    #[inline]
    #[must_use]
    pub fn status(&self) -> StatusCategory {
        match self {
            Self::Applied { .. } => StatusCategory::Found,
            Self::NotFound => StatusCategory::NotFound,
            Self::ValidationFailed { .. } | Self::RejectedAsSpam { .. } => {
                StatusCategory::UnprocessableEntity
            }
        }
    }

    /// Check if the change was stored
    #[inline]
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// Stored issue, if applied
    #[inline]
    #[must_use]
    pub fn issue(&self) -> Option<&Issue> {
        match self {
            Self::Applied { issue, .. } => Some(issue),
            _ => None,
        }
    }

    /// Spam log created by a rejection
    #[inline]
    #[must_use]
    pub fn spam_log_id(&self) -> Option<SpamLogId> {
        match self {
            Self::RejectedAsSpam { spam_log_id, .. } => Some(*spam_log_id),
            _ => None,
        }
    }

    /// Short outcome name for logs and reports
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::NotFound => "not_found",
            Self::ValidationFailed { .. } => "validation_failed",
            Self::RejectedAsSpam { .. } => "rejected_as_spam",
        }
    }
}

/// Result of a show or edit request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AccessOutcome {
    /// Issue is accessible
    Found {
        /// The issue
        issue: Issue,
    },
    /// Missing, or hidden from this viewer
    NotFound,
}

impl AccessOutcome {
    /// Status category for the response
    #[inline]
    #[must_use]
    pub fn status(&self) -> StatusCategory {
        match self {
            Self::Found { .. } => StatusCategory::Ok,
            Self::NotFound => StatusCategory::NotFound,
        }
    }

    /// The issue, if accessible
    #[inline]
    #[must_use]
    pub fn issue(&self) -> Option<&Issue> {
        match self {
            Self::Found { issue } => Some(issue),
            Self::NotFound => None,
        }
    }
}

/// Result of a delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// Issue removed, redirect to the list
    Deleted,
    /// Missing, hidden, or viewer is not owner/admin
    NotFound,
}

impl DeleteOutcome {
    /// Status category for the response
    #[inline]
    #[must_use]
    pub fn status(&self) -> StatusCategory {
        match self {
            Self::Deleted => StatusCategory::Found,
            Self::NotFound => StatusCategory::NotFound,
        }
    }
}
