//! Core types for issuegate
//!
//! Defines the records the gate reasons about:
//! - Identifiers for users, projects, issues and spam logs
//! - Issues and the proposed changes to them
//! - Spam logs and classifier verdicts
//! - Per-request challenge context and metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use ulid::Ulid;

/// User identifier assigned by the surrounding system
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Project identifier assigned by the surrounding system
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique issue identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(pub Ulid);

impl IssueId {
    /// Generate new issue ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for IssueId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IssueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IssueId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// Unique spam log identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpamLogId(pub Ulid);

impl SpamLogId {
    /// Generate new spam log ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SpamLogId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SpamLogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SpamLogId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// An issue record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Issue ID
    pub id: IssueId,
    /// Owning project
    pub project: ProjectId,
    /// Title
    pub title: String,
    /// Description (markdown, may carry quick-action commands)
    #[serde(default)]
    pub description: String,
    /// Restricted to author, assignee and developer+ viewers
    #[serde(default)]
    pub confidential: bool,
    /// Author
    pub author: UserId,
    /// Assignee
    #[serde(default)]
    pub assignee: Option<UserId>,
    /// Time estimate in seconds, populated by the quick-action parser
    #[serde(default)]
    pub time_estimate_secs: Option<u64>,
    /// Time spent in seconds, populated by the quick-action parser
    #[serde(default)]
    pub time_spent_secs: Option<u64>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl Issue {
    /// Build an issue from proposed fields on behalf of `author`
    #[must_use]
    pub fn from_new(new: NewIssue, author: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: IssueId::new(),
            project: new.project,
            title: new.title,
            description: new.description,
            confidential: new.confidential,
            author,
            assignee: new.assignee,
            time_estimate_secs: None,
            time_spent_secs: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether `user` authored this issue
    #[inline]
    #[must_use]
    pub fn is_authored_by(&self, user: UserId) -> bool {
        self.author == user
    }

    /// Check whether `user` is assigned to this issue
    #[inline]
    #[must_use]
    pub fn is_assigned_to(&self, user: UserId) -> bool {
        self.assignee == Some(user)
    }

    /// Return a copy with `changes` applied and `updated_at` bumped
    #[must_use]
    pub fn with_changes(&self, changes: &IssueChanges) -> Self {
        let mut next = self.clone();
        if let Some(title) = &changes.title {
            next.title.clone_from(title);
        }
        if let Some(description) = &changes.description {
            next.description.clone_from(description);
        }
        if let Some(confidential) = changes.confidential {
            next.confidential = confidential;
        }
        if let Some(assignee) = changes.assignee {
            next.assignee = assignee;
        }
        next.updated_at = Utc::now();
        next
    }
}

/// Proposed fields for a new issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIssue {
    /// Target project
    pub project: ProjectId,
    /// Title
    pub title: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Confidential flag
    #[serde(default)]
    pub confidential: bool,
    /// Assignee
    #[serde(default)]
    pub assignee: Option<UserId>,
}

impl NewIssue {
    /// Create new proposal
    #[inline]
    #[must_use]
    pub fn new(project: ProjectId, title: impl Into<String>) -> Self {
        Self {
            project,
            title: title.into(),
            description: String::new(),
            confidential: false,
            assignee: None,
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mark confidential
    #[inline]
    #[must_use]
    pub fn confidential(mut self) -> Self {
        self.confidential = true;
        self
    }

    /// With assignee
    #[inline]
    #[must_use]
    pub fn with_assignee(mut self, assignee: UserId) -> Self {
        self.assignee = Some(assignee);
        self
    }
}

/// Proposed changes to an existing issue
///
/// `None` leaves a field untouched. For `assignee`, `Some(None)` unassigns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueChanges {
    /// New title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New confidential flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidential: Option<bool>,
    /// New assignee
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_some"
    )]
    pub assignee: Option<Option<UserId>>,
}

impl IssueChanges {
    /// Create empty change set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With title
    #[inline]
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// With confidential flag
    #[inline]
    #[must_use]
    pub fn with_confidential(mut self, confidential: bool) -> Self {
        self.confidential = Some(confidential);
        self
    }

    /// With assignee (`None` unassigns)
    #[inline]
    #[must_use]
    pub fn with_assignee(mut self, assignee: Option<UserId>) -> Self {
        self.assignee = Some(assignee);
        self
    }

    /// Check whether nothing would change
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.confidential.is_none()
            && self.assignee.is_none()
    }
}

// An explicit `null` must become `Some(None)`, a missing key stays `None`.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// Request metadata forwarded to the spam classifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    /// Client IP address
    #[serde(default)]
    pub ip_address: Option<String>,
    /// Client user agent
    #[serde(default)]
    pub user_agent: Option<String>,
    /// HTTP referrer
    #[serde(default)]
    pub referrer: Option<String>,
}

impl RequestMetadata {
    /// Create metadata from IP address and user agent
    #[inline]
    #[must_use]
    pub fn new(ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip_address: Some(ip_address.into()),
            user_agent: Some(user_agent.into()),
            referrer: None,
        }
    }
}

/// Content handed to the spam classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    /// Submitting user
    pub user: UserId,
    /// Proposed title
    pub title: String,
    /// Proposed description
    pub description: String,
    /// Request metadata
    pub metadata: RequestMetadata,
}

/// Classifier verdict for one mutation attempt, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpamVerdict {
    /// Content looks like spam
    pub is_spam: bool,
    /// Classifier asks for a human challenge
    pub recaptcha_required: bool,
}

impl SpamVerdict {
    /// Verdict for legitimate content
    #[inline]
    #[must_use]
    pub fn ham() -> Self {
        Self::default()
    }

    /// Verdict for spam content
    #[inline]
    #[must_use]
    pub fn spam() -> Self {
        Self {
            is_spam: true,
            recaptcha_required: true,
        }
    }
}

/// Durable record of a submission flagged as spam
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpamLog {
    /// Spam log ID
    pub id: SpamLogId,
    /// Project the submission targeted
    pub project: ProjectId,
    /// Submitting user (owner)
    pub user: UserId,
    /// Submitted title
    pub title: String,
    /// Submitted description
    pub description: String,
    /// Metadata the classifier saw
    pub metadata: RequestMetadata,
    /// Owner later passed a challenge referencing this log
    pub recaptcha_verified: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl SpamLog {
    /// Record a flagged submission; always starts unverified
    #[must_use]
    pub fn new(project: ProjectId, request: &ClassificationRequest) -> Self {
        Self {
            id: SpamLogId::new(),
            project,
            user: request.user,
            title: request.title.clone(),
            description: request.description.clone(),
            metadata: request.metadata.clone(),
            recaptcha_verified: false,
            created_at: Utc::now(),
        }
    }

    /// Check whether `user` owns this log
    #[inline]
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.user == user
    }
}

/// Challenge information carried by a resubmission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeContext {
    /// Spam log created by the earlier rejected submission
    #[serde(default)]
    pub spam_log_id: Option<SpamLogId>,
    /// Opaque challenge response token (e.g. a reCAPTCHA response)
    #[serde(default)]
    pub response_token: Option<String>,
}

impl ChallengeContext {
    /// No challenge supplied
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Resubmission answering the challenge for `spam_log_id`
    #[inline]
    #[must_use]
    pub fn answered(spam_log_id: SpamLogId, response_token: impl Into<String>) -> Self {
        Self {
            spam_log_id: Some(spam_log_id),
            response_token: Some(response_token.into()),
        }
    }
}
