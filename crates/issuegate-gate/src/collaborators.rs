//! External collaborators consumed by the gate
//!
//! - [`SpamClassifier`]: judges whether submitted text is spam
//! - [`ChallengeVerifier`]: checks a human challenge response token
//! - [`Notifier`]: notification/cache hook run after applied changes
//!
//! Offline implementations ([`KeywordClassifier`],
//! [`StaticChallengeVerifier`], [`RecordingNotifier`]) back the CLI and local
//! runs.

use async_trait::async_trait;
use issuegate_core::{
    ClassificationRequest, CollaboratorError, Issue, IssueId, OfflineCollaborators, SpamVerdict,
    UserId,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Spam classification service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpamClassifier: Send + Sync {
    /// Classify the proposed title/description of one mutation attempt
    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<SpamVerdict, CollaboratorError>;
}

/// Human challenge verification service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChallengeVerifier: Send + Sync {
    /// Check a challenge response token, `true` on pass
    async fn verify(&self, response_token: &str) -> Result<bool, CollaboratorError>;
}

/// Hook notified after applied creates, updates and deletes
#[async_trait]
pub trait Notifier: Send + Sync {
    /// A new issue was stored
    async fn issue_created(&self, issue: &Issue, author: UserId) -> Result<(), CollaboratorError>;

    /// An existing issue was changed
    async fn issue_updated(
        &self,
        before: &Issue,
        after: &Issue,
        editor: UserId,
    ) -> Result<(), CollaboratorError>;

    /// An issue was removed
    async fn issue_deleted(&self, issue: &Issue, deleted_by: UserId)
        -> Result<(), CollaboratorError>;
}

/// Notifier that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn issue_created(&self, _issue: &Issue, _author: UserId) -> Result<(), CollaboratorError> {
        Ok(())
    }

    async fn issue_updated(
        &self,
        _before: &Issue,
        _after: &Issue,
        _editor: UserId,
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }

    async fn issue_deleted(
        &self,
        _issue: &Issue,
        _deleted_by: UserId,
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Notification emitted by [`RecordingNotifier`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IssueEvent {
    /// Issue created
    Created {
        /// Issue
        issue: IssueId,
        /// Acting user
        by: UserId,
    },
    /// Issue updated
    Updated {
        /// Issue
        issue: IssueId,
        /// Acting user
        by: UserId,
    },
    /// Issue deleted
    Deleted {
        /// Issue
        issue: IssueId,
        /// Acting user
        by: UserId,
    },
}

/// Notifier that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<IssueEvent>>,
}

impl RecordingNotifier {
    /// Create empty recorder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far
    #[must_use]
    pub fn events(&self) -> Vec<IssueEvent> {
        self.events.lock().clone()
    }

    /// Drain recorded events
    pub fn take(&self) -> Vec<IssueEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn issue_created(&self, issue: &Issue, author: UserId) -> Result<(), CollaboratorError> {
        self.events.lock().push(IssueEvent::Created {
            issue: issue.id,
            by: author,
        });
        Ok(())
    }

    async fn issue_updated(
        &self,
        _before: &Issue,
        after: &Issue,
        editor: UserId,
    ) -> Result<(), CollaboratorError> {
        self.events.lock().push(IssueEvent::Updated {
            issue: after.id,
            by: editor,
        });
        Ok(())
    }

    async fn issue_deleted(
        &self,
        issue: &Issue,
        deleted_by: UserId,
    ) -> Result<(), CollaboratorError> {
        self.events.lock().push(IssueEvent::Deleted {
            issue: issue.id,
            by: deleted_by,
        });
        Ok(())
    }
}

/// Offline classifier flagging submissions that contain configured terms
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier {
    terms: Vec<String>,
}

impl KeywordClassifier {
    /// Create classifier; terms match case-insensitively
    #[must_use]
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Classifier configured from the `[offline]` section
    #[must_use]
    pub fn from_config(offline: &OfflineCollaborators) -> Self {
        Self::new(&offline.spam_terms)
    }

    fn matches(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.terms.iter().any(|term| text.contains(term.as_str()))
    }
}

#[async_trait]
impl SpamClassifier for KeywordClassifier {
    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<SpamVerdict, CollaboratorError> {
        if self.matches(&request.title) || self.matches(&request.description) {
            Ok(SpamVerdict::spam())
        } else {
            Ok(SpamVerdict::ham())
        }
    }
}

/// Offline verifier accepting exactly one configured token
#[derive(Debug, Clone, Default)]
pub struct StaticChallengeVerifier {
    accepted: Option<String>,
}

impl StaticChallengeVerifier {
    /// Verifier accepting `token`
    #[inline]
    #[must_use]
    pub fn accepting(token: impl Into<String>) -> Self {
        Self {
            accepted: Some(token.into()),
        }
    }

    /// Verifier configured from the `[offline]` section; rejects everything
    /// when no token is configured
    #[inline]
    #[must_use]
    pub fn from_config(offline: &OfflineCollaborators) -> Self {
        Self {
            accepted: offline.challenge_token.clone(),
        }
    }
}

#[async_trait]
impl ChallengeVerifier for StaticChallengeVerifier {
    async fn verify(&self, response_token: &str) -> Result<bool, CollaboratorError> {
        Ok(self
            .accepted
            .as_deref()
            .is_some_and(|accepted| !response_token.is_empty() && accepted == response_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use issuegate_core::{NewIssue, ProjectId, RequestMetadata};

    fn request(title: &str, description: &str) -> ClassificationRequest {
        ClassificationRequest {
            user: UserId(1),
            title: title.to_string(),
            description: description.to_string(),
            metadata: RequestMetadata::default(),
        }
    }

    #[tokio::test]
    async fn keyword_classifier_is_case_insensitive() {
        let classifier = KeywordClassifier::new(["Casino", "  "]);
        let spam = classifier.classify(&request("Best CASINO bonus", "")).await.unwrap();
        assert!(spam.is_spam);
        assert!(spam.recaptcha_required);

        let ham = classifier.classify(&request("Login fails", "on casin")).await.unwrap();
        assert!(!ham.is_spam);
    }

    #[tokio::test]
    async fn keyword_classifier_checks_description() {
        let classifier = KeywordClassifier::new(["pills"]);
        let verdict = classifier.classify(&request("Hello", "cheap pills")).await.unwrap();
        assert!(verdict.is_spam);
    }

    #[tokio::test]
    async fn static_verifier_accepts_only_its_token() {
        let verifier = StaticChallengeVerifier::accepting("pass");
        assert!(verifier.verify("pass").await.unwrap());
        assert!(!verifier.verify("fail").await.unwrap());

        let unconfigured = StaticChallengeVerifier::from_config(&OfflineCollaborators::default());
        assert!(!unconfigured.verify("pass").await.unwrap());
        assert!(!unconfigured.verify("").await.unwrap());
    }

    #[tokio::test]
    async fn recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::new();
        let issue = Issue::from_new(NewIssue::new(ProjectId(1), "t"), UserId(1));

        notifier.issue_created(&issue, UserId(1)).await.unwrap();
        notifier.issue_deleted(&issue, UserId(2)).await.unwrap();

        assert_eq!(
            notifier.take(),
            vec![
                IssueEvent::Created {
                    issue: issue.id,
                    by: UserId(1)
                },
                IssueEvent::Deleted {
                    issue: issue.id,
                    by: UserId(2)
                },
            ]
        );
        assert!(notifier.events().is_empty());
    }
}
