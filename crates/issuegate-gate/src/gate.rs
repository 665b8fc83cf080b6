//! Mutation gate
//!
//! Decides whether a proposed create/update is applied, applied after a
//! verified human challenge, or rejected and recorded as spam.
//!
//! Order of checks for one submission:
//! 1. authorization (failures surface as not-found)
//! 2. structural validation
//! 3. spam classification, when enabled and the text changes
//! 4. challenge verification against the viewer's own spam log
//!
//! A verified challenge flips the spam log's flag before the issue is
//! written.
//!
//! Collaborator failures abort the submission with [`GateError::Collaborator`].

use crate::collaborators::{ChallengeVerifier, SpamClassifier};
use crate::error::GateResult;
use crate::outcome::MutationOutcome;
use issuegate_core::{
    AntiAbuseSettings, ChallengeContext, ClassificationRequest, Issue, IssueChanges, IssueFields,
    IssueValidator, NewIssue, ProjectId, RequestMetadata, SpamLog, SpamLogId, UserId,
    ValidationLimits, Viewer, VisibilityFilter,
};
use issuegate_store::{IssueStore, SpamLogStore};
use std::sync::Arc;

/// What a submission wants to change
#[derive(Debug, Clone, Copy)]
pub enum MutationTarget<'a> {
    /// Open a new issue
    New(&'a NewIssue),
    /// Change an existing issue
    Existing {
        /// Issue as currently stored
        issue: &'a Issue,
        /// Proposed changes
        changes: &'a IssueChanges,
    },
}

impl<'a> MutationTarget<'a> {
    /// Project the submission targets
    #[must_use]
    pub fn project(&self) -> ProjectId {
        match self {
            MutationTarget::New(new) => new.project,
            MutationTarget::Existing { issue, .. } => issue.project,
        }
    }

    /// Text fields the issue would end up with
    #[must_use]
    pub fn fields(&self) -> IssueFields<'a> {
        match *self {
            MutationTarget::New(new) => IssueFields::of_new(new),
            MutationTarget::Existing { issue, changes } => IssueFields::of_update(issue, changes),
        }
    }

    /// Check if the submission would change the title or description
    ///
    /// Always true for new issues.
    #[must_use]
    pub fn changes_text(&self) -> bool {
        match *self {
            MutationTarget::New(_) => true,
            MutationTarget::Existing { issue, .. } => {
                let fields = self.fields();
                fields.title != issue.title || fields.description != issue.description
            }
        }
    }

    fn authorized(&self, viewer: &Viewer) -> bool {
        match self {
            MutationTarget::New(_) => VisibilityFilter::can_create(viewer),
            MutationTarget::Existing { issue, .. } => VisibilityFilter::can_update(viewer, issue),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            MutationTarget::New(_) => "create",
            MutationTarget::Existing { .. } => "update",
        }
    }
}

/// The mutation gate
pub struct MutationGate {
    settings: AntiAbuseSettings,
    validator: IssueValidator,
    classifier: Arc<dyn SpamClassifier>,
    verifier: Arc<dyn ChallengeVerifier>,
    spam_logs: Arc<dyn SpamLogStore>,
    issues: Arc<dyn IssueStore>,
}

impl std::fmt::Debug for MutationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationGate")
            .field("settings", &self.settings)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl MutationGate {
    /// Create gate
    #[must_use]
    pub fn new(
        settings: AntiAbuseSettings,
        limits: ValidationLimits,
        classifier: Arc<dyn SpamClassifier>,
        verifier: Arc<dyn ChallengeVerifier>,
        spam_logs: Arc<dyn SpamLogStore>,
        issues: Arc<dyn IssueStore>,
    ) -> Self {
        Self {
            settings,
            validator: IssueValidator::new(limits),
            classifier,
            verifier,
            spam_logs,
            issues,
        }
    }

    /// Anti-abuse switches in effect
    #[inline]
    #[must_use]
    pub fn settings(&self) -> AntiAbuseSettings {
        self.settings
    }

    /// Evaluate one submission and apply it if allowed
    ///
    /// # Errors
    /// `GateError::Collaborator` when the store, classifier or challenge
    /// verifier fails. Nothing is retried.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(op = target.kind(), project = %target.project())
    )]
    pub async fn submit(
        &self,
        viewer: &Viewer,
        target: MutationTarget<'_>,
        challenge: &ChallengeContext,
        metadata: &RequestMetadata,
    ) -> GateResult<MutationOutcome> {
        let user = match viewer.user {
            Some(user) if target.authorized(viewer) => user,
            _ => {
                tracing::debug!(%viewer, "submission not authorized");
                return Ok(MutationOutcome::NotFound);
            }
        };

        let fields = target.fields();
        if let Err(errors) = self.validator.validate(fields) {
            tracing::debug!(%user, %errors, "submission failed validation");
            return Ok(MutationOutcome::ValidationFailed { errors });
        }

        if !self.settings.spam_check_enabled {
            return self.apply(target, user, false).await;
        }
        if !target.changes_text() {
            tracing::debug!(%user, "title and description unchanged, not classified");
            return self.apply(target, user, false).await;
        }

        let request = ClassificationRequest {
            user,
            title: fields.title.to_string(),
            description: fields.description.to_string(),
            metadata: metadata.clone(),
        };
        let verdict = self.classifier.classify(&request).await?;
        tracing::debug!(
            %user,
            is_spam = verdict.is_spam,
            recaptcha_required = verdict.recaptcha_required,
            "classified submission"
        );
        if !verdict.is_spam {
            return self.apply(target, user, false).await;
        }

        if let Some(spam_log_id) = self.verified_challenge(user, challenge).await? {
            // Flag first: a failed flip must leave the issue untouched.
            if self
                .spam_logs
                .mark_recaptcha_verified(spam_log_id, user)
                .await?
            {
                tracing::info!(%user, spam_log = %spam_log_id, "spam log marked verified");
            } else {
                tracing::debug!(%user, spam_log = %spam_log_id, "spam log already verified");
            }
            return self.apply(target, user, true).await;
        }

        let log = self
            .spam_logs
            .create_spam_log(SpamLog::new(target.project(), &request))
            .await?;
        tracing::warn!(%user, spam_log = %log.id, "submission rejected as spam");
        Ok(MutationOutcome::rejected_as_spam(log.id))
    }

    /// Spam log id vouched for by a passing challenge, if any
    async fn verified_challenge(
        &self,
        user: UserId,
        challenge: &ChallengeContext,
    ) -> GateResult<Option<SpamLogId>> {
        if !self.settings.recaptcha_enabled {
            return Ok(None);
        }
        let (Some(spam_log_id), Some(token)) = (
            challenge.spam_log_id,
            challenge.response_token.as_deref().filter(|t| !t.is_empty()),
        ) else {
            return Ok(None);
        };

        match self.spam_logs.get_spam_log(spam_log_id).await? {
            Some(log) if log.is_owned_by(user) => {}
            Some(_) => {
                tracing::debug!(%user, spam_log = %spam_log_id, "spam log owned by another user");
                return Ok(None);
            }
            None => {
                tracing::debug!(%user, spam_log = %spam_log_id, "spam log not found");
                return Ok(None);
            }
        }

        let passed = self.verifier.verify(token).await?;
        tracing::debug!(%user, spam_log = %spam_log_id, passed, "challenge checked");
        Ok(passed.then_some(spam_log_id))
    }

    async fn apply(
        &self,
        target: MutationTarget<'_>,
        user: UserId,
        via_challenge: bool,
    ) -> GateResult<MutationOutcome> {
        let issue = match target {
            MutationTarget::New(new) => {
                self.issues
                    .insert_issue(Issue::from_new(new.clone(), user))
                    .await?
            }
            MutationTarget::Existing { issue, changes } => {
                self.issues.save_issue(issue.with_changes(changes)).await?
            }
        };
        tracing::info!(
            %user,
            issue = %issue.id,
            op = target.kind(),
            via_challenge,
            "mutation applied"
        );
        Ok(MutationOutcome::Applied {
            issue,
            via_challenge,
        })
    }
}
