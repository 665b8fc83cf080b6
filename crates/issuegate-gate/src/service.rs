//! Issue service
//!
//! The controller-level operations (list, show, edit, create, update,
//! delete) composed from the store, the visibility filter, the mutation gate
//! and the notifier. Every operation is scoped to one project; the viewer
//! passed in must have been resolved for that same project.

use crate::collaborators::{ChallengeVerifier, NoopNotifier, Notifier, SpamClassifier};
use crate::error::GateResult;
use crate::gate::{MutationGate, MutationTarget};
use crate::outcome::{AccessOutcome, DeleteOutcome, MutationOutcome};
use issuegate_core::{
    ChallengeContext, GateConfig, Issue, IssueChanges, IssueId, NewIssue, ProjectId,
    RequestMetadata, UserId, Viewer, VisibilityFilter,
};
use issuegate_store::{IssueStore, MembershipStore, SpamLogStore};
use std::sync::Arc;

/// External collaborators the service is built from
#[derive(Clone)]
pub struct Collaborators {
    /// Issue persistence
    pub issues: Arc<dyn IssueStore>,
    /// Spam log persistence
    pub spam_logs: Arc<dyn SpamLogStore>,
    /// Membership lookups
    pub memberships: Arc<dyn MembershipStore>,
    /// Spam classifier
    pub classifier: Arc<dyn SpamClassifier>,
    /// Challenge verifier
    pub verifier: Arc<dyn ChallengeVerifier>,
    /// Post-mutation hook
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    /// Use one store for issues, spam logs and memberships, with no notifier
    #[must_use]
    pub fn with_store<S>(
        store: Arc<S>,
        classifier: Arc<dyn SpamClassifier>,
        verifier: Arc<dyn ChallengeVerifier>,
    ) -> Self
    where
        S: IssueStore + SpamLogStore + MembershipStore + 'static,
    {
        Self {
            issues: store.clone(),
            spam_logs: store.clone(),
            memberships: store,
            classifier,
            verifier,
            notifier: Arc::new(NoopNotifier),
        }
    }

    /// With notifier
    #[inline]
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }
}

/// Issue operations guarded by visibility and the mutation gate
pub struct IssueService {
    gate: MutationGate,
    issues: Arc<dyn IssueStore>,
    memberships: Arc<dyn MembershipStore>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for IssueService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssueService")
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl IssueService {
    /// Create service from configuration and collaborators
    #[must_use]
    pub fn new(config: &GateConfig, collaborators: Collaborators) -> Self {
        let gate = MutationGate::new(
            config.anti_abuse,
            config.limits,
            collaborators.classifier,
            collaborators.verifier,
            collaborators.spam_logs,
            collaborators.issues.clone(),
        );
        Self {
            gate,
            issues: collaborators.issues,
            memberships: collaborators.memberships,
            notifier: collaborators.notifier,
        }
    }

    /// The underlying gate
    #[inline]
    #[must_use]
    pub fn gate(&self) -> &MutationGate {
        &self.gate
    }

    /// Resolve the requester's role in `project`
    ///
    /// # Errors
    /// `GateError::Collaborator` if the membership lookup fails
    pub async fn resolve_viewer(
        &self,
        user: Option<UserId>,
        project: ProjectId,
    ) -> GateResult<Viewer> {
        let Some(user) = user else {
            return Ok(Viewer::anonymous());
        };
        let role = self.memberships.role_of(user, project).await?;
        let admin = self.memberships.is_admin(user).await?;
        Ok(Viewer {
            user: Some(user),
            role,
            admin,
        })
    }

    /// Issues of `project` the viewer may see, oldest first
    ///
    /// # Errors
    /// `GateError::Collaborator` if the store fails
    pub async fn list(&self, viewer: &Viewer, project: ProjectId) -> GateResult<Vec<Issue>> {
        let issues = self.issues.list_issues(project).await?;
        let total = issues.len();
        let visible = VisibilityFilter::filter_visible(viewer, issues);
        tracing::debug!(%project, total, visible = visible.len(), "listed issues");
        Ok(visible)
    }

    /// One issue by direct reference
    ///
    /// # Errors
    /// `GateError::Collaborator` if the store fails
    pub async fn show(
        &self,
        viewer: &Viewer,
        project: ProjectId,
        id: IssueId,
    ) -> GateResult<AccessOutcome> {
        Ok(match self.find_visible(viewer, project, id).await? {
            Some(issue) => AccessOutcome::Found { issue },
            None => AccessOutcome::NotFound,
        })
    }

    /// The edit form for one issue; also requires edit rights
    ///
    /// # Errors
    /// `GateError::Collaborator` if the store fails
    pub async fn edit(
        &self,
        viewer: &Viewer,
        project: ProjectId,
        id: IssueId,
    ) -> GateResult<AccessOutcome> {
        Ok(match self.find_visible(viewer, project, id).await? {
            Some(issue) if VisibilityFilter::can_update(viewer, &issue) => {
                AccessOutcome::Found { issue }
            }
            _ => AccessOutcome::NotFound,
        })
    }

    /// Open a new issue in `new.project`
    ///
    /// # Errors
    /// `GateError::Collaborator` if any collaborator fails
    pub async fn create(
        &self,
        viewer: &Viewer,
        new: &NewIssue,
        challenge: &ChallengeContext,
        metadata: &RequestMetadata,
    ) -> GateResult<MutationOutcome> {
        let outcome = self
            .gate
            .submit(viewer, MutationTarget::New(new), challenge, metadata)
            .await?;
        if let (Some(issue), Some(user)) = (outcome.issue(), viewer.user) {
            self.notifier.issue_created(issue, user).await?;
        }
        Ok(outcome)
    }

    /// Change an existing issue
    ///
    /// # Errors
    /// `GateError::Collaborator` if any collaborator fails
    pub async fn update(
        &self,
        viewer: &Viewer,
        project: ProjectId,
        id: IssueId,
        changes: &IssueChanges,
        challenge: &ChallengeContext,
        metadata: &RequestMetadata,
    ) -> GateResult<MutationOutcome> {
        let Some(before) = self.find_visible(viewer, project, id).await? else {
            return Ok(MutationOutcome::NotFound);
        };
        let target = MutationTarget::Existing {
            issue: &before,
            changes,
        };
        let outcome = self.gate.submit(viewer, target, challenge, metadata).await?;
        if let (Some(after), Some(user)) = (outcome.issue(), viewer.user) {
            self.notifier.issue_updated(&before, after, user).await?;
        }
        Ok(outcome)
    }

    /// Remove an issue; project owners and administrators only
    ///
    /// # Errors
    /// `GateError::Collaborator` if the store or notifier fails
    pub async fn delete(
        &self,
        viewer: &Viewer,
        project: ProjectId,
        id: IssueId,
    ) -> GateResult<DeleteOutcome> {
        let issue = match self.find_visible(viewer, project, id).await? {
            Some(issue) if VisibilityFilter::can_delete(viewer, &issue) => issue,
            _ => return Ok(DeleteOutcome::NotFound),
        };
        let Some(user) = viewer.user else {
            return Ok(DeleteOutcome::NotFound);
        };
        if !self.issues.delete_issue(id).await? {
            return Ok(DeleteOutcome::NotFound);
        }
        tracing::info!(%user, issue = %id, %project, "issue deleted");
        self.notifier.issue_deleted(&issue, user).await?;
        Ok(DeleteOutcome::Deleted)
    }

    // Missing, in another project, or hidden all look the same to the caller.
    async fn find_visible(
        &self,
        viewer: &Viewer,
        project: ProjectId,
        id: IssueId,
    ) -> GateResult<Option<Issue>> {
        let issue = self
            .issues
            .get_issue(id)
            .await?
            .filter(|issue| issue.project == project)
            .filter(|issue| VisibilityFilter::is_visible(viewer, issue));
        if issue.is_none() {
            tracing::debug!(%viewer, issue = %id, %project, "issue not found for viewer");
        }
        Ok(issue)
    }
}
