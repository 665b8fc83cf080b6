//! Persistence collaborator interfaces

use async_trait::async_trait;
use issuegate_core::{
    CollaboratorError, Issue, IssueId, ProjectId, ProjectRole, SpamLog, SpamLogId, UserId,
};

/// Result alias for store operations
pub type StoreResult<T> = Result<T, CollaboratorError>;

/// Issue persistence
#[async_trait]
pub trait IssueStore: Send + Sync {
    /// Load one issue
    async fn get_issue(&self, id: IssueId) -> StoreResult<Option<Issue>>;

    /// All issues of a project, oldest first
    async fn list_issues(&self, project: ProjectId) -> StoreResult<Vec<Issue>>;

    /// Persist a new issue
    ///
    /// # Errors
    /// `CollaboratorError::Store` if an issue with the same ID exists
    async fn insert_issue(&self, issue: Issue) -> StoreResult<Issue>;

    /// Overwrite an existing issue
    ///
    /// # Errors
    /// `CollaboratorError::Store` if the issue no longer exists
    async fn save_issue(&self, issue: Issue) -> StoreResult<Issue>;

    /// Remove an issue, returning whether it existed
    async fn delete_issue(&self, id: IssueId) -> StoreResult<bool>;
}

/// Spam log persistence
#[async_trait]
pub trait SpamLogStore: Send + Sync {
    /// Persist a new spam log
    async fn create_spam_log(&self, log: SpamLog) -> StoreResult<SpamLog>;

    /// Load one spam log
    async fn get_spam_log(&self, id: SpamLogId) -> StoreResult<Option<SpamLog>>;

    /// Compare-and-set the verified flag from `false` to `true`
    ///
    /// Succeeds only when the log exists, is owned by `owner` and is not yet
    /// verified. Returns whether this call performed the transition; a
    /// concurrent caller racing on the same ID observes `false`.
    async fn mark_recaptcha_verified(&self, id: SpamLogId, owner: UserId) -> StoreResult<bool>;
}

/// Project membership lookups
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Role of `user` in `project`, `ProjectRole::None` for non-members
    async fn role_of(&self, user: UserId, project: ProjectId) -> StoreResult<ProjectRole>;

    /// Check if `user` is an instance administrator
    async fn is_admin(&self, user: UserId) -> StoreResult<bool>;
}
