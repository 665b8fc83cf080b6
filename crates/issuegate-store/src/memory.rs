//! In-memory store
//!
//! Issues and spam logs live in `DashMap` tables. The verified-flag
//! transition runs under the shard write lock of the spam log entry, which
//! makes it a true compare-and-set.

use crate::traits::{IssueStore, MembershipStore, SpamLogStore, StoreResult};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use issuegate_core::{
    CollaboratorError, Issue, IssueId, ProjectId, ProjectRole, SpamLog, SpamLogId, UserId,
};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory implementation of every persistence collaborator
#[derive(Debug, Default)]
pub struct MemoryStore {
    issues: DashMap<IssueId, Issue>,
    spam_logs: DashMap<SpamLogId, SpamLog>,
    memberships: RwLock<HashMap<(ProjectId, UserId), ProjectRole>>,
    admins: RwLock<HashSet<UserId>>,
    /// Simulated outage: every call fails while set
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `user` a role in `project`
    pub fn add_member(&self, project: ProjectId, user: UserId, role: ProjectRole) {
        self.memberships.write().insert((project, user), role);
    }

    /// Make `user` an instance administrator
    pub fn add_admin(&self, user: UserId) {
        self.admins.write().insert(user);
    }

    /// Seed an issue directly, bypassing the gate
    pub fn seed_issue(&self, issue: Issue) {
        self.issues.insert(issue.id, issue);
    }

    /// Simulate an outage of the persistence layer
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored issues
    #[inline]
    #[must_use]
    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    /// Number of stored spam logs
    #[inline]
    #[must_use]
    pub fn spam_log_count(&self) -> usize {
        self.spam_logs.len()
    }

    /// Snapshot of all spam logs, oldest first
    #[must_use]
    pub fn spam_logs(&self) -> Vec<SpamLog> {
        let mut logs: Vec<SpamLog> = self.spam_logs.iter().map(|e| e.value().clone()).collect();
        logs.sort_by_key(|log| log.id);
        logs
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(CollaboratorError::Store("store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl IssueStore for MemoryStore {
    async fn get_issue(&self, id: IssueId) -> StoreResult<Option<Issue>> {
        self.check_available()?;
        Ok(self.issues.get(&id).map(|e| e.value().clone()))
    }

    async fn list_issues(&self, project: ProjectId) -> StoreResult<Vec<Issue>> {
        self.check_available()?;
        let mut issues: Vec<Issue> = self
            .issues
            .iter()
            .filter(|e| e.value().project == project)
            .map(|e| e.value().clone())
            .collect();
        issues.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(issues)
    }

    async fn insert_issue(&self, issue: Issue) -> StoreResult<Issue> {
        self.check_available()?;
        match self.issues.entry(issue.id) {
            Entry::Occupied(_) => Err(CollaboratorError::Store(format!(
                "issue {} already exists",
                issue.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(issue.clone());
                Ok(issue)
            }
        }
    }

    async fn save_issue(&self, issue: Issue) -> StoreResult<Issue> {
        self.check_available()?;
        match self.issues.get_mut(&issue.id) {
            Some(mut current) => {
                *current = issue.clone();
                Ok(issue)
            }
            None => Err(CollaboratorError::Store(format!(
                "issue {} no longer exists",
                issue.id
            ))),
        }
    }

    async fn delete_issue(&self, id: IssueId) -> StoreResult<bool> {
        self.check_available()?;
        Ok(self.issues.remove(&id).is_some())
    }
}

#[async_trait]
impl SpamLogStore for MemoryStore {
    async fn create_spam_log(&self, log: SpamLog) -> StoreResult<SpamLog> {
        self.check_available()?;
        self.spam_logs.insert(log.id, log.clone());
        Ok(log)
    }

    async fn get_spam_log(&self, id: SpamLogId) -> StoreResult<Option<SpamLog>> {
        self.check_available()?;
        Ok(self.spam_logs.get(&id).map(|e| e.value().clone()))
    }

    async fn mark_recaptcha_verified(&self, id: SpamLogId, owner: UserId) -> StoreResult<bool> {
        self.check_available()?;
        let Some(mut log) = self.spam_logs.get_mut(&id) else {
            return Ok(false);
        };
        if !log.is_owned_by(owner) {
            tracing::debug!(spam_log = %id, %owner, "spam log owned by another user");
            return Ok(false);
        }
        if log.recaptcha_verified {
            return Ok(false);
        }
        log.recaptcha_verified = true;
        Ok(true)
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn role_of(&self, user: UserId, project: ProjectId) -> StoreResult<ProjectRole> {
        self.check_available()?;
        Ok(self
            .memberships
            .read()
            .get(&(project, user))
            .copied()
            .unwrap_or_default())
    }

    async fn is_admin(&self, user: UserId) -> StoreResult<bool> {
        self.check_available()?;
        Ok(self.admins.read().contains(&user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use issuegate_core::{ClassificationRequest, NewIssue, RequestMetadata};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn spam_log(owner: UserId) -> SpamLog {
        SpamLog::new(
            ProjectId(1),
            &ClassificationRequest {
                user: owner,
                title: "spam".to_string(),
                description: "spam".to_string(),
                metadata: RequestMetadata::default(),
            },
        )
    }

    fn issue(project: u64, title: &str) -> Issue {
        Issue::from_new(NewIssue::new(ProjectId(project), title), UserId(1))
    }

    #[tokio::test]
    async fn insert_get_save_delete() {
        let store = MemoryStore::new();
        let created = store.insert_issue(issue(1, "first")).await.unwrap();

        let mut loaded = store.get_issue(created.id).await.unwrap().unwrap();
        assert_eq!(loaded, created);

        loaded.title = "renamed".to_string();
        store.save_issue(loaded.clone()).await.unwrap();
        assert_eq!(store.get_issue(created.id).await.unwrap().unwrap().title, "renamed");

        assert!(store.delete_issue(created.id).await.unwrap());
        assert!(!store.delete_issue(created.id).await.unwrap());
        assert!(store.get_issue(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_insert_rejected() {
        let store = MemoryStore::new();
        let issue = issue(1, "dup");
        store.insert_issue(issue.clone()).await.unwrap();
        assert!(store.insert_issue(issue).await.is_err());
    }

    #[tokio::test]
    async fn save_of_deleted_issue_fails() {
        let store = MemoryStore::new();
        let issue = store.insert_issue(issue(1, "gone")).await.unwrap();
        store.delete_issue(issue.id).await.unwrap();
        assert!(matches!(
            store.save_issue(issue).await,
            Err(CollaboratorError::Store(_))
        ));
    }

    #[tokio::test]
    async fn list_is_scoped_to_project() {
        let store = MemoryStore::new();
        let mut later = issue(1, "c");
        later.created_at += chrono::Duration::seconds(10);
        store.insert_issue(later).await.unwrap();
        store.insert_issue(issue(2, "b")).await.unwrap();
        store.insert_issue(issue(1, "a")).await.unwrap();

        let titles: Vec<String> = store
            .list_issues(ProjectId(1))
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.title)
            .collect();
        assert_eq!(titles, vec!["a".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn memberships_default_to_none() {
        let store = MemoryStore::new();
        store.add_member(ProjectId(1), UserId(7), ProjectRole::Developer);
        store.add_admin(UserId(9));

        assert_eq!(store.role_of(UserId(7), ProjectId(1)).await.unwrap(), ProjectRole::Developer);
        assert_eq!(store.role_of(UserId(7), ProjectId(2)).await.unwrap(), ProjectRole::None);
        assert!(store.is_admin(UserId(9)).await.unwrap());
        assert!(!store.is_admin(UserId(7)).await.unwrap());
    }

    #[tokio::test]
    async fn verified_flag_flips_once_for_owner() {
        let store = MemoryStore::new();
        let log = store.create_spam_log(spam_log(UserId(5))).await.unwrap();

        assert!(store.mark_recaptcha_verified(log.id, UserId(5)).await.unwrap());
        assert!(!store.mark_recaptcha_verified(log.id, UserId(5)).await.unwrap());
        assert!(store.get_spam_log(log.id).await.unwrap().unwrap().recaptcha_verified);
    }

    #[tokio::test]
    async fn verified_flag_ignores_other_users() {
        let store = MemoryStore::new();
        let log = store.create_spam_log(spam_log(UserId(5))).await.unwrap();

        assert!(!store.mark_recaptcha_verified(log.id, UserId(6)).await.unwrap());
        assert!(!store.get_spam_log(log.id).await.unwrap().unwrap().recaptcha_verified);
    }

    #[tokio::test]
    async fn verified_flag_missing_log() {
        let store = MemoryStore::new();
        assert!(!store.mark_recaptcha_verified(SpamLogId::new(), UserId(1)).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_verification_flips_exactly_once() {
        let store = Arc::new(MemoryStore::new());
        let id = store.create_spam_log(spam_log(UserId(5))).await.unwrap().id;

        let attempts = (0..32).map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.mark_recaptcha_verified(id, UserId(5)).await })
        });
        let results = futures::future::join_all(attempts).await;

        let flips = results
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .filter(|flipped| *flipped)
            .count();
        assert_eq!(flips, 1);
    }

    #[tokio::test]
    async fn outage_propagates_as_store_error() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let err = store.list_issues(ProjectId(1)).await.unwrap_err();
        assert_eq!(err.collaborator(), "store");

        store.set_unavailable(false);
        assert!(store.list_issues(ProjectId(1)).await.is_ok());
    }

    #[test]
    fn spam_log_snapshot_is_sorted_by_id() {
        let store = MemoryStore::new();
        let first = spam_log(UserId(1));
        let second = spam_log(UserId(2));
        store.spam_logs.insert(second.id, second.clone());
        store.spam_logs.insert(first.id, first.clone());

        assert_eq!(store.spam_log_count(), 2);
        let snapshot = store.spam_logs();
        assert!(snapshot.contains(&first) && snapshot.contains(&second));
        assert!(snapshot[0].id < snapshot[1].id);
    }
}
