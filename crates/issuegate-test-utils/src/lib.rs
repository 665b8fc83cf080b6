//! Testing utilities for the issuegate workspace
//!
//! Shared fixtures, scripted collaborators and a ready-made test environment.

#![allow(missing_docs)]

use async_trait::async_trait;
use issuegate_core::{
    ClassificationRequest, CollaboratorError, GateConfig, Issue, NewIssue, ProjectId,
    ProjectRole, SpamVerdict, UserId, Viewer,
};
use issuegate_gate::{
    ChallengeVerifier, Collaborators, IssueService, RecordingNotifier, SpamClassifier,
};
use issuegate_store::MemoryStore;
use parking_lot::Mutex;
use std::sync::Arc;

pub const PROJECT: ProjectId = ProjectId(100);
pub const OTHER_PROJECT: ProjectId = ProjectId(200);

pub const OWNER: UserId = UserId(1);
pub const MAINTAINER: UserId = UserId(2);
pub const DEVELOPER: UserId = UserId(3);
pub const MEMBER: UserId = UserId(4);
pub const GUEST: UserId = UserId(5);
pub const AUTHOR: UserId = UserId(6);
pub const ASSIGNEE: UserId = UserId(7);
pub const OUTSIDER: UserId = UserId(8);
pub const ADMIN: UserId = UserId(9);

pub const PASSING_TOKEN: &str = "human";

/// Store with one member per role in [`PROJECT`], plus [`ADMIN`]
///
/// [`AUTHOR`] and [`ASSIGNEE`] are guests, so only their relationship to an
/// issue grants them access to confidential ones.
pub fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.add_member(PROJECT, OWNER, ProjectRole::Owner);
    store.add_member(PROJECT, MAINTAINER, ProjectRole::Maintainer);
    store.add_member(PROJECT, DEVELOPER, ProjectRole::Developer);
    store.add_member(PROJECT, MEMBER, ProjectRole::Member);
    store.add_member(PROJECT, GUEST, ProjectRole::Guest);
    store.add_member(PROJECT, AUTHOR, ProjectRole::Guest);
    store.add_member(PROJECT, ASSIGNEE, ProjectRole::Guest);
    store.add_admin(ADMIN);
    store
}

pub fn public_issue(title: &str) -> Issue {
    Issue::from_new(
        NewIssue::new(PROJECT, title).with_assignee(ASSIGNEE),
        AUTHOR,
    )
}

pub fn confidential_issue(title: &str) -> Issue {
    Issue::from_new(
        NewIssue::new(PROJECT, title)
            .confidential()
            .with_assignee(ASSIGNEE),
        AUTHOR,
    )
}

/// Every user the fixtures know about, with the viewer they resolve to
pub fn all_viewers() -> Vec<Viewer> {
    vec![
        Viewer::anonymous(),
        Viewer::member(OWNER, ProjectRole::Owner),
        Viewer::member(MAINTAINER, ProjectRole::Maintainer),
        Viewer::member(DEVELOPER, ProjectRole::Developer),
        Viewer::member(MEMBER, ProjectRole::Member),
        Viewer::member(GUEST, ProjectRole::Guest),
        Viewer::member(AUTHOR, ProjectRole::Guest),
        Viewer::member(ASSIGNEE, ProjectRole::Guest),
        Viewer::outsider(OUTSIDER),
        Viewer::admin(ADMIN),
    ]
}

/// Classifier returning a scripted verdict and recording every request
#[derive(Debug)]
pub struct ScriptedClassifier {
    verdict: Mutex<Result<SpamVerdict, CollaboratorError>>,
    requests: Mutex<Vec<ClassificationRequest>>,
}

impl ScriptedClassifier {
    pub fn always(verdict: SpamVerdict) -> Self {
        Self {
            verdict: Mutex::new(Ok(verdict)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn ham() -> Self {
        Self::always(SpamVerdict::ham())
    }

    pub fn spam() -> Self {
        Self::always(SpamVerdict::spam())
    }

    pub fn failing(message: &str) -> Self {
        Self {
            verdict: Mutex::new(Err(CollaboratorError::Classifier(message.to_string()))),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_verdict(&self, verdict: SpamVerdict) {
        *self.verdict.lock() = Ok(verdict);
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<ClassificationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl SpamClassifier for ScriptedClassifier {
    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<SpamVerdict, CollaboratorError> {
        self.requests.lock().push(request.clone());
        self.verdict.lock().clone()
    }
}

/// Verifier accepting [`PASSING_TOKEN`] and recording every token it sees
#[derive(Debug, Default)]
pub struct ScriptedVerifier {
    failure: Option<CollaboratorError>,
    tokens: Mutex<Vec<String>>,
}

impl ScriptedVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(CollaboratorError::ChallengeVerifier(message.to_string())),
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.tokens.lock().len()
    }
}

#[async_trait]
impl ChallengeVerifier for ScriptedVerifier {
    async fn verify(&self, response_token: &str) -> Result<bool, CollaboratorError> {
        self.tokens.lock().push(response_token.to_string());
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(response_token == PASSING_TOKEN),
        }
    }
}

/// Service wired to a seeded store and scripted collaborators
pub struct TestEnv {
    pub store: Arc<MemoryStore>,
    pub classifier: Arc<ScriptedClassifier>,
    pub verifier: Arc<ScriptedVerifier>,
    pub notifier: Arc<RecordingNotifier>,
    pub service: IssueService,
}

impl TestEnv {
    /// Spam checking and challenges enabled, classifier says ham
    pub fn new() -> Self {
        Self::with(
            GateConfig::new().with_spam_check(true).with_recaptcha(true),
            ScriptedClassifier::ham(),
            ScriptedVerifier::new(),
        )
    }

    pub fn with(
        config: GateConfig,
        classifier: ScriptedClassifier,
        verifier: ScriptedVerifier,
    ) -> Self {
        let store = seeded_store();
        let classifier = Arc::new(classifier);
        let verifier = Arc::new(verifier);
        let notifier = Arc::new(RecordingNotifier::new());
        let collaborators =
            Collaborators::with_store(store.clone(), classifier.clone(), verifier.clone())
                .with_notifier(notifier.clone());
        Self {
            service: IssueService::new(&config, collaborators),
            store,
            classifier,
            verifier,
            notifier,
        }
    }

    /// Store `issue` directly and return it
    pub fn seed(&self, issue: Issue) -> Issue {
        self.store.seed_issue(issue.clone());
        issue
    }

    /// Resolve `user` in [`PROJECT`]
    ///
    /// # Panics
    /// If the store is unavailable
    pub async fn viewer(&self, user: UserId) -> Viewer {
        self.service
            .resolve_viewer(Some(user), PROJECT)
            .await
            .expect("membership lookup")
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
