//! Scenario replay
//!
//! A scenario is a JSON document describing one project (memberships,
//! administrators, seeded issues) and a sequence of requests against it. The
//! runner replays the requests through [`IssueService`] backed by the
//! in-memory store and the offline collaborators, and reports the outcome of
//! each step.
//!
//! ```json
//! {
//!   "project": 1,
//!   "memberships": [{ "user": 2, "role": "developer" }],
//!   "issues": [{ "label": "secret", "title": "Leak", "confidential": true, "author": 3 }],
//!   "steps": [
//!     { "op": "show", "user": 4, "issue": "secret" },
//!     { "op": "create", "user": 4, "title": "Casino" },
//!     { "op": "create", "user": 4, "title": "Casino",
//!       "challenge": { "last_spam_log": true, "response_token": "pass" } }
//!   ]
//! }
//! ```

use crate::collaborators::{
    IssueEvent, KeywordClassifier, RecordingNotifier, StaticChallengeVerifier,
};
use crate::error::GateError;
use crate::outcome::{AccessOutcome, DeleteOutcome, MutationOutcome, StatusCategory};
use crate::service::{Collaborators, IssueService};
use issuegate_core::{
    ChallengeContext, FieldErrors, GateConfig, Issue, IssueChanges, IssueId, NewIssue, ProjectId,
    ProjectRole, RequestMetadata, SpamLogId, UserId,
};
use issuegate_store::MemoryStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Errors replaying a scenario
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// Scenario file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        /// Scenario path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Scenario text is not valid
    #[error("invalid scenario: {0}")]
    Parse(#[from] serde_json::Error),

    /// A step references an issue label that was never defined
    #[error("step {step}: unknown issue label '{label}'")]
    UnknownLabel {
        /// 1-based step number
        step: usize,
        /// The label
        label: String,
    },

    /// A collaborator failed
    #[error(transparent)]
    Gate(#[from] GateError),
}

/// Project membership entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEntry {
    /// Member
    pub user: UserId,
    /// Role in the scenario project
    pub role: ProjectRole,
}

/// Issue present before the first step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedIssue {
    /// Name steps use to reference the issue
    pub label: String,
    /// Title
    pub title: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Confidential flag
    #[serde(default)]
    pub confidential: bool,
    /// Author
    pub author: UserId,
    /// Assignee
    #[serde(default)]
    pub assignee: Option<UserId>,
}

/// Challenge answer attached to a create or update step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRef {
    /// Reference the spam log created by the most recent rejection
    #[serde(default)]
    pub last_spam_log: bool,
    /// Reference an explicit spam log
    #[serde(default)]
    pub spam_log_id: Option<SpamLogId>,
    /// Challenge response token
    #[serde(default)]
    pub response_token: Option<String>,
}

/// One request in a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// List the project's issues
    List {
        /// Requester, absent for anonymous
        #[serde(default)]
        user: Option<UserId>,
    },
    /// Show one issue
    Show {
        /// Requester
        #[serde(default)]
        user: Option<UserId>,
        /// Issue label
        issue: String,
    },
    /// Open the edit form of one issue
    Edit {
        /// Requester
        #[serde(default)]
        user: Option<UserId>,
        /// Issue label
        issue: String,
    },
    /// Create an issue
    Create {
        /// Requester
        #[serde(default)]
        user: Option<UserId>,
        /// Label to register the created issue under
        #[serde(default)]
        label: Option<String>,
        /// Title
        title: String,
        /// Description
        #[serde(default)]
        description: String,
        /// Confidential flag
        #[serde(default)]
        confidential: bool,
        /// Assignee
        #[serde(default)]
        assignee: Option<UserId>,
        /// Challenge answer
        #[serde(default)]
        challenge: Option<ChallengeRef>,
        /// Request metadata
        #[serde(default)]
        metadata: RequestMetadata,
    },
    /// Update an issue
    Update {
        /// Requester
        #[serde(default)]
        user: Option<UserId>,
        /// Issue label
        issue: String,
        /// Proposed changes
        changes: IssueChanges,
        /// Challenge answer
        #[serde(default)]
        challenge: Option<ChallengeRef>,
        /// Request metadata
        #[serde(default)]
        metadata: RequestMetadata,
    },
    /// Delete an issue
    Delete {
        /// Requester
        #[serde(default)]
        user: Option<UserId>,
        /// Issue label
        issue: String,
    },
}

impl Step {
    /// Operation name
    #[must_use]
    pub fn op(&self) -> &'static str {
        match self {
            Step::List { .. } => "list",
            Step::Show { .. } => "show",
            Step::Edit { .. } => "edit",
            Step::Create { .. } => "create",
            Step::Update { .. } => "update",
            Step::Delete { .. } => "delete",
        }
    }

    /// Requester of the step
    #[must_use]
    pub fn user(&self) -> Option<UserId> {
        match self {
            Step::List { user }
            | Step::Show { user, .. }
            | Step::Edit { user, .. }
            | Step::Create { user, .. }
            | Step::Update { user, .. }
            | Step::Delete { user, .. } => *user,
        }
    }
}

/// A replayable scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// The project every step targets
    pub project: ProjectId,
    /// Project memberships
    #[serde(default)]
    pub memberships: Vec<MemberEntry>,
    /// Instance administrators
    #[serde(default)]
    pub admins: Vec<UserId>,
    /// Seeded issues
    #[serde(default)]
    pub issues: Vec<SeedIssue>,
    /// Requests to replay
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Parse a scenario from JSON text
    ///
    /// # Errors
    /// `ReplayError::Parse` if the text does not match the scenario format
    pub fn from_json_str(text: &str) -> Result<Self, ReplayError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a scenario from a JSON file
    ///
    /// # Errors
    /// `ReplayError::Io` or `ReplayError::Parse`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}

/// Outcome of one replayed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    /// 1-based step number
    pub step: usize,
    /// Operation name
    pub op: String,
    /// Requester
    pub user: Option<UserId>,
    /// Outcome name
    pub outcome: String,
    /// Status category
    pub status: StatusCategory,
    /// Numeric HTTP status
    pub http_status: u16,
    /// Issue created, changed or shown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<IssueId>,
    /// Spam log created by a rejection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spam_log_id: Option<SpamLogId>,
    /// Titles returned by a list step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listed: Option<Vec<String>>,
    /// Validation errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

impl StepReport {
    fn new(step: usize, source: &Step, outcome: &str, status: StatusCategory) -> Self {
        Self {
            step,
            op: source.op().to_string(),
            user: source.user(),
            outcome: outcome.to_string(),
            status,
            http_status: status.http_status(),
            issue: None,
            spam_log_id: None,
            listed: None,
            errors: None,
        }
    }
}

impl std::fmt::Display for StepReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let user = self
            .user
            .map_or_else(|| "anonymous".to_string(), |u| format!("user {u}"));
        write!(
            f,
            "#{} {} by {}: {} ({})",
            self.step, self.op, user, self.status, self.outcome
        )?;
        if let Some(issue) = self.issue {
            write!(f, " issue={issue}")?;
        }
        if let Some(spam_log_id) = self.spam_log_id {
            write!(f, " spam_log={spam_log_id}")?;
        }
        if let Some(listed) = &self.listed {
            write!(f, " [{}]", listed.join(", "))?;
        }
        if let Some(errors) = &self.errors {
            write!(f, " errors: {errors}")?;
        }
        Ok(())
    }
}

/// Result of a full replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Per-step outcomes
    pub steps: Vec<StepReport>,
    /// Issues stored at the end
    pub issue_count: usize,
    /// Spam logs stored at the end, oldest first
    pub spam_logs: Vec<SpamLogSummary>,
    /// Notifications emitted
    pub events: Vec<IssueEvent>,
}

/// Spam log as shown in a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpamLogSummary {
    /// Spam log ID
    pub id: SpamLogId,
    /// Owner
    pub user: UserId,
    /// Submitted title
    pub title: String,
    /// Verified flag
    pub recaptcha_verified: bool,
}

/// Replays scenarios against in-memory collaborators
pub struct ScenarioRunner {
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
    service: IssueService,
    labels: HashMap<String, IssueId>,
    last_spam_log: Option<SpamLogId>,
}

impl std::fmt::Debug for ScenarioRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioRunner")
            .field("labels", &self.labels)
            .field("last_spam_log", &self.last_spam_log)
            .finish_non_exhaustive()
    }
}

impl ScenarioRunner {
    /// Create runner with the offline collaborators described by `config`
    #[must_use]
    pub fn new(config: &GateConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let collaborators = Collaborators::with_store(
            store.clone(),
            Arc::new(KeywordClassifier::from_config(&config.offline)),
            Arc::new(StaticChallengeVerifier::from_config(&config.offline)),
        )
        .with_notifier(notifier.clone());
        Self {
            store,
            notifier,
            service: IssueService::new(config, collaborators),
            labels: HashMap::new(),
            last_spam_log: None,
        }
    }

    /// The backing store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Replay every step of `scenario`
    ///
    /// Consumes the runner so each replay starts from an empty store.
    ///
    /// # Errors
    /// - `ReplayError::UnknownLabel` if a step references an undefined issue
    /// - `ReplayError::Gate` if a collaborator fails
    pub async fn run(mut self, scenario: &Scenario) -> Result<ScenarioReport, ReplayError> {
        let project = scenario.project;
        for member in &scenario.memberships {
            self.store.add_member(project, member.user, member.role);
        }
        for admin in &scenario.admins {
            self.store.add_admin(*admin);
        }
        for seed in &scenario.issues {
            let issue = Issue::from_new(
                NewIssue {
                    project,
                    title: seed.title.clone(),
                    description: seed.description.clone(),
                    confidential: seed.confidential,
                    assignee: seed.assignee,
                },
                seed.author,
            );
            self.labels.insert(seed.label.clone(), issue.id);
            self.store.seed_issue(issue);
        }
        tracing::info!(
            %project,
            seeded = scenario.issues.len(),
            steps = scenario.steps.len(),
            "replaying scenario"
        );

        let mut steps = Vec::with_capacity(scenario.steps.len());
        for (index, step) in scenario.steps.iter().enumerate() {
            let report = self.run_step(index + 1, project, step).await?;
            tracing::debug!(step = report.step, outcome = %report.outcome, "step replayed");
            steps.push(report);
        }

        Ok(ScenarioReport {
            steps,
            issue_count: self.store.issue_count(),
            spam_logs: self
                .store
                .spam_logs()
                .into_iter()
                .map(|log| SpamLogSummary {
                    id: log.id,
                    user: log.user,
                    title: log.title,
                    recaptcha_verified: log.recaptcha_verified,
                })
                .collect(),
            events: self.notifier.take(),
        })
    }

    async fn run_step(
        &mut self,
        number: usize,
        project: ProjectId,
        step: &Step,
    ) -> Result<StepReport, ReplayError> {
        let viewer = self.service.resolve_viewer(step.user(), project).await?;

        let report = match step {
            Step::List { .. } => {
                let issues = self.service.list(&viewer, project).await?;
                let mut report = StepReport::new(number, step, "listed", StatusCategory::Ok);
                report.listed = Some(issues.into_iter().map(|i| i.title).collect());
                report
            }
            Step::Show { issue, .. } | Step::Edit { issue, .. } => {
                let id = self.label(number, issue)?;
                let outcome = if matches!(step, Step::Show { .. }) {
                    self.service.show(&viewer, project, id).await?
                } else {
                    self.service.edit(&viewer, project, id).await?
                };
                let kind = match outcome {
                    AccessOutcome::Found { .. } => "found",
                    AccessOutcome::NotFound => "not_found",
                };
                let mut report = StepReport::new(number, step, kind, outcome.status());
                report.issue = outcome.issue().map(|i| i.id);
                report
            }
            Step::Create {
                label,
                title,
                description,
                confidential,
                assignee,
                challenge,
                metadata,
                ..
            } => {
                let new = NewIssue {
                    project,
                    title: title.clone(),
                    description: description.clone(),
                    confidential: *confidential,
                    assignee: *assignee,
                };
                let challenge = self.challenge(challenge.as_ref());
                let outcome = self
                    .service
                    .create(&viewer, &new, &challenge, metadata)
                    .await?;
                if let (Some(label), Some(issue)) = (label, outcome.issue()) {
                    self.labels.insert(label.clone(), issue.id);
                }
                self.mutation_report(number, step, outcome)
            }
            Step::Update {
                issue,
                changes,
                challenge,
                metadata,
                ..
            } => {
                let id = self.label(number, issue)?;
                let challenge = self.challenge(challenge.as_ref());
                let outcome = self
                    .service
                    .update(&viewer, project, id, changes, &challenge, metadata)
                    .await?;
                self.mutation_report(number, step, outcome)
            }
            Step::Delete { issue, .. } => {
                let id = self.label(number, issue)?;
                let outcome = self.service.delete(&viewer, project, id).await?;
                let kind = match outcome {
                    DeleteOutcome::Deleted => "deleted",
                    DeleteOutcome::NotFound => "not_found",
                };
                let mut report = StepReport::new(number, step, kind, outcome.status());
                if outcome == DeleteOutcome::Deleted {
                    report.issue = Some(id);
                }
                report
            }
        };
        Ok(report)
    }

    fn mutation_report(&mut self, number: usize, step: &Step, outcome: MutationOutcome) -> StepReport {
        let mut report = StepReport::new(number, step, outcome.kind(), outcome.status());
        report.issue = outcome.issue().map(|i| i.id);
        report.spam_log_id = outcome.spam_log_id();
        if let Some(id) = report.spam_log_id {
            self.last_spam_log = Some(id);
        }
        if let MutationOutcome::ValidationFailed { errors } = outcome {
            report.errors = Some(errors);
        }
        report
    }

    fn challenge(&self, challenge: Option<&ChallengeRef>) -> ChallengeContext {
        let Some(challenge) = challenge else {
            return ChallengeContext::none();
        };
        let spam_log_id = challenge.spam_log_id.or(if challenge.last_spam_log {
            self.last_spam_log
        } else {
            None
        });
        ChallengeContext {
            spam_log_id,
            response_token: challenge.response_token.clone(),
        }
    }

    fn label(&self, step: usize, label: &str) -> Result<IssueId, ReplayError> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| ReplayError::UnknownLabel {
                step,
                label: label.to_string(),
            })
    }
}
