//! issuegate Gate
//!
//! Confidentiality and spam gated issue mutations:
//! - [`MutationGate`]: applies, challenges or rejects proposed creates/updates
//! - [`IssueService`]: list/show/edit/create/update/delete scoped to a project
//! - Collaborator traits for the spam classifier, challenge verifier and
//!   notifier, with offline implementations
//! - Outcome to status mapping
//! - Scenario replay used by the `issuegate` CLI
//!
//! # Example
//!
//! ```rust,ignore
//! use issuegate_gate::prelude::*;
//!
//! let service = IssueService::new(&config, collaborators);
//! let viewer = service.resolve_viewer(Some(UserId(7)), project).await?;
//! let outcome = service
//!     .create(&viewer, &new_issue, &ChallengeContext::none(), &metadata)
//!     .await?;
//! println!("{}", outcome.status());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod collaborators;
pub mod error;
pub mod gate;
pub mod outcome;
pub mod scenario;
pub mod service;

pub use collaborators::{
    ChallengeVerifier, IssueEvent, KeywordClassifier, NoopNotifier, Notifier, RecordingNotifier,
    SpamClassifier, StaticChallengeVerifier,
};
pub use error::{GateError, GateResult};
pub use gate::{MutationGate, MutationTarget};
pub use outcome::{
    AccessOutcome, DeleteOutcome, MutationOutcome, StatusCategory, SPAM_REJECTION_MESSAGE,
};
pub use scenario::{ReplayError, Scenario, ScenarioReport, ScenarioRunner, Step, StepReport};
pub use service::{Collaborators, IssueService};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving the gate
    pub use crate::{
        AccessOutcome, Collaborators, DeleteOutcome, GateError, GateResult, IssueService,
        MutationOutcome, StatusCategory,
    };
    pub use issuegate_core::prelude::*;
}
