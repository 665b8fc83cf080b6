//! issuegate Core
//!
//! Domain model and access rules shared by the issue gate:
//! - Issue, spam log and request metadata types
//! - Viewer roles resolved once per request
//! - The confidential issue visibility filter
//! - Structural validation of proposed issue fields
//! - Gate configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use issuegate_core::prelude::*;
//!
//! let viewer = Viewer::member(UserId(7), ProjectRole::Developer);
//! if VisibilityFilter::is_visible(&viewer, &issue) {
//!     println!("{}", issue.title);
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod role;
pub mod types;
pub mod validation;
pub mod visibility;

pub use config::{AntiAbuseSettings, GateConfig, OfflineCollaborators, ValidationLimits};
pub use error::{CollaboratorError, ConfigError};
pub use role::{ProjectRole, UnknownRole, Viewer};
pub use types::{
    ChallengeContext, ClassificationRequest, Issue, IssueChanges, IssueId, NewIssue, ProjectId,
    RequestMetadata, SpamLog, SpamLogId, SpamVerdict, UserId,
};
pub use validation::{FieldErrors, IssueFields, IssueValidator};
pub use visibility::{Visibility, VisibilityFilter};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with issuegate core types
    pub use crate::{
        ChallengeContext, GateConfig, Issue, IssueChanges, IssueId, NewIssue, ProjectId,
        ProjectRole, RequestMetadata, SpamLog, SpamLogId, UserId, Viewer, VisibilityFilter,
    };
}
