//! Error types shared across issuegate crates
//!
//! - Collaborator failures (store, classifier, challenge verifier, notifier)
//! - Configuration loading errors

use std::path::PathBuf;

/// Failure reported by an external collaborator
///
/// The gate never retries or swallows these; they propagate to the caller
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    /// Persistence layer failed
    #[error("store error: {0}")]
    Store(String),

    /// Spam classifier unavailable or failed
    #[error("spam classifier error: {0}")]
    Classifier(String),

    /// Challenge verification service failed
    #[error("challenge verifier error: {0}")]
    ChallengeVerifier(String),

    /// Notification/cache hook failed
    #[error("notifier error: {0}")]
    Notifier(String),
}

impl CollaboratorError {
    /// Short name of the failing collaborator
    #[inline]
    #[must_use]
    pub fn collaborator(&self) -> &'static str {
        match self {
            Self::Store(_) => "store",
            Self::Classifier(_) => "classifier",
            Self::ChallengeVerifier(_) => "challenge_verifier",
            Self::Notifier(_) => "notifier",
        }
    }
}

/// Errors loading gate configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for the schema
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
