//! Error types for the gate
//!
//! Decision outcomes (not-found, validation, spam) are values, not errors.
//! Only collaborator failures travel on the error path, and they travel
//! unchanged.

use issuegate_core::{CollaboratorError, ConfigError};

/// Gate error type
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// A collaborator failed; not retried
    #[error("collaborator failure: {0}")]
    Collaborator(#[from] CollaboratorError),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl GateError {
    /// The collaborator error, if that is what failed
    #[inline]
    #[must_use]
    pub fn collaborator(&self) -> Option<&CollaboratorError> {
        match self {
            Self::Collaborator(e) => Some(e),
            Self::Config(_) => None,
        }
    }
}

/// Result alias for gate operations
pub type GateResult<T> = Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_error_passes_through() {
        let err: GateError = CollaboratorError::Classifier("down".to_string()).into();
        assert_eq!(
            err.collaborator(),
            Some(&CollaboratorError::Classifier("down".to_string()))
        );
        assert!(err.to_string().contains("spam classifier error: down"));
    }

    #[test]
    fn config_error_conversion() {
        let err: GateError = ConfigError::Invalid("bad".to_string()).into();
        assert!(matches!(err, GateError::Config(_)));
        assert!(err.collaborator().is_none());
    }
}
