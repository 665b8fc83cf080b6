//! Gate configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! [anti_abuse]
//! spam_check_enabled = true
//! recaptcha_enabled = true
//!
//! [limits]
//! max_title_length = 255
//!
//! [offline]
//! spam_terms = ["casino", "cheap pills"]
//! challenge_token = "local-pass"
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// System-wide anti-abuse switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiAbuseSettings {
    /// Run the spam classifier on mutations
    pub spam_check_enabled: bool,
    /// Offer and honour human challenges for flagged mutations
    pub recaptcha_enabled: bool,
}

impl AntiAbuseSettings {
    /// Both switches on
    #[inline]
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            spam_check_enabled: true,
            recaptcha_enabled: true,
        }
    }
}

/// Structural limits on issue fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationLimits {
    /// Maximum title length in characters
    pub max_title_length: usize,
    /// Maximum description length in characters
    pub max_description_length: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_title_length: 255,
            max_description_length: 1_048_576,
        }
    }
}

/// Settings for the bundled offline classifier and challenge verifier
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineCollaborators {
    /// Terms that mark a submission as spam (case-insensitive)
    pub spam_terms: Vec<String>,
    /// The one challenge response token accepted as a pass
    pub challenge_token: Option<String>,
}

/// issuegate configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Anti-abuse switches
    pub anti_abuse: AntiAbuseSettings,
    /// Field limits
    pub limits: ValidationLimits,
    /// Offline collaborator settings
    pub offline: OfflineCollaborators,
}

impl GateConfig {
    /// Create default configuration (anti-abuse off)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With spam checking switched on or off
    #[inline]
    #[must_use]
    pub fn with_spam_check(mut self, enabled: bool) -> Self {
        self.anti_abuse.spam_check_enabled = enabled;
        self
    }

    /// With human challenges switched on or off
    #[inline]
    #[must_use]
    pub fn with_recaptcha(mut self, enabled: bool) -> Self {
        self.anti_abuse.recaptcha_enabled = enabled;
        self
    }

    /// With field limits
    #[inline]
    #[must_use]
    pub fn with_limits(mut self, limits: ValidationLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// - `ConfigError::Parse` if the text is not valid TOML for this schema
    /// - `ConfigError::Invalid` if a value is out of range
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// - `ConfigError::Io` if the file cannot be read
    /// - any error of [`GateConfig::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io_error(path, e))?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded gate configuration");
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` naming the first bad value
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_title_length == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_title_length must be greater than zero".to_string(),
            ));
        }
        if self
            .offline
            .challenge_token
            .as_deref()
            .is_some_and(|t| t.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "offline.challenge_token must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn defaults_disable_anti_abuse() {
        let config = GateConfig::new();
        assert!(!config.anti_abuse.spam_check_enabled);
        assert!(!config.anti_abuse.recaptcha_enabled);
        assert_eq!(config.limits.max_title_length, 255);
    }

    #[test]
    fn builder_switches() {
        let config = GateConfig::new().with_spam_check(true).with_recaptcha(true);
        assert_eq!(config.anti_abuse, AntiAbuseSettings::enabled());
    }

    #[test]
    fn parses_partial_toml() {
        let config = GateConfig::from_toml_str(
            r#"
            [anti_abuse]
            spam_check_enabled = true

            [offline]
            spam_terms = ["casino"]
            "#,
        )
        .unwrap();

        assert!(config.anti_abuse.spam_check_enabled);
        assert!(!config.anti_abuse.recaptcha_enabled);
        assert_eq!(config.limits, ValidationLimits::default());
        assert_eq!(config.offline.spam_terms, vec!["casino".to_string()]);
    }

    #[test]
    fn rejects_zero_title_limit() {
        let err = GateConfig::from_toml_str("[limits]\nmax_title_length = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = GateConfig::from_toml_str("[anti_abuse\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[anti_abuse]\nrecaptcha_enabled = true").unwrap();

        let config = GateConfig::load(file.path()).unwrap();
        assert!(config.anti_abuse.recaptcha_enabled);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = GateConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
