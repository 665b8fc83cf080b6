//! Structural validation of proposed issue fields
//!
//! Runs before any spam classification. A submission that fails here never
//! reaches the classifier and never produces a spam log.

use crate::config::ValidationLimits;
use crate::types::{Issue, IssueChanges, NewIssue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Field-level validation messages, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors {
    errors: IndexMap<String, Vec<String>>,
}

impl FieldErrors {
    /// Create empty error set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for `field`
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Check if no errors were recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Messages recorded for `field`
    #[must_use]
    pub fn get(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    /// Fields with at least one message
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    /// Human readable messages, e.g. `"title can't be blank"`
    #[must_use]
    pub fn full_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .flat_map(|(field, messages)| messages.iter().map(move |m| format!("{field} {m}")))
            .collect()
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full_messages().join(", "))
    }
}

/// The text fields a mutation would leave on the issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueFields<'a> {
    /// Resulting title
    pub title: &'a str,
    /// Resulting description
    pub description: &'a str,
}

impl<'a> IssueFields<'a> {
    /// Fields of a new issue
    #[inline]
    #[must_use]
    pub fn of_new(new: &'a NewIssue) -> Self {
        Self {
            title: &new.title,
            description: &new.description,
        }
    }

    /// Fields `changes` would leave on `issue`
    #[inline]
    #[must_use]
    pub fn of_update(issue: &'a Issue, changes: &'a IssueChanges) -> Self {
        Self {
            title: changes.title.as_deref().unwrap_or(&issue.title),
            description: changes.description.as_deref().unwrap_or(&issue.description),
        }
    }
}

/// Validator for issue text fields
#[derive(Debug, Clone, Copy, Default)]
pub struct IssueValidator {
    limits: ValidationLimits,
}

impl IssueValidator {
    /// Create validator with limits
    #[inline]
    #[must_use]
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    /// Validate resulting fields
    ///
    /// # Errors
    /// Returns every violated constraint, grouped by field
    pub fn validate(&self, fields: IssueFields<'_>) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        if fields.title.trim().is_empty() {
            errors.add("title", "can't be blank");
        }
        if fields.title.chars().count() > self.limits.max_title_length {
            errors.add(
                "title",
                format!(
                    "is too long (maximum is {} characters)",
                    self.limits.max_title_length
                ),
            );
        }
        if fields.description.chars().count() > self.limits.max_description_length {
            errors.add(
                "description",
                format!(
                    "is too long (maximum is {} characters)",
                    self.limits.max_description_length
                ),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
