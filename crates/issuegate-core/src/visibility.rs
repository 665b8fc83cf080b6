//! Confidential issue visibility filter
//!
//! Decides whether a viewer may see an issue, and layers the mutation
//! permissions on top of that. Callers surface every denial as not-found so
//! the existence of a confidential issue never leaks.

use crate::role::{ProjectRole, Viewer};
use crate::types::Issue;
use serde::{Deserialize, Serialize};

/// Why an issue is visible to a viewer, or that it is not
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Issue is not confidential
    Public,
    /// Viewer authored the confidential issue
    Author,
    /// Viewer is assigned to the confidential issue
    Assignee,
    /// Viewer is developer or above, or an administrator
    Elevated,
    /// Viewer may not see the issue
    Hidden,
}

impl Visibility {
    /// Check if the issue may be shown
    #[inline]
    #[must_use]
    pub fn is_visible(&self) -> bool {
        !matches!(self, Visibility::Hidden)
    }
}

/// Visibility and permission rules for issues
#[derive(Debug, Clone, Copy, Default)]
pub struct VisibilityFilter;

impl VisibilityFilter {
    /// Classify the viewer's access to `issue`
    ///
    /// Rules, first match wins:
    /// 1. non-confidential issues are public
    /// 2. anonymous viewers see nothing confidential
    /// 3. the author sees it
    /// 4. the assignee sees it
    /// 5. developer+ and administrators see it
    /// 6. everyone else (guest, plain member, outsider) does not
    #[must_use]
    pub fn visibility(viewer: &Viewer, issue: &Issue) -> Visibility {
        if !issue.confidential {
            return Visibility::Public;
        }
        let Some(user) = viewer.user else {
            return Visibility::Hidden;
        };
        if issue.is_authored_by(user) {
            Visibility::Author
        } else if issue.is_assigned_to(user) {
            Visibility::Assignee
        } else if viewer.has_elevated_access() {
            Visibility::Elevated
        } else {
            Visibility::Hidden
        }
    }

    /// Check whether `viewer` may see `issue`
    #[inline]
    #[must_use]
    pub fn is_visible(viewer: &Viewer, issue: &Issue) -> bool {
        Self::visibility(viewer, issue).is_visible()
    }

    /// Keep only the issues `viewer` may see, preserving order
    #[must_use]
    pub fn filter_visible<I>(viewer: &Viewer, issues: I) -> Vec<Issue>
    where
        I: IntoIterator<Item = Issue>,
    {
        issues
            .into_iter()
            .filter(|issue| Self::is_visible(viewer, issue))
            .collect()
    }

    /// Check whether `viewer` may open new issues
    ///
    /// A spam log needs an owner, so anonymous submissions are refused.
    #[inline]
    #[must_use]
    pub fn can_create(viewer: &Viewer) -> bool {
        viewer.is_authenticated()
    }

    /// Check whether `viewer` may edit `issue`
    #[must_use]
    pub fn can_update(viewer: &Viewer, issue: &Issue) -> bool {
        let Some(user) = viewer.user else {
            return false;
        };
        if !Self::is_visible(viewer, issue) {
            return false;
        }
        viewer.admin
            || viewer.role >= ProjectRole::Member
            || issue.is_authored_by(user)
            || issue.is_assigned_to(user)
    }

    /// Check whether `viewer` may delete `issue`
    #[must_use]
    pub fn can_delete(viewer: &Viewer, issue: &Issue) -> bool {
        Self::is_visible(viewer, issue)
            && viewer.is_authenticated()
            && (viewer.admin || viewer.role == ProjectRole::Owner)
    }
}
