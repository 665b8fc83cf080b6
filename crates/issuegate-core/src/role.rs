//! Viewer roles
//!
//! A [`Viewer`] is resolved once per request from the membership collaborator
//! and passed by reference into the visibility filter and the mutation gate.

use crate::types::UserId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Role of a user within one project
///
/// Variants are ordered by privilege, so `role >= ProjectRole::Developer`
/// reads as "developer or above".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    /// Not a member of the project
    #[default]
    None,
    /// Guest member
    Guest,
    /// Plain member without elevated rights
    Member,
    /// Developer
    Developer,
    /// Maintainer
    Maintainer,
    /// Project owner
    Owner,
}

impl ProjectRole {
    /// Numeric access level
    #[inline]
    #[must_use]
    pub fn access_level(&self) -> u8 {
        match self {
            ProjectRole::None => 0,
            ProjectRole::Guest => 10,
            ProjectRole::Member => 20,
            ProjectRole::Developer => 30,
            ProjectRole::Maintainer => 40,
            ProjectRole::Owner => 50,
        }
    }

    /// Check if this role may read confidential issues it is not part of
    #[inline]
    #[must_use]
    pub fn sees_confidential(&self) -> bool {
        *self >= ProjectRole::Developer
    }

    /// Lowercase role name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectRole::None => "none",
            ProjectRole::Guest => "guest",
            ProjectRole::Member => "member",
            ProjectRole::Developer => "developer",
            ProjectRole::Maintainer => "maintainer",
            ProjectRole::Owner => "owner",
        }
    }

    /// All roles from least to most privileged
    #[must_use]
    pub fn all() -> [ProjectRole; 6] {
        [
            ProjectRole::None,
            ProjectRole::Guest,
            ProjectRole::Member,
            ProjectRole::Developer,
            ProjectRole::Maintainer,
            ProjectRole::Owner,
        ]
    }
}

impl std::fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a role name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown project role: '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for ProjectRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(ProjectRole::None),
            "guest" => Ok(ProjectRole::Guest),
            "member" | "reporter" => Ok(ProjectRole::Member),
            "developer" => Ok(ProjectRole::Developer),
            "maintainer" => Ok(ProjectRole::Maintainer),
            "owner" => Ok(ProjectRole::Owner),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// The requester of one operation, with its role in the target project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Viewer {
    /// Authenticated user, `None` when anonymous
    #[serde(default)]
    pub user: Option<UserId>,
    /// Role in the target project
    #[serde(default)]
    pub role: ProjectRole,
    /// Instance administrator
    #[serde(default)]
    pub admin: bool,
}

impl Viewer {
    /// Unauthenticated viewer
    #[inline]
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Authenticated user with the given project role
    #[inline]
    #[must_use]
    pub fn member(user: UserId, role: ProjectRole) -> Self {
        Self {
            user: Some(user),
            role,
            admin: false,
        }
    }

    /// Authenticated user outside the project
    #[inline]
    #[must_use]
    pub fn outsider(user: UserId) -> Self {
        Self::member(user, ProjectRole::None)
    }

    /// Instance administrator without project membership
    #[inline]
    #[must_use]
    pub fn admin(user: UserId) -> Self {
        Self {
            user: Some(user),
            role: ProjectRole::None,
            admin: true,
        }
    }

    /// Check if the viewer is signed in
    #[inline]
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Check if the viewer is `user`
    #[inline]
    #[must_use]
    pub fn is(&self, user: UserId) -> bool {
        self.user == Some(user)
    }

    /// Developer or above in the project, or instance administrator
    #[inline]
    #[must_use]
    pub fn has_elevated_access(&self) -> bool {
        self.admin || self.role.sees_confidential()
    }
}

impl std::fmt::Display for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.user {
            None => f.write_str("anonymous"),
            Some(user) if self.admin => write!(f, "user {user} (admin)"),
            Some(user) => write!(f, "user {user} ({})", self.role),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_ordered_by_privilege() {
        let all = ProjectRole::all();
        for pair in all.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].access_level() < pair[1].access_level());
        }
    }

    #[test]
    fn only_developer_and_above_see_confidential() {
        assert!(!ProjectRole::None.sees_confidential());
        assert!(!ProjectRole::Guest.sees_confidential());
        assert!(!ProjectRole::Member.sees_confidential());
        assert!(ProjectRole::Developer.sees_confidential());
        assert!(ProjectRole::Maintainer.sees_confidential());
        assert!(ProjectRole::Owner.sees_confidential());
    }

    #[test]
    fn role_parse_roundtrip() {
        for role in ProjectRole::all() {
            assert_eq!(role.as_str().parse::<ProjectRole>().unwrap(), role);
        }
        assert_eq!("Reporter".parse::<ProjectRole>().unwrap(), ProjectRole::Member);
        assert!("janitor".parse::<ProjectRole>().is_err());
    }

    #[test]
    fn viewer_constructors() {
        let anon = Viewer::anonymous();
        assert!(!anon.is_authenticated());
        assert!(!anon.has_elevated_access());

        let admin = Viewer::admin(UserId(1));
        assert!(admin.is(UserId(1)));
        assert!(admin.has_elevated_access());

        let guest = Viewer::member(UserId(2), ProjectRole::Guest);
        assert!(!guest.has_elevated_access());
        assert_eq!(guest.to_string(), "user 2 (guest)");
    }
}
