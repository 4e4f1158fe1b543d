// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use super::{KeyId, Scopes};

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserState {
    #[default]
    Active,
    Blocked,
}

/// A user account
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub state: UserState,
    #[serde(default)]
    pub two_factor_enabled: bool,
    #[serde(default)]
    pub admin: bool,
}

impl User {
    pub fn is_blocked(&self) -> bool {
        self.state == UserState::Blocked
    }
}

/// A project-scoped deploy token
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DeployToken {
    pub id: u64,
    pub username: String,
    pub project_id: u64,
    pub scopes: Scopes,
    #[serde(default)]
    pub revoked: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl DeployToken {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at.map_or(true, |at| at > now)
    }
}

/// A personal SSH key owned by a user
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SshKey {
    pub id: KeyId,
    pub user: User,
}

/// An SSH deploy key, granted per project outside of this type
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DeployKey {
    pub id: KeyId,
    pub title: String,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
}

/// A CI job, authenticated by its short-lived job token
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CiJob {
    pub id: u64,
    pub project_id: u64,
    pub user: User,
    pub status: JobStatus,
}

impl CiJob {
    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }
}

/// The principal performing a Git or API operation
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    User(User),
    DeployToken(DeployToken),
    SshKey(SshKey),
    DeployKey(DeployKey),
    CiJob(CiJob),
    Anonymous,
}

impl Actor {
    /// Returns the user on whose behalf the actor operates, if any.
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::User(user) => Some(user),
            Self::SshKey(SshKey { user, .. }) => Some(user),
            Self::CiJob(CiJob { user, .. }) => Some(user),
            Self::DeployToken(_) | Self::DeployKey(_) | Self::Anonymous => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// Identifier handed to Git hooks, e.g. `user-1` or `key-3`.
    pub fn gl_id(&self) -> Option<String> {
        match self {
            Self::User(User { id, .. }) => Some(format!("user-{id}")),
            Self::SshKey(SshKey { id, .. }) | Self::DeployKey(DeployKey { id, .. }) => {
                Some(id.to_string())
            }
            Self::CiJob(CiJob { user, .. }) => Some(format!("user-{}", user.id)),
            Self::DeployToken(DeployToken { id, .. }) => Some(format!("deploy-token-{id}")),
            Self::Anonymous => None,
        }
    }
}

impl Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(User { username, .. }) => write!(f, "user `{username}`"),
            Self::DeployToken(DeployToken { username, .. }) => {
                write!(f, "deploy token `{username}`")
            }
            Self::SshKey(SshKey { id, user }) => write!(f, "{id} of `{}`", user.username),
            Self::DeployKey(DeployKey { id, .. }) => write!(f, "deploy {id}"),
            Self::CiJob(CiJob { id, .. }) => write!(f, "job {id}"),
            Self::Anonymous => f.write_str("anonymous"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    fn user() -> User {
        User {
            id: 7,
            username: "alice".into(),
            state: UserState::Active,
            two_factor_enabled: false,
            admin: false,
        }
    }

    #[test]
    fn user_of() {
        assert_eq!(Actor::User(user()).user(), Some(&user()));
        let key = Actor::SshKey(SshKey {
            id: KeyId::new(3),
            user: user(),
        });
        assert_eq!(key.user(), Some(&user()));
        assert_eq!(key.gl_id().as_deref(), Some("key-3"));
        assert_eq!(Actor::Anonymous.user(), None);
        assert_eq!(Actor::Anonymous.gl_id(), None);
    }

    #[test]
    fn deploy_token_activity() {
        let now = Utc::now();
        let mut token = DeployToken {
            id: 1,
            username: "gitlab+deploy-token-1".into(),
            project_id: 1,
            scopes: "read_repository".parse().unwrap(),
            revoked: false,
            expires_at: None,
        };
        assert!(token.is_active(now));
        token.expires_at = Some(now - Duration::days(1));
        assert!(!token.is_active(now));
        token.expires_at = Some(now + Duration::days(1));
        assert!(token.is_active(now));
        token.revoked = true;
        assert!(!token.is_active(now));
    }
}
