// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use super::{Scopes, User};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A personal access token
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PersonalAccessToken {
    pub id: u64,
    pub name: String,
    pub user: User,
    pub scopes: Scopes,
    #[serde(default)]
    pub revoked: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// An OAuth access token issued to an application on behalf of a user
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct OAuthToken {
    pub id: u64,
    pub user: User,
    pub scopes: Scopes,
    #[serde(default)]
    pub revoked: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Common view over tokens validated by scope, expiry and revocation
pub trait Token {
    fn scopes(&self) -> &Scopes;
    fn is_revoked(&self) -> bool;
    fn expires_at(&self) -> Option<DateTime<Utc>>;

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map_or(false, |at| at <= now)
    }
}

impl Token for PersonalAccessToken {
    fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    fn is_revoked(&self) -> bool {
        self.revoked
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

impl Token for OAuthToken {
    fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    fn is_revoked(&self) -> bool {
        self.revoked
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

impl Token for super::DeployToken {
    fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    fn is_revoked(&self) -> bool {
        self.revoked
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}
