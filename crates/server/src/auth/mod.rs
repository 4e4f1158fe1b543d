// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

mod resolver;
mod throttle;
mod token;

pub use resolver::{AuthFailure, CredentialResolver, Resolved};
pub use throttle::Throttle;
pub use token::{ApiCredentials, TokenError, TokenGuard};
pub(crate) use token::READ_USER_SCOPES;

use gitgate_type::{Abilities, Actor, Container};

use std::fmt;
use std::net::IpAddr;

use serde::Serialize;
use zeroize::Zeroizing;

/// How the actor of a request was authenticated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mechanism {
    /// Username and password.
    Basic,
    PersonalAccessToken,
    OAuth,
    Kerberos,
    JobToken,
    DeployToken,
    /// SSH key, as reported by the SSH front-end.
    Ssh,
    /// Anonymous access.
    None,
}

/// The identity and capabilities established for a single request.
///
/// Created once by [CredentialResolver] or [TokenGuard] and never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticationResult {
    actor: Actor,
    container: Option<Container>,
    mechanism: Mechanism,
    abilities: Abilities,
}

impl AuthenticationResult {
    pub fn new(
        actor: Actor,
        container: Option<Container>,
        mechanism: Mechanism,
        abilities: Abilities,
    ) -> Self {
        Self {
            actor,
            container,
            mechanism,
            abilities,
        }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    /// The container the credential is bound to, if any.
    pub fn container(&self) -> Option<&Container> {
        self.container.as_ref()
    }

    pub fn mechanism(&self) -> Mechanism {
        self.mechanism
    }

    pub fn abilities(&self) -> &Abilities {
        &self.abilities
    }
}

/// HTTP Basic credentials.
pub struct BasicCredentials {
    pub login: String,
    pub password: Zeroizing<String>,
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("login", &self.login)
            .finish_non_exhaustive()
    }
}

/// Credentials presented with a Git request, before any validation.
#[derive(Debug, Default)]
pub struct RawCredentials {
    pub basic: Option<BasicCredentials>,
    /// Decoded SPNEGO token from `Authorization: Negotiate`.
    pub negotiate: Option<Zeroizing<Vec<u8>>>,
    /// Client address, used for throttling failed attempts.
    pub ip: Option<IpAddr>,
}

impl RawCredentials {
    pub fn basic(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            basic: Some(BasicCredentials {
                login: login.into(),
                password: Zeroizing::new(password.into()),
            }),
            ..Default::default()
        }
    }

    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.basic.is_none() && self.negotiate.is_none()
    }
}
