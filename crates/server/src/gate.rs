// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use super::access::{AccessChecker, Context};
use super::auth::{AuthenticationResult, CredentialResolver, Throttle, TokenGuard};
use super::config::Config;
use super::lookup::{
    AbilityCheck, ActorLookup, ContainerLookup, CustomAction, Kerberos, Located,
    RepositoryInspector,
};

use gitgate_type::{Protocol, RepoPath};

use std::fmt;

use async_std::sync::Arc;

/// Configuration and collaborators shared by all requests.
pub struct Gate {
    pub(crate) config: Config,
    pub(crate) actors: Arc<dyn ActorLookup>,
    pub(crate) containers: Arc<dyn ContainerLookup>,
    pub(crate) abilities: Arc<dyn AbilityCheck>,
    pub(crate) kerberos: Option<Arc<dyn Kerberos>>,
    pub(crate) inspector: Arc<dyn RepositoryInspector>,
    pub(crate) custom_action: Arc<dyn CustomAction>,
    pub(crate) throttle: Throttle,
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate")
            .field("config", &self.config)
            .field("kerberos", &self.kerberos.is_some())
            .field("throttle", &self.throttle)
            .finish_non_exhaustive()
    }
}

impl Gate {
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn actors(&self) -> &dyn ActorLookup {
        self.actors.as_ref()
    }

    pub fn resolver(&self) -> CredentialResolver<'_> {
        let resolver = CredentialResolver::new(
            &self.config,
            self.actors.as_ref(),
            self.containers.as_ref(),
            self.abilities.as_ref(),
            &self.throttle,
        );
        match self.kerberos {
            Some(ref kerberos) => resolver.with_kerberos(kerberos.as_ref()),
            None => resolver,
        }
    }

    pub fn token_guard(&self) -> TokenGuard<'_> {
        TokenGuard::new(self.actors.as_ref(), self.containers.as_ref())
    }

    pub async fn locate(&self, path: &RepoPath) -> anyhow::Result<Option<Located>> {
        self.containers.find(path).await
    }

    pub fn access_checker<'a>(
        &'a self,
        auth: &'a AuthenticationResult,
        protocol: Protocol,
        path: &'a RepoPath,
        located: Option<&'a Located>,
    ) -> AccessChecker<'a> {
        AccessChecker::new(Context {
            auth,
            protocol,
            path,
            located,
            config: &self.config,
            abilities: self.abilities.as_ref(),
            inspector: self.inspector.as_ref(),
            custom_action: self.custom_action.as_ref(),
        })
    }
}
