// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use super::auth::Throttle;
use super::config::Config;
use super::lookup::{
    AbilityCheck, ActorLookup, ContainerLookup, CustomAction, Kerberos, NoCustomAction,
    RepositoryInspector,
};
use super::{handle, App, Gate};

use anyhow::Context as _;
use async_std::sync::Arc;
use axum::handler::Handler;
use axum::{Extension, Router};
use futures::lock::Mutex;

/// [App] builder.
#[derive(Default)]
pub struct Builder {
    config: Config,
    actors: Option<Arc<dyn ActorLookup>>,
    containers: Option<Arc<dyn ContainerLookup>>,
    abilities: Option<Arc<dyn AbilityCheck>>,
    kerberos: Option<Arc<dyn Kerberos>>,
    inspector: Option<Arc<dyn RepositoryInspector>>,
    custom_action: Option<Arc<dyn CustomAction>>,
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Builder {
    /// Constructs a new [Builder].
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Uses `directory` for actor, container and ability lookups.
    pub fn directory<D>(self, directory: Arc<D>) -> Self
    where
        D: ActorLookup + ContainerLookup + AbilityCheck + 'static,
    {
        let actors: Arc<dyn ActorLookup> = directory.clone();
        let containers: Arc<dyn ContainerLookup> = directory.clone();
        let abilities: Arc<dyn AbilityCheck> = directory;
        self.actors(actors).containers(containers).abilities(abilities)
    }

    pub fn actors(mut self, actors: Arc<dyn ActorLookup>) -> Self {
        self.actors = Some(actors);
        self
    }

    pub fn containers(mut self, containers: Arc<dyn ContainerLookup>) -> Self {
        self.containers = Some(containers);
        self
    }

    pub fn abilities(mut self, abilities: Arc<dyn AbilityCheck>) -> Self {
        self.abilities = Some(abilities);
        self
    }

    pub fn kerberos(mut self, kerberos: Arc<dyn Kerberos>) -> Self {
        self.kerberos = Some(kerberos);
        self
    }

    pub fn inspector(mut self, inspector: Arc<dyn RepositoryInspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    pub fn custom_action(mut self, custom_action: Arc<dyn CustomAction>) -> Self {
        self.custom_action = Some(custom_action);
        self
    }

    fn gate(self) -> anyhow::Result<Gate> {
        let throttle = Throttle::new(self.config.throttle.git_basic_auth.clone());
        Ok(Gate {
            actors: self.actors.context("actor lookup not configured")?,
            containers: self.containers.context("container lookup not configured")?,
            abilities: self.abilities.context("ability check not configured")?,
            inspector: self.inspector.context("repository inspector not configured")?,
            kerberos: self.kerberos,
            custom_action: self
                .custom_action
                .unwrap_or_else(|| Arc::new(NoCustomAction)),
            config: self.config,
            throttle,
        })
    }

    /// Builds the request router.
    pub fn router(self) -> anyhow::Result<Router> {
        let gate = self.gate()?;
        Ok(Router::new()
            .fallback(handle.into_service())
            .layer(Extension(Arc::new(gate))))
    }

    /// Builds the application.
    pub fn build(self) -> anyhow::Result<App> {
        Ok(App {
            make_service: Mutex::new(self.router()?.into_make_service()),
        })
    }
}
