// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

//! Interfaces to the persistence layer owning users, tokens and containers.
//!
//! The gateway never stores any of these entities itself, it only consumes
//! them through the traits below.

use super::access::Decision;
use super::auth::AuthenticationResult;

use gitgate_type::{
    Ability, Actor, Change, CiJob, Command, Container, DeployToken, KeyId, OAuthToken,
    PersonalAccessToken, Project, RepoPath, Rev, User,
};

use axum::async_trait;

/// Resolves credentials and identifiers into actors.
///
/// Raw tokens are passed through as presented by the client, implementations
/// are expected to compare digests.
#[async_trait]
pub trait ActorLookup: Send + Sync {
    /// Returns the user identified by `login` (username or email) if `password` matches.
    async fn user_by_password(&self, login: &str, password: &str) -> anyhow::Result<Option<User>>;

    async fn user_by_id(&self, id: u64) -> anyhow::Result<Option<User>>;

    async fn user_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;

    async fn personal_access_token(
        &self,
        token: &str,
    ) -> anyhow::Result<Option<PersonalAccessToken>>;

    async fn oauth_token(&self, token: &str) -> anyhow::Result<Option<OAuthToken>>;

    async fn deploy_token(&self, token: &str) -> anyhow::Result<Option<DeployToken>>;

    async fn job_by_token(&self, token: &str) -> anyhow::Result<Option<CiJob>>;

    async fn user_by_kerberos_principal(&self, principal: &str) -> anyhow::Result<Option<User>>;

    /// Returns the [Actor::SshKey] or [Actor::DeployKey] registered under `id`.
    async fn key(&self, id: KeyId) -> anyhow::Result<Option<Actor>>;
}

/// A container found by path, possibly through a redirect left by a rename.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Located {
    pub container: Container,
    /// The requested path, when it differs from the canonical one.
    pub redirected_from: Option<String>,
}

#[async_trait]
pub trait ContainerLookup: Send + Sync {
    async fn find(&self, path: &RepoPath) -> anyhow::Result<Option<Located>>;

    async fn project(&self, id: u64) -> anyhow::Result<Option<Project>>;
}

/// Policy deciding whether an actor holds an ability on a container.
///
/// [Actor::Anonymous] is evaluated as a guest.
#[async_trait]
pub trait AbilityCheck: Send + Sync {
    async fn can(&self, actor: &Actor, ability: Ability, container: &Container)
        -> anyhow::Result<bool>;
}

/// Outcome of a successful SPNEGO exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Negotiated {
    pub principal: String,
    /// Final token to return to the client, if the mechanism produced one.
    pub response: Option<Vec<u8>>,
}

/// Opaque Kerberos credential extractor.
#[async_trait]
pub trait Kerberos: Send + Sync {
    async fn negotiate(&self, token: &[u8]) -> anyhow::Result<Option<Negotiated>>;
}

/// Read-only view of repository contents used by push rules.
#[async_trait]
pub trait RepositoryInspector: Send + Sync {
    /// Counts the files in the tree of `rev`, stopping once `limit + 1` are seen.
    async fn count_files(&self, container: &Container, rev: &Rev, limit: usize)
        -> anyhow::Result<usize>;

    /// Returns the size in bytes of the objects `change` introduces.
    async fn new_bytes(&self, container: &Container, change: &Change) -> anyhow::Result<u64>;
}

/// Extension point consulted before the container ability checks.
///
/// Returning `Some` short-circuits the check with the given decision.
#[async_trait]
pub trait CustomAction: Send + Sync {
    async fn check(
        &self,
        command: Command,
        auth: &AuthenticationResult,
        container: &Container,
    ) -> Option<Decision>;
}

/// [CustomAction] which never intervenes.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCustomAction;

#[async_trait]
impl CustomAction for NoCustomAction {
    async fn check(
        &self,
        _: Command,
        _: &AuthenticationResult,
        _: &Container,
    ) -> Option<Decision> {
        None
    }
}
