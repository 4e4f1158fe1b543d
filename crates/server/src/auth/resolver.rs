// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use super::super::config::Config;
use super::super::lookup::{AbilityCheck, ActorLookup, ContainerLookup, Kerberos};
use super::token::{deploy_token_abilities, TokenError, TokenGuard};
use super::{AuthenticationResult, BasicCredentials, Mechanism, RawCredentials, Throttle};

use gitgate_type::{
    Abilities, Ability, Actor, Command, Container, Protocol, Scope, Token, User,
};

use std::fmt;

use chrono::Utc;
use tracing::{debug, error, info, trace};

const CI_TOKEN_LOGIN: &str = "gitlab-ci-token";
const OAUTH_LOGIN: &str = "oauth2";

/// Successful credential resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub auth: AuthenticationResult,
    /// Final SPNEGO token to send back in `WWW-Authenticate: Negotiate`.
    pub negotiate_response: Option<Vec<u8>>,
}

impl From<AuthenticationResult> for Resolved {
    fn from(auth: AuthenticationResult) -> Self {
        Self {
            auth,
            negotiate_response: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthFailure {
    /// No acceptable credential, the client should be challenged.
    Unauthorized,
    /// The login requires a personal access token with a Git scope.
    MissingPersonalAccessToken,
    /// A collaborator failed.
    Internal,
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => f.write_str("HTTP Basic: Access denied"),
            Self::MissingPersonalAccessToken => {
                f.write_str("HTTP Basic: Access denied, a personal access token is required")
            }
            Self::Internal => f.write_str("Internal server error"),
        }
    }
}

impl std::error::Error for AuthFailure {}

fn internal(e: anyhow::Error) -> AuthFailure {
    error!(target: "gitgate::auth::resolver", "credential lookup failed: {e:#}");
    AuthFailure::Internal
}

/// Outcome of a single Basic sub-check.
enum Attempt {
    Matched(AuthenticationResult),
    /// The credential is known but unusable for Git.
    Rejected(AuthFailure),
    /// The credential is not of this kind, try the next one.
    Skipped,
}

impl Attempt {
    fn finish(self) -> Option<Result<AuthenticationResult, AuthFailure>> {
        match self {
            Self::Matched(auth) => Some(Ok(auth)),
            Self::Rejected(failure) => Some(Err(failure)),
            Self::Skipped => None,
        }
    }
}

/// Turns the credentials of a Git request into an [AuthenticationResult].
///
/// Exactly one branch runs per request: Basic credentials, then a SPNEGO
/// token, then anonymous access to a public project.
#[derive(Clone, Copy)]
pub struct CredentialResolver<'a> {
    config: &'a Config,
    actors: &'a dyn ActorLookup,
    containers: &'a dyn ContainerLookup,
    abilities: &'a dyn AbilityCheck,
    kerberos: Option<&'a dyn Kerberos>,
    throttle: &'a Throttle,
}

impl fmt::Debug for CredentialResolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("kerberos", &self.kerberos.is_some())
            .field("throttle", &self.throttle)
            .finish_non_exhaustive()
    }
}

impl<'a> CredentialResolver<'a> {
    pub fn new(
        config: &'a Config,
        actors: &'a dyn ActorLookup,
        containers: &'a dyn ContainerLookup,
        abilities: &'a dyn AbilityCheck,
        throttle: &'a Throttle,
    ) -> Self {
        Self {
            config,
            actors,
            containers,
            abilities,
            kerberos: None,
            throttle,
        }
    }

    pub fn with_kerberos(mut self, kerberos: &'a dyn Kerberos) -> Self {
        self.kerberos = Some(kerberos);
        self
    }

    pub async fn resolve(
        &self,
        creds: &RawCredentials,
        container: Option<&Container>,
        command: Command,
        protocol: Protocol,
    ) -> Result<Resolved, AuthFailure> {
        if let Some(ref basic) = creds.basic {
            return self.basic(creds, basic, container).await.map(Into::into);
        }
        if let (true, Some(kerberos), Some(token)) =
            (self.config.kerberos.enabled, self.kerberos, creds.negotiate.as_ref())
        {
            return self.negotiate(kerberos, token).await;
        }
        if let Some(container) = container {
            if self.anonymous_allowed(container, command, protocol).await? {
                trace!(target: "gitgate::auth::resolver", "anonymous {command} of `{container}`");
                return Ok(AuthenticationResult::new(
                    Actor::Anonymous,
                    Some(container.clone()),
                    Mechanism::None,
                    [Ability::DownloadCode].into_iter().collect(),
                )
                .into());
            }
        }
        Err(AuthFailure::Unauthorized)
    }

    async fn anonymous_allowed(
        &self,
        container: &Container,
        command: Command,
        protocol: Protocol,
    ) -> Result<bool, AuthFailure> {
        if container.is_snippet()
            || !command.is_download()
            || protocol != Protocol::Http
            || !self.config.git.protocol_allowed(protocol)
        {
            return Ok(false);
        }
        self.abilities
            .can(&Actor::Anonymous, Ability::DownloadCode, container)
            .await
            .map_err(internal)
    }

    async fn negotiate(
        &self,
        kerberos: &dyn Kerberos,
        token: &[u8],
    ) -> Result<Resolved, AuthFailure> {
        let negotiated = kerberos
            .negotiate(token)
            .await
            .map_err(|e| {
                debug!(target: "gitgate::auth::resolver", "SPNEGO negotiation failed: {e:#}");
                AuthFailure::Unauthorized
            })?
            .ok_or(AuthFailure::Unauthorized)?;
        let user = self
            .actors
            .user_by_kerberos_principal(&negotiated.principal)
            .await
            .map_err(internal)?
            .filter(|user| !user.is_blocked())
            .ok_or(AuthFailure::Unauthorized)?;
        info!(target: "gitgate::auth::resolver", "authenticated `{}` through Kerberos", user.username);
        Ok(Resolved {
            auth: AuthenticationResult::new(
                Actor::User(user),
                None,
                Mechanism::Kerberos,
                Abilities::full_authentication(),
            ),
            negotiate_response: negotiated.response,
        })
    }

    async fn basic(
        &self,
        creds: &RawCredentials,
        basic: &BasicCredentials,
        container: Option<&Container>,
    ) -> Result<AuthenticationResult, AuthFailure> {
        if self.throttle.is_banned(creds.ip) {
            debug!(target: "gitgate::auth::resolver", "rejecting Basic credentials from banned {:?}", creds.ip);
            return Err(AuthFailure::Unauthorized);
        }

        match self.basic_attempts(basic, container).await {
            Ok(auth) => {
                self.throttle.reset(creds.ip);
                debug!(target: "gitgate::auth::resolver", "authenticated {} with {:?}", auth.actor(), auth.mechanism());
                Ok(auth)
            }
            Err(AuthFailure::Internal) => Err(AuthFailure::Internal),
            Err(failure) => {
                self.throttle.register_failure(creds.ip);
                debug!(target: "gitgate::auth::resolver", "Basic authentication of `{}` failed", basic.login);
                Err(failure)
            }
        }
    }

    /// Runs the Basic sub-checks in order, the first match wins.
    async fn basic_attempts(
        &self,
        basic: &BasicCredentials,
        container: Option<&Container>,
    ) -> Result<AuthenticationResult, AuthFailure> {
        let login = basic.login.as_str();
        let password = basic.password.as_str();

        if let Some(res) = self.job_token(login, password).await?.finish() {
            return res;
        }
        if let Some(res) = self.oauth_token(login, password).await?.finish() {
            return res;
        }
        if let Some(res) = self.personal_access_token(password).await?.finish() {
            return res;
        }
        if let Some(res) = self.deploy_token(login, password, container).await?.finish() {
            return res;
        }
        if let Some(res) = self.password(login, password).await?.finish() {
            return res;
        }

        if self.config.git.password_authentication_enabled {
            Err(AuthFailure::Unauthorized)
        } else {
            Err(AuthFailure::MissingPersonalAccessToken)
        }
    }

    async fn job_token(&self, login: &str, password: &str) -> Result<Attempt, AuthFailure> {
        if login != CI_TOKEN_LOGIN {
            return Ok(Attempt::Skipped);
        }
        match TokenGuard::new(self.actors, self.containers)
            .job_token(password)
            .await
        {
            Ok(auth) => Ok(Attempt::Matched(auth)),
            Err(TokenError::Internal) => Err(AuthFailure::Internal),
            Err(_) => Ok(Attempt::Skipped),
        }
    }

    async fn oauth_token(&self, login: &str, password: &str) -> Result<Attempt, AuthFailure> {
        if login != OAUTH_LOGIN {
            return Ok(Attempt::Skipped);
        }
        match TokenGuard::new(self.actors, self.containers)
            .oauth_token(password, &Scope::GIT, Utc::now())
            .await
        {
            Ok(auth) if !blocked(auth.actor().user()) => Ok(Attempt::Matched(auth)),
            Ok(_) => Ok(Attempt::Rejected(AuthFailure::Unauthorized)),
            Err(TokenError::Internal) => Err(AuthFailure::Internal),
            Err(_) => Ok(Attempt::Skipped),
        }
    }

    /// Accepts a personal access token in place of the password.
    ///
    /// The login is not compared, clients commonly send an arbitrary one.
    async fn personal_access_token(&self, password: &str) -> Result<Attempt, AuthFailure> {
        let Some(token) = self
            .actors
            .personal_access_token(password)
            .await
            .map_err(internal)?
        else {
            return Ok(Attempt::Skipped);
        };
        let now = Utc::now();
        if token.is_revoked() {
            return Ok(Attempt::Skipped);
        }
        if token.is_expired(now) || !token.scopes.intersects(&Scope::GIT) {
            trace!(target: "gitgate::auth::resolver", "personal access token `{}` is not usable for Git", token.name);
            return Ok(Attempt::Rejected(AuthFailure::MissingPersonalAccessToken));
        }
        if token.user.is_blocked() {
            return Ok(Attempt::Rejected(AuthFailure::Unauthorized));
        }
        let abilities = Abilities::for_scopes(&token.scopes);
        Ok(Attempt::Matched(AuthenticationResult::new(
            Actor::User(token.user),
            None,
            Mechanism::PersonalAccessToken,
            abilities,
        )))
    }

    /// Accepts a deploy token whose username is given as login.
    async fn deploy_token(
        &self,
        login: &str,
        password: &str,
        container: Option<&Container>,
    ) -> Result<Attempt, AuthFailure> {
        let Some(token) = self
            .actors
            .deploy_token(password)
            .await
            .map_err(internal)?
            .filter(|token| token.username == login)
        else {
            return Ok(Attempt::Skipped);
        };
        let bound = container
            .and_then(Container::project)
            .map_or(false, |p| p.id == token.project_id);
        if !bound || !token.is_active(Utc::now()) || !token.scopes.intersects(&Scope::GIT) {
            return Ok(Attempt::Skipped);
        }
        let project = self
            .containers
            .project(token.project_id)
            .await
            .map_err(internal)?
            .map(Container::Project);
        let abilities = deploy_token_abilities(&token);
        Ok(Attempt::Matched(AuthenticationResult::new(
            Actor::DeployToken(token),
            project,
            Mechanism::DeployToken,
            abilities,
        )))
    }

    async fn password(&self, login: &str, password: &str) -> Result<Attempt, AuthFailure> {
        if !self.config.git.password_authentication_enabled {
            return Ok(Attempt::Skipped);
        }
        let Some(user) = self
            .actors
            .user_by_password(login, password)
            .await
            .map_err(internal)?
        else {
            return Ok(Attempt::Skipped);
        };
        if user.is_blocked() {
            Ok(Attempt::Rejected(AuthFailure::Unauthorized))
        } else if user.two_factor_enabled {
            Ok(Attempt::Rejected(AuthFailure::MissingPersonalAccessToken))
        } else {
            Ok(Attempt::Matched(AuthenticationResult::new(
                Actor::User(user),
                None,
                Mechanism::Basic,
                Abilities::full_authentication(),
            )))
        }
    }
}

fn blocked(user: Option<&User>) -> bool {
    user.map_or(false, User::is_blocked)
}
