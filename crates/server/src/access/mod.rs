// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

//! Authorization of Git commands against projects, wikis and snippets.

mod project;
mod snippet;

pub use project::ProjectAccess;
pub use snippet::SnippetAccess;

use super::auth::AuthenticationResult;
use super::checks::{size_before_push, PushSizeCheck, TimedLogger, ValidationError, Validator};
use super::config::Config;
use super::lookup::{AbilityCheck, CustomAction, Located, RepositoryInspector};

use gitgate_type::{
    Abilities, Ability, Actor, Changes, Command, Container, Protocol, RepoKind, RepoPath,
};

use std::fmt;

use axum::async_trait;
use axum::http::StatusCode;
use tracing::{debug, error, trace, warn};

pub(crate) const PROJECT_NOT_FOUND: &str =
    "The project you were looking for could not be found or you don't have permission to view it.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenyKind {
    Forbidden,
    NotFound,
    /// Validation exceeded its deadline.
    Timeout,
    Internal,
}

impl DenyKind {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the text a client may see in place of `message`.
    pub fn public_message<'a>(&self, message: &'a str) -> &'a str {
        match self {
            Self::Timeout => "Push operation timed out",
            _ => message,
        }
    }
}

/// Outcome of an access check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow {
        auth: AuthenticationResult,
        /// Notices for the client, e.g. that the project was moved.
        messages: Vec<String>,
    },
    Deny(DenyKind, String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Deny(DenyKind::Forbidden, message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::Deny(DenyKind::NotFound, message.into())
    }
}

/// A failed step of a check, converted into [Decision::Deny].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Denied {
    pub kind: DenyKind,
    pub message: String,
}

impl Denied {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            kind: DenyKind::Forbidden,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: DenyKind::NotFound,
            message: message.into(),
        }
    }

    pub fn internal(e: anyhow::Error) -> Self {
        error!(target: "gitgate::access", "access check failed: {e:#}");
        Self {
            kind: DenyKind::Internal,
            message: "Internal server error".into(),
        }
    }
}

impl From<Denied> for Decision {
    fn from(Denied { kind, message }: Denied) -> Self {
        Self::Deny(kind, message)
    }
}

impl From<ValidationError> for Denied {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::Rule(message) => Self::forbidden(message),
            ValidationError::Internal(e) => Self::internal(e),
        }
    }
}

/// Everything a single access check reads.
///
/// Built per request and passed by reference, nothing in it is cached across
/// requests.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub auth: &'a AuthenticationResult,
    pub protocol: Protocol,
    pub path: &'a RepoPath,
    pub located: Option<&'a Located>,
    pub config: &'a Config,
    pub abilities: &'a dyn AbilityCheck,
    pub inspector: &'a dyn RepositoryInspector,
    pub custom_action: &'a dyn CustomAction,
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("auth", &self.auth)
            .field("protocol", &self.protocol)
            .field("path", &self.path)
            .field("located", &self.located)
            .finish_non_exhaustive()
    }
}

impl Context<'_> {
    pub fn actor(&self) -> &Actor {
        self.auth.actor()
    }

    /// Evaluates `ability` of `actor` on `container` through the policy.
    pub async fn can(
        &self,
        actor: &Actor,
        ability: Ability,
        container: &Container,
    ) -> Result<bool, Denied> {
        self.abilities
            .can(actor, ability, container)
            .await
            .map_err(Denied::internal)
    }

    /// Whether a guest could exercise `ability` on `container`.
    pub async fn guest_can(&self, ability: Ability, container: &Container) -> Result<bool, Denied> {
        self.can(&Actor::Anonymous, ability, container).await
    }

    fn repo_url(&self, path: &str) -> String {
        match self.protocol {
            Protocol::Ssh => self.config.gitlab.ssh_url_to_repo(path),
            Protocol::Http | Protocol::Web => self.config.gitlab.http_url_to_repo(path),
        }
    }
}

/// Capabilities distinguishing the container variants.
#[async_trait]
pub trait Access: Send + Sync {
    /// Ability needed on the container to fetch.
    fn download_ability(&self) -> Ability;

    /// Ability needed on the container to push.
    fn push_ability(&self) -> Ability;

    /// Rejects actor kinds the variant does not support.
    fn accepts(&self, actor: &Actor) -> Result<(), Denied>;

    /// Narrows the abilities granted by authentication.
    fn authentication_abilities(&self, abilities: &Abilities) -> Abilities {
        abilities.clone()
    }

    fn resolve_container<'c>(&self, cx: &Context<'c>) -> Result<&'c Container, Denied>;

    fn validate_namespace(&self, cx: &Context<'_>, container: &Container) -> Result<(), Denied>;

    /// Checks the container is visible to the actor.
    async fn validate_container_state(
        &self,
        cx: &Context<'_>,
        container: &Container,
    ) -> Result<(), Denied>;

    fn no_repo_message(&self) -> &'static str;

    fn custom_action_enabled(&self) -> bool;

    async fn check_download(&self, cx: &Context<'_>, container: &Container) -> Result<(), Denied>;

    async fn check_push(&self, cx: &Context<'_>, container: &Container) -> Result<(), Denied>;

    /// Rules applied to each change of a push, in order.
    fn validators<'c>(
        &self,
        cx: &Context<'c>,
        container: &'c Container,
    ) -> Vec<Box<dyn Validator + 'c>>;
}

fn variant(kind: RepoKind) -> &'static dyn Access {
    static PROJECT: ProjectAccess = ProjectAccess;
    static SNIPPET: SnippetAccess = SnippetAccess;
    match kind {
        RepoKind::Project | RepoKind::Wiki => &PROJECT,
        RepoKind::Snippet(_) => &SNIPPET,
    }
}

/// Decides whether a Git command may run against the requested container.
#[derive(Clone, Copy)]
pub struct AccessChecker<'a> {
    cx: Context<'a>,
    access: &'static dyn Access,
}

impl fmt::Debug for AccessChecker<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessChecker")
            .field("cx", &self.cx)
            .finish_non_exhaustive()
    }
}

impl<'a> AccessChecker<'a> {
    /// Selects the variant matching the kind of the requested path.
    pub fn new(cx: Context<'a>) -> Self {
        Self {
            access: variant(cx.path.kind),
            cx,
        }
    }

    pub async fn check(&self, command: Command, changes: &Changes) -> Decision {
        trace!(target: "gitgate::access", "check {command} on `{}` for {}", self.cx.path, self.cx.actor());
        match self.evaluate(command, changes).await {
            Ok(decision) => decision,
            Err(denied) => {
                debug!(target: "gitgate::access", "denied {command} on `{}` for {}: {:?}", self.cx.path, self.cx.actor(), denied.kind);
                denied.into()
            }
        }
    }

    async fn evaluate(&self, command: Command, changes: &Changes) -> Result<Decision, Denied> {
        let cx = &self.cx;
        let actor = cx.actor();

        self.access.accepts(actor)?;
        self.check_protocol()?;
        check_valid_actor(actor)?;
        self.check_authentication_abilities(command)?;
        self.check_command_disabled(command)?;
        if command.is_push() && cx.config.git.read_only {
            return Err(Denied::forbidden(
                "You can't push code to a read-only GitLab instance.",
            ));
        }

        let container = self.access.resolve_container(cx)?;
        self.access.validate_namespace(cx, container)?;
        self.access.validate_container_state(cx, container).await?;

        let mut messages = vec![];
        if let Some(from) = cx.located.and_then(|l| l.redirected_from.as_deref()) {
            messages.push(self.project_moved(from, container));
        }

        if !container.repository_exists() {
            return Err(Denied::not_found(self.access.no_repo_message()));
        }

        if self.access.custom_action_enabled() {
            if let Some(decision) = cx.custom_action.check(command, cx.auth, container).await {
                trace!(target: "gitgate::access", "custom action decided {command} on `{container}`");
                return Ok(decision);
            }
        }

        if command.is_download() {
            self.access.check_download(cx, container).await?;
        } else {
            self.access.check_push(cx, container).await?;
            self.check_changes(container, changes).await?;
        }

        Ok(Decision::Allow {
            auth: cx.auth.clone(),
            messages,
        })
    }

    fn check_protocol(&self) -> Result<(), Denied> {
        let protocol = self.cx.protocol;
        if self.cx.config.git.protocol_allowed(protocol) {
            Ok(())
        } else {
            Err(Denied::forbidden(format!(
                "Git access over {} is not allowed",
                protocol.to_string().to_uppercase()
            )))
        }
    }

    fn check_authentication_abilities(&self, command: Command) -> Result<(), Denied> {
        let abilities = self
            .access
            .authentication_abilities(self.cx.auth.abilities());
        if command.is_download() {
            if abilities.contains(Ability::DownloadCode)
                || abilities.contains(Ability::BuildDownloadCode)
            {
                return Ok(());
            }
            Err(Denied::forbidden("You are not allowed to download code."))
        } else if abilities.contains(Ability::PushCode) {
            Ok(())
        } else {
            Err(Denied::forbidden("You are not allowed to upload code."))
        }
    }

    fn check_command_disabled(&self, command: Command) -> Result<(), Denied> {
        let git = &self.cx.config.git;
        let http = self.cx.protocol == Protocol::Http;
        match command {
            Command::UploadArchive if self.cx.protocol != Protocol::Ssh => Err(Denied::forbidden(
                "The command you're trying to execute is not allowed.",
            )),
            Command::UploadPack if http && !git.upload_pack => {
                Err(Denied::forbidden("Pulling over HTTP is not allowed."))
            }
            Command::ReceivePack if http && !git.receive_pack => {
                Err(Denied::forbidden("Pushing over HTTP is not allowed."))
            }
            _ => Ok(()),
        }
    }

    fn project_moved(&self, from: &str, container: &Container) -> String {
        let path = container.path();
        format!(
            "Project '{from}' was moved to '{path}'.\n\n\
             Please update your Git remote:\n\n  \
             git remote set-url origin {} and try again.\n",
            self.cx.repo_url(&path)
        )
    }

    async fn check_changes(&self, container: &Container, changes: &Changes) -> Result<(), Denied> {
        let cx = &self.cx;
        size_before_push(container)?;

        let mut logger = TimedLogger::new(cx.config.git.check_timeout());
        let timed_out = |logger: &TimedLogger| {
            let message = logger.full_message();
            warn!(target: "gitgate::access", "{message}");
            Denied {
                kind: DenyKind::Timeout,
                message,
            }
        };

        let validators = self.access.validators(cx, container);
        for change in changes {
            for validator in &validators {
                logger
                    .log_timed(
                        format!("Running {} for ref: {}", validator.name(), change.ref_name),
                        validator.validate(change),
                    )
                    .await
                    .map_err(|_| timed_out(&logger))??;
            }
        }

        logger
            .log_timed(
                "Checking push size",
                PushSizeCheck::new(container, cx.inspector).validate(changes),
            )
            .await
            .map_err(|_| timed_out(&logger))??;
        Ok(())
    }
}

/// Blocked users are rejected whatever credential they used.
fn check_valid_actor(actor: &Actor) -> Result<(), Denied> {
    match actor.user() {
        Some(user) if user.is_blocked() => Err(Denied::forbidden("Your account has been blocked.")),
        _ => Ok(()),
    }
}
