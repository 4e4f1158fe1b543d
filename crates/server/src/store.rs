// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

//! A static directory of users, credentials and containers loaded from TOML.
//!
//! Stands in for the persistence layer. Secrets are kept as SHA-256 digests
//! only: raw `token`/`password` values are hashed on load and may be replaced
//! by precomputed `token_sha256`/`password_sha256` values.

use super::lookup::{AbilityCheck, ActorLookup, ContainerLookup, Located};

use gitgate_type::{
    Ability, Actor, CiJob, Container, DeployKey, DeployToken, JobStatus, KeyId, OAuthToken,
    PersonalAccessToken, Project, RepoKind, RepoPath, Scope, Scopes, Snippet, SshKey, User,
    UserState, Visibility,
};

use anyhow::{anyhow, bail, Context as _};
use axum::async_trait;
use camino::Utf8Path;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sha2::{Digest as _, Sha256};
use tracing::{debug, trace};

fn default_true() -> bool {
    true
}

fn default_branch() -> String {
    "main".into()
}

fn digest(secret: &str) -> String {
    format!("{:x}", Sha256::digest(secret.as_bytes()))
}

/// Returns the digest of a secret given either raw or pre-hashed.
fn stored_digest(raw: Option<String>, hashed: Option<String>, what: &str) -> anyhow::Result<String> {
    match (raw, hashed) {
        (Some(raw), None) => Ok(digest(&raw)),
        (None, Some(hashed)) if hashed.len() == 64 && hashed.bytes().all(|b| b.is_ascii_hexdigit()) => {
            Ok(hashed.to_ascii_lowercase())
        }
        (None, Some(_)) => bail!("{what} digest must be 64 hexadecimal characters"),
        (Some(_), Some(_)) => bail!("{what} must not be given both raw and hashed"),
        (None, None) => bail!("{what} is missing"),
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
enum AccessLevel {
    Guest,
    Reporter,
    Developer,
    Maintainer,
    Owner,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UserEntry {
    id: u64,
    username: String,
    email: Option<String>,
    #[serde(default)]
    state: UserState,
    #[serde(default)]
    two_factor_enabled: bool,
    #[serde(default)]
    admin: bool,
    password: Option<String>,
    password_sha256: Option<String>,
    kerberos_principal: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PersonalAccessTokenEntry {
    id: u64,
    name: String,
    user: String,
    token: Option<String>,
    token_sha256: Option<String>,
    #[serde(default)]
    scopes: Scopes,
    #[serde(default)]
    revoked: bool,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OAuthTokenEntry {
    id: u64,
    user: String,
    token: Option<String>,
    token_sha256: Option<String>,
    #[serde(default)]
    scopes: Scopes,
    #[serde(default)]
    revoked: bool,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeployTokenEntry {
    id: u64,
    username: String,
    project_id: u64,
    token: Option<String>,
    token_sha256: Option<String>,
    #[serde(default)]
    scopes: Scopes,
    #[serde(default)]
    revoked: bool,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JobEntry {
    id: u64,
    project_id: u64,
    user: String,
    token: Option<String>,
    token_sha256: Option<String>,
    status: JobStatus,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeployGrant {
    project_id: u64,
    #[serde(default)]
    can_push: bool,
}

/// A personal key when `user` is set, a deploy key otherwise.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct KeyEntry {
    id: u64,
    user: Option<String>,
    title: Option<String>,
    #[serde(default)]
    deploy: Vec<DeployGrant>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SnippetEntry {
    id: u64,
    author: String,
    project_id: Option<u64>,
    #[serde(default)]
    visibility: Visibility,
    #[serde(default = "default_true")]
    repository_exists: bool,
    #[serde(default = "default_branch")]
    default_branch: String,
    #[serde(default)]
    repository_size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MemberEntry {
    project_id: u64,
    user: String,
    access_level: AccessLevel,
}

/// A path left behind by a project rename or transfer.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RedirectEntry {
    path: String,
    project_id: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Document {
    users: Vec<UserEntry>,
    personal_access_tokens: Vec<PersonalAccessTokenEntry>,
    oauth_tokens: Vec<OAuthTokenEntry>,
    deploy_tokens: Vec<DeployTokenEntry>,
    jobs: Vec<JobEntry>,
    keys: Vec<KeyEntry>,
    projects: Vec<Project>,
    snippets: Vec<SnippetEntry>,
    members: Vec<MemberEntry>,
    redirects: Vec<RedirectEntry>,
}

#[derive(Debug)]
struct UserRecord {
    user: User,
    email: Option<String>,
    password: Option<String>,
    kerberos_principal: Option<String>,
}

#[derive(Debug)]
struct Secret<T> {
    digest: String,
    value: T,
}

#[derive(Debug)]
struct KeyRecord {
    actor: Actor,
    deploy: Vec<DeployGrant>,
}

#[derive(Debug)]
struct SnippetRecord {
    snippet: Snippet,
    project_id: Option<u64>,
}

#[derive(Debug)]
struct Member {
    project_id: u64,
    user_id: u64,
    access_level: AccessLevel,
}

/// In-memory directory implementing the lookup collaborators.
#[derive(Debug, Default)]
pub struct Directory {
    users: Vec<UserRecord>,
    personal_access_tokens: Vec<Secret<PersonalAccessToken>>,
    oauth_tokens: Vec<Secret<OAuthToken>>,
    deploy_tokens: Vec<Secret<DeployToken>>,
    jobs: Vec<Secret<CiJob>>,
    keys: Vec<KeyRecord>,
    projects: Vec<Project>,
    snippets: Vec<SnippetRecord>,
    members: Vec<Member>,
    redirects: Vec<RedirectEntry>,
}

impl Directory {
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        let doc: Document = toml::from_str(s).context("failed to parse directory")?;
        Self::try_from(doc)
    }

    pub async fn read(path: impl AsRef<Utf8Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let s = async_std::fs::read_to_string(path.as_str())
            .await
            .with_context(|| format!("failed to read directory from `{path}`"))?;
        let dir = Self::from_toml(&s).with_context(|| format!("invalid directory `{path}`"))?;
        debug!(
            target: "gitgate::store",
            "loaded {} user(s) and {} project(s) from `{path}`",
            dir.users.len(),
            dir.projects.len()
        );
        Ok(dir)
    }

    fn user(&self, username: &str) -> Option<&User> {
        self.users
            .iter()
            .map(|r| &r.user)
            .find(|u| u.username == username)
    }

    fn project_by_id(&self, id: u64) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    fn project_by_path(&self, path: &str) -> Option<&Project> {
        self.projects
            .iter()
            .find(|p| p.full_path.eq_ignore_ascii_case(path))
    }

    fn access_level(&self, project: &Project, user: &User) -> Option<AccessLevel> {
        self.members
            .iter()
            .find(|m| m.project_id == project.id && m.user_id == user.id)
            .map(|m| m.access_level)
    }

    fn deploy_grant(&self, id: KeyId, project: &Project) -> Option<&DeployGrant> {
        self.keys
            .iter()
            .filter(|k| matches!(&k.actor, Actor::DeployKey(key) if key.id == id))
            .flat_map(|k| &k.deploy)
            .find(|g| g.project_id == project.id)
    }

    fn guest_can(&self, ability: Ability, container: &Container) -> bool {
        match container {
            Container::Project(p) | Container::ProjectWiki(p) => {
                p.visibility == Visibility::Public
                    && matches!(
                        ability,
                        Ability::ReadProject | Ability::DownloadCode | Ability::ReadContainerImage
                    )
            }
            Container::PersonalSnippet(s) => {
                ability == Ability::ReadSnippet && s.visibility == Visibility::Public
            }
            Container::ProjectSnippet { snippet, project } => {
                ability == Ability::ReadSnippet
                    && snippet.visibility == Visibility::Public
                    && project.visibility == Visibility::Public
            }
        }
    }

    fn user_can(&self, user: &User, ability: Ability, container: &Container) -> bool {
        if user.is_blocked() {
            return false;
        }
        if user.admin {
            return true;
        }
        match container {
            Container::Project(p) | Container::ProjectWiki(p) => {
                let visible = p.visibility != Visibility::Private;
                let level = self.access_level(p, user);
                let at_least = |min: AccessLevel| level.map_or(false, |l| l >= min);
                match ability {
                    Ability::ReadProject => visible || level.is_some(),
                    Ability::DownloadCode
                    | Ability::ReadContainerImage
                    | Ability::BuildDownloadCode
                    | Ability::BuildReadContainerImage => {
                        visible || at_least(AccessLevel::Reporter)
                    }
                    Ability::PushCode
                    | Ability::CreateContainerImage
                    | Ability::BuildCreateContainerImage => at_least(AccessLevel::Developer),
                    Ability::AdminContainerImage => at_least(AccessLevel::Maintainer),
                    Ability::ReadSnippet | Ability::UpdateSnippet => false,
                }
            }
            Container::PersonalSnippet(s) => match ability {
                Ability::ReadSnippet => s.visibility != Visibility::Private || s.author_id == user.id,
                Ability::UpdateSnippet => s.author_id == user.id,
                _ => false,
            },
            Container::ProjectSnippet { snippet, project } => {
                let level = self.access_level(project, user);
                let at_least = |min: AccessLevel| level.map_or(false, |l| l >= min);
                let author = snippet.author_id == user.id;
                match ability {
                    Ability::ReadSnippet => {
                        author
                            || at_least(AccessLevel::Reporter)
                            || (snippet.visibility != Visibility::Private
                                && self.user_can(
                                    user,
                                    Ability::ReadProject,
                                    &Container::Project(project.clone()),
                                ))
                    }
                    Ability::UpdateSnippet => author || at_least(AccessLevel::Maintainer),
                    _ => false,
                }
            }
        }
    }

    fn job_can(&self, job: &CiJob, ability: Ability, container: &Container) -> bool {
        let own = container.project().map_or(false, |p| p.id == job.project_id);
        match ability {
            Ability::ReadProject
            | Ability::BuildDownloadCode
            | Ability::BuildReadContainerImage
            | Ability::BuildCreateContainerImage
                if own =>
            {
                true
            }
            _ => self.user_can(&job.user, ability, container),
        }
    }

    fn deploy_token_can(&self, token: &DeployToken, ability: Ability, container: &Container) -> bool {
        let Some(project) = container.project().filter(|p| p.id == token.project_id) else {
            return false;
        };
        if container.is_snippet() || !token.is_active(Utc::now()) {
            return false;
        }
        let scope = |s: Scope| token.scopes.contains(s);
        trace!(target: "gitgate::store", "deploy token {} on project {}", token.id, project.id);
        match ability {
            Ability::ReadProject => true,
            Ability::DownloadCode => scope(Scope::ReadRepository),
            Ability::PushCode => scope(Scope::WriteRepository),
            Ability::ReadContainerImage => scope(Scope::ReadRegistry),
            Ability::CreateContainerImage => scope(Scope::WriteRegistry),
            _ => false,
        }
    }

    fn deploy_key_can(&self, key: &DeployKey, ability: Ability, container: &Container) -> bool {
        if container.is_snippet() {
            return false;
        }
        let Some(grant) = container.project().and_then(|p| self.deploy_grant(key.id, p)) else {
            return false;
        };
        match ability {
            Ability::ReadProject | Ability::DownloadCode => true,
            Ability::PushCode => grant.can_push,
            _ => false,
        }
    }
}

impl TryFrom<Document> for Directory {
    type Error = anyhow::Error;

    fn try_from(doc: Document) -> Result<Self, Self::Error> {
        let users = doc
            .users
            .into_iter()
            .map(|e| -> anyhow::Result<UserRecord> {
                let password = match (e.password, e.password_sha256) {
                    (None, None) => None,
                    (raw, hashed) => Some(
                        stored_digest(raw, hashed, "password")
                            .with_context(|| format!("invalid password of user `{}`", e.username))?,
                    ),
                };
                Ok(UserRecord {
                    user: User {
                        id: e.id,
                        username: e.username,
                        state: e.state,
                        two_factor_enabled: e.two_factor_enabled,
                        admin: e.admin,
                    },
                    email: e.email,
                    password,
                    kerberos_principal: e.kerberos_principal,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut dir = Self {
            users,
            projects: doc.projects,
            redirects: doc.redirects,
            ..Default::default()
        };

        let user = |dir: &Self, name: &str| {
            dir.user(name)
                .cloned()
                .ok_or_else(|| anyhow!("unknown user `{name}`"))
        };

        for e in doc.personal_access_tokens {
            let digest = stored_digest(e.token, e.token_sha256, "token")
                .with_context(|| format!("invalid personal access token {}", e.id))?;
            let value = PersonalAccessToken {
                id: e.id,
                name: e.name,
                user: user(&dir, &e.user)?,
                scopes: e.scopes,
                revoked: e.revoked,
                expires_at: e.expires_at,
            };
            dir.personal_access_tokens.push(Secret { digest, value });
        }
        for e in doc.oauth_tokens {
            let digest = stored_digest(e.token, e.token_sha256, "token")
                .with_context(|| format!("invalid OAuth token {}", e.id))?;
            let value = OAuthToken {
                id: e.id,
                user: user(&dir, &e.user)?,
                scopes: e.scopes,
                revoked: e.revoked,
                expires_at: e.expires_at,
            };
            dir.oauth_tokens.push(Secret { digest, value });
        }
        for e in doc.deploy_tokens {
            let digest = stored_digest(e.token, e.token_sha256, "token")
                .with_context(|| format!("invalid deploy token {}", e.id))?;
            let value = DeployToken {
                id: e.id,
                username: e.username,
                project_id: e.project_id,
                scopes: e.scopes,
                revoked: e.revoked,
                expires_at: e.expires_at,
            };
            dir.deploy_tokens.push(Secret { digest, value });
        }
        for e in doc.jobs {
            let digest = stored_digest(e.token, e.token_sha256, "token")
                .with_context(|| format!("invalid job token of job {}", e.id))?;
            let value = CiJob {
                id: e.id,
                project_id: e.project_id,
                user: user(&dir, &e.user)?,
                status: e.status,
            };
            dir.jobs.push(Secret { digest, value });
        }
        for e in doc.keys {
            let id = KeyId::new(e.id);
            let actor = match e.user {
                Some(ref name) => Actor::SshKey(SshKey {
                    id,
                    user: user(&dir, name)?,
                }),
                None => Actor::DeployKey(DeployKey {
                    id,
                    title: e.title.unwrap_or_else(|| format!("deploy key {}", e.id)),
                }),
            };
            dir.keys.push(KeyRecord {
                actor,
                deploy: e.deploy,
            });
        }
        for e in doc.snippets {
            let author = user(&dir, &e.author)?;
            dir.snippets.push(SnippetRecord {
                snippet: Snippet {
                    id: e.id,
                    author_id: author.id,
                    visibility: e.visibility,
                    repository_exists: e.repository_exists,
                    default_branch: e.default_branch,
                    repository_size: e.repository_size,
                },
                project_id: e.project_id,
            });
        }
        for e in doc.members {
            let user_id = user(&dir, &e.user)?.id;
            dir.members.push(Member {
                project_id: e.project_id,
                user_id,
                access_level: e.access_level,
            });
        }
        Ok(dir)
    }
}

fn find_secret<'a, T>(secrets: &'a [Secret<T>], raw: &str) -> Option<&'a T> {
    let digest = digest(raw);
    secrets.iter().find(|s| s.digest == digest).map(|s| &s.value)
}

#[async_trait]
impl ActorLookup for Directory {
    async fn user_by_password(&self, login: &str, password: &str) -> anyhow::Result<Option<User>> {
        let digest = digest(password);
        Ok(self
            .users
            .iter()
            .filter(|r| r.user.username == login || r.email.as_deref() == Some(login))
            .find(|r| r.password.as_deref() == Some(digest.as_str()))
            .map(|r| r.user.clone()))
    }

    async fn user_by_id(&self, id: u64) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .iter()
            .map(|r| &r.user)
            .find(|u| u.id == id)
            .cloned())
    }

    async fn user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        Ok(self.user(username).cloned())
    }

    async fn personal_access_token(
        &self,
        token: &str,
    ) -> anyhow::Result<Option<PersonalAccessToken>> {
        Ok(find_secret(&self.personal_access_tokens, token).cloned())
    }

    async fn oauth_token(&self, token: &str) -> anyhow::Result<Option<OAuthToken>> {
        Ok(find_secret(&self.oauth_tokens, token).cloned())
    }

    async fn deploy_token(&self, token: &str) -> anyhow::Result<Option<DeployToken>> {
        Ok(find_secret(&self.deploy_tokens, token).cloned())
    }

    async fn job_by_token(&self, token: &str) -> anyhow::Result<Option<CiJob>> {
        Ok(find_secret(&self.jobs, token).cloned())
    }

    async fn user_by_kerberos_principal(&self, principal: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|r| r.kerberos_principal.as_deref() == Some(principal))
            .map(|r| r.user.clone()))
    }

    async fn key(&self, id: KeyId) -> anyhow::Result<Option<Actor>> {
        Ok(self
            .keys
            .iter()
            .map(|k| &k.actor)
            .find(|actor| match actor {
                Actor::SshKey(key) => key.id == id,
                Actor::DeployKey(key) => key.id == id,
                _ => false,
            })
            .cloned())
    }
}

#[async_trait]
impl ContainerLookup for Directory {
    async fn find(&self, path: &RepoPath) -> anyhow::Result<Option<Located>> {
        let requested = path.project.as_deref();
        let (project, redirected_from) = match requested {
            Some(requested) => match self.project_by_path(requested) {
                Some(project) => (Some(project), None),
                None => {
                    let project = self
                        .redirects
                        .iter()
                        .find(|r| r.path.eq_ignore_ascii_case(requested))
                        .and_then(|r| self.project_by_id(r.project_id));
                    if project.is_none() {
                        return Ok(None);
                    }
                    (project, Some(path.to_string()))
                }
            },
            None => (None, None),
        };

        let container = match (path.kind, project) {
            (RepoKind::Project, Some(p)) => Container::Project(p.clone()),
            (RepoKind::Wiki, Some(p)) => Container::ProjectWiki(p.clone()),
            (RepoKind::Snippet(id), project) => {
                let Some(record) = self.snippets.iter().find(|s| s.snippet.id == id) else {
                    return Ok(None);
                };
                match (record.project_id, project) {
                    (None, None) => Container::PersonalSnippet(record.snippet.clone()),
                    (Some(owner), Some(p)) if owner == p.id => Container::ProjectSnippet {
                        snippet: record.snippet.clone(),
                        project: p.clone(),
                    },
                    _ => return Ok(None),
                }
            }
            (_, None) => return Ok(None),
        };
        trace!(target: "gitgate::store", "`{path}` resolved to `{container}`");
        Ok(Some(Located {
            container,
            redirected_from,
        }))
    }

    async fn project(&self, id: u64) -> anyhow::Result<Option<Project>> {
        Ok(self.project_by_id(id).cloned())
    }
}

#[async_trait]
impl AbilityCheck for Directory {
    async fn can(
        &self,
        actor: &Actor,
        ability: Ability,
        container: &Container,
    ) -> anyhow::Result<bool> {
        let allowed = self.guest_can(ability, container)
            || match actor {
                Actor::Anonymous => false,
                Actor::User(user) | Actor::SshKey(SshKey { user, .. }) => {
                    self.user_can(user, ability, container)
                }
                Actor::CiJob(job) => self.job_can(job, ability, container),
                Actor::DeployToken(token) => self.deploy_token_can(token, ability, container),
                Actor::DeployKey(key) => self.deploy_key_can(key, ability, container),
            };
        trace!(target: "gitgate::store", "{actor} {ability} on `{container}`: {allowed}");
        Ok(allowed)
    }
}
