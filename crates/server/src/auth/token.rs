// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use super::super::lookup::{ActorLookup, ContainerLookup};
use super::{AuthenticationResult, Mechanism};

use gitgate_type::{
    Abilities, Ability, Actor, CiJob, Container, DeployToken, Scope, Token,
};

use std::fmt;

use axum::http::header::{HeaderMap, WWW_AUTHENTICATE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, error, trace};
use zeroize::Zeroizing;

const PRIVATE_TOKEN_HEADER: &str = "private-token";
const JOB_TOKEN_HEADER: &str = "job-token";
const DEPLOY_TOKEN_HEADER: &str = "deploy-token";

/// Token validation failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenError {
    TokenNotFound,
    RevokedToken,
    ExpiredToken,
    /// The token lacks all of the listed scopes.
    InsufficientScope(Vec<Scope>),
    Internal,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenNotFound => f.write_str("401 Unauthorized"),
            Self::RevokedToken => f.write_str("Token has been revoked"),
            Self::ExpiredToken => f.write_str("Token has expired"),
            Self::InsufficientScope(_) => f.write_str(
                "The request requires higher privileges than provided by the access token.",
            ),
            Self::Internal => f.write_str("500 Internal Server Error"),
        }
    }
}

impl std::error::Error for TokenError {}

impl IntoResponse for TokenError {
    fn into_response(self) -> Response {
        match self {
            Self::TokenNotFound => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": self.to_string() })),
            )
                .into_response(),
            Self::RevokedToken | Self::ExpiredToken => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "invalid_token", "error_description": self.to_string() })),
            )
                .into_response(),
            Self::InsufficientScope(ref scopes) => {
                let scopes = scopes.iter().map(Scope::as_str).collect::<Vec<_>>().join(" ");
                let challenge = format!(
                    r#"Bearer realm="GitLab", error="insufficient_scope", error_description="{self}", scope="{scopes}""#
                );
                (
                    StatusCode::FORBIDDEN,
                    [(WWW_AUTHENTICATE, challenge)],
                    Json(json!({
                        "error": "insufficient_scope",
                        "error_description": self.to_string(),
                        "scope": scopes,
                    })),
                )
                    .into_response()
            }
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": self.to_string() })),
            )
                .into_response(),
        }
    }
}

/// Tokens presented to an API endpoint.
#[derive(Default)]
pub struct ApiCredentials {
    /// `PRIVATE-TOKEN` header or `private_token` query parameter.
    pub private_token: Option<Zeroizing<String>>,
    /// `Authorization: Bearer` value.
    pub bearer: Option<Zeroizing<String>>,
    /// `JOB-TOKEN` header or `job_token` query parameter.
    pub job_token: Option<Zeroizing<String>>,
    /// `Deploy-Token` header.
    pub deploy_token: Option<Zeroizing<String>>,
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("private_token", &self.private_token.is_some())
            .field("bearer", &self.bearer.is_some())
            .field("job_token", &self.job_token.is_some())
            .field("deploy_token", &self.deploy_token.is_some())
            .finish()
    }
}

impl ApiCredentials {
    /// Extracts tokens from request headers and the raw query string.
    pub fn from_request(headers: &HeaderMap, query: Option<&str>) -> Self {
        fn header(headers: &HeaderMap, name: &str) -> Option<Zeroizing<String>> {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(|v| Zeroizing::new(v.to_string()))
        }

        fn param(query: Option<&str>, name: &str) -> Option<Zeroizing<String>> {
            url::form_urlencoded::parse(query?.as_bytes())
                .find(|(k, v)| k == name && !v.is_empty())
                .map(|(_, v)| Zeroizing::new(v.into_owned()))
        }

        let bearer = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Zeroizing::new(v.to_string()));

        Self {
            private_token: header(headers, PRIVATE_TOKEN_HEADER)
                .or_else(|| param(query, "private_token")),
            bearer,
            job_token: header(headers, JOB_TOKEN_HEADER).or_else(|| param(query, "job_token")),
            deploy_token: header(headers, DEPLOY_TOKEN_HEADER),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.private_token.is_none()
            && self.bearer.is_none()
            && self.job_token.is_none()
            && self.deploy_token.is_none()
    }
}

/// Checks revocation, expiry and scopes of `token`, in that order.
pub(crate) fn validate(
    token: &impl Token,
    scopes: &[Scope],
    now: DateTime<Utc>,
) -> Result<(), TokenError> {
    if token.is_revoked() {
        Err(TokenError::RevokedToken)
    } else if token.is_expired(now) {
        Err(TokenError::ExpiredToken)
    } else if !scopes.is_empty() && !token.scopes().intersects(scopes) {
        Err(TokenError::InsufficientScope(scopes.to_vec()))
    } else {
        Ok(())
    }
}

/// Abilities a deploy token grants on its project.
pub(crate) fn deploy_token_abilities(token: &DeployToken) -> Abilities {
    token
        .scopes
        .iter()
        .filter_map(|scope| match scope {
            Scope::ReadRepository => Some(Ability::DownloadCode),
            Scope::WriteRepository => Some(Ability::PushCode),
            Scope::ReadRegistry => Some(Ability::ReadContainerImage),
            Scope::WriteRegistry => Some(Ability::CreateContainerImage),
            _ => None,
        })
        .collect()
}

fn internal(e: anyhow::Error) -> TokenError {
    error!(target: "gitgate::auth::token", "token lookup failed: {e:#}");
    TokenError::Internal
}

/// Validates API tokens: personal access, OAuth, CI job and deploy tokens.
#[derive(Clone, Copy)]
pub struct TokenGuard<'a> {
    actors: &'a dyn ActorLookup,
    containers: &'a dyn ContainerLookup,
}

impl fmt::Debug for TokenGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGuard").finish_non_exhaustive()
    }
}

impl<'a> TokenGuard<'a> {
    pub fn new(actors: &'a dyn ActorLookup, containers: &'a dyn ContainerLookup) -> Self {
        Self { actors, containers }
    }

    /// Authenticates the token in `creds` for a route accepting `scopes`.
    ///
    /// Returns `Ok(None)` if no token was presented at all. Job tokens are
    /// only considered when `allow_job_token` is set.
    pub async fn authenticate(
        &self,
        creds: &ApiCredentials,
        scopes: &[Scope],
        allow_job_token: bool,
    ) -> Result<Option<AuthenticationResult>, TokenError> {
        let now = Utc::now();
        if allow_job_token {
            if let Some(ref token) = creds.job_token {
                trace!(target: "gitgate::auth::token", "authenticate job token");
                return self.job_token(token).await.map(Some);
            }
        }
        if let Some(ref token) = creds.deploy_token {
            trace!(target: "gitgate::auth::token", "authenticate deploy token");
            return self.deploy_token(token, scopes, now).await.map(Some);
        }
        if let Some(ref token) = creds.private_token {
            trace!(target: "gitgate::auth::token", "authenticate private token");
            return self.personal_access_token(token, scopes, now).await.map(Some);
        }
        if let Some(ref token) = creds.bearer {
            trace!(target: "gitgate::auth::token", "authenticate bearer token");
            return match self.oauth_token(token, scopes, now).await {
                Err(TokenError::TokenNotFound) => {
                    self.personal_access_token(token, scopes, now).await
                }
                res => res,
            }
            .map(Some);
        }
        Ok(None)
    }

    pub(crate) async fn job_token(&self, token: &str) -> Result<AuthenticationResult, TokenError> {
        let job = self
            .actors
            .job_by_token(token)
            .await
            .map_err(internal)?
            .filter(CiJob::is_running)
            .ok_or(TokenError::TokenNotFound)?;
        let container = self
            .containers
            .project(job.project_id)
            .await
            .map_err(internal)?
            .map(Container::Project);
        debug!(target: "gitgate::auth::token", "authenticated job {}", job.id);
        Ok(AuthenticationResult::new(
            Actor::CiJob(job),
            container,
            Mechanism::JobToken,
            Abilities::build_authentication(),
        ))
    }

    pub(crate) async fn deploy_token(
        &self,
        token: &str,
        scopes: &[Scope],
        now: DateTime<Utc>,
    ) -> Result<AuthenticationResult, TokenError> {
        let token = self
            .actors
            .deploy_token(token)
            .await
            .map_err(internal)?
            .ok_or(TokenError::TokenNotFound)?;
        validate(&token, scopes, now)?;
        let container = self
            .containers
            .project(token.project_id)
            .await
            .map_err(internal)?
            .map(Container::Project);
        let abilities = deploy_token_abilities(&token);
        Ok(AuthenticationResult::new(
            Actor::DeployToken(token),
            container,
            Mechanism::DeployToken,
            abilities,
        ))
    }

    pub(crate) async fn personal_access_token(
        &self,
        token: &str,
        scopes: &[Scope],
        now: DateTime<Utc>,
    ) -> Result<AuthenticationResult, TokenError> {
        let token = self
            .actors
            .personal_access_token(token)
            .await
            .map_err(internal)?
            .ok_or(TokenError::TokenNotFound)?;
        validate(&token, scopes, now)?;
        trace!(target: "gitgate::auth::token", "personal access token `{}` valid", token.name);
        Ok(AuthenticationResult::new(
            Actor::User(token.user),
            None,
            Mechanism::PersonalAccessToken,
            Abilities::for_scopes(&token.scopes),
        ))
    }

    pub(crate) async fn oauth_token(
        &self,
        token: &str,
        scopes: &[Scope],
        now: DateTime<Utc>,
    ) -> Result<AuthenticationResult, TokenError> {
        let token = self
            .actors
            .oauth_token(token)
            .await
            .map_err(internal)?
            .ok_or(TokenError::TokenNotFound)?;
        validate(&token, scopes, now)?;
        Ok(AuthenticationResult::new(
            Actor::User(token.user),
            None,
            Mechanism::OAuth,
            Abilities::for_scopes(&token.scopes),
        ))
    }
}

/// Scopes granting access to the `user` API endpoint.
pub(crate) const READ_USER_SCOPES: [Scope; 3] = [Scope::Api, Scope::ReadApi, Scope::ReadUser];

#[cfg(test)]
mod tests {
    use super::*;

    use crate::store::Directory;

    use axum::http::HeaderValue;
    use chrono::Duration;

    const DIRECTORY: &str = r#"
[[users]]
id = 1
username = "alice"

[[personal_access_tokens]]
id = 1
name = "git"
user = "alice"
token = "glpat-git"
scopes = ["read_repository"]

[[personal_access_tokens]]
id = 2
name = "revoked"
user = "alice"
token = "glpat-revoked"
scopes = ["api"]
revoked = true

[[personal_access_tokens]]
id = 3
name = "expired"
user = "alice"
token = "glpat-expired"
scopes = ["api"]
expires_at = "2000-01-01T00:00:00Z"

[[oauth_tokens]]
id = 1
user = "alice"
token = "oauth-api"
scopes = ["api"]

[[projects]]
id = 1
full_path = "group/project"

[[deploy_tokens]]
id = 1
username = "gitlab+deploy-token-1"
project_id = 1
token = "deploy"
scopes = ["read_repository"]

[[jobs]]
id = 9
project_id = 1
user = "alice"
token = "job-running"
status = "running"

[[jobs]]
id = 10
project_id = 1
user = "alice"
token = "job-done"
status = "success"
"#;

    fn directory() -> Directory {
        Directory::from_toml(DIRECTORY).unwrap()
    }

    fn creds(f: impl FnOnce(&mut ApiCredentials)) -> ApiCredentials {
        let mut creds = ApiCredentials::default();
        f(&mut creds);
        creds
    }

    fn token(s: &str) -> Option<Zeroizing<String>> {
        Some(Zeroizing::new(s.into()))
    }

    #[test]
    fn from_request() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("PRIVATE-TOKEN", HeaderValue::from_static("pat"));
        let _ = headers.insert("authorization", HeaderValue::from_static("Bearer  oauth "));
        let creds = ApiCredentials::from_request(&headers, Some("job_token=job&x=1"));
        assert_eq!(creds.private_token.as_deref().map(String::as_str), Some("pat"));
        assert_eq!(creds.bearer.as_deref().map(String::as_str), Some("oauth"));
        assert_eq!(creds.job_token.as_deref().map(String::as_str), Some("job"));
        assert!(creds.deploy_token.is_none());

        let creds = ApiCredentials::from_request(&HeaderMap::new(), Some("private_token=q"));
        assert_eq!(creds.private_token.as_deref().map(String::as_str), Some("q"));
        assert!(ApiCredentials::from_request(&HeaderMap::new(), None).is_empty());
    }

    #[test]
    fn validation_order() {
        let now = Utc::now();
        let mut token = DeployToken {
            id: 1,
            username: "deployer".into(),
            project_id: 1,
            scopes: "read_registry".parse().unwrap(),
            revoked: true,
            expires_at: Some(now - Duration::days(1)),
        };
        assert_eq!(
            validate(&token, &Scope::GIT, now),
            Err(TokenError::RevokedToken)
        );
        token.revoked = false;
        assert_eq!(
            validate(&token, &Scope::GIT, now),
            Err(TokenError::ExpiredToken)
        );
        token.expires_at = None;
        assert_eq!(
            validate(&token, &Scope::GIT, now),
            Err(TokenError::InsufficientScope(Scope::GIT.to_vec()))
        );
        token.scopes = "read_repository".parse().unwrap();
        assert_eq!(validate(&token, &Scope::GIT, now), Ok(()));
    }

    #[async_std::test]
    async fn personal_access_tokens() {
        let dir = directory();
        let guard = TokenGuard::new(&dir, &dir);

        let res = guard
            .authenticate(&creds(|c| c.private_token = token("glpat-git")), &Scope::GIT, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(res.mechanism(), Mechanism::PersonalAccessToken);
        assert_eq!(res.actor().user().unwrap().username, "alice");
        assert!(res.abilities().contains(Ability::DownloadCode));
        assert!(!res.abilities().contains(Ability::PushCode));

        assert_eq!(
            guard
                .authenticate(&creds(|c| c.private_token = token("glpat-git")), &READ_USER_SCOPES, false)
                .await,
            Err(TokenError::InsufficientScope(READ_USER_SCOPES.to_vec()))
        );
        assert_eq!(
            guard
                .authenticate(&creds(|c| c.private_token = token("glpat-revoked")), &[], false)
                .await,
            Err(TokenError::RevokedToken)
        );
        assert_eq!(
            guard
                .authenticate(&creds(|c| c.private_token = token("glpat-expired")), &[], false)
                .await,
            Err(TokenError::ExpiredToken)
        );
        assert_eq!(
            guard
                .authenticate(&creds(|c| c.private_token = token("nope")), &[], false)
                .await,
            Err(TokenError::TokenNotFound)
        );
        assert_eq!(guard.authenticate(&creds(|_| {}), &[], false).await, Ok(None));
    }

    #[async_std::test]
    async fn bearer_tokens() {
        let dir = directory();
        let guard = TokenGuard::new(&dir, &dir);

        let res = guard
            .authenticate(&creds(|c| c.bearer = token("oauth-api")), &READ_USER_SCOPES, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(res.mechanism(), Mechanism::OAuth);
        assert_eq!(res.abilities(), &Abilities::full_authentication());

        let res = guard
            .authenticate(&creds(|c| c.bearer = token("glpat-git")), &Scope::GIT, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(res.mechanism(), Mechanism::PersonalAccessToken);
    }

    #[async_std::test]
    async fn job_and_deploy_tokens() {
        let dir = directory();
        let guard = TokenGuard::new(&dir, &dir);

        let res = guard
            .authenticate(&creds(|c| c.job_token = token("job-running")), &[], true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(res.mechanism(), Mechanism::JobToken);
        assert_eq!(res.abilities(), &Abilities::build_authentication());
        assert_eq!(res.container().unwrap().path(), "group/project");

        assert_eq!(
            guard
                .authenticate(&creds(|c| c.job_token = token("job-done")), &[], true)
                .await,
            Err(TokenError::TokenNotFound)
        );
        assert_eq!(
            guard
                .authenticate(&creds(|c| c.job_token = token("job-running")), &[], false)
                .await,
            Ok(None)
        );

        let res = guard
            .authenticate(&creds(|c| c.deploy_token = token("deploy")), &Scope::GIT, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(res.mechanism(), Mechanism::DeployToken);
        assert!(res.abilities().contains(Ability::DownloadCode));
        assert!(!res.abilities().contains(Ability::PushCode));
    }

    #[async_std::test]
    async fn insufficient_scope_response() {
        let res = TokenError::InsufficientScope(vec![Scope::Api, Scope::ReadUser]).into_response();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            res.headers()[WWW_AUTHENTICATE],
            r#"Bearer realm="GitLab", error="insufficient_scope", error_description="The request requires higher privileges than provided by the access token.", scope="api read_user""#
        );
        assert_eq!(
            TokenError::RevokedToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
