// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use super::super::access::{Decision, PROJECT_NOT_FOUND};
use super::super::auth::{AuthenticationResult, Mechanism};
use super::super::Gate;

use gitgate_type::{Abilities, Ability, Actor, Changes, Command, KeyId, Protocol, RepoPath};

use async_std::sync::Arc;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest as _, Sha256};
use tracing::{debug, error, trace, warn};

const SHARED_SECRET_HEADER: &str = "gitlab-shared-secret";

fn protocol_default() -> Protocol {
    Protocol::Ssh
}

/// Body of `POST /api/v4/internal/allowed`.
#[derive(Debug, Deserialize)]
pub struct AllowedRequest {
    pub action: Command,
    #[serde(default)]
    pub key_id: Option<u64>,
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub username: Option<String>,
    pub project: String,
    /// Newline-separated `<old> <new> <ref>` lines.
    #[serde(default)]
    pub changes: String,
    #[serde(default = "protocol_default")]
    pub protocol: Protocol,
}

fn reply(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "status": false, "message": message.into() })),
    )
        .into_response()
}

fn internal_error() -> Response {
    reply(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

/// Checks the `Gitlab-Shared-Secret` header against the configured secret.
///
/// Every call is rejected while no secret is configured.
fn verify_secret(gate: &Gate, headers: &HeaderMap) -> bool {
    let Some(ref expected) = gate.config().shared_secret else {
        return false;
    };
    headers
        .get(SHARED_SECRET_HEADER)
        .and_then(|value| STANDARD.decode(value.as_bytes()).ok())
        .map_or(false, |secret| secrets_match(&secret, expected.as_bytes()))
}

/// Compares the digests of both secrets without exiting on the first differing byte.
fn secrets_match(given: &[u8], expected: &[u8]) -> bool {
    let given = Sha256::digest(given);
    let expected = Sha256::digest(expected);
    given
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

async fn actor(gate: &Gate, req: &AllowedRequest) -> anyhow::Result<Result<Actor, &'static str>> {
    let actors = gate.actors();
    Ok(if let Some(id) = req.key_id {
        actors
            .key(KeyId::new(id))
            .await?
            .ok_or("Could not find the given key")
    } else if let Some(id) = req.user_id {
        actors
            .user_by_id(id)
            .await?
            .map(Actor::User)
            .ok_or("Could not find the given user")
    } else if let Some(ref username) = req.username {
        actors
            .user_by_username(username)
            .await?
            .map(Actor::User)
            .ok_or("Could not find the given user")
    } else {
        Ok(Actor::Anonymous)
    })
}

/// Decides whether the SSH front-end may run `action` on `project`.
pub async fn post(
    Extension(ref gate): Extension<Arc<Gate>>,
    ref headers: HeaderMap,
    Json(ref req): Json<AllowedRequest>,
) -> Response {
    trace!(target: "gitgate::internal::post", "called with {req:?}");

    if !verify_secret(gate, headers) {
        if gate.config().shared_secret.is_none() {
            warn!(target: "gitgate::internal::post", "rejecting internal call, no shared secret is configured");
        } else {
            warn!(target: "gitgate::internal::post", "invalid shared secret");
        }
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "401 Unauthorized" })),
        )
            .into_response();
    }

    let path = match req.project.parse::<RepoPath>() {
        Ok(path) => path,
        Err(e) => {
            debug!(target: "gitgate::internal::post", "invalid project path `{}`: {e}", req.project);
            return reply(StatusCode::NOT_FOUND, PROJECT_NOT_FOUND);
        }
    };
    let changes = match req.changes.parse::<Changes>() {
        Ok(changes) => changes,
        Err(e) => {
            debug!(target: "gitgate::internal::post", "invalid changes: {e:#}");
            return reply(StatusCode::BAD_REQUEST, format!("{e:#}"));
        }
    };

    let actor = match actor(gate, req).await {
        Ok(Ok(actor)) => actor,
        Ok(Err(message)) => return reply(StatusCode::NOT_FOUND, message),
        Err(e) => {
            error!(target: "gitgate::internal::post", "failed to look up actor: {e:#}");
            return internal_error();
        }
    };
    let auth = match actor {
        Actor::Anonymous => AuthenticationResult::new(
            actor,
            None,
            Mechanism::None,
            [Ability::DownloadCode].into_iter().collect::<Abilities>(),
        ),
        actor => AuthenticationResult::new(
            actor,
            None,
            Mechanism::Ssh,
            Abilities::full_authentication(),
        ),
    };

    let located = match gate.locate(&path).await {
        Ok(located) => located,
        Err(e) => {
            error!(target: "gitgate::internal::post", "failed to look up `{path}`: {e:#}");
            return internal_error();
        }
    };

    let decision = gate
        .access_checker(&auth, req.protocol, &path, located.as_ref())
        .check(req.action, &changes)
        .await;
    match decision {
        Decision::Allow { auth, messages } => {
            let container = located.as_ref().map(|located| &located.container);
            Json(json!({
                "status": true,
                "gl_id": auth.actor().gl_id(),
                "gl_username": auth.actor().user().map(|user| &user.username),
                "gl_repository": container.map(|container| container.id().to_string()),
                "gl_project_path": container.map(|container| container.path()),
                "repository_path": container.map(|container| container.disk_path()),
                "gl_console_messages": messages,
            }))
            .into_response()
        }
        Decision::Deny(kind, message) => {
            debug!(target: "gitgate::internal::post", "denied {} on `{path}`: {message}", req.action);
            reply(kind.status(), kind.public_message(&message))
        }
    }
}
