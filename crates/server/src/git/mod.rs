// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

//! Git smart HTTP endpoints.
//!
//! The gateway does not run Git itself. On success it answers with the
//! environment the Git process runner needs for the request.

mod get;
mod post;

pub use get::*;
pub use post::*;

use super::access::Decision;
use super::auth::{AuthFailure, RawCredentials};
use super::{Gate, Peer};

use gitgate_type::{Changes, Command, Protocol, RepoPath};

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use headers::authorization::Basic;
use headers::{Authorization, HeaderMapExt};
use serde_json::json;
use tracing::{debug, error};
use zeroize::Zeroizing;

const ACCESS_DENIED: &str = "HTTP Basic: Access denied\n";

fn text(status: StatusCode, body: impl Into<String>) -> Response {
    (
        status,
        [(CONTENT_TYPE, mime::TEXT_PLAIN_UTF_8.to_string())],
        body.into(),
    )
        .into_response()
}

fn negotiate_token(headers: &HeaderMap) -> Option<Zeroizing<Vec<u8>>> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("negotiate") {
        return None;
    }
    STANDARD.decode(token.trim()).ok().map(Zeroizing::new)
}

/// Extracts the credentials presented with a Git request.
///
/// Malformed `Authorization` values are treated as absent.
pub(crate) fn credentials(headers: &HeaderMap, peer: Option<Peer>) -> RawCredentials {
    let mut creds = match headers.typed_get::<Authorization<Basic>>() {
        Some(Authorization(basic)) => RawCredentials::basic(basic.username(), basic.password()),
        None => RawCredentials {
            negotiate: negotiate_token(headers),
            ..Default::default()
        },
    };
    creds.ip = peer.map(|Peer(addr)| addr.ip());
    creds
}

fn unauthorized(gate: &Gate) -> Response {
    let mut res = text(StatusCode::UNAUTHORIZED, ACCESS_DENIED);
    let headers = res.headers_mut();
    let _ = headers.append(WWW_AUTHENTICATE, HeaderValue::from_static(r#"Basic realm="GitLab""#));
    if gate.config().kerberos.enabled {
        let _ = headers.append(WWW_AUTHENTICATE, HeaderValue::from_static("Negotiate"));
    }
    res
}

fn missing_personal_access_token(gate: &Gate) -> Response {
    text(
        StatusCode::UNAUTHORIZED,
        format!(
            "{ACCESS_DENIED}You must use a personal access token with 'read_repository' or 'write_repository' scope for Git over HTTP.\nYou can generate one at {}",
            gate.config().gitlab.personal_access_tokens_url()
        ),
    )
}

/// Authenticates and authorizes `command` on `path`.
pub(crate) async fn authorize(
    gate: &Gate,
    path: &RepoPath,
    command: Command,
    headers: &HeaderMap,
    peer: Option<Peer>,
) -> Response {
    let located = match gate.locate(path).await {
        Ok(located) => located,
        Err(e) => {
            error!(target: "gitgate::git", "failed to look up `{path}`: {e:#}");
            return text(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };
    let container = located.as_ref().map(|located| &located.container);

    let creds = credentials(headers, peer);
    let resolved = match gate
        .resolver()
        .resolve(&creds, container, command, Protocol::Http)
        .await
    {
        Ok(resolved) => resolved,
        Err(AuthFailure::Unauthorized) => return unauthorized(gate),
        Err(AuthFailure::MissingPersonalAccessToken) => {
            return missing_personal_access_token(gate)
        }
        Err(AuthFailure::Internal) => {
            return text(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    };

    let decision = gate
        .access_checker(&resolved.auth, Protocol::Http, path, located.as_ref())
        .check(command, &Changes::default())
        .await;
    let (auth, messages) = match decision {
        Decision::Deny(kind, message) => {
            debug!(target: "gitgate::git", "denied {command} on `{path}`: {message}");
            return text(kind.status(), kind.public_message(&message));
        }
        // Moved repositories are only served under their new path over HTTP.
        Decision::Allow { messages, .. }
            if located
                .as_ref()
                .map_or(false, |located| located.redirected_from.is_some()) =>
        {
            return text(StatusCode::NOT_FOUND, messages.join("\n"));
        }
        Decision::Allow { auth, messages } => (auth, messages),
    };

    let mut res = Json(json!({
        "GL_ID": auth.actor().gl_id(),
        "GL_USERNAME": auth.actor().user().map(|user| &user.username),
        "GL_REPOSITORY": container.map(|container| container.id().to_string()),
        "GL_PROJECT_PATH": container.map(|container| container.path()),
        "GL_PROTOCOL": Protocol::Http,
        "RepoPath": container.map(|container| container.disk_path()),
        "message": messages,
    }))
    .into_response();
    if let Some(token) = resolved.negotiate_response {
        match HeaderValue::try_from(format!("Negotiate {}", STANDARD.encode(token))) {
            Ok(value) => {
                let _ = res.headers_mut().insert(WWW_AUTHENTICATE, value);
            }
            Err(e) => error!(target: "gitgate::git", "invalid Negotiate response: {e}"),
        }
    }
    res
}
