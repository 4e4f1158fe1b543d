// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use super::super::auth::{ApiCredentials, TokenError, READ_USER_SCOPES};
use super::super::Gate;

use async_std::sync::Arc;
use axum::http::{HeaderMap, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::json;
use tracing::{debug, trace};

/// The user owning the presented API token, `GET /api/v4/user`.
pub async fn get(
    Extension(ref gate): Extension<Arc<Gate>>,
    ref headers: HeaderMap,
    uri: Uri,
) -> Response {
    trace!(target: "gitgate::users::get", "called");

    let creds = ApiCredentials::from_request(headers, uri.query());
    let auth = match gate
        .token_guard()
        .authenticate(&creds, &READ_USER_SCOPES, false)
        .await
    {
        Ok(Some(auth)) => auth,
        Ok(None) => return TokenError::TokenNotFound.into_response(),
        Err(e) => {
            debug!(target: "gitgate::users::get", "token rejected: {e}");
            return e.into_response();
        }
    };
    match auth.actor().user() {
        Some(user) => Json(json!({
            "id": user.id,
            "username": user.username,
            "state": user.state,
            "is_admin": user.admin,
            "two_factor_enabled": user.two_factor_enabled,
        }))
        .into_response(),
        None => TokenError::TokenNotFound.into_response(),
    }
}
