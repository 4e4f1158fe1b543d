// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use super::{git, internal, users};

use gitgate_type::{Command, RepoPath};

use axum::body::Body;
use axum::handler::Handler;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tower::Service;
use tracing::{debug, info_span, trace, Instrument};
use uuid::Uuid;

/// Parses the URI of `req` and routes it to respective component.
pub async fn handle(req: Request<Body>) -> impl IntoResponse {
    let span = info_span!(
        target: "gitgate::handle",
        "request",
        id = %Uuid::new_v4(),
        method = %req.method(),
        path = %req.uri().path(),
    );
    async move {
        let res = route(req).await.into_response();
        debug!(target: "gitgate::handle", status = %res.status(), "request handled");
        res
    }
    .instrument(span)
    .await
}

async fn route(mut req: Request<Body>) -> Result<Response, (StatusCode, String)> {
    #[inline]
    fn not_found(path: &str) -> (StatusCode, String) {
        (StatusCode::NOT_FOUND, format!("Route `/{path}` not found"))
    }

    trace!(target: "gitgate::handle", "begin HTTP request handling {:?}", req);
    let path = req.uri().path().trim_matches('/').to_string();
    let method = req.method().clone();

    if let Some(api) = path.strip_prefix("api/v4/") {
        return match (api, &method) {
            ("internal/allowed", &Method::POST) => Ok(internal::post
                .into_service()
                .call(req)
                .await
                .into_response()),
            ("user", &Method::GET) => Ok(users::get.into_service().call(req).await.into_response()),
            ("internal/allowed" | "user", _) => Err((
                StatusCode::METHOD_NOT_ALLOWED,
                format!("Method not allowed for `/{path}`"),
            )),
            _ => Err(not_found(&path)),
        };
    }

    let (repo, tail) = path.rsplit_once(".git/").ok_or_else(|| not_found(&path))?;
    let repo = repo.parse::<RepoPath>().map_err(|e| {
        debug!(target: "gitgate::handle", "failed to parse repository path `{repo}`: {e}");
        not_found(&path)
    })?;
    trace!(target: "gitgate::handle", "parsed repository path: `{repo}`");

    let extensions = req.extensions_mut();
    assert_eq!(extensions.insert(repo), None, "duplicate repository path");

    let command = match tail {
        "git-upload-pack" => Some(Command::UploadPack),
        "git-receive-pack" => Some(Command::ReceivePack),
        _ => None,
    };
    match (tail, command, &method) {
        ("info/refs", _, &Method::GET) => {
            Ok(git::get.into_service().call(req).await.into_response())
        }
        (_, Some(command), &Method::POST) => {
            assert_eq!(
                req.extensions_mut().insert(command),
                None,
                "duplicate Git command"
            );
            Ok(git::post.into_service().call(req).await.into_response())
        }
        ("info/refs", _, _) | (_, Some(_), _) => Err((
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed for Git endpoint".into(),
        )),
        _ => Err(not_found(&path)),
    }
}
