// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use super::super::{Gate, Peer};
use super::{authorize, text};

use gitgate_type::{Command, RepoPath};

use async_std::sync::Arc;
use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::Extension;
use serde::Deserialize;
use tracing::trace;

#[derive(Debug, Deserialize)]
pub struct ServiceQuery {
    service: Option<String>,
}

/// Reference advertisement, `GET <path>.git/info/refs?service=<command>`.
pub async fn get(
    Extension(ref gate): Extension<Arc<Gate>>,
    Extension(ref path): Extension<RepoPath>,
    peer: Option<Extension<Peer>>,
    Query(ServiceQuery { service }): Query<ServiceQuery>,
    ref headers: HeaderMap,
) -> Response {
    trace!(target: "gitgate::git::get", "called for `{path}` with service {service:?}");

    // The dumb HTTP protocol is not served.
    let command = match service.as_deref().map(str::parse::<Command>) {
        Some(Ok(command @ (Command::UploadPack | Command::ReceivePack))) => command,
        _ => {
            return text(
                StatusCode::FORBIDDEN,
                "The command you're trying to execute is not allowed.",
            )
        }
    };
    authorize(gate, path, command, headers, peer.map(|Extension(peer)| peer)).await
}
