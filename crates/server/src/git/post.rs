// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use super::super::{Gate, Peer};
use super::authorize;

use gitgate_type::{Command, RepoPath};

use async_std::sync::Arc;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Extension;
use tracing::trace;

/// Pack negotiation, `POST <path>.git/git-upload-pack` or `POST <path>.git/git-receive-pack`.
pub async fn post(
    Extension(ref gate): Extension<Arc<Gate>>,
    Extension(ref path): Extension<RepoPath>,
    Extension(command): Extension<Command>,
    peer: Option<Extension<Peer>>,
    ref headers: HeaderMap,
) -> Response {
    trace!(target: "gitgate::git::post", "called for {command} on `{path}`");
    authorize(gate, path, command, headers, peer.map(|Extension(peer)| peer)).await
}
