// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    absolute_paths_not_starting_with_crate,
    deprecated_in_future,
    missing_debug_implementations,
    noop_method_call,
    rust_2018_compatibility,
    rust_2018_idioms,
    rust_2021_compatibility,
    trivial_bounds,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_code,
    unreachable_patterns,
    unstable_features,
    unused_import_braces,
    unused_lifetimes
)]

mod builder;
mod gate;
mod handle;

pub mod access;
pub mod auth;
pub mod checks;
pub mod config;
pub mod git;
pub mod internal;
pub mod lookup;
pub mod store;
pub mod users;

#[cfg(test)]
mod tests;

pub use access::{AccessChecker, Decision, DenyKind};
pub use auth::{AuthenticationResult, CredentialResolver, Mechanism, RawCredentials, TokenGuard};
pub use builder::*;
pub use config::Config;
pub use gate::Gate;
pub(crate) use handle::*;
pub use store::Directory;

pub use axum::async_trait;

use std::net::SocketAddr;

use anyhow::Context as _;
use axum::extract::Extension;
use axum::routing::IntoMakeService;
use axum::Router;
use futures::lock::Mutex;
use futures::{AsyncRead, AsyncWrite};
use hyper::server::conn::Http;
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tower::MakeService;
use tracing::trace;

/// Address of the client connected to the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Peer(pub SocketAddr);

pub struct App {
    make_service: Mutex<IntoMakeService<Router>>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App").finish_non_exhaustive()
    }
}

impl App {
    pub fn builder(config: Config) -> Builder {
        Builder::new(config)
    }

    /// Serves HTTP requests arriving on `stream` from `peer`.
    pub async fn handle(
        &self,
        stream: impl 'static + Unpin + AsyncRead + AsyncWrite,
        peer: Option<SocketAddr>,
    ) -> anyhow::Result<()> {
        let mut svc = self
            .make_service
            .lock()
            .await
            .make_service(())
            .await
            .context("failed to create app service")?;
        if let Some(peer) = peer {
            svc = svc.layer(Extension(Peer(peer)));
            trace!(target: "gitgate::App::handle", "add peer `{peer}` to extensions");
        }
        trace!(target: "gitgate::App::handle", "begin HTTP request serving");
        Http::new()
            .serve_connection(stream.compat(), svc)
            .await
            .context("failed to handle request")
    }
}
