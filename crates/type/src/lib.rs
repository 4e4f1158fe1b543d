// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

#![warn(rust_2018_idioms, unused_lifetimes, unused_qualifications, clippy::all)]
#![deny(unsafe_code)]

pub mod ability;
pub mod actor;
pub mod change;
pub mod command;
pub mod container;
pub mod key;
pub mod path;
pub mod protocol;
pub mod scope;
pub mod token;

pub use ability::{Abilities, Ability};
pub use actor::{Actor, CiJob, DeployKey, DeployToken, JobStatus, SshKey, User, UserState};
pub use change::{Change, Changes, Rev};
pub use command::Command;
pub use container::{Container, ContainerId, Project, Snippet, Visibility};
pub use key::KeyId;
pub use path::{Kind as RepoKind, Path as RepoPath};
pub use protocol::Protocol;
pub use scope::{Scope, Scopes};
pub use token::{OAuthToken, PersonalAccessToken, Token};
