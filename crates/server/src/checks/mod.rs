// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

//! Push rules applied to each ref update of a push.

mod file_count;
mod inspector;
mod push_size;
mod refs;
mod snippet;
mod timed;

pub use file_count::PushFileCountCheck;
pub use inspector::GitInspector;
pub use push_size::{human_size, size_before_push, PushSizeCheck};
pub use refs::RefCheck;
pub use snippet::SnippetCheck;
pub use timed::{TimedLogger, TimeoutError};

use gitgate_type::Change;

use std::fmt;

use axum::async_trait;

#[derive(Debug)]
pub enum ValidationError {
    /// The change violates a rule, the message is shown to the client.
    Rule(String),
    /// The rule could not be evaluated.
    Internal(anyhow::Error),
}

impl ValidationError {
    pub fn rule(message: impl Into<String>) -> Self {
        Self::Rule(message.into())
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rule(message) => f.write_str(message),
            Self::Internal(e) => write!(f, "failed to validate change: {e}"),
        }
    }
}

impl std::error::Error for ValidationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rule(_) => None,
            Self::Internal(e) => Some(e.as_ref()),
        }
    }
}

impl From<anyhow::Error> for ValidationError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e)
    }
}

/// A rule validating a single ref update.
#[async_trait]
pub trait Validator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn validate(&self, change: &Change) -> Result<(), ValidationError>;
}
