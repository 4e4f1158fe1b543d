// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use super::{ValidationError, Validator};

use gitgate_type::Change;

use axum::async_trait;

/// Restricts snippet pushes to updates of the default branch.
#[derive(Clone, Debug)]
pub struct SnippetCheck {
    default_branch: String,
}

impl SnippetCheck {
    pub fn new(default_branch: impl Into<String>) -> Self {
        Self {
            default_branch: default_branch.into(),
        }
    }
}

#[async_trait]
impl Validator for SnippetCheck {
    fn name(&self) -> &'static str {
        "snippet checks"
    }

    async fn validate(&self, change: &Change) -> Result<(), ValidationError> {
        if change.is_creation() || change.is_deletion() {
            return Err(ValidationError::rule("You can not create or delete branches."));
        }
        if change.branch_name() != Some(self.default_branch.as_str()) {
            return Err(ValidationError::rule("You can only push to the default branch."));
        }
        Ok(())
    }
}
