// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use super::{ValidationError, Validator};

use gitgate_type::Change;

use axum::async_trait;

/// Follows the rules of `git check-ref-format` for fully-qualified names.
fn is_well_formed(name: &str) -> bool {
    name.starts_with("refs/")
        && !name.ends_with('/')
        && !name.ends_with('.')
        && !name.contains("..")
        && !name.contains("//")
        && !name.contains("@{")
        && name != "@"
        && !name
            .chars()
            .any(|c| c.is_ascii_control() || matches!(c, ' ' | '~' | '^' | ':' | '?' | '*' | '[' | '\\'))
        && name
            .split('/')
            .all(|c| !c.starts_with('.') && !c.ends_with(".lock"))
}

/// Validates ref names of a project push and protects the default branch.
#[derive(Clone, Debug)]
pub struct RefCheck {
    default_branch: String,
}

impl RefCheck {
    pub fn new(default_branch: impl Into<String>) -> Self {
        Self {
            default_branch: default_branch.into(),
        }
    }
}

#[async_trait]
impl Validator for RefCheck {
    fn name(&self) -> &'static str {
        "ref checks"
    }

    async fn validate(&self, change: &Change) -> Result<(), ValidationError> {
        if !is_well_formed(&change.ref_name) {
            return Err(ValidationError::Rule(format!(
                "The ref name `{}` is not valid.",
                change.ref_name
            )));
        }
        if change.is_deletion() && change.branch_name() == Some(self.default_branch.as_str()) {
            return Err(ValidationError::rule(
                "The default branch of a project cannot be deleted.",
            ));
        }
        Ok(())
    }
}
