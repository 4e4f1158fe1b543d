// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use super::super::lookup::RepositoryInspector;
use super::{ValidationError, Validator};

use gitgate_type::{Change, Container};

use std::fmt;

use axum::async_trait;
use tracing::trace;

/// Bounds the number of files in the tree a change points to.
pub struct PushFileCountCheck<'a> {
    container: &'a Container,
    inspector: &'a dyn RepositoryInspector,
    limit: usize,
    require_files: bool,
}

impl fmt::Debug for PushFileCountCheck<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushFileCountCheck")
            .field("container", &self.container.id())
            .field("limit", &self.limit)
            .field("require_files", &self.require_files)
            .finish()
    }
}

impl<'a> PushFileCountCheck<'a> {
    pub fn new(
        container: &'a Container,
        inspector: &'a dyn RepositoryInspector,
        limit: usize,
    ) -> Self {
        Self {
            container,
            inspector,
            limit,
            require_files: false,
        }
    }

    /// Also rejects changes leaving the repository without any file.
    pub fn require_files(mut self) -> Self {
        self.require_files = true;
        self
    }
}

#[async_trait]
impl Validator for PushFileCountCheck<'_> {
    fn name(&self) -> &'static str {
        "file count check"
    }

    async fn validate(&self, change: &Change) -> Result<(), ValidationError> {
        if change.is_deletion() {
            return Ok(());
        }
        let count = self
            .inspector
            .count_files(self.container, &change.new_rev, self.limit)
            .await?;
        trace!(target: "gitgate::checks::file_count", "counted {count} file(s) at {}", change.new_rev);
        if count > self.limit {
            return Err(ValidationError::Rule(format!(
                "The repository can contain at most {} file(s).",
                self.limit
            )));
        }
        if self.require_files && count == 0 {
            return Err(ValidationError::rule(
                "The repository must contain at least 1 file.",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use gitgate_type::{Rev, Snippet, Visibility};

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a fixed file count per revision and records the largest count produced.
    #[derive(Default)]
    struct Files {
        counts: HashMap<String, usize>,
        produced: AtomicUsize,
    }

    #[async_trait]
    impl RepositoryInspector for Files {
        async fn count_files(
            &self,
            _: &Container,
            rev: &Rev,
            limit: usize,
        ) -> anyhow::Result<usize> {
            let count = self.counts.get(rev.as_str()).copied().unwrap_or(0).min(limit + 1);
            let _ = self.produced.fetch_max(count, Ordering::SeqCst);
            Ok(count)
        }

        async fn new_bytes(&self, _: &Container, _: &Change) -> anyhow::Result<u64> {
            Ok(0)
        }
    }

    const A: &str = "1111111111111111111111111111111111111111";
    const B: &str = "2222222222222222222222222222222222222222";
    const C: &str = "3333333333333333333333333333333333333333";

    fn snippet() -> Container {
        Container::PersonalSnippet(Snippet {
            id: 1,
            author_id: 1,
            visibility: Visibility::Private,
            repository_exists: true,
            default_branch: "master".into(),
            repository_size: 0,
        })
    }

    #[async_std::test]
    async fn limit() {
        let files = Files {
            counts: [(A.into(), 10), (B.into(), 100_000), (C.into(), 0)]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let container = snippet();
        let check = PushFileCountCheck::new(&container, &files, 10).require_files();
        let change = |new: &str| format!("{C} {new} refs/heads/master").parse::<Change>().unwrap();

        assert!(check.validate(&change(A)).await.is_ok());
        assert_eq!(
            check.validate(&change(B)).await.unwrap_err().to_string(),
            "The repository can contain at most 10 file(s)."
        );
        assert_eq!(files.produced.load(Ordering::SeqCst), 11);
        assert_eq!(
            check.validate(&change(C)).await.unwrap_err().to_string(),
            "The repository must contain at least 1 file."
        );

        let check = PushFileCountCheck::new(&container, &files, 10);
        assert!(check.validate(&change(C)).await.is_ok());
    }
}
