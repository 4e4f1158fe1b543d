// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use super::super::lookup::RepositoryInspector;
use super::ValidationError;

use gitgate_type::{Changes, Container};

use std::fmt;

use tracing::trace;

/// Formats `bytes` with a binary unit, e.g. `1.5 MiB`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if size < 1024.0 {
            break;
        }
        size /= 1024.0;
        unit = next;
    }
    let formatted = format!("{size:.2}");
    let formatted = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{formatted} {unit}")
}

/// Rejects any push to a repository already above its size limit.
pub fn size_before_push(container: &Container) -> Result<(), ValidationError> {
    match container.size_limit() {
        Some(limit) if container.repository_size() > limit => {
            let size = container.repository_size();
            Err(ValidationError::Rule(format!(
                "The size of this repository ({}) exceeds the limit of {} by {}. \
                 You won't be able to push new code to this project. \
                 Please contact your GitLab administrator for more information.",
                human_size(size),
                human_size(limit),
                human_size(size - limit),
            )))
        }
        _ => Ok(()),
    }
}

/// Bounds the repository size after applying all changes of a push.
pub struct PushSizeCheck<'a> {
    container: &'a Container,
    inspector: &'a dyn RepositoryInspector,
}

impl fmt::Debug for PushSizeCheck<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushSizeCheck")
            .field("container", &self.container.id())
            .finish()
    }
}

impl<'a> PushSizeCheck<'a> {
    pub fn new(container: &'a Container, inspector: &'a dyn RepositoryInspector) -> Self {
        Self {
            container,
            inspector,
        }
    }

    pub async fn validate(&self, changes: &Changes) -> Result<(), ValidationError> {
        let Some(limit) = self.container.size_limit() else {
            return Ok(());
        };
        let mut total = self.container.repository_size();
        for change in changes.iter().filter(|c| !c.is_deletion()) {
            total = total.saturating_add(self.inspector.new_bytes(self.container, change).await?);
            if total > limit {
                trace!(target: "gitgate::checks::push_size", "push exceeds {limit} bytes at {}", change.ref_name);
                return Err(ValidationError::Rule(format!(
                    "Your push has been rejected, because this repository has exceeded its size limit of {}. \
                     Please contact your GitLab administrator for more information.",
                    human_size(limit)
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use gitgate_type::{Change, Project, Rev, Visibility};

    use axum::async_trait;

    struct Grows(u64);

    #[async_trait]
    impl RepositoryInspector for Grows {
        async fn count_files(&self, _: &Container, _: &Rev, _: usize) -> anyhow::Result<usize> {
            Ok(1)
        }

        async fn new_bytes(&self, _: &Container, _: &Change) -> anyhow::Result<u64> {
            Ok(self.0)
        }
    }

    fn project(size: u64, limit: Option<u64>) -> Container {
        Container::Project(Project {
            id: 1,
            full_path: "group/project".into(),
            visibility: Visibility::Private,
            repository_exists: true,
            default_branch: "main".into(),
            repository_size: size,
            size_limit: limit,
        })
    }

    fn changes() -> Changes {
        "1111111111111111111111111111111111111111 2222222222222222222222222222222222222222 refs/heads/a\n\
         1111111111111111111111111111111111111111 3333333333333333333333333333333333333333 refs/heads/b"
            .parse()
            .unwrap()
    }

    #[test]
    fn human() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(1023), "1023 B");
        assert_eq!(human_size(1024), "1 KiB");
        assert_eq!(human_size(1536 * 1024), "1.5 MiB");
        assert_eq!(human_size(10 * 1024 * 1024 * 1024), "10 GiB");
    }

    #[test]
    fn before_push() {
        assert!(size_before_push(&project(100, None)).is_ok());
        assert!(size_before_push(&project(100, Some(100))).is_ok());
        assert_eq!(
            size_before_push(&project(3 * 1024, Some(2 * 1024)))
                .unwrap_err()
                .to_string(),
            "The size of this repository (3 KiB) exceeds the limit of 2 KiB by 1 KiB. \
             You won't be able to push new code to this project. \
             Please contact your GitLab administrator for more information."
        );
    }

    #[async_std::test]
    async fn aggregate() {
        let container = project(1000, Some(2000));
        assert!(PushSizeCheck::new(&container, &Grows(500))
            .validate(&changes())
            .await
            .is_ok());
        let err = PushSizeCheck::new(&container, &Grows(600))
            .validate(&changes())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("size limit of 1.95 KiB"), "{err}");

        let unlimited = project(1000, None);
        assert!(PushSizeCheck::new(&unlimited, &Grows(u64::MAX))
            .validate(&changes())
            .await
            .is_ok());
    }
}
