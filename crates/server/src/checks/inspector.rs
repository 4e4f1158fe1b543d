// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use super::super::lookup::RepositoryInspector;

use gitgate_type::{Change, Container, Rev};

use anyhow::{bail, Context as _};
use async_std::io::BufReader;
use async_std::process::{Command as Process, Stdio};
use axum::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use futures::{AsyncBufReadExt, StreamExt};
use tracing::{debug, trace};

/// Inspects bare repositories on disk through the `git` executable.
#[derive(Clone, Debug)]
pub struct GitInspector {
    root: Utf8PathBuf,
    git: Utf8PathBuf,
}

impl GitInspector {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            git: "git".into(),
        }
    }

    /// Overrides the `git` executable.
    pub fn with_git(mut self, git: impl Into<Utf8PathBuf>) -> Self {
        self.git = git.into();
        self
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn git(&self, container: &Container) -> Process {
        let mut cmd = Process::new(self.git.as_str());
        let _ = cmd
            .arg("--git-dir")
            .arg(self.root.join(container.disk_path()).as_str())
            .stdin(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }
}

#[async_trait]
impl RepositoryInspector for GitInspector {
    async fn count_files(
        &self,
        container: &Container,
        rev: &Rev,
        limit: usize,
    ) -> anyhow::Result<usize> {
        let mut child = self
            .git(container)
            .args(["ls-tree", "-r", "--name-only", rev.as_str()])
            .stdout(Stdio::piped())
            .spawn()
            .context("failed to spawn `git ls-tree`")?;
        let stdout = child
            .stdout
            .take()
            .context("`git ls-tree` stdout not captured")?;

        let mut lines = BufReader::new(stdout).lines();
        let mut count = 0;
        while let Some(line) = lines.next().await {
            let _ = line.context("failed to read `git ls-tree` output")?;
            count += 1;
            if count > limit {
                trace!(target: "gitgate::checks::inspector", "stop counting files of {rev} at {count}");
                drop(lines);
                // The process may already have exited on its own.
                let _ = child.kill();
                let _ = child.status().await;
                return Ok(count);
            }
        }
        let status = child
            .status()
            .await
            .context("failed to wait for `git ls-tree`")?;
        if !status.success() {
            debug!(target: "gitgate::checks::inspector", "`git ls-tree` for {rev} in `{container}` exited with {status}");
            bail!("`git ls-tree` failed with {status}");
        }
        Ok(count)
    }

    async fn new_bytes(&self, container: &Container, change: &Change) -> anyhow::Result<u64> {
        let output = self
            .git(container)
            .args([
                "rev-list",
                "--objects",
                "--disk-usage",
                change.new_rev.as_str(),
                "--not",
                "--all",
            ])
            .output()
            .await
            .context("failed to run `git rev-list`")?;
        if !output.status.success() {
            bail!("`git rev-list` failed with {}", output.status);
        }
        String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse()
            .context("failed to parse `git rev-list --disk-usage` output")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use gitgate_type::{Project, Visibility};

    fn project() -> Container {
        Container::Project(Project {
            id: 1,
            full_path: "group/missing".into(),
            visibility: Visibility::Private,
            repository_exists: true,
            default_branch: "main".into(),
            repository_size: 0,
            size_limit: None,
        })
    }

    #[async_std::test]
    async fn missing_executable() {
        let inspector = GitInspector::new("/nonexistent/repositories").with_git("/nonexistent/git");
        assert_eq!(inspector.root(), "/nonexistent/repositories");
        assert!(inspector
            .count_files(&project(), &Rev::blank(), 10)
            .await
            .is_err());
        let change = format!("{0} {0} refs/heads/main", "1".repeat(40))
            .parse()
            .unwrap();
        assert!(inspector.new_bytes(&project(), &change).await.is_err());
    }
}
