// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_branch() -> String {
    "main".into()
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Private,
    Internal,
    Public,
}

/// A project record
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Project {
    pub id: u64,
    /// Full namespace path, e.g. `group/subgroup/project`.
    pub full_path: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default = "default_true")]
    pub repository_exists: bool,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    #[serde(default)]
    pub repository_size: u64,
    #[serde(default)]
    pub size_limit: Option<u64>,
}

/// A snippet record
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Snippet {
    pub id: u64,
    pub author_id: u64,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default = "default_true")]
    pub repository_exists: bool,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    #[serde(default)]
    pub repository_size: u64,
}

/// The repository-bearing entity being accessed
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Container {
    Project(Project),
    ProjectWiki(Project),
    PersonalSnippet(Snippet),
    ProjectSnippet { snippet: Snippet, project: Project },
}

/// The identifier of a container's repository
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ContainerId {
    Project(u64),
    Wiki(u64),
    Snippet(u64),
}

impl Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Project(id) => write!(f, "project-{id}"),
            Self::Wiki(id) => write!(f, "wiki-{id}"),
            Self::Snippet(id) => write!(f, "snippet-{id}"),
        }
    }
}

impl Container {
    pub fn id(&self) -> ContainerId {
        match self {
            Self::Project(p) => ContainerId::Project(p.id),
            Self::ProjectWiki(p) => ContainerId::Wiki(p.id),
            Self::PersonalSnippet(s) | Self::ProjectSnippet { snippet: s, .. } => {
                ContainerId::Snippet(s.id)
            }
        }
    }

    /// Returns the owning project, if any.
    pub fn project(&self) -> Option<&Project> {
        match self {
            Self::Project(p) | Self::ProjectWiki(p) => Some(p),
            Self::ProjectSnippet { project, .. } => Some(project),
            Self::PersonalSnippet(_) => None,
        }
    }

    pub fn snippet(&self) -> Option<&Snippet> {
        match self {
            Self::PersonalSnippet(s) | Self::ProjectSnippet { snippet: s, .. } => Some(s),
            Self::Project(_) | Self::ProjectWiki(_) => None,
        }
    }

    pub fn is_snippet(&self) -> bool {
        self.snippet().is_some()
    }

    /// Path the container is addressed by, without the `.git` suffix.
    pub fn path(&self) -> String {
        match self {
            Self::Project(p) => p.full_path.clone(),
            Self::ProjectWiki(p) => format!("{}.wiki", p.full_path),
            Self::PersonalSnippet(s) => format!("snippets/{}", s.id),
            Self::ProjectSnippet { snippet, project } => {
                format!("{}/snippets/{}", project.full_path, snippet.id)
            }
        }
    }

    /// Repository location relative to the storage root.
    pub fn disk_path(&self) -> String {
        match self {
            Self::Project(p) => format!("{}.git", p.full_path),
            Self::ProjectWiki(p) => format!("{}.wiki.git", p.full_path),
            Self::PersonalSnippet(s) | Self::ProjectSnippet { snippet: s, .. } => {
                format!("@snippets/{}.git", s.id)
            }
        }
    }

    pub fn visibility(&self) -> Visibility {
        match self {
            Self::Project(p) | Self::ProjectWiki(p) => p.visibility,
            Self::PersonalSnippet(s) | Self::ProjectSnippet { snippet: s, .. } => s.visibility,
        }
    }

    pub fn repository_exists(&self) -> bool {
        match self {
            Self::Project(p) | Self::ProjectWiki(p) => p.repository_exists,
            Self::PersonalSnippet(s) | Self::ProjectSnippet { snippet: s, .. } => {
                s.repository_exists
            }
        }
    }

    pub fn default_branch(&self) -> &str {
        match self {
            Self::Project(p) | Self::ProjectWiki(p) => &p.default_branch,
            Self::PersonalSnippet(s) | Self::ProjectSnippet { snippet: s, .. } => {
                &s.default_branch
            }
        }
    }

    pub fn repository_size(&self) -> u64 {
        match self {
            Self::Project(p) | Self::ProjectWiki(p) => p.repository_size,
            Self::PersonalSnippet(s) | Self::ProjectSnippet { snippet: s, .. } => {
                s.repository_size
            }
        }
    }

    /// Repository size limit in bytes; snippets inherit their project's.
    pub fn size_limit(&self) -> Option<u64> {
        self.project().and_then(|p| p.size_limit)
    }
}

impl Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}
