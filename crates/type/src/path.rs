// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context as _};

/// The kind of repository a [Path] addresses
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Kind {
    Project,
    Wiki,
    Snippet(u64),
}

/// A repository path as requested by a Git client
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Path {
    /// Full project path; `None` only for personal snippets.
    pub project: Option<String>,
    pub kind: Kind,
}

fn validate_segment(s: &str) -> anyhow::Result<()> {
    if s.is_empty() {
        bail!("empty path segment")
    } else if s.starts_with(['-', '.']) || s.ends_with('.') {
        bail!("path segment `{s}` must not start with `-` or `.`, or end with `.`")
    } else if s.contains("..") {
        bail!("path segment `{s}` contains `..`")
    } else if s
        .find(|c| !matches!(c, '0'..='9' | 'a'..='z' | 'A'..='Z' | '_' | '-' | '.'))
        .is_some()
    {
        bail!("invalid characters in path segment `{s}`")
    } else {
        Ok(())
    }
}

fn parse_project(s: &str) -> anyhow::Result<String> {
    let segments = s.split('/').collect::<Vec<_>>();
    if segments.len() < 2 {
        bail!("project path `{s}` must contain a namespace")
    }
    segments.into_iter().try_for_each(validate_segment)?;
    Ok(s.into())
}

impl FromStr for Path {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_matches('/');
        let s = s.strip_suffix(".git").unwrap_or(s);

        match s.rsplit_once("snippets/") {
            Some((head, id)) if (head.is_empty() || head.ends_with('/')) && !id.contains('/') => {
                let id = id
                    .parse::<u64>()
                    .with_context(|| format!("invalid snippet ID `{id}`"))?;
                let head = head.trim_end_matches('/');
                let project = match head.strip_suffix("/-").unwrap_or(head) {
                    "" => None,
                    head => Some(parse_project(head)?),
                };
                return Ok(Self {
                    project,
                    kind: Kind::Snippet(id),
                });
            }
            _ => {}
        }

        if let Some(project) = s.strip_suffix(".wiki") {
            return Ok(Self {
                project: Some(parse_project(project)?),
                kind: Kind::Wiki,
            });
        }

        parse_project(s)
            .map(|project| Self {
                project: Some(project),
                kind: Kind::Project,
            })
            .map_err(|e| anyhow!("invalid repository path `{s}`: {e}"))
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.project, self.kind) {
            (Some(project), Kind::Project) => write!(f, "{project}"),
            (Some(project), Kind::Wiki) => write!(f, "{project}.wiki"),
            (Some(project), Kind::Snippet(id)) => write!(f, "{project}/snippets/{id}"),
            (None, Kind::Snippet(id)) => write!(f, "snippets/{id}"),
            (None, _) => f.write_str(""),
        }
    }
}
