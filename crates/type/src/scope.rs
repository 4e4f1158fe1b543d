// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// A token scope
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Api,
    ReadApi,
    ReadUser,
    ReadRepository,
    WriteRepository,
    ReadRegistry,
    WriteRegistry,
    Sudo,
}

impl Scope {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::ReadApi => "read_api",
            Self::ReadUser => "read_user",
            Self::ReadRepository => "read_repository",
            Self::WriteRepository => "write_repository",
            Self::ReadRegistry => "read_registry",
            Self::WriteRegistry => "write_registry",
            Self::Sudo => "sudo",
        }
    }

    /// Scopes that make a token usable for Git over HTTP.
    pub const GIT: [Scope; 3] = [Scope::Api, Scope::ReadRepository, Scope::WriteRepository];
}

impl FromStr for Scope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "api" => Ok(Self::Api),
            "read_api" => Ok(Self::ReadApi),
            "read_user" => Ok(Self::ReadUser),
            "read_repository" => Ok(Self::ReadRepository),
            "write_repository" => Ok(Self::WriteRepository),
            "read_registry" => Ok(Self::ReadRegistry),
            "write_registry" => Ok(Self::WriteRegistry),
            "sudo" => Ok(Self::Sudo),
            _ => Err(anyhow!("unknown scope `{s}`")),
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered set of token scopes
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Scopes(BTreeSet<Scope>);

impl Scopes {
    pub fn contains(&self, scope: Scope) -> bool {
        self.0.contains(&scope)
    }

    /// Returns `true` if any of `scopes` is granted.
    pub fn intersects(&self, scopes: &[Scope]) -> bool {
        scopes.iter().any(|s| self.0.contains(s))
    }

    pub fn iter(&self) -> impl Iterator<Item = Scope> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Scope> for Scopes {
    fn from_iter<T: IntoIterator<Item = Scope>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl FromStr for Scopes {
    type Err = anyhow::Error;

    /// Parses a space- or comma-separated scope list.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(Scope::from_str)
            .collect()
    }
}

impl Display for Scopes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for scope in self.iter() {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            write!(f, "{scope}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str() {
        assert!("".parse::<Scope>().is_err());
        assert!("API".parse::<Scope>().is_err());
        assert_eq!("api".parse::<Scope>().unwrap(), Scope::Api);

        let scopes: Scopes = "api, read_repository write_repository".parse().unwrap();
        assert!(scopes.contains(Scope::Api));
        assert!(scopes.contains(Scope::WriteRepository));
        assert!(!scopes.contains(Scope::Sudo));
        assert_eq!(scopes.to_string(), "api read_repository write_repository");

        assert!("api,bogus".parse::<Scopes>().is_err());
        assert!("".parse::<Scopes>().unwrap().is_empty());
    }

    #[test]
    fn intersects() {
        let scopes: Scopes = "read_user".parse().unwrap();
        assert!(!scopes.intersects(&Scope::GIT));
        let scopes: Scopes = "read_user read_repository".parse().unwrap();
        assert!(scopes.intersects(&Scope::GIT));
    }
}
