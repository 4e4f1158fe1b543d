// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use super::{Scope, Scopes};

use std::collections::BTreeSet;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A named permission granted to an actor for a container
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    ReadProject,
    DownloadCode,
    PushCode,
    ReadContainerImage,
    CreateContainerImage,
    AdminContainerImage,
    BuildDownloadCode,
    BuildReadContainerImage,
    BuildCreateContainerImage,
    ReadSnippet,
    UpdateSnippet,
}

impl Display for Ability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::ReadProject => "read_project",
            Self::DownloadCode => "download_code",
            Self::PushCode => "push_code",
            Self::ReadContainerImage => "read_container_image",
            Self::CreateContainerImage => "create_container_image",
            Self::AdminContainerImage => "admin_container_image",
            Self::BuildDownloadCode => "build_download_code",
            Self::BuildReadContainerImage => "build_read_container_image",
            Self::BuildCreateContainerImage => "build_create_container_image",
            Self::ReadSnippet => "read_snippet",
            Self::UpdateSnippet => "update_snippet",
        })
    }
}

/// The capability set carried by an authentication result
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Abilities(BTreeSet<Ability>);

impl Abilities {
    pub fn none() -> Self {
        Self::default()
    }

    /// Abilities of a read-only authenticated actor.
    pub fn read_authentication() -> Self {
        [
            Ability::ReadProject,
            Ability::DownloadCode,
            Ability::ReadContainerImage,
        ]
        .into_iter()
        .collect()
    }

    /// Abilities of a fully authenticated actor.
    pub fn full_authentication() -> Self {
        Self::read_authentication().union([
            Ability::PushCode,
            Ability::CreateContainerImage,
            Ability::AdminContainerImage,
        ])
    }

    /// Abilities of a CI job authenticated by its job token.
    pub fn build_authentication() -> Self {
        [
            Ability::ReadProject,
            Ability::BuildDownloadCode,
            Ability::BuildReadContainerImage,
            Ability::BuildCreateContainerImage,
        ]
        .into_iter()
        .collect()
    }

    pub fn for_scopes(scopes: &Scopes) -> Self {
        scopes
            .iter()
            .fold(Self::none(), |abilities, scope| match scope {
                Scope::Api => abilities.union(Self::full_authentication().0),
                Scope::ReadRepository => abilities.union([Ability::DownloadCode]),
                Scope::WriteRepository => {
                    abilities.union([Ability::DownloadCode, Ability::PushCode])
                }
                Scope::ReadRegistry => abilities.union([Ability::ReadContainerImage]),
                Scope::WriteRegistry => abilities.union([Ability::CreateContainerImage]),
                Scope::ReadApi | Scope::ReadUser | Scope::Sudo => abilities,
            })
    }

    pub fn contains(&self, ability: Ability) -> bool {
        self.0.contains(&ability)
    }

    /// Returns a copy restricted to the abilities in `allowed`.
    pub fn restrict(&self, allowed: &[Ability]) -> Self {
        self.0
            .iter()
            .copied()
            .filter(|a| allowed.contains(a))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = Ability> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn union(mut self, other: impl IntoIterator<Item = Ability>) -> Self {
        self.0.extend(other);
        self
    }
}

impl FromIterator<Ability> for Abilities {
    fn from_iter<T: IntoIterator<Item = Ability>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_scopes() {
        let abilities = Abilities::for_scopes(&"read_repository".parse().unwrap());
        assert!(abilities.contains(Ability::DownloadCode));
        assert!(!abilities.contains(Ability::PushCode));

        let abilities = Abilities::for_scopes(&"write_repository".parse().unwrap());
        assert!(abilities.contains(Ability::DownloadCode));
        assert!(abilities.contains(Ability::PushCode));

        assert_eq!(
            Abilities::for_scopes(&"api".parse().unwrap()),
            Abilities::full_authentication()
        );
        assert!(Abilities::for_scopes(&"read_user sudo".parse().unwrap()).is_empty());
    }

    #[test]
    fn restrict() {
        let abilities =
            Abilities::full_authentication().restrict(&[Ability::DownloadCode, Ability::PushCode]);
        assert_eq!(
            abilities.iter().collect::<Vec<_>>(),
            vec![Ability::DownloadCode, Ability::PushCode]
        );
    }

    #[test]
    fn serde() {
        let abilities: Abilities = [Ability::DownloadCode].into_iter().collect();
        assert_eq!(
            serde_json::to_string(&abilities).unwrap(),
            r#"["download_code"]"#
        );
    }
}
