// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context as _};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

const BRANCH_PREFIX: &str = "refs/heads/";
const TAG_PREFIX: &str = "refs/tags/";

/// A full hexadecimal object ID (SHA-1 or SHA-256)
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[repr(transparent)]
pub struct Rev(String);

impl Rev {
    /// Returns `true` for the all-zero ID denoting an absent ref.
    pub fn is_blank(&self) -> bool {
        self.0.bytes().all(|b| b == b'0')
    }

    pub fn blank() -> Self {
        Self("0".repeat(40))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Rev {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !matches!(s.len(), 40 | 64) {
            bail!("object ID `{s}` has invalid length {}", s.len())
        }
        if !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            bail!("invalid characters in object ID `{s}`")
        }
        Ok(Self(s.into()))
    }
}

impl Display for Rev {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Rev {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Rev {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// One requested ref update within a push
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Change {
    pub old_rev: Rev,
    pub new_rev: Rev,
    #[serde(rename = "ref")]
    pub ref_name: String,
}

impl Change {
    pub fn is_creation(&self) -> bool {
        self.old_rev.is_blank()
    }

    pub fn is_deletion(&self) -> bool {
        self.new_rev.is_blank()
    }

    pub fn branch_name(&self) -> Option<&str> {
        self.ref_name.strip_prefix(BRANCH_PREFIX)
    }

    pub fn tag_name(&self) -> Option<&str> {
        self.ref_name.strip_prefix(TAG_PREFIX)
    }
}

impl FromStr for Change {
    type Err = anyhow::Error;

    /// Parses a `<old-rev> <new-rev> <ref>` line as received by `pre-receive`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(old), Some(new), Some(ref_name), None) => Ok(Self {
                old_rev: old.parse().context("failed to parse old revision")?,
                new_rev: new.parse().context("failed to parse new revision")?,
                ref_name: ref_name.into(),
            }),
            _ => Err(anyhow!("malformed change line `{s}`")),
        }
    }
}

impl Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.old_rev, self.new_rev, self.ref_name)
    }
}

/// An ordered list of changes; empty for read-only operations
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Changes(Vec<Change>);

impl Changes {
    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Change>> for Changes {
    fn from(changes: Vec<Change>) -> Self {
        Self(changes)
    }
}

impl FromIterator<Change> for Changes {
    fn from_iter<T: IntoIterator<Item = Change>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Changes {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromStr for Changes {
    type Err = anyhow::Error;

    /// Parses newline-separated change lines, skipping blank lines.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(i, line)| {
                line.parse()
                    .with_context(|| format!("failed to parse change {}", i + 1))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "1111111111111111111111111111111111111111";
    const B: &str = "2222222222222222222222222222222222222222";
    const Z: &str = "0000000000000000000000000000000000000000";

    #[test]
    fn rev_from_str() {
        assert!("".parse::<Rev>().is_err());
        assert!("abc".parse::<Rev>().is_err());
        assert!(A.to_uppercase().replace('1', "A").parse::<Rev>().is_err());
        assert!(A.parse::<Rev>().is_ok());
        assert!("a".repeat(64).parse::<Rev>().is_ok());
        assert!(Z.parse::<Rev>().unwrap().is_blank());
        assert!(Rev::blank().is_blank());
    }

    #[test]
    fn change_from_str() {
        let change: Change = format!("{A} {B} refs/heads/main").parse().unwrap();
        assert_eq!(change.branch_name(), Some("main"));
        assert_eq!(change.tag_name(), None);
        assert!(!change.is_creation());
        assert!(!change.is_deletion());

        let change: Change = format!("{Z} {B} refs/tags/v1").parse().unwrap();
        assert!(change.is_creation());
        assert_eq!(change.tag_name(), Some("v1"));

        assert!(format!("{A} {B}").parse::<Change>().is_err());
        assert!(format!("{A} {B} refs/heads/a extra").parse::<Change>().is_err());
    }

    #[test]
    fn changes_from_str() {
        let changes: Changes = format!("{A} {B} refs/heads/main\n\n{Z} {B} refs/heads/topic\n")
            .parse()
            .unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes.iter().nth(1).unwrap().branch_name(), Some("topic"));
        assert!("".parse::<Changes>().unwrap().is_empty());
        assert!(format!("{A} {B} refs/heads/main\nbogus").parse::<Changes>().is_err());
    }
}
