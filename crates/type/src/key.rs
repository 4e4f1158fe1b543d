// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, Context as _};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Identifier of an SSH key as used by the shell, `key-<n>`
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct KeyId(u64);

impl KeyId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl FromStr for KeyId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n = s
            .strip_prefix("key-")
            .ok_or_else(|| anyhow!("key ID must start with `key-`"))?;
        if n.is_empty() || !n.bytes().all(|b| b.is_ascii_digit()) {
            return Err(anyhow!("invalid key ID `{s}`"));
        }
        n.parse()
            .map(Self)
            .with_context(|| format!("key ID `{s}` out of range"))
    }
}

impl Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "key-{}", self.0)
    }
}

impl Serialize for KeyId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for KeyId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str() {
        assert!("".parse::<KeyId>().is_err());
        assert!("key-".parse::<KeyId>().is_err());
        assert!("key-x".parse::<KeyId>().is_err());
        assert!("key--1".parse::<KeyId>().is_err());
        assert!("key-+1".parse::<KeyId>().is_err());
        assert!("42".parse::<KeyId>().is_err());

        assert_eq!("key-42".parse::<KeyId>().unwrap(), KeyId(42));
        assert_eq!(KeyId(42).to_string(), "key-42");
    }

    #[test]
    fn serde() {
        assert_eq!(serde_json::to_string(&KeyId(1)).unwrap(), r#""key-1""#);
        assert_eq!(
            serde_json::from_str::<KeyId>(r#""key-9""#).unwrap(),
            KeyId(9)
        );
        assert!(serde_json::from_str::<KeyId>(r#""9""#).is_err());
    }
}
