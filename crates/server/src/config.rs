// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use gitgate_type::Protocol;

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

fn default_external_url() -> Url {
    Url::parse("http://localhost/").expect("invalid default external URL")
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct GitlabConfig {
    /// Public URL of the web application, used in user-facing messages.
    pub external_url: Url,
}

impl Default for GitlabConfig {
    fn default() -> Self {
        Self {
            external_url: default_external_url(),
        }
    }
}

impl GitlabConfig {
    pub fn personal_access_tokens_url(&self) -> String {
        format!(
            "{}/-/profile/personal_access_tokens",
            self.external_url.as_str().trim_end_matches('/')
        )
    }

    pub fn http_url_to_repo(&self, path: &str) -> String {
        format!("{}/{path}.git", self.external_url.as_str().trim_end_matches('/'))
    }

    pub fn ssh_url_to_repo(&self, path: &str) -> String {
        let host = self.external_url.host_str().unwrap_or("localhost");
        format!("git@{host}:{path}.git")
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct GitConfig {
    pub protocols: BTreeSet<Protocol>,
    pub password_authentication_enabled: bool,
    pub read_only: bool,
    pub upload_pack: bool,
    pub receive_pack: bool,
    pub check_timeout_secs: u64,
    pub project_file_limit: Option<usize>,
    pub snippet_file_limit: usize,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            protocols: [Protocol::Http, Protocol::Ssh].into_iter().collect(),
            password_authentication_enabled: true,
            read_only: false,
            upload_pack: true,
            receive_pack: true,
            check_timeout_secs: 50,
            project_file_limit: None,
            snippet_file_limit: 10,
        }
    }
}

impl GitConfig {
    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }

    /// Web access is always allowed, it is not a Git transport.
    pub fn protocol_allowed(&self, protocol: Protocol) -> bool {
        protocol == Protocol::Web || self.protocols.contains(&protocol)
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct KerberosConfig {
    pub enabled: bool,
}

/// Allow2Ban parameters for failed HTTP Basic attempts.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BanConfig {
    pub enabled: bool,
    pub ip_whitelist: BTreeSet<IpAddr>,
    pub maxretry: u32,
    pub findtime_secs: u64,
    pub bantime_secs: u64,
}

impl Default for BanConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ip_whitelist: Default::default(),
            maxretry: 10,
            findtime_secs: 60,
            bantime_secs: 3600,
        }
    }
}

impl BanConfig {
    pub fn findtime(&self) -> Duration {
        Duration::from_secs(self.findtime_secs)
    }

    pub fn bantime(&self) -> Duration {
        Duration::from_secs(self.bantime_secs)
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ThrottleConfig {
    pub git_basic_auth: BanConfig,
}

/// Gateway configuration.
///
/// Unknown top-level tables are ignored, so that the gateway can share a file
/// with the settings of the binary embedding it.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub gitlab: GitlabConfig,
    pub git: GitConfig,
    pub kerberos: KerberosConfig,
    pub throttle: ThrottleConfig,
    /// Secret expected in the `Gitlab-Shared-Secret` header of internal API calls.
    /// The internal API rejects every call while this is unset.
    pub shared_secret: Option<String>,
}

impl Config {
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let conf = Config::from_toml("").unwrap();
        assert_eq!(conf, Config::default());
        assert!(conf.git.protocol_allowed(Protocol::Http));
        assert!(conf.git.protocol_allowed(Protocol::Ssh));
        assert_eq!(conf.git.check_timeout(), Duration::from_secs(50));
        assert_eq!(conf.git.snippet_file_limit, 10);
        assert_eq!(conf.throttle.git_basic_auth.maxretry, 10);
        assert_eq!(
            conf.gitlab.personal_access_tokens_url(),
            "http://localhost/-/profile/personal_access_tokens"
        );
    }

    #[test]
    fn from_toml() {
        let conf = Config::from_toml(
            r#"
shared_secret = "s3cret"

[gitlab]
external_url = "https://git.example.com/"

[git]
protocols = ["ssh"]
password_authentication_enabled = false
project_file_limit = 100

[kerberos]
enabled = true

[throttle.git_basic_auth]
enabled = true
ip_whitelist = ["127.0.0.1"]
maxretry = 3
"#,
        )
        .unwrap();
        assert!(!conf.git.protocol_allowed(Protocol::Http));
        assert!(conf.git.protocol_allowed(Protocol::Web));
        assert!(!conf.git.password_authentication_enabled);
        assert_eq!(conf.git.project_file_limit, Some(100));
        assert!(conf.kerberos.enabled);
        assert_eq!(conf.throttle.git_basic_auth.maxretry, 3);
        assert_eq!(conf.throttle.git_basic_auth.bantime_secs, 3600);
        assert_eq!(
            conf.gitlab.http_url_to_repo("group/project"),
            "https://git.example.com/group/project.git"
        );
        assert_eq!(
            conf.gitlab.ssh_url_to_repo("group/project"),
            "git@git.example.com:group/project.git"
        );

        assert!(Config::from_toml("[git]\nunknown = 1").is_err());
    }
}
