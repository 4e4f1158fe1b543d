// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

//! This crate manages the `authorized_keys` file consumed by `sshd`.
//!
//! The file is read concurrently by an external process, so removed keys are
//! never deleted from it: their line is overwritten in place with `#`
//! characters, keeping the byte offsets of every other line stable.

#![warn(rust_2018_idioms, unused_lifetimes, unused_qualifications, clippy::all)]
#![forbid(unsafe_code)]

mod error;
mod line;
mod lock;

pub use error::*;
pub use lock::Lock;

use std::fs::{File, OpenOptions, Permissions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use serde::Deserialize;
use tracing::{error, info, trace, warn};

/// Lock timeout for single-key mutations.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Lock timeout for [AuthorizedKeys::batch_add_keys].
pub const BATCH_LOCK_TIMEOUT: Duration = Duration::from_secs(300);

const SENTINEL: &str = "# Managed by gitgate";

static KEY_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"key-(\d+)").unwrap());

fn default_file() -> Utf8PathBuf {
    "/home/git/.ssh/authorized_keys".into()
}

fn default_shell_path() -> Utf8PathBuf {
    "/home/git/gitlab-shell".into()
}

/// Authorized keys file configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_file")]
    pub authorized_keys_file: Utf8PathBuf,
    /// Installation directory of the shell invoked by `sshd`.
    #[serde(default = "default_shell_path")]
    pub shell_path: Utf8PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            authorized_keys_file: default_file(),
            shell_path: default_shell_path(),
        }
    }
}

fn is_absent(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
    )
}

/// The `authorized_keys` file port.
#[derive(Clone, Debug)]
pub struct AuthorizedKeys {
    file: Utf8PathBuf,
    lock_file: Utf8PathBuf,
    shell_path: Utf8PathBuf,
    lock_timeout: Duration,
    batch_lock_timeout: Duration,
}

impl From<Config> for AuthorizedKeys {
    fn from(conf: Config) -> Self {
        Self::new(conf.authorized_keys_file, conf.shell_path)
    }
}

impl AuthorizedKeys {
    pub fn new(file: impl Into<Utf8PathBuf>, shell_path: impl Into<Utf8PathBuf>) -> Self {
        let file = file.into();
        let lock_file = format!("{file}.lock").into();
        Self {
            file,
            lock_file,
            shell_path: shell_path.into(),
            lock_timeout: LOCK_TIMEOUT,
            batch_lock_timeout: BATCH_LOCK_TIMEOUT,
        }
    }

    /// Overrides the lock timeouts for single and batch mutations.
    pub fn with_lock_timeouts(mut self, single: Duration, batch: Duration) -> Self {
        self.lock_timeout = single;
        self.batch_lock_timeout = batch;
        self
    }

    pub fn file(&self) -> &Utf8Path {
        &self.file
    }

    pub fn lock_file(&self) -> &Utf8Path {
        &self.lock_file
    }

    fn open(&self, opts: &mut OpenOptions) -> io::Result<File> {
        let file = opts.mode(0o600).open(&self.file)?;
        file.set_permissions(Permissions::from_mode(0o600))?;
        Ok(file)
    }

    fn lock(&self, timeout: Duration) -> Result<Option<Lock>, Error> {
        let lock = Lock::acquire(&self.lock_file, timeout)?;
        if lock.is_none() {
            warn!(target: "gitgate::keys", "timed out after {timeout:?} waiting for `{}`", self.lock_file);
        }
        Ok(lock)
    }

    /// Checks whether the file can be opened for reading.
    pub fn accessible(&self) -> Result<bool, Error> {
        match self.open(OpenOptions::new().read(true)) {
            Ok(_) => Ok(true),
            Err(e) if is_absent(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Creates the file if it does not exist yet.
    pub fn create(&self) -> Result<bool, Error> {
        match self.open(OpenOptions::new().append(true).create(true)) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Appends a managed line for key `id`.
    ///
    /// Fails with [KeyError] before touching the file if `id` or `key` is
    /// malformed. Returns `Ok(false)` if the lock could not be acquired.
    pub fn add_key(&self, id: &str, key: &str) -> Result<bool, Error> {
        let line = line::render(&self.shell_path, id, key)?;
        let Some(_lock) = self.lock(self.lock_timeout)? else {
            return Ok(false);
        };
        info!(target: "gitgate::keys", "Adding key ({id}): {}", line::strip(key));
        let mut file = self.open(OpenOptions::new().append(true).create(true))?;
        file.write_all(format!("{line}\n").as_bytes())?;
        Ok(true)
    }

    /// Appends managed lines for all `keys` under a single lock acquisition.
    ///
    /// Every key is validated before anything is written, so a malformed key
    /// anywhere in the batch leaves the file unchanged and returns `Ok(false)`.
    pub fn batch_add_keys<I, S, K>(&self, keys: I) -> Result<bool, Error>
    where
        I: IntoIterator<Item = (S, K)>,
        S: AsRef<str>,
        K: AsRef<str>,
    {
        let mut buf = String::new();
        let mut count = 0usize;
        for (id, key) in keys {
            match line::render(&self.shell_path, id.as_ref(), key.as_ref()) {
                Ok(line) => {
                    buf.push_str(&line);
                    buf.push('\n');
                    count += 1;
                }
                Err(e) => {
                    error!(target: "gitgate::keys", "rejecting batch: {e}");
                    return Ok(false);
                }
            }
        }
        let Some(_lock) = self.lock(self.batch_lock_timeout)? else {
            return Ok(false);
        };
        info!(target: "gitgate::keys", "Adding {count} keys");
        let mut file = self.open(OpenOptions::new().append(true).create(true))?;
        file.write_all(buf.as_bytes())?;
        Ok(true)
    }

    /// Finds the first line managing `id`, returning its offset and length
    /// without the line terminator.
    fn find(&self, file: &File, id: &str) -> Result<Option<(u64, usize)>, Error> {
        let needle = format!(r#"command="{}""#, line::command(&self.shell_path, id)?);
        let needle = needle.as_bytes();
        let mut rd = BufReader::new(file);
        let mut offset = 0u64;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let n = rd.read_until(b'\n', &mut buf)?;
            if n == 0 {
                return Ok(None);
            }
            if buf.windows(needle.len()).any(|w| w == needle) {
                let len = buf.strip_suffix(b"\n").unwrap_or(&buf).len();
                return Ok(Some((offset, len)));
            }
            offset += n as u64;
        }
    }

    /// Tombstones the line managing `id` by overwriting it with `#`.
    ///
    /// Returns `Ok(true)` once no live line for `id` remains, including when
    /// there was none, and `Ok(false)` if the file is inaccessible or the
    /// lock could not be acquired.
    pub fn remove_key(&self, id: &str) -> Result<bool, Error> {
        _ = line::command(&self.shell_path, id)?;
        if !self.accessible()? {
            return Ok(false);
        }
        let Some(_lock) = self.lock(self.lock_timeout)? else {
            return Ok(false);
        };
        info!(target: "gitgate::keys", "Removing key ({id})");
        let mut file = match self.open(OpenOptions::new().read(true).write(true)) {
            Ok(file) => file,
            Err(e) if is_absent(&e) => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        if let Some((offset, len)) = self.find(&file, id)? {
            trace!(target: "gitgate::keys", "overwriting {len} bytes at offset {offset}");
            _ = file.seek(SeekFrom::Start(offset))?;
            file.write_all(&vec![b'#'; len])?;
            file.flush()?;
        }
        Ok(true)
    }

    /// Checks whether a live line for `id` exists. Takes no lock.
    pub fn key_exists(&self, id: &str) -> Result<bool, Error> {
        _ = line::command(&self.shell_path, id)?;
        let file = match self.open(OpenOptions::new().read(true)) {
            Ok(file) => file,
            Err(e) if is_absent(&e) => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        trace!(target: "gitgate::keys", "Looking for key ({id})");
        Ok(self.find(&file, id)?.is_some())
    }

    /// Returns the numeric IDs of all `key-<n>` entries in file order.
    pub fn list_key_ids(&self) -> Result<Vec<u64>, Error> {
        info!(target: "gitgate::keys", "Listing all key IDs");
        let file = match File::open(&self.file) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };
        let mut ids = vec![];
        for line in BufReader::new(file).split(b'\n') {
            let line = line?;
            if let Some(id) = KEY_ID
                .captures(&line)
                .and_then(|c| std::str::from_utf8(&c[1]).ok()?.parse().ok())
            {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Truncates the file, leaving only the sentinel comment line.
    pub fn clear(&self) -> Result<bool, Error> {
        let Some(_lock) = self.lock(self.lock_timeout)? else {
            return Ok(false);
        };
        info!(target: "gitgate::keys", "Clearing `{}`", self.file);
        let mut file = self.open(
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true),
        )?;
        file.write_all(format!("{SENTINEL}\n").as_bytes())?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    const KEY: &str = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQC user@example.com";

    fn store() -> (tempfile::TempDir, AuthorizedKeys) {
        let dir = tempfile::tempdir().unwrap();
        let file = Utf8PathBuf::from_path_buf(dir.path().join("authorized_keys")).unwrap();
        let keys = AuthorizedKeys::new(file, "/home/git/gitlab-shell")
            .with_lock_timeouts(Duration::from_millis(50), Duration::from_millis(50));
        (dir, keys)
    }

    fn contents(keys: &AuthorizedKeys) -> String {
        fs::read_to_string(keys.file()).unwrap()
    }

    #[test]
    fn accessible_and_create() {
        let (_dir, keys) = store();
        assert!(!keys.accessible().unwrap());
        assert!(keys.create().unwrap());
        assert!(keys.accessible().unwrap());
        assert_eq!(contents(&keys), "");

        let mode = fs::metadata(keys.file()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn add_key() {
        let (_dir, keys) = store();
        assert!(keys.add_key("key-42", KEY).unwrap());
        assert_eq!(
            contents(&keys),
            "command=\"/home/git/gitlab-shell/bin/gitlab-shell key-42\",no-port-forwarding,no-X11-forwarding,no-agent-forwarding,no-pty ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQC\n"
        );
        assert!(keys.key_exists("key-42").unwrap());
        assert!(!keys.key_exists("key-4").unwrap());
        assert_eq!(keys.list_key_ids().unwrap(), vec![42]);
    }

    #[test]
    fn add_malformed_key() {
        let (_dir, keys) = store();
        assert!(keys.add_key("key-1", KEY).unwrap());
        let before = fs::read(keys.file()).unwrap();

        for key in ["ssh-rsa AAAA\nssh-rsa BBBB", "ssh-rsa\tAAAA"] {
            assert!(matches!(
                keys.add_key("key-2", key),
                Err(Error::Key(KeyError::InvalidKey(_)))
            ));
        }
        assert!(matches!(
            keys.add_key("key 2", KEY),
            Err(Error::Key(KeyError::InvalidId(_)))
        ));
        assert_eq!(fs::read(keys.file()).unwrap(), before);
    }

    #[test]
    fn remove_key() {
        let (_dir, keys) = store();
        assert!(keys.clear().unwrap());
        assert!(keys.add_key("key-1", KEY).unwrap());
        assert!(keys.add_key("key-42", KEY).unwrap());
        assert!(keys.add_key("key-3", KEY).unwrap());
        let before = contents(&keys);

        assert!(keys.remove_key("key-42").unwrap());
        let after = contents(&keys);
        assert!(!keys.key_exists("key-42").unwrap());
        assert!(keys.key_exists("key-1").unwrap());
        assert!(keys.key_exists("key-3").unwrap());
        assert_eq!(after.len(), before.len());
        assert_eq!(after.lines().count(), before.lines().count());

        let tombstone = after.lines().nth(2).unwrap();
        assert!(!tombstone.is_empty());
        assert!(tombstone.bytes().all(|b| b == b'#'));
        assert_eq!(tombstone.len(), before.lines().nth(2).unwrap().len());
        assert_eq!(keys.list_key_ids().unwrap(), vec![1, 3]);

        assert!(keys.remove_key("key-42").unwrap());
        assert_eq!(contents(&keys), after);
    }

    #[test]
    fn remove_missing_file() {
        let (_dir, keys) = store();
        assert!(!keys.remove_key("key-1").unwrap());
        assert!(!keys.key_exists("key-1").unwrap());
        assert!(matches!(
            keys.remove_key("key_1"),
            Err(Error::Key(KeyError::InvalidId(_)))
        ));
    }

    #[test]
    fn batch_add_keys() {
        let (_dir, keys) = store();
        assert!(keys
            .batch_add_keys([("key-1", KEY), ("key-2", KEY)])
            .unwrap());
        assert_eq!(keys.list_key_ids().unwrap(), vec![1, 2]);

        let before = fs::read(keys.file()).unwrap();
        assert!(!keys
            .batch_add_keys([("key-3", KEY), ("key-4", "ssh-rsa\nAAAA")])
            .unwrap());
        assert_eq!(fs::read(keys.file()).unwrap(), before);
    }

    #[test]
    fn clear() {
        let (_dir, keys) = store();
        assert!(keys.add_key("key-1", KEY).unwrap());
        assert!(keys.clear().unwrap());
        assert_eq!(contents(&keys), "# Managed by gitgate\n");
        assert!(keys.list_key_ids().unwrap().is_empty());
    }

    #[test]
    fn list_missing_file() {
        let (_dir, keys) = store();
        assert!(keys.list_key_ids().unwrap().is_empty());
    }

    #[test]
    fn lock_timeout() {
        let (_dir, keys) = store();
        assert!(keys.add_key("key-1", KEY).unwrap());
        let before = fs::read(keys.file()).unwrap();

        let held = Lock::acquire(keys.lock_file(), Duration::ZERO)
            .unwrap()
            .unwrap();
        assert!(!keys.add_key("key-2", KEY).unwrap());
        assert!(!keys.batch_add_keys([("key-3", KEY)]).unwrap());
        assert!(!keys.remove_key("key-1").unwrap());
        assert!(!keys.clear().unwrap());
        assert!(keys.key_exists("key-1").unwrap());
        assert_eq!(fs::read(keys.file()).unwrap(), before);

        drop(held);
        assert!(keys.add_key("key-2", KEY).unwrap());
    }
}
