// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use std::fs::{File, OpenOptions};
use std::io;
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use fs2::FileExt;
use tracing::trace;

const MAX_BACKOFF: Duration = Duration::from_millis(200);

/// An exclusive advisory lock on a sibling lock file, released on drop.
#[derive(Debug)]
pub struct Lock {
    file: File,
}

impl Lock {
    /// Acquires the lock at `path`, polling until `timeout` elapses.
    ///
    /// Returns `Ok(None)` if the lock could not be acquired in time.
    pub fn acquire(path: &Utf8Path, timeout: Duration) -> io::Result<Option<Self>> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let contended = fs2::lock_contended_error().raw_os_error();
        let deadline = Instant::now() + timeout;
        let mut backoff = Duration::from_millis(5);
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    trace!(target: "gitgate::keys::lock", "acquired `{path}`");
                    return Ok(Some(Self { file }));
                }
                Err(e) if e.raw_os_error() == contended => {}
                Err(e) => return Err(e),
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(backoff.min(deadline - now));
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        _ = FileExt::unlock(&self.file);
    }
}
