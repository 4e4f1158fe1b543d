// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use super::super::config::BanConfig;

use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{trace, warn};

#[derive(Debug, Default)]
struct Entry {
    failures: u32,
    window_start: Option<Instant>,
    banned_until: Option<Instant>,
}

impl Entry {
    fn banned(&self, now: Instant) -> bool {
        self.banned_until.map_or(false, |until| now < until)
    }

    /// Neither a ban nor an open counting window remains.
    fn expired(&self, now: Instant, findtime: Duration) -> bool {
        !self.banned(now)
            && self
                .window_start
                .map_or(true, |start| now.duration_since(start) >= findtime)
    }
}

/// Allow2Ban counter of failed authentication attempts per client address.
///
/// An address failing `maxretry` times within `findtime` is banned for
/// `bantime`. Whitelisted addresses are never counted. Expired entries are
/// dropped when looked up and by a sweep running at most once per `findtime`.
#[derive(Debug)]
pub struct Throttle {
    config: BanConfig,
    entries: DashMap<IpAddr, Entry>,
    last_sweep: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(config: BanConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            last_sweep: Mutex::new(None),
        }
    }

    fn applies_to(&self, ip: Option<IpAddr>) -> Option<IpAddr> {
        ip.filter(|ip| self.config.enabled && !self.config.ip_whitelist.contains(ip))
    }

    pub fn is_banned(&self, ip: Option<IpAddr>) -> bool {
        self.is_banned_at(ip, Instant::now())
    }

    pub fn register_failure(&self, ip: Option<IpAddr>) {
        self.register_failure_at(ip, Instant::now())
    }

    pub fn reset(&self, ip: Option<IpAddr>) {
        if let Some(ip) = self.applies_to(ip) {
            let _ = self.entries.remove(&ip);
        }
    }

    fn sweep(&self, now: Instant) {
        let findtime = self.config.findtime();
        {
            let mut last = self
                .last_sweep
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if last.map_or(false, |last| now.duration_since(last) < findtime) {
                return;
            }
            *last = Some(now);
        }
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !entry.expired(now, findtime));
        trace!(
            target: "gitgate::auth::throttle",
            "pruned {} expired entries",
            before.saturating_sub(self.entries.len())
        );
    }

    fn is_banned_at(&self, ip: Option<IpAddr>, now: Instant) -> bool {
        let Some(ip) = self.applies_to(ip) else {
            return false;
        };
        let banned = self
            .entries
            .get(&ip)
            .map_or(false, |entry| entry.banned(now));
        if !banned {
            let findtime = self.config.findtime();
            let _ = self
                .entries
                .remove_if(&ip, |_, entry| entry.expired(now, findtime));
        }
        banned
    }

    fn register_failure_at(&self, ip: Option<IpAddr>, now: Instant) {
        let Some(ip) = self.applies_to(ip) else {
            return;
        };
        self.sweep(now);
        let mut entry = self.entries.entry(ip).or_default();
        if entry.banned(now) {
            return;
        }
        match entry.window_start {
            Some(start) if now.duration_since(start) < self.config.findtime() => {}
            _ => {
                entry.window_start = Some(now);
                entry.failures = 0;
                entry.banned_until = None;
            }
        }
        entry.failures += 1;
        if entry.failures >= self.config.maxretry {
            warn!(target: "gitgate::auth::throttle", "banning {ip} after {} failed attempts", entry.failures);
            entry.banned_until = Some(now + self.config.bantime());
            entry.failures = 0;
            entry.window_start = None;
        }
    }
}
