// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use async_std::future::timeout;

const HEADER: &str = "Push operation timed out\n\nTiming information for debugging purposes:";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeoutError;

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Push operation timed out")
    }
}

impl std::error::Error for TimeoutError {}

/// Runs named steps against a shared deadline and records their timing.
#[derive(Debug)]
pub struct TimedLogger {
    start: Instant,
    deadline: Duration,
    entries: Vec<String>,
}

impl TimedLogger {
    pub fn new(deadline: Duration) -> Self {
        Self {
            start: Instant::now(),
            deadline,
            entries: vec![],
        }
    }

    fn remaining(&self) -> Option<Duration> {
        self.deadline
            .checked_sub(self.start.elapsed())
            .filter(|d| !d.is_zero())
    }

    /// Runs `fut`, failing if the deadline passes before it completes.
    pub async fn log_timed<T>(
        &mut self,
        name: impl Into<String>,
        fut: impl Future<Output = T>,
    ) -> Result<T, TimeoutError> {
        let name = name.into();
        let Some(remaining) = self.remaining() else {
            self.entries.push(format!("{name} (cancelled)"));
            return Err(TimeoutError);
        };
        let started = Instant::now();
        match timeout(remaining, fut).await {
            Ok(v) => {
                self.entries.push(format!(
                    "{name} ({:.2}ms)",
                    started.elapsed().as_secs_f64() * 1000.0
                ));
                Ok(v)
            }
            Err(_) => {
                self.entries.push(format!("{name} (cancelled)"));
                Err(TimeoutError)
            }
        }
    }

    /// The timeout notice followed by every recorded step.
    pub fn full_message(&self) -> String {
        self.entries
            .iter()
            .fold(HEADER.to_string(), |mut msg, entry| {
                msg.push('\n');
                msg.push_str(entry);
                msg
            })
    }
}
