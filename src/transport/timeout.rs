/*
 * timeout.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Ragnatela, a socket-level HTTP(S) client engine.
 *
 * Ragnatela is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Ragnatela is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Ragnatela.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Timeout accounting shared by all network transports.

use std::time::{Duration, Instant};

use crate::error::{Result, WebError};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// What the timeout bound applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutMode {
    /// Each socket operation gets the full budget.
    EveryOperation,
    /// Wall-clock time since the connection was opened.
    Total,
    /// Sum of time actually spent inside socket operations.
    SumOfOperations,
}

/// Tracks elapsed time against a single timeout value. Transports bracket
/// every socket operation with [`start`](Self::start) and
/// [`checkpoint`](Self::checkpoint); the remaining budget feeds the
/// OS-level socket timeouts.
#[derive(Debug)]
pub struct TimeoutState {
    timeout: Duration,
    mode: TimeoutMode,
    open_time: Instant,
    start_time: Instant,
    time_taken: Duration,
}

impl Default for TimeoutState {
    fn default() -> Self {
        let now = Instant::now();
        Self {
            timeout: DEFAULT_TIMEOUT,
            mode: TimeoutMode::SumOfOperations,
            open_time: now,
            start_time: now,
            time_taken: Duration::ZERO,
        }
    }
}

impl TimeoutState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_mode(&mut self, mode: TimeoutMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> TimeoutMode {
        self.mode
    }

    /// Marks the start of one socket operation. Opening a connection also
    /// resets the accumulated totals.
    pub fn start(&mut self, opening: bool) {
        let now = Instant::now();
        if opening {
            self.open_time = now;
            self.time_taken = Duration::ZERO;
        }
        self.start_time = now;
    }

    /// Charges the finished operation against the budget and fails the
    /// moment the bound is reached.
    pub fn checkpoint(&mut self) -> Result<()> {
        let taken = match self.mode {
            TimeoutMode::EveryOperation => self.start_time.elapsed(),
            TimeoutMode::Total => self.open_time.elapsed(),
            TimeoutMode::SumOfOperations => {
                self.time_taken += self.start_time.elapsed();
                self.time_taken
            }
        };
        if taken >= self.timeout {
            return Err(WebError::Timeout);
        }
        Ok(())
    }

    /// Remaining budget for the operation in flight. Zero means the next
    /// checkpoint is guaranteed to fail.
    pub fn available(&self) -> Duration {
        match self.mode {
            TimeoutMode::EveryOperation => self.timeout,
            TimeoutMode::Total => self.timeout.saturating_sub(self.open_time.elapsed()),
            TimeoutMode::SumOfOperations => self.timeout.saturating_sub(self.time_taken),
        }
    }
}
