// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Short-lived notices shown in the tray tooltip.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Shows one notice at a time, each for a fixed duration.
#[derive(Debug)]
pub struct NoticeBoard {
    duration: Duration,
    queue: VecDeque<String>,
    current: Option<(String, Instant)>,
}

impl NoticeBoard {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            queue: VecDeque::new(),
            current: None,
        }
    }

    /// Queue a notice. It is shown right away if nothing else is.
    pub fn post(&mut self, notice: String, now: Instant) {
        self.queue.push_back(notice);
        if self.current.is_none() {
            self.advance(now);
        }
    }

    /// Drop the current notice if its time is up and show the next one.
    /// Returns true if the visible notice changed.
    pub fn expire(&mut self, now: Instant) -> bool {
        match &self.current {
            Some((_, deadline)) if *deadline <= now => {
                self.current = None;
                self.advance(now);
                true
            }
            _ => false,
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_ref().map(|(notice, _)| notice.as_str())
    }

    /// When the current notice should disappear.
    pub fn deadline(&self) -> Option<Instant> {
        self.current.as_ref().map(|(_, deadline)| *deadline)
    }

    fn advance(&mut self, now: Instant) {
        self.current = self
            .queue
            .pop_front()
            .map(|notice| (notice, now + self.duration));
    }
}
