//! Debounced type-ahead for the search box.
//!
//! Each keystroke bumps the sequence. A fetch is due once the input has been
//! quiet for the delay, and its results are kept only if no newer keystroke
//! arrived while it was in flight.

use std::time::{Duration, Instant};

pub const DEFAULT_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestTicket {
    pub sequence: u64,
    pub keyword: String,
}

#[derive(Debug, Clone)]
struct Scheduled {
    ticket: SuggestTicket,
    at: Instant,
}

#[derive(Debug, Clone)]
pub struct Suggestions {
    delay: Duration,
    sequence: u64,
    scheduled: Option<Scheduled>,
    items: Vec<String>,
}

impl Default for Suggestions {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY)
    }
}

impl Suggestions {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            sequence: 0,
            scheduled: None,
            items: Vec::new(),
        }
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Records a keystroke. Blank input clears the list and schedules nothing.
    pub fn input(&mut self, keyword: &str, now: Instant) {
        self.sequence = self.sequence.wrapping_add(1);
        let keyword = keyword.trim();
        if keyword.is_empty() {
            self.scheduled = None;
            self.items.clear();
            return;
        }
        self.scheduled = Some(Scheduled {
            ticket: SuggestTicket {
                sequence: self.sequence,
                keyword: keyword.to_string(),
            },
            at: now + self.delay,
        });
    }

    /// Time left before the scheduled fetch, if one is waiting.
    pub fn wait(&self, now: Instant) -> Option<Duration> {
        self.scheduled
            .as_ref()
            .map(|scheduled| scheduled.at.saturating_duration_since(now))
    }

    /// Takes the scheduled fetch once its delay has elapsed.
    pub fn due(&mut self, now: Instant) -> Option<SuggestTicket> {
        match &self.scheduled {
            Some(scheduled) if scheduled.at <= now => {
                self.scheduled.take().map(|scheduled| scheduled.ticket)
            }
            _ => None,
        }
    }

    /// Stores results for `ticket` unless newer input superseded it.
    pub fn accept(&mut self, ticket: &SuggestTicket, items: Vec<String>) -> bool {
        if ticket.sequence != self.sequence {
            tracing::debug!(
                sequence = ticket.sequence,
                latest = self.sequence,
                "suggest: dropping stale suggestions"
            );
            return false;
        }
        self.items = items;
        true
    }

    /// Cancels anything pending, e.g. when a search is submitted.
    pub fn clear(&mut self) {
        self.sequence = self.sequence.wrapping_add(1);
        self.scheduled = None;
        self.items.clear();
    }
}
