//! Incremental list loading shared by every paginated screen.
//!
//! A [`Pager`] hands out a [`PageTicket`] for each fetch it starts and only
//! applies a result whose ticket is still the pending one. A reset bumps the
//! generation, so anything issued before it is dropped on arrival.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::errors::pick_error_message;
use crate::models::{Page, PageQuery};
use crate::notify::Notifier;

pub const DEFAULT_PAGE_SIZE: u64 = 10;
const DEFAULT_FAILURE_MESSAGE: &str = "加载失败，请稍后重试";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Reset,
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    LoadingInitial,
    Ready,
    LoadingMore,
    Refreshing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTicket {
    pub generation: u64,
    pub current: u64,
    pub size: u64,
    pub mode: LoadMode,
}

impl PageTicket {
    pub fn query(&self) -> PageQuery {
        PageQuery {
            current: self.current,
            size: self.size,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaginationState<T> {
    pub items: Vec<T>,
    /// Next page to request.
    pub current: u64,
    pub size: u64,
    pub has_more: bool,
    pub is_loading_initial: bool,
    pub is_loading_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Applied { mode: LoadMode, added: usize },
    Failed { message: String },
    /// The ticket belonged to a superseded fetch; nothing changed.
    Stale,
    /// The append guard refused to start a fetch.
    Skipped,
}

pub struct Pager<T> {
    state: PaginationState<T>,
    generation: u64,
    pending: Option<PageTicket>,
    loaded: bool,
    notifier: Arc<dyn Notifier>,
    failure_message: String,
}

impl<T> Pager<T> {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self::with_size(DEFAULT_PAGE_SIZE, notifier)
    }

    pub fn with_size(size: u64, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            state: PaginationState {
                items: Vec::new(),
                current: 1,
                size: size.max(1),
                has_more: true,
                is_loading_initial: false,
                is_loading_more: false,
            },
            generation: 0,
            pending: None,
            loaded: false,
            notifier,
            failure_message: DEFAULT_FAILURE_MESSAGE.to_string(),
        }
    }

    /// Message shown when a failure carries no displayable text of its own.
    pub fn failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = message.into();
        self
    }

    pub fn state(&self) -> &PaginationState<T> {
        &self.state
    }

    pub fn items(&self) -> &[T] {
        &self.state.items
    }

    pub fn items_mut(&mut self) -> &mut Vec<T> {
        &mut self.state.items
    }

    pub fn has_more(&self) -> bool {
        self.state.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pending(&self) -> Option<PageTicket> {
        self.pending
    }

    pub fn phase(&self) -> Phase {
        match self.pending.map(|ticket| ticket.mode) {
            Some(LoadMode::Reset) if self.loaded => Phase::Refreshing,
            Some(LoadMode::Reset) => Phase::LoadingInitial,
            Some(LoadMode::Append) => Phase::LoadingMore,
            None if self.loaded => Phase::Ready,
            None => Phase::Idle,
        }
    }

    /// Starts page 1 of a new generation. Any in-flight fetch is superseded.
    pub fn begin_reset(&mut self) -> PageTicket {
        if let Some(previous) = self.pending {
            tracing::debug!(
                generation = previous.generation,
                current = previous.current,
                "pager: superseding in-flight fetch"
            );
        }
        self.generation = self.generation.wrapping_add(1);
        let ticket = PageTicket {
            generation: self.generation,
            current: 1,
            size: self.state.size,
            mode: LoadMode::Reset,
        };
        self.pending = Some(ticket);
        self.state.is_loading_initial = true;
        self.state.is_loading_more = false;
        ticket
    }

    /// Starts the next page, or returns `None` while loading or when the list is exhausted.
    pub fn begin_append(&mut self) -> Option<PageTicket> {
        if self.pending.is_some() || !self.state.has_more {
            return None;
        }
        let ticket = PageTicket {
            generation: self.generation,
            current: self.state.current,
            size: self.state.size,
            mode: LoadMode::Append,
        };
        self.pending = Some(ticket);
        self.state.is_loading_more = true;
        Some(ticket)
    }

    /// Applies the outcome of the fetch `ticket` described.
    pub fn complete<R, F>(&mut self, ticket: PageTicket, result: Result<Page<R>>, map: F) -> Completion
    where
        F: FnMut(R) -> T,
    {
        if self.pending != Some(ticket) {
            tracing::debug!(
                generation = ticket.generation,
                current_generation = self.generation,
                page = ticket.current,
                "pager: discarding stale page response"
            );
            return Completion::Stale;
        }
        self.pending = None;
        self.state.is_loading_initial = false;
        self.state.is_loading_more = false;

        match result {
            Ok(page) => {
                let added = page.records.len();
                let has_more = page.has_more();
                let mapped = page.records.into_iter().map(map);
                match ticket.mode {
                    LoadMode::Reset => self.state.items = mapped.collect(),
                    LoadMode::Append => self.state.items.extend(mapped),
                }
                self.state.current = ticket.current.saturating_add(1);
                self.state.has_more = has_more;
                self.loaded = true;
                Completion::Applied {
                    mode: ticket.mode,
                    added,
                }
            }
            Err(err) => {
                let message = pick_error_message(&err, &self.failure_message);
                tracing::warn!(
                    page = ticket.current,
                    error = %err,
                    "pager: page load failed"
                );
                self.notifier.notify(&message);
                Completion::Failed { message }
            }
        }
    }

    /// Resets and fetches page 1 inline.
    pub fn reset_with<R, Fetch, Map>(&mut self, fetch: Fetch, map: Map) -> Completion
    where
        Fetch: FnOnce(PageQuery) -> Result<Page<R>>,
        Map: FnMut(R) -> T,
    {
        let ticket = self.begin_reset();
        let result = fetch(ticket.query());
        self.complete(ticket, result, map)
    }

    /// Fetches the next page inline. `fetch` is not called when the guard refuses.
    pub fn load_more_with<R, Fetch, Map>(&mut self, fetch: Fetch, map: Map) -> Completion
    where
        Fetch: FnOnce(PageQuery) -> Result<Page<R>>,
        Map: FnMut(R) -> T,
    {
        let Some(ticket) = self.begin_append() else {
            return Completion::Skipped;
        };
        let result = fetch(ticket.query());
        self.complete(ticket, result, map)
    }

    /// Feeds a response delivered by a [`Loader`].
    pub fn apply<R, F>(&mut self, response: PageResponse<R>, map: F) -> Completion
    where
        F: FnMut(R) -> T,
    {
        self.complete(response.ticket, response.result, map)
    }
}

pub struct PageResponse<R> {
    pub ticket: PageTicket,
    pub result: Result<Page<R>>,
}

/// Runs page fetches on worker threads and hands results back over a channel.
pub struct Loader<R> {
    tx: Sender<PageResponse<R>>,
    rx: Receiver<PageResponse<R>>,
}

impl<R: Send + 'static> Default for Loader<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Send + 'static> Loader<R> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn spawn<F>(&self, ticket: PageTicket, fetch: F)
    where
        F: FnOnce(PageQuery) -> Result<Page<R>> + Send + 'static,
    {
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = fetch(ticket.query());
            let _ = tx.send(PageResponse { ticket, result });
        });
    }

    pub fn try_recv(&self) -> Option<PageResponse<R>> {
        self.rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<PageResponse<R>> {
        match self.rx.recv_timeout(timeout) {
            Ok(response) => Some(response),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}
