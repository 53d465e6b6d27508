//! Shared crawl frontier
//!
//! This module handles:
//! - The FIFO queue of URLs waiting to be fetched
//! - Exactly-once visitation across all workers of a job
//! - Tracking in-flight pages so workers know when the crawl is exhausted
//!
//! All bookkeeping lives behind one mutex. The lock is only held for short,
//! synchronous sections and never across an await point.

use crate::url::NormalizedUrl;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Bookkeeping shared by the workers of one crawl job
///
/// Invariants:
/// - every key in `frontier` is in `seen` and not in `visited`, except for
///   entries made stale by a redirect, which are skipped when popped
/// - `visited` only grows, so a URL is processed at most once
/// - `in_flight` is a subset of `visited`
#[derive(Debug, Default)]
pub struct CrawlState {
    frontier: VecDeque<NormalizedUrl>,
    seen: HashSet<String>,
    visited: HashSet<String>,
    in_flight: HashSet<String>,
}

/// What a worker should do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    /// Process this URL; it is already marked visited and in flight
    Ready(NormalizedUrl),

    /// Nothing queued yet, but pages in flight may still add links
    Idle,

    /// Nothing queued and nothing in flight
    Exhausted,
}

/// Thread-safe frontier for one crawl job
#[derive(Debug, Default)]
pub struct Frontier {
    state: Mutex<CrawlState>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a frontier holding `seeds`, without duplicates
    pub fn seeded(seeds: impl IntoIterator<Item = NormalizedUrl>) -> Self {
        let frontier = Self::new();
        frontier.enqueue_all(seeds);
        frontier
    }

    fn lock(&self) -> MutexGuard<'_, CrawlState> {
        // The state stays consistent even if a holder panicked: every
        // critical section is a handful of collection operations.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a URL unless it was queued or visited before
    ///
    /// Returns true if the URL was added.
    pub fn enqueue(&self, url: NormalizedUrl) -> bool {
        let mut state = self.lock();
        Self::push(&mut state, url)
    }

    /// Queues several URLs under one lock, returning how many were new
    pub fn enqueue_all(&self, urls: impl IntoIterator<Item = NormalizedUrl>) -> usize {
        let mut state = self.lock();
        urls.into_iter()
            .filter(|url| Self::push(&mut state, url.clone()))
            .count()
    }

    fn push(state: &mut CrawlState, url: NormalizedUrl) -> bool {
        if !state.seen.insert(url.as_str().to_string()) {
            return false;
        }
        state.frontier.push_back(url);
        true
    }

    /// Takes the next URL, marking it visited and in flight
    pub fn next(&self) -> Next {
        let mut state = self.lock();

        while let Some(url) = state.frontier.pop_front() {
            let key = url.as_str().to_string();
            if !state.visited.insert(key.clone()) {
                // Already reached through a redirect
                continue;
            }
            state.in_flight.insert(key);
            return Next::Ready(url);
        }

        if state.in_flight.is_empty() {
            Next::Exhausted
        } else {
            Next::Idle
        }
    }

    /// Claims the URL a request actually resolved to after redirects
    ///
    /// Returns false if the resolved URL was already visited by another
    /// worker, in which case the page must not be processed again.
    pub fn claim_resolved(&self, requested: &NormalizedUrl, resolved: &NormalizedUrl) -> bool {
        if requested.as_str() == resolved.as_str() {
            return true;
        }

        let mut state = self.lock();
        state.seen.insert(resolved.as_str().to_string());
        state.visited.insert(resolved.as_str().to_string())
    }

    /// Marks a page as no longer in flight
    pub fn complete(&self, url: &NormalizedUrl) {
        self.lock().in_flight.remove(url.as_str());
    }

    /// Drops every queued URL, returning how many were dropped
    pub fn drain(&self) -> usize {
        let mut state = self.lock();
        let dropped = state.frontier.len();
        state.frontier.clear();
        dropped
    }

    /// Marks `url` in flight until the returned guard is dropped
    ///
    /// The guard also runs when a worker unwinds, so a panicking page cannot
    /// keep the other workers waiting forever.
    pub fn in_flight_guard<'a>(&'a self, url: &'a NormalizedUrl) -> InFlightGuard<'a> {
        InFlightGuard {
            frontier: self,
            url,
        }
    }

    pub fn queued(&self) -> usize {
        self.lock().frontier.len()
    }

    pub fn visited(&self) -> usize {
        self.lock().visited.len()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    pub fn is_visited(&self, url: &NormalizedUrl) -> bool {
        self.lock().visited.contains(url.as_str())
    }
}

/// Completes an in-flight page when dropped
pub struct InFlightGuard<'a> {
    frontier: &'a Frontier,
    url: &'a NormalizedUrl,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.frontier.complete(self.url);
    }
}
