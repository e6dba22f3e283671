// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Adaptive per-path rate limiting driven by the server's rate-limit headers.
//!
//! The API declares a separate budget for every endpoint path through three response headers:
//! `X-Rate-Limit-Limit`, `X-Rate-Limit-Remaining` and `X-Rate-Limit-Reset` (a Unix timestamp).
//! The budget of a path is unknown until a request to it completes, so the limiter lets exactly
//! one request through to find out (the *probe*) and parks every other request for that path
//! until the probe reports back.
//!
//! Every request goes through three steps:
//!
//! 1. `RateLimiter::before_request` waits until the path admits the request and hands back a
//!    `Ticket`. Hosts ending in the media CDN suffix are exempt and never wait.
//! 2. When a response arrives (with any status code), the caller passes its headers to
//!    `Ticket::on_success`. If the ticket was the probe, this installs the declared budget, or
//!    marks the path as unlimited if the headers are missing, and wakes every parked request.
//! 3. When no response arrives, the caller reports `Ticket::on_error`. A failed probe gives up
//!    its duty and wakes one parked request, which then probes in its place.
//!
//! Dropping a probe ticket without reporting either outcome counts as a failure, so a cancelled
//! request can never leave its path stuck.
//!
//! Once a path's budget is known, each request takes one unit from `remaining` while more than
//! 1% of `limit` is left. When it runs out, the next request sleeps until a minute past the
//! declared reset time and then probes the path again. A path whose reset time has passed is
//! probed again straight away.
//!
//! Paths never contend with one another: each has its own entry, and the registry lock is only
//! held long enough to look the entry up.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;
use tracing::{debug, warn};
use url::Url;

use crate::common::Headers;

/// Extra time slept past a path's reset time, since the server may keep reporting the old
/// window for a little while.
const RESET_MARGIN: Duration = Duration::from_secs(60);

/// The budget the server declared for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// The number of requests allowed in one window.
    pub limit: i32,
    /// The number of requests left in the current window.
    pub remaining: i32,
    /// The UTC Unix timestamp at which the window resets.
    pub reset: i64,
}

impl RateLimit {
    /// Reads the three rate-limit headers. Returns `None` if any of them is missing or
    /// malformed.
    pub fn from_headers(headers: &Headers) -> Option<RateLimit> {
        fn parse<T: FromStr>(headers: &Headers, name: &str) -> Option<T> {
            headers.get(name)?.to_str().ok()?.trim().parse().ok()
        }

        Some(RateLimit {
            limit: parse(headers, "x-rate-limit-limit")?,
            remaining: parse(headers, "x-rate-limit-remaining")?,
            reset: parse(headers, "x-rate-limit-reset")?,
        })
    }

    /// The moment this window resets.
    pub fn reset_time(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.reset, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.reset
    }

    /// Whether more than the 1% safety margin of the budget is left.
    fn has_budget(&self) -> bool {
        self.remaining > self.limit / 100 + 1
    }
}

/// What the limiter currently knows about one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathState {
    /// Nobody is probing the path: either no request has been made to it yet, or the last
    /// probe failed. The next request to arrive becomes the probe.
    Vacant,
    /// One request is determining the path's budget. Everyone else waits.
    Probing,
    /// The path's budget is known.
    Ready(RateLimit),
    /// The path never reported rate-limit headers, and is never limited again.
    Unlimited,
}

/// How a request was admitted by `RateLimiter::before_request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketKind {
    /// The host is outside the rate-limited domain.
    Exempt,
    /// The path is known to be unlimited.
    Unlimited,
    /// The request took one unit of the path's known budget.
    Budgeted,
    /// The request is the one determining the path's budget.
    Probe,
}

#[derive(Debug)]
struct PathSlot {
    path: String,
    state: Mutex<PathState>,
    wakeup: Notify,
}

impl PathSlot {
    fn new(path: &str) -> PathSlot {
        PathSlot {
            path: path.to_string(),
            state: Mutex::new(PathState::Vacant),
            wakeup: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PathState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Gives up probe duty and hands it to one waiter.
    fn relinquish(&self) {
        {
            let mut state = self.lock();
            if *state != PathState::Probing {
                return;
            }
            *state = PathState::Vacant;
        }
        debug!(path = %self.path, "rate limit probe failed, handing off");
        self.wakeup.notify_one();
    }
}

enum Admission {
    Proceed(TicketKind),
    Wait,
    /// The budget is spent; sleep this long, then probe.
    Sleep(Duration),
}

/// Decides what a request to `slot` may do right now, updating the path state to match.
fn admit(slot: &PathSlot) -> Admission {
    let mut state = slot.lock();
    match *state {
        PathState::Vacant => {
            *state = PathState::Probing;
            debug!(path = %slot.path, "probing rate limit");
            Admission::Proceed(TicketKind::Probe)
        }
        PathState::Unlimited => Admission::Proceed(TicketKind::Unlimited),
        PathState::Probing => Admission::Wait,
        PathState::Ready(limit) => {
            let now = Utc::now();
            if limit.is_expired(now) {
                *state = PathState::Probing;
                debug!(path = %slot.path, reset = %limit.reset_time(), "rate limit window expired");
                Admission::Proceed(TicketKind::Probe)
            } else if limit.has_budget() {
                *state = PathState::Ready(RateLimit {
                    remaining: limit.remaining - 1,
                    ..limit
                });
                Admission::Proceed(TicketKind::Budgeted)
            } else {
                *state = PathState::Probing;
                let until = limit.reset_time();
                warn!(path = %slot.path, until = %until, "rate limit reached, sleeping");
                let wait = (until - now).to_std().unwrap_or_default();
                Admission::Sleep(wait + RESET_MARGIN)
            }
        }
    }
}

/// Proof that a request was admitted by the limiter. The outcome of the request must be
/// reported back through `on_success` or `on_error`.
#[derive(Debug)]
#[must_use = "the outcome of the request must be reported to the ticket"]
pub struct Ticket {
    slot: Option<Arc<PathSlot>>,
    kind: TicketKind,
    settled: bool,
}

impl Ticket {
    fn exempt() -> Ticket {
        Ticket {
            slot: None,
            kind: TicketKind::Exempt,
            settled: false,
        }
    }

    fn new(slot: Arc<PathSlot>, kind: TicketKind) -> Ticket {
        Ticket {
            slot: Some(slot),
            kind,
            settled: false,
        }
    }

    /// How the request was admitted.
    pub fn kind(&self) -> TicketKind {
        self.kind
    }

    /// Reports that a response arrived, with any status code.
    ///
    /// If this ticket is the probe for its path, the path's budget is installed from the given
    /// headers (or the path is marked unlimited if they carry none), and all requests waiting on
    /// the path are woken.
    pub fn on_success(mut self, headers: &Headers) {
        self.settled = true;
        if self.kind != TicketKind::Probe {
            return;
        }
        let slot = match self.slot.as_ref() {
            Some(slot) => slot,
            None => return,
        };

        {
            let mut state = slot.lock();
            if *state != PathState::Probing {
                return;
            }
            *state = match RateLimit::from_headers(headers) {
                Some(limit) => {
                    debug!(
                        path = %slot.path,
                        limit = limit.limit,
                        remaining = limit.remaining,
                        reset = %limit.reset_time(),
                        "rate limit installed"
                    );
                    PathState::Ready(limit)
                }
                None => {
                    debug!(path = %slot.path, "no rate limit reported, path is unlimited");
                    PathState::Unlimited
                }
            };
        }
        slot.wakeup.notify_waiters();
    }

    /// Reports that the request failed. `response` holds the response headers if a response
    /// arrived before the failure.
    ///
    /// A failed probe gives up its duty, so that one waiting request probes the path instead. A
    /// budgeted request that never reached the server gives its unit of budget back.
    pub fn on_error(mut self, response: Option<&Headers>) {
        self.settled = true;
        let slot = match self.slot.as_ref() {
            Some(slot) => slot,
            None => return,
        };

        match self.kind {
            TicketKind::Probe => slot.relinquish(),
            TicketKind::Budgeted if response.is_none() => {
                let mut state = slot.lock();
                if let PathState::Ready(ref mut limit) = *state {
                    limit.remaining += 1;
                }
            }
            _ => (),
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if self.settled || self.kind != TicketKind::Probe {
            return;
        }
        if let Some(slot) = self.slot.as_ref() {
            slot.relinquish();
        }
    }
}

/// Counts a caller as blocked for as long as it is held.
struct Blocked<'a>(&'a AtomicUsize);

impl<'a> Blocked<'a> {
    fn new(counter: &'a AtomicUsize) -> Blocked<'a> {
        counter.fetch_add(1, Ordering::SeqCst);
        Blocked(counter)
    }
}

impl Drop for Blocked<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Per-path rate limiter for one authenticated client.
#[derive(Debug)]
pub struct RateLimiter {
    cdn_suffix: String,
    slots: Mutex<HashMap<String, Arc<PathSlot>>>,
    blocked: AtomicUsize,
}

impl RateLimiter {
    /// Creates a limiter that exempts hosts ending in `cdn_suffix`.
    pub fn new(cdn_suffix: impl Into<String>) -> RateLimiter {
        RateLimiter {
            cdn_suffix: cdn_suffix.into(),
            slots: Mutex::new(HashMap::new()),
            blocked: AtomicUsize::new(0),
        }
    }

    /// Returns whether requests to this URL are subject to rate limiting.
    pub fn applies_to(&self, url: &Url) -> bool {
        url.host_str()
            .map_or(true, |host| !host.ends_with(self.cdn_suffix.as_str()))
    }

    /// Waits until a request to `url` may be sent.
    ///
    /// This never fails. It returns at once for exempt hosts, for unlimited paths, for a path
    /// nobody has probed yet (the caller becomes the probe), and for a path with budget left.
    /// Otherwise it waits for the path's probe to report back, or sleeps out a spent budget.
    pub async fn before_request(&self, url: &Url) -> Ticket {
        if !self.applies_to(url) {
            return Ticket::exempt();
        }
        let slot = self.slot(url.path());

        loop {
            // Registering before looking at the state means a wakeup sent after the check
            // below cannot be missed.
            let notified = slot.wakeup.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match admit(&slot) {
                Admission::Proceed(kind) => return Ticket::new(slot.clone(), kind),
                Admission::Wait => {
                    let _blocked = Blocked::new(&self.blocked);
                    notified.await;
                }
                Admission::Sleep(wait) => {
                    let ticket = Ticket::new(slot.clone(), TicketKind::Probe);
                    let _blocked = Blocked::new(&self.blocked);
                    tokio::time::sleep(wait).await;
                    return ticket;
                }
            }
        }
    }

    /// The number of callers currently waiting inside `before_request`.
    pub fn blocked_callers(&self) -> usize {
        self.blocked.load(Ordering::SeqCst)
    }

    /// What the limiter knows about the given path, if a request to it was ever admitted.
    pub fn state(&self, path: &str) -> Option<PathState> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(path).map(|slot| *slot.lock())
    }

    fn slot(&self, path: &str) -> Arc<PathSlot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(PathSlot::new(path)))
            .clone()
    }
}
