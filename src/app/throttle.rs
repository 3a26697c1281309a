//! Leading-edge throttle for input handling.
//!
//! The throttle does not run anything itself: [`Throttle::call`] hands the
//! arguments back when they may run now, and [`Throttle::poll`] hands back a
//! deferred trailing call once it is due. The caller reports each execution
//! with [`Throttle::executed`], and the window for the next call is derived
//! from how long that execution took.

use std::time::{Duration, Instant};

pub struct Throttle<T> {
    timeframe: Box<dyn Fn(Duration) -> Duration + Send>,
    ensure_last: bool,
    window: Duration,
    last_execution: Option<Instant>,
    pending: Option<(T, Instant)>,
}

impl<T> Throttle<T> {
    /// `timeframe` maps the duration of the previous execution to the window
    /// in which further calls are throttled.
    pub fn new(timeframe: impl Fn(Duration) -> Duration + Send + 'static, ensure_last: bool) -> Self {
        Self {
            timeframe: Box::new(timeframe),
            ensure_last,
            window: Duration::ZERO,
            last_execution: None,
            pending: None,
        }
    }

    pub fn is_throttling(&self, now: Instant) -> bool {
        self.last_execution
            .is_some_and(|last| now.saturating_duration_since(last) <= self.window)
    }

    /// Returns `args` if they should run now. Otherwise they replace any
    /// pending trailing call (with `ensure_last`) or are dropped.
    pub fn call(&mut self, args: T, now: Instant) -> Option<T> {
        if !self.is_throttling(now) {
            self.pending = None;
            return Some(args);
        }
        if self.ensure_last {
            let due = self.pending.as_ref().map_or(now + self.window, |&(_, due)| due);
            self.pending = Some((args, due));
        }
        None
    }

    /// When the pending trailing call becomes due.
    pub fn next_due(&self) -> Option<Instant> {
        self.pending.as_ref().map(|&(_, due)| due)
    }

    /// The trailing call, if it is due at `now`.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match self.pending {
            Some((_, due)) if due <= now => self.pending.take().map(|(args, _)| args),
            _ => None,
        }
    }

    /// Record an execution that ran from `started` to `finished`.
    pub fn executed(&mut self, started: Instant, finished: Instant) {
        self.last_execution = Some(finished);
        self.window = (self.timeframe)(finished.saturating_duration_since(started));
    }

    /// Take the pending call regardless of its due time and forget the last
    /// execution, so the next call runs immediately.
    pub fn flush(&mut self) -> Option<T> {
        self.last_execution = None;
        self.pending.take().map(|(args, _)| args)
    }
}
