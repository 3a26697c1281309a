//! Host side of the worker protocol: request numbering, readiness, the page
//! loop and deadline tracking.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::search::cursor::MatchResult;
use crate::search::flags::Normalization;
use crate::search::protocol::{GetMatchesRequest, HostMessage, WorkerMessage};
use crate::search::worker::MatchWorker;

/// Matches requested per page.
pub const PAGE_SIZE: usize = 500;

/// What the worker should scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchQuery {
    pub source: String,
    pub flags: String,
    pub text: Arc<str>,
    pub normalizations: Vec<Normalization>,
}

/// A worker message as seen by the active query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The next page of the active query; empty once exhausted.
    Page { request_number: u64, results: Vec<MatchResult> },
    Failed { request_number: u64, message: String },
    /// Readiness or traffic for a superseded request.
    Ignored,
}

#[derive(Debug)]
struct Active {
    request_number: u64,
    query: MatchQuery,
    next_page: usize,
    started: Instant,
    deadline: Instant,
}

pub struct MatchClient {
    worker: MatchWorker,
    ready: bool,
    last_request: u64,
    active: Option<Active>,
}

impl MatchClient {
    pub fn new(worker: MatchWorker) -> Self {
        Self { worker, ready: false, last_request: 0, active: None }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn active_request(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.request_number)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.active.as_ref().map(|a| a.deadline)
    }

    /// Time since the active query started.
    pub fn elapsed(&self) -> Option<Duration> {
        self.active.as_ref().map(|a| a.started.elapsed())
    }

    /// Supersede whatever is in flight and start `query`. The worker is told
    /// to restart before the first page is requested.
    pub fn begin(&mut self, query: MatchQuery, timeout: Duration) -> u64 {
        self.last_request += 1;
        let n = self.last_request;
        self.worker.send(HostMessage::Restart { request_number: n });
        let started = Instant::now();
        self.active = Some(Active {
            request_number: n,
            query,
            next_page: 0,
            started,
            deadline: started + timeout,
        });
        if self.ready {
            self.request_page();
        }
        n
    }

    /// Abandon the active query and halt the worker's scan for it.
    pub fn cancel(&mut self) -> Option<u64> {
        let active = self.active.take()?;
        self.last_request += 1;
        self.worker.send(HostMessage::Restart { request_number: self.last_request });
        log::debug!("request {} cancelled", active.request_number);
        Some(active.request_number)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.active.as_ref().is_some_and(|a| now >= a.deadline)
    }

    fn request_page(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let start = active.next_page * PAGE_SIZE;
        active.next_page += 1;
        let req = GetMatchesRequest {
            source: active.query.source.clone(),
            flags: active.query.flags.clone(),
            text: Arc::clone(&active.query.text),
            start,
            num: PAGE_SIZE,
            request_number: active.request_number,
            normalizations: active.query.normalizations.clone(),
        };
        if !self.worker.send(HostMessage::GetMatchesRequest(req)) {
            log::warn!("match worker is gone");
        }
    }

    /// Feed one worker message. Pages of the active query trigger the request
    /// for the next page; anything else is ignored.
    pub fn on_message(&mut self, msg: WorkerMessage) -> ClientEvent {
        let active = self.active_request();
        match msg {
            WorkerMessage::WorkerReady => {
                self.ready = true;
                if active.is_some() {
                    self.request_page();
                }
                ClientEvent::Ignored
            }
            WorkerMessage::GetMatchesResponse { results, request_number } if Some(request_number) == active => {
                if results.is_empty() {
                    self.active = None;
                } else {
                    self.request_page();
                }
                ClientEvent::Page { request_number, results }
            }
            WorkerMessage::WorkerError { message, request_number } if Some(request_number) == active => {
                self.active = None;
                ClientEvent::Failed { request_number, message }
            }
            other => {
                log::trace!("discarding stale worker message {:?}", other.request_number());
                ClientEvent::Ignored
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::Receiver;

    const WAIT: Duration = Duration::from_secs(10);

    fn query(source: &str, text: &str) -> MatchQuery {
        MatchQuery {
            source: source.into(),
            flags: "g".into(),
            text: Arc::from(text),
            normalizations: Vec::new(),
        }
    }

    fn client() -> (MatchClient, Receiver<WorkerMessage>) {
        let (worker, rx) = MatchWorker::with_channel().unwrap();
        (MatchClient::new(worker), rx)
    }

    /// Pump until the active query finishes; returns every page event.
    fn drain(client: &mut MatchClient, rx: &Receiver<WorkerMessage>) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        while client.active_request().is_some() {
            match client.on_message(rx.recv_timeout(WAIT).unwrap()) {
                ClientEvent::Ignored => {}
                event => events.push(event),
            }
        }
        events
    }

    #[test]
    fn waits_for_readiness_then_pages_to_exhaustion() {
        let (mut client, rx) = client();
        let text = "x ".repeat(PAGE_SIZE + 10);
        let n = client.begin(query("x", &text), WAIT);
        assert_eq!(n, 1);

        let events = drain(&mut client, &rx);
        assert!(client.is_ready());
        let sizes: Vec<usize> = events
            .iter()
            .map(|e| match e {
                ClientEvent::Page { results, .. } => results.len(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(sizes, [PAGE_SIZE, 10, 0]);
    }

    #[test]
    fn superseded_results_never_surface() {
        let (mut client, rx) = client();
        let big = "a".repeat(50_000);
        client.begin(query("a", &big), WAIT);
        let b = client.begin(query("b", "abab"), WAIT);

        let events = drain(&mut client, &rx);
        for event in &events {
            match event {
                ClientEvent::Page { request_number, .. } => assert_eq!(*request_number, b),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert!(matches!(&events[0], ClientEvent::Page { results, .. } if results.len() == 2));
    }

    #[test]
    fn worker_errors_end_the_query() {
        let (mut client, rx) = client();
        client.begin(query("(", "x"), WAIT);
        let events = drain(&mut client, &rx);
        assert!(matches!(&events[..], [ClientEvent::Failed { request_number: 1, .. }]));
    }

    #[test]
    fn cancel_and_deadlines() {
        let (mut client, _rx) = client();
        client.begin(query("a", "a"), Duration::ZERO);
        assert!(client.is_expired(Instant::now()));
        assert_eq!(client.cancel(), Some(1));
        assert_eq!(client.cancel(), None);
        assert!(!client.is_expired(Instant::now()));
        assert_eq!(client.begin(query("a", "a"), WAIT), 3);
    }
}
