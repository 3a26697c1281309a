//! Background match worker.
//!
//! One thread owns a [`MatchCursor`] and talks to the host only through
//! [`HostMessage`]s in and [`WorkerMessage`]s out. It announces itself with
//! `worker-ready`, answers page requests, and drops its progress on
//! `restart`. While scanning it keeps draining its inbox, so a restart for a
//! newer request abandons the page in progress.

use std::collections::VecDeque;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use crate::search::compile::DEFAULT_BACKTRACK_LIMIT;
use crate::search::cursor::{Fill, MatchCursor};
use crate::search::protocol::{GetMatchesRequest, HostMessage, WorkerMessage};

pub struct MatchWorker {
    sender: Option<Sender<HostMessage>>,
    handle: Option<JoinHandle<()>>,
}

impl MatchWorker {
    /// Start a worker delivering its messages to `sink`.
    pub fn spawn<F>(sink: F) -> io::Result<Self>
    where
        F: FnMut(WorkerMessage) + Send + 'static,
    {
        Self::spawn_with_limit(sink, DEFAULT_BACKTRACK_LIMIT)
    }

    pub fn spawn_with_limit<F>(sink: F, backtrack_limit: usize) -> io::Result<Self>
    where
        F: FnMut(WorkerMessage) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("match-worker".into())
            .spawn(move || {
                WorkerLoop {
                    cursor: MatchCursor::with_backtrack_limit(backtrack_limit),
                    inbox: rx,
                    backlog: VecDeque::new(),
                    latest_restart: 0,
                    sink,
                }
                .run()
            })?;
        Ok(Self { sender: Some(tx), handle: Some(handle) })
    }

    /// Start a worker whose messages arrive on the returned receiver.
    pub fn with_channel() -> io::Result<(Self, Receiver<WorkerMessage>)> {
        let (tx, rx) = mpsc::channel();
        let worker = Self::spawn(move |msg| {
            let _ = tx.send(msg);
        })?;
        Ok((worker, rx))
    }

    /// Returns `false` once the worker thread is gone.
    pub fn send(&self, msg: HostMessage) -> bool {
        self.sender.as_ref().is_some_and(|tx| tx.send(msg).is_ok())
    }
}

impl Drop for MatchWorker {
    fn drop(&mut self) {
        // Closing the inbox ends the loop.
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("match worker panicked");
            }
        }
    }
}

struct WorkerLoop<F> {
    cursor: MatchCursor,
    inbox: Receiver<HostMessage>,
    backlog: VecDeque<HostMessage>,
    latest_restart: u64,
    sink: F,
}

impl<F: FnMut(WorkerMessage)> WorkerLoop<F> {
    fn run(mut self) {
        (self.sink)(WorkerMessage::WorkerReady);
        loop {
            let msg = match self.backlog.pop_front() {
                Some(msg) => msg,
                None => match self.inbox.recv() {
                    Ok(msg) => msg,
                    Err(_) => break,
                },
            };
            match msg {
                HostMessage::Restart { request_number } => {
                    self.latest_restart = self.latest_restart.max(request_number);
                    self.cursor.reset();
                }
                HostMessage::GetMatchesRequest(req) if req.request_number < self.latest_restart => {
                    log::trace!("dropping stale request {}", req.request_number);
                }
                HostMessage::GetMatchesRequest(req) => self.serve(req),
            }
        }
        log::debug!("match worker stopped");
    }

    fn serve(&mut self, req: GetMatchesRequest) {
        let n = req.request_number;
        if let Err(e) = self.cursor.prepare(&req.source, &req.flags, &req.text, &req.normalizations) {
            (self.sink)(WorkerMessage::WorkerError { message: e.to_string(), request_number: n });
            return;
        }

        let inbox = &self.inbox;
        let backlog = &mut self.backlog;
        let outcome = self.cursor.fill(req.start.saturating_add(req.num), || {
            while let Ok(msg) = inbox.try_recv() {
                backlog.push_back(msg);
            }
            backlog
                .iter()
                .any(|m| matches!(m, HostMessage::Restart { request_number } if *request_number > n))
        });

        match outcome {
            Ok(Fill::Filled) => {
                let results = self.cursor.page(req.start, req.num).to_vec();
                (self.sink)(WorkerMessage::GetMatchesResponse { results, request_number: n });
            }
            Ok(Fill::Interrupted) => log::debug!("request {} superseded mid-page", n),
            Err(e) => {
                log::warn!("request {} failed: {}", n, e);
                self.cursor.reset();
                (self.sink)(WorkerMessage::WorkerError { message: e.to_string(), request_number: n });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(10);

    fn request(source: &str, text: &Arc<str>, start: usize, num: usize, n: u64) -> HostMessage {
        HostMessage::GetMatchesRequest(GetMatchesRequest {
            source: source.into(),
            flags: "g".into(),
            text: Arc::clone(text),
            start,
            num,
            request_number: n,
            normalizations: Vec::new(),
        })
    }

    fn indices(msg: WorkerMessage) -> (u64, Vec<usize>) {
        match msg {
            WorkerMessage::GetMatchesResponse { results, request_number } => {
                (request_number, results.iter().map(|r| r.index).collect())
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn announces_ready_then_serves_pages() {
        let (worker, rx) = MatchWorker::with_channel().unwrap();
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), WorkerMessage::WorkerReady);

        let text: Arc<str> = Arc::from("x.x.x");
        assert!(worker.send(HostMessage::Restart { request_number: 1 }));
        worker.send(request("x", &text, 0, 2, 1));
        worker.send(request("x", &text, 2, 2, 1));
        worker.send(request("x", &text, 4, 2, 1));
        assert_eq!(indices(rx.recv_timeout(WAIT).unwrap()), (1, vec![0, 2]));
        assert_eq!(indices(rx.recv_timeout(WAIT).unwrap()), (1, vec![4]));
        assert_eq!(indices(rx.recv_timeout(WAIT).unwrap()), (1, vec![]));
    }

    #[test]
    fn drops_requests_older_than_the_latest_restart() {
        let (worker, rx) = MatchWorker::with_channel().unwrap();
        rx.recv_timeout(WAIT).unwrap();

        let text: Arc<str> = Arc::from("ab");
        worker.send(HostMessage::Restart { request_number: 5 });
        worker.send(request("a", &text, 0, 10, 4));
        worker.send(request("b", &text, 0, 10, 5));
        assert_eq!(indices(rx.recv_timeout(WAIT).unwrap()), (5, vec![1]));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn reports_bad_patterns() {
        let (worker, rx) = MatchWorker::with_channel().unwrap();
        rx.recv_timeout(WAIT).unwrap();
        let text: Arc<str> = Arc::from("x");
        worker.send(request("(", &text, 0, 10, 1));
        match rx.recv_timeout(WAIT).unwrap() {
            WorkerMessage::WorkerError { request_number, message } => {
                assert_eq!(request_number, 1);
                assert!(message.starts_with("Invalid regular expression"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn shuts_down_on_drop() {
        let (worker, rx) = MatchWorker::with_channel().unwrap();
        rx.recv_timeout(WAIT).unwrap();
        drop(worker);
        assert!(rx.recv_timeout(WAIT).is_err());
    }
}
