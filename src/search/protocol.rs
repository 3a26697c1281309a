//! Messages exchanged with the match worker. Every message is a JSON object
//! tagged by `kind`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::search::cursor::MatchResult;
use crate::search::flags::Normalization;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMatchesRequest {
    pub source: String,
    pub flags: String,
    pub text: Arc<str>,
    pub start: usize,
    pub num: usize,
    pub request_number: u64,
    #[serde(default)]
    pub normalizations: Vec<Normalization>,
}

/// Host to worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum HostMessage {
    GetMatchesRequest(GetMatchesRequest),
    Restart {
        #[serde(rename = "requestNumber")]
        request_number: u64,
    },
}

/// Worker to host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WorkerMessage {
    WorkerReady,
    GetMatchesResponse {
        results: Vec<MatchResult>,
        #[serde(rename = "requestNumber")]
        request_number: u64,
    },
    WorkerError {
        message: String,
        #[serde(rename = "requestNumber")]
        request_number: u64,
    },
}

impl HostMessage {
    pub fn request_number(&self) -> u64 {
        match self {
            HostMessage::GetMatchesRequest(req) => req.request_number,
            HostMessage::Restart { request_number } => *request_number,
        }
    }
}

impl WorkerMessage {
    pub fn request_number(&self) -> Option<u64> {
        match self {
            WorkerMessage::WorkerReady => None,
            WorkerMessage::GetMatchesResponse { request_number, .. }
            | WorkerMessage::WorkerError { request_number, .. } => Some(*request_number),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn host_messages_have_the_wire_shape() {
        let req = HostMessage::GetMatchesRequest(GetMatchesRequest {
            source: "a".into(),
            flags: "g".into(),
            text: Arc::from("abc"),
            start: 500,
            num: 500,
            request_number: 3,
            normalizations: vec![Normalization::Diacritics],
        });
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "kind": "get-matches-request",
                "source": "a",
                "flags": "g",
                "text": "abc",
                "start": 500,
                "num": 500,
                "requestNumber": 3,
                "normalizations": ["diacritics"],
            })
        );

        let restart: HostMessage = serde_json::from_str(r#"{"kind":"restart","requestNumber":4}"#).unwrap();
        assert_eq!(restart, HostMessage::Restart { request_number: 4 });
        assert_eq!(restart.request_number(), 4);
    }

    #[test]
    fn worker_messages_have_the_wire_shape() {
        assert_eq!(
            serde_json::to_value(WorkerMessage::WorkerReady).unwrap(),
            json!({ "kind": "worker-ready" })
        );
        let resp = WorkerMessage::GetMatchesResponse {
            results: vec![MatchResult {
                index: 1,
                arr: vec![Some("b".into())],
                groups: None,
                indices: None,
            }],
            request_number: 2,
        };
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({
                "kind": "get-matches-response",
                "results": [{ "index": 1, "arr": ["b"], "groups": null, "indices": null }],
                "requestNumber": 2,
            })
        );
        assert_eq!(resp.request_number(), Some(2));
    }
}
