//! Test doubles for driving subscriptions without a network.
//!
//! - `ScriptedTransport` answers SUBSCRIBE requests from a queue and records
//!   every request it sees. An empty queue leaves the request pending forever.
//! - `RecordingTerminator` collects fatal trips instead of exiting.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sonos_subscriber::{FatalError, Terminator};
use upnp_transport::{Method, Transport, TransportError, TransportRequest, TransportResponse};

type Outcome = Result<TransportResponse, TransportError>;

#[derive(Default)]
struct ScriptState {
    script: VecDeque<Outcome>,
    requests: Vec<TransportRequest>,
    fail_unsubscribe: bool,
}

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful SUBSCRIBE answer granting `sid`
    pub fn push_ok(&self, sid: &str) -> &Self {
        self.push(Ok(TransportResponse::new(200, [("SID", sid)])))
    }

    /// Queue `count` failing SUBSCRIBE answers
    pub fn push_errors(&self, count: usize) -> &Self {
        for _ in 0..count {
            self.push(Err(TransportError::Network("connection refused".to_string())));
        }
        self
    }

    pub fn push(&self, outcome: Outcome) -> &Self {
        self.state.lock().unwrap().script.push_back(outcome);
        self
    }

    /// Make every UNSUBSCRIBE fail
    pub fn fail_unsubscribe(&self) -> &Self {
        self.state.lock().unwrap().fail_unsubscribe = true;
        self
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn requests_with(&self, method: Method) -> Vec<TransportRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Outcome {
        let next = {
            let mut state = self.state.lock().unwrap();
            state.requests.push(request.clone());
            match request.method {
                Method::Unsubscribe if state.fail_unsubscribe => Some(Err(TransportError::Status {
                    method: Method::Unsubscribe,
                    status: 412,
                })),
                Method::Unsubscribe => Some(Ok(TransportResponse::new(
                    200,
                    Vec::<(String, String)>::new(),
                ))),
                Method::Subscribe => state.script.pop_front(),
            }
        };

        match next {
            Some(outcome) => outcome,
            None => std::future::pending().await,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingTerminator {
    reasons: Arc<Mutex<Vec<FatalError>>>,
}

#[allow(dead_code)]
impl RecordingTerminator {
    pub fn reasons(&self) -> Vec<FatalError> {
        self.reasons.lock().unwrap().clone()
    }

    pub fn exhausted_count(&self) -> usize {
        self.reasons()
            .iter()
            .filter(|r| matches!(r, FatalError::SubscriptionExhausted { .. }))
            .count()
    }
}

impl Terminator for RecordingTerminator {
    fn terminate(&self, reason: &FatalError) {
        self.reasons.lock().unwrap().push(reason.clone());
    }
}
