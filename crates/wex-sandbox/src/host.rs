//! Execution host
//!
//! The host owns one [`Interpreter`] on a dedicated OS thread — thread
//! confinement is the isolation primitive. Nothing outside the host may
//! touch the interpreter; the only way in or out is the request/response
//! wire pair carried over the handle's channels.
//!
//! The host signals [`HostEvent::Ready`] once its receive loop is live;
//! requests submitted before that are the channel's problem to hold back.

use crate::interp::Interpreter;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Request sent into the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRequest {
    /// Correlation id assigned by the channel
    pub evaluation_id: u64,
    /// The snippet to evaluate
    pub source: String,
    /// Dispatch timestamp (milliseconds since the epoch), recorded by
    /// the channel at dispatch time
    pub start_time: i64,
}

/// Reply sent out of the host. Exactly one of `result`/`error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostReply {
    /// Correlation id echoed from the request
    pub evaluation_id: u64,
    /// Stringified result on success
    pub result: Option<String>,
    /// Error text on failure
    pub error: Option<String>,
}

impl HostReply {
    /// Successful evaluation
    #[must_use]
    pub fn success(evaluation_id: u64, result: String) -> Self {
        Self {
            evaluation_id,
            result: Some(result),
            error: None,
        }
    }

    /// Failed evaluation
    #[must_use]
    pub fn failure(evaluation_id: u64, error: String) -> Self {
        Self {
            evaluation_id,
            result: None,
            error: Some(error),
        }
    }
}

/// Message from the host to the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// The host's receive loop is live
    Ready,
    /// A correlated evaluation reply
    Reply(HostReply),
}

/// Handle to a running host: the request sender and event receiver the
/// channel correlates over. Dropping the request sender tears the host
/// down (its receive loop ends and the thread exits).
#[derive(Debug)]
pub struct HostHandle {
    /// Requests into the host
    pub requests: mpsc::Sender<EvalRequest>,
    /// Ready/reply events out of the host
    pub events: mpsc::Receiver<HostEvent>,
}

impl HostHandle {
    /// Spawn a fresh host on its own thread.
    #[must_use]
    pub fn spawn() -> Self {
        let (req_tx, req_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(16);

        std::thread::Builder::new()
            .name("wex-sandbox-host".to_string())
            .spawn(move || host_loop(req_rx, event_tx))
            .expect("spawn sandbox host thread");

        Self {
            requests: req_tx,
            events: event_rx,
        }
    }

    /// Assemble a handle from raw channel halves. Used by tests to stand
    /// up scripted hosts (silent, slow, or out-of-order).
    #[must_use]
    pub fn from_parts(
        requests: mpsc::Sender<EvalRequest>,
        events: mpsc::Receiver<HostEvent>,
    ) -> Self {
        Self { requests, events }
    }
}

/// The host thread body: one interpreter, one request at a time, until
/// the request channel closes.
fn host_loop(mut requests: mpsc::Receiver<EvalRequest>, events: mpsc::Sender<HostEvent>) {
    let interpreter = Interpreter::new();

    if events.blocking_send(HostEvent::Ready).is_err() {
        return;
    }

    while let Some(request) = requests.blocking_recv() {
        let reply = match interpreter.eval_source(&request.source) {
            Ok(value) => HostReply::success(request.evaluation_id, value.to_result_text()),
            Err(e) => HostReply::failure(request.evaluation_id, e.to_string()),
        };
        if events.blocking_send(HostEvent::Reply(reply)).is_err() {
            break;
        }
    }
}
