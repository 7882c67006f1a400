//! Sandbox channel
//!
//! Runs exactly one evaluation at a time inside the execution host and
//! resolves each caller's submission with the correctly correlated
//! response.
//!
//! A channel instance moves through `Uninitialized → HostLoading → Idle
//! ⇄ Busy → Disposed`. Submissions that arrive before the host signals
//! ready, or while another evaluation is in flight, wait in a FIFO queue;
//! the next request is dispatched only once the in-flight one settles
//! (reply, timeout, or host failure). Serialization is a correctness
//! requirement, not a throughput choice: the host's global scope is
//! shared state, and two interleaved evaluations could corrupt each
//! other's results.
//!
//! All state lives on the channel instance. Independent channels (one
//! per test, say) never interfere.

use crate::host::{EvalRequest, HostEvent, HostHandle, HostReply};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Timeout error text; callers match on "Timeout" to offer a retry with
/// a longer budget.
pub const TIMEOUT_ERROR: &str = "Timeout waiting for response from sandboxed execution";

/// Error used when the host's execution context has gone away.
pub const HOST_GONE_ERROR: &str = "Sandboxed execution host is unavailable";

/// Error used for requests failed by `dispose()`.
pub const DISPOSED_ERROR: &str = "Sandbox channel disposed";

/// Outcome of one evaluation. Exactly one of `result`/`error` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResponse {
    /// Stringified result on success
    pub result: Option<String>,
    /// Error text on failure (execution error, timeout, host failure)
    pub error: Option<String>,
    /// When the caller submitted
    pub requested_at: DateTime<Utc>,
    /// When the request was dispatched to the host; `None` if it never
    /// was (failed while queued)
    pub start_time: Option<DateTime<Utc>>,
    /// Wall-clock from dispatch to settlement
    pub time_taken_ms: u64,
}

impl EvaluationResponse {
    fn success(
        result: String,
        requested_at: DateTime<Utc>,
        start_time: DateTime<Utc>,
        time_taken_ms: u64,
    ) -> Self {
        Self {
            result: Some(result),
            error: None,
            requested_at,
            start_time: Some(start_time),
            time_taken_ms,
        }
    }

    fn failure(
        error: impl Into<String>,
        requested_at: DateTime<Utc>,
        start_time: Option<DateTime<Utc>>,
        time_taken_ms: u64,
    ) -> Self {
        Self {
            result: None,
            error: Some(error.into()),
            requested_at,
            start_time,
            time_taken_ms,
        }
    }

    /// True when the evaluation failed (including timeout)
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Result text, if the evaluation succeeded
    #[inline]
    #[must_use]
    pub fn result_text(&self) -> Option<&str> {
        self.result.as_deref()
    }
}

/// The serialized request/response mediator to the execution host.
///
/// Owns the host's lifecycle: dropping the channel (or calling
/// [`dispose`](Self::dispose)) tears the host down.
#[derive(Debug)]
pub struct SandboxChannel {
    commands: mpsc::UnboundedSender<Command>,
}

impl SandboxChannel {
    /// Create a channel over a freshly spawned host.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::with_host(HostHandle::spawn())
    }

    /// Create a channel over a caller-provided host. Tests use this with
    /// scripted hosts (silent, slow, or out-of-order).
    #[must_use]
    pub fn with_host(host: HostHandle) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let worker = ChannelWorker {
            host_requests: host.requests,
            host_events: host.events,
            commands: command_rx,
            queue: VecDeque::new(),
            in_flight: None,
            ready: false,
            host_gone: false,
            next_evaluation_id: 1,
        };
        tokio::spawn(worker.run());
        Self { commands }
    }

    /// Submit a snippet for evaluation.
    ///
    /// The source is trusted to be syntactically valid function-or
    /// expression code; it is not validated here. Resolves once the host
    /// answers, the timeout (default 100 ms) fires, or the channel is
    /// disposed — never hangs, never panics.
    pub async fn submit(
        &self,
        source: impl Into<String>,
        timeout: Option<Duration>,
    ) -> EvaluationResponse {
        let requested_at = Utc::now();
        let (reply, reply_rx) = oneshot::channel();
        let pending = Pending {
            source: source.into(),
            timeout: timeout.unwrap_or(DEFAULT_TIMEOUT),
            reply,
            requested_at,
        };

        if self.commands.send(Command::Submit(pending)).is_err() {
            return EvaluationResponse::failure(DISPOSED_ERROR, requested_at, None, 0);
        }
        match reply_rx.await {
            Ok(response) => response,
            Err(_) => EvaluationResponse::failure(DISPOSED_ERROR, requested_at, None, 0),
        }
    }

    /// Tear down the host and fail all pending submissions. Safe to call
    /// multiple times.
    pub fn dispose(&self) {
        let _ = self.commands.send(Command::Dispose);
    }
}

impl Default for SandboxChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SandboxChannel {
    fn drop(&mut self) {
        self.dispose();
    }
}

enum Command {
    Submit(Pending),
    Dispose,
}

struct Pending {
    source: String,
    timeout: Duration,
    reply: oneshot::Sender<EvaluationResponse>,
    requested_at: DateTime<Utc>,
}

struct InFlight {
    evaluation_id: u64,
    reply: oneshot::Sender<EvaluationResponse>,
    requested_at: DateTime<Utc>,
    start_time: DateTime<Utc>,
    dispatched_at: Instant,
    deadline: Instant,
}

/// Channel-instance-owned state: the queue, the single in-flight slot,
/// and the host handle. Runs as one tokio task.
struct ChannelWorker {
    host_requests: mpsc::Sender<EvalRequest>,
    host_events: mpsc::Receiver<HostEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    queue: VecDeque<Pending>,
    in_flight: Option<InFlight>,
    ready: bool,
    host_gone: bool,
    next_evaluation_id: u64,
}

impl ChannelWorker {
    async fn run(mut self) {
        loop {
            let deadline = self.in_flight.as_ref().map(|f| f.deadline);
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Submit(pending)) => {
                        self.queue.push_back(pending);
                        self.try_dispatch();
                    }
                    Some(Command::Dispose) | None => break,
                },
                event = self.host_events.recv(), if !self.host_gone => match event {
                    Some(HostEvent::Ready) => {
                        tracing::debug!("sandbox host ready");
                        self.ready = true;
                        self.try_dispatch();
                    }
                    Some(HostEvent::Reply(reply)) => self.on_reply(reply),
                    None => self.on_host_gone(),
                },
                () = async { tokio::time::sleep_until(deadline.unwrap()).await },
                    if deadline.is_some() => self.on_timeout(),
            }
        }
        self.fail_all(DISPOSED_ERROR);
        tracing::debug!("sandbox channel disposed");
    }

    /// Dispatch the next queued request if the host is ready and nothing
    /// is in flight.
    fn try_dispatch(&mut self) {
        if self.in_flight.is_some() || !self.ready || self.host_gone {
            return;
        }
        let Some(pending) = self.queue.pop_front() else {
            return;
        };

        let evaluation_id = self.next_evaluation_id;
        self.next_evaluation_id += 1;
        let start_time = Utc::now();
        let request = EvalRequest {
            evaluation_id,
            source: pending.source,
            start_time: start_time.timestamp_millis(),
        };

        // At most one request is ever outstanding, so the host buffer
        // cannot be full; a send failure means the host is gone.
        if self.host_requests.try_send(request).is_err() {
            respond(
                pending.reply,
                EvaluationResponse::failure(HOST_GONE_ERROR, pending.requested_at, None, 0),
            );
            self.on_host_gone();
            return;
        }

        let now = Instant::now();
        tracing::debug!(evaluation_id, "dispatched evaluation");
        self.in_flight = Some(InFlight {
            evaluation_id,
            reply: pending.reply,
            requested_at: pending.requested_at,
            start_time,
            dispatched_at: now,
            deadline: now + pending.timeout,
        });
    }

    fn on_reply(&mut self, reply: HostReply) {
        let correlated = self
            .in_flight
            .as_ref()
            .is_some_and(|f| f.evaluation_id == reply.evaluation_id);
        if !correlated {
            // Late response for a timed-out (abandoned) evaluation
            tracing::debug!(
                evaluation_id = reply.evaluation_id,
                "ignoring response for abandoned evaluation"
            );
            return;
        }

        let flight = self.in_flight.take().expect("correlated in-flight");
        let time_taken_ms = flight.dispatched_at.elapsed().as_millis() as u64;
        let response = match reply.result {
            Some(result) => EvaluationResponse::success(
                result,
                flight.requested_at,
                flight.start_time,
                time_taken_ms,
            ),
            None => EvaluationResponse::failure(
                reply
                    .error
                    .unwrap_or_else(|| "Unknown sandbox error".to_string()),
                flight.requested_at,
                Some(flight.start_time),
                time_taken_ms,
            ),
        };
        respond(flight.reply, response);
        self.try_dispatch();
    }

    fn on_timeout(&mut self) {
        let Some(flight) = self.in_flight.take() else {
            return;
        };
        tracing::warn!(
            evaluation_id = flight.evaluation_id,
            "evaluation timed out"
        );
        let time_taken_ms = flight.dispatched_at.elapsed().as_millis() as u64;
        respond(
            flight.reply,
            EvaluationResponse::failure(
                TIMEOUT_ERROR,
                flight.requested_at,
                Some(flight.start_time),
                time_taken_ms,
            ),
        );
        // The timed-out id is no longer tracked; its late reply, if any,
        // is ignored. The queue advances regardless.
        self.try_dispatch();
    }

    fn on_host_gone(&mut self) {
        if self.host_gone {
            return;
        }
        tracing::warn!("sandbox host is gone");
        self.host_gone = true;
        if let Some(flight) = self.in_flight.take() {
            let time_taken_ms = flight.dispatched_at.elapsed().as_millis() as u64;
            respond(
                flight.reply,
                EvaluationResponse::failure(
                    HOST_GONE_ERROR,
                    flight.requested_at,
                    Some(flight.start_time),
                    time_taken_ms,
                ),
            );
        }
        // Queued submissions stay queued; they are failed on dispose().
        // Re-creating a host is the surrounding application's call,
        // between evaluation cycles.
    }

    fn fail_all(&mut self, error: &str) {
        if let Some(flight) = self.in_flight.take() {
            respond(
                flight.reply,
                EvaluationResponse::failure(
                    error,
                    flight.requested_at,
                    Some(flight.start_time),
                    flight.dispatched_at.elapsed().as_millis() as u64,
                ),
            );
        }
        for pending in self.queue.drain(..) {
            respond(
                pending.reply,
                EvaluationResponse::failure(error, pending.requested_at, None, 0),
            );
        }
    }
}

/// Deliver a response, ignoring callers that stopped listening.
fn respond(reply: oneshot::Sender<EvaluationResponse>, response: EvaluationResponse) {
    let _ = reply.send(response);
}
