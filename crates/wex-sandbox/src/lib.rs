//! WEX sandbox (wex-sandbox)
//!
//! Evaluates one short snippet of untrusted author code at a time inside
//! an isolated execution host, and mediates every evaluation through a
//! serialized request/response channel.
//!
//! Two layers:
//!
//! 1. **Execution host** — a capability-free interpreter for the snippet
//!    language, confined to its own OS thread. It has no filesystem,
//!    network, clock, or host-state builtins; the only way in or out is
//!    the request/response wire pair.
//! 2. **[`SandboxChannel`]** — owns the host's lifecycle, serializes
//!    concurrent submissions into a strict one-at-a-time queue,
//!    correlates replies by evaluation id, and enforces a per-request
//!    timeout with cleanup.
//!
//! # Quick start
//!
//! ```rust,ignore
//! let channel = SandboxChannel::new();
//! let response = channel.submit("((a, b = 1) => a * b)(6, 7)", None).await;
//! assert_eq!(response.result.as_deref(), Some("42"));
//! ```

pub mod channel;
pub mod error;
pub mod host;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod value;

pub use channel::{EvaluationResponse, SandboxChannel, DEFAULT_TIMEOUT};
pub use error::EvalError;
pub use host::{EvalRequest, HostEvent, HostHandle, HostReply};
pub use interp::Interpreter;
pub use value::Value;
