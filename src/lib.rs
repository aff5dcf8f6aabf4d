//! msgpipe-core
//!
//! One side of a bidirectional, ordered, quota-bounded message pipe built on
//! an address-routing transport.
//!
//! # Components
//!
//! - [`endpoint`]: lifecycle and transit state machine, signals, watchers,
//!   quotas and the transfer wire format
//! - [`transport`]: the routing transport contract, plus [`transport::LocalNode`],
//!   a complete in-process implementation
//! - [`config`]: `MSGPIPE_*` environment configuration
//! - [`telemetry`]: logging, spans and metrics
//!
//! # Threading
//!
//! Endpoints are shared (`Arc`) and safe to use from any thread. No call
//! blocks waiting for a message: reads return `ShouldWait`, and readiness is
//! observed through watchers such as [`endpoint::SignalWaiter`].

pub mod cli;
pub mod config;
pub mod endpoint;
pub mod telemetry;
pub mod transport;

pub use endpoint::{
    create_local_pipe, Endpoint, EndpointState, HandleSignals, PipeError, SignalsState,
};
pub use transport::{LocalNode, Message, RoutingTransport};
