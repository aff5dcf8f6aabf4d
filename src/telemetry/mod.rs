//! Telemetry for message pipe endpoints.
//!
//! Structured logging through `tracing`, spans around transfer operations,
//! and counters through the `metrics` facade.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    record_fuse, record_message_read, record_message_written, record_quota_exceeded,
    record_transfer_deserialized, record_transfer_serialized, record_write_failure,
};
pub use spans::{EndpointSpan, SpanExt};
