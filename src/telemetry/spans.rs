//! Span utilities for endpoint operations.

use tracing::{debug_span, Span};

/// Extension trait for recording outcomes into spans.
pub trait SpanExt {
    /// Record the result of an operation into the span.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for endpoint operation spans.
pub struct EndpointSpan;

impl EndpointSpan {
    /// Create a span for `op` on one end of a pipe.
    ///
    /// `status` and `error.message` are filled in by `SpanExt::record_result`.
    pub fn new(op: &'static str, pipe_id: u64, side: i8) -> Span {
        debug_span!(
            "endpoint_op",
            op,
            pipe_id,
            side,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    }
}
