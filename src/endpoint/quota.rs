//! Receive-queue quotas.
//!
//! Two independent optional caps: queued message count and queued bytes.
//! Exceeding either folds `QUOTA_EXCEEDED` into the signals state.

use super::error::PipeError;
use crate::transport::SlotStatus;

/// Sentinel limit meaning "no cap".
pub const QUOTA_LIMIT_NONE: u64 = u64::MAX;

/// Which receive-queue dimension a quota applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaKind {
    ReceiveQueueLength,
    ReceiveQueueMemorySize,
}

impl TryFrom<u32> for QuotaKind {
    type Error = PipeError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::ReceiveQueueLength),
            1 => Ok(Self::ReceiveQueueMemorySize),
            other => Err(PipeError::invalid(format!("unknown quota kind {}", other))),
        }
    }
}

/// A typed quota update. `limit == QUOTA_LIMIT_NONE` clears the cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaRequest {
    pub kind: QuotaKind,
    pub limit: u64,
}

/// Result of a quota query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaUsage {
    /// `None` when no cap is set.
    pub limit: Option<u64>,
    pub usage: u64,
}

/// Configured caps for one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuotaLimits {
    pub receive_length_limit: Option<u64>,
    pub receive_bytes_limit: Option<u64>,
}

impl QuotaLimits {
    pub fn apply(&mut self, request: QuotaRequest) {
        let limit = (request.limit != QUOTA_LIMIT_NONE).then_some(request.limit);
        match request.kind {
            QuotaKind::ReceiveQueueLength => self.receive_length_limit = limit,
            QuotaKind::ReceiveQueueMemorySize => self.receive_bytes_limit = limit,
        }
    }

    pub fn limit(&self, kind: QuotaKind) -> Option<u64> {
        match kind {
            QuotaKind::ReceiveQueueLength => self.receive_length_limit,
            QuotaKind::ReceiveQueueMemorySize => self.receive_bytes_limit,
        }
    }

    pub fn usage(&self, kind: QuotaKind, status: &SlotStatus) -> QuotaUsage {
        let usage = match kind {
            QuotaKind::ReceiveQueueLength => status.queued_message_count,
            QuotaKind::ReceiveQueueMemorySize => status.queued_num_bytes,
        };
        QuotaUsage {
            limit: self.limit(kind),
            usage,
        }
    }

    /// Usage strictly greater than a cap trips the quota.
    pub fn is_exceeded(&self, status: &SlotStatus) -> bool {
        let over = |limit: Option<u64>, usage: u64| limit.is_some_and(|l| usage > l);
        over(self.receive_length_limit, status.queued_message_count)
            || over(self.receive_bytes_limit, status.queued_num_bytes)
    }
}
