//! Wire format for moving an endpoint to another process.
//!
//! Layout (16 bytes, 8-byte multiple):
//!
//! ```text
//! [pipe_id: u64-le][side: i8][reserved: 7 x 0x00]
//! ```
//!
//! The record travels with exactly one port attachment (the endpoint's
//! slot) and no raw handles.

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use super::Endpoint;
use crate::telemetry::{self, EndpointSpan, SpanExt};
use crate::transport::{PortName, RoutingTransport, SlotId, SlotRef, DEFAULT_SLOT_ID};

/// Size of the serialized endpoint record.
pub const RECORD_SIZE: usize = 16;

const PIPE_ID_OFFSET: usize = 0;
const SIDE_OFFSET: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("only the default slot can be transferred (slot {0})")]
    NonDefaultSlot(u64),

    #[error("payload must be {expected} bytes, got {actual}")]
    PayloadSize { expected: usize, actual: usize },

    #[error("expected exactly one port attachment, got {0}")]
    PortCount(usize),

    #[error("expected no raw handles, got {0}")]
    HandleCount(usize),

    #[error("port {0} unknown to this transport")]
    UnknownPort(PortName),

    #[error("status of slot {0} unavailable")]
    StatusUnavailable(SlotRef),
}

/// A port carried out-of-band next to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortAttachment {
    pub name: PortName,
    /// `None` means the default slot.
    pub slot_id: Option<SlotId>,
}

/// An OS-level handle attachment. Message pipes never carry any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHandle(pub i64);

/// Attachment counts an endpoint needs when serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializedSize {
    pub num_bytes: usize,
    pub num_ports: usize,
    pub num_handles: usize,
}

/// A serialized endpoint ready for transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub payload: Vec<u8>,
    pub ports: Vec<PortAttachment>,
    pub handles: Vec<RawHandle>,
}

pub fn encode_record(pipe_id: u64, side: i8) -> [u8; RECORD_SIZE] {
    let mut buf = [0u8; RECORD_SIZE];
    buf[PIPE_ID_OFFSET..SIDE_OFFSET].copy_from_slice(&pipe_id.to_le_bytes());
    buf[SIDE_OFFSET] = side as u8;
    buf
}

/// Decode a record. Reserved bytes are ignored.
pub fn decode_record(bytes: &[u8]) -> Result<(u64, i8), WireError> {
    if bytes.len() != RECORD_SIZE {
        return Err(WireError::PayloadSize {
            expected: RECORD_SIZE,
            actual: bytes.len(),
        });
    }
    let mut pipe_id = [0u8; 8];
    pipe_id.copy_from_slice(&bytes[PIPE_ID_OFFSET..SIDE_OFFSET]);
    Ok((u64::from_le_bytes(pipe_id), bytes[SIDE_OFFSET] as i8))
}

impl Endpoint {
    pub fn start_serialize(&self) -> SerializedSize {
        SerializedSize {
            num_bytes: RECORD_SIZE,
            num_ports: 1,
            num_handles: 0,
        }
    }

    /// Serialize identity and slot. Fails unless bound to a default slot.
    pub fn end_serialize(&self) -> Result<TransferRecord, WireError> {
        let inner = self.inner.lock();
        if !inner.slot.is_default() {
            return Err(WireError::NonDefaultSlot(inner.slot.slot_id.0));
        }
        telemetry::record_transfer_serialized();
        Ok(TransferRecord {
            payload: encode_record(self.pipe_id, self.side).to_vec(),
            ports: vec![PortAttachment {
                name: inner.slot.port,
                slot_id: Some(DEFAULT_SLOT_ID),
            }],
            handles: Vec::new(),
        })
    }

    /// Reconstitute an open endpoint from `record` on `transport`.
    pub fn deserialize(
        transport: Arc<dyn RoutingTransport>,
        record: &TransferRecord,
    ) -> Result<Arc<Endpoint>, WireError> {
        let result = Self::deserialize_inner(transport, record);
        if let Err(e) = &result {
            warn!(error = %e, "rejected endpoint transfer record");
        }
        result
    }

    fn deserialize_inner(
        transport: Arc<dyn RoutingTransport>,
        record: &TransferRecord,
    ) -> Result<Arc<Endpoint>, WireError> {
        if record.ports.len() != 1 {
            return Err(WireError::PortCount(record.ports.len()));
        }
        if !record.handles.is_empty() {
            return Err(WireError::HandleCount(record.handles.len()));
        }
        let (pipe_id, side) = decode_record(&record.payload)?;

        let span = EndpointSpan::new("deserialize", pipe_id, side);
        let _guard = span.enter();

        let attachment = record.ports[0];
        let port = transport
            .get_port(attachment.name)
            .map_err(|_| WireError::UnknownPort(attachment.name))?;
        let slot = SlotRef::new(port.port, attachment.slot_id.unwrap_or(DEFAULT_SLOT_ID));
        let result = match transport.status(slot) {
            Some(_) => Ok(Endpoint::new(transport, slot, pipe_id, side)),
            None => Err(WireError::StatusUnavailable(slot)),
        };
        span.record_result(&result);
        if result.is_ok() {
            telemetry::record_transfer_deserialized();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_layout() {
        let bytes = encode_record(0x0102_0304_0506_0708, -1);
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..8], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(bytes[8], 0xff);
        assert!(bytes[9..].iter().all(|b| *b == 0));
    }

    #[test]
    fn decode_restores_fields() {
        let bytes = encode_record(42, 1);
        assert_eq!(decode_record(&bytes), Ok((42, 1)));
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert_eq!(
            decode_record(&[0u8; 15]),
            Err(WireError::PayloadSize { expected: 16, actual: 15 })
        );
        assert!(decode_record(&[0u8; 24]).is_err());
        assert!(decode_record(&[]).is_err());
    }

    #[test]
    fn decode_ignores_reserved_bytes() {
        let mut bytes = encode_record(9, 0);
        bytes[15] = 0xaa;
        assert_eq!(decode_record(&bytes), Ok((9, 0)));
    }
}
