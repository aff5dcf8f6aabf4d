//! Counters recorded through the `metrics` facade.
//!
//! Without an installed recorder every call is a no-op.

use ::metrics::counter;

pub fn record_message_written(bytes: u64) {
    counter!("msgpipe_messages_written_total").increment(1);
    counter!("msgpipe_bytes_written_total").increment(bytes);
}

pub fn record_write_failure() {
    counter!("msgpipe_write_failures_total").increment(1);
}

pub fn record_message_read(bytes: u64) {
    counter!("msgpipe_messages_read_total").increment(1);
    counter!("msgpipe_bytes_read_total").increment(bytes);
}

pub fn record_quota_exceeded() {
    counter!("msgpipe_quota_exceeded_total").increment(1);
}

pub fn record_transfer_serialized() {
    counter!("msgpipe_transfers_serialized_total").increment(1);
}

pub fn record_transfer_deserialized() {
    counter!("msgpipe_transfers_deserialized_total").increment(1);
}

pub fn record_fuse(merged: bool) {
    let outcome = if merged { "merged" } else { "rejected" };
    counter!("msgpipe_fuses_total", "outcome" => outcome).increment(1);
}
