//! The protobuf-decoding collaborator. Wire-format parsing itself is out of
//! scope for this crate (host-owned, per the external-interfaces design); we
//! only define the trait boundary the dispatch pipeline calls into.

use crate::error::ReceiverError;
use crate::types::{Content, DataMessage, Envelope};

/// Decodes the protobuf-encoded byte strings this crate receives from the
/// transport and, after decryption, from the session cipher.
pub trait ProtobufCodec: Send + Sync {
    /// Decode a raw `Envelope` protobuf frame (pre-decryption).
    fn decode_envelope(&self, bytes: &[u8]) -> Result<Envelope, ReceiverError>;

    /// Decode a decrypted `Content` protobuf.
    fn decode_content(&self, bytes: &[u8]) -> Result<Content, ReceiverError>;

    /// Decode a `DataMessage` protobuf nested inside a legacy (pre-`Content`)
    /// envelope.
    fn decode_data_message(&self, bytes: &[u8]) -> Result<DataMessage, ReceiverError>;

    /// Decode one page of the drain-mode `GET messages` response body into
    /// the envelopes it carries plus whether the server has more queued.
    /// Each item's `content`/`message` field, base64-encoded on the wire, is
    /// decoded straight into the envelope's `content`/`legacy_message`.
    fn decode_envelope_batch(&self, bytes: &[u8]) -> Result<(Vec<Envelope>, bool), ReceiverError>;
}
