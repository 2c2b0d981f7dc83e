//! Error types for the signal-receiver crate.

use thiserror::Error;

/// Errors that can occur while receiving, decrypting, and dispatching envelopes.
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// The transport frame failed MAC verification or was malformed ciphertext.
    #[error("frame authentication failed: {0}")]
    FrameAuth(String),

    /// Signal padding trailer did not end in the `0x80` sentinel.
    #[error("invalid padding trailer")]
    Padding,

    /// An envelope carried a type this crate does not know how to decrypt.
    #[error("unknown envelope type")]
    UnknownEnvelopeType,

    /// An envelope had neither `content` nor `legacy_message` set.
    #[error("empty envelope")]
    EmptyEnvelope,

    /// A decrypted `Content` had neither `sync_message` nor `data_message` set.
    #[error("empty content")]
    EmptyContent,

    /// A `SyncMessage` matched none of the known variants.
    #[error("empty sync message")]
    EmptySync,

    /// A sync envelope did not originate from our own address.
    #[error("sync message from foreign address: {0}")]
    ForeignSync(String),

    /// A sync envelope arrived on our own device id (sync messages are
    /// addressed to our other devices, never to the originating one).
    #[error("sync message addressed to own device")]
    SelfSync,

    /// A deprecated `SyncMessage` variant (`contacts`, `groups`, `request`) was received.
    #[error("deprecated sync variant: {0}")]
    DeprecatedSync(&'static str),

    /// The session cipher rejected a duplicate or out-of-order message counter.
    #[error("duplicate or out-of-order message counter")]
    MessageCounter,

    /// The sender's identity key differs from the one we have on file.
    #[error("identity key changed for {addr}")]
    IncomingIdentityKey {
        addr: String,
        ciphertext: Vec<u8>,
        identity_key: Vec<u8>,
    },

    /// Any other protocol-layer fault surfaced by the session store or codec.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An inbound transport request was not `PUT /api/v1/message`.
    #[error("bad transport request: {0}")]
    BadTransportRequest(String),

    /// `Receiver::drain` was called while a streaming transport is attached.
    #[error("cannot drain while a transport is connected")]
    DrainWhileConnected,

    /// A feature that the source format exposes but this receiver does not implement.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// Failure from the `Service` HTTP collaborator.
    #[error("service error: {0}")]
    Service(String),

    /// Failure decoding protobuf-encoded wire bytes.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ReceiverError {
    /// Whether this error belongs to the "protocol error family" that the
    /// dispatcher logs and swallows (ACKs upstream) rather than propagating.
    pub fn is_recoverable_protocol_error(&self) -> bool {
        matches!(
            self,
            ReceiverError::MessageCounter
                | ReceiverError::Protocol(_)
                | ReceiverError::EmptyContent
                | ReceiverError::EmptySync
                | ReceiverError::ForeignSync(_)
                | ReceiverError::SelfSync
                | ReceiverError::DeprecatedSync(_)
                | ReceiverError::Unsupported(_)
                | ReceiverError::EmptyEnvelope
                | ReceiverError::UnknownEnvelopeType
        )
    }
}

impl From<serde_json::Error> for ReceiverError {
    fn from(err: serde_json::Error) -> Self {
        ReceiverError::Decode(err.to_string())
    }
}
