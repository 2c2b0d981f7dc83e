//! signal-receiver -- envelope reception and decryption pipeline for a
//! Signal-protocol-compatible chat service.
//!
//! This crate owns the receive-side state machine only: unwrapping transport
//! frames, routing ciphertext through a session cipher, and dispatching the
//! resulting content to the host application as typed events. Sending
//! messages, key generation/registration, group state, and the wire codec
//! itself are host-owned concerns, expressed here as trait boundaries
//! (`ProtobufCodec`, `MessageTransport`, `Service`, `SessionStore`,
//! `StateStore`) rather than implemented.
//!
//! ## Architecture
//!
//! - **Async public API**: every collaborator trait and dispatch stage is
//!   natively async (`tokio`), unlike a sync-over-SQLite crate that would
//!   need to bridge through `futures::executor::block_on`.
//! - **Caller-provided collaborators**: `Receiver::new` takes `Arc<dyn ...>`
//!   implementations of every external interface; this crate never owns a
//!   database connection or an HTTP client directly.
//! - **libsignal internally**: session-store implementations built on
//!   `libsignal-protocol`'s `message_decrypt_signal` / `message_decrypt_prekey`
//!   are the host's responsibility; `SessionDecryptor` only routes to them.
//!
//! ## Modules
//!
//! - [`error`] -- `ReceiverError` enum
//! - [`types`] -- wire/data-model types and public event payloads
//! - [`codec`] -- the `ProtobufCodec` collaborator trait
//! - [`transport`] -- the `MessageTransport` collaborator trait
//! - [`service`] -- the `Service` HTTP collaborator trait
//! - [`session_store`] -- the `SessionStore` collaborator trait
//! - [`state_store`] -- the read-only `StateStore` collaborator trait
//! - [`event_bus`] -- `EventBus` and `Listener`
//! - [`backoff`] -- reconnect backoff
//! - [`serial_queue`] -- per-owner FIFO serialization
//! - [`envelope_crypto`] -- transport frame authentication/decryption and padding
//! - [`session`] -- `SessionDecryptor`
//! - [`dispatch`] -- `EnvelopeDispatcher` and `ContentDispatcher`
//! - [`attachment`] -- `AttachmentFetcher`
//! - [`config`] -- `ReceiverConfig`
//! - [`receiver`] -- the top-level `Receiver` lifecycle

pub mod attachment;
pub mod backoff;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod envelope_crypto;
pub mod error;
pub mod event_bus;
pub mod receiver;
pub mod serial_queue;
pub mod service;
pub mod session;
pub mod session_store;
pub mod state_store;
pub mod transport;
pub mod types;

pub use error::ReceiverError;
pub use receiver::Receiver;
pub use types::Event;

#[cfg(test)]
mod tests {
    #[test]
    fn all_public_modules_accessible() {
        use crate::config::ReceiverConfig;
        use crate::error::ReceiverError;
        use crate::receiver::Receiver;
        use crate::types::{Envelope, Event};

        let _ = std::mem::size_of::<ReceiverError>();
        let _ = std::mem::size_of::<ReceiverConfig>();
        let _ = std::mem::size_of::<Envelope>();
        let _ = std::mem::size_of::<Event>();
        let _ = std::mem::size_of::<Receiver>();
    }
}
