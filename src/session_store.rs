//! The `SessionStore` collaborator: the host-owned Signal session store this
//! crate decrypts against. Modeled on the teacher's
//! `storage/session_store.rs` shape, generalized to a trait boundary since
//! the store is owned by the host application rather than this crate.

use async_trait::async_trait;

use crate::error::ReceiverError;

/// Decrypts ciphertext against a libsignal session and exposes the handful
/// of session-lifecycle operations the dispatch pipeline needs.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Decrypt a `SignalMessage` (whisper message) against an existing
    /// session for `(addr, device_id)`.
    async fn decrypt_whisper(
        &self,
        addr: &str,
        device_id: u32,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, ReceiverError>;

    /// Decrypt a `PreKeySignalMessage`, establishing a session if needed.
    async fn decrypt_pre_key_whisper(
        &self,
        addr: &str,
        device_id: u32,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, ReceiverError>;

    /// All device ids we currently hold a session for under `addr`.
    async fn get_device_ids(&self, addr: &str) -> Result<Vec<u32>, ReceiverError>;

    /// Tear down the session for `(addr, device_id)`, forcing the next
    /// pre-key message to establish a fresh one. Used when a `DataMessage`
    /// carries `DataFlags::END_SESSION`.
    async fn close_open_session_for_device(
        &self,
        addr: &str,
        device_id: u32,
    ) -> Result<(), ReceiverError>;
}
