//! Session-cipher coordination: routes an envelope's ciphertext to the right
//! decrypt operation on the host's `SessionStore` based on envelope type.

use crate::error::ReceiverError;
use crate::session_store::SessionStore;
use crate::types::{Envelope, EnvelopeType};

/// Decrypts envelope ciphertext against a session, without knowing anything
/// about how the session store persists or classifies libsignal state.
pub struct SessionDecryptor<'a> {
    store: &'a dyn SessionStore,
}

impl<'a> SessionDecryptor<'a> {
    pub fn new(store: &'a dyn SessionStore) -> Self {
        SessionDecryptor { store }
    }

    /// Decrypt `envelope`'s ciphertext, routing to the pre-key or whisper
    /// path based on `envelope.kind`.
    pub async fn decrypt(&self, envelope: &Envelope) -> Result<Vec<u8>, ReceiverError> {
        let ciphertext = envelope.ciphertext().ok_or(ReceiverError::EmptyEnvelope)?;

        match envelope.kind {
            EnvelopeType::PreKeyBundle => {
                self.store
                    .decrypt_pre_key_whisper(&envelope.source, envelope.source_device, ciphertext)
                    .await
            }
            EnvelopeType::Ciphertext => {
                self.store
                    .decrypt_whisper(&envelope.source, envelope.source_device, ciphertext)
                    .await
            }
            EnvelopeType::Receipt => Err(ReceiverError::EmptyEnvelope),
            EnvelopeType::UnidentifiedSender => {
                Err(ReceiverError::Unsupported("unidentified sender envelopes"))
            }
        }
    }
}
