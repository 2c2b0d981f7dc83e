//! Fetches and decrypts attachment bodies referenced by a `DataMessage`.
//!
//! Attachment ciphertext is framed differently from transport frames:
//! `iv:16 || ciphertext || mac:32`, AES-256-CBC keyed by the first 32 bytes
//! of the attachment's 64-byte key, HMAC-SHA256 (untruncated) keyed by the
//! last 32 bytes, computed over `iv || ciphertext`.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::ReceiverError;
use crate::service::Service;
use crate::types::Attachment;

const IV_LEN: usize = 16;
const MAC_LEN: usize = 32;
const ATTACHMENT_KEY_LEN: usize = 64;
const AES_KEY_LEN: usize = 32;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

pub struct AttachmentFetcher;

impl AttachmentFetcher {
    /// Resolve `attachment`'s CDN URL, download it, and decrypt it in place,
    /// returning a copy of `attachment` with `data` populated.
    pub async fn fetch(
        attachment: &Attachment,
        service: &dyn Service,
    ) -> Result<Attachment, ReceiverError> {
        let url = service.get_attachment(&attachment.id).await?;
        let ciphertext = service.request("GET", &url).await?;
        let plaintext = Self::decrypt(&attachment.key, &ciphertext)?;

        Ok(Attachment {
            id: attachment.id.clone(),
            key: attachment.key.clone(),
            size: attachment.size,
            content_type: attachment.content_type.clone(),
            data: Some(plaintext),
        })
    }

    /// Verify and decrypt a raw attachment blob with its 64-byte key.
    pub fn decrypt(key: &[u8], blob: &[u8]) -> Result<Vec<u8>, ReceiverError> {
        if key.len() != ATTACHMENT_KEY_LEN {
            return Err(ReceiverError::FrameAuth(format!(
                "attachment key must be {ATTACHMENT_KEY_LEN} bytes, got {}",
                key.len()
            )));
        }
        if blob.len() < IV_LEN + MAC_LEN {
            return Err(ReceiverError::FrameAuth("attachment blob too short".into()));
        }

        let mac_offset = blob.len() - MAC_LEN;
        let (signed, mac) = blob.split_at(mac_offset);

        let aes_key = &key[..AES_KEY_LEN];
        let mac_key = &key[AES_KEY_LEN..];

        let mut verifier =
            HmacSha256::new_from_slice(mac_key).map_err(|e| ReceiverError::FrameAuth(e.to_string()))?;
        verifier.update(signed);
        verifier
            .verify_slice(mac)
            .map_err(|_| ReceiverError::FrameAuth("attachment mac mismatch".into()))?;

        let iv = &signed[..IV_LEN];
        let ciphertext = &signed[IV_LEN..];

        let decryptor = Aes256CbcDec::new_from_slices(aes_key, iv)
            .map_err(|e| ReceiverError::FrameAuth(e.to_string()))?;
        decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|e| ReceiverError::FrameAuth(format!("cbc decrypt: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::BlockEncryptMut;
    use async_trait::async_trait;

    type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

    fn make_blob(key: &[u8], iv: [u8; 16], plaintext: &[u8]) -> Vec<u8> {
        let aes_key = &key[..AES_KEY_LEN];
        let mac_key = &key[AES_KEY_LEN..];

        let ciphertext = Aes256CbcEnc::new_from_slices(aes_key, &iv)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut signed = iv.to_vec();
        signed.extend_from_slice(&ciphertext);

        let mut mac = HmacSha256::new_from_slice(mac_key).unwrap();
        mac.update(&signed);

        let mut blob = signed;
        blob.extend_from_slice(&mac.finalize().into_bytes());
        blob
    }

    #[test]
    fn decrypt_round_trips_valid_blob() {
        let key = vec![3u8; ATTACHMENT_KEY_LEN];
        let blob = make_blob(&key, [2u8; 16], b"attachment bytes");
        let plaintext = AttachmentFetcher::decrypt(&key, &blob).unwrap();
        assert_eq!(plaintext, b"attachment bytes");
    }

    #[test]
    fn decrypt_rejects_wrong_key_length() {
        let key = vec![3u8; 10];
        let blob = vec![0u8; 64];
        assert!(matches!(
            AttachmentFetcher::decrypt(&key, &blob),
            Err(ReceiverError::FrameAuth(_))
        ));
    }

    #[test]
    fn decrypt_rejects_tampered_blob() {
        let key = vec![3u8; ATTACHMENT_KEY_LEN];
        let mut blob = make_blob(&key, [2u8; 16], b"attachment bytes");
        blob[20] ^= 0xff;
        assert!(matches!(
            AttachmentFetcher::decrypt(&key, &blob),
            Err(ReceiverError::FrameAuth(_))
        ));
    }

    struct FakeService {
        key: Vec<u8>,
        blob: Vec<u8>,
    }

    #[async_trait]
    impl Service for FakeService {
        async fn request(&self, _method: &str, _path: &str) -> Result<Vec<u8>, ReceiverError> {
            Ok(self.blob.clone())
        }
        async fn get_devices(&self) -> Result<Vec<u32>, ReceiverError> {
            Ok(vec![])
        }
        async fn get_attachment(&self, id: &str) -> Result<String, ReceiverError> {
            Ok(format!("https://cdn.example/{id}"))
        }
        fn get_message_stream_url(&self) -> String {
            "/api/v1/messages".into()
        }
        async fn delete_message(&self, _source: &str, _timestamp: u64) -> Result<(), ReceiverError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn fetch_downloads_and_decrypts_through_the_service() {
        let key = vec![5u8; ATTACHMENT_KEY_LEN];
        let blob = make_blob(&key, [9u8; 16], b"photo bytes");
        let service = FakeService {
            key: key.clone(),
            blob,
        };
        let attachment = Attachment {
            id: "abc123".into(),
            key,
            size: None,
            content_type: Some("image/jpeg".into()),
            data: None,
        };
        let fetched = AttachmentFetcher::fetch(&attachment, &service).await.unwrap();
        assert_eq!(fetched.data.unwrap(), b"photo bytes");
        let _ = service.key;
    }
}
