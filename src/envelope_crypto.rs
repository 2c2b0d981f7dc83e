//! Transport-frame authentication and decryption, and the Signal padding
//! scheme layered underneath it.
//!
//! Frame layout: `version:1 || iv:16 || ciphertext || mac:10`, AES-256-CBC
//! keyed by the first 32 bytes of the 52-byte signalling key, HMAC-SHA256
//! (truncated to 10 bytes) keyed by the last 20 bytes, computed over
//! `version || iv || ciphertext`. This is the textsecure/Signal-server
//! websocket-resource wire framing `StateStore::signaling_key` implies.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::ReceiverError;

const VERSION_LEN: usize = 1;
const IV_LEN: usize = 16;
const MAC_LEN: usize = 10;
const SIGNALING_KEY_LEN: usize = 52;
const AES_KEY_LEN: usize = 32;
const MAC_KEY_LEN: usize = 20;
const PADDING_SENTINEL: u8 = 0x80;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Decrypts and authenticates a single transport frame.
pub struct EnvelopeCrypto;

impl EnvelopeCrypto {
    /// Verify the frame's MAC and decrypt its ciphertext with the given
    /// 52-byte signalling key. Returns the padded plaintext, which the
    /// caller must still run through `unpad`.
    pub fn decrypt_frame(signaling_key: &[u8], frame: &[u8]) -> Result<Vec<u8>, ReceiverError> {
        if signaling_key.len() != SIGNALING_KEY_LEN {
            return Err(ReceiverError::FrameAuth(format!(
                "signaling key must be {SIGNALING_KEY_LEN} bytes, got {}",
                signaling_key.len()
            )));
        }
        if frame.len() < VERSION_LEN + IV_LEN + MAC_LEN {
            return Err(ReceiverError::FrameAuth("frame too short".into()));
        }

        let mac_offset = frame.len() - MAC_LEN;
        let (signed, mac) = frame.split_at(mac_offset);

        let mac_key = &signaling_key[AES_KEY_LEN..AES_KEY_LEN + MAC_KEY_LEN];
        let mut verifier =
            HmacSha256::new_from_slice(mac_key).map_err(|e| ReceiverError::FrameAuth(e.to_string()))?;
        verifier.update(signed);
        verifier
            .verify_truncated_left(mac)
            .map_err(|_| ReceiverError::FrameAuth("mac mismatch".into()))?;

        let iv = &signed[VERSION_LEN..VERSION_LEN + IV_LEN];
        let ciphertext = &signed[VERSION_LEN + IV_LEN..];
        let aes_key = &signaling_key[..AES_KEY_LEN];

        let decryptor = Aes256CbcDec::new_from_slices(aes_key, iv)
            .map_err(|e| ReceiverError::FrameAuth(e.to_string()))?;
        decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|e| ReceiverError::FrameAuth(format!("cbc decrypt: {e}")))
    }

    /// Strip Signal's message padding: scan back from the tail for the
    /// `0x80` sentinel byte, discarding any zero-fill after it. An all-zero
    /// buffer carries no sentinel and unpads to empty rather than an error.
    pub fn unpad(padded: &[u8]) -> Result<Vec<u8>, ReceiverError> {
        for (i, &byte) in padded.iter().enumerate().rev() {
            if byte == PADDING_SENTINEL {
                return Ok(padded[..i].to_vec());
            }
            if byte != 0 {
                return Err(ReceiverError::Padding);
            }
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::BlockEncryptMut;

    type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

    fn make_frame(signaling_key: &[u8], iv: [u8; 16], plaintext: &[u8]) -> Vec<u8> {
        let aes_key = &signaling_key[..AES_KEY_LEN];
        let mac_key = &signaling_key[AES_KEY_LEN..AES_KEY_LEN + MAC_KEY_LEN];

        let ciphertext = Aes256CbcEnc::new_from_slices(aes_key, &iv)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut signed = vec![1u8];
        signed.extend_from_slice(&iv);
        signed.extend_from_slice(&ciphertext);

        let mut mac = HmacSha256::new_from_slice(mac_key).unwrap();
        mac.update(&signed);
        let full_mac = mac.finalize().into_bytes();

        let mut frame = signed;
        frame.extend_from_slice(&full_mac[..MAC_LEN]);
        frame
    }

    #[test]
    fn decrypt_frame_round_trips_valid_frame() {
        let key = vec![7u8; SIGNALING_KEY_LEN];
        let frame = make_frame(&key, [1u8; 16], b"hello world");
        let plaintext = EnvelopeCrypto::decrypt_frame(&key, &frame).unwrap();
        assert_eq!(plaintext, b"hello world");
    }

    #[test]
    fn decrypt_frame_rejects_tampered_ciphertext() {
        let key = vec![7u8; SIGNALING_KEY_LEN];
        let mut frame = make_frame(&key, [1u8; 16], b"hello world");
        let mutate_at = VERSION_LEN + IV_LEN;
        frame[mutate_at] ^= 0xff;
        assert!(matches!(
            EnvelopeCrypto::decrypt_frame(&key, &frame),
            Err(ReceiverError::FrameAuth(_))
        ));
    }

    #[test]
    fn decrypt_frame_rejects_wrong_key_length() {
        let key = vec![7u8; 10];
        let frame = vec![0u8; 40];
        assert!(matches!(
            EnvelopeCrypto::decrypt_frame(&key, &frame),
            Err(ReceiverError::FrameAuth(_))
        ));
    }

    #[test]
    fn decrypt_frame_rejects_short_frame() {
        let key = vec![7u8; SIGNALING_KEY_LEN];
        let frame = vec![0u8; 5];
        assert!(matches!(
            EnvelopeCrypto::decrypt_frame(&key, &frame),
            Err(ReceiverError::FrameAuth(_))
        ));
    }

    #[test]
    fn unpad_strips_sentinel_and_zero_fill() {
        let mut padded = b"abc".to_vec();
        padded.push(PADDING_SENTINEL);
        padded.extend_from_slice(&[0u8; 4]);
        assert_eq!(EnvelopeCrypto::unpad(&padded).unwrap(), b"abc");
    }

    #[test]
    fn unpad_with_no_trailing_padding_returns_whole_slice() {
        let mut padded = b"abc".to_vec();
        padded.push(PADDING_SENTINEL);
        assert_eq!(EnvelopeCrypto::unpad(&padded).unwrap(), b"abc");
    }

    #[test]
    fn unpad_on_all_zero_buffer_returns_empty() {
        let padded = vec![0u8; 4];
        assert_eq!(EnvelopeCrypto::unpad(&padded).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn unpad_rejects_a_non_zero_tail_with_no_sentinel() {
        let padded = vec![0u8, 0u8, 7u8];
        assert!(matches!(EnvelopeCrypto::unpad(&padded), Err(ReceiverError::Padding)));
    }
}
