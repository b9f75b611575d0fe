//! At-rest protection for subscription signing secrets.
//!
//! The registry stores whatever [`SecretCipher::seal`] returns and the
//! delivery engine calls [`SecretCipher::open`] right before signing, so the
//! storage format never leaks into the signing path.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;

/// AES-GCM nonce size (96 bits).
const NONCE_SIZE: usize = 12;

/// Required AES-256 key length in bytes.
pub const AES_KEY_LENGTH: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Invalid key length: expected {AES_KEY_LENGTH} bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    #[error("Failed to seal secret: {0}")]
    Seal(String),

    #[error("Failed to open sealed secret: {0}")]
    Open(String),
}

/// Converts signing secrets to and from their stored form.
pub trait SecretCipher: Send + Sync {
    /// Produce the stored form of a plaintext secret.
    fn seal(&self, plaintext: &str) -> Result<String, SecretError>;

    /// Recover the plaintext secret from its stored form.
    fn open(&self, sealed: &str) -> Result<String, SecretError>;
}

// ---------------------------------------------------------------------------
// PlaintextCipher
// ---------------------------------------------------------------------------

/// Stores secrets as-is. Used when no encryption key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextCipher;

impl SecretCipher for PlaintextCipher {
    fn seal(&self, plaintext: &str) -> Result<String, SecretError> {
        Ok(plaintext.to_string())
    }

    fn open(&self, sealed: &str) -> Result<String, SecretError> {
        Ok(sealed.to_string())
    }
}

// ---------------------------------------------------------------------------
// AesGcmCipher
// ---------------------------------------------------------------------------

/// AES-256-GCM sealing. Stored format: `base64(nonce || ciphertext || tag)`.
#[derive(Clone)]
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl AesGcmCipher {
    /// Build a cipher from a raw 32-byte key.
    pub fn new(key: &[u8]) -> Result<Self, SecretError> {
        if key.len() != AES_KEY_LENGTH {
            return Err(SecretError::InvalidKeyLength(key.len()));
        }
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|_| SecretError::InvalidKeyLength(key.len()))?;
        Ok(Self { cipher })
    }

    /// Build a cipher from a standard base64 encoded key.
    pub fn from_base64(encoded: &str) -> Result<Self, SecretError> {
        let key = BASE64
            .decode(encoded.trim())
            .map_err(|e| SecretError::InvalidKeyEncoding(e.to_string()))?;
        Self::new(&key)
    }
}

impl std::fmt::Debug for AesGcmCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmCipher").finish_non_exhaustive()
    }
}

impl SecretCipher for AesGcmCipher {
    fn seal(&self, plaintext: &str) -> Result<String, SecretError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| SecretError::Seal(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(sealed))
    }

    fn open(&self, sealed: &str) -> Result<String, SecretError> {
        let raw = BASE64
            .decode(sealed)
            .map_err(|e| SecretError::Open(format!("base64 decode failed: {e}")))?;
        if raw.len() <= NONCE_SIZE {
            return Err(SecretError::Open("sealed value too short".into()));
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| SecretError::Open(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| SecretError::Open(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn key() -> [u8; AES_KEY_LENGTH] {
        [0x42; AES_KEY_LENGTH]
    }

    #[test]
    fn plaintext_cipher_is_identity() {
        let sealed = PlaintextCipher.seal("whsec_abc").unwrap();
        assert_eq!(sealed, "whsec_abc");
        assert_eq!(PlaintextCipher.open(&sealed).unwrap(), "whsec_abc");
    }

    #[test]
    fn aes_seal_then_open_returns_plaintext() {
        let cipher = AesGcmCipher::new(&key()).unwrap();
        let sealed = cipher.seal("whsec_roundtrip").unwrap();
        assert_ne!(sealed, "whsec_roundtrip");
        assert_eq!(cipher.open(&sealed).unwrap(), "whsec_roundtrip");
    }

    #[test]
    fn aes_nonce_makes_each_seal_unique() {
        let cipher = AesGcmCipher::new(&key()).unwrap();
        assert_ne!(cipher.seal("same").unwrap(), cipher.seal("same").unwrap());
    }

    #[test]
    fn aes_rejects_wrong_key_length() {
        assert_matches!(
            AesGcmCipher::new(&[0u8; 16]),
            Err(SecretError::InvalidKeyLength(16))
        );
    }

    #[test]
    fn aes_open_with_other_key_fails() {
        let sealed = AesGcmCipher::new(&key()).unwrap().seal("s").unwrap();
        let other = AesGcmCipher::new(&[0x43; AES_KEY_LENGTH]).unwrap();
        assert_matches!(other.open(&sealed), Err(SecretError::Open(_)));
    }

    #[test]
    fn aes_open_rejects_garbage() {
        let cipher = AesGcmCipher::new(&key()).unwrap();
        assert_matches!(cipher.open("!!!"), Err(SecretError::Open(_)));
        assert_matches!(cipher.open(&BASE64.encode([0u8; 5])), Err(SecretError::Open(_)));
    }

    #[test]
    fn from_base64_accepts_encoded_key() {
        let encoded = BASE64.encode(key());
        let cipher = AesGcmCipher::from_base64(&encoded).unwrap();
        let sealed = cipher.seal("x").unwrap();
        assert_eq!(cipher.open(&sealed).unwrap(), "x");
    }
}
