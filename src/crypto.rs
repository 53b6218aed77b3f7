use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use rand_core::RngCore;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("invalid key")]
    InvalidKey,
    #[error("seal error")]
    Seal,
    #[error("open error")]
    Open,
}

/// Seals chat transcripts and session summaries at rest. Output format is
/// base64(nonce || ciphertext) with a fresh 12-byte nonce per value.
#[derive(Clone)]
pub struct TranscriptCipher {
    cipher: Aes256Gcm,
}

impl TranscriptCipher {
    pub fn new(key_bytes: &[u8]) -> Result<Self, CryptoError> {
        if key_bytes.len() != 32 {
            return Err(CryptoError::InvalidKey);
        }
        let cipher = Aes256Gcm::new_from_slice(key_bytes).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { cipher })
    }

    pub fn seal(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let mut ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Seal)?;
        let mut combined = nonce_bytes.to_vec();
        combined.append(&mut ciphertext);
        Ok(general_purpose::STANDARD.encode(combined))
    }

    pub fn open(&self, encoded: &str) -> Result<String, CryptoError> {
        let data = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| CryptoError::Open)?;
        if data.len() < 13 {
            return Err(CryptoError::Open);
        }
        let (nonce_bytes, cipher_bytes) = data.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, cipher_bytes)
            .map_err(|_| CryptoError::Open)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> TranscriptCipher {
        TranscriptCipher::new(&[7u8; 32]).unwrap()
    }

    #[test]
    fn seal_open_round_trip() {
        let c = cipher();
        let sealed = c.seal("I have been feeling overwhelmed lately").unwrap();
        assert_eq!(c.open(&sealed).unwrap(), "I have been feeling overwhelmed lately");
    }

    #[test]
    fn nonces_differ_between_seals() {
        let c = cipher();
        let a = c.seal("same text").unwrap();
        let b = c.seal("same text").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tampered_ciphertext_rejected() {
        let c = cipher();
        let sealed = c.seal("payload").unwrap();
        let mut bytes = general_purpose::STANDARD.decode(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = general_purpose::STANDARD.encode(bytes);
        assert!(c.open(&tampered).is_err());
    }

    #[test]
    fn short_key_rejected() {
        assert!(TranscriptCipher::new(&[0u8; 16]).is_err());
    }
}
