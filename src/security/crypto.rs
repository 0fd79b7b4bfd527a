//! Authenticated encryption for small secrets.
//!
//! ChaCha20-Poly1305 with a fresh random nonce per call. The sealed form is
//! `nonce (12 bytes) || ciphertext+tag` so `open` can recover everything it
//! needs. Tag mismatch or truncated input fails closed; partially decrypted
//! data is never returned.

use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit},
};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

use super::SecurityError;

const NONCE_LEN: usize = 12;
pub const KEY_LEN: usize = 32;

/// Derive a fixed-size cipher key from a configured secret string.
#[must_use]
pub fn derive_key(secret: &str) -> [u8; KEY_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().into()
}

/// Encrypt a plaintext under the given key.
///
/// # Errors
/// Returns [`SecurityError::Crypto`] if encryption fails.
pub fn seal(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<Vec<u8>, SecurityError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| SecurityError::Crypto)?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Decrypt a sealed secret.
///
/// # Errors
/// Returns [`SecurityError::Crypto`] on truncated input or tag mismatch.
pub fn open(key: &[u8; KEY_LEN], sealed: &[u8]) -> Result<Vec<u8>, SecurityError> {
    if sealed.len() < NONCE_LEN {
        return Err(SecurityError::Crypto);
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| SecurityError::Crypto)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_round_trip() {
        let key = derive_key("service key");
        let sealed = seal(&key, b"482913").expect("seal");
        let opened = open(&key, &sealed).expect("open");
        assert_eq!(opened, b"482913");
    }

    #[test]
    fn fresh_nonce_per_call() {
        let key = derive_key("service key");
        let a = seal(&key, b"same plaintext").expect("seal");
        let b = seal(&key, b"same plaintext").expect("seal");
        assert_ne!(a, b);
    }

    #[test]
    fn tampered_ciphertext_fails_closed() {
        let key = derive_key("service key");
        let mut sealed = seal(&key, b"sensitive").expect("seal");
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(open(&key, &sealed), Err(SecurityError::Crypto)));
    }

    #[test]
    fn wrong_key_fails_closed() {
        let sealed = seal(&derive_key("key a"), b"sensitive").expect("seal");
        assert!(matches!(
            open(&derive_key("key b"), &sealed),
            Err(SecurityError::Crypto)
        ));
    }

    #[test]
    fn truncated_input_fails_closed() {
        let key = derive_key("service key");
        assert!(matches!(open(&key, &[0u8; 4]), Err(SecurityError::Crypto)));
    }
}
