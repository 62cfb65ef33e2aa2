//! AEAD ciphers as consumed by the cipher state.

use aes_gcm::Aes256Gcm;
use chacha20poly1305::{
    aead::{Aead as _, KeyInit, Payload},
    ChaCha20Poly1305,
};
use zeroize::Zeroizing;

use crate::error::Error;

/// Cipher key length in bytes.
pub const KEY_LEN: usize = 32;
/// AEAD tag length in bytes.
pub const TAG_LEN: usize = 16;
/// Encoded nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// An AEAD cipher as consumed by the cipher state.
///
/// Both built-in ciphers take a 32-byte key and a 64-bit counter nonce and
/// produce ciphertexts exactly [`TAG_LEN`] bytes longer than the plaintext.
pub trait Aead: Send + Sync {
    /// The cipher name as it appears in a protocol name.
    fn name(&self) -> &'static str;

    /// Encode the 64-bit counter into the cipher's nonce format.
    fn encode_nonce(&self, nonce: u64) -> [u8; NONCE_LEN];

    /// Encrypt `plaintext` under `key` and the counter `nonce`, binding `ad`.
    fn encrypt(
        &self,
        key: &[u8; KEY_LEN],
        nonce: u64,
        ad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, Error>;

    /// Decrypt and authenticate; fails with [`Error::AuthFailed`] on a bad tag.
    fn decrypt(
        &self,
        key: &[u8; KEY_LEN],
        nonce: u64,
        ad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, Error>;

    /// Derive a replacement key, per Noise spec Section 11.3:
    /// the first 32 bytes of `ENCRYPT(k, 2^64 - 1, "", zeros)`.
    fn rekey(&self, key: &[u8; KEY_LEN]) -> Result<[u8; KEY_LEN], Error> {
        let out = Zeroizing::new(self.encrypt(key, u64::MAX, &[], &[0u8; KEY_LEN])?);
        let mut new_key = [0u8; KEY_LEN];
        new_key.copy_from_slice(&out[..KEY_LEN]);
        Ok(new_key)
    }
}

impl std::fmt::Debug for dyn Aead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Aead").field(&self.name()).finish()
    }
}

/// ChaCha20-Poly1305 (`ChaChaPoly`).
pub struct ChaChaPoly;

impl Aead for ChaChaPoly {
    fn name(&self) -> &'static str {
        "ChaChaPoly"
    }

    /// 4 zero bytes followed by the little-endian counter.
    fn encode_nonce(&self, nonce: u64) -> [u8; NONCE_LEN] {
        let mut out = [0u8; NONCE_LEN];
        out[4..].copy_from_slice(&nonce.to_le_bytes());
        out
    }

    fn encrypt(
        &self,
        key: &[u8; KEY_LEN],
        nonce: u64,
        ad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let cipher = ChaCha20Poly1305::new(key.into());
        cipher
            .encrypt(
                &self.encode_nonce(nonce).into(),
                Payload {
                    msg: plaintext,
                    aad: ad,
                },
            )
            .map_err(|_| Error::CryptoFailed)
    }

    fn decrypt(
        &self,
        key: &[u8; KEY_LEN],
        nonce: u64,
        ad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        let cipher = ChaCha20Poly1305::new(key.into());
        cipher
            .decrypt(
                &self.encode_nonce(nonce).into(),
                Payload {
                    msg: ciphertext,
                    aad: ad,
                },
            )
            .map(Zeroizing::new)
            .map_err(|_| Error::AuthFailed)
    }
}

/// AES-256-GCM (`AESGCM`).
pub struct AesGcm;

impl Aead for AesGcm {
    fn name(&self) -> &'static str {
        "AESGCM"
    }

    /// 4 zero bytes followed by the big-endian counter.
    fn encode_nonce(&self, nonce: u64) -> [u8; NONCE_LEN] {
        let mut out = [0u8; NONCE_LEN];
        out[4..].copy_from_slice(&nonce.to_be_bytes());
        out
    }

    fn encrypt(
        &self,
        key: &[u8; KEY_LEN],
        nonce: u64,
        ad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let cipher = Aes256Gcm::new(key.into());
        cipher
            .encrypt(
                &self.encode_nonce(nonce).into(),
                Payload {
                    msg: plaintext,
                    aad: ad,
                },
            )
            .map_err(|_| Error::CryptoFailed)
    }

    fn decrypt(
        &self,
        key: &[u8; KEY_LEN],
        nonce: u64,
        ad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        let cipher = Aes256Gcm::new(key.into());
        cipher
            .decrypt(
                &self.encode_nonce(nonce).into(),
                Payload {
                    msg: ciphertext,
                    aad: ad,
                },
            )
            .map(Zeroizing::new)
            .map_err(|_| Error::AuthFailed)
    }
}
