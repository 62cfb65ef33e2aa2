use std::sync::Arc;

use zeroize::Zeroizing;

use crate::crypto::cipher::{Aead, KEY_LEN, TAG_LEN};
use crate::error::Error;
use crate::rekey::Rekeyer;

/// Noise CipherState — an AEAD key and a counter nonce.
///
/// Per Noise spec Section 5.1. Created unkeyed by the symmetric state and
/// keyed zero or more times through `MixKey` and `Split`; while unkeyed,
/// encryption and decryption are the identity. The key is wiped when the
/// state drops.
pub struct CipherState {
    aead: Arc<dyn Aead>,
    /// The AEAD key, or `None` while unkeyed.
    key: Option<Zeroizing<[u8; KEY_LEN]>>,
    /// Nonce counter, incremented after each encryption/decryption.
    nonce: u64,
    rekeyer: Option<Rekeyer>,
}

impl CipherState {
    pub(crate) fn new(aead: Arc<dyn Aead>, rekeyer: Option<Rekeyer>) -> Self {
        Self {
            aead,
            key: None,
            nonce: 0,
            rekeyer,
        }
    }

    /// A fresh unkeyed state sharing this one's cipher and rekey policy.
    pub(crate) fn fork(&self) -> Self {
        Self::new(Arc::clone(&self.aead), self.rekeyer)
    }

    /// Install a key, resetting the nonce counter to zero.
    pub fn initialize_key(&mut self, key: [u8; KEY_LEN]) {
        self.key = Some(Zeroizing::new(key));
        self.nonce = 0;
    }

    /// Whether this state has a key installed.
    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// Forcibly set the nonce counter (test vectors, out-of-band resync).
    pub fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }

    /// The current nonce counter.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Encrypt plaintext with associated data, writing into `out`.
    ///
    /// Unkeyed, this copies the plaintext through unchanged. Returns the
    /// number of bytes written.
    pub fn encrypt_with_ad(
        &mut self,
        ad: &[u8],
        plaintext: &[u8],
        out: &mut [u8],
    ) -> Result<usize, Error> {
        let Some(key) = &self.key else {
            if out.len() < plaintext.len() {
                return Err(Error::BufferTooSmall);
            }
            out[..plaintext.len()].copy_from_slice(plaintext);
            return Ok(plaintext.len());
        };

        if self.nonce == u64::MAX {
            // Nonce 2^64-1 is reserved for rekey (Noise spec Section 11.3).
            return Err(Error::NonceExhausted);
        }
        if out.len() < plaintext.len() + TAG_LEN {
            return Err(Error::BufferTooSmall);
        }

        let ciphertext = self.aead.encrypt(key, self.nonce, ad, plaintext)?;
        out[..ciphertext.len()].copy_from_slice(&ciphertext);
        self.nonce += 1;
        self.apply_rekey_policy()?;
        Ok(ciphertext.len())
    }

    /// Decrypt ciphertext with associated data, writing into `out`.
    ///
    /// Unkeyed, this copies the ciphertext through unchanged. On an
    /// authentication failure the nonce does not advance. Returns the number
    /// of plaintext bytes written.
    pub fn decrypt_with_ad(
        &mut self,
        ad: &[u8],
        ciphertext: &[u8],
        out: &mut [u8],
    ) -> Result<usize, Error> {
        let Some(key) = &self.key else {
            if out.len() < ciphertext.len() {
                return Err(Error::BufferTooSmall);
            }
            out[..ciphertext.len()].copy_from_slice(ciphertext);
            return Ok(ciphertext.len());
        };

        if self.nonce == u64::MAX {
            return Err(Error::NonceExhausted);
        }
        if ciphertext.len() < TAG_LEN {
            return Err(Error::TruncatedMessage);
        }

        let plaintext = self.aead.decrypt(key, self.nonce, ad, ciphertext)?;
        if out.len() < plaintext.len() {
            return Err(Error::BufferTooSmall);
        }
        out[..plaintext.len()].copy_from_slice(&plaintext);
        self.nonce += 1;
        self.apply_rekey_policy()?;
        Ok(plaintext.len())
    }

    /// Replace the key per Noise spec Section 11.3. Does not touch the nonce.
    pub fn rekey(&mut self) -> Result<(), Error> {
        if let Some(key) = &self.key {
            let new_key = self.aead.rekey(key)?;
            self.key = Some(Zeroizing::new(new_key));
        }
        Ok(())
    }

    /// The overhead added by encryption (0 unkeyed, [`TAG_LEN`] keyed).
    pub fn overhead(&self) -> usize {
        if self.has_key() {
            TAG_LEN
        } else {
            0
        }
    }

    fn apply_rekey_policy(&mut self) -> Result<(), Error> {
        if let Some(rekeyer) = self.rekeyer {
            if rekeyer.should_rekey(self.nonce) {
                self.rekey()?;
                if rekeyer.reset_nonce() {
                    self.nonce = 0;
                }
            }
        }
        Ok(())
    }
}
