use std::sync::Arc;

use zeroize::{Zeroize, Zeroizing};

use crate::cipher_state::CipherState;
use crate::crypto::cipher::KEY_LEN;
use crate::crypto::hash::{hkdf2, hkdf3, Hash};
use crate::error::Error;

/// Noise SymmetricState — the chaining key and handshake hash.
///
/// Per Noise spec Section 5.2. `h` is a cumulative hash of the full
/// transcript (protocol name, prologue, every wire byte); `ck` is the HKDF
/// chaining input that accumulates entropy from DH outputs and PSKs. Both
/// are wiped on drop.
pub struct SymmetricState {
    cipher: CipherState,
    hash: Arc<dyn Hash>,
    /// Chaining key (ck), HASHLEN bytes.
    ck: Zeroizing<Vec<u8>>,
    /// Handshake hash (h), HASHLEN bytes.
    h: Zeroizing<Vec<u8>>,
}

impl SymmetricState {
    /// Initialize from a protocol name.
    ///
    /// Per Noise spec Section 5.2: names no longer than HASHLEN are
    /// zero-padded, longer names are hashed.
    pub(crate) fn initialize(
        protocol_name: &[u8],
        hash: Arc<dyn Hash>,
        cipher: CipherState,
    ) -> Self {
        let hash_len = hash.hash_len();
        let h = if protocol_name.len() <= hash_len {
            let mut h = Zeroizing::new(vec![0u8; hash_len]);
            h[..protocol_name.len()].copy_from_slice(protocol_name);
            h
        } else {
            hash.hash(&[protocol_name])
        };

        Self {
            cipher,
            hash,
            ck: h.clone(),
            h,
        }
    }

    /// Mix input key material into the chaining key and re-key the cipher.
    ///
    /// `(ck, temp_k) = HKDF(ck, input, 2)`; with 64-byte hashes `temp_k` is
    /// truncated to the 32-byte cipher key.
    pub fn mix_key(&mut self, input_key_material: &[u8]) {
        let (ck, temp_k) = hkdf2(self.hash.as_ref(), &self.ck, input_key_material);
        self.ck = ck;
        self.install_key(&temp_k);
    }

    /// Mix data into the handshake hash: `h = HASH(h || data)`.
    pub fn mix_hash(&mut self, data: &[u8]) {
        self.h = self.hash.hash(&[self.h.as_slice(), data]);
    }

    /// Mix a pre-shared key into both the chaining key and the hash.
    ///
    /// `(ck, temp_h, temp_k) = HKDF(ck, psk, 3)`; `temp_h` goes through
    /// `MixHash`, `temp_k` (truncated) keys the cipher.
    pub fn mix_key_and_hash(&mut self, psk: &[u8]) {
        let (ck, temp_h, temp_k) = hkdf3(self.hash.as_ref(), &self.ck, psk);
        self.ck = ck;
        self.mix_hash(&temp_h);
        self.install_key(&temp_k);
    }

    /// Encrypt under the transcript hash as AD, then mix the ciphertext.
    pub fn encrypt_and_hash(&mut self, plaintext: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        let len = self.cipher.encrypt_with_ad(&self.h, plaintext, out)?;
        self.mix_hash(&out[..len]);
        Ok(len)
    }

    /// Decrypt under the transcript hash as AD, then mix the ciphertext.
    ///
    /// On an authentication failure the error propagates and the hash is
    /// left unmixed; the caller discards the state either way.
    pub fn decrypt_and_hash(&mut self, ciphertext: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        let len = self.cipher.decrypt_with_ad(&self.h, ciphertext, out)?;
        self.mix_hash(ciphertext);
        Ok(len)
    }

    /// Derive the two transport cipher states: `HKDF(ck, "", 2)`, both
    /// outputs truncated to 32-byte keys.
    ///
    /// Returns the final handshake hash alongside the ciphers for channel
    /// binding.
    pub fn split(mut self) -> (Zeroizing<Vec<u8>>, CipherState, CipherState) {
        let (temp_k1, temp_k2) = hkdf2(self.hash.as_ref(), &self.ck, &[]);

        let mut c1 = self.cipher.fork();
        let mut c2 = self.cipher.fork();
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&temp_k1[..KEY_LEN]);
        c1.initialize_key(key);
        key.copy_from_slice(&temp_k2[..KEY_LEN]);
        c2.initialize_key(key);
        key.zeroize();

        let h = core::mem::take(&mut self.h);
        (h, c1, c2)
    }

    /// The current handshake hash, for channel binding.
    pub fn handshake_hash(&self) -> &[u8] {
        &self.h
    }

    /// The current chaining key.
    #[allow(dead_code)]
    pub(crate) fn chaining_key(&self) -> &[u8] {
        &self.ck
    }

    /// Derive an additional symmetric key from the chaining key and a label.
    pub(crate) fn derive_secret(&self, label: &[u8]) -> Zeroizing<Vec<u8>> {
        let (_, _, secret) = hkdf3(self.hash.as_ref(), &self.ck, label);
        secret
    }

    pub(crate) fn has_key(&self) -> bool {
        self.cipher.has_key()
    }

    fn install_key(&mut self, okm: &[u8]) {
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&okm[..KEY_LEN]);
        self.cipher.initialize_key(key);
        key.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::cipher::{ChaChaPoly, TAG_LEN};
    use crate::crypto::hash::{Blake2b, Sha256};

    fn fresh(name: &str) -> SymmetricState {
        let cipher = CipherState::new(Arc::new(ChaChaPoly), None);
        SymmetricState::initialize(name.as_bytes(), Arc::new(Sha256), cipher)
    }

    #[test]
    fn short_name_is_zero_padded() {
        let ss = fresh("Noise_NN_25519_ChaChaPoly_SHA256");
        let mut expected = [0u8; 32];
        expected.copy_from_slice(b"Noise_NN_25519_ChaChaPoly_SHA256");
        assert_eq!(ss.handshake_hash(), &expected);
        assert_eq!(ss.chaining_key(), ss.handshake_hash());
    }

    #[test]
    fn long_name_is_hashed() {
        let name = "Noise_XXfallback_25519_ChaChaPoly_SHA256";
        assert!(name.len() > 32);
        let ss = fresh(name);
        assert_eq!(ss.handshake_hash().len(), 32);
        assert_ne!(&ss.handshake_hash()[..5], b"Noise");
    }

    #[test]
    fn mix_hash_changes_h_not_ck() {
        let mut ss = fresh("test");
        let ck = ss.chaining_key().to_vec();
        let h = ss.handshake_hash().to_vec();
        ss.mix_hash(b"data");
        assert_ne!(ss.handshake_hash(), h.as_slice());
        assert_eq!(ss.chaining_key(), ck.as_slice());
    }

    #[test]
    fn mix_key_keys_the_cipher() {
        let mut ss = fresh("test");
        assert!(!ss.has_key());
        ss.mix_key(b"some input key material");
        assert!(ss.has_key());
    }

    #[test]
    fn unkeyed_encrypt_is_identity_but_mixes() {
        let mut ss = fresh("test");
        let h_before = ss.handshake_hash().to_vec();
        let mut out = [0u8; 32];
        let len = ss.encrypt_and_hash(b"plain", &mut out).unwrap();
        assert_eq!(&out[..len], b"plain");
        assert_ne!(ss.handshake_hash(), h_before.as_slice());
    }

    #[test]
    fn encrypt_and_decrypt_agree() {
        let mut a = fresh("test");
        let mut b = fresh("test");
        a.mix_key(b"ikm");
        b.mix_key(b"ikm");

        let mut ct = [0u8; 64];
        let ct_len = a.encrypt_and_hash(b"payload", &mut ct).unwrap();
        assert_eq!(ct_len, 7 + TAG_LEN);

        let mut pt = [0u8; 64];
        let pt_len = b.decrypt_and_hash(&ct[..ct_len], &mut pt).unwrap();
        assert_eq!(&pt[..pt_len], b"payload");
        assert_eq!(a.handshake_hash(), b.handshake_hash());
    }

    #[test]
    fn transcript_divergence_breaks_decryption() {
        let mut a = fresh("test");
        let mut b = fresh("test");
        a.mix_key(b"ikm");
        b.mix_key(b"ikm");
        b.mix_hash(b"divergence");

        let mut ct = [0u8; 64];
        let ct_len = a.encrypt_and_hash(b"payload", &mut ct).unwrap();
        let mut pt = [0u8; 64];
        assert_eq!(
            b.decrypt_and_hash(&ct[..ct_len], &mut pt),
            Err(Error::AuthFailed)
        );
    }

    #[test]
    fn split_keys_differ_and_agree_across_sides() {
        let mut a = fresh("test");
        let mut b = fresh("test");
        a.mix_key(b"ikm");
        b.mix_key(b"ikm");

        let (h_a, mut a1, mut a2) = a.split();
        let (h_b, mut b1, mut b2) = b.split();
        assert_eq!(*h_a, *h_b);

        let mut ct = [0u8; 64];
        let mut pt = [0u8; 64];
        let ct_len = a1.encrypt_with_ad(b"", b"one way", &mut ct).unwrap();
        let pt_len = b1.decrypt_with_ad(b"", &ct[..ct_len], &mut pt).unwrap();
        assert_eq!(&pt[..pt_len], b"one way");

        let ct_len = b2.encrypt_with_ad(b"", b"other way", &mut ct).unwrap();
        let pt_len = a2.decrypt_with_ad(b"", &ct[..ct_len], &mut pt).unwrap();
        assert_eq!(&pt[..pt_len], b"other way");

        // The two directions must not share a key.
        let ct_len = a1.encrypt_with_ad(b"", b"cross", &mut ct).unwrap();
        assert_eq!(
            a2.decrypt_with_ad(b"", &ct[..ct_len], &mut pt),
            Err(Error::AuthFailed)
        );
    }

    #[test]
    fn mix_key_and_hash_diverges_from_mix_key() {
        let mut a = fresh("test");
        let mut b = fresh("test");
        let psk = [0u8; 32];
        a.mix_key_and_hash(&psk);
        b.mix_key(&psk);
        assert_ne!(a.handshake_hash(), b.handshake_hash());
        assert_ne!(a.chaining_key(), b.chaining_key());
    }

    #[test]
    fn wide_hash_truncates_cipher_key() {
        // BLAKE2b has a 64-byte output; the cipher key is its first 32 bytes,
        // so two states mixing the same material still interoperate.
        let cipher = CipherState::new(Arc::new(ChaChaPoly), None);
        let mut a = SymmetricState::initialize(b"test", Arc::new(Blake2b), cipher);
        let cipher = CipherState::new(Arc::new(ChaChaPoly), None);
        let mut b = SymmetricState::initialize(b"test", Arc::new(Blake2b), cipher);

        assert_eq!(a.handshake_hash().len(), 64);
        a.mix_key(b"ikm");
        b.mix_key(b"ikm");

        let mut ct = [0u8; 64];
        let mut pt = [0u8; 64];
        let ct_len = a.encrypt_and_hash(b"x", &mut ct).unwrap();
        let pt_len = b.decrypt_and_hash(&ct[..ct_len], &mut pt).unwrap();
        assert_eq!(&pt[..pt_len], b"x");
    }

    #[test]
    fn derive_secret_depends_on_label() {
        let mut ss = fresh("test");
        ss.mix_key(b"ikm");
        let s1 = ss.derive_secret(b"label-one");
        let s2 = ss.derive_secret(b"label-two");
        assert_ne!(*s1, *s2);
    }
}
