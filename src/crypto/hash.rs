//! Hash functions and the HKDF construction built on them.
//!
//! All four built-in hashes use the standard HMAC construction from
//! [RFC 2104](https://datatracker.ietf.org/doc/html/rfc2104), not BLAKE2's
//! keyed mode, for compatibility with other Noise implementations (notably
//! `snow`).

use blake2::{Blake2b512, Blake2s256};
use sha2::{Digest, Sha256 as Sha256Digest, Sha512 as Sha512Digest};
use zeroize::Zeroizing;

const IPAD: u8 = 0x36;
const OPAD: u8 = 0x5c;

/// A hash function as consumed by the symmetric state.
///
/// `hash` and `hmac` take their input as a sequence of parts fed to the
/// hasher in order, which avoids concatenating into temporary buffers.
pub trait Hash: Send + Sync {
    /// The hash name as it appears in a protocol name.
    fn name(&self) -> &'static str;

    /// Output length in bytes (32 or 64).
    fn hash_len(&self) -> usize;

    /// Internal block length in bytes, used by the HMAC construction.
    fn block_len(&self) -> usize;

    /// Digest of the concatenation of `parts`.
    fn hash(&self, parts: &[&[u8]]) -> Zeroizing<Vec<u8>>;

    /// HMAC of the concatenation of `parts` under `key`.
    fn hmac(&self, key: &[u8], parts: &[&[u8]]) -> Zeroizing<Vec<u8>>;
}

impl std::fmt::Debug for dyn Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Hash").field(&self.name()).finish()
    }
}

fn digest_parts<D: Digest>(parts: &[&[u8]]) -> Zeroizing<Vec<u8>> {
    let mut hasher = D::new();
    for part in parts {
        hasher.update(part);
    }
    Zeroizing::new(hasher.finalize().to_vec())
}

fn hmac_parts<D: Digest>(block_len: usize, key: &[u8], parts: &[&[u8]]) -> Zeroizing<Vec<u8>> {
    // In the Noise construction the key is always HASHLEN <= BLOCKLEN bytes,
    // but handle the general case per RFC 2104 anyway.
    let key = if key.len() > block_len {
        digest_parts::<D>(&[key])
    } else {
        Zeroizing::new(key.to_vec())
    };

    let mut ipad_key = Zeroizing::new(vec![IPAD; block_len]);
    let mut opad_key = Zeroizing::new(vec![OPAD; block_len]);
    for (i, byte) in key.iter().enumerate() {
        ipad_key[i] ^= byte;
        opad_key[i] ^= byte;
    }

    let mut inner_hasher = D::new();
    inner_hasher.update(ipad_key.as_slice());
    for part in parts {
        inner_hasher.update(part);
    }
    let inner = Zeroizing::new(inner_hasher.finalize().to_vec());

    digest_parts::<D>(&[opad_key.as_slice(), inner.as_slice()])
}

/// SHA-256 (`SHA256`).
pub struct Sha256;

impl Hash for Sha256 {
    fn name(&self) -> &'static str {
        "SHA256"
    }
    fn hash_len(&self) -> usize {
        32
    }
    fn block_len(&self) -> usize {
        64
    }
    fn hash(&self, parts: &[&[u8]]) -> Zeroizing<Vec<u8>> {
        digest_parts::<Sha256Digest>(parts)
    }
    fn hmac(&self, key: &[u8], parts: &[&[u8]]) -> Zeroizing<Vec<u8>> {
        hmac_parts::<Sha256Digest>(self.block_len(), key, parts)
    }
}

/// SHA-512 (`SHA512`).
pub struct Sha512;

impl Hash for Sha512 {
    fn name(&self) -> &'static str {
        "SHA512"
    }
    fn hash_len(&self) -> usize {
        64
    }
    fn block_len(&self) -> usize {
        128
    }
    fn hash(&self, parts: &[&[u8]]) -> Zeroizing<Vec<u8>> {
        digest_parts::<Sha512Digest>(parts)
    }
    fn hmac(&self, key: &[u8], parts: &[&[u8]]) -> Zeroizing<Vec<u8>> {
        hmac_parts::<Sha512Digest>(self.block_len(), key, parts)
    }
}

/// BLAKE2s-256 (`BLAKE2s`).
pub struct Blake2s;

impl Hash for Blake2s {
    fn name(&self) -> &'static str {
        "BLAKE2s"
    }
    fn hash_len(&self) -> usize {
        32
    }
    fn block_len(&self) -> usize {
        64
    }
    fn hash(&self, parts: &[&[u8]]) -> Zeroizing<Vec<u8>> {
        digest_parts::<Blake2s256>(parts)
    }
    fn hmac(&self, key: &[u8], parts: &[&[u8]]) -> Zeroizing<Vec<u8>> {
        hmac_parts::<Blake2s256>(self.block_len(), key, parts)
    }
}

/// BLAKE2b-512 (`BLAKE2b`).
pub struct Blake2b;

impl Hash for Blake2b {
    fn name(&self) -> &'static str {
        "BLAKE2b"
    }
    fn hash_len(&self) -> usize {
        64
    }
    fn block_len(&self) -> usize {
        128
    }
    fn hash(&self, parts: &[&[u8]]) -> Zeroizing<Vec<u8>> {
        digest_parts::<Blake2b512>(parts)
    }
    fn hmac(&self, key: &[u8], parts: &[&[u8]]) -> Zeroizing<Vec<u8>> {
        hmac_parts::<Blake2b512>(self.block_len(), key, parts)
    }
}

/// HKDF with 2 output blocks, per Noise spec Section 4.3.
///
/// Returns `(output1, output2)` where:
/// - `output1 = HMAC(temp_key, 0x01)`
/// - `output2 = HMAC(temp_key, output1 || 0x02)`
pub fn hkdf2(
    hash: &dyn Hash,
    chaining_key: &[u8],
    input_key_material: &[u8],
) -> (Zeroizing<Vec<u8>>, Zeroizing<Vec<u8>>) {
    let temp_key = hash.hmac(chaining_key, &[input_key_material]);
    let output1 = hash.hmac(&temp_key, &[&[0x01]]);
    let output2 = hash.hmac(&temp_key, &[output1.as_slice(), &[0x02]]);
    (output1, output2)
}

/// Three HKDF output blocks, used for psk mixing and ASK derivation.
pub type HkdfOutput3 = (Zeroizing<Vec<u8>>, Zeroizing<Vec<u8>>, Zeroizing<Vec<u8>>);

/// HKDF with 3 output blocks, per Noise spec Section 4.3.
pub fn hkdf3(hash: &dyn Hash, chaining_key: &[u8], input_key_material: &[u8]) -> HkdfOutput3 {
    let temp_key = hash.hmac(chaining_key, &[input_key_material]);
    let output1 = hash.hmac(&temp_key, &[&[0x01]]);
    let output2 = hash.hmac(&temp_key, &[output1.as_slice(), &[0x02]]);
    let output3 = hash.hmac(&temp_key, &[output2.as_slice(), &[0x03]]);
    (output1, output2, output3)
}
