//! Diffie-Hellman curves as consumed by the handshake state.

use rand_core::OsRng;
use subtle::ConstantTimeEq;
use x25519_dalek::{PublicKey as DalekPublicKey, StaticSecret as DalekStaticSecret};
use zeroize::{Zeroize, Zeroizing};

use crate::error::Error;

/// A DH curve: key generation, key loading, and the lengths the wire format
/// depends on.
pub trait Curve: Send + Sync {
    /// The curve name as it appears in a protocol name.
    fn name(&self) -> &'static str;

    /// Shared-secret length in bytes.
    fn dh_len(&self) -> usize;

    /// Public-key length in bytes as transmitted on the wire.
    fn pub_len(&self) -> usize;

    /// Generate a keypair.
    ///
    /// With `entropy` the keypair is derived deterministically from the first
    /// [`dh_len`](Self::dh_len) bytes (test vectors); without it the curve
    /// draws from the system CSPRNG.
    fn generate_keypair(&self, entropy: Option<&[u8]>) -> Result<Box<dyn Keypair>, Error>;

    /// Load a keypair from raw private-key bytes, deriving the public key.
    fn load_private(&self, data: &[u8]) -> Result<Box<dyn Keypair>, Error>;

    /// Validate raw public-key bytes, returning them in canonical form.
    fn load_public(&self, data: &[u8]) -> Result<Vec<u8>, Error>;
}

impl std::fmt::Debug for dyn Curve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Curve").field(&self.name()).finish()
    }
}

/// A private key together with its derived public key.
pub trait Keypair: Send + Sync {
    /// The public key in wire format.
    fn public(&self) -> &[u8];

    /// Diffie-Hellman with a remote public key.
    ///
    /// Fails with [`Error::InvalidPublicKey`] when the remote key is
    /// malformed or the agreement degenerates.
    fn dh(&self, remote_public: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error>;
}

impl std::fmt::Debug for dyn Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Keypair").finish_non_exhaustive()
    }
}

/// X25519 (`25519`).
pub struct X25519;

impl Curve for X25519 {
    fn name(&self) -> &'static str {
        "25519"
    }

    fn dh_len(&self) -> usize {
        32
    }

    fn pub_len(&self) -> usize {
        32
    }

    fn generate_keypair(&self, entropy: Option<&[u8]>) -> Result<Box<dyn Keypair>, Error> {
        let secret = match entropy {
            Some(bytes) => {
                if bytes.len() < 32 {
                    return Err(Error::InvalidKeyLength {
                        expected: 32,
                        actual: bytes.len(),
                    });
                }
                let mut raw = [0u8; 32];
                raw.copy_from_slice(&bytes[..32]);
                let secret = DalekStaticSecret::from(raw);
                raw.zeroize();
                secret
            }
            None => DalekStaticSecret::random_from_rng(OsRng),
        };
        Ok(Box::new(X25519Keypair::from_secret(secret)))
    }

    fn load_private(&self, data: &[u8]) -> Result<Box<dyn Keypair>, Error> {
        if data.len() != 32 {
            return Err(Error::InvalidKeyLength {
                expected: 32,
                actual: data.len(),
            });
        }
        let mut raw = [0u8; 32];
        raw.copy_from_slice(data);
        let secret = DalekStaticSecret::from(raw);
        raw.zeroize();
        Ok(Box::new(X25519Keypair::from_secret(secret)))
    }

    fn load_public(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        if data.len() != 32 {
            return Err(Error::InvalidPublicKey);
        }
        Ok(data.to_vec())
    }
}

struct X25519Keypair {
    secret: DalekStaticSecret,
    public: [u8; 32],
}

impl X25519Keypair {
    fn from_secret(secret: DalekStaticSecret) -> Self {
        let public = DalekPublicKey::from(&secret).to_bytes();
        Self { secret, public }
    }
}

impl Drop for X25519Keypair {
    fn drop(&mut self) {
        // The dalek secret zeroizes itself; wipe our public copy too.
        self.public.zeroize();
    }
}

impl Keypair for X25519Keypair {
    fn public(&self) -> &[u8] {
        &self.public
    }

    fn dh(&self, remote_public: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
        let remote: [u8; 32] = remote_public
            .try_into()
            .map_err(|_| Error::InvalidPublicKey)?;
        let shared = self.secret.diffie_hellman(&DalekPublicKey::from(remote));

        // Reject the all-zeros shared secret, which indicates a low-order
        // public key (RFC 7748 Section 6.1, Noise spec Section 12.1).
        if bool::from(shared.as_bytes().ct_eq(&[0u8; 32])) {
            return Err(Error::InvalidPublicKey);
        }
        Ok(Zeroizing::new(shared.as_bytes().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agreement_matches_both_ways() {
        let a = X25519.generate_keypair(None).unwrap();
        let b = X25519.generate_keypair(None).unwrap();

        let shared_a = a.dh(b.public()).unwrap();
        let shared_b = b.dh(a.public()).unwrap();
        assert_eq!(*shared_a, *shared_b);
    }

    #[test]
    fn deterministic_from_entropy() {
        let entropy = [0x42u8; 32];
        let a = X25519.generate_keypair(Some(&entropy)).unwrap();
        let b = X25519.generate_keypair(Some(&entropy)).unwrap();
        assert_eq!(a.public(), b.public());

        let c = X25519.load_private(&entropy).unwrap();
        assert_eq!(a.public(), c.public());
    }

    #[test]
    fn short_entropy_rejected() {
        let err = X25519.generate_keypair(Some(&[0u8; 16])).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidKeyLength {
                expected: 32,
                actual: 16
            }
        );
    }

    #[test]
    fn wrong_private_key_length_rejected() {
        let err = X25519.load_private(&[0u8; 31]).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidKeyLength {
                expected: 32,
                actual: 31
            }
        );
    }

    #[test]
    fn wrong_public_key_length_rejected() {
        assert_eq!(
            X25519.load_public(&[0u8; 33]).unwrap_err(),
            Error::InvalidPublicKey
        );
    }

    #[test]
    fn zero_public_key_rejected() {
        let kp = X25519.load_private(&[1u8; 32]).unwrap();
        assert_eq!(kp.dh(&[0u8; 32]).unwrap_err(), Error::InvalidPublicKey);
    }

    #[test]
    fn order_two_point_rejected() {
        let kp = X25519.load_private(&[0x42u8; 32]).unwrap();
        let mut point = [0u8; 32];
        point[0] = 1;
        assert_eq!(kp.dh(&point).unwrap_err(), Error::InvalidPublicKey);
    }
}
