use std::fmt;

use pkcs8::{DecodePrivateKey, EncodePrivateKey, SecretDocument};
use rand_core::CryptoRngCore;
use rsa::pkcs1v15::SigningKey as RsaSigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tracing::debug;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::error::{Result, SmimerError};

/// Modulus length used when the caller does not pick one.
pub const DEFAULT_RSA_BITS: usize = 2048;

/// Modulus lengths accepted by [`KeyPair::generate_rsa`].
pub const SUPPORTED_RSA_BITS: [usize; 3] = [2048, 3072, 4096];

/// An RSA key pair belonging to one certificate subject.
///
/// The private half lives inside the PKCS#1 v1.5 signing key, built once per pair.
/// `Debug` output never includes it.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: RsaSigningKey<Sha256>,
    public: RsaPublicKey,
}

impl KeyPair {
    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        Self::generate_rsa_with(&mut rng, bits)
    }

    /// Generate a 2048-bit RSA key pair.
    pub fn generate_default() -> Result<Self> {
        Self::generate_rsa(DEFAULT_RSA_BITS)
    }

    /// Generate an RSA key pair drawing randomness from `rng`.
    pub fn generate_rsa_with<R: CryptoRngCore + ?Sized>(rng: &mut R, bits: usize) -> Result<Self> {
        if !SUPPORTED_RSA_BITS.contains(&bits) {
            return Err(SmimerError::KeyGenerationError(format!(
                "unsupported RSA modulus length {bits}, expected one of {SUPPORTED_RSA_BITS:?}"
            )));
        }
        let private = RsaPrivateKey::new(rng, bits)?;
        debug!(bits, "generated RSA key pair");
        Ok(Self::from(private))
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        self.signing_key.as_ref()
    }

    /// Modulus length in bits.
    pub fn bits(&self) -> usize {
        self.public.n().bits()
    }

    /// Returns the public key wrapped in a `SubjectPublicKeyInfo`.
    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        SubjectPublicKeyInfoOwned::from_key(self.public.clone())
            .map_err(|e| SmimerError::EncodingError(e.to_string()))
    }

    /// Signs `data` with RSASSA-PKCS1-v1_5 over SHA-256.
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signature = self
            .signing_key
            .try_sign(data)
            .map_err(|e| SmimerError::SigningError(e.to_string()))?;
        Ok(signature.to_vec())
    }

    /// Whether `public` is the public half of this pair.
    pub fn matches(&self, public: &RsaPublicKey) -> bool {
        &self.public == public
    }

    /// Encodes the private key as an unencrypted PKCS#8 document.
    pub fn to_pkcs8_der(&self) -> Result<SecretDocument> {
        self.private_key()
            .to_pkcs8_der()
            .map_err(|e| SmimerError::EncodingError(e.to_string()))
    }

    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|e| SmimerError::DecodingError(e.to_string()))?;
        Ok(Self::from(private))
    }
}

impl From<RsaPrivateKey> for KeyPair {
    fn from(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        KeyPair {
            signing_key: RsaSigningKey::new(private),
            public,
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("bits", &self.bits())
            .field("private", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1v15::{Signature, VerifyingKey};
    use rsa::signature::Verifier;

    #[test]
    fn test_generate_rejects_unsupported_length() {
        let err = KeyPair::generate_rsa(1000).unwrap_err();
        assert!(matches!(err, SmimerError::KeyGenerationError(_)));
    }

    #[test]
    fn test_sign_and_verify() {
        let key = KeyPair::generate_default().unwrap();
        assert_eq!(key.bits(), 2048);

        let signature = key.sign_data(b"to be signed").unwrap();
        let verifying_key = VerifyingKey::<Sha256>::new(key.public_key().clone());
        let signature = Signature::try_from(signature.as_slice()).unwrap();
        assert!(verifying_key.verify(b"to be signed", &signature).is_ok());
        assert!(verifying_key.verify(b"tampered", &signature).is_err());
    }

    #[test]
    fn test_repeated_signatures_reuse_one_key() {
        let key = KeyPair::generate_default().unwrap();
        let copy = key.clone();
        assert_eq!(
            RsaPublicKey::from(key.private_key()),
            *copy.public_key()
        );

        let first = key.sign_data(b"tbs").unwrap();
        assert_eq!(first, key.sign_data(b"tbs").unwrap());
        assert_eq!(first, copy.sign_data(b"tbs").unwrap());
        assert_ne!(first, key.sign_data(b"other tbs").unwrap());
    }

    #[test]
    fn test_pkcs8_round_trip_and_redacted_debug() {
        let key = KeyPair::generate_default().unwrap();
        let der = key.to_pkcs8_der().unwrap();
        let restored = KeyPair::from_pkcs8_der(der.as_bytes()).unwrap();
        assert!(restored.matches(key.public_key()));

        let rendered = format!("{key:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(rendered.contains("2048"));
    }
}
