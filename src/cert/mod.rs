pub mod extensions;
pub mod params;

use der::asn1::Any;
use der::{DecodePem, Encode, EncodePem, Tag};
use extensions::{AuthorityKeyIdentifier, BasicConstraints, SubjectKeyIdentifier, ToAndFromX509Extension};
use params::{DistinguishedName, ExtensionParam, Validity};
use pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use sha2::Sha256;
use x509_cert::certificate::CertificateInner;
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::error::{Result, SmimerError};

/// Represents the supported signature algorithms for certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption (PKCS#1 v1.5).
    Sha256WithRSA,
}

impl SignatureAlgorithm {
    pub fn oid(&self) -> const_oid::ObjectIdentifier {
        match self {
            SignatureAlgorithm::Sha256WithRSA => const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
        }
    }

    /// The `AlgorithmIdentifier` for this algorithm; RSA algorithms carry explicit NULL parameters.
    pub fn to_algorithm_identifier(&self) -> Result<AlgorithmIdentifierOwned> {
        let parameters = Any::new(Tag::Null, Vec::<u8>::new())
            .map_err(|e| SmimerError::EncodingError(e.to_string()))?;
        Ok(AlgorithmIdentifierOwned {
            oid: self.oid(),
            parameters: Some(parameters),
        })
    }

    pub fn from_algorithm_identifier(algorithm: &AlgorithmIdentifierOwned) -> Result<Self> {
        match algorithm.oid {
            const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION => {
                Ok(SignatureAlgorithm::Sha256WithRSA)
            }
            oid => Err(SmimerError::DecodingError(format!(
                "Unsupported signature algorithm {oid}"
            ))),
        }
    }
}

/// Represents an X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| SmimerError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| SmimerError::EncodingError(e.to_string()))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = <CertificateInner as der::Decode>::from_der(der)?;
        Ok(Self { inner })
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        let inner = CertificateInner::from_pem(pem)?;
        Ok(Self { inner })
    }

    /// Big-endian serial number bytes as encoded in the certificate.
    pub fn serial_number(&self) -> &[u8] {
        self.inner.tbs_certificate.serial_number.as_bytes()
    }

    pub fn subject(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.subject)
    }

    pub fn issuer(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.issuer)
    }

    pub fn validity(&self) -> Validity {
        Validity::from_x509(&self.inner.tbs_certificate.validity)
    }

    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::from_algorithm_identifier(&self.inner.signature_algorithm)
    }

    /// The RSA public key embedded in the certificate.
    pub fn public_key(&self) -> Result<RsaPublicKey> {
        let spki_der = self
            .inner
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| SmimerError::EncodingError(e.to_string()))?;
        RsaPublicKey::from_public_key_der(&spki_der)
            .map_err(|e| SmimerError::DecodingError(e.to_string()))
    }

    /// All extensions, in certificate order.
    pub fn extensions(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .map(|ext| ExtensionParam {
                oid: ext.extn_id,
                critical: ext.critical,
                value: ext.extn_value.as_bytes().to_vec(),
            })
            .collect()
    }

    /// Decodes the first extension of type `E`, if the certificate carries one.
    pub fn find_extension<E: ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        self.extensions()
            .iter()
            .find(|ext| ext.oid == E::OID)
            .map(|ext| ext.to_extension())
            .transpose()
    }

    pub fn subject_key_identifier(&self) -> Result<Vec<u8>> {
        self.find_extension::<SubjectKeyIdentifier>()?
            .map(|ski| ski.0)
            .ok_or_else(|| {
                SmimerError::DecodingError("certificate has no subject key identifier".to_string())
            })
    }

    pub fn authority_key_identifier(&self) -> Result<Option<AuthorityKeyIdentifier>> {
        self.find_extension::<AuthorityKeyIdentifier>()
    }

    pub fn is_ca(&self) -> Result<bool> {
        Ok(self
            .find_extension::<BasicConstraints>()?
            .is_some_and(|bc| bc.is_ca))
    }

    /// Checks the certificate signature against `issuer_key`.
    pub fn verify_signed_by(&self, issuer_key: &RsaPublicKey) -> Result<()> {
        self.signature_algorithm()?;
        let tbs = self
            .inner
            .tbs_certificate
            .to_der()
            .map_err(|e| SmimerError::EncodingError(e.to_string()))?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            SmimerError::DecodingError("signature is not octet aligned".to_string())
        })?;
        let signature = Signature::try_from(signature)
            .map_err(|e| SmimerError::DecodingError(e.to_string()))?;
        VerifyingKey::<Sha256>::new(issuer_key.clone())
            .verify(&tbs, &signature)
            .map_err(|e| SmimerError::VerificationError(e.to_string()))
    }

    /// Checks the certificate signature against its own public key.
    pub fn verify_self_signed(&self) -> Result<()> {
        self.verify_signed_by(&self.public_key()?)
    }
}
