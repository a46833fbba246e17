use der::Encode;
use tracing::debug;
use x509_cert::certificate::CertificateInner;

use crate::cert::Certificate;
use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::{CertificateExtension, SubjectKeyIdentifier};
use crate::cert::params::{DistinguishedName, Validity};
use crate::error::{Result, SmimerError};
use crate::key::KeyPair;
use crate::serial::SerialNumber;
use crate::tbs_certificate::TbsCertificate;

/// Represents an entity capable of issuing certificates.
///
/// Implementors supply the issuer name and the signing key; [`Issuer::issue`] does the rest.
pub trait Issuer {
    /// Returns the distinguished name written into the certificate's issuer field.
    fn issuer_name(&self) -> &DistinguishedName;

    /// Returns the key whose private half signs the certificate.
    fn signing_key(&self) -> &KeyPair;

    /// Issues a certificate for `subject_key`.
    ///
    /// A fresh random serial is drawn, the validity window starts at today's midnight,
    /// and a subject key identifier derived from `subject_key` is appended after `extensions`.
    fn issue(
        &self,
        subject: &DistinguishedName,
        subject_key: &KeyPair,
        validity_days: u32,
        extensions: &[CertificateExtension],
    ) -> Result<Certificate> {
        let serial_number = SerialNumber::generate()?;
        let validity = Validity::starting_today(validity_days)?;
        let subject_public_key = subject_key.as_spki()?;

        let key_identifier = SubjectKeyIdentifier::from_spki(&subject_public_key).0;
        let extensions = extensions
            .iter()
            .chain(std::iter::once(&CertificateExtension::SubjectKeyIdentifier {
                key_identifier,
            }))
            .map(CertificateExtension::to_param)
            .collect::<Result<Vec<_>>>()?;

        let signature_algorithm = SignatureAlgorithm::Sha256WithRSA;
        let tbs_cert = TbsCertificate {
            serial_number: serial_number.to_x509()?,
            signature_algorithm,
            issuer: self.issuer_name().clone(),
            validity,
            subject: subject.clone(),
            subject_public_key,
            extensions,
        };

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let tbs_der = tbs_cert_inner
            .to_der()
            .map_err(|e| SmimerError::EncodingError(e.to_string()))?;
        let signature = self.signing_key().sign_data(&tbs_der)?;

        debug!(
            serial = %serial_number,
            subject = %subject,
            issuer = %self.issuer_name(),
            not_before = %tbs_cert.validity.not_before,
            not_after = %tbs_cert.validity.not_after,
            "signed certificate"
        );

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: signature_algorithm.to_algorithm_identifier()?,
            signature: der::asn1::BitString::from_bytes(&signature)
                .map_err(|e| SmimerError::EncodingError(e.to_string()))?,
        };

        Ok(Certificate { inner: cert_inner })
    }
}

/// An issuer identified by a name and holding the signing key.
pub struct SigningAuthority<'a> {
    pub name: DistinguishedName,
    pub key: &'a KeyPair,
}

impl Issuer for SigningAuthority<'_> {
    fn issuer_name(&self) -> &DistinguishedName {
        &self.name
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }
}

/// Creates and signs a certificate.
///
/// Signs with `signer_key` when given, otherwise with `subject_key` (self-signed).
pub fn create_certificate(
    issuer: &DistinguishedName,
    subject: &DistinguishedName,
    validity_days: u32,
    extensions: &[CertificateExtension],
    subject_key: &KeyPair,
    signer_key: Option<&KeyPair>,
) -> Result<Certificate> {
    let authority = SigningAuthority {
        name: issuer.clone(),
        key: signer_key.unwrap_or(subject_key),
    };
    authority.issue(subject, subject_key, validity_days, extensions)
}
