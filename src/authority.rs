//! Issuance policies for the two certificate roles: the mail CA and the S/MIME leaf.

use tracing::{debug, info};

use crate::cert::Certificate;
use crate::cert::extensions::{AuthorityKeyIdentifier, ExtensionPolicy};
use crate::cert::params::{DistinguishedName, NameFields};
use crate::error::{Result, SmimerError};
use crate::issuer::create_certificate;
use crate::key::KeyPair;

/// Appended to the common name (or email) to form the CA's name.
pub const CA_LABEL: &str = " Secure Mail CA";

/// The CA's distinguished name: the identity fields with [`CA_LABEL`] appended to the common name.
pub fn ca_name(identity: &NameFields) -> DistinguishedName {
    ca_name_with_label(identity, CA_LABEL)
}

pub(crate) fn ca_name_with_label(identity: &NameFields, label: &str) -> DistinguishedName {
    let common_name = identity.common_name.as_deref().unwrap_or_default();
    DistinguishedName::from_fields(&identity.with_common_name(format!("{common_name}{label}")))
}

/// Issues a CA certificate whose issuer and subject are both the CA's own name.
///
/// The certificate is self-signed when `signer_key` is `cert_key` and cross-signed otherwise.
pub fn issue_ca_certificate(
    cert_key: &KeyPair,
    signer_key: &KeyPair,
    validity_days: u32,
    identity: &NameFields,
) -> Result<Certificate> {
    issue_ca_certificate_with_label(cert_key, signer_key, validity_days, identity, CA_LABEL)
}

pub(crate) fn issue_ca_certificate_with_label(
    cert_key: &KeyPair,
    signer_key: &KeyPair,
    validity_days: u32,
    identity: &NameFields,
    label: &str,
) -> Result<Certificate> {
    let name = ca_name_with_label(identity, label);
    let certificate = create_certificate(
        &name,
        &name,
        validity_days,
        &ExtensionPolicy::CertificateAuthority.extensions(),
        cert_key,
        Some(signer_key),
    )?;
    info!(
        subject = %name,
        self_signed = cert_key.matches(signer_key.public_key()),
        validity_days,
        "issued CA certificate"
    );
    Ok(certificate)
}

/// Issues an email-protection certificate for `email`, signed by the CA.
///
/// The issuer name is the CA name derived from `email` and `organization`; the subject
/// carries only `email`. Fails with [`SmimerError::SignerMismatchError`] unless
/// `signer_certificate` holds the public half of `signer_key`.
pub fn issue_smime_certificate(
    cert_key: &KeyPair,
    signer_key: &KeyPair,
    signer_certificate: &Certificate,
    validity_days: u32,
    email: &str,
    organization: &NameFields,
) -> Result<Certificate> {
    issue_smime_certificate_with_label(
        cert_key,
        signer_key,
        signer_certificate,
        validity_days,
        email,
        organization,
        CA_LABEL,
    )
}

pub(crate) fn issue_smime_certificate_with_label(
    cert_key: &KeyPair,
    signer_key: &KeyPair,
    signer_certificate: &Certificate,
    validity_days: u32,
    email: &str,
    organization: &NameFields,
    label: &str,
) -> Result<Certificate> {
    if !signer_key.matches(&signer_certificate.public_key()?) {
        return Err(SmimerError::SignerMismatchError(format!(
            "key does not belong to certificate {}",
            signer_certificate.subject()?
        )));
    }

    let issuer = ca_name_with_label(&organization.with_common_name(email), label);
    let subject = DistinguishedName::build(email, None, None, None, None);

    let key_identifier = signer_certificate.subject_key_identifier()?;
    debug!(
        key_identifier = %hex(&key_identifier),
        "linking leaf to CA key identifier"
    );
    let authority = AuthorityKeyIdentifier {
        key_identifier,
        authority_cert_issuer: Some(signer_certificate.issuer()?),
        authority_cert_serial_number: Some(signer_certificate.serial_number().to_vec()),
    };
    let policy = ExtensionPolicy::SmimeLeaf {
        email: email.to_string(),
        authority,
    };

    let certificate = create_certificate(
        &issuer,
        &subject,
        validity_days,
        &policy.extensions(),
        cert_key,
        Some(signer_key),
    )?;
    info!(subject = %subject, issuer = %issuer, validity_days, "issued S/MIME certificate");
    Ok(certificate)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::params::NameAttribute;

    fn identity() -> NameFields {
        NameFields::builder()
            .common_name("alice@example.com")
            .country("US")
            .locality("Springfield")
            .organizational_unit("Mail")
            .organization("Example Inc")
            .build()
    }

    #[test]
    fn test_ca_name_appends_label() {
        let name = ca_name(&identity());
        assert_eq!(name.common_name(), Some("alice@example.com Secure Mail CA"));
        assert_eq!(name.get(NameAttribute::Organization), Some("Example Inc"));
        assert_eq!(name.len(), 5);
    }

    #[test]
    fn test_ca_name_without_common_name_is_label_only() {
        let name = ca_name(&NameFields::default());
        assert_eq!(name.common_name(), Some(" Secure Mail CA"));
    }

    #[test]
    fn test_smime_rejects_mismatched_signer() {
        let ca_key = KeyPair::generate_default().unwrap();
        let other_key = KeyPair::generate_default().unwrap();
        let ca_cert = issue_ca_certificate(&ca_key, &ca_key, 3650, &identity()).unwrap();

        let err = issue_smime_certificate(
            &other_key,
            &other_key,
            &ca_cert,
            365,
            "alice@example.com",
            &identity(),
        )
        .unwrap_err();
        assert!(matches!(err, SmimerError::SignerMismatchError(_)));
    }

    #[test]
    fn test_cross_signed_ca() {
        let root_key = KeyPair::generate_default().unwrap();
        let ca_key = KeyPair::generate_default().unwrap();
        let ca_cert = issue_ca_certificate(&ca_key, &root_key, 365, &identity()).unwrap();

        ca_cert.verify_signed_by(root_key.public_key()).unwrap();
        assert!(ca_cert.verify_self_signed().is_err());
        assert_eq!(ca_cert.public_key().unwrap(), *ca_key.public_key());
    }

    #[test]
    fn test_hex() {
        assert_eq!(hex(&[0x00, 0x0f, 0xa0]), "000fa0");
    }
}
