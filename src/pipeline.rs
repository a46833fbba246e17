//! The full issuance flow: CA key and certificate, leaf key and certificate, PKCS#12 bundle.

use bon::Builder;
use tracing::info;

use crate::authority::{CA_LABEL, issue_ca_certificate_with_label, issue_smime_certificate_with_label};
use crate::cert::Certificate;
use crate::cert::params::NameFields;
use crate::error::{Result, SmimerError};
use crate::key::{DEFAULT_RSA_BITS, KeyPair};
use crate::pfx::{Pkcs12Options, package_pkcs12_with};

/// Tunables for [`issue_bundle`].
#[derive(Clone, Debug, PartialEq, Eq, Builder)]
pub struct IssuanceConfig {
    /// RSA modulus length for both key pairs.
    #[builder(default = DEFAULT_RSA_BITS)]
    pub key_bits: usize,
    #[builder(default = 3650)]
    pub ca_validity_days: u32,
    #[builder(default = 365)]
    pub leaf_validity_days: u32,
    /// Suffix turning the subject's common name into the CA's.
    #[builder(into, default = CA_LABEL.to_string())]
    pub ca_label: String,
    #[builder(default)]
    pub pkcs12: Pkcs12Options,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Everything one issuance run produces.
#[derive(Clone, Debug)]
pub struct IssuedBundle {
    pub ca_key: KeyPair,
    pub ca_certificate: Certificate,
    pub leaf_key: KeyPair,
    pub leaf_certificate: Certificate,
    /// DER-encoded PKCS#12 archive with the leaf key, the leaf and the CA certificate.
    pub pkcs12: Vec<u8>,
}

/// Issues a self-signed mail CA for `email`, a leaf certificate for `email` signed by it,
/// and packages the leaf key with both certificates under `password`.
///
/// `organization` supplies the optional country, locality and organization fields of the CA name;
/// its common name is ignored in favour of `email`.
pub fn issue_bundle(
    config: &IssuanceConfig,
    email: &str,
    organization: &NameFields,
    password: &str,
) -> Result<IssuedBundle> {
    let ca_identity = organization.with_common_name(email);

    let ca_key = KeyPair::generate_rsa(config.key_bits)?;
    let ca_certificate = issue_ca_certificate_with_label(
        &ca_key,
        &ca_key,
        config.ca_validity_days,
        &ca_identity,
        &config.ca_label,
    )?;

    let leaf_key = KeyPair::generate_rsa(config.key_bits)?;
    let leaf_certificate = issue_smime_certificate_with_label(
        &leaf_key,
        &ca_key,
        &ca_certificate,
        config.leaf_validity_days,
        email,
        organization,
        &config.ca_label,
    )?;

    let pkcs12 = package_pkcs12_with(
        &leaf_key,
        &leaf_certificate,
        &ca_certificate,
        password,
        &config.pkcs12,
    )?;
    info!(email, "issued S/MIME bundle");

    Ok(IssuedBundle {
        ca_key,
        ca_certificate,
        leaf_key,
        leaf_certificate,
        pkcs12,
    })
}

/// Returns `email` for use as an output file name, refusing anything that could
/// leave the output directory.
pub fn file_stem(email: &str) -> Result<&str> {
    if email.is_empty()
        || email.contains(['/', '\\', '\0'])
        || email.contains("..")
        || email.starts_with('.')
    {
        return Err(SmimerError::InvalidInput(format!(
            "{email:?} cannot be used as a file name"
        )));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IssuanceConfig::default();
        assert_eq!(config.key_bits, 2048);
        assert_eq!(config.ca_validity_days, 3650);
        assert_eq!(config.leaf_validity_days, 365);
        assert_eq!(config.ca_label, " Secure Mail CA");
        assert_eq!(config.pkcs12, Pkcs12Options::default());
    }

    #[test]
    fn test_file_stem_rejects_path_components() {
        assert_eq!(file_stem("alice@example.com").unwrap(), "alice@example.com");
        for email in [
            "",
            "../alice@example.com",
            "a/b@example.com",
            "a\\b@example.com",
            "/etc/passwd",
            "..",
            ".hidden@example.com",
            "a\0@example.com",
        ] {
            assert!(
                matches!(file_stem(email), Err(SmimerError::InvalidInput(_))),
                "{email:?} accepted"
            );
        }
    }

    #[test]
    fn test_unsupported_key_size_stops_before_issuing() {
        let config = IssuanceConfig::builder().key_bits(512).build();
        let err = issue_bundle(&config, "a@b.com", &NameFields::default(), "pw").unwrap_err();
        assert!(matches!(err, SmimerError::KeyGenerationError(_)));
    }

    #[test]
    fn test_custom_label_links_leaf_to_ca() {
        let config = IssuanceConfig::builder().ca_label(" Test CA").build();
        let bundle = issue_bundle(&config, "a@b.com", &NameFields::default(), "pw").unwrap();

        let ca_subject = bundle.ca_certificate.subject().unwrap();
        assert_eq!(ca_subject.common_name(), Some("a@b.com Test CA"));
        assert_eq!(bundle.leaf_certificate.issuer().unwrap(), ca_subject);
        bundle
            .leaf_certificate
            .verify_signed_by(bundle.ca_key.public_key())
            .unwrap();
    }
}
