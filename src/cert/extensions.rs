use const_oid::AssociatedOid;
use der::{
    Decode, Encode,
    asn1::{Ia5String, OctetString},
    oid::ObjectIdentifier,
};
use sha1::{Digest, Sha1};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

pub use der::flagset::FlagSet;
use der::flagset::flags;
use x509_cert::ext::pkix::KeyUsage as X509KeyUsage;
pub use x509_cert::ext::pkix::KeyUsages;

use super::params::{DistinguishedName, ExtensionParam};
use crate::error::{Result, SmimerError};

/// Trait for converting to and from X.509 extensions.
///
/// This trait provides methods to encode and decode X.509 extension values.
///
/// # Example
/// ```
/// use smimer::cert::extensions::{AltName, SubjectAltName, ToAndFromX509Extension};
/// let san = SubjectAltName { names: vec![AltName::Rfc822("alice@example.com".to_string())] };
/// let encoded = san.to_x509_extension_value().unwrap();
/// let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
/// assert_eq!(san.names, decoded.names);
/// ```
pub trait ToAndFromX509Extension {
    /// The Object Identifier (OID) for the extension.
    const OID: ObjectIdentifier;

    /// Encodes the extension into a DER-encoded byte vector.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>>;

    /// Decodes the extension from a DER-encoded byte slice.
    fn from_x509_extension_value(extension: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

fn encoding_error(err: der::Error) -> SmimerError {
    SmimerError::EncodingError(err.to_string())
}

/// One entry of a Subject Alternative Name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AltName {
    /// An email address (`rfc822Name`).
    Rfc822(String),
}

/// Represents the Subject Alternative Name (SAN) extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectAltName {
    pub names: Vec<AltName>,
}

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let san = x509_cert::ext::pkix::SubjectAltName(
            self.names
                .iter()
                .map(|name| match name {
                    AltName::Rfc822(email) => Ia5String::new(email)
                        .map(GeneralName::Rfc822Name)
                        .map_err(|e| SmimerError::InvalidInput(format!("{email}: {e}"))),
                })
                .collect::<Result<Vec<_>>>()?,
        );

        san.to_der().map_err(encoding_error)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let san = x509_cert::ext::pkix::SubjectAltName::from_der(extension)?;
        let names = san
            .0
            .iter()
            .map(|name| match name {
                GeneralName::Rfc822Name(email) => Ok(AltName::Rfc822(email.to_string())),
                _ => Err(SmimerError::DecodingError(
                    "Unsupported general name type".to_string(),
                )),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { names })
    }
}

/// Represents the Basic Constraints extension. No path length constraint is ever set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let bc = x509_cert::ext::pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint: None,
        };

        bc.to_der().map_err(encoding_error)
    }

    fn from_x509_extension_value(der_bytes: &[u8]) -> Result<Self> {
        let bc = x509_cert::ext::pkix::BasicConstraints::from_der(der_bytes)?;
        Ok(Self { is_ca: bc.ca })
    }
}

/// Represents the Key Usage extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <X509KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        X509KeyUsage(self.0).to_der().map_err(encoding_error)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ku = X509KeyUsage::from_der(extension)?;
        Ok(Self(ku.0))
    }
}

/// Represents the Extended Key Usage extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedKeyUsage {
    pub usage: Vec<ExtendedKeyUsageOption>,
}

impl ToAndFromX509Extension for ExtendedKeyUsage {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::ExtendedKeyUsage::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let oids: Vec<ObjectIdentifier> = self.usage.iter().map(|v| (*v).into()).collect();
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage(oids);
        eku.to_der().map_err(encoding_error)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage::from_der(extension)?;
        let usage = eku
            .0
            .iter()
            .map(|v| match *v {
                const_oid::db::rfc5912::ID_KP_EMAIL_PROTECTION => {
                    Ok(ExtendedKeyUsageOption::EmailProtection)
                }
                _ => Err(SmimerError::DecodingError(
                    "Unsupported extended key usage option".to_string(),
                )),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { usage })
    }
}

/// Represents an option for the Extended Key Usage extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedKeyUsageOption {
    EmailProtection,
}

impl From<ExtendedKeyUsageOption> for ObjectIdentifier {
    fn from(value: ExtendedKeyUsageOption) -> Self {
        match value {
            ExtendedKeyUsageOption::EmailProtection => {
                const_oid::db::rfc5912::ID_KP_EMAIL_PROTECTION
            }
        }
    }
}

flags! {
    /// Bits of the legacy Netscape certificate type extension.
    pub enum NetscapeCertTypes: u8 {
        SslClient = 1 << 0,
        SslServer = 1 << 1,
        Smime = 1 << 2,
        ObjectSigning = 1 << 3,
        SslCa = 1 << 5,
        SmimeCa = 1 << 6,
        ObjectSigningCa = 1 << 7,
    }
}

/// Represents the Netscape Certificate Type extension (`nsCertType`).
///
/// Obsolete, but older mail clients still look at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetscapeCertType(pub FlagSet<NetscapeCertTypes>);

impl ToAndFromX509Extension for NetscapeCertType {
    const OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.113730.1.1");

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        self.0.to_der().map_err(encoding_error)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        Ok(Self(FlagSet::<NetscapeCertTypes>::from_der(extension)?))
    }
}

/// Represents the Subject Key Identifier extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier(pub Vec<u8>);

impl SubjectKeyIdentifier {
    /// SHA-1 over the subjectPublicKey BIT STRING contents (RFC 5280, section 4.2.1.2, method 1).
    pub fn from_spki(spki: &SubjectPublicKeyInfoOwned) -> Self {
        let key_id = Sha1::digest(spki.subject_public_key.raw_bytes());
        Self(key_id.to_vec())
    }
}

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier(
            OctetString::new(self.0.as_slice()).map_err(encoding_error)?,
        );
        ski.to_der().map_err(encoding_error)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(extension)?;
        Ok(Self(ski.0.as_bytes().to_vec()))
    }
}

/// Represents the Authority Key Identifier (AKI) extension.
///
/// This extension identifies the public key corresponding to the private key used to sign the certificate.
///
/// # Fields
/// * `key_identifier` - The issuing key's subject key identifier.
/// * `authority_cert_issuer` - The issuer's distinguished name.
/// * `authority_cert_serial_number` - The issuer's certificate serial number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: Vec<u8>,
    pub authority_cert_issuer: Option<DistinguishedName>,
    pub authority_cert_serial_number: Option<Vec<u8>>,
}

impl ToAndFromX509Extension for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::AuthorityKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let authority_cert_issuer = self
            .authority_cert_issuer
            .as_ref()
            .map(|dn| dn.as_x509_name().map(|name| vec![GeneralName::DirectoryName(name)]))
            .transpose()?;

        let authority_cert_serial_number = self
            .authority_cert_serial_number
            .as_deref()
            .map(x509_cert::serial_number::SerialNumber::new)
            .transpose()
            .map_err(encoding_error)?;

        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier {
            key_identifier: Some(
                OctetString::new(self.key_identifier.as_slice()).map_err(encoding_error)?,
            ),
            authority_cert_issuer,
            authority_cert_serial_number,
        };

        aki.to_der().map_err(encoding_error)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier::from_der(extension)?;

        let authority_cert_issuer = aki
            .authority_cert_issuer
            .as_ref()
            .and_then(|names| {
                names.iter().find_map(|name| match name {
                    GeneralName::DirectoryName(dn) => Some(DistinguishedName::from_x509_name(dn)),
                    _ => None,
                })
            })
            .transpose()?;

        Ok(Self {
            key_identifier: aki
                .key_identifier
                .map(|id| id.as_bytes().to_vec())
                .unwrap_or_default(),
            authority_cert_issuer,
            authority_cert_serial_number: aki
                .authority_cert_serial_number
                .map(|sn| sn.as_bytes().to_vec()),
        })
    }
}

/// A certificate extension, one variant per supported kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateExtension {
    BasicConstraints {
        is_ca: bool,
        critical: bool,
    },
    KeyUsage {
        usages: FlagSet<KeyUsages>,
        critical: bool,
    },
    ExtendedKeyUsage {
        usages: Vec<ExtendedKeyUsageOption>,
        critical: bool,
    },
    NetscapeCertType {
        types: FlagSet<NetscapeCertTypes>,
    },
    SubjectAltName {
        names: Vec<AltName>,
    },
    SubjectKeyIdentifier {
        key_identifier: Vec<u8>,
    },
    AuthorityKeyIdentifier(AuthorityKeyIdentifier),
}

impl CertificateExtension {
    /// Encodes the extension into its OID/criticality/value form.
    pub fn to_param(&self) -> Result<ExtensionParam> {
        match self {
            CertificateExtension::BasicConstraints { is_ca, critical } => {
                ExtensionParam::from_extension(&BasicConstraints { is_ca: *is_ca }, *critical)
            }
            CertificateExtension::KeyUsage { usages, critical } => {
                ExtensionParam::from_extension(&KeyUsage(*usages), *critical)
            }
            CertificateExtension::ExtendedKeyUsage { usages, critical } => {
                let eku = ExtendedKeyUsage {
                    usage: usages.clone(),
                };
                ExtensionParam::from_extension(&eku, *critical)
            }
            CertificateExtension::NetscapeCertType { types } => {
                ExtensionParam::from_extension(&NetscapeCertType(*types), false)
            }
            CertificateExtension::SubjectAltName { names } => {
                let san = SubjectAltName {
                    names: names.clone(),
                };
                ExtensionParam::from_extension(&san, false)
            }
            CertificateExtension::SubjectKeyIdentifier { key_identifier } => {
                ExtensionParam::from_extension(&SubjectKeyIdentifier(key_identifier.clone()), false)
            }
            CertificateExtension::AuthorityKeyIdentifier(aki) => {
                ExtensionParam::from_extension(aki, false)
            }
        }
    }
}

/// The fixed extension sets issued per certificate role.
///
/// The subject key identifier is not part of either set; the issuer appends it to every certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionPolicy {
    /// A mail certificate authority: may sign certificates, nothing else.
    CertificateAuthority,
    /// An end-entity S/MIME certificate for `email`, linked to its CA through `authority`.
    SmimeLeaf {
        email: String,
        authority: AuthorityKeyIdentifier,
    },
}

impl ExtensionPolicy {
    pub fn extensions(&self) -> Vec<CertificateExtension> {
        match self {
            ExtensionPolicy::CertificateAuthority => vec![
                CertificateExtension::BasicConstraints {
                    is_ca: true,
                    critical: true,
                },
                CertificateExtension::KeyUsage {
                    usages: KeyUsages::KeyCertSign.into(),
                    critical: true,
                },
            ],
            ExtensionPolicy::SmimeLeaf { email, authority } => vec![
                CertificateExtension::BasicConstraints {
                    is_ca: false,
                    critical: true,
                },
                CertificateExtension::KeyUsage {
                    usages: KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment,
                    critical: true,
                },
                CertificateExtension::ExtendedKeyUsage {
                    usages: vec![ExtendedKeyUsageOption::EmailProtection],
                    critical: false,
                },
                CertificateExtension::NetscapeCertType {
                    types: NetscapeCertTypes::Smime.into(),
                },
                CertificateExtension::SubjectAltName {
                    names: vec![AltName::Rfc822(email.clone())],
                },
                CertificateExtension::AuthorityKeyIdentifier(authority.clone()),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_constraints_encoding_decoding() {
        let original = BasicConstraints { is_ca: true };
        let encoded = original.to_x509_extension_value().unwrap();
        // SEQUENCE { BOOLEAN TRUE }, no pathLenConstraint
        assert_eq!(encoded, vec![0x30, 0x03, 0x01, 0x01, 0xff]);
        let decoded = BasicConstraints::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_authority_key_identifier_encoding_decoding() {
        let original = AuthorityKeyIdentifier {
            key_identifier: vec![1, 2, 3, 4, 5],
            authority_cert_issuer: Some(DistinguishedName::build(
                "Test Secure Mail CA",
                Some("US"),
                Some("San Francisco"),
                Some("Test Unit"),
                Some("Test Org"),
            )),
            authority_cert_serial_number: Some(vec![6, 7, 8, 9, 10]),
        };
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = AuthorityKeyIdentifier::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_key_usage_encoding_decoding() {
        let original = KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment);
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = KeyUsage::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_netscape_cert_type_smime_bit() {
        let encoded = NetscapeCertType(NetscapeCertTypes::Smime.into())
            .to_x509_extension_value()
            .unwrap();
        // BIT STRING, 5 unused bits, bit 2 set
        assert_eq!(encoded, vec![0x03, 0x02, 0x05, 0x20]);
    }

    #[test]
    fn test_email_alt_name_is_rfc822() {
        let san = SubjectAltName {
            names: vec![AltName::Rfc822("alice@example.com".to_string())],
        };
        let encoded = san.to_x509_extension_value().unwrap();
        let parsed = x509_cert::ext::pkix::SubjectAltName::from_der(&encoded).unwrap();
        assert!(matches!(parsed.0.as_slice(), [GeneralName::Rfc822Name(_)]));
    }

    #[test]
    fn test_dns_alt_name_is_not_decoded() {
        let san = x509_cert::ext::pkix::SubjectAltName(vec![GeneralName::DnsName(
            Ia5String::new("mail.example.com").unwrap(),
        )]);
        let encoded = san.to_der().unwrap();
        assert!(matches!(
            SubjectAltName::from_x509_extension_value(&encoded),
            Err(SmimerError::DecodingError(_))
        ));
    }

    #[test]
    fn test_tls_key_purposes_are_not_decoded() {
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage(vec![
            const_oid::db::rfc5912::ID_KP_SERVER_AUTH,
        ]);
        let encoded = eku.to_der().unwrap();
        assert!(matches!(
            ExtendedKeyUsage::from_x509_extension_value(&encoded),
            Err(SmimerError::DecodingError(_))
        ));

        let email = ExtendedKeyUsage {
            usage: vec![ExtendedKeyUsageOption::EmailProtection],
        };
        let encoded = email.to_x509_extension_value().unwrap();
        assert_eq!(
            ExtendedKeyUsage::from_x509_extension_value(&encoded).unwrap(),
            email
        );
    }

    #[test]
    fn test_non_ascii_email_is_invalid_input() {
        let san = SubjectAltName {
            names: vec![AltName::Rfc822("jürgen@example.com".to_string())],
        };
        assert!(matches!(
            san.to_x509_extension_value(),
            Err(SmimerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_ca_policy() {
        let params: Vec<_> = ExtensionPolicy::CertificateAuthority
            .extensions()
            .iter()
            .map(|ext| ext.to_param().unwrap())
            .collect();
        assert_eq!(params.len(), 2);
        assert!(params.iter().all(|p| p.critical));

        let bc: BasicConstraints = params[0].to_extension().unwrap();
        assert!(bc.is_ca);
        let ku: KeyUsage = params[1].to_extension().unwrap();
        assert_eq!(ku.0, FlagSet::from(KeyUsages::KeyCertSign));
    }

    #[test]
    fn test_smime_policy() {
        let policy = ExtensionPolicy::SmimeLeaf {
            email: "alice@example.com".to_string(),
            authority: AuthorityKeyIdentifier {
                key_identifier: vec![0xaa; 20],
                authority_cert_issuer: None,
                authority_cert_serial_number: None,
            },
        };
        let params: Vec<_> = policy
            .extensions()
            .iter()
            .map(|ext| ext.to_param().unwrap())
            .collect();
        let oids: Vec<_> = params.iter().map(|p| p.oid).collect();
        assert_eq!(
            oids,
            vec![
                BasicConstraints::OID,
                KeyUsage::OID,
                ExtendedKeyUsage::OID,
                NetscapeCertType::OID,
                SubjectAltName::OID,
                AuthorityKeyIdentifier::OID,
            ]
        );
        let critical: Vec<_> = params.iter().map(|p| p.critical).collect();
        assert_eq!(critical, vec![true, true, false, false, false, false]);

        let bc: BasicConstraints = params[0].to_extension().unwrap();
        assert!(!bc.is_ca);
        let eku: ExtendedKeyUsage = params[2].to_extension().unwrap();
        assert_eq!(eku.usage, vec![ExtendedKeyUsageOption::EmailProtection]);
        let aki: AuthorityKeyIdentifier = params[5].to_extension().unwrap();
        assert_eq!(aki.key_identifier, vec![0xaa; 20]);
    }
}
