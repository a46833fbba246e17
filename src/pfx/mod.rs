//! PKCS#12 (PFX) archives holding a private key and its certificate chain.
//!
//! Archives are laid out the way mail clients expect legacy bundles:
//! an `encryptedData` safe with the certificate bags, a `data` safe with one
//! shrouded key bag, both encrypted with `pbeWithSHAAnd3-KeyTripleDES-CBC`,
//! and an HMAC-SHA1 integrity MAC over the whole authenticated safe.

mod pbe;

use ::pkcs12::authenticated_safe::AuthenticatedSafe;
use ::pkcs12::cert_type::CertBag;
use ::pkcs12::digest_info::DigestInfo;
use ::pkcs12::mac_data::MacData;
use ::pkcs12::pbe_params::{EncryptedPrivateKeyInfo, Pkcs12PbeParams};
use ::pkcs12::pfx::{Pfx, Version};
use ::pkcs12::safe_bag::{SafeBag, SafeContents};
use ::pkcs12::{
    PKCS_12_CERT_BAG_OID, PKCS_12_PBE_WITH_SHAAND3_KEY_TRIPLE_DES_CBC, PKCS_12_PKCS8_KEY_BAG_OID,
    PKCS_12_X509_CERT_OID,
};
use bon::Builder;
use cms::content_info::{CmsVersion, ContentInfo};
use cms::encrypted_data::EncryptedData;
use cms::enveloped_data::EncryptedContentInfo;
use const_oid::ObjectIdentifier;
use const_oid::db::rfc5911::{ID_DATA, ID_ENCRYPTED_DATA};
use const_oid::db::rfc5912::ID_SHA_1;
use der::asn1::{Any, BmpString, OctetString, SetOfVec};
use der::{Decode, Encode, EncodeValue, Tagged};
use sha1::{Digest, Sha1};
use tracing::{debug, info};
use x509_cert::attr::{Attribute, Attributes};
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::cert::Certificate;
use crate::error::{Result, SmimerError};
use crate::key::KeyPair;

/// PKCS#9 `friendlyName`.
pub const FRIENDLY_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.20");
/// PKCS#9 `localKeyId`.
pub const LOCAL_KEY_ID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.21");

/// Iteration count used for both key derivation and the MAC unless configured otherwise.
pub const DEFAULT_ITERATIONS: u32 = 2048;

/// Tunables for archive creation.
#[derive(Clone, Debug, PartialEq, Eq, Builder)]
pub struct Pkcs12Options {
    #[builder(default = DEFAULT_ITERATIONS)]
    pub pbe_iterations: u32,
    #[builder(default = DEFAULT_ITERATIONS)]
    pub mac_iterations: u32,
    /// Attached to the key bag and the leaf certificate bag when set.
    #[builder(into)]
    pub friendly_name: Option<String>,
}

impl Default for Pkcs12Options {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// What an archive yields when opened.
#[derive(Debug, Clone)]
pub struct Pkcs12Contents {
    pub key: KeyPair,
    /// Certificates in archive order: the leaf, then its CA.
    pub certificates: Vec<Certificate>,
}

fn encoding_error(err: der::Error) -> SmimerError {
    SmimerError::PackagingError(err.to_string())
}

fn octets(bytes: impl Into<Vec<u8>>) -> Result<OctetString> {
    OctetString::new(bytes.into()).map_err(encoding_error)
}

fn to_any<T: Tagged + EncodeValue>(value: &T) -> Result<Any> {
    Any::encode_from(value).map_err(encoding_error)
}

/// The KDF and MAC take a signed round count; anything past `i32::MAX` or below 1 is refused.
fn rounds(iterations: u32) -> Result<i32> {
    match i32::try_from(iterations) {
        Ok(rounds) if rounds >= 1 => Ok(rounds),
        _ => Err(SmimerError::InvalidInput(format!(
            "iteration count {iterations} out of range"
        ))),
    }
}

fn pbe_algorithm(salt: &[u8], iterations: i32) -> Result<AlgorithmIdentifierOwned> {
    let parameters = Pkcs12PbeParams {
        salt: octets(salt)?,
        iterations,
    };
    Ok(AlgorithmIdentifierOwned {
        oid: PKCS_12_PBE_WITH_SHAAND3_KEY_TRIPLE_DES_CBC,
        parameters: Some(to_any(&parameters)?),
    })
}

fn pbe_parameters(algorithm: &AlgorithmIdentifierOwned) -> Result<Pkcs12PbeParams> {
    if algorithm.oid != PKCS_12_PBE_WITH_SHAAND3_KEY_TRIPLE_DES_CBC {
        return Err(SmimerError::PackagingError(format!(
            "unsupported encryption algorithm {}",
            algorithm.oid
        )));
    }
    let parameters = algorithm.parameters.as_ref().ok_or_else(|| {
        SmimerError::PackagingError("missing PBE parameters".to_string())
    })?;
    let parameters = parameters.decode_as::<Pkcs12PbeParams>()?;
    if parameters.iterations < 1 {
        return Err(SmimerError::PackagingError(format!(
            "invalid iteration count {}",
            parameters.iterations
        )));
    }
    Ok(parameters)
}

fn bag_attributes(local_key_id: &[u8], friendly_name: Option<&str>) -> Result<Attributes> {
    let mut attributes = vec![Attribute {
        oid: LOCAL_KEY_ID,
        values: SetOfVec::try_from(vec![to_any(&octets(local_key_id)?)?]).map_err(encoding_error)?,
    }];
    if let Some(name) = friendly_name {
        let name = BmpString::from_utf8(name)
            .map_err(|e| SmimerError::InvalidInput(format!("friendly name: {e}")))?;
        attributes.push(Attribute {
            oid: FRIENDLY_NAME,
            values: SetOfVec::try_from(vec![to_any(&name)?]).map_err(encoding_error)?,
        });
    }
    SetOfVec::try_from(attributes).map_err(encoding_error)
}

fn cert_bag(certificate: &Certificate, attributes: Option<Attributes>) -> Result<SafeBag> {
    let bag = CertBag {
        cert_id: PKCS_12_X509_CERT_OID,
        cert_value: octets(certificate.to_der()?)?,
    };
    Ok(SafeBag {
        bag_id: PKCS_12_CERT_BAG_OID,
        bag_value: bag.to_der().map_err(encoding_error)?,
        bag_attributes: attributes,
    })
}

/// Bundles `private_key`, its `certificate` and the issuing `ca_certificate` into
/// a PKCS#12 archive protected by `password`, with default options.
pub fn package_pkcs12(
    private_key: &KeyPair,
    certificate: &Certificate,
    ca_certificate: &Certificate,
    password: &str,
) -> Result<Vec<u8>> {
    package_pkcs12_with(
        private_key,
        certificate,
        ca_certificate,
        password,
        &Pkcs12Options::default(),
    )
}

pub fn package_pkcs12_with(
    private_key: &KeyPair,
    certificate: &Certificate,
    ca_certificate: &Certificate,
    password: &str,
    options: &Pkcs12Options,
) -> Result<Vec<u8>> {
    if !private_key.matches(&certificate.public_key()?) {
        return Err(SmimerError::PackagingError(
            "private key does not belong to the certificate".to_string(),
        ));
    }
    let pbe_rounds = rounds(options.pbe_iterations)?;
    let mac_rounds = rounds(options.mac_iterations)?;

    let local_key_id = Sha1::digest(certificate.to_der()?);
    let attributes = bag_attributes(&local_key_id, options.friendly_name.as_deref())?;

    // Certificates: encryptedData safe, leaf first.
    let cert_safe: SafeContents = vec![
        cert_bag(certificate, Some(attributes.clone()))?,
        cert_bag(ca_certificate, None)?,
    ];
    let cert_salt = pbe::random_salt()?;
    let encrypted_certs = pbe::encrypt(
        password,
        &cert_salt,
        pbe_rounds,
        &cert_safe.to_der().map_err(encoding_error)?,
    )?;
    let encrypted_data = EncryptedData {
        version: CmsVersion::V0,
        enc_content_info: EncryptedContentInfo {
            content_type: ID_DATA,
            content_enc_alg: pbe_algorithm(&cert_salt, pbe_rounds)?,
            encrypted_content: Some(octets(encrypted_certs)?),
        },
        unprotected_attrs: None,
    };

    // Private key: shrouded key bag inside a plain data safe.
    let key_salt = pbe::random_salt()?;
    let pkcs8 = private_key
        .to_pkcs8_der()
        .map_err(|e| SmimerError::PackagingError(e.to_string()))?;
    let shrouded_key = EncryptedPrivateKeyInfo {
        encryption_algorithm: pbe_algorithm(&key_salt, pbe_rounds)?,
        encrypted_data: octets(pbe::encrypt(
            password,
            &key_salt,
            pbe_rounds,
            pkcs8.as_bytes(),
        )?)?,
    };
    let key_safe: SafeContents = vec![SafeBag {
        bag_id: PKCS_12_PKCS8_KEY_BAG_OID,
        bag_value: shrouded_key.to_der().map_err(encoding_error)?,
        bag_attributes: Some(attributes),
    }];

    let auth_safe: AuthenticatedSafe<'_> = vec![
        ContentInfo {
            content_type: ID_ENCRYPTED_DATA,
            content: to_any(&encrypted_data)?,
        },
        ContentInfo {
            content_type: ID_DATA,
            content: to_any(&octets(key_safe.to_der().map_err(encoding_error)?)?)?,
        },
    ];
    let auth_safe_der = auth_safe.to_der().map_err(encoding_error)?;

    let mac_salt = pbe::random_salt()?;
    let mac = pbe::compute_mac(password, &mac_salt, mac_rounds, &auth_safe_der)?;
    let mac_data = MacData {
        mac: DigestInfo {
            algorithm: AlgorithmIdentifierOwned {
                oid: ID_SHA_1,
                parameters: Some(Any::null()),
            },
            digest: octets(mac)?,
        },
        mac_salt: octets(mac_salt)?,
        iterations: mac_rounds,
    };

    let pfx = Pfx {
        version: Version::V3,
        auth_safe: ContentInfo {
            content_type: ID_DATA,
            content: to_any(&octets(auth_safe_der)?)?,
        },
        mac_data: Some(mac_data),
    };
    let der = pfx.to_der().map_err(encoding_error)?;
    info!(bytes = der.len(), certificates = 2, "packaged PKCS#12 archive");
    Ok(der)
}

/// Opens an archive produced by [`package_pkcs12`].
///
/// The integrity MAC is checked first, so a wrong password fails with
/// [`SmimerError::PackagingError`] before anything is decrypted.
pub fn open_pkcs12(der: &[u8], password: &str) -> Result<Pkcs12Contents> {
    let pfx = Pfx::from_der(der)?;
    if pfx.auth_safe.content_type != ID_DATA {
        return Err(SmimerError::PackagingError(
            "public-key integrity mode is not supported".to_string(),
        ));
    }
    let auth_safe_octets = pfx.auth_safe.content.decode_as::<OctetString>()?;
    let auth_safe_der = auth_safe_octets.as_bytes();

    let mac_data = pfx
        .mac_data
        .ok_or_else(|| SmimerError::PackagingError("archive has no MAC".to_string()))?;
    if mac_data.mac.algorithm.oid != ID_SHA_1 {
        return Err(SmimerError::PackagingError(format!(
            "unsupported MAC digest {}",
            mac_data.mac.algorithm.oid
        )));
    }
    if mac_data.iterations < 1 {
        return Err(SmimerError::PackagingError(format!(
            "invalid MAC iteration count {}",
            mac_data.iterations
        )));
    }
    pbe::verify_mac(
        password,
        mac_data.mac_salt.as_bytes(),
        mac_data.iterations,
        auth_safe_der,
        mac_data.mac.digest.as_bytes(),
    )?;

    let mut key = None;
    let mut certificates = Vec::new();
    let auth_safe: AuthenticatedSafe<'_> = Decode::from_der(auth_safe_der)?;
    for content_info in auth_safe {
        let safe_der = match content_info.content_type {
            ID_DATA => content_info
                .content
                .decode_as::<OctetString>()?
                .as_bytes()
                .to_vec(),
            ID_ENCRYPTED_DATA => {
                let encrypted = content_info.content.decode_as::<EncryptedData>()?;
                let info = encrypted.enc_content_info;
                let params = pbe_parameters(&info.content_enc_alg)?;
                let ciphertext = info.encrypted_content.ok_or_else(|| {
                    SmimerError::PackagingError("encrypted safe has no content".to_string())
                })?;
                pbe::decrypt(
                    password,
                    params.salt.as_bytes(),
                    params.iterations,
                    ciphertext.as_bytes(),
                )?
            }
            other => {
                return Err(SmimerError::PackagingError(format!(
                    "unsupported safe content type {other}"
                )));
            }
        };

        let safe: SafeContents = Decode::from_der(&safe_der)?;
        for bag in safe {
            match bag.bag_id {
                PKCS_12_CERT_BAG_OID => {
                    let cert_bag = CertBag::from_der(&bag.bag_value)?;
                    certificates.push(Certificate::from_der(cert_bag.cert_value.as_bytes())?);
                }
                PKCS_12_PKCS8_KEY_BAG_OID => {
                    let shrouded = EncryptedPrivateKeyInfo::from_der(&bag.bag_value)?;
                    let params = pbe_parameters(&shrouded.encryption_algorithm)?;
                    let pkcs8 = pbe::decrypt(
                        password,
                        params.salt.as_bytes(),
                        params.iterations,
                        shrouded.encrypted_data.as_bytes(),
                    )?;
                    if key.replace(KeyPair::from_pkcs8_der(&pkcs8)?).is_some() {
                        return Err(SmimerError::PackagingError(
                            "archive holds more than one key".to_string(),
                        ));
                    }
                }
                other => debug!(bag = %other, "skipping unsupported safe bag"),
            }
        }
    }

    let key = key.ok_or_else(|| SmimerError::PackagingError("archive holds no key".to_string()))?;
    Ok(Pkcs12Contents { key, certificates })
}
