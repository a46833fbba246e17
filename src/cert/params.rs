use std::fmt;

use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::{Any, PrintableStringRef, SetOfVec, Utf8StringRef};
use der::{Tag, Tagged};
use time::{Duration, OffsetDateTime, Time, UtcOffset};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};

use super::extensions::ToAndFromX509Extension;
use crate::error::{Result, SmimerError};

/// Naming attributes a distinguished name may carry, in the order they are emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NameAttribute {
    Country,
    Locality,
    OrganizationalUnit,
    Organization,
    CommonName,
}

impl NameAttribute {
    /// Conventional DN ordering: C, L, OU, O, CN.
    pub const ORDER: [NameAttribute; 5] = [
        NameAttribute::Country,
        NameAttribute::Locality,
        NameAttribute::OrganizationalUnit,
        NameAttribute::Organization,
        NameAttribute::CommonName,
    ];

    pub const fn oid(self) -> ObjectIdentifier {
        match self {
            NameAttribute::Country => ObjectIdentifier::new_unwrap("2.5.4.6"),
            NameAttribute::Locality => ObjectIdentifier::new_unwrap("2.5.4.7"),
            NameAttribute::OrganizationalUnit => ObjectIdentifier::new_unwrap("2.5.4.11"),
            NameAttribute::Organization => ObjectIdentifier::new_unwrap("2.5.4.10"),
            NameAttribute::CommonName => ObjectIdentifier::new_unwrap("2.5.4.3"),
        }
    }

    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        Self::ORDER.into_iter().find(|attr| attr.oid() == *oid)
    }

    pub const fn short_name(self) -> &'static str {
        match self {
            NameAttribute::Country => "C",
            NameAttribute::Locality => "L",
            NameAttribute::OrganizationalUnit => "OU",
            NameAttribute::Organization => "O",
            NameAttribute::CommonName => "CN",
        }
    }
}

/// Caller-supplied naming fields, each either present or absent.
///
/// # Fields
/// * `common_name` - The common name (CN).
/// * `country` - The two-letter country code (C).
/// * `locality` - The locality or city (L).
/// * `organizational_unit` - The organizational unit (OU).
/// * `organization` - The organization (O).
#[derive(Clone, Debug, Default, PartialEq, Eq, Builder)]
pub struct NameFields {
    #[builder(into)]
    pub common_name: Option<String>,
    #[builder(into)]
    pub country: Option<String>,
    #[builder(into)]
    pub locality: Option<String>,
    #[builder(into)]
    pub organizational_unit: Option<String>,
    #[builder(into)]
    pub organization: Option<String>,
}

impl NameFields {
    pub fn get(&self, attribute: NameAttribute) -> Option<&str> {
        let value = match attribute {
            NameAttribute::Country => &self.country,
            NameAttribute::Locality => &self.locality,
            NameAttribute::OrganizationalUnit => &self.organizational_unit,
            NameAttribute::Organization => &self.organization,
            NameAttribute::CommonName => &self.common_name,
        };
        value.as_deref()
    }

    /// Returns a copy with the common name replaced.
    pub fn with_common_name(&self, common_name: impl Into<String>) -> Self {
        Self {
            common_name: Some(common_name.into()),
            ..self.clone()
        }
    }
}

/// An ordered, immutable sequence of naming attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    attributes: Vec<(NameAttribute, String)>,
}

impl DistinguishedName {
    /// Builds a name from individual fields.
    ///
    /// Absent or empty fields contribute nothing, the common name included.
    pub fn build(
        common_name: &str,
        country: Option<&str>,
        locality: Option<&str>,
        organizational_unit: Option<&str>,
        organization: Option<&str>,
    ) -> Self {
        let fields = NameFields {
            common_name: Some(common_name.to_string()),
            country: country.map(str::to_string),
            locality: locality.map(str::to_string),
            organizational_unit: organizational_unit.map(str::to_string),
            organization: organization.map(str::to_string),
        };
        Self::from_fields(&fields)
    }

    /// Builds a name by walking [`NameAttribute::ORDER`] and keeping every non-empty field.
    pub fn from_fields(fields: &NameFields) -> Self {
        let attributes = NameAttribute::ORDER
            .into_iter()
            .filter_map(|attr| match fields.get(attr) {
                Some(value) if !value.is_empty() => Some((attr, value.to_string())),
                _ => None,
            })
            .collect();
        Self { attributes }
    }

    pub fn attributes(&self) -> &[(NameAttribute, String)] {
        &self.attributes
    }

    pub fn get(&self, attribute: NameAttribute) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(attr, _)| *attr == attribute)
            .map(|(_, value)| value.as_str())
    }

    pub fn common_name(&self) -> Option<&str> {
        self.get(NameAttribute::CommonName)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Converts the distinguished name to an X.509 `Name`, one attribute per RDN.
    ///
    /// Country is encoded as a PrintableString, everything else as UTF8String.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::DistinguishedName> {
        let rdns = self
            .attributes
            .iter()
            .map(|(attr, value)| {
                let value = match attr {
                    NameAttribute::Country => Any::encode_from(
                        &PrintableStringRef::new(value)
                            .map_err(|e| SmimerError::InvalidInput(format!("country: {e}")))?,
                    ),
                    _ => Utf8StringRef::new(value).and_then(|utf8| Any::encode_from(&utf8)),
                }
                .map_err(|e| SmimerError::EncodingError(e.to_string()))?;
                let atav = AttributeTypeAndValue {
                    oid: attr.oid(),
                    value,
                };
                let set = SetOfVec::try_from(vec![atav])
                    .map_err(|e| SmimerError::EncodingError(e.to_string()))?;
                Ok(RelativeDistinguishedName(set))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RdnSequence(rdns))
    }

    /// Reads a distinguished name back from its X.509 form.
    ///
    /// Attributes outside [`NameAttribute`] are rejected.
    pub fn from_x509_name(x509dn: &x509_cert::name::DistinguishedName) -> Result<Self> {
        let mut attributes = Vec::new();
        for rdn in x509dn.0.iter() {
            for atav in rdn.0.iter() {
                let attr = NameAttribute::from_oid(&atav.oid).ok_or_else(|| {
                    SmimerError::DecodingError(format!("unsupported name attribute {}", atav.oid))
                })?;
                let value = match atav.value.tag() {
                    Tag::PrintableString => atav.value.decode_as::<PrintableStringRef<'_>>()?.to_string(),
                    Tag::Utf8String => atav.value.decode_as::<String>()?,
                    tag => {
                        return Err(SmimerError::DecodingError(format!(
                            "unsupported string type {tag} for {}",
                            attr.short_name()
                        )));
                    }
                };
                attributes.push((attr, value));
            }
        }
        Ok(Self { attributes })
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (attr, value)) in self.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", attr.short_name(), value)?;
        }
        Ok(())
    }
}

/// Certificate validity period.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// A window of `days` days starting at today's midnight (UTC).
    pub fn starting_today(days: u32) -> Result<Self> {
        Self::starting_on(OffsetDateTime::now_utc(), days)
    }

    /// A window of `days` days starting at midnight (UTC) of the day containing `start`.
    pub fn starting_on(start: OffsetDateTime, days: u32) -> Result<Self> {
        if days == 0 {
            return Err(SmimerError::InvalidInput(
                "validity period must be at least one day".to_string(),
            ));
        }
        let not_before = start.to_offset(UtcOffset::UTC).replace_time(Time::MIDNIGHT);
        let not_after = not_before
            .checked_add(Duration::days(i64::from(days)))
            .ok_or_else(|| {
                SmimerError::InvalidInput(format!("validity of {days} days is out of range"))
            })?;
        Ok(Self {
            not_before,
            not_after,
        })
    }

    pub fn duration(&self) -> Duration {
        self.not_after - self.not_before
    }

    pub fn to_x509(&self) -> Result<x509_cert::time::Validity> {
        Ok(x509_cert::time::Validity {
            not_before: x509_time(self.not_before)?,
            not_after: x509_time(self.not_after)?,
        })
    }

    pub fn from_x509(validity: &x509_cert::time::Validity) -> Self {
        Self {
            not_before: OffsetDateTime::from(validity.not_before.to_system_time()),
            not_after: OffsetDateTime::from(validity.not_after.to_system_time()),
        }
    }
}

/// RFC 5280: UTCTime through 2049, GeneralizedTime from 2050 on.
fn x509_time(at: OffsetDateTime) -> Result<x509_cert::time::Time> {
    let time = if at.year() < 2050 {
        der::asn1::UtcTime::from_system_time(at.into()).map(x509_cert::time::Time::UtcTime)
    } else {
        der::asn1::GeneralizedTime::from_system_time(at.into())
            .map(x509_cert::time::Time::GeneralTime)
    };
    time.map_err(|e| SmimerError::EncodingError(e.to_string()))
}

/// Represents an X.509 extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: &E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        E::from_x509_extension_value(&self.value)
    }
}
