#![allow(dead_code)]

use smimer::authority::{issue_ca_certificate, issue_smime_certificate};
use smimer::cert::Certificate;
use smimer::cert::params::NameFields;
use smimer::key::KeyPair;

pub const EMAIL: &str = "alice@example.com";

pub fn identity() -> NameFields {
    NameFields::builder()
        .common_name(EMAIL)
        .country("US")
        .locality("Springfield")
        .organizational_unit("Mail")
        .organization("Example Inc")
        .build()
}

pub struct Issued {
    pub key: KeyPair,
    pub cert: Certificate,
}

pub fn generate_ca() -> Issued {
    let key = KeyPair::generate_default().unwrap();
    let cert = issue_ca_certificate(&key, &key, 3650, &identity()).unwrap();
    Issued { key, cert }
}

pub fn generate_leaf(ca: &Issued) -> Issued {
    let key = KeyPair::generate_default().unwrap();
    let cert = issue_smime_certificate(&key, &ca.key, &ca.cert, 365, EMAIL, &identity()).unwrap();
    Issued { key, cert }
}
