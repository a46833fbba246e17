//! # Smimer - S/MIME Certificate Issuance in Pure Rust
//!
//! Smimer creates everything a mail client needs to sign and encrypt email: a self-signed
//! mail certificate authority, an email-protection certificate issued by that CA, and a
//! password-protected PKCS#12 bundle carrying the private key and the certificate chain.
//! It is built entirely on rustcrypto libraries, without OpenSSL or ring (except for testing).
//!
//! ## Key Features
//!
//! - **RSA keys**: 2048, 3072 and 4096-bit key pairs
//! - **Mail CA certificates**: self-signed or cross-signed, `keyCertSign` only
//! - **S/MIME certificates**: `emailProtection`, `rfc822Name` subject alternative name,
//!   authority key identifier linking the leaf to its CA
//! - **PKCS#12 export**: 3DES-protected key and certificate bags with an HMAC-SHA1 MAC,
//!   readable by legacy mail clients
//!
//! ## Quick Start
//!
//! ### Issuing a complete bundle
//!
//! ```rust,no_run
//! use smimer::{cert::params::NameFields, pipeline::{IssuanceConfig, issue_bundle}};
//!
//! # fn main() -> Result<(), smimer::error::SmimerError> {
//! let organization = NameFields::builder()
//!     .country("US")
//!     .organization("Example Corp")
//!     .build();
//!
//! let bundle = issue_bundle(
//!     &IssuanceConfig::default(),
//!     "alice@example.com",
//!     &organization,
//!     "correct horse battery staple",
//! )?;
//! std::fs::write("alice.p12", &bundle.pkcs12).unwrap();
//! # Ok(())
//! # }
//! ```
//!
//! ### Step by step
//!
//! ```rust,no_run
//! use smimer::{
//!     authority::{issue_ca_certificate, issue_smime_certificate},
//!     cert::params::NameFields,
//!     key::KeyPair,
//!     pfx::package_pkcs12,
//! };
//!
//! # fn main() -> Result<(), smimer::error::SmimerError> {
//! let identity = NameFields::builder()
//!     .common_name("alice@example.com")
//!     .organization("Example Corp")
//!     .build();
//!
//! let ca_key = KeyPair::generate_rsa(2048)?;
//! let ca_cert = issue_ca_certificate(&ca_key, &ca_key, 3650, &identity)?;
//!
//! let leaf_key = KeyPair::generate_rsa(2048)?;
//! let leaf_cert = issue_smime_certificate(
//!     &leaf_key,
//!     &ca_key,
//!     &ca_cert,
//!     365,
//!     "alice@example.com",
//!     &identity,
//! )?;
//!
//! let archive = package_pkcs12(&leaf_key, &leaf_cert, &ca_cert, "secret")?;
//! println!("{}", leaf_cert.to_pem()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every step reports its own error kind and nothing is retried internally:
//!
//! ```rust
//! use smimer::{key::KeyPair, error::SmimerError};
//!
//! match KeyPair::generate_rsa(1024) {
//!     Ok(_) => unreachable!(),
//!     Err(SmimerError::KeyGenerationError(msg)) => println!("Failed to generate key: {}", msg),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`key`]: RSA key generation and signing
//! - [`serial`]: Random certificate serial numbers
//! - [`cert`]: Certificates, distinguished names, validity and extensions
//! - [`issuer`]: Assembling and signing certificates
//! - [`authority`]: CA and S/MIME issuance policies
//! - [`pfx`]: PKCS#12 packaging
//! - [`pipeline`]: The end-to-end issuance flow
//! - [`error`]: Error types
//! - [`tbs_certificate`]: Low-level certificate structure manipulation

pub mod authority;
pub mod cert;
pub mod error;
pub mod issuer;
pub mod key;
pub mod pfx;
pub mod pipeline;
pub mod serial;
pub mod tbs_certificate;
