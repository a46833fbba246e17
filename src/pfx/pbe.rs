//! Password-based primitives: SHA-1 PKCS#12 key derivation, 3DES-CBC and the HMAC-SHA1 integrity MAC.

use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use ::pkcs12::kdf::{Pkcs12KeyType, derive_key_utf8};
use rand_core::RngCore;
use sha1::Sha1;

use crate::error::{Result, SmimerError};

type TdesCbcEnc = cbc::Encryptor<des::TdesEde3>;
type TdesCbcDec = cbc::Decryptor<des::TdesEde3>;
type HmacSha1 = Hmac<Sha1>;

pub const SALT_LEN: usize = 8;
const TDES_KEY_LEN: usize = 24;
const TDES_IV_LEN: usize = 8;
const MAC_KEY_LEN: usize = 20;

fn packaging_error(err: impl std::fmt::Display) -> SmimerError {
    SmimerError::PackagingError(err.to_string())
}

pub fn random_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    rand_core::OsRng.try_fill_bytes(&mut salt)?;
    Ok(salt)
}

fn derive(
    password: &str,
    salt: &[u8],
    key_type: Pkcs12KeyType,
    iterations: i32,
    len: usize,
) -> Result<Vec<u8>> {
    derive_key_utf8::<Sha1>(password, salt, key_type, iterations, len).map_err(packaging_error)
}

fn key_and_iv(password: &str, salt: &[u8], iterations: i32) -> Result<(Vec<u8>, Vec<u8>)> {
    let key = derive(password, salt, Pkcs12KeyType::EncryptionKey, iterations, TDES_KEY_LEN)?;
    let iv = derive(password, salt, Pkcs12KeyType::Iv, iterations, TDES_IV_LEN)?;
    Ok((key, iv))
}

/// `pbeWithSHAAnd3-KeyTripleDES-CBC` encryption.
pub fn encrypt(password: &str, salt: &[u8], iterations: i32, plaintext: &[u8]) -> Result<Vec<u8>> {
    let (key, iv) = key_and_iv(password, salt, iterations)?;
    let cipher = TdesCbcEnc::new_from_slices(&key, &iv).map_err(packaging_error)?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// `pbeWithSHAAnd3-KeyTripleDES-CBC` decryption; a wrong password usually shows up as bad padding.
pub fn decrypt(password: &str, salt: &[u8], iterations: i32, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let (key, iv) = key_and_iv(password, salt, iterations)?;
    let cipher = TdesCbcDec::new_from_slices(&key, &iv).map_err(packaging_error)?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| SmimerError::PackagingError("decryption failed".to_string()))
}

fn mac(password: &str, salt: &[u8], iterations: i32) -> Result<HmacSha1> {
    let key = derive(password, salt, Pkcs12KeyType::Mac, iterations, MAC_KEY_LEN)?;
    HmacSha1::new_from_slice(&key).map_err(packaging_error)
}

pub fn compute_mac(password: &str, salt: &[u8], iterations: i32, data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = mac(password, salt, iterations)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Constant-time comparison of `expected` against the MAC of `data`.
pub fn verify_mac(
    password: &str,
    salt: &[u8],
    iterations: i32,
    data: &[u8],
    expected: &[u8],
) -> Result<()> {
    let mut mac = mac(password, salt, iterations)?;
    mac.update(data);
    mac.verify_slice(expected).map_err(|_| {
        SmimerError::PackagingError("MAC verification failed; wrong password?".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let salt = random_salt().unwrap();
        let ciphertext = encrypt("secret", &salt, 2048, b"safe contents").unwrap();
        assert_eq!(ciphertext.len() % 8, 0);
        assert_ne!(&ciphertext[..], b"safe contents");
        assert_eq!(
            decrypt("secret", &salt, 2048, &ciphertext).unwrap(),
            b"safe contents"
        );
    }

    #[test]
    fn test_mac_depends_on_password() {
        let salt = [7u8; SALT_LEN];
        let tag = compute_mac("secret", &salt, 2048, b"auth safe").unwrap();
        assert_eq!(tag.len(), 20);
        verify_mac("secret", &salt, 2048, b"auth safe", &tag).unwrap();
        assert!(matches!(
            verify_mac("Secret", &salt, 2048, b"auth safe", &tag),
            Err(SmimerError::PackagingError(_))
        ));
        assert!(verify_mac("secret", &salt, 2048, b"auth safe!", &tag).is_err());
    }

    #[test]
    fn test_key_derivation_is_deterministic() {
        let salt = [1u8; SALT_LEN];
        let (key_a, iv_a) = key_and_iv("pw", &salt, 1).unwrap();
        let (key_b, iv_b) = key_and_iv("pw", &salt, 1).unwrap();
        assert_eq!(key_a, key_b);
        assert_eq!(iv_a, iv_b);
        assert_eq!(key_a.len(), TDES_KEY_LEN);
        assert_eq!(iv_a.len(), TDES_IV_LEN);
        assert_ne!(key_and_iv("px", &salt, 1).unwrap().0, key_a);
    }
}
