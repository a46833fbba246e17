//! Random certificate serial numbers.
//!
//! No issuance registry is kept; uniqueness relies on 64 bits of OS randomness.

use std::fmt;

use rand_core::{CryptoRng, RngCore};
use tracing::debug;

use crate::error::{Result, SmimerError};

/// Length in bytes of every generated serial number.
pub const SERIAL_NUMBER_LEN: usize = 8;

/// Draws tried before an all-zero source is treated as broken.
const MAX_DRAWS: usize = 8;

/// An 8-byte random serial number, read as an unsigned big-endian integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SerialNumber([u8; SERIAL_NUMBER_LEN]);

impl SerialNumber {
    /// Draws a fresh serial number from the operating system's secure random source.
    pub fn generate() -> Result<Self> {
        Self::generate_with(&mut rand_core::OsRng)
    }

    /// Draws a fresh serial number from `rng`.
    ///
    /// Serials must be positive, so an all-zero draw is discarded and drawn again.
    pub fn generate_with<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> Result<Self> {
        for _ in 0..MAX_DRAWS {
            let mut bytes = [0u8; SERIAL_NUMBER_LEN];
            rng.try_fill_bytes(&mut bytes)?;
            let serial = SerialNumber(bytes);
            if !serial.is_zero() {
                debug!(serial = %serial, "drew certificate serial number");
                return Ok(serial);
            }
        }
        Err(SmimerError::EntropyError(format!(
            "random source returned {MAX_DRAWS} all-zero serial numbers"
        )))
    }

    fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; SERIAL_NUMBER_LEN] {
        &self.0
    }

    /// Converts to the X.509 form, which is always encoded as a positive INTEGER.
    pub fn to_x509(&self) -> Result<x509_cert::serial_number::SerialNumber> {
        if self.is_zero() {
            return Err(SmimerError::EncodingError(
                "serial number must be positive".to_string(),
            ));
        }
        // DER integers are minimal: drop redundant leading zeros, and prefix one
        // when the high bit is set so the value does not read back as negative.
        let mut start = 0;
        while start + 1 < SERIAL_NUMBER_LEN && self.0[start] == 0 && self.0[start + 1] & 0x80 == 0 {
            start += 1;
        }
        let digits = &self.0[start..];
        let mut bytes = Vec::with_capacity(SERIAL_NUMBER_LEN + 1);
        if digits[0] & 0x80 != 0 {
            bytes.push(0);
        }
        bytes.extend_from_slice(digits);
        x509_cert::serial_number::SerialNumber::new(&bytes)
            .map_err(|e| SmimerError::EncodingError(e.to_string()))
    }
}

impl From<[u8; SERIAL_NUMBER_LEN]> for SerialNumber {
    fn from(bytes: [u8; SERIAL_NUMBER_LEN]) -> Self {
        SerialNumber(bytes)
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    struct BrokenRng;

    impl RngCore for BrokenRng {
        fn next_u32(&mut self) -> u32 {
            unreachable!()
        }

        fn next_u64(&mut self) -> u64 {
            unreachable!()
        }

        fn fill_bytes(&mut self, _dest: &mut [u8]) {
            unreachable!()
        }

        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> std::result::Result<(), rand_core::Error> {
            Err(rand_core::Error::new("entropy pool drained"))
        }
    }

    impl CryptoRng for BrokenRng {}

    /// Yields `zero_draws` all-zero fills, then fills with 0x5a.
    struct ZeroRng {
        zero_draws: usize,
    }

    impl RngCore for ZeroRng {
        fn next_u32(&mut self) -> u32 {
            unreachable!()
        }

        fn next_u64(&mut self) -> u64 {
            unreachable!()
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            let byte = if self.zero_draws > 0 {
                self.zero_draws -= 1;
                0
            } else {
                0x5a
            };
            dest.fill(byte);
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand_core::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    impl CryptoRng for ZeroRng {}

    #[test]
    fn test_serial_numbers_are_distinct() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let serial = SerialNumber::generate().unwrap();
            assert_eq!(serial.as_bytes().len(), SERIAL_NUMBER_LEN);
            assert!(seen.insert(serial), "duplicate serial {serial}");
        }
    }

    #[test]
    fn test_failing_source_is_entropy_error() {
        let err = SerialNumber::generate_with(&mut BrokenRng).unwrap_err();
        assert!(matches!(err, SmimerError::EntropyError(_)));
    }

    #[test]
    fn test_all_zero_draw_is_redrawn() {
        let serial = SerialNumber::generate_with(&mut ZeroRng { zero_draws: 2 }).unwrap();
        assert_eq!(serial.as_bytes(), &[0x5a; SERIAL_NUMBER_LEN]);
    }

    #[test]
    fn test_zero_only_source_is_entropy_error() {
        let err = SerialNumber::generate_with(&mut ZeroRng { zero_draws: usize::MAX }).unwrap_err();
        assert!(matches!(err, SmimerError::EntropyError(_)));
    }

    #[test]
    fn test_zero_serial_is_not_encoded() {
        let serial = SerialNumber::from([0; SERIAL_NUMBER_LEN]);
        assert!(matches!(serial.to_x509(), Err(SmimerError::EncodingError(_))));
    }

    #[test]
    fn test_high_bit_serial_stays_positive() {
        let serial = SerialNumber::from([0xff, 1, 2, 3, 4, 5, 6, 7]);
        let der = der::Encode::to_der(&serial.to_x509().unwrap()).unwrap();
        assert_eq!(&der[..3], &[0x02, 0x09, 0x00]);
        assert_eq!(&der[3..], serial.as_bytes());
    }

    #[test]
    fn test_leading_zero_serial_is_minimal() {
        let serial = SerialNumber::from([0, 0, 0x12, 3, 4, 5, 6, 7]);
        let der = der::Encode::to_der(&serial.to_x509().unwrap()).unwrap();
        assert_eq!(der, [0x02, 0x06, 0x12, 3, 4, 5, 6, 7]);
        <x509_cert::serial_number::SerialNumber as der::Decode>::from_der(&der).unwrap();
    }

    #[test]
    fn test_display_is_hex() {
        let serial = SerialNumber::from([0, 1, 0xab, 3, 4, 5, 6, 0xff]);
        assert_eq!(serial.to_string(), "0001ab03040506ff");
    }
}
