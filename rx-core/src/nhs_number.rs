//! NHS number parsing and checksum validation
//!
//! An NHS number is exactly 10 ASCII digits. The tenth digit is a modulus-11
//! check digit computed over the first nine: each digit is multiplied by a
//! weight from 10 down to 2, the products are summed, and the check digit is
//! `11 - (sum mod 11)` (with 11 treated as 0; a result of 10 means the number
//! can never be valid).
//!
//! Parsing happens before any network or rate-limit cost, so malformed input
//! never reaches the NHS endpoints.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RxError};

/// A validated NHS number
///
/// Construction goes through [`NhsNumber::parse`], so holding a value of this
/// type guarantees the format and checksum are correct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NhsNumber(String);

impl NhsNumber {
    /// Parse and validate an NHS number
    ///
    /// Accepts embedded spaces (the common "943 476 5870" display format) but
    /// otherwise requires exactly 10 digits with a correct check digit.
    pub fn parse(input: &str) -> Result<Self> {
        let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();

        if digits.len() != 10 {
            return Err(RxError::InvalidNhsNumber {
                reason: format!("expected 10 digits, got {}", digits.len()),
            });
        }

        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(RxError::InvalidNhsNumber {
                reason: "contains non-digit characters".to_string(),
            });
        }

        if !checksum_valid(&digits) {
            return Err(RxError::InvalidNhsNumber {
                reason: "check digit mismatch".to_string(),
            });
        }

        Ok(Self(digits))
    }

    /// The 10-digit number as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NhsNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for NhsNumber {
    type Error = RxError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<NhsNumber> for String {
    fn from(value: NhsNumber) -> Self {
        value.0
    }
}

/// Modulus-11 check over a 10-digit string
fn checksum_valid(digits: &str) -> bool {
    let values: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    debug_assert_eq!(values.len(), 10);

    let sum: u32 = values
        .iter()
        .take(9)
        .enumerate()
        .map(|(i, d)| d * (10 - i as u32))
        .sum();

    let check = match 11 - (sum % 11) {
        11 => 0,
        10 => return false, // no valid check digit exists for this prefix
        n => n,
    };

    values[9] == check
}
