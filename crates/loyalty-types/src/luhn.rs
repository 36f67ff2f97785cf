//! Luhn checksum for order numbers.
//!
//! Digits are walked left to right. With `n` digits, position `i` is doubled
//! when `i % 2 == n % 2`, which lines up with the usual right-to-left rule.

use crate::{LoyaltyError, Result};

/// Whether `number` is a non-empty run of ASCII digits passing the Luhn check.
#[must_use]
pub fn is_valid(number: &str) -> bool {
    let digits = number.as_bytes();
    if digits.is_empty() {
        return false;
    }
    let parity = digits.len() % 2;
    let mut sum = 0u32;
    for (i, byte) in digits.iter().enumerate() {
        if !byte.is_ascii_digit() {
            return false;
        }
        let mut digit = u32::from(byte - b'0');
        if i % 2 == parity {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }
    sum % 10 == 0
}

/// Trim surrounding whitespace and validate.
///
/// # Errors
/// `InvalidOrderNumber` if the trimmed value fails [`is_valid`].
pub fn validate(number: &str) -> Result<&str> {
    let trimmed = number.trim();
    if is_valid(trimmed) {
        Ok(trimmed)
    } else {
        Err(LoyaltyError::InvalidOrderNumber(trimmed.to_string()))
    }
}

/// Append the Luhn check digit to a digit string.
///
/// Returns `None` if `payload` contains a non-digit.
#[must_use]
pub fn with_check_digit(payload: &str) -> Option<String> {
    if !payload.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    (0..=9u8)
        .map(|d| format!("{payload}{}", char::from(b'0' + d)))
        .find(|candidate| is_valid(candidate))
}

/// A random Luhn-valid number of `len` digits (`len >= 2`).
#[cfg(any(test, feature = "test-helpers"))]
#[must_use]
pub fn random_number(len: usize) -> String {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    let payload: String = (0..len.max(2) - 1)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect();
    with_check_digit(&payload).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    #[test]
    fn known_valid_numbers() {
        for n in ["12345678903", "2377225624", "79927398713", "4561261212345467", "0"] {
            assert!(is_valid(n), "{n} should pass");
        }
    }

    #[test]
    fn known_invalid_numbers() {
        for n in ["12345678901", "79927398710", "4561261212345464", "", "1234a", " 12345678903"] {
            assert!(!is_valid(n), "{n:?} should fail");
        }
    }

    #[test]
    fn leading_zero_padding_is_neutral() {
        assert!(is_valid("079927398713"));
        assert!(is_valid("0079927398713"));
    }

    #[test]
    fn validate_trims_whitespace() {
        assert_eq!(validate(" 12345678903\n").unwrap(), "12345678903");
        let err = validate("12345678901").unwrap_err();
        assert!(matches!(err, LoyaltyError::InvalidOrderNumber(n) if n == "12345678901"));
    }

    #[test]
    fn generated_numbers_always_pass() {
        let mut rng = rand::thread_rng();
        for _ in 0..1_000 {
            let len = rng.gen_range(10..=19);
            let number = random_number(len);
            assert!(is_valid(&number), "{number} generated but rejected");
            assert_eq!(number.len(), len);
        }
    }

    #[test]
    fn single_digit_change_is_detected() {
        let number = "12345678903";
        for pos in 0..number.len() {
            let mut bytes = number.as_bytes().to_vec();
            bytes[pos] = b'0' + (bytes[pos] - b'0' + 1) % 10;
            let mutated = String::from_utf8(bytes).unwrap();
            assert!(!is_valid(&mutated), "{mutated} should fail");
        }
    }

    #[test]
    fn check_digit_rejects_non_digits() {
        assert!(with_check_digit("12x").is_none());
    }
}
