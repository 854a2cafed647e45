//! Account identifier codec
//!
//! Account numbers follow a fixed IBAN-like layout:
//!
//! ```text
//! BY 01 WOJJ 0643 8416642840916051
//! ^^ ^^ ^^^^ ^^^^ ^^^^^^^^^^^^^^^^
//! |  |  |    |    16 digits
//! |  |  |    4 digits
//! |  |  4 uppercase letters
//! |  2 digits
//! class prefix: BY (ordinary), SE (emission), ST (terminate)
//! ```
//!
//! The part after the prefix is the 26 character identifier body.

use crate::{Error, Result};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

/// Prefix of ordinary customer accounts
pub const ORDINARY_PREFIX: &str = "BY";

/// Prefix of the state emission account
pub const EMISSION_PREFIX: &str = "SE";

/// Prefix of the state terminate account
pub const TERMINATE_PREFIX: &str = "ST";

/// Length of the identifier body (everything after the class prefix)
pub const IDENTIFIER_LENGTH: usize = 26;

const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";

static ACCOUNT_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(BY|SE|ST)[0-9]{2}[A-Z]{4}[0-9]{4}[0-9]{16}$")
        .expect("account number pattern is valid")
});

/// Generate a random identifier body.
///
/// Positions 0-1 are digits, 2-5 uppercase letters, the rest digits.
/// Not cryptographically secure; collisions are merely unlikely.
pub fn generate_identifier() -> String {
    let mut rng = rand::thread_rng();

    (0..IDENTIFIER_LENGTH)
        .map(|i| {
            let alphabet = match i {
                2..=5 => LETTERS,
                _ => DIGITS,
            };
            alphabet[rng.gen_range(0..alphabet.len())] as char
        })
        .collect()
}

/// Generate a full account number with the given class prefix
pub fn generate(prefix: &str) -> String {
    let mut number = String::with_capacity(prefix.len() + IDENTIFIER_LENGTH);
    number.push_str(prefix);
    number.push_str(&generate_identifier());
    number
}

/// Check an account number against the identifier pattern
pub fn validate(number: &str) -> Result<()> {
    if ACCOUNT_NUMBER.is_match(number) {
        Ok(())
    } else {
        Err(Error::InvalidFormat(number.to_string()))
    }
}

/// Boolean form of [`validate`]
pub fn is_valid(number: &str) -> bool {
    ACCOUNT_NUMBER.is_match(number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_identifier_layout() {
        let id = generate_identifier();
        assert_eq!(id.len(), IDENTIFIER_LENGTH);

        let bytes = id.as_bytes();
        assert!(bytes[..2].iter().all(u8::is_ascii_digit));
        assert!(bytes[2..6].iter().all(u8::is_ascii_uppercase));
        assert!(bytes[6..].iter().all(u8::is_ascii_digit));
    }

    #[test]
    fn test_generated_number_validates() {
        for _ in 0..100 {
            let number = generate(ORDINARY_PREFIX);
            assert!(number.starts_with("BY"));
            assert!(validate(&number).is_ok(), "{number} should validate");
        }
    }

    #[test]
    fn test_special_numbers_validate() {
        assert!(is_valid("SE00MMMM00000000000000000001"));
        assert!(is_valid("ST00MMMM00000000000000000002"));
    }

    #[test]
    fn test_rejects_malformed_numbers() {
        let cases = [
            "",
            "NOT_VALID",
            // unknown prefix
            "XX01WOJJ06438416642840916051",
            // lowercase letters
            "BY01wojj06438416642840916051",
            // one digit short
            "BY01WOJJ0643841664284091605",
            // one digit too many
            "BY01WOJJ064384166428409160511",
            // leading garbage
            "ZZBY01WOJJ06438416642840916051",
        ];

        for case in cases {
            assert_eq!(
                validate(case),
                Err(Error::InvalidFormat(case.to_string())),
                "{case:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_accepts_reference_number() {
        assert!(validate("BY01WOJJ06438416642840916051").is_ok());
    }
}
