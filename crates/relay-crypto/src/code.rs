//! Rendezvous code alphabet and generation.
//!
//! Codes are short, human-typeable strings shown on one device and typed
//! into another, so the alphabet avoids characters that are easy to
//! transpose or misread (no `0`/`O`, no `1`/`I`/`l`).

use rand::Rng;

/// The 31-character alphabet codes are drawn from.
pub const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Default length for an ephemeral (auto-generated) code.
pub const DEFAULT_CODE_LEN: usize = 7;

/// Minimum and maximum length accepted for a user-chosen custom code.
pub const CUSTOM_CODE_MIN_LEN: usize = 4;
pub const CUSTOM_CODE_MAX_LEN: usize = 16;

/// Generate a random code of `len` characters drawn from [`ALPHABET`].
pub fn generate(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..ALPHABET.len());
            ALPHABET[idx] as char
        })
        .collect()
}

/// Generate a code of the default ephemeral length.
pub fn generate_default() -> String {
    generate(DEFAULT_CODE_LEN)
}

/// `true` iff every character of `code` is in [`ALPHABET`] (case-insensitive
/// on input, codes are normalized upper-case before this check runs).
pub fn is_valid_alphabet(code: &str) -> bool {
    code.bytes().all(|b| ALPHABET.contains(&b.to_ascii_uppercase()))
}

/// Normalize a code to the canonical upper-case form used for storage and
/// comparison.
pub fn normalize(code: &str) -> String {
    code.to_ascii_uppercase()
}

/// Validate a custom code: correct alphabet and within the allowed length
/// range.
pub fn is_valid_custom_code(code: &str) -> bool {
    let len = code.chars().count();
    (CUSTOM_CODE_MIN_LEN..=CUSTOM_CODE_MAX_LEN).contains(&len) && is_valid_alphabet(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_have_requested_length() {
        let code = generate(10);
        assert_eq!(code.chars().count(), 10);
    }

    #[test]
    fn generated_codes_use_only_the_alphabet() {
        let code = generate(64);
        assert!(is_valid_alphabet(&code));
    }

    #[test]
    fn alphabet_excludes_commonly_confused_characters() {
        for excluded in ['0', 'O', '1', 'I', 'L'] {
            assert!(!ALPHABET.contains(&(excluded as u8)));
        }
    }

    #[test]
    fn custom_code_length_bounds_are_enforced() {
        assert!(!is_valid_custom_code("AB"));
        assert!(is_valid_custom_code("ABCD"));
        assert!(is_valid_custom_code(&"A".repeat(CUSTOM_CODE_MAX_LEN)));
        assert!(!is_valid_custom_code(&"A".repeat(CUSTOM_CODE_MAX_LEN + 1)));
    }

    #[test]
    fn custom_code_rejects_foreign_characters() {
        assert!(!is_valid_custom_code("ABC0")); // zero is excluded
        assert!(!is_valid_custom_code("AB-D"));
    }

    #[test]
    fn normalize_upper_cases_consistently() {
        assert_eq!(normalize("abcd"), "ABCD");
    }
}
