//! Referral code generation and validation
//!
//! Codes are `DR` followed by six characters from `[A-Z0-9]`. Uniqueness is
//! probabilistic (36^6 codes); there is no collision check.

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

const CODE_PREFIX: &str = "DR";
const CODE_SUFFIX_LEN: usize = 6;
const ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Largest multiple of 36 that fits in a byte; bytes at or above it are rejected
const REJECT_FROM: u8 = 252;

static CODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^DR[A-Z0-9]{6}$").expect("referral code pattern is valid")
});

/// Generate a fresh referral code
///
/// Random bytes come from v4 UUIDs. Bytes 6 and 8 carry the version and
/// variant bits, so they are skipped; rejection sampling keeps the mapping
/// onto the 36-letter alphabet uniform.
pub fn generate_referral_code() -> String {
    let mut code = String::with_capacity(CODE_PREFIX.len() + CODE_SUFFIX_LEN);
    code.push_str(CODE_PREFIX);

    let mut picked = 0;
    while picked < CODE_SUFFIX_LEN {
        let bytes = Uuid::new_v4().into_bytes();
        for (i, byte) in bytes.into_iter().enumerate() {
            if i == 6 || i == 8 || byte >= REJECT_FROM {
                continue;
            }
            code.push(char::from(ALPHABET[usize::from(byte % 36)]));
            picked += 1;
            if picked == CODE_SUFFIX_LEN {
                break;
            }
        }
    }

    code
}

/// Canonical form of user input: trimmed and upper-cased
pub fn normalize_code(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

/// Check the `DR` + 6 alphanumeric shape; input must already be normalized
pub fn is_valid_referral_code(code: &str) -> bool {
    CODE_PATTERN.is_match(code)
}
