//! Opaque tokens, numeric one-time codes, and their at-rest digests.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Cryptographically random opaque token: 32 bytes, hex encoded.
/// Sent to the user out of band; only its digest is stored.
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 32] = rng.gen();
    hex::encode(token_bytes)
}

/// Numeric one-time code of exactly `digits` digits (no leading zero).
pub fn generate_otp(digits: u32) -> String {
    let mut rng = rand::thread_rng();
    let low = 10u32.pow(digits - 1);
    let high = 10u32.pow(digits);
    rng.gen_range(low..high).to_string()
}

/// Irreversible digest for storing one-time tokens at rest.
pub fn digest_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_64_hex_chars_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn otp_is_fixed_width_numeric() {
        for _ in 0..50 {
            let otp = generate_otp(6);
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn digest_is_stable_and_one_way() {
        let token = "abc123";
        assert_eq!(digest_token(token), digest_token(token));
        assert_ne!(digest_token(token), token);
        assert_ne!(digest_token(token), digest_token("abc124"));
        assert_eq!(digest_token(token).len(), 64);
    }
}
