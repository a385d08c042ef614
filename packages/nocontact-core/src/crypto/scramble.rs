//! # Scrambled Text
//!
//! A non-cryptographic stand-in for a message, shown to anyone who cannot
//! decrypt it. It keeps the shape of the original (length, spacing, case,
//! digits, punctuation) so the conversation layout stays readable while the
//! words do not.
//!
//! The same input always scrambles to the same output. Scrambled text is NOT
//! a secret-preserving transform and must never stand in for encryption.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";

/// Scramble `text`, keeping its shape
pub fn scramble(text: &str) -> String {
    let seed: [u8; 32] = Sha256::digest(text.as_bytes()).into();
    let mut rng = StdRng::from_seed(seed);

    text.chars()
        .map(|c| {
            let pool = if c.is_ascii_lowercase() {
                LOWER
            } else if c.is_ascii_uppercase() {
                UPPER
            } else if c.is_ascii_digit() {
                DIGITS
            } else if c.is_alphabetic() {
                // Non-ASCII letters collapse to ASCII of the same case
                if c.is_uppercase() {
                    UPPER
                } else {
                    LOWER
                }
            } else {
                return c;
            };
            pool[rng.gen_range(0..pool.len())] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scramble_is_deterministic() {
        assert_eq!(scramble("Hello, Bob!"), scramble("Hello, Bob!"));
    }

    #[test]
    fn test_scramble_keeps_shape() {
        let input = "Meet at 10:30, OK?";
        let out = scramble(input);

        assert_eq!(out.chars().count(), input.chars().count());
        for (a, b) in input.chars().zip(out.chars()) {
            assert_eq!(a.is_ascii_lowercase(), b.is_ascii_lowercase());
            assert_eq!(a.is_ascii_uppercase(), b.is_ascii_uppercase());
            assert_eq!(a.is_ascii_digit(), b.is_ascii_digit());
            if !a.is_alphanumeric() {
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn test_scramble_changes_words() {
        let input = "the quick brown fox jumps over the lazy dog";
        assert_ne!(scramble(input), input);
    }

    #[test]
    fn test_scramble_empty() {
        assert_eq!(scramble(""), "");
    }

    #[test]
    fn test_scramble_non_ascii_letters() {
        let out = scramble("Ünïcode");
        assert!(out.chars().next().unwrap().is_ascii_uppercase());
        assert_eq!(out.chars().count(), 7);
    }
}
