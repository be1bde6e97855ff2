//! One-time codes and tracking tokens.

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};

use super::error::SignupError;

/// Code alphabet without look-alike characters (`I`, `O`, `0`, `1`).
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const CODE_LENGTH: usize = 6;

const TRACKING_TOKEN_BYTES: usize = 32;

/// Generate a one-time verification code from the OS CSPRNG.
///
/// Bytes outside the largest multiple of the alphabet size are rejected so every
/// symbol is equally likely.
///
/// # Errors
/// Returns `SignupError::RandomSource` if the OS entropy source fails.
pub fn generate_code() -> Result<String, SignupError> {
    // Alphabet length always fits in a byte.
    let zone = 256 - (256 % CODE_ALPHABET.len());
    let mut code = String::with_capacity(CODE_LENGTH);
    let mut buf = [0u8; CODE_LENGTH * 2];

    while code.len() < CODE_LENGTH {
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(SignupError::RandomSource)?;

        for byte in buf {
            if usize::from(byte) >= zone {
                continue;
            }
            code.push(char::from(
                CODE_ALPHABET[usize::from(byte) % CODE_ALPHABET.len()],
            ));
            if code.len() == CODE_LENGTH {
                break;
            }
        }
    }

    Ok(code)
}

/// Generate an opaque, URL-safe tracking token (32 random bytes, 43 characters).
///
/// # Errors
/// Returns `SignupError::RandomSource` if the OS entropy source fails.
pub fn generate_tracking_token() -> Result<String, SignupError> {
    let mut bytes = [0u8; TRACKING_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(SignupError::RandomSource)?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Normalize a submitted code: trim surrounding whitespace and uppercase.
///
/// # Errors
/// Returns `SignupError::InvalidInput` unless the result is exactly 6 characters.
pub fn normalize_code(raw: &str) -> Result<String, SignupError> {
    let code = raw.trim().to_uppercase();
    if code.chars().count() != CODE_LENGTH {
        return Err(SignupError::invalid_input("Invalid verification code"));
    }
    Ok(code)
}
