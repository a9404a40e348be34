//! Family invite codes.
//!
//! Codes look like `K7M-Q2X-PRT`: three groups of three characters drawn
//! from an alphabet without look-alike glyphs (0/O, 1/I). Codes are
//! compared after normalisation, so `k7m-q2x-prt` and `k7mq2xprt` join
//! the same family.

use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use thiserror::Error;

/// Characters used in invite codes.
pub const INVITE_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

const SEGMENT_LEN: usize = 3;
const SEGMENTS: usize = 3;

lazy_static! {
    static ref INVITE_CODE_RE: Regex =
        Regex::new(r"^[ABCDEFGHJKLMNPQRSTUVWXYZ23456789]{9}$").expect("valid invite code regex");
}

/// A submitted code did not resolve to a family.
///
/// Malformed and unknown codes share this one error so callers cannot
/// distinguish them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid invite code")]
pub struct InvalidInviteCode;

/// Generates a fresh invite code.
pub fn generate_invite_code() -> String {
    let mut rng = rand::thread_rng();

    (0..SEGMENTS)
        .map(|_| {
            (0..SEGMENT_LEN)
                .map(|_| INVITE_CODE_ALPHABET[rng.gen_range(0..INVITE_CODE_ALPHABET.len())] as char)
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Brings a user-typed code into canonical `XXX-XXX-XXX` form.
///
/// Whitespace and dashes are ignored and letters are uppercased.
pub fn normalize_invite_code(input: &str) -> Result<String, InvalidInviteCode> {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_uppercase)
        .collect();

    if !INVITE_CODE_RE.is_match(&compact) {
        return Err(InvalidInviteCode);
    }

    Ok(format!(
        "{}-{}-{}",
        &compact[0..3],
        &compact[3..6],
        &compact[6..9]
    ))
}
