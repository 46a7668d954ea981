// src/utils/access_code.rs

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;

use crate::config::ACCESS_CODE_LENGTH;

/// Uppercase letters and digits without the look-alikes (0/O, 1/I).
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

static CODE_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{6}$").expect("access code regex"));

/// Produces a random access code. Uniqueness is the caller's job.
pub fn generate_access_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ACCESS_CODE_LENGTH)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Validates a teacher-supplied code and returns its stored (uppercase) form.
pub fn normalize_access_code(input: &str) -> Option<String> {
    let trimmed = input.trim();
    CODE_FORMAT
        .is_match(trimmed)
        .then(|| trimmed.to_ascii_uppercase())
}

/// Case-insensitive comparison of a presented code against the stored one.
pub fn codes_match(stored: &str, provided: &str) -> bool {
    stored.trim().eq_ignore_ascii_case(provided.trim())
}
