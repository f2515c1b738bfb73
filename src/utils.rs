use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Hex-encoded random bytes from the OS generator.
pub fn random_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Random string drawn uniformly enough from `alphabet` for one-time secrets.
pub fn random_string(alphabet: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| {
            let idx = (OsRng.next_u32() as usize) % alphabet.len();
            alphabet[idx] as char
        })
        .collect()
}

/// Trims, drops control characters and angle brackets from free-text input.
pub fn sanitize_text(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !c.is_control() && *c != '<' && *c != '>')
        .collect()
}

pub fn sanitize_email(input: &str) -> String {
    sanitize_text(input).to_lowercase()
}
