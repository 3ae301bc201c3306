//! Session id generation (spec.md §6): a monotonic, human-readable string
//! attached to every `api_call_log` row for one engine lifetime.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Encodes a hash digest as a base36 string of exactly `length` characters,
/// keeping the least-significant digits on truncation. Shares its algorithm
/// with the teacher's content-hash id generator, swapping `num-bigint` for a
/// plain big-endian byte accumulator since we only need a handful of
/// characters here.
fn encode_base36(data: &[u8], length: usize) -> String {
    // Treat `data` as a big-endian number using a simple byte-wise
    // divide-by-36 loop; `data` is a 32-byte SHA-256 digest so this is cheap.
    let mut digits = data.to_vec();
    let mut chars = Vec::with_capacity(length);

    while digits.iter().any(|&b| b != 0) {
        let mut remainder: u32 = 0;
        for byte in digits.iter_mut() {
            let acc = remainder * 256 + *byte as u32;
            *byte = (acc / 36) as u8;
            remainder = acc % 36;
        }
        chars.push(BASE36_ALPHABET[remainder as usize]);
    }

    chars.reverse();
    let mut s = String::from_utf8(chars).expect("base36 alphabet is ASCII");
    if s.len() < length {
        s = "0".repeat(length - s.len()) + &s;
    }
    if s.len() > length {
        s = s[s.len() - length..].to_string();
    }
    s
}

/// Generates a session id `YYYYMMDD_HHMMSS_{base36-random}` (spec.md §6).
///
/// The "random" suffix is a hash of the timestamp and `entropy` (the caller
/// supplies something like the process id or an in-memory counter) rather
/// than an RNG, keeping this crate free of a `rand` dependency the rest of
/// the teacher's stack never pulls in.
pub fn generate_session_id(now: DateTime<Utc>, entropy: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(now.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
    hasher.update(entropy.to_be_bytes());
    let digest = hasher.finalize();
    let suffix = encode_base36(&digest, 8);
    format!("{}_{}", now.format("%Y%m%d_%H%M%S"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn session_id_has_expected_shape() {
        let now = Utc.with_ymd_and_hms(2026, 7, 26, 9, 30, 0).unwrap();
        let id = generate_session_id(now, 42);
        assert!(id.starts_with("20260726_093000_"));
        let suffix = id.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn different_entropy_yields_different_ids() {
        let now = Utc.with_ymd_and_hms(2026, 7, 26, 9, 30, 0).unwrap();
        assert_ne!(generate_session_id(now, 1), generate_session_id(now, 2));
    }
}
