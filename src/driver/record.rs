//! Record Module
//!
//! On-disk framing for the file driver: a fixed-width decimal UNIX expiry
//! timestamp immediately followed by the serialized payload.

use chrono::Utc;

/// Width of the textual expiry header in bytes
pub const TIMESTAMP_WIDTH: usize = 10;

/// Largest timestamp the header can represent (year 2286)
const MAX_TIMESTAMP: i64 = 9_999_999_999;

// == Timestamps ==
/// Returns the current UNIX timestamp in seconds.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Absolute expiry for an entry written now with the given TTL.
pub fn expires_at(ttl_minutes: i64) -> i64 {
    now_timestamp().saturating_add(ttl_minutes.saturating_mul(60))
}

// == Encode ==
/// Builds the full record buffer for `payload` expiring at `expires_at`.
pub fn encode_record(expires_at: i64, payload: &[u8]) -> Vec<u8> {
    let header = format!(
        "{:0width$}",
        expires_at.clamp(0, MAX_TIMESTAMP),
        width = TIMESTAMP_WIDTH
    );

    let mut buf = Vec::with_capacity(TIMESTAMP_WIDTH + payload.len());
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(payload);
    buf
}

// == Decode ==
/// Splits a record into its expiry timestamp and payload.
///
/// Returns `None` for a corrupt record: shorter than the header or with a
/// header that is not all ASCII digits.
pub fn decode_record(bytes: &[u8]) -> Option<(i64, &[u8])> {
    if bytes.len() < TIMESTAMP_WIDTH {
        return None;
    }

    let (header, payload) = bytes.split_at(TIMESTAMP_WIDTH);
    if !header.iter().all(u8::is_ascii_digit) {
        return None;
    }

    // all digits, so both conversions are infallible
    let expires_at = std::str::from_utf8(header).ok()?.parse().ok()?;
    Some((expires_at, payload))
}

/// An entry is expired once the current time reaches its expiry.
pub fn is_expired(expires_at: i64) -> bool {
    now_timestamp() >= expires_at
}
