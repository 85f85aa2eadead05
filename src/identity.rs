//! The identity tag codec.
//!
//! An internal `u64` id is injected into a backend's property map under a
//! reserved key so that a backend which preserves unknown properties across
//! its own rename operations lets the dispatcher re-discover the entity
//! afterward (the "import" protocol in `dispatcher.rs`).

use std::collections::HashMap;

use tracing::warn;

/// Reserved property key carrying the identity tag. Backends must not
/// expose this key to end users; the combined-view builder strips it.
pub const IDENTITY_TAG_KEY: &str = "dispatcher.internal.identifier";

/// Encodes `id` as a string. Base36 keeps the encoding short, URL-safe, and
/// injective over `u64` without pulling in a base64 dependency for a single
/// integer.
pub fn encode(id: u64) -> String {
    to_base36(id)
}

/// Inverse of [`encode`]. Malformed input is treated as absent, never as a
/// hard failure — a corrupted tag must not take down an otherwise-healthy
/// load.
pub fn decode(s: &str) -> Option<u64> {
    match from_base36(s) {
        Some(id) => Some(id),
        None => {
            warn!(raw = %s, "malformed identity tag, treating as absent");
            None
        }
    }
}

/// Returns a copy of `props` with the identity tag bound to `encode(id)`.
/// If the key was already present with a different value, the new value
/// wins — this is only ever called on the creation path, where the tag is
/// being established for the first time.
pub fn inject_into(props: &HashMap<String, String>, id: u64) -> HashMap<String, String> {
    let mut props = props.clone();
    props.insert(IDENTITY_TAG_KEY.to_string(), encode(id));
    props
}

/// Reads and decodes the reserved key from `props`, if present.
pub fn extract(props: &HashMap<String, String>) -> Option<u64> {
    props.get(IDENTITY_TAG_KEY).and_then(|s| decode(s))
}

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(ALPHABET[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).expect("base36 alphabet is ASCII")
}

fn from_base36(s: &str) -> Option<u64> {
    if s.is_empty() {
        return None;
    }
    let mut n: u64 = 0;
    for c in s.chars() {
        let digit = c.to_digit(36)?;
        n = n.checked_mul(36)?.checked_add(digit as u64)?;
    }
    Some(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_ids() {
        for id in [0u64, 1, 35, 36, 42, 99, u64::MAX] {
            assert_eq!(decode(&encode(id)), Some(id));
        }
    }

    #[test]
    fn extract_of_inject_into_is_the_identity_for_maps_without_the_key() {
        let props: HashMap<String, String> = [("k".to_string(), "v".to_string())].into();
        for id in [0u64, 42, 99, u64::MAX] {
            let injected = inject_into(&props, id);
            assert_eq!(extract(&injected), Some(id));
            assert_eq!(injected.get("k"), Some(&"v".to_string()));
        }
    }

    #[test]
    fn malformed_tag_decodes_to_none() {
        assert_eq!(decode(""), None);
        assert_eq!(decode("!!not-base36!!"), None);
    }

    #[test]
    fn inject_overwrites_an_existing_tag() {
        let mut props = HashMap::new();
        props.insert(IDENTITY_TAG_KEY.to_string(), encode(1));
        let injected = inject_into(&props, 2);
        assert_eq!(extract(&injected), Some(2));
    }
}
