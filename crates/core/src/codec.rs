// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

//! The stored-value framing shared by every adapter: a 16-byte
//! `(term, cmd)` header followed by the payload. The in-store framing
//! uses native byte order per adapter, since it is a private detail of
//! the adapter — the binary export codec (`kvidxkit::export`) re-encodes
//! little-endian at the boundary for portability.

pub const HEADER_LEN: usize = 16;

/// Packs `(term, cmd, payload)` into a single framed value ready to hand to
/// an adapter's raw put.
pub fn encode_value(term: u64, cmd: u64, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&term.to_ne_bytes());
    out.extend_from_slice(&cmd.to_ne_bytes());
    out.extend_from_slice(payload);
    out
}

/// Unpacks a framed value. A buffer shorter than [`HEADER_LEN`] is malformed
/// and decodes as `term=0, cmd=0, payload=empty`.
pub fn decode_value(raw: &[u8]) -> (u64, u64, &[u8]) {
    if raw.len() < HEADER_LEN {
        return (0, 0, &[]);
    }
    let term = u64::from_ne_bytes(raw[0..8].try_into().expect("8-byte slice"));
    let cmd = u64::from_ne_bytes(raw[8..16].try_into().expect("8-byte slice"));
    (term, cmd, &raw[HEADER_LEN..])
}

/// Replaces just the payload of an already-framed value, preserving its
/// `term`/`cmd` header. Used by `append`/`prepend`/`set_value_range`,
/// which must not disturb the record's existing metadata.
pub fn reframe_payload(raw: &[u8], new_payload: &[u8]) -> Vec<u8> {
    let (term, cmd, _) = decode_value(raw);
    encode_value(term, cmd, new_payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_header_and_payload() {
        let framed = encode_value(7, 9, b"hello");
        let (term, cmd, payload) = decode_value(&framed);
        assert_eq!(term, 7);
        assert_eq!(cmd, 9);
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn empty_payload_keeps_header_only() {
        let framed = encode_value(1, 2, b"");
        assert_eq!(framed.len(), HEADER_LEN);
        let (term, cmd, payload) = decode_value(&framed);
        assert_eq!((term, cmd), (1, 2));
        assert!(payload.is_empty());
    }

    #[test]
    fn malformed_short_buffer_decodes_as_zeroed() {
        let (term, cmd, payload) = decode_value(&[1, 2, 3]);
        assert_eq!((term, cmd), (0, 0));
        assert!(payload.is_empty());
    }

    #[test]
    fn reframe_preserves_header() {
        let framed = encode_value(5, 6, b"old");
        let reframed = reframe_payload(&framed, b"new-payload");
        let (term, cmd, payload) = decode_value(&reframed);
        assert_eq!((term, cmd), (5, 6));
        assert_eq!(payload, b"new-payload");
    }
}
