//! The deterministic HMAC-SHA256 keystream that every game evaluator reads
//! from. A 32-byte block is produced per `(serverSeed, clientSeed, nonce,
//! round)`; floats are decoded 4 bytes at a time and never depend on host
//! endianness, since we index bytes by position rather than reinterpreting
//! them as an integer.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const BLOCK_LEN: u64 = 32;

/// Byte offset into the keystream, decomposed into `(round, position)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub round: u64,
    pub position: usize,
}

impl Cursor {
    pub fn from_offset(offset: u64) -> Self {
        Self {
            round: offset / BLOCK_LEN,
            position: (offset % BLOCK_LEN) as usize,
        }
    }
}

fn block(server_seed: &[u8], client_seed: &str, nonce: u64, round: u64) -> [u8; 32] {
    // The server seed is keyed exactly as the raw ASCII bytes of the string.
    // It must never be hex-decoded, even when it looks like hex: decoding it
    // would silently change the key and break parity with every other
    // provably-fair implementation of this scheme.
    let mut mac = HmacSha256::new_from_slice(server_seed).expect("HMAC accepts any key length");
    mac.update(format!("{client_seed}:{nonce}:{round}").as_bytes());
    mac.finalize().into_bytes().into()
}

/// Stateful reader over the keystream for one `(serverSeed, clientSeed,
/// nonce)` triple. Rotates its 32-byte block lazily as the cursor advances,
/// so sequential `next_float` calls never re-derive a block twice.
pub struct FloatStream<'a> {
    server_seed: &'a [u8],
    client_seed: &'a str,
    nonce: u64,
    cursor: u64,
    cached_round: Option<(u64, [u8; 32])>,
}

impl<'a> FloatStream<'a> {
    pub fn new(server_seed: &'a [u8], client_seed: &'a str, nonce: u64, cursor: u64) -> Self {
        Self {
            server_seed,
            client_seed,
            nonce,
            cursor,
            cached_round: None,
        }
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    fn byte_at(&mut self, offset: u64) -> u8 {
        let c = Cursor::from_offset(offset);
        let needs_refresh = match self.cached_round {
            Some((round, _)) => round != c.round,
            None => true,
        };
        if needs_refresh {
            let blk = block(self.server_seed, self.client_seed, self.nonce, c.round);
            self.cached_round = Some((c.round, blk));
        }
        self.cached_round.unwrap().1[c.position]
    }

    pub fn next_byte(&mut self) -> u8 {
        let b = self.byte_at(self.cursor);
        self.cursor += 1;
        b
    }

    /// Consumes exactly four sequential keystream bytes. The bytes may
    /// straddle a 32-byte round boundary; each is still fetched in order,
    /// so straddling is transparent to the caller.
    pub fn next_float(&mut self) -> f64 {
        let b0 = self.next_byte() as f64;
        let b1 = self.next_byte() as f64;
        let b2 = self.next_byte() as f64;
        let b3 = self.next_byte() as f64;
        b0 / 256.0 + b1 / 256.0f64.powi(2) + b2 / 256.0f64.powi(3) + b3 / 256.0f64.powi(4)
    }
}

/// Allocating convenience wrapper: `count` floats starting at `cursor`.
pub fn floats(
    server_seed: &[u8],
    client_seed: &str,
    nonce: u64,
    cursor: u64,
    count: i64,
) -> crate::error::Result<Vec<f64>> {
    if count < 0 {
        return Err(crate::error::ReplayError::validation(
            "VALIDATION_ERROR",
            "count must be non-negative",
        ));
    }
    let count = count as usize;
    let mut out = Vec::with_capacity(count);
    fill_floats(server_seed, client_seed, nonce, cursor, &mut out, count);
    Ok(out)
}

/// Allocation-free variant: writes directly into a pre-sized buffer. Used by
/// the scan engine's hot loop, which reuses one buffer per worker across all
/// nonces in its segment.
pub fn fill_buf(
    server_seed: &[u8],
    client_seed: &str,
    nonce: u64,
    cursor: u64,
    buf: &mut [f64],
) -> crate::error::Result<()> {
    if buf.is_empty() {
        return Err(crate::error::ReplayError::domain(
            "INVALID_PARAMS",
            "fill_buf requires a non-empty buffer",
        ));
    }
    let mut stream = FloatStream::new(server_seed, client_seed, nonce, cursor);
    for slot in buf.iter_mut() {
        *slot = stream.next_float();
    }
    Ok(())
}

fn fill_floats(
    server_seed: &[u8],
    client_seed: &str,
    nonce: u64,
    cursor: u64,
    out: &mut Vec<f64>,
    count: usize,
) {
    let mut stream = FloatStream::new(server_seed, client_seed, nonce, cursor);
    for _ in 0..count {
        out.push(stream.next_float());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &[u8] = b"fb30c5e2bbd8537b76c6df8e8e86533121cbeeae0bda9d306117147e656ad46e";
    const CLIENT: &str = "56e27fed-ece3-4279-ab56-96f71fe9b2ee";

    #[test]
    fn floats_are_in_range() {
        let out = floats(SEED, CLIENT, 1, 0, 8).unwrap();
        assert_eq!(out.len(), 8);
        for f in out {
            assert!((0.0..1.0).contains(&f));
        }
    }

    #[test]
    fn batch_matches_single_float_calls() {
        let batch = floats(SEED, CLIENT, 1, 0, 16).unwrap();
        for (i, expected) in batch.iter().enumerate() {
            let single = floats(SEED, CLIENT, 1, (i as u64) * 4, 1).unwrap();
            assert_eq!(single[0], *expected, "index {i} diverged");
        }
    }

    #[test]
    fn straddling_boundary_matches_sequential_reads() {
        // cursor = 31, count = 2 straddles round 0 / round 1.
        let straddled = floats(SEED, CLIENT, 1, 31, 2).unwrap();
        let mut stream = FloatStream::new(SEED, CLIENT, 1, 31);
        let sequential = [stream.next_float(), stream.next_float()];
        assert_eq!(straddled, sequential);
    }

    #[test]
    fn same_inputs_are_bit_exact_across_calls() {
        let a = floats(SEED, CLIENT, 42, 0, 32).unwrap();
        let b = floats(SEED, CLIENT, 42, 0, 32).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn negative_count_is_invalid_argument() {
        let err = floats(SEED, CLIENT, 1, 0, -1).unwrap_err();
        assert_eq!(err.kind, crate::error::Kind::Validation);
    }

    #[test]
    fn fill_buf_rejects_an_empty_buffer() {
        let err = fill_buf(SEED, CLIENT, 1, 0, &mut []).unwrap_err();
        assert_eq!(err.kind, crate::error::Kind::Domain);
    }

    #[test]
    fn server_seed_is_never_hex_decoded() {
        // A seed that looks like valid hex must still be keyed as its raw
        // ASCII bytes: decoding it would produce a different 16-byte key and
        // a completely different stream.
        let hex_looking = b"deadbeefdeadbeefdeadbeefdeadbeef";
        let raw = floats(hex_looking, CLIENT, 1, 0, 1).unwrap();
        let decoded = hex::decode(hex_looking).unwrap();
        let via_decoded = floats(&decoded, CLIENT, 1, 0, 1).unwrap();
        assert_ne!(raw, via_decoded);
    }
}
