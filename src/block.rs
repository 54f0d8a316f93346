//! Block driver and framing.
//!
//! Splits arbitrary input into independently-decodable blocks. Each block
//! is ROLZ-encoded into a token stream, Polar-coded into a bit-packed
//! payload, and framed with a tiny fixed header (spec §4.4, §6).

use std::io::{Read, Write};
use std::time::Instant;

use crate::polar::{self, Tables};
use crate::rolz;
use crate::{DYNERR, Error};

/// Maximum bytes of raw input read into one block.
pub const BLOCK_SIZE_IN: usize = 16_777_216;
/// A block whose serialized payload would reach or exceed this many bytes
/// is rejected on decode as malformed (spec §7).
pub const BLOCK_SIZE_OUT: usize = 18_000_000;

/// Number of raw low bits of a match index emitted outside the Polar code;
/// chosen so `BUCKET_ITEM_SIZE >> MATCHIDX_EXBIT < polar::SYMBOLS`.
const MATCHIDX_EXBIT: u32 = 4;
const MATCHIDX_EXBIT_MASK: u32 = 0x0f;

/// LSB-first bit accumulator used while packing Polar-coded tokens. Mirrors
/// the reference implementation's `code_buf`/`code_len` pair: bits from
/// several components of one token accumulate before the whole group is
/// flushed to bytes (spec §9).
struct BitWriter {
    out: Vec<u8>,
    acc: u64,
    len: u32,
}

impl BitWriter {
    fn new() -> Self {
        BitWriter { out: Vec::new(), acc: 0, len: 0 }
    }

    fn push_bits(&mut self, value: u32, len: u32) {
        self.acc += (value as u64) << self.len;
        self.len += len;
    }

    fn flush_bytes(&mut self) {
        while self.len >= 8 {
            self.out.push((self.acc & 0xff) as u8);
            self.acc >>= 8;
            self.len -= 8;
        }
    }

    /// Flush any remaining bits, zero-padded to the next byte boundary.
    fn finish(mut self) -> Vec<u8> {
        while self.len > 0 {
            self.out.push((self.acc & 0xff) as u8);
            self.acc >>= 8;
            self.len = self.len.saturating_sub(8);
        }
        self.out
    }
}

/// LSB-first bit reader with a 56-bit refill threshold, wide enough that a
/// full match token (`MAXLEN + MAXLEN + 4` bits) is always available after
/// one refill (spec §9).
struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    acc: u64,
    len: u32,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        BitReader { data, pos: 0, acc: 0, len: 0 }
    }

    fn refill(&mut self) {
        while self.pos < self.data.len() && self.len < 56 {
            self.acc |= (self.data[self.pos] as u64) << self.len;
            self.len += 8;
            self.pos += 1;
        }
    }

    fn peek(&self, bits: u32) -> usize {
        (self.acc & ((1u64 << bits) - 1)) as usize
    }

    fn consume(&mut self, bits: u32) {
        self.acc >>= bits;
        self.len -= bits;
    }
}

/// Count token frequencies for the two Polar alphabets: `F1` over every
/// token, `F2` over the high bits of each match index (spec §4.4).
fn build_histograms(tokens: &[u16]) -> ([u32; polar::SYMBOLS], [u32; polar::SYMBOLS]) {
    let mut f1 = [0u32; polar::SYMBOLS];
    let mut f2 = [0u32; polar::SYMBOLS];
    let mut i = 0;
    while i < tokens.len() {
        let t = tokens[i] as usize;
        f1[t] += 1;
        i += 1;
        if t >= 256 {
            let idx = tokens[i] as u32;
            f2[(idx >> MATCHIDX_EXBIT) as usize] += 1;
            i += 1;
        }
    }
    (f1, f2)
}

/// Serialize a token stream into the entropy payload described in spec §6:
/// two packed length tables followed by the bit-packed token stream.
fn encode_block_payload(tokens: &[u16]) -> Vec<u8> {
    let (f1, f2) = build_histograms(tokens);
    let t1 = Tables::from_freq(&f1);
    let t2 = Tables::from_freq(&f2);

    let mut payload = polar::pack_length_table(&t1.length);
    payload.extend(polar::pack_length_table(&t2.length));

    let mut bits = BitWriter::new();
    let mut i = 0;
    while i < tokens.len() {
        let t = tokens[i] as usize;
        bits.push_bits(t1.code[t], t1.length[t]);
        i += 1;
        if t >= 256 {
            let idx = tokens[i] as u32;
            i += 1;
            let hi = (idx >> MATCHIDX_EXBIT) as usize;
            bits.push_bits(t2.code[hi], t2.length[hi]);
            bits.push_bits(idx & MATCHIDX_EXBIT_MASK, MATCHIDX_EXBIT);
        }
        bits.flush_bytes();
    }
    payload.extend(bits.finish());
    payload
}

/// Inverse of [`encode_block_payload`]: rebuild the two decode tables from
/// the packed length tables, then bit-decode exactly `rlen` tokens.
fn decode_block_payload(payload: &[u8], rlen: usize) -> Result<Vec<u16>, Error> {
    if payload.len() < polar::SYMBOLS {
        return Err(Error::Truncated);
    }
    let (len_bytes, bitstream) = payload.split_at(polar::SYMBOLS);
    let (l1_bytes, l2_bytes) = len_bytes.split_at(polar::SYMBOLS / 2);

    let t1 = Tables::from_length(polar::unpack_length_table(l1_bytes));
    let t2 = Tables::from_length(polar::unpack_length_table(l2_bytes));
    let d1 = t1.decode_table();
    let d2 = t2.decode_table();

    let mut reader = BitReader::new(bitstream);
    let mut tokens = Vec::with_capacity(rlen);
    while tokens.len() < rlen {
        reader.refill();
        let (len, sym) = polar::split_decode_slot(d1[reader.peek(polar::MAXLEN)])
            .ok_or(Error::CorruptSymbol)?;
        reader.consume(len);
        tokens.push(sym as u16);

        if sym >= 256 {
            reader.refill();
            let (len2, sym2) = polar::split_decode_slot(d2[reader.peek(polar::MAXLEN)])
                .ok_or(Error::CorruptSymbol)?;
            reader.consume(len2);
            let raw = reader.peek(MATCHIDX_EXBIT) as u32;
            reader.consume(MATCHIDX_EXBIT);
            tokens.push(((sym2 << MATCHIDX_EXBIT) | raw) as u16);
        }
    }
    Ok(tokens)
}

/// Read up to `limit` bytes from `reader` into a freshly allocated buffer,
/// stopping early on EOF.
fn read_block<R: Read>(reader: &mut R, limit: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.take(limit as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

/// Read exactly `buf.len()` bytes unless EOF is hit immediately, returning
/// the number of bytes actually filled (so a caller can tell clean EOF
/// apart from a truncated header).
fn read_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn compress_with_block_size<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    block_size_in: usize,
) -> Result<(u64, u64), DYNERR> {
    let mut size_src = 0u64;
    let mut size_dst = 0u64;

    loop {
        let buf = read_block(reader, block_size_in)?;
        if buf.is_empty() {
            break;
        }

        let t0 = Instant::now();
        let tokens = rolz::encode(&buf);
        log::debug!("rolz encode: {} bytes -> {} tokens in {:?}", buf.len(), tokens.len(), t0.elapsed());

        let t1 = Instant::now();
        let payload = encode_block_payload(&tokens);
        log::debug!("polar encode: {} tokens -> {} payload bytes in {:?}", tokens.len(), payload.len(), t1.elapsed());

        writer.write_all(&(tokens.len() as u32).to_le_bytes())?;
        writer.write_all(&(payload.len() as u32).to_le_bytes())?;
        writer.write_all(&payload)?;

        size_src += buf.len() as u64;
        size_dst += (8 + payload.len()) as u64;
    }
    Ok((size_src, size_dst))
}

fn expand_with_max_out<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    block_size_out: usize,
) -> Result<(u64, u64), DYNERR> {
    let mut size_src = 0u64;
    let mut size_dst = 0u64;
    let mut header = [0u8; 8];

    loop {
        let n = read_or_eof(reader, &mut header)?;
        if n == 0 {
            break;
        }
        if n < 8 {
            return Err(Box::new(Error::Truncated));
        }
        let rlen = u32::from_le_bytes(header[0..4].try_into().unwrap()) as usize;
        let olen = u32::from_le_bytes(header[4..8].try_into().unwrap()) as usize;
        if olen >= block_size_out {
            return Err(Box::new(Error::PayloadTooLarge(olen as u32, block_size_out as u32)));
        }

        let mut payload = vec![0u8; olen];
        reader.read_exact(&mut payload).map_err(|_| Error::Truncated)?;

        let t0 = Instant::now();
        let tokens = decode_block_payload(&payload, rlen)?;
        log::debug!("polar decode: {} payload bytes -> {} tokens in {:?}", olen, tokens.len(), t0.elapsed());

        let t1 = Instant::now();
        let out = rolz::decode(&tokens).ok_or(Error::DanglingMatch)?;
        log::debug!("rolz decode: {} tokens -> {} bytes in {:?}", tokens.len(), out.len(), t1.elapsed());

        writer.write_all(&out)?;
        size_src += (8 + olen) as u64;
        size_dst += out.len() as u64;
    }
    Ok((size_src, size_dst))
}

/// Compress everything `reader` yields into a sequence of block frames,
/// written to `writer`. Returns `(bytes read, bytes written)`.
pub fn compress<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> Result<(u64, u64), DYNERR> {
    compress_with_block_size(reader, writer, BLOCK_SIZE_IN)
}

/// Expand a sequence of block frames from `reader` into `writer`. Returns
/// `(bytes read, bytes written)`.
pub fn expand<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> Result<(u64, u64), DYNERR> {
    expand_with_max_out(reader, writer, BLOCK_SIZE_OUT)
}

/// Convenience wrapper: compress an in-memory buffer into a fresh `Vec`.
pub fn compress_slice(data: &[u8]) -> Result<Vec<u8>, DYNERR> {
    let mut reader = std::io::Cursor::new(data);
    let mut out = Vec::new();
    compress(&mut reader, &mut out)?;
    Ok(out)
}

/// Convenience wrapper: expand an in-memory buffer into a fresh `Vec`.
pub fn expand_slice(data: &[u8]) -> Result<Vec<u8>, DYNERR> {
    let mut reader = std::io::Cursor::new(data);
    let mut out = Vec::new();
    expand(&mut reader, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Small block size so multi-block scenarios run in microseconds
    /// instead of requiring real 16 MiB buffers (spec §10.4).
    const TEST_BLOCK_SIZE_IN: usize = 4096;
    const TEST_BLOCK_SIZE_OUT: usize = 8192;

    fn roundtrip_small_blocks(data: &[u8]) -> Vec<u8> {
        let mut compressed = Vec::new();
        compress_with_block_size(&mut std::io::Cursor::new(data), &mut compressed, TEST_BLOCK_SIZE_IN)
            .expect("compress");
        let mut out = Vec::new();
        expand_with_max_out(&mut std::io::Cursor::new(&compressed[..]), &mut out, TEST_BLOCK_SIZE_OUT)
            .expect("expand");
        out
    }

    #[test]
    fn empty_input_produces_no_frames() {
        let compressed = compress_slice(&[]).unwrap();
        assert!(compressed.is_empty());
        let expanded = expand_slice(&compressed).unwrap();
        assert!(expanded.is_empty());
    }

    #[test]
    fn single_byte_is_one_block_with_rlen_one() {
        let compressed = compress_slice(b"A").unwrap();
        let rlen = u32::from_le_bytes(compressed[0..4].try_into().unwrap());
        assert_eq!(rlen, 1);
        let expanded = expand_slice(&compressed).unwrap();
        assert_eq!(expanded, b"A");
    }

    #[test]
    fn multi_block_input_round_trips() {
        let mut data = Vec::new();
        for i in 0..20_000u32 {
            data.extend_from_slice(&i.to_le_bytes());
        }
        let out = roundtrip_small_blocks(&data);
        assert_eq!(out, data);
    }

    #[test]
    fn production_constants_round_trip_a_modest_input() {
        // exercise the real BLOCK_SIZE_IN/BLOCK_SIZE_OUT constants directly
        // (not the shrunk test ones) with a modest input, so the production
        // chunking path is checked without a huge test fixture.
        let data = b"boundary check against the production block size".repeat(50);
        let compressed = compress_slice(&data).unwrap();
        let expanded = expand_slice(&compressed).unwrap();
        assert_eq!(expanded, data);
    }

    #[test]
    fn two_blocks_from_a_single_oversized_input() {
        // forces two block frames using the real 16 MiB constant so the
        // frame-boundary behavior is verified against the spec's own
        // block size, not just the shrunk test constant.
        let data = vec![7u8; BLOCK_SIZE_IN + 1];
        let compressed = compress_slice(&data).unwrap();
        // two frames means the header's rlen/olen pair appears twice;
        // just check round-trip, since counting frames would duplicate
        // the parsing logic under test.
        let expanded = expand_slice(&compressed).unwrap();
        assert_eq!(expanded, data);
    }

    #[test]
    fn truncating_the_final_frame_is_rejected() {
        let mut data = Vec::new();
        for i in 0..5000u32 {
            data.extend_from_slice(&i.to_le_bytes());
        }
        let mut compressed = Vec::new();
        compress_with_block_size(&mut std::io::Cursor::new(&data), &mut compressed, TEST_BLOCK_SIZE_IN).unwrap();
        compressed.truncate(compressed.len() - 1);
        let mut out = Vec::new();
        let result = expand_with_max_out(&mut std::io::Cursor::new(&compressed[..]), &mut out, TEST_BLOCK_SIZE_OUT);
        assert!(result.is_err());
    }

    #[test]
    fn corrupted_length_table_is_rejected_or_mismatches() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(100);
        let mut compressed = Vec::new();
        compress_with_block_size(&mut std::io::Cursor::new(&data), &mut compressed, TEST_BLOCK_SIZE_IN).unwrap();
        // flip a bit inside the first block's packed length table (right
        // after the 8-byte header).
        compressed[8] ^= 0x01;
        let mut out = Vec::new();
        let result = expand_with_max_out(&mut std::io::Cursor::new(&compressed[..]), &mut out, TEST_BLOCK_SIZE_OUT);
        match result {
            Err(_) => {}
            Ok(_) => assert_ne!(out, data, "corruption should not silently reproduce the original"),
        }
    }
}
