//! Per-context ROLZ bucket index.
//!
//! One bucket per possible value of the byte immediately preceding the
//! position being indexed ("context"). Each bucket is a fixed-capacity
//! ring of recently seen positions, chained by a short context hash so a
//! match search only has to walk the handful of slots that plausibly start
//! with the same few bytes.
//!
//! reference: <http://www.ezcodesample.com/rolz/rolz_article.html>

use crate::tools::ring_buffer::RingBuffer;

/// Ring capacity per bucket. A `match_idx` is a distance within this ring.
pub const BUCKET_ITEM_SIZE: usize = 3600;
/// Size of the per-bucket context-hash table.
const BUCKET_ITEM_HASH: usize = 1024;
/// Ring distances at or beyond this value are penalized (cost more bits to
/// encode), so the matcher demands one extra byte of match length.
pub const MATCH_DISCARD_MINLEN: usize = 1300;
/// Maximum number of chain probes per match search.
const MATCH_MAXTRY: usize = 8;
/// Minimum match length worth encoding as a match token at all.
pub const MATCH_MINLEN: usize = 4;
/// Largest length representable by the 384-symbol alphabet
/// (`MATCH_MINLEN + (polar::SYMBOLS - 256) - 1`).
pub const MATCH_MAXLEN: usize = MATCH_MINLEN + (crate::polar::SYMBOLS - 256) - 1;

/// Context hash used to key the per-bucket chain: a cheap rolling hash of
/// the four bytes starting at the position being indexed.
#[inline]
fn hash_context(b: &[u8]) -> usize {
    (b[0] as usize * 31337 + b[1] as usize * 3337 + b[2] as usize * 337 + b[3] as usize)
        % BUCKET_ITEM_HASH
}

/// Secondary hash used to fast-reject candidate slots before doing a full
/// byte-by-byte comparison.
#[inline]
fn hash_check(b: &[u8]) -> u32 {
    (b[0] as u32 * 11337 + b[1] as u32 * 1337 + b[2] as u32) & 0xff
}

fn pack_offset(pos: usize, check: u32) -> u32 {
    pos as u32 | (check << 24)
}

fn unpack_offset(packed: u32) -> (usize, u32) {
    ((packed & 0x00ff_ffff) as usize, packed >> 24)
}

/// Longest common prefix of `a` and `b`, capped at `max`.
fn common_prefix_len(a: &[u8], b: &[u8], max: usize) -> usize {
    let mut k = 0;
    while k < max && a[k] == b[k] {
        k += 1;
    }
    k
}

/// One encoder-side bucket: a ring of packed `(position, hash_check)`
/// entries plus the intra-bucket hash chain used to find them.
struct EncodeBucket {
    offset: RingBuffer<u32>,
    suffix: Vec<u16>,
    hash: Vec<u16>,
}

impl EncodeBucket {
    fn new() -> Self {
        EncodeBucket {
            offset: RingBuffer::create(0, BUCKET_ITEM_SIZE),
            suffix: vec![0u16; BUCKET_ITEM_SIZE],
            hash: vec![0u16; BUCKET_ITEM_HASH],
        }
    }
}

/// The full encoder-side index: 256 buckets, one per context byte.
pub struct EncodeIndex {
    buckets: Vec<EncodeBucket>,
}

impl EncodeIndex {
    pub fn new() -> Self {
        EncodeIndex {
            buckets: (0..256).map(|_| EncodeBucket::new()).collect(),
        }
    }

    /// Insert position `p` into the bucket keyed by `buf[p - 1]`. Requires
    /// `p >= 1` and at least 4 bytes of lookahead at `p`.
    pub fn update(&mut self, buf: &[u8], p: usize) {
        let ctx = buf[p - 1] as usize;
        let h = hash_context(&buf[p..]);
        let check = hash_check(&buf[p..]);
        let bucket = &mut self.buckets[ctx];

        bucket.offset.advance();
        let head = bucket.offset.get_pos(0);
        bucket.suffix[head] = bucket.hash[h];
        bucket.offset.set(0, pack_offset(p, check));
        bucket.hash[h] = head as u16;
    }

    /// Search for a match at position `p`, returning `(match_idx,
    /// match_len)` when the acceptance rule of the ROLZ matcher is
    /// satisfied. Requires `p >= 1` and at least `MATCH_MAXLEN` bytes of
    /// lookahead at `p`.
    pub fn find_match(&self, buf: &[u8], p: usize) -> Option<(usize, usize)> {
        let ctx = buf[p - 1] as usize;
        let bucket = &self.buckets[ctx];
        let check = hash_check(&buf[p..]);

        let mut maxlen = MATCH_MINLEN - 1;
        let mut maxidx = 0usize;
        let mut node = bucket.hash[hash_context(&buf[p..])] as usize;

        for _ in 0..MATCH_MAXTRY {
            let (offset, slot_check) = unpack_offset(bucket.offset.get_abs(node));

            if slot_check == check && buf[p + maxlen] == buf[offset + maxlen] {
                let len = common_prefix_len(&buf[p..], &buf[offset..], MATCH_MAXLEN);
                if len > maxlen {
                    maxlen = len;
                    maxidx = bucket.offset.distance_behind(node);
                    if maxlen == MATCH_MAXLEN {
                        break;
                    }
                }
            }

            let suffix_node = bucket.suffix[node] as usize;
            let (suffix_offset, _) = unpack_offset(bucket.offset.get_abs(suffix_node));
            if offset <= suffix_offset {
                break;
            }
            node = suffix_node;
        }

        let required = MATCH_MINLEN + usize::from(maxidx >= MATCH_DISCARD_MINLEN);
        if maxlen >= required {
            Some((maxidx, maxlen))
        } else {
            None
        }
    }
}

impl Default for EncodeIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// One decoder-side bucket: just the position ring, no hash chain.
struct DecodeBucket {
    offset: RingBuffer<u32>,
}

impl DecodeBucket {
    fn new() -> Self {
        DecodeBucket {
            offset: RingBuffer::create(0, BUCKET_ITEM_SIZE),
        }
    }
}

/// The decoder-side mirror of [`EncodeIndex`]. Kept in lockstep with the
/// encoder's bucket updates so a `match_idx` resolves to the same absolute
/// position on both sides.
pub struct DecodeIndex {
    buckets: Vec<DecodeBucket>,
}

impl DecodeIndex {
    pub fn new() -> Self {
        DecodeIndex {
            buckets: (0..256).map(|_| DecodeBucket::new()).collect(),
        }
    }

    /// Insert the just-written output position `p` into the bucket keyed
    /// by `out[p - 1]`. Requires `p >= 1`.
    pub fn update(&mut self, out: &[u8], p: usize) {
        let ctx = out[p - 1] as usize;
        let bucket = &mut self.buckets[ctx];
        bucket.offset.advance();
        bucket.offset.set(0, p as u32);
    }

    /// Resolve a `match_idx` relative to the current output position `p`
    /// (context `out[p - 1]`) back to an absolute position.
    pub fn resolve(&self, out: &[u8], p: usize, match_idx: usize) -> usize {
        let ctx = out[p - 1] as usize;
        self.buckets[ctx].offset.get(-(match_idx as i64)) as usize
    }
}

impl Default for DecodeIndex {
    fn default() -> Self {
        Self::new()
    }
}
