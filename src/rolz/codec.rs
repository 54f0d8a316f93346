//! ROLZ encode/decode: turns raw bytes into the 16-bit literal/match token
//! stream and back, driving an [`EncodeIndex`]/[`DecodeIndex`] in lockstep.

use super::index::{DecodeIndex, EncodeIndex, MATCH_MAXLEN, MATCH_MINLEN};

/// Encode `buf` into the intermediate token stream.
///
/// Tokens `< 256` are literal bytes. A token `>= 256` is a match length
/// marker (`256 + match_len - MATCH_MINLEN`) immediately followed by a
/// second token holding the match's ring index.
pub fn encode(buf: &[u8]) -> Vec<u16> {
    let mut out = Vec::with_capacity(buf.len());
    if buf.is_empty() {
        return out;
    }

    let mut index = EncodeIndex::new();
    let mut p = 0usize;

    // first byte: no context exists yet, always a literal.
    out.push(buf[0] as u16);
    p += 1;

    while p + MATCH_MAXLEN < buf.len() {
        match index.find_match(buf, p) {
            Some((match_idx, match_len)) => {
                out.push((256 + match_len - MATCH_MINLEN) as u16);
                out.push(match_idx as u16);
                index.update(buf, p);
                p += match_len;
            }
            None => {
                out.push(buf[p] as u16);
                index.update(buf, p);
                p += 1;
            }
        }
    }

    // tail: emit the remainder as literals, no further index updates, so
    // the decoder's symmetric tail loop never calls update either.
    while p < buf.len() {
        out.push(buf[p] as u16);
        p += 1;
    }

    out
}

/// Decode a token stream produced by [`encode`] back into the original
/// bytes. Returns `None` if a match token resolves to a position that has
/// not been written yet (a malformed or truncated stream).
pub fn decode(tokens: &[u16]) -> Option<Vec<u8>> {
    let mut out: Vec<u8> = Vec::with_capacity(tokens.len());
    let mut index = DecodeIndex::new();
    let mut i = 0usize;

    while i < tokens.len() {
        let t = tokens[i] as usize;
        i += 1;

        if t < 256 {
            out.push(t as u8);
            let pos = out.len() - 1;
            if pos >= 1 {
                index.update(&out, pos);
            }
        } else {
            let match_idx = *tokens.get(i)? as usize;
            i += 1;
            let match_len = t - 256 + MATCH_MINLEN;

            let pos = out.len();
            if pos == 0 {
                // the first output byte is always a literal (see encode);
                // a match token here means the stream is corrupt.
                return None;
            }
            let match_abs = index.resolve(&out, pos, match_idx);
            if match_abs >= pos {
                return None;
            }
            let match_offset = pos - match_abs;
            index.update(&out, pos);

            for _ in 0..match_len {
                let src = out.len() - match_offset;
                let b = out[src];
                out.push(b);
            }
        }
    }

    Some(out)
}
