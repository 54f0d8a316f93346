//! Reduced-Offset Lempel-Ziv matcher: a per-context index over recently
//! seen positions ([`index`]) plus the encode/decode drivers that turn raw
//! bytes into match/literal tokens and back ([`codec`]).

pub mod codec;
pub mod index;

pub use codec::{decode, encode};
pub use index::{DecodeIndex, EncodeIndex, MATCH_MAXLEN, MATCH_MINLEN};
