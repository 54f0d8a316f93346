//! # rolzip
//!
//! Lossless, general-purpose byte-stream compression combining a
//! reduced-offset Lempel-Ziv matcher ([`rolz`]) with a length-limited
//! prefix entropy coder ([`polar`]), framed into independently decodable
//! blocks ([`block`]).
//!
//! The block driver is generic over `Read`/`Write`, with convenience
//! functions for working directly on in-memory buffers.
//!
//! ## File Example
//!
//! ```rs
//! use rolzip::block;
//! let mut in_file = std::fs::File::open("some_input_path").expect("open failed");
//! let mut out_file = std::fs::File::create("some_output_path").expect("create failed");
//! let (in_size, out_size) = block::compress(&mut in_file, &mut out_file).expect("compression failed");
//! eprintln!("compressed {} into {}", in_size, out_size);
//! ```
//!
//! ## Buffer Example
//!
//! ```rs
//! use rolzip::block;
//! let test_data = "This is the chaunt of the priests.  The chaunt of the priests of Mung.".as_bytes();
//! let compressed = block::compress_slice(test_data).expect("compression failed");
//! ```

mod tools;
pub mod block;
pub mod polar;
pub mod rolz;

/// Boxed trait-object error, used by the generic `Read`/`Write` driver
/// functions so callers aren't tied to [`Error`] specifically.
pub type DYNERR = Box<dyn std::error::Error>;
pub type STDRESULT = Result<(), DYNERR>;

/// Errors produced while expanding a malformed or truncated block stream.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("block payload is {0} bytes, at or beyond the {1} byte limit")]
    PayloadTooLarge(u32, u32),
    #[error("block frame is truncated")]
    Truncated,
    #[error("bitstream decoded to an invalid symbol")]
    CorruptSymbol,
    #[error("match token resolved to a position that has not been written yet")]
    DanglingMatch,
}
