//! Supporting infrastructure.
//!
//! Bounds-checked byte and bit-field getters, the bit cursor used by the
//! codec header parsers, and the error types.

pub mod bitstream_io;
pub mod bytes;
pub mod errors;
