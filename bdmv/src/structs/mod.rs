//! Data structures for Bluray navigation files and transport streams.
//!
//! Declared metadata from MPLS/CLPI, stream parameters recovered from the
//! M2TS payload, and the reconciled summary combining both.

pub mod clip;
pub mod coding;
pub mod playlist;
pub mod summary;
pub mod ts_stream;
