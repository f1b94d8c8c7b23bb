/// Read access to a disc and the BDMV directory layout.
///
/// Provides the [`DiscReader`](disc::DiscReader) trait and its filesystem
/// implementation [`FsDisc`](disc::FsDisc).
pub mod disc;

/// Clip information shared across playlist reads.
pub mod cache;

/// `.clpi` clip information parsing.
pub mod clpi;

/// `.mpls` playlist parsing and chapter derivation.
pub mod mpls;

/// Elementary stream analysis of BDAV transport streams.
///
/// Provides the [`M2tsParser`](m2ts::M2tsParser), which reads a bounded prefix
/// of a clip and returns a [`StreamMap`](crate::structs::ts_stream::StreamMap).
pub mod m2ts;

/// Combination of declared and analysed stream attributes.
pub mod reconcile;
