#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! A Blu-ray title is described by three kinds of files below `BDMV/`:
//!
//! - **Playlists** (`PLAYLIST/*.mpls`): ordered PlayItems referencing clips,
//!   SubPaths, the stream number table and playlist marks.
//! - **Clip information** (`CLIPINF/*.clpi`): the declared programs and
//!   streams of each clip, with coarse attribute classes.
//! - **Streams** (`STREAM/*.m2ts`): BDAV transport streams, 192-byte packets
//!   made of a 4-byte timestamp and a 188-byte TS packet.
//!
//! Declared attributes are coarse (a resolution class, a channel layout
//! class). Exact values come from codec headers inside the stream.
//!
//! ## Quick Start
//!
//! 1. Read a playlist with [`process::mpls::read_mpls`], sharing one
//!    [`process::cache::ClipCache`] across playlists of the same disc
//! 2. Analyse its main clip with [`process::m2ts::M2tsParser::get_streams`]
//! 3. Combine both with [`process::reconcile::convert_bluray_playlist_information`]
//!
//! ```rust,no_run
//! use bdmv::process::{
//!     cache::ClipCache, disc::FsDisc, m2ts::M2tsParser, mpls::read_mpls,
//!     reconcile::convert_bluray_playlist_information,
//! };
//!
//! let disc = FsDisc::new("/mnt/bluray");
//! let mut cache = ClipCache::new();
//!
//! let playlist = read_mpls(&disc, 800, &mut cache)?;
//! // The declared attributes are still usable when the stream cannot be read
//! let streams = M2tsParser::new()
//!     .get_streams(&disc, &playlist)
//!     .unwrap_or_default();
//!
//! let info = convert_bluray_playlist_information(&playlist, &streams);
//! for video in &info.video_streams {
//!     println!("{} {}x{} {}", video.codec, video.width, video.height, video.hdr_type);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Parsers for playlists, clip information and transport streams.
///
/// - **Disc access** ([`process::disc`]): File reader abstraction and paths
/// - **Clip cache** ([`process::cache`]): Parsed clips shared between playlists
/// - **CLPI** ([`process::clpi`]): Clip information files
/// - **MPLS** ([`process::mpls`]): Playlists, chapters and timings
/// - **M2TS** ([`process::m2ts`]): PAT/PMT demux and codec header analysis
/// - **Reconciler** ([`process::reconcile`]): App-facing playlist summary
pub mod process;

/// Data structures for navigation files and transport streams.
///
/// - **Codings** ([`structs::coding`]): Codec tags and attribute classes
/// - **Clips** ([`structs::clip`]): Declared programs and streams
/// - **Playlists** ([`structs::playlist`]): PlayItems, SubPaths, marks
/// - **Transport streams** ([`structs::ts_stream`]): Analysed stream parameters
/// - **Summary** ([`structs::summary`]): Reconciled playlist description
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Byte fields** ([`utils::bytes`]): Bounds-checked big-endian getters
/// - **Bitstream I/O** ([`utils::bitstream_io`]): Bit-level reading
/// - **Error Handling** ([`utils::errors`]): Error types
pub mod utils;
