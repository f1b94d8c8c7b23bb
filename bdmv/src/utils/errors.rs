use std::path::PathBuf;

use nom::error::ErrorKind;

/// Any read that would step outside the supplied buffer.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    #[error("Read of {width} bytes at offset {offset} exceeds buffer of {len} bytes")]
    Bytes {
        offset: usize,
        width: usize,
        len: usize,
    },

    #[error("Read of {width} bits at bit {position} exceeds buffer of {len} bits")]
    Bits { position: u64, width: u32, len: u64 },

    #[error("Invalid bit field: {num_bits} bits ending at bit {first_bit} of a {field_width}-bit value")]
    BitField {
        first_bit: u32,
        num_bits: u32,
        field_width: u32,
    },

    #[error("Exp-Golomb code with {0} leading zero bits")]
    ExpGolomb(u32),

    #[error("{name} is {value}, at most {max} allowed")]
    SyntaxElement {
        name: &'static str,
        value: u32,
        max: u32,
    },

    #[error("Structure truncated, {needed} more bytes needed")]
    Truncated { needed: usize },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Invalid {kind} header. Read {found:?}")]
    InvalidMagic { kind: &'static str, found: String },

    #[error("Unsupported {kind} version {version:?}")]
    UnsupportedVersion { kind: &'static str, version: String },

    #[error("File too short: {len} bytes, header needs {min}")]
    TooShort { len: usize, min: usize },

    #[error("Invalid connection_condition. Read {0:#04X}")]
    InvalidConnectionCondition(u8),

    #[error("Invalid clip codec identifier {0:?}, expected M2TS or FMTS")]
    InvalidCodecId(String),

    #[error("Invalid clip file name {0:?}")]
    InvalidClipName(String),

    #[error("Invalid stream entry type {0:#04X}")]
    InvalidStreamEntryType(u8),

    #[error("PlayItem {index}: out_time {out_time} must be after in_time {in_time}")]
    InvalidPlayItemTimes {
        index: usize,
        in_time: u64,
        out_time: u64,
    },

    #[error("PlayListMark {index} references PlayItem {reference}, only {count} exist")]
    InvalidPlayItemReference {
        index: usize,
        reference: usize,
        count: usize,
    },

    #[error("Playlist contains no PlayItems")]
    NoPlayItems,

    #[error("Stream file {0} is empty")]
    EmptyStreamFile(String),
}

/// Error type of every file-level parse in this crate.
#[derive(thiserror::Error, Debug)]
pub enum BdmvError {
    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BdmvError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BdmvError::Io {
            path: path.into(),
            source,
        }
    }
}

// Combinator failures inside the MPLS/CLPI record parsers only ever mean
// the input ran out, so they all map onto the range kind.
impl<'a> nom::error::ParseError<&'a [u8]> for BdmvError {
    fn from_error_kind(_input: &'a [u8], _kind: ErrorKind) -> Self {
        BdmvError::Range(RangeError::Truncated { needed: 0 })
    }

    fn append(_input: &'a [u8], _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

pub(crate) type NomResult<'a, T> = nom::IResult<&'a [u8], T, BdmvError>;

/// Converts the outcome of a top-level `nom` parser into this crate's result type.
pub(crate) fn finish<T>(res: NomResult<'_, T>) -> Result<T, BdmvError> {
    match res {
        Ok((_, value)) => Ok(value),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(e),
        Err(nom::Err::Incomplete(nom::Needed::Size(n))) => {
            Err(RangeError::Truncated { needed: n.get() }.into())
        }
        Err(nom::Err::Incomplete(nom::Needed::Unknown)) => {
            Err(RangeError::Truncated { needed: 0 }.into())
        }
    }
}

/// Fails a `nom` parser with a format error that must not be backtracked over.
pub(crate) fn fail<T>(err: FormatError) -> Result<T, nom::Err<BdmvError>> {
    Err(nom::Err::Failure(BdmvError::Format(err)))
}
