use std::path::PathBuf;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\nbdmv library ",
    env!("BDMV_VERSION"),
    "\ngit ",
    env!("VERGEN_GIT_DESCRIBE"),
    "\nbuilt ",
    env!("BUILD_TIMESTAMP"),
);

#[derive(Debug, ClapParser)]
#[command(
    name         = env!("CARGO_PKG_NAME"),
    version      = env!("CARGO_PKG_VERSION"),
    long_version = LONG_VERSION,
    author       = env!("CARGO_PKG_AUTHORS"),
    about        = "Tools for inspecting Blu-ray playlists, clip information and transport streams",
    long_about   = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Fail when stream analysis fails instead of falling back to declared attributes.
    #[arg(long, global = true)]
    pub strict: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Read a playlist, analyse its main clip and print the reconciled streams.
    Playlist(PlaylistArgs),

    /// Print one parsed clip information file.
    Clip(ClipArgs),

    /// Print the streams found in a clip's transport stream.
    Streams(StreamsArgs),

    /// List the playlists of a disc
    Titles(TitlesArgs),
}

#[derive(Debug, Args)]
pub struct PlaylistArgs {
    /// Disc root, the directory containing BDMV.
    #[arg(value_name = "DISC")]
    pub disc: PathBuf,

    /// Playlist number, e.g. 800 for 00800.mpls.
    #[arg(value_name = "NUMBER")]
    pub number: u32,

    /// BDAV packets to inspect per clip.
    #[arg(long, value_name = "COUNT", default_value_t = bdmv::process::m2ts::PACKETS_TO_PARSE)]
    pub packets: usize,
}

#[derive(Debug, Args)]
pub struct ClipArgs {
    /// Disc root, the directory containing BDMV.
    #[arg(value_name = "DISC")]
    pub disc: PathBuf,

    /// Clip number, e.g. 55 for 00055.clpi.
    #[arg(value_name = "NUMBER")]
    pub number: u32,
}

#[derive(Debug, Args)]
pub struct StreamsArgs {
    /// Disc root, the directory containing BDMV.
    #[arg(value_name = "DISC")]
    pub disc: PathBuf,

    /// Clip number, e.g. 55 for 00055.m2ts.
    #[arg(value_name = "CLIP")]
    pub clip: u32,

    /// Stream file extension.
    #[arg(long, default_value = "m2ts")]
    pub extension: String,

    /// BDAV packets to inspect.
    #[arg(long, value_name = "COUNT", default_value_t = bdmv::process::m2ts::PACKETS_TO_PARSE)]
    pub packets: usize,
}

#[derive(Debug, Args)]
pub struct TitlesArgs {
    /// Disc root, the directory containing BDMV.
    #[arg(value_name = "DISC")]
    pub disc: PathBuf,

    /// Hide playlists shorter than this many seconds.
    #[arg(long, value_name = "SECS", default_value_t = 0)]
    pub min_duration: u64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum OutputFormat {
    /// Aligned human-readable tables.
    Text,
    /// YAML document of the parsed structures.
    Yaml,
}
