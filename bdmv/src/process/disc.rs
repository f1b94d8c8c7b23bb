//! Read access to a disc and the BDMV directory layout.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Byte source for files below a disc root. Paths are relative to the root.
pub trait DiscReader {
    /// Reads the whole file, or at most `max_bytes` from its start.
    fn read(&self, path: &Path, max_bytes: Option<usize>) -> io::Result<Vec<u8>>;

    /// File names in a directory.
    fn list(&self, dir: &Path) -> io::Result<Vec<String>>;

    /// Human readable location of `path`, for diagnostics.
    fn describe(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }
}

/// Disc extracted to (or mounted at) a directory.
#[derive(Debug, Clone)]
pub struct FsDisc {
    root: PathBuf,
}

impl FsDisc {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DiscReader for FsDisc {
    fn read(&self, path: &Path, max_bytes: Option<usize>) -> io::Result<Vec<u8>> {
        let file = File::open(self.root.join(path))?;
        let expected = file.metadata()?.len() as usize;
        let expected = max_bytes.map_or(expected, |m| m.min(expected));

        let mut buf = Vec::with_capacity(expected);
        file.take(expected as u64).read_to_end(&mut buf)?;
        if buf.len() != expected {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("short read: {} of {expected} bytes", buf.len()),
            ));
        }
        Ok(buf)
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(self.root.join(dir))? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn describe(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

pub fn playlist_path(playlist: u32) -> PathBuf {
    Path::new("BDMV").join("PLAYLIST").join(format!("{playlist:05}.mpls"))
}

pub fn clip_info_path(clip: u32) -> PathBuf {
    Path::new("BDMV").join("CLIPINF").join(format!("{clip:05}.clpi"))
}

/// `extension` is the clip codec identifier, lowercased here.
pub fn stream_path(clip: u32, extension: &str) -> PathBuf {
    Path::new("BDMV")
        .join("STREAM")
        .join(format!("{clip:05}.{}", extension.to_lowercase()))
}

/// Playlist numbers present on the disc, ascending.
pub fn list_playlists(disc: &dyn DiscReader) -> io::Result<Vec<u32>> {
    let dir = Path::new("BDMV").join("PLAYLIST");
    let mut playlists: Vec<u32> = disc
        .list(&dir)?
        .iter()
        .filter_map(|name| {
            let (stem, ext) = name.rsplit_once('.')?;
            if !ext.eq_ignore_ascii_case("mpls") || stem.len() != 5 {
                return None;
            }
            stem.parse().ok()
        })
        .collect();
    playlists.sort_unstable();
    Ok(playlists)
}
