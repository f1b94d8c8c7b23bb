use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;

use super::command::{Cli, OutputFormat, TitlesArgs};
use super::info::print_yaml;
use crate::timestamp::time_str;
use bdmv::process::cache::ClipCache;
use bdmv::process::disc::{FsDisc, list_playlists};
use bdmv::process::mpls::read_mpls;

#[derive(Debug, Serialize)]
struct TitleSummary {
    playlist: u32,
    /// ms
    duration: u64,
    chapters: usize,
    clips: usize,
    angles: usize,
}

pub fn cmd_titles(args: &TitlesArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let disc = FsDisc::new(&args.disc);
    let playlists = list_playlists(&disc)?;
    log::info!(
        "Found {} playlists in {}",
        playlists.len(),
        args.disc.display()
    );

    let pb = match multi {
        Some(multi) => {
            let pb = multi.add(ProgressBar::new(playlists.len() as u64));
            pb.set_style(ProgressStyle::with_template(
                "{bar:40.cyan/blue} {pos}/{len} {msg}",
            )?);
            Some(pb)
        }
        None => None,
    };

    let mut cache = ClipCache::new();
    let mut titles = Vec::new();
    for number in playlists {
        if let Some(ref pb) = pb {
            pb.set_message(format!("{number:05}.mpls"));
        }

        match read_mpls(&disc, number, &mut cache) {
            Ok(playlist) if playlist.duration >= args.min_duration * 1000 => {
                titles.push(TitleSummary {
                    playlist: number,
                    duration: playlist.duration,
                    chapters: playlist.chapters.len(),
                    clips: playlist.clips.len(),
                    angles: playlist.angles().len(),
                });
            }
            Ok(_) => {}
            Err(e) if cli.strict => return Err(e.into()),
            Err(e) => log::warn!("Skipping playlist {number:05}: {e}"),
        }

        if let Some(ref pb) = pb {
            pb.inc(1);
        }
    }
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    log::debug!("{} clips parsed", cache.len());

    match cli.format {
        OutputFormat::Yaml => print_yaml(&titles),
        OutputFormat::Text => {
            println!();
            println!("Playlist  Duration        Chapters  Clips  Angles");
            for t in &titles {
                println!(
                    "{:05}     {}    {:>8}  {:>5}  {:>6}",
                    t.playlist,
                    time_str(t.duration),
                    t.chapters,
                    t.clips,
                    t.angles
                );
            }
            println!();
            Ok(())
        }
    }
}
