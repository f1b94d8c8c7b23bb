use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;

use super::command::{ClipArgs, Cli, OutputFormat, PlaylistArgs, StreamsArgs};
use crate::timestamp::time_str;
use bdmv::process::cache::ClipCache;
use bdmv::process::clpi::read_clpi;
use bdmv::process::disc::FsDisc;
use bdmv::process::m2ts::M2tsParser;
use bdmv::process::mpls::read_mpls;
use bdmv::process::reconcile::convert_bluray_playlist_information;
use bdmv::structs::clip::{ClipInformation, StreamAttributes};
use bdmv::structs::summary::PlaylistInformation;
use bdmv::structs::ts_stream::{StreamMap, TsStreamDetails};

pub fn cmd_playlist(args: &PlaylistArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!(
        "Reading playlist {:05} from {}",
        args.number,
        args.disc.display()
    );

    let disc = FsDisc::new(&args.disc);
    let mut cache = ClipCache::new();
    let playlist = read_mpls(&disc, args.number, &mut cache)?;

    let spinner = multi.map(|m| spinner(m, "Analysing streams...")).transpose()?;
    let analysed = M2tsParser::with_packet_limit(args.packets).get_streams(&disc, &playlist);
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let streams = match analysed {
        Ok(streams) => streams,
        Err(e) if !cli.strict => {
            log::warn!("Stream analysis failed, using declared attributes only: {e}");
            StreamMap::default()
        }
        Err(e) => return Err(e.into()),
    };

    let info = convert_bluray_playlist_information(&playlist, &streams);
    match cli.format {
        OutputFormat::Yaml => print_yaml(&info),
        OutputFormat::Text => {
            display_playlist(&info);
            Ok(())
        }
    }
}

pub fn cmd_clip(args: &ClipArgs, cli: &Cli) -> Result<()> {
    let disc = FsDisc::new(&args.disc);
    let clip = read_clpi(&disc, args.number)?;

    match cli.format {
        OutputFormat::Yaml => print_yaml(&clip),
        OutputFormat::Text => {
            display_clip(&clip);
            Ok(())
        }
    }
}

pub fn cmd_streams(args: &StreamsArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let disc = FsDisc::new(&args.disc);

    let spinner = multi.map(|m| spinner(m, "Analysing streams...")).transpose()?;
    let streams = M2tsParser::with_packet_limit(args.packets).get_streams_from_file(
        &disc,
        args.clip,
        &args.extension,
    );
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let streams = streams?;

    if cli.strict && !streams.is_complete() {
        anyhow::bail!(
            "Not all streams were characterised within {} packets",
            args.packets
        );
    }

    match cli.format {
        OutputFormat::Yaml => print_yaml(&streams),
        OutputFormat::Text => {
            display_stream_map(&streams);
            Ok(())
        }
    }
}

pub(crate) fn print_yaml<T: Serialize>(value: &T) -> Result<()> {
    print!("{}", serde_yaml_ng::to_string(value)?);
    Ok(())
}

fn spinner(multi: &MultiProgress, message: &'static str) -> Result<ProgressBar> {
    let pb = multi.add(ProgressBar::new_spinner());
    pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb.set_message(message);
    Ok(pb)
}

fn display_playlist(info: &PlaylistInformation) {
    let title = format!("Playlist {:05}", info.playlist);
    println!();
    println!("{title}");
    println!("{}", "=".repeat(title.len()));
    println!();

    println!("  Duration                  {}", time_str(info.duration));
    let clips = info
        .clips
        .iter()
        .map(|c| format!("{c:05}"))
        .collect::<Vec<_>>()
        .join(", ");
    println!("  Clips                     {clips}");
    for (clip, duration) in &info.clip_duration {
        println!("    {clip:05}                   {}", time_str(*duration));
    }
    println!();

    if !info.chapters.is_empty() {
        println!("Chapters");
        for (i, start) in info.chapters.iter().enumerate() {
            println!("  {:<3}                       {}", i + 1, time_str(*start));
        }
        println!();
    }

    println!("Video Streams");
    for v in &info.video_streams {
        let depth = if v.bit_depth > 0 {
            format!(" {}-bit", v.bit_depth)
        } else {
            String::new()
        };
        let stereo = if v.is_3d { " 3D" } else { "" };
        println!(
            "  PID {:#06X}                {} {}x{}{depth} {} {:.3}{stereo}",
            v.pid, v.codec, v.width, v.height, v.hdr_type, v.aspect
        );
    }
    println!();

    println!("Audio Streams");
    for a in &info.audio_streams {
        let channels = if a.channels > 0 {
            format!("{} ch", a.channels)
        } else {
            "? ch".to_string()
        };
        println!(
            "  PID {:#06X}                {} {channels} {} Hz {}",
            a.pid,
            a.codec,
            a.sample_rate,
            language(&a.language)
        );
    }
    println!();

    println!("Subtitle Streams");
    for s in &info.pg_streams {
        println!(
            "  PID {:#06X}                {} {}",
            s.pid,
            s.codec,
            language(&s.language)
        );
    }
    println!();
}

fn display_clip(clip: &ClipInformation) {
    let title = format!("Clip {:05}", clip.clip);
    println!();
    println!("{title}");
    println!("{}", "=".repeat(title.len()));
    println!();
    println!("  Version                   {}", clip.version);
    println!("  Programs                  {}", clip.programs.len());
    println!();

    for program in &clip.programs {
        println!(
            "Program {} (SPN {})",
            program.program_id, program.spn_program_sequence_start
        );
        for stream in &program.streams {
            let detail = match &stream.attributes {
                StreamAttributes::Video(v) => {
                    let (width, height) = v.format.dimensions();
                    format!("{width}x{height} {:?} {:?}", v.rate, v.dynamic_range)
                }
                StreamAttributes::Audio(a) => {
                    format!("{:?} {} Hz {}", a.format, a.rate.hz(), language(&a.language))
                }
                StreamAttributes::Graphics { language: l } => language(l).to_string(),
                StreamAttributes::Text {
                    character_code,
                    language: l,
                } => format!("{character_code:?} {}", language(l)),
                StreamAttributes::Other => String::new(),
            };
            println!(
                "  PID {:#06X}                {} {detail}",
                stream.packet_identifier, stream.coding
            );
        }
        println!();
    }
}

fn display_stream_map(streams: &StreamMap) {
    println!();
    println!("Transport Streams");
    println!("=================");
    println!();

    for s in streams.streams.values() {
        let state = if s.completed { "" } else { " (incomplete)" };
        println!("  PID {:#06X}                {}{state}", s.pid, s.stream_type);
        match &s.details {
            TsStreamDetails::Video(v) => {
                println!("    Resolution              {}x{}", v.width, v.height);
                println!("    Bit depth               {}", v.bit_depth);
                println!("    Aspect ratio            {:.3}", v.aspect_ratio);
                println!(
                    "    HDR10 / HDR10+ / DV     {} / {} / {}",
                    v.hdr10, v.hdr10_plus, v.dolby_vision
                );
                println!("    3D                      {}", v.is_3d);
            }
            TsStreamDetails::Audio(a) => {
                println!("    Channels                {}", a.channels);
                println!("    Sampling rate           {} Hz", a.sample_rate);
                println!("    Atmos                   {}", a.is_atmos);
                println!("    Language                {}", language(&s.language));
            }
            TsStreamDetails::Other => {
                println!("    Language                {}", language(&s.language));
            }
        }
    }

    if !streams.merged_pids.is_empty() {
        let merged = streams
            .merged_pids
            .iter()
            .map(|pid| format!("{pid:#06X}"))
            .collect::<Vec<_>>()
            .join(", ");
        println!();
        println!("  Merged enhancement layers {merged}");
    }
    println!();
}

fn language(language: &str) -> &str {
    if language.is_empty() { "und" } else { language }
}
