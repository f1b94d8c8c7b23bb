//! Parsed `.mpls` playlist model.

use serde::Serialize;

use crate::structs::clip::{ClipInformation, StreamInformation};
use crate::structs::coding::coded_enum;
use crate::utils::errors::FormatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionCondition {
    /// 0x01
    NonSeamless,
    /// 0x05, seamless with a clean break
    Branching,
    /// 0x06
    Seamless,
}

impl TryFrom<u8> for ConnectionCondition {
    type Error = FormatError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x01 => Ok(ConnectionCondition::NonSeamless),
            0x05 => Ok(ConnectionCondition::Branching),
            0x06 => Ok(ConnectionCondition::Seamless),
            other => Err(FormatError::InvalidConnectionCondition(other)),
        }
    }
}

coded_enum! {
    PlaybackType {
        Sequential = 1,
        Random = 2,
        Shuffle = 3,
    }
}

coded_enum! {
    MarkType {
        Entry = 1,
        Link = 2,
    }
}

coded_enum! {
    SubPathType {
        BrowsableSlideshowAudio = 2,
        InteractiveGraphicsMenu = 3,
        TextSubtitle = 4,
        OutOfMuxSynchronous = 5,
        OutOfMuxAsynchronousPip = 6,
        InMuxSynchronousPip = 7,
        StereoscopicVideo = 8,
        DolbyVisionEnhancementLayer = 10,
    }
}

coded_enum! {
    StillMode {
        Off = 0,
        Timed = 1,
        Infinite = 2,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecondaryAudioStream {
    pub stream: StreamInformation,
    pub primary_audio_refs: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecondaryVideoStream {
    pub stream: StreamInformation,
    pub secondary_audio_refs: Vec<u8>,
    pub pip_pg_refs: Vec<u8>,
}

/// Per-PlayItem STN table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamNumberTable {
    pub video: Vec<StreamInformation>,
    pub audio: Vec<StreamInformation>,
    pub presentation_graphics: Vec<StreamInformation>,
    pub pip_presentation_graphics: Vec<StreamInformation>,
    pub interactive_graphics: Vec<StreamInformation>,
    pub secondary_audio: Vec<SecondaryAudioStream>,
    pub secondary_video: Vec<SecondaryVideoStream>,
    pub dolby_vision: Vec<StreamInformation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayItemInformation {
    /// Primary angle first. Parsed PlayItems always carry at least one.
    pub angle_clips: Vec<ClipInformation>,
    /// ms
    pub in_time: u64,
    /// ms
    pub out_time: u64,
    pub connection_condition: ConnectionCondition,
    pub is_multi_angle: bool,
    pub is_different_audios: bool,
    pub is_seamless_angle_change: bool,
    pub user_option_mask: u64,
    pub random_access_flag: bool,
    pub still_mode: StillMode,
    pub still_time: u16,
    pub stn: StreamNumberTable,
}

impl PlayItemInformation {
    pub fn duration(&self) -> u64 {
        self.out_time.saturating_sub(self.in_time)
    }

    pub fn primary_clip(&self) -> Option<&ClipInformation> {
        self.angle_clips.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubPlayItemInformation {
    /// Index of the SubPath this item belongs to.
    pub sub_path_id: usize,
    pub sub_path_type: SubPathType,
    pub is_repeat: bool,
    pub clips: Vec<ClipInformation>,
    pub connection_condition: u8,
    pub in_time: u64,
    pub out_time: u64,
    pub sync_play_item_id: u16,
    pub sync_start_pts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistMarkInformation {
    pub mark_type: MarkType,
    pub play_item_reference: u16,
    /// Mark time as stored, on the referenced PlayItem's own clock (ms).
    pub raw_time: u64,
    /// Mark time on the playlist timeline (ms), set by derivation.
    pub time: u64,
    pub entry_es_pid: u16,
    pub duration: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChapterInformation {
    /// 1-based
    pub chapter: u32,
    pub start: u64,
    pub duration: u64,
}

/// Result of parsing one playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlurayPlaylistInformation {
    pub playlist: u32,
    pub version: String,
    /// ms
    pub duration: u64,
    pub playback_type: PlaybackType,
    /// Only meaningful for random and shuffle playback.
    pub playback_count: u16,
    pub play_items: Vec<PlayItemInformation>,
    /// Primary-angle clip of each PlayItem, same order.
    pub clips: Vec<ClipInformation>,
    pub sub_play_items: Vec<SubPlayItemInformation>,
    pub extension_sub_play_items: Vec<SubPlayItemInformation>,
    pub playlist_marks: Vec<PlaylistMarkInformation>,
    pub chapters: Vec<ChapterInformation>,
}

/// One viewing angle of a multi-angle playlist.
#[derive(Debug, Clone, Copy)]
pub struct Angle<'a> {
    pub index: usize,
    playlist: &'a BlurayPlaylistInformation,
}

impl BlurayPlaylistInformation {
    pub fn angles(&self) -> Vec<Angle<'_>> {
        let count = self
            .play_items
            .iter()
            .map(|p| p.angle_clips.len())
            .max()
            .unwrap_or(0);
        (0..count)
            .map(|index| Angle {
                index,
                playlist: self,
            })
            .collect()
    }

    /// PlayItem with the largest `out_time - in_time`, the first one on ties.
    pub fn longest_play_item(&self) -> Option<&PlayItemInformation> {
        self.play_items
            .iter()
            .rev()
            .max_by_key(|p| p.duration())
    }
}

impl<'a> Angle<'a> {
    /// Clip played for each PlayItem under this angle. PlayItems with fewer
    /// angles fall back to their primary clip, PlayItems without clips are
    /// left out.
    pub fn clips(&self) -> Vec<&'a ClipInformation> {
        self.playlist
            .play_items
            .iter()
            .filter_map(|p| p.angle_clips.get(self.index).or_else(|| p.primary_clip()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn clip(id: u32) -> ClipInformation {
        ClipInformation {
            clip: id,
            codec: "M2TS".into(),
            ..Default::default()
        }
    }

    fn item(angles: &[u32], in_time: u64, out_time: u64) -> PlayItemInformation {
        PlayItemInformation {
            angle_clips: angles.iter().map(|&a| clip(a)).collect(),
            in_time,
            out_time,
            connection_condition: ConnectionCondition::Seamless,
            is_multi_angle: angles.len() > 1,
            is_different_audios: false,
            is_seamless_angle_change: false,
            user_option_mask: 0,
            random_access_flag: false,
            still_mode: StillMode::Off,
            still_time: 0,
            stn: StreamNumberTable::default(),
        }
    }

    fn playlist(items: Vec<PlayItemInformation>) -> BlurayPlaylistInformation {
        BlurayPlaylistInformation {
            playlist: 800,
            version: "0300".into(),
            duration: 0,
            playback_type: PlaybackType::Sequential,
            playback_count: 0,
            clips: items.iter().filter_map(|p| p.primary_clip().cloned()).collect(),
            play_items: items,
            sub_play_items: vec![],
            extension_sub_play_items: vec![],
            playlist_marks: vec![],
            chapters: vec![],
        }
    }

    #[test]
    fn connection_condition_codes() -> Result<()> {
        assert_eq!(ConnectionCondition::try_from(1)?, ConnectionCondition::NonSeamless);
        assert_eq!(ConnectionCondition::try_from(5)?, ConnectionCondition::Branching);
        assert_eq!(ConnectionCondition::try_from(6)?, ConnectionCondition::Seamless);
        assert_eq!(
            ConnectionCondition::try_from(3),
            Err(FormatError::InvalidConnectionCondition(3))
        );
        Ok(())
    }

    #[test]
    fn angles_fall_back_to_primary_clip() {
        let pl = playlist(vec![
            item(&[81], 0, 10),
            item(&[82, 83], 0, 10),
            item(&[86], 0, 10),
        ]);
        let angles = pl.angles();
        assert_eq!(angles.len(), 2);
        let first: Vec<u32> = angles[0].clips().iter().map(|c| c.clip).collect();
        let second: Vec<u32> = angles[1].clips().iter().map(|c| c.clip).collect();
        assert_eq!(first, [81, 82, 86]);
        assert_eq!(second, [81, 83, 86]);
    }

    #[test]
    fn play_item_without_clips() {
        let mut pl = playlist(vec![item(&[81, 82], 0, 10), item(&[86], 0, 10)]);
        pl.play_items[1].angle_clips.clear();
        assert!(pl.play_items[1].primary_clip().is_none());

        let clips: Vec<Vec<u32>> = pl
            .angles()
            .iter()
            .map(|a| a.clips().iter().map(|c| c.clip).collect())
            .collect();
        assert_eq!(clips, [vec![81], vec![82]]);
    }

    #[test]
    fn longest_play_item_prefers_first_on_ties() {
        let pl = playlist(vec![
            item(&[1], 0, 50),
            item(&[2], 100, 200),
            item(&[3], 0, 100),
        ]);
        assert_eq!(
            pl.longest_play_item().and_then(|p| p.primary_clip()).map(|c| c.clip),
            Some(2)
        );
        assert!(playlist(vec![]).longest_play_item().is_none());
    }
}
