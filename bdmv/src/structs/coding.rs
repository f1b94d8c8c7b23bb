//! Bluray codec tags and the coarse attribute classes declared in MPLS/CLPI.

use std::fmt::Display;

/// Declares a `u8`-coded enum with an `Unknown` catch-all and `From<u8>`.
macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident = $code:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize)]
        pub enum $name {
            $($variant,)+
            Unknown(u8),
        }

        impl From<u8> for $name {
            fn from(code: u8) -> Self {
                match code {
                    $($code => $name::$variant,)+
                    other => $name::Unknown(other),
                }
            }
        }

        impl $name {
            pub fn code(self) -> u8 {
                match self {
                    $($name::$variant => $code,)+
                    $name::Unknown(other) => other,
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::from(0)
            }
        }
    };
}

pub(crate) use coded_enum;

coded_enum! {
    /// `stream_coding_type` shared by MPLS, CLPI and the PMT `stream_type`.
    StreamCoding {
        Mpeg1Video = 0x01,
        Mpeg2Video = 0x02,
        Mpeg1Audio = 0x03,
        Mpeg2Audio = 0x04,
        Lpcm = 0x80,
        Ac3 = 0x81,
        Dts = 0x82,
        TrueHd = 0x83,
        Eac3 = 0x84,
        DtsHd = 0x85,
        DtsHdMaster = 0x86,
        Eac3Secondary = 0xA1,
        DtsHdSecondary = 0xA2,
        Vc1 = 0xEA,
        H264 = 0x1B,
        H264Mvc = 0x20,
        Hevc = 0x24,
        PresentationGraphics = 0x90,
        InteractiveGraphics = 0x91,
        TextSubtitle = 0x92,
    }
}

impl StreamCoding {
    pub fn is_video(self) -> bool {
        matches!(
            self,
            StreamCoding::Mpeg1Video
                | StreamCoding::Mpeg2Video
                | StreamCoding::H264
                | StreamCoding::H264Mvc
                | StreamCoding::Hevc
                | StreamCoding::Vc1
        )
    }

    pub fn is_audio(self) -> bool {
        matches!(
            self,
            StreamCoding::Mpeg1Audio
                | StreamCoding::Mpeg2Audio
                | StreamCoding::Lpcm
                | StreamCoding::Ac3
                | StreamCoding::Dts
                | StreamCoding::TrueHd
                | StreamCoding::Eac3
                | StreamCoding::DtsHd
                | StreamCoding::DtsHdMaster
                | StreamCoding::Eac3Secondary
                | StreamCoding::DtsHdSecondary
        )
    }

    /// Presentation graphics only; IG and text streams are not surfaced as subtitles.
    pub fn is_subtitle(self) -> bool {
        self == StreamCoding::PresentationGraphics
    }

    pub fn name(self) -> String {
        match self {
            StreamCoding::Mpeg1Video => "MPEG-1 Video".into(),
            StreamCoding::Mpeg2Video => "MPEG-2 Video".into(),
            StreamCoding::Mpeg1Audio => "MPEG-1 Audio".into(),
            StreamCoding::Mpeg2Audio => "MPEG-2 Audio".into(),
            StreamCoding::H264 => "H.264/AVC Video".into(),
            StreamCoding::H264Mvc => "H.264/MVC Video".into(),
            StreamCoding::Vc1 => "VC-1 Video".into(),
            StreamCoding::Hevc => "H.265/HEVC Video".into(),
            StreamCoding::Lpcm => "HDMV LPCM Audio".into(),
            StreamCoding::Ac3 => "AC-3 Audio".into(),
            StreamCoding::Dts => "DTS Audio".into(),
            StreamCoding::TrueHd => "TrueHD Audio".into(),
            StreamCoding::Eac3 => "EAC-3 Audio".into(),
            StreamCoding::DtsHd => "DTS-HD Audio".into(),
            StreamCoding::DtsHdMaster => "DTS-HD Master Audio".into(),
            StreamCoding::Eac3Secondary => "EAC-3 Audio (Secondary)".into(),
            StreamCoding::DtsHdSecondary => "DTS-HD Audio (Secondary)".into(),
            StreamCoding::PresentationGraphics => "HDMV PGS Subtitles".into(),
            StreamCoding::InteractiveGraphics => "HDMV Interactive Graphics".into(),
            StreamCoding::TextSubtitle => "Text Subtitles".into(),
            StreamCoding::Unknown(code) => format!("Unknown (0x{code:02x})"),
        }
    }
}

impl Display for StreamCoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

coded_enum! {
    VideoFormat {
        Interlaced480 = 1,
        Interlaced576 = 2,
        Progressive480 = 3,
        Interlaced1080 = 4,
        Progressive720 = 5,
        Progressive1080 = 6,
        Progressive576 = 7,
        Progressive2160 = 8,
    }
}

impl VideoFormat {
    /// Nominal frame size of the resolution class, `(0, 0)` when unknown.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            VideoFormat::Interlaced480 | VideoFormat::Progressive480 => (720, 480),
            VideoFormat::Interlaced576 | VideoFormat::Progressive576 => (720, 576),
            VideoFormat::Progressive720 => (1280, 720),
            VideoFormat::Interlaced1080 | VideoFormat::Progressive1080 => (1920, 1080),
            VideoFormat::Progressive2160 => (3840, 2160),
            VideoFormat::Unknown(_) => (0, 0),
        }
    }

    pub fn is_interlaced(self) -> bool {
        matches!(
            self,
            VideoFormat::Interlaced480 | VideoFormat::Interlaced576 | VideoFormat::Interlaced1080
        )
    }
}

coded_enum! {
    FrameRate {
        Film = 1,
        Fps24 = 2,
        Fps25 = 3,
        Ntsc = 4,
        Fps50 = 6,
        Ntsc60 = 7,
    }
}

impl FrameRate {
    /// `(numerator, denominator)`, `None` when the class is reserved.
    pub fn fraction(self) -> Option<(u32, u32)> {
        match self {
            FrameRate::Film => Some((24000, 1001)),
            FrameRate::Fps24 => Some((24, 1)),
            FrameRate::Fps25 => Some((25, 1)),
            FrameRate::Ntsc => Some((30000, 1001)),
            FrameRate::Fps50 => Some((50, 1)),
            FrameRate::Ntsc60 => Some((60000, 1001)),
            FrameRate::Unknown(_) => None,
        }
    }
}

coded_enum! {
    AspectRatio {
        Standard = 2,
        Widescreen = 3,
    }
}

coded_enum! {
    DynamicRange {
        Sdr = 0,
        Hdr10 = 1,
        DolbyVision = 2,
        Hdr10Plus = 3,
    }
}

coded_enum! {
    ColorSpace {
        Bt709 = 1,
        Bt2020 = 2,
    }
}

coded_enum! {
    AudioFormat {
        Mono = 1,
        Stereo = 3,
        Multichannel = 6,
        StereoAndMultichannel = 0x0C,
    }
}

coded_enum! {
    SampleRate {
        Khz48 = 1,
        Khz96 = 4,
        Khz192 = 5,
        Khz48And192 = 0x0C,
        Khz48And96 = 0x0E,
    }
}

impl SampleRate {
    /// Rate of the primary (first listed) component in Hz.
    pub fn hz(self) -> u32 {
        match self {
            SampleRate::Khz48 | SampleRate::Khz48And192 | SampleRate::Khz48And96 => 48000,
            SampleRate::Khz96 => 96000,
            SampleRate::Khz192 => 192000,
            SampleRate::Unknown(_) => 0,
        }
    }
}

coded_enum! {
    CharacterCode {
        Utf8 = 0x01,
        Utf16Be = 0x02,
        ShiftJis = 0x03,
        EucKr = 0x04,
        Gb18030 = 0x05,
        EucCn = 0x06,
        Big5 = 0x07,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coding_round_trips_known_and_unknown_codes() {
        assert_eq!(StreamCoding::from(0x24), StreamCoding::Hevc);
        assert_eq!(StreamCoding::from(0x86).code(), 0x86);
        assert_eq!(StreamCoding::from(0x42), StreamCoding::Unknown(0x42));
        assert_eq!(StreamCoding::Unknown(0x42).name(), "Unknown (0x42)");
        assert_eq!(StreamCoding::Hevc.to_string(), "H.265/HEVC Video");
    }

    #[test]
    fn coding_classes_are_disjoint() {
        for code in 0..=u8::MAX {
            let coding = StreamCoding::from(code);
            let classes = [coding.is_video(), coding.is_audio(), coding.is_subtitle()];
            assert!(classes.iter().filter(|&&c| c).count() <= 1, "{coding:?}");
        }
        assert!(!StreamCoding::InteractiveGraphics.is_subtitle());
    }

    #[test]
    fn attribute_classes() {
        assert_eq!(VideoFormat::from(8).dimensions(), (3840, 2160));
        assert!(VideoFormat::from(4).is_interlaced());
        assert_eq!(FrameRate::from(1).fraction(), Some((24000, 1001)));
        assert_eq!(FrameRate::from(5), FrameRate::Unknown(5));
        assert_eq!(SampleRate::from(0x0E).hz(), 48000);
        assert_eq!(DynamicRange::from(2), DynamicRange::DolbyVision);
        assert_eq!(CharacterCode::from(7), CharacterCode::Big5);
    }
}
