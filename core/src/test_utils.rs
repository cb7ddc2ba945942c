//! utilities used for testing
//!
//! Audio fixtures are synthesized rather than checked in: a run of silent MPEG-1 Layer III
//! frames (optionally behind an ID3v2.3 tag) and a FLAC stream with nothing but a STREAMINFO
//! block. Neither decodes to anything audible, but both parse, which is all the library needs.

use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use crate::logger::init_logger;

static INIT: OnceLock<()> = OnceLock::new();

pub fn init() {
    INIT.get_or_init(|| init_logger(log::LevelFilter::Debug));
}

/// MPEG-1 Layer III, 128 kbps, 44.1 kHz, no CRC, no padding, stereo.
const MP3_FRAME_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x00];
/// `144 * bitrate / sample_rate` for the header above.
const MP3_FRAME_LEN: usize = 417;
/// About a second of audio.
pub const MP3_FRAME_COUNT: usize = 40;

pub const FLAC_SAMPLE_RATE: u64 = 44_100;
/// Two seconds at [`FLAC_SAMPLE_RATE`].
pub const FLAC_TOTAL_SAMPLES: u64 = 2 * FLAC_SAMPLE_RATE;

/// The tags to put in a synthesized mp3.
#[derive(Clone, Debug, Default)]
pub struct Tags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub picture: Option<Vec<u8>>,
}

impl Tags {
    /// Every tag set, including a cover picture from [`jpeg_bytes`].
    #[must_use]
    pub fn full() -> Self {
        Self {
            title: Some("Song 0".into()),
            artist: Some("Artist 0".into()),
            album: Some("Album 0".into()),
            picture: Some(jpeg_bytes()),
        }
    }

    #[must_use]
    pub fn with_picture(picture: Vec<u8>) -> Self {
        Self {
            picture: Some(picture),
            ..Self::default()
        }
    }
}

/// A tiny stand-in for a JPEG image, only the markers are real.
#[must_use]
pub fn jpeg_bytes() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xDB, 0x00, 0x04, 0x00, 0x00];
    bytes.extend_from_slice(b"not really a picture");
    bytes.extend_from_slice(&[0xFF, 0xD9]);
    bytes
}

fn synchsafe(size: usize) -> [u8; 4] {
    let size = u32::try_from(size).expect("tag too large");
    [
        ((size >> 21) & 0x7F) as u8,
        ((size >> 14) & 0x7F) as u8,
        ((size >> 7) & 0x7F) as u8,
        (size & 0x7F) as u8,
    ]
}

fn push_frame(frames: &mut Vec<u8>, id: &[u8; 4], body: &[u8]) {
    frames.extend_from_slice(id);
    frames.extend_from_slice(&u32::try_from(body.len()).expect("frame too large").to_be_bytes());
    frames.extend_from_slice(&[0, 0]);
    frames.extend_from_slice(body);
}

/// An ID3v2.3 tag holding `tags`, empty if there's nothing to write.
#[must_use]
pub fn id3v2_tag(tags: &Tags) -> Vec<u8> {
    let mut frames = Vec::new();

    for (id, value) in [
        (b"TIT2", &tags.title),
        (b"TPE1", &tags.artist),
        (b"TALB", &tags.album),
    ] {
        if let Some(value) = value {
            // ISO-8859-1, fixtures stick to ASCII
            let mut body = vec![0];
            body.extend_from_slice(value.as_bytes());
            push_frame(&mut frames, id, &body);
        }
    }

    if let Some(picture) = &tags.picture {
        let mut body = vec![0];
        body.extend_from_slice(b"image/jpeg\0");
        // front cover, then an empty description
        body.extend_from_slice(&[0x03, 0x00]);
        body.extend_from_slice(picture);
        push_frame(&mut frames, b"APIC", &body);
    }

    if frames.is_empty() {
        return frames;
    }

    let mut tag = b"ID3\x03\x00\x00".to_vec();
    tag.extend_from_slice(&synchsafe(frames.len()));
    tag.extend(frames);
    tag
}

/// A silent mp3 of [`MP3_FRAME_COUNT`] frames, tagged with `tags`.
#[must_use]
pub fn mp3_bytes(tags: &Tags) -> Vec<u8> {
    let mut bytes = id3v2_tag(tags);
    for _ in 0..MP3_FRAME_COUNT {
        bytes.extend_from_slice(&MP3_FRAME_HEADER);
        bytes.resize(bytes.len() + MP3_FRAME_LEN - MP3_FRAME_HEADER.len(), 0);
    }
    bytes
}

/// A FLAC stream with a single STREAMINFO block describing [`FLAC_TOTAL_SAMPLES`] of stereo 16-bit audio.
#[must_use]
pub fn flac_bytes() -> Vec<u8> {
    let mut bytes = b"fLaC".to_vec();
    // last metadata block, type STREAMINFO, 34 bytes long
    bytes.extend_from_slice(&[0x80, 0x00, 0x00, 0x22]);
    // min and max block size
    bytes.extend_from_slice(&4096u16.to_be_bytes());
    bytes.extend_from_slice(&4096u16.to_be_bytes());
    // min and max frame size, unknown
    bytes.extend_from_slice(&[0; 6]);
    // sample rate (20 bits), channels - 1 (3 bits), bits per sample - 1 (5 bits), total samples (36 bits)
    let packed = (FLAC_SAMPLE_RATE << 44) | (1 << 41) | (15 << 36) | FLAC_TOTAL_SAMPLES;
    bytes.extend_from_slice(&packed.to_be_bytes());
    // md5 of the unencoded audio, unknown
    bytes.extend_from_slice(&[0; 16]);
    // something that looks like the start of a frame
    bytes.extend_from_slice(&[0xFF, 0xF8]);
    bytes.resize(bytes.len() + 62, 0);
    bytes
}

/// Write `bytes` to `relative` under `root`, creating parent directories as needed.
pub fn write_file(root: &Path, relative: &str, bytes: &[u8]) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create fixture directory");
    }
    std::fs::write(&path, bytes).expect("failed to write fixture");
    path
}
