//! Deciding whether a file is audio by looking at its bytes.

use std::{fs::File, io::BufReader, path::Path};

use lofty::{file::FileType, probe::Probe};

/// Sniff the container format of the file at `path`.
///
/// Only a small prefix of the file is read (plus whatever ID3v2 tag precedes the audio),
/// and the extension is ignored entirely.
/// Returns `None` for empty, unreadable, and non-audio files.
#[must_use]
#[inline]
pub fn sniff(path: &Path) -> Option<FileType> {
    let file = File::open(path).ok()?;
    if file.metadata().ok()?.len() == 0 {
        return None;
    }

    Probe::new(BufReader::new(file))
        .guess_file_type()
        .ok()?
        .file_type()
}

/// Whether the file at `path` is an audio file.
///
/// Never fails, anything that can't be read counts as "not audio".
#[must_use]
#[inline]
pub fn is_audio_file(path: &Path) -> bool {
    sniff(path).is_some()
}
