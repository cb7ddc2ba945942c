pub mod config;
pub mod errors;
pub mod library;
pub mod logger;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

use errors::DirectoryError;

/// Get the directory where the tunedir config file lives.
///
/// # Errors
///
/// Fails if the platform has no notion of a per-user config directory.
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, DirectoryError> {
    directories::ProjectDirs::from("", "", "tunedir")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(DirectoryError::Config)
}

/// Format a track duration for display, as `minutes:seconds`.
///
/// Seconds are truncated (not rounded) and zero-padded to two digits.
/// Negative and non-finite inputs render as `0:00`.
///
/// ```
/// # use tunedir_core::format_duration;
/// assert_eq!(format_duration(65.4), "1:05");
/// assert_eq!(format_duration(59.99), "0:59");
/// ```
#[must_use]
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
