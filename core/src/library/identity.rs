//! Mapping between filesystem paths and the root-relative identifiers used in URLs.
//!
//! Identifiers are `/`-separated and never contain `.` or `..` segments. The reverse direction
//! is fed request input, so it refuses anything that could land outside the music root,
//! including symlinks that point out of it.

use std::path::{Component, Path, PathBuf};

use crate::errors::PathError;

/// Convert a path under `root` into its root-relative identifier.
///
/// # Errors
///
/// - [`PathError::Escape`] if `path` is not under `root` or walks back out of it with `..`.
/// - [`PathError::Invalid`] if a segment isn't valid UTF-8, since no URL could name it.
#[inline]
pub fn to_relative_id(path: &Path, root: &Path) -> Result<String, PathError> {
    let relative = path.strip_prefix(root).map_err(|_| PathError::Escape)?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => match segment.to_str() {
                Some(segment) => segments.push(segment),
                None => {
                    return Err(PathError::Invalid(
                        relative.to_string_lossy().into_owned(),
                    ));
                }
            },
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(PathError::Escape);
            }
        }
    }

    if segments.is_empty() {
        return Err(PathError::Invalid(String::new()));
    }

    Ok(segments.join("/"))
}

/// Check the shape of an identifier and split it into its segments.
fn segments(id: &str) -> Result<Vec<&str>, PathError> {
    let invalid = || PathError::Invalid(id.to_owned());

    if id.is_empty() || id.contains('\0') || id.contains('\\') {
        return Err(invalid());
    }
    if id.starts_with('/') {
        return Err(PathError::Escape);
    }

    id.split('/')
        .map(|segment| match segment {
            ".." => Err(PathError::Escape),
            "" | "." => Err(invalid()),
            // a segment has to be a plain file name on this platform, this catches
            // drive letters and other prefixes
            _ => match Path::new(segment).components().collect::<Vec<_>>().as_slice() {
                [Component::Normal(_)] => Ok(segment),
                _ => Err(invalid()),
            },
        })
        .collect()
}

/// Resolve a root-relative identifier from a request to a path inside `root`.
///
/// The returned path is `root` joined with the identifier, not canonicalized, so
/// `to_absolute_path(&to_relative_id(p, root)?, root) == p`.
///
/// # Errors
///
/// - [`PathError::Invalid`] for malformed identifiers (empty, empty or `.` segments, backslashes, NUL).
/// - [`PathError::Escape`] for `..` segments, absolute identifiers, and symlinks leading out of `root`.
/// - [`PathError::NotFound`] if nothing exists at the resolved path (or `root` itself is missing).
#[inline]
pub fn to_absolute_path(id: &str, root: &Path) -> Result<PathBuf, PathError> {
    let joined = segments(id)?
        .into_iter()
        .fold(root.to_path_buf(), |path, segment| path.join(segment));

    let canonical_root = root.canonicalize().map_err(|_| PathError::NotFound)?;
    let canonical = joined.canonicalize().map_err(|_| PathError::NotFound)?;

    if canonical.starts_with(&canonical_root) {
        Ok(joined)
    } else {
        Err(PathError::Escape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::{assert_eq, assert_str_eq};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn library() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Artist/Album")).unwrap();
        std::fs::write(dir.path().join("Artist/Album/01 Intro.mp3"), b"x").unwrap();
        std::fs::write(dir.path().join("top.flac"), b"x").unwrap();
        std::fs::write(dir.path().join("odd #name?.ogg"), b"x").unwrap();
        dir
    }

    #[rstest]
    #[case("Artist/Album/01 Intro.mp3")]
    #[case("top.flac")]
    #[case("odd #name?.ogg")]
    #[case("Artist")]
    fn test_round_trip(library: TempDir, #[case] relative: &str) {
        let root = library.path();
        let path = root.join(relative);

        let id = to_relative_id(&path, root).unwrap();
        assert_str_eq!(id, relative);
        assert_eq!(to_absolute_path(&id, root).unwrap(), path);
    }

    #[rstest]
    fn test_relative_id_outside_root(library: TempDir) {
        let root = library.path().join("Artist");
        assert_eq!(
            to_relative_id(&library.path().join("top.flac"), &root),
            Err(PathError::Escape)
        );
        assert_eq!(
            to_relative_id(&root.join("../top.flac"), &root),
            Err(PathError::Escape)
        );
    }

    #[rstest]
    #[case("..")]
    #[case("../etc/passwd")]
    #[case("Artist/../../etc/passwd")]
    #[case("Artist/Album/..")]
    #[case("/etc/passwd")]
    fn test_rejects_escapes(library: TempDir, #[case] id: &str) {
        assert_eq!(to_absolute_path(id, library.path()), Err(PathError::Escape));
    }

    #[rstest]
    #[case("")]
    #[case("Artist//Album")]
    #[case("./top.flac")]
    #[case("Artist/")]
    #[case("Artist\\..\\top.flac")]
    #[case("top\0.flac")]
    fn test_rejects_malformed(library: TempDir, #[case] id: &str) {
        assert!(matches!(
            to_absolute_path(id, library.path()),
            Err(PathError::Invalid(_))
        ));
    }

    #[rstest]
    fn test_missing_file(library: TempDir) {
        assert_eq!(
            to_absolute_path("Artist/nope.mp3", library.path()),
            Err(PathError::NotFound)
        );
    }

    #[rstest]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("gone");
        assert_eq!(to_absolute_path("a.mp3", &root), Err(PathError::NotFound));
    }

    #[cfg(unix)]
    #[rstest]
    fn test_non_utf8_name_has_no_id(library: TempDir) {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt as _};

        let path = library
            .path()
            .join("Artist")
            .join(OsStr::from_bytes(b"caf\xe9.mp3"));
        std::fs::write(&path, b"x").unwrap();

        assert!(matches!(
            to_relative_id(&path, library.path()),
            Err(PathError::Invalid(_))
        ));
    }

    #[cfg(unix)]
    #[rstest]
    fn test_rejects_symlink_escape(library: TempDir) {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.mp3"), b"x").unwrap();
        std::os::unix::fs::symlink(outside.path(), library.path().join("link")).unwrap();

        assert_eq!(
            to_absolute_path("link/secret.mp3", library.path()),
            Err(PathError::Escape)
        );
    }

    #[cfg(unix)]
    #[rstest]
    fn test_allows_symlink_within_root(library: TempDir) {
        std::os::unix::fs::symlink(
            library.path().join("Artist/Album"),
            library.path().join("shortcut"),
        )
        .unwrap();

        assert_eq!(
            to_absolute_path("shortcut/01 Intro.mp3", library.path()).unwrap(),
            library.path().join("shortcut/01 Intro.mp3")
        );
    }
}
