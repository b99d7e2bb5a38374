//! File utility functions for naming and replacing files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::distr::Alphanumeric;

/// Characters that are rejected in file names on at least one major platform.
const INVALID_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replaces characters that are not valid in file names with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if INVALID_FILE_NAME_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Returns `path` if it does not exist, otherwise the first free
/// `<stem>_<n>.<ext>` sibling.
pub fn unique_file_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    (1usize..)
        .map(|n| {
            let name = match &extension {
                Some(ext) => format!("{stem}_{n}.{ext}"),
                None => format!("{stem}_{n}"),
            };
            parent.join(name)
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

/// Random file name with the given extension, e.g. `k3j9x0aq2b.fits`.
pub fn random_file_name(extension: &str) -> String {
    let stem: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();
    format!("{stem}.{extension}")
}

/// Path of the temporary sibling used while `path` is being rewritten.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Moves a fully written `temp` file over `destination`.
///
/// `rename` replaces the destination in a single step, so readers never see
/// a partially written destination file.
pub fn replace_file(temp: &Path, destination: &Path) -> io::Result<()> {
    fs::rename(temp, destination)
}

/// Removes a file, treating "already gone" as success.
pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("M31-Ha"), "M31-Ha");
        assert_eq!(sanitize_file_name("a/b:c*d?"), "a_b_c_d_");
        assert_eq!(sanitize_file_name("NGC 7000"), "NGC 7000");
    }

    #[test]
    fn test_unique_file_path_free_path_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("master.fits");
        assert_eq!(unique_file_path(&path), path);
    }

    #[test]
    fn test_unique_file_path_appends_counter() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("master.fits");
        fs::write(&path, b"x").unwrap();
        fs::write(dir.path().join("master_1.fits"), b"x").unwrap();

        assert_eq!(unique_file_path(&path), dir.path().join("master_2.fits"));
    }

    #[test]
    fn test_temp_path_for() {
        let path = Path::new("/stacks/M31-L.fits");
        assert_eq!(temp_path_for(path), PathBuf::from("/stacks/M31-L.fits.tmp"));
    }

    #[test]
    fn test_replace_file_overwrites_destination() {
        let dir = TempDir::new().unwrap();
        let dst = dir.path().join("stack.fits");
        let tmp = temp_path_for(&dst);
        fs::write(&dst, b"old").unwrap();
        fs::write(&tmp, b"new").unwrap();

        replace_file(&tmp, &dst).unwrap();

        assert_eq!(fs::read(&dst).unwrap(), b"new");
        assert!(!tmp.exists());
    }

    #[test]
    fn test_remove_file_if_exists_missing_is_ok() {
        let dir = TempDir::new().unwrap();
        assert!(remove_file_if_exists(&dir.path().join("missing.fits")).is_ok());
    }

    #[test]
    fn test_random_file_name_has_extension() {
        let name = random_file_name("fits");
        assert!(name.ends_with(".fits"));
        assert_eq!(name.len(), 12 + ".fits".len());
    }
}
