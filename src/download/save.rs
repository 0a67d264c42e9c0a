// PodFetch - Podcast Episode Download Client
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Saving payloads into the download directory
//!
//! The payload is first written to a staging file next to its destination.
//! The staging file is a `NamedTempFile`, so it is removed on every path that
//! does not end in a successful persist, errors and panics included. Existing
//! files are never overwritten: `name (1).ext`, `name (2).ext` ... are tried.

use crate::error::{ClientError, Result};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Highest ` (n)` suffix tried before giving up
const MAX_COLLISION_SUFFIX: u32 = 9999;

/// A payload that reached its final location
#[derive(Debug, Clone, PartialEq)]
pub struct SavedFile {
    pub path: PathBuf,
    pub filename: String,
    pub size: u64,
}

/// `name.ext` for 0, `name (n).ext` otherwise
pub fn numbered_name(filename: &str, n: u32) -> String {
    if n == 0 {
        return filename.to_string();
    }
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{} ({}).{}", stem, n, ext),
        _ => format!("{} ({})", filename, n),
    }
}

/// Write `data` into `dir` under `filename` or the first free numbered variant
pub async fn save_payload(dir: &Path, filename: &str, data: Vec<u8>) -> Result<SavedFile> {
    if filename.is_empty() || filename.contains(['/', '\\']) {
        return Err(ClientError::invalid_input(format!(
            "Not a plain file name: '{}'",
            filename
        )));
    }

    let dir = dir.to_path_buf();
    let filename = filename.to_string();

    let saved = tokio::task::spawn_blocking(move || save_blocking(&dir, &filename, &data)).await??;

    info!(path = %saved.path.display(), bytes = saved.size, "file saved");
    Ok(saved)
}

fn save_blocking(dir: &Path, filename: &str, data: &[u8]) -> Result<SavedFile> {
    std::fs::create_dir_all(dir)?;

    let mut staged = tempfile::Builder::new()
        .prefix(".podfetch-")
        .suffix(".part")
        .tempfile_in(dir)?;
    staged.write_all(data)?;
    staged.as_file().sync_all()?;

    let mut n = 0;
    loop {
        let name = numbered_name(filename, n);
        let target = dir.join(&name);

        if target.exists() {
            n += 1;
        } else {
            match staged.persist_noclobber(&target) {
                Ok(_) => {
                    return Ok(SavedFile {
                        path: target,
                        filename: name,
                        size: data.len() as u64,
                    })
                }
                // lost a race with another writer
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                    staged = e.file;
                    n += 1;
                }
                Err(e) => return Err(ClientError::IoError(e.error)),
            }
        }

        if n > MAX_COLLISION_SUFFIX {
            return Err(ClientError::DownloadFailed(format!(
                "No free file name for '{}' in {}",
                filename,
                dir.display()
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_numbered_name() {
        assert_eq!(numbered_name("report.mp3", 0), "report.mp3");
        assert_eq!(numbered_name("report.mp3", 1), "report (1).mp3");
        assert_eq!(numbered_name("a.b.m4a", 2), "a.b (2).m4a");
        assert_eq!(numbered_name("README", 3), "README (3)");
        assert_eq!(numbered_name(".hidden", 1), ".hidden (1)");
    }

    #[tokio::test]
    async fn test_save_and_collision() {
        let dir = TempDir::new().unwrap();

        let first = save_payload(dir.path(), "ep.mp3", b"one".to_vec()).await.unwrap();
        assert_eq!(first.filename, "ep.mp3");
        assert_eq!(std::fs::read(&first.path).unwrap(), b"one");

        let second = save_payload(dir.path(), "ep.mp3", b"two".to_vec()).await.unwrap();
        assert_eq!(second.filename, "ep (1).mp3");
        assert_eq!(second.size, 3);

        // first file untouched
        assert_eq!(std::fs::read(&first.path).unwrap(), b"one");
    }

    #[tokio::test]
    async fn test_no_staging_files_left_behind() {
        let dir = TempDir::new().unwrap();
        save_payload(dir.path(), "ep.mp3", vec![0; 1024]).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["ep.mp3".to_string()]);
    }

    #[tokio::test]
    async fn test_rejects_path_names() {
        let dir = TempDir::new().unwrap();
        let err = save_payload(dir.path(), "../x.mp3", vec![]).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let saved = save_payload(&nested, "ep.mp3", b"x".to_vec()).await.unwrap();
        assert!(saved.path.starts_with(&nested));
    }
}
