//! Directory-scan primitives shared by the store and the resource resolver.
//!
//! A directory that does not exist scans as empty.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::card::SCHEMA_MARKER;
use crate::error::{Result, StoreError};

/// True if `name` matches the card key grammar `<prefix>_<suffix>`,
/// with a lowercase alphabetic prefix and a base-36 suffix.
pub fn is_card_key(name: &str) -> bool {
    if name == SCHEMA_MARKER {
        return false;
    }
    match name.split_once('_') {
        Some((prefix, suffix)) => {
            !prefix.is_empty()
                && !suffix.is_empty()
                && prefix.bytes().all(|b| b.is_ascii_lowercase())
                && suffix
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        }
        None => false,
    }
}

/// Subdirectories of `path` as `(name, path)` pairs, in directory-read order.
pub async fn list_directories(path: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    let mut entries = match fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(dirs),
        Err(e) => return Err(StoreError::read(path, e)),
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StoreError::read(path, e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| StoreError::read(entry.path(), e))?;
        if !file_type.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            dirs.push((name.to_string(), entry.path()));
        }
    }

    Ok(dirs)
}

/// Regular files directly inside `path`. With `extension`, only files carrying
/// it are returned. The schema marker is always skipped.
pub async fn list_files(path: &Path, extension: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = match fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
        Err(e) => return Err(StoreError::read(path, e)),
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StoreError::read(path, e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| StoreError::read(entry.path(), e))?;
        if !file_type.is_file() || entry.file_name() == SCHEMA_MARKER {
            continue;
        }
        let file = entry.path();
        let wanted = match extension {
            Some(ext) => file.extension().and_then(|e| e.to_str()) == Some(ext),
            None => true,
        };
        if wanted {
            files.push(file);
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_card_key_grammar() {
        assert!(is_card_key("proj_ab12cd34"));
        assert!(is_card_key("base_1"));
        assert!(!is_card_key("proj"));
        assert!(!is_card_key("proj_"));
        assert!(!is_card_key("_abc"));
        assert!(!is_card_key("Proj_abc"));
        assert!(!is_card_key("proj_ab-c"));
        assert!(!is_card_key(".schema"));
        assert!(!is_card_key("c"));
        assert!(!is_card_key("a"));
    }

    #[tokio::test]
    async fn test_missing_directory_scans_empty() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");
        assert!(list_directories(&missing).await.unwrap().is_empty());
        assert!(list_files(&missing, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_directories_and_files() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("one")).unwrap();
        std::fs::create_dir(temp.path().join("two")).unwrap();
        std::fs::write(temp.path().join("a.json"), "{}").unwrap();
        std::fs::write(temp.path().join("b.txt"), "x").unwrap();
        std::fs::write(temp.path().join(".schema"), "{}").unwrap();

        let mut dirs: Vec<String> = list_directories(temp.path())
            .await
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        dirs.sort();
        assert_eq!(dirs, vec!["one", "two"]);

        let json = list_files(temp.path(), Some("json")).await.unwrap();
        assert_eq!(json, vec![temp.path().join("a.json")]);

        let all = list_files(temp.path(), None).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
