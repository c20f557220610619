//! Archive extraction for release bundles
//!
//! The format is detected from the file contents rather than the URL, since
//! release servers commonly hand out signed URLs without an extension.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use zip::ZipArchive;

use crate::error::ExtractError;

/// Mode applied to every extracted file
pub const EXTRACTED_FILE_MODE: u32 = 0o755;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
    Tar,
}

impl ArchiveFormat {
    /// Identify an archive by its leading bytes
    pub fn sniff(header: &[u8]) -> Option<Self> {
        if header.starts_with(b"PK\x03\x04") || header.starts_with(b"PK\x05\x06") {
            Some(ArchiveFormat::Zip)
        } else if header.starts_with(&[0x1f, 0x8b]) {
            Some(ArchiveFormat::TarGz)
        } else if header.len() >= 262 && &header[257..262] == b"ustar" {
            Some(ArchiveFormat::Tar)
        } else {
            None
        }
    }
}

/// Extract `archive_path` into `target_dir` without blocking the runtime
pub async fn extract_archive(archive_path: &Path, target_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let archive_path = archive_path.to_path_buf();
    let target_dir = target_dir.to_path_buf();
    tokio::task::spawn_blocking(move || extract_archive_blocking(&archive_path, &target_dir)).await?
}

/// Synchronous extraction; returns the paths of extracted regular files
pub fn extract_archive_blocking(archive_path: &Path, target_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let mut file = File::open(archive_path)?;
    let mut header = Vec::with_capacity(512);
    (&mut file).take(512).read_to_end(&mut header)?;
    file.seek(SeekFrom::Start(0))?;

    let format = ArchiveFormat::sniff(&header).ok_or(ExtractError::UnknownFormat)?;
    std::fs::create_dir_all(target_dir)?;

    let files = match format {
        ArchiveFormat::Zip => extract_zip(file, target_dir)?,
        ArchiveFormat::TarGz => extract_tar(Archive::new(GzDecoder::new(BufReader::new(file))), target_dir)?,
        ArchiveFormat::Tar => extract_tar(Archive::new(BufReader::new(file)), target_dir)?,
    };

    for path in &files {
        set_mode(path)?;
    }
    Ok(files)
}

fn extract_zip(file: File, target_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    let mut files = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ExtractError::UnsafePath(entry.name().to_string()))?;
        let out_path = target_dir.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&out_path)?;
        std::io::copy(&mut entry, &mut outfile)?;
        files.push(out_path);
    }
    Ok(files)
}

fn extract_tar<R: Read>(mut archive: Archive<R>, target_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    archive.set_preserve_permissions(false);
    let mut files = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let relative = entry.path()?.into_owned();
        let is_file = entry.header().entry_type().is_file();

        // unpack_in refuses entries that would land outside target_dir
        if !entry.unpack_in(target_dir)? {
            return Err(ExtractError::UnsafePath(relative.display().to_string()));
        }
        if is_file {
            files.push(target_dir.join(relative));
        }
    }
    Ok(files)
}

#[cfg(unix)]
fn set_mode(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(EXTRACTED_FILE_MODE))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, body) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *body).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, body) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(body).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn sniffs_known_formats() {
        assert_eq!(ArchiveFormat::sniff(b"PK\x03\x04rest"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::sniff(&[0x1f, 0x8b, 8, 0]), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::sniff(b"<html>"), None);
    }

    #[test]
    fn extracts_tar_gz_with_nested_paths() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bundle.tar.gz");
        std::fs::write(&archive, tar_gz(&[("index.html", b"<h1>hi</h1>"), ("js/game.js", b"run()")])).unwrap();

        let target = dir.path().join("out");
        let files = extract_archive_blocking(&archive, &target).unwrap();

        assert_eq!(files, vec![target.join("index.html"), target.join("js/game.js")]);
        assert_eq!(std::fs::read_to_string(target.join("js/game.js")).unwrap(), "run()");
    }

    #[test]
    fn extracts_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bundle");
        std::fs::write(&archive, zip_bytes(&[("assets/a.txt", b"a"), ("b.txt", b"b")])).unwrap();

        let target = dir.path().join("out");
        let files = extract_archive_blocking(&archive, &target).unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(std::fs::read_to_string(target.join("assets/a.txt")).unwrap(), "a");
    }

    #[cfg(unix)]
    #[test]
    fn extracted_files_are_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bundle.tar.gz");
        std::fs::write(&archive, tar_gz(&[("run.sh", b"#!/bin/sh")])).unwrap();

        let target = dir.path().join("out");
        extract_archive_blocking(&archive, &target).unwrap();
        let mode = std::fs::metadata(target.join("run.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, EXTRACTED_FILE_MODE);
    }

    #[test]
    fn rejects_unknown_payload() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("not-an-archive");
        std::fs::write(&archive, b"<html>502 Bad Gateway</html>").unwrap();

        let err = extract_archive_blocking(&archive, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, ExtractError::UnknownFormat));
    }
}
