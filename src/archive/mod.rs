//! Archive encoding and decoding for release packages and backups.
//!
//! Supports zip and tar (plain and gzip-compressed). The format is
//! selected purely by file extension; anything else is an unsupported
//! format and a terminal error, never retried.
//!
//! All functions here are synchronous. Callers on the async path run them
//! inside `tokio::task::spawn_blocking` since archive work is CPU- and
//! IO-bound.

use crate::core::BootstrapError;
use anyhow::{Context, Result, bail};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Supported archive container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// `.zip`
    Zip,
    /// `.tar`
    Tar,
    /// `.tar.gz` / `.tgz`
    TarGz,
}

impl ArchiveFormat {
    /// Determine the format from a file name.
    ///
    /// Returns [`BootstrapError::UnsupportedFormat`] for unrecognized
    /// extensions.
    pub fn from_path(path: &Path) -> Result<Self, BootstrapError> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(Self::TarGz)
        } else if name.ends_with(".tar") {
            Ok(Self::Tar)
        } else if name.ends_with(".zip") {
            Ok(Self::Zip)
        } else {
            Err(BootstrapError::UnsupportedFormat { path: path.display().to_string() })
        }
    }
}

/// Extract every entry of an archive into `target_dir`.
///
/// Entries with absolute or parent-escaping paths are rejected, so a
/// malicious package cannot write outside the target directory.
pub fn extract_all(archive_path: &Path, target_dir: &Path) -> Result<()> {
    let format = ArchiveFormat::from_path(archive_path)?;
    debug!("Extracting {:?} archive {} -> {}", format, archive_path.display(), target_dir.display());
    std::fs::create_dir_all(target_dir)
        .with_context(|| format!("Failed to create {}", target_dir.display()))?;

    match format {
        ArchiveFormat::Zip => extract_zip(archive_path, target_dir),
        ArchiveFormat::Tar => {
            let file = open_archive(archive_path)?;
            extract_tar(file, target_dir)
        }
        ArchiveFormat::TarGz => {
            let file = open_archive(archive_path)?;
            extract_tar(GzDecoder::new(file), target_dir)
        }
    }
}

fn open_archive(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("Failed to open archive: {}", path.display()))
}

fn extract_zip(archive_path: &Path, target_dir: &Path) -> Result<()> {
    let file = open_archive(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read zip archive: {}", archive_path.display()))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).context("Failed to read zip entry")?;
        let Some(relative) = entry.enclosed_name() else {
            bail!("Zip entry has an unsafe path: {}", entry.name());
        };
        let out_path = target_dir.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)
            .with_context(|| format!("Failed to create {}", out_path.display()))?;
        std::io::copy(&mut entry, &mut out)
            .with_context(|| format!("Failed to extract {}", out_path.display()))?;
    }
    Ok(())
}

fn extract_tar<R: Read>(reader: R, target_dir: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    // unpack() already refuses entries that escape the target directory.
    archive.unpack(target_dir).context("Failed to unpack tar archive")?;
    Ok(())
}

/// Archive every file under `source_dir` into a new archive at
/// `archive_path`, with entry paths relative to the source root.
///
/// Relative entry paths are required so a backup can be re-extracted into
/// any directory and reconstruct the same tree.
pub fn create_archive(source_dir: &Path, archive_path: &Path) -> Result<()> {
    let format = ArchiveFormat::from_path(archive_path)?;
    debug!("Creating {:?} archive {} from {}", format, archive_path.display(), source_dir.display());
    if let Some(parent) = archive_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match format {
        ArchiveFormat::Zip => create_zip(source_dir, archive_path),
        ArchiveFormat::Tar => {
            let file = File::create(archive_path)?;
            create_tar(source_dir, file)?;
            Ok(())
        }
        ArchiveFormat::TarGz => {
            let file = File::create(archive_path)?;
            let encoder = create_tar(source_dir, GzEncoder::new(file, Compression::default()))?;
            encoder.finish().context("Failed to finalize gzip stream")?;
            Ok(())
        }
    }
}

fn create_zip(source_dir: &Path, archive_path: &Path) -> Result<()> {
    let file = File::create(archive_path)
        .with_context(|| format!("Failed to create archive: {}", archive_path.display()))?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for entry in WalkDir::new(source_dir).into_iter().filter_map(std::result::Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(source_dir)
            .context("Walked path outside the source root")?;
        writer
            .start_file(relative.to_string_lossy().replace('\\', "/"), options)
            .with_context(|| format!("Failed to add entry {}", relative.display()))?;
        let mut src = File::open(entry.path())?;
        std::io::copy(&mut src, &mut writer)?;
    }

    writer.finish().context("Failed to finalize zip archive")?;
    Ok(())
}

fn create_tar<W: Write>(source_dir: &Path, writer: W) -> Result<W> {
    let mut builder = tar::Builder::new(writer);
    for entry in WalkDir::new(source_dir).into_iter().filter_map(std::result::Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(source_dir)
            .context("Walked path outside the source root")?;
        builder
            .append_path_with_name(entry.path(), relative)
            .with_context(|| format!("Failed to add entry {}", relative.display()))?;
    }
    builder.into_inner().context("Failed to finalize tar archive")
}

/// Structurally validate an archive without extracting it.
///
/// For zip this reads every entry to completion, which exercises the
/// per-entry CRC check; for tar it walks the member list. An unreadable
/// or truncated archive fails here.
pub fn validate(archive_path: &Path) -> Result<()> {
    let format = ArchiveFormat::from_path(archive_path)?;
    match format {
        ArchiveFormat::Zip => {
            let file = open_archive(archive_path)?;
            let mut archive = zip::ZipArchive::new(file).context("Corrupt zip archive")?;
            let mut sink = std::io::sink();
            for i in 0..archive.len() {
                let mut entry = archive.by_index(i).context("Corrupt zip entry")?;
                std::io::copy(&mut entry, &mut sink)
                    .with_context(|| format!("CRC check failed for entry {}", entry.name()))?;
            }
        }
        ArchiveFormat::Tar => {
            let file = open_archive(archive_path)?;
            walk_tar_members(file)?;
        }
        ArchiveFormat::TarGz => {
            let file = open_archive(archive_path)?;
            walk_tar_members(GzDecoder::new(file))?;
        }
    }
    Ok(())
}

fn walk_tar_members<R: Read>(reader: R) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries().context("Corrupt tar archive")? {
        entry.context("Corrupt tar member")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn make_tree(root: &Path) {
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("main.py"), "print('hi')").unwrap();
        fs::write(root.join("sub/data.txt"), "payload").unwrap();
    }

    #[test]
    fn format_detection_by_extension() {
        assert_eq!(ArchiveFormat::from_path(Path::new("a.zip")).unwrap(), ArchiveFormat::Zip);
        assert_eq!(ArchiveFormat::from_path(Path::new("a.tar")).unwrap(), ArchiveFormat::Tar);
        assert_eq!(ArchiveFormat::from_path(Path::new("a.tar.gz")).unwrap(), ArchiveFormat::TarGz);
        assert_eq!(ArchiveFormat::from_path(Path::new("a.tgz")).unwrap(), ArchiveFormat::TarGz);
        assert!(matches!(
            ArchiveFormat::from_path(Path::new("a.rar")),
            Err(BootstrapError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn zip_round_trip_uses_relative_paths() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        make_tree(&src);

        let archive = dir.path().join("backup.zip");
        create_archive(&src, &archive).unwrap();
        validate(&archive).unwrap();

        // Extract into a completely different location and expect the
        // same tree, proving entries were stored relative to the root.
        let out = dir.path().join("elsewhere/restored");
        extract_all(&archive, &out).unwrap();
        assert_eq!(fs::read_to_string(out.join("main.py")).unwrap(), "print('hi')");
        assert_eq!(fs::read_to_string(out.join("sub/data.txt")).unwrap(), "payload");
    }

    #[test]
    fn tar_gz_round_trip() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        make_tree(&src);

        let archive = dir.path().join("pkg.tar.gz");
        create_archive(&src, &archive).unwrap();
        validate(&archive).unwrap();

        let out = dir.path().join("out");
        extract_all(&archive, &out).unwrap();
        assert_eq!(fs::read_to_string(out.join("sub/data.txt")).unwrap(), "payload");
    }

    #[test]
    fn truncated_zip_fails_validation() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        make_tree(&src);

        let archive = dir.path().join("pkg.zip");
        create_archive(&src, &archive).unwrap();

        let bytes = fs::read(&archive).unwrap();
        fs::write(&archive, &bytes[..bytes.len() / 2]).unwrap();
        assert!(validate(&archive).is_err());
    }

    #[test]
    fn unsupported_extension_is_terminal() {
        let dir = TempDir::new().unwrap();
        let bogus = dir.path().join("pkg.7z");
        fs::write(&bogus, b"not an archive").unwrap();
        let err = extract_all(&bogus, &dir.path().join("out")).unwrap_err();
        assert!(err.to_string().contains("Unsupported archive format"));
    }
}
