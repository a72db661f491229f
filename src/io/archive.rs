//! Zip archives: detection, extraction into staging folders and compression of staged output.

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::Result;

/// File extensions read and written as zip archives.
pub const ARCHIVE_EXTENSIONS: [&str; 2] = ["zip", "kmz"];

pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            extensions
                .iter()
                .any(|expected| extension.eq_ignore_ascii_case(expected))
        })
}

pub fn is_archive(path: &Path) -> bool {
    has_extension(path, &ARCHIVE_EXTENSIONS)
}

/// Unpack every member of `archive_path` below `target_folder`.
pub fn extract(archive_path: &Path, target_folder: &Path) -> Result<()> {
    log::debug!(
        "extracting archive (archive_path={}, target_folder={})",
        archive_path.display(),
        target_folder.display()
    );
    let mut archive = ZipArchive::new(BufReader::new(File::open(archive_path)?))?;
    archive.extract(target_folder)?;
    Ok(())
}

/// Every regular file below `folder`, in a stable order.
pub fn list_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(folder).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

/// Pack every file below `source_folder` into a new archive at `archive_path`, with member
/// names relative to `source_folder`.
pub fn compress(source_folder: &Path, archive_path: &Path) -> Result<()> {
    let mut writer = ZipWriter::new(BufWriter::new(File::create(archive_path)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for path in list_files(source_folder)? {
        let name = path
            .strip_prefix(source_folder)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        writer.start_file(name, options)?;
        io::copy(&mut File::open(&path)?, &mut writer)?;
    }
    writer.finish()?;
    Ok(())
}
