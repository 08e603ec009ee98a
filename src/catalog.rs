use crate::{enums::SopClass, slice::SliceRecord};

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const DICOM_EXTENSION: &str = "dcm";

/// All files below `directory`, recursively and sorted by file name within
/// each directory. A missing directory yields an empty list.
pub fn list_files(directory: impl AsRef<Path>) -> Vec<PathBuf> {
    WalkDir::new(directory)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

/// Files below `directory` whose extension matches `extension`,
/// ignoring case.
pub fn list_slice_files(directory: impl AsRef<Path>, extension: &str) -> Vec<PathBuf> {
    list_files(directory)
        .into_iter()
        .filter(|path| has_extension(path, extension))
        .collect()
}

/// Whether `record` declares the content type `class`.
pub fn classify(record: &SliceRecord, class: SopClass) -> bool {
    record.is_type(class)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}
