use crate::{catalog, enums::SopClass, error::ScanError, slice::SliceDecoder};

use log::{debug, info};
use std::{fs, path::Path};

const KEEP: [SopClass; 2] = [SopClass::CtImage, SopClass::RtStructureSet];

/// Recursively delete every slice file below `directory` that is neither a
/// CT image nor an RT structure set. Files that cannot be decoded count as
/// neither and are deleted too.
///
/// Must not run while another pass reads the same tree.
///
/// # Errors
///
/// Returns [`ScanError::Delete`] for the first file that cannot be removed.
pub fn purge<D: SliceDecoder + ?Sized>(
    decoder: &D,
    directory: &Path,
    extension: &str,
) -> Result<usize, ScanError> {
    let mut deleted = 0;
    for path in catalog::list_slice_files(directory, extension) {
        let content_type = decoder.content_type(&path).unwrap_or_else(|err| {
            debug!("Cannot classify {}: {err}", path.display());
            None
        });
        let keep = content_type
            .as_deref()
            .is_some_and(|uid| KEEP.iter().any(|class| class.uid() == uid));
        if keep {
            continue;
        }

        info!("Removing {}", path.display());
        fs::remove_file(&path).map_err(|source| ScanError::Delete {
            path: path.clone(),
            source,
        })?;
        deleted += 1;
    }
    Ok(deleted)
}
