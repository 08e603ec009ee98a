use crate::{
    catalog,
    enums::SopClass,
    error::ScanError,
    slice::SliceDecoder,
    volume::normalize_orientation,
};

use log::{debug, warn};
use ndarray::Array3;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

/// Binary organ mask of shape (H, W, D).
pub type Mask = Array3<bool>;

/// Organ masks keyed by standardised ROI name.
pub type MaskDict = HashMap<String, Mask>;

/// Builds extraction handles for RT structure set files.
pub trait StructureSetEngine: Send + Sync {
    type Handle: StructureSetHandle;

    fn build(&self, series_dir: &Path, structure_file: &Path) -> Result<Self::Handle, ScanError>;
}

/// ROI access for one structure set bound to its image series.
pub trait StructureSetHandle {
    fn organ_names(&self) -> Vec<String>;

    /// Mask of ROI `name` in the series' native orientation, shape
    /// (rows, columns, slices).
    fn mask_for(&self, name: &str) -> Result<Mask, ScanError>;
}

/// Lower-case `name` and join its whitespace-separated words with `_`.
pub fn standardise_roi_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

pub struct MaskLoader;

impl MaskLoader {
    /// Slice files in `directory` that declare the RT structure set type.
    /// Files that cannot be read are skipped.
    pub fn structure_set_files<D: SliceDecoder + ?Sized>(
        decoder: &D,
        directory: &Path,
        extension: &str,
    ) -> Vec<PathBuf> {
        catalog::list_slice_files(directory, extension)
            .into_iter()
            .filter(|path| match decoder.content_type(path) {
                Ok(uid) => uid.as_deref() == Some(SopClass::RT_STRUCTURE_SET_UID),
                Err(err) => {
                    debug!("Ignoring unreadable file {}: {err}", path.display());
                    false
                }
            })
            .collect()
    }

    /// Handle for the first structure set in `directory`, or `None` if there
    /// is none. Any further structure sets are ignored with a warning.
    pub fn first_structure_set<D, E>(
        decoder: &D,
        engine: &E,
        directory: &Path,
        extension: &str,
    ) -> Result<Option<E::Handle>, ScanError>
    where
        D: SliceDecoder + ?Sized,
        E: StructureSetEngine + ?Sized,
    {
        let files = Self::structure_set_files(decoder, directory, extension);
        let Some(first) = files.first() else {
            return Ok(None);
        };
        if files.len() > 1 {
            warn!(
                "Multiple RT struct files found in {}! Using the first one at {}...",
                directory.display(),
                first.display()
            );
        }
        engine.build(directory, first).map(Some)
    }

    /// Extract every ROI of `handle` into oriented masks.
    ///
    /// ROIs whose extraction fails are logged and left out.
    pub fn masks_from_handle<H: StructureSetHandle + ?Sized>(handle: &H) -> MaskDict {
        handle
            .organ_names()
            .into_iter()
            .filter_map(|name| match handle.mask_for(&name) {
                Ok(mask) => Some((standardise_roi_name(&name), normalize_orientation(mask))),
                Err(err) => {
                    warn!("Dropping ROI {name:?}: {err}");
                    None
                }
            })
            .collect()
    }
}
