use crate::{
    error::ScanError,
    loader::ScanLoader,
    slice::SliceDecoder,
    structure_set::{MaskDict, StructureSetEngine},
    volume::Volume,
    volume_loader::VolumeLoader,
};

use chrono::NaiveDate;
use log::warn;
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Volume, organ masks and acquisition metadata of one patient directory.
#[derive(Clone, Debug)]
pub struct PatientScan {
    pub patient_id: String,
    pub volume: Volume,
    pub masks: MaskDict,
    /// (rows, columns, slices) as stored on disk
    pub dimension_original: (usize, usize, usize),
    pub spacings: (f64, f64, f64),
    pub modality: String,
    pub manufacturer: String,
    pub scanner: String,
    pub study_date: NaiveDate,
}

impl<D: SliceDecoder, E: StructureSetEngine> ScanLoader<D, E> {
    /// Load a [`PatientScan`] from `directory`.
    ///
    /// # Errors
    ///
    /// Returns error if there are no CT image slices, spacing differs between
    /// slices, there is no structure set or no ROI could be extracted
    pub fn try_load_patient_scan(
        &self,
        directory: impl AsRef<Path>,
    ) -> Result<PatientScan, ScanError> {
        let directory = directory.as_ref();
        let slices = self.image_slices(directory)?;
        let Some(first) = slices.first() else {
            return Err(ScanError::NoImageSlices(directory.to_path_buf()));
        };
        let spacings = VolumeLoader::uniform_spacing(&slices)
            .ok_or_else(|| ScanError::NonUniformSpacing(directory.to_path_buf()))?;
        let study_date = parse_study_date(&first.study_date)?;

        let volume = VolumeLoader::build_volume(directory, &slices)?
            .filter(|volume| !volume.is_empty())
            .ok_or_else(|| ScanError::NoImageSlices(directory.to_path_buf()))?;
        let masks = self
            .load_masks(directory)?
            .ok_or_else(|| ScanError::NoStructureSet(directory.to_path_buf()))?;
        if masks.is_empty() {
            return Err(ScanError::NoMasks(directory.to_path_buf()));
        }

        Ok(PatientScan {
            patient_id: first.patient_id.clone(),
            volume,
            masks,
            dimension_original: (first.rows, first.columns, slices.len()),
            spacings,
            modality: first.modality.clone(),
            manufacturer: first.manufacturer.clone(),
            scanner: first.manufacturer_model_name.clone(),
            study_date,
        })
    }

    /// Load a [`PatientScan`] from `directory`, or `None` if the directory
    /// does not hold a complete scan. The reason is logged.
    pub fn load_patient_scan(&self, directory: impl AsRef<Path>) -> Option<PatientScan> {
        let directory = directory.as_ref();
        skip_on_error(directory, self.try_load_patient_scan(directory).map(Some))
    }

    /// Lazily load a [`PatientScan`] from every subdirectory of `collection`,
    /// skipping the ones that fail.
    pub fn load_all_patient_scans(
        &self,
        collection: impl AsRef<Path>,
    ) -> ScanIter<'_, D, E, PatientScan> {
        ScanIter::new(self, collection.as_ref(), |loader, directory| {
            loader.load_patient_scan(directory)
        })
    }

    /// Lazily load the volume of every subdirectory of `collection`.
    pub fn load_all_volumes(&self, collection: impl AsRef<Path>) -> ScanIter<'_, D, E, Volume> {
        ScanIter::new(self, collection.as_ref(), |loader, directory| {
            skip_on_error(directory, loader.load_volume(directory))
        })
    }

    /// Lazily load the masks of every subdirectory of `collection`.
    pub fn load_all_masks(&self, collection: impl AsRef<Path>) -> ScanIter<'_, D, E, MaskDict> {
        ScanIter::new(self, collection.as_ref(), |loader, directory| {
            skip_on_error(directory, loader.load_masks(directory))
        })
    }

    /// Lazily list the ROI names of every subdirectory of `collection` that
    /// holds a structure set.
    pub fn load_all_roi_names(
        &self,
        collection: impl AsRef<Path>,
    ) -> ScanIter<'_, D, E, Vec<String>> {
        ScanIter::new(self, collection.as_ref(), |loader, directory| {
            skip_on_error(directory, loader.load_roi_names(directory))
        })
    }

    /// [`Self::load_all_patient_scans`] on the rayon thread pool, one
    /// subdirectory per task. Results keep subdirectory order.
    pub fn par_load_all_patient_scans(&self, collection: impl AsRef<Path>) -> Vec<PatientScan> {
        subdirectories(collection.as_ref())
            .par_iter()
            .filter_map(|directory| self.load_patient_scan(directory))
            .collect()
    }

    /// [`Self::load_all_volumes`] on the rayon thread pool.
    pub fn par_load_all_volumes(&self, collection: impl AsRef<Path>) -> Vec<Volume> {
        subdirectories(collection.as_ref())
            .par_iter()
            .filter_map(|directory| skip_on_error(directory, self.load_volume(directory)))
            .collect()
    }

    /// [`Self::load_all_masks`] on the rayon thread pool.
    pub fn par_load_all_masks(&self, collection: impl AsRef<Path>) -> Vec<MaskDict> {
        subdirectories(collection.as_ref())
            .par_iter()
            .filter_map(|directory| skip_on_error(directory, self.load_masks(directory)))
            .collect()
    }
}

fn skip_on_error<T>(directory: &Path, result: Result<Option<T>, ScanError>) -> Option<T> {
    result.unwrap_or_else(|err| {
        warn!("Skipping {}: {err}", directory.display());
        None
    })
}

/// Parse a DICOM `YYYYMMDD` date.
pub fn parse_study_date(value: &str) -> Result<NaiveDate, ScanError> {
    let invalid = || ScanError::InvalidStudyDate(value.to_string());
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| invalid())
}

/// Immediate subdirectories of `collection` sorted by name.
pub fn subdirectories(collection: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(collection) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("Cannot list {}: {err}", collection.display());
            return Vec::new();
        }
    };
    let mut directories: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    directories.sort();
    directories
}

/// Single-pass iterator over the subdirectories of a collection, loading one
/// directory per step and skipping directories that yield nothing.
pub struct ScanIter<'a, D, E, T> {
    loader: &'a ScanLoader<D, E>,
    directories: std::vec::IntoIter<PathBuf>,
    load: fn(&ScanLoader<D, E>, &Path) -> Option<T>,
}

impl<'a, D, E, T> ScanIter<'a, D, E, T> {
    fn new(
        loader: &'a ScanLoader<D, E>,
        collection: &Path,
        load: fn(&ScanLoader<D, E>, &Path) -> Option<T>,
    ) -> Self {
        Self {
            loader,
            directories: subdirectories(collection).into_iter(),
            load,
        }
    }
}

impl<D, E, T> Iterator for ScanIter<'_, D, E, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        for directory in self.directories.by_ref() {
            if let Some(item) = (self.load)(self.loader, &directory) {
                return Some(item);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.directories.len()))
    }
}

/// [`ScanLoader::load_all_patient_scans`] with the default loader.
pub fn load_all_patient_scans(
    collection: impl AsRef<Path>,
) -> impl Iterator<Item = PatientScan> {
    let loader = ScanLoader::default();
    subdirectories(collection.as_ref())
        .into_iter()
        .filter_map(move |directory| loader.load_patient_scan(directory))
}

/// [`ScanLoader::load_all_volumes`] with the default loader.
pub fn load_all_volumes(collection: impl AsRef<Path>) -> impl Iterator<Item = Volume> {
    let loader = ScanLoader::default();
    subdirectories(collection.as_ref())
        .into_iter()
        .filter_map(move |directory| skip_on_error(&directory, loader.load_volume(&directory)))
}

/// [`ScanLoader::load_all_masks`] with the default loader.
pub fn load_all_masks(collection: impl AsRef<Path>) -> impl Iterator<Item = MaskDict> {
    let loader = ScanLoader::default();
    subdirectories(collection.as_ref())
        .into_iter()
        .filter_map(move |directory| skip_on_error(&directory, loader.load_masks(&directory)))
}
