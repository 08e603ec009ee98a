use crate::{
    catalog::{self, classify},
    enums::SopClass,
    error::ScanError,
    slice::{SliceDecoder, SliceRecord},
    volume::{Volume, normalize_orientation},
};

use log::debug;
use ndarray::{Array2, Axis};
use std::path::Path;

pub struct VolumeLoader;

impl VolumeLoader {
    /// Decode every slice file in `directory` and return the CT image slices
    /// in physical order. Files that cannot be decoded are skipped.
    ///
    /// # Errors
    ///
    /// Returns error if an image slice lacks the geometry needed to order it
    pub fn image_slices<D: SliceDecoder + ?Sized>(
        decoder: &D,
        directory: &Path,
        extension: &str,
    ) -> Result<Vec<SliceRecord>, ScanError> {
        let records = catalog::list_slice_files(directory, extension)
            .iter()
            .filter_map(|path| match decoder.decode(path) {
                Ok(record) => Some(record),
                Err(err) => {
                    debug!("Ignoring unreadable file {}: {err}", path.display());
                    None
                }
            })
            .collect();
        Self::order_slices(records)
    }

    /// Keep the CT image slices that contribute to the volume and sort them
    /// by [`SliceRecord::slice_order_key`].
    ///
    /// Slices with a thickness of exactly zero are reference slices and are
    /// dropped. Equal keys keep their input order.
    pub fn order_slices(records: Vec<SliceRecord>) -> Result<Vec<SliceRecord>, ScanError> {
        let mut images_with_order = Vec::new();
        for record in records {
            if !classify(&record, SopClass::CtImage) {
                continue;
            }
            let thickness = record
                .slice_thickness
                .ok_or_else(|| record.missing("SliceThickness"))?;
            if thickness == 0.0 {
                continue;
            }
            let order = record
                .slice_order_key()
                .ok_or_else(|| record.missing("ImagePositionPatient/ImageOrientationPatient"))?;
            images_with_order.push((order, record));
        }

        images_with_order.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(images_with_order
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    /// The (x, y, z) spacing shared by every slice, or `None` if any slice
    /// differs or lacks spacing information.
    pub fn uniform_spacing(slices: &[SliceRecord]) -> Option<(f64, f64, f64)> {
        let first = slices.first()?.spacing()?;
        slices
            .iter()
            .all(|slice| slice.spacing() == Some(first))
            .then_some(first)
    }

    /// Stack ordered slices into an oriented (H, W, D) volume in Hounsfield
    /// units. `None` if there are no slices.
    ///
    /// # Errors
    ///
    /// Returns error if slices lack pixel data or dimensions are inconsistent
    pub fn build_volume(
        directory: &Path,
        slices: &[SliceRecord],
    ) -> Result<Option<Volume>, ScanError> {
        if slices.is_empty() {
            return Ok(None);
        }

        let images = slices
            .iter()
            .map(|slice| {
                slice
                    .rescaled_pixels()
                    .ok_or_else(|| slice.missing("PixelData"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::validate_dimensions(directory, &images)?;

        let views: Vec<_> = images.iter().map(|image| image.view()).collect();
        let volume_array = ndarray::stack(Axis(2), &views)
            .map_err(|_| ScanError::InconsistentDimensions(directory.to_path_buf()))?;

        Ok(Some(Volume::new(normalize_orientation(volume_array))))
    }

    fn validate_dimensions(directory: &Path, images: &[Array2<f32>]) -> Result<(), ScanError> {
        let first_dim = images[0].dim();
        if images.iter().any(|img| img.dim() != first_dim) {
            return Err(ScanError::InconsistentDimensions(directory.to_path_buf()));
        }
        Ok(())
    }
}
