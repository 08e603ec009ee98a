use crate::{
    catalog::DICOM_EXTENSION,
    error::ScanError,
    patient_scan::PatientScan,
    purify,
    rtstruct::RtStructEngine,
    slice::{DicomSliceDecoder, SliceDecoder, SliceRecord},
    structure_set::{MaskDict, MaskLoader, StructureSetEngine, StructureSetHandle},
    volume::Volume,
    volume_loader::VolumeLoader,
};

use std::path::Path;

/// Loads volumes, masks and patient scans from directories of slice files.
///
/// The decoder and the structure set engine are the two external
/// collaborators; both can be swapped.
#[derive(Clone, Debug)]
pub struct ScanLoader<D = DicomSliceDecoder, E = RtStructEngine> {
    decoder: D,
    engine: E,
    extension: String,
}

impl Default for ScanLoader {
    fn default() -> Self {
        Self::new(DicomSliceDecoder, RtStructEngine::default())
    }
}

impl<D, E> ScanLoader<D, E> {
    pub fn new(decoder: D, engine: E) -> Self {
        Self {
            decoder,
            engine,
            extension: DICOM_EXTENSION.to_string(),
        }
    }

    /// Extension of slice files, matched case-insensitively. Defaults to
    /// `dcm`.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }
}

impl<D: SliceDecoder, E> ScanLoader<D, E> {
    /// CT image slices of `directory` in physical order.
    pub fn image_slices(&self, directory: impl AsRef<Path>) -> Result<Vec<SliceRecord>, ScanError> {
        VolumeLoader::image_slices(&self.decoder, directory.as_ref(), &self.extension)
    }

    /// Load the (H, W, D) volume in Hounsfield units from `directory`.
    ///
    /// Returns `Ok(None)` if the directory holds no CT image slices.
    pub fn load_volume(&self, directory: impl AsRef<Path>) -> Result<Option<Volume>, ScanError> {
        let directory = directory.as_ref();
        let slices = self.image_slices(directory)?;
        VolumeLoader::build_volume(directory, &slices)
    }

    /// Delete every slice file below `directory` that is neither a CT image
    /// nor an RT structure set. Returns the number of deleted files.
    pub fn purge(&self, directory: impl AsRef<Path>) -> Result<usize, ScanError> {
        purify::purge(&self.decoder, directory.as_ref(), &self.extension)
    }
}

impl<D: SliceDecoder, E: StructureSetEngine> ScanLoader<D, E> {
    /// Load oriented organ masks from the first RT structure set in
    /// `directory`.
    ///
    /// Returns `Ok(None)` if there is no structure set and an empty map if it
    /// has no usable ROI. Masks may not have the same shape as the volume.
    pub fn load_masks(&self, directory: impl AsRef<Path>) -> Result<Option<MaskDict>, ScanError> {
        let handle = self.structure_set(directory.as_ref())?;
        Ok(handle.map(|handle| MaskLoader::masks_from_handle(&handle)))
    }

    /// Raw ROI names of the first RT structure set in `directory`.
    pub fn load_roi_names(
        &self,
        directory: impl AsRef<Path>,
    ) -> Result<Option<Vec<String>>, ScanError> {
        let handle = self.structure_set(directory.as_ref())?;
        Ok(handle.map(|handle| handle.organ_names()))
    }

    fn structure_set(&self, directory: &Path) -> Result<Option<E::Handle>, ScanError> {
        MaskLoader::first_structure_set(&self.decoder, &self.engine, directory, &self.extension)
    }
}

/// [`ScanLoader::load_volume`] with the default loader.
pub fn load_volume(directory: impl AsRef<Path>) -> Result<Option<Volume>, ScanError> {
    ScanLoader::default().load_volume(directory)
}

/// [`ScanLoader::load_masks`] with the default loader.
pub fn load_masks(directory: impl AsRef<Path>) -> Result<Option<MaskDict>, ScanError> {
    ScanLoader::default().load_masks(directory)
}

/// [`ScanLoader::load_patient_scan`] with the default loader.
pub fn load_patient_scan(directory: impl AsRef<Path>) -> Option<PatientScan> {
    ScanLoader::default().load_patient_scan(directory)
}

/// [`ScanLoader::purge`] with the default loader.
pub fn purge(directory: impl AsRef<Path>) -> Result<usize, ScanError> {
    ScanLoader::default().purge(directory)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        enums::SopClass,
        rtstruct::tests::write_patient,
        structure_set::tests::{FakeEngine, FakeStructureSet},
    };
    use ndarray::Array2;
    use std::{collections::HashMap, fs, path::PathBuf};

    /// Decoder answering from a table keyed by file name; unknown files fail
    /// to decode.
    #[derive(Clone, Default)]
    pub(crate) struct FakeDecoder {
        pub(crate) records: HashMap<String, SliceRecord>,
    }

    impl FakeDecoder {
        pub(crate) fn with(mut self, name: &str, record: SliceRecord) -> Self {
            self.records.insert(name.to_string(), record);
            self
        }
    }

    impl SliceDecoder for FakeDecoder {
        fn decode(&self, path: &Path) -> Result<SliceRecord, ScanError> {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let mut record = self.records.get(name).cloned().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, "not a DICOM file")
            })?;
            record.path = path.to_path_buf();
            Ok(record)
        }
    }

    pub(crate) fn ct_record(z: f64) -> SliceRecord {
        SliceRecord {
            sop_class_uid: Some(SopClass::CT_IMAGE_UID.to_string()),
            patient_id: "12345".to_string(),
            modality: "CT".to_string(),
            manufacturer: "GE".to_string(),
            manufacturer_model_name: "model".to_string(),
            study_date: "20171208".to_string(),
            rows: 4,
            columns: 3,
            pixel_spacing: Some([0.5, 0.5]),
            slice_thickness: Some(2.0),
            image_orientation: Some([1.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
            image_position: Some([-200.0, 200.0, z]),
            pixels: Some(Array2::zeros((4, 3))),
            ..Default::default()
        }
    }

    pub(crate) fn typed_record(uid: &str) -> SliceRecord {
        SliceRecord {
            sop_class_uid: Some(uid.to_string()),
            ..Default::default()
        }
    }

    pub(crate) fn engine(names: &[&str], failing: &[&str]) -> FakeEngine {
        FakeEngine {
            handle: FakeStructureSet {
                names: names.iter().map(|n| n.to_string()).collect(),
                failing: failing.iter().map(|n| n.to_string()).collect(),
                shape: (4, 3, 2),
                ..Default::default()
            },
        }
    }

    /// Creates empty files for every name known to `decoder`.
    pub(crate) fn touch_all(dir: &Path, decoder: &FakeDecoder) {
        for name in decoder.records.keys() {
            fs::write(dir.join(name), b"").unwrap();
        }
    }

    #[test]
    fn empty_directory_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ScanLoader::new(FakeDecoder::default(), engine(&["Organ 1"], &[]));

        assert!(loader.load_volume(dir.path()).unwrap().is_none());
        assert!(loader.load_masks(dir.path()).unwrap().is_none());
        assert!(loader.load_roi_names(dir.path()).unwrap().is_none());
    }

    #[test]
    fn loads_volume_with_one_depth_per_slice() {
        let dir = tempfile::tempdir().unwrap();
        let decoder = FakeDecoder::default()
            .with("file1.dcm", ct_record(0.0))
            .with("file2.dcm", ct_record(2.0))
            .with("file3.dcm", ct_record(4.0))
            .with("file4.dcm", ct_record(6.0));
        touch_all(dir.path(), &decoder);

        let volume = ScanLoader::new(decoder, engine(&[], &[]))
            .load_volume(dir.path())
            .unwrap()
            .unwrap();
        assert_eq!(volume.dim(), (4, 3, 4));
    }

    #[test]
    fn undecodable_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let decoder = FakeDecoder::default().with("file1.dcm", ct_record(0.0));
        touch_all(dir.path(), &decoder);
        fs::write(dir.path().join("garbage.dcm"), b"").unwrap();

        let loader = ScanLoader::new(decoder, engine(&[], &[]));
        assert_eq!(loader.load_volume(dir.path()).unwrap().unwrap().dim(), (4, 3, 1));
    }

    #[test]
    fn empty_file_next_to_real_series_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_patient(dir.path());
        fs::write(dir.path().join("zz_empty.dcm"), b"").unwrap();

        assert_eq!(load_volume(dir.path()).unwrap().unwrap().dim(), (2, 3, 2));
        assert!(load_masks(dir.path()).unwrap().unwrap().contains_key("organ_1"));
        assert!(load_patient_scan(dir.path()).is_some());
    }

    #[test]
    fn loads_masks_from_structure_set() {
        let dir = tempfile::tempdir().unwrap();
        let decoder = FakeDecoder::default()
            .with("ct.dcm", ct_record(0.0))
            .with("rs.dcm", typed_record(SopClass::RT_STRUCTURE_SET_UID));
        touch_all(dir.path(), &decoder);

        let loader = ScanLoader::new(decoder, engine(&["Organ 1", "Organ 2"], &[]));
        let masks = loader.load_masks(dir.path()).unwrap().unwrap();

        assert_eq!(masks.len(), 2);
        assert_eq!(masks["organ_1"].dim(), (4, 3, 2));
        assert!(masks.contains_key("organ_2"));
        assert_eq!(
            loader.load_roi_names(dir.path()).unwrap().unwrap(),
            vec!["Organ 1", "Organ 2"]
        );
    }

    #[test]
    fn structure_set_without_rois_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let decoder =
            FakeDecoder::default().with("rs.dcm", typed_record(SopClass::RT_STRUCTURE_SET_UID));
        touch_all(dir.path(), &decoder);

        let masks = ScanLoader::new(decoder, engine(&[], &[]))
            .load_masks(dir.path())
            .unwrap();
        assert_eq!(masks.map(|m| m.len()), Some(0));
    }

    #[test]
    fn first_of_several_structure_sets_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let decoder = FakeDecoder::default()
            .with("rs_a.dcm", typed_record(SopClass::RT_STRUCTURE_SET_UID))
            .with("rs_b.dcm", typed_record(SopClass::RT_STRUCTURE_SET_UID))
            .with("dose.dcm", typed_record(SopClass::RT_DOSE_UID));
        touch_all(dir.path(), &decoder);

        let files =
            MaskLoader::structure_set_files(&decoder, dir.path(), DICOM_EXTENSION);
        let names: Vec<PathBuf> = files
            .iter()
            .map(|p| PathBuf::from(p.file_name().unwrap()))
            .collect();
        assert_eq!(names, vec![PathBuf::from("rs_a.dcm"), PathBuf::from("rs_b.dcm")]);

        let handle = MaskLoader::first_structure_set(
            &decoder,
            &engine(&["Organ 1"], &[]),
            dir.path(),
            DICOM_EXTENSION,
        )
        .unwrap()
        .unwrap();
        assert_eq!(handle.source, dir.path().join("rs_a.dcm"));
    }

    #[test]
    fn custom_extension() {
        let dir = tempfile::tempdir().unwrap();
        let decoder = FakeDecoder::default().with("slice.ima", ct_record(0.0));
        touch_all(dir.path(), &decoder);

        let loader = ScanLoader::new(decoder, engine(&[], &[]));
        assert!(loader.load_volume(dir.path()).unwrap().is_none());
        let loader = loader.with_extension("ima");
        assert_eq!(loader.load_volume(dir.path()).unwrap().unwrap().dim(), (4, 3, 1));
    }

    #[test]
    fn default_loader_reads_real_files() {
        let dir = tempfile::tempdir().unwrap();
        write_patient(dir.path());

        let volume = load_volume(dir.path()).unwrap().unwrap();
        assert_eq!(volume.dim(), (2, 3, 2));
        // raw 50 at row 1, column 2 minus the 1024 intercept, width flipped
        assert_eq!(volume.data[[1, 0, 0]], 50.0 - 1024.0);

        let masks = load_masks(dir.path()).unwrap().unwrap();
        let mut keys: Vec<_> = masks.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["organ_1"]);
        // slice z = 2 is depth 1 natively, depth 0 once oriented
        let organ = &masks["organ_1"];
        assert!(organ[[1, 1, 0]]);
        assert!(organ[[1, 0, 0]]);
        assert!(!organ[[1, 2, 0]]);
        assert_eq!(organ.iter().filter(|v| **v).count(), 2);
    }
}
