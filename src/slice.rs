use crate::{enums::SopClass, error::ScanError};

use dicom::{
    core::Tag,
    object::{DefaultDicomObject, InMemDicomObject, OpenFileOptions},
    pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder},
};
use dicom_dictionary_std::tags;
use ndarray::{Array2, s};
use std::path::{Path, PathBuf};

/// Everything this crate needs from one slice file.
///
/// Textual attributes that are absent decode as empty strings. Geometry is
/// kept optional: whether a missing value is fatal depends on what the slice
/// is used for.
#[derive(Clone, Debug)]
pub struct SliceRecord {
    pub path: PathBuf,
    pub sop_class_uid: Option<String>,
    pub sop_instance_uid: String,
    pub patient_id: String,
    pub modality: String,
    pub manufacturer: String,
    pub manufacturer_model_name: String,
    pub study_date: String,
    pub rows: usize,
    pub columns: usize,
    /// (row spacing, column spacing) in mm
    pub pixel_spacing: Option<[f64; 2]>,
    pub slice_thickness: Option<f64>,
    pub image_orientation: Option<[f64; 6]>,
    pub image_position: Option<[f64; 3]>,
    pub rescale_slope: f64,
    pub rescale_intercept: f64,
    /// Raw stored values of the first frame, shape (rows, columns)
    pub pixels: Option<Array2<f32>>,
}

impl Default for SliceRecord {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            sop_class_uid: None,
            sop_instance_uid: String::new(),
            patient_id: String::new(),
            modality: String::new(),
            manufacturer: String::new(),
            manufacturer_model_name: String::new(),
            study_date: String::new(),
            rows: 0,
            columns: 0,
            pixel_spacing: None,
            slice_thickness: None,
            image_orientation: None,
            image_position: None,
            rescale_slope: 1.0,
            rescale_intercept: 0.0,
            pixels: None,
        }
    }
}

impl SliceRecord {
    /// Whether the record declares `class`. Records without a SOP Class UID
    /// never match.
    pub fn is_type(&self, class: SopClass) -> bool {
        self.sop_class_uid.as_deref() == Some(class.uid())
    }

    /// Normal of the slice plane: cross product of the row and column
    /// direction cosines.
    pub fn normal(&self) -> Option<[f64; 3]> {
        let iop = self.image_orientation?;
        Some(cross([iop[0], iop[1], iop[2]], [iop[3], iop[4], iop[5]]))
    }

    /// Position of the slice along its normal, `dot(position, normal)`.
    pub fn slice_order_key(&self) -> Option<f64> {
        let position = self.image_position?;
        Some(dot(position, self.normal()?))
    }

    /// (pixel spacing x, pixel spacing y, slice thickness)
    pub fn spacing(&self) -> Option<(f64, f64, f64)> {
        let [x, y] = self.pixel_spacing?;
        Some((x, y, self.slice_thickness?))
    }

    /// Pixel values converted with `value * slope + intercept`.
    pub fn rescaled_pixels(&self) -> Option<Array2<f32>> {
        let slope = self.rescale_slope as f32;
        let intercept = self.rescale_intercept as f32;
        self.pixels
            .as_ref()
            .map(|pixels| pixels.mapv(|value| value * slope + intercept))
    }

    pub(crate) fn missing(&self, attribute: &'static str) -> ScanError {
        ScanError::MissingAttribute {
            path: self.path.clone(),
            attribute,
        }
    }
}

pub(crate) fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub(crate) fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Turns a slice file into a [`SliceRecord`].
pub trait SliceDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<SliceRecord, ScanError>;

    /// SOP Class UID of the file, if it declares one. Implementations may
    /// override this to skip reading pixel data.
    fn content_type(&self, path: &Path) -> Result<Option<String>, ScanError> {
        self.decode(path).map(|record| record.sop_class_uid)
    }
}

/// [`SliceDecoder`] backed by the dicom-rs object reader.
#[derive(Clone, Copy, Debug, Default)]
pub struct DicomSliceDecoder;

impl SliceDecoder for DicomSliceDecoder {
    fn decode(&self, path: &Path) -> Result<SliceRecord, ScanError> {
        let object = OpenFileOptions::new().open_file(path)?;
        Ok(Self::record_from_object(path, &object))
    }

    fn content_type(&self, path: &Path) -> Result<Option<String>, ScanError> {
        let object = OpenFileOptions::new()
            .read_until(tags::PIXEL_DATA)
            .open_file(path)?;
        Ok(get_string(&object, tags::SOP_CLASS_UID))
    }
}

impl DicomSliceDecoder {
    fn record_from_object(path: &Path, object: &DefaultDicomObject) -> SliceRecord {
        SliceRecord {
            path: path.to_path_buf(),
            sop_class_uid: get_string(object, tags::SOP_CLASS_UID),
            sop_instance_uid: get_string(object, tags::SOP_INSTANCE_UID).unwrap_or_default(),
            patient_id: get_string(object, tags::PATIENT_ID).unwrap_or_default(),
            modality: get_string(object, tags::MODALITY).unwrap_or_default(),
            manufacturer: get_string(object, tags::MANUFACTURER).unwrap_or_default(),
            manufacturer_model_name: get_string(object, tags::MANUFACTURER_MODEL_NAME)
                .unwrap_or_default(),
            study_date: get_string(object, tags::STUDY_DATE).unwrap_or_default(),
            rows: get_usize(object, tags::ROWS).unwrap_or_default(),
            columns: get_usize(object, tags::COLUMNS).unwrap_or_default(),
            pixel_spacing: get_array(object, tags::PIXEL_SPACING),
            slice_thickness: get_f64(object, tags::SLICE_THICKNESS),
            image_orientation: get_array(object, tags::IMAGE_ORIENTATION_PATIENT),
            image_position: get_array(object, tags::IMAGE_POSITION_PATIENT),
            rescale_slope: get_f64(object, tags::RESCALE_SLOPE).unwrap_or(1.0),
            rescale_intercept: get_f64(object, tags::RESCALE_INTERCEPT).unwrap_or(0.0),
            pixels: Self::decode_pixels(object),
        }
    }

    fn decode_pixels(object: &DefaultDicomObject) -> Option<Array2<f32>> {
        object.element(tags::PIXEL_DATA).ok()?;
        let pixel_data = object.decode_pixel_data().ok()?;
        let options = ConvertOptions::new().with_modality_lut(ModalityLutOption::None);
        pixel_data
            .to_ndarray_with_options::<f32>(&options)
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]))
    }
}

pub(crate) fn get_string(object: &InMemDicomObject, tag: Tag) -> Option<String> {
    let value = object.element(tag).ok()?.to_str().ok()?;
    let value = value.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    Some(value.to_string())
}

fn get_f64(object: &InMemDicomObject, tag: Tag) -> Option<f64> {
    object.element(tag).ok()?.to_float64().ok()
}

pub(crate) fn get_usize(object: &InMemDicomObject, tag: Tag) -> Option<usize> {
    object
        .element(tag)
        .ok()?
        .to_int::<u32>()
        .ok()
        .map(|value| value as usize)
}

pub(crate) fn get_floats(object: &InMemDicomObject, tag: Tag) -> Option<Vec<f64>> {
    object.element(tag).ok()?.to_multi_float64().ok()
}

fn get_array<const N: usize>(object: &InMemDicomObject, tag: Tag) -> Option<[f64; N]> {
    let values = get_floats(object, tag)?;
    values.get(..N)?.try_into().ok()
}
