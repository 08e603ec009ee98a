//! RT Structure Set contours rasterized onto their image series.

use crate::{
    catalog::DICOM_EXTENSION,
    error::ScanError,
    slice::{DicomSliceDecoder, SliceDecoder, SliceRecord, dot, get_floats, get_string},
    structure_set::{Mask, StructureSetEngine, StructureSetHandle},
    volume_loader::VolumeLoader,
};

use dicom::object::{InMemDicomObject, OpenFileOptions};
use dicom_dictionary_std::tags;
use log::debug;
use ndarray::{ArrayViewMut2, Axis};
use std::{collections::HashMap, path::Path};

const CLOSED_PLANAR: &str = "CLOSED_PLANAR";

/// The default [`StructureSetEngine`].
///
/// The image series is read with the same ordering rules as the volume, so
/// masks line up with it slice for slice.
#[derive(Clone, Debug)]
pub struct RtStructEngine<D = DicomSliceDecoder> {
    decoder: D,
    extension: String,
}

impl Default for RtStructEngine {
    fn default() -> Self {
        Self::new(DicomSliceDecoder)
    }
}

impl<D: SliceDecoder> RtStructEngine<D> {
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            extension: DICOM_EXTENSION.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }
}

impl<D: SliceDecoder> StructureSetEngine for RtStructEngine<D> {
    type Handle = RtStruct;

    fn build(&self, series_dir: &Path, structure_file: &Path) -> Result<RtStruct, ScanError> {
        let slices = VolumeLoader::image_slices(&self.decoder, series_dir, &self.extension)?;
        let series = SeriesGeometry::from_slices(series_dir, &slices)?;
        let object = OpenFileOptions::new().open_file(structure_file)?;
        let rois = read_rois(&object);
        debug!(
            "Read {} ROIs from {} against {} slices",
            rois.len(),
            structure_file.display(),
            series.slices.len()
        );
        Ok(RtStruct { series, rois })
    }
}

#[derive(Clone, Debug)]
struct SliceGeometry {
    sop_instance_uid: String,
    position: [f64; 3],
    order_key: f64,
}

#[derive(Clone, Debug)]
struct SeriesGeometry {
    rows: usize,
    columns: usize,
    row_direction: [f64; 3],
    column_direction: [f64; 3],
    normal: [f64; 3],
    /// (row spacing, column spacing)
    pixel_spacing: [f64; 2],
    thickness: f64,
    slices: Vec<SliceGeometry>,
}

impl SeriesGeometry {
    fn from_slices(directory: &Path, slices: &[SliceRecord]) -> Result<Self, ScanError> {
        let first = slices
            .first()
            .ok_or_else(|| ScanError::NoImageSlices(directory.to_path_buf()))?;
        let iop = first
            .image_orientation
            .ok_or_else(|| first.missing("ImageOrientationPatient"))?;
        let normal = first
            .normal()
            .ok_or_else(|| first.missing("ImageOrientationPatient"))?;
        let pixel_spacing = first
            .pixel_spacing
            .ok_or_else(|| first.missing("PixelSpacing"))?;

        let slices = slices
            .iter()
            .map(|slice| {
                let position = slice
                    .image_position
                    .ok_or_else(|| slice.missing("ImagePositionPatient"))?;
                Ok(SliceGeometry {
                    sop_instance_uid: slice.sop_instance_uid.clone(),
                    position,
                    order_key: dot(position, normal),
                })
            })
            .collect::<Result<Vec<_>, ScanError>>()?;

        Ok(Self {
            rows: first.rows,
            columns: first.columns,
            row_direction: [iop[0], iop[1], iop[2]],
            column_direction: [iop[3], iop[4], iop[5]],
            normal,
            pixel_spacing,
            thickness: first.slice_thickness.unwrap_or(0.0),
            slices,
        })
    }

    /// Index of the slice a contour lies on.
    fn slice_index(&self, contour: &Contour) -> Option<usize> {
        if let Some(uid) = &contour.referenced_sop_instance_uid {
            if let Some(index) = self.slices.iter().position(|s| &s.sop_instance_uid == uid) {
                return Some(index);
            }
        }
        let key = dot(*contour.points.first()?, self.normal);
        let tolerance = (self.thickness / 2.0).max(1e-3);
        self.slices
            .iter()
            .enumerate()
            .map(|(index, slice)| (index, (slice.order_key - key).abs()))
            .filter(|(_, distance)| *distance <= tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }

    /// Patient coordinates to (column, row) pixel coordinates on `slice`.
    fn to_pixel(&self, slice: &SliceGeometry, point: [f64; 3]) -> [f64; 2] {
        let offset = [
            point[0] - slice.position[0],
            point[1] - slice.position[1],
            point[2] - slice.position[2],
        ];
        [
            dot(offset, self.row_direction) / self.pixel_spacing[1],
            dot(offset, self.column_direction) / self.pixel_spacing[0],
        ]
    }
}

#[derive(Clone, Debug)]
struct Contour {
    referenced_sop_instance_uid: Option<String>,
    points: Vec<[f64; 3]>,
}

#[derive(Clone, Debug)]
struct Roi {
    name: String,
    contours: Vec<Contour>,
}

fn read_rois(object: &InMemDicomObject) -> Vec<Roi> {
    let mut contours_by_number: HashMap<i32, Vec<Contour>> = HashMap::new();
    for item in sequence_items(object, tags::ROI_CONTOUR_SEQUENCE) {
        let Some(number) = get_int(item, tags::REFERENCED_ROI_NUMBER) else {
            continue;
        };
        let contours = sequence_items(item, tags::CONTOUR_SEQUENCE)
            .iter()
            .filter_map(read_contour);
        contours_by_number.entry(number).or_default().extend(contours);
    }

    sequence_items(object, tags::STRUCTURE_SET_ROI_SEQUENCE)
        .iter()
        .filter_map(|item| {
            let number = get_int(item, tags::ROI_NUMBER)?;
            let name = get_string(item, tags::ROI_NAME)?;
            Some(Roi {
                name,
                contours: contours_by_number.remove(&number).unwrap_or_default(),
            })
        })
        .collect()
}

fn read_contour(item: &InMemDicomObject) -> Option<Contour> {
    let geometric_type = get_string(item, tags::CONTOUR_GEOMETRIC_TYPE);
    if geometric_type.is_some_and(|t| t != CLOSED_PLANAR) {
        return None;
    }
    let data = get_floats(item, tags::CONTOUR_DATA)?;
    let points: Vec<[f64; 3]> = data
        .chunks_exact(3)
        .map(|p| [p[0], p[1], p[2]])
        .collect();
    if points.len() < 3 {
        return None;
    }
    let referenced_sop_instance_uid = sequence_items(item, tags::CONTOUR_IMAGE_SEQUENCE)
        .first()
        .and_then(|image| get_string(image, tags::REFERENCED_SOP_INSTANCE_UID));
    Some(Contour {
        referenced_sop_instance_uid,
        points,
    })
}

fn sequence_items(object: &InMemDicomObject, tag: dicom::core::Tag) -> &[InMemDicomObject] {
    object
        .element(tag)
        .ok()
        .and_then(|element| element.items())
        .unwrap_or(&[])
}

fn get_int(object: &InMemDicomObject, tag: dicom::core::Tag) -> Option<i32> {
    object.element(tag).ok()?.to_int::<i32>().ok()
}

/// A structure set bound to its image series.
#[derive(Clone, Debug)]
pub struct RtStruct {
    series: SeriesGeometry,
    rois: Vec<Roi>,
}

impl StructureSetHandle for RtStruct {
    fn organ_names(&self) -> Vec<String> {
        self.rois.iter().map(|roi| roi.name.clone()).collect()
    }

    fn mask_for(&self, name: &str) -> Result<Mask, ScanError> {
        let failure = |reason: &str| ScanError::RoiExtraction {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        let roi = self
            .rois
            .iter()
            .find(|roi| roi.name == name)
            .ok_or_else(|| failure("no such ROI"))?;
        if roi.contours.is_empty() {
            return Err(failure("ROI has no closed planar contours"));
        }

        let series = &self.series;
        let mut polygons_by_slice: HashMap<usize, Vec<Vec<[f64; 2]>>> = HashMap::new();
        for contour in &roi.contours {
            let index = series
                .slice_index(contour)
                .ok_or_else(|| failure("contour does not lie on any image slice"))?;
            let slice = &series.slices[index];
            let polygon = contour
                .points
                .iter()
                .map(|point| series.to_pixel(slice, *point))
                .collect();
            polygons_by_slice.entry(index).or_default().push(polygon);
        }

        let mut mask = Mask::from_elem((series.rows, series.columns, series.slices.len()), false);
        for (index, polygons) in polygons_by_slice {
            fill_polygons(mask.index_axis_mut(Axis(2), index), &polygons);
        }
        Ok(mask)
    }
}

/// Even-odd scanline fill of pixel centres, polygons given as (column, row).
fn fill_polygons(mut plane: ArrayViewMut2<'_, bool>, polygons: &[Vec<[f64; 2]>]) {
    let (rows, columns) = plane.dim();
    if columns == 0 {
        return;
    }
    let mut crossings = Vec::new();
    for row in 0..rows {
        let y = row as f64;
        crossings.clear();
        for polygon in polygons {
            for (i, a) in polygon.iter().enumerate() {
                let b = polygon[(i + 1) % polygon.len()];
                if (a[1] <= y) != (b[1] <= y) {
                    crossings.push(a[0] + (y - a[1]) * (b[0] - a[0]) / (b[1] - a[1]));
                }
            }
        }
        crossings.sort_by(f64::total_cmp);
        for pair in crossings.chunks_exact(2) {
            let start = pair[0].ceil().max(0.0);
            let end = pair[1].floor().min((columns - 1) as f64);
            if start > end {
                continue;
            }
            for column in start as usize..=end as usize {
                plane[[row, column]] = true;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        enums::SopClass,
        slice::tests::{ct_elements, text, write_dicom},
    };
    use dicom::core::{DataElement, VR, value::DataSetSequence};
    use ndarray::Array2;

    /// Square covering pixel row 1, columns 1 and 2 of the test slices,
    /// which start at (-10, -20) with 0.5 mm rows and 0.75 mm columns.
    const SQUARE: [[f64; 2]; 4] = [
        [-9.625, -19.75],
        [-8.125, -19.75],
        [-8.125, -19.25],
        [-9.625, -19.25],
    ];

    fn contour_item(z: f64, referenced_uid: Option<&str>) -> InMemDicomObject {
        let data = SQUARE
            .iter()
            .map(|[x, y]| format!("{x}\\{y}\\{z}"))
            .collect::<Vec<_>>()
            .join("\\");
        let mut elements = vec![
            text(tags::CONTOUR_GEOMETRIC_TYPE, VR::CS, CLOSED_PLANAR),
            text(tags::NUMBER_OF_CONTOUR_POINTS, VR::IS, "4"),
            text(tags::CONTOUR_DATA, VR::DS, &data),
        ];
        if let Some(uid) = referenced_uid {
            let image = InMemDicomObject::from_element_iter([text(
                tags::REFERENCED_SOP_INSTANCE_UID,
                VR::UI,
                uid,
            )]);
            elements.push(DataElement::new(
                tags::CONTOUR_IMAGE_SEQUENCE,
                VR::SQ,
                DataSetSequence::from(vec![image]),
            ));
        }
        InMemDicomObject::from_element_iter(elements)
    }

    /// Writes an RT structure set with ROIs `(number, name, contours)`.
    pub(crate) fn write_rtstruct(path: &Path, rois: Vec<(i32, &str, Vec<InMemDicomObject>)>) {
        let mut roi_items = Vec::new();
        let mut contour_items = Vec::new();
        for (number, name, contours) in rois {
            roi_items.push(InMemDicomObject::from_element_iter([
                text(tags::ROI_NUMBER, VR::IS, &number.to_string()),
                text(tags::ROI_NAME, VR::LO, name),
            ]));
            contour_items.push(InMemDicomObject::from_element_iter([
                text(tags::REFERENCED_ROI_NUMBER, VR::IS, &number.to_string()),
                DataElement::new(
                    tags::CONTOUR_SEQUENCE,
                    VR::SQ,
                    DataSetSequence::from(contours),
                ),
            ]));
        }
        write_dicom(
            path,
            SopClass::RT_STRUCTURE_SET_UID,
            "1.2.3.100",
            vec![
                DataElement::new(
                    tags::STRUCTURE_SET_ROI_SEQUENCE,
                    VR::SQ,
                    DataSetSequence::from(roi_items),
                ),
                DataElement::new(
                    tags::ROI_CONTOUR_SEQUENCE,
                    VR::SQ,
                    DataSetSequence::from(contour_items),
                ),
            ],
        );
    }

    /// Two CT slices at z = 0 and z = 2 plus a structure set with an
    /// "Organ 1" square on z = 2, an empty "Organ 2" and an off-series
    /// "Organ 3".
    pub(crate) fn write_patient(dir: &Path) {
        let pixels = [0, 10, 20, 30, 40, 50];
        write_dicom(
            &dir.join("ct_1.dcm"),
            SopClass::CT_IMAGE_UID,
            "1.2.3.1",
            ct_elements(2.0, &pixels),
        );
        write_dicom(
            &dir.join("ct_2.dcm"),
            SopClass::CT_IMAGE_UID,
            "1.2.3.2",
            ct_elements(0.0, &pixels),
        );
        write_rtstruct(
            &dir.join("rs.dcm"),
            vec![
                (1, "Organ 1", vec![contour_item(2.0, None)]),
                (2, "Organ 2", vec![]),
                (3, "Organ 3", vec![contour_item(40.0, None)]),
            ],
        );
    }

    fn build(dir: &Path) -> RtStruct {
        RtStructEngine::default()
            .build(dir, &dir.join("rs.dcm"))
            .unwrap()
    }

    #[test]
    fn rasterizes_contour_on_matching_slice() {
        let dir = tempfile::tempdir().unwrap();
        write_patient(dir.path());

        let rt_struct = build(dir.path());
        assert_eq!(rt_struct.organ_names(), vec!["Organ 1", "Organ 2", "Organ 3"]);

        let mask = rt_struct.mask_for("Organ 1").unwrap();
        assert_eq!(mask.dim(), (2, 3, 2));
        assert_eq!(mask.iter().filter(|v| **v).count(), 2);
        assert!(mask[[1, 1, 1]]);
        assert!(mask[[1, 2, 1]]);
    }

    #[test]
    fn unusable_rois_fail() {
        let dir = tempfile::tempdir().unwrap();
        write_patient(dir.path());

        let rt_struct = build(dir.path());
        for name in ["Organ 2", "Organ 3", "Missing"] {
            assert!(matches!(
                rt_struct.mask_for(name),
                Err(ScanError::RoiExtraction { .. })
            ));
        }
    }

    #[test]
    fn referenced_image_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        write_patient(dir.path());
        // z says slice 1, the reference says slice 0
        write_rtstruct(
            &dir.path().join("rs.dcm"),
            vec![(7, "Body", vec![contour_item(2.0, Some("1.2.3.2"))])],
        );

        let mask = build(dir.path()).mask_for("Body").unwrap();
        assert!(mask[[1, 1, 0]]);
        assert!(!mask[[1, 1, 1]]);
    }

    #[test]
    fn overlapping_polygons_leave_holes() {
        let mut plane = Array2::from_elem((5, 5), false);
        let outer = vec![[-0.5, -0.5], [4.5, -0.5], [4.5, 4.5], [-0.5, 4.5]];
        let inner = vec![[1.5, 1.5], [2.5, 1.5], [2.5, 2.5], [1.5, 2.5]];
        fill_polygons(plane.view_mut(), &[outer, inner]);

        assert!(plane[[0, 0]]);
        assert!(plane[[4, 4]]);
        assert!(!plane[[2, 2]]);
        assert_eq!(plane.iter().filter(|v| **v).count(), 24);
    }
}
