use crate::enums::Orientation;

use ndarray::{Array3, ArrayView2, Axis, s};

/// A CT volume of shape (height, width, depth) in Hounsfield units.
///
/// Width increases left to right, height top to bottom and depth head to
/// feet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Volume {
    pub data: Array3<f32>,
}

impl Volume {
    pub fn new(data: Array3<f32>) -> Self {
        Self { data }
    }

    /// Get the dimensions of the volume (height, width, depth)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Get a mutable reference to the underlying data
    pub fn data_mut(&mut self) -> &mut Array3<f32> {
        &mut self.data
    }

    pub fn into_inner(self) -> Array3<f32> {
        self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
    ) -> Option<ArrayView2<'_, f32>> {
        if !self.is_valid_index(index, orientation) {
            return None;
        }
        let slice = match orientation {
            Orientation::Axial => self.data.slice(s![.., .., index]),
            Orientation::Coronal => self.data.slice(s![index, .., ..]),
            Orientation::Sagittal => self.data.slice(s![.., index, ..]),
        };
        Some(slice)
    }

    fn is_valid_index(&self, index: usize, orientation: Orientation) -> bool {
        let (height, width, depth) = self.dim();
        let max_index = match orientation {
            Orientation::Axial => depth,
            Orientation::Coronal => height,
            Orientation::Sagittal => width,
        };
        index < max_index
    }
}

/// Converts an (H, W, D) array from DICOM patient axes (width right to left,
/// depth feet to head) to the canonical orientation by flipping depth and
/// then width. Applying it twice is the identity.
pub fn normalize_orientation<A: Clone>(array: Array3<A>) -> Array3<A> {
    let mut array = array;
    array.invert_axis(Axis(2));
    array.invert_axis(Axis(1));
    array.as_standard_layout().into_owned()
}
