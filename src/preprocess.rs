//! Array helpers applied to loaded scans before training.

use crate::{
    enums::Interpolation,
    interpolator::{GridResampler, Resampler},
};

use ndarray::{Array, Array3, ArrayView3, Dimension, s};
use std::ops::RangeInclusive;

/// Inclusive index ranges along (H, W, D).
pub type BoundingBox3d = [RangeInclusive<usize>; 3];

/// Affinely map values from the interval `from` onto `to`.
pub fn map_interval<D: Dimension>(
    array: &Array<f32, D>,
    from: (f64, f64),
    to: (f64, f64),
) -> Array<f64, D> {
    let scale = (to.1 - to.0) / (from.1 - from.0);
    array.mapv(|value| (value as f64 - from.0) * scale + to.0)
}

/// Standardise to zero mean and unit (population) standard deviation.
///
/// A constant array maps to zeros.
pub fn z_score_scale<D: Dimension>(array: &Array<f32, D>) -> Array<f64, D> {
    let Some(mean) = array.mapv(f64::from).mean() else {
        return array.mapv(|_| 0.0);
    };
    let std = array.mapv(f64::from).std(0.0);
    if std == 0.0 {
        return array.mapv(|_| 0.0);
    }
    array.mapv(|value| (value as f64 - mean) / std)
}

/// Smallest box holding every `true` voxel of `mask`, or `None` if there is
/// none.
pub fn bounding_box_3d(mask: &Array3<bool>) -> Option<BoundingBox3d> {
    let mut lower = [usize::MAX; 3];
    let mut upper = [0; 3];
    let mut found = false;
    for ((y, x, z), _) in mask.indexed_iter().filter(|(_, value)| **value) {
        found = true;
        for (axis, index) in [y, x, z].into_iter().enumerate() {
            lower[axis] = lower[axis].min(index);
            upper[axis] = upper[axis].max(index);
        }
    }
    found.then(|| [lower[0]..=upper[0], lower[1]..=upper[1], lower[2]..=upper[2]])
}

/// Owned copy of `array` restricted to `bbox`.
///
/// # Panics
///
/// Panics if `bbox` lies outside `array`.
pub fn crop_to_bbox_3d<A: Clone>(array: ArrayView3<'_, A>, bbox: &BoundingBox3d) -> Array3<A> {
    let [h, w, d] = bbox;
    array
        .slice(s![
            *h.start()..=*h.end(),
            *w.start()..=*w.end(),
            *d.start()..=*d.end()
        ])
        .to_owned()
}

/// Resample `array` to 1 x 1 x 1 voxels with the built-in [`GridResampler`].
pub fn make_isotropic(
    array: ArrayView3<'_, f32>,
    spacings: (f64, f64, f64),
    interpolation: Interpolation,
) -> Array3<f32> {
    make_isotropic_with(&GridResampler, array, spacings, interpolation)
}

pub fn make_isotropic_with<R: Resampler + ?Sized>(
    resampler: &R,
    array: ArrayView3<'_, f32>,
    spacings: (f64, f64, f64),
    interpolation: Interpolation,
) -> Array3<f32> {
    resampler.resample(array, spacings, interpolation)
}

/// [`make_isotropic`] for a binary mask, always nearest neighbour.
pub fn make_mask_isotropic(mask: &Array3<bool>, spacings: (f64, f64, f64)) -> Array3<bool> {
    let values = mask.mapv(|v| if v { 1.0 } else { 0.0 });
    make_isotropic(values.view(), spacings, Interpolation::Nearest).mapv(|v| v > 0.5)
}
