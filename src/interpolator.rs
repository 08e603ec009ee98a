use crate::enums::Interpolation;

use ndarray::{Array3, ArrayView3, Axis};
use rayon::prelude::*;

/// Resamples a 3D array so that every voxel covers 1 x 1 x 1 spacing units.
pub trait Resampler {
    fn resample(
        &self,
        array: ArrayView3<'_, f32>,
        spacings: (f64, f64, f64),
        interpolation: Interpolation,
    ) -> Array3<f32>;
}

/// CPU resampler on a regular grid. Output voxel `i` along an axis samples
/// the source at `i / spacing`; samples past the last source voxel are 0.
#[derive(Clone, Copy, Debug, Default)]
pub struct GridResampler;

impl GridResampler {
    pub fn get_isotropic_dimensions(
        spacing: (f64, f64, f64),
        original_dim: (usize, usize, usize),
    ) -> (usize, usize, usize) {
        let scale = |size: usize, spacing: f64| (size as f64 * spacing).round().max(0.0) as usize;
        (
            scale(original_dim.0, spacing.0),
            scale(original_dim.1, spacing.1),
            scale(original_dim.2, spacing.2),
        )
    }

    #[inline]
    fn nearest(array: &ArrayView3<'_, f32>, position: [f64; 3]) -> f32 {
        let (h, w, d) = array.dim();
        let index = position.map(|p| p.round() as usize);
        if index[0] >= h || index[1] >= w || index[2] >= d {
            return 0.0;
        }
        array[index]
    }

    #[inline]
    fn trilinear_interpolate(array: &ArrayView3<'_, f32>, position: [f64; 3]) -> f32 {
        let (h, w, d) = array.dim();
        let upper = [h, w, d];
        if (0..3).any(|axis| position[axis] > (upper[axis] - 1) as f64 + 1e-9) {
            return 0.0;
        }

        let mut low = [0; 3];
        let mut high = [0; 3];
        let mut weight = [0.0f32; 3];
        for axis in 0..3 {
            low[axis] = (position[axis].floor() as usize).min(upper[axis] - 1);
            high[axis] = (low[axis] + 1).min(upper[axis] - 1);
            weight[axis] = (position[axis] - low[axis] as f64).clamp(0.0, 1.0) as f32;
        }
        let [y0, x0, z0] = low;
        let [y1, x1, z1] = high;
        let [dy, dx, dz] = weight;

        let lerp = |a: f32, b: f32, t: f32| a.mul_add(1.0 - t, b * t);
        let plane = |z: usize| {
            let v0 = lerp(array[[y0, x0, z]], array[[y0, x1, z]], dx);
            let v1 = lerp(array[[y1, x0, z]], array[[y1, x1, z]], dx);
            lerp(v0, v1, dy)
        };

        lerp(plane(z0), plane(z1), dz)
    }
}

impl Resampler for GridResampler {
    fn resample(
        &self,
        array: ArrayView3<'_, f32>,
        spacings: (f64, f64, f64),
        interpolation: Interpolation,
    ) -> Array3<f32> {
        let shape = Self::get_isotropic_dimensions(spacings, array.dim());
        let mut output = Array3::zeros(shape);
        if array.is_empty() {
            return output;
        }

        let (sy, sx, sz) = spacings;
        output
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(y, mut plane)| {
                for ((x, z), value) in plane.indexed_iter_mut() {
                    let position = [y as f64 / sy, x as f64 / sx, z as f64 / sz];
                    *value = match interpolation {
                        Interpolation::Nearest => Self::nearest(&array, position),
                        Interpolation::Linear => Self::trilinear_interpolate(&array, position),
                    };
                }
            });
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, array};

    #[test]
    fn isotropic_dimensions_scale_with_spacing() {
        assert_eq!(
            GridResampler::get_isotropic_dimensions((0.5, 0.5, 2.0), (10, 10, 4)),
            (5, 5, 8)
        );
        assert_eq!(
            GridResampler::get_isotropic_dimensions((1.0, 1.0, 1.0), (3, 4, 5)),
            (3, 4, 5)
        );
    }

    #[test]
    fn unit_spacing_is_identity() {
        let source = Array3::from_shape_fn((2, 3, 4), |(y, x, z)| (y * 12 + x * 4 + z) as f32);
        for interpolation in [Interpolation::Nearest, Interpolation::Linear] {
            let output = GridResampler.resample(source.view(), (1.0, 1.0, 1.0), interpolation);
            assert_eq!(output, source);
        }
    }

    #[test]
    fn linear_upsampling_interpolates_depth() {
        let source = array![[[0.0f32, 10.0]]];
        let output = GridResampler.resample(source.view(), (1.0, 1.0, 2.0), Interpolation::Linear);
        assert_eq!(output.dim(), (1, 1, 4));
        assert_eq!(output[[0, 0, 0]], 0.0);
        assert_eq!(output[[0, 0, 1]], 5.0);
        assert_eq!(output[[0, 0, 2]], 10.0);
        // past the last source slice
        assert_eq!(output[[0, 0, 3]], 0.0);
    }

    #[test]
    fn nearest_downsampling_picks_voxels() {
        let source = Array3::from_shape_fn((4, 1, 1), |(y, _, _)| y as f32);
        let output = GridResampler.resample(source.view(), (0.5, 1.0, 1.0), Interpolation::Nearest);
        assert_eq!(output.dim(), (2, 1, 1));
        assert_eq!(output[[0, 0, 0]], 0.0);
        assert_eq!(output[[1, 0, 0]], 2.0);
    }
}
