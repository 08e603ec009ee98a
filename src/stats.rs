use crate::patient_scan::PatientScan;

use std::{borrow::Borrow, collections::BTreeSet};

/// Mean geometry and distinct equipment over a collection of scans.
#[derive(Clone, Debug, PartialEq)]
pub struct DatasetStats {
    pub count: usize,
    /// Mean (rows, columns, slices) as stored on disk
    pub dimension_original: [f64; 3],
    /// Mean (H, W, D) of the loaded volumes
    pub dimension_actual: [f64; 3],
    pub spacings: [f64; 3],
    pub manufacturers: BTreeSet<String>,
    pub scanners: BTreeSet<String>,
}

/// Reduce `scans` to [`DatasetStats`], consuming the iterator once.
///
/// Returns `None` if `scans` is empty.
pub fn compute_dataset_stats<I>(scans: I) -> Option<DatasetStats>
where
    I: IntoIterator,
    I::Item: Borrow<PatientScan>,
{
    let mut count = 0usize;
    let mut dimension_original = [0.0; 3];
    let mut dimension_actual = [0.0; 3];
    let mut spacings = [0.0; 3];
    let mut manufacturers = BTreeSet::new();
    let mut scanners = BTreeSet::new();

    for scan in scans {
        let scan = scan.borrow();
        count += 1;

        let (rows, columns, slices) = scan.dimension_original;
        add(&mut dimension_original, [rows as f64, columns as f64, slices as f64]);
        let (h, w, d) = scan.volume.dim();
        add(&mut dimension_actual, [h as f64, w as f64, d as f64]);
        let (x, y, z) = scan.spacings;
        add(&mut spacings, [x, y, z]);

        manufacturers.insert(scan.manufacturer.clone());
        scanners.insert(scan.scanner.clone());
    }

    if count == 0 {
        return None;
    }
    let mean = |sum: [f64; 3]| sum.map(|value| value / count as f64);
    Some(DatasetStats {
        count,
        dimension_original: mean(dimension_original),
        dimension_actual: mean(dimension_actual),
        spacings: mean(spacings),
        manufacturers,
        scanners,
    })
}

fn add(sum: &mut [f64; 3], value: [f64; 3]) {
    for (s, v) in sum.iter_mut().zip(value) {
        *s += v;
    }
}
