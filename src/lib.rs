//! # DICOM-scan library
//!
//! This crate reconstructs CT volumes and organ masks from directories of
//! DICOM slice files and summarises whole collections of such directories.
//!
//! It builds on the dicom-rs ecosystem. A patient directory is expected to
//! hold the CT image slices of one series plus an RT Structure Set drawn on
//! them. The slices are:
//!  - ordered by their position along the slice normal, not by file name
//!  - rescaled to Hounsfield units
//!  - stacked into an (height, width, depth) array
//!
//! Volumes and masks share one canonical orientation: width increases left
//! to right, height top to bottom and depth head to feet.
//!
//! Every ROI of the structure set is rasterised into a binary mask keyed by
//! its standardised name (`"Left Parotid"` becomes `left_parotid`). ROIs that
//! cannot be extracted are dropped with a warning. A directory only yields a
//! [`PatientScan`] if both a volume and at least one mask could be built.
//!
//! Collections (directories of patient directories) are swept lazily or, with
//! the `par_` variants, in parallel using rayon. A broken patient directory is
//! logged and skipped without stopping the sweep.
//!
//! Diagnostics go through the `log` facade and stay silent unless the
//! application installs a logger.
//!
//! # Examples
//!
//! ## Summarising a collection
//!
//! Remove RT Dose and RT Plan files from a collection, then load every
//! patient and compute the mean geometry.
//!
//! ```no_run
//! # use dicom_scan::{ScanLoader, compute_dataset_stats};
//! let loader = ScanLoader::default();
//! loader.purge("collection").expect("should have purged the collection");
//!
//! let scans = loader.load_all_patient_scans("collection");
//! if let Some(stats) = compute_dataset_stats(scans) {
//!     println!("{} scans, mean spacing {:?}", stats.count, stats.spacings);
//! }
//! ```
//!
//! ## Looking at one organ
//!
//! ```no_run
//! # use dicom_scan::{Orientation, load_patient_scan};
//! let scan = load_patient_scan("collection/patient_1").expect("should have loaded the scan");
//! let centre = scan.volume.dim().2 / 2;
//! let axial = scan
//!     .volume
//!     .get_slice_from_axis(centre, Orientation::Axial)
//!     .expect("should have returned the centre slice");
//! println!("{:?} {:?}", axial.dim(), scan.masks.keys());
//! ```

pub mod catalog;
pub mod enums;
pub mod error;
pub mod interpolator;
pub mod loader;
pub mod patient_scan;
pub mod preprocess;
pub mod purify;
pub mod rtstruct;
pub mod slice;
pub mod stats;
pub mod structure_set;
pub mod volume;
pub mod volume_loader;

pub use enums::{Interpolation, Orientation, SopClass};
pub use error::ScanError;
pub use loader::{ScanLoader, load_masks, load_patient_scan, load_volume, purge};
pub use patient_scan::{PatientScan, load_all_masks, load_all_patient_scans, load_all_volumes};
pub use rtstruct::RtStructEngine;
pub use slice::{DicomSliceDecoder, SliceDecoder, SliceRecord};
pub use stats::{DatasetStats, compute_dataset_stats};
pub use structure_set::{Mask, MaskDict, StructureSetEngine, StructureSetHandle};
pub use volume::Volume;
