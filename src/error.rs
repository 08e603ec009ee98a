use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("No image slices found in {0}")]
    NoImageSlices(PathBuf),

    #[error("No RT structure set found in {0}")]
    NoStructureSet(PathBuf),

    #[error("No organ masks could be extracted from {0}")]
    NoMasks(PathBuf),

    #[error("Non-uniform spacing across slices in {0}")]
    NonUniformSpacing(PathBuf),

    #[error("Inconsistent image dimensions in {0}")]
    InconsistentDimensions(PathBuf),

    #[error("{path} is missing {attribute}")]
    MissingAttribute {
        path: PathBuf,
        attribute: &'static str,
    },

    #[error("Invalid study date {0:?}")]
    InvalidStudyDate(String),

    #[error("Failed to extract mask for ROI {name:?}: {reason}")]
    RoiExtraction { name: String, reason: String },

    #[error("Failed to delete {path}: {source}")]
    Delete {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}
