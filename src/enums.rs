/// SOP classes this crate knows how to tell apart.
///
/// See <https://dicom.nema.org/dicom/2013/output/chtml/part04/sect_B.5.html>
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SopClass {
    CtImage,
    RtStructureSet,
    RtDose,
    RtPlan,
}

impl SopClass {
    pub const CT_IMAGE_UID: &'static str = "1.2.840.10008.5.1.4.1.1.2";
    pub const RT_STRUCTURE_SET_UID: &'static str = "1.2.840.10008.5.1.4.1.1.481.3";
    pub const RT_DOSE_UID: &'static str = "1.2.840.10008.5.1.4.1.1.481.2";
    pub const RT_PLAN_UID: &'static str = "1.2.840.10008.5.1.4.1.1.481.5";

    pub fn uid(self) -> &'static str {
        match self {
            SopClass::CtImage => Self::CT_IMAGE_UID,
            SopClass::RtStructureSet => Self::RT_STRUCTURE_SET_UID,
            SopClass::RtDose => Self::RT_DOSE_UID,
            SopClass::RtPlan => Self::RT_PLAN_UID,
        }
    }

    pub fn from_uid(uid: &str) -> Option<Self> {
        match uid {
            Self::CT_IMAGE_UID => Some(SopClass::CtImage),
            Self::RT_STRUCTURE_SET_UID => Some(SopClass::RtStructureSet),
            Self::RT_DOSE_UID => Some(SopClass::RtDose),
            Self::RT_PLAN_UID => Some(SopClass::RtPlan),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Axial,
    Coronal,
    Sagittal,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    Nearest,
    #[default]
    Linear,
}
