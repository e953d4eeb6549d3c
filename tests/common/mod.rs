#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

pub use shapesort::capture::{ActiveCamera, CameraSource, CaptureSettings};
pub use shapesort::models::{Contour, Shape, Verdict};
pub use shapesort::state::{ExpectedSpec, InspectionState};
