pub mod actuator;
pub mod capture;
pub mod config;
pub mod detection;
pub mod error;
pub mod models;
pub mod server;
pub mod state;
pub mod stream;

pub use actuator::{ActuationPlan, ActuatorClient, ActuatorDispatcher, HttpActuatorClient};
pub use capture::{ActiveCamera, CameraSource, CaptureBackend, CaptureSettings, SystemCapture};
pub use config::Config;
pub use detection::{DetectionEngine, DetectionParams, FrameAnalysis};
pub use error::{ActuatorError, CaptureError, DetectionError, SpecInputError};
pub use models::{Contour, Detection, Shape, Verdict};
pub use state::{ExpectedSpec, InspectionSnapshot, InspectionState};
pub use stream::{StreamPublisher, StreamSettings};
