pub mod annotation;
pub mod contours;
pub mod preprocessing;
pub mod shapes;

use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use tracing::{debug, info};

use crate::actuator::ActuatorDispatcher;
use crate::error::DetectionError;
use crate::models::{Contour, Detection};
use crate::state::{Decision, InspectionState};

/// Label anchor used when a contour has no area to take a centroid from.
pub const FALLBACK_LABEL_POINT: (i32, i32) = (10, 10);

/// Detection parameters
#[derive(Debug, Clone)]
pub struct DetectionParams {
    pub min_area: f64,
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            min_area: 500.0,
            blur_sigma: preprocessing::KERNEL_5X5_SIGMA,
            canny_low: 50.0,
            canny_high: 150.0,
        }
    }
}

/// Result of running one frame through the engine.
#[derive(Debug)]
pub struct FrameAnalysis {
    pub annotated: RgbImage,
    pub detection: Option<Detection>,
    pub decision: Option<Decision>,
}

/// Turns raw frames into annotated frames and, past the debounce window,
/// counted decisions.
///
/// Holds no per-frame mutable state, so one engine can serve any number of
/// viewers concurrently.
#[derive(Debug)]
pub struct DetectionEngine {
    params: DetectionParams,
    state: Arc<InspectionState>,
    dispatcher: Option<ActuatorDispatcher>,
}

impl DetectionEngine {
    pub fn new(params: DetectionParams, state: Arc<InspectionState>) -> Self {
        Self {
            params,
            state,
            dispatcher: None,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: ActuatorDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn params(&self) -> &DetectionParams {
        &self.params
    }

    pub fn state(&self) -> &Arc<InspectionState> {
        &self.state
    }

    /// Annotate `frame` and count its part if the cooldown allows it.
    ///
    /// Never fails: a frame that cannot be analyzed comes back unannotated.
    pub fn process_frame(&self, frame: &RgbImage) -> FrameAnalysis {
        let mut annotated = frame.clone();

        let detection = match self.detect(frame) {
            Ok(detection) => detection,
            Err(err) => {
                debug!("skipping frame: {err}");
                None
            }
        };
        let Some(detection) = detection else {
            return FrameAnalysis {
                annotated,
                detection: None,
                decision: None,
            };
        };

        annotation::draw_contour(&mut annotated, &detection.contour, annotation::OUTLINE_COLOR);

        let decision = self
            .state
            .evaluate(detection.shape, detection.area, Instant::now());
        if let Some(decision) = &decision {
            info!(
                id = %decision.id,
                shape = %decision.shape,
                area = decision.area,
                verdict = %decision.verdict,
                "part inspected"
            );
            if let Some(dispatcher) = &self.dispatcher {
                dispatcher.dispatch(decision);
            }
        }

        annotation::draw_label(
            &mut annotated,
            detection.centroid,
            &detection.label(),
            annotation::LABEL_COLOR,
        );

        FrameAnalysis {
            annotated,
            detection: Some(detection),
            decision,
        }
    }

    /// Find and classify the largest qualifying silhouette without touching
    /// the shared state.
    pub fn detect(&self, frame: &RgbImage) -> Result<Option<Detection>, DetectionError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(DetectionError::EmptyFrame {
                width: frame.width(),
                height: frame.height(),
            });
        }

        let candidates = self.contours(frame);
        let count = candidates.len();
        let Some((contour, area)) = contours::select_largest(candidates, self.params.min_area)
        else {
            debug!(contours = count, "no contour above minimum area");
            return Ok(None);
        };

        let shape = shapes::classify(&contour);
        let centroid = contour.centroid().unwrap_or(FALLBACK_LABEL_POINT);
        debug!(contours = count, %shape, area, "selected contour");

        Ok(Some(Detection {
            shape,
            area,
            centroid,
            contour,
        }))
    }

    /// External contours of the frame's edge map.
    pub fn contours(&self, frame: &RgbImage) -> Vec<Contour> {
        let edges = preprocessing::edge_map(
            frame,
            self.params.blur_sigma,
            self.params.canny_low,
            self.params.canny_high,
        );
        contours::find_external_contours(&edges)
    }
}
