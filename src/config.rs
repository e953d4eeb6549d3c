use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::actuator::ActuationPlan;
use crate::capture::{CameraSource, CaptureSettings};
use crate::detection::DetectionParams;
use crate::models::Shape;
use crate::state::{DEFAULT_EXPECTED_AREA, DEFAULT_TOLERANCE, ExpectedSpec};
use crate::stream::StreamSettings;

/// Process configuration, read once at start-up from flags or the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "shapesort")]
#[command(about = "Inspect parts on a camera feed and sort them by shape and area")]
pub struct Config {
    /// Base URL of the actuator board
    #[arg(long, env = "ACTUATOR_BASE_URL", default_value = "http://192.168.100.15")]
    pub actuator_base_url: String,

    /// Initial camera: a device index, an image file or directory, a video file or a stream URI
    #[arg(long, env = "CAMERA_INDEX", default_value = "0")]
    pub camera: CameraSource,

    /// Smallest contour area considered a part, in px²
    #[arg(long, env = "MIN_CONTOUR_AREA", default_value_t = 500.0)]
    pub min_contour_area: f64,

    /// Seconds between two counted parts
    #[arg(long, env = "DETECTION_COOLDOWN_S", default_value_t = 2.0)]
    pub cooldown_secs: f64,

    /// Address of the HTTP server
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,

    #[arg(long, env = "JPEG_QUALITY", default_value_t = 80,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: u8,

    /// Playback rate of image sources
    #[arg(long, env = "FRAME_RATE", default_value_t = 30.0)]
    pub frame_rate: f64,

    /// Stop at the end of an image sequence or video file instead of looping
    #[arg(long)]
    pub no_loop: bool,

    /// Per-request actuator timeout in seconds
    #[arg(long, env = "ACTUATOR_TIMEOUT_S", default_value_t = 3.0)]
    pub actuator_timeout_secs: f64,

    /// Seconds the indicator stays lit after a decision
    #[arg(long, env = "ACTUATOR_SETTLE_S", default_value_t = 2.0)]
    pub settle_secs: f64,

    #[arg(long, env = "EXPECTED_SHAPE", default_value = "Rectangle")]
    pub expected_shape: Shape,

    #[arg(long, env = "EXPECTED_AREA", default_value_t = DEFAULT_EXPECTED_AREA)]
    pub expected_area: f64,

    #[arg(long, env = "TOLERANCE", default_value_t = DEFAULT_TOLERANCE)]
    pub tolerance: f64,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    pub fn cooldown(&self) -> Duration {
        seconds(self.cooldown_secs, Duration::ZERO)
    }

    pub fn initial_expected(&self) -> ExpectedSpec {
        ExpectedSpec::sanitized(self.expected_shape, self.expected_area, self.tolerance)
    }

    pub fn detection_params(&self) -> DetectionParams {
        DetectionParams {
            min_area: self.min_contour_area.max(0.0),
            ..DetectionParams::default()
        }
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            frame_rate: self.frame_rate,
            loop_playback: !self.no_loop,
            ..CaptureSettings::default()
        }
    }

    pub fn actuation_plan(&self) -> ActuationPlan {
        ActuationPlan {
            settle: seconds(self.settle_secs, Duration::ZERO),
            ..ActuationPlan::default()
        }
    }

    pub fn actuator_timeout(&self) -> Duration {
        seconds(self.actuator_timeout_secs, crate::actuator::http::DEFAULT_TIMEOUT)
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            jpeg_quality: self.jpeg_quality,
            ..StreamSettings::default()
        }
    }
}

// negative, non-finite or overflowing input falls back
fn seconds(value: f64, fallback: Duration) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(fallback)
}
