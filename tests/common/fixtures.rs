use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;
use parking_lot::Mutex;
use shapesort::actuator::{ActuatorClient, IndicatorColor, IndicatorState};
use shapesort::capture::{CameraSource, CaptureBackend, CaptureDevice, CaptureSettings};
use shapesort::error::{ActuatorError, CaptureError};
use shapesort::models::Contour;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

pub fn blank_frame(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, BLACK)
}

/// White filled rectangle on black.
pub fn frame_with_rect(width: u32, height: u32, x: i32, y: i32, w: u32, h: u32) -> RgbImage {
    let mut img = blank_frame(width, height);
    draw_filled_rect_mut(&mut img, Rect::at(x, y).of_size(w, h), WHITE);
    img
}

pub fn frame_with_circle(width: u32, height: u32, center: (i32, i32), radius: i32) -> RgbImage {
    let mut img = blank_frame(width, height);
    draw_filled_circle_mut(&mut img, center, radius, WHITE);
    img
}

pub fn frame_with_polygon(width: u32, height: u32, vertices: &[(i32, i32)]) -> RgbImage {
    let mut img = blank_frame(width, height);
    let points: Vec<Point<i32>> = vertices.iter().map(|&(x, y)| Point::new(x, y)).collect();
    draw_polygon_mut(&mut img, &points, WHITE);
    img
}

/// Closed contour tracing the polygon's edges pixel by pixel, the way a
/// border follower reports it.
pub fn polygon_contour(vertices: &[(i32, i32)]) -> Contour {
    let mut points = Vec::new();
    for (i, &(x0, y0)) in vertices.iter().enumerate() {
        let (x1, y1) = vertices[(i + 1) % vertices.len()];
        let steps = (x1 - x0).abs().max((y1 - y0).abs()).max(1);
        for s in 0..steps {
            let t = s as f64 / steps as f64;
            let x = x0 as f64 + (x1 - x0) as f64 * t;
            let y = y0 as f64 + (y1 - y0) as f64 * t;
            let p = Point::new(x.round() as i32, y.round() as i32);
            if points.last() != Some(&p) {
                points.push(p);
            }
        }
    }
    Contour::new(points)
}

pub fn circle_contour(center: (i32, i32), radius: f64, samples: usize) -> Contour {
    let mut points: Vec<Point<i32>> = Vec::with_capacity(samples);
    for i in 0..samples {
        let angle = i as f64 / samples as f64 * std::f64::consts::TAU;
        let p = Point::new(
            center.0 + (radius * angle.cos()).round() as i32,
            center.1 + (radius * angle.sin()).round() as i32,
        );
        if points.last() != Some(&p) {
            points.push(p);
        }
    }
    Contour::new(points)
}

/// Capture settings with short timings for tests.
pub fn fast_capture_settings() -> CaptureSettings {
    CaptureSettings {
        retry_delay: Duration::from_millis(2),
        stop_timeout: Duration::from_millis(500),
        frame_rate: 200.0,
        loop_playback: true,
    }
}

/// Color a fake source paints its frames with, so tests can tell sources apart.
pub fn source_color(source: &CameraSource) -> Rgb<u8> {
    match source {
        CameraSource::Index(i) => Rgb([(*i as u8).wrapping_mul(40), 10, 10]),
        CameraSource::Path(p) => Rgb([10, (p.len() as u8).wrapping_mul(20), 10]),
    }
}

/// Backend producing solid frames for any source except the ones marked broken.
#[derive(Default)]
pub struct FakeBackend {
    broken: HashSet<CameraSource>,
    pub opened: Mutex<Vec<CameraSource>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_broken(mut self, source: CameraSource) -> Self {
        self.broken.insert(source);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl CaptureBackend for FakeBackend {
    fn open(&self, source: &CameraSource) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        if self.broken.contains(source) {
            return Err(CaptureError::unavailable(source, "device not present"));
        }
        self.opened.lock().push(source.clone());
        Ok(Box::new(SolidDevice {
            image: RgbImage::from_pixel(32, 24, source_color(source)),
        }))
    }
}

struct SolidDevice {
    image: RgbImage,
}

impl CaptureDevice for SolidDevice {
    fn read_frame(&mut self) -> Result<RgbImage, CaptureError> {
        thread::sleep(Duration::from_millis(2));
        Ok(self.image.clone())
    }
}

/// Backend that opens every source with the device built by `make`.
pub struct DeviceBackend<F> {
    make: F,
}

impl<F> DeviceBackend<F>
where
    F: Fn() -> Box<dyn CaptureDevice> + Send + Sync + 'static,
{
    pub fn new(make: F) -> Arc<Self> {
        Arc::new(Self { make })
    }
}

impl<F> CaptureBackend for DeviceBackend<F>
where
    F: Fn() -> Box<dyn CaptureDevice> + Send + Sync,
{
    fn open(&self, _source: &CameraSource) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        Ok((self.make)())
    }
}

/// Fails its first `initial_failures` reads, then every even-numbered read.
pub struct FlakyDevice {
    initial_failures: u64,
    pub reads: Arc<AtomicU64>,
}

impl FlakyDevice {
    pub fn new(initial_failures: u64, reads: Arc<AtomicU64>) -> Self {
        Self {
            initial_failures,
            reads,
        }
    }
}

impl CaptureDevice for FlakyDevice {
    fn read_frame(&mut self) -> Result<RgbImage, CaptureError> {
        let read = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        thread::sleep(Duration::from_millis(1));
        if read <= self.initial_failures || read % 2 == 0 {
            return Err(CaptureError::TransientRead(format!("read {read} dropped")));
        }
        Ok(RgbImage::from_pixel(16, 12, Rgb([read as u8, 0, 0])))
    }
}

/// Delivers one frame, then blocks every further read for `stall`.
pub struct HungDevice {
    stall: Duration,
    delivered: bool,
}

impl HungDevice {
    pub fn new(stall: Duration) -> Self {
        Self {
            stall,
            delivered: false,
        }
    }
}

impl CaptureDevice for HungDevice {
    fn read_frame(&mut self) -> Result<RgbImage, CaptureError> {
        if self.delivered {
            thread::sleep(self.stall);
        }
        self.delivered = true;
        Ok(RgbImage::from_pixel(16, 12, WHITE))
    }
}

/// Actuator client that records every command with the (tokio) time it was sent.
#[derive(Default)]
pub struct RecordingActuator {
    pub commands: Mutex<Vec<(String, tokio::time::Instant)>>,
    failing: HashSet<&'static str>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every command of `kind` ("servo", "led" or "log") fail.
    pub fn failing(mut self, kind: &'static str) -> Self {
        self.failing.insert(kind);
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.commands.lock().iter().map(|(c, _)| c.clone()).collect()
    }

    fn record(&self, kind: &'static str, command: String) -> Result<String, ActuatorError> {
        self.commands.lock().push((command.clone(), tokio::time::Instant::now()));
        if self.failing.contains(kind) {
            return Err(ActuatorError::Status {
                url: format!("http://actuator.test/{kind}"),
                status: 503,
            });
        }
        Ok(format!("OK {command}"))
    }
}

#[async_trait]
impl ActuatorClient for RecordingActuator {
    async fn set_position(&self, angle: i32) -> Result<String, ActuatorError> {
        self.record("servo", format!("servo {angle}"))
    }

    async fn set_indicator(
        &self,
        color: IndicatorColor,
        state: IndicatorState,
    ) -> Result<String, ActuatorError> {
        self.record("led", format!("led {} {}", color.as_str(), state.as_str()))
    }

    async fn log(&self, message: &str) -> Result<String, ActuatorError> {
        self.record("log", format!("log {message}"))
    }
}
