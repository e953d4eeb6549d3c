//! Frame acquisition: a background thread per source keeps the newest frame
//! available, and [`ActiveCamera`] hot-swaps sources without disturbing readers.

pub mod file;
pub mod video;
#[cfg(feature = "webcam")]
pub mod webcam;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use image::RgbImage;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::CaptureError;

pub use file::ImageSequenceDevice;
pub use video::{VideoDevice, VideoInput};

/// Which camera or file feeds the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CameraSource {
    Index(u32),
    Path(String),
}

impl CameraSource {
    /// Index shown to operators; path sources report 0.
    pub fn display_index(&self) -> u32 {
        match self {
            CameraSource::Index(i) => *i,
            CameraSource::Path(_) => 0,
        }
    }
}

impl FromStr for CameraSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(index) = s.parse::<u32>() {
                return Ok(CameraSource::Index(index));
            }
        }
        Ok(CameraSource::Path(s.to_string()))
    }
}

impl fmt::Display for CameraSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraSource::Index(i) => write!(f, "{i}"),
            CameraSource::Path(p) => f.write_str(p),
        }
    }
}

/// One decoded frame. Shared immutably between readers.
#[derive(Debug)]
pub struct Frame {
    pub image: RgbImage,
    pub sequence: u64,
    pub captured_at: Instant,
}

/// An opened capture handle. Owned and driven by the acquisition thread only.
pub trait CaptureDevice {
    /// Block until the next frame is available.
    fn read_frame(&mut self) -> Result<RgbImage, CaptureError>;

    fn release(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }
}

/// Opens capture devices for camera sources.
pub trait CaptureBackend: Send + Sync {
    fn open(&self, source: &CameraSource) -> Result<Box<dyn CaptureDevice>, CaptureError>;
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Wait before retrying after a failed read.
    pub retry_delay: Duration,
    /// Upper bound on waiting for the acquisition thread at shutdown.
    pub stop_timeout: Duration,
    /// Playback rate for image sources. Videos play at their own rate.
    pub frame_rate: f64,
    /// Restart image sequences and video files after their last frame.
    pub loop_playback: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(10),
            stop_timeout: Duration::from_secs(1),
            frame_rate: 30.0,
            loop_playback: true,
        }
    }
}

/// Default backend: images and image directories are decoded in-process,
/// any other path or URI goes through ffmpeg. Camera indices use the native
/// `webcam` backend when that feature is enabled, ffmpeg's platform capture
/// otherwise.
#[derive(Debug, Clone, Default)]
pub struct SystemCapture {
    settings: CaptureSettings,
}

impl SystemCapture {
    pub fn new(settings: CaptureSettings) -> Self {
        Self { settings }
    }
}

impl CaptureBackend for SystemCapture {
    fn open(&self, source: &CameraSource) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        let loop_playback = self.settings.loop_playback;
        match source {
            CameraSource::Path(path) if file::is_image_source(path) => {
                Ok(Box::new(ImageSequenceDevice::open(
                    path,
                    self.settings.frame_rate,
                    loop_playback,
                )?))
            }
            CameraSource::Path(path) => Ok(Box::new(VideoDevice::open(
                VideoInput::from_path(path),
                loop_playback,
            )?)),
            #[cfg(feature = "webcam")]
            CameraSource::Index(index) => Ok(Box::new(webcam::WebcamDevice::open(*index)?)),
            #[cfg(not(feature = "webcam"))]
            CameraSource::Index(index) => Ok(Box::new(VideoDevice::open(
                VideoInput::Device(*index),
                loop_playback,
            )?)),
        }
    }
}

type FrameSlot = Arc<RwLock<Option<Arc<Frame>>>>;

/// A running acquisition loop for one source.
pub struct FrameSource {
    source: CameraSource,
    latest: FrameSlot,
    stop: Arc<AtomicBool>,
    worker: Mutex<Option<(JoinHandle<()>, mpsc::Receiver<()>)>>,
    stop_timeout: Duration,
}

impl FrameSource {
    /// Open `source` on a new acquisition thread.
    ///
    /// Returns once the device is open. If opening fails the thread has
    /// already exited and nothing keeps running.
    pub fn start(
        backend: Arc<dyn CaptureBackend>,
        source: CameraSource,
        settings: &CaptureSettings,
    ) -> Result<Self, CaptureError> {
        let latest: FrameSlot = Arc::new(RwLock::new(None));
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), CaptureError>>(1);
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let thread_source = source.clone();
        let thread_latest = latest.clone();
        let thread_stop = stop.clone();
        let retry_delay = settings.retry_delay;

        let handle = thread::Builder::new()
            .name(format!("frame-source-{source}"))
            .spawn(move || {
                let mut device = match backend.open(&thread_source) {
                    Ok(device) => {
                        let _ = ready_tx.send(Ok(()));
                        device
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                acquisition_loop(device.as_mut(), &thread_latest, &thread_stop, retry_delay);
                if let Err(err) = device.release() {
                    warn!(source = %thread_source, "failed to release capture handle: {err}");
                }
                let _ = done_tx.send(());
            })
            .map_err(|err| CaptureError::unavailable(&source, err))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(source = %source, "frame source started");
                Ok(Self {
                    source,
                    latest,
                    stop,
                    worker: Mutex::new(Some((handle, done_rx))),
                    stop_timeout: settings.stop_timeout,
                })
            }
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(err)
            }
            Err(_) => {
                let _ = handle.join();
                Err(CaptureError::unavailable(&source, "capture thread exited while opening"))
            }
        }
    }

    pub fn source(&self) -> &CameraSource {
        &self.source
    }

    /// Newest decoded frame, or `None` before the first one arrives.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.latest.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Stop acquisition and wait up to the configured timeout for the thread.
    ///
    /// A thread that does not finish in time is detached and releases its
    /// handle when its pending read returns. Calling this twice is harmless.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        let Some((handle, done_rx)) = self.worker.lock().take() else {
            return;
        };
        match done_rx.recv_timeout(self.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    warn!(source = %self.source, "frame source thread panicked");
                }
                info!(source = %self.source, "frame source stopped");
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    source = %self.source,
                    timeout_ms = self.stop_timeout.as_millis() as u64,
                    "frame source did not stop in time, detaching"
                );
            }
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSource")
            .field("source", &self.source)
            .field("running", &self.is_running())
            .finish()
    }
}

fn acquisition_loop(
    device: &mut dyn CaptureDevice,
    latest: &FrameSlot,
    stop: &AtomicBool,
    retry_delay: Duration,
) {
    let mut sequence = 0u64;
    while !stop.load(Ordering::SeqCst) {
        match device.read_frame() {
            Ok(image) => {
                sequence += 1;
                let frame = Arc::new(Frame {
                    image,
                    sequence,
                    captured_at: Instant::now(),
                });
                *latest.write() = Some(frame);
            }
            Err(err) => {
                debug!("frame read failed, retrying: {err}");
                thread::sleep(retry_delay);
            }
        }
    }
}

struct Active {
    source: CameraSource,
    frames: Arc<FrameSource>,
}

/// The currently active frame source, replaceable at runtime.
pub struct ActiveCamera {
    backend: Arc<dyn CaptureBackend>,
    settings: CaptureSettings,
    active: RwLock<Active>,
}

impl ActiveCamera {
    /// Open the initial source. Failure here is the caller's to handle.
    pub fn open(
        backend: Arc<dyn CaptureBackend>,
        source: CameraSource,
        settings: CaptureSettings,
    ) -> Result<Self, CaptureError> {
        let frames = FrameSource::start(backend.clone(), source.clone(), &settings)?;
        Ok(Self {
            backend,
            settings,
            active: RwLock::new(Active {
                source,
                frames: Arc::new(frames),
            }),
        })
    }

    pub fn current_source(&self) -> CameraSource {
        self.active.read().source.clone()
    }

    /// Handle to the active frame source.
    pub fn frames(&self) -> Arc<FrameSource> {
        self.active.read().frames.clone()
    }

    /// Newest frame of whichever source is active right now.
    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        let frames = self.frames();
        frames.latest()
    }

    /// Switch to `source`.
    ///
    /// The new source is opened before any shared state changes; on failure
    /// the previous source keeps running untouched. The old source is stopped
    /// after the swap, outside the lock.
    pub fn switch_to(&self, source: CameraSource) -> Result<(), CaptureError> {
        let replacement = match FrameSource::start(self.backend.clone(), source.clone(), &self.settings) {
            Ok(frames) => Arc::new(frames),
            Err(err) => {
                warn!(source = %source, "camera switch failed: {err}");
                return Err(err);
            }
        };

        let previous = std::mem::replace(
            &mut *self.active.write(),
            Active {
                source: source.clone(),
                frames: replacement,
            },
        );

        previous.frames.stop();
        info!(from = %previous.source, to = %source, "switched camera");
        Ok(())
    }

    pub fn shutdown(&self) {
        self.frames().stop();
    }
}

impl fmt::Debug for ActiveCamera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveCamera")
            .field("source", &self.current_source())
            .finish()
    }
}
