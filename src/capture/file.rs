use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use image::RgbImage;
use tracing::debug;

use super::CaptureDevice;
use crate::error::CaptureError;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];
// 30 fps
const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_nanos(33_333_333);

/// Replays an image file, or every image of a directory in name order, as a
/// paced frame stream.
pub struct ImageSequenceDevice {
    frames: Vec<PathBuf>,
    position: usize,
    frame_interval: Duration,
    next_due: Option<Instant>,
    loop_playback: bool,
    // single-image sources are decoded once
    still: Option<RgbImage>,
}

impl ImageSequenceDevice {
    pub fn open(path: &str, frame_rate: f64, loop_playback: bool) -> Result<Self, CaptureError> {
        let root = Path::new(path);
        if !root.exists() {
            return Err(CaptureError::unavailable(path, "no such file or directory"));
        }

        let frames = if root.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(root)
                .map_err(|err| CaptureError::unavailable(path, err))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && has_image_extension(p))
                .collect();
            entries.sort();
            entries
        } else {
            vec![root.to_path_buf()]
        };

        let first = frames
            .first()
            .ok_or_else(|| CaptureError::unavailable(path, "directory contains no images"))?;
        let first_image = image::open(first)
            .map_err(|err| CaptureError::unavailable(path, err))?
            .to_rgb8();

        let frame_interval = Duration::try_from_secs_f64(1.0 / frame_rate)
            .ok()
            .filter(|interval| !interval.is_zero())
            .unwrap_or(DEFAULT_FRAME_INTERVAL);
        debug!(
            path,
            frames = frames.len(),
            interval_ms = frame_interval.as_millis() as u64,
            "opened image sequence"
        );

        let still = (frames.len() == 1).then_some(first_image);
        Ok(Self {
            frames,
            position: 0,
            frame_interval,
            next_due: None,
            loop_playback,
            still,
        })
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn pace(&mut self) {
        let now = Instant::now();
        if let Some(due) = self.next_due {
            if due > now {
                thread::sleep(due - now);
            }
        }
        self.next_due = Some(Instant::now() + self.frame_interval);
    }
}

impl CaptureDevice for ImageSequenceDevice {
    fn read_frame(&mut self) -> Result<RgbImage, CaptureError> {
        self.pace();

        if let Some(still) = &self.still {
            return Ok(still.clone());
        }

        if self.position >= self.frames.len() {
            if !self.loop_playback {
                return Err(CaptureError::TransientRead("end of image sequence".to_string()));
            }
            self.position = 0;
        }

        let path = &self.frames[self.position];
        self.position += 1;
        Ok(image::open(path)?.to_rgb8())
    }

    fn release(&mut self) -> Result<(), CaptureError> {
        self.still = None;
        self.frames.clear();
        Ok(())
    }
}

/// Directories and files with an image extension are replayed in-process.
pub(crate) fn is_image_source(path: &str) -> bool {
    let path = Path::new(path);
    path.is_dir() || has_image_extension(path)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
