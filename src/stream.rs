//! Live annotated MJPEG stream, one independent generator per viewer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_stream::stream;
use bytes::Bytes;
use futures_util::Stream;
use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use tracing::{debug, warn};

use crate::capture::ActiveCamera;
use crate::detection::DetectionEngine;

pub const BOUNDARY: &str = "frame";
pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub jpeg_quality: u8,
    /// Wait between polls when no new frame is available.
    pub idle_backoff: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            jpeg_quality: 80,
            idle_backoff: Duration::from_millis(5),
        }
    }
}

pub struct StreamPublisher {
    camera: Arc<ActiveCamera>,
    engine: Arc<DetectionEngine>,
    settings: StreamSettings,
    closed: Arc<AtomicBool>,
}

impl StreamPublisher {
    pub fn new(
        camera: Arc<ActiveCamera>,
        engine: Arc<DetectionEngine>,
        settings: StreamSettings,
    ) -> Self {
        Self {
            camera,
            engine,
            settings,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// End every open and future viewer stream.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Endless stream of multipart parts for a single viewer.
    ///
    /// Every pull reads the active camera's newest frame, annotates it and
    /// encodes it on the blocking pool. The stream ends when dropped or after
    /// [`close`](Self::close).
    pub fn frames(&self) -> impl Stream<Item = Bytes> + Send + 'static {
        let camera = self.camera.clone();
        let engine = self.engine.clone();
        let settings = self.settings.clone();
        let closed = self.closed.clone();

        stream! {
            // sequences restart on a camera switch, so key on the source too
            let mut last_seen: Option<(usize, u64)> = None;
            while !closed.load(Ordering::SeqCst) {
                let source = camera.frames();
                let key = source
                    .latest()
                    .map(|frame| (Arc::as_ptr(&source) as usize, frame.sequence, frame));
                let frame = match key {
                    Some((ptr, sequence, frame)) if last_seen != Some((ptr, sequence)) => {
                        last_seen = Some((ptr, sequence));
                        frame
                    }
                    _ => {
                        drop(source);
                        tokio::time::sleep(settings.idle_backoff).await;
                        continue;
                    }
                };
                drop(source);

                let engine = engine.clone();
                let quality = settings.jpeg_quality;
                let encoded = tokio::task::spawn_blocking(move || {
                    let analysis = engine.process_frame(&frame.image);
                    encode_jpeg(&analysis.annotated, quality)
                })
                .await;

                match encoded {
                    Ok(Ok(jpeg)) => {
                        yield encode_part(&jpeg);
                    }
                    Ok(Err(err)) => debug!("dropping frame: {err}"),
                    Err(err) => warn!("frame processing task failed: {err}"),
                }
            }
        }
    }
}

/// JPEG-encode an annotated frame.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100)).encode_image(image)?;
    Ok(buffer)
}

/// Frame one JPEG as a multipart part.
pub fn encode_part(jpeg: &[u8]) -> Bytes {
    let mut payload = Vec::with_capacity(jpeg.len() + 64);
    payload.extend_from_slice(b"--");
    payload.extend_from_slice(BOUNDARY.as_bytes());
    payload.extend_from_slice(b"\r\n");
    payload.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
    payload.extend_from_slice(jpeg);
    payload.extend_from_slice(b"\r\n");
    Bytes::from(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_part_framing() {
        let part = encode_part(&[0xFF, 0xD8, 0xFF, 0xD9]);
        assert!(part.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n"));
        assert!(part.ends_with(&[0xFF, 0xD9, b'\r', b'\n']));
    }

    #[test]
    fn test_encode_jpeg_produces_jpeg() {
        let image = RgbImage::from_pixel(16, 16, image::Rgb([10, 200, 30]));
        let jpeg = encode_jpeg(&image, 80).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }
}
