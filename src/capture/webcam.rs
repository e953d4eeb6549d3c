use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

use super::CaptureDevice;
use crate::error::CaptureError;

/// Camera device opened through the platform's native capture API.
pub struct WebcamDevice {
    index: u32,
    camera: Camera,
}

impl WebcamDevice {
    pub fn open(index: u32) -> Result<Self, CaptureError> {
        let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(index), format)
            .map_err(|err| CaptureError::unavailable(index, err))?;
        camera
            .open_stream()
            .map_err(|err| CaptureError::unavailable(index, err))?;
        Ok(Self { index, camera })
    }
}

impl CaptureDevice for WebcamDevice {
    fn read_frame(&mut self) -> Result<RgbImage, CaptureError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|err| CaptureError::TransientRead(format!("camera {}: {err}", self.index)))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|err| CaptureError::TransientRead(format!("camera {}: {err}", self.index)))?;
        RgbImage::from_raw(decoded.width(), decoded.height(), decoded.into_raw())
            .ok_or_else(|| CaptureError::TransientRead("frame buffer size mismatch".to_string()))
    }

    fn release(&mut self) -> Result<(), CaptureError> {
        self.camera
            .stop_stream()
            .map_err(|err| CaptureError::Release(err.to_string()))
    }
}
