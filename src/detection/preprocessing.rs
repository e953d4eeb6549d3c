use image::{GrayImage, RgbImage};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;

/// Sigma matching a 5x5 Gaussian kernel with automatic sigma.
pub const KERNEL_5X5_SIGMA: f32 = 1.1;

/// Convert a color frame to grayscale
pub fn to_grayscale(img: &RgbImage) -> GrayImage {
    image::imageops::grayscale(img)
}

/// Apply Gaussian blur to reduce noise
pub fn apply_blur(img: &GrayImage, sigma: f32) -> GrayImage {
    gaussian_blur_f32(img, sigma)
}

/// Detect edges using Canny edge detector
pub fn detect_edges(img: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    canny(img, low_threshold, high_threshold)
}

/// Grayscale, blur and Canny in one pass: the binary map contours are traced on.
pub fn edge_map(frame: &RgbImage, sigma: f32, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let gray = to_grayscale(frame);
    detect_edges(&apply_blur(&gray, sigma), low_threshold, high_threshold)
}
