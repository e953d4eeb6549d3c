//! Video files, network streams and local camera devices decoded by an
//! `ffmpeg` child process writing raw RGB frames to its stdout.

use std::fmt;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use image::RgbImage;
use tracing::{debug, info};

use super::CaptureDevice;
use crate::error::CaptureError;

const FFMPEG: &str = "ffmpeg";
const FFPROBE: &str = "ffprobe";

/// What ffmpeg reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoInput {
    /// A local video file, played back at its native rate.
    File(String),
    /// A network URI such as `rtsp://` or `http://`.
    Stream(String),
    /// A local camera by index, through the platform capture API.
    Device(u32),
}

impl VideoInput {
    /// Classify a path-like source string.
    pub fn from_path(path: &str) -> Self {
        if path.contains("://") {
            VideoInput::Stream(path.to_string())
        } else {
            VideoInput::File(path.to_string())
        }
    }

    /// Demuxer options and the `-i` argument, shared by ffprobe and ffmpeg.
    pub fn input_args(&self) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();
        match self {
            VideoInput::File(path) => {
                args.extend(["-i".to_string(), path.clone()]);
            }
            VideoInput::Stream(uri) => {
                if uri.starts_with("rtsp://") {
                    args.extend(["-rtsp_transport".to_string(), "tcp".to_string()]);
                }
                args.extend(["-i".to_string(), uri.clone()]);
            }
            VideoInput::Device(index) => {
                args.extend(device_args(*index));
            }
        }
        args
    }

    /// Full ffmpeg argument list producing rgb24 rawvideo on stdout.
    pub fn decoder_args(&self, loop_playback: bool) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-nostdin"]
            .into_iter()
            .map(String::from)
            .collect();
        if let VideoInput::File(_) = self {
            // -re paces reads at the file's own frame rate
            args.push("-re".to_string());
            if loop_playback {
                args.extend(["-stream_loop".to_string(), "-1".to_string()]);
            }
        }
        args.extend(self.input_args());
        args.extend(
            ["-an", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"]
                .into_iter()
                .map(String::from),
        );
        args
    }

    fn check_exists(&self) -> Result<(), CaptureError> {
        match self {
            VideoInput::File(path) if !Path::new(path).is_file() => {
                Err(CaptureError::unavailable(path, "no such file"))
            }
            #[cfg(target_os = "linux")]
            VideoInput::Device(index) => {
                let node = format!("/dev/video{index}");
                if Path::new(&node).exists() {
                    Ok(())
                } else {
                    Err(CaptureError::unavailable(index, format!("{node} does not exist")))
                }
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for VideoInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoInput::File(path) | VideoInput::Stream(path) => f.write_str(path),
            VideoInput::Device(index) => write!(f, "{index}"),
        }
    }
}

#[cfg(target_os = "linux")]
fn device_args(index: u32) -> Vec<String> {
    vec![
        "-f".into(),
        "video4linux2".into(),
        "-i".into(),
        format!("/dev/video{index}"),
    ]
}

#[cfg(target_os = "macos")]
fn device_args(index: u32) -> Vec<String> {
    vec!["-f".into(), "avfoundation".into(), "-i".into(), format!("{index}")]
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn device_args(index: u32) -> Vec<String> {
    vec!["-i".into(), format!("{index}")]
}

/// Frame dimensions reported by ffprobe for the first video stream.
pub fn read_dimensions(input: &VideoInput) -> Result<(u32, u32), CaptureError> {
    let output = Command::new(FFPROBE)
        .args(["-v", "error", "-select_streams", "v:0"])
        .args(["-show_entries", "stream=width,height", "-of", "csv=p=0:s=x"])
        .args(input.input_args())
        .stdin(Stdio::null())
        .output()
        .map_err(|err| CaptureError::unavailable(input, format!("cannot run {FFPROBE}: {err}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CaptureError::unavailable(input, stderr.trim()));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_dimensions(&stdout)
        .ok_or_else(|| CaptureError::unavailable(input, "no video stream found"))
}

fn parse_dimensions(raw: &str) -> Option<(u32, u32)> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let (width, height) = line.trim_end_matches('x').split_once('x')?;
    let width = width.trim().parse::<u32>().ok()?;
    let height = height.trim().parse::<u32>().ok()?;
    (width > 0 && height > 0).then_some((width, height))
}

/// Reads fixed-size rgb24 frames from an ffmpeg child.
pub struct VideoDevice {
    input: VideoInput,
    child: Child,
    stdout: ChildStdout,
    width: u32,
    height: u32,
    ended: bool,
    released: bool,
}

impl VideoDevice {
    pub fn open(input: VideoInput, loop_playback: bool) -> Result<Self, CaptureError> {
        input.check_exists()?;
        let (width, height) = read_dimensions(&input)?;

        let mut child = Command::new(FFMPEG)
            .args(input.decoder_args(loop_playback))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| CaptureError::unavailable(&input, format!("cannot run {FFMPEG}: {err}")))?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CaptureError::unavailable(&input, "ffmpeg stdout was not captured"));
        };

        info!(input = %input, width, height, "opened video input");
        Ok(Self {
            input,
            child,
            stdout,
            width,
            height,
            ended: false,
            released: false,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl CaptureDevice for VideoDevice {
    fn read_frame(&mut self) -> Result<RgbImage, CaptureError> {
        if self.ended {
            return Err(CaptureError::TransientRead("end of video".to_string()));
        }

        let mut buffer = vec![0u8; self.frame_bytes()];
        match self.stdout.read_exact(&mut buffer) {
            Ok(()) => RgbImage::from_raw(self.width, self.height, buffer)
                .ok_or_else(|| CaptureError::TransientRead("short frame buffer".to_string())),
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                debug!(input = %self.input, "video input reached its end");
                self.ended = true;
                Err(CaptureError::TransientRead("end of video".to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn release(&mut self) -> Result<(), CaptureError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        // an already exited child is fine, only a failed reap is an error
        let _ = self.child.kill();
        self.child
            .wait()
            .map(|_| ())
            .map_err(|err| CaptureError::Release(err.to_string()))
    }
}

impl Drop for VideoDevice {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
