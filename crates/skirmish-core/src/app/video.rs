//! Per-turn video capture.
//!
//! Frames are rescaled to [`VIDEO_WIDTH`] and appended to one file as a
//! sequence of binary PPM (`P6`) images, one per completed turn.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncWriteExt, BufWriter};

use crate::ports::Frame;

pub const VIDEO_WIDTH: u32 = 512;

#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    #[error("video io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame {width}x{height} cannot be rescaled")]
    Degenerate { width: u32, height: u32 },

    #[error("malformed video data: {0}")]
    Malformed(String),
}

/// Nearest-neighbour rescale to `width`, keeping the aspect ratio:
/// `height = floor(h * width / w)`.
pub fn rescale_to_width(frame: &Frame, width: u32) -> Result<Frame, VideoError> {
    let height = (u64::from(frame.height) * u64::from(width))
        .checked_div(u64::from(frame.width))
        .and_then(|h| u32::try_from(h).ok())
        .filter(|&h| h > 0 && width > 0 && frame.is_consistent())
        .ok_or(VideoError::Degenerate {
            width: frame.width,
            height: frame.height,
        })?;

    let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        let src_y = (u64::from(y) * u64::from(frame.height) / u64::from(height)) as u32;
        for x in 0..width {
            let src_x = (u64::from(x) * u64::from(frame.width) / u64::from(width)) as u32;
            pixels.extend_from_slice(&frame.pixel(src_x, src_y));
        }
    }
    Ok(Frame {
        width,
        height,
        pixels,
    })
}

pub fn encode_ppm(frame: &Frame) -> Vec<u8> {
    let mut out = format!("P6\n{} {}\n255\n", frame.width, frame.height).into_bytes();
    out.extend_from_slice(&frame.pixels);
    out
}

/// Split a concatenated PPM sequence back into frames.
pub fn decode_ppm_frames(mut bytes: &[u8]) -> Result<Vec<Frame>, VideoError> {
    let mut frames = Vec::new();
    while !bytes.is_empty() {
        let mut fields = Vec::with_capacity(4);
        let mut rest = bytes;
        while fields.len() < 4 {
            let start = rest
                .iter()
                .position(|b| !b.is_ascii_whitespace())
                .ok_or_else(|| VideoError::Malformed("truncated header".into()))?;
            rest = &rest[start..];
            let end = rest
                .iter()
                .position(|b| b.is_ascii_whitespace())
                .ok_or_else(|| VideoError::Malformed("truncated header".into()))?;
            fields.push(String::from_utf8_lossy(&rest[..end]).into_owned());
            // exactly one whitespace byte separates the header from the pixels
            rest = &rest[end + 1..];
        }
        if fields[0] != "P6" || fields[3] != "255" {
            return Err(VideoError::Malformed(format!("unexpected header {fields:?}")));
        }
        let parse = |s: &str| {
            s.parse::<u32>()
                .map_err(|_| VideoError::Malformed(format!("bad dimension {s:?}")))
        };
        let (width, height) = (parse(&fields[1])?, parse(&fields[2])?);
        let len = width as usize * height as usize * 3;
        if rest.len() < len {
            return Err(VideoError::Malformed("truncated pixel data".into()));
        }
        frames.push(Frame {
            width,
            height,
            pixels: rest[..len].to_vec(),
        });
        bytes = &rest[len..];
    }
    Ok(frames)
}

/// Appends rescaled frames to a video file.
pub struct VideoRecorder {
    path: PathBuf,
    out: BufWriter<tokio::fs::File>,
    frames: u32,
}

impl VideoRecorder {
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self, VideoError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::File::create(&path).await?;
        Ok(Self {
            path,
            out: BufWriter::new(file),
            frames: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub async fn push(&mut self, frame: &Frame) -> Result<(), VideoError> {
        let scaled = rescale_to_width(frame, VIDEO_WIDTH)?;
        self.out.write_all(&encode_ppm(&scaled)).await?;
        self.frames += 1;
        Ok(())
    }

    /// Flush and close; returns the file path.
    pub async fn finish(mut self) -> Result<PathBuf, VideoError> {
        self.out.flush().await?;
        self.out.shutdown().await?;
        tracing::debug!(path = %self.path.display(), frames = self.frames, "video written");
        Ok(self.path)
    }
}
