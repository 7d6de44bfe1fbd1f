//! Shared domain models for the framemark workspace.
//!
//! This crate centralizes the lightweight frame and geometry types used by the
//! decoder and annotation crates. Keep it backend-agnostic so every crate can
//! depend on it without pulling native video libraries.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type FrameResult<T> = Result<T, FrameError>;

/// Pixel dimensions of a frame or a display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A decoded frame in packed 8-bit RGB, rows stored without padding.
#[derive(Clone)]
pub struct RgbFrame {
    width: u32,
    height: u32,
    frame_index: Option<u64>,
    data: Arc<[u8]>,
}

impl fmt::Debug for RgbFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RgbFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .field("frame_index", &self.frame_index)
            .finish()
    }
}

impl RgbFrame {
    pub const CHANNELS: usize = 3;

    pub fn from_owned(width: u32, height: u32, data: Vec<u8>) -> FrameResult<Self> {
        let required = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(Self::CHANNELS))
            .ok_or_else(|| FrameError::InvalidFrame {
                reason: "calculated RGB buffer length overflowed".into(),
            })?;
        if data.len() != required {
            return Err(FrameError::InvalidFrame {
                reason: format!(
                    "RGB buffer holds {} bytes, expected {} for {}x{}",
                    data.len(),
                    required,
                    width,
                    height
                ),
            });
        }
        Ok(Self {
            width,
            height,
            frame_index: None,
            data: Arc::from(data.into_boxed_slice()),
        })
    }

    /// Copies a padded plane (`stride` bytes per row) into a tightly packed frame.
    pub fn from_strided(width: u32, height: u32, stride: usize, plane: &[u8]) -> FrameResult<Self> {
        let row_bytes = width as usize * Self::CHANNELS;
        if stride < row_bytes {
            return Err(FrameError::InvalidFrame {
                reason: format!("stride {stride} is smaller than row size {row_bytes}"),
            });
        }
        let required = stride
            .checked_mul(height.saturating_sub(1) as usize)
            .and_then(|len| len.checked_add(row_bytes))
            .ok_or_else(|| FrameError::InvalidFrame {
                reason: "calculated plane length overflowed".into(),
            })?;
        if height > 0 && plane.len() < required {
            return Err(FrameError::InvalidFrame {
                reason: format!(
                    "insufficient plane bytes: got {} expected at least {}",
                    plane.len(),
                    required
                ),
            });
        }
        let mut data = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let offset = row * stride;
            data.extend_from_slice(&plane[offset..offset + row_bytes]);
        }
        Self::from_owned(width, height, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data.to_vec()
    }

    pub fn frame_index(&self) -> Option<u64> {
        self.frame_index
    }

    pub fn with_frame_index(mut self, index: Option<u64>) -> Self {
        self.frame_index = index;
        self
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("backend {backend} is not supported in this build")]
    Unsupported { backend: &'static str },

    #[error("{backend} backend failed: {message}")]
    BackendFailure {
        backend: &'static str,
        message: String,
    },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("invalid frame: {reason}")]
    InvalidFrame { reason: String },

    #[error("frame {index} is outside the stream ({total} frames)")]
    OutOfRange { index: u64, total: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    pub fn unsupported(backend: &'static str) -> Self {
        Self::Unsupported { backend }
    }

    pub fn backend_failure(backend: &'static str, message: impl Into<String>) -> Self {
        Self::BackendFailure {
            backend,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
