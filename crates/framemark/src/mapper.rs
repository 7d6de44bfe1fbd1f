//! Mapping between source-frame and display coordinates, plus the display resize.

use framemark_types::{FrameError, FrameResult, Resolution, RgbFrame};

use crate::boxes::Point;

pub const DEFAULT_DISPLAY: Resolution = Resolution::new(1280, 720);

/// Maps between source-video pixels and the fixed display resolution.
///
/// Scale factors are fixed when the mapper is built from the first decoded
/// frame and stay valid for the whole session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    source: Resolution,
    display: Resolution,
    scale_x: f64,
    scale_y: f64,
}

impl CoordinateMapper {
    pub fn new(source: Resolution, display: Resolution) -> FrameResult<Self> {
        if source.is_empty() || display.is_empty() {
            return Err(FrameError::InvalidFrame {
                reason: format!("cannot map between {source} and {display}"),
            });
        }
        Ok(Self {
            source,
            display,
            scale_x: display.width as f64 / source.width as f64,
            scale_y: display.height as f64 / source.height as f64,
        })
    }

    pub fn source(&self) -> Resolution {
        self.source
    }

    pub fn display(&self) -> Resolution {
        self.display
    }

    pub fn scale_x(&self) -> f64 {
        self.scale_x
    }

    pub fn scale_y(&self) -> f64 {
        self.scale_y
    }

    pub fn to_display(&self, frame: &RgbFrame) -> FrameResult<RgbFrame> {
        resize_area(frame, self.display)
    }

    pub fn point_to_display(&self, point: Point) -> Point {
        Point::new(
            (point.x as f64 * self.scale_x).round() as i32,
            (point.y as f64 * self.scale_y).round() as i32,
        )
    }

    pub fn point_to_source(&self, point: Point) -> Point {
        Point::new(
            (point.x as f64 / self.scale_x).round() as i32,
            (point.y as f64 / self.scale_y).round() as i32,
        )
    }
}

/// Area-averaging resize: every output pixel is the coverage-weighted mean of
/// the source pixels its footprint overlaps. Matching sizes return a copy.
pub fn resize_area(frame: &RgbFrame, target: Resolution) -> FrameResult<RgbFrame> {
    if target.is_empty() {
        return Err(FrameError::InvalidFrame {
            reason: format!("target resolution {target} is empty"),
        });
    }
    if frame.resolution() == target {
        return Ok(frame.clone());
    }
    if frame.resolution().is_empty() {
        return Err(FrameError::InvalidFrame {
            reason: "source frame is empty".into(),
        });
    }

    let columns = axis_weights(frame.width(), target.width);
    let rows = axis_weights(frame.height(), target.height);
    let src = frame.data();
    let src_stride = frame.width() as usize * RgbFrame::CHANNELS;

    let mut out = Vec::with_capacity(target.pixel_count() * RgbFrame::CHANNELS);
    for row in &rows {
        for column in &columns {
            let mut acc = [0.0f64; 3];
            for &(sy, wy) in row {
                let base = sy * src_stride;
                for &(sx, wx) in column {
                    let idx = base + sx * RgbFrame::CHANNELS;
                    let weight = wx * wy;
                    acc[0] += src[idx] as f64 * weight;
                    acc[1] += src[idx + 1] as f64 * weight;
                    acc[2] += src[idx + 2] as f64 * weight;
                }
            }
            out.extend(acc.iter().map(|value| value.round().clamp(0.0, 255.0) as u8));
        }
    }

    RgbFrame::from_owned(target.width, target.height, out)
        .map(|resized| resized.with_frame_index(frame.frame_index()))
}

/// Per output index, the source indices it covers and their normalised weights.
fn axis_weights(source: u32, target: u32) -> Vec<Vec<(usize, f64)>> {
    let ratio = source as f64 / target as f64;
    let last = source as usize - 1;
    (0..target)
        .map(|dst| {
            let start = dst as f64 * ratio;
            let end = start + ratio;
            let mut weights = Vec::new();
            let mut src = start.floor() as usize;
            while (src as f64) < end && src <= last {
                let covered = end.min(src as f64 + 1.0) - start.max(src as f64);
                if covered > 1e-9 {
                    weights.push((src, covered));
                }
                src += 1;
            }
            let total: f64 = weights.iter().map(|(_, weight)| weight).sum();
            if total <= 0.0 {
                return vec![((start.floor() as usize).min(last), 1.0)];
            }
            for (_, weight) in &mut weights {
                *weight /= total;
            }
            weights
        })
        .collect()
}
