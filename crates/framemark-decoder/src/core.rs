use std::time::Duration;

pub use framemark_types::{FrameError, FrameResult, Resolution, RgbFrame};

pub type DynFrameSource = Box<dyn FrameSource>;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VideoMetadata {
    pub duration: Option<Duration>,
    pub fps: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub total_frames: Option<u64>,
}

impl VideoMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration_and_fps(duration: Duration, fps: f64) -> Self {
        Self {
            duration: Some(duration),
            fps: Some(fps),
            ..Default::default()
        }
    }

    pub fn resolution(&self) -> Option<Resolution> {
        match (self.width, self.height) {
            (Some(width), Some(height)) => Some(Resolution::new(width, height)),
            _ => None,
        }
    }

    pub fn calculate_total_frames(&self) -> Option<u64> {
        if let Some(total) = self.total_frames {
            return Some(total);
        }

        if let (Some(duration), Some(fps)) = (self.duration, self.fps) {
            let seconds = duration.as_secs_f64();
            let total = (seconds * fps).round();
            if total.is_finite() && total >= 0.0 {
                return Some(total as u64);
            }
        }

        None
    }
}

/// Random-access frame reader.
///
/// Every call to [`FrameSource::read_frame`] seeks and decodes from scratch;
/// sources do not hand out cached buffers, so two reads of the same index
/// always reflect what the container holds at that position.
pub trait FrameSource {
    fn backend_name(&self) -> &'static str;

    fn metadata(&self) -> VideoMetadata;

    fn read_frame(&mut self, index: u64) -> FrameResult<RgbFrame>;

    fn total_frames(&self) -> Option<u64> {
        self.metadata().calculate_total_frames()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }

    fn metadata(&self) -> VideoMetadata {
        (**self).metadata()
    }

    fn read_frame(&mut self, index: u64) -> FrameResult<RgbFrame> {
        (**self).read_frame(index)
    }
}

pub(crate) fn ensure_in_range(index: u64, total: u64) -> FrameResult<()> {
    if index >= total {
        return Err(FrameError::OutOfRange { index, total });
    }
    Ok(())
}
