use std::collections::BTreeSet;
use std::time::Duration;

use crate::core::{
    DynFrameSource, FrameError, FrameResult, FrameSource, RgbFrame, VideoMetadata,
    ensure_in_range,
};

const BACKEND_NAME: &str = "mock";

/// Synthetic video: every frame is a gradient whose base value is derived from
/// the frame index, so tests can tell frames apart by their pixels.
#[derive(Debug, Clone)]
pub struct MockSource {
    width: u32,
    height: u32,
    frame_count: u64,
    fps: f64,
    unreadable: BTreeSet<u64>,
    reads: u64,
}

impl Default for MockSource {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            frame_count: 120,
            fps: 60.0,
            unreadable: BTreeSet::new(),
            reads: 0,
        }
    }
}

impl MockSource {
    pub fn new(frame_count: u64, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_count,
            ..Self::default()
        }
    }

    /// Marks indices that fail to decode, simulating a corrupt stream.
    pub fn with_unreadable(mut self, indices: impl IntoIterator<Item = u64>) -> Self {
        self.unreadable.extend(indices);
        self
    }

    pub fn reads(&self) -> u64 {
        self.reads
    }

    /// Value of the red channel at the top-left pixel of frame `index`.
    pub fn base_value(index: u64) -> u8 {
        (index % 256) as u8
    }

    fn generate_frame(&self, index: u64) -> FrameResult<RgbFrame> {
        let width = self.width as usize;
        let mut data = vec![0u8; width * self.height as usize * RgbFrame::CHANNELS];
        let base = Self::base_value(index) as usize;
        for (row, chunk) in data.chunks_mut(width * RgbFrame::CHANNELS).enumerate() {
            for (col, pixel) in chunk.chunks_mut(RgbFrame::CHANNELS).enumerate() {
                pixel[0] = base as u8;
                pixel[1] = ((row + base) % 256) as u8;
                pixel[2] = ((col + base) % 256) as u8;
            }
        }
        RgbFrame::from_owned(self.width, self.height, data)
            .map(|frame| frame.with_frame_index(Some(index)))
    }
}

impl FrameSource for MockSource {
    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn metadata(&self) -> VideoMetadata {
        VideoMetadata {
            duration: Some(Duration::from_secs_f64(self.frame_count as f64 / self.fps)),
            fps: Some(self.fps),
            width: Some(self.width),
            height: Some(self.height),
            total_frames: Some(self.frame_count),
        }
    }

    fn read_frame(&mut self, index: u64) -> FrameResult<RgbFrame> {
        ensure_in_range(index, self.frame_count)?;
        self.reads += 1;
        if self.unreadable.contains(&index) {
            return Err(FrameError::backend_failure(
                BACKEND_NAME,
                format!("frame {index} is corrupt"),
            ));
        }
        self.generate_frame(index)
    }
}

pub fn boxed_mock() -> FrameResult<DynFrameSource> {
    Ok(Box::new(MockSource::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_source_reports_metadata() {
        let source = MockSource::default();
        let metadata = source.metadata();
        assert_eq!(metadata.total_frames, Some(120));
        assert_eq!(metadata.width, Some(640));
        assert_eq!(metadata.height, Some(360));
    }

    #[test]
    fn mock_source_frames_are_distinguishable() {
        let mut source = MockSource::new(30, 8, 4);
        let frame = source.read_frame(17).unwrap();
        assert_eq!(frame.frame_index(), Some(17));
        assert_eq!(frame.pixel(0, 0), Some([17, 17, 17]));
        assert_eq!(frame.data().len(), 8 * 4 * 3);
        assert_eq!(source.reads(), 1);
    }

    #[test]
    fn mock_source_rejects_out_of_range_and_corrupt_frames() {
        let mut source = MockSource::new(10, 4, 4).with_unreadable([3]);
        assert!(matches!(
            source.read_frame(10),
            Err(FrameError::OutOfRange { index: 10, total: 10 })
        ));
        assert!(matches!(
            source.read_frame(3),
            Err(FrameError::BackendFailure { backend: "mock", .. })
        ));
        assert!(source.read_frame(4).is_ok());
    }
}
