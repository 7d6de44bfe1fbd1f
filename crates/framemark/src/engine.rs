//! The annotation control loop.
//!
//! One thread owns the frame source, the session state and the writer. Each
//! iteration presents the composed frame, waits (bounded) for one input event,
//! applies [`transition`] and carries out the resulting [`Action`].

use std::collections::BTreeMap;
use std::time::Duration;

use framemark_decoder::{FrameError, FrameSource};
use framemark_types::{Resolution, RgbFrame};
use log::{debug, info, warn};
use thiserror::Error;

use crate::classes::ClassSet;
use crate::input::{EventSource, InputEvent, Polled};
use crate::mapper::{CoordinateMapper, DEFAULT_DISPLAY};
use crate::output::{AnnotationWriter, DEFAULT_JPEG_QUALITY, FrameAnnotation, OutputError};
use crate::render::{FrameView, compose};
use crate::session::{Action, DEFAULT_STRIDE, KEY_QUIT, SessionState, Step, transition};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to read video at frame {index}: {source}")]
    InitialRead { index: u64, source: FrameError },

    #[error("video source does not report a frame count")]
    UnknownLength,

    #[error("no classes configured")]
    NoClasses,

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("failed to persist annotations: {0}")]
    Output(#[from] OutputError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotatorOptions {
    pub stride: u64,
    pub display: Resolution,
    pub poll_interval: Duration,
    pub jpeg_quality: u8,
    pub start_frame: u64,
}

impl Default for AnnotatorOptions {
    fn default() -> Self {
        Self {
            stride: DEFAULT_STRIDE,
            display: DEFAULT_DISPLAY,
            poll_interval: Duration::from_millis(50),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            start_frame: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub session_id: String,
    /// Persisted frames in frame order; a re-saved frame appears once.
    pub frames: Vec<FrameAnnotation>,
    pub boxes_written: usize,
}

pub struct Annotator<S: FrameSource> {
    source: S,
    classes: ClassSet,
    options: AnnotatorOptions,
    mapper: CoordinateMapper,
    writer: AnnotationWriter,
    state: SessionState,
    display_frame: RgbFrame,
    revision: u64,
    saved: BTreeMap<u64, FrameAnnotation>,
}

impl<S: FrameSource> Annotator<S> {
    /// Opens a session on the stride-aligned `options.start_frame`. Failing to
    /// decode that first frame is fatal.
    pub fn open(
        mut source: S,
        classes: ClassSet,
        options: AnnotatorOptions,
        writer: AnnotationWriter,
    ) -> Result<Self, EngineError> {
        if classes.is_empty() {
            return Err(EngineError::NoClasses);
        }
        let total_frames = source.total_frames().ok_or(EngineError::UnknownLength)?;
        let stride = options.stride.max(1);
        let start = (options.start_frame / stride) * stride;

        let first = source
            .read_frame(start)
            .map_err(|err| EngineError::InitialRead {
                index: start,
                source: err,
            })?;
        let mapper = CoordinateMapper::new(first.resolution(), options.display)?;
        let display_frame = mapper.to_display(&first)?;

        info!(
            "{} backend: {} frames at {}, annotating at {} every {} frames",
            source.backend_name(),
            total_frames,
            mapper.source(),
            mapper.display(),
            stride
        );

        let state = SessionState::new(
            start,
            total_frames,
            stride,
            classes.len(),
            mapper.source(),
            mapper.display(),
        );

        Ok(Self {
            source,
            classes,
            options,
            mapper,
            writer: writer.with_quality(options.jpeg_quality),
            state,
            display_frame,
            revision: 0,
            saved: BTreeMap::new(),
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn display_frame(&self) -> &RgbFrame {
        &self.display_frame
    }

    /// Runs until quit or until the event source closes, flushing the current
    /// frame on the way out.
    pub fn run<E, V>(mut self, events: &mut E, view: &mut V) -> Result<SessionSummary, EngineError>
    where
        E: EventSource + ?Sized,
        V: FrameView + ?Sized,
    {
        loop {
            let composition = compose(
                &self.display_frame,
                &self.state,
                &self.classes,
                self.revision,
            );
            // Only persistence errors end the session.
            if let Err(err) = view.present(&composition) {
                warn!("failed to present frame {}: {err}", self.state.current_frame);
            }

            let event = match events.poll(self.options.poll_interval) {
                Polled::Event(event) => event,
                Polled::Idle => continue,
                Polled::Closed => InputEvent::Key(KEY_QUIT),
            };
            if !self.handle(event)? {
                break;
            }
        }
        Ok(self.finish())
    }

    /// Applies one event; returns `false` once the session should end.
    pub fn handle(&mut self, event: InputEvent) -> Result<bool, EngineError> {
        let Step { state, action } = transition(self.state.clone(), &event);
        if state != self.state {
            self.revision += 1;
        }
        self.state = state;
        debug!(
            "{event:?} -> frame {} drafts {} committed {} {action:?}",
            self.state.current_frame,
            self.state.boxes.drafts().len(),
            self.state.boxes.committed().len()
        );

        match action {
            Action::None => Ok(true),
            Action::Navigate(target) => {
                self.flush()?;
                self.navigate(target);
                Ok(true)
            }
            Action::Quit => {
                self.flush()?;
                Ok(false)
            }
        }
    }

    /// Persists the committed boxes of the current frame, if any.
    ///
    /// The frame is decoded again from the source rather than reusing the
    /// displayed buffer, so the saved image is exactly what sits at this index.
    pub fn flush(&mut self) -> Result<Option<&FrameAnnotation>, EngineError> {
        if self.state.boxes.committed().is_empty() {
            return Ok(None);
        }
        let index = self.state.current_frame;
        let display = match self.read_display(index) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("frame {index} could not be re-read for saving; annotations not written: {err}");
                return Ok(None);
            }
        };
        let annotation = self
            .writer
            .write(index, &display, self.state.boxes.committed())?;
        self.saved.insert(index, annotation);
        Ok(self.saved.get(&index))
    }

    fn navigate(&mut self, target: u64) {
        match self.read_display(target) {
            Ok(frame) => {
                self.display_frame = frame;
                self.state.arrive(target);
                self.revision += 1;
            }
            Err(err) => {
                warn!(
                    "cannot move to frame {target}, staying on {}: {err}",
                    self.state.current_frame
                );
            }
        }
    }

    fn read_display(&mut self, index: u64) -> Result<RgbFrame, FrameError> {
        let frame = self.source.read_frame(index)?;
        self.mapper.to_display(&frame)
    }

    fn finish(self) -> SessionSummary {
        let frames: Vec<FrameAnnotation> = self.saved.into_values().collect();
        let boxes_written = frames.iter().map(|frame| frame.boxes.len()).sum();
        SessionSummary {
            session_id: self.writer.layout().session_id().to_string(),
            frames,
            boxes_written,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SessionLayout;
    use framemark_decoder::backends::mock::MockSource;

    fn annotator(
        source: MockSource,
        root: &std::path::Path,
        options: AnnotatorOptions,
    ) -> Annotator<MockSource> {
        let layout = SessionLayout::create(root, "test").unwrap();
        Annotator::open(
            source,
            ClassSet::new(["car", "person"]),
            options,
            AnnotationWriter::new(layout),
        )
        .unwrap()
    }

    fn small_display() -> AnnotatorOptions {
        AnnotatorOptions {
            display: Resolution::new(64, 36),
            ..AnnotatorOptions::default()
        }
    }

    fn draw_and_commit(annotator: &mut Annotator<MockSource>) {
        for event in [
            InputEvent::PointerDown { x: 4, y: 4 },
            InputEvent::PointerUp { x: 20, y: 20 },
            InputEvent::Key('s'),
        ] {
            assert!(annotator.handle(event).unwrap());
        }
    }

    #[test]
    fn start_frame_is_aligned_to_the_stride() {
        let dir = tempfile::tempdir().unwrap();
        let options = AnnotatorOptions {
            start_frame: 37,
            ..small_display()
        };
        let annotator = annotator(MockSource::new(100, 32, 18), dir.path(), options);
        assert_eq!(annotator.state().current_frame, 30);
        assert_eq!(annotator.display_frame().resolution(), Resolution::new(64, 36));
        assert!((annotator.mapper().scale_x() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn unreadable_first_frame_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let layout = SessionLayout::create(dir.path(), "test").unwrap();
        let result = Annotator::open(
            MockSource::new(100, 32, 18).with_unreadable([0]),
            ClassSet::new(["car"]),
            small_display(),
            AnnotationWriter::new(layout),
        );
        assert!(matches!(result, Err(EngineError::InitialRead { index: 0, .. })));
    }

    #[test]
    fn empty_flush_reads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut annotator = annotator(MockSource::new(100, 32, 18), dir.path(), small_display());
        let reads = annotator.source().reads();
        assert!(annotator.flush().unwrap().is_none());
        assert_eq!(annotator.source().reads(), reads);
    }

    #[test]
    fn flush_decodes_the_current_frame_again() {
        let dir = tempfile::tempdir().unwrap();
        let mut annotator = annotator(MockSource::new(100, 32, 18), dir.path(), small_display());
        draw_and_commit(&mut annotator);
        let reads = annotator.source().reads();
        let saved = annotator.flush().unwrap().cloned().unwrap();
        assert_eq!(annotator.source().reads(), reads + 1);
        assert_eq!(saved.frame_index, 0);
        assert!(saved.image_path.exists());
    }

    #[test]
    fn failed_navigation_keeps_index_and_boxes() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockSource::new(100, 32, 18).with_unreadable([10]);
        let mut annotator = annotator(source, dir.path(), small_display());
        draw_and_commit(&mut annotator);

        assert!(annotator.handle(InputEvent::Key('n')).unwrap());
        assert_eq!(annotator.state().current_frame, 0);
        assert_eq!(annotator.state().boxes.committed().len(), 1);
        // The flush before the failed move already persisted frame 0.
        assert!(dir.path().join("labels/test/frame_000000.txt").exists());
    }

    struct BrokenView;

    impl FrameView for BrokenView {
        fn present(&mut self, _composition: &crate::render::Composition) -> Result<(), OutputError> {
            Err(OutputError::Io {
                path: None,
                source: std::io::Error::other("display gone"),
            })
        }
    }

    #[test]
    fn view_failure_still_persists_committed_boxes() {
        let dir = tempfile::tempdir().unwrap();
        let annotator = annotator(MockSource::new(100, 32, 18), dir.path(), small_display());
        let mut events = crate::input::ScriptedEvents::from_events([
            InputEvent::PointerDown { x: 4, y: 4 },
            InputEvent::PointerUp { x: 20, y: 20 },
            InputEvent::Key('s'),
            InputEvent::Key('q'),
        ]);
        let summary = annotator.run(&mut events, &mut BrokenView).unwrap();
        assert_eq!(summary.boxes_written, 1);
        assert!(dir.path().join("labels/test/frame_000000.txt").exists());
    }

    #[test]
    fn unreadable_frame_during_flush_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut annotator = annotator(MockSource::new(100, 32, 18), dir.path(), small_display());
        draw_and_commit(&mut annotator);
        annotator.source = MockSource::new(100, 32, 18).with_unreadable([0]);
        assert!(annotator.flush().unwrap().is_none());
        assert!(!dir.path().join("labels/test/frame_000000.txt").exists());
    }
}
