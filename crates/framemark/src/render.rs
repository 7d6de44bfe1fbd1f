//! Composes the annotated view of the current frame and hands it to a view.

use std::path::{Path, PathBuf};

use framemark_types::RgbFrame;

use crate::boxes::BoundingBox;
use crate::classes::ClassSet;
use crate::output::OutputError;
use crate::output::image::write_jpeg;
use crate::session::SessionState;

pub const DRAFT_COLOR: [u8; 3] = [0, 255, 0];
pub const COMMITTED_COLOR: [u8; 3] = [255, 0, 0];
const OUTLINE: usize = 2;

pub const CONTROLS: &str =
    "Controls: n=next p=prev s=commit d=undo c=clear 0-9=class q=quit";

/// A display frame with boxes drawn on it plus the overlay text.
#[derive(Debug, Clone)]
pub struct Composition {
    pub frame: RgbFrame,
    pub status: Vec<String>,
    /// Changes whenever the session state or the display frame changes.
    pub revision: u64,
}

pub fn compose(
    frame: &RgbFrame,
    state: &SessionState,
    classes: &ClassSet,
    revision: u64,
) -> Composition {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let mut buffer = frame.data().to_vec();

    let committed = state.boxes.committed().iter().map(|b| (b, COMMITTED_COLOR));
    let drafts = state.boxes.drafts().iter().map(|b| (b, DRAFT_COLOR));
    for (bbox, color) in committed.chain(drafts) {
        if let Some(rect) = Rect::clipped(bbox, width, height) {
            draw_outline(&mut buffer, width, &rect, color);
        }
    }

    let frame = RgbFrame::from_owned(frame.width(), frame.height(), buffer)
        .map(|composed| composed.with_frame_index(frame.frame_index()))
        .unwrap_or_else(|_| frame.clone());

    Composition {
        frame,
        status: status_lines(state, classes),
        revision,
    }
}

pub fn status_lines(state: &SessionState, classes: &ClassSet) -> Vec<String> {
    let mut lines = classes.legend();
    lines.push(CONTROLS.to_string());
    let active = state.boxes.active_class();
    lines.push(format!(
        "Current Class: {}",
        classes.name(active).unwrap_or("?")
    ));
    lines.push(format!(
        "Frame: {}/{}",
        state.current_frame, state.total_frames
    ));
    lines.push(format!("{}x FRAME MODE", state.stride));
    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rect {
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
}

impl Rect {
    /// Inclusive pixel bounds of `bbox` inside a `width`×`height` frame.
    fn clipped(bbox: &BoundingBox, width: usize, height: usize) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let b = bbox.normalized();
        let max_x = width as i64 - 1;
        let max_y = height as i64 - 1;
        let (x0, y0) = (b.start.x as i64, b.start.y as i64);
        let (x1, y1) = (b.end.x as i64, b.end.y as i64);
        if x1 < 0 || y1 < 0 || x0 > max_x || y0 > max_y {
            return None;
        }
        Some(Self {
            x0: x0.clamp(0, max_x) as usize,
            y0: y0.clamp(0, max_y) as usize,
            x1: x1.clamp(0, max_x) as usize,
            y1: y1.clamp(0, max_y) as usize,
        })
    }

    fn thickness(&self) -> usize {
        let span = (self.x1 - self.x0).min(self.y1 - self.y0) + 1;
        span.min(OUTLINE)
    }
}

fn draw_outline(buffer: &mut [u8], width: usize, rect: &Rect, color: [u8; 3]) {
    let stride = width * 3;
    for offset in 0..rect.thickness() {
        let top = rect.y0 + offset;
        let bottom = rect.y1 - offset;
        for x in rect.x0..=rect.x1 {
            tint_pixel(buffer, stride, top, x, color);
            tint_pixel(buffer, stride, bottom, x, color);
        }
        let left = rect.x0 + offset;
        let right = rect.x1 - offset;
        for y in rect.y0..=rect.y1 {
            tint_pixel(buffer, stride, y, left, color);
            tint_pixel(buffer, stride, y, right, color);
        }
    }
}

fn tint_pixel(buffer: &mut [u8], stride: usize, y: usize, x: usize, color: [u8; 3]) {
    let idx = y * stride + x * 3;
    if idx + 2 >= buffer.len() {
        return;
    }
    buffer[idx..idx + 3].copy_from_slice(&color);
}

/// Somewhere to show a [`Composition`].
pub trait FrameView {
    fn present(&mut self, composition: &Composition) -> Result<(), OutputError>;
}

impl<V: FrameView + ?Sized> FrameView for Box<V> {
    fn present(&mut self, composition: &Composition) -> Result<(), OutputError> {
        (**self).present(composition)
    }
}

/// Discards every composition.
#[derive(Debug, Default)]
pub struct NullView;

impl FrameView for NullView {
    fn present(&mut self, _composition: &Composition) -> Result<(), OutputError> {
        Ok(())
    }
}

/// Keeps a JPEG snapshot of the latest composition on disk and logs the
/// overlay text whenever it changes.
#[derive(Debug)]
pub struct PreviewView {
    path: PathBuf,
    quality: u8,
    last_revision: Option<u64>,
    last_status: Vec<String>,
}

impl PreviewView {
    pub fn new<P: Into<PathBuf>>(path: P, quality: u8) -> Self {
        Self {
            path: path.into(),
            quality,
            last_revision: None,
            last_status: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameView for PreviewView {
    fn present(&mut self, composition: &Composition) -> Result<(), OutputError> {
        if self.last_revision == Some(composition.revision) {
            return Ok(());
        }
        write_jpeg(&self.path, &composition.frame, self.quality)?;
        self.last_revision = Some(composition.revision);

        if composition.status != self.last_status {
            for line in &composition.status {
                log::info!("{line}");
            }
            self.last_status = composition.status.clone();
        }
        Ok(())
    }
}
