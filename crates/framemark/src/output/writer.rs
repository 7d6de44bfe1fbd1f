use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use framemark_types::RgbFrame;

use crate::boxes::BoundingBox;
use crate::label;
use crate::output::error::OutputError;
use crate::output::image::{DEFAULT_JPEG_QUALITY, write_file, write_jpeg};

pub const IMAGES_DIR: &str = "images";
pub const LABELS_DIR: &str = "labels";

/// Wall-clock session identifier, taken once when a session starts.
pub fn session_id_now() -> String {
    Local::now().format("%Y%m%d-%H%M%S%.6f").to_string()
}

/// `frame_000120` for index 120.
pub fn frame_stem(frame_index: u64) -> String {
    format!("frame_{frame_index:06}")
}

/// Per-session output directories under one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLayout {
    session_id: String,
    images_dir: PathBuf,
    labels_dir: PathBuf,
}

impl SessionLayout {
    pub fn create<P: AsRef<Path>>(output_root: P, session_id: &str) -> Result<Self, OutputError> {
        let root = output_root.as_ref();
        let images_dir = root.join(IMAGES_DIR).join(session_id);
        let labels_dir = root.join(LABELS_DIR).join(session_id);
        for dir in [&images_dir, &labels_dir] {
            fs::create_dir_all(dir).map_err(|err| OutputError::io_at(dir, err))?;
        }
        Ok(Self {
            session_id: session_id.to_string(),
            images_dir,
            labels_dir,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn labels_dir(&self) -> &Path {
        &self.labels_dir
    }

    pub fn image_path(&self, frame_index: u64) -> PathBuf {
        self.images_dir
            .join(format!("{}.jpg", frame_stem(frame_index)))
    }

    pub fn label_path(&self, frame_index: u64) -> PathBuf {
        self.labels_dir
            .join(format!("{}.txt", frame_stem(frame_index)))
    }
}

/// One persisted frame: the image, its label file, and the boxes written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameAnnotation {
    pub frame_index: u64,
    pub image_path: PathBuf,
    pub label_path: PathBuf,
    pub boxes: Vec<BoundingBox>,
}

#[derive(Debug, Clone)]
pub struct AnnotationWriter {
    layout: SessionLayout,
    jpeg_quality: u8,
}

impl AnnotationWriter {
    pub fn new(layout: SessionLayout) -> Self {
        Self {
            layout,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn layout(&self) -> &SessionLayout {
        &self.layout
    }

    /// Writes the display frame and one label line per box. The label file
    /// is written last so a label never points at a missing image.
    pub fn write(
        &self,
        frame_index: u64,
        display_frame: &RgbFrame,
        boxes: &[BoundingBox],
    ) -> Result<FrameAnnotation, OutputError> {
        let image_path = self.layout.image_path(frame_index);
        let label_path = self.layout.label_path(frame_index);

        write_jpeg(&image_path, display_frame, self.jpeg_quality)?;
        let body = label::encode_all(boxes, display_frame.width(), display_frame.height());
        write_file(&label_path, body.as_bytes())?;

        log::info!(
            "saved frame {frame_index} with {} box(es) to {}",
            boxes.len(),
            image_path.display()
        );

        Ok(FrameAnnotation {
            frame_index,
            image_path,
            label_path,
            boxes: boxes.to_vec(),
        })
    }
}
