use std::fs;
use std::path::{Path, PathBuf};

use crate::core::{
    DynFrameSource, FrameError, FrameResult, FrameSource, RgbFrame, VideoMetadata,
    ensure_in_range,
};

const BACKEND_NAME: &str = "image-sequence";
const FRAME_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Treats a directory of still images, ordered by file name, as a video.
pub struct ImageSequenceSource {
    frames: Vec<PathBuf>,
    width: u32,
    height: u32,
}

impl ImageSequenceSource {
    pub fn open<P: AsRef<Path>>(dir: P) -> FrameResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(FrameError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("frame directory {} does not exist", dir.display()),
            )));
        }

        let mut frames = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && has_frame_extension(&path) {
                frames.push(path);
            }
        }
        frames.sort();

        let Some(first) = frames.first() else {
            return Err(FrameError::backend_failure(
                BACKEND_NAME,
                format!("no image files found in {}", dir.display()),
            ));
        };
        let (width, height) = image::image_dimensions(first)
            .map_err(|err| FrameError::backend_failure(BACKEND_NAME, err.to_string()))?;

        log::debug!(
            "image sequence {} holds {} frames at {}x{}",
            dir.display(),
            frames.len(),
            width,
            height
        );

        Ok(Self {
            frames,
            width,
            height,
        })
    }

    pub fn frame_path(&self, index: u64) -> Option<&Path> {
        self.frames.get(index as usize).map(PathBuf::as_path)
    }
}

impl FrameSource for ImageSequenceSource {
    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn metadata(&self) -> VideoMetadata {
        VideoMetadata {
            width: Some(self.width),
            height: Some(self.height),
            total_frames: Some(self.frames.len() as u64),
            ..VideoMetadata::default()
        }
    }

    fn read_frame(&mut self, index: u64) -> FrameResult<RgbFrame> {
        ensure_in_range(index, self.frames.len() as u64)?;
        let path = &self.frames[index as usize];
        let decoded = image::open(path)
            .map_err(|err| {
                FrameError::backend_failure(BACKEND_NAME, format!("{}: {err}", path.display()))
            })?
            .to_rgb8();
        let (width, height) = decoded.dimensions();
        RgbFrame::from_owned(width, height, decoded.into_raw())
            .map(|frame| frame.with_frame_index(Some(index)))
    }
}

fn has_frame_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            FRAME_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

pub fn boxed_image_sequence<P: AsRef<Path>>(dir: P) -> FrameResult<DynFrameSource> {
    Ok(Box::new(ImageSequenceSource::open(dir)?))
}
