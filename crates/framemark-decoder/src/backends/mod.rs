pub mod image_sequence;
pub mod mock;

#[cfg(feature = "backend-ffmpeg")]
pub mod ffmpeg;
