pub mod error;
pub mod image;
pub mod writer;

pub use error::OutputError;
pub use self::image::DEFAULT_JPEG_QUALITY;
pub use writer::{AnnotationWriter, FrameAnnotation, SessionLayout, frame_stem, session_id_now};
