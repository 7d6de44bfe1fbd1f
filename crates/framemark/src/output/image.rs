use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use framemark_types::RgbFrame;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, ImageEncoder};

use crate::output::error::OutputError;

pub const DEFAULT_JPEG_QUALITY: u8 = 95;

pub(crate) fn encode_jpeg(frame: &RgbFrame, quality: u8) -> Result<Vec<u8>, OutputError> {
    let mut encoded = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut encoded, quality.clamp(1, 100));
    encoder.write_image(frame.data(), frame.width(), frame.height(), ColorType::Rgb8)?;
    Ok(encoded)
}

/// Writes the whole buffer and flushes before returning, so a file that exists
/// on success is never truncated.
pub(crate) fn write_file(path: &Path, contents: &[u8]) -> Result<(), OutputError> {
    let file = File::create(path).map_err(|err| OutputError::io_at(path, err))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(contents)
        .and_then(|()| writer.flush())
        .map_err(|err| OutputError::io_at(path, err))
}

pub(crate) fn write_jpeg(path: &Path, frame: &RgbFrame, quality: u8) -> Result<(), OutputError> {
    let encoded = encode_jpeg(frame, quality)?;
    write_file(path, &encoded)
}
