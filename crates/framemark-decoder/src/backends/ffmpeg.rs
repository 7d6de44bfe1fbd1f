#![cfg(feature = "backend-ffmpeg")]

use std::path::{Path, PathBuf};
use std::time::Duration;

use ffmpeg::util::error::{EAGAIN, EWOULDBLOCK};
use ffmpeg_next as ffmpeg;

use crate::core::{
    DynFrameSource, FrameError, FrameResult, FrameSource, RgbFrame, VideoMetadata,
    ensure_in_range,
};

const BACKEND_NAME: &str = "ffmpeg";
const MICROS_PER_SECOND: f64 = 1_000_000.0;

type Scaler = ffmpeg::software::scaling::context::Context;

pub struct FfmpegSource {
    input: PathBuf,
    ictx: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    scaler: Scaler,
    stream_index: usize,
    time_base: ffmpeg::Rational,
    start_pts: i64,
    frame_rate: f64,
    metadata: VideoMetadata,
}

impl FfmpegSource {
    pub fn open<P: AsRef<Path>>(path: P) -> FrameResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FrameError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("input file {} does not exist", path.display()),
            )));
        }
        ffmpeg::init().map_err(backend_error)?;

        let ictx = ffmpeg::format::input(&path).map_err(backend_error)?;
        let (stream_index, time_base, start_time, rate, frames, stream_duration, parameters) = {
            let stream = ictx
                .streams()
                .best(ffmpeg::media::Type::Video)
                .ok_or_else(|| FrameError::backend_failure(BACKEND_NAME, "no video stream found"))?;
            (
                stream.index(),
                stream.time_base(),
                stream.start_time(),
                stream.avg_frame_rate(),
                stream.frames(),
                stream.duration(),
                stream.parameters(),
            )
        };

        let context =
            ffmpeg::codec::context::Context::from_parameters(parameters).map_err(backend_error)?;
        let decoder = context.decoder().video().map_err(backend_error)?;
        let scaler = Scaler::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::format::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::AREA,
        )
        .map_err(backend_error)?;

        let frame_rate = if rate.numerator() > 0 && rate.denominator() > 0 {
            f64::from(rate)
        } else {
            return Err(FrameError::backend_failure(
                BACKEND_NAME,
                "stream does not report a frame rate; frame-accurate seeking is impossible",
            ));
        };

        let duration = if stream_duration > 0 {
            Some(Duration::from_secs_f64(
                stream_duration as f64 * f64::from(time_base),
            ))
        } else if ictx.duration() > 0 {
            Some(Duration::from_secs_f64(
                ictx.duration() as f64 / MICROS_PER_SECOND,
            ))
        } else {
            None
        };

        let mut metadata = VideoMetadata {
            duration,
            fps: Some(frame_rate),
            width: Some(decoder.width()),
            height: Some(decoder.height()),
            total_frames: (frames > 0).then_some(frames as u64),
        };
        metadata.total_frames = metadata.calculate_total_frames();

        Ok(Self {
            input: path.to_path_buf(),
            ictx,
            decoder,
            scaler,
            stream_index,
            time_base,
            start_pts: stream_start_pts(start_time),
            frame_rate,
            metadata,
        })
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    fn index_to_pts(&self, index: u64) -> i64 {
        index_to_pts(index, self.frame_rate, f64::from(self.time_base), self.start_pts)
    }

    fn seek_target_us(&self, index: u64) -> i64 {
        seek_target_us(index, self.frame_rate, f64::from(self.time_base), self.start_pts)
    }

    fn half_frame_pts(&self) -> i64 {
        ((0.5 / self.frame_rate) / f64::from(self.time_base)).floor() as i64
    }
}

impl FrameSource for FfmpegSource {
    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    fn read_frame(&mut self, index: u64) -> FrameResult<RgbFrame> {
        if let Some(total) = self.metadata.total_frames {
            ensure_in_range(index, total)?;
        }
        let target_pts = self.index_to_pts(index);
        let tolerance = self.half_frame_pts();
        let seek_us = self.seek_target_us(index);

        let Self {
            ictx,
            decoder,
            scaler,
            stream_index,
            ..
        } = self;

        // Lands on the key frame at or before the target; decode forward from there.
        ictx.seek(seek_us, ..seek_us).map_err(backend_error)?;
        decoder.flush();

        let mut decoded = ffmpeg::util::frame::Video::empty();
        for (stream, packet) in ictx.packets() {
            if stream.index() != *stream_index {
                continue;
            }
            if let Err(err) = decoder.send_packet(&packet) {
                if !is_retryable_error(&err) {
                    return Err(backend_error(err));
                }
            }
            if let Some(frame) =
                receive_target(decoder, scaler, &mut decoded, target_pts, tolerance)?
            {
                return Ok(frame.with_frame_index(Some(index)));
            }
        }

        decoder.send_eof().map_err(backend_error)?;
        if let Some(frame) = receive_target(decoder, scaler, &mut decoded, target_pts, tolerance)? {
            return Ok(frame.with_frame_index(Some(index)));
        }

        Err(FrameError::backend_failure(
            BACKEND_NAME,
            format!("stream ended before frame {index}"),
        ))
    }
}

/// Streams may start at a non-zero timestamp (MPEG-TS, edit lists); frame
/// indices count from that point.
fn stream_start_pts(start_time: i64) -> i64 {
    if start_time == ffmpeg::ffi::AV_NOPTS_VALUE {
        0
    } else {
        start_time
    }
}

fn index_to_pts(index: u64, frame_rate: f64, time_base: f64, start_pts: i64) -> i64 {
    let seconds = index as f64 / frame_rate;
    start_pts + (seconds / time_base).round() as i64
}

fn seek_target_us(index: u64, frame_rate: f64, time_base: f64, start_pts: i64) -> i64 {
    let seconds = start_pts as f64 * time_base + index as f64 / frame_rate;
    (seconds * MICROS_PER_SECOND).round() as i64
}

fn receive_target(
    decoder: &mut ffmpeg::decoder::Video,
    scaler: &mut Scaler,
    decoded: &mut ffmpeg::util::frame::Video,
    target_pts: i64,
    tolerance: i64,
) -> FrameResult<Option<RgbFrame>> {
    loop {
        match decoder.receive_frame(decoded) {
            Ok(()) => {
                let pts = decoded.timestamp().or_else(|| decoded.pts()).unwrap_or(i64::MIN);
                if pts + tolerance < target_pts {
                    continue;
                }
                let mut converted = ffmpeg::util::frame::Video::empty();
                scaler.run(decoded, &mut converted).map_err(backend_error)?;
                return frame_from_converted(&converted).map(Some);
            }
            Err(err) => {
                if is_retryable_error(&err) || matches!(err, ffmpeg::Error::Eof) {
                    return Ok(None);
                }
                return Err(backend_error(err));
            }
        }
    }
}

fn frame_from_converted(frame: &ffmpeg::util::frame::Video) -> FrameResult<RgbFrame> {
    RgbFrame::from_strided(frame.width(), frame.height(), frame.stride(0), frame.data(0))
}

fn is_retryable_error(error: &ffmpeg::Error) -> bool {
    matches!(
        error,
        ffmpeg::Error::Other { errno }
            if *errno == EAGAIN || *errno == EWOULDBLOCK
    )
}

fn backend_error(err: ffmpeg::Error) -> FrameError {
    FrameError::backend_failure(BACKEND_NAME, err.to_string())
}

pub fn boxed_ffmpeg<P: AsRef<Path>>(path: P) -> FrameResult<DynFrameSource> {
    Ok(Box::new(FfmpegSource::open(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MPEG_TS_BASE: f64 = 1.0 / 90_000.0;

    #[test]
    fn missing_file_returns_error() {
        let result = FfmpegSource::open("/tmp/nonexistent-file.mp4");
        assert!(result.is_err());
    }

    #[test]
    fn target_pts_is_offset_by_stream_start() {
        assert_eq!(index_to_pts(10, 30.0, MPEG_TS_BASE, 0), 30_000);
        assert_eq!(index_to_pts(10, 30.0, MPEG_TS_BASE, 90_000), 120_000);
        assert_eq!(index_to_pts(0, 30.0, MPEG_TS_BASE, 90_000), 90_000);
    }

    #[test]
    fn seek_target_includes_stream_start() {
        assert_eq!(seek_target_us(0, 30.0, MPEG_TS_BASE, 0), 0);
        // 1 s of start offset plus frame 30 at 30 fps.
        assert_eq!(seek_target_us(30, 30.0, MPEG_TS_BASE, 90_000), 2_000_000);
    }

    #[test]
    fn missing_start_time_counts_from_zero() {
        assert_eq!(stream_start_pts(ffmpeg::ffi::AV_NOPTS_VALUE), 0);
        assert_eq!(stream_start_pts(1_001), 1_001);
    }
}
