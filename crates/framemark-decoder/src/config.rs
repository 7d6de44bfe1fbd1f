use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[cfg(feature = "backend-ffmpeg")]
use std::sync::OnceLock;

use crate::core::{DynFrameSource, FrameError, FrameResult};

pub const BACKEND_ENV: &str = "FRAMEMARK_BACKEND";
pub const INPUT_ENV: &str = "FRAMEMARK_INPUT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Mock,
    ImageSequence,
    Ffmpeg,
}

impl FromStr for Backend {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mock" => Ok(Backend::Mock),
            "images" | "image-sequence" => Ok(Backend::ImageSequence),
            "ffmpeg" => Ok(Backend::Ffmpeg),
            other => Err(FrameError::configuration(format!(
                "unknown backend '{other}'"
            ))),
        }
    }
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Mock => "mock",
            Backend::ImageSequence => "images",
            Backend::Ffmpeg => "ffmpeg",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn compiled_backends() -> Vec<Backend> {
    let mut backends = Vec::new();
    #[cfg(feature = "backend-ffmpeg")]
    {
        if ffmpeg_runtime_available() {
            backends.push(Backend::Ffmpeg);
        }
    }
    backends.push(Backend::ImageSequence);
    backends.push(Backend::Mock);
    backends
}

#[cfg(feature = "backend-ffmpeg")]
fn ffmpeg_runtime_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| match ffmpeg_next::init() {
        Ok(()) => true,
        Err(err) => {
            log::warn!("ffmpeg backend disabled: failed to initialize libraries ({err})");
            false
        }
    })
}

/// Which backend reads frames and from where.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub backend: Backend,
    pub input: Option<PathBuf>,
}

impl Default for Configuration {
    fn default() -> Self {
        let backend = compiled_backends()
            .into_iter()
            .next()
            .unwrap_or(Backend::Mock);
        Self {
            backend,
            input: None,
        }
    }
}

impl Configuration {
    pub fn from_env() -> FrameResult<Self> {
        let mut config = Configuration::default();
        if let Ok(backend) = env::var(BACKEND_ENV) {
            config.backend = Backend::from_str(&backend)?;
        }
        if let Ok(path) = env::var(INPUT_ENV) {
            config.input = Some(PathBuf::from(path));
        }
        Ok(config)
    }

    /// Directories are read as image sequences, everything else as a video
    /// container through ffmpeg.
    pub fn for_input<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let backend = if path.is_dir() {
            Backend::ImageSequence
        } else {
            Backend::Ffmpeg
        };
        Self {
            backend,
            input: Some(path.to_path_buf()),
        }
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn available_backends() -> Vec<Backend> {
        compiled_backends()
    }

    pub fn create_source(&self) -> FrameResult<DynFrameSource> {
        match self.backend {
            Backend::Mock => crate::backends::mock::boxed_mock(),
            Backend::ImageSequence => {
                let path = self.required_input("image-sequence")?;
                crate::backends::image_sequence::boxed_image_sequence(path)
            }
            Backend::Ffmpeg => {
                #[cfg(feature = "backend-ffmpeg")]
                {
                    let path = self.required_input("ffmpeg")?;
                    crate::backends::ffmpeg::boxed_ffmpeg(path)
                }
                #[cfg(not(feature = "backend-ffmpeg"))]
                {
                    Err(FrameError::unsupported("ffmpeg"))
                }
            }
        }
    }

    fn required_input(&self, backend: &str) -> FrameResult<&Path> {
        self.input.as_deref().ok_or_else(|| {
            FrameError::configuration(format!(
                "{backend} backend requires an input path (or {INPUT_ENV})"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_names_case_insensitively() {
        assert_eq!("MOCK".parse::<Backend>().unwrap(), Backend::Mock);
        assert_eq!("images".parse::<Backend>().unwrap(), Backend::ImageSequence);
        assert_eq!(
            "image-sequence".parse::<Backend>().unwrap(),
            Backend::ImageSequence
        );
        assert_eq!("ffmpeg".parse::<Backend>().unwrap(), Backend::Ffmpeg);
        assert!("vlc".parse::<Backend>().is_err());
    }

    #[test]
    fn display_matches_parse() {
        for backend in [Backend::Mock, Backend::ImageSequence, Backend::Ffmpeg] {
            assert_eq!(backend.to_string().parse::<Backend>().unwrap(), backend);
        }
    }

    #[test]
    fn image_sequence_requires_input() {
        let config = Configuration {
            backend: Backend::ImageSequence,
            input: None,
        };
        let err = config.create_source().err().expect("missing input");
        assert!(matches!(err, FrameError::Configuration { .. }));
    }

    #[test]
    fn mock_and_image_sequence_are_always_available() {
        let backends = Configuration::available_backends();
        assert!(backends.contains(&Backend::Mock));
        assert!(backends.contains(&Backend::ImageSequence));
    }

    #[test]
    fn directories_select_image_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let config = Configuration::for_input(dir.path());
        assert_eq!(config.backend, Backend::ImageSequence);
        let config = Configuration::for_input(dir.path().join("clip.mp4"));
        assert_eq!(config.backend, Backend::Ffmpeg);
    }

    #[cfg(feature = "backend-ffmpeg")]
    #[test]
    fn video_files_reach_the_ffmpeg_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = Configuration::for_input(dir.path().join("movie.mp4"));
        assert_eq!(config.backend, Backend::Ffmpeg);
        let err = config.create_source().err().expect("file does not exist");
        assert!(matches!(err, FrameError::Io(_)), "{err:?}");
    }

    #[cfg(not(feature = "backend-ffmpeg"))]
    #[test]
    fn ffmpeg_unsupported_without_feature() {
        let config = Configuration {
            backend: Backend::Ffmpeg,
            input: Some(PathBuf::from("video.mp4")),
        };
        let err = config.create_source().err().expect("unsupported");
        assert!(matches!(err, FrameError::Unsupported { .. }));
    }
}
