use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum OutputError {
    Io {
        path: Option<PathBuf>,
        source: std::io::Error,
    },
    Encode(image::ImageError),
}

impl OutputError {
    pub(crate) fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        OutputError::Io {
            path: Some(path.into()),
            source,
        }
    }
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputError::Io {
                path: Some(path),
                source,
            } => write!(f, "I/O error at {}: {source}", path.display()),
            OutputError::Io { path: None, source } => write!(f, "I/O error: {source}"),
            OutputError::Encode(err) => write!(f, "encoding error: {err}"),
        }
    }
}

impl std::error::Error for OutputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OutputError::Io { source, .. } => Some(source),
            OutputError::Encode(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for OutputError {
    fn from(value: std::io::Error) -> Self {
        OutputError::Io {
            path: None,
            source: value,
        }
    }
}

impl From<image::ImageError> for OutputError {
    fn from(value: image::ImageError) -> Self {
        OutputError::Encode(value)
    }
}
