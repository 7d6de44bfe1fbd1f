//! JSON settings: file lookup, parsing and validation.

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use framemark_types::Resolution;
use serde::Deserialize;

use crate::classes::ClassSet;
use crate::mapper::DEFAULT_DISPLAY;
use crate::output::DEFAULT_JPEG_QUALITY;
use crate::session::DEFAULT_STRIDE;

pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_OUTPUT_ROOT: &str = "raw_dataset";
pub const DEFAULT_DATASETS_ROOT: &str = "datasets";
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    classes: Option<Vec<String>>,
    dataset_ratio: Option<RatioFileConfig>,
    display: Option<DisplayFileConfig>,
    stride: Option<u64>,
    jpeg_quality: Option<u32>,
    seed: Option<u64>,
    output_root: Option<String>,
    datasets_root: Option<String>,
    training: Option<TrainingFileConfig>,
}

#[derive(Debug, Default, Deserialize, Clone, Copy)]
#[serde(default)]
struct RatioFileConfig {
    test: Option<f64>,
    val: Option<f64>,
}

#[derive(Debug, Default, Deserialize, Clone, Copy)]
#[serde(default)]
struct DisplayFileConfig {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
struct TrainingFileConfig {
    data: Option<String>,
    model: Option<String>,
    epochs: Option<u32>,
    imgsz: Option<u32>,
    name: Option<String>,
    extra: BTreeMap<String, serde_json::Value>,
}

/// Fractions of the whole corpus held out for test_dev and val.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatasetRatio {
    pub test: f64,
    pub val: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingSettings {
    pub data: String,
    pub model: String,
    pub epochs: u32,
    pub imgsz: u32,
    pub name: String,
    pub extra: BTreeMap<String, String>,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            data: "data.yaml".into(),
            model: "yolov8n.pt".into(),
            epochs: 100,
            imgsz: 640,
            name: "yolo_custom".into(),
            extra: BTreeMap::new(),
        }
    }
}

/// Configuration resolved once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config_path: PathBuf,
    pub display: Resolution,
    pub stride: u64,
    pub jpeg_quality: u8,
    pub seed: u64,
    pub output_root: PathBuf,
    pub datasets_root: PathBuf,
    pub training: TrainingSettings,
    classes: Option<Vec<String>>,
    dataset_ratio: Option<RatioFileConfig>,
}

impl Settings {
    /// The class list; required before an annotation session may start.
    pub fn classes(&self) -> Result<ClassSet, ConfigError> {
        let Some(names) = self.classes.as_ref() else {
            return Err(self.missing("classes"));
        };
        if names.is_empty() {
            return Err(self.invalid("classes", "[]".into()));
        }
        if let Some(blank) = names.iter().find(|name| name.trim().is_empty()) {
            return Err(self.invalid("classes", format!("{blank:?}")));
        }
        Ok(ClassSet::new(names.iter().cloned()))
    }

    /// `dataset_ratio.test` and `dataset_ratio.val`; required for splitting.
    pub fn dataset_ratio(&self) -> Result<DatasetRatio, ConfigError> {
        let Some(ratio) = self.dataset_ratio else {
            return Err(self.missing("dataset_ratio"));
        };
        let test = ratio.test.ok_or_else(|| self.missing("dataset_ratio.test"))?;
        let val = ratio.val.ok_or_else(|| self.missing("dataset_ratio.val"))?;
        for (field, value) in [("dataset_ratio.test", test), ("dataset_ratio.val", val)] {
            if !value.is_finite() {
                return Err(self.invalid(field, value.to_string()));
            }
        }
        Ok(DatasetRatio { test, val })
    }

    fn missing(&self, key: &'static str) -> ConfigError {
        ConfigError::MissingKey {
            path: self.config_path.clone(),
            key,
        }
    }

    fn invalid(&self, field: &'static str, value: String) -> ConfigError {
        ConfigError::InvalidValue {
            path: Some(self.config_path.clone()),
            field,
            value,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    MissingKey {
        path: PathBuf,
        key: &'static str,
    },
    InvalidValue {
        path: Option<PathBuf>,
        field: &'static str,
        value: String,
    },
    NotFound {
        searched: Vec<PathBuf>,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read config file {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "failed to parse config file {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::MissingKey { path, key } => {
                write!(f, "missing key '{}' in {}", key, path.display())
            }
            ConfigError::InvalidValue { path, field, value } => {
                if let Some(path) = path {
                    write!(
                        f,
                        "invalid value '{}' for '{}' in {}",
                        value,
                        field,
                        path.display()
                    )
                } else {
                    write!(f, "invalid value '{}' for '{}'", value, field)
                }
            }
            ConfigError::NotFound { searched } => {
                let paths: Vec<String> = searched
                    .iter()
                    .map(|path| path.display().to_string())
                    .collect();
                write!(f, "config file not found (looked in: {})", paths.join(", "))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::MissingKey { .. } => None,
            ConfigError::InvalidValue { .. } => None,
            ConfigError::NotFound { .. } => None,
        }
    }
}

/// `--config` when given, else `./config.json`, else the per-user config dir.
pub fn load_settings(path_override: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut candidates = Vec::new();
    candidates.extend(project_config_path());
    candidates.extend(default_config_path());
    load_from(path_override, &candidates)
}

fn load_from(path_override: Option<&Path>, candidates: &[PathBuf]) -> Result<Settings, ConfigError> {
    if let Some(path) = path_override {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                searched: vec![path.to_path_buf()],
            });
        }
        return read_settings(path);
    }
    match candidates.iter().find(|path| path.exists()) {
        Some(path) => read_settings(path),
        None => Err(ConfigError::NotFound {
            searched: candidates.to_vec(),
        }),
    }
}

fn read_settings(path: &Path) -> Result<Settings, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_settings(&contents, path)
}

pub fn parse_settings(contents: &str, path: &Path) -> Result<Settings, ConfigError> {
    let file: FileConfig = serde_json::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    merge(file, path.to_path_buf())
}

fn merge(file: FileConfig, config_path: PathBuf) -> Result<Settings, ConfigError> {
    let FileConfig {
        classes,
        dataset_ratio,
        display: file_display,
        stride: file_stride,
        jpeg_quality: file_jpeg_quality,
        seed,
        output_root,
        datasets_root,
        training: file_training,
    } = file;

    let invalid = |field: &'static str, value: String| ConfigError::InvalidValue {
        path: Some(config_path.clone()),
        field,
        value,
    };

    let mut display = DEFAULT_DISPLAY;
    if let Some(section) = file_display {
        if let Some(width) = section.width {
            if width == 0 {
                return Err(invalid("display.width", width.to_string()));
            }
            display.width = width;
        }
        if let Some(height) = section.height {
            if height == 0 {
                return Err(invalid("display.height", height.to_string()));
            }
            display.height = height;
        }
    }

    let stride = match file_stride {
        Some(0) => return Err(invalid("stride", "0".into())),
        Some(value) => value,
        None => DEFAULT_STRIDE,
    };

    let jpeg_quality = match file_jpeg_quality {
        Some(value @ 1..=100) => value as u8,
        Some(value) => return Err(invalid("jpeg_quality", value.to_string())),
        None => DEFAULT_JPEG_QUALITY,
    };

    let training = merge_training(file_training, &invalid)?;

    Ok(Settings {
        display,
        stride,
        jpeg_quality,
        seed: seed.unwrap_or(DEFAULT_SEED),
        output_root: path_or_default(output_root, DEFAULT_OUTPUT_ROOT),
        datasets_root: path_or_default(datasets_root, DEFAULT_DATASETS_ROOT),
        training,
        classes,
        dataset_ratio,
        config_path,
    })
}

fn merge_training(
    file: Option<TrainingFileConfig>,
    invalid: &dyn Fn(&'static str, String) -> ConfigError,
) -> Result<TrainingSettings, ConfigError> {
    let mut training = TrainingSettings::default();
    let Some(file) = file else {
        return Ok(training);
    };
    if let Some(data) = normalize_string(file.data) {
        training.data = data;
    }
    if let Some(model) = normalize_string(file.model) {
        training.model = model;
    }
    if let Some(name) = normalize_string(file.name) {
        training.name = name;
    }
    if let Some(epochs) = file.epochs {
        if epochs == 0 {
            return Err(invalid("training.epochs", "0".into()));
        }
        training.epochs = epochs;
    }
    if let Some(imgsz) = file.imgsz {
        if imgsz == 0 {
            return Err(invalid("training.imgsz", "0".into()));
        }
        training.imgsz = imgsz;
    }
    for (key, value) in file.extra {
        let rendered = match value {
            serde_json::Value::String(text) => text,
            serde_json::Value::Number(_) | serde_json::Value::Bool(_) => value.to_string(),
            other => return Err(invalid("training.extra", other.to_string())),
        };
        training.extra.insert(key, rendered);
    }
    Ok(training)
}

fn normalize_string(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn path_or_default(value: Option<String>, default: &str) -> PathBuf {
    PathBuf::from(normalize_string(value).unwrap_or_else(|| default.to_string()))
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("rs", "framemark", "framemark").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

fn project_config_path() -> Option<PathBuf> {
    env::current_dir().ok().map(|dir| dir.join(CONFIG_FILE))
}
