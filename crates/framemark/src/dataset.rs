//! Splits annotated sessions into train / val / test_dev sets.
//!
//! Input is the annotation output root (`images/<session>/*`,
//! `labels/<session>/<stem>.txt`); output is a fresh
//! `dataset_<timestamp>/{images,labels}/{train,val,test_dev}` tree of copies.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::output::session_id_now;
use crate::output::writer::{IMAGES_DIR, LABELS_DIR};
use crate::settings::{DEFAULT_SEED, DatasetRatio};

pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];
pub const SUBSETS: [&str; 3] = ["train", "val", "test_dev"];

#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("directory '{name}' not found in {}", root.display())]
    DirectoryNotFound { name: &'static str, root: PathBuf },

    #[error("no image with a matching label found under {}", root.display())]
    NoPairs { root: PathBuf },

    #[error("{stage} split with ratio {ratio} over {total} pairs leaves a side empty")]
    DegenerateSplit {
        stage: &'static str,
        ratio: f64,
        total: usize,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> PartitionError {
    let path = path.to_path_buf();
    move |source| PartitionError::Io { path, source }
}

/// An image and its label file from one annotation session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SamplePair {
    pub subfolder: String,
    pub image: PathBuf,
    pub label: PathBuf,
}

impl SamplePair {
    fn copy_name(&self, path: &Path) -> String {
        let file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}_{}", self.subfolder, file)
    }

    /// `<session>_<file>`: sessions reuse frame names, so copies are prefixed.
    pub fn image_copy_name(&self) -> String {
        self.copy_name(&self.image)
    }

    pub fn label_copy_name(&self) -> String {
        self.copy_name(&self.label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartitionConfig {
    pub test_ratio: f64,
    pub val_ratio: f64,
    pub seed: u64,
}

impl PartitionConfig {
    pub fn new(ratio: DatasetRatio, seed: u64) -> Self {
        Self {
            test_ratio: ratio.test,
            val_ratio: ratio.val,
            seed,
        }
    }
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            test_ratio: 0.2,
            val_ratio: 0.1,
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub train: Vec<SamplePair>,
    pub val: Vec<SamplePair>,
    pub test_dev: Vec<SamplePair>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.train.len() + self.val.len() + self.test_dev.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subsets(&self) -> [(&'static str, &[SamplePair]); 3] {
        [
            (SUBSETS[0], self.train.as_slice()),
            (SUBSETS[1], self.val.as_slice()),
            (SUBSETS[2], self.test_dev.as_slice()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetReport {
    pub dir: PathBuf,
    pub train: usize,
    pub val: usize,
    pub test_dev: usize,
}

/// Every image under `images/<subfolder>/` with a label at
/// `labels/<subfolder>/<stem>.txt`, in path order.
pub fn collect_pairs(raw_root: &Path) -> Result<Vec<SamplePair>, PartitionError> {
    let images_root = raw_root.join(IMAGES_DIR);
    let labels_root = raw_root.join(LABELS_DIR);
    for (name, dir) in [(IMAGES_DIR, &images_root), (LABELS_DIR, &labels_root)] {
        if !dir.is_dir() {
            return Err(PartitionError::DirectoryNotFound {
                name,
                root: raw_root.to_path_buf(),
            });
        }
    }

    let mut pairs = Vec::new();
    for subfolder in sorted_entries(&images_root)? {
        if !subfolder.is_dir() {
            continue;
        }
        let Some(name) = subfolder.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        for image in sorted_entries(&subfolder)? {
            if !image.is_file() || !has_image_extension(&image) {
                continue;
            }
            let Some(stem) = image.file_stem() else {
                continue;
            };
            let mut label_name = stem.to_os_string();
            label_name.push(".txt");
            let label = labels_root.join(&name).join(label_name);
            if label.is_file() {
                pairs.push(SamplePair {
                    subfolder: name.clone(),
                    image,
                    label,
                });
            } else {
                warn!("missing label for {}", image.display());
            }
        }
    }
    Ok(pairs)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, PartitionError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error(dir))? {
        entries.push(entry.map_err(io_error(dir))?.path());
    }
    entries.sort();
    Ok(entries)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Two seeded stages: hold out `test_ratio` of everything as test_dev, then
/// `val_ratio / (1 - test_ratio)` of the remainder as val.
pub fn plan(pairs: Vec<SamplePair>, config: &PartitionConfig) -> Result<Partition, PartitionError> {
    if pairs.is_empty() {
        return Err(PartitionError::NoPairs {
            root: PathBuf::new(),
        });
    }
    let (rest, test_dev) = split_off(pairs, config.test_ratio, config.seed, "test_dev")?;
    let val_share = config.val_ratio / (1.0 - config.test_ratio);
    let (train, val) = split_off(rest, val_share, config.seed, "val")?;
    Ok(Partition {
        train,
        val,
        test_dev,
    })
}

/// Shuffles `items` and moves `ceil(ratio * n)` of them into the held-out side.
fn split_off(
    mut items: Vec<SamplePair>,
    ratio: f64,
    seed: u64,
    stage: &'static str,
) -> Result<(Vec<SamplePair>, Vec<SamplePair>), PartitionError> {
    let total = items.len();
    let degenerate = PartitionError::DegenerateSplit {
        stage,
        ratio,
        total,
    };
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(degenerate);
    }
    // Tolerate float noise such as 2.9999999999999996 meaning 3.
    let held = ((ratio * total as f64) - 1e-9).ceil() as usize;
    if held == 0 || held >= total {
        return Err(degenerate);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);
    let kept = items.split_off(held);
    Ok((kept, items))
}

/// Copies every pair of `partition` into `dataset_dir`, showing progress.
pub fn export(partition: &Partition, dataset_dir: &Path) -> Result<(), PartitionError> {
    for kind in [IMAGES_DIR, LABELS_DIR] {
        for subset in SUBSETS {
            let dir = dataset_dir.join(kind).join(subset);
            fs::create_dir_all(&dir).map_err(io_error(&dir))?;
        }
    }

    let bar = ProgressBar::new(partition.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{prefix:<8} {bar:40.cyan/blue} {pos}/{len} pairs {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_prefix("copying");

    for (subset, pairs) in partition.subsets() {
        bar.set_message(subset);
        for pair in pairs {
            let image_dest = dataset_dir.join(IMAGES_DIR).join(subset).join(pair.image_copy_name());
            let label_dest = dataset_dir.join(LABELS_DIR).join(subset).join(pair.label_copy_name());
            fs::copy(&pair.image, &image_dest).map_err(io_error(&pair.image))?;
            fs::copy(&pair.label, &label_dest).map_err(io_error(&pair.label))?;
            bar.inc(1);
        }
    }
    bar.finish_and_clear();
    Ok(())
}

/// Collects, plans and exports into `datasets_root/dataset_<timestamp>`.
pub fn create_dataset(
    raw_root: &Path,
    datasets_root: &Path,
    config: &PartitionConfig,
) -> Result<DatasetReport, PartitionError> {
    let pairs = collect_pairs(raw_root)?;
    if pairs.is_empty() {
        return Err(PartitionError::NoPairs {
            root: raw_root.to_path_buf(),
        });
    }
    info!("found {} labelled images under {}", pairs.len(), raw_root.display());

    let partition = plan(pairs, config)?;
    let dir = datasets_root.join(format!("dataset_{}", session_id_now()));
    export(&partition, &dir)?;

    Ok(DatasetReport {
        dir,
        train: partition.train.len(),
        val: partition.val.len(),
        test_dev: partition.test_dev.len(),
    })
}
