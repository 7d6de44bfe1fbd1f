use env_logger::Env;
use log::LevelFilter;

pub mod boxes;
pub mod classes;
pub mod cli;
pub mod dataset;
pub mod engine;
pub mod input;
pub mod label;
pub mod mapper;
pub mod output;
pub mod render;
pub mod session;
pub mod settings;
pub mod training;

pub use boxes::{BoundingBox, BoxStore, Point};
pub use classes::ClassSet;
pub use engine::{Annotator, AnnotatorOptions, EngineError, SessionSummary};
pub use session::{Action, SessionState, Step, transition};

/// Installs the `env_logger` backend once; `RUST_LOG` overrides `default`.
pub fn init_logging(default: LevelFilter) {
    let env = Env::default().default_filter_or(default.as_str());
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}
