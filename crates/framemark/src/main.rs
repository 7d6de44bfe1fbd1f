use std::env;
use std::error::Error;
use std::process::ExitCode;

use framemark::cli::{AnnotateArgs, Command, ConfigArgs, SplitArgs, parse_cli};
use framemark::dataset::{PartitionConfig, create_dataset};
use framemark::input::{EventSource, ScriptedEvents, TerminalEvents};
use framemark::output::{AnnotationWriter, SessionLayout, session_id_now};
use framemark::render::{CONTROLS, FrameView, NullView, PreviewView};
use framemark::settings::{ConfigError, TrainingSettings, load_settings};
use framemark::training::TrainingCommand;
use framemark::{Annotator, AnnotatorOptions, init_logging};
use framemark_decoder::config::BACKEND_ENV;
use framemark_decoder::{Backend, Configuration, FrameError};
use log::{LevelFilter, info};

const PREVIEW_FILE: &str = "preview.jpg";

fn main() -> ExitCode {
    init_logging(LevelFilter::Info);
    let cli = parse_cli();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Annotate(args) => annotate(args),
        Command::Split(args) => split(args),
        Command::TrainCommand(args) => train_command(args),
        Command::ListBackends => {
            print_available_backends();
            Ok(())
        }
    }
}

fn annotate(args: AnnotateArgs) -> Result<(), Box<dyn Error>> {
    let settings = load_settings(args.config.config.as_deref())?;
    let classes = settings.classes()?;
    info!("classes: {classes}");

    let source = source_config(&args)?.create_source()?;

    let output_root = args
        .output_root
        .clone()
        .unwrap_or_else(|| settings.output_root.clone());
    let layout = SessionLayout::create(&output_root, &session_id_now())?;
    info!(
        "session {} writing to {}",
        layout.session_id(),
        output_root.display()
    );

    let options = AnnotatorOptions {
        stride: args.stride.unwrap_or(settings.stride),
        display: settings.display,
        jpeg_quality: settings.jpeg_quality,
        start_frame: args.start_frame,
        ..AnnotatorOptions::default()
    };
    let annotator = Annotator::open(source, classes, options, AnnotationWriter::new(layout))?;

    let mut events: Box<dyn EventSource> = match &args.script {
        Some(path) => Box::new(ScriptedEvents::from_path(path)?),
        None => {
            info!("{CONTROLS}");
            info!("type commands (down X Y, move X Y, up X Y, key C, next, prev, commit, undo, clear, class N, quit)");
            Box::new(TerminalEvents::spawn()?)
        }
    };

    let preview = args
        .preview
        .clone()
        .or_else(|| args.script.is_none().then(|| output_root.join(PREVIEW_FILE)));
    let mut view: Box<dyn FrameView> = match preview {
        Some(path) => {
            info!("preview image: {}", path.display());
            Box::new(PreviewView::new(path, settings.jpeg_quality))
        }
        None => Box::new(NullView),
    };

    let summary = annotator.run(&mut *events, &mut *view)?;
    println!(
        "session {}: saved {} frame(s) with {} box(es)",
        summary.session_id,
        summary.frames.len(),
        summary.boxes_written
    );
    for frame in &summary.frames {
        println!("  {}", frame.label_path.display());
    }
    Ok(())
}

fn source_config(args: &AnnotateArgs) -> Result<Configuration, FrameError> {
    let mut config = Configuration::for_input(&args.input);
    if let Ok(name) = env::var(BACKEND_ENV) {
        config.backend = name.parse::<Backend>()?;
    }
    if let Some(name) = args.backend.as_deref() {
        config.backend = name.parse::<Backend>()?;
    }
    if !Configuration::available_backends().contains(&config.backend) {
        return Err(FrameError::unsupported(config.backend.as_str()));
    }
    Ok(config)
}

fn split(args: SplitArgs) -> Result<(), Box<dyn Error>> {
    let settings = load_settings(args.config.config.as_deref())?;
    let ratio = settings.dataset_ratio()?;
    let raw = args.raw.unwrap_or_else(|| settings.output_root.clone());
    let out = args.out.unwrap_or_else(|| settings.datasets_root.clone());

    let report = create_dataset(&raw, &out, &PartitionConfig::new(ratio, settings.seed))?;
    println!("Successfully created {}:", report.dir.display());
    println!("Train: {} images", report.train);
    println!("Val: {} images", report.val);
    println!("Test_dev: {} images", report.test_dev);
    Ok(())
}

fn train_command(args: ConfigArgs) -> Result<(), Box<dyn Error>> {
    let training = match load_settings(args.config.as_deref()) {
        Ok(settings) => settings.training,
        Err(ConfigError::NotFound { .. }) if args.config.is_none() => TrainingSettings::default(),
        Err(err) => return Err(err.into()),
    };
    println!("{}", TrainingCommand::from_settings(&training));
    Ok(())
}

fn print_available_backends() {
    let names: Vec<&'static str> = Configuration::available_backends()
        .into_iter()
        .map(|backend| backend.as_str())
        .collect();
    println!("available backends: {}", names.join(", "));
}
