use std::fs;
use std::path::Path;

use framemark::input::{InputEvent, ScriptedEvents};
use framemark::output::{AnnotationWriter, SessionLayout};
use framemark::render::NullView;
use framemark::{Annotator, AnnotatorOptions, ClassSet, EngineError};
use framemark_decoder::backends::mock::MockSource;
use framemark_types::Resolution;

fn open(source: MockSource, root: &Path, options: AnnotatorOptions) -> Annotator<MockSource> {
    let layout = SessionLayout::create(root, "session").unwrap();
    Annotator::open(
        source,
        ClassSet::new(["car", "person"]),
        options,
        AnnotationWriter::new(layout),
    )
    .unwrap()
}

fn label(root: &Path, index: u64) -> std::path::PathBuf {
    root.join(format!("labels/session/frame_{index:06}.txt"))
}

fn image(root: &Path, index: u64) -> std::path::PathBuf {
    root.join(format!("images/session/frame_{index:06}.jpg"))
}

#[test]
fn scripted_session_persists_only_committed_frames() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let annotator = open(
        MockSource::new(100, 640, 360),
        root,
        AnnotatorOptions::default(),
    );

    let mut script = ScriptedEvents::parse(
        "\
class 0
down 100 100
move 200 250
up 300 400
commit
next
next
# a draft that is never committed is not saved
class 1
down 10 10
up 50 60
next
down 640 360
up 0 0
commit
quit
",
    );
    let summary = annotator.run(&mut script, &mut NullView).unwrap();

    assert_eq!(summary.session_id, "session");
    let frames: Vec<u64> = summary.frames.iter().map(|f| f.frame_index).collect();
    assert_eq!(frames, vec![0, 30]);
    assert_eq!(summary.boxes_written, 2);

    assert_eq!(
        fs::read_to_string(label(root, 0)).unwrap(),
        "0 0.156250 0.347222 0.156250 0.416667\n"
    );
    assert_eq!(
        fs::read_to_string(label(root, 30)).unwrap(),
        "1 0.250000 0.250000 0.500000 0.500000\n"
    );
    assert_eq!(image::image_dimensions(image(root, 0)).unwrap(), (1280, 720));

    for empty in [10, 20] {
        assert!(!label(root, empty).exists());
        assert!(!image(root, empty).exists());
    }
}

#[test]
fn closed_input_flushes_like_quit() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let annotator = open(
        MockSource::new(50, 64, 36),
        root,
        AnnotatorOptions {
            display: Resolution::new(64, 36),
            start_frame: 25,
            ..AnnotatorOptions::default()
        },
    );
    let mut events = ScriptedEvents::from_events([
        InputEvent::PointerDown { x: 1, y: 1 },
        InputEvent::PointerUp { x: 9, y: 9 },
        InputEvent::Key('s'),
    ]);
    let summary = annotator.run(&mut events, &mut NullView).unwrap();
    assert_eq!(summary.frames.len(), 1);
    assert_eq!(summary.frames[0].frame_index, 20);
    assert!(label(root, 20).exists());
}

#[test]
fn next_never_passes_two_frames_before_the_end() {
    let dir = tempfile::tempdir().unwrap();
    let total = 100;
    let mut annotator = open(
        MockSource::new(total, 64, 36),
        dir.path(),
        AnnotatorOptions {
            display: Resolution::new(64, 36),
            start_frame: total - 5,
            ..AnnotatorOptions::default()
        },
    );
    assert_eq!(annotator.state().current_frame, 90);
    for _ in 0..5 {
        annotator.handle(InputEvent::Key('n')).unwrap();
        assert!(annotator.state().current_frame <= total - 2);
    }
    assert_eq!(annotator.state().current_frame, total - 2);

    annotator.handle(InputEvent::Key('p')).unwrap();
    assert_eq!(annotator.state().current_frame, 88);
}

#[test]
fn resaving_a_frame_replaces_its_entry() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let source = MockSource::new(100, 64, 36).with_unreadable([10]);
    let annotator = open(
        source,
        root,
        AnnotatorOptions {
            display: Resolution::new(64, 36),
            ..AnnotatorOptions::default()
        },
    );
    let mut script = ScriptedEvents::parse(
        "\
down 0 0
up 10 10
commit
next
down 20 20
up 30 30
commit
quit
",
    );
    let summary = annotator.run(&mut script, &mut NullView).unwrap();

    assert_eq!(summary.frames.len(), 1);
    assert_eq!(summary.frames[0].frame_index, 0);
    assert_eq!(summary.boxes_written, 2);
    let lines = fs::read_to_string(label(root, 0)).unwrap();
    assert_eq!(lines.lines().count(), 2);
}

#[test]
fn undo_and_clear_shape_what_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let annotator = open(
        MockSource::new(100, 64, 36),
        root,
        AnnotatorOptions {
            display: Resolution::new(64, 36),
            ..AnnotatorOptions::default()
        },
    );
    let mut script = ScriptedEvents::parse(
        "\
down 0 0
up 10 10
commit
down 20 20
up 30 30
undo
next
down 0 0
up 5 5
commit
clear
quit
",
    );
    let summary = annotator.run(&mut script, &mut NullView).unwrap();
    assert_eq!(summary.frames.len(), 1);
    assert_eq!(summary.boxes_written, 1);
    assert!(!label(root, 10).exists());
}

#[test]
fn write_failure_ends_the_session_and_keeps_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let annotator = open(
        MockSource::new(100, 64, 36),
        root,
        AnnotatorOptions {
            display: Resolution::new(64, 36),
            ..AnnotatorOptions::default()
        },
    );
    fs::remove_dir_all(root.join("labels/session")).unwrap();

    let mut events = ScriptedEvents::from_events([
        InputEvent::PointerDown { x: 1, y: 1 },
        InputEvent::PointerUp { x: 9, y: 9 },
        InputEvent::Key('s'),
        InputEvent::Key('n'),
        InputEvent::Key('q'),
    ]);
    let err = annotator.run(&mut events, &mut NullView).unwrap_err();
    assert!(matches!(err, EngineError::Output(_)), "{err:?}");
    // Image goes first, so it survives the failed label write.
    assert!(image(root, 0).exists());
    assert!(!label(root, 0).exists());
}
