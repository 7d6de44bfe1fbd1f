#![cfg(feature = "backend-ffmpeg")]

use std::env;
use std::path::PathBuf;

use framemark_decoder::{Backend, Configuration};

#[test]
fn ffmpeg_backend_reads_arbitrary_frames() {
    let asset = match env::var("FRAMEMARK_TEST_ASSET") {
        Ok(value) => PathBuf::from(value),
        Err(_) => {
            eprintln!("skipping ffmpeg backend test - FRAMEMARK_TEST_ASSET not set");
            return;
        }
    };

    let config = Configuration {
        backend: Backend::Ffmpeg,
        input: Some(asset),
    };
    let mut source = match config.create_source() {
        Ok(source) => source,
        Err(err) => panic!("failed to initialize ffmpeg backend: {err:?}"),
    };

    let total = source.total_frames().expect("ffmpeg reports a frame count");
    assert!(total > 0);

    let first = source.read_frame(0).expect("first frame decodes");
    assert!(first.width() > 0);
    assert!(first.height() > 0);

    let middle = total / 2;
    let frame = source.read_frame(middle).expect("seek into the middle");
    assert_eq!(frame.frame_index(), Some(middle));
    assert_eq!(frame.resolution(), first.resolution());
}
