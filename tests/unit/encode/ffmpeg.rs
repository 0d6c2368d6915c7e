use super::*;

fn cfg(audio: Option<&str>) -> SinkConfig {
    SinkConfig {
        width: 1280,
        height: 720,
        fps: Fps::new(24, 1).unwrap(),
        audio: audio.map(PathBuf::from),
    }
}

fn position(args: &[String], needle: &str) -> usize {
    args.iter().position(|a| a == needle).unwrap()
}

#[test]
fn args_without_audio_disable_audio_stream() {
    let args = ffmpeg_args(&FfmpegSinkOpts::new("out.mp4"), &cfg(None));
    assert_eq!(args[0], "-y");
    assert!(args.contains(&"-an".to_owned()));
    assert!(args.contains(&"1280x720".to_owned()));
    assert!(args.contains(&"24/1".to_owned()));
    assert_eq!(args.last().unwrap(), "out.mp4");
}

#[test]
fn args_with_audio_map_both_inputs() {
    let args = ffmpeg_args(&FfmpegSinkOpts::new("out.mkv"), &cfg(Some("song.mp3")));
    assert!(!args.contains(&"-an".to_owned()));
    assert!(args.contains(&"song.mp3".to_owned()));
    assert!(args.contains(&"-shortest".to_owned()));
    assert_eq!(args[position(&args, "-c:a") + 1], "aac");
    assert_eq!(args[position(&args, "-c:v") + 1], "libx264");
    // Raw frame input comes before the audio input.
    assert!(position(&args, "pipe:0") < position(&args, "song.mp3"));
}

#[test]
fn custom_codecs_and_no_overwrite() {
    let opts = FfmpegSinkOpts {
        overwrite: false,
        video_codec: "libx265".to_owned(),
        ..FfmpegSinkOpts::new("out.mp4")
    };
    let args = ffmpeg_args(&opts, &cfg(None));
    assert_eq!(args[0], "-n");
    assert_eq!(args[position(&args, "-c:v") + 1], "libx265");
}

#[test]
fn begin_rejects_odd_dimensions() {
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(std::env::temp_dir().join("odd.mp4")));
    let err = sink
        .begin(SinkConfig {
            width: 101,
            ..cfg(None)
        })
        .unwrap_err();
    assert!(matches!(err, LyricError::Validation(_)));
}

#[test]
fn push_before_begin_is_an_encode_error() {
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new("never.mp4"));
    let frame = FrameRGBA::transparent(crate::foundation::core::Canvas {
        width: 2,
        height: 2,
    });
    let err = sink.push_frame(FrameIndex(0), &frame).unwrap_err();
    assert!(matches!(err, LyricError::Encode(_)));
}
