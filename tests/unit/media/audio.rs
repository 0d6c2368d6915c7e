use super::*;

#[test]
fn parses_format_duration() {
    let json = br#"{"format": {"filename": "song.mp3", "duration": "183.471000"}}"#;
    assert!((parse_probe_duration(json).unwrap() - 183.471).abs() < 1e-9);
}

#[test]
fn missing_duration_is_rejected() {
    assert!(parse_probe_duration(br#"{"format": {}}"#).is_err());
    assert!(parse_probe_duration(br#"{"format": {"duration": "N/A"}}"#).is_err());
}

#[test]
fn audio_track_rejects_negative_duration() {
    assert!(AudioTrack::new("a.wav", -1.0).is_err());
    assert_eq!(AudioTrack::new("a.wav", 2.5).unwrap().duration_secs, 2.5);
}
