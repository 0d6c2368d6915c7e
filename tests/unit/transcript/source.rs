use super::*;

#[test]
fn parses_bare_array() {
    let words =
        parse_transcript_json(r#"[{"text":"sun","start":0.0,"end":0.3,"confidence":0.9}]"#)
            .unwrap();
    assert_eq!(words.len(), 1);
    assert_eq!(words[0].text, "sun");
    assert_eq!(words[0].confidence, Some(0.9));
}

#[test]
fn parses_words_object() {
    let words = parse_transcript_json(
        r#"{"words":[{"text":"a","start":0,"end":1},{"text":"b","start":1,"end":2}]}"#,
    )
    .unwrap();
    assert_eq!(words.len(), 2);
    assert_eq!(words[1].start, 1.0);
    assert_eq!(words[1].confidence, None);
}

#[test]
fn parses_whisper_word_timestamps() {
    let json = r#"{
        "text": " sun rise",
        "language": "en",
        "segments": [
            {"id": 0, "text": " sun", "words": [{"word": " sun", "start": 0.0, "end": 0.3, "probability": 0.8}]},
            {"id": 1, "text": " rise", "words": [{"word": " rise", "start": 0.3, "end": 0.6, "probability": 0.7}]}
        ]
    }"#;
    let words = parse_transcript_json(json).unwrap();
    assert_eq!(words.len(), 2);
    assert_eq!(words[0].text, " sun");
    assert_eq!(words[1].confidence, Some(0.7));
}

#[test]
fn rejects_unknown_shape() {
    assert!(parse_transcript_json(r#"{"lyrics":"la la"}"#).is_err());
}

#[test]
fn transcript_file_reads_from_disk() {
    let path = std::env::temp_dir().join(format!(
        "lyricframe_transcript_{}.json",
        std::process::id()
    ));
    std::fs::write(&path, r#"[{"text":"hi","start":0.5,"end":0.9}]"#).unwrap();
    let file = TranscriptFile::new(&path);
    let words = file.transcribe(Path::new("ignored.wav")).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(words, vec![Word::new("hi", 0.5, 0.9)]);
}
