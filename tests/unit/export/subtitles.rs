use super::*;
use crate::lines::segment::Line;
use crate::timing::schedule::Reveal;
use crate::transcript::word::Word;

fn scheduled(words: &[(&str, f64, f64)], display_start: f64, display_end: f64) -> ScheduledLine {
    let words: Vec<Word> = words
        .iter()
        .map(|(text, s, e)| Word::new(*text, *s, *e))
        .collect();
    let highlight_timeline = words
        .iter()
        .enumerate()
        .map(|(i, w)| Reveal {
            word_index: i,
            time: w.start,
        })
        .collect();
    ScheduledLine {
        line: Line {
            words,
            first_word_index: 0,
            max_chars: 32,
            max_duration: 4.0,
        },
        display_start,
        display_end,
        highlight_timeline,
    }
}

fn sample() -> Vec<ScheduledLine> {
    vec![
        scheduled(&[("Hello", 0.2, 0.6), ("world", 0.6, 1.0)], 0.0, 2.5),
        scheduled(
            &[
                ("This", 3.2, 3.5),
                ("is", 3.5, 3.7),
                ("a", 3.7, 3.8),
                ("test", 3.8, 4.7),
            ],
            3.0,
            5.0,
        ),
    ]
}

#[test]
fn srt_cues_use_display_windows() {
    let srt = to_srt(&sample());
    assert!(srt.contains("1\n00:00:00,000 --> 00:00:02,500\nHello world"));
    assert!(srt.contains("2\n00:00:03,000 --> 00:00:05,000\nThis is a test"));
}

#[test]
fn vtt_has_header_and_dot_millis() {
    let lines = vec![scheduled(&[("One", 61.5, 62.0)], 61.5, 63.0)];
    let vtt = to_vtt(&lines);
    assert!(vtt.starts_with("WEBVTT\n\n"));
    assert!(vtt.contains("00:01:01.500 --> 00:01:03.000\nOne"));
}

#[test]
fn time_formatting_rounds_to_millis() {
    assert_eq!(format_srt_time(0.0), "00:00:00,000");
    assert_eq!(format_srt_time(3661.5), "01:01:01,500");
    assert_eq!(format_vtt_time(3661.5), "01:01:01.500");
    assert_eq!(format_srt_time(0.57), "00:00:00,570");
    assert_eq!(format_srt_time(-1.0), "00:00:00,000");
}

#[test]
fn json_export_contains_reveals() {
    let json = to_json(&sample()).unwrap();
    let v: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(v.as_array().unwrap().len(), 2);
    assert_eq!(v[1]["highlight_timeline"][3]["time"], 3.8);
    assert_eq!(v[0]["display_end"], 2.5);
}

#[test]
fn format_follows_extension() {
    assert_eq!(SubtitleFormat::from_path(Path::new("a.VTT")), SubtitleFormat::Vtt);
    assert_eq!(SubtitleFormat::from_path(Path::new("a.json")), SubtitleFormat::Json);
    assert_eq!(SubtitleFormat::from_path(Path::new("a.srt")), SubtitleFormat::Srt);
    assert_eq!(SubtitleFormat::from_path(Path::new("a")), SubtitleFormat::Srt);
}

#[test]
fn save_writes_file() {
    let path = std::env::temp_dir().join(format!("lyricframe_subs_{}.vtt", std::process::id()));
    save_subtitles(&sample(), &path).unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("WEBVTT"));
    std::fs::remove_file(&path).unwrap();
}
