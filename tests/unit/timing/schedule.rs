use super::*;
use crate::transcript::word::Word;

fn line(first_word_index: usize, words: &[(&str, f64, f64)]) -> Line {
    Line {
        words: words
            .iter()
            .map(|&(t, s, e)| Word::new(t, s, e))
            .collect(),
        first_word_index,
        max_chars: 100,
        max_duration: 10.0,
    }
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn single_line_reveals_follow_word_starts() {
    let lines = vec![line(
        0,
        &[("sun", 0.0, 0.3), ("rise", 0.3, 0.6), ("over", 1.0, 1.3)],
    )];
    let s = schedule_lines(&lines, &ScheduleOpts::default()).unwrap();
    assert_eq!(s.len(), 1);
    assert_eq!(s[0].display_start, 0.0);
    assert!(approx(s[0].display_end, 1.6));
    let reveals: Vec<f64> = s[0].highlight_timeline.iter().map(|r| r.time).collect();
    assert_eq!(reveals, vec![0.0, 0.3, 1.0]);
}

#[test]
fn overlapping_raw_windows_abut_with_min_gap() {
    // Word windows are disjoint; padded by lead-in and lead-out they become
    // [0.0, 1.3) and [1.25, 2.3), overlapping by 0.05s.
    let lines = vec![
        line(0, &[("a", 0.0, 1.0)]),
        line(1, &[("b", 1.45, 2.0)]),
    ];
    let opts = ScheduleOpts {
        min_gap: 0.1,
        ..ScheduleOpts::default()
    };
    let s = schedule_lines(&lines, &opts).unwrap();
    assert!(approx(s[0].display_end, 1.3));
    assert!(approx(s[1].display_start - s[0].display_end, 0.1));
    assert!(s[0].display_end <= s[1].display_start);
    assert!(s[1].display_start <= 1.45);
}

#[test]
fn overlapping_word_windows_are_split_by_min_gap() {
    // "a" is still sounding when "b" starts.
    let lines = vec![
        line(0, &[("a", 0.0, 1.3)]),
        line(1, &[("b", 1.25, 2.0)]),
    ];
    let opts = ScheduleOpts {
        lead_in: 0.0,
        lead_out: 0.0,
        min_gap: 0.1,
        ..ScheduleOpts::default()
    };
    let s = schedule_lines(&lines, &opts).unwrap();
    assert!(approx(s[0].display_end, 1.15));
    assert!(approx(s[1].display_start, 1.25));
    assert!(approx(s[1].display_start - s[0].display_end, 0.1));
    assert!(approx(s[0].highlight_timeline[0].time, 0.0));
    assert!(approx(s[1].highlight_timeline[0].time, 1.25));
}

#[test]
fn inverted_window_is_unschedulable() {
    let lines = vec![
        line(0, &[("hey.", 2.0, 2.04)]),
        line(1, &[("you", 2.05, 2.5)]),
    ];
    let opts = ScheduleOpts {
        lead_in: 0.0,
        min_gap: 0.1,
        ..ScheduleOpts::default()
    };
    let err = schedule_lines(&lines, &opts).unwrap_err();
    assert!(matches!(
        err,
        LyricError::UnschedulableOverlap {
            first: 0,
            second: 1,
            ..
        }
    ));
}

#[test]
fn tied_starts_are_spread_by_epsilon() {
    let lines = vec![line(0, &[("a", 1.0, 1.2), ("b", 1.0, 1.3), ("c", 1.5, 1.6)])];
    let s = schedule_lines(&lines, &ScheduleOpts::default()).unwrap();
    let r = &s[0].highlight_timeline;
    assert_eq!(r[0].time, 1.0);
    assert!(approx(r[1].time, 1.04));
    assert_eq!(r[2].time, 1.5);
    assert!(r.windows(2).all(|p| p[0].time < p[1].time));
}

#[test]
fn ties_at_window_end_are_unschedulable() {
    let lines = vec![line(0, &[("a", 1.0, 1.0), ("b", 1.0, 1.0)])];
    let opts = ScheduleOpts {
        lead_out: 0.0,
        ..ScheduleOpts::default()
    };
    let err = schedule_lines(&lines, &opts).unwrap_err();
    assert!(matches!(
        err,
        LyricError::UnschedulableOverlap {
            first: 0,
            second: 0,
            ..
        }
    ));
}

#[test]
fn crossfade_bounds_overlap_and_concurrency() {
    let lines = vec![
        line(0, &[("a", 0.0, 1.0)]),
        line(1, &[("b", 1.1, 2.0)]),
        line(2, &[("c", 2.1, 3.0)]),
    ];
    let opts = ScheduleOpts {
        lead_in: 0.5,
        lead_out: 0.5,
        crossfade_window: Some(0.25),
        ..ScheduleOpts::default()
    };
    let s = schedule_lines(&lines, &opts).unwrap();
    for pair in s.windows(2) {
        let overlap = pair[0].display_end - pair[1].display_start;
        assert!(overlap <= 0.25 + 1e-9, "overlap {overlap}");
        assert!(pair[0].display_start <= pair[1].display_start);
    }
    assert!(s[2].display_start >= s[0].display_end);
    assert!(s[0].display_end > s[1].display_start, "expected a crossfade");
}

#[test]
fn invalid_options_are_style_errors() {
    let lines = vec![line(0, &[("a", 0.0, 1.0)])];
    for opts in [
        ScheduleOpts {
            lead_in: -1.0,
            ..ScheduleOpts::default()
        },
        ScheduleOpts {
            reveal_epsilon: 0.0,
            ..ScheduleOpts::default()
        },
        ScheduleOpts {
            crossfade_window: Some(0.0),
            ..ScheduleOpts::default()
        },
    ] {
        assert!(matches!(
            schedule_lines(&lines, &opts),
            Err(LyricError::InvalidStyle(_))
        ));
    }
}

#[test]
fn empty_input_schedules_nothing() {
    assert!(
        schedule_lines(&[], &ScheduleOpts::default())
            .unwrap()
            .is_empty()
    );
}
