use super::*;

fn w(text: &str, start: f64, end: f64) -> Word {
    Word::new(text, start, end)
}

fn opts(max_chars: usize, max_duration: f64) -> SegmentOpts {
    SegmentOpts {
        max_chars,
        max_duration,
        break_on: BreakPolicy::Sentence,
    }
}

#[test]
fn short_phrase_stays_on_one_line() {
    let words = vec![w("sun", 0.0, 0.3), w("rise", 0.3, 0.6), w("over", 1.0, 1.3)];
    let lines = segment_words(&words, &opts(20, 2.0)).unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].text(), "sun rise over");
    assert_eq!(lines[0].char_count(), 13);
    assert_eq!(lines[0].first_word_index, 0);
}

#[test]
fn oversized_word_forms_its_own_line() {
    let long = "a".repeat(50);
    let words = vec![w(&long, 0.0, 1.0)];
    let lines = segment_words(&words, &opts(10, 2.0)).unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].words[0].text, long);
}

#[test]
fn char_limit_counts_spaces() {
    // "ab cd" is 5 chars; "ab cd e" would be 7.
    let words = vec![w("ab", 0.0, 0.1), w("cd", 0.1, 0.2), w("e", 0.2, 0.3)];
    let lines = segment_words(&words, &opts(6, 10.0)).unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].text(), "ab cd");
    assert_eq!(lines[1].text(), "e");
    assert_eq!(lines[1].first_word_index, 2);
}

#[test]
fn char_limit_counts_unicode_scalars() {
    let words = vec![w("héé", 0.0, 0.1), w("ñ", 0.1, 0.2)];
    let lines = segment_words(&words, &opts(5, 10.0)).unwrap();
    assert_eq!(lines.len(), 1);
}

#[test]
fn duration_limit_breaks_lines() {
    let words = vec![w("a", 0.0, 0.5), w("b", 1.0, 1.5), w("c", 2.0, 2.6)];
    let lines = segment_words(&words, &opts(100, 2.0)).unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].text(), "a b");
    assert_eq!(lines[1].text(), "c");
}

#[test]
fn sentence_punctuation_closes_line() {
    let words = vec![w("hello.", 0.0, 0.2), w("world", 0.3, 0.5)];
    let lines = segment_words(&words, &opts(100, 10.0)).unwrap();
    assert_eq!(lines.len(), 2);
}

#[test]
fn trailing_quote_is_ignored_for_breaks() {
    assert!(BreakPolicy::Sentence.breaks_after("done.\""));
    assert!(BreakPolicy::Sentence.breaks_after("what?)"));
    assert!(!BreakPolicy::Sentence.breaks_after("well,"));
    assert!(BreakPolicy::Clause.breaks_after("well,"));
    assert!(!BreakPolicy::None.breaks_after("end."));
}

#[test]
fn none_policy_ignores_punctuation() {
    let words = vec![w("hello.", 0.0, 0.2), w("world", 0.3, 0.5)];
    let mut o = opts(100, 10.0);
    o.break_on = BreakPolicy::None;
    assert_eq!(segment_words(&words, &o).unwrap().len(), 1);
}

#[test]
fn invalid_limits_are_impossible() {
    let words = vec![w("a", 0.0, 0.1)];
    assert!(matches!(
        segment_words(&words, &opts(0, 1.0)),
        Err(LyricError::SegmentationImpossible(_))
    ));
    assert!(matches!(
        segment_words(&words, &opts(10, 0.0)),
        Err(LyricError::SegmentationImpossible(_))
    ));
    assert!(matches!(
        segment_words(&words, &opts(10, f64::NAN)),
        Err(LyricError::SegmentationImpossible(_))
    ));
}

#[test]
fn lines_record_their_limits() {
    let lines = segment_words(&[w("a", 0.0, 0.1)], &opts(7, 1.5)).unwrap();
    assert_eq!(lines[0].max_chars, 7);
    assert_eq!(lines[0].max_duration, 1.5);
}
