use super::*;
use crate::foundation::core::Rgba8Premul;
use crate::timing::schedule::Reveal;
use crate::transcript::word::Word;

const RED: Color = Color::rgba(255, 0, 0, 255);
const BLUE: Color = Color::rgba(0, 0, 255, 255);
const GOLD: Color = Color::rgba(255, 200, 0, 255);

fn style() -> StyleConfig {
    StyleConfig {
        width: 200,
        height: 60,
        font_size_px: 20.0,
        unrevealed_color: RED,
        revealed_color: BLUE,
        transitioning_color: GOLD,
        ..StyleConfig::default()
    }
}

fn one_word_line(text: &str, display_start: f64, reveal: f64, display_end: f64) -> ScheduledLine {
    ScheduledLine {
        line: Line {
            words: vec![Word::new(text, reveal, reveal + 0.2)],
            first_word_index: 0,
            max_chars: 32,
            max_duration: 4.0,
        },
        display_start,
        display_end,
        highlight_timeline: vec![Reveal {
            word_index: 0,
            time: reveal,
        }],
    }
}

fn black(style: &StyleConfig) -> FrameRGBA {
    FrameRGBA::solid(style.canvas(), Rgba8Premul::from_straight_rgba(0, 0, 0, 255))
}

// Block glyph for "a" at 20px on a 200x60 canvas covers x 95..105, y 21..35.
const GLYPH_PX: (u32, u32) = (100, 28);

#[test]
fn word_colors_follow_reveal_state() {
    let style = style();
    let comp = FrameCompositor::new(&style).unwrap();
    let lines = vec![one_word_line("a", 0.5, 1.0, 3.0)];
    let bg = black(&style);
    let mut worker = comp.worker().unwrap();

    let before = worker.compose(0.6, &lines, &bg).unwrap();
    assert_eq!(before.pixel(GLYPH_PX.0, GLYPH_PX.1), Some([255, 0, 0, 255]));

    let after = worker.compose(2.0, &lines, &bg).unwrap();
    assert_eq!(after.pixel(GLYPH_PX.0, GLYPH_PX.1), Some([0, 0, 255, 255]));

    let mid = worker.compose(1.075, &lines, &bg).unwrap();
    let px = mid.pixel(GLYPH_PX.0, GLYPH_PX.1).unwrap();
    assert!(px[0] > 0 && px[0] < 255, "transitioning red channel {px:?}");
    assert!(px[2] > 0 && px[2] < 255, "transitioning blue channel {px:?}");

    assert_eq!(after.pixel(5, 5), Some([0, 0, 0, 255]));
}

#[test]
fn no_active_line_returns_background() {
    let style = style();
    let comp = FrameCompositor::new(&style).unwrap();
    let lines = vec![one_word_line("a", 0.5, 1.0, 3.0)];
    let bg = black(&style);
    assert_eq!(comp.compose(0.1, &lines, &bg).unwrap(), bg);
    assert_eq!(comp.compose(3.0, &lines, &bg).unwrap(), bg);
}

#[test]
fn output_is_deterministic_across_workers() {
    let style = style();
    let comp = FrameCompositor::new(&style).unwrap();
    let lines = vec![one_word_line("hello", 0.0, 0.5, 2.0)];
    let bg = black(&style);
    let a = comp.worker().unwrap().compose(0.55, &lines, &bg).unwrap();
    let mut w = comp.worker().unwrap();
    w.compose(1.5, &lines, &bg).unwrap();
    let b = w.compose(0.55, &lines, &bg).unwrap();
    assert_eq!(a, b);
}

#[test]
fn crossfading_line_is_partially_transparent() {
    let style = style();
    let comp = FrameCompositor::new(&style).unwrap();
    let lines = vec![
        one_word_line("a", 0.0, 0.1, 2.0),
        one_word_line("b", 1.0, 1.0, 4.0),
    ];
    let bg = black(&style);
    let frame = comp.compose(1.5, &lines, &bg).unwrap();
    let px = frame.pixel(GLYPH_PX.0, GLYPH_PX.1).unwrap();
    // Both lines are drawn at half opacity in the same spot.
    assert!(px[2] > 0 && px[2] < 255, "blended pixel {px:?}");
    assert_eq!(px[3], 255);
}

#[test]
fn wrong_background_size_is_a_render_error() {
    let style = style();
    let comp = FrameCompositor::new(&style).unwrap();
    let small = FrameRGBA::transparent(Canvas {
        width: 10,
        height: 10,
    });
    let err = comp.compose(0.0, &[], &small).unwrap_err();
    assert!(matches!(err, LyricError::Render(_)));
}

#[test]
fn long_lines_wrap_into_rows() {
    let style = StyleConfig {
        max_text_width_px: 60.0,
        ..style()
    };
    let comp = FrameCompositor::new(&style).unwrap();
    let mut worker = comp.worker().unwrap();
    let line = Line {
        words: vec![Word::new("abc", 0.0, 0.1), Word::new("def", 0.1, 0.2)],
        first_word_index: 0,
        max_chars: 32,
        max_duration: 4.0,
    };
    let layout = worker.layout_for(&line).unwrap();
    assert_eq!(layout.rows.len(), 2);
    assert!(layout.rows[1].top > layout.rows[0].top);
}

#[test]
fn missing_font_file_is_a_style_error() {
    let style = StyleConfig {
        font: Some("/definitely/not/here.ttf".into()),
        ..StyleConfig::default()
    };
    assert!(matches!(
        FrameCompositor::new(&style),
        Err(LyricError::InvalidStyle(_))
    ));
}

#[test]
fn fingerprint_changes_with_style() {
    let a = FrameCompositor::new(&style()).unwrap();
    let b = FrameCompositor::new(&StyleConfig {
        revealed_color: GOLD,
        ..style()
    })
    .unwrap();
    assert_ne!(a.fingerprint(), b.fingerprint());
}
