use super::*;

#[test]
fn defaults_match_reference_service() {
    let s = StyleConfig::default();
    assert_eq!((s.width, s.height, s.fps), (1280, 720, 24));
    assert_eq!(s.font_size_px, 70.0);
    assert_eq!(s.max_text_width_px, 1000.0);
    assert_eq!(s.background_color, Color::rgba(0, 255, 0, 255));
    assert_eq!(s.position, TextAnchor::Center);
    s.validate().unwrap();
}

#[test]
fn partial_json_fills_defaults() {
    let s = StyleConfig::from_json_str(r##"{"font_size_px": 48, "position": "bottom", "revealed_color": "#ff0000"}"##)
        .unwrap();
    assert_eq!(s.font_size_px, 48.0);
    assert_eq!(s.position, TextAnchor::Bottom);
    assert_eq!(s.revealed_color, Color::rgba(255, 0, 0, 255));
    assert_eq!(s.max_chars, 32);
}

#[test]
fn unknown_keys_are_rejected() {
    let err = StyleConfig::from_json_str(r#"{"font_sise_px": 48}"#).unwrap_err();
    assert!(matches!(err, LyricError::InvalidStyle(_)));
}

#[test]
fn odd_dimensions_are_rejected() {
    let s = StyleConfig {
        width: 641,
        ..StyleConfig::default()
    };
    assert!(matches!(s.validate(), Err(LyricError::InvalidStyle(_))));
}

#[test]
fn bad_timing_options_are_rejected() {
    let s = StyleConfig {
        lead_out: -0.1,
        ..StyleConfig::default()
    };
    assert!(s.validate().is_err());
    let s = StyleConfig {
        crossfade_window: Some(-1.0),
        ..StyleConfig::default()
    };
    assert!(s.validate().is_err());
}

#[test]
fn segmentation_limits_are_not_style_errors() {
    let s = StyleConfig {
        max_chars: 0,
        ..StyleConfig::default()
    };
    s.validate().unwrap();
}

#[test]
fn option_table_names_every_field() {
    let json = serde_json::to_value(StyleConfig::default()).unwrap();
    let obj = json.as_object().unwrap();
    assert_eq!(obj.len(), StyleConfig::OPTIONS.len());
    for opt in StyleConfig::OPTIONS {
        assert!(obj.contains_key(opt.name), "missing {}", opt.name);
    }
}

#[test]
fn json_round_trip_preserves_style() {
    let s = StyleConfig {
        crossfade_window: Some(0.25),
        break_on: BreakPolicy::Clause,
        ..StyleConfig::default()
    };
    let text = serde_json::to_string(&s).unwrap();
    assert_eq!(StyleConfig::from_json_str(&text).unwrap(), s);
}
