use crate::lines::segment::BreakPolicy;
use crate::style::color::Color;
use crate::style::config::{StyleConfig, TextAnchor};
use crate::timing::schedule::ScheduledLine;
use crate::transcript::word::Word;
use std::fmt;
use xxhash_rust::xxh3::Xxh3;

const XXH3_SEED: u64 = 0x8b5ad4a0c7d8e9f1;

/// 128-bit content fingerprint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    pub hi: u64,
    pub lo: u64,
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}{:016x}", self.hi, self.lo)
    }
}

pub(crate) struct StableHasher {
    inner: Xxh3,
}

impl StableHasher {
    pub(crate) fn new() -> Self {
        Self {
            inner: Xxh3::with_seed(XXH3_SEED),
        }
    }

    pub(crate) fn write_bytes(&mut self, b: &[u8]) {
        self.inner.update(b);
    }

    pub(crate) fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    pub(crate) fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    pub(crate) fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub(crate) fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub(crate) fn write_f32(&mut self, v: f32) {
        self.write_u32(v.to_bits());
    }

    pub(crate) fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    pub(crate) fn write_str(&mut self, s: &str) {
        self.write_u64(s.len() as u64);
        self.write_bytes(s.as_bytes());
    }

    pub(crate) fn write_fingerprint(&mut self, fp: Fingerprint) {
        self.write_u64(fp.hi);
        self.write_u64(fp.lo);
    }

    pub(crate) fn finish(self) -> Fingerprint {
        let v = self.inner.digest128();
        Fingerprint {
            hi: (v >> 64) as u64,
            lo: v as u64,
        }
    }
}

/// Fingerprint of a normalized word stream.
pub fn fingerprint_words(words: &[Word]) -> Fingerprint {
    let mut h = StableHasher::new();
    h.write_u8(b'w');
    h.write_u64(words.len() as u64);
    for w in words {
        write_word(&mut h, w);
    }
    h.finish()
}

/// Fingerprint of a schedule: line text, windows and reveal times.
pub fn fingerprint_lines(lines: &[ScheduledLine]) -> Fingerprint {
    let mut h = StableHasher::new();
    h.write_u8(b'l');
    h.write_u64(lines.len() as u64);
    for l in lines {
        h.write_u64(l.line.first_word_index as u64);
        h.write_u64(l.line.words.len() as u64);
        for w in &l.line.words {
            write_word(&mut h, w);
        }
        h.write_f64(l.display_start);
        h.write_f64(l.display_end);
        h.write_u64(l.highlight_timeline.len() as u64);
        for r in &l.highlight_timeline {
            h.write_u64(r.word_index as u64);
            h.write_f64(r.time);
        }
    }
    h.finish()
}

/// Fingerprint of every style option that affects pixels, plus the loaded font bytes.
pub fn fingerprint_style(style: &StyleConfig, font_bytes: Option<&[u8]>) -> Fingerprint {
    let mut h = StableHasher::new();
    h.write_u8(b's');
    match font_bytes {
        Some(bytes) => {
            h.write_u8(1);
            h.write_u64(bytes.len() as u64);
            h.write_bytes(bytes);
        }
        None => h.write_u8(0),
    }
    h.write_f32(style.font_size_px);
    write_color(&mut h, style.revealed_color);
    write_color(&mut h, style.unrevealed_color);
    write_color(&mut h, style.transitioning_color);
    write_color(&mut h, style.background_color);
    h.write_u8(match style.position {
        TextAnchor::Top => 0,
        TextAnchor::Center => 1,
        TextAnchor::Bottom => 2,
    });
    h.write_f32(style.margin_px);
    h.write_f32(style.max_text_width_px);
    h.write_f32(style.line_spacing);
    h.write_u64(style.max_chars as u64);
    h.write_f64(style.max_duration);
    h.write_u8(match style.break_on {
        BreakPolicy::Sentence => 0,
        BreakPolicy::Clause => 1,
        BreakPolicy::None => 2,
    });
    h.write_f64(style.lead_in);
    h.write_f64(style.lead_out);
    h.write_f64(style.min_gap);
    h.write_f64(style.reveal_epsilon);
    match style.crossfade_window {
        Some(w) => {
            h.write_u8(1);
            h.write_f64(w);
        }
        None => h.write_u8(0),
    }
    h.write_f64(style.transition_secs);
    h.write_f64(style.jitter_tolerance);
    h.write_u32(style.fps);
    h.write_u32(style.width);
    h.write_u32(style.height);
    h.write_bool(style.strict_bounds);
    h.finish()
}

/// Fingerprint of a tagged byte payload (background sources, files).
pub fn fingerprint_bytes(tag: &str, bytes: &[u8]) -> Fingerprint {
    let mut h = StableHasher::new();
    h.write_str(tag);
    h.write_u64(bytes.len() as u64);
    h.write_bytes(bytes);
    h.finish()
}

/// Hash identifying a job's inputs: normalized words plus style.
pub fn input_hash(words: Fingerprint, style: Fingerprint) -> Fingerprint {
    let mut h = StableHasher::new();
    h.write_u8(b'i');
    h.write_fingerprint(words);
    h.write_fingerprint(style);
    h.finish()
}

fn write_word(h: &mut StableHasher, w: &Word) {
    h.write_str(&w.text);
    h.write_f64(w.start);
    h.write_f64(w.end);
    match w.confidence {
        Some(c) => {
            h.write_u8(1);
            h.write_f64(c);
        }
        None => h.write_u8(0),
    }
}

fn write_color(h: &mut StableHasher, c: Color) {
    h.write_bytes(&c.to_array());
}

#[cfg(test)]
#[path = "../../tests/unit/cache/fingerprint.rs"]
mod tests;
