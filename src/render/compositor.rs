use crate::cache::fingerprint::{Fingerprint, fingerprint_style};
use crate::foundation::core::Canvas;
use crate::foundation::error::{LyricError, LyricResult};
use crate::lines::segment::Line;
use crate::render::composite::premul_over_in_place;
use crate::render::frame::{FrameRGBA, premultiply_rgba8_in_place};
use crate::render::text::{BlockRasterizer, FontRasterizer, TextRasterizer};
use crate::style::color::Color;
use crate::style::config::{StyleConfig, TextAnchor};
use crate::timing::schedule::ScheduledLine;
use crate::timing::timeline::{WordState, active_lines, word_state};
use std::collections::HashMap;
use std::sync::Arc;

/// Shared, immutable text-overlay renderer for one style.
///
/// Holds the validated style and loaded font. Each render thread obtains its own
/// [`CompositorWorker`] with [`FrameCompositor::worker`].
#[derive(Debug)]
pub struct FrameCompositor {
    style: Arc<StyleConfig>,
    font: Option<Arc<Vec<u8>>>,
    fingerprint: Fingerprint,
}

impl FrameCompositor {
    /// Validate `style` and load its font, if any.
    pub fn new(style: &StyleConfig) -> LyricResult<Self> {
        style.validate()?;
        let font = match &style.font {
            Some(path) => {
                let bytes = std::fs::read(path).map_err(|e| {
                    LyricError::invalid_style(format!(
                        "failed to read font '{}': {e}",
                        path.display()
                    ))
                })?;
                // Fail early on unusable font data rather than inside a render worker.
                FontRasterizer::new(&bytes, style.font_size_px)?;
                Some(Arc::new(bytes))
            }
            None => None,
        };
        let fingerprint = fingerprint_style(style, font.as_ref().map(|b| b.as_slice()));
        tracing::debug!(%fingerprint, font = font.is_some(), "compositor ready");
        Ok(Self {
            style: Arc::new(style.clone()),
            font,
            fingerprint,
        })
    }

    pub fn style(&self) -> &StyleConfig {
        &self.style
    }

    pub fn canvas(&self) -> Canvas {
        self.style.canvas()
    }

    /// Fingerprint of the style and font bytes.
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Per-thread rendering state.
    pub fn worker(&self) -> LyricResult<CompositorWorker> {
        let text: Box<dyn TextRasterizer> = match &self.font {
            Some(bytes) => Box::new(FontRasterizer::new(bytes, self.style.font_size_px)?),
            None => Box::new(BlockRasterizer::new(self.style.font_size_px)),
        };
        Ok(CompositorWorker {
            style: self.style.clone(),
            text,
            ctx: None,
            pixmap: None,
            layouts: HashMap::new(),
        })
    }

    /// Render one frame with a throwaway worker.
    pub fn compose(
        &self,
        t: f64,
        lines: &[ScheduledLine],
        background: &FrameRGBA,
    ) -> LyricResult<FrameRGBA> {
        self.worker()?.compose(t, lines, background)
    }
}

#[derive(Debug)]
struct WordPlacement {
    word: usize,
    x: f32,
}

#[derive(Debug)]
struct RowLayout {
    top: f32,
    words: Vec<WordPlacement>,
}

#[derive(Debug)]
struct LineLayout {
    rows: Vec<RowLayout>,
}

/// Render context, rasterizer and layout cache owned by one thread.
pub struct CompositorWorker {
    style: Arc<StyleConfig>,
    text: Box<dyn TextRasterizer>,
    ctx: Option<vello_cpu::RenderContext>,
    pixmap: Option<vello_cpu::Pixmap>,
    layouts: HashMap<String, Arc<LineLayout>>,
}

impl CompositorWorker {
    /// Render the text overlay for `t` over `background`.
    ///
    /// Output depends only on `(t, lines, background, style)`.
    pub fn compose(
        &mut self,
        t: f64,
        lines: &[ScheduledLine],
        background: &FrameRGBA,
    ) -> LyricResult<FrameRGBA> {
        let canvas = self.style.canvas();
        if background.width != canvas.width || background.height != canvas.height {
            return Err(LyricError::render(format!(
                "background size mismatch: got {}x{}, expected {}x{}",
                background.width, background.height, canvas.width, canvas.height
            )));
        }
        if background.data.len() != canvas.rgba_len() {
            return Err(LyricError::render(
                "background data size mismatch with width*height*4",
            ));
        }

        let mut out = background.clone();
        if !out.premultiplied {
            premultiply_rgba8_in_place(&mut out.data);
            out.premultiplied = true;
        }

        let active = active_lines(lines, t);
        if active.is_empty() {
            return Ok(out);
        }

        let width: u16 = canvas
            .width
            .try_into()
            .map_err(|_| LyricError::render("canvas width exceeds u16"))?;
        let height: u16 = canvas
            .height
            .try_into()
            .map_err(|_| LyricError::render("canvas height exceeds u16"))?;

        let mut ctx = match self.ctx.take() {
            Some(ctx) if ctx.width() == width && ctx.height() == height => ctx,
            _ => vello_cpu::RenderContext::new(width, height),
        };
        ctx.reset();

        for a in &active {
            if a.opacity <= 0.0 {
                continue;
            }
            let layout = self.layout_for(&a.line.line)?;
            let layered = a.opacity < 1.0;
            if layered {
                ctx.push_opacity_layer(a.opacity as f32);
            }
            for row in &layout.rows {
                for p in &row.words {
                    let color = word_color(&self.style, a.line, p.word, t);
                    let text = &a.line.line.words[p.word].text;
                    self.text.draw(&mut ctx, text, p.x, row.top, color)?;
                }
            }
            if layered {
                ctx.pop_layer();
            }
        }

        ctx.flush();
        let mut pixmap = match self.pixmap.take() {
            Some(p) if p.width() == width && p.height() == height => p,
            _ => vello_cpu::Pixmap::new(width, height),
        };
        pixmap.data_as_u8_slice_mut().fill(0);
        ctx.render_to_pixmap(&mut pixmap);
        premul_over_in_place(&mut out.data, pixmap.data_as_u8_slice())?;

        self.ctx = Some(ctx);
        self.pixmap = Some(pixmap);
        Ok(out)
    }

    fn layout_for(&mut self, line: &Line) -> LyricResult<Arc<LineLayout>> {
        let key = layout_key(line);
        if let Some(layout) = self.layouts.get(&key) {
            return Ok(layout.clone());
        }

        let canvas = self.style.canvas();
        let canvas_w = canvas.width as f32;
        let canvas_h = canvas.height as f32;
        let max_w = self.style.max_text_width_px.min(canvas_w);
        let space = self.text.space_width();

        // Greedy wrap into rows of (word index, width).
        let mut rows = Vec::<(Vec<(usize, f32)>, f32)>::new();
        for (i, w) in line.words.iter().enumerate() {
            let width = self.text.measure(&w.text)?;
            match rows.last_mut() {
                Some((row, row_w)) if *row_w + space + width <= max_w => {
                    *row_w += space + width;
                    row.push((i, width));
                }
                _ => rows.push((vec![(i, width)], width)),
            }
        }

        let row_h = self.style.font_size_px * self.style.line_spacing;
        let block_h = row_h * rows.len() as f32;
        let top = match self.style.position {
            TextAnchor::Top => self.style.margin_px,
            TextAnchor::Center => (canvas_h - block_h) / 2.0,
            TextAnchor::Bottom => canvas_h - self.style.margin_px - block_h,
        };

        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(r, (words, row_w))| {
                let mut x = ((canvas_w - row_w) / 2.0).round();
                let placed = words
                    .into_iter()
                    .map(|(word, width)| {
                        let p = WordPlacement { word, x };
                        x += width + space;
                        p
                    })
                    .collect();
                RowLayout {
                    top: (top + row_h * r as f32).round(),
                    words: placed,
                }
            })
            .collect();

        let layout = Arc::new(LineLayout { rows });
        self.layouts.insert(key, layout.clone());
        Ok(layout)
    }
}

fn layout_key(line: &Line) -> String {
    let mut key = String::new();
    for w in &line.words {
        key.push_str(&w.text);
        key.push('\u{1f}');
    }
    key
}

fn word_color(style: &StyleConfig, line: &ScheduledLine, word: usize, t: f64) -> Color {
    let Some(reveal) = line.reveal_time(word) else {
        return style.unrevealed_color;
    };
    match word_state(reveal, t, style.transition_secs) {
        WordState::Unrevealed => style.unrevealed_color,
        WordState::Transitioning(p) => style.transitioning_color.lerp(style.revealed_color, p),
        WordState::Revealed => style.revealed_color,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
