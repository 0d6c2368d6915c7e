use crate::foundation::error::{LyricError, LyricResult};
use crate::style::color::Color;
use std::collections::HashMap;
use std::sync::Arc;

/// Measures and draws single words onto a `vello_cpu` context.
pub(crate) trait TextRasterizer {
    /// Advance width of `text` in pixels.
    fn measure(&mut self, text: &str) -> LyricResult<f32>;

    /// Advance of the gap between two words.
    fn space_width(&self) -> f32;

    /// Draw `text` with the top-left of its line box at `(x, y)`.
    fn draw(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        text: &str,
        x: f32,
        y: f32,
        color: Color,
    ) -> LyricResult<()>;
}

/// Shapes text with Parley and fills glyph runs with `vello_cpu`.
pub(crate) struct FontRasterizer {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<()>,
    family_name: String,
    font: vello_cpu::peniko::FontData,
    size_px: f32,
    layouts: HashMap<String, Arc<parley::Layout<()>>>,
}

impl FontRasterizer {
    /// Register `font_bytes` and prepare a rasterizer at `size_px`.
    pub(crate) fn new(font_bytes: &[u8], size_px: f32) -> LyricResult<Self> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(LyricError::invalid_style(
                "text size_px must be finite and > 0",
            ));
        }

        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.to_vec()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            LyricError::invalid_style("no font families registered from font bytes")
        })?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| LyricError::invalid_style("registered font family has no name"))?
            .to_string();

        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(font_bytes.to_vec()),
            0,
        );

        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
            font,
            size_px,
            layouts: HashMap::new(),
        })
    }

    fn layout(&mut self, text: &str) -> Arc<parley::Layout<()>> {
        if let Some(layout) = self.layouts.get(text) {
            return layout.clone();
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(self.family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(self.size_px));

        let mut layout: parley::Layout<()> = builder.build(text);
        layout.break_all_lines(None);

        let layout = Arc::new(layout);
        self.layouts.insert(text.to_owned(), layout.clone());
        layout
    }
}

impl TextRasterizer for FontRasterizer {
    fn measure(&mut self, text: &str) -> LyricResult<f32> {
        Ok(self.layout(text).width())
    }

    fn space_width(&self) -> f32 {
        self.size_px * 0.28
    }

    fn draw(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        text: &str,
        x: f32,
        y: f32,
        color: Color,
    ) -> LyricResult<()> {
        let layout = self.layout(text);
        ctx.set_transform(vello_cpu::kurbo::Affine::translate((
            f64::from(x),
            f64::from(y),
        )));
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
            color.r, color.g, color.b, color.a,
        ));
        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(&self.font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
        Ok(())
    }
}

/// Font-free draft face: every visible character is a filled box.
///
/// Needs no font data and renders identically on every machine.
pub(crate) struct BlockRasterizer {
    size_px: f32,
}

impl BlockRasterizer {
    pub(crate) fn new(size_px: f32) -> Self {
        Self { size_px }
    }

    fn advance(&self) -> f32 {
        (self.size_px * 0.6).round().max(1.0)
    }
}

impl TextRasterizer for BlockRasterizer {
    fn measure(&mut self, text: &str) -> LyricResult<f32> {
        Ok(text.chars().count() as f32 * self.advance())
    }

    fn space_width(&self) -> f32 {
        self.advance()
    }

    fn draw(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        text: &str,
        x: f32,
        y: f32,
        color: Color,
    ) -> LyricResult<()> {
        let adv = f64::from(self.advance());
        let size = f64::from(self.size_px);
        let top = f64::from(y) + (size * 0.15).round();
        let bottom = f64::from(y) + (size * 0.85).round();
        let inset = (adv * 0.1).round();

        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
            color.r, color.g, color.b, color.a,
        ));
        for (i, c) in text.chars().enumerate() {
            if c.is_whitespace() {
                continue;
            }
            let x0 = f64::from(x) + (i as f64) * adv + inset;
            let x1 = x0 + adv - 2.0 * inset;
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(x0, top, x1.max(x0 + 1.0), bottom));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/text.rs"]
mod tests;
