use super::*;

#[test]
fn block_measure_counts_chars() {
    let mut r = BlockRasterizer::new(10.0);
    assert_eq!(r.measure("abc").unwrap(), 18.0);
    assert_eq!(r.measure("héllo").unwrap(), 30.0);
    assert_eq!(r.space_width(), 6.0);
}

#[test]
fn block_draw_fills_inside_the_box_only() {
    let mut r = BlockRasterizer::new(20.0);
    let mut ctx = vello_cpu::RenderContext::new(64, 32);
    r.draw(&mut ctx, "a", 0.0, 0.0, Color::WHITE).unwrap();
    ctx.flush();
    let mut pixmap = vello_cpu::Pixmap::new(64, 32);
    ctx.render_to_pixmap(&mut pixmap);
    let data = pixmap.data_as_u8_slice();

    let px = |x: usize, y: usize| data[(y * 64 + x) * 4 + 3];
    assert_eq!(px(6, 10), 255, "glyph interior should be filled");
    assert_eq!(px(30, 10), 0, "past the advance should be empty");
    assert_eq!(px(6, 1), 0, "above the glyph should be empty");
}

#[test]
fn invalid_font_bytes_are_a_style_error() {
    let err = FontRasterizer::new(b"not a font", 20.0).err().unwrap();
    assert!(matches!(err, LyricError::InvalidStyle(_)));
}
