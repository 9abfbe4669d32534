//! Frame annotation primitives.
//!
//! Box, line, fill, alpha blend, filled circle, and a small 5x7 bitmap
//! font for labels and the timestamp stamp. Everything draws directly into
//! a `Frame`; coordinates outside the frame are clipped, never panic.

use crate::frame::Frame;

pub type Color = [u8; 3];

pub const GREEN: Color = [0, 255, 0];
pub const RED: Color = [255, 0, 0];
pub const YELLOW: Color = [255, 255, 0];
pub const ORANGE: Color = [255, 165, 0];
pub const WHITE: Color = [255, 255, 255];

/// Rectangle outline with the given stroke thickness.
pub fn draw_rect(frame: &mut Frame, x1: u32, y1: u32, x2: u32, y2: u32, color: Color, thick: u32) {
    for t in 0..thick {
        let (ix1, iy1) = (x1.saturating_add(t), y1.saturating_add(t));
        let (ix2, iy2) = (x2.saturating_sub(t), y2.saturating_sub(t));
        if ix1 >= ix2 || iy1 >= iy2 {
            break;
        }
        for x in ix1..=ix2 {
            frame.set_pixel(x, iy1, color);
            frame.set_pixel(x, iy2, color);
        }
        for y in iy1..=iy2 {
            frame.set_pixel(ix1, y, color);
            frame.set_pixel(ix2, y, color);
        }
    }
}

pub fn fill_rect(frame: &mut Frame, x1: u32, y1: u32, x2: u32, y2: u32, color: Color) {
    let x2 = x2.min(frame.width());
    let y2 = y2.min(frame.height());
    for y in y1..y2 {
        for x in x1..x2 {
            frame.set_pixel(x, y, color);
        }
    }
}

/// Blend `color` over the region with the given opacity (0.0..=1.0).
pub fn blend_rect(frame: &mut Frame, x1: u32, y1: u32, x2: u32, y2: u32, color: Color, alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    let x2 = x2.min(frame.width());
    let y2 = y2.min(frame.height());
    for y in y1..y2 {
        for x in x1..x2 {
            let base = frame.pixel(x, y);
            let mut out = [0u8; 3];
            for c in 0..3 {
                out[c] = (base[c] as f32 * (1.0 - alpha) + color[c] as f32 * alpha) as u8;
            }
            frame.set_pixel(x, y, out);
        }
    }
}

/// Vertical line of the given stroke width.
pub fn draw_vline(frame: &mut Frame, x: u32, color: Color, thick: u32) {
    for dx in 0..thick {
        let col = x.saturating_add(dx);
        for y in 0..frame.height() {
            frame.set_pixel(col, y, color);
        }
    }
}

pub fn fill_circle(frame: &mut Frame, cx: i32, cy: i32, radius: i32, color: Color) {
    let r2 = radius * radius;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let (x, y) = (cx + dx, cy + dy);
            if x >= 0 && y >= 0 {
                frame.set_pixel(x as u32, y as u32, color);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// 5x7 bitmap font
// ----------------------------------------------------------------------------

// Column-major glyphs, bit 0 is the top row. Classic 5x7 dot-matrix shapes.
const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;

fn glyph(ch: char) -> [u8; 5] {
    match ch.to_ascii_uppercase() {
        '0' => [0x3E, 0x51, 0x49, 0x45, 0x3E],
        '1' => [0x00, 0x42, 0x7F, 0x40, 0x00],
        '2' => [0x42, 0x61, 0x51, 0x49, 0x46],
        '3' => [0x21, 0x41, 0x45, 0x4B, 0x31],
        '4' => [0x18, 0x14, 0x12, 0x7F, 0x10],
        '5' => [0x27, 0x45, 0x45, 0x45, 0x39],
        '6' => [0x3C, 0x4A, 0x49, 0x49, 0x30],
        '7' => [0x01, 0x71, 0x09, 0x05, 0x03],
        '8' => [0x36, 0x49, 0x49, 0x49, 0x36],
        '9' => [0x06, 0x49, 0x49, 0x29, 0x1E],
        'A' => [0x7E, 0x11, 0x11, 0x11, 0x7E],
        'B' => [0x7F, 0x49, 0x49, 0x49, 0x36],
        'C' => [0x3E, 0x41, 0x41, 0x41, 0x22],
        'D' => [0x7F, 0x41, 0x41, 0x22, 0x1C],
        'E' => [0x7F, 0x49, 0x49, 0x49, 0x41],
        'F' => [0x7F, 0x09, 0x09, 0x09, 0x01],
        'G' => [0x3E, 0x41, 0x49, 0x49, 0x7A],
        'H' => [0x7F, 0x08, 0x08, 0x08, 0x7F],
        'I' => [0x00, 0x41, 0x7F, 0x41, 0x00],
        'J' => [0x20, 0x40, 0x41, 0x3F, 0x01],
        'K' => [0x7F, 0x08, 0x14, 0x22, 0x41],
        'L' => [0x7F, 0x40, 0x40, 0x40, 0x40],
        'M' => [0x7F, 0x02, 0x0C, 0x02, 0x7F],
        'N' => [0x7F, 0x04, 0x08, 0x10, 0x7F],
        'O' => [0x3E, 0x41, 0x41, 0x41, 0x3E],
        'P' => [0x7F, 0x09, 0x09, 0x09, 0x06],
        'Q' => [0x3E, 0x41, 0x51, 0x21, 0x5E],
        'R' => [0x7F, 0x09, 0x19, 0x29, 0x46],
        'S' => [0x46, 0x49, 0x49, 0x49, 0x31],
        'T' => [0x01, 0x01, 0x7F, 0x01, 0x01],
        'U' => [0x3F, 0x40, 0x40, 0x40, 0x3F],
        'V' => [0x1F, 0x20, 0x40, 0x20, 0x1F],
        'W' => [0x3F, 0x40, 0x38, 0x40, 0x3F],
        'X' => [0x63, 0x14, 0x08, 0x14, 0x63],
        'Y' => [0x07, 0x08, 0x70, 0x08, 0x07],
        'Z' => [0x61, 0x51, 0x49, 0x45, 0x43],
        ':' => [0x00, 0x36, 0x36, 0x00, 0x00],
        ',' => [0x00, 0x50, 0x30, 0x00, 0x00],
        '.' => [0x00, 0x60, 0x60, 0x00, 0x00],
        '-' => [0x08, 0x08, 0x08, 0x08, 0x08],
        '/' => [0x20, 0x10, 0x08, 0x04, 0x02],
        _ => [0x00; 5],
    }
}

/// Stamp text at (x, y) (top-left corner). Non-ASCII and unsupported
/// characters render as blanks; text running off the frame edge is clipped.
pub fn draw_text(frame: &mut Frame, x: u32, y: u32, text: &str, color: Color, scale: u32) {
    let scale = scale.max(1);
    let mut pen_x = x;
    for ch in text.chars() {
        let columns = glyph(ch);
        for (cx, column) in columns.iter().enumerate() {
            for cy in 0..GLYPH_H {
                if (*column >> cy) & 1 == 0 {
                    continue;
                }
                for sx in 0..scale {
                    for sy in 0..scale {
                        frame.set_pixel(
                            pen_x + cx as u32 * scale + sx,
                            y + cy * scale + sy,
                            color,
                        );
                    }
                }
            }
        }
        pen_x += (GLYPH_W + 1) * scale;
    }
}

/// Pixel width of a rendered string at the given scale.
pub fn text_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * (GLYPH_W + 1) * scale.max(1)
}
