use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

use crate::models::Contour;

pub const OUTLINE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const LABEL_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

const GLYPH_WIDTH: i32 = 5;
const GLYPH_HEIGHT: i32 = 7;
const LABEL_SCALE: i32 = 2;
const ADVANCE: i32 = (GLYPH_WIDTH + 1) * LABEL_SCALE;

/// Draw the closed contour outline, two pixels thick.
pub fn draw_contour(image: &mut RgbImage, contour: &Contour, color: Rgb<u8>) {
    let n = contour.points.len();
    if n < 2 {
        return;
    }
    for i in 0..n {
        let a = contour.points[i];
        let b = contour.points[(i + 1) % n];
        for (ox, oy) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
            draw_line_segment_mut(
                image,
                (a.x as f32 + ox, a.y as f32 + oy),
                (b.x as f32 + ox, b.y as f32 + oy),
                color,
            );
        }
    }
}

/// Top-left corner for a label anchored above-left of `centroid`, kept inside the frame.
pub fn label_origin(image: &RgbImage, centroid: (i32, i32), text: &str) -> (i32, i32) {
    let (width, height) = (image.width() as i32, image.height() as i32);
    let text_width = text.chars().count() as i32 * ADVANCE;
    let text_height = GLYPH_HEIGHT * LABEL_SCALE;

    let baseline = (centroid.1 - 10).max(20);
    let x = (centroid.0 - 80).max(10);
    let x = x.min(width - text_width - 2).max(0);
    let y = (baseline - text_height).min(height - text_height - 2).max(0);
    (x, y)
}

/// Render `text` near `centroid` on a dark backing box.
pub fn draw_label(image: &mut RgbImage, centroid: (i32, i32), text: &str, color: Rgb<u8>) {
    let (x, y) = label_origin(image, centroid, text);
    let text_width = text.chars().count() as i32 * ADVANCE;
    fill_rect(
        image,
        x - 2,
        y - 2,
        x + text_width,
        y + GLYPH_HEIGHT * LABEL_SCALE + 1,
        LABEL_BACKGROUND,
    );
    draw_text(image, x, y, text, color);
}

fn fill_rect(image: &mut RgbImage, left: i32, top: i32, right: i32, bottom: i32, color: Rgb<u8>) {
    let width = image.width() as i32;
    let height = image.height() as i32;
    if width == 0 || height == 0 {
        return;
    }
    let left = left.clamp(0, width - 1);
    let right = right.clamp(0, width - 1);
    let top = top.clamp(0, height - 1);
    let bottom = bottom.clamp(0, height - 1);

    for y in top..=bottom {
        for x in left..=right {
            image.put_pixel(x as u32, y as u32, color);
        }
    }
}

fn draw_text(image: &mut RgbImage, mut x: i32, y: i32, text: &str, color: Rgb<u8>) {
    let (width, height) = (image.width() as i32, image.height() as i32);
    for ch in text.chars().flat_map(|c| c.to_uppercase()) {
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if (pattern >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                        continue;
                    }
                    for dy in 0..LABEL_SCALE {
                        for dx in 0..LABEL_SCALE {
                            let px = x + col * LABEL_SCALE + dx;
                            let py = y + row as i32 * LABEL_SCALE + dy;
                            if px >= 0 && px < width && py >= 0 && py < height {
                                image.put_pixel(px as u32, py as u32, color);
                            }
                        }
                    }
                }
            }
        }
        x += ADVANCE;
    }
}

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    match ch {
        'A' => Some([0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001]),
        'C' => Some([0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110]),
        'E' => Some([0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111]),
        'G' => Some([0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111]),
        'I' => Some([0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110]),
        'K' => Some([0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001]),
        'L' => Some([0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111]),
        'N' => Some([0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001]),
        'O' => Some([0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
        'P' => Some([0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000]),
        'Q' => Some([0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101]),
        'R' => Some([0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001]),
        'S' => Some([0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110]),
        'T' => Some([0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100]),
        'U' => Some([0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
        'W' => Some([0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010]),
        'X' => Some([0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001]),
        'Y' => Some([0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100]),
        '0' => Some([0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110]),
        '1' => Some([0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110]),
        '2' => Some([0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111]),
        '3' => Some([0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110]),
        '4' => Some([0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010]),
        '5' => Some([0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110]),
        '6' => Some([0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110]),
        '7' => Some([0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000]),
        '8' => Some([0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110]),
        '9' => Some([0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100]),
        '²' => Some([0b01100, 0b10010, 0b00100, 0b01000, 0b11110, 0, 0]),
        '|' => Some([0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100]),
        '/' => Some([0b00001, 0b00010, 0b00010, 0b00100, 0b01000, 0b01000, 0b10000]),
        ':' => Some([0, 0b01100, 0b01100, 0, 0b01100, 0b01100, 0]),
        '-' => Some([0, 0, 0, 0b11111, 0, 0, 0]),
        '.' => Some([0, 0, 0, 0, 0, 0b00110, 0b00110]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_stays_inside_frame() {
        let image = RgbImage::new(200, 100);
        let text = "Rectangle | Area: 12345 px²";
        for centroid in [(0, 0), (199, 99), (-50, 500), (100, 50)] {
            let (x, y) = label_origin(&image, centroid, text);
            assert!(x >= 0 && y >= 0, "origin {:?} for {:?}", (x, y), centroid);
            assert!(y + GLYPH_HEIGHT * LABEL_SCALE <= 100);
        }
    }

    #[test]
    fn test_draw_label_marks_pixels() {
        let mut image = RgbImage::new(400, 200);
        draw_label(&mut image, (200, 100), "SQUARE | AREA: 9", LABEL_COLOR);
        assert!(image.pixels().any(|p| *p == LABEL_COLOR));
    }

    #[test]
    fn test_every_shape_name_has_glyphs() {
        for shape in crate::models::Shape::SELECTABLE {
            for ch in shape.as_str().chars().flat_map(|c| c.to_uppercase()) {
                assert!(glyph_bits(ch).is_some(), "missing glyph for {ch:?}");
            }
        }
    }
}
