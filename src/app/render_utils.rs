use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2};

/// |pct_input| at which the link colour saturates.
const PCT_COLOR_DOMAIN: f32 = 0.4;

const PURPLE: Color32 = Color32::from_rgb(118, 42, 131);
const NEUTRAL: Color32 = Color32::from_rgb(247, 247, 247);
const GREEN: Color32 = Color32::from_rgb(27, 120, 55);

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}

/// Purple-to-green diverging colour for a link's share of its target's input.
pub(super) fn pct_color(pct_input: f64) -> Color32 {
    let t = (pct_input as f32 / PCT_COLOR_DOMAIN).clamp(-1.0, 1.0);
    if !t.is_finite() {
        return NEUTRAL;
    }
    if t < 0.0 {
        blend_color(NEUTRAL, PURPLE, -t)
    } else {
        blend_color(NEUTRAL, GREEN, t)
    }
}

/// Black on light fills, white on dark ones.
pub(super) fn text_color_for(fill: Color32) -> Color32 {
    let luminance = 0.299 * fill.r() as f32 + 0.587 * fill.g() as f32 + 0.114 * fill.b() as f32;
    if luminance > 160.0 {
        Color32::BLACK
    } else {
        Color32::WHITE
    }
}

pub(super) fn link_width(weight: f64) -> f32 {
    (weight.abs() as f32 * 15.0).clamp(1.0, 12.0)
}

pub(super) fn draw_background(painter: &Painter, rect: Rect) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(19, 23, 29));

    let step = 40.0;
    let grid = Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70));

    let mut x = rect.left();
    while x < rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], grid);
        x += step;
    }

    let mut y = rect.top();
    while y < rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], grid);
        y += step;
    }
}

pub(super) fn canvas_to_screen(rect: Rect, canvas: Vec2) -> Pos2 {
    rect.min + canvas
}

pub(super) fn screen_to_canvas(rect: Rect, screen: Pos2) -> Vec2 {
    screen - rect.min
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pct_color_diverges_around_neutral() {
        assert_eq!(pct_color(0.0), NEUTRAL);
        assert_eq!(pct_color(0.4), GREEN);
        assert_eq!(pct_color(-1.0), PURPLE);
        assert_eq!(pct_color(f64::NAN), NEUTRAL);
    }

    #[test]
    fn text_contrast_follows_luminance() {
        assert_eq!(text_color_for(NEUTRAL), Color32::BLACK);
        assert_eq!(text_color_for(PURPLE), Color32::WHITE);
    }
}
