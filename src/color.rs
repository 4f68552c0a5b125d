use palette::{Hsl, IntoColor, Srgb};
use plotters::style::RGBColor;

// ---------------------------------------------------------------------------
// Monochrome fill palette
// ---------------------------------------------------------------------------

/// Lightness of the darkest fill in a generated ramp; black points and
/// edges must stay readable on every box.
const DARKEST_FILL: f32 = 0.8;

/// Generates `n` fills from white down to light gray, evenly spaced in
/// lightness.
pub fn gray_ramp(n: usize) -> Vec<RGBColor> {
    if n == 0 {
        return Vec::new();
    }
    let step = if n > 1 {
        (1.0 - DARKEST_FILL) / (n - 1) as f32
    } else {
        0.0
    };
    (0..n)
        .map(|i| {
            let hsl = Hsl::new(0.0, 0.0, 1.0 - step * i as f32);
            let rgb: Srgb = hsl.into_color();
            to_rgb(rgb.into_format())
        })
        .collect()
}

/// Parse a fill colour: a CSS name (`white`, `lightgray`) or `#rrggbb`.
pub fn parse_fill(name: &str) -> Option<RGBColor> {
    let name = name.trim();
    if name.starts_with('#') {
        return name.parse::<Srgb<u8>>().ok().map(to_rgb);
    }
    palette::named::from_str(&name.to_ascii_lowercase()).map(to_rgb)
}

/// Fills for `n` groups: the configured names, or a gray ramp when none are
/// configured. Unknown names fall back to white.
pub fn fills(names: &[String], n: usize) -> Vec<RGBColor> {
    if names.is_empty() {
        return gray_ramp(n);
    }
    (0..n)
        .map(|i| {
            names
                .get(i)
                .and_then(|name| parse_fill(name))
                .unwrap_or(RGBColor(255, 255, 255))
        })
        .collect()
}

fn to_rgb(c: Srgb<u8>) -> RGBColor {
    RGBColor(c.red, c.green, c.blue)
}
