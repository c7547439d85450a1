//! Swatch colors for color facet values.
//!
//! Known color names map to a fixed palette. Anything else (merchandiser
//! names like "Sea Glass" or "Oxblood") gets a hex derived from a hash of
//! the normalized name, so the same name always renders the same swatch.

/// Named swatches, keyed by normalized color name.
const NAMED_COLORS: &[(&str, &str)] = &[
    ("black", "#000000"),
    ("white", "#FFFFFF"),
    ("off-white", "#FAF9F6"),
    ("ivory", "#FFFFF0"),
    ("cream", "#FFFDD0"),
    ("beige", "#F5F5DC"),
    ("sand", "#C2B280"),
    ("tan", "#D2B48C"),
    ("camel", "#C19A6B"),
    ("brown", "#8B4513"),
    ("chocolate", "#7B3F00"),
    ("khaki", "#C3B091"),
    ("olive", "#808000"),
    ("green", "#16A34A"),
    ("sage", "#9CAF88"),
    ("teal", "#008080"),
    ("blue", "#2563EB"),
    ("light-blue", "#ADD8E6"),
    ("navy", "#000080"),
    ("navy-blue", "#000080"),
    ("denim", "#1560BD"),
    ("purple", "#7E22CE"),
    ("lavender", "#E6E6FA"),
    ("pink", "#EC4899"),
    ("blush", "#DE5D83"),
    ("red", "#DC2626"),
    ("burgundy", "#800020"),
    ("maroon", "#800000"),
    ("orange", "#F97316"),
    ("rust", "#B7410E"),
    ("yellow", "#FACC15"),
    ("mustard", "#FFDB58"),
    ("gold", "#D4AF37"),
    ("silver", "#C0C0C0"),
    ("grey", "#808080"),
    ("gray", "#808080"),
    ("charcoal", "#36454F"),
];

/// Saturation and lightness (0..=1) for derived swatches.
const DERIVED_SATURATION: f64 = 0.55;
const DERIVED_LIGHTNESS: f64 = 0.55;

/// Resolve a swatch hex for a normalized color name.
#[must_use]
pub fn color_hex(normalized_name: &str) -> String {
    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == normalized_name)
        .map_or_else(|| derived_hex(normalized_name), |(_, hex)| (*hex).to_string())
}

/// 32-bit shift-and-subtract string hash (`h = c + (h << 5) - h`).
fn name_hash(name: &str) -> u32 {
    name.chars().fold(0_i32, |hash, c| {
        #[allow(clippy::cast_possible_wrap)] // char scalar values fit in i32
        let code = u32::from(c) as i32;
        code.wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash))
    })
    .unsigned_abs()
}

fn derived_hex(name: &str) -> String {
    #[allow(clippy::cast_precision_loss)] // hue is < 360
    let hue = (name_hash(name) % 360) as f64;
    let (r, g, b) = hsl_to_rgb(hue, DERIVED_SATURATION, DERIVED_LIGHTNESS);
    format!("#{r:02X}{g:02X}{b:02X}")
}

fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64) -> (u8, u8, u8) {
    let chroma = (1.0 - 2.0f64.mul_add(lightness, -1.0).abs()) * saturation;
    let sector = hue / 60.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector {
        s if s < 1.0 => (chroma, x, 0.0),
        s if s < 2.0 => (x, chroma, 0.0),
        s if s < 3.0 => (0.0, chroma, x),
        s if s < 4.0 => (0.0, x, chroma),
        s if s < 5.0 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = lightness - chroma / 2.0;
    (channel(r + m), channel(g + m), channel(b + m))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to 0..=255
fn channel(value: f64) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_colors_resolve_from_table() {
        assert_eq!(color_hex("black"), "#000000");
        assert_eq!(color_hex("navy-blue"), "#000080");
    }

    #[test]
    fn test_unknown_colors_are_stable() {
        let first = color_hex("sea-glass");
        let second = color_hex("sea-glass");
        assert_eq!(first, second);
        assert_eq!(first.len(), 7);
        assert!(first.starts_with('#'));
        assert!(first[1..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_unknown_colors_differ_by_name() {
        assert_ne!(color_hex("oxblood"), color_hex("sea-glass"));
    }

    #[test]
    fn test_hsl_primary_hues() {
        assert_eq!(hsl_to_rgb(0.0, 1.0, 0.5), (255, 0, 0));
        assert_eq!(hsl_to_rgb(120.0, 1.0, 0.5), (0, 255, 0));
        assert_eq!(hsl_to_rgb(240.0, 1.0, 0.5), (0, 0, 255));
    }
}
