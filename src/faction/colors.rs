//! Faction color palette
//!
//! Colors are opaque to the simulation; they are assigned here so that the
//! same seed always paints the same factions the same way.

use rand::seq::SliceRandom;
use rand::Rng;

/// RGBA color type
pub type FactionColor = [f32; 4];

/// Saturation range of generated colors
const SATURATION: (f32, f32) = (0.45, 0.75);

/// Lightness range of generated colors (pale, so borders stay readable)
const LIGHTNESS: (f32, f32) = (0.65, 0.82);

/// Generate `count` visually distinct colors
///
/// Hues are spaced evenly around the circle with a random global rotation;
/// saturation and lightness are jittered per color. The list is shuffled so
/// hue order does not follow the order factions are created in.
pub fn distinct_palette<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<FactionColor> {
    if count == 0 {
        return Vec::new();
    }
    let rotation: f32 = rng.gen_range(0.0..360.0);
    let step = 360.0 / count as f32;

    let mut palette: Vec<FactionColor> = (0..count)
        .map(|i| {
            let hue = (rotation + step * i as f32) % 360.0;
            let saturation = rng.gen_range(SATURATION.0..=SATURATION.1);
            let lightness = rng.gen_range(LIGHTNESS.0..=LIGHTNESS.1);
            hsl_to_rgba(hue, saturation, lightness)
        })
        .collect();

    palette.shuffle(rng);
    palette
}

/// A single random pale color, for factions founded after formation
pub fn random_color<R: Rng + ?Sized>(rng: &mut R) -> FactionColor {
    let hue = rng.gen_range(0.0..360.0);
    let saturation = rng.gen_range(SATURATION.0..=SATURATION.1);
    let lightness = rng.gen_range(LIGHTNESS.0..=LIGHTNESS.1);
    hsl_to_rgba(hue, saturation, lightness)
}

/// Convert HSL (hue in degrees, saturation/lightness in `[0, 1]`) to opaque RGBA
pub fn hsl_to_rgba(hue: f32, saturation: f32, lightness: f32) -> FactionColor {
    let hue = hue.rem_euclid(360.0);
    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let sector = hue / 60.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = lightness - chroma / 2.0;
    [r + m, g + m, b + m, 1.0]
}

/// Hue in degrees of an RGBA color (0 for grays)
pub fn hue_of(color: &FactionColor) -> f32 {
    let [r, g, b, _] = *color;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    if delta <= f32::EPSILON {
        return 0.0;
    }
    let hue = if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    hue.rem_euclid(360.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_hsl_primaries() {
        let red = hsl_to_rgba(0.0, 1.0, 0.5);
        assert!((red[0] - 1.0).abs() < 1e-6 && red[1].abs() < 1e-6 && red[2].abs() < 1e-6);

        let green = hsl_to_rgba(120.0, 1.0, 0.5);
        assert!((green[1] - 1.0).abs() < 1e-6);

        let gray = hsl_to_rgba(200.0, 0.0, 0.5);
        assert!((gray[0] - 0.5).abs() < 1e-6 && (gray[2] - 0.5).abs() < 1e-6);
        assert_eq!(gray[3], 1.0);
    }

    #[test]
    fn test_palette_hues_evenly_spaced() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let palette = distinct_palette(8, &mut rng);
        assert_eq!(palette.len(), 8);

        let mut hues: Vec<f32> = palette.iter().map(hue_of).collect();
        hues.sort_by(|a, b| a.partial_cmp(b).unwrap());
        for pair in hues.windows(2) {
            assert!((pair[1] - pair[0] - 45.0).abs() < 0.5, "hues {:?}", hues);
        }
    }

    #[test]
    fn test_palette_components_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        for color in distinct_palette(25, &mut rng) {
            assert!(color.iter().all(|c| (0.0..=1.0).contains(c)));
            assert_eq!(color[3], 1.0);
        }
    }

    #[test]
    fn test_palette_deterministic() {
        let a = distinct_palette(5, &mut ChaCha8Rng::seed_from_u64(8));
        let b = distinct_palette(5, &mut ChaCha8Rng::seed_from_u64(8));
        assert_eq!(a, b);
        assert!(distinct_palette(0, &mut ChaCha8Rng::seed_from_u64(8)).is_empty());
    }
}
