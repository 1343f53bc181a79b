//! CIE XYZ, CIE-LAB and the CIEDE2000 color difference
//!
//! Conversion chain: sRGB -> linear RGB -> XYZ (D65) -> LAB. The ΔE2000
//! formula follows Sharma, Wu and Dalal, "The CIEDE2000 Color-Difference
//! Formula: Implementation Notes, Supplementary Test Data, and Mathematical
//! Observations" (2005).

use super::linear_rgb::LinearRgb;
use super::srgb::Srgb;

/// D65 reference white, Y normalized to 1.0.
const D65_WHITE: (f64, f64, f64) = (0.95047, 1.0, 1.08883);

/// 25^7, used by the chroma compensation terms.
const POW25_7: f64 = 6_103_515_625.0;

/// A color in CIE 1931 XYZ space (D65, Y in 0.0..=1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Xyz {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<LinearRgb> for Xyz {
    fn from(c: LinearRgb) -> Self {
        Self {
            x: 0.412_456_4 * c.r + 0.357_576_1 * c.g + 0.180_437_5 * c.b,
            y: 0.212_672_9 * c.r + 0.715_152_2 * c.g + 0.072_175_0 * c.b,
            z: 0.019_333_9 * c.r + 0.119_192_0 * c.g + 0.950_304_1 * c.b,
        }
    }
}

/// A color in CIE-LAB space relative to D65.
///
/// - `l`: lightness, 0.0 (black) to 100.0 (white)
/// - `a`: green-red axis
/// - `b`: blue-yellow axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lab {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

impl Lab {
    #[inline]
    pub fn new(l: f64, a: f64, b: f64) -> Self {
        Self { l, a, b }
    }

    /// CIEDE2000 difference between two LAB colors (kL = kC = kH = 1).
    ///
    /// Symmetric, zero for identical inputs, typically in 0.0..=100.0.
    pub fn delta_e2000(self, other: Lab) -> f64 {
        let c1 = self.a.hypot(self.b);
        let c2 = other.a.hypot(other.b);
        let c_bar7 = ((c1 + c2) / 2.0).powi(7);
        let g = 0.5 * (1.0 - (c_bar7 / (c_bar7 + POW25_7)).sqrt());

        let a1p = (1.0 + g) * self.a;
        let a2p = (1.0 + g) * other.a;
        let c1p = a1p.hypot(self.b);
        let c2p = a2p.hypot(other.b);
        let h1p = hue_degrees(self.b, a1p);
        let h2p = hue_degrees(other.b, a2p);

        let dl = other.l - self.l;
        let dc = c2p - c1p;

        let chroma_product = c1p * c2p;
        let dh = if chroma_product == 0.0 {
            0.0
        } else {
            let diff = h2p - h1p;
            if diff.abs() <= 180.0 {
                diff
            } else if diff > 180.0 {
                diff - 360.0
            } else {
                diff + 360.0
            }
        };
        let d_big_h = 2.0 * chroma_product.sqrt() * (dh / 2.0).to_radians().sin();

        let l_bar = (self.l + other.l) / 2.0;
        let c_bar_p = (c1p + c2p) / 2.0;
        let h_bar = if chroma_product == 0.0 {
            h1p + h2p
        } else if (h1p - h2p).abs() <= 180.0 {
            (h1p + h2p) / 2.0
        } else if h1p + h2p < 360.0 {
            (h1p + h2p + 360.0) / 2.0
        } else {
            (h1p + h2p - 360.0) / 2.0
        };

        let t = 1.0 - 0.17 * (h_bar - 30.0).to_radians().cos()
            + 0.24 * (2.0 * h_bar).to_radians().cos()
            + 0.32 * (3.0 * h_bar + 6.0).to_radians().cos()
            - 0.20 * (4.0 * h_bar - 63.0).to_radians().cos();

        let d_theta = 30.0 * (-((h_bar - 275.0) / 25.0).powi(2)).exp();
        let c_bar_p7 = c_bar_p.powi(7);
        let r_c = 2.0 * (c_bar_p7 / (c_bar_p7 + POW25_7)).sqrt();
        let l_off = (l_bar - 50.0).powi(2);
        let s_l = 1.0 + 0.015 * l_off / (20.0 + l_off).sqrt();
        let s_c = 1.0 + 0.045 * c_bar_p;
        let s_h = 1.0 + 0.015 * c_bar_p * t;
        let r_t = -(2.0 * d_theta).to_radians().sin() * r_c;

        let tl = dl / s_l;
        let tc = dc / s_c;
        let th = d_big_h / s_h;
        (tl * tl + tc * tc + th * th + r_t * tc * th).sqrt()
    }
}

/// Hue angle in degrees, 0.0..360.0; achromatic colors get 0.
fn hue_degrees(b: f64, a_prime: f64) -> f64 {
    if b == 0.0 && a_prime == 0.0 {
        return 0.0;
    }
    let h = b.atan2(a_prime).to_degrees();
    if h < 0.0 {
        h + 360.0
    } else {
        h
    }
}

/// CIE-LAB companding function.
fn lab_f(t: f64) -> f64 {
    const EPSILON: f64 = 216.0 / 24389.0;
    const KAPPA: f64 = 24389.0 / 27.0;
    if t > EPSILON {
        t.cbrt()
    } else {
        (KAPPA * t + 16.0) / 116.0
    }
}

impl From<Xyz> for Lab {
    fn from(xyz: Xyz) -> Self {
        let fx = lab_f(xyz.x / D65_WHITE.0);
        let fy = lab_f(xyz.y / D65_WHITE.1);
        let fz = lab_f(xyz.z / D65_WHITE.2);
        Self {
            l: 116.0 * fy - 16.0,
            a: 500.0 * (fx - fy),
            b: 200.0 * (fy - fz),
        }
    }
}

impl From<LinearRgb> for Lab {
    fn from(c: LinearRgb) -> Self {
        Lab::from(Xyz::from(c))
    }
}

impl From<Srgb> for Lab {
    fn from(c: Srgb) -> Self {
        Lab::from(LinearRgb::from(c))
    }
}

/// Perceptual (ΔE2000) distance between two sRGB colors.
///
/// ```
/// use canvas_palette::{perceptual_distance, Srgb};
///
/// let red = Srgb::from_u8(237, 28, 36);
/// assert_eq!(perceptual_distance(red, red), 0.0);
/// assert!(perceptual_distance(red, Srgb::from_u8(0, 0, 0)) > 30.0);
/// ```
pub fn perceptual_distance(a: Srgb, b: Srgb) -> f64 {
    Lab::from(a).delta_e2000(Lab::from(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Selected pairs from the Sharma et al. supplementary test data.
    const SHARMA_PAIRS: [((f64, f64, f64), (f64, f64, f64), f64); 8] = [
        ((50.0, 2.6772, -79.7751), (50.0, 0.0, -82.7485), 2.0425),
        ((50.0, 3.1571, -77.2803), (50.0, 0.0, -82.7485), 2.8615),
        ((50.0, 2.8361, -74.0200), (50.0, 0.0, -82.7485), 3.4412),
        ((50.0, -1.3802, -84.2814), (50.0, 0.0, -82.7485), 1.0),
        ((50.0, 0.0, 0.0), (50.0, -1.0, 2.0), 2.3669),
        ((50.0, 2.5, 0.0), (73.0, 25.0, -18.0), 27.1492),
        ((50.0, 2.5, 0.0), (50.0, 3.1736, 0.5854), 1.0),
        ((60.2574, -34.0099, 36.2677), (60.4626, -34.1751, 39.4387), 1.2644),
    ];

    #[test]
    fn test_delta_e2000_reference_pairs() {
        for (i, (a, b, expected)) in SHARMA_PAIRS.iter().enumerate() {
            let lab_a = Lab::new(a.0, a.1, a.2);
            let lab_b = Lab::new(b.0, b.1, b.2);
            let de = lab_a.delta_e2000(lab_b);
            assert!(
                (de - expected).abs() < 1e-3,
                "pair {i}: got {de:.4}, expected {expected:.4}"
            );
        }
    }

    #[test]
    fn test_delta_e2000_symmetric() {
        for (a, b, _) in SHARMA_PAIRS {
            let lab_a = Lab::new(a.0, a.1, a.2);
            let lab_b = Lab::new(b.0, b.1, b.2);
            assert!((lab_a.delta_e2000(lab_b) - lab_b.delta_e2000(lab_a)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_identity_is_zero() {
        for bytes in [[0, 0, 0], [255, 255, 255], [237, 28, 36], [19, 230, 123]] {
            let c = Srgb::from_bytes(bytes);
            assert_eq!(perceptual_distance(c, c), 0.0);
        }
    }

    #[test]
    fn test_white_is_l100() {
        let lab = Lab::from(Srgb::from_u8(255, 255, 255));
        assert!((lab.l - 100.0).abs() < 0.01);
        assert!(lab.a.abs() < 0.01);
        assert!(lab.b.abs() < 0.01);
    }

    #[test]
    fn test_lab_matches_palette_crate() {
        use palette::{white_point::D65, IntoColor, LinSrgb, Srgb as PaletteSrgb};

        for (r, g, b) in [(255u8, 0u8, 0u8), (0, 255, 0), (0, 0, 255), (120, 120, 120)] {
            let ours = Lab::from(Srgb::from_u8(r, g, b));

            let linear: LinSrgb<f64> = PaletteSrgb::new(r, g, b).into_format::<f64>().into_linear();
            let theirs: palette::Lab<D65, f64> = linear.into_color();

            assert!((ours.l - theirs.l).abs() < 0.05, "L mismatch for {r},{g},{b}");
            assert!((ours.a - theirs.a).abs() < 0.05, "a mismatch for {r},{g},{b}");
            assert!((ours.b - theirs.b).abs() < 0.05, "b mismatch for {r},{g},{b}");
        }
    }

    #[test]
    fn test_black_white_distance_is_large() {
        let d = perceptual_distance(Srgb::from_u8(0, 0, 0), Srgb::from_u8(255, 255, 255));
        assert!(d > 99.0 && d < 101.0, "got {d}");
    }
}
