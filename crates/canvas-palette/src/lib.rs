#![allow(clippy::module_inception)]

//! canvas-palette: the fixed canvas palette and perceptual color distance
//!
//! Two distance measures serve two different jobs:
//!
//! | Measure | Space | Used for |
//! |---------|-------|----------|
//! | squared Euclidean | raw sRGB bytes | classifying pixels ([`Palette::nearest`]), once per pixel |
//! | CIEDE2000 | CIE-LAB (D65) | scoring a pixel that needs a write ([`perceptual_distance`]), once per candidate |
//!
//! Raw-RGB nearest matching is cheap enough to run against all 63 drawable
//! entries for every pixel of a 1000×1000 tile, and its results are
//! memoized. ΔE2000 is far more expensive and only runs for pixels already
//! known to differ.
//!
//! ```
//! use canvas_palette::{perceptual_distance, Palette, Srgb};
//!
//! let palette = Palette::canvas();
//! let template = Srgb::from_u8(240, 30, 40);
//! let live = Srgb::from_u8(64, 147, 228);
//!
//! assert_eq!(palette.nearest(template), 7); // Red
//! assert!(perceptual_distance(live, template) > 10.0);
//! ```

pub mod color;
pub mod palette;

pub use color::{perceptual_distance, Lab, LinearRgb, Srgb, Xyz};
pub use palette::{
    ColorSet, Palette, PaletteEntry, PaletteError, ParseColorError, CANVAS_COLORS, TRANSPARENT_ID,
};
